use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use cansim_driver::{
    ControllerFrame, Driver, DriverConfig, DriverState, Fault, ServiceTicker, SessionConfig,
    TransportKind, WaitTimeout, ANY_MAILBOX, DEFAULT_TICK,
};

fn panic_on_fault(fault: &Fault) -> ! {
    panic!("halted: {fault}")
}

fn start(config: &SessionConfig) -> Driver {
    let driver = Driver::new(DriverConfig::default().with_halt_handler(panic_on_fault));
    driver.init();
    driver.start(config);
    driver
}

fn loopback(channel: &str) -> SessionConfig {
    SessionConfig::new(channel).with_transport(TransportKind::Loopback)
}

fn wait_tx_empty(driver: &Driver) {
    let deadline = Instant::now() + Duration::from_secs(1);
    while !driver.is_tx_empty(ANY_MAILBOX) {
        assert!(Instant::now() < deadline, "tx mailbox never emptied");
        thread::yield_now();
    }
}

fn service_until_frame(driver: &Driver) -> ControllerFrame {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        driver.serve_interrupt_step();
        if let Some(frame) = driver.receive(ANY_MAILBOX) {
            return frame;
        }
        assert!(Instant::now() < deadline, "no frame received");
        thread::sleep(Duration::from_millis(1));
    }
}

fn standard_frame_scenario(config: &SessionConfig) {
    let tx = start(config);
    let rx = start(config);

    let frame = ControllerFrame::new(0x123, false, &[1, 2, 3, 4]).unwrap();
    wait_tx_empty(&tx);
    tx.transmit(ANY_MAILBOX, &frame);

    let got = service_until_frame(&rx);
    assert_eq!(got.id, 0x123);
    assert!(!got.is_extended);
    assert!(!got.is_remote);
    assert!(!got.is_error);
    assert_eq!(got.dlc, 4);
    assert_eq!(&got.data[..4], &[1, 2, 3, 4]);
    assert_eq!(got.data, [1, 2, 3, 4, 0, 0, 0, 0]);

    tx.stop();
    rx.stop();
}

fn extended_remote_scenario(config: &SessionConfig) {
    let tx = start(config);
    let rx = start(config);

    let frame = ControllerFrame::remote(0x1FFF_FFFF, true, 0).unwrap();
    wait_tx_empty(&tx);
    tx.transmit(ANY_MAILBOX, &frame);

    let got = service_until_frame(&rx);
    assert!(got.is_extended);
    assert!(got.is_remote);
    assert!(!got.is_error);
    assert_eq!(got.id, 0x1FFF_FFFF);
    assert_eq!(got.dlc, 0);

    tx.stop();
    rx.stop();
}

#[test]
fn standard_frame_over_loopback() {
    standard_frame_scenario(&loopback("e2e-std"));
}

#[test]
fn extended_remote_frame_over_loopback() {
    extended_remote_scenario(&loopback("e2e-ext"));
}

#[test]
#[cfg(target_os = "linux")]
#[ignore = "requires a vcan0 interface"]
fn standard_frame_over_vcan() {
    standard_frame_scenario(&SessionConfig::new("vcan0").with_transport(TransportKind::SocketCan));
}

#[test]
#[cfg(target_os = "linux")]
#[ignore = "requires a vcan0 interface"]
fn extended_remote_frame_over_vcan() {
    extended_remote_scenario(&SessionConfig::new("vcan0").with_transport(TransportKind::SocketCan));
}

#[test]
fn receive_on_empty_mailbox_does_not_block() {
    let rx = start(&loopback("e2e-empty"));
    let begin = Instant::now();
    for _ in 0..100 {
        assert_eq!(rx.receive(ANY_MAILBOX), None);
        assert!(!rx.is_rx_nonempty(ANY_MAILBOX));
    }
    assert!(begin.elapsed() < Duration::from_millis(100));
}

#[test]
fn readiness_reflects_queue_contents() {
    let tx = start(&loopback("e2e-ready"));
    let rx = start(&loopback("e2e-ready"));

    tx.transmit(ANY_MAILBOX, &ControllerFrame::new(0x1, false, &[]).unwrap());
    assert!(!rx.is_rx_nonempty(ANY_MAILBOX), "nothing serviced yet");

    assert!(rx.serve_interrupt_step());
    assert!(rx.is_rx_nonempty(ANY_MAILBOX));

    assert!(rx.receive(ANY_MAILBOX).is_some());
    assert!(!rx.is_rx_nonempty(ANY_MAILBOX));
}

#[test]
fn fifo_order_across_the_bus() {
    let tx = start(&loopback("e2e-fifo"));
    let rx = start(&loopback("e2e-fifo"));

    let ids = [0xA, 0xB, 0xC];
    for id in ids {
        tx.transmit(ANY_MAILBOX, &ControllerFrame::new(id, false, &[]).unwrap());
    }
    while rx.serve_interrupt_step() {}

    for id in ids {
        assert_eq!(rx.receive(ANY_MAILBOX).map(|f| f.id), Some(id));
    }
}

#[test]
fn capacity_plus_one_frames_drop_the_newest() {
    let tx = start(&loopback("e2e-cap"));
    let rx = Driver::new(
        DriverConfig::default()
            .with_rx_fifo_size(2)
            .with_halt_handler(panic_on_fault),
    );
    rx.init();
    rx.start(&loopback("e2e-cap"));

    for id in 1..=3u32 {
        tx.transmit(ANY_MAILBOX, &ControllerFrame::new(id, false, &[]).unwrap());
    }
    for _ in 0..3 {
        assert!(rx.serve_interrupt_step());
    }

    assert_eq!(rx.stats().received, 2);
    assert_eq!(rx.stats().overruns, 1);
    assert_eq!(rx.receive(ANY_MAILBOX).map(|f| f.id), Some(1));
    assert_eq!(rx.receive(ANY_MAILBOX).map(|f| f.id), Some(2));
    assert_eq!(rx.receive(ANY_MAILBOX), None);
}

#[test]
fn ticker_driven_receiver() {
    let tx = start(&loopback("e2e-tick"));
    let rx = Arc::new(start(&loopback("e2e-tick")));
    let ticker = ServiceTicker::spawn(Arc::clone(&rx), DEFAULT_TICK).unwrap();

    let mut frame = ControllerFrame::new(0x700, false, &[0; 8]).unwrap();
    frame.set_data64(0x0102_0304_0506_0708);
    tx.transmit(ANY_MAILBOX, &frame);

    let got = rx
        .receive_timeout(ANY_MAILBOX, WaitTimeout::After(Duration::from_secs(2)))
        .expect("frame should arrive");
    assert_eq!(got.data64(), 0x0102_0304_0506_0708);

    ticker.stop();
    rx.stop();
    assert_eq!(rx.state(), DriverState::Stopped);
}
