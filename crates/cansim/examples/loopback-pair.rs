//! Two emulated controllers exchanging frames over the in-process loopback bus.
//!
//! Run with:
//!   cargo run --example loopback-pair

use std::sync::Arc;
use std::time::Duration;

use cansim::driver::{ServiceTicker, WaitTimeout, ANY_MAILBOX, DEFAULT_TICK};
use cansim::{ControllerFrame, Driver, DriverConfig, SessionConfig, TransportKind};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bus = SessionConfig::new("demo0").with_transport(TransportKind::Loopback);

    let tx = Driver::new(DriverConfig::default());
    tx.init();
    tx.start(&bus);

    let rx = Arc::new(Driver::new(DriverConfig::default()));
    rx.init();
    rx.start(&bus);
    let ticker = ServiceTicker::spawn(Arc::clone(&rx), DEFAULT_TICK)?;

    for id in 0x100..0x104u32 {
        let frame = ControllerFrame::new(id, false, &id.to_be_bytes())?;
        tx.transmit(ANY_MAILBOX, &frame);

        match rx.receive_timeout(ANY_MAILBOX, WaitTimeout::After(Duration::from_secs(1))) {
            Some(got) => eprintln!("received id={:03X} data={:02X?}", got.id, got.payload()),
            None => eprintln!("frame {id:03X} lost"),
        }
    }

    ticker.stop();
    tx.stop();
    rx.stop();
    eprintln!("stats: {:?}", rx.stats());
    Ok(())
}
