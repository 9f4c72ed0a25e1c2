use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use cansim_frame::{decode, encode, ControllerFrame};
use cansim_transport::{Session, SessionConfig, TransportError};
use tracing::{debug, info, trace, warn};

use crate::config::DriverConfig;
use crate::error::Fault;
use crate::isr;
use crate::queue::InboundQueue;
use crate::timeout::WaitTimeout;
use crate::waiters::{ThreadQueue, WakeReason};

/// Mailbox index as used by the controller API.
pub type Mailbox = u8;

/// Let the driver pick the mailbox.
pub const ANY_MAILBOX: Mailbox = 0;

/// Number of transmit mailboxes.
pub const TX_MAILBOXES: Mailbox = 1;

/// Number of receive mailboxes.
pub const RX_MAILBOXES: Mailbox = 1;

/// Driver lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Uninitialized,
    Stopped,
    Ready,
}

/// Frame counters since the driver was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    /// Frames written to the transport.
    pub transmitted: u64,
    /// Frames moved from the transport into the inbound queue.
    pub received: u64,
    /// Inbound frames dropped because the queue was full.
    pub overruns: u64,
}

#[derive(Debug)]
struct Inner {
    state: DriverState,
    session: Option<Session>,
}

/// Emulated CAN controller bridging a host socket to mailbox semantics.
///
/// All operations take `&self`; share the driver through an `Arc` between
/// caller threads and the thread running [`Driver::serve_interrupt`].
#[derive(Debug)]
pub struct Driver {
    config: DriverConfig,
    inner: RwLock<Inner>,
    rx_queue: InboundQueue,
    rx_waiters: ThreadQueue,
    transmitted: AtomicU64,
    received: AtomicU64,
    overruns: AtomicU64,
}

impl Default for Driver {
    fn default() -> Self {
        Self::new(DriverConfig::default())
    }
}

impl Driver {
    /// Create an uninitialized driver.
    pub fn new(config: DriverConfig) -> Self {
        let rx_queue = InboundQueue::new(config.rx_fifo_size);
        Self {
            config,
            inner: RwLock::new(Inner {
                state: DriverState::Uninitialized,
                session: None,
            }),
            rx_queue,
            rx_waiters: ThreadQueue::new(),
            transmitted: AtomicU64::new(0),
            received: AtomicU64::new(0),
            overruns: AtomicU64::new(0),
        }
    }

    /// One-time initialization; moves the driver to [`DriverState::Stopped`].
    pub fn init(&self) {
        let mut inner = self.write_inner();
        assert_eq!(
            inner.state,
            DriverState::Uninitialized,
            "driver already initialized"
        );
        self.rx_queue.reset();
        inner.state = DriverState::Stopped;
        debug!(rx_fifo_size = self.config.rx_fifo_size, "CAN driver initialized");
    }

    /// Open the transport and enter [`DriverState::Ready`].
    ///
    /// Any failure to open the session is fatal.
    pub fn start(&self, session_config: &SessionConfig) {
        let mut inner = self.write_inner();
        assert_eq!(
            inner.state,
            DriverState::Stopped,
            "start requires a stopped driver"
        );

        let session = match Session::open(session_config) {
            Ok(session) => session,
            Err(err) => self.halt(start_context(&err), err),
        };

        self.rx_queue.reset();
        inner.session = Some(session);
        inner.state = DriverState::Ready;
        info!(
            channel = %session_config.channel_name,
            transport = %session_config.transport,
            "CAN driver started"
        );
    }

    /// Close the transport and return to [`DriverState::Stopped`].
    ///
    /// Threads parked in [`Driver::receive_timeout`] are released. Stopping
    /// a driver that is not ready is a no-op.
    pub fn stop(&self) {
        let mut inner = self.write_inner();
        if inner.state != DriverState::Ready {
            return;
        }

        inner.state = DriverState::Stopped;
        if let Some(session) = inner.session.take() {
            if let Err(err) = session.close() {
                self.halt("socket close failed", err);
            }
        }
        drop(inner);

        self.rx_waiters.dequeue_all();
        info!("CAN driver stopped");
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DriverState {
        self.read_inner().state
    }

    /// True if the transmit mailbox can take a frame. Never blocks.
    pub fn is_tx_empty(&self, mailbox: Mailbox) -> bool {
        check_mailbox(mailbox, TX_MAILBOXES);
        self.with_session("is_tx_empty", |session| match session.poll_writable() {
            Ok(ready) => ready,
            Err(err) => self.halt("socket poll error", err),
        })
    }

    /// Write one frame to the transport.
    ///
    /// No queueing and no retry: check [`Driver::is_tx_empty`] first.
    pub fn transmit(&self, mailbox: Mailbox, frame: &ControllerFrame) {
        check_mailbox(mailbox, TX_MAILBOXES);
        let wire = encode(frame);
        self.with_session("transmit", |session| {
            if let Err(err) = session.write_frame(&wire) {
                self.halt("couldn't send CAN frame", err);
            }
        });
        self.transmitted.fetch_add(1, Ordering::Relaxed);
        trace!(id = frame.id, dlc = frame.dlc, "frame transmitted");
    }

    /// True if at least one received frame is waiting. Never blocks.
    pub fn is_rx_nonempty(&self, mailbox: Mailbox) -> bool {
        check_mailbox(mailbox, RX_MAILBOXES);
        self.assert_ready("is_rx_nonempty");
        !self.rx_queue.is_empty()
    }

    /// Take the oldest received frame without waiting.
    pub fn receive(&self, mailbox: Mailbox) -> Option<ControllerFrame> {
        check_mailbox(mailbox, RX_MAILBOXES);
        self.assert_ready("receive");
        self.rx_queue.try_pop()
    }

    /// Take the oldest received frame, waiting up to `timeout` for one.
    ///
    /// Returns `None` on timeout or when the driver is stopped while waiting.
    /// Must not be called from the simulated interrupt context.
    pub fn receive_timeout(
        &self,
        mailbox: Mailbox,
        timeout: WaitTimeout,
    ) -> Option<ControllerFrame> {
        check_mailbox(mailbox, RX_MAILBOXES);
        self.assert_ready("receive_timeout");

        let deadline = timeout.deadline();
        loop {
            if let Some(frame) = self.rx_queue.try_pop() {
                return Some(frame);
            }
            if self.state() != DriverState::Ready {
                return None;
            }
            // The state check inside the condition pairs with `stop` waking
            // parked threads only after the state changed.
            let reason = self
                .rx_waiters
                .enqueue_timeout_unless(WaitTimeout::until(deadline), || {
                    !self.rx_queue.is_empty() || self.state() != DriverState::Ready
                });
            if matches!(reason, WakeReason::Reset | WakeReason::Timeout) {
                return None;
            }
        }
    }

    /// Nothing to cancel: a transmitted frame is already on the socket.
    pub fn abort(&self, mailbox: Mailbox) {
        check_mailbox(mailbox, TX_MAILBOXES);
    }

    /// Enter low-power mode. The socket transport has none.
    pub fn sleep(&self) {
        trace!("sleep requested, ignored");
    }

    /// Leave low-power mode. The socket transport has none.
    pub fn wakeup(&self) {
        trace!("wakeup requested, ignored");
    }

    /// Interrupt entry point: runs one service step if the driver is ready.
    ///
    /// Returns whether any work was done. Safe to call in any state.
    pub fn serve_interrupt(&self) -> bool {
        let serviced = {
            let inner = self.read_inner();
            match (&inner.state, &inner.session) {
                (DriverState::Ready, Some(session)) => self.service_step(session),
                _ => false,
            }
        };
        self.wake_receiver(serviced)
    }

    /// Move at most one inbound frame from the transport into the queue.
    ///
    /// Only valid while ready. Returns `false` when nothing was readable.
    pub fn serve_interrupt_step(&self) -> bool {
        let serviced =
            self.with_session("serve_interrupt_step", |session| self.service_step(session));
        self.wake_receiver(serviced)
    }

    /// Counters since creation.
    pub fn stats(&self) -> DriverStats {
        DriverStats {
            transmitted: self.transmitted.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
        }
    }

    /// Inbound frames dropped because the queue was full.
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    /// Driver configuration.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    fn service_step(&self, session: &Session) -> bool {
        let _isr = isr::enter();

        match session.poll_readable() {
            Ok(true) => {}
            Ok(false) => return false,
            Err(err) => self.halt("socket poll error", err),
        }

        let wire = match session.read_frame() {
            Ok(Some(wire)) => wire,
            Ok(None) => return false,
            Err(err) => self.halt("socket read error", err),
        };
        let frame = decode(&wire);

        match self.rx_queue.claim_empty_slot() {
            Ok(slot) => {
                self.rx_queue.publish_slot(slot, frame);
                self.received.fetch_add(1, Ordering::Relaxed);
                trace!(id = frame.id, dlc = frame.dlc, "frame received");
            }
            Err(full) => {
                self.overruns.fetch_add(1, Ordering::Relaxed);
                warn!(id = frame.id, %full, "inbound queue overrun, dropping frame");
            }
        }

        true
    }

    // Runs after the inner lock is released: parked receivers take the
    // waiter lock before reading the driver state.
    fn wake_receiver(&self, serviced: bool) -> bool {
        if serviced {
            let _isr = isr::enter();
            self.rx_waiters.dequeue_next();
        }
        serviced
    }

    fn with_session<T>(&self, operation: &str, f: impl FnOnce(&Session) -> T) -> T {
        let inner = self.read_inner();
        match (&inner.state, &inner.session) {
            (DriverState::Ready, Some(session)) => f(session),
            (state, _) => panic!("{operation} requires a ready driver (state {state:?})"),
        }
    }

    fn assert_ready(&self, operation: &str) {
        let state = self.state();
        assert!(
            state == DriverState::Ready,
            "{operation} requires a ready driver (state {state:?})"
        );
    }

    fn halt(&self, context: &'static str, source: TransportError) -> ! {
        (self.config.halt)(&Fault { context, source })
    }

    fn read_inner(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_inner(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn check_mailbox(mailbox: Mailbox, count: Mailbox) {
    assert!(
        mailbox <= count,
        "mailbox {mailbox} out of range (max {count})"
    );
}

fn start_context(err: &TransportError) -> &'static str {
    match err {
        TransportError::Socket(_) => "socket creating failed",
        TransportError::Bind { .. } => "socket binding failed",
        TransportError::InterfaceLookup { .. } => "interface lookup failed",
        _ => "CAN session open failed",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use cansim_transport::TransportKind;

    use super::*;

    fn panic_on_fault(fault: &Fault) -> ! {
        panic!("halted: {fault}")
    }

    fn loopback(channel: &str) -> SessionConfig {
        SessionConfig::new(channel).with_transport(TransportKind::Loopback)
    }

    fn ready_driver(channel: &str) -> Driver {
        let driver = Driver::new(DriverConfig::default().with_halt_handler(panic_on_fault));
        driver.init();
        driver.start(&loopback(channel));
        driver
    }

    fn pump_until_received(driver: &Driver) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !driver.serve_interrupt_step() {
            assert!(Instant::now() < deadline, "no frame arrived");
            thread::yield_now();
        }
    }

    #[test]
    fn lifecycle_transitions() {
        let driver = Driver::new(DriverConfig::default().with_halt_handler(panic_on_fault));
        assert_eq!(driver.state(), DriverState::Uninitialized);
        driver.init();
        assert_eq!(driver.state(), DriverState::Stopped);
        driver.start(&loopback("drv-life"));
        assert_eq!(driver.state(), DriverState::Ready);
        driver.stop();
        assert_eq!(driver.state(), DriverState::Stopped);
        driver.stop();
        driver.start(&loopback("drv-life"));
        assert_eq!(driver.state(), DriverState::Ready);
    }

    #[test]
    fn service_step_without_traffic_does_nothing() {
        let driver = ready_driver("drv-idle");
        assert!(!driver.serve_interrupt_step());
        assert!(!driver.is_rx_nonempty(ANY_MAILBOX));
        assert_eq!(driver.receive(ANY_MAILBOX), None);
    }

    #[test]
    fn service_step_moves_one_frame_per_call() {
        let tx = ready_driver("drv-one");
        let rx = ready_driver("drv-one");

        for id in 1..=2 {
            tx.transmit(ANY_MAILBOX, &ControllerFrame::new(id, false, &[]).unwrap());
        }

        assert!(rx.serve_interrupt_step());
        assert_eq!(rx.stats().received, 1);
        assert!(rx.serve_interrupt_step());
        assert!(!rx.serve_interrupt_step());

        assert_eq!(rx.receive(1).map(|f| f.id), Some(1));
        assert_eq!(rx.receive(1).map(|f| f.id), Some(2));
        assert_eq!(tx.stats().transmitted, 2);
    }

    #[test]
    fn overrun_drops_newest_frame() {
        let tx = ready_driver("drv-ovr");
        let rx = ready_driver("drv-ovr");
        let capacity = rx.config().rx_fifo_size as u32;

        for id in 0..=capacity {
            tx.transmit(ANY_MAILBOX, &ControllerFrame::new(id, false, &[]).unwrap());
            assert!(rx.serve_interrupt_step());
        }

        assert_eq!(rx.overruns(), 1);
        for id in 0..capacity {
            assert_eq!(rx.receive(ANY_MAILBOX).map(|f| f.id), Some(id));
        }
        assert_eq!(rx.receive(ANY_MAILBOX), None);
    }

    #[test]
    fn serve_interrupt_is_inert_when_stopped() {
        let driver = Driver::new(DriverConfig::default().with_halt_handler(panic_on_fault));
        assert!(!driver.serve_interrupt());
        driver.init();
        assert!(!driver.serve_interrupt());
    }

    #[test]
    fn receive_timeout_is_woken_by_service_step() {
        let tx = ready_driver("drv-wake");
        let rx = Arc::new(ready_driver("drv-wake"));

        let waiter = {
            let rx = Arc::clone(&rx);
            thread::spawn(move || {
                rx.receive_timeout(ANY_MAILBOX, WaitTimeout::After(Duration::from_secs(5)))
            })
        };

        thread::sleep(Duration::from_millis(20));
        tx.transmit(ANY_MAILBOX, &ControllerFrame::new(0x55, false, &[9]).unwrap());
        pump_until_received(&rx);

        let frame = waiter.join().unwrap().expect("waiter should get the frame");
        assert_eq!(frame.id, 0x55);
        assert_eq!(frame.payload(), &[9]);
    }

    #[test]
    fn receive_timeout_expires_without_traffic() {
        let rx = ready_driver("drv-expire");
        let start = Instant::now();
        assert_eq!(
            rx.receive_timeout(ANY_MAILBOX, WaitTimeout::After(Duration::from_millis(20))),
            None
        );
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn receive_timeout_accepts_unbounded_duration() {
        let tx = ready_driver("drv-maxwait");
        let rx = ready_driver("drv-maxwait");
        tx.transmit(ANY_MAILBOX, &ControllerFrame::new(0x42, false, &[]).unwrap());
        pump_until_received(&rx);

        let got = rx.receive_timeout(ANY_MAILBOX, WaitTimeout::After(Duration::MAX));
        assert_eq!(got.map(|f| f.id), Some(0x42));
    }

    #[test]
    fn stop_releases_parked_receivers() {
        let rx = Arc::new(ready_driver("drv-stop"));
        let waiter = {
            let rx = Arc::clone(&rx);
            thread::spawn(move || rx.receive_timeout(ANY_MAILBOX, WaitTimeout::Infinite))
        };

        let deadline = Instant::now() + Duration::from_secs(5);
        while rx.rx_waiters.waiting() == 0 {
            assert!(Instant::now() < deadline, "receiver never parked");
            thread::sleep(Duration::from_millis(1));
        }
        rx.stop();
        assert_eq!(waiter.join().unwrap(), None);
    }

    #[test]
    fn abort_sleep_and_wakeup_are_noops() {
        let driver = ready_driver("drv-noop");
        driver.abort(ANY_MAILBOX);
        driver.sleep();
        driver.wakeup();
        assert_eq!(driver.state(), DriverState::Ready);
    }

    #[test]
    fn loopback_is_always_writable() {
        let driver = ready_driver("drv-txe");
        assert!(driver.is_tx_empty(ANY_MAILBOX));
        assert!(driver.is_tx_empty(1));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn mailbox_out_of_range_is_a_contract_violation() {
        let driver = ready_driver("drv-mbx");
        driver.is_tx_empty(2);
    }

    #[test]
    #[should_panic(expected = "requires a ready driver")]
    fn transmit_before_start_is_a_contract_violation() {
        let driver = Driver::default();
        driver.init();
        driver.transmit(ANY_MAILBOX, &ControllerFrame::default());
    }

    #[test]
    #[should_panic(expected = "halted: ")]
    fn failed_open_halts() {
        let driver = Driver::new(DriverConfig::default().with_halt_handler(panic_on_fault));
        driver.init();
        driver.start(&loopback(""));
    }

    #[test]
    #[cfg(target_os = "linux")]
    #[should_panic(expected = "halted: ")]
    fn missing_interface_halts() {
        let driver = Driver::new(DriverConfig::default().with_halt_handler(panic_on_fault));
        driver.init();
        driver.start(&SessionConfig::new("nosuchcan9").with_transport(TransportKind::SocketCan));
    }
}
