use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cansim_driver::{Driver, DriverConfig, ServiceTicker, SessionConfig, WaitTimeout, ANY_MAILBOX};
use tracing::info;

use crate::cmd::{parse_duration, ListenArgs};
use crate::exit::{
    driver_error, exit_on_fault, CliError, CliResult, INTERNAL, SUCCESS, TIMEOUT, USAGE,
};
use crate::output::{print_frame, Direction, OutputFormat};

/// Upper bound on one blocking receive so Ctrl-C is noticed promptly.
const POLL_SLICE: Duration = Duration::from_millis(100);

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let tick = parse_duration(&args.tick)?;
    let idle_timeout = args.timeout.as_deref().map(parse_duration).transpose()?;
    if args.count == Some(0) {
        return Err(CliError::new(USAGE, "--count must be at least 1"));
    }
    if args.rx_fifo_size == 0 {
        return Err(CliError::new(USAGE, "--rx-fifo-size must be at least 1"));
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running))?;

    let driver = Arc::new(Driver::new(
        DriverConfig::default()
            .with_rx_fifo_size(args.rx_fifo_size)
            .with_halt_handler(exit_on_fault),
    ));
    driver.init();
    driver.start(&SessionConfig::new(args.channel.as_str()).with_transport(args.transport));
    let ticker = ServiceTicker::spawn(Arc::clone(&driver), tick)
        .map_err(|err| driver_error("service thread failed", err))?;

    let mut printed = 0usize;
    let mut last_frame = Instant::now();
    let mut timed_out = false;

    while running.load(Ordering::SeqCst) {
        if let Some(frame) = driver.receive_timeout(ANY_MAILBOX, WaitTimeout::After(POLL_SLICE)) {
            print_frame(&frame, &args.channel, Direction::Rx, format);
            printed = printed.saturating_add(1);
            last_frame = Instant::now();
            if args.count.is_some_and(|count| printed >= count) {
                break;
            }
            continue;
        }
        if idle_timeout.is_some_and(|limit| last_frame.elapsed() >= limit) {
            timed_out = true;
            break;
        }
    }

    ticker.stop();
    driver.stop();
    let stats = driver.stats();
    info!(
        printed,
        received = stats.received,
        overruns = stats.overruns,
        "listener stopped"
    );

    if timed_out {
        return Err(CliError::new(TIMEOUT, "no frame received before timeout"));
    }
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
