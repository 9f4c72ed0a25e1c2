use std::thread;
use std::time::{Duration, Instant};

use cansim_driver::{ControllerFrame, Driver, DriverConfig, SessionConfig, ANY_MAILBOX};
use tracing::debug;

use crate::cmd::{parse_data, parse_duration, parse_id, SendArgs};
use crate::exit::{exit_on_fault, frame_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_frame, Direction, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let frame = build_frame(&args)?;

    let driver = Driver::new(DriverConfig::default().with_halt_handler(exit_on_fault));
    driver.init();
    driver.start(&SessionConfig::new(args.channel.as_str()).with_transport(args.transport));

    let sent = wait_tx_empty(&driver, timeout);
    if sent {
        driver.transmit(ANY_MAILBOX, &frame);
    }
    driver.stop();

    if !sent {
        return Err(CliError::new(
            TIMEOUT,
            format!("transmit mailbox still busy after {timeout:?}"),
        ));
    }
    print_frame(&frame, &args.channel, Direction::Tx, format);
    Ok(SUCCESS)
}

fn build_frame(args: &SendArgs) -> CliResult<ControllerFrame> {
    let id = parse_id(&args.id)?;
    if args.remote {
        return ControllerFrame::remote(id, args.extended, args.dlc.unwrap_or(0))
            .map_err(|err| frame_error("invalid remote frame", err));
    }
    let payload = match &args.data {
        Some(data) => parse_data(data)?,
        None => Vec::new(),
    };
    ControllerFrame::new(id, args.extended, &payload)
        .map_err(|err| frame_error("invalid data frame", err))
}

/// A timeout past the range of `Instant` waits indefinitely.
fn wait_tx_empty(driver: &Driver, timeout: Duration) -> bool {
    let deadline = Instant::now().checked_add(timeout);
    loop {
        if driver.is_tx_empty(ANY_MAILBOX) {
            return true;
        }
        if deadline.is_some_and(|at| Instant::now() >= at) {
            debug!(?timeout, "transmit mailbox never drained");
            return false;
        }
        thread::sleep(Duration::from_millis(1));
    }
}
