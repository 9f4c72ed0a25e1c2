use std::time::Duration;

use cansim_driver::DEFAULT_RX_FIFO_SIZE;
use cansim_transport::TransportKind;
use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Transmit a single frame.
    Send(SendArgs),
    /// Print frames received on a channel.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Channel (interface) name, e.g. vcan0.
    #[arg(env = "CANSIM_CHANNEL")]
    pub channel: String,
    /// Frame identifier in hex (0x prefix optional).
    #[arg(long)]
    pub id: String,
    /// Use a 29-bit extended identifier.
    #[arg(long)]
    pub extended: bool,
    /// Send a remote transmission request.
    #[arg(long, conflicts_with = "data")]
    pub remote: bool,
    /// Payload as hex bytes, e.g. 01020304 or 01.02.03.04.
    #[arg(long)]
    pub data: Option<String>,
    /// Requested length of a remote frame.
    #[arg(long, requires = "remote")]
    pub dlc: Option<u8>,
    /// Host transport backing the channel.
    #[arg(long, default_value_t = TransportKind::default())]
    pub transport: TransportKind,
    /// Maximum time to wait for the transmit mailbox (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Channel (interface) name, e.g. vcan0.
    #[arg(env = "CANSIM_CHANNEL")]
    pub channel: String,
    /// Exit after receiving N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Interval between idle interrupt service calls (e.g. 1ms).
    #[arg(long, default_value = "1ms")]
    pub tick: String,
    /// Inbound queue capacity.
    #[arg(long, default_value_t = DEFAULT_RX_FIFO_SIZE)]
    pub rx_fifo_size: usize,
    /// Exit with a timeout status if no frame arrives within this time.
    #[arg(long)]
    pub timeout: Option<String>,
    /// Host transport backing the channel.
    #[arg(long, default_value_t = TransportKind::default())]
    pub transport: TransportKind,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

pub(crate) fn parse_id(input: &str) -> CliResult<u32> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u32::from_str_radix(digits, 16)
        .map_err(|_| CliError::new(USAGE, format!("invalid frame id: {input}")))
}

/// Hex bytes with optional `.`, `:` or space separators.
pub(crate) fn parse_data(input: &str) -> CliResult<Vec<u8>> {
    let digits: Vec<u8> = input
        .bytes()
        .filter(|b| !matches!(b, b'.' | b':' | b' '))
        .collect();
    if digits.len() % 2 != 0 {
        return Err(CliError::new(
            USAGE,
            format!("payload must be whole hex bytes: {input}"),
        ));
    }

    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| CliError::new(USAGE, format!("invalid hex payload: {input}")))
        })
        .collect()
}
