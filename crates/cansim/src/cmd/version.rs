use cansim_transport::TransportKind;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("cansim {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: cansim");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("CANSIM_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!(
        "transports: socketcan={}, loopback=true",
        cfg!(target_os = "linux")
    );
    println!("default_transport: {}", TransportKind::default());
    println!("rx_fifo_size: {}", cansim_driver::DEFAULT_RX_FIFO_SIZE);

    Ok(SUCCESS)
}
