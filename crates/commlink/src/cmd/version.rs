use commlink_frame::{FRAME_OVERHEAD, MAX_PAYLOAD_SIZE};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("commlink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: commlink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("COMMLINK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "build_profile: {}",
        option_env!("COMMLINK_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("max_payload_size: {MAX_PAYLOAD_SIZE}");
    println!("frame_overhead: {FRAME_OVERHEAD}");
    println!(
        "features: endpoint={}, cli=true",
        cfg!(feature = "endpoint")
    );

    Ok(SUCCESS)
}
