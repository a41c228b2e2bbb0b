//! shell-bridge binary entry point.

use std::process::ExitCode;
use std::sync::Arc;

use shell_bridge::cli::{parse_args, print_help, print_version};
use shell_bridge::config::Config;
use shell_bridge::{api, logging, Bridge, NativeSpawner};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("Try 'shell-bridge --help' for more information.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    logging::init(Some(config.log_filter()));
    info!("shell-bridge v{}", env!("CARGO_PKG_VERSION"));

    let (server_config, bridge_config) =
        match (config.to_server_config(), config.to_bridge_config()) {
            (Ok(server), Ok(bridge)) => (server, bridge),
            (Err(e), _) | (_, Err(e)) => {
                error!(error = %e, "Invalid configuration");
                return ExitCode::FAILURE;
            }
        };

    if bridge_config.secret.is_none() {
        warn!("No secret configured; every connection will be refused");
    }
    info!(program = %bridge_config.spawn.program, "Sessions will run");

    let bridge = Bridge::new(bridge_config, Arc::new(NativeSpawner::new()));

    match api::serve(server_config, bridge).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}
