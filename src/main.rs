use std::process::ExitCode;

use signal_hook::consts::{SIGINT, SIGTERM};
use tracing::{error, info};

use pool_httpd::{logging, Config, Server, VERSION};

fn main() -> ExitCode {
    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Optional positional port overrides LISTEN_ADDR's port
    if let Some(arg) = std::env::args().nth(1) {
        match arg.parse::<u16>() {
            Ok(port) => config.server = config.server.with_port(port),
            Err(_) => {
                eprintln!("Usage: pool_httpd [PORT]");
                eprintln!("Invalid port: {}", arg);
                return ExitCode::FAILURE;
            }
        }
    }

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    info!(version = VERSION, "Starting pool_httpd...");
    config.log_summary();

    let server = match Server::bind(config) {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "Failed to start server");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = server.shutdown_handle();
    for signal in [SIGINT, SIGTERM] {
        if let Err(e) = signal_hook::flag::register(signal, shutdown.flag()) {
            error!(signal, error = %e, "Failed to register signal handler");
            return ExitCode::FAILURE;
        }
    }

    server.run();
    info!("Server stopped");
    ExitCode::SUCCESS
}
