//! vpsm - admin console for the VPS manager control plane
//!
//! # Usage
//!
//! ```bash
//! # Log in (connects to localhost:8000 by default)
//! vpsm login admin
//!
//! # Talk to a different server
//! vpsm --api-url https://vps.example.com configs list
//!
//! # Create a configuration
//! vpsm configs create -n example.com -l /=127.0.0.1:3000 -l /api=127.0.0.1:8080
//! ```

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use vpsm_console::cli::{self, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();

    let default_level = match args.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "vpsm_console={default_level},vpsm_config={default_level}"
        ))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            cli::report_error(&err);
            ExitCode::FAILURE
        }
    }
}
