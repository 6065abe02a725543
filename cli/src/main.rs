use clap::Parser;
use colored::*;
use lms_admin_core::{AdminConfig, AdminError};
use std::process::ExitCode;

mod app;
mod cli;
mod logging;
mod output;
mod session_manager;
mod utils;

use crate::cli::Args;
use crate::logging::{level_filter, log_error, log_info};

/// Parses arguments, loads configuration and runs the requested admin command
#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Load layered configuration (file, .env, LMS_ADMIN_* variables)
    let mut config = match AdminConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", format!("Error loading configuration: {}", e).red());
            return ExitCode::FAILURE;
        }
    };
    if let Some(backend_url) = args.backend_url.clone() {
        config.backend_url = Some(backend_url);
    }

    // Get log level from config, raised by --verbose
    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        level_filter(config.log_level())
    };

    // Initialize logger; RUST_LOG still wins when set
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level.to_string()),
    )
    .init();

    log_info(&format!(
        "Backend: {}",
        if config.base_url().is_empty() {
            "<unset>"
        } else {
            config.base_url()
        }
    ));

    match app::run(args.command, &config, args.config.as_deref()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<AdminError>() {
                // Already reported alongside the envelope
                Some(AdminError::Api { .. }) => {}
                Some(AdminError::Unauthorized(_)) => {
                    log_error(&format!("{}", e));
                    eprintln!("Run `lms-admin login` to sign in.");
                }
                _ => log_error(&format!("{:#}", e)),
            }
            ExitCode::FAILURE
        }
    }
}
