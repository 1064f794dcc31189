//! fixloop - Entry Point
//!
//! Runs the deploy, monitor, fix loop described by a JSON settings file.

use std::collections::HashMap;
use std::env;
use std::process::ExitCode;

use colored::Colorize;
use fixloop::app::run::{run, validate};
use fixloop::filesys::file::File;
use fixloop::logs::{init_logging, LogLevel};
use fixloop::models::result::LoopResult;
use fixloop::storage::layout::StorageLayout;
use fixloop::storage::settings::Settings;
use fixloop::utils::version_info;

use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(version) => println!("{}", version),
            Err(e) => eprintln!("Failed to render version: {}", e),
        }
        return ExitCode::SUCCESS;
    }

    // Retrieve the settings file
    let settings_file = match cli_args.get("config") {
        Some(path) => File::new(path),
        None => StorageLayout::settings_file(),
    };
    let mut settings = match settings_file.read_json::<Settings>().await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!(
                "{} unable to read {}: {}",
                "error:".red().bold(),
                settings_file.path().display(),
                e
            );
            return ExitCode::FAILURE;
        }
    };
    if let Some(level) = cli_args.get("log-level") {
        match level.parse::<LogLevel>() {
            Ok(level) => settings.log_level = level,
            Err(e) => eprintln!("{} {}", "warning:".yellow().bold(), e),
        }
    }

    // Initialize logging
    let layout = StorageLayout::default();
    let mut log_options = settings.log_options();
    if log_options.log_dir.is_none() {
        log_options.log_dir = Some(layout.logs_dir().path().to_path_buf());
    }
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let config = settings.loop_config();

    // Validate and exit
    if cli_args.contains_key("validate") {
        return match validate(&config).await {
            Ok(()) => {
                println!("{} configuration is valid", "ok:".green().bold());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{} {}", "invalid:".red().bold(), e);
                ExitCode::FAILURE
            }
        };
    }

    info!("Running fix loop with config: {:?}", config);
    match run(config, &layout, await_shutdown_signal()).await {
        Ok(result) => {
            print_summary(&result);
            if result.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            error!("Failed to run the fix loop: {e}");
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn print_summary(result: &LoopResult) {
    let status = if result.success {
        "clean".green().bold()
    } else {
        "not clean".red().bold()
    };
    println!("fixloop finished: {}", status);
    println!("  iterations:       {}", result.iterations);
    println!("  fixes applied:    {}", result.errors_fixed);
    println!("  errors remaining: {}", result.errors_remaining);
    println!("  duration:         {:.1}s", result.total_duration.as_secs_f64());
    if let Some(url) = &result.final_url {
        println!("  deployment:       {}", url);
    }
    if let Some(reason) = &result.reason {
        println!("  reason:           {}", reason);
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                _ => {
                    error!("Failed to install signal handlers, falling back to Ctrl+C");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received, shutting down...");
        }
    }
}
