use log::{error, info};
use robotrader_runner::{RunnerConfig, run_session};
use std::process::ExitCode;

fn print_help() {
    eprintln!(
        r#"robotrader - run trading robots against simulated prices

USAGE:
    robotrader [CONFIG]

ARGS:
    CONFIG              JSON configuration file (defaults are used without one)

ENVIRONMENT VARIABLES:
    RUST_LOG            Log level filter (default: info)
"#
    );
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1).as_deref() {
        Some("--help" | "-h") => {
            print_help();
            return ExitCode::SUCCESS;
        }
        Some(path) => {
            info!("Loading configuration from: {}", path);
            RunnerConfig::load(path)
        }
        None => {
            info!("Using default configuration");
            Ok(RunnerConfig::default())
        }
    };

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let stop = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received"),
            Err(e) => error!("Can't listen for Ctrl-C, stopping: {}", e),
        }
    };

    match run_session(config, stop).await {
        Ok(report) => {
            info!(
                "Done: {} robots, {} deals",
                report.robots.len(),
                report.total_deals()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
