mod api;
mod cli;
mod db;
mod error;
mod models;
mod service;
mod sync;

use clap::Parser;
use cli::{App, Cli};
use colored::*;
use error::Result;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; LOG_DIR switches on daily-rolling file output for
    // long-running serve deployments. The guard must outlive main so the
    // background writer flushes on shutdown.
    let _file_guard = match std::env::var("LOG_DIR") {
        Ok(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "airmon.log");
            let (writer, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::from_default_env())
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        },
        Err(_) => {
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::from_default_env())
                .init();
            None
        },
    };

    info!("Initializing air quality monitoring app...");

    let app = match App::new(cli.mock).await {
        Ok(app) => {
            info!("Application initialized successfully.");
            app
        },
        Err(e) => {
            error!("Failed to initialize application: {:?}", e);
            println!(
                "{}",
                "Error: Failed to initialize application. Check logs.".red()
            );
            return Err(e);
        },
    };

    if let Err(e) = app.run(cli.command).await {
        error!("Command execution failed: {:?}", e);
        println!("{} {}", "Error:".red(), e.to_string().red());
        return Err(e);
    }

    Ok(())
}
