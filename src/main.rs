use clap::Parser;
use colored::*;
use termenu::cli::{App, Cli, Commands};
use termenu::error::ErrorHandler;
use termenu::logging::{self, LogOptions};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before clap reads them
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let app = App::new(&cli);
    let _log_guard = logging::init(&LogOptions {
        directory: app.config_dir().join("logs"),
        debug: cli.debug,
    });
    info!(version = env!("CARGO_PKG_VERSION"), "Starting termenu");

    let command = cli.command.unwrap_or(Commands::Menu);
    if let Err(e) = app.run(command).await {
        error!("Command failed: {:?}", e);
        let report = ErrorHandler::new(cli.debug).report(&e);
        eprintln!("{} {}", "Error:".red().bold(), report.title.bold());
        eprintln!("  {}", report.message);
        eprintln!("  {}", report.suggestion.dimmed());
        if let Some(details) = report.details {
            eprintln!("  {}", details.dimmed());
        }
        return Err(anyhow::anyhow!("{} ({})", report.title, report.category));
    }

    info!("termenu finished");
    Ok(())
}
