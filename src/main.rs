use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::filter_fn, fmt, prelude::*, EnvFilter};

use deal_hunter::cli::{self, Cli, Command};
use deal_hunter::event_log::EVENTS_TARGET;
use deal_hunter::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env()?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    // `run` prints the activity log itself
    let events_on_stderr = !matches!(cli.command, Some(Command::Run { .. }));
    let _guard = init_tracing(&config, events_on_stderr)?;

    info!("Starting Deal Hunter v{}", env!("CARGO_PKG_VERSION"));
    cli::execute(cli, config).await
}

fn init_tracing(config: &AppConfig, events_on_stderr: bool) -> Result<Option<WorkerGuard>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.logging.filter)?,
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter_fn(move |meta| events_on_stderr || meta.target() != EVENTS_TARGET));

    let (file_layer, guard) = match &config.logging.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "deal-hunter.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}
