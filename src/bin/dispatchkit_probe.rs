use clap::Parser;
use dispatchkit::cli::{run_cli, Cli};
use dispatchkit::logging::{init_logging_with_config, LogConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stdout alongside the response; keep them quiet unless asked.
    let mut log_config = LogConfig::from_env();
    if std::env::var_os("DISPATCHKIT_LOG_LEVEL").is_none() {
        log_config.log_level = "warn".to_string();
    }
    let _guard = init_logging_with_config(&log_config)?;

    let mut stdout = std::io::stdout();
    run_cli(cli, &mut stdout).await
}
