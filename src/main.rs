use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marketplace_server::{bootstrap, config};

#[tokio::main]
async fn main() {
    // Logging (stdout + daily rotated file under ./logs)
    std::fs::create_dir_all("logs").ok();
    let (stdout_nb, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let file_appender = tracing_appender::rolling::daily("logs", "marketplace.log");
    let (file_nb, file_guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(stdout_nb))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_nb))
        .init();
    // Writers flush on drop, so the guards live until exit
    let log_guards = (stdout_guard, file_guard);

    // Embedded defaults -> marketplace.toml -> MARKETPLACE__* -> legacy variables
    let result = match config::load() {
        Ok(cfg) => bootstrap::run(cfg).await,
        Err(e) => Err(e.context("invalid configuration")),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        drop(log_guards);
        std::process::exit(1);
    }
}
