use std::sync::Arc;

use framework::asset::asset_path;
use framework::exception::CoreRsResult;
use framework::log;
use framework::shutdown::Shutdown;
use framework::task;
use serde_json::json;
use survey_intake::action::ActionLogger;
use survey_intake::clock::SystemClock;
use survey_intake::code;
use survey_intake::config::AppConfig;
use survey_intake::mail::SmtpMailTransport;
use tracing::info;
use tracing::warn;

#[tokio::main]
async fn main() -> CoreRsResult<()> {
    log::init();

    let config = AppConfig::load(&asset_path("assets/conf.json")?)?;
    info!(
        log_dir = %config.log_dir,
        recipients = config.recipients().len(),
        "config loaded"
    );

    let shutdown = Shutdown::new();
    let mut signal = shutdown.subscribe();
    shutdown.listen();

    let transport = Arc::new(SmtpMailTransport::new(&config.mail)?);
    let clock = Arc::new(SystemClock::new(config.timezone()?));
    let logger = ActionLogger::start(&config, transport, clock)?;

    logger
        .log_action(
            code::INFO_SERVER_START,
            "survey intake started",
            "main:start",
            json!({"version": env!("CARGO_PKG_VERSION")}),
        )
        .await?;

    if let Err(err) = signal.recv().await {
        warn!("shutdown signal channel closed, error={err}");
    }

    logger
        .log_action(code::INFO_SERVER_STOP, "survey intake stopping", "main:stop", json!(null))
        .await?;
    logger.close().await;
    let stats = logger.notifier_stats();
    info!(
        sent = stats.sent,
        failed = stats.failed,
        dropped = stats.dropped,
        "notifier closed"
    );

    task::shutdown().await;

    Ok(())
}
