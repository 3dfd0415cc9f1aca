use std::sync::Arc;

use anyhow::Context;

use scooter_patrol::bot::Bot;
use scooter_patrol::channels::{Channel, TelegramChannel};
use scooter_patrol::config::BotConfig;
use scooter_patrol::ledger::{Ledger, LibSqlLedger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env().context("Invalid configuration")?;

    eprintln!("🛴 Scooter Patrol v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Moderators: {}", config.moderators.len());
    eprintln!("   Public channel: {}", config.public_channel);
    eprintln!("   Database: {}", config.db_path.display());

    // ── Ledger ──────────────────────────────────────────────────────────
    let ledger: Arc<dyn Ledger> = Arc::new(
        LibSqlLedger::new_local(&config.db_path)
            .await
            .with_context(|| format!("Failed to open ledger at {}", config.db_path.display()))?,
    );

    // ── Channel ─────────────────────────────────────────────────────────
    let telegram =
        TelegramChannel::new(config.bot_token.clone()).context("Failed to create Telegram channel")?;
    if let Err(e) = telegram.health_check().await {
        tracing::warn!(error = %e, "Telegram health check failed, continuing");
    }
    let channel: Arc<dyn Channel> = Arc::new(telegram);

    let bot = Bot::new(config, channel, ledger);

    // ── Startup recovery ────────────────────────────────────────────────
    let recovered = bot.recover().await.context("Failed to recover pending submissions")?;
    if recovered > 0 {
        eprintln!("   Recovered {recovered} pending submissions from the ledger");
    }
    match bot.reconcile().await {
        Ok(0) => {}
        Ok(published) => eprintln!("   Published {published} previously failed approvals"),
        Err(e) => tracing::error!(error = %e, "Publish reconciliation failed"),
    }

    bot.run().await?;
    Ok(())
}
