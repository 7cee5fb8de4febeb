mod config;
mod crawler;
mod storage;

use config::Config;
use crawler::fetcher::ApiFetcher;
use crawler::service::HarvestService;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = Config::from_env()?;
    info!(
        start_page = cfg.start_page,
        end_page = cfg.end_page,
        "Starting harvest"
    );

    let fetcher = ApiFetcher::new(&cfg)?;
    let service = HarvestService::new(cfg.clone(), fetcher);

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing current page");
            signal_token.cancel();
        }
    });

    let report = service.run(cancel).await;

    info!(
        pages_attempted = report.pages_attempted,
        pages_with_data = report.pages_with_data,
        pages_empty = report.pages_empty,
        pages_failed = report.pages_failed,
        records = report.records.len(),
        cancelled = report.cancelled,
        "Harvest finished"
    );

    storage::csv::write_dataset(&cfg, &report.records)?;

    Ok(())
}
