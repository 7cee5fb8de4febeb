use rand::Rng;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::crawler::fetcher::{FetchOutcome, OfferSource};
use crate::crawler::models::HarvestReport;
use crate::crawler::parser;

/// Sequential harvest over a bounded page range. Pages are fetched one at
/// a time with a randomized pause in between; no page failure aborts the
/// run, and the loop always exits by running out of pages (or by the
/// cancellation token, which keeps whatever accumulated).
pub struct HarvestService<S: OfferSource> {
    cfg: Config,
    source: S,
}

impl<S: OfferSource> HarvestService<S> {
    pub fn new(cfg: Config, source: S) -> Self {
        Self { cfg, source }
    }

    pub async fn run(&self, cancel: CancellationToken) -> HarvestReport {
        let scope = self.cfg.scope();
        let mut report = HarvestReport::default();

        for page in self.cfg.start_page..=self.cfg.end_page {
            if cancel.is_cancelled() {
                warn!(page, "Cancellation requested, stopping harvest");
                report.cancelled = true;
                break;
            }

            report.pages_attempted += 1;
            info!(page, "Fetching listings page");

            match self.fetch_with_retry(page).await {
                FetchOutcome::Offers(offers) => {
                    let count = offers.len();
                    report
                        .records
                        .extend(offers.iter().map(|offer| parser::normalize_offer(offer, &scope)));
                    report.pages_with_data += 1;
                    info!(page, count, total = report.records.len(), "Page normalized");
                }
                FetchOutcome::Empty => {
                    report.pages_empty += 1;
                    info!(page, "No offers on page");
                }
                FetchOutcome::HttpStatus(status) => {
                    report.pages_failed += 1;
                    warn!(page, status, "Giving up on page after upstream errors");
                }
                FetchOutcome::Transport(error) => {
                    report.pages_failed += 1;
                    warn!(page, error = %error, "Giving up on page after transport errors");
                }
            }

            if page < self.cfg.end_page {
                self.pace().await;
            }
        }

        report
    }

    /// One page, `retry_attempts` tries in total with doubling backoff.
    /// Only transport and upstream failures are retried; an empty page is
    /// a terminal answer.
    async fn fetch_with_retry(&self, page: u32) -> FetchOutcome {
        let mut backoff = Duration::from_millis(self.cfg.retry_base_delay_ms);
        let mut outcome = self.source.fetch_page(page).await;

        for attempt in 1..self.cfg.retry_attempts {
            match &outcome {
                FetchOutcome::Offers(_) | FetchOutcome::Empty => return outcome,
                FetchOutcome::HttpStatus(status) => {
                    warn!(page, attempt, status, "Page fetch failed, retrying");
                }
                FetchOutcome::Transport(error) => {
                    warn!(page, attempt, error = %error, "Page fetch failed, retrying");
                }
            }

            sleep(backoff).await;
            backoff *= 2;
            outcome = self.source.fetch_page(page).await;
        }

        outcome
    }

    /// Rate-limit throttle between pages. The pause is part of the
    /// contract with the remote service, not an optimization knob.
    async fn pace(&self) {
        let delay_ms = rand::thread_rng().gen_range(self.cfg.min_delay_ms..=self.cfg.max_delay_ms);
        debug!(delay_ms, "Pacing before next page");
        sleep(Duration::from_millis(delay_ms)).await;
    }
}
