// Sequential pagination: cool down and retry the same page on transient errors,
// stop on ceiling, budget, exhaustion, failure or a stalled row count.

use crate::config::PagingSettings;
use crate::market_data::adapters::PageFetcher;
use crate::market_data::types::{CanonicalRecord, PageOutcome};

/// Why a pagination run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    PageCeiling,
    TargetReached,
    Exhausted,
    Stalled,
    Failed,
    RetriesExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationReport {
    pub records: Vec<CanonicalRecord>,
    pub pages: u32,
    pub backoffs: u32,
    pub stop: StopReason,
}

pub struct PaginationController {
    settings: PagingSettings,
    target_rows: usize,
}

impl PaginationController {
    pub fn new(settings: &PagingSettings, target_rows: usize) -> Self {
        Self { settings: settings.clone(), target_rows }
    }

    pub async fn run<F>(&self, fetcher: &mut F) -> PaginationReport
    where
        F: PageFetcher + ?Sized,
    {
        let mut records = Vec::new();
        let mut page: u32 = 1;
        let mut pages: u32 = 0;
        let mut backoffs: u32 = 0;
        let mut retries: u32 = 0;
        let mut last_observed: Option<usize> = None;

        let stop = loop {
            if records.len() >= self.target_rows {
                break StopReason::TargetReached;
            }
            if pages >= self.settings.max_pages {
                break StopReason::PageCeiling;
            }

            match fetcher.fetch(page).await {
                PageOutcome::Transient(err) => {
                    if retries >= self.settings.max_rate_limit_retries {
                        tracing::warn!(page, retries, error = %err, "giving up on page after repeated backoffs");
                        break StopReason::RetriesExhausted;
                    }
                    retries += 1;
                    backoffs += 1;
                    metrics::counter!("coinsnap_backoffs_total").increment(1);
                    tracing::warn!(
                        page,
                        error = %err,
                        cooldown_secs = self.settings.cooldown_secs,
                        "transient source error, cooling down"
                    );
                    tokio::time::sleep(self.settings.cooldown()).await;
                }
                PageOutcome::Exhausted => break StopReason::Exhausted,
                PageOutcome::Failed(err) => {
                    tracing::warn!(page, error = %err, "page failed, keeping rows collected so far");
                    break StopReason::Failed;
                }
                PageOutcome::Rows(batch) => {
                    retries = 0;
                    pages += 1;
                    page += 1;
                    let observed = batch.observed_rows;
                    metrics::counter!("coinsnap_pages_total").increment(1);
                    metrics::counter!("coinsnap_rows_total").increment(batch.records.len() as u64);
                    records.extend(batch.records);

                    if last_observed == Some(observed) {
                        tracing::info!(observed, "row count unchanged, stopping");
                        break StopReason::Stalled;
                    }
                    last_observed = Some(observed);

                    if records.len() >= self.target_rows {
                        break StopReason::TargetReached;
                    }
                    tokio::time::sleep(self.settings.page_pause()).await;
                }
            }
        };

        tracing::info!(rows = records.len(), pages, backoffs, ?stop, "pagination finished");
        PaginationReport { records, pages, backoffs, stop }
    }
}
