// Orchestrator: fan page tasks out over a bounded pool of browser sessions,
// merge whatever comes back in completion order.
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::{ExpandSettings, PagingSettings, PoolSettings};
use crate::error::{FetchError, SourceResult};
use crate::market_data::adapters::dynamic_html::DynamicHtmlFetcher;
use crate::market_data::adapters::PageFetcher;
use crate::market_data::session::SessionFactory;
use crate::market_data::types::{CanonicalRecord, FetchResult, PageOutcome, PageTask, Target};

/// One task per page-sized slice of the budget: `ceil(target / page_size)`.
pub fn plan_tasks(target_rows: usize, page_size: usize) -> Vec<PageTask> {
    let page_size = page_size.max(1);
    let count = target_rows.div_ceil(page_size);
    (1..=count as u32).map(|page| PageTask { page }).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorReport {
    pub records: Vec<CanonicalRecord>,
    pub submitted: usize,
    pub completed: usize,
    pub failed: usize,
}

pub struct Orchestrator {
    factory: Arc<dyn SessionFactory>,
    target: Target,
    pool: PoolSettings,
    expand: ExpandSettings,
    paging: PagingSettings,
}

impl Orchestrator {
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        target: &Target,
        pool: &PoolSettings,
        expand: &ExpandSettings,
        paging: &PagingSettings,
    ) -> Self {
        Self {
            factory,
            target: target.clone(),
            pool: pool.clone(),
            expand: expand.clone(),
            paging: paging.clone(),
        }
    }

    pub async fn run(&self) -> OrchestratorReport {
        let tasks = plan_tasks(self.target.target_rows, self.pool.page_size);
        let submitted = tasks.len();
        let permits = Arc::new(Semaphore::new(self.pool.workers.max(1)));
        tracing::info!(tasks = submitted, workers = self.pool.workers, "dispatching page tasks");

        let mut set = JoinSet::new();
        for task in tasks {
            let permits = Arc::clone(&permits);
            let factory = Arc::clone(&self.factory);
            let base_url = self.target.base_url.clone();
            let page_size = self.pool.page_size.max(1);
            let expand = self.expand.clone();
            let paging = self.paging.clone();
            set.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| FetchError::Pool(e.to_string()))?;
                run_task(factory.as_ref(), task, &base_url, page_size, &expand, &paging).await
            });
        }

        let mut records = Vec::new();
        let mut completed = 0;
        let mut failed = 0;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(batch)) => {
                    completed += 1;
                    records.extend(batch.records);
                }
                Ok(Err(e)) => {
                    failed += 1;
                    metrics::counter!("coinsnap_worker_failures_total").increment(1);
                    tracing::warn!(error = %e, "page task failed");
                }
                Err(e) => {
                    failed += 1;
                    metrics::counter!("coinsnap_worker_failures_total").increment(1);
                    tracing::error!(error = %e, "page task panicked or was cancelled");
                }
            }
        }

        metrics::counter!("coinsnap_rows_total").increment(records.len() as u64);
        tracing::info!(rows = records.len(), completed, failed, "page tasks merged");
        OrchestratorReport { records, submitted, completed, failed }
    }
}

// Owns its session from open to close; close runs whatever the fetch did.
async fn run_task(
    factory: &dyn SessionFactory,
    task: PageTask,
    base_url: &str,
    page_size: usize,
    expand: &ExpandSettings,
    paging: &PagingSettings,
) -> SourceResult<FetchResult> {
    let session = factory.open().await?;
    let mut fetcher = DynamicHtmlFetcher::new(session, base_url, page_size, expand);
    let outcome = fetch_with_backoff(&mut fetcher, task.page, paging).await;
    if let Err(e) = fetcher.close().await {
        tracing::debug!(page = task.page, error = %e, "session close failed");
    }
    match outcome {
        PageOutcome::Rows(batch) => Ok(batch),
        PageOutcome::Exhausted => Ok(FetchResult::default()),
        PageOutcome::Transient(e) | PageOutcome::Failed(e) => Err(e),
    }
}

/// Retry `page` on the same session after each transient outcome, at most
/// `max_rate_limit_retries` times.
async fn fetch_with_backoff<F>(fetcher: &mut F, page: u32, paging: &PagingSettings) -> PageOutcome
where
    F: PageFetcher + ?Sized,
{
    let mut retries = 0;
    loop {
        match fetcher.fetch(page).await {
            PageOutcome::Transient(err) if retries < paging.max_rate_limit_retries => {
                retries += 1;
                metrics::counter!("coinsnap_backoffs_total").increment(1);
                tracing::warn!(
                    page,
                    retries,
                    error = %err,
                    cooldown_secs = paging.cooldown_secs,
                    "transient error in page task, cooling down"
                );
                tokio::time::sleep(paging.cooldown()).await;
            }
            outcome => return outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::adapters::dynamic_html::LOAD_MORE;
    use crate::market_data::session::document::DocumentFactory;
    use crate::market_data::session::fake::{FakeFactory, FakeSpec};
    use std::collections::HashSet;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use wiremock::matchers::{path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BASE: &str = "https://listing.test/all";

    fn spec(fail_on: Option<&'static str>) -> FakeSpec {
        FakeSpec {
            initial: 50,
            step: 100,
            cap: 250,
            control: Some(LOAD_MORE[0]),
            native_click_fails: false,
            symbol_in_span: false,
            fail_on,
            goto_delay: Duration::ZERO,
            slow_on: None,
        }
    }

    /// Ten rows per page, fully rendered on load.
    fn flat_spec() -> FakeSpec {
        FakeSpec { initial: 10, step: 0, cap: 10, control: None, ..spec(None) }
    }

    fn expand() -> ExpandSettings {
        ExpandSettings {
            initial_wait_ms: 500,
            row_wait_ms: 100,
            poll_ms: 1,
            settle_ms: 0,
            ..ExpandSettings::default()
        }
    }

    fn paging() -> PagingSettings {
        PagingSettings {
            cooldown_secs: 0,
            max_rate_limit_retries: 2,
            ..PagingSettings::default()
        }
    }

    fn orchestrator(
        factory: Arc<dyn SessionFactory>,
        rows: usize,
        workers: usize,
        page_size: usize,
        base: &str,
    ) -> Orchestrator {
        Orchestrator::new(
            factory,
            &Target::new(rows, base),
            &PoolSettings { workers, page_size },
            &expand(),
            &paging(),
        )
    }

    #[test]
    fn test_plan_tasks() {
        assert_eq!(plan_tasks(1000, 250).len(), 4);
        assert_eq!(plan_tasks(1250, 250).len(), 5);
        assert_eq!(plan_tasks(1001, 250).len(), 5);
        assert_eq!(plan_tasks(0, 250).len(), 0);
        assert_eq!(plan_tasks(3, 0).len(), 3);
        assert_eq!(plan_tasks(500, 250)[1], PageTask { page: 2 });
    }

    #[tokio::test]
    async fn test_merges_all_pages() {
        let factory = Arc::new(FakeFactory::new(spec(None)));
        let report = orchestrator(factory.clone(), 1000, 5, 250, BASE).run().await;

        assert_eq!(report.submitted, 4);
        assert_eq!(report.completed, 4);
        assert_eq!(report.records.len(), 1000);
        let ranks: HashSet<&str> = report.records.iter().map(|r| r.rank.as_str()).collect();
        assert_eq!(ranks.len(), 1000);
        assert_eq!(factory.opened.load(Ordering::SeqCst), 4);
        assert_eq!(factory.tally.closed.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_one_failed_task_does_not_sink_the_rest() {
        let factory = Arc::new(FakeFactory::new(spec(Some("page=3"))));
        let report = orchestrator(factory.clone(), 1000, 5, 250, BASE).run().await;

        assert_eq!(report.submitted, 4);
        assert_eq!(report.completed, 3);
        assert_eq!(report.failed, 1);
        assert_eq!(report.records.len(), 750);
        // page 3 covers ranks 501..=750
        assert!(report.records.iter().all(|r| {
            let rank: usize = r.rank.parse().unwrap();
            !(501..=750).contains(&rank)
        }));
        // the crashed session is still released
        assert_eq!(factory.tally.closed.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_single_worker_still_finishes() {
        let factory = Arc::new(FakeFactory::new(spec(None)));
        let report = orchestrator(factory.clone(), 500, 1, 250, BASE).run().await;
        assert_eq!(report.completed, 2);
        assert_eq!(report.records.len(), 500);
        assert_eq!(factory.tally.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_live_sessions_never_exceed_workers() {
        let factory = Arc::new(FakeFactory::new(FakeSpec {
            goto_delay: Duration::from_millis(20),
            ..flat_spec()
        }));
        let report = orchestrator(factory.clone(), 200, 5, 10, BASE).run().await;

        assert_eq!(report.submitted, 20);
        assert_eq!(report.completed, 20);
        let peak = factory.tally.peak.load(Ordering::SeqCst);
        assert!(peak <= 5, "peak {peak} live sessions");
        assert!(peak > 1, "tasks never overlapped");
        assert_eq!(factory.tally.live.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rows_merge_in_completion_order() {
        let factory = Arc::new(FakeFactory::new(FakeSpec {
            slow_on: Some(("page=1", Duration::from_millis(150))),
            ..flat_spec()
        }));
        let report = orchestrator(factory, 30, 3, 10, BASE).run().await;

        assert_eq!(report.records.len(), 30);
        let ranks: Vec<usize> = report.records.iter().map(|r| r.rank.parse().unwrap()).collect();
        // page 1 was submitted first but finished last
        assert!(ranks[..20].iter().all(|&r| r > 10));
        assert_eq!(ranks[20..].to_vec(), (1..=10).collect::<Vec<usize>>());
    }

    const ONE_ROW: &str = r#"<table data-view-component="true"><thead><tr><th>#</th><th>Coin</th><th>Price</th></tr></thead><tbody data-more-content-target="content"><tr data-view-component="true"><td>1</td><td><a href="/en/coins/bitcoin">Bitcoin</a> <small>btc</small></td><td>$67,000</td></tr></tbody></table>"#;

    #[tokio::test]
    async fn test_rate_limited_task_retries_same_page() {
        let server = MockServer::start().await;
        Mock::given(path("/all"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(path("/all"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ONE_ROW))
            .mount(&server)
            .await;

        let factory = Arc::new(DocumentFactory { timeout: Duration::from_secs(5) });
        let report = orchestrator(factory, 1, 1, 1, &format!("{}/all", server.uri())).run().await;

        assert_eq!(report.completed, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].name, "Bitcoin");
        assert_eq!(report.records[0].symbol, "BTC");
    }

    #[tokio::test]
    async fn test_rate_limit_retries_are_bounded() {
        let server = MockServer::start().await;
        // first attempt plus two retries
        Mock::given(path("/all"))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&server)
            .await;

        let factory = Arc::new(DocumentFactory { timeout: Duration::from_secs(5) });
        let report = orchestrator(factory, 1, 1, 1, &format!("{}/all", server.uri())).run().await;

        assert_eq!(report.completed, 0);
        assert_eq!(report.failed, 1);
        assert!(report.records.is_empty());
    }
}
