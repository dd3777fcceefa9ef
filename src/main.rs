use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use coinsnap_rs::config::RunConfig;
use coinsnap_rs::market_data::adapters::coingecko::CoinGeckoApi;
use coinsnap_rs::market_data::adapters::static_html::StaticHtmlFetcher;
use coinsnap_rs::market_data::dataset::Dataset;
use coinsnap_rs::market_data::orchestrator::Orchestrator;
use coinsnap_rs::market_data::pagination::PaginationController;
use coinsnap_rs::market_data::session::chromium::ChromiumLauncher;
use coinsnap_rs::market_data::session::document::{DocumentFactory, DocumentSession};
use coinsnap_rs::market_data::session::{BrowserSession, SessionFactory};
use coinsnap_rs::market_data::types::CanonicalRecord;
use coinsnap_rs::telemetry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Source {
    /// Paged JSON markets endpoint.
    Api,
    /// One listing document expanded in place.
    Html,
    /// Concurrent browser sessions, one per page.
    Browser,
}

#[derive(Debug, Parser)]
#[command(name = "coinsnap", version, about = "Snapshot the crypto market listing into a CSV file")]
struct Args {
    #[arg(long, value_enum, default_value_t = Source::Api)]
    source: Source,

    /// Row budget for the run.
    #[arg(long)]
    rows: Option<usize>,

    #[arg(long)]
    max_pages: Option<u32>,

    #[arg(long)]
    workers: Option<usize>,

    #[arg(long)]
    page_size: Option<usize>,

    #[arg(long, short)]
    output: Option<PathBuf>,

    /// TOML file layered over the defaults; env vars still win.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fetch server-rendered markup over plain HTTP instead of launching Chromium.
    #[arg(long)]
    no_browser: bool,

    #[arg(long, default_value_t = 9000)]
    metrics_port: u16,
}

impl Args {
    fn apply(&self, cfg: &mut RunConfig) {
        if let Some(rows) = self.rows {
            cfg.target_rows = rows;
        }
        if let Some(max_pages) = self.max_pages {
            cfg.paging.max_pages = max_pages;
        }
        if let Some(workers) = self.workers {
            cfg.pool.workers = workers;
        }
        if let Some(page_size) = self.page_size {
            cfg.pool.page_size = page_size;
        }
        if let Some(output) = &self.output {
            cfg.output = output.clone();
        }
        if self.no_browser {
            cfg.browser.enabled = false;
        }
    }
}

async fn from_api(cfg: &RunConfig) -> anyhow::Result<Vec<CanonicalRecord>> {
    let mut api = CoinGeckoApi::new(&cfg.api)?;
    let report = PaginationController::new(&cfg.paging, cfg.target_rows)
        .run(&mut api)
        .await;
    Ok(report.records)
}

async fn from_listing(cfg: &RunConfig) -> anyhow::Result<Vec<CanonicalRecord>> {
    let session: Box<dyn BrowserSession> = if cfg.browser.enabled {
        let launcher = ChromiumLauncher::new(&cfg.browser, cfg.expand.nav_timeout());
        Box::new(launcher.launch().await?)
    } else {
        Box::new(DocumentSession::new(Duration::from_secs(cfg.api.timeout_secs))?)
    };

    let mut fetcher = StaticHtmlFetcher::new(session, &cfg.target(), &cfg.expand);
    let report = PaginationController::new(&cfg.paging, cfg.target_rows)
        .run(&mut fetcher)
        .await;
    if let Err(e) = fetcher.close().await {
        tracing::warn!(error = %e, "session close failed");
    }
    Ok(report.records)
}

async fn from_browsers(cfg: &RunConfig) -> Vec<CanonicalRecord> {
    let factory: Arc<dyn SessionFactory> = if cfg.browser.enabled {
        Arc::new(ChromiumLauncher::new(&cfg.browser, cfg.expand.nav_timeout()))
    } else {
        Arc::new(DocumentFactory { timeout: Duration::from_secs(cfg.api.timeout_secs) })
    };
    Orchestrator::new(factory, &cfg.target(), &cfg.pool, &cfg.expand, &cfg.paging)
        .run()
        .await
        .records
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    telemetry::init_tracing("info,chromiumoxide=warn");
    telemetry::init_metrics(args.metrics_port)?;

    let mut cfg = RunConfig::load(args.config.as_deref())?;
    args.apply(&mut cfg);
    tracing::info!(source = ?args.source, target_rows = cfg.target_rows, output = %cfg.output.display(), "starting run");

    let target = cfg.target();
    let acquired = match args.source {
        Source::Api => from_api(&cfg).await,
        Source::Html => from_listing(&cfg).await,
        Source::Browser => Ok(from_browsers(&cfg).await),
    };
    // a source that never came up still leaves a header-only file behind
    let records = acquired.unwrap_or_else(|e| {
        tracing::error!(error = %e, "source setup failed, writing empty snapshot");
        Vec::new()
    });

    let mut dataset = Dataset::new(target.columns.clone());
    dataset.append(records);
    dataset.write_csv(&cfg.output)?;

    tracing::info!(rows = dataset.len(), "snapshot complete");
    Ok(())
}
