// Server-rendered listing: load one document, expand it with the "show more"
// button until the row budget is met or it stops growing, then extract
// every row in one pass.

use async_trait::async_trait;

use super::table::TableLayout;
use super::PageFetcher;
use crate::config::ExpandSettings;
use crate::error::{FetchError, SourceResult};
use crate::market_data::session::{wait_for_rows, BrowserSession, Locator};
use crate::market_data::types::{FetchResult, PageOutcome, Target};

pub const LAYOUT: TableLayout = TableLayout {
    header_cells: "table thead th",
    rows: "table tbody tr",
    symbol: &["small"],
};

pub const SHOW_MORE: Locator = Locator::XPath(
    "//button[contains(translate(.,'ABCDEFGHIJKLMNOPQRSTUVWXYZ','abcdefghijklmnopqrstuvwxyz'),'show more')]",
);

pub struct StaticHtmlFetcher<S> {
    session: S,
    target: Target,
    expand: ExpandSettings,
    loaded: bool,
}

impl<S: BrowserSession> StaticHtmlFetcher<S> {
    pub fn new(session: S, target: &Target, expand: &ExpandSettings) -> Self {
        Self {
            session,
            target: target.clone(),
            expand: expand.clone(),
            loaded: false,
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    /// Click "show more" until the target is met, a click adds nothing, or
    /// the button is gone. Returns the final row count.
    async fn expand_all(&self) -> SourceResult<usize> {
        let mut prev = None;
        loop {
            let count = self.session.count(LAYOUT.rows).await?;
            if count >= self.target.target_rows || prev == Some(count) {
                return Ok(count);
            }
            if !self.session.exists(&SHOW_MORE).await? {
                tracing::debug!(rows = count, "no show-more control");
                return Ok(count);
            }
            if let Err(e) = self.session.click(&SHOW_MORE).await {
                tracing::debug!(error = %e, rows = count, "show-more click failed");
                return Ok(count);
            }
            // A timeout just means this click added nothing; the next pass
            // sees the unchanged count and stops.
            match wait_for_rows(
                &self.session,
                LAYOUT.rows,
                count,
                self.expand.row_wait(),
                self.expand.poll(),
            )
            .await
            {
                Ok(_) | Err(FetchError::Timeout { .. }) => {}
                Err(e) => return Err(e),
            }
            prev = Some(count);
        }
    }

    pub async fn load(&mut self) -> SourceResult<FetchResult> {
        self.session.goto(&self.target.base_url).await?;
        wait_for_rows(&self.session, LAYOUT.rows, 0, self.expand.initial_wait(), self.expand.poll()).await?;

        let observed_rows = self.expand_all().await?;
        let html = self.session.html().await?;
        let headers = LAYOUT.read_headers(&html)?;
        if headers.is_empty() {
            tracing::warn!("listing header not recognised, fields will be empty");
        }
        let records = LAYOUT.extract(&html, &headers)?;
        tracing::info!(rows = records.len(), observed_rows, "static listing extracted");
        Ok(FetchResult { records, observed_rows })
    }

    pub async fn close(&mut self) -> SourceResult<()> {
        self.session.close().await
    }
}

#[async_trait]
impl<S: BrowserSession> PageFetcher for StaticHtmlFetcher<S> {
    /// The whole listing is one document: page 1 yields everything.
    async fn fetch(&mut self, page: u32) -> PageOutcome {
        if page > 1 || self.loaded {
            return PageOutcome::Exhausted;
        }
        match self.load().await {
            Ok(result) => {
                self.loaded = true;
                PageOutcome::Rows(result)
            }
            Err(e) => PageOutcome::from_error(e),
        }
    }
}
