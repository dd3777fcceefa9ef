// Script-rendered listing: one page per session, expanded through load-more clicks.

use async_trait::async_trait;
use url::Url;

use super::table::TableLayout;
use super::PageFetcher;
use crate::config::ExpandSettings;
use crate::error::{FetchError, SourceResult};
use crate::market_data::header::HeaderMap;
use crate::market_data::session::{wait_for_rows, BrowserSession, Locator};
use crate::market_data::types::{FetchResult, PageOutcome};

pub const LAYOUT: TableLayout = TableLayout {
    header_cells: r#"table[data-view-component="true"] thead th"#,
    rows: r#"tbody[data-more-content-target="content"] tr[data-view-component="true"]"#,
    symbol: &["small", "span[class*='coin-item-symbol']"],
};

/// Expansion controls, most specific first.
pub const LOAD_MORE: [Locator; 4] = [
    Locator::XPath(
        "//button[contains(translate(.,'ABCDEFGHIJKLMNOPQRSTUVWXYZ','abcdefghijklmnopqrstuvwxyz'),'show more')]",
    ),
    Locator::Css("button[data-action*='more-content#load']"),
    Locator::XPath(
        "//a[contains(translate(.,'ABCDEFGHIJKLMNOPQRSTUVWXYZ','abcdefghijklmnopqrstuvwxyz'),'show more')]",
    ),
    Locator::Css("a[data-action*='more-content#load']"),
];

/// `base?page=N`, keeping any query the base already has.
pub fn page_url(base: &str, page: u32) -> SourceResult<String> {
    let mut url = Url::parse(base).map_err(|e| FetchError::Malformed(format!("base url {base}: {e}")))?;
    url.query_pairs_mut().append_pair("page", &page.to_string());
    Ok(url.into())
}

pub struct DynamicHtmlFetcher<S> {
    session: S,
    base_url: String,
    rows_per_page: usize,
    expand: ExpandSettings,
    // read once per session; header text is stable across expansions
    headers: Option<HeaderMap>,
}

impl<S: BrowserSession> DynamicHtmlFetcher<S> {
    pub fn new(session: S, base_url: &str, rows_per_page: usize, expand: &ExpandSettings) -> Self {
        Self {
            session,
            base_url: base_url.to_string(),
            rows_per_page,
            expand: expand.clone(),
            headers: None,
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    async fn count_rows(&self) -> SourceResult<usize> {
        self.session.count(LAYOUT.rows).await
    }

    /// Click the first control that is present. `false` when none is.
    async fn click_load_more(&self) -> SourceResult<bool> {
        for locator in &LOAD_MORE {
            if !self.session.exists(locator).await? {
                continue;
            }
            if let Err(e) = self.session.click(locator).await {
                tracing::debug!(?locator, error = %e, "native click refused, forcing");
                self.session.force_click(locator).await?;
            }
            return Ok(true);
        }
        Ok(false)
    }

    async fn expand_to(&self, wanted: usize) -> SourceResult<usize> {
        let mut prev = None;
        for attempt in 0..self.expand.max_attempts {
            let current = self.count_rows().await?;
            if current >= wanted || prev == Some(current) {
                return Ok(current);
            }
            if !self.click_load_more().await? {
                tracing::debug!(rows = current, "load-more control gone");
                return Ok(current);
            }
            match wait_for_rows(&self.session, LAYOUT.rows, current, self.expand.row_wait(), self.expand.poll()).await {
                Ok(_) => {}
                Err(e @ FetchError::Timeout { .. }) => {
                    tracing::warn!(attempt, rows = current, error = %e, "rows stopped growing");
                    return self.count_rows().await;
                }
                Err(e) => return Err(e),
            }
            tokio::time::sleep(self.expand.settle()).await;
            prev = Some(current);
        }
        tracing::warn!(attempts = self.expand.max_attempts, "expansion attempt budget exhausted");
        self.count_rows().await
    }

    pub async fn load_page(&mut self, page: u32) -> SourceResult<FetchResult> {
        let url = page_url(&self.base_url, page)?;
        self.session.goto(&url).await?;
        wait_for_rows(&self.session, LAYOUT.rows, 0, self.expand.initial_wait(), self.expand.poll()).await?;
        tokio::time::sleep(self.expand.settle()).await;

        if self.headers.is_none() {
            let html = self.session.html().await?;
            self.headers = Some(LAYOUT.read_headers(&html)?);
        }

        let observed_rows = self.expand_to(self.rows_per_page).await?;
        let html = self.session.html().await?;
        let headers = self.headers.clone().unwrap_or_default();
        let records = LAYOUT.extract(&html, &headers)?;

        tracing::info!(page, rows = records.len(), observed_rows, "browser page extracted");
        Ok(FetchResult { records, observed_rows })
    }

    pub async fn close(&mut self) -> SourceResult<()> {
        self.session.close().await
    }
}

#[async_trait]
impl<S: BrowserSession> PageFetcher for DynamicHtmlFetcher<S> {
    async fn fetch(&mut self, page: u32) -> PageOutcome {
        match self.load_page(page).await {
            Ok(result) => PageOutcome::Rows(result),
            Err(e) => PageOutcome::from_error(e),
        }
    }
}
