// Server-rendered HTML over plain HTTP. No script runtime, so in-page
// controls can never be located or clicked.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};

use super::{BrowserSession, Locator, SessionFactory};
use crate::error::{FetchError, SourceResult};

pub(crate) fn count_matches(html: &str, css: &str) -> SourceResult<usize> {
    let selector = Selector::parse(css).map_err(|_| FetchError::Selector(css.to_string()))?;
    Ok(Html::parse_document(html).select(&selector).count())
}

#[derive(Debug, Clone)]
pub struct DocumentSession {
    client: reqwest::Client,
    html: String,
}

impl DocumentSession {
    pub fn new(timeout: Duration) -> SourceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("coinsnap/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, html: String::new() })
    }
}

#[async_trait]
impl BrowserSession for DocumentSession {
    async fn goto(&mut self, url: &str) -> SourceResult<()> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(FetchError::RateLimited);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: body.chars().take(120).collect(),
            });
        }
        self.html = resp.text().await?;
        Ok(())
    }

    async fn count(&self, css: &str) -> SourceResult<usize> {
        count_matches(&self.html, css)
    }

    async fn exists(&self, _locator: &Locator) -> SourceResult<bool> {
        Ok(false)
    }

    async fn click(&self, _locator: &Locator) -> SourceResult<()> {
        Err(FetchError::Unsupported("plain documents cannot run click handlers"))
    }

    async fn force_click(&self, _locator: &Locator) -> SourceResult<()> {
        Err(FetchError::Unsupported("plain documents cannot run click handlers"))
    }

    async fn html(&self) -> SourceResult<String> {
        Ok(self.html.clone())
    }

    async fn close(&mut self) -> SourceResult<()> {
        self.html.clear();
        Ok(())
    }
}

/// Hands out a fresh [`DocumentSession`] per call.
#[derive(Debug, Clone)]
pub struct DocumentFactory {
    pub timeout: Duration,
}

#[async_trait]
impl SessionFactory for DocumentFactory {
    async fn open(&self) -> SourceResult<Box<dyn BrowserSession>> {
        Ok(Box::new(DocumentSession::new(self.timeout)?))
    }
}
