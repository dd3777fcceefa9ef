// Browser session abstraction. A session is task-owned and closed by whoever opened it.

pub mod chromium;
pub mod document;
#[cfg(test)]
pub(crate) mod fake;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{FetchError, SourceResult};

/// How to find an element on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator {
    Css(&'static str),
    XPath(&'static str),
}

#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Load `url` and wait for navigation to settle.
    async fn goto(&mut self, url: &str) -> SourceResult<()>;
    /// Number of elements currently matching `css`.
    async fn count(&self, css: &str) -> SourceResult<usize>;
    /// Whether `locator` matches anything right now.
    async fn exists(&self, locator: &Locator) -> SourceResult<bool>;
    /// Scroll the first match into view and click it natively.
    async fn click(&self, locator: &Locator) -> SourceResult<()>;
    /// Click the first match from script, bypassing overlays and hit-testing.
    async fn force_click(&self, locator: &Locator) -> SourceResult<()>;
    /// Current document markup.
    async fn html(&self) -> SourceResult<String>;
    /// Release the underlying resource. Safe to call more than once.
    async fn close(&mut self) -> SourceResult<()>;
}

#[async_trait]
impl<T: BrowserSession + ?Sized> BrowserSession for Box<T> {
    async fn goto(&mut self, url: &str) -> SourceResult<()> {
        (**self).goto(url).await
    }
    async fn count(&self, css: &str) -> SourceResult<usize> {
        (**self).count(css).await
    }
    async fn exists(&self, locator: &Locator) -> SourceResult<bool> {
        (**self).exists(locator).await
    }
    async fn click(&self, locator: &Locator) -> SourceResult<()> {
        (**self).click(locator).await
    }
    async fn force_click(&self, locator: &Locator) -> SourceResult<()> {
        (**self).force_click(locator).await
    }
    async fn html(&self) -> SourceResult<String> {
        (**self).html().await
    }
    async fn close(&mut self) -> SourceResult<()> {
        (**self).close().await
    }
}

/// Opens a fresh session per call.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> SourceResult<Box<dyn BrowserSession>>;
}

/// Wait until more than `above` elements match `css`.
///
/// Polls every `poll` and gives up after `timeout` with
/// [`FetchError::Timeout`].
pub async fn wait_for_rows(
    session: &dyn BrowserSession,
    css: &str,
    above: usize,
    timeout: Duration,
    poll: Duration,
) -> SourceResult<usize> {
    let waiting = async {
        loop {
            let n = session.count(css).await?;
            if n > above {
                return Ok(n);
            }
            tokio::time::sleep(poll).await;
        }
    };

    match tokio::time::timeout(timeout, waiting).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout {
            what: format!("more than {above} rows matching `{css}`"),
            waited: timeout,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeSession;
    use super::*;

    const ROWS: &str = "table tbody tr";

    #[tokio::test]
    async fn test_wait_for_rows_ready() {
        let session = FakeSession::new(10);
        let n = wait_for_rows(&session, ROWS, 0, Duration::from_millis(200), Duration::from_millis(5))
            .await
            .unwrap();
        assert_eq!(n, 10);
    }

    #[tokio::test]
    async fn test_wait_for_rows_times_out() {
        let session = FakeSession::new(10);
        let err = wait_for_rows(&session, ROWS, 10, Duration::from_millis(30), Duration::from_millis(5))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout { .. }));
    }
}
