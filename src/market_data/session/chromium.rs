// Chromium sessions via chromiumoxide, one process and profile dir each.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tempfile::TempDir;
use tokio::task::JoinHandle;

use super::{BrowserSession, Locator, SessionFactory};
use crate::config::BrowserSettings;
use crate::error::{FetchError, SourceResult};

/// Find a Chrome/Chromium binary: `COINSNAP_CHROME`, then PATH.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("COINSNAP_CHROME") {
        let path = PathBuf::from(p);
        if path.exists() {
            return Some(path);
        }
    }
    ["google-chrome", "chromium", "chromium-browser"]
        .into_iter()
        .find_map(|bin| which::which(bin).ok())
}

fn browser_err(e: impl std::fmt::Display) -> FetchError {
    FetchError::Browser(e.to_string())
}

/// Launches one Chromium per [`SessionFactory::open`] call.
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    executable: Option<PathBuf>,
    headless: bool,
    nav_timeout: Duration,
}

impl ChromiumLauncher {
    pub fn new(settings: &BrowserSettings, nav_timeout: Duration) -> Self {
        Self {
            executable: settings.chrome_path.clone().or_else(find_chromium),
            headless: settings.headless,
            nav_timeout,
        }
    }

    pub async fn launch(&self) -> SourceResult<ChromiumSession> {
        let profile = tempfile::Builder::new()
            .prefix("coinsnap-profile-")
            .tempdir()
            .map_err(browser_err)?;

        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile.path())
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .window_size(1920, 1080);
        if let Some(exe) = &self.executable {
            builder = builder.chrome_executable(exe);
        }
        if !self.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(FetchError::Browser)?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(browser_err)?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(browser_err(e));
            }
        };

        tracing::debug!(profile = %profile.path().display(), "browser session launched");
        Ok(ChromiumSession {
            browser,
            page,
            handler,
            nav_timeout: self.nav_timeout,
            closed: false,
            _profile: profile,
        })
    }
}

#[async_trait]
impl SessionFactory for ChromiumLauncher {
    async fn open(&self) -> SourceResult<Box<dyn BrowserSession>> {
        Ok(Box::new(self.launch().await?))
    }
}

pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    nav_timeout: Duration,
    closed: bool,
    // deleted when the session is dropped
    _profile: TempDir,
}

impl ChromiumSession {
    async fn first(&self, locator: &Locator) -> SourceResult<Element> {
        let found = match locator {
            Locator::Css(css) => self.page.find_elements(*css).await,
            Locator::XPath(xpath) => self.page.find_xpaths(*xpath).await,
        }
        .map_err(browser_err)?;
        found
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::Browser(format!("no element for {locator:?}")))
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn goto(&mut self, url: &str) -> SourceResult<()> {
        match tokio::time::timeout(self.nav_timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(browser_err(e)),
            Err(_) => {
                return Err(FetchError::Timeout {
                    what: format!("navigation to {url}"),
                    waited: self.nav_timeout,
                })
            }
        }
        Ok(())
    }

    async fn count(&self, css: &str) -> SourceResult<usize> {
        let found = self.page.find_elements(css).await.map_err(browser_err)?;
        Ok(found.len())
    }

    async fn exists(&self, locator: &Locator) -> SourceResult<bool> {
        let found = match locator {
            Locator::Css(css) => self.page.find_elements(*css).await,
            Locator::XPath(xpath) => self.page.find_xpaths(*xpath).await,
        };
        // a query that fails is treated as "not there"
        Ok(found.map(|els| !els.is_empty()).unwrap_or(false))
    }

    async fn click(&self, locator: &Locator) -> SourceResult<()> {
        let el = self.first(locator).await?;
        el.scroll_into_view().await.map_err(browser_err)?;
        el.click().await.map_err(browser_err)?;
        Ok(())
    }

    async fn force_click(&self, locator: &Locator) -> SourceResult<()> {
        let el = self.first(locator).await?;
        el.call_js_fn("function() { this.click(); }", false)
            .await
            .map_err(browser_err)?;
        Ok(())
    }

    async fn html(&self) -> SourceResult<String> {
        self.page.content().await.map_err(browser_err)
    }

    async fn close(&mut self) -> SourceResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let _ = self.page.clone().close().await;
        let result = self.browser.close().await.map(|_| ()).map_err(browser_err);
        let _ = self.browser.wait().await;
        self.handler.abort();
        result
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        // Browser's own drop kills the child process if close() never ran.
        self.handler.abort();
    }
}
