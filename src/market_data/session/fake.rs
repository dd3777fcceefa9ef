// In-memory stand-in for a browser: renders a listing table that grows
// when its "load more" control is clicked.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::document::count_matches;
use super::{BrowserSession, Locator, SessionFactory};
use crate::error::{FetchError, SourceResult};

pub(crate) const HEADERS: [&str; 10] = [
    "", "#", "Coin", "Price", "1h", "24h", "7d", "30d", "Volume (24h)", "Market Cap",
];

#[derive(Debug, Clone)]
pub(crate) struct FakeSpec {
    pub initial: usize,
    pub step: usize,
    pub cap: usize,
    pub control: Option<Locator>,
    pub native_click_fails: bool,
    pub symbol_in_span: bool,
    pub fail_on: Option<&'static str>,
    /// Navigation latency for every page.
    pub goto_delay: Duration,
    /// Extra latency for urls containing the marker.
    pub slow_on: Option<(&'static str, Duration)>,
}

/// Open/close bookkeeping shared by every session a factory hands out.
#[derive(Debug, Default)]
pub(crate) struct SessionTally {
    pub closed: AtomicUsize,
    pub live: AtomicUsize,
    pub peak: AtomicUsize,
}

impl SessionTally {
    fn opened(&self) {
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(live, Ordering::SeqCst);
    }

    fn released(&self) {
        // sessions built without a factory were never counted as live
        let _ = self.live.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) struct FakeSession {
    spec: FakeSpec,
    rows: AtomicUsize,
    offset: usize,
    pub clicks: AtomicUsize,
    pub forced: AtomicUsize,
    tally: Arc<SessionTally>,
    is_closed: bool,
}

impl FakeSession {
    /// Static table with `rows` rows and no control.
    pub fn new(rows: usize) -> Self {
        Self::from_spec(
            FakeSpec {
                initial: rows,
                step: 0,
                cap: rows,
                control: None,
                native_click_fails: false,
                symbol_in_span: false,
                fail_on: None,
                goto_delay: Duration::ZERO,
                slow_on: None,
            },
            Arc::new(SessionTally::default()),
        )
    }

    pub fn from_spec(spec: FakeSpec, tally: Arc<SessionTally>) -> Self {
        Self {
            rows: AtomicUsize::new(spec.initial),
            spec,
            offset: 0,
            clicks: AtomicUsize::new(0),
            forced: AtomicUsize::new(0),
            tally,
            is_closed: false,
        }
    }

    pub fn growing(mut self, step: usize, cap: usize, control: Locator) -> Self {
        self.spec.step = step;
        self.spec.cap = cap;
        self.spec.control = Some(control);
        self
    }

    pub fn native_click_fails(mut self) -> Self {
        self.spec.native_click_fails = true;
        self
    }

    pub fn symbol_in_span(mut self) -> Self {
        self.spec.symbol_in_span = true;
        self
    }

    pub fn rows(&self) -> usize {
        self.rows.load(Ordering::SeqCst)
    }

    fn grow(&self) {
        let next = (self.rows() + self.spec.step).min(self.spec.cap);
        self.rows.store(next, Ordering::SeqCst);
    }

    fn control_present(&self, locator: &Locator) -> bool {
        self.spec.control.as_ref() == Some(locator) && self.rows() < self.spec.cap
    }

    pub fn render(&self) -> String {
        let mut html = String::from(r#"<html><body><table data-view-component="true"><thead><tr>"#);
        for h in HEADERS {
            let _ = write!(html, "<th>{h}</th>");
        }
        html.push_str(r#"</tr></thead><tbody data-more-content-target="content">"#);
        for i in 0..self.rows() {
            let rank = self.offset + i + 1;
            let symbol = if self.spec.symbol_in_span {
                format!(r#"<span class="tw coin-item-symbol">c{rank}</span>"#)
            } else {
                format!("<small>c{rank}</small>")
            };
            let _ = write!(
                html,
                r#"<tr data-view-component="true"><td></td><td>{rank}</td><td><a href="/en/coins/coin-{rank}">Coin {rank}</a> {symbol}</td><td>${rank}.50</td><td>0.1%</td><td>-1.2%</td><td>3.4%</td><td>5.6%</td><td>${rank},000</td><td>${rank},000,000</td></tr>"#
            );
        }
        html.push_str("</tbody></table>");
        if self.spec.control.is_some() && self.rows() < self.spec.cap {
            html.push_str(r#"<button data-action="click->more-content#load">Show More</button>"#);
        }
        html.push_str("</body></html>");
        html
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn goto(&mut self, url: &str) -> SourceResult<()> {
        if let Some(marker) = self.spec.fail_on {
            if url.contains(marker) {
                return Err(FetchError::Browser("session crashed".into()));
            }
        }
        let mut delay = self.spec.goto_delay;
        if let Some((marker, extra)) = self.spec.slow_on {
            if url.contains(marker) {
                delay += extra;
            }
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let page = url
            .split("page=")
            .nth(1)
            .and_then(|p| p.split('&').next())
            .and_then(|p| p.parse::<usize>().ok())
            .unwrap_or(1);
        self.offset = (page - 1) * self.spec.cap;
        self.rows.store(self.spec.initial, Ordering::SeqCst);
        Ok(())
    }

    async fn count(&self, css: &str) -> SourceResult<usize> {
        count_matches(&self.render(), css)
    }

    async fn exists(&self, locator: &Locator) -> SourceResult<bool> {
        Ok(self.control_present(locator))
    }

    async fn click(&self, locator: &Locator) -> SourceResult<()> {
        if !self.control_present(locator) {
            return Err(FetchError::Browser("no element".into()));
        }
        if self.spec.native_click_fails {
            return Err(FetchError::Browser("element click intercepted".into()));
        }
        self.clicks.fetch_add(1, Ordering::SeqCst);
        self.grow();
        Ok(())
    }

    async fn force_click(&self, locator: &Locator) -> SourceResult<()> {
        if !self.control_present(locator) {
            return Err(FetchError::Browser("no element".into()));
        }
        self.forced.fetch_add(1, Ordering::SeqCst);
        self.grow();
        Ok(())
    }

    async fn html(&self) -> SourceResult<String> {
        Ok(self.render())
    }

    async fn close(&mut self) -> SourceResult<()> {
        if !self.is_closed {
            self.is_closed = true;
            self.tally.released();
        }
        Ok(())
    }
}

/// Opens [`FakeSession`]s from one [`FakeSpec`] and counts opens/closes.
pub(crate) struct FakeFactory {
    pub spec: FakeSpec,
    pub opened: AtomicUsize,
    pub tally: Arc<SessionTally>,
}

impl FakeFactory {
    pub fn new(spec: FakeSpec) -> Self {
        Self {
            spec,
            opened: AtomicUsize::new(0),
            tally: Arc::new(SessionTally::default()),
        }
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    async fn open(&self) -> SourceResult<Box<dyn BrowserSession>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.tally.opened();
        Ok(Box::new(FakeSession::from_spec(self.spec.clone(), Arc::clone(&self.tally))))
    }
}
