// Shared trait for page fetchers

use crate::market_data::types::PageOutcome;

#[async_trait::async_trait]
pub trait PageFetcher: Send {
    // One request for `page` (1-based). Must not panic on source errors;
    // they come back as `Transient` or `Failed`.
    async fn fetch(&mut self, page: u32) -> PageOutcome;
}

pub mod coingecko;
pub mod coingecko_types;
pub mod dynamic_html;
pub mod static_html;
pub mod table;
