// CoinGecko JSON API adapter: one /coins/markets page per fetch.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use super::coingecko_types::MarketCoin;
use super::PageFetcher;
use crate::config::ApiSettings;
use crate::error::{FetchError, SourceResult};
use crate::market_data::normaliser::{to_money_string, to_percent_string, to_plain_number_string};
use crate::market_data::types::{CanonicalRecord, FetchResult, PageOutcome};

/// Hard upper bound the source accepts for `per_page`.
pub const MAX_PER_PAGE: u32 = 250;

pub struct CoinGeckoApi {
    client: reqwest::Client,
    settings: ApiSettings,
    // rows received so far, reported as the observed row count
    seen: usize,
}

impl CoinGeckoApi {
    pub fn new(settings: &ApiSettings) -> SourceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(concat!("coinsnap/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, settings: settings.clone(), seen: 0 })
    }

    pub fn per_page(&self) -> u32 {
        self.settings.per_page.clamp(1, MAX_PER_PAGE)
    }

    fn query(&self, page: u32) -> Vec<(&'static str, String)> {
        vec![
            ("vs_currency", self.settings.vs_currency.clone()),
            ("order", self.settings.order.clone()),
            ("per_page", self.per_page().to_string()),
            ("page", page.to_string()),
            ("sparkline", "false".to_string()),
            ("price_change_percentage", self.settings.windows.clone()),
        ]
    }

    /// Map one market object. Field names are fixed by the source schema,
    /// so no header resolution is involved.
    pub fn to_record(coin: &MarketCoin) -> CanonicalRecord {
        let change_24h = coin
            .price_change_percentage_24h_in_currency
            .as_ref()
            .or(coin.price_change_percentage_24h.as_ref());

        CanonicalRecord {
            rank: rank_text(coin.market_cap_rank.as_ref()),
            name: coin.name.clone().unwrap_or_default(),
            symbol: coin.symbol.as_deref().unwrap_or_default().to_uppercase(),
            price: to_money_string(coin.current_price.as_ref()),
            change_1h: to_percent_string(coin.price_change_percentage_1h_in_currency.as_ref()),
            change_24h: to_percent_string(change_24h),
            change_7d: to_percent_string(coin.price_change_percentage_7d_in_currency.as_ref()),
            change_30d: to_percent_string(coin.price_change_percentage_30d_in_currency.as_ref()),
            volume_24h: to_money_string(coin.total_volume.as_ref()),
            circulating_supply: to_plain_number_string(coin.circulating_supply.as_ref()),
            total_supply: to_plain_number_string(coin.total_supply.as_ref()),
            market_cap: to_money_string(coin.market_cap.as_ref()),
        }
    }

    async fn request(&self, page: u32) -> SourceResult<Vec<Value>> {
        let resp = self
            .client
            .get(&self.settings.endpoint)
            .query(&self.query(page))
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: body.chars().take(120).collect(),
            });
        }

        match resp.json::<Value>().await {
            Ok(Value::Array(items)) => Ok(items),
            Ok(other) => Err(FetchError::Malformed(format!(
                "expected a JSON array, got {}",
                json_kind(&other)
            ))),
            Err(e) if e.is_decode() => Err(FetchError::Malformed(e.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}

fn rank_text(v: Option<&Value>) -> String {
    match v {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.trim().to_string(),
        _ => String::new(),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[async_trait]
impl PageFetcher for CoinGeckoApi {
    async fn fetch(&mut self, page: u32) -> PageOutcome {
        let items = match self.request(page).await {
            Ok(items) => items,
            Err(e) => return PageOutcome::from_error(e),
        };
        if items.is_empty() {
            tracing::info!(page, "api returned an empty page");
            return PageOutcome::Exhausted;
        }

        let coins: Vec<MarketCoin> = match serde_json::from_value(Value::Array(items)) {
            Ok(coins) => coins,
            Err(e) => return PageOutcome::Failed(FetchError::Malformed(e.to_string())),
        };
        let records: Vec<CanonicalRecord> = coins.iter().map(Self::to_record).collect();
        self.seen += records.len();

        tracing::info!(page, rows = records.len(), "api page");
        PageOutcome::Rows(FetchResult { records, observed_rows: self.seen })
    }
}
