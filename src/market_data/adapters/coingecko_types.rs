// Source: GET /api/v3/coins/markets (one element of the returned array)
use serde_json::Value;

// Numeric fields stay as raw JSON values: the source sends numbers, nulls and
// occasionally strings, and the normaliser decides how to render each.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct MarketCoin {
    pub market_cap_rank: Option<Value>,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub current_price: Option<Value>,
    pub price_change_percentage_1h_in_currency: Option<Value>,
    pub price_change_percentage_24h_in_currency: Option<Value>,
    pub price_change_percentage_24h: Option<Value>,
    pub price_change_percentage_7d_in_currency: Option<Value>,
    pub price_change_percentage_30d_in_currency: Option<Value>,
    pub total_volume: Option<Value>,
    pub circulating_supply: Option<Value>,
    pub total_supply: Option<Value>,
    pub market_cap: Option<Value>,
    // we ignore the other fields (id, image, ath, roi, ...)
}
