pub mod catalog;
pub mod http;
pub mod indicators;

use crate::domain::records::AssetClass;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub volume: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_24h: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_24h: Option<f64>,
}

/// One daily bar; only what the indicators need.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub asset_class: AssetClass,
    pub quote: MarketData,
    /// Oldest first. Empty when only a reference quote was available.
    pub bars: Vec<PriceBar>,
}

#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// `Ok(None)` means the provider does not know the symbol for this asset class.
    async fn fetch_market(
        &self,
        symbol: &str,
        asset_class: AssetClass,
    ) -> anyhow::Result<Option<MarketSnapshot>>;
}
