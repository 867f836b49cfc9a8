use crate::config::Settings;
use crate::domain::records::AssetClass;
use crate::market::catalog;
use crate::retry;
use crate::market::{MarketData, MarketDataProvider, MarketSnapshot, PriceBar};
use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const DEFAULT_YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";
const DEFAULT_COINGECKO_BASE_URL: &str = "https://api.coingecko.com";
const DEFAULT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_RETRIES: u32 = 2;
const HISTORY_DAYS: u32 = 90;
const USER_AGENT: &str = "Mozilla/5.0 (compatible; marketlens/0.1)";

/// Live quotes and daily history: Yahoo's chart API for stocks, CoinGecko for coins. When the
/// live call keeps failing, a built-in reference quote is served without history.
#[derive(Debug, Clone)]
pub struct HttpMarketDataProvider {
    http: reqwest::Client,
    yahoo_base_url: String,
    coingecko_base_url: String,
    retries: u32,
}

impl HttpMarketDataProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout_secs = std::env::var("MARKET_DATA_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = retry::attempts_from_env("MARKET_DATA_RETRIES", DEFAULT_RETRIES);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build market data http client")?;

        Ok(Self {
            http,
            yahoo_base_url: settings
                .yahoo_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_YAHOO_BASE_URL.to_string()),
            coingecko_base_url: settings
                .coingecko_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_COINGECKO_BASE_URL.to_string()),
            retries,
        })
    }

    async fn get_json(&self, url: String, query: &[(&str, String)]) -> Result<Option<Value>> {
        let res = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await
            .with_context(|| format!("market data request failed: {url}"))?;

        let status = res.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let text = res
            .text()
            .await
            .context("failed to read market data response")?;
        if !status.is_success() {
            anyhow::bail!("market data HTTP {status}: {text}");
        }

        let raw = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("market data response is not valid JSON: {text}"))?;
        Ok(Some(raw))
    }

    async fn fetch_once(&self, symbol: &str, asset_class: AssetClass) -> Result<Option<MarketSnapshot>> {
        match asset_class {
            AssetClass::Stock => {
                let url = format!(
                    "{}/v8/finance/chart/{}",
                    self.yahoo_base_url.trim_end_matches('/'),
                    symbol
                );
                let query = [
                    ("range", format!("{HISTORY_DAYS}d")),
                    ("interval", "1d".to_string()),
                ];
                match self.get_json(url, &query).await? {
                    Some(raw) => parse_yahoo_chart(symbol, raw),
                    None => Ok(None),
                }
            }
            AssetClass::Crypto => {
                let Some(coin_id) = catalog::coingecko_id(symbol) else {
                    return Ok(None);
                };
                let url = format!(
                    "{}/api/v3/coins/{}/market_chart",
                    self.coingecko_base_url.trim_end_matches('/'),
                    coin_id
                );
                let query = [
                    ("vs_currency", "usd".to_string()),
                    ("days", HISTORY_DAYS.to_string()),
                    ("interval", "daily".to_string()),
                ];
                match self.get_json(url, &query).await? {
                    Some(raw) => parse_coingecko_chart(symbol, raw),
                    None => Ok(None),
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for HttpMarketDataProvider {
    fn provider_name(&self) -> &'static str {
        "yahoo_coingecko"
    }

    async fn fetch_market(
        &self,
        symbol: &str,
        asset_class: AssetClass,
    ) -> Result<Option<MarketSnapshot>> {
        let symbol = catalog::resolve_symbol(symbol);
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_once(&symbol, asset_class).await {
                Ok(found) => return Ok(found),
                Err(err) => {
                    if attempt >= self.retries {
                        return match catalog::reference_quote(&symbol, asset_class) {
                            Some(quote) => {
                                tracing::warn!(
                                    %symbol,
                                    %asset_class,
                                    error = %err,
                                    "live market data unavailable; serving reference quote"
                                );
                                Ok(Some(MarketSnapshot {
                                    asset_class,
                                    quote,
                                    bars: Vec::new(),
                                }))
                            }
                            None => Err(err),
                        };
                    }
                    let backoff = retry::backoff(attempt);
                    tracing::warn!(attempt, ?backoff, %symbol, error = %err, "market data fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct YahooEnvelope {
    chart: YahooChart,
}

#[derive(Debug, Deserialize)]
struct YahooChart {
    #[serde(default)]
    result: Option<Vec<YahooResult>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YahooResult {
    meta: YahooMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    #[serde(default)]
    indicators: Option<YahooIndicators>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YahooMeta {
    #[serde(default)]
    regular_market_price: Option<f64>,
    #[serde(default)]
    previous_close: Option<f64>,
    #[serde(default)]
    chart_previous_close: Option<f64>,
    #[serde(default)]
    regular_market_volume: Option<f64>,
    #[serde(default)]
    regular_market_day_high: Option<f64>,
    #[serde(default)]
    regular_market_day_low: Option<f64>,
    #[serde(default)]
    market_cap: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct YahooIndicators {
    #[serde(default)]
    quote: Vec<YahooQuoteSeries>,
}

#[derive(Debug, Deserialize)]
struct YahooQuoteSeries {
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

fn parse_yahoo_chart(symbol: &str, raw: Value) -> Result<Option<MarketSnapshot>> {
    let env = serde_json::from_value::<YahooEnvelope>(raw)
        .context("failed to parse Yahoo chart response")?;
    let Some(result) = env.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(None);
    };

    let mut bars = Vec::with_capacity(result.timestamp.len());
    if let Some(series) = result.indicators.and_then(|i| i.quote.into_iter().next()) {
        for (i, ts) in result.timestamp.iter().enumerate() {
            // Yahoo pads halted sessions with nulls; skip them.
            let Some(close) = series.close.get(i).copied().flatten() else {
                continue;
            };
            let volume = series.volume.get(i).copied().flatten().unwrap_or(0.0);
            let Some(timestamp) = Utc.timestamp_opt(*ts, 0).single() else {
                continue;
            };
            bars.push(PriceBar {
                timestamp,
                close,
                volume,
            });
        }
    }

    let meta = result.meta;
    let price = match meta.regular_market_price.or(bars.last().map(|b| b.close)) {
        Some(p) => p,
        None => return Ok(None),
    };
    let previous_close = meta
        .previous_close
        .or(meta.chart_previous_close)
        .or_else(|| bars.iter().rev().nth(1).map(|b| b.close))
        .unwrap_or(price);
    let change = price - previous_close;
    let change_percent = if previous_close != 0.0 {
        change / previous_close * 100.0
    } else {
        0.0
    };

    Ok(Some(MarketSnapshot {
        asset_class: AssetClass::Stock,
        quote: MarketData {
            symbol: symbol.to_string(),
            price,
            change,
            change_percent,
            volume: meta
                .regular_market_volume
                .or(bars.last().map(|b| b.volume))
                .unwrap_or(0.0),
            market_cap: meta.market_cap,
            high_24h: meta.regular_market_day_high.or(Some(price)),
            low_24h: meta.regular_market_day_low.or(Some(price)),
        },
        bars,
    }))
}

#[derive(Debug, Deserialize)]
struct CoinGeckoChart {
    #[serde(default)]
    prices: Vec<(f64, f64)>,
    #[serde(default)]
    market_caps: Vec<(f64, f64)>,
    #[serde(default)]
    total_volumes: Vec<(f64, f64)>,
}

fn parse_coingecko_chart(symbol: &str, raw: Value) -> Result<Option<MarketSnapshot>> {
    let chart = serde_json::from_value::<CoinGeckoChart>(raw)
        .context("failed to parse CoinGecko market_chart response")?;

    let bars: Vec<PriceBar> = chart
        .prices
        .iter()
        .enumerate()
        .filter_map(|(i, (ts_ms, price))| {
            let timestamp: DateTime<Utc> = Utc.timestamp_millis_opt(*ts_ms as i64).single()?;
            let volume = chart.total_volumes.get(i).map(|(_, v)| *v).unwrap_or(0.0);
            Some(PriceBar {
                timestamp,
                close: *price,
                volume,
            })
        })
        .collect();

    let Some(last) = bars.last() else {
        return Ok(None);
    };
    let previous = bars.iter().rev().nth(1).map(|b| b.close).unwrap_or(last.close);
    let change = last.close - previous;
    let change_percent = if previous != 0.0 {
        change / previous * 100.0
    } else {
        0.0
    };

    let quote = MarketData {
        symbol: symbol.to_string(),
        price: last.close,
        change,
        change_percent,
        volume: last.volume,
        market_cap: chart.market_caps.last().map(|(_, c)| *c),
        high_24h: Some(last.close.max(previous)),
        low_24h: Some(last.close.min(previous)),
    };

    Ok(Some(MarketSnapshot {
        asset_class: AssetClass::Crypto,
        quote,
        bars,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_yahoo_chart_and_skips_null_bars() {
        let raw = json!({
            "chart": {
                "result": [{
                    "meta": {
                        "symbol": "AAPL",
                        "regularMarketPrice": 110.0,
                        "chartPreviousClose": 100.0,
                        "regularMarketVolume": 5000,
                        "regularMarketDayHigh": 111.0,
                        "regularMarketDayLow": 108.0
                    },
                    "timestamp": [1767301200, 1767387600, 1767474000],
                    "indicators": {"quote": [{
                        "close": [100.0, null, 110.0],
                        "volume": [4000, null, 5000]
                    }]}
                }],
                "error": null
            }
        });

        let snap = parse_yahoo_chart("AAPL", raw).unwrap().unwrap();
        assert_eq!(snap.asset_class, AssetClass::Stock);
        assert_eq!(snap.bars.len(), 2);
        assert_eq!(snap.quote.price, 110.0);
        assert_eq!(snap.quote.change, 10.0);
        assert_eq!(snap.quote.change_percent, 10.0);
        assert_eq!(snap.quote.volume, 5000.0);
        assert_eq!(snap.quote.high_24h, Some(111.0));
    }

    #[test]
    fn yahoo_without_result_is_none() {
        let raw = json!({"chart": {"result": null, "error": {"code": "Not Found"}}});
        assert!(parse_yahoo_chart("ZZZZ", raw).unwrap().is_none());
    }

    #[test]
    fn parses_coingecko_chart() {
        let raw = json!({
            "prices": [[1767225600000.0, 40000.0], [1767312000000.0, 42000.0]],
            "market_caps": [[1767225600000.0, 8.0e11], [1767312000000.0, 8.4e11]],
            "total_volumes": [[1767225600000.0, 2.0e10], [1767312000000.0, 3.0e10]]
        });

        let snap = parse_coingecko_chart("BTC", raw).unwrap().unwrap();
        assert_eq!(snap.asset_class, AssetClass::Crypto);
        assert_eq!(snap.bars.len(), 2);
        assert_eq!(snap.quote.price, 42000.0);
        assert_eq!(snap.quote.change, 2000.0);
        assert_eq!(snap.quote.change_percent, 5.0);
        assert_eq!(snap.quote.volume, 3.0e10);
        assert_eq!(snap.quote.market_cap, Some(8.4e11));
        assert_eq!(snap.quote.low_24h, Some(40000.0));
    }

    #[test]
    fn empty_coingecko_chart_is_none() {
        let raw = json!({"prices": [], "market_caps": [], "total_volumes": []});
        assert!(parse_coingecko_chart("BTC", raw).unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_coin_is_none_without_network() {
        let settings = crate::config::Settings {
            coingecko_base_url: Some("http://127.0.0.1:9".to_string()),
            ..Default::default()
        };
        let provider = HttpMarketDataProvider::from_settings(&settings).unwrap();
        let out = provider
            .fetch_market("NOTACOIN", AssetClass::Crypto)
            .await
            .unwrap();
        assert!(out.is_none());
    }
}
