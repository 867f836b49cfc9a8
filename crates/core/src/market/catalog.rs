use crate::domain::records::{AssetClass, AssetType};
use crate::market::MarketData;

const MAX_SEARCH_RESULTS: usize = 10;

struct ReferenceQuote {
    symbol: &'static str,
    class: AssetClass,
    price: f64,
    change: f64,
    change_percent: f64,
    volume: f64,
    market_cap: f64,
    high_24h: f64,
    low_24h: f64,
}

impl ReferenceQuote {
    fn to_market_data(&self) -> MarketData {
        MarketData {
            symbol: self.symbol.to_string(),
            price: self.price,
            change: self.change,
            change_percent: self.change_percent,
            volume: self.volume,
            market_cap: Some(self.market_cap),
            high_24h: Some(self.high_24h),
            low_24h: Some(self.low_24h),
        }
    }
}

macro_rules! quote {
    ($sym:literal, $class:ident, $price:expr, $chg:expr, $pct:expr, $vol:expr, $cap:expr, $hi:expr, $lo:expr) => {
        ReferenceQuote {
            symbol: $sym,
            class: AssetClass::$class,
            price: $price,
            change: $chg,
            change_percent: $pct,
            volume: $vol,
            market_cap: $cap,
            high_24h: $hi,
            low_24h: $lo,
        }
    };
}

// Last-known quotes served when every live provider is down, and the search universe.
const REFERENCE_QUOTES: &[ReferenceQuote] = &[
    quote!("AAPL", Stock, 175.43, 2.15, 1.24, 52_847_392.0, 2.75e12, 176.80, 172.90),
    quote!("TSLA", Stock, 238.45, -5.32, -2.18, 89_234_567.0, 7.55e11, 245.20, 235.10),
    quote!("MSFT", Stock, 378.92, 4.67, 1.25, 28_934_512.0, 2.81e12, 380.50, 375.20),
    quote!("GOOGL", Stock, 142.56, 1.89, 1.34, 23_456_789.0, 1.8e12, 144.20, 140.80),
    quote!("AMZN", Stock, 154.23, -2.45, -1.56, 34_567_890.0, 1.6e12, 157.80, 152.10),
    quote!("NVDA", Stock, 875.30, 12.45, 1.44, 45_678_901.0, 2.15e12, 880.50, 860.20),
    quote!("META", Stock, 485.20, 8.90, 1.87, 18_765_432.0, 1.25e12, 490.60, 478.40),
    quote!("NFLX", Stock, 485.67, -6.78, -1.38, 8_765_432.0, 2.15e11, 492.80, 482.10),
    quote!("AMD", Stock, 142.80, 3.25, 2.33, 32_165_498.0, 2.3e11, 145.20, 138.90),
    quote!("INTC", Stock, 43.25, -0.85, -1.93, 28_456_789.0, 1.8e11, 44.50, 42.80),
    quote!("BTC", Crypto, 43_567.89, 1_234.56, 2.92, 28_394_756_123.0, 8.5e11, 44_200.0, 42_800.0),
    quote!("ETH", Crypto, 2_345.67, -89.45, -3.67, 15_678_934_567.0, 2.82e11, 2_420.0, 2_330.0),
    quote!("ADA", Crypto, 0.45, 0.023, 5.38, 567_894_123.0, 1.58e10, 0.47, 0.42),
    quote!("SOL", Crypto, 98.45, 4.23, 4.49, 892_341_567.0, 4.35e10, 102.80, 94.20),
    quote!("DOT", Crypto, 6.78, -0.34, -4.78, 234_567_890.0, 8.9e9, 7.20, 6.55),
];

const NAME_TO_SYMBOL: &[(&str, &str)] = &[
    ("APPLE", "AAPL"),
    ("TESLA", "TSLA"),
    ("MICROSOFT", "MSFT"),
    ("GOOGLE", "GOOGL"),
    ("ALPHABET", "GOOGL"),
    ("AMAZON", "AMZN"),
    ("NVIDIA", "NVDA"),
    ("FACEBOOK", "META"),
    ("NETFLIX", "NFLX"),
    ("INTEL", "INTC"),
    ("BITCOIN", "BTC"),
    ("ETHEREUM", "ETH"),
    ("CARDANO", "ADA"),
    ("SOLANA", "SOL"),
    ("POLKADOT", "DOT"),
    ("POLYGON", "MATIC"),
    ("AVALANCHE", "AVAX"),
    ("CHAINLINK", "LINK"),
    ("UNISWAP", "UNI"),
    ("LITECOIN", "LTC"),
    ("DOGECOIN", "DOGE"),
    ("RIPPLE", "XRP"),
];

const COINGECKO_IDS: &[(&str, &str)] = &[
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("ADA", "cardano"),
    ("SOL", "solana"),
    ("DOT", "polkadot"),
    ("MATIC", "matic-network"),
    ("AVAX", "avalanche-2"),
    ("LINK", "chainlink"),
    ("UNI", "uniswap"),
    ("LTC", "litecoin"),
    ("DOGE", "dogecoin"),
    ("XRP", "ripple"),
];

/// Maps a company or coin name to its ticker; anything else is upper-cased and passed through.
pub fn resolve_symbol(input: &str) -> String {
    let upper = input.trim().to_ascii_uppercase();
    NAME_TO_SYMBOL
        .iter()
        .find(|(name, _)| *name == upper)
        .map(|(_, sym)| sym.to_string())
        .unwrap_or(upper)
}

pub fn coingecko_id(symbol: &str) -> Option<&'static str> {
    let symbol = resolve_symbol(symbol);
    COINGECKO_IDS
        .iter()
        .find(|(sym, _)| *sym == symbol)
        .map(|(_, id)| *id)
}

pub fn reference_quote(symbol: &str, asset_class: AssetClass) -> Option<MarketData> {
    let symbol = resolve_symbol(symbol);
    REFERENCE_QUOTES
        .iter()
        .find(|q| q.class == asset_class && q.symbol == symbol)
        .map(ReferenceQuote::to_market_data)
}

pub fn search_assets(query: &str, asset_type: AssetType) -> Vec<String> {
    let needle = query.trim().to_ascii_uppercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut out: Vec<String> = Vec::new();
    for q in REFERENCE_QUOTES.iter().filter(|q| asset_type.includes(q.class)) {
        if q.symbol.contains(&needle) {
            out.push(q.symbol.to_string());
        }
    }
    // Names resolve to tickers already in the universe.
    for (name, sym) in NAME_TO_SYMBOL {
        let known = REFERENCE_QUOTES
            .iter()
            .any(|q| q.symbol == *sym && asset_type.includes(q.class));
        if known && name.contains(&needle) && !out.iter().any(|s| s == sym) {
            out.push(sym.to_string());
        }
    }

    out.truncate(MAX_SEARCH_RESULTS);
    out
}

pub fn assets_under_price(max_price: f64, asset_type: AssetType) -> Vec<MarketData> {
    REFERENCE_QUOTES
        .iter()
        .filter(|q| asset_type.includes(q.class) && q.price <= max_price)
        .map(ReferenceQuote::to_market_data)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_names_case_insensitively() {
        assert_eq!(resolve_symbol("apple"), "AAPL");
        assert_eq!(resolve_symbol(" Bitcoin "), "BTC");
        assert_eq!(resolve_symbol("nvda"), "NVDA");
        assert_eq!(resolve_symbol("unknownco"), "UNKNOWNCO");
    }

    #[test]
    fn reference_quote_respects_asset_class() {
        assert!(reference_quote("AAPL", AssetClass::Stock).is_some());
        assert!(reference_quote("AAPL", AssetClass::Crypto).is_none());
        let eth = reference_quote("ethereum", AssetClass::Crypto).unwrap();
        assert_eq!(eth.symbol, "ETH");
    }

    #[test]
    fn coingecko_ids() {
        assert_eq!(coingecko_id("BTC"), Some("bitcoin"));
        assert_eq!(coingecko_id("avalanche"), Some("avalanche-2"));
        assert_eq!(coingecko_id("AAPL"), None);
    }

    #[test]
    fn search_matches_symbols_and_names() {
        assert_eq!(search_assets("aa", AssetType::All), vec!["AAPL".to_string()]);
        assert_eq!(search_assets("sol", AssetType::Crypto), vec!["SOL".to_string()]);
        assert!(search_assets("sol", AssetType::Stock).is_empty());
        assert!(search_assets("", AssetType::All).is_empty());
        assert!(search_assets("A", AssetType::All).len() <= MAX_SEARCH_RESULTS);
    }

    #[test]
    fn under_price_filters_by_class() {
        let cheap = assets_under_price(10.0, AssetType::All);
        let symbols: Vec<_> = cheap.iter().map(|m| m.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["ADA", "DOT"]);
        assert!(assets_under_price(10.0, AssetType::Stock).is_empty());
        assert_eq!(assets_under_price(50.0, AssetType::Stock).len(), 1);
    }
}
