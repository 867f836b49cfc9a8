use marketlens_core::market::catalog;

const DEFAULT_MAX_SYMBOLS: usize = 50;

#[derive(Debug, Clone)]
pub struct WatchlistOptions {
    /// Upper bound on symbols per run; each one costs a market fetch plus one LLM call per article.
    pub max_symbols: usize,
}

impl Default for WatchlistOptions {
    fn default() -> Self {
        Self {
            max_symbols: DEFAULT_MAX_SYMBOLS,
        }
    }
}

impl WatchlistOptions {
    pub fn from_env() -> Self {
        let mut out = Self::default();

        if let Ok(s) = std::env::var("WATCHLIST_MAX_SYMBOLS") {
            if let Ok(n) = s.parse::<usize>() {
                out.max_symbols = n;
            }
        }

        out
    }
}

/// Merges `--symbol` flags with the comma-separated `WATCHLIST` value. Names resolve to tickers,
/// duplicates are dropped and first-seen order is kept.
pub fn build_watchlist(
    cli_symbols: &[String],
    env_watchlist: Option<&str>,
    opts: &WatchlistOptions,
) -> anyhow::Result<Vec<String>> {
    anyhow::ensure!(opts.max_symbols >= 1, "WATCHLIST_MAX_SYMBOLS must be >= 1");

    let from_env = env_watchlist.into_iter().flat_map(|s| s.split(','));
    let mut out: Vec<String> = Vec::new();
    for raw in cli_symbols.iter().map(String::as_str).chain(from_env) {
        if raw.trim().is_empty() {
            continue;
        }
        let symbol = catalog::resolve_symbol(raw);
        if !out.contains(&symbol) {
            out.push(symbol);
        }
    }

    anyhow::ensure!(
        !out.is_empty(),
        "no symbols to analyze: pass --symbol or set WATCHLIST"
    );
    anyhow::ensure!(
        out.len() <= opts.max_symbols,
        "watchlist has {} symbols; the limit is {}",
        out.len(),
        opts.max_symbols
    );

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_dedups_and_uppercases() {
        let cli = vec!["aapl".to_string(), " btc ".to_string()];
        let out = build_watchlist(&cli, Some("ETH, AAPL,,bitcoin"), &WatchlistOptions::default())
            .unwrap();
        assert_eq!(out, vec!["AAPL", "BTC", "ETH"]);
    }

    #[test]
    fn empty_watchlist_is_an_error() {
        assert!(build_watchlist(&[], None, &WatchlistOptions::default()).is_err());
        assert!(build_watchlist(&[], Some(" , "), &WatchlistOptions::default()).is_err());
    }

    #[test]
    fn enforces_max_symbols() {
        let opts = WatchlistOptions { max_symbols: 2 };
        assert!(build_watchlist(&[], Some("A,B,C"), &opts).is_err());
        assert_eq!(build_watchlist(&[], Some("A,B,A"), &opts).unwrap().len(), 2);
    }
}
