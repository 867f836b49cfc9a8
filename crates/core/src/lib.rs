pub mod domain;
pub mod llm;
pub mod market;
pub mod news;
pub mod report;
pub mod service;
pub mod storage;

pub mod retry {
    use std::time::Duration;

    pub const MAX_ATTEMPTS: u32 = 6;
    const BASE_BACKOFF_MS: u64 = 500;
    const MAX_BACKOFF_MS: u64 = 8_000;

    /// Attempt count from `var`, clamped to `1..=MAX_ATTEMPTS`.
    pub fn attempts_from_env(var: &str, default: u32) -> u32 {
        std::env::var(var)
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(default)
            .clamp(1, MAX_ATTEMPTS)
    }

    /// Delay after failed attempt `attempt` (1-based): 500ms doubling, capped at 8s.
    pub fn backoff(attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        Duration::from_millis((BASE_BACKOFF_MS << shift).min(MAX_BACKOFF_MS))
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn backoff_doubles_then_caps() {
            assert_eq!(backoff(1), Duration::from_millis(500));
            assert_eq!(backoff(2), Duration::from_millis(1_000));
            assert_eq!(backoff(5), Duration::from_millis(8_000));
            assert_eq!(backoff(64), Duration::from_millis(8_000));
            assert_eq!(backoff(u32::MAX), Duration::from_millis(8_000));
        }

        #[test]
        fn attempts_are_clamped() {
            std::env::set_var("MARKETLENS_TEST_RETRIES_HUGE", "4000000000");
            assert_eq!(attempts_from_env("MARKETLENS_TEST_RETRIES_HUGE", 2), MAX_ATTEMPTS);
            std::env::set_var("MARKETLENS_TEST_RETRIES_ZERO", "0");
            assert_eq!(attempts_from_env("MARKETLENS_TEST_RETRIES_ZERO", 2), 1);
            assert_eq!(attempts_from_env("MARKETLENS_TEST_RETRIES_UNSET", 3), 3);
        }
    }
}

pub mod config {
    use anyhow::Context;
    use std::path::PathBuf;

    #[derive(Debug, Clone, Default)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub anthropic_api_key: Option<String>,
        pub sentry_dsn: Option<String>,
        pub news_provider_base_url: Option<String>,
        pub news_provider_api_key: Option<String>,
        pub yahoo_base_url: Option<String>,
        pub coingecko_base_url: Option<String>,
        pub reports_dir: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                news_provider_base_url: std::env::var("NEWS_PROVIDER_BASE_URL").ok(),
                news_provider_api_key: std::env::var("NEWS_PROVIDER_API_KEY").ok(),
                yahoo_base_url: std::env::var("YAHOO_BASE_URL").ok(),
                coingecko_base_url: std::env::var("COINGECKO_BASE_URL").ok(),
                reports_dir: std::env::var("REPORTS_DIR").ok(),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_anthropic_api_key(&self) -> anyhow::Result<&str> {
            self.anthropic_api_key
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .context("ANTHROPIC_API_KEY is required")
        }

        pub fn require_news_provider_base_url(&self) -> anyhow::Result<&str> {
            self.news_provider_base_url
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .context("NEWS_PROVIDER_BASE_URL is required")
        }

        pub fn reports_dir(&self) -> PathBuf {
            self.reports_dir
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("marketlens-reports"))
        }
    }
}
