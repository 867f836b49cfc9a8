use crate::config::Settings;
use crate::domain::insights::SocialMetrics;
use crate::domain::records::TimeRange;
use crate::news::{filter_by_time_range, NewsProvider, RawNewsArticle, SocialPlatformStats};
use crate::retry;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 20;
const DEFAULT_RETRIES: u32 = 3;
const ARTICLES_PATH: &str = "/v1/news";
const SOCIAL_PATH: &str = "/v1/social";
const DEFAULT_LIMIT: u32 = 20;
const DEEP_SEARCH_LIMIT: u32 = 50;

#[derive(Debug, Clone)]
pub struct HttpNewsProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    retries: u32,
}

impl HttpNewsProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_news_provider_base_url()?.to_string();
        let api_key = settings
            .news_provider_api_key
            .clone()
            .filter(|s| !s.trim().is_empty());

        let timeout_secs = std::env::var("NEWS_PROVIDER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = retry::attempts_from_env("NEWS_PROVIDER_RETRIES", DEFAULT_RETRIES);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build news provider http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            retries,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }

    async fn get_once(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let res = self
            .http
            .get(self.url(path))
            .headers(self.headers()?)
            .query(query)
            .send()
            .await
            .context("news provider request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read news provider response")?;
        let raw_json = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("news provider response is not valid JSON: {text}"))?;

        if !status.is_success() {
            anyhow::bail!("news provider HTTP {status}: {raw_json}");
        }
        Ok(raw_json)
    }

    async fn get_with_retries(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.get_once(path, query).await {
                Ok(v) => return Ok(v),
                Err(err) if attempt < self.retries => {
                    let backoff = retry::backoff(attempt);
                    tracing::warn!(attempt, ?backoff, path, error = %err, "news provider fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[async_trait::async_trait]
impl NewsProvider for HttpNewsProvider {
    fn provider_name(&self) -> &'static str {
        "external_news_json"
    }

    async fn fetch_articles(
        &self,
        symbol: &str,
        time_range: TimeRange,
        deep_search: bool,
    ) -> Result<Vec<RawNewsArticle>> {
        let now = Utc::now();
        let limit = if deep_search {
            DEEP_SEARCH_LIMIT
        } else {
            DEFAULT_LIMIT
        };
        let query = [
            ("symbol", symbol.to_string()),
            ("from", time_range.cutoff(now).to_rfc3339()),
            ("limit", limit.to_string()),
        ];

        let raw = self.get_with_retries(ARTICLES_PATH, &query).await?;
        let articles = parse_articles(raw)?;
        let mut kept = filter_by_time_range(articles, time_range, now);
        kept.truncate(limit as usize);

        tracing::debug!(%symbol, count = kept.len(), deep_search, "news articles fetched");
        Ok(kept)
    }

    async fn fetch_social(&self, symbol: &str) -> Result<Option<SocialMetrics>> {
        let raw = self
            .get_with_retries(SOCIAL_PATH, &[("symbol", symbol.to_string())])
            .await?;
        let stats = parse_social(raw)?;
        if stats.is_empty() {
            return Ok(None);
        }
        Ok(Some(SocialMetrics::from_platforms(&stats)))
    }
}

#[derive(Debug, Deserialize)]
struct ArticlesResponse {
    #[serde(default)]
    articles: Vec<FeedArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedSource {
    Name(String),
    Object { name: Option<String> },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedArticle {
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    source: Option<FeedSource>,
    #[serde(alias = "published_at")]
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    language: Option<String>,
}

fn parse_articles(raw: Value) -> Result<Vec<RawNewsArticle>> {
    let resp = serde_json::from_value::<ArticlesResponse>(raw)
        .context("failed to parse news provider articles response")?;

    let mut out = Vec::with_capacity(resp.articles.len());
    for a in resp.articles {
        let title = a.title.map(|t| t.trim().to_string()).unwrap_or_default();
        // Untitled or undated entries cannot be scored or range-filtered.
        let Some(published_at) = a.published_at.filter(|_| !title.is_empty()) else {
            continue;
        };
        let source = match a.source {
            Some(FeedSource::Name(n)) => Some(n),
            Some(FeedSource::Object { name }) => name,
            None => None,
        }
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "unknown".to_string());

        out.push(RawNewsArticle {
            title,
            content: a.content.or(a.description).unwrap_or_default(),
            url: a.url.filter(|u| !u.trim().is_empty()),
            source,
            published_at,
            language: a.language.filter(|l| !l.trim().is_empty()),
        });
    }
    Ok(out)
}

#[derive(Debug, Deserialize)]
struct SocialResponse {
    #[serde(default)]
    platforms: Vec<SocialPlatformStats>,
}

fn parse_social(raw: Value) -> Result<Vec<SocialPlatformStats>> {
    let resp = serde_json::from_value::<SocialResponse>(raw)
        .context("failed to parse news provider social response")?;
    Ok(resp.platforms)
}
