use crate::config::Settings;
use crate::domain::analysis::AnalysisSummary;
use crate::domain::chart::{ChartAnalysisResult, ChartImage};
use crate::domain::contract::SentimentClassification;
use crate::domain::insights::SocialMetrics;
use crate::domain::records::{
    AnalysisRecord, AssetClass, AssetType, ChartAnalysis, NewAnalysisRecord, NewChartAnalysis,
    NewNewsArticle, NewReport, NewSearchQuery, NewsArticle, Report, SearchQuery, TimeRange,
};
use crate::domain::scoring::TechnicalIndicators;
use crate::llm::anthropic::AnthropicClient;
use crate::llm::neutral::NeutralClassifier;
use crate::llm::error::raw_output_preview;
use crate::llm::LlmClient;
use crate::market::http::HttpMarketDataProvider;
use crate::market::{catalog, indicators, MarketData, MarketDataProvider, MarketSnapshot};
use crate::news::http::HttpNewsProvider;
use crate::news::{NewsProvider, RawNewsArticle};
use crate::report::{self, RenderedReport, ReportData};
use crate::storage::Repository;
use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

const SUMMARY_CHARS: usize = 200;
const SYMBOL_NEWS_LIMIT: usize = 10;
const REPORT_NEWS_LIMIT: usize = 20;

/// Failures a caller can act on. Anything else surfaces as a plain `anyhow::Error`.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceError {
    InvalidInput(String),
    AssetNotFound { symbol: String },
    QueryNotFound(i64),
    NoAnalysisResults(i64),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            ServiceError::AssetNotFound { symbol } => write!(
                f,
                "Could not find data for symbol \"{symbol}\". Available symbols include: \
                 AAPL, TSLA, MSFT, GOOGL, NVDA, BTC, ETH, SOL, ADA, DOT and more."
            ),
            ServiceError::QueryNotFound(id) => write!(f, "search query {id} not found"),
            ServiceError::NoAnalysisResults(id) => {
                write!(f, "no analysis results found for query {id}")
            }
        }
    }
}

impl std::error::Error for ServiceError {}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRequest {
    pub symbol: String,
    #[serde(default, alias = "assetType")]
    pub asset_type: AssetType,
    #[serde(default, alias = "priceLimit")]
    pub price_limit: Option<f64>,
    #[serde(default, alias = "deepSearchEnabled")]
    pub deep_search_enabled: bool,
    /// Free-form so that unknown ranges fall back to a week instead of failing the request.
    #[serde(default, alias = "timeRange")]
    pub time_range: Option<String>,
}

impl AnalyzeRequest {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            asset_type: AssetType::All,
            price_limit: None,
            deep_search_enabled: false,
            time_range: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeResponse {
    pub query: SearchQuery,
    pub analysis_result: AnalysisRecord,
    pub asset_class: AssetClass,
    pub market_data: MarketData,
    pub technical_indicators: TechnicalIndicators,
    pub news_articles: Vec<NewsArticle>,
    pub social_metrics: SocialMetrics,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartRequest {
    #[serde(alias = "queryId")]
    pub query_id: i64,
    pub symbol: String,
    #[serde(default, alias = "fileName")]
    pub file_name: Option<String>,
    #[serde(default, alias = "mediaType")]
    pub media_type: Option<String>,
    #[serde(alias = "imageBase64", alias = "chart")]
    pub image_base64: String,
}

#[derive(Debug, Clone)]
pub struct GeneratedReport {
    pub report: Report,
    pub rendered: RenderedReport,
}

pub struct AnalysisService {
    market: Arc<dyn MarketDataProvider>,
    news: Option<Arc<dyn NewsProvider>>,
    llm: Arc<dyn LlmClient>,
    repo: Arc<dyn Repository>,
    reports_dir: PathBuf,
}

impl AnalysisService {
    pub fn new(
        market: Arc<dyn MarketDataProvider>,
        news: Option<Arc<dyn NewsProvider>>,
        llm: Arc<dyn LlmClient>,
        repo: Arc<dyn Repository>,
        reports_dir: PathBuf,
    ) -> Self {
        Self {
            market,
            news,
            llm,
            repo,
            reports_dir,
        }
    }

    /// Wires the HTTP collaborators, degrading to no news and a neutral classifier when their
    /// configuration is missing.
    pub fn from_settings(settings: &Settings, repo: Arc<dyn Repository>) -> anyhow::Result<Self> {
        let market: Arc<dyn MarketDataProvider> =
            Arc::new(HttpMarketDataProvider::from_settings(settings)?);

        let news: Option<Arc<dyn NewsProvider>> = match settings.require_news_provider_base_url() {
            Ok(_) => Some(Arc::new(HttpNewsProvider::from_settings(settings)?)),
            Err(_) => {
                tracing::warn!("NEWS_PROVIDER_BASE_URL not set; analyses will run without news");
                None
            }
        };

        let llm: Arc<dyn LlmClient> = match settings.require_anthropic_api_key() {
            Ok(_) => Arc::new(AnthropicClient::from_settings(settings)?),
            Err(_) => {
                tracing::warn!("ANTHROPIC_API_KEY not set; using neutral classifier");
                Arc::new(NeutralClassifier)
            }
        };

        Ok(Self::new(market, news, llm, repo, settings.reports_dir()))
    }

    pub async fn analyze(&self, req: AnalyzeRequest) -> anyhow::Result<AnalyzeResponse> {
        let raw_symbol = req.symbol.trim().to_string();
        if raw_symbol.is_empty() {
            return Err(ServiceError::InvalidInput("symbol is required".to_string()).into());
        }
        if let Some(limit) = req.price_limit {
            if !limit.is_finite() || limit < 0.0 {
                return Err(ServiceError::InvalidInput(format!(
                    "price_limit must be a non-negative number, got {limit}"
                ))
                .into());
            }
        }
        let time_range = req
            .time_range
            .as_deref()
            .map(TimeRange::parse_or_default)
            .unwrap_or_default();

        let query = self
            .repo
            .create_search_query(NewSearchQuery {
                symbol: raw_symbol.clone(),
                asset_type: req.asset_type,
                price_limit: req.price_limit,
                deep_search_enabled: req.deep_search_enabled,
                time_range,
            })
            .await?;

        let symbol = catalog::resolve_symbol(&raw_symbol);
        let snapshot = self
            .find_market(&symbol, req.asset_type)
            .await
            .ok_or_else(|| ServiceError::AssetNotFound {
                symbol: raw_symbol.clone(),
            })?;
        let technical_indicators = indicators::compute_indicators(&snapshot.bars);

        let raw_news = self
            .fetch_news(&symbol, time_range, req.deep_search_enabled)
            .await;
        let classifications = self.classify_all(&raw_news, &symbol).await;

        let mut news_articles = Vec::with_capacity(raw_news.len());
        for (article, c) in raw_news.iter().zip(&classifications) {
            let stored = self
                .repo
                .create_news_article(new_news_article(&symbol, article, c))
                .await?;
            news_articles.push(stored);
        }

        let social = self.fetch_social(&symbol).await;
        let labels: Vec<_> = classifications.iter().map(|c| c.label).collect();
        let summary = AnalysisSummary::compute(&labels, &technical_indicators, social.as_ref());
        let social_metrics = social.unwrap_or_default();

        let analysis_result = self
            .repo
            .create_analysis(NewAnalysisRecord {
                query_id: query.id,
                symbol: symbol.clone(),
                sentiment_score: summary.composite.sentiment_score,
                technical_indicators,
                news_count: i32::try_from(summary.news_count).unwrap_or(i32::MAX),
                positive_news_percent: summary.breakdown.positive_percent,
                neutral_news_percent: summary.breakdown.neutral_percent,
                negative_news_percent: summary.breakdown.negative_percent,
                price: snapshot.quote.price,
                price_change: snapshot.quote.change_percent,
                social_metrics,
                recommendation: summary.composite.recommendation,
                risk_level: summary.composite.risk_level,
                key_insights: summary.key_insights,
            })
            .await?;

        tracing::info!(
            query_id = query.id,
            %symbol,
            asset_class = %snapshot.asset_class,
            news_count = analysis_result.news_count,
            sentiment_score = analysis_result.sentiment_score,
            recommendation = %analysis_result.recommendation,
            risk_level = %analysis_result.risk_level,
            "analysis complete"
        );

        Ok(AnalyzeResponse {
            query,
            analysis_result,
            asset_class: snapshot.asset_class,
            market_data: snapshot.quote,
            technical_indicators,
            news_articles,
            social_metrics,
        })
    }

    async fn find_market(&self, symbol: &str, asset_type: AssetType) -> Option<MarketSnapshot> {
        for class in asset_type.classes() {
            match self.market.fetch_market(symbol, *class).await {
                Ok(Some(snapshot)) => return Some(snapshot),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(%symbol, asset_class = %class, error = %e, "market data lookup failed");
                }
            }
        }
        None
    }

    async fn fetch_news(
        &self,
        symbol: &str,
        time_range: TimeRange,
        deep_search: bool,
    ) -> Vec<RawNewsArticle> {
        let Some(news) = &self.news else {
            return Vec::new();
        };
        match news.fetch_articles(symbol, time_range, deep_search).await {
            Ok(articles) => articles,
            Err(e) => {
                tracing::warn!(%symbol, error = %e, "news fetch failed; continuing without news");
                Vec::new()
            }
        }
    }

    async fn fetch_social(&self, symbol: &str) -> Option<SocialMetrics> {
        let news = self.news.as_ref()?;
        match news.fetch_social(symbol).await {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(%symbol, error = %e, "social metrics fetch failed");
                None
            }
        }
    }

    /// Classifies every article concurrently. The output lines up with the input; an article
    /// whose classification fails gets the neutral stand-in.
    async fn classify_all(
        &self,
        articles: &[RawNewsArticle],
        symbol: &str,
    ) -> Vec<SentimentClassification> {
        let mut set = tokio::task::JoinSet::new();
        for (idx, article) in articles.iter().enumerate() {
            let llm = Arc::clone(&self.llm);
            let text = article.classification_text();
            let symbol = symbol.to_string();
            set.spawn(async move { (idx, llm.classify_sentiment(&text, &symbol).await) });
        }

        let mut out = vec![SentimentClassification::unavailable(); articles.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, Ok(c))) => out[idx] = c,
                Ok((idx, Err(e))) => {
                    let raw = raw_output_preview(&e);
                    tracing::warn!(%symbol, article = idx, error = %e, raw = ?raw, "sentiment classification failed; using neutral");
                }
                Err(e) => {
                    tracing::warn!(%symbol, error = %e, "sentiment classification task failed");
                }
            }
        }
        out
    }

    pub async fn analyze_chart(&self, req: ChartRequest) -> anyhow::Result<ChartAnalysis> {
        let symbol = req.symbol.trim();
        if symbol.is_empty() {
            return Err(ServiceError::InvalidInput("symbol is required".to_string()).into());
        }
        let image = ChartImage::try_new(req.media_type.as_deref(), &req.image_base64)
            .map_err(|e| ServiceError::InvalidInput(e.to_string()))?;

        if self.repo.get_search_query(req.query_id).await?.is_none() {
            return Err(ServiceError::QueryNotFound(req.query_id).into());
        }

        let symbol = catalog::resolve_symbol(symbol);
        let analysis = match self.llm.analyze_chart(&image, &symbol).await {
            Ok(a) => a,
            Err(e) => {
                let raw = raw_output_preview(&e);
                tracing::warn!(query_id = req.query_id, %symbol, error = %e, raw = ?raw, "chart analysis failed; using fallback");
                ChartAnalysisResult::unavailable()
            }
        };

        let file_name = req
            .file_name
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "chart".to_string());
        let stored = self
            .repo
            .create_chart_analysis(NewChartAnalysis {
                query_id: req.query_id,
                file_name,
                analysis,
            })
            .await?;
        Ok(stored)
    }

    pub async fn generate_report(&self, query_id: i64) -> anyhow::Result<GeneratedReport> {
        let analyses = self.repo.list_analyses_by_query(query_id).await?;
        let Some(analysis_result) = analyses.into_iter().next() else {
            return Err(ServiceError::NoAnalysisResults(query_id).into());
        };

        let news_articles = self
            .repo
            .list_news_by_symbol(&analysis_result.symbol, REPORT_NEWS_LIMIT)
            .await?;
        let chart_analyses = self.repo.list_chart_analyses_by_query(query_id).await?;

        let data = ReportData {
            symbol: analysis_result.symbol.clone(),
            analysis_result,
            news_articles,
            chart_analyses,
            generated_at: Utc::now(),
        };
        let rendered = report::render(&data);

        tokio::fs::create_dir_all(&self.reports_dir)
            .await
            .with_context(|| format!("failed to create {}", self.reports_dir.display()))?;
        let file_path = self.reports_dir.join(&rendered.file_name);
        tokio::fs::write(&file_path, rendered.body.as_bytes())
            .await
            .with_context(|| format!("failed to write report {}", file_path.display()))?;

        let report = self
            .repo
            .create_report(NewReport {
                query_id,
                file_name: rendered.file_name.clone(),
                file_path: file_path.to_string_lossy().into_owned(),
                report_data: serde_json::to_value(&data).context("report data serialize failed")?,
            })
            .await?;

        tracing::info!(query_id, path = %file_path.display(), "report written");
        Ok(GeneratedReport { report, rendered })
    }

    pub fn search_assets(&self, query: &str, asset_type: AssetType) -> anyhow::Result<Vec<String>> {
        if query.trim().is_empty() {
            return Err(ServiceError::InvalidInput("search query is required".to_string()).into());
        }
        Ok(catalog::search_assets(query, asset_type))
    }

    /// Reference-priced assets at or under `max_price`. A non-finite or negative bound matches
    /// nothing.
    pub fn assets_under_price(&self, max_price: f64, asset_type: AssetType) -> Vec<MarketData> {
        if !max_price.is_finite() || max_price < 0.0 {
            return Vec::new();
        }
        catalog::assets_under_price(max_price, asset_type)
    }

    pub async fn translate(&self, text: &str, target_language: &str) -> anyhow::Result<String> {
        if text.trim().is_empty() || target_language.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "text and target language are required".to_string(),
            )
            .into());
        }
        match self.llm.translate(text, target_language.trim()).await {
            Ok(t) => Ok(t),
            Err(e) => {
                tracing::warn!(target_language, error = %e, "translation failed; returning original text");
                Ok(text.to_string())
            }
        }
    }

    pub async fn news_for_symbol(&self, symbol: &str) -> anyhow::Result<Vec<NewsArticle>> {
        let symbol = catalog::resolve_symbol(symbol);
        self.repo
            .list_news_by_symbol(&symbol, SYMBOL_NEWS_LIMIT)
            .await
    }

    pub async fn latest_analyses(&self, limit: usize) -> anyhow::Result<Vec<AnalysisRecord>> {
        self.repo.latest_analyses(limit).await
    }

    pub async fn latest_news(&self, limit: usize) -> anyhow::Result<Vec<NewsArticle>> {
        self.repo.latest_news(limit).await
    }

    /// Reports previously generated for a query, newest first.
    pub async fn reports_for_query(&self, query_id: i64) -> anyhow::Result<Vec<Report>> {
        if self.repo.get_search_query(query_id).await?.is_none() {
            return Err(ServiceError::QueryNotFound(query_id).into());
        }
        self.repo.list_reports_by_query(query_id).await
    }
}

fn new_news_article(
    symbol: &str,
    article: &RawNewsArticle,
    c: &SentimentClassification,
) -> NewNewsArticle {
    NewNewsArticle {
        symbol: symbol.to_string(),
        title: article.title.clone(),
        content: article.content.clone(),
        summary: summarize(&article.content),
        sentiment: c.label.sentiment,
        sentiment_score: c.label.score / 100.0,
        source: article.source.clone(),
        url: article.url.clone(),
        published_at: article.published_at,
        original_language: article
            .language
            .clone()
            .unwrap_or_else(|| "en".to_string()),
    }
}

/// First `SUMMARY_CHARS` characters, with an ellipsis when cut.
fn summarize(content: &str) -> String {
    let content = content.trim();
    match content.char_indices().nth(SUMMARY_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::scoring::{Recommendation, RiskLevel};
    use crate::domain::sentiment::{Sentiment, SentimentLabel};
    use crate::market::PriceBar;
    use crate::storage::MemoryStore;
    use chrono::{Duration, TimeZone};

    struct FixedMarket {
        class: AssetClass,
        bars: Vec<PriceBar>,
    }

    #[async_trait::async_trait]
    impl MarketDataProvider for FixedMarket {
        fn provider_name(&self) -> &'static str {
            "fixed"
        }

        async fn fetch_market(
            &self,
            symbol: &str,
            asset_class: AssetClass,
        ) -> anyhow::Result<Option<MarketSnapshot>> {
            if asset_class != self.class || symbol == "NOPE" {
                return Ok(None);
            }
            Ok(Some(MarketSnapshot {
                asset_class,
                quote: MarketData {
                    symbol: symbol.to_string(),
                    price: 100.0,
                    change: 2.0,
                    change_percent: 2.04,
                    volume: 1_000.0,
                    market_cap: None,
                    high_24h: None,
                    low_24h: None,
                },
                bars: self.bars.clone(),
            }))
        }
    }

    struct FixedNews {
        titles: Vec<&'static str>,
        twitter_mentions: Option<u64>,
    }

    #[async_trait::async_trait]
    impl NewsProvider for FixedNews {
        fn provider_name(&self) -> &'static str {
            "fixed"
        }

        async fn fetch_articles(
            &self,
            _symbol: &str,
            _time_range: TimeRange,
            _deep_search: bool,
        ) -> anyhow::Result<Vec<RawNewsArticle>> {
            let base = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
            Ok(self
                .titles
                .iter()
                .enumerate()
                .map(|(i, t)| RawNewsArticle {
                    title: t.to_string(),
                    content: format!("{t} body"),
                    url: None,
                    source: "wire".to_string(),
                    published_at: base - Duration::hours(i as i64),
                    language: None,
                })
                .collect())
        }

        async fn fetch_social(&self, _symbol: &str) -> anyhow::Result<Option<SocialMetrics>> {
            Ok(self.twitter_mentions.map(|m| SocialMetrics {
                twitter_mentions: Some(m),
                ..Default::default()
            }))
        }
    }

    /// Labels by keyword in the text; "boom" makes the call fail.
    struct KeywordLlm;

    #[async_trait::async_trait]
    impl LlmClient for KeywordLlm {
        fn provider(&self) -> crate::llm::Provider {
            crate::llm::Provider::Neutral
        }

        async fn classify_sentiment(
            &self,
            text: &str,
            _symbol: &str,
        ) -> anyhow::Result<SentimentClassification> {
            if text.contains("boom") {
                anyhow::bail!("classifier down");
            }
            let (sentiment, score) = if text.contains("surge") {
                (Sentiment::Positive, 80.0)
            } else if text.contains("slump") {
                (Sentiment::Negative, 20.0)
            } else {
                (Sentiment::Neutral, 50.0)
            };
            Ok(SentimentClassification {
                label: SentimentLabel::new(sentiment, score, 0.9),
                key_points: Vec::new(),
            })
        }

        async fn analyze_chart(
            &self,
            _image: &ChartImage,
            _symbol: &str,
        ) -> anyhow::Result<ChartAnalysisResult> {
            anyhow::bail!("vision unavailable")
        }

        async fn translate(&self, text: &str, _target_language: &str) -> anyhow::Result<String> {
            if text == "boom" {
                anyhow::bail!("translator down");
            }
            Ok(format!("[fr] {text}"))
        }
    }

    fn service(class: AssetClass, news: Option<FixedNews>, dir: &str) -> AnalysisService {
        AnalysisService::new(
            Arc::new(FixedMarket {
                class,
                bars: Vec::new(),
            }),
            news.map(|n| Arc::new(n) as Arc<dyn NewsProvider>),
            Arc::new(KeywordLlm),
            Arc::new(MemoryStore::new()),
            std::env::temp_dir().join(dir),
        )
    }

    fn service_error(err: &anyhow::Error) -> Option<&ServiceError> {
        err.downcast_ref::<ServiceError>()
    }

    #[tokio::test]
    async fn analyze_scores_classified_news() {
        let svc = service(
            AssetClass::Stock,
            Some(FixedNews {
                titles: vec!["Apple surge", "Apple surge again", "Apple slump", "Apple boom"],
                twitter_mentions: Some(2_500),
            }),
            "marketlens-test-analyze",
        );

        let resp = svc.analyze(AnalyzeRequest::new("apple")).await.unwrap();
        assert_eq!(resp.query.symbol, "apple");
        assert_eq!(resp.asset_class, AssetClass::Stock);

        let a = &resp.analysis_result;
        assert_eq!(a.symbol, "AAPL");
        assert_eq!(a.news_count, 4);
        assert_eq!(a.positive_news_percent, 50.0);
        assert_eq!(a.negative_news_percent, 25.0);
        assert_eq!(a.neutral_news_percent, 25.0);
        assert_eq!(a.sentiment_score, 75.0);
        // No price history, so no RSI to confirm a bullish call.
        assert_eq!(a.recommendation, Recommendation::Neutral);
        assert_eq!(a.risk_level, RiskLevel::High);
        assert_eq!(a.price_change, 2.04);
        assert_eq!(
            a.key_insights,
            vec!["High social media engagement and community interest".to_string()]
        );

        // Order follows the feed; the failed classification is neutral.
        let sentiments: Vec<_> = resp.news_articles.iter().map(|n| n.sentiment).collect();
        assert_eq!(
            sentiments,
            vec![
                Sentiment::Positive,
                Sentiment::Positive,
                Sentiment::Negative,
                Sentiment::Neutral
            ]
        );
        assert_eq!(resp.news_articles[0].sentiment_score, 0.8);
        assert_eq!(resp.news_articles[3].sentiment_score, 0.5);

        let stored = svc.news_for_symbol("aapl").await.unwrap();
        assert_eq!(stored.len(), 4);
        assert_eq!(svc.latest_analyses(5).await.unwrap().len(), 1);
        assert_eq!(svc.latest_news(2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn analyze_without_news_is_neutral() {
        let svc = service(AssetClass::Crypto, None, "marketlens-test-no-news");
        let resp = svc.analyze(AnalyzeRequest::new("BTC")).await.unwrap();
        assert_eq!(resp.asset_class, AssetClass::Crypto);
        assert_eq!(resp.analysis_result.news_count, 0);
        assert_eq!(resp.analysis_result.sentiment_score, 50.0);
        assert_eq!(resp.analysis_result.recommendation, Recommendation::Neutral);
        assert_eq!(resp.analysis_result.risk_level, RiskLevel::Medium);
        assert_eq!(resp.technical_indicators, TechnicalIndicators::default());

        // Responses use snake_case keys even though requests also accept camelCase.
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["analysis_result"]["positive_news_percent"], 0.0);
        assert_eq!(v["asset_class"], "crypto");
        assert!(v.get("analysisResult").is_none());
    }

    #[tokio::test]
    async fn analyze_rejects_blank_and_unknown_symbols() {
        let svc = service(AssetClass::Stock, None, "marketlens-test-errors");

        let err = svc.analyze(AnalyzeRequest::new("  ")).await.unwrap_err();
        assert!(matches!(service_error(&err), Some(ServiceError::InvalidInput(_))));

        let err = svc.analyze(AnalyzeRequest::new("NOPE")).await.unwrap_err();
        assert_eq!(
            service_error(&err),
            Some(&ServiceError::AssetNotFound {
                symbol: "NOPE".to_string()
            })
        );

        let mut crypto_only = AnalyzeRequest::new("AAPL");
        crypto_only.asset_type = AssetType::Crypto;
        let err = svc.analyze(crypto_only).await.unwrap_err();
        assert!(matches!(
            service_error(&err),
            Some(ServiceError::AssetNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn chart_failure_falls_back_and_is_stored() {
        let svc = service(AssetClass::Stock, None, "marketlens-test-chart");
        let resp = svc.analyze(AnalyzeRequest::new("AAPL")).await.unwrap();

        let chart = svc
            .analyze_chart(ChartRequest {
                query_id: resp.query.id,
                symbol: "AAPL".to_string(),
                file_name: Some("daily.png".to_string()),
                media_type: Some("image/png".to_string()),
                image_base64: "iVBORw0KGgo=".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(chart.file_name, "daily.png");
        assert_eq!(chart.analysis, ChartAnalysisResult::unavailable());

        let err = svc
            .analyze_chart(ChartRequest {
                query_id: 999,
                symbol: "AAPL".to_string(),
                file_name: None,
                media_type: None,
                image_base64: "iVBORw0KGgo=".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(service_error(&err), Some(&ServiceError::QueryNotFound(999)));

        let err = svc
            .analyze_chart(ChartRequest {
                query_id: resp.query.id,
                symbol: "AAPL".to_string(),
                file_name: None,
                media_type: Some("application/pdf".to_string()),
                image_base64: "JVBERi0=".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(service_error(&err), Some(ServiceError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn report_is_written_and_recorded() {
        let svc = service(
            AssetClass::Stock,
            Some(FixedNews {
                titles: vec!["Apple surge"],
                twitter_mentions: None,
            }),
            "marketlens-test-report",
        );
        let resp = svc.analyze(AnalyzeRequest::new("AAPL")).await.unwrap();

        let generated = svc.generate_report(resp.query.id).await.unwrap();
        assert_eq!(generated.report.query_id, resp.query.id);
        assert!(generated.rendered.body.contains("<h1>AAPL</h1>"));
        assert_eq!(generated.report.report_data["symbol"], "AAPL");

        let on_disk = tokio::fs::read_to_string(&generated.report.file_path)
            .await
            .unwrap();
        assert_eq!(on_disk, generated.rendered.body);
        let _ = tokio::fs::remove_file(&generated.report.file_path).await;

        let listed = svc.reports_for_query(resp.query.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, generated.report.id);
        let err = svc.reports_for_query(424242).await.unwrap_err();
        assert_eq!(service_error(&err), Some(&ServiceError::QueryNotFound(424242)));

        let err = svc.generate_report(424242).await.unwrap_err();
        assert_eq!(
            service_error(&err),
            Some(&ServiceError::NoAnalysisResults(424242))
        );
    }

    #[tokio::test]
    async fn translate_falls_back_to_original_text() {
        let svc = service(AssetClass::Stock, None, "marketlens-test-translate");
        assert_eq!(svc.translate("hello", "fr").await.unwrap(), "[fr] hello");
        assert_eq!(svc.translate("boom", "fr").await.unwrap(), "boom");
        let err = svc.translate("hello", " ").await.unwrap_err();
        assert!(matches!(service_error(&err), Some(ServiceError::InvalidInput(_))));
    }

    #[test]
    fn catalog_queries_validate_input() {
        let svc = service(AssetClass::Stock, None, "marketlens-test-catalog");
        assert!(svc.search_assets(" ", AssetType::All).is_err());
        assert_eq!(
            svc.search_assets("tesla", AssetType::All).unwrap(),
            vec!["TSLA".to_string()]
        );
        assert!(svc.assets_under_price(f64::NAN, AssetType::All).is_empty());
        assert!(svc.assets_under_price(-1.0, AssetType::All).is_empty());
        assert_eq!(svc.assets_under_price(1.0, AssetType::Crypto).len(), 1);
    }

    #[test]
    fn summary_cuts_on_char_boundary() {
        assert_eq!(summarize("short"), "short");
        let long = "é".repeat(250);
        let s = summarize(&long);
        assert_eq!(s.chars().count(), SUMMARY_CHARS + 3);
        assert!(s.ends_with("..."));
    }
}
