use crate::domain::chart::ChartAnalysisResult;
use crate::domain::insights::SocialMetrics;
use crate::domain::records::{
    AnalysisRecord, AssetType, ChartAnalysis, NewAnalysisRecord, NewChartAnalysis, NewNewsArticle,
    NewReport, NewSearchQuery, NewsArticle, Report, SearchQuery, TimeRange,
};
use crate::domain::scoring::{Recommendation, RiskLevel, TechnicalIndicators};
use crate::domain::sentiment::Sentiment;
use crate::storage::Repository;
use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::types::Json;

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: sqlx::PgPool,
}

impl PgStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[derive(sqlx::FromRow)]
struct SearchQueryRow {
    id: i64,
    symbol: String,
    asset_type: String,
    price_limit: Option<f64>,
    deep_search_enabled: bool,
    time_range: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<SearchQueryRow> for SearchQuery {
    type Error = anyhow::Error;

    fn try_from(r: SearchQueryRow) -> anyhow::Result<Self> {
        let asset_type = AssetType::parse(&r.asset_type)
            .with_context(|| format!("unknown asset_type in search_queries: {}", r.asset_type))?;
        Ok(SearchQuery {
            id: r.id,
            symbol: r.symbol,
            asset_type,
            price_limit: r.price_limit,
            deep_search_enabled: r.deep_search_enabled,
            time_range: TimeRange::parse_or_default(&r.time_range),
            created_at: r.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AnalysisRow {
    id: i64,
    query_id: i64,
    symbol: String,
    sentiment_score: f64,
    technical_indicators: Json<TechnicalIndicators>,
    news_count: i32,
    positive_news_percent: f64,
    neutral_news_percent: f64,
    negative_news_percent: f64,
    price: f64,
    price_change: f64,
    social_metrics: Json<SocialMetrics>,
    recommendation: String,
    risk_level: String,
    key_insights: Json<Vec<String>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AnalysisRow> for AnalysisRecord {
    type Error = anyhow::Error;

    fn try_from(r: AnalysisRow) -> anyhow::Result<Self> {
        let recommendation = Recommendation::parse(&r.recommendation).with_context(|| {
            format!("unknown recommendation in analysis_results: {}", r.recommendation)
        })?;
        let risk_level = RiskLevel::parse(&r.risk_level)
            .with_context(|| format!("unknown risk_level in analysis_results: {}", r.risk_level))?;
        Ok(AnalysisRecord {
            id: r.id,
            query_id: r.query_id,
            symbol: r.symbol,
            sentiment_score: r.sentiment_score,
            technical_indicators: r.technical_indicators.0,
            news_count: r.news_count,
            positive_news_percent: r.positive_news_percent,
            neutral_news_percent: r.neutral_news_percent,
            negative_news_percent: r.negative_news_percent,
            price: r.price,
            price_change: r.price_change,
            social_metrics: r.social_metrics.0,
            recommendation,
            risk_level,
            key_insights: r.key_insights.0,
            created_at: r.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct NewsRow {
    id: i64,
    symbol: String,
    title: String,
    content: String,
    summary: String,
    sentiment: String,
    sentiment_score: f64,
    source: String,
    url: Option<String>,
    published_at: DateTime<Utc>,
    original_language: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<NewsRow> for NewsArticle {
    type Error = anyhow::Error;

    fn try_from(r: NewsRow) -> anyhow::Result<Self> {
        let sentiment = Sentiment::parse(&r.sentiment)
            .with_context(|| format!("unknown sentiment in news_articles: {}", r.sentiment))?;
        Ok(NewsArticle {
            id: r.id,
            symbol: r.symbol,
            title: r.title,
            content: r.content,
            summary: r.summary,
            sentiment,
            sentiment_score: r.sentiment_score,
            source: r.source,
            url: r.url,
            published_at: r.published_at,
            original_language: r.original_language,
            created_at: r.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ChartAnalysisRow {
    id: i64,
    query_id: i64,
    file_name: String,
    analysis: Json<ChartAnalysisResult>,
    created_at: DateTime<Utc>,
}

impl From<ChartAnalysisRow> for ChartAnalysis {
    fn from(r: ChartAnalysisRow) -> Self {
        ChartAnalysis {
            id: r.id,
            query_id: r.query_id,
            file_name: r.file_name,
            analysis: r.analysis.0,
            created_at: r.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ReportRow {
    id: i64,
    query_id: i64,
    file_name: String,
    file_path: String,
    report_data: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl From<ReportRow> for Report {
    fn from(r: ReportRow) -> Self {
        Report {
            id: r.id,
            query_id: r.query_id,
            file_name: r.file_name,
            file_path: r.file_path,
            report_data: r.report_data,
            created_at: r.created_at,
        }
    }
}

const SEARCH_QUERY_COLUMNS: &str =
    "id, symbol, asset_type, price_limit, deep_search_enabled, time_range, created_at";
const ANALYSIS_COLUMNS: &str = "id, query_id, symbol, sentiment_score, technical_indicators, \
     news_count, positive_news_percent, neutral_news_percent, negative_news_percent, price, \
     price_change, social_metrics, recommendation, risk_level, key_insights, created_at";
const NEWS_COLUMNS: &str = "id, symbol, title, content, summary, sentiment, sentiment_score, \
     source, url, published_at, original_language, created_at";

#[async_trait::async_trait]
impl Repository for PgStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn create_search_query(&self, new: NewSearchQuery) -> anyhow::Result<SearchQuery> {
        let row: SearchQueryRow = sqlx::query_as(&format!(
            "INSERT INTO search_queries (symbol, asset_type, price_limit, deep_search_enabled, time_range) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {SEARCH_QUERY_COLUMNS}"
        ))
        .bind(&new.symbol)
        .bind(new.asset_type.as_str())
        .bind(new.price_limit)
        .bind(new.deep_search_enabled)
        .bind(new.time_range.as_str())
        .fetch_one(&self.pool)
        .await
        .context("insert search_queries failed")?;
        row.try_into()
    }

    async fn get_search_query(&self, id: i64) -> anyhow::Result<Option<SearchQuery>> {
        let row: Option<SearchQueryRow> = sqlx::query_as(&format!(
            "SELECT {SEARCH_QUERY_COLUMNS} FROM search_queries WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("select search_queries failed")?;
        row.map(SearchQuery::try_from).transpose()
    }

    async fn create_analysis(&self, new: NewAnalysisRecord) -> anyhow::Result<AnalysisRecord> {
        let row: AnalysisRow = sqlx::query_as(&format!(
            "INSERT INTO analysis_results (query_id, symbol, sentiment_score, technical_indicators, \
             news_count, positive_news_percent, neutral_news_percent, negative_news_percent, price, \
             price_change, social_metrics, recommendation, risk_level, key_insights) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {ANALYSIS_COLUMNS}"
        ))
        .bind(new.query_id)
        .bind(&new.symbol)
        .bind(new.sentiment_score)
        .bind(Json(new.technical_indicators))
        .bind(new.news_count)
        .bind(new.positive_news_percent)
        .bind(new.neutral_news_percent)
        .bind(new.negative_news_percent)
        .bind(new.price)
        .bind(new.price_change)
        .bind(Json(new.social_metrics))
        .bind(new.recommendation.as_str())
        .bind(new.risk_level.as_str())
        .bind(Json(&new.key_insights))
        .fetch_one(&self.pool)
        .await
        .context("insert analysis_results failed")?;
        row.try_into()
    }

    async fn list_analyses_by_query(&self, query_id: i64) -> anyhow::Result<Vec<AnalysisRecord>> {
        let rows: Vec<AnalysisRow> = sqlx::query_as(&format!(
            "SELECT {ANALYSIS_COLUMNS} FROM analysis_results WHERE query_id = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(query_id)
        .fetch_all(&self.pool)
        .await
        .context("select analysis_results by query failed")?;
        rows.into_iter().map(AnalysisRecord::try_from).collect()
    }

    async fn latest_analyses(&self, limit: usize) -> anyhow::Result<Vec<AnalysisRecord>> {
        let rows: Vec<AnalysisRow> = sqlx::query_as(&format!(
            "SELECT {ANALYSIS_COLUMNS} FROM analysis_results ORDER BY created_at DESC, id DESC LIMIT $1"
        ))
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await
        .context("select latest analysis_results failed")?;
        rows.into_iter().map(AnalysisRecord::try_from).collect()
    }

    async fn create_news_article(&self, new: NewNewsArticle) -> anyhow::Result<NewsArticle> {
        let row: NewsRow = sqlx::query_as(&format!(
            "INSERT INTO news_articles (symbol, title, content, summary, sentiment, sentiment_score, \
             source, url, published_at, original_language) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {NEWS_COLUMNS}"
        ))
        .bind(&new.symbol)
        .bind(&new.title)
        .bind(&new.content)
        .bind(&new.summary)
        .bind(new.sentiment.as_str())
        .bind(new.sentiment_score)
        .bind(&new.source)
        .bind(&new.url)
        .bind(new.published_at)
        .bind(&new.original_language)
        .fetch_one(&self.pool)
        .await
        .context("insert news_articles failed")?;
        row.try_into()
    }

    async fn list_news_by_symbol(
        &self,
        symbol: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<NewsArticle>> {
        let rows: Vec<NewsRow> = sqlx::query_as(&format!(
            "SELECT {NEWS_COLUMNS} FROM news_articles WHERE upper(symbol) = upper($1) \
             ORDER BY published_at DESC, id DESC LIMIT $2"
        ))
        .bind(symbol)
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await
        .context("select news_articles by symbol failed")?;
        rows.into_iter().map(NewsArticle::try_from).collect()
    }

    async fn latest_news(&self, limit: usize) -> anyhow::Result<Vec<NewsArticle>> {
        let rows: Vec<NewsRow> = sqlx::query_as(&format!(
            "SELECT {NEWS_COLUMNS} FROM news_articles ORDER BY published_at DESC, id DESC LIMIT $1"
        ))
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await
        .context("select latest news_articles failed")?;
        rows.into_iter().map(NewsArticle::try_from).collect()
    }

    async fn create_chart_analysis(&self, new: NewChartAnalysis) -> anyhow::Result<ChartAnalysis> {
        let row: ChartAnalysisRow = sqlx::query_as(
            "INSERT INTO chart_analyses (query_id, file_name, analysis) VALUES ($1, $2, $3) \
             RETURNING id, query_id, file_name, analysis, created_at",
        )
        .bind(new.query_id)
        .bind(&new.file_name)
        .bind(Json(&new.analysis))
        .fetch_one(&self.pool)
        .await
        .context("insert chart_analyses failed")?;
        Ok(row.into())
    }

    async fn list_chart_analyses_by_query(
        &self,
        query_id: i64,
    ) -> anyhow::Result<Vec<ChartAnalysis>> {
        let rows: Vec<ChartAnalysisRow> = sqlx::query_as(
            "SELECT id, query_id, file_name, analysis, created_at FROM chart_analyses \
             WHERE query_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(query_id)
        .fetch_all(&self.pool)
        .await
        .context("select chart_analyses by query failed")?;
        Ok(rows.into_iter().map(ChartAnalysis::from).collect())
    }

    async fn create_report(&self, new: NewReport) -> anyhow::Result<Report> {
        let row: ReportRow = sqlx::query_as(
            "INSERT INTO reports (query_id, file_name, file_path, report_data) VALUES ($1, $2, $3, $4) \
             RETURNING id, query_id, file_name, file_path, report_data, created_at",
        )
        .bind(new.query_id)
        .bind(&new.file_name)
        .bind(&new.file_path)
        .bind(&new.report_data)
        .fetch_one(&self.pool)
        .await
        .context("insert reports failed")?;
        Ok(row.into())
    }

    async fn list_reports_by_query(&self, query_id: i64) -> anyhow::Result<Vec<Report>> {
        let rows: Vec<ReportRow> = sqlx::query_as(
            "SELECT id, query_id, file_name, file_path, report_data, created_at FROM reports \
             WHERE query_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(query_id)
        .fetch_all(&self.pool)
        .await
        .context("select reports by query failed")?;
        Ok(rows.into_iter().map(Report::from).collect())
    }
}
