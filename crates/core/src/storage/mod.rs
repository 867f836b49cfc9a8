pub mod memory;
pub mod postgres;

use crate::domain::records::{
    AnalysisRecord, ChartAnalysis, NewAnalysisRecord, NewChartAnalysis, NewNewsArticle, NewReport,
    NewSearchQuery, NewsArticle, Report, SearchQuery,
};
use anyhow::Context;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Persistence for queries and everything derived from them. Lists are newest first.
#[async_trait::async_trait]
pub trait Repository: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn create_search_query(&self, new: NewSearchQuery) -> anyhow::Result<SearchQuery>;

    async fn get_search_query(&self, id: i64) -> anyhow::Result<Option<SearchQuery>>;

    async fn create_analysis(&self, new: NewAnalysisRecord) -> anyhow::Result<AnalysisRecord>;

    async fn list_analyses_by_query(&self, query_id: i64) -> anyhow::Result<Vec<AnalysisRecord>>;

    async fn latest_analyses(&self, limit: usize) -> anyhow::Result<Vec<AnalysisRecord>>;

    async fn create_news_article(&self, new: NewNewsArticle) -> anyhow::Result<NewsArticle>;

    /// Symbol match is case-insensitive; ordered by publication time.
    async fn list_news_by_symbol(
        &self,
        symbol: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<NewsArticle>>;

    async fn latest_news(&self, limit: usize) -> anyhow::Result<Vec<NewsArticle>>;

    async fn create_chart_analysis(&self, new: NewChartAnalysis) -> anyhow::Result<ChartAnalysis>;

    async fn list_chart_analyses_by_query(
        &self,
        query_id: i64,
    ) -> anyhow::Result<Vec<ChartAnalysis>>;

    async fn create_report(&self, new: NewReport) -> anyhow::Result<Report>;

    async fn list_reports_by_query(&self, query_id: i64) -> anyhow::Result<Vec<Report>>;
}

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}
