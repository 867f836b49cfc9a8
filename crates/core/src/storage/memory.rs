use crate::domain::records::{
    AnalysisRecord, ChartAnalysis, NewAnalysisRecord, NewChartAnalysis, NewNewsArticle, NewReport,
    NewSearchQuery, NewsArticle, Report, SearchQuery,
};
use crate::storage::Repository;
use chrono::Utc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    search_queries: Vec<SearchQuery>,
    analyses: Vec<AnalysisRecord>,
    news: Vec<NewsArticle>,
    chart_analyses: Vec<ChartAnalysis>,
    reports: Vec<Report>,
}

/// Process-local store. Each table is an append-only Vec and a row's id is its index + 1.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn next_id<T>(rows: &[T]) -> i64 {
    rows.len() as i64 + 1
}

fn newest_first<T: Clone>(
    rows: impl Iterator<Item = T>,
    key: impl Fn(&T) -> (chrono::DateTime<Utc>, i64),
    limit: usize,
) -> Vec<T> {
    let mut out: Vec<T> = rows.collect();
    out.sort_by(|a, b| key(b).cmp(&key(a)));
    out.truncate(limit);
    out
}

#[async_trait::async_trait]
impl Repository for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn create_search_query(&self, new: NewSearchQuery) -> anyhow::Result<SearchQuery> {
        let mut t = self.tables.write().await;
        let row = SearchQuery {
            id: next_id(&t.search_queries),
            symbol: new.symbol,
            asset_type: new.asset_type,
            price_limit: new.price_limit,
            deep_search_enabled: new.deep_search_enabled,
            time_range: new.time_range,
            created_at: Utc::now(),
        };
        t.search_queries.push(row.clone());
        Ok(row)
    }

    async fn get_search_query(&self, id: i64) -> anyhow::Result<Option<SearchQuery>> {
        let t = self.tables.read().await;
        let found = usize::try_from(id - 1)
            .ok()
            .and_then(|i| t.search_queries.get(i))
            .cloned();
        Ok(found)
    }

    async fn create_analysis(&self, new: NewAnalysisRecord) -> anyhow::Result<AnalysisRecord> {
        let mut t = self.tables.write().await;
        let row = AnalysisRecord {
            id: next_id(&t.analyses),
            query_id: new.query_id,
            symbol: new.symbol,
            sentiment_score: new.sentiment_score,
            technical_indicators: new.technical_indicators,
            news_count: new.news_count,
            positive_news_percent: new.positive_news_percent,
            neutral_news_percent: new.neutral_news_percent,
            negative_news_percent: new.negative_news_percent,
            price: new.price,
            price_change: new.price_change,
            social_metrics: new.social_metrics,
            recommendation: new.recommendation,
            risk_level: new.risk_level,
            key_insights: new.key_insights,
            created_at: Utc::now(),
        };
        t.analyses.push(row.clone());
        Ok(row)
    }

    async fn list_analyses_by_query(&self, query_id: i64) -> anyhow::Result<Vec<AnalysisRecord>> {
        let t = self.tables.read().await;
        Ok(newest_first(
            t.analyses.iter().filter(|a| a.query_id == query_id).cloned(),
            |a| (a.created_at, a.id),
            usize::MAX,
        ))
    }

    async fn latest_analyses(&self, limit: usize) -> anyhow::Result<Vec<AnalysisRecord>> {
        let t = self.tables.read().await;
        Ok(newest_first(
            t.analyses.iter().cloned(),
            |a| (a.created_at, a.id),
            limit,
        ))
    }

    async fn create_news_article(&self, new: NewNewsArticle) -> anyhow::Result<NewsArticle> {
        let mut t = self.tables.write().await;
        let row = NewsArticle {
            id: next_id(&t.news),
            symbol: new.symbol,
            title: new.title,
            content: new.content,
            summary: new.summary,
            sentiment: new.sentiment,
            sentiment_score: new.sentiment_score,
            source: new.source,
            url: new.url,
            published_at: new.published_at,
            original_language: new.original_language,
            created_at: Utc::now(),
        };
        t.news.push(row.clone());
        Ok(row)
    }

    async fn list_news_by_symbol(
        &self,
        symbol: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<NewsArticle>> {
        let t = self.tables.read().await;
        Ok(newest_first(
            t.news
                .iter()
                .filter(|n| n.symbol.eq_ignore_ascii_case(symbol))
                .cloned(),
            |n| (n.published_at, n.id),
            limit,
        ))
    }

    async fn latest_news(&self, limit: usize) -> anyhow::Result<Vec<NewsArticle>> {
        let t = self.tables.read().await;
        Ok(newest_first(
            t.news.iter().cloned(),
            |n| (n.published_at, n.id),
            limit,
        ))
    }

    async fn create_chart_analysis(&self, new: NewChartAnalysis) -> anyhow::Result<ChartAnalysis> {
        let mut t = self.tables.write().await;
        let row = ChartAnalysis {
            id: next_id(&t.chart_analyses),
            query_id: new.query_id,
            file_name: new.file_name,
            analysis: new.analysis,
            created_at: Utc::now(),
        };
        t.chart_analyses.push(row.clone());
        Ok(row)
    }

    async fn list_chart_analyses_by_query(
        &self,
        query_id: i64,
    ) -> anyhow::Result<Vec<ChartAnalysis>> {
        let t = self.tables.read().await;
        Ok(newest_first(
            t.chart_analyses
                .iter()
                .filter(|c| c.query_id == query_id)
                .cloned(),
            |c| (c.created_at, c.id),
            usize::MAX,
        ))
    }

    async fn create_report(&self, new: NewReport) -> anyhow::Result<Report> {
        let mut t = self.tables.write().await;
        let row = Report {
            id: next_id(&t.reports),
            query_id: new.query_id,
            file_name: new.file_name,
            file_path: new.file_path,
            report_data: new.report_data,
            created_at: Utc::now(),
        };
        t.reports.push(row.clone());
        Ok(row)
    }

    async fn list_reports_by_query(&self, query_id: i64) -> anyhow::Result<Vec<Report>> {
        let t = self.tables.read().await;
        Ok(newest_first(
            t.reports.iter().filter(|r| r.query_id == query_id).cloned(),
            |r| (r.created_at, r.id),
            usize::MAX,
        ))
    }
}
