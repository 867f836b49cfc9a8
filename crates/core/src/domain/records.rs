use crate::domain::chart::ChartAnalysisResult;
use crate::domain::insights::SocialMetrics;
use crate::domain::scoring::{Recommendation, RiskLevel, TechnicalIndicators};
use crate::domain::sentiment::Sentiment;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the caller asked for. `All` tries stocks first, then crypto.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    #[serde(alias = "stocks")]
    Stock,
    Crypto,
    #[default]
    All,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Stock => "stock",
            AssetType::Crypto => "crypto",
            AssetType::All => "all",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stock" | "stocks" => Some(AssetType::Stock),
            "crypto" => Some(AssetType::Crypto),
            "all" => Some(AssetType::All),
            _ => None,
        }
    }

    pub fn classes(&self) -> &'static [AssetClass] {
        match self {
            AssetType::Stock => &[AssetClass::Stock],
            AssetType::Crypto => &[AssetClass::Crypto],
            AssetType::All => &[AssetClass::Stock, AssetClass::Crypto],
        }
    }

    pub fn includes(&self, class: AssetClass) -> bool {
        self.classes().contains(&class)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Stock,
    Crypto,
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetClass::Stock => f.write_str("stock"),
            AssetClass::Crypto => f.write_str("crypto"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeRange {
    #[default]
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::Week => "7d",
            TimeRange::Month => "30d",
            TimeRange::Quarter => "90d",
        }
    }

    /// Unknown ranges fall back to a week.
    pub fn parse_or_default(s: &str) -> Self {
        match s.trim() {
            "30d" => TimeRange::Month,
            "90d" => TimeRange::Quarter,
            _ => TimeRange::Week,
        }
    }

    pub fn days(&self) -> i64 {
        match self {
            TimeRange::Week => 7,
            TimeRange::Month => 30,
            TimeRange::Quarter => 90,
        }
    }

    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.days())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSearchQuery {
    pub symbol: String,
    pub asset_type: AssetType,
    pub price_limit: Option<f64>,
    pub deep_search_enabled: bool,
    pub time_range: TimeRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub id: i64,
    pub symbol: String,
    pub asset_type: AssetType,
    pub price_limit: Option<f64>,
    pub deep_search_enabled: bool,
    pub time_range: TimeRange,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAnalysisRecord {
    pub query_id: i64,
    pub symbol: String,
    pub sentiment_score: f64,
    pub technical_indicators: TechnicalIndicators,
    pub news_count: i32,
    pub positive_news_percent: f64,
    pub neutral_news_percent: f64,
    pub negative_news_percent: f64,
    pub price: f64,
    pub price_change: f64,
    pub social_metrics: SocialMetrics,
    pub recommendation: Recommendation,
    pub risk_level: RiskLevel,
    pub key_insights: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: i64,
    pub query_id: i64,
    pub symbol: String,
    pub sentiment_score: f64,
    pub technical_indicators: TechnicalIndicators,
    pub news_count: i32,
    pub positive_news_percent: f64,
    pub neutral_news_percent: f64,
    pub negative_news_percent: f64,
    pub price: f64,
    pub price_change: f64,
    pub social_metrics: SocialMetrics,
    pub recommendation: Recommendation,
    pub risk_level: RiskLevel,
    pub key_insights: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNewsArticle {
    pub symbol: String,
    pub title: String,
    pub content: String,
    pub summary: String,
    pub sentiment: Sentiment,
    /// Classifier score rescaled to 0..=1.
    pub sentiment_score: f64,
    pub source: String,
    pub url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub original_language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub id: i64,
    pub symbol: String,
    pub title: String,
    pub content: String,
    pub summary: String,
    pub sentiment: Sentiment,
    pub sentiment_score: f64,
    pub source: String,
    pub url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub original_language: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewChartAnalysis {
    pub query_id: i64,
    pub file_name: String,
    pub analysis: ChartAnalysisResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartAnalysis {
    pub id: i64,
    pub query_id: i64,
    pub file_name: String,
    pub analysis: ChartAnalysisResult,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReport {
    pub query_id: i64,
    pub file_name: String,
    pub file_path: String,
    pub report_data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub query_id: i64,
    pub file_name: String,
    pub file_path: String,
    pub report_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
