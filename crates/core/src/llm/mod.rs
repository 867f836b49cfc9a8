pub mod anthropic;
pub mod error;
pub mod json;
pub mod neutral;

use crate::domain::chart::{ChartAnalysisResult, ChartImage};
use crate::domain::contract::SentimentClassification;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    Neutral,
}

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> Provider;

    async fn classify_sentiment(
        &self,
        text: &str,
        symbol: &str,
    ) -> anyhow::Result<SentimentClassification>;

    async fn analyze_chart(
        &self,
        image: &ChartImage,
        symbol: &str,
    ) -> anyhow::Result<ChartAnalysisResult>;

    async fn translate(&self, text: &str, target_language: &str) -> anyhow::Result<String>;
}
