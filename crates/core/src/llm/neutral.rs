use crate::domain::chart::{ChartAnalysisResult, ChartImage};
use crate::domain::contract::SentimentClassification;
use crate::llm::{LlmClient, Provider};

/// Offline classifier used when no LLM credentials are configured. Every article scores neutral,
/// charts come back unavailable and translation is the identity.
#[derive(Debug, Clone, Default)]
pub struct NeutralClassifier;

#[async_trait::async_trait]
impl LlmClient for NeutralClassifier {
    fn provider(&self) -> Provider {
        Provider::Neutral
    }

    async fn classify_sentiment(
        &self,
        _text: &str,
        _symbol: &str,
    ) -> anyhow::Result<SentimentClassification> {
        Ok(SentimentClassification::unavailable())
    }

    async fn analyze_chart(
        &self,
        _image: &ChartImage,
        _symbol: &str,
    ) -> anyhow::Result<ChartAnalysisResult> {
        Ok(ChartAnalysisResult::unavailable())
    }

    async fn translate(&self, text: &str, _target_language: &str) -> anyhow::Result<String> {
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sentiment::Sentiment;

    #[tokio::test]
    async fn neutral_classifier_returns_defaults() {
        let c = NeutralClassifier;
        let s = c.classify_sentiment("anything", "AAPL").await.unwrap();
        assert_eq!(s.label.sentiment, Sentiment::Neutral);
        assert_eq!(s.label.score, 50.0);
        assert_eq!(c.translate("hola", "en").await.unwrap(), "hola");
    }
}
