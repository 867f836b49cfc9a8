use crate::domain::chart::{ChartAnalysisResult, TrendDirection, VolumeLevel};
use crate::domain::sentiment::{Sentiment, SentimentLabel};
use serde::{Deserialize, Serialize};

const DEFAULT_SCORE: f64 = 50.0;
const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Raw sentiment verdict as the LLM emits it. Every key is optional; normalization fills gaps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmSentiment {
    #[serde(default)]
    pub sentiment: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default, alias = "key_points")]
    pub key_points: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentClassification {
    pub label: SentimentLabel,
    pub key_points: Vec<String>,
}

impl SentimentClassification {
    /// Neutral stand-in used when the classifier cannot be reached or its output is unusable.
    pub fn unavailable() -> Self {
        Self {
            label: SentimentLabel::new(Sentiment::Neutral, DEFAULT_SCORE, 0.1),
            key_points: vec!["Analysis unavailable due to technical error".to_string()],
        }
    }
}

impl LlmSentiment {
    pub fn into_classification(self) -> SentimentClassification {
        let sentiment = match self.sentiment.as_deref() {
            Some(raw) => Sentiment::parse(raw).unwrap_or_else(|| {
                tracing::warn!(label = raw, "unknown sentiment label; treating as neutral");
                Sentiment::Neutral
            }),
            None => Sentiment::Neutral,
        };

        let score = clamp_or(self.score, 0.0, 100.0, DEFAULT_SCORE);
        let confidence = clamp_or(self.confidence, 0.0, 1.0, DEFAULT_CONFIDENCE);

        let key_points = self
            .key_points
            .unwrap_or_default()
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        SentimentClassification {
            label: SentimentLabel::new(sentiment, score, confidence),
            key_points,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmChartAnalysis {
    #[serde(default, alias = "support_level")]
    pub support_level: Option<f64>,
    #[serde(default, alias = "resistance_level")]
    pub resistance_level: Option<f64>,
    #[serde(default, alias = "trend_direction")]
    pub trend_direction: Option<String>,
    #[serde(default)]
    pub rsi: Option<f64>,
    #[serde(default)]
    pub macd: Option<f64>,
    #[serde(default)]
    pub volume: Option<String>,
    #[serde(default)]
    pub prediction: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default, alias = "key_findings")]
    pub key_findings: Option<Vec<String>>,
}

impl LlmChartAnalysis {
    pub fn into_result(self) -> ChartAnalysisResult {
        let prediction = self
            .prediction
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| ChartAnalysisResult::NO_PREDICTION.to_string());

        ChartAnalysisResult {
            support_level: self.support_level.filter(|v| v.is_finite()),
            resistance_level: self.resistance_level.filter(|v| v.is_finite()),
            trend_direction: self
                .trend_direction
                .as_deref()
                .and_then(TrendDirection::parse)
                .unwrap_or(TrendDirection::Sideways),
            rsi: self.rsi.filter(|v| (0.0..=100.0).contains(v)),
            macd: self.macd.filter(|v| v.is_finite()),
            volume: self
                .volume
                .as_deref()
                .and_then(VolumeLevel::parse)
                .unwrap_or(VolumeLevel::Normal),
            prediction,
            confidence: clamp_or(self.confidence, 0.0, 1.0, DEFAULT_CONFIDENCE),
            key_findings: self.key_findings.unwrap_or_default(),
        }
    }
}

fn clamp_or(v: Option<f64>, lo: f64, hi: f64, default: f64) -> f64 {
    match v {
        Some(x) if x.is_finite() => x.clamp(lo, hi),
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sentiment_fills_defaults() {
        let raw: LlmSentiment = serde_json::from_value(json!({})).unwrap();
        let c = raw.into_classification();
        assert_eq!(c.label.sentiment, Sentiment::Neutral);
        assert_eq!(c.label.score, 50.0);
        assert_eq!(c.label.confidence, 0.5);
        assert!(c.key_points.is_empty());
    }

    #[test]
    fn sentiment_clamps_out_of_range_values() {
        let raw: LlmSentiment = serde_json::from_value(json!({
            "sentiment": "positive",
            "score": 140,
            "confidence": -0.2,
            "keyPoints": ["beat estimates", "  "]
        }))
        .unwrap();
        let c = raw.into_classification();
        assert_eq!(c.label.sentiment, Sentiment::Positive);
        assert_eq!(c.label.score, 100.0);
        assert_eq!(c.label.confidence, 0.0);
        assert_eq!(c.key_points, vec!["beat estimates".to_string()]);
    }

    #[test]
    fn zero_score_is_kept() {
        let raw: LlmSentiment =
            serde_json::from_value(json!({"sentiment": "negative", "score": 0})).unwrap();
        assert_eq!(raw.into_classification().label.score, 0.0);
    }

    #[test]
    fn unknown_label_becomes_neutral() {
        let raw: LlmSentiment =
            serde_json::from_value(json!({"sentiment": "mixed", "score": 60})).unwrap();
        assert_eq!(raw.into_classification().label.sentiment, Sentiment::Neutral);
    }

    #[test]
    fn chart_defaults_and_snake_case_aliases() {
        let raw: LlmChartAnalysis = serde_json::from_value(json!({
            "support_level": 170.5,
            "trendDirection": "UP",
            "rsi": 140,
            "volume": "extreme",
            "prediction": "",
            "confidence": 3.0
        }))
        .unwrap();
        let r = raw.into_result();
        assert_eq!(r.support_level, Some(170.5));
        assert_eq!(r.trend_direction, TrendDirection::Bullish);
        assert_eq!(r.rsi, None);
        assert_eq!(r.volume, VolumeLevel::Normal);
        assert_eq!(r.prediction, ChartAnalysisResult::NO_PREDICTION);
        assert_eq!(r.confidence, 1.0);
    }
}
