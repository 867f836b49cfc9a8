use crate::domain::sentiment::SentimentBreakdown;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Market-derived indicators for one symbol. Every field is optional: a short price history or
/// a provider outage leaves the corresponding field empty, and every rule that reads it treats
/// "absent" the same as "threshold not crossed".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicalIndicators {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rsi: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<u64>,
    /// Percent change of the latest volume against its recent average.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_change: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sma_20: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sma_50: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Bullish,
    Bearish,
    Neutral,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Bullish => "bullish",
            Recommendation::Bearish => "bearish",
            Recommendation::Neutral => "neutral",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bullish" => Some(Recommendation::Bullish),
            "bearish" => Some(Recommendation::Bearish),
            "neutral" => Some(Recommendation::Neutral),
            _ => None,
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `Low` exists for stored records and API consumers; the scoring rules never assign it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    pub sentiment_score: f64,
    pub recommendation: Recommendation,
    pub risk_level: RiskLevel,
}

impl CompositeScore {
    pub fn compute(breakdown: &SentimentBreakdown, indicators: &TechnicalIndicators) -> Self {
        let sentiment_score = sentiment_score(breakdown);
        Self {
            sentiment_score,
            recommendation: recommend(sentiment_score, indicators.rsi),
            risk_level: risk_level(sentiment_score, indicators.rsi),
        }
    }
}

/// Net tone centred on 50. Not clamped: 80% positive with no negatives scores 130.
pub fn sentiment_score(breakdown: &SentimentBreakdown) -> f64 {
    breakdown.positive_percent - breakdown.negative_percent + 50.0
}

/// An absent RSI never confirms a bullish call and never forces a bearish one.
pub fn recommend(sentiment_score: f64, rsi: Option<f64>) -> Recommendation {
    let mut recommendation = Recommendation::Neutral;

    if sentiment_score >= 65.0 && rsi.is_some_and(|r| r < 70.0) {
        recommendation = Recommendation::Bullish;
    }
    if sentiment_score <= 35.0 || rsi.is_some_and(|r| r > 80.0) {
        recommendation = Recommendation::Bearish;
    }

    recommendation
}

pub fn risk_level(sentiment_score: f64, rsi: Option<f64>) -> RiskLevel {
    let stretched = sentiment_score > 70.0 || rsi.is_some_and(|r| r > 75.0);
    let depressed = sentiment_score < 30.0;

    if stretched || depressed {
        RiskLevel::High
    } else {
        RiskLevel::Medium
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breakdown(p: f64, n: f64, g: f64) -> SentimentBreakdown {
        SentimentBreakdown {
            positive_percent: p,
            neutral_percent: n,
            negative_percent: g,
        }
    }

    fn rsi(v: f64) -> TechnicalIndicators {
        TechnicalIndicators {
            rsi: Some(v),
            ..Default::default()
        }
    }

    #[test]
    fn sentiment_score_is_not_clamped() {
        assert_eq!(sentiment_score(&breakdown(80.0, 20.0, 0.0)), 130.0);
        assert_eq!(sentiment_score(&breakdown(0.0, 0.0, 100.0)), -50.0);
        assert_eq!(sentiment_score(&breakdown(0.0, 0.0, 0.0)), 50.0);
    }

    #[test]
    fn bullish_when_score_high_and_rsi_moderate() {
        assert_eq!(recommend(70.0, Some(65.0)), Recommendation::Bullish);
    }

    #[test]
    fn overbought_rsi_turns_strong_sentiment_bearish() {
        assert_eq!(recommend(70.0, Some(85.0)), Recommendation::Bearish);
        assert_eq!(recommend(130.0, Some(81.0)), Recommendation::Bearish);
    }

    #[test]
    fn bearish_on_low_score_regardless_of_rsi() {
        assert_eq!(recommend(35.0, Some(50.0)), Recommendation::Bearish);
        assert_eq!(recommend(10.0, None), Recommendation::Bearish);
    }

    #[test]
    fn missing_rsi_never_satisfies_rsi_clauses() {
        assert_eq!(recommend(90.0, None), Recommendation::Neutral);
        assert_eq!(risk_level(50.0, None), RiskLevel::Medium);
    }

    #[test]
    fn neutral_between_thresholds() {
        assert_eq!(recommend(50.0, Some(50.0)), Recommendation::Neutral);
        assert_eq!(recommend(64.9, Some(50.0)), Recommendation::Neutral);
        assert_eq!(recommend(65.0, Some(70.0)), Recommendation::Neutral);
    }

    #[test]
    fn risk_levels() {
        assert_eq!(risk_level(75.0, Some(50.0)), RiskLevel::High);
        assert_eq!(risk_level(50.0, Some(76.0)), RiskLevel::High);
        assert_eq!(risk_level(29.9, Some(50.0)), RiskLevel::High);
        assert_eq!(risk_level(50.0, Some(50.0)), RiskLevel::Medium);
        assert_eq!(risk_level(70.0, Some(75.0)), RiskLevel::Medium);
        assert_eq!(risk_level(30.0, Some(50.0)), RiskLevel::Medium);
    }

    #[test]
    fn compute_is_deterministic() {
        let b = breakdown(55.0, 30.0, 15.0);
        let ind = rsi(62.0);
        let first = CompositeScore::compute(&b, &ind);
        let second = CompositeScore::compute(&b, &ind);
        assert_eq!(first, second);
        assert_eq!(first.sentiment_score, 90.0);
        assert_eq!(first.recommendation, Recommendation::Bullish);
        assert_eq!(first.risk_level, RiskLevel::High);
    }

    #[test]
    fn enum_strings_round_trip() {
        for r in [
            Recommendation::Bullish,
            Recommendation::Bearish,
            Recommendation::Neutral,
        ] {
            assert_eq!(Recommendation::parse(r.as_str()), Some(r));
        }
        for r in [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High] {
            assert_eq!(RiskLevel::parse(r.as_str()), Some(r));
        }
    }
}
