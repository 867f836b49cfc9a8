use crate::domain::scoring::TechnicalIndicators;
use crate::domain::sentiment::SentimentBreakdown;
use serde::{Deserialize, Serialize};

const STRONG_POSITIVE_PERCENT: f64 = 60.0;
const RSI_OVERSOLD: f64 = 30.0;
const RSI_OVERBOUGHT: f64 = 70.0;
const VOLUME_SURGE_PERCENT: f64 = 50.0;
const HIGH_TWITTER_MENTIONS: u64 = 2000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter_mentions: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reddit_discussions: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community_score: Option<f64>,
}

/// Evaluates the insight rules in fixed order. Rules are independent; any number may fire.
pub fn generate_insights(
    breakdown: &SentimentBreakdown,
    indicators: &TechnicalIndicators,
    social: Option<&SocialMetrics>,
) -> Vec<String> {
    let mut out = Vec::new();

    if breakdown.positive_percent > STRONG_POSITIVE_PERCENT {
        out.push(format!(
            "Strong positive sentiment with {:.1}% positive news coverage",
            round_tenth(breakdown.positive_percent)
        ));
    }

    if indicators.rsi.is_some_and(|r| r < RSI_OVERSOLD) {
        out.push("RSI indicates oversold conditions - potential buying opportunity".to_string());
    }

    if indicators.rsi.is_some_and(|r| r > RSI_OVERBOUGHT) {
        out.push("RSI indicates overbought conditions - caution advised".to_string());
    }

    if let Some(change) = indicators.volume_change.filter(|c| *c > VOLUME_SURGE_PERCENT) {
        out.push(format!("Significantly increased trading volume (+{:.1}%)", round_tenth(change)));
    }

    if social
        .and_then(|s| s.twitter_mentions)
        .is_some_and(|m| m > HIGH_TWITTER_MENTIONS)
    {
        out.push("High social media engagement and community interest".to_string());
    }

    out
}

/// One decimal place, halves away from zero.
fn round_tenth(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
