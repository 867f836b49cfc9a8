use crate::domain::insights::{generate_insights, SocialMetrics};
use crate::domain::scoring::{CompositeScore, TechnicalIndicators};
use crate::domain::sentiment::{aggregate, SentimentBreakdown, SentimentLabel};
use serde::{Deserialize, Serialize};

/// Output of one scoring run: aggregator, then composite scorer, then insight rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub news_count: usize,
    pub breakdown: SentimentBreakdown,
    pub composite: CompositeScore,
    pub key_insights: Vec<String>,
}

impl AnalysisSummary {
    pub fn compute(
        labels: &[SentimentLabel],
        indicators: &TechnicalIndicators,
        social: Option<&SocialMetrics>,
    ) -> Self {
        let breakdown = aggregate(labels);
        let composite = CompositeScore::compute(&breakdown, indicators);
        let key_insights = generate_insights(&breakdown, indicators, social);

        Self {
            news_count: labels.len(),
            breakdown,
            composite,
            key_insights,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::scoring::{Recommendation, RiskLevel};
    use crate::domain::sentiment::Sentiment;

    #[test]
    fn no_articles_scores_neutral_50() {
        let s = AnalysisSummary::compute(&[], &TechnicalIndicators::default(), None);
        assert_eq!(s.news_count, 0);
        assert_eq!(s.breakdown, SentimentBreakdown::default());
        assert_eq!(s.composite.sentiment_score, 50.0);
        assert_eq!(s.composite.recommendation, Recommendation::Neutral);
        assert_eq!(s.composite.risk_level, RiskLevel::Medium);
        assert!(s.key_insights.is_empty());
    }

    #[test]
    fn four_positive_one_neutral() {
        let mut labels = vec![SentimentLabel::new(Sentiment::Positive, 85.0, 0.9); 4];
        labels.push(SentimentLabel::new(Sentiment::Neutral, 50.0, 0.6));
        let indicators = TechnicalIndicators {
            rsi: Some(55.0),
            volume_change: Some(12.0),
            ..Default::default()
        };
        let social = SocialMetrics {
            twitter_mentions: Some(3100),
            reddit_discussions: Some(180),
            community_score: Some(8.9),
        };

        let s = AnalysisSummary::compute(&labels, &indicators, Some(&social));
        assert_eq!(s.news_count, 5);
        assert_eq!(s.breakdown.positive_percent, 80.0);
        assert_eq!(s.composite.sentiment_score, 130.0);
        assert_eq!(s.composite.recommendation, Recommendation::Bullish);
        assert_eq!(s.composite.risk_level, RiskLevel::High);
        assert_eq!(
            s.key_insights,
            vec![
                "Strong positive sentiment with 80.0% positive news coverage".to_string(),
                "High social media engagement and community interest".to_string(),
            ]
        );
    }
}
