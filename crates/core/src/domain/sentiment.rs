use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }

    /// Lenient parse used for classifier output and stored rows. Anything that is not one of
    /// the three labels comes back as `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Some(Sentiment::Positive),
            "neutral" => Some(Sentiment::Neutral),
            "negative" => Some(Sentiment::Negative),
            _ => None,
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-article classifier verdict. Only `sentiment` feeds the aggregate breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentLabel {
    pub sentiment: Sentiment,
    /// 0..=100
    pub score: f64,
    /// 0..=1
    pub confidence: f64,
}

impl SentimentLabel {
    pub fn new(sentiment: Sentiment, score: f64, confidence: f64) -> Self {
        Self {
            sentiment,
            score,
            confidence,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentCounts {
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

impl SentimentCounts {
    pub fn tally<I>(sentiments: I) -> Self
    where
        I: IntoIterator<Item = Sentiment>,
    {
        let mut out = Self::default();
        for s in sentiments {
            match s {
                Sentiment::Positive => out.positive += 1,
                Sentiment::Neutral => out.neutral += 1,
                Sentiment::Negative => out.negative += 1,
            }
        }
        out
    }

    pub fn total(&self) -> usize {
        self.positive + self.neutral + self.negative
    }
}

/// Share of positive / neutral / negative articles, in percent.
///
/// Values are kept at full precision; rounding is left to whoever renders them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SentimentBreakdown {
    pub positive_percent: f64,
    pub neutral_percent: f64,
    pub negative_percent: f64,
}

impl SentimentBreakdown {
    pub fn from_counts(counts: SentimentCounts) -> Self {
        let total = counts.total();
        if total == 0 {
            return Self::default();
        }

        let pct = |count: usize| 100.0 * count as f64 / total as f64;
        Self {
            positive_percent: pct(counts.positive),
            neutral_percent: pct(counts.neutral),
            negative_percent: pct(counts.negative),
        }
    }
}

pub fn aggregate(labels: &[SentimentLabel]) -> SentimentBreakdown {
    SentimentBreakdown::from_counts(SentimentCounts::tally(labels.iter().map(|l| l.sentiment)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(p: usize, n: usize, g: usize) -> Vec<SentimentLabel> {
        let mut out = Vec::new();
        out.extend((0..p).map(|_| SentimentLabel::new(Sentiment::Positive, 80.0, 0.9)));
        out.extend((0..n).map(|_| SentimentLabel::new(Sentiment::Neutral, 50.0, 0.5)));
        out.extend((0..g).map(|_| SentimentLabel::new(Sentiment::Negative, 20.0, 0.7)));
        out
    }

    #[test]
    fn empty_input_is_all_zero() {
        let b = aggregate(&[]);
        assert_eq!(b, SentimentBreakdown::default());
        assert_eq!(b.positive_percent, 0.0);
        assert_eq!(b.neutral_percent, 0.0);
        assert_eq!(b.negative_percent, 0.0);
    }

    #[test]
    fn percentages_match_counts_and_sum_to_100() {
        for (p, n, g) in [(1, 0, 0), (1, 1, 1), (2, 5, 0), (7, 3, 11), (0, 0, 4)] {
            let total = (p + n + g) as f64;
            let b = aggregate(&labels(p, n, g));
            assert_eq!(b.positive_percent, 100.0 * p as f64 / total);
            assert_eq!(b.neutral_percent, 100.0 * n as f64 / total);
            assert_eq!(b.negative_percent, 100.0 * g as f64 / total);

            let sum = b.positive_percent + b.neutral_percent + b.negative_percent;
            assert!((sum - 100.0).abs() < 1e-9, "sum={sum} for ({p},{n},{g})");
        }
    }

    #[test]
    fn does_not_round() {
        let b = aggregate(&labels(1, 1, 1));
        assert!(b.positive_percent > 33.33 && b.positive_percent < 33.34);
        assert_ne!(b.positive_percent, 33.3);
    }

    #[test]
    fn ignores_score_and_confidence() {
        let a = vec![SentimentLabel::new(Sentiment::Positive, 1.0, 0.0)];
        let b = vec![SentimentLabel::new(Sentiment::Positive, 99.0, 1.0)];
        assert_eq!(aggregate(&a), aggregate(&b));
    }

    #[test]
    fn parse_is_lenient_on_case_and_whitespace() {
        assert_eq!(Sentiment::parse(" Positive "), Some(Sentiment::Positive));
        assert_eq!(Sentiment::parse("NEGATIVE"), Some(Sentiment::Negative));
        assert_eq!(Sentiment::parse("mixed"), None);
    }
}
