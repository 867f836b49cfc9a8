pub mod http;

use crate::domain::insights::SocialMetrics;
use crate::domain::records::TimeRange;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNewsArticle {
    pub title: String,
    pub content: String,
    pub url: Option<String>,
    pub source: String,
    pub published_at: DateTime<Utc>,
    /// ISO 639-1 code when the feed reports one.
    pub language: Option<String>,
}

impl RawNewsArticle {
    /// Text handed to the sentiment classifier.
    pub fn classification_text(&self) -> String {
        if self.content.trim().is_empty() {
            self.title.clone()
        } else {
            format!("{}\n\n{}", self.title, self.content)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialPlatformStats {
    pub platform: String,
    #[serde(default)]
    pub mentions: Option<u64>,
    #[serde(default)]
    pub discussions: Option<u64>,
    #[serde(default)]
    pub community_score: Option<f64>,
}

impl SocialMetrics {
    /// Twitter contributes mentions; Reddit contributes discussions and the community score.
    /// Other platforms are ignored and a repeated platform overwrites the earlier entry.
    pub fn from_platforms(stats: &[SocialPlatformStats]) -> Self {
        stats.iter().fold(SocialMetrics::default(), |mut acc, s| {
            match s.platform.trim().to_ascii_lowercase().as_str() {
                "twitter" => acc.twitter_mentions = s.mentions,
                "reddit" => {
                    acc.reddit_discussions = s.discussions;
                    acc.community_score = s.community_score;
                }
                _ => {}
            }
            acc
        })
    }
}

#[async_trait::async_trait]
pub trait NewsProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_articles(
        &self,
        symbol: &str,
        time_range: TimeRange,
        deep_search: bool,
    ) -> anyhow::Result<Vec<RawNewsArticle>>;

    /// `Ok(None)` when the feed has nothing for the symbol.
    async fn fetch_social(&self, symbol: &str) -> anyhow::Result<Option<SocialMetrics>>;
}

/// Drops articles published before the range cutoff, keeping feed order.
pub fn filter_by_time_range(
    articles: Vec<RawNewsArticle>,
    time_range: TimeRange,
    now: DateTime<Utc>,
) -> Vec<RawNewsArticle> {
    let cutoff = time_range.cutoff(now);
    articles
        .into_iter()
        .filter(|a| a.published_at >= cutoff)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn article(title: &str, published_at: DateTime<Utc>) -> RawNewsArticle {
        RawNewsArticle {
            title: title.to_string(),
            content: String::new(),
            url: None,
            source: "wire".to_string(),
            published_at,
            language: None,
        }
    }

    #[test]
    fn time_range_filter_keeps_recent_in_order() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let items = vec![
            article("a", now - Duration::days(1)),
            article("old", now - Duration::days(8)),
            article("b", now - Duration::days(7)),
        ];

        let week: Vec<_> = filter_by_time_range(items.clone(), TimeRange::Week, now)
            .into_iter()
            .map(|a| a.title)
            .collect();
        assert_eq!(week, vec!["a", "b"]);

        assert_eq!(filter_by_time_range(items, TimeRange::Month, now).len(), 3);
    }

    #[test]
    fn classification_text_falls_back_to_title() {
        let now = Utc::now();
        let mut a = article("Headline", now);
        assert_eq!(a.classification_text(), "Headline");
        a.content = "Body".to_string();
        assert_eq!(a.classification_text(), "Headline\n\nBody");
    }

    #[test]
    fn folds_platform_stats() {
        let stats = vec![
            SocialPlatformStats {
                platform: "Twitter".to_string(),
                mentions: Some(1_500),
                discussions: None,
                community_score: None,
            },
            SocialPlatformStats {
                platform: "reddit".to_string(),
                mentions: Some(10),
                discussions: Some(320),
                community_score: Some(7.5),
            },
            SocialPlatformStats {
                platform: "twitter".to_string(),
                mentions: Some(2_200),
                discussions: None,
                community_score: None,
            },
            SocialPlatformStats {
                platform: "telegram".to_string(),
                mentions: Some(99),
                discussions: Some(99),
                community_score: Some(1.0),
            },
        ];

        let m = SocialMetrics::from_platforms(&stats);
        assert_eq!(m.twitter_mentions, Some(2_200));
        assert_eq!(m.reddit_discussions, Some(320));
        assert_eq!(m.community_score, Some(7.5));
    }

    #[test]
    fn no_stats_is_empty() {
        assert_eq!(SocialMetrics::from_platforms(&[]), SocialMetrics::default());
    }
}
