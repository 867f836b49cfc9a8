use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Bullish,
    Bearish,
    Sideways,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Bullish => "bullish",
            TrendDirection::Bearish => "bearish",
            TrendDirection::Sideways => "sideways",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bullish" | "up" | "uptrend" => Some(TrendDirection::Bullish),
            "bearish" | "down" | "downtrend" => Some(TrendDirection::Bearish),
            "sideways" | "flat" | "range" => Some(TrendDirection::Sideways),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeLevel {
    High,
    Normal,
    Low,
}

impl VolumeLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Some(VolumeLevel::High),
            "normal" => Some(VolumeLevel::Normal),
            "low" => Some(VolumeLevel::Low),
            _ => None,
        }
    }
}

/// Reading of an uploaded price chart, as returned by the vision classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartAnalysisResult {
    pub support_level: Option<f64>,
    pub resistance_level: Option<f64>,
    pub trend_direction: TrendDirection,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub volume: VolumeLevel,
    pub prediction: String,
    pub confidence: f64,
    pub key_findings: Vec<String>,
}

impl ChartAnalysisResult {
    pub const NO_PREDICTION: &'static str = "No clear prediction available from chart analysis.";

    /// Stand-in stored when the classifier call fails.
    pub fn unavailable() -> Self {
        Self {
            support_level: None,
            resistance_level: None,
            trend_direction: TrendDirection::Sideways,
            rsi: None,
            macd: None,
            volume: VolumeLevel::Normal,
            prediction: "Chart analysis unavailable due to technical error.".to_string(),
            confidence: 0.1,
            key_findings: vec![
                "Analysis unavailable - please try uploading the chart again".to_string(),
            ],
        }
    }
}

/// Base64 image payload handed to the vision classifier.
#[derive(Debug, Clone)]
pub struct ChartImage {
    pub media_type: String,
    pub data_base64: String,
}

impl ChartImage {
    pub fn try_new(media_type: Option<&str>, data_base64: &str) -> anyhow::Result<Self> {
        let data = data_base64.trim();
        // Accept data URLs as well as bare base64.
        let (media_type, data) = match data.strip_prefix("data:") {
            Some(rest) => {
                let (meta, payload) = rest
                    .split_once(',')
                    .ok_or_else(|| anyhow::anyhow!("malformed data URL"))?;
                let mt = meta.trim_end_matches(";base64").to_string();
                (mt, payload.trim())
            }
            None => (
                media_type.unwrap_or("image/jpeg").trim().to_string(),
                data,
            ),
        };

        anyhow::ensure!(!data.is_empty(), "chart image must be non-empty");
        anyhow::ensure!(
            matches!(
                media_type.as_str(),
                "image/jpeg" | "image/png" | "image/gif" | "image/webp"
            ),
            "unsupported chart media type: {media_type}"
        );

        Ok(Self {
            media_type,
            data_base64: data.to_string(),
        })
    }
}
