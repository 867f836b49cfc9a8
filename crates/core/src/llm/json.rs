use crate::domain::chart::ChartAnalysisResult;
use crate::domain::contract::{LlmChartAnalysis, LlmSentiment, SentimentClassification};
use anyhow::Context;

pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        // Remove Markdown fences (```json ... ``` or ``` ... ```).
        let mut inner = trimmed;
        if let Some(after_first) = inner.splitn(2, '\n').nth(1) {
            inner = after_first;
        }
        if let Some(end) = inner.rfind("```") {
            inner = &inner[..end];
        }
        return Some(inner.trim().to_string());
    }

    // Best-effort extraction: first '{' to last '}'.
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].trim().to_string())
}

pub fn parse_sentiment(text: &str) -> anyhow::Result<SentimentClassification> {
    let json_str = extract_json(text).unwrap_or_else(|| text.trim().to_string());
    let parsed = serde_json::from_str::<LlmSentiment>(&json_str)
        .with_context(|| format!("LLM output is not valid JSON for sentiment schema: {json_str}"))?;
    Ok(parsed.into_classification())
}

pub fn parse_chart_analysis(text: &str) -> anyhow::Result<ChartAnalysisResult> {
    let json_str = extract_json(text).unwrap_or_else(|| text.trim().to_string());
    let parsed = serde_json::from_str::<LlmChartAnalysis>(&json_str).with_context(|| {
        format!("LLM output is not valid JSON for chart analysis schema: {json_str}")
    })?;
    Ok(parsed.into_result())
}
