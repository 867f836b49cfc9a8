use crate::llm::Provider;
use serde_json::Value;
use std::fmt;

const PREVIEW_CHARS: usize = 200;

/// Which structured output was being requested when the call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmTask {
    Sentiment,
    ChartAnalysis,
    Translation,
}

impl LlmTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmTask::Sentiment => "sentiment",
            LlmTask::ChartAnalysis => "chart_analysis",
            LlmTask::Translation => "translation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// Non-2xx from the provider.
    Http { status: u16 },
    /// The reply was not a usable JSON object, even after the repair round.
    ParseAfterRepair,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureStage::Http { status } => write!(f, "http {status}"),
            FailureStage::ParseAfterRepair => f.write_str("parse after repair"),
        }
    }
}

/// Carries the provider's raw reply so fallbacks can log what the model actually said.
#[derive(Debug, Clone)]
pub struct LlmDiagnosticsError {
    pub provider: Provider,
    pub task: LlmTask,
    pub stage: FailureStage,
    pub detail: String,
    pub raw_output: Option<String>,
    pub raw_response_json: Option<Value>,
}

impl LlmDiagnosticsError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self.stage, FailureStage::Http { status: 429 })
    }

    pub fn raw_output_preview(&self) -> Option<String> {
        let raw = self.raw_output.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        let mut preview: String = raw.chars().take(PREVIEW_CHARS).collect();
        if raw.chars().count() > PREVIEW_CHARS {
            preview.push_str("...");
        }
        Some(preview)
    }
}

impl fmt::Display for LlmDiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {} request failed at {}: {}",
            self.provider,
            self.task.as_str(),
            self.stage,
            self.detail
        )
    }
}

impl std::error::Error for LlmDiagnosticsError {}

/// Raw model output attached to `err`, if it is an LLM diagnostics error.
pub fn raw_output_preview(err: &anyhow::Error) -> Option<String> {
    err.downcast_ref::<LlmDiagnosticsError>()
        .and_then(LlmDiagnosticsError::raw_output_preview)
}
