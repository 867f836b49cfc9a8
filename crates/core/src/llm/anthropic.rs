use crate::config::Settings;
use crate::domain::chart::{ChartAnalysisResult, ChartImage};
use crate::domain::contract::{LlmChartAnalysis, LlmSentiment, SentimentClassification};
use crate::llm::error::{FailureStage, LlmDiagnosticsError, LlmTask};
use crate::llm::json;
use crate::llm::{LlmClient, Provider};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

const TOOL_NAME_EMIT_SENTIMENT: &str = "emit_sentiment";
const TOOL_NAME_EMIT_CHART_ANALYSIS: &str = "emit_chart_analysis";

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_anthropic_api_key()?.to_string();
        let base_url =
            std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let max_tokens = std::env::var("ANTHROPIC_MAX_TOKENS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_TOKENS);

        let timeout_secs = std::env::var("ANTHROPIC_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            model,
            max_tokens,
        })
    }

    async fn create_message(
        &self,
        task: LlmTask,
        req: CreateMessageRequest,
    ) -> anyhow::Result<(serde_json::Value, CreateMessageResponse)> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(&self.api_key)?);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .headers(headers)
            .json(&req)
            .send()
            .await
            .context("Anthropic request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Anthropic response body")?;
        if !status.is_success() {
            let raw_response_json = serde_json::from_str::<serde_json::Value>(&text).ok();
            return Err(LlmDiagnosticsError {
                provider: Provider::Anthropic,
                task,
                stage: FailureStage::Http {
                    status: status.as_u16(),
                },
                detail: format!("status={status}"),
                raw_output: Some(text),
                raw_response_json,
            }
            .into());
        }

        let raw_json = serde_json::from_str::<serde_json::Value>(&text)
            .with_context(|| format!("failed to parse Anthropic response JSON: {text}"))?;
        let parsed = serde_json::from_value::<CreateMessageResponse>(raw_json.clone())
            .context("failed to decode Anthropic response into CreateMessageResponse")?;
        Ok((raw_json, parsed))
    }

    fn sentiment_tool() -> Tool {
        let schema = serde_json::json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["sentiment", "score", "confidence", "keyPoints"],
            "properties": {
                "sentiment": {"type": "string", "enum": ["positive", "negative", "neutral"]},
                "score": {"type": "number", "minimum": 0, "maximum": 100},
                "confidence": {"type": "number", "minimum": 0, "maximum": 1},
                "keyPoints": {"type": "array", "items": {"type": "string"}, "maxItems": 5}
            }
        });

        Tool {
            name: TOOL_NAME_EMIT_SENTIMENT,
            description: "Emit the sentiment verdict for the article as structured JSON",
            input_schema: schema,
        }
    }

    fn chart_tool() -> Tool {
        let schema = serde_json::json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["trendDirection", "volume", "prediction", "confidence", "keyFindings"],
            "properties": {
                "supportLevel": {"type": ["number", "null"]},
                "resistanceLevel": {"type": ["number", "null"]},
                "trendDirection": {"type": "string", "enum": ["bullish", "bearish", "sideways"]},
                "rsi": {"type": ["number", "null"]},
                "macd": {"type": ["number", "null"]},
                "volume": {"type": "string", "enum": ["high", "normal", "low"]},
                "prediction": {"type": "string"},
                "confidence": {"type": "number", "minimum": 0, "maximum": 1},
                "keyFindings": {"type": "array", "items": {"type": "string"}}
            }
        });

        Tool {
            name: TOOL_NAME_EMIT_CHART_ANALYSIS,
            description: "Emit the technical reading of the chart as structured JSON",
            input_schema: schema,
        }
    }

    fn sentiment_system_prompt() -> String {
        [
            "You are a financial sentiment analysis expert.",
            "Judge market impact, investor psychology and financial implications of the content.",
            "Return ONLY valid JSON. Do not wrap in markdown. Do not include any extra keys.",
            "Output schema:",
            "{\"sentiment\": \"positive|negative|neutral\", \"score\": 0-100, \"confidence\": 0-1, \"keyPoints\": [\"point\"]}",
        ]
        .join("\n")
    }

    fn sentiment_user_prompt(text: &str, symbol: &str) -> String {
        format!(
            "Analyze the sentiment of this financial news about {symbol}.\n\nContent:\n{text}"
        )
    }

    fn chart_system_prompt() -> String {
        [
            "You are a professional technical analyst.",
            "Read trading charts for support/resistance levels, trend, momentum and visible indicators.",
            "Give numeric values only where they are legible on the chart; use null otherwise.",
            "Return ONLY valid JSON. Do not wrap in markdown.",
        ]
        .join("\n")
    }

    fn chart_user_prompt(symbol: &str) -> String {
        format!(
            "Analyze this trading chart for {symbol}. Cover RSI, MACD and volume if visible, \
support and resistance, trend direction and momentum, and a price outlook with a confidence level."
        )
    }

    fn repair_prompt(previous_output: &str, schema_hint: &str) -> String {
        format!(
            "Your previous message was NOT valid JSON.\n\n\
TASK: Output ONLY a single JSON object that matches this schema:\n{schema_hint}\n\
- Do NOT include any markdown, prose, or code fences.\n\
- Use double quotes for all JSON strings.\n\n\
INVALID OUTPUT (for reference only; DO NOT copy verbatim):\n{previous_output}"
        )
    }

    fn response_text(res: &CreateMessageResponse) -> String {
        let mut out = String::new();
        for block in &res.content {
            if let ContentBlock::Text { text } = block {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(text);
            }
        }
        out
    }

    fn response_tool_input(res: &CreateMessageResponse, tool: &str) -> Option<serde_json::Value> {
        res.content.iter().find_map(|block| match block {
            ContentBlock::ToolUse { name, input, .. } if name == tool => Some(input.clone()),
            _ => None,
        })
    }

    fn request(
        &self,
        system: String,
        content: MessageContent,
        tool: Option<Tool>,
        max_tokens: u32,
        temperature: f32,
    ) -> CreateMessageRequest {
        let tool_choice = tool.as_ref().map(|t| ToolChoice::Tool { name: t.name });
        CreateMessageRequest {
            model: self.model.clone(),
            max_tokens,
            system: Some(system),
            messages: vec![Message {
                role: "user",
                content,
            }],
            tools: tool.map(|t| vec![t]),
            tool_choice,
            temperature: Some(temperature),
        }
    }

    /// Runs a forced-tool request; falls back to parsing the text body, with one repair round.
    async fn structured<T: Send>(
        &self,
        make_req: impl Fn(u32) -> CreateMessageRequest,
        task: LlmTask,
        tool: &'static str,
        decode_tool: fn(serde_json::Value) -> anyhow::Result<T>,
        parse_text: fn(&str) -> anyhow::Result<T>,
        schema_hint: &str,
    ) -> anyhow::Result<T> {
        let (_, mut res) = self.create_message(task, make_req(self.max_tokens)).await?;

        // If the model hit max_tokens, retry once with a higher ceiling.
        if matches!(res.stop_reason.as_deref(), Some("max_tokens")) {
            let bumped = self.max_tokens.saturating_mul(2).max(2048);
            tracing::warn!(
                tool,
                from = self.max_tokens,
                to = bumped,
                "Anthropic stop_reason=max_tokens; retrying once with higher max_tokens"
            );
            res = self.create_message(task, make_req(bumped)).await?.1;
        }

        if let Some(input) = Self::response_tool_input(&res, tool) {
            return decode_tool(input);
        }

        let text = Self::response_text(&res);
        let first_err = match parse_text(&text) {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };
        tracing::warn!(tool, error = %first_err, "LLM output invalid; attempting repair");

        let repair_req = self.request(
            "Return ONLY valid JSON. Do not wrap in markdown.".to_string(),
            MessageContent::Text(Self::repair_prompt(&text, schema_hint)),
            None,
            self.max_tokens,
            0.0,
        );
        let (repair_raw_json, repair_res) = self.create_message(task, repair_req).await?;
        let repair_text = Self::response_text(&repair_res);
        match parse_text(&repair_text) {
            Ok(v) => Ok(v),
            Err(err) => Err(LlmDiagnosticsError {
                provider: Provider::Anthropic,
                task,
                stage: FailureStage::ParseAfterRepair,
                detail: format!("tool={tool}, first_error={first_err}, final_error={err}"),
                raw_output: Some(repair_text),
                raw_response_json: Some(repair_raw_json),
            }
            .into()),
        }
    }
}

fn decode_sentiment_tool(input: serde_json::Value) -> anyhow::Result<SentimentClassification> {
    let parsed = serde_json::from_value::<LlmSentiment>(input)
        .context("failed to decode tool_use.input into LlmSentiment")?;
    Ok(parsed.into_classification())
}

fn decode_chart_tool(input: serde_json::Value) -> anyhow::Result<ChartAnalysisResult> {
    let parsed = serde_json::from_value::<LlmChartAnalysis>(input)
        .context("failed to decode tool_use.input into LlmChartAnalysis")?;
    Ok(parsed.into_result())
}

#[async_trait::async_trait]
impl LlmClient for AnthropicClient {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn classify_sentiment(
        &self,
        text: &str,
        symbol: &str,
    ) -> anyhow::Result<SentimentClassification> {
        let make_req = |max_tokens: u32| {
            self.request(
                Self::sentiment_system_prompt(),
                MessageContent::Text(Self::sentiment_user_prompt(text, symbol)),
                Some(Self::sentiment_tool()),
                max_tokens,
                0.3,
            )
        };

        self.structured(
            make_req,
            LlmTask::Sentiment,
            TOOL_NAME_EMIT_SENTIMENT,
            decode_sentiment_tool,
            json::parse_sentiment,
            "{\"sentiment\": \"positive|negative|neutral\", \"score\": 0-100, \"confidence\": 0-1, \"keyPoints\": []}",
        )
        .await
    }

    async fn analyze_chart(
        &self,
        image: &ChartImage,
        symbol: &str,
    ) -> anyhow::Result<ChartAnalysisResult> {
        let make_req = |max_tokens: u32| {
            self.request(
                Self::chart_system_prompt(),
                MessageContent::Blocks(vec![
                    InputBlock::Image {
                        source: ImageSource {
                            kind: "base64",
                            media_type: image.media_type.clone(),
                            data: image.data_base64.clone(),
                        },
                    },
                    InputBlock::Text {
                        text: Self::chart_user_prompt(symbol),
                    },
                ]),
                Some(Self::chart_tool()),
                max_tokens,
                0.2,
            )
        };

        self.structured(
            make_req,
            LlmTask::ChartAnalysis,
            TOOL_NAME_EMIT_CHART_ANALYSIS,
            decode_chart_tool,
            json::parse_chart_analysis,
            "{\"supportLevel\": null, \"resistanceLevel\": null, \"trendDirection\": \"bullish|bearish|sideways\", \"rsi\": null, \"macd\": null, \"volume\": \"high|normal|low\", \"prediction\": \"\", \"confidence\": 0-1, \"keyFindings\": []}",
        )
        .await
    }

    async fn translate(&self, text: &str, target_language: &str) -> anyhow::Result<String> {
        // Leave room for scripts that expand on translation.
        let max_tokens = (text.len() as u32).saturating_mul(2).max(500);
        let req = self.request(
            "You are a professional financial translator. Keep technical and market terminology \
accurate. Reply with the translation only."
                .to_string(),
            MessageContent::Text(format!(
                "Translate the following financial content to {target_language}.\n\n{text}"
            )),
            None,
            max_tokens,
            0.1,
        );

        let (_raw, res) = self.create_message(LlmTask::Translation, req).await?;
        let out = Self::response_text(&res);
        anyhow::ensure!(!out.trim().is_empty(), "empty translation from Anthropic");
        Ok(out.trim().to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
struct CreateMessageRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,

    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Blocks(Vec<InputBlock>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
enum InputBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "image")]
    Image { source: ImageSource },
}

#[derive(Debug, Clone, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: String,
    data: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CreateMessageResponse {
    content: Vec<ContentBlock>,

    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct Tool {
    name: &'static str,
    description: &'static str,
    input_schema: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
enum ToolChoice {
    #[serde(rename = "tool")]
    Tool { name: &'static str },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },

    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sentiment::Sentiment;
    use serde_json::json;

    fn client() -> AnthropicClient {
        AnthropicClient {
            http: reqwest::Client::new(),
            api_key: "test".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    #[test]
    fn decodes_tool_use_sentiment_input() {
        let res: CreateMessageResponse = serde_json::from_value(json!({
            "content": [
                {"type": "thinking", "thinking": "..."},
                {
                    "type": "tool_use",
                    "id": "toolu_1",
                    "name": TOOL_NAME_EMIT_SENTIMENT,
                    "input": {
                        "sentiment": "positive",
                        "score": 78,
                        "confidence": 0.85,
                        "keyPoints": ["record deliveries"]
                    }
                }
            ],
            "stop_reason": "tool_use"
        }))
        .unwrap();

        let input = AnthropicClient::response_tool_input(&res, TOOL_NAME_EMIT_SENTIMENT).unwrap();
        let c = decode_sentiment_tool(input).unwrap();
        assert_eq!(c.label.sentiment, Sentiment::Positive);
        assert_eq!(c.label.score, 78.0);
        assert!(AnthropicClient::response_tool_input(&res, TOOL_NAME_EMIT_CHART_ANALYSIS).is_none());
    }

    #[test]
    fn joins_text_blocks() {
        let res: CreateMessageResponse = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "first"},
                {"type": "text", "text": "second"}
            ]
        }))
        .unwrap();
        assert_eq!(AnthropicClient::response_text(&res), "first\nsecond");
    }

    #[test]
    fn chart_request_serializes_image_block_first() {
        let c = client();
        let req = c.request(
            AnthropicClient::chart_system_prompt(),
            MessageContent::Blocks(vec![
                InputBlock::Image {
                    source: ImageSource {
                        kind: "base64",
                        media_type: "image/png".to_string(),
                        data: "AAAA".to_string(),
                    },
                },
                InputBlock::Text {
                    text: "read it".to_string(),
                },
            ]),
            Some(AnthropicClient::chart_tool()),
            512,
            0.2,
        );

        let v = serde_json::to_value(&req).unwrap();
        let content = &v["messages"][0]["content"];
        assert_eq!(content[0]["type"], "image");
        assert_eq!(content[0]["source"]["type"], "base64");
        assert_eq!(content[0]["source"]["media_type"], "image/png");
        assert_eq!(content[1]["type"], "text");
        assert_eq!(v["tool_choice"]["type"], "tool");
        assert_eq!(v["tool_choice"]["name"], TOOL_NAME_EMIT_CHART_ANALYSIS);
    }

    #[test]
    fn text_request_has_no_tools() {
        let c = client();
        let req = c.request(
            String::new(),
            MessageContent::Text("hi".to_string()),
            None,
            100,
            0.1,
        );
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["messages"][0]["content"], "hi");
        assert!(v.get("tools").is_none());
        assert!(v.get("tool_choice").is_none());
    }
}
