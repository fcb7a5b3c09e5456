//! Wire types for the model provider's Messages and Message Batches
//! APIs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize, Debug, Clone)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub system: Vec<SystemBlock>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<WebSearchTool>,
    pub messages: Vec<MessageParam>,
}

#[derive(Serialize, Debug, Clone)]
pub struct SystemBlock {
    #[serde(rename = "type")]
    pub block_type: &'static str,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControl>,
}

impl SystemBlock {
    /// A cacheable system text block.
    #[must_use]
    pub fn cached(text: impl Into<String>) -> Self {
        Self {
            block_type: "text",
            text: text.into(),
            cache_control: Some(CacheControl {
                control_type: "ephemeral",
            }),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct CacheControl {
    #[serde(rename = "type")]
    pub control_type: &'static str,
}

#[derive(Serialize, Debug, Clone)]
pub struct WebSearchTool {
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    pub name: &'static str,
    pub max_uses: u32,
}

impl WebSearchTool {
    #[must_use]
    pub fn new(max_uses: u32) -> Self {
        Self {
            tool_type: "web_search_20250305",
            name: "web_search",
            max_uses,
        }
    }
}

/// A conversation turn. Content is either a plain string (our user
/// prompts) or the raw block array echoed back during `pause_turn`
/// continuation.
#[derive(Serialize, Debug, Clone)]
pub struct MessageParam {
    pub role: &'static str,
    pub content: Value,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct MessagesResponse {
    #[serde(default)]
    pub content: Vec<Value>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: Usage,
}

impl MessagesResponse {
    /// Concatenated text of all text blocks.
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|block| block.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Deserialize, Debug, Clone, Copy, Default)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

// -- Message Batches --

#[derive(Serialize, Debug, Clone)]
pub struct BatchRequest {
    pub requests: Vec<BatchRequestItem>,
}

#[derive(Serialize, Debug, Clone)]
pub struct BatchRequestItem {
    pub custom_id: String,
    pub params: MessagesRequest,
}

#[derive(Deserialize, Debug, Clone)]
pub struct BatchStatus {
    pub id: String,
    #[serde(default)]
    pub processing_status: String,
    #[serde(default)]
    pub results_url: Option<String>,
}

/// One line of the JSONL results stream.
#[derive(Deserialize, Debug, Clone)]
pub struct BatchResultLine {
    pub custom_id: String,
    pub result: BatchResult,
}

#[derive(Deserialize, Debug, Clone)]
pub struct BatchResult {
    #[serde(rename = "type", default)]
    pub result_type: String,
    #[serde(default)]
    pub message: Option<MessagesResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_system_cache_and_tool() {
        let request = MessagesRequest {
            model: "claude-sonnet-4-5".to_string(),
            max_tokens: 4096,
            system: vec![SystemBlock::cached("be a forecaster")],
            tools: vec![WebSearchTool::new(3)],
            messages: vec![MessageParam {
                role: "user",
                content: Value::String("hello".to_string()),
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["system"][0]["cache_control"]["type"], "ephemeral");
        assert_eq!(json["tools"][0]["type"], "web_search_20250305");
        assert_eq!(json["tools"][0]["max_uses"], 3);
        assert_eq!(json["messages"][0]["content"], "hello");
    }

    #[test]
    fn tools_omitted_when_empty() {
        let request = MessagesRequest {
            model: "m".to_string(),
            max_tokens: 16,
            system: vec![SystemBlock::cached("s")],
            tools: Vec::new(),
            messages: Vec::new(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn response_text_joins_text_blocks_only() {
        let json = r#"{
            "content": [
                {"type": "server_tool_use", "name": "web_search"},
                {"type": "text", "text": "first"},
                {"type": "web_search_tool_result", "content": []},
                {"type": "text", "text": "second"}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 20}
        }"#;
        let response: MessagesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.text(), "first\nsecond");
        assert_eq!(response.usage.input_tokens, 10);
    }

    #[test]
    fn batch_result_line_parses_succeeded() {
        let line = r#"{"custom_id": "m-1", "result": {"type": "succeeded",
            "message": {"content": [{"type": "text", "text": "{}"}],
            "usage": {"input_tokens": 5, "output_tokens": 7}}}}"#;
        let parsed: BatchResultLine = serde_json::from_str(line).unwrap();
        assert_eq!(parsed.custom_id, "m-1");
        assert_eq!(parsed.result.result_type, "succeeded");
        assert!(parsed.result.message.is_some());
    }

    #[test]
    fn batch_result_line_parses_errored() {
        let line = r#"{"custom_id": "m-2", "result": {"type": "errored",
            "error": {"type": "invalid_request"}}}"#;
        let parsed: BatchResultLine = serde_json::from_str(line).unwrap();
        assert_eq!(parsed.result.result_type, "errored");
        assert!(parsed.result.message.is_none());
    }
}
