use serde::{Deserialize, Serialize};
use serde_json::json;

use super::request::RpcId;
use crate::schema::ValidationError;

// ---------------------------------------------------------------------------
// JSON-RPC 2.0 response layer
// ---------------------------------------------------------------------------

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// JSON-RPC 2.0 response envelope.
///
/// `id` is serialized as `null` when unknown (e.g. after a parse error).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<RpcId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<RpcId>, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<RpcId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// JSON-RPC 2.0 error object (protocol-level errors).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcError {
    pub fn parse_error() -> Self {
        Self { code: PARSE_ERROR, message: "Parse error".into(), data: None }
    }

    pub fn invalid_request() -> Self {
        Self { code: INVALID_REQUEST, message: "Invalid Request".into(), data: None }
    }

    pub fn invalid_request_with(detail: impl Into<String>) -> Self {
        Self { code: INVALID_REQUEST, message: detail.into(), data: None }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: METHOD_NOT_FOUND,
            message: format!("Method not found: {method}"),
            data: None,
        }
    }

    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self { code: INVALID_PARAMS, message: detail.into(), data: None }
    }

    pub fn internal_error(detail: impl Into<String>) -> Self {
        Self { code: INTERNAL_ERROR, message: detail.into(), data: None }
    }
}

// ---------------------------------------------------------------------------
// MCP tool result layer (returned inside a *successful* JSON-RPC response)
// ---------------------------------------------------------------------------

/// MCP tool call result wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: Vec<ContentBlock>,
    #[serde(rename = "isError", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

/// A single content block inside a tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    /// Base64-encoded image data.
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Resource {
        resource: EmbeddedResource,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedResource {
    pub uri: String,
    #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::Image {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn resource(resource: EmbeddedResource) -> Self {
        Self::Resource { resource }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

impl ToolResult {
    pub fn success(content: Vec<ContentBlock>) -> Self {
        Self { content, is_error: false }
    }

    /// A tool execution failure, reported to the caller as `isError: true`.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            is_error: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-call dispatch failures, reported as JSON-RPC errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallErrorCode {
    UnknownTool,
    InvalidArguments,
}

impl CallErrorCode {
    /// Both kinds are caller mistakes, so they map to -32602 (Invalid params).
    pub fn json_rpc_code(&self) -> i32 {
        match self {
            Self::UnknownTool | Self::InvalidArguments => INVALID_PARAMS,
        }
    }
}

/// A `tools/call` request rejected before its handler ran.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid arguments for {tool}: {source}")]
    InvalidArguments {
        tool: String,
        #[source]
        source: ValidationError,
    },
}

impl CallError {
    pub fn code(&self) -> CallErrorCode {
        match self {
            Self::UnknownTool(_) => CallErrorCode::UnknownTool,
            Self::InvalidArguments { .. } => CallErrorCode::InvalidArguments,
        }
    }

    /// Structured detail carried in the JSON-RPC `data` member.
    pub fn data(&self) -> serde_json::Value {
        match self {
            Self::UnknownTool(tool) => json!({
                "kind": self.code(),
                "tool": tool,
            }),
            Self::InvalidArguments { tool, source } => json!({
                "kind": self.code(),
                "tool": tool,
                "reason": source.reason(),
                "field": source.field(),
            }),
        }
    }
}

/// Convert a dispatch failure into a JSON-RPC error.
///
/// The JSON-RPC `message` is human-readable; the structured kind is in `data`.
impl From<CallError> for JsonRpcError {
    fn from(err: CallError) -> Self {
        Self {
            code: err.code().json_rpc_code(),
            message: err.to_string(),
            data: Some(err.data()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_blocks_are_tagged_by_type() {
        let blocks = vec![
            ContentBlock::text("hi"),
            ContentBlock::image("aGk=", "image/png"),
            ContentBlock::resource(EmbeddedResource {
                uri: "https://unsplash.com/photos/abc".into(),
                mime_type: Some("text/plain".into()),
                text: None,
            }),
        ];
        let value = serde_json::to_value(ToolResult::success(blocks)).unwrap();
        assert_eq!(
            value,
            json!({
                "content": [
                    {"type": "text", "text": "hi"},
                    {"type": "image", "data": "aGk=", "mimeType": "image/png"},
                    {"type": "resource", "resource": {
                        "uri": "https://unsplash.com/photos/abc",
                        "mimeType": "text/plain"
                    }}
                ]
            })
        );
    }

    #[test]
    fn error_results_carry_is_error_flag() {
        let value = serde_json::to_value(ToolResult::error("boom")).unwrap();
        assert_eq!(value["isError"], json!(true));
        assert_eq!(value["content"][0]["text"], json!("boom"));
    }

    #[test]
    fn null_id_is_serialized_for_parse_errors() {
        let resp = JsonRpcResponse::error(None, JsonRpcError::parse_error());
        let value = serde_json::to_value(resp).unwrap();
        assert_eq!(value["id"], serde_json::Value::Null);
        assert_eq!(value["error"]["code"], json!(PARSE_ERROR));
    }

    #[test]
    fn call_errors_map_to_invalid_params_with_structured_data() {
        let err: JsonRpcError = CallError::InvalidArguments {
            tool: "get_photo".into(),
            source: ValidationError::MissingRequiredField("photoId".into()),
        }
        .into();
        assert_eq!(err.code, INVALID_PARAMS);
        assert_eq!(
            err.data.unwrap(),
            json!({
                "kind": "invalid_arguments",
                "tool": "get_photo",
                "reason": "missing_required_field",
                "field": "photoId"
            })
        );

        let err: JsonRpcError = CallError::UnknownTool("nonexistent".into()).into();
        assert_eq!(err.message, "Unknown tool: nonexistent");
        assert_eq!(err.data.unwrap()["kind"], json!("unknown_tool"));
    }
}
