//! Tool registry and call dispatcher.
//!
//! Dispatch is split in two: [`ToolRegistry::prepare`] resolves and validates
//! synchronously, so callers can run it in inbound order, and
//! [`PreparedCall::invoke`] awaits the handler and may run on its own task.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::protocol::{CallError, ToolCallParams, ToolResult};
use crate::schema::ValidatedInput;
use crate::tool::ToolDescriptor;

/// Reply text when a handler panics; the panic payload stays in the logs.
pub const TOOL_PANICKED: &str = "tool execution failed";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),
    #[error("tool '{name}' declares an invalid input schema: {detail}")]
    InvalidSchema { name: String, detail: String },
}

/// Advertised view of a tool: never includes the handler.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Set of uniquely named tools. Read-only once the server starts.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<ToolDescriptor>>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: ToolDescriptor) -> Result<(), RegistryError> {
        if self.by_name.contains_key(&descriptor.name) {
            return Err(RegistryError::DuplicateTool(descriptor.name));
        }

        descriptor
            .input_schema
            .check()
            .map_err(|detail| RegistryError::InvalidSchema {
                name: descriptor.name.clone(),
                detail,
            })?;

        self.by_name.insert(descriptor.name.clone(), self.tools.len());
        self.tools.push(Arc::new(descriptor));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ToolDescriptor>> {
        self.by_name.get(name).map(|&i| &self.tools[i])
    }

    /// The capability declaration, in registration order.
    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.tools
            .iter()
            .map(|t| ToolInfo {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.input_schema.to_json_schema(),
            })
            .collect()
    }

    /// Resolve the tool and validate arguments. Never invokes a handler.
    pub fn prepare(&self, request: &ToolCallParams) -> Result<PreparedCall, CallError> {
        let tool = self
            .get(&request.name)
            .ok_or_else(|| CallError::UnknownTool(request.name.clone()))?;

        let input = tool
            .input_schema
            .validate(request.arguments.as_ref())
            .map_err(|source| CallError::InvalidArguments {
                tool: tool.name.clone(),
                source,
            })?;

        Ok(PreparedCall {
            tool: Arc::clone(tool),
            input,
        })
    }

    /// Resolve, validate and invoke in one step.
    pub async fn dispatch(&self, request: &ToolCallParams) -> Result<ToolResult, CallError> {
        let call = self.prepare(request)?;
        Ok(call.invoke().await)
    }
}

/// A resolved tool paired with validated input, ready to run.
#[derive(Debug)]
pub struct PreparedCall {
    tool: Arc<ToolDescriptor>,
    input: ValidatedInput,
}

impl PreparedCall {
    pub fn tool_name(&self) -> &str {
        &self.tool.name
    }

    /// Run the handler. Handler failures, panics included, become `isError`
    /// tool results.
    pub async fn invoke(self) -> ToolResult {
        let name = self.tool.name.clone();
        // Own task so a panicking handler surfaces as a JoinError here.
        let outcome = tokio::spawn(self.tool.handler.call(self.input)).await;
        match outcome {
            Ok(Ok(content)) => ToolResult::success(content),
            Ok(Err(err)) => {
                tracing::warn!(tool = %name, error = %err, "tool execution failed");
                ToolResult::error(err.message)
            }
            Err(join_err) => {
                tracing::error!(tool = %name, error = %join_err, "tool handler panicked");
                ToolResult::error(TOOL_PANICKED)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use crate::protocol::ContentBlock;
    use crate::schema::{Field, InputSchema, ValidationError};
    use crate::tool::{ToolError, ToolOutput};

    fn counting_tool(name: &str, calls: Arc<AtomicUsize>) -> ToolDescriptor {
        ToolDescriptor::new(
            name,
            "test tool",
            InputSchema::new()
                .field(Field::string("query").required())
                .field(Field::integer("page").default_value(1)),
            move |input: ValidatedInput| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let page = input.get_i64("page").unwrap_or_default();
                    Ok::<_, ToolError>(vec![ContentBlock::text(format!("page {page}"))])
                }
            },
        )
    }

    fn call(name: &str, arguments: Value) -> ToolCallParams {
        ToolCallParams {
            name: name.into(),
            arguments: Some(arguments),
        }
    }

    #[test]
    fn duplicate_names_are_rejected_without_replacing() {
        let first_calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        registry
            .register(counting_tool("search", Arc::clone(&first_calls)))
            .unwrap();

        let mut replacement = counting_tool("search", Arc::new(AtomicUsize::new(0)));
        replacement.description = "replacement".into();
        let err = registry.register(replacement).unwrap_err();

        assert_eq!(err, RegistryError::DuplicateTool("search".into()));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.list_tools()[0].description, "test tool");
    }

    #[test]
    fn invalid_schema_is_rejected() {
        let mut registry = ToolRegistry::new();
        let bad = ToolDescriptor::new(
            "bad",
            "bad defaults",
            InputSchema::new().field(Field::boolean("flag").default_value("maybe")),
            |_input: ValidatedInput| async { Ok::<Vec<ContentBlock>, ToolError>(Vec::new()) },
        );
        assert!(matches!(
            registry.register(bad),
            Err(RegistryError::InvalidSchema { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn list_tools_exposes_declarations_in_order() {
        let mut registry = ToolRegistry::new();
        registry
            .register(counting_tool("b_tool", Arc::new(AtomicUsize::new(0))))
            .unwrap();
        registry
            .register(counting_tool("a_tool", Arc::new(AtomicUsize::new(0))))
            .unwrap();

        let value = serde_json::to_value(registry.list_tools()).unwrap();
        assert_eq!(value[0]["name"], json!("b_tool"));
        assert_eq!(value[1]["name"], json!("a_tool"));
        assert_eq!(value[0]["inputSchema"]["required"], json!(["query"]));
        assert!(value[0].get("handler").is_none());
    }

    #[tokio::test]
    async fn dispatch_invokes_exactly_once_with_defaults() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        registry
            .register(counting_tool("search", Arc::clone(&calls)))
            .unwrap();

        let result = registry
            .dispatch(&call("search", json!({"query": "cats"})))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!result.is_error);
        assert_eq!(result.content[0].as_text(), Some("page 1"));
    }

    #[tokio::test]
    async fn unknown_tool_never_invokes_a_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        registry
            .register(counting_tool("search", Arc::clone(&calls)))
            .unwrap();

        let err = registry
            .dispatch(&call("nonexistent", json!({})))
            .await
            .unwrap_err();

        assert_eq!(err, CallError::UnknownTool("nonexistent".into()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_arguments_never_invoke_the_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        registry
            .register(counting_tool("search", Arc::clone(&calls)))
            .unwrap();

        let err = registry
            .dispatch(&call("search", json!({"page": 2})))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            CallError::InvalidArguments {
                tool: "search".into(),
                source: ValidationError::MissingRequiredField("query".into()),
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn handler_failures_become_error_results() {
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolDescriptor::new(
                "fails",
                "always fails",
                InputSchema::new(),
                |_input: ValidatedInput| async {
                    Err::<Vec<ContentBlock>, _>(ToolError::new(
                        "Missing UNSPLASH_ACCESS_KEY environment variable",
                    ))
                },
            ))
            .unwrap();

        let result = registry.dispatch(&call("fails", json!({}))).await.unwrap();
        assert!(result.is_error);
        assert_eq!(
            result.content[0].as_text(),
            Some("Missing UNSPLASH_ACCESS_KEY environment variable")
        );
    }

    async fn panicking_handler(_input: ValidatedInput) -> ToolOutput {
        panic!("handler bug")
    }

    #[tokio::test]
    async fn handler_panic_becomes_error_result() {
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolDescriptor::new(
                "boom",
                "panics",
                InputSchema::new(),
                panicking_handler,
            ))
            .unwrap();

        let result = registry.dispatch(&call("boom", json!({}))).await.unwrap();
        assert!(result.is_error);
        assert_eq!(result.content[0].as_text(), Some(TOOL_PANICKED));
    }
}
