//! Tool descriptors and the handler contract.

use std::future::Future;
use std::sync::Arc;

use crate::protocol::ContentBlock;
use crate::schema::{InputSchema, ValidatedInput};
use crate::transport::BoxFuture;

/// Failure surfaced by a tool handler. The message is shown to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ToolError {
    pub message: String,
}

impl ToolError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for ToolError {
    fn from(err: reqwest::Error) -> Self {
        Self::new(format!("request failed: {err}"))
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(format!("failed to decode response: {err}"))
    }
}

pub type ToolOutput = Result<Vec<ContentBlock>, ToolError>;

/// An asynchronous function from validated input to content blocks.
pub trait ToolHandler: Send + Sync + 'static {
    fn call(&self, input: ValidatedInput) -> BoxFuture<'static, ToolOutput>;
}

impl<F, Fut> ToolHandler for F
where
    F: Fn(ValidatedInput) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ToolOutput> + Send + 'static,
{
    fn call(&self, input: ValidatedInput) -> BoxFuture<'static, ToolOutput> {
        Box::pin(self(input))
    }
}

/// A named, schema-described callable. Immutable once built.
#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
    pub handler: Arc<dyn ToolHandler>,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: InputSchema,
        handler: impl ToolHandler,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            handler: Arc::new(handler),
        }
    }
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .finish_non_exhaustive()
    }
}
