use async_trait::async_trait;
use common::helper::error_chain_fmt;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::domain::entities::chat_message::{ChatMessage, ToolCallRequest};

/// A language model able to answer a conversation or to request tool calls
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        temperature: f32,
    ) -> Result<ModelReply, ChatModelError>;
}

/// Describes a tool to the model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// JSON schema of the arguments
    pub parameters: JsonValue,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ModelReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: vec![],
        }
    }

    pub fn tool_calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: None,
            tool_calls,
        }
    }
}

#[derive(thiserror::Error)]
pub enum ChatModelError {
    #[error("Chat model request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Chat model answered with status {status}: {body}")]
    ApiError { status: u16, body: String },
    #[error("Chat model answered without any choice")]
    EmptyResponse,
}

impl std::fmt::Debug for ChatModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
