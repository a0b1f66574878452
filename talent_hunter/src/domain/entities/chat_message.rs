use serde::{Deserialize, Serialize};

/// A message of a conversation between a user, the model and the tools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    System {
        content: String,
    },
    Human {
        content: String,
    },
    Ai {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

impl ChatMessage {
    /// Builds a message from a role name as sent by chat clients
    ///
    /// Both the `human`/`ai` and `user`/`assistant` conventions are accepted.
    pub fn from_role(role: &str, content: String) -> Result<Self, UnknownRoleError> {
        match role.to_lowercase().as_str() {
            "human" | "user" => Ok(Self::Human { content }),
            "ai" | "assistant" => Ok(Self::Ai {
                content,
                tool_calls: vec![],
            }),
            "system" => Ok(Self::System { content }),
            _ => Err(UnknownRoleError(role.to_string())),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::System { content }
            | Self::Human { content }
            | Self::Ai { content, .. }
            | Self::Tool { content, .. } => content,
        }
    }
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    /// JSON-encoded arguments, as produced by the model
    pub arguments: String,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown message role: {0}")]
pub struct UnknownRoleError(pub String);
