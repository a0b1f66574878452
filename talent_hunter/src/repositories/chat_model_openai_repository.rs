use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::info;

use crate::{
    configuration::ChatModelSettings,
    domain::entities::chat_message::{ChatMessage, ToolCallRequest},
    ports::chat_model::{ChatModel, ChatModelError, ModelReply, ToolSpec},
};

/// Chat model reached through an OpenAI-compatible `/chat/completions` API
pub struct ChatModelOpenAIRepository {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Secret<String>,
    model: String,
}

impl ChatModelOpenAIRepository {
    pub fn try_new(settings: &ChatModelSettings) -> Result<Self, ChatModelError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()?;

        Ok(Self {
            http_client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
        })
    }

    fn request_body(&self, messages: &[ChatMessage], tools: &[ToolSpec], temperature: f32) -> JsonValue {
        let mut body = json!({
            "model": self.model,
            "temperature": temperature,
            "messages": messages.iter().map(message_to_json).collect::<Vec<_>>(),
        });

        if !tools.is_empty() {
            body["tools"] = tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        },
                    })
                })
                .collect();
        }

        body
    }
}

#[async_trait]
impl ChatModel for ChatModelOpenAIRepository {
    #[tracing::instrument(
        name = "Calling chat model",
        skip(self, messages, tools),
        fields(model = %self.model, nb_messages = messages.len())
    )]
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        temperature: f32,
    ) -> Result<ModelReply, ChatModelError> {
        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.request_body(messages, tools, temperature))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatModelError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletionResponse = response.json().await?;
        let message = completion
            .choices
            .into_iter()
            .next()
            .ok_or(ChatModelError::EmptyResponse)?
            .message;

        let reply = ModelReply {
            content: message.content.filter(|content| !content.is_empty()),
            tool_calls: message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|tool_call| ToolCallRequest {
                    id: tool_call.id,
                    name: tool_call.function.name,
                    arguments: tool_call.function.arguments,
                })
                .collect(),
        };

        info!(nb_tool_calls = reply.tool_calls.len(), "Chat model replied");
        Ok(reply)
    }
}

fn message_to_json(message: &ChatMessage) -> JsonValue {
    match message {
        ChatMessage::System { content } => json!({ "role": "system", "content": content }),
        ChatMessage::Human { content } => json!({ "role": "user", "content": content }),
        ChatMessage::Ai {
            content,
            tool_calls,
        } if !tool_calls.is_empty() => json!({
            "role": "assistant",
            "content": if content.is_empty() { JsonValue::Null } else { json!(content) },
            "tool_calls": tool_calls
                .iter()
                .map(|tool_call| json!({
                    "id": tool_call.id,
                    "type": "function",
                    "function": { "name": tool_call.name, "arguments": tool_call.arguments },
                }))
                .collect::<Vec<_>>(),
        }),
        ChatMessage::Ai { content, .. } => json!({ "role": "assistant", "content": content }),
        ChatMessage::Tool {
            tool_call_id,
            content,
        } => json!({ "role": "tool", "tool_call_id": tool_call_id, "content": content }),
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ChatCompletionToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionToolCall {
    id: String,
    function: ChatCompletionFunction,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionFunction {
    name: String,
    arguments: String,
}
