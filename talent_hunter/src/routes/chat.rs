use actix_web::http::header::ContentType;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use common::helper::error_chain_fmt;
use futures::StreamExt;
use serde_json::json;
use tracing::info;

use crate::{
    agent::graph::{AgentRunConfig, TalentHunterAgent},
    domain::entities::chat_message::{ChatMessage, UnknownRoleError},
};

/// Runs a chat turn and streams back the text written by the model
///
/// Tool outputs are never part of the stream.
#[tracing::instrument(
    name = "Chat handler",
    skip(agent, body),
    fields(thread_id = %body.thread_id, user_id = %body.user_id)
)]
pub async fn chat(
    agent: web::Data<TalentHunterAgent>,
    body: web::Json<ChatBodyData>,
) -> Result<HttpResponse, ChatError> {
    let ChatBodyData {
        messages,
        user_id,
        thread_id,
        temperature,
    } = body.into_inner();

    if messages.is_empty() {
        return Err(ChatError::NoMessages);
    }

    let messages = messages
        .into_iter()
        .map(|message| ChatMessage::from_role(&message.role, message.content))
        .collect::<Result<Vec<_>, _>>()?;

    info!(nb_messages = messages.len(), "Starting chat turn");

    let config = AgentRunConfig {
        thread_id,
        user_id,
        temperature,
    };

    let stream = agent
        .into_inner()
        .stream(messages, config)
        .map(|chunk| chunk.map(web::Bytes::from));

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .streaming(stream))
}

#[derive(Debug, serde::Deserialize, serde::Serialize)]
pub struct ChatMessageData {
    pub role: String,
    pub content: String,
}

#[derive(Debug, serde::Deserialize, serde::Serialize)]
pub struct ChatBodyData {
    pub messages: Vec<ChatMessageData>,
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default = "default_thread_id")]
    pub thread_id: String,
    #[serde(default)]
    pub temperature: f32,
}

fn default_user_id() -> String {
    "user_123".to_string()
}

fn default_thread_id() -> String {
    "conversation_1".to_string()
}

#[derive(thiserror::Error)]
pub enum ChatError {
    #[error("At least one message is required")]
    NoMessages,
    #[error(transparent)]
    UnknownRole(#[from] UnknownRoleError),
}

impl std::fmt::Debug for ChatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for ChatError {
    fn status_code(&self) -> StatusCode {
        match self {
            ChatError::NoMessages | ChatError::UnknownRole(_) => StatusCode::BAD_REQUEST,
        }
    }

    #[tracing::instrument(name = "Response error from chat controller", skip(self), fields(error = %self))]
    fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(json!({ "error": self.to_string() }))
    }
}
