use std::sync::Arc;

use common::helper::error_chain_fmt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, info_span, Instrument};

use crate::{
    agent::{
        memory::ConversationMemory,
        system_prompt::SYSTEM_PROMPT,
        tools::{run_tool_call, tool_specs},
    },
    domain::{entities::chat_message::ChatMessage, services::talent_store::TalentStore},
    ports::chat_model::{ChatModel, ChatModelError, ModelReply, ToolSpec},
};

/// Options of a single chat turn
#[derive(Debug, Clone)]
pub struct AgentRunConfig {
    pub thread_id: String,
    pub user_id: String,
    pub temperature: f32,
}

/// Tool-using chat agent
///
/// Each turn alternates between two steps until the model answers without requesting tools:
/// - model: the model reads the conversation and answers, or requests tool calls
/// - tools: the requested tool calls run against the talent store, their outputs are appended
///
/// Only the text produced by the model step is streamed back to the caller.
pub struct TalentHunterAgent {
    chat_model: Arc<dyn ChatModel>,
    talent_store: Arc<TalentStore>,
    memory: ConversationMemory,
    tools: Vec<ToolSpec>,
    recursion_limit: usize,
}

impl TalentHunterAgent {
    pub fn new(
        chat_model: Arc<dyn ChatModel>,
        talent_store: Arc<TalentStore>,
        recursion_limit: usize,
    ) -> Self {
        Self {
            chat_model,
            talent_store,
            memory: ConversationMemory::default(),
            tools: tool_specs(),
            recursion_limit,
        }
    }

    pub fn talent_store(&self) -> &Arc<TalentStore> {
        &self.talent_store
    }

    /// Appends `input` to the thread conversation and runs a turn in a background task
    ///
    /// The returned stream yields the model texts, and ends with an error if the turn fails.
    /// Dropping the stream stops the turn after the current step.
    pub fn stream(
        self: Arc<Self>,
        input: Vec<ChatMessage>,
        config: AgentRunConfig,
    ) -> ReceiverStream<Result<String, AgentError>> {
        let (sender, receiver) = mpsc::channel(16);

        let span = info_span!(
            "Running agent turn",
            thread_id = %config.thread_id,
            user_id = %config.user_id,
        );

        tokio::spawn(
            async move {
                if let Err(error) = self.run(input, &config, &sender).await {
                    error!(?error, "Agent turn failed");
                    let _ = sender.send(Err(error)).await;
                }
            }
            .instrument(span),
        );

        ReceiverStream::new(receiver)
    }

    async fn run(
        &self,
        input: Vec<ChatMessage>,
        config: &AgentRunConfig,
        sender: &mpsc::Sender<Result<String, AgentError>>,
    ) -> Result<(), AgentError> {
        let mut messages = self.memory.load(&config.thread_id);
        messages.extend(input);

        let mut nb_steps = 0;

        loop {
            self.next_step(&mut nb_steps)?;
            let reply = self.call_model(&messages, config.temperature).await?;

            // A reply with tool calls is only saved along with its tool messages
            if !reply.tool_calls.is_empty() {
                self.next_step(&mut nb_steps)?;
            }

            if let Some(content) = &reply.content {
                if sender.send(Ok(content.clone())).await.is_err() {
                    info!("Client went away, stopping the turn");
                    self.memory.save(&config.thread_id, &messages);
                    return Ok(());
                }
            }

            let tool_calls = reply.tool_calls.clone();
            messages.push(ChatMessage::Ai {
                content: reply.content.unwrap_or_default(),
                tool_calls: reply.tool_calls,
            });

            if tool_calls.is_empty() {
                self.memory.save(&config.thread_id, &messages);
                info!(nb_steps, "Agent turn done");
                return Ok(());
            }

            for tool_call in &tool_calls {
                messages.push(run_tool_call(tool_call, &self.talent_store).await);
            }
            self.memory.save(&config.thread_id, &messages);
        }
    }

    fn next_step(&self, nb_steps: &mut usize) -> Result<(), AgentError> {
        *nb_steps += 1;
        if *nb_steps > self.recursion_limit {
            return Err(AgentError::RecursionLimitReached(self.recursion_limit));
        }
        Ok(())
    }

    #[tracing::instrument(name = "Model step", skip(self, messages))]
    async fn call_model(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<ModelReply, AgentError> {
        let mut prompt = Vec::with_capacity(messages.len() + 1);
        prompt.push(ChatMessage::System {
            content: SYSTEM_PROMPT.to_string(),
        });
        prompt.extend_from_slice(messages);

        Ok(self
            .chat_model
            .complete(&prompt, &self.tools, temperature)
            .await?)
    }

    /// Messages kept for a thread
    pub fn conversation(&self, thread_id: &str) -> Vec<ChatMessage> {
        self.memory.load(thread_id)
    }

    pub async fn shutdown(&self) {
        self.talent_store.shutdown().await;
    }
}

#[derive(thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    ChatModelError(#[from] ChatModelError),
    #[error("Recursion limit of {0} steps reached without a final answer")]
    RecursionLimitReached(usize),
}

impl std::fmt::Debug for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
