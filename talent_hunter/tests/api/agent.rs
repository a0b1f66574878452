use std::sync::Arc;

use claims::assert_matches;
use futures::StreamExt;
use serde_json::json;
use talent_hunter::{
    agent::{
        graph::{AgentError, AgentRunConfig, TalentHunterAgent},
        tools::SEARCH_CANDIDATE,
    },
    domain::entities::chat_message::ChatMessage,
    ports::chat_model::{ChatModelError, ModelReply},
};

use crate::helpers::{build_talent_store, tool_call, ScriptedChatModel};

/// Every AI message requesting tools must be directly followed by one tool message per call
fn assert_tool_calls_are_answered(messages: &[ChatMessage]) {
    for (index, message) in messages.iter().enumerate() {
        if let ChatMessage::Ai { tool_calls, .. } = message {
            for (offset, tool_call) in tool_calls.iter().enumerate() {
                match messages.get(index + 1 + offset) {
                    Some(ChatMessage::Tool { tool_call_id, .. }) if *tool_call_id == tool_call.id => {}
                    other => panic!("Tool call {} is not answered, got {:?}", tool_call.id, other),
                }
            }
        }
    }
}

async fn build_agent(chat_model: ScriptedChatModel, recursion_limit: usize) -> Arc<TalentHunterAgent> {
    let test = build_talent_store();
    test.store.bootstrap_collections().await.unwrap();

    Arc::new(TalentHunterAgent::new(
        Arc::new(chat_model),
        Arc::new(test.store),
        recursion_limit,
    ))
}

fn config(thread_id: &str) -> AgentRunConfig {
    AgentRunConfig {
        thread_id: thread_id.to_string(),
        user_id: "user_123".to_string(),
        temperature: 0.0,
    }
}

fn human(content: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::Human {
        content: content.to_string(),
    }]
}

#[tokio::test]
async fn turn_stops_when_the_recursion_limit_is_reached() {
    let agent = build_agent(
        ScriptedChatModel::repeating(ModelReply::tool_calls(vec![tool_call(
            "call_1",
            SEARCH_CANDIDATE,
            json!({ "query": "rust" }),
        )])),
        5,
    )
    .await;

    let chunks: Vec<_> = agent.stream(human("Find me someone"), config("t1")).collect().await;

    assert_eq!(chunks.len(), 1);
    assert_matches!(&chunks[0], Err(AgentError::RecursionLimitReached(5)));
}

#[tokio::test]
async fn text_written_alongside_tool_calls_is_streamed() {
    let agent = build_agent(
        ScriptedChatModel::new(vec![
            ModelReply {
                content: Some("Let me look. ".to_string()),
                tool_calls: vec![tool_call("call_1", SEARCH_CANDIDATE, json!({ "query": "rust" }))],
            },
            ModelReply::text("Nobody yet."),
        ]),
        25,
    )
    .await;

    let chunks: Vec<String> = agent
        .stream(human("Find me a Rust developer"), config("t1"))
        .map(|chunk| chunk.unwrap())
        .collect()
        .await;

    assert_eq!(chunks, vec!["Let me look. ", "Nobody yet."]);
}

#[tokio::test]
async fn model_failure_ends_the_stream_with_an_error() {
    let agent = build_agent(ScriptedChatModel::default(), 25).await;

    let chunks: Vec<_> = agent
        .clone()
        .stream(human("Hello"), config("t1"))
        .collect()
        .await;

    assert_eq!(chunks.len(), 1);
    assert_matches!(
        &chunks[0],
        Err(AgentError::ChatModelError(ChatModelError::EmptyResponse))
    );
    // Nothing is saved for a turn without any model answer
    assert!(agent.conversation("t1").is_empty());
}

#[tokio::test]
async fn thread_stays_usable_after_the_recursion_limit() {
    let search = || {
        ModelReply::tool_calls(vec![tool_call(
            "call_1",
            SEARCH_CANDIDATE,
            json!({ "query": "rust" }),
        )])
    };
    let chat_model = Arc::new(ScriptedChatModel::new(vec![
        search(),
        search(),
        ModelReply::text("Nobody matches yet."),
    ]));
    let test = build_talent_store();
    test.store.bootstrap_collections().await.unwrap();
    let agent = Arc::new(TalentHunterAgent::new(
        chat_model.clone(),
        Arc::new(test.store),
        3,
    ));

    let first_turn: Vec<_> = agent
        .clone()
        .stream(human("Find me a Rust developer"), config("t1"))
        .collect()
        .await;
    assert_matches!(
        first_turn.last(),
        Some(Err(AgentError::RecursionLimitReached(3)))
    );

    let saved = agent.conversation("t1");
    assert_tool_calls_are_answered(&saved);
    assert_matches!(saved.last(), Some(ChatMessage::Tool { .. }));

    let second_turn: Vec<String> = agent
        .clone()
        .stream(human("Any news?"), config("t1"))
        .map(|chunk| chunk.unwrap())
        .collect()
        .await;
    assert_eq!(second_turn, vec!["Nobody matches yet."]);

    let requests = chat_model.requests();
    assert_tool_calls_are_answered(requests.last().unwrap());
}
