use serde_json::{json, Value as JsonValue};
use talent_hunter::{
    agent::tools::{SEARCH_COMPANY, UPSERT_CANDIDATE},
    domain::entities::chat_message::ChatMessage,
    ports::chat_model::ModelReply,
};

use crate::helpers::{spawn_app, tool_call, ScriptedChatModel};

fn human_turn(thread_id: &str, content: &str) -> JsonValue {
    json!({
        "messages": [{ "role": "human", "content": content }],
        "thread_id": thread_id,
    })
}

#[tokio::test]
async fn chat_streams_the_model_answer() {
    let app = spawn_app(ScriptedChatModel::new(vec![ModelReply::text(
        "Hi! Are you looking for a job or hiring?",
    )]))
    .await;

    let response = app.post_chat(&human_turn("t1", "Hello")).await;

    assert_eq!(200, response.status().as_u16());
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );
    assert_eq!(
        response.text().await.unwrap(),
        "Hi! Are you looking for a job or hiring?"
    );
}

#[tokio::test]
async fn tool_outputs_are_not_streamed() {
    let app = spawn_app(ScriptedChatModel::new(vec![
        ModelReply::tool_calls(vec![tool_call(
            "call_1",
            UPSERT_CANDIDATE,
            json!({ "name": "Jane Doe", "email": "jane@x.com", "resume": "Rust backend engineer" }),
        )]),
        ModelReply::text("You are registered, Jane."),
    ]))
    .await;

    let response = app
        .post_chat(&human_turn("t1", "I am Jane Doe, jane@x.com, Rust backend engineer"))
        .await;

    assert_eq!(response.text().await.unwrap(), "You are registered, Jane.");

    let candidates = app.repository.points("candidates");
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].id, 5458435627);

    // The second model call sees the tool output
    let requests = app.chat_model.requests();
    assert_eq!(requests.len(), 2);
    match requests[1].last() {
        Some(ChatMessage::Tool {
            tool_call_id,
            content,
        }) => {
            assert_eq!(tool_call_id, "call_1");
            assert!(content.contains("registered successfully"));
        }
        other => panic!("Expected a tool message, got {:?}", other),
    }
}

#[tokio::test]
async fn failing_tool_call_is_reported_to_the_model() {
    let app = spawn_app(ScriptedChatModel::new(vec![
        ModelReply::tool_calls(vec![tool_call(
            "call_1",
            SEARCH_COMPANY,
            json!({ "text": "rust" }),
        )]),
        ModelReply::text("Sorry, something went wrong."),
    ]))
    .await;

    let response = app.post_chat(&human_turn("t1", "Any Rust job?")).await;

    assert_eq!(response.text().await.unwrap(), "Sorry, something went wrong.");
    let requests = app.chat_model.requests();
    let tool_output = requests[1].last().unwrap().content().to_string();
    assert!(tool_output.starts_with("Error: "));
    assert!(tool_output.ends_with("Please fix your mistakes."));
}

#[tokio::test]
async fn conversation_is_remembered_per_thread() {
    let app = spawn_app(ScriptedChatModel::new(vec![
        ModelReply::text("Nice to meet you, Jane."),
        ModelReply::text("Your name is Jane."),
        ModelReply::text("I don't know your name."),
    ]))
    .await;

    app.post_chat(&human_turn("t1", "I am Jane"))
        .await
        .text()
        .await
        .unwrap();
    app.post_chat(&human_turn("t1", "What is my name?"))
        .await
        .text()
        .await
        .unwrap();
    app.post_chat(&human_turn("t2", "What is my name?"))
        .await
        .text()
        .await
        .unwrap();

    let requests = app.chat_model.requests();
    let contents = |messages: &[ChatMessage]| -> Vec<String> {
        // Skips the system prompt
        messages[1..]
            .iter()
            .map(|message| message.content().to_string())
            .collect()
    };

    assert_eq!(
        contents(&requests[1]),
        vec!["I am Jane", "Nice to meet you, Jane.", "What is my name?"]
    );
    assert_eq!(contents(&requests[2]), vec!["What is my name?"]);
    assert_eq!(app.agent.conversation("t1").len(), 4);
}

#[tokio::test]
async fn every_request_starts_with_the_system_prompt() {
    let app = spawn_app(ScriptedChatModel::new(vec![ModelReply::text("Hello")])).await;

    app.post_chat(&human_turn("t1", "Hi")).await.text().await.unwrap();

    let requests = app.chat_model.requests();
    assert!(matches!(requests[0][0], ChatMessage::System { .. }));
    assert_eq!(app.agent.conversation("t1")[0].content(), "Hi");
}

#[tokio::test]
async fn chat_returns_a_400_for_invalid_bodies() {
    let app = spawn_app(ScriptedChatModel::default()).await;
    let test_cases = vec![
        (json!({ "messages": [] }), "no message"),
        (
            json!({ "messages": [{ "role": "robot", "content": "beep" }] }),
            "unknown role",
        ),
        (json!({ "thread_id": "t1" }), "missing messages"),
    ];

    for (body, error_message) in test_cases {
        let response = app.post_chat(&body).await;

        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 Bad Request when the payload had {}.",
            error_message
        );
    }
    assert!(app.chat_model.requests().is_empty());
}
