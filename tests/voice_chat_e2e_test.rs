// ABOUTME: End-to-end tests for the voice chat route over the full router
// ABOUTME: Streams frames in order, persists turns and maps pre-stream failures to status codes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use common::{
    build_harness, parse_sse, test_config, tool_reply, wait_for_assistant_reply, wait_for_turns,
    Scripted, ScriptedLlm, StreamScript, TestHarness, OTHER_TOKEN, TEST_TOKEN, TEST_USER,
};
use crm_voice_agent::agent::{ChatTurn, StreamFrame};
use crm_voice_agent::config::RateLimitConfig;
use crm_voice_agent::llm::{LlmProvider, MessageRole};
use crm_voice_agent::routes::router;
use helpers::axum_test::{AxumTestRequest, AxumTestResponse};
use serde_json::{json, Value};
use std::sync::Arc;

const CHAT: &str = "/api/voice/chat";

fn scripted_harness(llm: &Arc<ScriptedLlm>) -> TestHarness {
    let provider: Arc<dyn LlmProvider> = llm.clone();
    build_harness(Some(provider), test_config())
}

async fn post_chat(harness: &TestHarness, token: &str, body: &Value) -> AxumTestResponse {
    AxumTestRequest::post(CHAT)
        .bearer(token)
        .header("x-forwarded-for", "203.0.113.7")
        .json(body)
        .send(router(harness.resources.clone()))
        .await
}

fn chat_turn(session_id: &str, question: &str) -> ChatTurn {
    ChatTurn {
        session_id: session_id.to_owned(),
        question: question.to_owned(),
        page_path: None,
        language: None,
        user_id: TEST_USER.to_owned(),
        auth_context: TEST_TOKEN.to_owned(),
    }
}

fn event_names(frames: &[(String, Value)]) -> Vec<&str> {
    frames.iter().map(|(name, _)| name.as_str()).collect()
}

fn streamed_text(frames: &[(String, Value)]) -> String {
    frames
        .iter()
        .filter(|(name, _)| name == "delta")
        .filter_map(|(_, data)| data["text"].as_str())
        .collect()
}

#[tokio::test]
async fn test_show_me_my_leads_runs_tools_and_streams() {
    let llm = ScriptedLlm::new(
        vec![
            tool_reply(&[("call-1", "list_leads", json!({}))]),
            Scripted::Text("draft".to_owned()),
        ],
        StreamScript::Deltas(vec!["You have ".to_owned(), "two leads.".to_owned()]),
    );
    let harness = scripted_harness(&llm);
    harness.crm.seed(
        "leads",
        vec![
            json!({"id": "l1", "name": "Ada"}),
            json!({"id": "l2", "name": "Alan"}),
        ],
    );

    let response = post_chat(
        &harness,
        TEST_TOKEN,
        &json!({"question": "Show me my leads", "sessionId": "s-leads", "pagePath": "/leads"}),
    )
    .await;
    assert_eq!(response.status(), 200);
    assert!(response
        .header("content-type")
        .unwrap()
        .starts_with("text/event-stream"));
    assert!(response.header("x-ratelimit-remaining").is_some());

    let frames = parse_sse(&response.text());
    assert_eq!(event_names(&frames), ["meta", "delta", "delta", "done"]);
    assert_eq!(frames[0].1, json!({"clientActions": [], "model": "fast"}));
    assert_eq!(streamed_text(&frames), "You have two leads.");
    assert_eq!(frames[3].1["success"], true);
    assert!(frames[3].1["duration"].is_u64());

    assert_eq!(
        harness.crm.call_log(),
        [("read".to_owned(), "leads".to_owned())]
    );
    assert_eq!(llm.tool_call_count(), 2);
    assert_eq!(llm.stream_call_count(), 1);

    // The streaming call carries the tool context and the resolving reply
    let stream_request = llm.stream_requests.lock().unwrap()[0].clone();
    assert!(stream_request.stream);
    let roles: Vec<MessageRole> = stream_request.messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        [
            MessageRole::System,
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::Tool,
            MessageRole::Assistant
        ]
    );
    let last = stream_request.messages.last().unwrap();
    assert_eq!(last.content, "draft");
    assert!(last.tool_calls.is_empty());

    assert!(wait_for_assistant_reply(&harness.resources.sessions, "s-leads").await);
    let session = harness
        .resources
        .sessions
        .peek("s-leads")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.user_id, TEST_USER);
    let contents: Vec<(MessageRole, &str)> = session
        .conversation
        .iter()
        .map(|m| (m.role, m.content.as_str()))
        .collect();
    assert_eq!(
        contents,
        [
            (MessageRole::User, "Show me my leads"),
            (MessageRole::Assistant, "You have two leads."),
        ]
    );

    assert!(wait_for_turns(&harness.analytics, 1).await);
    let record = harness.analytics.turn(0);
    assert_eq!(record.tool_calls, 1);
    assert_eq!(record.page_path.as_deref(), Some("/leads"));
    assert!(record.success);
}

#[tokio::test]
async fn test_greeting_takes_zero_rounds_on_fast_tier() {
    let llm = ScriptedLlm::answering(&["Hi! ", "How can I help?"]);
    let harness = scripted_harness(&llm);

    let response = post_chat(
        &harness,
        TEST_TOKEN,
        &json!({"question": "hi", "sessionId": "s-hi"}),
    )
    .await;
    assert_eq!(response.status(), 200);

    let frames = parse_sse(&response.text());
    assert_eq!(frames.first().unwrap().0, "meta");
    assert_eq!(frames[0].1["model"], "fast");
    assert_eq!(frames.last().unwrap().0, "done");
    assert!(frames.iter().all(|(name, _)| name != "error"));
    assert_eq!(streamed_text(&frames), "Hi! How can I help?");

    assert_eq!(llm.tool_call_count(), 1);
    assert!(harness.crm.call_log().is_empty());
    assert!(wait_for_turns(&harness.analytics, 1).await);
    assert_eq!(harness.analytics.turn(0).tool_calls, 0);
}

#[tokio::test]
async fn test_reasoning_question_reports_reasoning_tier() {
    let llm = ScriptedLlm::answering(&["Because pricing changed."]);
    let harness = scripted_harness(&llm);

    let response = post_chat(
        &harness,
        TEST_TOKEN,
        &json!({"question": "why did we lose Acme?", "sessionId": "s-why"}),
    )
    .await;
    let frames = parse_sse(&response.text());
    assert_eq!(frames[0].1["model"], "reasoning");

    let requested_model = llm.tool_requests.lock().unwrap()[0].model.clone();
    assert_eq!(
        requested_model.as_deref(),
        Some(test_config().llm.reasoning_model.as_str())
    );
}

#[tokio::test]
async fn test_navigation_action_arrives_in_meta_frame() {
    let llm = ScriptedLlm::new(
        vec![
            tool_reply(&[("nav", "navigate_to", json!({"target": "Pipeline"}))]),
            Scripted::Text("Opening the pipeline.".to_owned()),
        ],
        StreamScript::Deltas(vec!["Opening the pipeline.".to_owned()]),
    );
    let harness = scripted_harness(&llm);

    let response = post_chat(
        &harness,
        TEST_TOKEN,
        &json!({"question": "take me to the pipeline", "sessionId": "s-nav"}),
    )
    .await;
    let frames = parse_sse(&response.text());
    assert_eq!(
        frames[0].1["clientActions"],
        json!([{"type": "navigate", "route": "/pipeline", "target": "Pipeline"}])
    );
}

#[tokio::test]
async fn test_mid_stream_failure_emits_error_then_done() {
    let llm = ScriptedLlm::new(
        vec![Scripted::Text("draft".to_owned())],
        StreamScript::FailAfter(vec!["Partial ".to_owned()], "connection reset".to_owned()),
    );
    let harness = scripted_harness(&llm);

    let response = post_chat(
        &harness,
        TEST_TOKEN,
        &json!({"question": "list my tasks", "sessionId": "s-err"}),
    )
    .await;
    assert_eq!(response.status(), 200);

    let frames = parse_sse(&response.text());
    assert_eq!(event_names(&frames), ["meta", "delta", "error", "done"]);
    assert_eq!(frames[3].1["success"], false);
    assert!(frames[2].1["error"].as_str().is_some_and(|e| !e.is_empty()));

    assert!(wait_for_turns(&harness.analytics, 1).await);
    let record = harness.analytics.turn(0);
    assert!(!record.success);
    assert_eq!(record.response, "Partial ");
}

#[tokio::test]
async fn test_tool_loop_model_failure_streams_error() {
    let llm = ScriptedLlm::new(
        vec![Scripted::Fail("model unavailable".to_owned())],
        StreamScript::Deltas(Vec::new()),
    );
    let harness = scripted_harness(&llm);

    let response = post_chat(
        &harness,
        TEST_TOKEN,
        &json!({"question": "show deals", "sessionId": "s-fail"}),
    )
    .await;
    let frames = parse_sse(&response.text());
    assert_eq!(event_names(&frames), ["meta", "error", "done"]);
    assert_eq!(frames[2].1["success"], false);
    assert_eq!(llm.stream_call_count(), 0);
}

#[tokio::test]
async fn test_unauthenticated_request_is_401() {
    let llm = ScriptedLlm::answering(&["unused"]);
    let harness = scripted_harness(&llm);

    let response = AxumTestRequest::post(CHAT)
        .json(&json!({"question": "hi", "sessionId": "s1"}))
        .send(router(harness.resources.clone()))
        .await;
    assert_eq!(response.status(), 401);

    let bad_token = post_chat(
        &harness,
        "not-a-token",
        &json!({"question": "hi", "sessionId": "s1"}),
    )
    .await;
    assert_eq!(bad_token.status(), 401);

    // No session was touched and no model call was made
    assert!(harness.resources.sessions.peek("s1").await.unwrap().is_none());
    assert_eq!(llm.tool_call_count(), 0);
}

#[tokio::test]
async fn test_validation_failures_are_400_with_message() {
    let llm = ScriptedLlm::answering(&["unused"]);
    let harness = scripted_harness(&llm);

    let cases = [
        (json!({"question": "hi"}), "sessionId is required"),
        (json!({"question": "hi", "sessionId": "  "}), "sessionId is required"),
        (json!({"question": "", "sessionId": "s1"}), "Question cannot be empty"),
        (json!({"question": 42, "sessionId": "s1"}), "Question must be a string"),
        (
            json!({"question": "a".repeat(2001), "sessionId": "s1"}),
            "Question is too long (maximum 2000 characters)",
        ),
    ];

    for (body, message) in cases {
        let response = post_chat(&harness, TEST_TOKEN, &body).await;
        assert_eq!(response.status(), 400, "{body}");
        let error: Value = response.json();
        assert_eq!(error["error"]["message"], message);
    }
    assert_eq!(llm.tool_call_count(), 0);
}

#[tokio::test]
async fn test_rate_limited_request_is_429_with_retry_after() {
    let llm = ScriptedLlm::answering(&["ok"]);
    let provider: Arc<dyn LlmProvider> = llm.clone();
    let mut config = test_config();
    config.rate_limit = RateLimitConfig {
        short_limit: 2,
        abuse_block_secs: 0,
        ..RateLimitConfig::default()
    };
    let harness = build_harness(Some(provider), config);

    // Each chat spends one IP hit and one voice hit; the IP window fills first
    let first = post_chat(&harness, TEST_TOKEN, &json!({"question": "hi", "sessionId": "a"})).await;
    assert_eq!(first.status(), 200);
    let _ = first.text();
    let second =
        post_chat(&harness, TEST_TOKEN, &json!({"question": "hello", "sessionId": "b"})).await;
    assert_eq!(second.status(), 200);

    let limited =
        post_chat(&harness, TEST_TOKEN, &json!({"question": "hey", "sessionId": "c"})).await;
    assert_eq!(limited.status(), 429);
    let retry_after: u64 = limited.header("retry-after").unwrap().parse().unwrap();
    assert!(retry_after >= 1);
    assert_eq!(llm.stream_call_count(), 2);
}

#[tokio::test]
async fn test_missing_model_credential_is_500() {
    let harness = build_harness(None, test_config());

    let response = post_chat(
        &harness,
        TEST_TOKEN,
        &json!({"question": "hi", "sessionId": "s1"}),
    )
    .await;
    assert_eq!(response.status(), 500);
    assert!(harness.resources.sessions.peek("s1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_unsupported_language_is_ignored() {
    let llm = ScriptedLlm::answering(&["Hola"]);
    let harness = scripted_harness(&llm);

    let response = post_chat(
        &harness,
        TEST_TOKEN,
        &json!({"question": "hola", "sessionId": "s-lang", "language": "klingon"}),
    )
    .await;
    assert_eq!(response.status(), 200);
    let _ = response.text();

    let session = harness
        .resources
        .sessions
        .peek("s-lang")
        .await
        .unwrap()
        .unwrap();
    assert!(session.language.is_none());
    assert!(wait_for_assistant_reply(&harness.resources.sessions, "s-lang").await);

    let spanish = post_chat(
        &harness,
        TEST_TOKEN,
        &json!({"question": "hola otra vez", "sessionId": "s-lang", "language": "es"}),
    )
    .await;
    let _ = spanish.text();
    let session = harness
        .resources
        .sessions
        .peek("s-lang")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.language.as_deref(), Some("es"));
}

#[tokio::test]
async fn test_session_history_is_replayed_to_model() {
    let llm = ScriptedLlm::new(
        vec![
            Scripted::Text("first".to_owned()),
            Scripted::Text("second".to_owned()),
        ],
        StreamScript::Deltas(vec!["Noted.".to_owned()]),
    );
    let harness = scripted_harness(&llm);

    let first = post_chat(
        &harness,
        TEST_TOKEN,
        &json!({"question": "my name is Ada", "sessionId": "s-hist"}),
    )
    .await;
    let _ = first.text();
    assert!(wait_for_assistant_reply(&harness.resources.sessions, "s-hist").await);

    let second = post_chat(
        &harness,
        TEST_TOKEN,
        &json!({"question": "what is my name", "sessionId": "s-hist"}),
    )
    .await;
    let _ = second.text();

    let request = llm.tool_requests.lock().unwrap()[1].clone();
    let roles: Vec<MessageRole> = request.messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        [
            MessageRole::System,
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::User
        ]
    );
    assert_eq!(request.messages[1].content, "my name is Ada");
    assert_eq!(request.messages[3].content, "what is my name");
}

#[tokio::test]
async fn test_clear_session_respects_owner() {
    let llm = ScriptedLlm::answering(&["ok"]);
    let harness = scripted_harness(&llm);
    harness
        .resources
        .sessions
        .get_session("mine", TEST_USER)
        .await
        .unwrap();

    let foreign = AxumTestRequest::delete("/api/voice/sessions/mine")
        .bearer(OTHER_TOKEN)
        .send(router(harness.resources.clone()))
        .await;
    assert_eq!(foreign.status(), 404);
    assert!(harness.resources.sessions.peek("mine").await.unwrap().is_some());

    let own = AxumTestRequest::delete("/api/voice/sessions/mine")
        .bearer(TEST_TOKEN)
        .send(router(harness.resources.clone()))
        .await;
    assert_eq!(own.status(), 204);
    assert!(harness.resources.sessions.peek("mine").await.unwrap().is_none());

    let absent = AxumTestRequest::delete("/api/voice/sessions/never-existed")
        .bearer(TEST_TOKEN)
        .send(router(harness.resources.clone()))
        .await;
    assert_eq!(absent.status(), 204);
}

#[tokio::test]
async fn test_transcribe_rejects_bad_audio_before_upstream() {
    let llm = ScriptedLlm::answering(&["ok"]);
    let harness = scripted_harness(&llm);

    let wrong_type = AxumTestRequest::post("/api/voice/transcribe")
        .bearer(TEST_TOKEN)
        .raw("text/plain", b"hello".to_vec())
        .send(router(harness.resources.clone()))
        .await;
    assert_eq!(wrong_type.status(), 400);

    let empty = AxumTestRequest::post("/api/voice/transcribe")
        .bearer(TEST_TOKEN)
        .raw("audio/webm", Vec::new())
        .send(router(harness.resources.clone()))
        .await;
    assert_eq!(empty.status(), 400);
    let error: Value = empty.json();
    assert_eq!(error["error"]["message"], "Audio file is empty");
}

#[tokio::test]
async fn test_tts_validates_text_and_requires_speech_key() {
    let llm = ScriptedLlm::answering(&["ok"]);
    let harness = scripted_harness(&llm);

    let too_long = AxumTestRequest::post("/api/voice/tts")
        .bearer(TEST_TOKEN)
        .json(&json!({"text": "a".repeat(1001)}))
        .send(router(harness.resources.clone()))
        .await;
    assert_eq!(too_long.status(), 400);

    // The test configuration has no speech credential
    let unconfigured = AxumTestRequest::post("/api/voice/tts")
        .bearer(TEST_TOKEN)
        .json(&json!({"text": "Hello"}))
        .send(router(harness.resources.clone()))
        .await;
    assert_eq!(unconfigured.status(), 500);
}

#[tokio::test]
async fn test_client_gone_before_first_frame_still_persists_turn() {
    let llm = ScriptedLlm::answering(&["Hello ", "there."]);
    let harness = scripted_harness(&llm);

    let frames = harness
        .resources
        .agent
        .handle_turn(chat_turn("s-gone", "hello there"))
        .await
        .unwrap();
    drop(frames);

    assert!(wait_for_turns(&harness.analytics, 1).await);
    assert!(wait_for_assistant_reply(&harness.resources.sessions, "s-gone").await);

    // Nobody was reading, so the answer stream is never opened
    assert_eq!(llm.tool_call_count(), 1);
    assert_eq!(llm.stream_call_count(), 0);

    let record = harness.analytics.turn(0);
    assert_eq!(record.session_id, "s-gone");
    assert_eq!(record.response, "Hello there.");

    let session = harness
        .resources
        .sessions
        .peek("s-gone")
        .await
        .unwrap()
        .unwrap();
    let last = session.conversation.last().unwrap();
    assert_eq!(last.role, MessageRole::Assistant);
    assert_eq!(last.content, "Hello there.");
}

#[tokio::test]
async fn test_client_gone_after_meta_still_persists_turn() {
    let llm = ScriptedLlm::answering(&["Your pipeline ", "looks healthy."]);
    let harness = scripted_harness(&llm);

    let mut frames = harness
        .resources
        .agent
        .handle_turn(chat_turn("s-left", "how is my pipeline"))
        .await
        .unwrap();
    let first = frames.recv().await.unwrap();
    assert!(matches!(first, StreamFrame::Meta { .. }));
    drop(frames);

    assert!(wait_for_turns(&harness.analytics, 1).await);
    assert!(wait_for_assistant_reply(&harness.resources.sessions, "s-left").await);
    assert_eq!(harness.analytics.turn(0).session_id, "s-left");
}
