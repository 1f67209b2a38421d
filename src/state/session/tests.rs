use super::*;
use crate::api::mock_client::{error_frame, text_frame};
use crate::auth::TokenStore;
use crate::error::ChatError;
use crate::locale::Locale;
use crate::state::SessionEvent;
use crate::test_support::SessionHarness;
use crate::types::{ClearResponse, Message, Role};
use bytes::Bytes;
use reqwest::StatusCode;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("timed out waiting for: {what}");
}

fn last_content(session: &ChatSession) -> String {
    session
        .messages()
        .last()
        .map(|m| m.content.clone())
        .unwrap_or_default()
}

fn frame_bytes(frame: String) -> crate::error::Result<Bytes> {
    Ok(Bytes::from(frame))
}

#[tokio::test]
async fn test_blank_input_is_a_silent_no_op() {
    let mut harness = SessionHarness::logged_in();

    assert_eq!(harness.session.send_message("").await, SendOutcome::Rejected);
    assert_eq!(harness.session.send_message("   \n\t").await, SendOutcome::Rejected);

    let snapshot = harness.session.snapshot();
    assert!(snapshot.messages.is_empty());
    assert!(!snapshot.is_loading);
    assert_eq!(snapshot.error, None);
    assert_eq!(harness.backend.chat_calls(), 0);
    assert!(harness.drain_events().is_empty());
}

#[tokio::test]
async fn test_second_send_while_in_flight_is_dropped() {
    let harness = SessionHarness::logged_in();
    let tx = harness.backend.push_chat_channel();

    let session = harness.session.clone();
    let first = tokio::spawn(async move { session.send_message("a").await });
    wait_until("first turn in flight", || harness.session.messages().len() == 2).await;

    assert!(harness.session.is_loading());
    assert_eq!(harness.session.send_message("b").await, SendOutcome::Rejected);
    assert_eq!(harness.backend.chat_calls(), 1);

    tx.unbounded_send(frame_bytes(text_frame("reply"))).unwrap();
    drop(tx);
    assert_eq!(first.await.unwrap(), SendOutcome::Completed);

    let messages = harness.session.messages();
    let user_messages: Vec<&Message> = messages.iter().filter(|m| m.role == Role::User).collect();
    assert_eq!(user_messages.len(), 1);
    assert_eq!(user_messages[0].content, "a");
    assert_eq!(harness.backend.sent_messages(), vec!["a".to_string()]);
}

#[tokio::test]
async fn test_fragments_grow_the_same_assistant_message() {
    let harness = SessionHarness::logged_in();
    let tx = harness.backend.push_chat_channel();

    let session = harness.session.clone();
    let turn = tokio::spawn(async move { session.send_message("greet me").await });

    tx.unbounded_send(frame_bytes(text_frame("Hel"))).unwrap();
    wait_until("first fragment applied", || last_content(&harness.session) == "Hel").await;
    let after_first = harness.session.snapshot();

    tx.unbounded_send(frame_bytes(text_frame("lo"))).unwrap();
    wait_until("second fragment applied", || last_content(&harness.session) == "Hello").await;
    let after_second = harness.session.snapshot();

    assert_eq!(after_first.messages.len(), 2);
    assert_eq!(after_second.messages.len(), 2);
    assert!(!Arc::ptr_eq(&after_first.messages, &after_second.messages));
    assert!(after_second.revision > after_first.revision);
    // The earlier snapshot is untouched by later frames.
    assert_eq!(after_first.messages[1].content, "Hel");

    drop(tx);
    assert_eq!(turn.await.unwrap(), SendOutcome::Completed);
    let messages = harness.session.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, "Hello");
}

#[tokio::test]
async fn test_typing_flag_clears_on_first_non_empty_fragment() {
    let harness = SessionHarness::logged_in();
    let tx = harness.backend.push_chat_channel();

    let session = harness.session.clone();
    let turn = tokio::spawn(async move { session.send_message("hi").await });
    wait_until("placeholder appended", || harness.session.messages().len() == 2).await;
    assert!(harness.session.is_typing());

    tx.unbounded_send(frame_bytes(text_frame(""))).unwrap();
    tx.unbounded_send(frame_bytes("data: {}\n".to_string())).unwrap();
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
    assert!(harness.session.is_typing(), "empty frames must not end typing");

    tx.unbounded_send(frame_bytes(text_frame("x"))).unwrap();
    wait_until("typing cleared", || !harness.session.is_typing()).await;
    assert!(harness.session.is_loading());

    tx.unbounded_send(frame_bytes(text_frame("y"))).unwrap();
    wait_until("second fragment", || last_content(&harness.session) == "xy").await;
    assert!(!harness.session.is_typing());

    drop(tx);
    turn.await.unwrap();
    assert!(!harness.session.is_typing());
}

#[tokio::test]
async fn test_split_chunks_match_single_chunk_delivery() {
    let body = format!(
        "{}{}{}",
        text_frame("こんにちは、"),
        text_frame("世界"),
        text_frame("!")
    );
    let bytes = body.as_bytes().to_vec();

    let whole = SessionHarness::logged_in();
    whole.backend.push_chat_chunks(vec![bytes.clone()]);
    assert_eq!(whole.session.send_message("q").await, SendOutcome::Completed);

    // Split at awkward places: inside a kana, inside the JSON, and mid-prefix.
    let kana_split = bytes.iter().position(|b| *b == 0xE3).unwrap() + 1;
    let json_split = kana_split + 7;
    let prefix_split = body.rfind("data").unwrap() + 2;
    let split = SessionHarness::logged_in();
    split.backend.push_chat_chunks(vec![
        bytes[..kana_split].to_vec(),
        bytes[kana_split..json_split].to_vec(),
        bytes[json_split..prefix_split].to_vec(),
        bytes[prefix_split..].to_vec(),
    ]);
    assert_eq!(split.session.send_message("q").await, SendOutcome::Completed);

    assert_eq!(last_content(&whole.session), "こんにちは、世界!");
    assert_eq!(last_content(&split.session), last_content(&whole.session));
}

#[tokio::test]
async fn test_byte_at_a_time_delivery() {
    let body = format!("{}{}", text_frame("Hel"), text_frame("lo"));
    let harness = SessionHarness::logged_in();
    harness
        .backend
        .push_chat_chunks(body.as_bytes().iter().map(|b| vec![*b]));

    assert_eq!(harness.session.send_message("q").await, SendOutcome::Completed);
    assert_eq!(last_content(&harness.session), "Hello");
}

#[tokio::test]
async fn test_transport_failure_appends_fallback_without_placeholder() {
    let mut harness = SessionHarness::logged_in();
    harness.backend.push_chat_failure(ChatError::Status {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: "boom".to_string(),
    });

    assert_eq!(harness.session.send_message("hi").await, SendOutcome::Failed);

    let snapshot = harness.session.snapshot();
    assert!(!snapshot.is_loading);
    assert!(!snapshot.is_typing);
    assert_eq!(snapshot.error.as_deref(), Some(Locale::Ja.send_failed()));
    assert_eq!(snapshot.messages.len(), 2);
    assert_eq!(snapshot.messages[0].content, "hi");
    assert_eq!(snapshot.messages[1].content, Locale::Ja.fallback_reply());
    assert!(!harness.drain_events().contains(&SessionEvent::AuthExpired));
    assert!(harness.tokens.get().is_some());
}

#[tokio::test]
async fn test_error_frame_is_fatal_and_surfaces() {
    let harness = SessionHarness::logged_in();
    harness.backend.push_chat_chunks(vec![
        text_frame("partial "),
        error_frame("model overloaded"),
        text_frame("never applied"),
    ]);

    assert_eq!(harness.session.send_message("hi").await, SendOutcome::Failed);

    let snapshot = harness.session.snapshot();
    assert!(!snapshot.is_loading);
    assert!(!snapshot.is_typing);
    assert_eq!(snapshot.error.as_deref(), Some(Locale::Ja.send_failed()));
    let contents: Vec<&str> = snapshot.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["hi", "partial ", Locale::Ja.fallback_reply()]);
}

#[tokio::test]
async fn test_error_frame_before_any_text_drops_empty_placeholder() {
    let harness = SessionHarness::logged_in();
    harness
        .backend
        .push_chat_chunks(vec![error_frame("no credits")]);

    assert_eq!(harness.session.send_message("hi").await, SendOutcome::Failed);
    let messages = harness.session.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, Locale::Ja.fallback_reply());
}

#[tokio::test]
async fn test_mid_stream_read_error_settles_flags() {
    let harness = SessionHarness::logged_in();
    let tx = harness.backend.push_chat_channel();
    tx.unbounded_send(frame_bytes(text_frame("half"))).unwrap();
    tx.unbounded_send(Err(ChatError::Stream("connection reset".to_string())))
        .unwrap();

    assert_eq!(harness.session.send_message("hi").await, SendOutcome::Failed);
    assert!(!harness.session.is_loading());
    assert!(!harness.session.is_typing());
    assert_eq!(harness.session.error().as_deref(), Some(Locale::Ja.send_failed()));
}

#[tokio::test]
async fn test_unparseable_frame_is_skipped() {
    let harness = SessionHarness::logged_in();
    harness.backend.push_chat_chunks(vec![
        "data: {not json}\n".to_string(),
        "event: keepalive\n".to_string(),
        text_frame("ok"),
    ]);

    assert_eq!(harness.session.send_message("hi").await, SendOutcome::Completed);
    assert_eq!(last_content(&harness.session), "ok");
    assert_eq!(harness.session.error(), None);
}

#[tokio::test]
async fn test_empty_reply_leaves_no_placeholder() {
    let harness = SessionHarness::logged_in();
    harness.backend.push_chat_chunks(Vec::<String>::new());

    assert_eq!(harness.session.send_message("hi").await, SendOutcome::Completed);
    let messages = harness.session.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::User);
}

#[tokio::test]
async fn test_send_without_token_never_calls_transport() {
    let mut harness = SessionHarness::logged_out();

    assert_eq!(harness.session.send_message("hi").await, SendOutcome::Failed);

    assert_eq!(harness.backend.chat_calls(), 0);
    let snapshot = harness.session.snapshot();
    assert_eq!(snapshot.error.as_deref(), Some(Locale::Ja.login_required()));
    assert!(snapshot.messages.is_empty());
    assert!(!snapshot.is_loading);
    let events = harness.drain_events();
    assert!(events.contains(&SessionEvent::AuthExpired));
    assert!(!events.contains(&SessionEvent::TurnStarted));
}

#[tokio::test]
async fn test_rejected_token_on_send_expires_auth() {
    let mut harness = SessionHarness::logged_in();
    harness.backend.push_chat_failure(ChatError::AuthRequired);

    assert_eq!(harness.session.send_message("hi").await, SendOutcome::Failed);

    assert_eq!(
        harness.session.error().as_deref(),
        Some(Locale::Ja.auth_required())
    );
    assert_eq!(harness.tokens.get(), None);
    assert!(harness.drain_events().contains(&SessionEvent::AuthExpired));
    assert!(!harness.session.is_loading());
}

#[tokio::test]
async fn test_new_send_clears_previous_error_and_input() {
    let harness = SessionHarness::logged_in();
    harness
        .backend
        .push_chat_failure(ChatError::Transport("offline".to_string()));
    harness.backend.push_chat_chunks(vec![text_frame("back online")]);

    harness.session.send_message("first").await;
    assert!(harness.session.error().is_some());

    harness.session.set_input("second");
    assert_eq!(harness.session.input(), "second");
    assert_eq!(harness.session.send_message("second").await, SendOutcome::Completed);
    assert_eq!(harness.session.error(), None);
    assert_eq!(harness.session.input(), "");

    // user, fallback, user, reply: consecutive roles are tolerated.
    let roles: Vec<Role> = harness.session.messages().iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
    );
}

#[tokio::test]
async fn test_user_message_is_trimmed_and_timestamped() {
    let harness = SessionHarness::logged_in();
    harness.backend.push_chat_chunks(vec![text_frame("ok")]);

    harness.session.send_message("  hello there \n").await;

    let messages = harness.session.messages();
    assert_eq!(messages[0].content, "hello there");
    assert!(messages[0].timestamp.is_some());
    assert_eq!(harness.backend.sent_messages(), vec!["hello there".to_string()]);
}

#[tokio::test]
async fn test_success_event_sequence() {
    let mut harness = SessionHarness::logged_in();
    harness
        .backend
        .push_chat_chunks(vec![text_frame("a"), text_frame("b")]);

    harness.session.send_message("hi").await;

    assert_eq!(
        harness.drain_events(),
        vec![
            SessionEvent::TurnStarted,
            SessionEvent::Typing(true),
            SessionEvent::Typing(false),
            SessionEvent::Fragment("a".to_string()),
            SessionEvent::Fragment("b".to_string()),
            SessionEvent::TurnComplete,
        ]
    );
}

#[tokio::test]
async fn test_cancel_turn_keeps_partial_reply() {
    let harness = SessionHarness::logged_in();
    let tx = harness.backend.push_chat_channel();

    let session = harness.session.clone();
    let turn = tokio::spawn(async move { session.send_message("long answer please").await });
    tx.unbounded_send(frame_bytes(text_frame("Once upon"))).unwrap();
    wait_until("partial reply", || last_content(&harness.session) == "Once upon").await;

    assert!(harness.session.cancel_turn());
    assert_eq!(turn.await.unwrap(), SendOutcome::Cancelled);

    let snapshot = harness.session.snapshot();
    assert!(!snapshot.is_loading);
    assert!(!snapshot.is_typing);
    assert_eq!(snapshot.error, None);
    assert_eq!(snapshot.messages.len(), 2);
    assert_eq!(snapshot.messages[1].content, "Once upon");

    // Frames sent after cancellation go nowhere.
    let _ = tx.unbounded_send(frame_bytes(text_frame(" a time")));
    assert_eq!(last_content(&harness.session), "Once upon");
    assert!(!harness.session.cancel_turn());
}

#[tokio::test]
async fn test_cancel_before_first_fragment_removes_placeholder() {
    let harness = SessionHarness::logged_in();
    let _tx = harness.backend.push_chat_channel();

    let session = harness.session.clone();
    let turn = tokio::spawn(async move { session.send_message("hi").await });
    wait_until("placeholder appended", || harness.session.messages().len() == 2).await;

    harness.session.shutdown();
    assert_eq!(turn.await.unwrap(), SendOutcome::Cancelled);
    assert_eq!(harness.session.messages().len(), 1);
    assert!(!harness.session.is_loading());

    assert_eq!(harness.session.send_message("again").await, SendOutcome::Rejected);
    assert!(harness.session.is_shut_down());
}

#[tokio::test]
async fn test_dropping_the_send_future_resets_flags() {
    let harness = SessionHarness::logged_in();
    let _tx = harness.backend.push_chat_channel();

    let result = tokio::time::timeout(
        Duration::from_millis(50),
        harness.session.send_message("hi"),
    )
    .await;
    assert!(result.is_err(), "stream never ends, so the send must time out");

    assert!(!harness.session.is_loading());
    assert!(!harness.session.is_typing());
    assert!(!harness.session.cancel_turn());
}

#[tokio::test]
async fn test_clear_mid_stream_discards_the_reply() {
    let harness = SessionHarness::logged_in();
    harness.backend.push_clear(Ok(ClearResponse {
        success: Some(true),
        message: None,
    }));
    let tx = harness.backend.push_chat_channel();

    let session = harness.session.clone();
    let turn = tokio::spawn(async move { session.send_message("hi").await });
    tx.unbounded_send(frame_bytes(text_frame("partial"))).unwrap();
    wait_until("partial reply", || last_content(&harness.session) == "partial").await;

    harness.session.clear_chat().await.expect("clear succeeds");
    assert!(harness.session.messages().is_empty());
    // Clearing leaves the turn's flags alone.
    assert!(harness.session.is_loading());

    tx.unbounded_send(frame_bytes(text_frame(" more"))).unwrap();
    drop(tx);
    assert_eq!(turn.await.unwrap(), SendOutcome::Superseded);
    assert!(harness.session.messages().is_empty());
    assert!(!harness.session.is_loading());
}

#[tokio::test]
async fn test_history_accepts_array_and_envelope_shapes() {
    let entries = json!([
        {"role": "user", "content": "質問です", "timestamp": "2024-05-01T09:00:00"},
        {"role": "assistant", "content": "回答です"}
    ]);

    let mut from_array = SessionHarness::logged_in();
    from_array.backend.push_history(Ok(entries.clone()));
    let from_envelope = SessionHarness::logged_in();
    from_envelope
        .backend
        .push_history(Ok(json!({ "messages": entries })));

    assert_eq!(from_array.session.load_chat_history().await.unwrap(), 2);
    assert_eq!(from_envelope.session.load_chat_history().await.unwrap(), 2);
    assert_eq!(
        from_array.session.messages(),
        from_envelope.session.messages()
    );
    assert_eq!(from_array.session.error(), None);
    assert!(from_array
        .drain_events()
        .contains(&SessionEvent::HistoryLoaded(2)));
}

#[tokio::test]
async fn test_history_unauthorized_stops_without_retry() {
    let mut harness = SessionHarness::logged_in();
    harness.backend.push_history(Err(ChatError::AuthRequired));

    let result = harness.session.load_chat_history().await;

    assert!(matches!(result, Err(ChatError::AuthRequired)));
    assert_eq!(harness.backend.history_calls(), 1);
    assert_eq!(
        harness.session.error().as_deref(),
        Some(Locale::Ja.auth_required())
    );
    assert_eq!(harness.tokens.get(), None);
    assert!(harness.drain_events().contains(&SessionEvent::AuthExpired));
}

#[tokio::test]
async fn test_history_failure_leaves_log_empty() {
    let harness = SessionHarness::logged_in();
    harness.backend.push_history(Ok(json!([{"role": "user", "content": "old"}])));
    harness.backend.push_history(Err(ChatError::Status {
        status: StatusCode::SERVICE_UNAVAILABLE,
        body: String::new(),
    }));

    harness.session.load_chat_history().await.unwrap();
    assert_eq!(harness.session.messages().len(), 1);

    assert!(harness.session.load_chat_history().await.is_err());
    assert!(harness.session.messages().is_empty());
    assert_eq!(
        harness.session.error().as_deref(),
        Some(Locale::Ja.history_load_failed())
    );
}

#[tokio::test]
async fn test_history_with_unexpected_shape_is_a_load_failure() {
    let harness = SessionHarness::logged_in();
    harness.backend.push_history(Ok(json!("not a history")));

    assert!(matches!(
        harness.session.load_chat_history().await,
        Err(ChatError::Decode(_))
    ));
    assert_eq!(
        harness.session.error().as_deref(),
        Some(Locale::Ja.history_load_failed())
    );
}

#[tokio::test]
async fn test_history_without_token_skips_transport() {
    let mut harness = SessionHarness::logged_out();

    assert!(harness.session.load_chat_history().await.is_err());
    assert_eq!(harness.backend.history_calls(), 0);
    assert_eq!(
        harness.session.error().as_deref(),
        Some(Locale::Ja.login_required())
    );
    assert!(harness.drain_events().contains(&SessionEvent::AuthExpired));
}

#[tokio::test]
async fn test_clear_success_empties_log_and_error() {
    let harness = SessionHarness::logged_in();
    harness
        .backend
        .push_chat_failure(ChatError::Transport("offline".to_string()));
    harness.backend.push_clear(Ok(ClearResponse::default()));

    harness.session.send_message("hi").await;
    assert!(harness.session.error().is_some());

    harness.session.clear_chat().await.unwrap();
    let snapshot = harness.session.snapshot();
    assert!(snapshot.messages.is_empty());
    assert_eq!(snapshot.error, None);
    assert!(!snapshot.is_loading);
}

#[tokio::test]
async fn test_clear_failures_keep_messages() {
    let mut harness = SessionHarness::logged_in();
    harness
        .backend
        .push_history(Ok(json!([{"role": "user", "content": "keep me"}])));
    harness.backend.push_clear(Ok(ClearResponse {
        success: Some(false),
        message: Some("locked".to_string()),
    }));
    harness.backend.push_clear(Err(ChatError::AuthRequired));

    harness.session.load_chat_history().await.unwrap();
    harness.drain_events();

    assert!(matches!(
        harness.session.clear_chat().await,
        Err(ChatError::Rejected(_))
    ));
    assert_eq!(
        harness.session.error().as_deref(),
        Some(Locale::Ja.clear_failed())
    );
    assert_eq!(harness.session.messages().len(), 1);

    assert!(harness.session.clear_chat().await.unwrap_err().is_auth());
    assert_eq!(
        harness.session.error().as_deref(),
        Some(Locale::Ja.auth_required())
    );
    assert_eq!(harness.session.messages().len(), 1);
    assert!(!harness.drain_events().contains(&SessionEvent::AuthExpired));
}

#[tokio::test]
async fn test_english_locale_texts() {
    let harness = SessionHarness::logged_out();
    let session = harness.session.clone().with_locale(Locale::En);

    session.send_message("hi").await;
    assert_eq!(session.error().as_deref(), Some("Please log in to continue."));
}
