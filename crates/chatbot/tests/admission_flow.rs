//! Admission pipeline tests against a live Postgres.
//!
//! All tests are `#[ignore]` — run with `cargo test -p chatbot -- --ignored`
//! against the database named by `CHATBOT_TEST_DB` (defaults to
//! `postgres://chatbot@localhost:5432/chatbot_test`). Every test uses
//! fresh uuid keys, so reruns never collide.

use std::time::Duration;

use gatekeeper::{ActivityLog, ConversationStore, Db, RateLimitMode, Reaper, Role, SharedDb};

use chatbot::knowledge::StaticKnowledge;
use chatbot::pipeline::{ChatPolicy, Chatbot};
use chatbot::responder::{CannedResponder, Responder, ResponderError};
use chatbot::settings::Settings;

async fn test_db() -> SharedDb {
    let url = std::env::var("CHATBOT_TEST_DB")
        .unwrap_or_else(|_| "postgres://chatbot@localhost:5432/chatbot_test".into());
    let db = Db::connect(&url).await.expect("test database unreachable");
    db.ensure_schema().await.expect("schema bootstrap failed");
    db.shared()
}

fn test_settings(rate_limit_count: i32, rate_limit_delay_ms: i64) -> Settings {
    Settings {
        chatbot_enabled: true,
        max_question_length: 500,
        rate_limit_count,
        rate_limit_delay_ms,
        false_response_mode: true,
    }
}

fn test_chatbot(db: SharedDb, mode: RateLimitMode) -> Chatbot {
    let policy = ChatPolicy {
        rate_limit_mode: mode,
        ..ChatPolicy::default()
    };
    Chatbot::new(
        db,
        Box::new(CannedResponder::new()),
        Box::new(StaticKnowledge("You are a test assistant.".into())),
        policy,
    )
}

fn fresh_keys() -> (String, String) {
    (
        uuid::Uuid::new_v4().to_string(),
        uuid::Uuid::new_v4().to_string(),
    )
}

// ---------------------------------------------------------------------------
// Rate limiting
// ---------------------------------------------------------------------------

/// Five admitted requests, a block with a sane wait, re-admission after
/// the window, and a second full round ending in another block.
async fn run_limit_scenario(mode: RateLimitMode) {
    let db = test_db().await;
    let chatbot = test_chatbot(db, mode);
    let (session, addr) = fresh_keys();

    let limit = 5;
    let delay_ms = 300;
    let settings = test_settings(limit, delay_ms);
    let question = "Where did they go to school?";

    for i in 1..=limit {
        let reply = chatbot
            .answer(&session, &addr, question, &settings)
            .await
            .unwrap();
        assert_eq!(reply, format!("Response message #{i}"));
    }

    let refusal = chatbot
        .answer(&session, &addr, question, &settings)
        .await
        .unwrap();
    assert!(
        refusal.contains("too many messages"),
        "expected rate-limit refusal, got: {refusal}"
    );
    let wait: i64 = refusal
        .split_whitespace()
        .find_map(|w| w.parse().ok())
        .expect("refusal should contain the wait in seconds");
    assert_eq!(wait, 1, "a 300ms window always rounds up to a 1s wait");

    // Let the window pass; the idle counter resets on the next touch
    // and the request is admitted again.
    tokio::time::sleep(Duration::from_millis(delay_ms as u64 + 100)).await;

    for i in limit + 1..=limit * 2 {
        let reply = chatbot
            .answer(&session, &addr, question, &settings)
            .await
            .unwrap();
        assert_eq!(reply, format!("Response message #{i}"));
    }

    let refusal = chatbot
        .answer(&session, &addr, question, &settings)
        .await
        .unwrap();
    assert!(refusal.contains("too many messages"));
}

#[tokio::test]
#[ignore]
async fn rate_limit_by_session() {
    run_limit_scenario(RateLimitMode::BySession).await;
}

#[tokio::test]
#[ignore]
async fn rate_limit_by_address() {
    run_limit_scenario(RateLimitMode::ByAddress).await;
}

#[tokio::test]
#[ignore]
async fn rate_limit_by_both() {
    run_limit_scenario(RateLimitMode::Both).await;
}

/// With a 30-second window, the sixth request reports a wait in [1,30].
#[tokio::test]
#[ignore]
async fn rate_limit_wait_is_in_window_range() {
    let db = test_db().await;
    let chatbot = test_chatbot(db, RateLimitMode::Both);
    let (session, addr) = fresh_keys();
    let settings = test_settings(5, 30_000);

    for _ in 0..5 {
        chatbot
            .answer(&session, &addr, "hello?", &settings)
            .await
            .unwrap();
    }

    let refusal = chatbot
        .answer(&session, &addr, "hello?", &settings)
        .await
        .unwrap();
    let wait: i64 = refusal
        .split_whitespace()
        .find_map(|w| w.parse().ok())
        .expect("refusal should contain the wait in seconds");
    assert!((1..=30).contains(&wait), "wait {wait} outside [1,30]");
}

/// In by-session mode a shared address fingerprint never blocks a
/// second session.
#[tokio::test]
#[ignore]
async fn by_session_mode_ignores_shared_address() {
    let db = test_db().await;
    let chatbot = test_chatbot(db, RateLimitMode::BySession);
    let (session_a, addr) = fresh_keys();
    let (session_b, _) = fresh_keys();
    let settings = test_settings(3, 60_000);

    for _ in 0..3 {
        chatbot
            .answer(&session_a, &addr, "hello?", &settings)
            .await
            .unwrap();
    }
    let refusal = chatbot
        .answer(&session_a, &addr, "hello?", &settings)
        .await
        .unwrap();
    assert!(refusal.contains("too many messages"));

    // Same address, different session: admitted.
    let reply = chatbot
        .answer(&session_b, &addr, "hello?", &settings)
        .await
        .unwrap();
    assert_eq!(reply, "Response message #1");
}

// ---------------------------------------------------------------------------
// Conversation history
// ---------------------------------------------------------------------------

#[tokio::test]
#[ignore]
async fn history_round_trips_in_order_with_prefixes() {
    let db = test_db().await;
    let store = ConversationStore::new(db);
    let (owner, _) = fresh_keys();

    for i in 0..4 {
        store
            .append(&owner, Role::User, &format!("question {i}"))
            .await
            .unwrap();
        store
            .append(&owner, Role::Ai, &format!("answer {i}"))
            .await
            .unwrap();
    }

    let messages = store.read_all(&owner).await.unwrap();
    assert_eq!(messages.len(), 8);
    for i in 0..4 {
        assert_eq!(messages[2 * i].text, format!("USER: question {i}"));
        assert_eq!(messages[2 * i + 1].text, format!("AI: answer {i}"));
    }
}

/// Budget 250 with 100-byte messages: totals stay under budget and the
/// survivors are always the newest suffix.
#[tokio::test]
#[ignore]
async fn eviction_keeps_newest_suffix_under_budget() {
    let db = test_db().await;
    let store = ConversationStore::new(db);
    let (owner, _) = fresh_keys();
    let budget = 250;

    // "USER: " is 6 bytes, so 94 payload bytes makes a 100-byte row.
    let payload = |i: usize| format!("{i}{}", "a".repeat(93));

    for i in 0..5 {
        store.append(&owner, Role::User, &payload(i)).await.unwrap();
        store.evict_to_budget(&owner, budget).await.unwrap();

        let messages = store.read_all(&owner).await.unwrap();
        let total: usize = messages.iter().map(|m| m.text.len()).sum();
        assert!(total <= budget, "total {total} over budget after append {i}");

        // Survivors are the most recent appends, in order.
        let all: Vec<String> = (0..=i).map(|j| format!("USER: {}", payload(j))).collect();
        let expected = &all[all.len() - messages.len()..];
        let actual: Vec<String> = messages.iter().map(|m| m.text.clone()).collect();
        assert_eq!(actual, expected);
    }

    let messages = store.read_all(&owner).await.unwrap();
    assert_eq!(messages.len(), 2, "a 250-byte budget holds two 100-byte rows");
}

// ---------------------------------------------------------------------------
// Reaper
// ---------------------------------------------------------------------------

#[tokio::test]
#[ignore]
async fn reaper_spares_young_messages_and_reclaims_old_ones() {
    let db = test_db().await;
    let store = ConversationStore::new(db.clone());
    let activity = ActivityLog::new(db.clone());
    let reaper = Reaper::new(db.clone());
    let (owner, _) = fresh_keys();
    let (bystander, _) = fresh_keys();

    activity.touch(&owner).await.unwrap();
    store.append(&owner, Role::User, "fresh question").await.unwrap();
    store.append(&bystander, Role::User, "unrelated").await.unwrap();

    // Denominator 1 fires every time, but nothing is old enough.
    reaper.maybe_reclaim(&owner, 1, 7200).await.unwrap();
    assert_eq!(store.read_all(&owner).await.unwrap().len(), 1);

    // Backdate the owner's messages past the age threshold.
    db.execute(
        "UPDATE message_queue SET timestamp_ = current_timestamp - interval '3 hours'
         WHERE owner_id = $1",
        &[&owner.as_str()],
    )
    .await
    .unwrap();

    reaper.maybe_reclaim(&owner, 1, 7200).await.unwrap();
    assert!(store.read_all(&owner).await.unwrap().is_empty());

    // Another client's history is out of scope.
    assert_eq!(store.read_all(&bystander).await.unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Pipeline sequencing
// ---------------------------------------------------------------------------

mockall::mock! {
    Resp {}

    #[async_trait::async_trait]
    impl Responder for Resp {
        async fn complete(&self, owner_id: &str, prompt: &str) -> Result<String, ResponderError>;
    }
}

/// The responder sees the preamble followed by the history (user turn
/// included), and the reply lands back in the store with the AI prefix.
#[tokio::test]
#[ignore]
async fn admitted_request_assembles_prompt_and_records_reply() {
    let db = test_db().await;
    let (session, addr) = fresh_keys();

    let mut responder = MockResp::new();
    responder
        .expect_complete()
        .withf(|_, prompt| {
            prompt.starts_with("You are a test assistant.")
                && prompt.contains("USER: What languages do they know?")
        })
        .times(1)
        .returning(|_, _| Ok("Mostly Rust.".to_string()));

    let chatbot = Chatbot::new(
        db.clone(),
        Box::new(responder),
        Box::new(StaticKnowledge("You are a test assistant.".into())),
        ChatPolicy::default(),
    );

    let reply = chatbot
        .answer(
            &session,
            &addr,
            "What languages do they know?",
            &test_settings(10, 120_000),
        )
        .await
        .unwrap();
    assert_eq!(reply, "Mostly Rust.");

    let messages = ConversationStore::new(db).read_all(&session).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].text, "USER: What languages do they know?");
    assert_eq!(messages[1].text, "AI: Mostly Rust.");
}
