//! End-to-end scenarios driven through the public router API with the
//! in-memory store and the recording gateway.

use serde_json::{json, Value};
use sharegate::bot::router::App;
use sharegate::bot::update::RawUpdate;
use sharegate::config::Settings;
use sharegate::gate::progress::ProgressTracker;
use sharegate::store::{Store, SUBSCRIBERS_KEY};
use sharegate::testing::{MemoryStore, Outbound, RecordingGateway};
use std::sync::Arc;

const ADMIN_ID: i64 = 9000;
const GOAL: u32 = 6;

fn settings() -> Arc<Settings> {
    Arc::new(Settings {
        telegram_token: "test-token".to_string(),
        admin_ids_str: Some(ADMIN_ID.to_string()),
        goal: GOAL,
        share_url: Some("https://t.me/gatebot?start={id}".to_string()),
        channel_url: Some("https://t.me/+exclusive".to_string()),
        ui_media_url: None,
        upstash_redis_rest_url: None,
        upstash_redis_rest_token: None,
        broadcast_delay_ms: 0,
        fanout_limit: 10_000,
        locale_cache_size: 1_000,
        listen_addr: "127.0.0.1:0".to_string(),
    })
}

fn build() -> (App, Arc<MemoryStore>, Arc<RecordingGateway>) {
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(RecordingGateway::new());
    let app = App::new(settings(), store.clone(), gateway.clone()).expect("catalog validates");
    (app, store, gateway)
}

fn update(body: Value) -> RawUpdate {
    serde_json::from_value(body).expect("update decodes")
}

fn message(user_id: i64, text: &str) -> RawUpdate {
    update(json!({
        "message": {
            "chat": { "id": user_id },
            "from": { "id": user_id, "first_name": "User" },
            "text": text
        }
    }))
}

fn press(user_id: i64, callback_id: &str, data: &str) -> RawUpdate {
    update(json!({
        "callback_query": { "id": callback_id, "from": { "id": user_id }, "data": data }
    }))
}

#[tokio::test]
async fn test_join_request_from_unseen_id() {
    let (app, store, gateway) = build();

    app.handle_update(update(json!({ "chat_join_request": { "from": { "id": 555 } } })))
        .await;

    // Registered, default locale, card dispatched.
    assert!(store.smembers(SUBSCRIBERS_KEY).await.contains(&"555".to_string()));
    let outbound = gateway.outbound();
    assert_eq!(outbound.len(), 1);
    match &outbound[0] {
        Outbound::Card { chat_id, caption, keyboard } => {
            assert_eq!(*chat_id, 555);
            assert_eq!(caption, "Share with your friends to unlock exclusive access.");
            assert!(!keyboard.inline_keyboard.is_empty());
        }
        other => panic!("expected the UI card, got {other:?}"),
    }
}

#[tokio::test]
async fn test_repeat_messages_do_not_duplicate_registration() {
    let (app, store, _gateway) = build();

    app.handle_update(message(42, "hello")).await;
    app.handle_update(message(42, "hello again")).await;

    assert_eq!(store.smembers(SUBSCRIBERS_KEY).await, vec!["42".to_string()]);
}

#[tokio::test]
async fn test_admin_broadcast_reports_partial_failure() {
    let (app, store, gateway) = build();

    // Three registered subscribers, the admin among them; one is blocked.
    for id in [ADMIN_ID, 1, 2] {
        store.sadd(SUBSCRIBERS_KEY, &id.to_string()).await;
    }
    gateway.fail_chat(2);

    app.handle_update(message(ADMIN_ID, "/broadcast hello")).await;

    assert_eq!(gateway.texts_to(1), vec!["hello".to_string()]);
    assert!(gateway.texts_to(2).is_empty());
    let admin_texts = gateway.texts_to(ADMIN_ID);
    assert!(admin_texts.iter().any(|text| text == "hello"));
    assert!(admin_texts
        .iter()
        .any(|text| text == "Delivered to 2 subscribers (1 failed)."));
}

#[tokio::test]
async fn test_non_admin_broadcast_is_denied() {
    let (app, store, gateway) = build();
    store.sadd(SUBSCRIBERS_KEY, "1").await;

    app.handle_update(message(42, "/broadcast hi there")).await;

    assert_eq!(gateway.texts_to(42), vec!["Owner only.".to_string()]);
    assert!(gateway.texts_to(1).is_empty());
}

#[tokio::test]
async fn test_malformed_poll_command_answers_usage() {
    let (app, store, gateway) = build();

    app.handle_update(message(ADMIN_ID, "/poll OnlyAQuestion")).await;

    let texts = gateway.texts_to(ADMIN_ID);
    assert_eq!(texts.len(), 1);
    assert!(texts[0].starts_with("Usage: /poll"));
    // No poll record, no counter movement.
    assert_eq!(store.get("gate:poll:1").await, None);
    assert_eq!(store.get("gate:poll:seq").await, None);
}

#[tokio::test]
async fn test_poll_lifecycle_with_overwrite_voting() {
    let (app, store, gateway) = build();
    for id in [7, 8] {
        store.sadd(SUBSCRIBERS_KEY, &id.to_string()).await;
    }

    app.handle_update(message(ADMIN_ID, "/poll Best drop? | Hoodie | Tee")).await;

    // Every subscriber (7, 8 and the self-registered admin) got the
    // question with its option buttons.
    let distributed = gateway
        .outbound()
        .into_iter()
        .filter(|item| matches!(item, Outbound::KeyboardMessage { text, .. } if text == "Best drop?"))
        .count();
    assert_eq!(distributed, 3);

    // User 7 votes Hoodie, then changes to Tee; user 8 votes Hoodie.
    app.handle_update(press(7, "cb1", "vote:1:0")).await;
    app.handle_update(press(7, "cb2", "vote:1:1")).await;
    app.handle_update(press(8, "cb3", "vote:1:0")).await;

    app.handle_update(message(ADMIN_ID, "/results 1")).await;

    let results = gateway
        .texts_to(ADMIN_ID)
        .into_iter()
        .find(|text| text.starts_with("Poll #1:"))
        .expect("results answer");
    assert!(results.contains("Best drop?"));
    assert!(results.contains("1 — Hoodie"));
    assert!(results.contains("1 — Tee"));
}

#[tokio::test]
async fn test_vote_on_missing_option_is_rejected() {
    let (app, _store, gateway) = build();

    app.handle_update(message(ADMIN_ID, "/poll Q? | A | B")).await;
    app.handle_update(press(7, "cb1", "vote:1:9")).await;

    let answers = gateway.answers();
    assert_eq!(answers.len(), 1);
    match &answers[0] {
        Outbound::CallbackAnswer { text, .. } => {
            assert_eq!(text, "That option is no longer available.");
        }
        other => panic!("expected a callback answer, got {other:?}"),
    }
}

#[tokio::test]
async fn test_broadcast_lock_blocks_until_unlocked() {
    let (app, store, gateway) = build();
    store.sadd(SUBSCRIBERS_KEY, "1").await;
    // A flag left behind by a dead job.
    store.set("gate:broadcast_lock", "1").await;

    app.handle_update(message(ADMIN_ID, "/broadcast hi")).await;
    assert!(gateway.texts_to(1).is_empty());
    assert!(gateway
        .texts_to(ADMIN_ID)
        .iter()
        .any(|text| text.contains("already in progress")));

    app.handle_update(message(ADMIN_ID, "/unlock")).await;
    app.handle_update(message(ADMIN_ID, "/broadcast hi")).await;

    assert_eq!(gateway.texts_to(1), vec!["hi".to_string()]);
}

#[tokio::test]
async fn test_unsupported_language_press_leaves_locale() {
    let (app, _store, gateway) = build();

    app.handle_update(press(5, "cb1", "lang:ru")).await;
    app.handle_update(press(5, "cb2", "lang:xx")).await;
    app.handle_update(message(5, "/menu")).await;

    let card = gateway
        .outbound()
        .into_iter()
        .find_map(|item| match item {
            Outbound::Card { chat_id: 5, caption, .. } => Some(caption),
            _ => None,
        })
        .expect("card sent");
    // Still Russian: the invalid code was rejected without touching state.
    assert_eq!(card, "Поделись с друзьями, чтобы открыть эксклюзивный доступ.");
}

#[tokio::test]
async fn test_access_press_reports_progress_and_unlock() {
    let (app, store, gateway) = build();
    let progress = ProgressTracker::new(store.clone(), GOAL);

    app.handle_update(press(5, "cb1", "access")).await;
    for _ in 0..6 {
        progress.increment(5).await;
    }
    app.handle_update(press(5, "cb2", "access")).await;

    let answers = gateway.answers();
    assert_eq!(answers.len(), 2);
    match (&answers[0], &answers[1]) {
        (
            Outbound::CallbackAnswer { text: locked, show_alert: true, .. },
            Outbound::CallbackAnswer { text: unlocked, .. },
        ) => {
            assert!(locked.starts_with("Shares 0/6"));
            assert_eq!(unlocked, "Access unlocked! Welcome in.");
        }
        other => panic!("expected two alerts, got {other:?}"),
    }
    // The unlock also sends the channel keyboard.
    assert!(gateway
        .outbound()
        .iter()
        .any(|item| matches!(item, Outbound::KeyboardMessage { chat_id: 5, .. })));
}

#[tokio::test]
async fn test_referral_start_credits_once() {
    let (app, store, gateway) = build();
    let progress = ProgressTracker::new(store.clone(), GOAL);

    app.handle_update(message(10, "/start 555")).await;
    app.handle_update(message(10, "/start 555")).await;
    app.handle_update(message(11, "/start 555")).await;
    app.handle_update(message(555, "/start 555")).await;

    assert_eq!(progress.get(555).await, 2);
    // The referrer was notified once per landed share.
    let notes: Vec<String> = gateway
        .texts_to(555)
        .into_iter()
        .filter(|text| text.contains("/6"))
        .collect();
    assert_eq!(notes.len(), 2);
    assert!(notes[0].starts_with("+1 share! 1/6"));
}

#[tokio::test]
async fn test_unknown_update_shape_is_a_quiet_ack() {
    let (app, _store, gateway) = build();

    app.handle_update(update(json!({ "edited_message": { "chat": { "id": 1 } } })))
        .await;
    app.handle_update(RawUpdate::default()).await;

    assert!(gateway.outbound().is_empty());
}
