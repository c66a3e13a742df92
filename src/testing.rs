//! In-memory doubles for hermetic tests.
//!
//! [`MemoryStore`] implements real set/hash/string semantics so invariants
//! like idempotent registration or overwrite voting can be exercised without
//! the remote store. [`RecordingGateway`] captures every outbound payload
//! and can be told to fail chosen recipients. [`NullStore`] degrades every
//! operation, mirroring an unconfigured remote store.

use crate::gateway::{Gateway, GatewayError};
use crate::store::Store;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use teloxide::types::{BotCommand, InlineKeyboardMarkup};

#[derive(Default)]
struct MemoryInner {
    strings: HashMap<String, String>,
    sets: HashMap<String, HashSet<String>>,
    hashes: HashMap<String, HashMap<String, String>>,
}

/// In-memory [`Store`] with real Redis-like semantics.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn sadd(&self, key: &str, member: &str) -> bool {
        self.locked()
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string())
    }

    async fn smembers(&self, key: &str) -> Vec<String> {
        let mut members: Vec<String> = self
            .locked()
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        members.sort();
        members
    }

    async fn get(&self, key: &str) -> Option<String> {
        self.locked().strings.get(key).cloned()
    }

    async fn set(&self, key: &str, value: &str) {
        self.locked().strings.insert(key.to_string(), value.to_string());
    }

    async fn set_nx(&self, key: &str, value: &str) -> bool {
        let mut inner = self.locked();
        if inner.strings.contains_key(key) {
            false
        } else {
            inner.strings.insert(key.to_string(), value.to_string());
            true
        }
    }

    async fn del(&self, key: &str) {
        let mut inner = self.locked();
        inner.strings.remove(key);
        inner.sets.remove(key);
        inner.hashes.remove(key);
    }

    async fn incr(&self, key: &str) -> i64 {
        let mut inner = self.locked();
        let value = inner.strings.entry(key.to_string()).or_insert_with(|| "0".to_string());
        let next = value.parse::<i64>().unwrap_or(0) + 1;
        *value = next.to_string();
        next
    }

    async fn hget(&self, key: &str, field: &str) -> Option<String> {
        self.locked()
            .hashes
            .get(key)
            .and_then(|hash| hash.get(field).cloned())
    }

    async fn hset(&self, key: &str, field: &str, value: &str) {
        self.locked()
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
    }

    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> i64 {
        let mut inner = self.locked();
        let entry = inner
            .hashes
            .entry(key.to_string())
            .or_default()
            .entry(field.to_string())
            .or_insert_with(|| "0".to_string());
        let next = entry.parse::<i64>().unwrap_or(0) + delta;
        *entry = next.to_string();
        next
    }

    async fn hgetall(&self, key: &str) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .locked()
            .hashes
            .get(key)
            .map(|hash| hash.iter().map(|(f, v)| (f.clone(), v.clone())).collect())
            .unwrap_or_default();
        pairs.sort();
        pairs
    }
}

/// [`Store`] double that degrades every operation to its default, mirroring
/// an unconfigured remote store.
pub struct NullStore;

#[async_trait]
impl Store for NullStore {
    async fn sadd(&self, _key: &str, _member: &str) -> bool {
        false
    }
    async fn smembers(&self, _key: &str) -> Vec<String> {
        Vec::new()
    }
    async fn get(&self, _key: &str) -> Option<String> {
        None
    }
    async fn set(&self, _key: &str, _value: &str) {}
    async fn set_nx(&self, _key: &str, _value: &str) -> bool {
        true
    }
    async fn del(&self, _key: &str) {}
    async fn incr(&self, _key: &str) -> i64 {
        0
    }
    async fn hget(&self, _key: &str, _field: &str) -> Option<String> {
        None
    }
    async fn hset(&self, _key: &str, _field: &str, _value: &str) {}
    async fn hincrby(&self, _key: &str, _field: &str, _delta: i64) -> i64 {
        0
    }
    async fn hgetall(&self, _key: &str) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// One captured outbound payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text {
        chat_id: i64,
        text: String,
    },
    KeyboardMessage {
        chat_id: i64,
        text: String,
        keyboard: InlineKeyboardMarkup,
    },
    Card {
        chat_id: i64,
        caption: String,
        keyboard: InlineKeyboardMarkup,
    },
    CallbackAnswer {
        callback_id: String,
        text: String,
        show_alert: bool,
    },
    Copy {
        to_chat: i64,
        from_chat: i64,
        message_id: i32,
    },
}

/// Records every gateway call; chosen recipients can be made to fail the
/// way a blocked bot does.
#[derive(Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<Outbound>>,
    failing: Mutex<HashSet<i64>>,
}

impl RecordingGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send to `chat_id` fail.
    pub fn fail_chat(&self, chat_id: i64) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(chat_id);
    }

    /// Everything sent so far, in order.
    #[must_use]
    pub fn outbound(&self) -> Vec<Outbound> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Texts delivered to `chat_id`, for targeted assertions.
    #[must_use]
    pub fn texts_to(&self, chat_id: i64) -> Vec<String> {
        self.outbound()
            .into_iter()
            .filter_map(|item| match item {
                Outbound::Text { chat_id: target, text } if target == chat_id => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Callback answers recorded so far.
    #[must_use]
    pub fn answers(&self) -> Vec<Outbound> {
        self.outbound()
            .into_iter()
            .filter(|item| matches!(item, Outbound::CallbackAnswer { .. }))
            .collect()
    }

    fn push(&self, item: Outbound) {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).push(item);
    }

    fn check(&self, chat_id: i64) -> Result<(), GatewayError> {
        if self
            .failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&chat_id)
        {
            return Err(GatewayError::Api(
                "Forbidden: bot was blocked by the user".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Gateway for RecordingGateway {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), GatewayError> {
        self.check(chat_id)?;
        self.push(Outbound::Text {
            chat_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_keyboard(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: &InlineKeyboardMarkup,
    ) -> Result<(), GatewayError> {
        self.check(chat_id)?;
        self.push(Outbound::KeyboardMessage {
            chat_id,
            text: text.to_string(),
            keyboard: keyboard.clone(),
        });
        Ok(())
    }

    async fn send_card(
        &self,
        chat_id: i64,
        caption: &str,
        keyboard: &InlineKeyboardMarkup,
    ) -> Result<(), GatewayError> {
        self.check(chat_id)?;
        self.push(Outbound::Card {
            chat_id,
            caption: caption.to_string(),
            keyboard: keyboard.clone(),
        });
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: &str,
        show_alert: bool,
    ) -> Result<(), GatewayError> {
        self.push(Outbound::CallbackAnswer {
            callback_id: callback_id.to_string(),
            text: text.to_string(),
            show_alert,
        });
        Ok(())
    }

    async fn copy_message(
        &self,
        to_chat: i64,
        from_chat: i64,
        message_id: i32,
    ) -> Result<(), GatewayError> {
        self.check(to_chat)?;
        self.push(Outbound::Copy {
            to_chat,
            from_chat,
            message_id,
        });
        Ok(())
    }

    async fn set_default_commands(&self, _commands: &[BotCommand]) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn set_chat_commands(
        &self,
        _chat_id: i64,
        _commands: &[BotCommand],
    ) -> Result<(), GatewayError> {
        Ok(())
    }
}
