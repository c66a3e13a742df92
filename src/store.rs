//! Remote key/value store adapter
//!
//! Speaks the Upstash-style Redis REST protocol: one `POST` per command with
//! a JSON array body and a bearer token, answered with a `{"result": …}`
//! envelope. Every operation degrades to a safe default (empty list / `None`
//! / zero) when the store is unconfigured or unreachable, so callers never
//! handle store failures inline.

use crate::config::Settings;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

/// Persistent set of every user id the bot has seen.
pub const SUBSCRIBERS_KEY: &str = "gate:subs";
/// Hash of per-user share counters.
pub const SHARES_KEY: &str = "gate:shares";
/// Counter allocating poll ids.
pub const POLL_SEQ_KEY: &str = "gate:poll:seq";
/// Broadcast mutual-exclusion flag. No expiry; cleared by `/unlock`.
pub const BROADCAST_LOCK_KEY: &str = "gate:broadcast_lock";
/// Stored daily teaser text.
pub const TEASER_KEY: &str = "gate:teaser";

/// Key holding the language code of one user.
#[must_use]
pub fn lang_key(user_id: i64) -> String {
    format!("gate:lang:{user_id}")
}

/// Key holding one poll record.
#[must_use]
pub fn poll_key(poll_id: u64) -> String {
    format!("gate:poll:{poll_id}")
}

/// Hash of votes for one poll, field = user id, value = option index.
#[must_use]
pub fn poll_votes_key(poll_id: u64) -> String {
    format!("gate:poll:{poll_id}:votes")
}

/// Set of newcomers that already credited one referrer.
#[must_use]
pub fn credited_key(referrer: i64) -> String {
    format!("gate:credited:{referrer}")
}

/// Primitive operations the gate needs from the remote store.
///
/// Implementations must be safe to call concurrently and must degrade to the
/// documented defaults instead of failing; there are no cross-key
/// transactions, so callers rely on idempotent operations (set-add,
/// overwrite-set) to tolerate partial application.
#[async_trait]
pub trait Store: Send + Sync {
    /// Add `member` to the set at `key`. Returns `true` if it was not
    /// already present. Default: `false`.
    async fn sadd(&self, key: &str, member: &str) -> bool;
    /// All members of the set at `key`. Default: empty.
    async fn smembers(&self, key: &str) -> Vec<String>;
    /// String value at `key`. Default: `None`.
    async fn get(&self, key: &str) -> Option<String>;
    /// Set the string value at `key`.
    async fn set(&self, key: &str, value: &str);
    /// Set `key` only if it does not exist yet. Returns `true` when the
    /// value was written. Degrades to `true`: an unreadable flag must not
    /// wedge the admin surface, and an unreachable store yields an empty
    /// fan-out anyway.
    async fn set_nx(&self, key: &str, value: &str) -> bool;
    /// Delete `key`.
    async fn del(&self, key: &str);
    /// Increment the integer at `key`, returning the new value. Default: 0.
    async fn incr(&self, key: &str) -> i64;
    /// Value of `field` in the hash at `key`. Default: `None`.
    async fn hget(&self, key: &str, field: &str) -> Option<String>;
    /// Set `field` in the hash at `key`, overwriting any prior value.
    async fn hset(&self, key: &str, field: &str, value: &str);
    /// Increment `field` in the hash at `key` by `delta`, returning the new
    /// value. Default: 0.
    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> i64;
    /// Every `(field, value)` pair in the hash at `key`. Default: empty.
    async fn hgetall(&self, key: &str) -> Vec<(String, String)>;
}

struct Target {
    url: String,
    token: String,
}

/// REST client for an Upstash-style Redis endpoint.
pub struct UpstashStore {
    client: reqwest::Client,
    target: Option<Target>,
}

impl UpstashStore {
    /// Build the adapter from settings. Missing endpoint or token leaves the
    /// adapter in degraded mode, which is useful during first boot.
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        let target = match (
            settings.upstash_redis_rest_url.as_ref(),
            settings.upstash_redis_rest_token.as_ref(),
        ) {
            (Some(url), Some(token)) if !url.is_empty() && !token.is_empty() => Some(Target {
                url: url.clone(),
                token: token.clone(),
            }),
            _ => {
                warn!("Remote store is not configured; store operations degrade to defaults");
                None
            }
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .unwrap_or_default();

        Self { client, target }
    }

    /// Run one command, returning its `result` value or `None` on any
    /// failure.
    async fn command(&self, cmd: &[&str]) -> Option<Value> {
        let target = self.target.as_ref()?;

        let response = self
            .client
            .post(&target.url)
            .bearer_auth(&target.token)
            .json(&cmd)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!("Store command {} failed: {e}", cmd.first().copied().unwrap_or_default());
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(
                "Store command {} returned status {}",
                cmd.first().copied().unwrap_or_default(),
                response.status()
            );
            return None;
        }

        match response.json::<Value>().await {
            Ok(mut body) => Some(body.get_mut("result").map(Value::take).unwrap_or(Value::Null)),
            Err(e) => {
                warn!("Store response was not valid JSON: {e}");
                None
            }
        }
    }
}

/// Coerce a result value to an integer; Upstash serialises numbers either
/// natively or as decimal strings.
fn as_int(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n.as_i64().unwrap_or(0),
        Value::String(s) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

fn as_opt_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl Store for UpstashStore {
    async fn sadd(&self, key: &str, member: &str) -> bool {
        self.command(&["SADD", key, member])
            .await
            .is_some_and(|v| as_int(&v) == 1)
    }

    async fn smembers(&self, key: &str) -> Vec<String> {
        match self.command(&["SMEMBERS", key]).await {
            Some(Value::Array(items)) => items.into_iter().filter_map(as_opt_string).collect(),
            _ => Vec::new(),
        }
    }

    async fn get(&self, key: &str) -> Option<String> {
        self.command(&["GET", key]).await.and_then(as_opt_string)
    }

    async fn set(&self, key: &str, value: &str) {
        let _ = self.command(&["SET", key, value]).await;
    }

    async fn set_nx(&self, key: &str, value: &str) -> bool {
        match self.command(&["SET", key, value, "NX"]).await {
            // Null means the key already existed and nothing was written.
            Some(Value::Null) => false,
            Some(_) | None => true,
        }
    }

    async fn del(&self, key: &str) {
        let _ = self.command(&["DEL", key]).await;
    }

    async fn incr(&self, key: &str) -> i64 {
        self.command(&["INCR", key])
            .await
            .map_or(0, |v| as_int(&v))
    }

    async fn hget(&self, key: &str, field: &str) -> Option<String> {
        self.command(&["HGET", key, field])
            .await
            .and_then(as_opt_string)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) {
        let _ = self.command(&["HSET", key, field, value]).await;
    }

    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> i64 {
        let delta = delta.to_string();
        self.command(&["HINCRBY", key, field, &delta])
            .await
            .map_or(0, |v| as_int(&v))
    }

    async fn hgetall(&self, key: &str) -> Vec<(String, String)> {
        // Upstash returns a flat [field, value, field, value, ...] array.
        match self.command(&["HGETALL", key]).await {
            Some(Value::Array(items)) => items
                .chunks_exact(2)
                .filter_map(|pair| match pair {
                    [Value::String(field), Value::String(value)] => {
                        Some((field.clone(), value.clone()))
                    }
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_as_int_coercion() {
        assert_eq!(as_int(&json!(5)), 5);
        assert_eq!(as_int(&json!("7")), 7);
        assert_eq!(as_int(&json!("not a number")), 0);
        assert_eq!(as_int(&Value::Null), 0);
    }

    #[tokio::test]
    async fn test_unconfigured_store_degrades() {
        let settings = Settings {
            telegram_token: "dummy".to_string(),
            admin_ids_str: None,
            goal: 6,
            share_url: None,
            channel_url: None,
            ui_media_url: None,
            upstash_redis_rest_url: None,
            upstash_redis_rest_token: None,
            broadcast_delay_ms: 0,
            fanout_limit: 100,
            locale_cache_size: 100,
            listen_addr: "127.0.0.1:0".to_string(),
        };
        let store = UpstashStore::new(&settings);

        assert!(!store.sadd("k", "m").await);
        assert!(store.smembers("k").await.is_empty());
        assert_eq!(store.get("k").await, None);
        assert_eq!(store.incr("k").await, 0);
        assert_eq!(store.hincrby("k", "f", 1).await, 0);
        assert!(store.hgetall("k").await.is_empty());
        // The flag degrades to "acquired" so admin commands never wedge.
        assert!(store.set_nx("k", "1").await);
    }
}
