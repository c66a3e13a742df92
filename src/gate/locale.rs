//! Per-user language selection.
//!
//! A bounded in-process cache in front of the authoritative store. The cache
//! is never the source of truth: entries are last-writer-wins and staleness
//! is tolerated, so concurrent reads and writes need no coordination beyond
//! the cache's own.

use crate::store::{lang_key, Store};
use moka::future::Cache;
use std::sync::Arc;
use thiserror::Error;

/// Language used when a user has no stored, or an invalid, code.
pub const DEFAULT_LANG: &str = "en";

/// Language codes the message catalog covers.
pub const SUPPORTED_LANGS: &[&str] = &["en", "ru", "es"];

/// Whether `code` is one of the supported language codes.
#[must_use]
pub fn is_supported(code: &str) -> bool {
    SUPPORTED_LANGS.contains(&code)
}

/// Error for locale writes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocaleError {
    /// The language code is not in the supported set.
    #[error("unsupported language code: {0}")]
    Unsupported(String),
}

/// Cached view over the per-user language codes in the store.
#[derive(Clone)]
pub struct LocaleStore {
    cache: Cache<i64, String>,
    store: Arc<dyn Store>,
}

impl LocaleStore {
    /// Build the store with a cache bounded at `capacity` entries.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, capacity: u64) -> Self {
        Self {
            cache: Cache::new(capacity),
            store,
        }
    }

    /// Resolve the language for `user_id`: cache, then store, then default.
    /// Invalid stored codes resolve to the default at read time.
    pub async fn get(&self, user_id: i64) -> String {
        if let Some(code) = self.cache.get(&user_id).await {
            return code;
        }

        let code = match self.store.get(&lang_key(user_id)).await {
            Some(code) if is_supported(&code) => code,
            _ => DEFAULT_LANG.to_string(),
        };
        self.cache.insert(user_id, code.clone()).await;
        code
    }

    /// Store a language choice. Unsupported codes are rejected and neither
    /// the cache nor the store is touched; the user keeps resolving to the
    /// prior (or default) value.
    ///
    /// # Errors
    ///
    /// Returns `LocaleError::Unsupported` when `code` is outside the
    /// supported set.
    pub async fn set(&self, user_id: i64, code: &str) -> Result<(), LocaleError> {
        if !is_supported(code) {
            return Err(LocaleError::Unsupported(code.to_string()));
        }
        self.cache.insert(user_id, code.to_string()).await;
        self.store.set(&lang_key(user_id), code).await;
        Ok(())
    }
}
