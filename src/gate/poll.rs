//! Poll creation, voting and tallying.
//!
//! Polls are append-only: question and options are immutable once created.
//! Votes overwrite: a user's second vote on the same poll replaces the
//! first. There is no closed state; results can be read while voting
//! continues.

use crate::store::{poll_key, poll_votes_key, Store, POLL_SEQ_KEY};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Smallest number of options a poll may carry.
pub const MIN_OPTIONS: usize = 2;

/// Errors raised by poll operations.
#[derive(Debug, Error)]
pub enum PollError {
    /// The poll text has no question or fewer than two options.
    #[error("a poll needs a question and at least two options")]
    InvalidSpec,
    /// No poll exists under this id.
    #[error("poll {0} does not exist")]
    UnknownPoll(u64),
    /// The vote names an option outside the poll's option list.
    #[error("option {option} is out of range for poll {poll_id}")]
    OptionOutOfRange { poll_id: u64, option: usize },
    /// The store handed out no id, so nothing was persisted.
    #[error("the store did not allocate a poll id")]
    IdAllocation,
    /// The poll record could not be encoded.
    #[error("poll record could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// An immutable poll record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Poll {
    /// Strictly increasing id, unique across the store.
    pub id: u64,
    pub question: String,
    /// Ordered option labels; vote indices refer into this list.
    pub options: Vec<String>,
}

/// Parses the `question | option | option [| ...]` operator syntax.
///
/// # Errors
///
/// Returns `PollError::InvalidSpec` when the question is missing or fewer
/// than two non-empty options remain.
pub fn parse_spec(raw: &str) -> Result<(String, Vec<String>), PollError> {
    let mut parts = raw.split('|').map(str::trim).filter(|part| !part.is_empty());
    let question = parts.next().ok_or(PollError::InvalidSpec)?.to_string();
    let options: Vec<String> = parts.map(ToString::to_string).collect();
    if options.len() < MIN_OPTIONS {
        return Err(PollError::InvalidSpec);
    }
    Ok((question, options))
}

/// Store-backed poll registry.
#[derive(Clone)]
pub struct PollStore {
    store: Arc<dyn Store>,
}

impl PollStore {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Create a poll. Ids come from an atomically incremented counter in the
    /// store, so they are strictly increasing across concurrent creations.
    ///
    /// # Errors
    ///
    /// `InvalidSpec` for fewer than two options; `IdAllocation` when the
    /// store is down and no id could be handed out (nothing partial is
    /// kept).
    pub async fn create(&self, question: &str, options: &[String]) -> Result<Poll, PollError> {
        if options.len() < MIN_OPTIONS {
            return Err(PollError::InvalidSpec);
        }
        let id = self.store.incr(POLL_SEQ_KEY).await;
        if id <= 0 {
            return Err(PollError::IdAllocation);
        }
        let poll = Poll {
            id: id.unsigned_abs(),
            question: question.to_string(),
            options: options.to_vec(),
        };
        let record = serde_json::to_string(&poll)?;
        self.store.set(&poll_key(poll.id), &record).await;
        Ok(poll)
    }

    /// Fetch a poll record.
    pub async fn get(&self, poll_id: u64) -> Option<Poll> {
        let raw = self.store.get(&poll_key(poll_id)).await?;
        match serde_json::from_str(&raw) {
            Ok(poll) => Some(poll),
            Err(e) => {
                warn!("Poll {poll_id} record is corrupt: {e}");
                None
            }
        }
    }

    /// Record a vote. Overwrite semantics: a user's second vote on the same
    /// poll replaces the first, it never accumulates.
    ///
    /// # Errors
    ///
    /// `UnknownPoll` when no such poll exists, `OptionOutOfRange` when the
    /// index does not refer into the poll's option list.
    pub async fn record_vote(
        &self,
        poll_id: u64,
        user_id: i64,
        option: usize,
    ) -> Result<(), PollError> {
        let poll = self
            .get(poll_id)
            .await
            .ok_or(PollError::UnknownPoll(poll_id))?;
        if option >= poll.options.len() {
            return Err(PollError::OptionOutOfRange { poll_id, option });
        }
        self.store
            .hset(&poll_votes_key(poll_id), &user_id.to_string(), &option.to_string())
            .await;
        Ok(())
    }

    /// Aggregate votes per option, in option order. Stored indices outside
    /// the current option range are skipped rather than counted.
    ///
    /// # Errors
    ///
    /// `UnknownPoll` when no such poll exists.
    pub async fn tally(&self, poll_id: u64) -> Result<Vec<u64>, PollError> {
        let poll = self
            .get(poll_id)
            .await
            .ok_or(PollError::UnknownPoll(poll_id))?;
        let mut counts = vec![0_u64; poll.options.len()];
        for (_user, raw) in self.store.hgetall(&poll_votes_key(poll_id)).await {
            match raw.parse::<usize>() {
                Ok(option) if option < counts.len() => counts[option] += 1,
                _ => warn!("Skipping stale vote '{raw}' on poll {poll_id}"),
            }
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;

    #[test]
    fn test_parse_spec() {
        let (question, options) =
            parse_spec("Favourite drop? | Hoodie | Tee | Cap").expect("valid spec");
        assert_eq!(question, "Favourite drop?");
        assert_eq!(options, vec!["Hoodie", "Tee", "Cap"]);

        assert!(matches!(parse_spec(""), Err(PollError::InvalidSpec)));
        assert!(matches!(parse_spec("Question only"), Err(PollError::InvalidSpec)));
        assert!(matches!(parse_spec("Q | one"), Err(PollError::InvalidSpec)));
        // Empty segments are dropped before counting.
        assert!(matches!(parse_spec("Q | | one |"), Err(PollError::InvalidSpec)));
    }

    fn options(labels: &[&str]) -> Vec<String> {
        labels.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn test_create_allocates_increasing_ids() {
        let polls = PollStore::new(Arc::new(MemoryStore::new()));

        let first = polls.create("Q1?", &options(&["A", "B"])).await.expect("created");
        let second = polls.create("Q2?", &options(&["C", "D"])).await.expect("created");

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(polls.get(1).await.map(|p| p.question), Some("Q1?".to_string()));
    }

    #[tokio::test]
    async fn test_fresh_poll_tallies_zero() {
        let polls = PollStore::new(Arc::new(MemoryStore::new()));
        let poll = polls.create("Q?", &options(&["A", "B"])).await.expect("created");

        assert_eq!(polls.tally(poll.id).await.expect("poll exists"), vec![0, 0]);
    }

    #[tokio::test]
    async fn test_second_vote_replaces_first() {
        let polls = PollStore::new(Arc::new(MemoryStore::new()));
        let poll = polls.create("Q?", &options(&["A", "B"])).await.expect("created");

        polls.record_vote(poll.id, 7, 0).await.expect("in range");
        polls.record_vote(poll.id, 7, 1).await.expect("in range");

        assert_eq!(polls.tally(poll.id).await.expect("poll exists"), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_vote_validation() {
        let polls = PollStore::new(Arc::new(MemoryStore::new()));
        let poll = polls.create("Q?", &options(&["A", "B"])).await.expect("created");

        assert!(matches!(
            polls.record_vote(poll.id, 7, 2).await,
            Err(PollError::OptionOutOfRange { option: 2, .. })
        ));
        assert!(matches!(
            polls.record_vote(99, 7, 0).await,
            Err(PollError::UnknownPoll(99))
        ));
    }

    #[tokio::test]
    async fn test_tally_skips_stale_indices() {
        let store = Arc::new(MemoryStore::new());
        let polls = PollStore::new(store.clone());
        let poll = polls.create("Q?", &options(&["A", "B"])).await.expect("created");

        polls.record_vote(poll.id, 7, 1).await.expect("in range");
        // A vote written against an option set that has since shrunk.
        store.hset(&poll_votes_key(poll.id), "8", "5").await;

        assert_eq!(polls.tally(poll.id).await.expect("poll exists"), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_create_fails_without_id_allocation() {
        // A degraded store hands out no id; creation must fail cleanly
        // instead of persisting a poll under id 0.
        let polls = PollStore::new(Arc::new(crate::testing::NullStore));
        assert!(matches!(
            polls.create("Q?", &options(&["A", "B"])).await,
            Err(PollError::IdAllocation)
        ));
    }
}
