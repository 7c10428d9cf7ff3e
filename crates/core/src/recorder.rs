//! Training Records
//!
//! Every finished dialogue produces one `TrainingRecord`. The coach hands it
//! to a `TrainingRecorder` after the session has already been discarded, so a
//! failing recorder can lose a record but never resurrect or duplicate a
//! session. Reports read the history back through the same trait.

use crate::catalog::Archetype;
use crate::evaluation::Evaluation;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Training record storage is unavailable: {0}")]
    Unavailable(String),
    #[error("Training record could not be encoded: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Summary of one finished training dialogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub session_id: String,
    pub trainee_id: String,
    pub topic: String,
    pub archetype: Archetype,
    pub turn_count: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub evaluation: Evaluation,
}

/// Defines the contract for storing and querying finished training records.
///
/// Implementations may be in-memory or database-backed; the coach only
/// depends on this trait.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrainingRecorder: Send + Sync {
    /// Persists one finished dialogue.
    async fn record(&self, record: TrainingRecord) -> Result<(), RecordError>;

    /// Records for one trainee that ended at or after `since`, oldest first.
    ///
    /// # Arguments
    ///
    /// * `trainee_id` - The trainee whose history is requested.
    /// * `since` - Lower bound on `ended_at`.
    async fn history(
        &self,
        trainee_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<TrainingRecord>, RecordError>;

    /// Records for all trainees that ended at or after `since`, oldest first.
    async fn all_since(&self, since: DateTime<Utc>) -> Result<Vec<TrainingRecord>, RecordError>;
}

/// Process-local recorder used when no database is configured, and in tests.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    records: Mutex<Vec<TrainingRecord>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn filtered(&self, keep: impl Fn(&TrainingRecord) -> bool) -> Vec<TrainingRecord> {
        let mut records: Vec<TrainingRecord> = self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| keep(r))
            .cloned()
            .collect();
        records.sort_by_key(|r| r.ended_at);
        records
    }
}

#[async_trait]
impl TrainingRecorder for MemoryRecorder {
    async fn record(&self, record: TrainingRecord) -> Result<(), RecordError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        Ok(())
    }

    async fn history(
        &self,
        trainee_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<TrainingRecord>, RecordError> {
        Ok(self.filtered(|r| r.trainee_id == trainee_id && r.ended_at >= since))
    }

    async fn all_since(&self, since: DateTime<Utc>) -> Result<Vec<TrainingRecord>, RecordError> {
        Ok(self.filtered(|r| r.ended_at >= since))
    }
}
