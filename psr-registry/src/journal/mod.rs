//! Durability layer behind the score store
//!
//! The store keeps its working set in memory and hands every accepted write to
//! a [`ScoreJournal`] before publishing it. A journal must make the record and
//! its audit entry durable together or not at all.

mod sqlite;

pub use sqlite::SqliteJournal;

use async_trait::async_trait;
use std::sync::Mutex;
use thiserror::Error;

use crate::audit::AuditEntry;
use crate::record::ScoreRecord;

/// Journal failures
#[derive(Error, Debug)]
pub enum JournalError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored data does not decode into a valid record
    #[error("Corrupt journal: {0}")]
    Corrupt(String),
}

/// A record together with the audit entry announcing it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub record: ScoreRecord,
    pub audit: AuditEntry,
}

/// Append-only durable storage for records and their audit entries
#[async_trait]
pub trait ScoreJournal: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Every stored entry in audit sequence order
    async fn load(&self) -> Result<Vec<JournalEntry>, JournalError>;

    /// Durably store one record and its audit entry atomically
    async fn append(&self, record: &ScoreRecord, audit: &AuditEntry) -> Result<(), JournalError>;
}

/// Process-lifetime journal with no durability
#[derive(Debug, Default)]
pub struct MemoryJournal {
    entries: Mutex<Vec<JournalEntry>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScoreJournal for MemoryJournal {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn load(&self) -> Result<Vec<JournalEntry>, JournalError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    async fn append(&self, record: &ScoreRecord, audit: &AuditEntry) -> Result<(), JournalError> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(JournalEntry {
                record: record.clone(),
                audit: audit.clone(),
            });
        Ok(())
    }
}
