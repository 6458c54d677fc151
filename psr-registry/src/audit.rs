//! Hash-chained audit log of successful writes
//!
//! Every recorded score appends one entry. Each entry hash covers its
//! sequence number, the previous entry hash, the notification payload and the
//! digest of the full record, so rewriting or dropping any past entry (or any
//! field of its record) breaks every later link.

use chrono::SecondsFormat;
use psr_common::events::{RegistryEvent, ScoreRecorded};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::record::ScoreRecord;

/// One link of the audit chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// 1-based, gap-free
    pub sequence: u64,
    pub notification: ScoreRecorded,
    /// [`ScoreRecord::digest`] of the record this entry announces
    pub record_digest: String,
    /// `None` only for the first entry
    pub prev_hash: Option<String>,
    pub entry_hash: String,
}

impl AuditEntry {
    /// Build the entry following `prev_hash` at `sequence`
    pub fn new(sequence: u64, record: &ScoreRecord, prev_hash: Option<String>) -> Self {
        let notification = record.to_notification();
        let record_digest = record.digest();
        let entry_hash =
            compute_entry_hash(sequence, prev_hash.as_deref(), &notification, &record_digest);
        Self {
            sequence,
            notification,
            record_digest,
            prev_hash,
            entry_hash,
        }
    }

    /// Recompute this entry's hash and compare with the stored one
    pub fn verify(&self) -> bool {
        compute_entry_hash(
            self.sequence,
            self.prev_hash.as_deref(),
            &self.notification,
            &self.record_digest,
        ) == self.entry_hash
    }

    /// Whether `record` is the one this entry was written for
    pub fn matches_record(&self, record: &ScoreRecord) -> bool {
        self.notification == record.to_notification() && self.record_digest == record.digest()
    }

    /// Check the link from `prev` (or the chain start) to this entry
    pub fn verify_link(&self, prev: Option<&AuditEntry>) -> bool {
        match (prev, &self.prev_hash) {
            (Some(prev), Some(prev_hash)) => {
                prev.entry_hash == *prev_hash && prev.sequence + 1 == self.sequence
            }
            (None, None) => self.sequence == 1,
            _ => false,
        }
    }

    /// Live notification carrying this entry
    pub fn to_event(&self) -> RegistryEvent {
        RegistryEvent::ScoreRecorded {
            sequence: self.sequence,
            entry_hash: self.entry_hash.clone(),
            notification: self.notification.clone(),
        }
    }
}

fn content_hash(notification: &ScoreRecorded) -> Sha256 {
    let mut hasher = Sha256::new();
    hasher.update(notification.pitch_id.as_bytes());
    hasher.update(notification.overall_score.to_le_bytes());
    hasher.update(notification.proof_reference.as_bytes());
    hasher.update(
        notification
            .recorded_at
            .to_rfc3339_opts(SecondsFormat::AutoSi, true)
            .as_bytes(),
    );
    let writer = notification.recorded_by.as_str().as_bytes();
    hasher.update((writer.len() as u64).to_le_bytes());
    hasher.update(writer);
    hasher
}

fn compute_entry_hash(
    sequence: u64,
    prev_hash: Option<&str>,
    notification: &ScoreRecorded,
    record_digest: &str,
) -> String {
    let content = content_hash(notification).finalize();

    let mut hasher = Sha256::new();
    hasher.update(sequence.to_le_bytes());
    hasher.update(content);
    hasher.update(record_digest.as_bytes());
    if let Some(prev) = prev_hash {
        hasher.update(prev.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Current end of the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditHead {
    /// 0 while the log is empty
    pub sequence: u64,
    pub head_hash: Option<String>,
}

/// Outcome of a full chain check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChainVerification {
    Intact { entries: u64 },
    Broken { sequence: u64, reason: String },
}

impl ChainVerification {
    pub fn is_intact(&self) -> bool {
        matches!(self, ChainVerification::Intact { .. })
    }
}

/// Verify every hash and every link of `entries`, first failure wins
pub fn verify_chain(entries: &[AuditEntry]) -> ChainVerification {
    let mut prev: Option<&AuditEntry> = None;

    for (idx, entry) in entries.iter().enumerate() {
        let expected_sequence = idx as u64 + 1;
        if entry.sequence != expected_sequence {
            return ChainVerification::Broken {
                sequence: entry.sequence,
                reason: format!("expected sequence {}", expected_sequence),
            };
        }
        if !entry.verify() {
            return ChainVerification::Broken {
                sequence: entry.sequence,
                reason: "entry hash mismatch".to_string(),
            };
        }
        if !entry.verify_link(prev) {
            return ChainVerification::Broken {
                sequence: entry.sequence,
                reason: "previous hash mismatch".to_string(),
            };
        }
        prev = Some(entry);
    }

    ChainVerification::Intact {
        entries: entries.len() as u64,
    }
}

/// Ordered, append-only sequence of audit entries
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    entries: Vec<AuditEntry>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt entries loaded from durable storage, refusing a broken chain
    pub fn from_entries(entries: Vec<AuditEntry>) -> Result<Self, ChainVerification> {
        match verify_chain(&entries) {
            ChainVerification::Intact { .. } => Ok(Self { entries }),
            broken => Err(broken),
        }
    }

    pub fn head(&self) -> AuditHead {
        match self.entries.last() {
            Some(last) => AuditHead {
                sequence: last.sequence,
                head_hash: Some(last.entry_hash.clone()),
            },
            None => AuditHead {
                sequence: 0,
                head_hash: None,
            },
        }
    }

    /// Entry that would follow the current head; not appended
    pub fn next_entry(&self, record: &ScoreRecord) -> AuditEntry {
        let head = self.head();
        AuditEntry::new(head.sequence + 1, record, head.head_hash)
    }

    /// Append an entry built by [`AuditLog::next_entry`] against the current head
    pub(crate) fn push(&mut self, entry: AuditEntry) {
        debug_assert!(entry.verify_link(self.entries.last()));
        self.entries.push(entry);
    }

    /// Up to `limit` entries with sequence greater than `after`
    pub fn entries_after(&self, after: u64, limit: usize) -> Vec<AuditEntry> {
        // sequence n lives at index n - 1
        let start = usize::try_from(after)
            .unwrap_or(usize::MAX)
            .min(self.entries.len());
        self.entries[start..].iter().take(limit).cloned().collect()
    }

    pub fn verify(&self) -> ChainVerification {
        verify_chain(&self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
