//! Write-once score store
//!
//! Holds one immutable [`ScoreRecord`] per pitch identifier. Writes are
//! serialized through a single async gate; the in-memory arena is updated only
//! after the journal has made the write durable, so readers see either the
//! whole record or nothing. Each write runs on its own task, so dropping the
//! caller's future cannot stop it between the journal append and the arena
//! update.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use psr_common::events::EventBus;
use psr_common::PitchId;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::access::AccessController;
use crate::audit::{AuditEntry, AuditHead, AuditLog, ChainVerification};
use crate::error::{RegistryError, Result};
use crate::journal::{JournalError, ScoreJournal};
use crate::record::{ExecutionContext, ScoreRecord, ScoreSubmission, WriteReceipt};

#[derive(Default)]
struct Arena {
    records: Vec<ScoreRecord>,
    index: HashMap<PitchId, usize>,
    audit: AuditLog,
}

struct StoreInner {
    access: AccessController,
    arena: RwLock<Arena>,
    write_gate: Mutex<()>,
    journal: Arc<dyn ScoreJournal>,
    events: EventBus,
}

/// The registry's single mutable resource
pub struct ScoreStore {
    inner: Arc<StoreInner>,
}

impl ScoreStore {
    /// Open a store over `journal`, replaying what it already holds
    ///
    /// Fails if the stored audit chain does not verify or if a pitch
    /// identifier appears twice.
    pub async fn open(
        access: AccessController,
        journal: Arc<dyn ScoreJournal>,
        events: EventBus,
    ) -> std::result::Result<Self, JournalError> {
        let stored = journal.load().await?;

        let mut records = Vec::with_capacity(stored.len());
        let mut index = HashMap::with_capacity(stored.len());
        let mut audit_entries = Vec::with_capacity(stored.len());

        for entry in stored {
            let pitch_id = entry.record.pitch_id();
            if !entry.audit.matches_record(&entry.record) {
                return Err(JournalError::Corrupt(format!(
                    "audit entry {} does not match record {}",
                    entry.audit.sequence, pitch_id
                )));
            }
            if index.insert(pitch_id, records.len()).is_some() {
                return Err(JournalError::Corrupt(format!(
                    "pitch {} recorded twice",
                    pitch_id
                )));
            }
            records.push(entry.record);
            audit_entries.push(entry.audit);
        }

        let audit = AuditLog::from_entries(audit_entries).map_err(|broken| match broken {
            ChainVerification::Broken { sequence, reason } => JournalError::Corrupt(format!(
                "audit chain broken at sequence {}: {}",
                sequence, reason
            )),
            ChainVerification::Intact { .. } => {
                JournalError::Corrupt("audit chain rejected".to_string())
            }
        })?;

        info!(
            journal = journal.name(),
            records = records.len(),
            owner = %access.owner(),
            "Score store opened"
        );

        Ok(Self {
            inner: Arc::new(StoreInner {
                access,
                arena: RwLock::new(Arena {
                    records,
                    index,
                    audit,
                }),
                write_gate: Mutex::new(()),
                journal,
                events,
            }),
        })
    }

    /// Record a score exactly once per pitch identifier
    ///
    /// Checks run in order: caller authorization, absence of an existing
    /// record, then `overall_score > 0`. Any failure, including a journal
    /// failure, leaves stored state and the notification stream untouched.
    /// Once called, the write completes even if the returned future is dropped.
    pub async fn record_score(
        &self,
        ctx: &ExecutionContext,
        submission: ScoreSubmission,
    ) -> Result<WriteReceipt> {
        let inner = Arc::clone(&self.inner);
        let ctx = ctx.clone();

        tokio::spawn(async move { inner.record_score(&ctx, submission).await })
            .await
            .unwrap_or_else(|e| {
                error!(error = %e, "Score write task failed");
                Err(RegistryError::Storage(format!("write task failed: {}", e)))
            })
    }

    /// Read the record for `pitch_id`; never requires authorization
    pub fn get_score(&self, pitch_id: &PitchId) -> Result<ScoreRecord> {
        let arena = self.inner.read_arena();
        arena
            .index
            .get(pitch_id)
            .map(|&slot| arena.records[slot].clone())
            .ok_or(RegistryError::NotFound(*pitch_id))
    }

    pub fn len(&self) -> usize {
        self.inner.read_arena().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read_arena().records.is_empty()
    }

    pub fn audit_head(&self) -> AuditHead {
        self.inner.read_arena().audit.head()
    }

    /// Durable notification log, oldest first, starting after `after`
    pub fn audit_entries_after(&self, after: u64, limit: usize) -> Vec<AuditEntry> {
        self.inner.read_arena().audit.entries_after(after, limit)
    }

    pub fn verify_audit(&self) -> ChainVerification {
        self.inner.read_arena().audit.verify()
    }

    pub fn access(&self) -> &AccessController {
        &self.inner.access
    }

    /// Live notification bus
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }
}

impl StoreInner {
    fn read_arena(&self) -> RwLockReadGuard<'_, Arena> {
        self.arena.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_arena(&self) -> RwLockWriteGuard<'_, Arena> {
        self.arena.write().unwrap_or_else(|e| e.into_inner())
    }

    async fn record_score(
        &self,
        ctx: &ExecutionContext,
        submission: ScoreSubmission,
    ) -> Result<WriteReceipt> {
        let _gate = self.write_gate.lock().await;

        self.access.authorize(&ctx.caller)?;

        let pitch_id = submission.pitch_id;
        let exists = self.read_arena().index.contains_key(&pitch_id);
        if exists {
            warn!(pitch_id = %pitch_id, "Rejected duplicate score");
            return Err(RegistryError::DuplicateEntry(pitch_id));
        }

        if submission.overall_score == 0 {
            warn!(pitch_id = %pitch_id, "Rejected score with zero overall value");
            return Err(RegistryError::InvalidScore);
        }

        let record = ScoreRecord::new(submission, ctx.clock.now(), ctx.caller.clone());
        // the gate is held, so the head cannot move before the push below
        let audit = self.read_arena().audit.next_entry(&record);

        if let Err(e) = self.journal.append(&record, &audit).await {
            error!(pitch_id = %pitch_id, error = %e, "Journal append failed, score not recorded");
            return Err(e.into());
        }

        let receipt = WriteReceipt {
            pitch_id,
            sequence: audit.sequence,
            entry_hash: audit.entry_hash.clone(),
            recorded_at: record.recorded_at(),
        };
        let event = audit.to_event();

        {
            let mut arena = self.write_arena();
            let slot = arena.records.len();
            arena.records.push(record);
            arena.index.insert(pitch_id, slot);
            arena.audit.push(audit);
        }

        self.events.emit_lossy(event);

        info!(
            pitch_id = %pitch_id,
            sequence = receipt.sequence,
            recorded_by = %ctx.caller,
            "Score recorded"
        );

        Ok(receipt)
    }
}
