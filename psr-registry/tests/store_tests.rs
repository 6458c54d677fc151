//! Integration tests for the score store
//!
//! Tests cover:
//! - Scenarios A-D (record, duplicate, unauthorized, zero score)
//! - Write-once, positivity and authorization properties
//! - Notification correspondence between records, audit log and live events
//! - All-or-nothing behavior when the journal fails
//! - Writes completing after the caller stops waiting
//! - SQLite journal replay across restarts

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::FutureExt;
use psr_common::db::init_database;
use psr_common::events::{EventBus, RegistryEvent};
use psr_common::time::ManualClock;
use psr_common::{Clock, Identity, PitchId, ProofReference};
use psr_registry::{
    AccessController, AuditEntry, ExecutionContext, JournalEntry, JournalError, MemoryJournal,
    RegistryError, ScoreJournal, ScoreRecord, ScoreStore, ScoreSubmission, SqliteJournal,
};
use tempfile::TempDir;

const OWNER: &str = "scoring-pipeline";

fn h(byte: u8) -> PitchId {
    PitchId::new([byte; 32])
}

fn identity(name: &str) -> Identity {
    Identity::new(name).unwrap()
}

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    ))
}

fn ctx(caller: &str, clock: &Arc<ManualClock>) -> ExecutionContext {
    ExecutionContext::new(identity(caller), clock.clone())
}

fn scores(
    pitch_id: PitchId,
    overall: u32,
    clarity: u32,
    originality: u32,
    team: u32,
    market: u32,
) -> ScoreSubmission {
    ScoreSubmission {
        pitch_id,
        overall_score: overall,
        clarity_score: clarity,
        originality_score: originality,
        team_strength_score: team,
        market_fit_score: market,
        proof_reference: ProofReference::new([0xAA; 32]),
    }
}

fn scenario_a() -> ScoreSubmission {
    scores(h(1), 80, 20, 18, 22, 20)
}

async fn open_store(journal: Arc<dyn ScoreJournal>) -> ScoreStore {
    ScoreStore::open(
        AccessController::initialize(identity(OWNER)),
        journal,
        EventBus::new(64),
    )
    .await
    .expect("store should open")
}

async fn memory_store() -> ScoreStore {
    open_store(Arc::new(MemoryJournal::new())).await
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_scenario_a_authorized_write_is_readable() {
    let store = memory_store().await;
    let clock = clock();

    store
        .record_score(&ctx(OWNER, &clock), scenario_a())
        .await
        .expect("authorized write should succeed");

    let record = store.get_score(&h(1)).expect("record should exist");
    assert_eq!(record.overall_score(), 80);
    assert_eq!(record.clarity_score(), 20);
    assert_eq!(record.originality_score(), 18);
    assert_eq!(record.team_strength_score(), 22);
    assert_eq!(record.market_fit_score(), 20);
    assert_eq!(record.proof_reference(), ProofReference::new([0xAA; 32]));
    assert_eq!(record.recorded_by(), &identity(OWNER));
    assert_eq!(record.recorded_at(), clock.now());
}

#[tokio::test]
async fn test_scenario_b_duplicate_leaves_original() {
    let store = memory_store().await;
    let clock = clock();

    store
        .record_score(&ctx(OWNER, &clock), scenario_a())
        .await
        .unwrap();
    let original = store.get_score(&h(1)).unwrap();

    clock.advance_millis(5_000);
    let err = store
        .record_score(&ctx(OWNER, &clock), scores(h(1), 95, 25, 25, 25, 20))
        .await
        .unwrap_err();

    assert_eq!(err, RegistryError::DuplicateEntry(h(1)));
    assert_eq!(store.get_score(&h(1)).unwrap(), original);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_scenario_c_unauthorized_persists_nothing() {
    let store = memory_store().await;
    let clock = clock();

    let err = store
        .record_score(&ctx("mallory", &clock), scores(h(2), 80, 20, 18, 22, 20))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        RegistryError::Unauthorized {
            caller: identity("mallory")
        }
    );
    assert_eq!(store.get_score(&h(2)), Err(RegistryError::NotFound(h(2))));
    assert_eq!(store.audit_head().sequence, 0);
}

#[tokio::test]
async fn test_scenario_d_zero_score_persists_nothing() {
    let store = memory_store().await;
    let clock = clock();

    let err = store
        .record_score(&ctx(OWNER, &clock), scores(h(3), 0, 20, 18, 22, 20))
        .await
        .unwrap_err();

    assert_eq!(err, RegistryError::InvalidScore);
    assert_eq!(store.get_score(&h(3)), Err(RegistryError::NotFound(h(3))));
    assert!(store.is_empty());
}

// =============================================================================
// Properties
// =============================================================================

#[tokio::test]
async fn test_write_once_regardless_of_payload() {
    let store = memory_store().await;
    let clock = clock();
    store
        .record_score(&ctx(OWNER, &clock), scenario_a())
        .await
        .unwrap();

    // Identical, different, and invalid payloads are all duplicates
    for payload in [
        scenario_a(),
        scores(h(1), 1, 0, 0, 0, 0),
        scores(h(1), 0, 0, 0, 0, 0),
    ] {
        let err = store
            .record_score(&ctx(OWNER, &clock), payload)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "duplicate_entry");
    }

    assert_eq!(store.audit_head().sequence, 1);
}

#[tokio::test]
async fn test_component_scores_are_not_range_checked() {
    let store = memory_store().await;
    let clock = clock();

    store
        .record_score(
            &ctx(OWNER, &clock),
            scores(h(4), 1, u32::MAX, 0, 1_000, 7),
        )
        .await
        .expect("components are stored as given");

    let record = store.get_score(&h(4)).unwrap();
    assert_eq!(record.clarity_score(), u32::MAX);
    assert_eq!(record.originality_score(), 0);
}

#[tokio::test]
async fn test_recorded_by_is_caller_not_payload() {
    let store = memory_store().await;
    let clock = clock();

    let receipt = store
        .record_score(&ctx(OWNER, &clock), scenario_a())
        .await
        .unwrap();

    let record = store.get_score(&h(1)).unwrap();
    assert_eq!(record.recorded_by(), &identity(OWNER));
    assert_eq!(record.recorded_at(), receipt.recorded_at);
}

#[tokio::test]
async fn test_notification_matches_record() {
    let store = memory_store().await;
    let clock = clock();
    let mut rx = store.events().subscribe();

    let receipt = store
        .record_score(&ctx(OWNER, &clock), scenario_a())
        .await
        .unwrap();
    let record = store.get_score(&h(1)).unwrap();

    let RegistryEvent::ScoreRecorded {
        sequence,
        entry_hash,
        notification,
    } = rx.try_recv().expect("one notification");
    assert_eq!(sequence, receipt.sequence);
    assert_eq!(entry_hash, receipt.entry_hash);
    assert_eq!(notification, record.to_notification());

    // Exactly one
    assert!(rx.try_recv().is_err());

    let logged = store.audit_entries_after(0, 10);
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].notification, record.to_notification());
}

#[tokio::test]
async fn test_rejections_emit_nothing() {
    let store = memory_store().await;
    let clock = clock();
    let mut rx = store.events().subscribe();

    let _ = store
        .record_score(&ctx("mallory", &clock), scenario_a())
        .await;
    let _ = store
        .record_score(&ctx(OWNER, &clock), scores(h(3), 0, 1, 1, 1, 1))
        .await;

    assert!(rx.try_recv().is_err());
    assert!(store.audit_entries_after(0, 10).is_empty());
}

#[tokio::test]
async fn test_concurrent_writes_are_serialized() {
    let store = Arc::new(memory_store().await);
    let clock = clock();

    let mut handles = Vec::new();
    for i in 0..16u8 {
        let store = store.clone();
        let writer = ctx(OWNER, &clock);
        // Two writers race for each of eight ids
        let pitch = h(i % 8 + 10);
        handles.push(tokio::spawn(async move {
            store.record_score(&writer, scores(pitch, 50, 1, 1, 1, 1)).await
        }));
    }

    let mut ok = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(RegistryError::DuplicateEntry(_)) => duplicates += 1,
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    assert_eq!(ok, 8);
    assert_eq!(duplicates, 8);
    assert_eq!(store.audit_head().sequence, 8);
    assert!(store.verify_audit().is_intact());
}

// =============================================================================
// Journal failure
// =============================================================================

/// Journal whose appends always fail
struct FailingJournal;

#[async_trait]
impl ScoreJournal for FailingJournal {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn load(&self) -> Result<Vec<JournalEntry>, JournalError> {
        Ok(Vec::new())
    }

    async fn append(&self, _record: &ScoreRecord, _audit: &AuditEntry) -> Result<(), JournalError> {
        Err(JournalError::Corrupt("disk unavailable".to_string()))
    }
}

#[tokio::test]
async fn test_journal_failure_is_all_or_nothing() {
    let store = open_store(Arc::new(FailingJournal)).await;
    let clock = clock();
    let mut rx = store.events().subscribe();

    let err = store
        .record_score(&ctx(OWNER, &clock), scenario_a())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "storage");
    assert_eq!(store.get_score(&h(1)), Err(RegistryError::NotFound(h(1))));
    assert_eq!(store.audit_head().sequence, 0);
    assert!(rx.try_recv().is_err());
}

/// Journal that commits and then yields before acknowledging
#[derive(Default)]
struct CommitThenYield {
    inner: MemoryJournal,
}

#[async_trait]
impl ScoreJournal for CommitThenYield {
    fn name(&self) -> &'static str {
        "commit-then-yield"
    }

    async fn load(&self) -> Result<Vec<JournalEntry>, JournalError> {
        self.inner.load().await
    }

    async fn append(&self, record: &ScoreRecord, audit: &AuditEntry) -> Result<(), JournalError> {
        self.inner.append(record, audit).await?;
        tokio::task::yield_now().await;
        Ok(())
    }
}

#[tokio::test]
async fn test_abandoned_write_still_completes() {
    let journal = Arc::new(CommitThenYield::default());
    let store = open_store(journal.clone()).await;
    let clock = clock();
    let writer = ctx(OWNER, &clock);

    // Poll once, then drop, as a disconnecting HTTP client would
    assert!(store
        .record_score(&writer, scenario_a())
        .now_or_never()
        .is_none());

    tokio::time::timeout(Duration::from_secs(5), async {
        while store.is_empty() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("write should finish without its caller");

    assert_eq!(store.get_score(&h(1)).unwrap().overall_score(), 80);
    assert_eq!(journal.load().await.unwrap().len(), 1);
    assert_eq!(store.audit_head().sequence, 1);

    let err = store
        .record_score(&writer, scenario_a())
        .await
        .unwrap_err();
    assert_eq!(err, RegistryError::DuplicateEntry(h(1)));

    let reopened = open_store(journal).await;
    assert_eq!(reopened.len(), 1);
    assert!(reopened.verify_audit().is_intact());
}

// =============================================================================
// SQLite journal
// =============================================================================

#[tokio::test]
async fn test_sqlite_journal_survives_restart() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("psr.db");
    let clock = clock();

    let receipt = {
        let pool = init_database(&db_path).await.unwrap();
        let store = open_store(Arc::new(SqliteJournal::new(pool.clone()))).await;

        store
            .record_score(&ctx(OWNER, &clock), scenario_a())
            .await
            .unwrap();
        clock.advance_millis(1_234);
        let receipt = store
            .record_score(&ctx(OWNER, &clock), scores(h(2), 61, 10, 11, 12, 13))
            .await
            .unwrap();
        pool.close().await;
        receipt
    };

    let pool = init_database(&db_path).await.unwrap();
    let store = open_store(Arc::new(SqliteJournal::new(pool))).await;

    assert_eq!(store.len(), 2);
    assert_eq!(store.audit_head().sequence, 2);
    assert_eq!(store.audit_head().head_hash, Some(receipt.entry_hash));
    assert!(store.verify_audit().is_intact());

    let record = store.get_score(&h(2)).unwrap();
    assert_eq!(record.overall_score(), 61);
    assert_eq!(record.recorded_at(), receipt.recorded_at);

    // Write-once holds across the restart
    let err = store
        .record_score(&ctx(OWNER, &clock), scores(h(2), 99, 1, 1, 1, 1))
        .await
        .unwrap_err();
    assert_eq!(err, RegistryError::DuplicateEntry(h(2)));

    let next = store
        .record_score(&ctx(OWNER, &clock), scores(h(3), 70, 1, 1, 1, 1))
        .await
        .unwrap();
    assert_eq!(next.sequence, 3);
}

#[tokio::test]
async fn test_sqlite_journal_rejects_tampered_payload() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("psr.db");
    let clock = clock();

    let pool = init_database(&db_path).await.unwrap();
    {
        let store = open_store(Arc::new(SqliteJournal::new(pool.clone()))).await;
        store
            .record_score(&ctx(OWNER, &clock), scenario_a())
            .await
            .unwrap();
    }

    // Bypass the write-once triggers to simulate out-of-band tampering
    sqlx::query("DROP TRIGGER score_records_no_update")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("UPDATE score_records SET overall_score = 99")
        .execute(&pool)
        .await
        .unwrap();

    let result = ScoreStore::open(
        AccessController::initialize(identity(OWNER)),
        Arc::new(SqliteJournal::new(pool)),
        EventBus::new(8),
    )
    .await;

    assert!(matches!(result, Err(JournalError::Corrupt(_))));
}

#[tokio::test]
async fn test_sqlite_journal_rejects_tampered_component_score() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("psr.db");
    let clock = clock();

    let pool = init_database(&db_path).await.unwrap();
    {
        let store = open_store(Arc::new(SqliteJournal::new(pool.clone()))).await;
        store
            .record_score(&ctx(OWNER, &clock), scenario_a())
            .await
            .unwrap();
    }

    // Component scores are not part of the notification payload
    sqlx::query("DROP TRIGGER score_records_no_update")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("UPDATE score_records SET clarity_score = 99, market_fit_score = 1")
        .execute(&pool)
        .await
        .unwrap();

    let result = ScoreStore::open(
        AccessController::initialize(identity(OWNER)),
        Arc::new(SqliteJournal::new(pool)),
        EventBus::new(8),
    )
    .await;

    assert!(matches!(result, Err(JournalError::Corrupt(_))));
}

#[tokio::test]
async fn test_sqlite_journal_rejects_tampered_record_digest() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("psr.db");
    let clock = clock();

    let pool = init_database(&db_path).await.unwrap();
    {
        let store = open_store(Arc::new(SqliteJournal::new(pool.clone()))).await;
        store
            .record_score(&ctx(OWNER, &clock), scenario_a())
            .await
            .unwrap();
    }

    // Rewriting both the record and its digest still breaks the chain hash
    sqlx::query("DROP TRIGGER score_records_no_update")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("DROP TRIGGER score_audit_no_update")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("UPDATE score_records SET clarity_score = 99")
        .execute(&pool)
        .await
        .unwrap();

    // Digest of the rewritten record, as an attacker could compute it
    let mut forged = scenario_a();
    forged.clarity_score = 99;
    let scratch = memory_store().await;
    scratch
        .record_score(&ctx(OWNER, &clock), forged)
        .await
        .unwrap();
    let forged_digest = scratch.audit_entries_after(0, 1)[0].record_digest.clone();

    sqlx::query("UPDATE score_audit SET record_digest = ?")
        .bind(&forged_digest)
        .execute(&pool)
        .await
        .unwrap();

    let result = ScoreStore::open(
        AccessController::initialize(identity(OWNER)),
        Arc::new(SqliteJournal::new(pool)),
        EventBus::new(8),
    )
    .await;

    assert!(matches!(result, Err(JournalError::Corrupt(_))));
}
