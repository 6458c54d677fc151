//! SQLite-backed journal
//!
//! Tables are created by `psr_common::db::init_database`. Both tables carry
//! triggers that abort UPDATE and DELETE, so the journal can only grow.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use psr_common::events::ScoreRecorded;
use psr_common::{Identity, PitchId, ProofReference};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use super::{JournalEntry, JournalError, ScoreJournal};
use crate::audit::AuditEntry;
use crate::record::{ScoreRecord, ScoreSubmission};

pub struct SqliteJournal {
    db: SqlitePool,
}

impl SqliteJournal {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }
}

#[async_trait]
impl ScoreJournal for SqliteJournal {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn load(&self) -> Result<Vec<JournalEntry>, JournalError> {
        let rows = sqlx::query(
            r#"
            SELECT r.pitch_id, r.overall_score, r.clarity_score, r.originality_score,
                   r.team_strength_score, r.market_fit_score, r.proof_reference,
                   r.recorded_at, r.recorded_by,
                   a.sequence, a.payload, a.record_digest, a.prev_hash, a.entry_hash
            FROM score_audit a
            JOIN score_records r ON r.pitch_id = a.pitch_id AND r.sequence = a.sequence
            ORDER BY a.sequence
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let (records, audits): (i64, i64) = sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM score_records), (SELECT COUNT(*) FROM score_audit)",
        )
        .fetch_one(&self.db)
        .await?;

        if records != audits || audits as usize != rows.len() {
            return Err(JournalError::Corrupt(format!(
                "{} records, {} audit entries, {} matched",
                records,
                audits,
                rows.len()
            )));
        }

        let entries = rows
            .iter()
            .map(decode_row)
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Loaded {} journal entries", entries.len());
        Ok(entries)
    }

    async fn append(&self, record: &ScoreRecord, audit: &AuditEntry) -> Result<(), JournalError> {
        let payload = serde_json::to_string(&audit.notification)?;
        let sequence = i64::try_from(audit.sequence)
            .map_err(|_| JournalError::Corrupt(format!("sequence {} overflows", audit.sequence)))?;
        let pitch_id = record.pitch_id().to_hex();

        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO score_records (
                pitch_id, overall_score, clarity_score, originality_score,
                team_strength_score, market_fit_score, proof_reference,
                recorded_at, recorded_by, sequence
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&pitch_id)
        .bind(i64::from(record.overall_score()))
        .bind(i64::from(record.clarity_score()))
        .bind(i64::from(record.originality_score()))
        .bind(i64::from(record.team_strength_score()))
        .bind(i64::from(record.market_fit_score()))
        .bind(record.proof_reference().to_hex())
        .bind(format_time(record.recorded_at()))
        .bind(record.recorded_by().as_str())
        .bind(sequence)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO score_audit (
                sequence, pitch_id, payload, record_digest, prev_hash, entry_hash
            )
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(sequence)
        .bind(&pitch_id)
        .bind(&payload)
        .bind(&audit.record_digest)
        .bind(audit.prev_hash.as_deref())
        .bind(&audit.entry_hash)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(pitch_id = %pitch_id, sequence, "Journal append committed");
        Ok(())
    }
}

fn format_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn corrupt(what: &str, err: impl std::fmt::Display) -> JournalError {
    JournalError::Corrupt(format!("{}: {}", what, err))
}

fn score(row: &SqliteRow, column: &str) -> Result<u32, JournalError> {
    let raw: i64 = row.try_get(column)?;
    u32::try_from(raw).map_err(|e| corrupt(column, e))
}

fn decode_row(row: &SqliteRow) -> Result<JournalEntry, JournalError> {
    let pitch_id: String = row.try_get("pitch_id")?;
    let pitch_id = PitchId::from_hex(&pitch_id).map_err(|e| corrupt("pitch_id", e))?;

    let proof: String = row.try_get("proof_reference")?;
    let proof_reference =
        ProofReference::from_hex(&proof).map_err(|e| corrupt("proof_reference", e))?;

    let recorded_at: String = row.try_get("recorded_at")?;
    let recorded_at = DateTime::parse_from_rfc3339(&recorded_at)
        .map_err(|e| corrupt("recorded_at", e))?
        .with_timezone(&Utc);

    let recorded_by: String = row.try_get("recorded_by")?;
    let recorded_by = Identity::new(recorded_by).map_err(|e| corrupt("recorded_by", e))?;

    let submission = ScoreSubmission {
        pitch_id,
        overall_score: score(row, "overall_score")?,
        clarity_score: score(row, "clarity_score")?,
        originality_score: score(row, "originality_score")?,
        team_strength_score: score(row, "team_strength_score")?,
        market_fit_score: score(row, "market_fit_score")?,
        proof_reference,
    };
    let record = ScoreRecord::new(submission, recorded_at, recorded_by);

    let sequence: i64 = row.try_get("sequence")?;
    let sequence = u64::try_from(sequence).map_err(|e| corrupt("sequence", e))?;
    let payload: String = row.try_get("payload")?;
    let notification: ScoreRecorded = serde_json::from_str(&payload)?;

    let audit = AuditEntry {
        sequence,
        notification,
        record_digest: row.try_get("record_digest")?,
        prev_hash: row.try_get("prev_hash")?,
        entry_hash: row.try_get("entry_hash")?,
    };

    if !audit.matches_record(&record) {
        return Err(JournalError::Corrupt(format!(
            "audit entry at sequence {} does not match record {}",
            sequence, pitch_id
        )));
    }

    Ok(JournalEntry { record, audit })
}
