//! Score submissions, persisted records and write receipts

use chrono::{DateTime, Utc};
use psr_common::events::ScoreRecorded;
use psr_common::{Clock, Identity, PitchId, ProofReference};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// Caller-supplied payload of a write
///
/// Carries only values computed upstream; the store adds the time and the
/// writer identity itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSubmission {
    pub pitch_id: PitchId,
    pub overall_score: u32,
    pub clarity_score: u32,
    pub originality_score: u32,
    pub team_strength_score: u32,
    pub market_fit_score: u32,
    pub proof_reference: ProofReference,
}

/// One immutable score record
///
/// Constructed only by the store. Fields are exposed through accessors so a
/// record obtained from a read can never be altered in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreRecord {
    pitch_id: PitchId,
    overall_score: u32,
    clarity_score: u32,
    originality_score: u32,
    team_strength_score: u32,
    market_fit_score: u32,
    proof_reference: ProofReference,
    recorded_at: DateTime<Utc>,
    recorded_by: Identity,
}

impl ScoreRecord {
    pub(crate) fn new(
        submission: ScoreSubmission,
        recorded_at: DateTime<Utc>,
        recorded_by: Identity,
    ) -> Self {
        Self {
            pitch_id: submission.pitch_id,
            overall_score: submission.overall_score,
            clarity_score: submission.clarity_score,
            originality_score: submission.originality_score,
            team_strength_score: submission.team_strength_score,
            market_fit_score: submission.market_fit_score,
            proof_reference: submission.proof_reference,
            recorded_at,
            recorded_by,
        }
    }

    pub fn pitch_id(&self) -> PitchId {
        self.pitch_id
    }

    pub fn overall_score(&self) -> u32 {
        self.overall_score
    }

    pub fn clarity_score(&self) -> u32 {
        self.clarity_score
    }

    pub fn originality_score(&self) -> u32 {
        self.originality_score
    }

    pub fn team_strength_score(&self) -> u32 {
        self.team_strength_score
    }

    pub fn market_fit_score(&self) -> u32 {
        self.market_fit_score
    }

    pub fn proof_reference(&self) -> ProofReference {
        self.proof_reference
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    pub fn recorded_by(&self) -> &Identity {
        &self.recorded_by
    }

    /// The caller-supplied part of this record
    pub fn submission(&self) -> ScoreSubmission {
        ScoreSubmission {
            pitch_id: self.pitch_id,
            overall_score: self.overall_score,
            clarity_score: self.clarity_score,
            originality_score: self.originality_score,
            team_strength_score: self.team_strength_score,
            market_fit_score: self.market_fit_score,
            proof_reference: self.proof_reference,
        }
    }

    /// SHA-256 over every stored field, lowercase hex
    ///
    /// Covers the component scores, which the notification does not carry.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.pitch_id.as_bytes());
        for score in [
            self.overall_score,
            self.clarity_score,
            self.originality_score,
            self.team_strength_score,
            self.market_fit_score,
        ] {
            hasher.update(score.to_le_bytes());
        }
        hasher.update(self.proof_reference.as_bytes());
        hasher.update(
            self.recorded_at
                .to_rfc3339_opts(SecondsFormat::AutoSi, true)
                .as_bytes(),
        );
        let writer = self.recorded_by.as_str().as_bytes();
        hasher.update((writer.len() as u64).to_le_bytes());
        hasher.update(writer);
        format!("{:x}", hasher.finalize())
    }

    /// Public fields announced when this record was written
    pub fn to_notification(&self) -> ScoreRecorded {
        ScoreRecorded {
            pitch_id: self.pitch_id,
            overall_score: self.overall_score,
            proof_reference: self.proof_reference,
            recorded_at: self.recorded_at,
            recorded_by: self.recorded_by.clone(),
        }
    }
}

/// Who is writing, and which clock stamps the write
#[derive(Clone)]
pub struct ExecutionContext {
    pub caller: Identity,
    pub clock: Arc<dyn Clock>,
}

impl ExecutionContext {
    pub fn new(caller: Identity, clock: Arc<dyn Clock>) -> Self {
        Self { caller, clock }
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("caller", &self.caller)
            .finish_non_exhaustive()
    }
}

/// Acknowledgement of a successful write
///
/// `sequence` and `entry_hash` locate the write in the audit chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteReceipt {
    pub pitch_id: PitchId,
    pub sequence: u64,
    pub entry_hash: String,
    pub recorded_at: DateTime<Utc>,
}
