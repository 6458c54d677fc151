//! API authentication via timestamp and hash validation
//!
//! # Scheme
//!
//! - Mutating requests include `timestamp` (i64 Unix epoch ms) and `hash` (SHA-256)
//! - Timestamp must be within the configured window in the past and ≤1ms in the future
//! - Hash calculated from canonical JSON + shared secret
//! - Shared secret stored in database settings table
//! - Setting shared_secret = 0 disables the check
//!
//! Passing this check only proves the caller holds the channel secret. The
//! writer identity carried in the body is checked separately by the registry.
//!
//! # Pure Functions
//!
//! This module contains ONLY pure functions and database operations.
//! No HTTP framework dependencies - those are in the service crate.

use serde_json::Value;
use sha2::{Digest, Sha256};

#[cfg(feature = "sqlx")]
use sqlx::SqlitePool;

/// Placeholder written into the `hash` field before hashing
pub const DUMMY_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Default tolerated request age
pub const DEFAULT_AUTH_WINDOW_MS: i64 = 1000;

/// Tolerated clock skew for timestamps ahead of the server
const FUTURE_TOLERANCE_MS: i64 = 1;

// ========================================
// Error Types
// ========================================

/// Authentication error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiAuthError {
    /// Timestamp outside acceptable window
    InvalidTimestamp {
        timestamp: i64,
        now: i64,
        reason: String,
    },

    /// Hash does not match calculated value
    InvalidHash { provided: String, calculated: String },

    /// Timestamp field missing from request
    MissingTimestamp,

    /// Hash field missing from request
    MissingHash,

    /// Database error loading shared secret
    DatabaseError(String),

    /// Failed to parse request body
    ParseError(String),
}

impl std::fmt::Display for ApiAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiAuthError::InvalidTimestamp { reason, .. } => {
                write!(f, "Invalid timestamp: {}", reason)
            }
            ApiAuthError::InvalidHash { .. } => write!(f, "Invalid hash"),
            ApiAuthError::MissingTimestamp => write!(f, "Missing timestamp field"),
            ApiAuthError::MissingHash => write!(f, "Missing hash field"),
            ApiAuthError::DatabaseError(err) => write!(f, "Database error: {}", err),
            ApiAuthError::ParseError(err) => write!(f, "Parse error: {}", err),
        }
    }
}

impl std::error::Error for ApiAuthError {}

impl ApiAuthError {
    /// Stable identifier used in JSON error bodies
    pub fn code(&self) -> &'static str {
        match self {
            ApiAuthError::InvalidTimestamp { .. } => "timestamp_invalid",
            ApiAuthError::InvalidHash { .. } => "hash_invalid",
            ApiAuthError::MissingTimestamp => "missing_timestamp",
            ApiAuthError::MissingHash => "missing_hash",
            ApiAuthError::DatabaseError(_) => "database_error",
            ApiAuthError::ParseError(_) => "invalid_body",
        }
    }
}

// ========================================
// Shared Secret Management
// ========================================

/// Load shared secret from database settings
///
/// - Key: `api_shared_secret`
/// - Value: i64
/// - Special value 0: Disables auth checking
///
/// A missing row is generated and stored.
#[cfg(feature = "sqlx")]
pub async fn load_shared_secret(db: &SqlitePool) -> Result<i64, ApiAuthError> {
    let result: Option<(String,)> =
        sqlx::query_as("SELECT value FROM settings WHERE key = 'api_shared_secret'")
            .fetch_optional(db)
            .await
            .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    match result {
        Some((value,)) => value
            .parse::<i64>()
            .map_err(|e| ApiAuthError::DatabaseError(format!("Invalid i64: {}", e))),
        None => initialize_shared_secret(db).await,
    }
}

/// Generate a random non-zero secret and store it
#[cfg(feature = "sqlx")]
pub async fn initialize_shared_secret(db: &SqlitePool) -> Result<i64, ApiAuthError> {
    use rand::Rng;

    let secret: i64 = {
        let mut rng = rand::thread_rng();
        loop {
            let val = rng.gen::<i64>();
            if val != 0 {
                break val;
            }
        }
    };

    sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES ('api_shared_secret', ?)")
        .bind(secret.to_string())
        .execute(db)
        .await
        .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    Ok(secret)
}

// ========================================
// Timestamp Validation
// ========================================

/// Validate a request timestamp against `now`
///
/// # Rules
///
/// - Timestamp must be ≤`window_ms` in the past
/// - Timestamp must be ≤1ms in the future
///
/// # Examples
///
/// ```
/// use psr_common::api::auth::validate_timestamp;
///
/// let now = 1_730_000_000_000i64;
/// assert!(validate_timestamp(now - 500, now, 1000).is_ok());
/// assert!(validate_timestamp(now - 2000, now, 1000).is_err());
/// ```
pub fn validate_timestamp(timestamp: i64, now: i64, window_ms: i64) -> Result<(), ApiAuthError> {
    let diff = now.checked_sub(timestamp).ok_or_else(|| ApiAuthError::InvalidTimestamp {
        timestamp,
        now,
        reason: "Timestamp out of range".to_string(),
    })?;

    if diff > window_ms {
        return Err(ApiAuthError::InvalidTimestamp {
            timestamp,
            now,
            reason: format!("Timestamp {}ms too old (max {}ms past)", diff, window_ms),
        });
    }

    if diff < -FUTURE_TOLERANCE_MS {
        return Err(ApiAuthError::InvalidTimestamp {
            timestamp,
            now,
            reason: format!(
                "Timestamp {}ms in future (max {}ms future)",
                diff.unsigned_abs(),
                FUTURE_TOLERANCE_MS
            ),
        });
    }

    Ok(())
}

// ========================================
// Hash Calculation and Validation
// ========================================

/// Calculate request hash
///
/// # Algorithm
///
/// 1. Replace hash field with dummy hash (64 zeros)
/// 2. Convert to canonical JSON (sorted keys, no whitespace)
/// 3. Append shared secret as decimal i64 string
/// 4. Calculate SHA-256 of concatenated string
/// 5. Return as 64 hex characters
///
/// # Examples
///
/// ```
/// use psr_common::api::auth::calculate_hash;
/// use serde_json::json;
///
/// let body = json!({"caller": "pipeline", "timestamp": 1730000000000i64, "hash": "x"});
/// assert_eq!(calculate_hash(&body, 123456789).len(), 64);
/// ```
pub fn calculate_hash(json_value: &Value, shared_secret: i64) -> String {
    let mut value = json_value.clone();
    if let Some(obj) = value.as_object_mut() {
        obj.insert("hash".to_string(), Value::String(DUMMY_HASH.to_string()));
    }

    let canonical = to_canonical_json(&value);
    let to_hash = format!("{}{}", canonical, shared_secret);

    let mut hasher = Sha256::new();
    hasher.update(to_hash.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Convert JSON to canonical form (sorted keys, no whitespace)
///
/// # Examples
///
/// ```
/// use psr_common::api::auth::to_canonical_json;
/// use serde_json::json;
///
/// let canonical = to_canonical_json(&json!({"z": 3, "a": 1}));
/// assert_eq!(canonical, r#"{"a":1,"z":3}"#);
/// ```
pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut pairs: Vec<_> = map.iter().collect();
            pairs.sort_by_key(|(k, _)| *k);
            let items: Vec<String> = pairs
                .into_iter()
                .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), to_canonical_json(v)))
                .collect();
            format!("{{{}}}", items.join(","))
        }
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        // serde_json's own rendering handles escaping for strings and numbers
        other => other.to_string(),
    }
}

/// Validate hash matches calculated value
pub fn validate_hash(
    provided_hash: &str,
    json_value: &Value,
    shared_secret: i64,
) -> Result<(), ApiAuthError> {
    let calculated = calculate_hash(json_value, shared_secret);

    if !provided_hash.eq_ignore_ascii_case(&calculated) {
        return Err(ApiAuthError::InvalidHash {
            provided: provided_hash.to_string(),
            calculated,
        });
    }

    Ok(())
}

/// Stamp a request body with `timestamp` and a matching `hash`
///
/// Client-side counterpart of [`validate_hash`]; used by callers of the write
/// endpoint and by tests.
pub fn sign_body(body: &mut Value, timestamp: i64, shared_secret: i64) {
    if let Some(obj) = body.as_object_mut() {
        obj.insert("timestamp".to_string(), Value::from(timestamp));
        obj.insert("hash".to_string(), Value::String(DUMMY_HASH.to_string()));
    }
    let hash = calculate_hash(body, shared_secret);
    if let Some(obj) = body.as_object_mut() {
        obj.insert("hash".to_string(), Value::String(hash));
    }
}

// ========================================
// Tests
// ========================================
