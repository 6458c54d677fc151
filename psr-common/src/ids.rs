//! Fixed-size identifiers and writer identities
//!
//! `PitchId` and `ProofReference` are opaque 32-byte values. On the wire they
//! are `0x`-prefixed lowercase hex; parsing accepts the prefix optionally and
//! either letter case.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from parsing identifiers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("Invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid hex string: {0}")]
    InvalidHex(String),

    #[error("Identity must not be empty")]
    EmptyIdentity,
}

impl From<hex::FromHexError> for IdError {
    fn from(err: hex::FromHexError) -> Self {
        IdError::InvalidHex(err.to_string())
    }
}

fn decode_bytes32(s: &str) -> Result<[u8; 32], IdError> {
    let trimmed = s.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.len() % 2 == 0 && digits.len() != 64 {
        return Err(IdError::InvalidLength {
            expected: 32,
            actual: digits.len() / 2,
        });
    }

    let bytes = hex::decode(digits)?;
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

macro_rules! bytes32_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; 32]);

        impl $name {
            pub const fn new(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// `0x`-prefixed lowercase hex
            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }

            pub fn from_hex(s: &str) -> Result<Self, IdError> {
                decode_bytes32(s).map(Self)
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

bytes32_id!(
    /// Caller-supplied identifier of a scored pitch
    ///
    /// Recommended to be the SHA-256 digest of the pitch content, see [`PitchId::digest`].
    PitchId
);

bytes32_id!(
    /// Opaque reference to an externally verifiable proof of correct scoring
    ///
    /// Never interpreted or verified by the registry.
    ProofReference
);

impl PitchId {
    /// Deterministic content-hash identifier (SHA-256)
    pub fn digest(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        Self(hasher.finalize().into())
    }
}

/// Identity of a caller or of the authorized writer
///
/// Compared byte-for-byte; surrounding whitespace is stripped on construction.
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(IdError::EmptyIdentity);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Identity {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.0)
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const H1: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";

    #[test]
    fn test_pitch_id_hex_with_and_without_prefix() {
        let with_prefix = PitchId::from_hex(H1).unwrap();
        let without_prefix = PitchId::from_hex(&H1[2..]).unwrap();
        assert_eq!(with_prefix, without_prefix);
        assert_eq!(with_prefix.to_hex(), H1);
    }

    #[test]
    fn test_pitch_id_accepts_uppercase() {
        let upper = "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
        let id = PitchId::from_hex(upper).unwrap();
        assert_eq!(id.as_bytes(), &[0xAA; 32]);
        assert_eq!(id.to_hex(), format!("0x{}", "aa".repeat(32)));
    }

    #[test]
    fn test_short_id_rejected_with_length() {
        let err = PitchId::from_hex("0xabcd").unwrap_err();
        assert_eq!(
            err,
            IdError::InvalidLength {
                expected: 32,
                actual: 2
            }
        );
    }

    #[test]
    fn test_non_hex_rejected() {
        let bad = "zz".repeat(32);
        assert!(matches!(
            ProofReference::from_hex(&bad),
            Err(IdError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_odd_length_rejected() {
        assert!(PitchId::from_hex("0xabc").is_err());
    }

    #[test]
    fn test_serde_uses_prefixed_hex() {
        let proof = ProofReference::new([0xAA; 32]);
        let json = serde_json::to_string(&proof).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "aa".repeat(32)));

        let back: ProofReference = serde_json::from_str(&json).unwrap();
        assert_eq!(back, proof);
    }

    #[test]
    fn test_digest_is_deterministic() {
        let a = PitchId::digest(b"We build rockets for bees.");
        let b = PitchId::digest(b"We build rockets for bees.");
        let c = PitchId::digest(b"We build rockets for ants.");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_digest_of_empty_content() {
        // SHA-256 of the empty string
        let id = PitchId::digest(b"");
        assert_eq!(
            id.to_hex(),
            "0xe3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_identity_trims_and_rejects_empty() {
        let id = Identity::new("  scoring-pipeline ").unwrap();
        assert_eq!(id.as_str(), "scoring-pipeline");
        assert_eq!(Identity::new("   "), Err(IdError::EmptyIdentity));
    }

    #[test]
    fn test_identity_deserialize_rejects_empty() {
        let result: Result<Identity, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }
}
