//! # PSR Common Library
//!
//! Shared code for the pitch score registry:
//! - Error types
//! - Fixed-size identifiers (pitch ids, proof references) and writer identities
//! - Configuration loading and root folder resolution
//! - Clock abstraction used to stamp records
//! - Event types (RegistryEvent) and EventBus
//! - Request authentication primitives
//! - Database initialization
//! - SSE helpers

pub mod api;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod events;
pub mod ids;
pub mod sse;
pub mod time;

pub use error::{Error, Result};
pub use ids::{Identity, PitchId, ProofReference};
pub use time::{Clock, SystemClock};
