//! Access control for mutating operations
//!
//! Exactly one authorized writer, fixed when the controller is initialized.
//! There is no transfer or revocation path.

use psr_common::Identity;
use tracing::warn;

use crate::error::{RegistryError, Result};

/// Holds the single authorized-writer identity
#[derive(Debug, Clone)]
pub struct AccessController {
    owner: Identity,
}

impl AccessController {
    /// Fix the authorized writer; the controller is immutable afterwards
    pub fn initialize(initial_owner: Identity) -> Self {
        Self {
            owner: initial_owner,
        }
    }

    /// Succeeds iff `caller` is the authorized writer
    pub fn authorize(&self, caller: &Identity) -> Result<()> {
        if *caller == self.owner {
            Ok(())
        } else {
            warn!(caller = %caller, "Rejected write from unauthorized caller");
            Err(RegistryError::Unauthorized {
                caller: caller.clone(),
            })
        }
    }

    pub fn owner(&self) -> &Identity {
        &self.owner
    }
}
