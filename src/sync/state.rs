//! Per-group synchronization state.

use daq_selector_core::{GroupDescriptor, Profile, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Synchronization state of one acquisition group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncState {
    /// Profile or live descriptor changed since the last push, or never pushed.
    Unsynced,
    /// A push is being computed.
    Computing,
    /// The live descriptor is the one last pushed for the current profile.
    Synced,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SyncState::Unsynced => "unsynced",
            SyncState::Computing => "computing",
            SyncState::Synced => "synced",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SyncRecord {
    pub(crate) state: SyncState,
    pub(crate) fingerprint: Option<String>,
}

impl Default for SyncRecord {
    fn default() -> Self {
        Self {
            state: SyncState::Unsynced,
            fingerprint: None,
        }
    }
}

/// SHA-256 over the stored profile document and the live descriptor.
pub(crate) fn fingerprint(profile: &Profile, live: Option<&GroupDescriptor>) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(profile.to_json()?.as_bytes());
    hasher.update(b"\n");
    hasher.update(serde_json::to_string(&live)?.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}
