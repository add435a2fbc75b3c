//! Values exchanged with collaborators.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use tokio::sync::OwnedSemaphorePermit;

/// Bytes returned by a media provider, before rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct RawMedia {
    /// Payload
    bytes: Vec<u8>,
    /// MIME type reported by the provider
    mime_type: String,
}

impl RawMedia {
    /// Wrap provider output.
    pub fn new(bytes: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Whether the provider returned anything at all.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Permission to make one call; releases its concurrency slot on drop.
#[derive(Debug, Default)]
pub struct RatePermit {
    _permit: Option<OwnedSemaphorePermit>,
}

impl RatePermit {
    /// A permit that holds no slot.
    pub fn unlimited() -> Self {
        Self::default()
    }
}

impl From<OwnedSemaphorePermit> for RatePermit {
    fn from(permit: OwnedSemaphorePermit) -> Self {
        Self {
            _permit: Some(permit),
        }
    }
}
