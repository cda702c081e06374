//! Error taxonomy for the request handlers.
//!
//! What a peer is allowed to learn from a failure is decided at the wire
//! boundary in `keyhold-agent`, not here: the sign path collapses everything
//! after request parsing into one opaque failure byte.  These variants exist
//! for internal diagnostics and tests.

use std::path::PathBuf;

use thiserror::Error;

use crate::wire::WireError;

#[derive(Debug, Error)]
pub enum AgentError {
    /// Bad wire input.  Always safe to report; never mutates the store.
    #[error("malformed request")]
    RequestMalformed,

    /// The caller's security context could not be established.
    #[error("caller identity unavailable")]
    IdentityUnavailable,

    /// Encryption or decryption of stored key material failed.
    #[error("key protection failure")]
    CryptoFailure,

    /// Decryption succeeded but the plaintext does not parse as a key.
    #[error("stored key material is corrupt")]
    KeyCorrupt,

    /// No entry for the requested fingerprint in the caller's namespace.
    #[error("key not found")]
    KeyNotFound,

    #[error("credential store failure")]
    StoreFailure(#[from] StoreError),
}

impl From<WireError> for AgentError {
    fn from(_: WireError) -> Self {
        AgentError::RequestMalformed
    }
}

/// Failures from the persistent credential store.
///
/// The store is an external, possibly multi-writer resource; every operation
/// is independently fallible and surfaces here rather than panicking.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Entry or field name the store refuses to map onto its substrate.
    #[error("invalid store name {0:?}")]
    InvalidName(String),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}
