//! Caller identity resolution.
//!
//! The transport authenticates each connection to a concrete peer (Unix
//! socket peer credentials); this module turns that peer into a scoped
//! [`IdentityContext`] for the duration of one store operation.  The context
//! is an explicit value passed into store and codec calls — acquisition and
//! release bracket each operation, and release happens on drop on every exit
//! path, so no code can return while still "being" the caller.

use tracing::trace;

/// Credentials of the connected peer, as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub uid: u32,
    pub gid: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The transport could not report who is on the other end.
    #[error("peer credentials unavailable")]
    Unavailable,
}

/// Source of the caller's identity for one connection.
///
/// Implemented by the daemon's connection wrapper (peer credentials) and, in
/// tests, by [`CallerIdentity`] itself for a fixed caller.  Resolution is
/// re-done per operation — a source that has lost its peer fails the
/// operation, it does not fall back to anything.
pub trait IdentitySource: Send + Sync {
    fn resolve(&self) -> Result<CallerIdentity, IdentityError>;
}

/// A fixed identity is a valid source of itself.
impl IdentitySource for CallerIdentity {
    fn resolve(&self) -> Result<CallerIdentity, IdentityError> {
        Ok(self.clone())
    }
}

/// A resolved caller identity, scoped to one store operation.
///
/// Everything identity-dependent hangs off this value: the store namespace
/// name and the key-derivation context for the encryption codec.  Dropping
/// the context releases it.
#[derive(Debug)]
pub struct IdentityContext {
    namespace: String,
    uid: u32,
}

impl IdentityContext {
    /// Resolve the caller and establish their context.
    ///
    /// Fails before any store access if the source cannot produce a peer.
    pub fn acquire(source: &dyn IdentitySource) -> Result<Self, IdentityError> {
        let caller = source.resolve()?;
        let namespace = format!("uid-{}", caller.uid);
        trace!(uid = caller.uid, %namespace, "identity context acquired");
        Ok(Self {
            namespace,
            uid: caller.uid,
        })
    }

    /// The store namespace this identity owns.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Context bytes bound into key derivation by the encryption codec.
    /// Distinct per identity, stable across restarts.
    pub fn key_context(&self) -> &[u8] {
        self.namespace.as_bytes()
    }
}

impl Drop for IdentityContext {
    fn drop(&mut self) {
        trace!(uid = self.uid, "identity context released");
    }
}
