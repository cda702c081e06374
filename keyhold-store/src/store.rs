//! The credential store interface.
//!
//! A minimal hierarchical key-value surface: one namespace per identity, one
//! entry per credential fingerprint, named fields inside each entry.  The
//! request handlers in `keyhold-agent` are written against this trait only;
//! the shipped backend is [`crate::dir::DirStore`], but a registry-like or
//! embedded-database substrate can slot in without touching handler logic.
//!
//! The store is an external, possibly multi-writer resource — other agent
//! instances for the same user may write concurrently.  Nothing here takes a
//! client-side lock; every operation is independently fallible and callers
//! treat it that way.

use keyhold_core::StoreError;

use crate::identity::IdentityContext;

/// Field holding the encrypted private blob (the original store kept this as
/// the entry's unnamed default value).
pub const FIELD_KEY: &str = "key";
/// Field holding the public key serialization, stored in the clear.
pub const FIELD_PUBLIC: &str = "pub";
/// Field holding the 4-byte big-endian algorithm tag.
pub const FIELD_TYPE: &str = "type";
/// Field holding the caller-supplied comment, stored in the clear.
pub const FIELD_COMMENT: &str = "comment";

pub trait Store: Send + Sync {
    /// Create the caller's namespace if it does not exist yet.  Idempotent.
    fn create_namespace(&self, ctx: &IdentityContext) -> Result<(), StoreError>;

    /// Whether the caller's namespace exists at all.  An absent namespace is
    /// an ordinary state (the caller never added a key), not an error.
    fn namespace_exists(&self, ctx: &IdentityContext) -> Result<bool, StoreError>;

    /// Create an empty entry.  Idempotent if the entry already exists.
    fn create_entry(&self, ctx: &IdentityContext, entry: &str) -> Result<(), StoreError>;

    fn entry_exists(&self, ctx: &IdentityContext, entry: &str) -> Result<bool, StoreError>;

    /// Delete an entry and all its fields.  Deleting an absent entry is Ok.
    fn delete_entry(&self, ctx: &IdentityContext, entry: &str) -> Result<(), StoreError>;

    /// Write one named field, replacing any previous value.
    fn write_field(
        &self,
        ctx: &IdentityContext,
        entry: &str,
        field: &str,
        value: &[u8],
    ) -> Result<(), StoreError>;

    /// Read one named field.  `Ok(None)` means the field (or the entry) is
    /// absent — distinct from an I/O failure.
    fn read_field(
        &self,
        ctx: &IdentityContext,
        entry: &str,
        field: &str,
    ) -> Result<Option<Vec<u8>>, StoreError>;

    /// Enumerate entry names in the caller's namespace, in no particular
    /// order.  An absent namespace enumerates as empty.
    fn list_entries(&self, ctx: &IdentityContext) -> Result<Vec<String>, StoreError>;
}
