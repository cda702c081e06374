//! Directory-tree store backend.
//!
//! Layout under the configured root:
//!
//! ```text
//! <root>/                      0700
//!   uid-1000/                  0700   one namespace per identity
//!     SHA256:3fq.../           0700   one entry per fingerprint
//!       key                    0600   encrypted private blob
//!       pub                    0600   public key serialization
//!       type                   0600   4-byte algorithm tag
//!       comment                0600   caller-supplied label
//! ```
//!
//! Entry names are fingerprint strings; the two base64 characters that are
//! not filesystem-safe (`/` and `+`) are mapped to their URL-safe
//! counterparts.  Lookup re-applies the same mapping, so names never need to
//! be reversed.  Everything is created owner-only: the namespace belongs to
//! the identity and the service, no others.

use std::path::{Path, PathBuf};

use keyhold_core::StoreError;
use tracing::debug;

use crate::identity::IdentityContext;
use crate::store::Store;

pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn namespace_path(&self, ctx: &IdentityContext) -> PathBuf {
        self.root.join(ctx.namespace())
    }

    fn entry_path(&self, ctx: &IdentityContext, entry: &str) -> Result<PathBuf, StoreError> {
        Ok(self.namespace_path(ctx).join(entry_dir_name(entry)?))
    }

    fn field_path(
        &self,
        ctx: &IdentityContext,
        entry: &str,
        field: &str,
    ) -> Result<PathBuf, StoreError> {
        if field.is_empty() || !field.bytes().all(|b| b.is_ascii_lowercase()) {
            return Err(StoreError::InvalidName(field.to_string()));
        }
        Ok(self.entry_path(ctx, entry)?.join(field))
    }
}

/// Map a fingerprint string onto a single path component.
///
/// Rejects anything empty, oversized, or containing bytes outside the
/// fingerprint alphabet — store names come from a hash function, never from
/// raw caller input, so anything else indicates a confused caller.
fn entry_dir_name(entry: &str) -> Result<String, StoreError> {
    if entry.is_empty() || entry.len() > 255 {
        return Err(StoreError::InvalidName(entry.to_string()));
    }
    let ok = entry
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b':' | b'+' | b'/' | b'=' | b'-' | b'_'));
    if !ok {
        return Err(StoreError::InvalidName(entry.to_string()));
    }
    Ok(entry.replace('/', "_").replace('+', "-"))
}

fn create_dir_owner_only(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt as _;
        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(path)
    }
    #[cfg(not(unix))]
    {
        std::fs::create_dir_all(path)
    }
}

fn write_file_owner_only(path: &Path, value: &[u8]) -> std::io::Result<()> {
    use std::io::Write as _;

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt as _;
        std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(value))
    }
    #[cfg(not(unix))]
    {
        std::fs::write(path, value)
    }
}

impl Store for DirStore {
    fn create_namespace(&self, ctx: &IdentityContext) -> Result<(), StoreError> {
        let path = self.namespace_path(ctx);
        create_dir_owner_only(&path).map_err(|e| StoreError::io(&path, e))
    }

    fn namespace_exists(&self, ctx: &IdentityContext) -> Result<bool, StoreError> {
        Ok(self.namespace_path(ctx).is_dir())
    }

    fn create_entry(&self, ctx: &IdentityContext, entry: &str) -> Result<(), StoreError> {
        let path = self.entry_path(ctx, entry)?;
        create_dir_owner_only(&path).map_err(|e| StoreError::io(&path, e))
    }

    fn entry_exists(&self, ctx: &IdentityContext, entry: &str) -> Result<bool, StoreError> {
        Ok(self.entry_path(ctx, entry)?.is_dir())
    }

    fn delete_entry(&self, ctx: &IdentityContext, entry: &str) -> Result<(), StoreError> {
        let path = self.entry_path(ctx, entry)?;
        match std::fs::remove_dir_all(&path) {
            Ok(()) => {
                debug!(namespace = ctx.namespace(), entry, "entry deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    fn write_field(
        &self,
        ctx: &IdentityContext,
        entry: &str,
        field: &str,
        value: &[u8],
    ) -> Result<(), StoreError> {
        let path = self.field_path(ctx, entry, field)?;
        write_file_owner_only(&path, value).map_err(|e| StoreError::io(&path, e))
    }

    fn read_field(
        &self,
        ctx: &IdentityContext,
        entry: &str,
        field: &str,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.field_path(ctx, entry, field)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    fn list_entries(&self, ctx: &IdentityContext) -> Result<Vec<String>, StoreError> {
        let path = self.namespace_path(ctx);
        let read_dir = match std::fs::read_dir(&path) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        let mut entries = Vec::new();
        for dirent in read_dir {
            let dirent = dirent.map_err(|e| StoreError::io(&path, e))?;
            if dirent.path().is_dir() {
                // Non-UTF-8 names cannot have been written by us; skip them
                // the same way foreign files in the namespace are skipped.
                if let Some(name) = dirent.file_name().to_str() {
                    entries.push(name.to_string());
                }
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::CallerIdentity;
    use crate::store::{FIELD_COMMENT, FIELD_PUBLIC};

    fn ctx(uid: u32) -> IdentityContext {
        IdentityContext::acquire(&CallerIdentity { uid, gid: uid }).unwrap()
    }

    fn store() -> (tempfile::TempDir, DirStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::new(dir.path().join("store"));
        (dir, store)
    }

    #[test]
    fn field_roundtrip() {
        let (_dir, store) = store();
        let ctx = ctx(1000);
        store.create_namespace(&ctx).unwrap();
        store.create_entry(&ctx, "SHA256:abc").unwrap();
        store
            .write_field(&ctx, "SHA256:abc", FIELD_PUBLIC, b"pubdata")
            .unwrap();
        assert_eq!(
            store.read_field(&ctx, "SHA256:abc", FIELD_PUBLIC).unwrap(),
            Some(b"pubdata".to_vec())
        );
    }

    #[test]
    fn missing_field_reads_as_none() {
        let (_dir, store) = store();
        let ctx = ctx(1000);
        store.create_namespace(&ctx).unwrap();
        store.create_entry(&ctx, "SHA256:abc").unwrap();
        assert_eq!(
            store.read_field(&ctx, "SHA256:abc", FIELD_COMMENT).unwrap(),
            None
        );
    }

    #[test]
    fn absent_namespace_lists_empty() {
        let (_dir, store) = store();
        assert!(store.list_entries(&ctx(1000)).unwrap().is_empty());
        assert!(!store.namespace_exists(&ctx(1000)).unwrap());
    }

    #[test]
    fn list_returns_created_entries() {
        let (_dir, store) = store();
        let ctx = ctx(1000);
        store.create_namespace(&ctx).unwrap();
        store.create_entry(&ctx, "SHA256:one").unwrap();
        store.create_entry(&ctx, "SHA256:two").unwrap();
        let mut entries = store.list_entries(&ctx).unwrap();
        entries.sort();
        assert_eq!(entries, vec!["SHA256:one", "SHA256:two"]);
    }

    #[test]
    fn delete_entry_removes_all_fields_and_is_idempotent() {
        let (_dir, store) = store();
        let ctx = ctx(1000);
        store.create_namespace(&ctx).unwrap();
        store.create_entry(&ctx, "SHA256:abc").unwrap();
        store
            .write_field(&ctx, "SHA256:abc", FIELD_PUBLIC, b"x")
            .unwrap();
        store.delete_entry(&ctx, "SHA256:abc").unwrap();
        assert!(!store.entry_exists(&ctx, "SHA256:abc").unwrap());
        assert_eq!(
            store.read_field(&ctx, "SHA256:abc", FIELD_PUBLIC).unwrap(),
            None
        );
        // Deleting again is not an error.
        store.delete_entry(&ctx, "SHA256:abc").unwrap();
    }

    #[test]
    fn namespaces_are_disjoint() {
        let (_dir, store) = store();
        let a = ctx(1000);
        let b = ctx(1001);
        store.create_namespace(&a).unwrap();
        store.create_entry(&a, "SHA256:abc").unwrap();
        store.write_field(&a, "SHA256:abc", FIELD_PUBLIC, b"x").unwrap();

        assert!(store.list_entries(&b).unwrap().is_empty());
        assert_eq!(store.read_field(&b, "SHA256:abc", FIELD_PUBLIC).unwrap(), None);
    }

    #[test]
    fn base64_fingerprint_characters_are_mapped() {
        let (_dir, store) = store();
        let ctx = ctx(1000);
        store.create_namespace(&ctx).unwrap();
        store.create_entry(&ctx, "SHA256:a/b+c").unwrap();
        assert!(store.entry_exists(&ctx, "SHA256:a/b+c").unwrap());
        assert_eq!(store.list_entries(&ctx).unwrap(), vec!["SHA256:a_b-c"]);
    }

    #[test]
    fn hostile_entry_names_are_rejected() {
        let (_dir, store) = store();
        let ctx = ctx(1000);
        for name in ["", "..", "a\0b", "a b", "x/../../etc"] {
            assert!(
                matches!(
                    store.create_entry(&ctx, name),
                    Err(StoreError::InvalidName(_))
                ),
                "expected {name:?} to be rejected"
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn created_tree_is_owner_only() {
        use std::os::unix::fs::PermissionsExt as _;
        let (_dir, store) = store();
        let ctx = ctx(1000);
        store.create_namespace(&ctx).unwrap();
        store.create_entry(&ctx, "SHA256:abc").unwrap();
        store.write_field(&ctx, "SHA256:abc", FIELD_PUBLIC, b"x").unwrap();

        let ns = store.namespace_path(&ctx);
        let mode = |p: &Path| std::fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&ns), 0o700);
        assert_eq!(mode(&ns.join("SHA256:abc")), 0o700);
        assert_eq!(mode(&ns.join("SHA256:abc").join("pub")), 0o600);
    }
}
