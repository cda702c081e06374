//! Service machine key.
//!
//! A random 32-byte seed generated once on first use and persisted with mode
//! `0600`.  The encryption codec derives per-identity keys from it, so stored
//! credentials are protected with the same strength as the seed file itself:
//! readable only by the service account.  Losing the file makes every stored
//! blob permanently undecryptable.

use std::path::Path;

use rand::RngCore;
use zeroize::Zeroizing;

pub const SEED_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum MachineKeyError {
    #[error("failed to access machine key at {path}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("machine key at {path} has length {len} (expected {SEED_LEN})")]
    BadLength { path: std::path::PathBuf, len: usize },
}

/// Load the machine seed, generating and persisting it if absent.
pub fn load_or_create(path: &Path) -> Result<Zeroizing<Vec<u8>>, MachineKeyError> {
    let io_err = |source| MachineKeyError::Io {
        path: path.to_path_buf(),
        source,
    };

    match std::fs::read(path) {
        Ok(bytes) => {
            if bytes.len() != SEED_LEN {
                return Err(MachineKeyError::BadLength {
                    path: path.to_path_buf(),
                    len: bytes.len(),
                });
            }
            return Ok(Zeroizing::new(bytes));
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(io_err(e)),
    }

    let mut seed = Zeroizing::new(vec![0u8; SEED_LEN]);
    rand::rng().fill_bytes(&mut seed);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    write_secret(path, &seed).map_err(io_err)?;

    Ok(seed)
}

/// Write `data` to `path` with mode 0600, truncating any previous content.
fn write_secret(path: &Path, data: &[u8]) -> std::io::Result<()> {
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
            .and_then(|mut f| f.write_all(data))
    }
    #[cfg(not(unix))]
    {
        std::fs::write(path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_and_persists_32_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("machine-key");
        let seed = load_or_create(&path).unwrap();
        assert_eq!(seed.len(), SEED_LEN);
        assert!(path.exists());
    }

    #[test]
    fn stable_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("machine-key");
        let a = load_or_create(&path).unwrap();
        let b = load_or_create(&path).unwrap();
        assert_eq!(a.as_slice(), b.as_slice());
    }

    #[test]
    fn fresh_installs_get_fresh_seeds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("machine-key");
        let a = load_or_create(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        let b = load_or_create(&path).unwrap();
        assert_ne!(a.as_slice(), b.as_slice());
    }

    #[test]
    fn wrong_length_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("machine-key");
        std::fs::write(&path, b"short").unwrap();
        assert!(matches!(
            load_or_create(&path),
            Err(MachineKeyError::BadLength { len: 5, .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn seed_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt as _;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("machine-key");
        load_or_create(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
