//! Per-identity, encrypted-at-rest credential storage.
//!
//! Three layers, composed by the request handlers in `keyhold-agent`:
//!
//! 1. [`identity`] — resolves the transport-authenticated caller into a
//!    scoped [`IdentityContext`].  Every store and codec call takes the
//!    context explicitly; there is no ambient "current user" state anywhere.
//! 2. [`protect`] — the encryption codec.  Blobs are sealed under a key
//!    derived from the service machine seed *and* the acquiring identity, so
//!    one user's entries are undecryptable under another user's context even
//!    if the underlying files leak.
//! 3. [`store`] / [`dir`] — a minimal hierarchical key-value interface
//!    (namespace → entry → named field) and its directory-tree backend.
//!    Handlers never touch paths; swapping the substrate does not touch them.

pub mod dir;
pub mod identity;
pub mod machine_key;
pub mod protect;
pub mod store;

pub use dir::DirStore;
pub use identity::{CallerIdentity, IdentityContext, IdentityError, IdentitySource};
pub use protect::KeyProtector;
pub use store::{FIELD_COMMENT, FIELD_KEY, FIELD_PUBLIC, FIELD_TYPE, Store};
