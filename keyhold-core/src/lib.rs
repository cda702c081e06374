//! Shared foundation for the keyhold agent.
//!
//! `keyhold-core` carries everything the other crates agree on: the agent
//! protocol constants and wire buffer codec, the error taxonomy, and the
//! daemon configuration model.  It has no knowledge of how credentials are
//! stored or encrypted — that lives in `keyhold-store` — and no knowledge of
//! key algorithms, which is `keyhold-agent`'s business.

pub mod config;
pub mod error;
pub mod proto;
pub mod wire;

pub use error::{AgentError, StoreError};
