//! Request handling for the keyhold agent.
//!
//! One [`Agent`] holds the credential store and the encryption codec; the
//! transport layer hands it one request buffer at a time together with an
//! identity source for the connection, and gets back one fully-formed
//! response buffer:
//!
//! ```text
//! transport ──► Agent::handle_request ──► dispatcher ──► handler
//!                                                          │
//!                                  IdentityContext ── Store / KeyProtector
//! ```
//!
//! Handlers are synchronous and never yield mid-operation: a request is
//! fully consumed and its response fully produced before the connection
//! reads the next one.

pub mod codec;
pub mod dispatch;
pub mod handlers;

pub use dispatch::DispatchError;
pub use handlers::Agent;
