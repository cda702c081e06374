//! Opcode dispatch.
//!
//! One opcode byte decides the handler.  Both error cases here are
//! transport-level: a request with no opcode propagates as a read failure,
//! and an unrecognized opcode produces no response bytes — the connection
//! layer decides whether to send a best-effort failure reply or hang up.

use keyhold_core::proto::{
    SSH_AGENTC_ADD_IDENTITY, SSH_AGENTC_REQUEST_IDENTITIES, SSH_AGENTC_SIGN_REQUEST,
};
use keyhold_core::wire::WireReader;
use keyhold_store::identity::IdentitySource;
use tracing::debug;

use crate::handlers::Agent;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("request ended before the opcode")]
    MissingOpcode,

    #[error("unrecognized agent request {0}")]
    UnknownOpcode(u8),
}

impl Agent {
    /// Route one request buffer to its handler and return the response
    /// buffer.  `Ok` responses are always well-formed, even for requests the
    /// handler rejected; `Err` means no response was produced at all.
    pub fn handle_request(
        &self,
        request: &[u8],
        identity: &dyn IdentitySource,
    ) -> Result<Vec<u8>, DispatchError> {
        let mut reader = WireReader::new(request);
        let opcode = reader.get_u8().map_err(|_| DispatchError::MissingOpcode)?;

        match opcode {
            SSH_AGENTC_ADD_IDENTITY => Ok(self.add_identity(&mut reader, identity)),
            SSH_AGENTC_REQUEST_IDENTITIES => Ok(self.request_identities(identity)),
            SSH_AGENTC_SIGN_REQUEST => Ok(self.sign_request(&mut reader, identity)),
            other => {
                debug!(opcode = other, "unknown agent request");
                Err(DispatchError::UnknownOpcode(other))
            }
        }
    }
}
