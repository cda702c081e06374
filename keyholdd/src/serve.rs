//! Unix-socket listener and per-connection frame loop.
//!
//! The stream carries 4-byte-length-prefixed request and response frames;
//! each connection is served by one task that fully consumes a request and
//! fully produces its response before reading the next.  The peer's identity
//! comes from the socket's credentials (`SO_PEERCRED`) and is resolved per
//! operation through [`IdentitySource`].

use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use keyhold_agent::{Agent, DispatchError};
use keyhold_core::proto::SSH_AGENT_FAILURE;
use keyhold_store::identity::{CallerIdentity, IdentityError, IdentitySource};
use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, warn};

/// Upper bound on a single request frame.  Far above any real key blob;
/// anything larger is a confused or hostile peer.
const MAX_FRAME: usize = 256 * 1024;

/// Caller identity captured from the connection's peer credentials.
///
/// Credentials are read once at accept time (they are a property of the
/// connecting process, not of individual requests); a connection whose
/// credentials could not be read still serves requests, but every store
/// operation on it fails identity acquisition.
struct PeerIdentity {
    creds: Option<CallerIdentity>,
}

impl PeerIdentity {
    fn from_stream(stream: &UnixStream) -> Self {
        let creds = match stream.peer_cred() {
            Ok(cred) => Some(CallerIdentity {
                uid: cred.uid(),
                gid: cred.gid(),
            }),
            Err(e) => {
                warn!(error = %e, "failed to read peer credentials");
                None
            }
        };
        Self { creds }
    }
}

impl IdentitySource for PeerIdentity {
    fn resolve(&self) -> Result<CallerIdentity, IdentityError> {
        self.creds.clone().ok_or(IdentityError::Unavailable)
    }
}

/// Bind the socket and accept connections until the task is cancelled.
pub async fn listen(socket_path: &Path, agent: Arc<Agent>) -> anyhow::Result<()> {
    if socket_path.exists() {
        // Stale socket from a previous run.
        std::fs::remove_file(socket_path)
            .with_context(|| format!("remove stale socket {}", socket_path.display()))?;
    }
    if let Some(parent) = socket_path.parent() {
        create_dir_owner_only(parent)
            .with_context(|| format!("create socket directory {}", parent.display()))?;
    }

    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("bind agent socket {}", socket_path.display()))?;
    restrict_socket(socket_path)
        .with_context(|| format!("chmod 0600 {}", socket_path.display()))?;

    info!(socket = %socket_path.display(), "agent listening");

    loop {
        let (stream, _addr) = listener.accept().await.context("accept on agent socket")?;
        let agent = Arc::clone(&agent);
        tokio::spawn(async move {
            let identity = PeerIdentity::from_stream(&stream);
            if let Err(e) = serve_connection(stream, &agent, &identity).await {
                debug!(error = %e, "connection closed with error");
            }
        });
    }
}

async fn serve_connection(
    mut stream: UnixStream,
    agent: &Agent,
    identity: &dyn IdentitySource,
) -> std::io::Result<()> {
    loop {
        let mut len_buf = [0u8; 4];
        match stream.read_exact(&mut len_buf).await {
            Ok(_) => {}
            // Peer hung up between requests: normal end of conversation.
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e),
        }

        let len = u32::from_be_bytes(len_buf) as usize;
        if len == 0 || len > MAX_FRAME {
            warn!(len, "unreasonable request frame, closing connection");
            return Ok(());
        }

        let mut request = vec![0u8; len];
        stream.read_exact(&mut request).await?;

        let response = match agent.handle_request(&request, identity) {
            Ok(response) => response,
            Err(DispatchError::UnknownOpcode(opcode)) => {
                // The handler produced nothing; answer with a best-effort
                // failure byte and keep the connection.
                debug!(opcode, "unknown request opcode");
                vec![SSH_AGENT_FAILURE]
            }
            Err(DispatchError::MissingOpcode) => {
                debug!("request frame had no opcode, closing connection");
                return Ok(());
            }
        };

        stream
            .write_all(&(response.len() as u32).to_be_bytes())
            .await?;
        stream.write_all(&response).await?;
    }
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

fn restrict_socket(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    use keyhold_core::proto::{SSH_AGENT_IDENTITIES_ANSWER, SSH_AGENTC_REQUEST_IDENTITIES};
    use keyhold_store::{DirStore, KeyProtector};

    async fn start_daemon(dir: &Path) -> PathBuf {
        let socket = dir.join("agent.sock");
        let store = Arc::new(DirStore::new(dir.join("store")));
        let protector = Arc::new(KeyProtector::open(&dir.join("machine-key")).unwrap());
        let agent = Arc::new(Agent::new(store, protector));

        let listen_socket = socket.clone();
        tokio::spawn(async move {
            let _ = listen(&listen_socket, agent).await;
        });

        for _ in 0..100 {
            if socket.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        socket
    }

    async fn roundtrip(stream: &mut UnixStream, request: &[u8]) -> Vec<u8> {
        stream
            .write_all(&(request.len() as u32).to_be_bytes())
            .await
            .unwrap();
        stream.write_all(request).await.unwrap();

        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).await.unwrap();
        let mut response = vec![0u8; u32::from_be_bytes(len_buf) as usize];
        stream.read_exact(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn frame_loop_serves_requests_and_survives_unknown_opcodes() {
        let dir = tempfile::tempdir().unwrap();
        let socket = start_daemon(dir.path()).await;
        let mut stream = UnixStream::connect(&socket).await.unwrap();

        // Empty store lists zero identities.
        let response = roundtrip(&mut stream, &[SSH_AGENTC_REQUEST_IDENTITIES]).await;
        assert_eq!(response[0], SSH_AGENT_IDENTITIES_ANSWER);
        assert_eq!(&response[1..5], &[0, 0, 0, 0]);

        // Unknown opcode gets a best-effort failure byte and the connection
        // stays usable.
        let response = roundtrip(&mut stream, &[200]).await;
        assert_eq!(response, vec![SSH_AGENT_FAILURE]);

        let response = roundtrip(&mut stream, &[SSH_AGENTC_REQUEST_IDENTITIES]).await;
        assert_eq!(response[0], SSH_AGENT_IDENTITIES_ANSWER);
    }
}
