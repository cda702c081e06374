//! The three request handlers.
//!
//! Each handler validates its input, orchestrates identity context, codec,
//! and store, and resolves every internal failure into a well-formed response
//! buffer — a malformed request never tears down the connection.  The sign
//! path additionally collapses all post-parse failures (missing key, crypto
//! error, corrupt material) into one opaque failure code so the peer cannot
//! probe which stage failed; the distinction lives in the logs only.

use std::sync::Arc;

use keyhold_core::proto::{
    SSH_AGENT_FAILURE, SSH_AGENT_IDENTITIES_ANSWER, SSH_AGENT_SIGN_RESPONSE, SSH_AGENT_SUCCESS,
};
use keyhold_core::wire::{WireReader, WireWriter};
use keyhold_core::{AgentError, StoreError};
use keyhold_store::identity::{IdentityContext, IdentitySource};
use keyhold_store::protect::KeyProtector;
use keyhold_store::store::{FIELD_COMMENT, FIELD_KEY, FIELD_PUBLIC, FIELD_TYPE, Store};
use tracing::{debug, warn};

use crate::codec;

/// The credential-storage backend: store plus encryption codec, shared
/// across connections.
pub struct Agent {
    store: Arc<dyn Store>,
    protector: Arc<KeyProtector>,
}

impl Agent {
    pub fn new(store: Arc<dyn Store>, protector: Arc<KeyProtector>) -> Self {
        Self { store, protector }
    }

    /// Register a new private key under the caller's namespace.
    ///
    /// Response is a single success/failure byte; a failed add leaves no
    /// partial entry behind.
    pub(crate) fn add_identity(
        &self,
        request: &mut WireReader<'_>,
        identity: &dyn IdentitySource,
    ) -> Vec<u8> {
        match self.try_add_identity(request, identity) {
            Ok(fingerprint) => {
                debug!(%fingerprint, "identity added");
                vec![SSH_AGENT_SUCCESS]
            }
            Err(e) => {
                debug!(error = %e, "add_identity failed");
                vec![SSH_AGENT_FAILURE]
            }
        }
    }

    fn try_add_identity(
        &self,
        request: &mut WireReader<'_>,
        identity: &dyn IdentitySource,
    ) -> Result<String, AgentError> {
        let key_blob = request.get_string()?;
        if key_blob.is_empty() {
            return Err(AgentError::RequestMalformed);
        }
        let comment = request.get_string()?;

        let private = codec::parse_private(key_blob).map_err(|_| AgentError::RequestMalformed)?;
        let public_blob =
            codec::public_blob(&private).map_err(|_| AgentError::RequestMalformed)?;
        let fingerprint = codec::fingerprint(private.public_key());
        let tag = codec::algorithm_tag(&private.algorithm());

        let ctx =
            IdentityContext::acquire(identity).map_err(|_| AgentError::IdentityUnavailable)?;

        // The raw caller-supplied serialization is what gets sealed; the key
        // is never persisted in any other form.
        let sealed = self.protector.protect(&ctx, key_blob).map_err(|e| {
            debug!(error = %e, "sealing private key failed");
            AgentError::CryptoFailure
        })?;

        self.store.create_namespace(&ctx)?;
        // Re-adding a fingerprint replaces the entry wholesale.
        self.store.delete_entry(&ctx, &fingerprint)?;
        self.store.create_entry(&ctx, &fingerprint)?;

        if let Err(e) = self.populate_entry(&ctx, &fingerprint, &sealed, &public_blob, tag, comment)
        {
            // A partially written entry must not be observable.  Rollback is
            // best-effort: its own failure is logged, the original error wins.
            if let Err(rollback) = self.store.delete_entry(&ctx, &fingerprint) {
                warn!(%fingerprint, error = %rollback, "rollback of partial entry failed");
            }
            return Err(e.into());
        }

        Ok(fingerprint)
    }

    fn populate_entry(
        &self,
        ctx: &IdentityContext,
        entry: &str,
        sealed: &[u8],
        public_blob: &[u8],
        tag: u32,
        comment: &[u8],
    ) -> Result<(), StoreError> {
        self.store.write_field(ctx, entry, FIELD_KEY, sealed)?;
        self.store.write_field(ctx, entry, FIELD_PUBLIC, public_blob)?;
        self.store.write_field(ctx, entry, FIELD_TYPE, &tag.to_be_bytes())?;
        self.store.write_field(ctx, entry, FIELD_COMMENT, comment)
    }

    /// Enumerate the caller's public keys.
    ///
    /// Best-effort inventory: the store may be shared with other writers, so
    /// an entry missing its public blob is skipped rather than failing the
    /// whole listing.  Any other store error aborts.
    pub(crate) fn request_identities(&self, identity: &dyn IdentitySource) -> Vec<u8> {
        match self.try_request_identities(identity) {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "request_identities failed");
                vec![SSH_AGENT_FAILURE]
            }
        }
    }

    fn try_request_identities(
        &self,
        identity: &dyn IdentitySource,
    ) -> Result<Vec<u8>, AgentError> {
        let ctx =
            IdentityContext::acquire(identity).map_err(|_| AgentError::IdentityUnavailable)?;

        let mut identities = WireWriter::new();
        let mut count: u32 = 0;
        for entry in self.store.list_entries(&ctx)? {
            let Some(public_blob) = self.store.read_field(&ctx, &entry, FIELD_PUBLIC)? else {
                debug!(entry, "entry has no public blob, skipping");
                continue;
            };
            let comment = self
                .store
                .read_field(&ctx, &entry, FIELD_COMMENT)?
                .unwrap_or_default();

            identities.put_string(&public_blob);
            identities.put_string(&comment);
            count += 1;
        }

        let mut response = WireWriter::new();
        response.put_u8(SSH_AGENT_IDENTITIES_ANSWER);
        response.put_u32(count);
        response.put_writer(&identities);
        debug!(count, "identities listed");
        Ok(response.into_bytes())
    }

    /// Sign a message with a previously registered key.
    pub(crate) fn sign_request(
        &self,
        request: &mut WireReader<'_>,
        identity: &dyn IdentitySource,
    ) -> Vec<u8> {
        match self.try_sign_request(request, identity) {
            Ok(signature) => {
                let mut response = WireWriter::new();
                response.put_u8(SSH_AGENT_SIGN_RESPONSE);
                response.put_string(&signature);
                response.into_bytes()
            }
            Err(e) => {
                debug!(error = %e, "sign_request failed");
                vec![SSH_AGENT_FAILURE]
            }
        }
    }

    fn try_sign_request(
        &self,
        request: &mut WireReader<'_>,
        identity: &dyn IdentitySource,
    ) -> Result<Vec<u8>, AgentError> {
        let public_blob = request.get_string()?;
        let message = request.get_string()?;
        // Accepted but not yet given semantics.
        let flags = request.get_u32()?;

        let public = codec::parse_public(public_blob).map_err(|_| AgentError::RequestMalformed)?;
        let fingerprint = codec::fingerprint(&public);

        let ctx =
            IdentityContext::acquire(identity).map_err(|_| AgentError::IdentityUnavailable)?;

        if !self.store.entry_exists(&ctx, &fingerprint)? {
            return Err(AgentError::KeyNotFound);
        }
        let sealed = self
            .store
            .read_field(&ctx, &fingerprint, FIELD_KEY)?
            .ok_or(AgentError::KeyNotFound)?;

        let key_bytes = self.protector.unprotect(&ctx, &sealed).map_err(|e| {
            debug!(error = %e, "unsealing private key failed");
            AgentError::CryptoFailure
        })?;
        let private = codec::parse_private(&key_bytes).map_err(|_| AgentError::KeyCorrupt)?;

        let signature =
            codec::sign(&private, message).map_err(|_| AgentError::CryptoFailure)?;

        debug!(%fingerprint, flags, message_len = message.len(), "message signed");

        // Reconstructed key material must not outlive this call: the private
        // key zeroizes its secret on drop, the decrypted buffer on drop.
        drop(private);
        drop(key_bytes);

        Ok(signature)
    }
}
