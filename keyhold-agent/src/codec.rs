//! Key codec.
//!
//! Thin wrapper over the `ssh-key` crate: parse a private key from its
//! serialized form, derive the public serialization and fingerprint, and
//! produce signatures.  Handlers go through this module so the rest of the
//! crate never names an algorithm.
//!
//! Private keys arrive and are stored in OpenSSH encoding; public keys
//! travel as the binary wire blob; signatures are encoded as
//! `string(algorithm) || string(raw signature bytes)`.

use keyhold_core::wire::WireWriter;
use signature::Signer as _;
use ssh_key::{Algorithm, HashAlg, PrivateKey, PublicKey};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("key serialization error")]
    Key(#[from] ssh_key::Error),

    #[error("signing failed")]
    Sign(#[source] signature::Error),
}

/// Parse a private key from the codec's serialization.
pub fn parse_private(blob: &[u8]) -> Result<PrivateKey, CodecError> {
    Ok(PrivateKey::from_openssh(blob)?)
}

/// Parse a public key from its wire blob.
pub fn parse_public(blob: &[u8]) -> Result<PublicKey, CodecError> {
    Ok(PublicKey::from_bytes(blob)?)
}

/// The public wire blob for a private key.
pub fn public_blob(key: &PrivateKey) -> Result<Vec<u8>, CodecError> {
    Ok(key.public_key().to_bytes()?)
}

/// Stable SHA-256 fingerprint string, e.g. `"SHA256:abc123…"`.
pub fn fingerprint(public: &PublicKey) -> String {
    public.fingerprint(HashAlg::Sha256).to_string()
}

/// Small integer identifying the key's algorithm family, stored alongside
/// the entry so listings can tell families apart without decrypting.
pub fn algorithm_tag(algorithm: &Algorithm) -> u32 {
    match algorithm {
        Algorithm::Rsa { .. } => 0,
        Algorithm::Dsa => 1,
        Algorithm::Ecdsa { .. } => 2,
        Algorithm::Ed25519 => 3,
        // Unspecified family (security keys, future algorithms).
        _ => 14,
    }
}

/// Sign `message` and encode the signature for the wire.
pub fn sign(key: &PrivateKey, message: &[u8]) -> Result<Vec<u8>, CodecError> {
    let sig: ssh_key::Signature = key.try_sign(message).map_err(CodecError::Sign)?;

    let mut blob = WireWriter::new();
    blob.put_string(sig.algorithm().as_str().as_bytes());
    blob.put_string(sig.as_bytes());
    Ok(blob.into_bytes())
}
