use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use kernel_core::types::{SignerKeyId, Timestamp};
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key bytes")]
    InvalidPublicKey,

    #[error("unknown signer key id: {0}")]
    UnknownSignerKey(String),

    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Sign `message` with a raw Ed25519 secret key.
pub fn sign(secret_key_bytes: &[u8; 32], message: &[u8]) -> String {
    let signing_key = SigningKey::from_bytes(secret_key_bytes);
    let sig = signing_key.sign(message);
    base64_engine().encode(sig.to_bytes())
}

/// Verify a base64-encoded Ed25519 signature against `message` and a raw
/// public key.
pub fn verify_signature(public_key_bytes: &[u8; 32], message: &[u8], signature_b64: &str) -> Result<(), SignatureError> {
    let verifying_key =
        VerifyingKey::from_bytes(public_key_bytes).map_err(|_| SignatureError::InvalidPublicKey)?;
    let sig_bytes = base64_engine()
        .decode(signature_b64)
        .map_err(SignatureError::Base64)?;
    let sig_arr: [u8; 64] = sig_bytes
        .as_slice()
        .try_into()
        .map_err(|_| SignatureError::InvalidSignature)?;
    let signature = Signature::from_bytes(&sig_arr);
    verifying_key
        .verify(message, &signature)
        .map_err(|_| SignatureError::InvalidSignature)
}

fn base64_engine() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

use base64::Engine as _;

/// A loaded Ed25519 keypair identified by a `signer_key_id`. The secret key
/// is held in a `Zeroizing<[u8; 32]>` to wipe memory on drop.
pub struct KeyPair {
    pub key_id: SignerKeyId,
    pub public_key: [u8; 32],
    secret_key: Zeroizing<[u8; 32]>,
}

impl KeyPair {
    /// Generate a fresh Ed25519 keypair under the given `key_id`.
    pub fn generate(key_id: impl Into<SignerKeyId>, rng: &mut impl rand::RngCore) -> Self {
        let signing_key = SigningKey::generate(rng);
        Self {
            key_id: key_id.into(),
            public_key: signing_key.verifying_key().to_bytes(),
            secret_key: Zeroizing::new(signing_key.to_bytes()),
        }
    }

    pub fn from_raw(key_id: SignerKeyId, public_key: [u8; 32], secret_key: [u8; 32]) -> Self {
        Self {
            key_id,
            public_key,
            secret_key: Zeroizing::new(secret_key),
        }
    }

    pub fn sign(&self, message: &[u8]) -> String {
        sign(&self.secret_key, message)
    }

    pub fn verify(&self, message: &[u8], signature_b64: &str) -> Result<(), SignatureError> {
        verify_signature(&self.public_key, message, signature_b64)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyPair {{ key_id: {:?} }}", self.key_id)
    }
}

/// A public-key-only trust root entry: resolves a `signer_key_id` to the
/// public key authorized to sign artifacts under it.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TrustRootEntry {
    pub key_id: SignerKeyId,
    pub public_key_b64: String,
}

/// An externally-supplied set of trust roots. Itself an artifact with a
/// canonical hash, included in every evidence bundle (§4.2). `version` and
/// `effective_from` let a verifier tell which generation of roots a given
/// signature was checked against when roots are rotated across a run.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct TrustRootSet {
    pub version: u32,
    pub effective_from: Option<Timestamp>,
    pub roots: Vec<TrustRootEntry>,
}

impl TrustRootSet {
    pub fn resolve(&self, key_id: &SignerKeyId) -> Option<[u8; 32]> {
        self.roots
            .iter()
            .find(|r| &r.key_id == key_id)
            .and_then(|r| base64_engine().decode(&r.public_key_b64).ok())
            .and_then(|bytes| bytes.try_into().ok())
    }

    pub fn verify(&self, key_id: &SignerKeyId, message: &[u8], signature_b64: &str) -> Result<(), SignatureError> {
        let public_key = self
            .resolve(key_id)
            .ok_or_else(|| SignatureError::UnknownSignerKey(key_id.to_string()))?;
        verify_signature(&public_key, message, signature_b64)
    }
}
