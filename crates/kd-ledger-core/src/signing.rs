//! The signature service: owns a key pair and signs or verifies payloads.
//!
//! Signatures cover a SHA-256 digest of the payload with domain separation:
//! `message = SIGN_DOMAIN || sha256(payload)`.

use crate::crypto::{Keypair, PublicKey, Signature};
use crate::error::{CoreError, Result};
use crate::types::Digest;

/// Domain separation prefix for payload signatures.
pub const SIGN_DOMAIN: &[u8] = b"kd-ledger/signature/v1";

/// Signs and verifies arbitrary byte payloads.
///
/// A service may hold a full key pair, only a verification key, or nothing.
/// Signing without a key pair fails with [`CoreError::KeyUnavailable`];
/// verification without a key simply returns `false`.
#[derive(Debug, Clone)]
pub struct SignatureService {
    keypair: Option<Keypair>,
    public_key: Option<PublicKey>,
}

impl SignatureService {
    /// Create a service with a freshly generated key pair.
    pub fn generate() -> Self {
        Self::from_keypair(Keypair::generate())
    }

    /// Create a service from an externally supplied key pair.
    pub fn from_keypair(keypair: Keypair) -> Self {
        let public_key = keypair.public_key();
        Self {
            keypair: Some(keypair),
            public_key: Some(public_key),
        }
    }

    /// Create a service from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self::from_keypair(Keypair::from_seed(seed))
    }

    /// Create a verification-only service.
    pub fn verify_only(public_key: PublicKey) -> Self {
        Self {
            keypair: None,
            public_key: Some(public_key),
        }
    }

    /// Create a service with no keys at all.
    pub fn unkeyed() -> Self {
        Self {
            keypair: None,
            public_key: None,
        }
    }

    /// The verification key, if any.
    pub fn public_key(&self) -> Option<PublicKey> {
        self.public_key
    }

    /// Whether this service can sign.
    pub fn can_sign(&self) -> bool {
        self.keypair.is_some()
    }

    /// Sign a payload.
    pub fn sign(&self, payload: &[u8]) -> Result<Signature> {
        let keypair = self.keypair.as_ref().ok_or(CoreError::KeyUnavailable)?;
        Ok(keypair.sign(&signing_message(payload)))
    }

    /// Verify a signature given as raw bytes.
    ///
    /// Returns `false` for a malformed signature, a mismatch, or a missing key.
    pub fn verify(&self, payload: &[u8], signature: &[u8]) -> bool {
        let Some(public_key) = self.public_key else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };
        public_key
            .verify(&signing_message(payload), &signature)
            .is_ok()
    }

    /// Verify a hex-encoded signature.
    pub fn verify_hex(&self, payload: &[u8], signature_hex: &str) -> bool {
        match hex::decode(signature_hex) {
            Ok(bytes) => self.verify(payload, &bytes),
            Err(_) => false,
        }
    }
}

fn signing_message(payload: &[u8]) -> Vec<u8> {
    let digest = Digest::sha256(payload);
    let mut msg = Vec::with_capacity(SIGN_DOMAIN.len() + 32);
    msg.extend_from_slice(SIGN_DOMAIN);
    msg.extend_from_slice(digest.as_bytes());
    msg
}
