//! # secp256k1 Signer
//!
//! In-process implementation of the [`Signer`] port for external parties
//! whose key the operator chooses to hold locally (tests, tooling, a custody
//! sidecar). Production deployments can plug in any other `Signer`.
//!
//! Signatures are ECDSA over SHA-256 of the message, DER encoded. The key
//! fingerprint follows the ledger's convention: the SHA-256 multihash
//! (`1220` prefix) over the purpose-tagged SPKI DER public key.

use crate::domain::SignerError;
use crate::ports::Signer;
use async_trait::async_trait;
use k256::ecdsa::{signature::Signer as _, Signature, SigningKey, VerifyingKey};
use k256::pkcs8::EncodePublicKey;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

/// Hash purpose tag of public key fingerprints.
const FINGERPRINT_HASH_PURPOSE: u32 = 12;

/// Multihash prefix of a SHA-256 digest (code 0x12, length 0x20).
const SHA256_MULTIHASH_PREFIX: &str = "1220";

/// Ledger fingerprint of a DER-encoded SPKI public key.
pub fn key_fingerprint(spki_der: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(FINGERPRINT_HASH_PURPOSE.to_be_bytes());
    hasher.update(spki_der);
    format!("{}{}", SHA256_MULTIHASH_PREFIX, hex::encode(hasher.finalize()))
}

/// Local secp256k1 signing key.
pub struct Secp256k1Signer {
    signing_key: SigningKey,
    public_key_der: Vec<u8>,
    fingerprint: String,
}

impl Secp256k1Signer {
    /// Fresh random key.
    pub fn generate() -> Result<Self, SignerError> {
        Self::from_signing_key(SigningKey::random(&mut OsRng))
    }

    /// Key from 32 raw scalar bytes.
    pub fn from_bytes(secret: &[u8]) -> Result<Self, SignerError> {
        let signing_key =
            SigningKey::from_slice(secret).map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        Self::from_signing_key(signing_key)
    }

    /// Key from a hex-encoded scalar (optionally `0x`-prefixed).
    pub fn from_hex(secret: &str) -> Result<Self, SignerError> {
        let trimmed = secret.trim();
        let bytes = hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))
            .map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    fn from_signing_key(signing_key: SigningKey) -> Result<Self, SignerError> {
        let public_key = k256::PublicKey::from(signing_key.verifying_key());
        let public_key_der = public_key
            .to_public_key_der()
            .map_err(|e| SignerError::InvalidKey(e.to_string()))?
            .as_bytes()
            .to_vec();
        let fingerprint = key_fingerprint(&public_key_der);
        Ok(Self {
            signing_key,
            public_key_der,
            fingerprint,
        })
    }

    /// SPKI DER encoding of the public key, as submitted at party allocation.
    pub fn public_key_der(&self) -> &[u8] {
        &self.public_key_der
    }

    /// Verifying half of the key.
    pub fn verifying_key(&self) -> VerifyingKey {
        *self.signing_key.verifying_key()
    }
}

#[async_trait]
impl Signer for Secp256k1Signer {
    async fn sign_der(&self, message: &[u8]) -> Result<Vec<u8>, SignerError> {
        let signature: Signature = self
            .signing_key
            .try_sign(message)
            .map_err(|e| SignerError::SigningFailed(e.to_string()))?;
        Ok(signature.to_der().as_bytes().to_vec())
    }

    fn fingerprint(&self) -> String {
        self.fingerprint.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::signature::Verifier;

    #[tokio::test]
    async fn test_der_signature_verifies() {
        let signer = Secp256k1Signer::generate().unwrap();
        let hash = Sha256::digest(b"prepared transaction");

        let der = signer.sign_der(&hash).await.unwrap();
        let signature = Signature::from_der(&der).unwrap();
        tokio_test::assert_ok!(signer.verifying_key().verify(&hash, &signature));
    }

    #[test]
    fn test_fingerprint_is_stable_multihash() {
        let secret = [7u8; 32];
        let a = Secp256k1Signer::from_bytes(&secret).unwrap();
        let b = Secp256k1Signer::from_hex(&format!("0x{}", hex::encode(secret))).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert!(a.fingerprint().starts_with("1220"));
        assert_eq!(a.fingerprint().len(), 68);
        assert_eq!(a.fingerprint(), key_fingerprint(a.public_key_der()));
    }

    #[test]
    fn test_invalid_key_rejected() {
        assert!(matches!(
            Secp256k1Signer::from_bytes(&[0u8; 32]),
            Err(SignerError::InvalidKey(_))
        ));
        assert!(Secp256k1Signer::from_hex("zz").is_err());
    }
}
