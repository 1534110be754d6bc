//! One-time nonces binding an authorization request to its response.

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::defaults::NONCE_ALPHABET;
use crate::error::AuthError;

/// A single-use random value and its one-way digest.
///
/// The hashed form travels with the authorization request; the raw form stays
/// with the caller and is presented to the identity backend when the returned
/// credential is exchanged. The provider echoes the value inside the signed
/// identity token, which lets the backend confirm the token was minted for
/// this exact request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nonce {
    raw: String,
    hashed: String,
}

impl Nonce {
    /// Generates a nonce of `length` characters from the secure random source.
    ///
    /// Each random byte is mapped onto the fixed 66-character alphabet, so the
    /// raw value is safe to embed in URLs and request payloads.
    ///
    /// # Panics
    /// `length` must be greater than zero. Violating this is a programmer
    /// error, not a recoverable failure.
    ///
    /// # Errors
    /// Returns [`AuthError::Entropy`] if the secure random source cannot
    /// produce bytes. This failure is not retried.
    pub fn generate(length: u32) -> Result<Self, AuthError> {
        assert!(length > 0, "nonce length must be greater than zero");

        let mut bytes = vec![0_u8; length as usize];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| AuthError::Entropy {
                reason: e.to_string(),
            })?;

        let raw: String = bytes
            .iter()
            .map(|byte| char::from(NONCE_ALPHABET[usize::from(*byte) % NONCE_ALPHABET.len()]))
            .collect();
        let hashed = hex::encode(Sha256::digest(raw.as_bytes()));

        Ok(Self { raw, hashed })
    }

    /// The raw value, held only by the requester.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Lowercase SHA-256 hex digest of the raw value's bytes.
    #[must_use]
    pub fn hashed(&self) -> &str {
        &self.hashed
    }

    /// Splits the nonce into its `(raw, hashed)` parts.
    #[must_use]
    pub fn into_parts(self) -> (String, String) {
        (self.raw, self.hashed)
    }
}
