// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngExt;

use crate::errors::{HoraceError, Result};

/// An Ed25519 public/private keypair for signing event records.
///
/// The keyfile form is a single line `ed25519:<pub-hex>:<sec-hex>`, as
/// emitted by `horace genkey`.
#[derive(Debug, Clone)]
pub struct Ed25519Keypair {
    signing: SigningKey,
}

impl Ed25519Keypair {
    /// Generate a fresh keypair.
    pub fn generate() -> Self {
        let mut secret = [0u8; 32];
        rand::rng().fill(&mut secret);
        Self {
            signing: SigningKey::from_bytes(&secret),
        }
    }

    /// Parse a keypair from keyfile content.
    pub fn from_keyfile(content: &str) -> Result<Self> {
        let mut fields = content.trim().split(':');
        let algorithm = fields
            .next()
            .ok_or_else(|| HoraceError::malformed("malformed keyfile"))?;
        if algorithm != "ed25519" {
            return Err(HoraceError::malformed(format!(
                "unrecognised signature algorithm {algorithm}"
            )));
        }
        let pk_hex = fields
            .next()
            .ok_or_else(|| HoraceError::malformed("malformed keyfile"))?;
        let sk_hex = fields
            .next()
            .ok_or_else(|| HoraceError::malformed("malformed keyfile"))?;

        let sk: [u8; 32] = hex::decode(sk_hex)
            .ok()
            .and_then(|v| v.try_into().ok())
            .ok_or_else(|| HoraceError::malformed("malformed private key"))?;
        let pk: [u8; 32] = hex::decode(pk_hex)
            .ok()
            .and_then(|v| v.try_into().ok())
            .ok_or_else(|| HoraceError::malformed("malformed public key"))?;

        let signing = SigningKey::from_bytes(&sk);
        if signing.verifying_key().to_bytes() != pk {
            return Err(HoraceError::malformed(
                "public key does not match private key",
            ));
        }
        Ok(Self { signing })
    }

    /// Render the keypair in keyfile form.
    pub fn to_keyfile(&self) -> String {
        format!(
            "ed25519:{}:{}",
            hex::encode(self.signing.verifying_key().to_bytes()),
            hex::encode(self.signing.to_bytes())
        )
    }

    pub fn algorithm(&self) -> &'static str {
        "ed25519"
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.signing.verifying_key().to_bytes()
    }

    /// Produce a detached signature over the given content.
    pub fn sign(&self, content: &[u8]) -> [u8; 64] {
        self.signing.sign(content).to_bytes()
    }

    /// Verify a detached signature against a bare public key.
    pub fn verify(public_key: &[u8], content: &[u8], signature: &[u8]) -> Result<()> {
        let pk: [u8; 32] = public_key
            .try_into()
            .map_err(|_| HoraceError::malformed("malformed public key"))?;
        let sig: [u8; 64] = signature
            .try_into()
            .map_err(|_| HoraceError::malformed("malformed signature"))?;
        let verifying = VerifyingKey::from_bytes(&pk)
            .map_err(|_| HoraceError::malformed("malformed public key"))?;
        verifying
            .verify(content, &Signature::from_bytes(&sig))
            .map_err(|_| HoraceError::protocol("signature verification failed"))
    }
}
