// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::Bytes;
use sha2::{Digest, Sha256, Sha512};

use crate::errors::{HoraceError, Result};

/// A hash function applied to the on-wire encoding of event records to
/// build the per-session hash chain.
///
/// The algorithm is declared by name in the session record so that a
/// verifier can recompute the chain without out-of-band knowledge.
#[derive(Debug, Clone)]
pub enum RecordHash {
    Sha256(Sha256),
    Sha512(Sha512),
}

impl RecordHash {
    /// Make a hash function from its algorithm name.
    pub fn make(name: &str) -> Result<Self> {
        match name {
            "sha256" => Ok(Self::Sha256(Sha256::new())),
            "sha512" => Ok(Self::Sha512(Sha512::new())),
            other => Err(HoraceError::malformed(format!(
                "unrecognised hash algorithm {other}"
            ))),
        }
    }

    pub fn algorithm(&self) -> &'static str {
        match self {
            Self::Sha256(_) => "sha256",
            Self::Sha512(_) => "sha512",
        }
    }

    /// The digest length, in octets.
    pub fn output_length(&self) -> usize {
        match self {
            Self::Sha256(_) => 32,
            Self::Sha512(_) => 64,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
        }
    }

    /// Produce the digest of the octets written so far and reset the
    /// state for the next record.
    pub fn finalize_reset(&mut self) -> Bytes {
        match self {
            Self::Sha256(h) => Bytes::copy_from_slice(&h.finalize_reset()),
            Self::Sha512(h) => Bytes::copy_from_slice(&h.finalize_reset()),
        }
    }

    /// One-shot digest of a buffer.
    pub fn digest(&mut self, data: &[u8]) -> Bytes {
        self.update(data);
        self.finalize_reset()
    }
}
