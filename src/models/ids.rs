// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Reserved attribute IDs, reserved channel numbers and attribute format
//! codes.
//!
//! Negative attribute IDs are reserved by the protocol; non-negative IDs
//! are allocated per session by the session builder and given meaning by
//! the attribute definitions carried inside the session record. The same
//! split applies to channel numbers: negative channels are control
//! channels, non-negative channels are event streams.

use crate::errors::{HoraceError, Result};

// Reserved attribute IDs.
pub const ATTR_DEF: i64 = -1;
pub const ATTR_CODE: i64 = -2;
pub const ATTR_LABEL: i64 = -3;
pub const ATTR_FORMAT: i64 = -4;
pub const ATTR_CHANNEL_DEF: i64 = -5;
pub const ATTR_CHANNEL_NUM: i64 = -6;
pub const ATTR_CHANNEL_LABEL: i64 = -7;
pub const ATTR_SOURCE: i64 = -8;
pub const ATTR_TIMESTAMP: i64 = -9;
pub const ATTR_SEQNUM: i64 = -10;
pub const ATTR_HASH: i64 = -11;
pub const ATTR_SIG: i64 = -12;
pub const ATTR_END: i64 = -13;
pub const ATTR_HASH_ALG: i64 = -14;
pub const ATTR_SIG_ALG: i64 = -15;
pub const ATTR_SIG_PUBKEY: i64 = -16;

// Reserved channel numbers.
pub const CHANNEL_ERROR: i64 = -1;
pub const CHANNEL_SESSION: i64 = -2;
pub const CHANNEL_SESSION_END: i64 = -3;
pub const CHANNEL_SYNC: i64 = -4;
pub const CHANNEL_ACK: i64 = -5;
pub const CHANNEL_SIGNATURE: i64 = -6;

/// Attribute format codes as carried in attribute definitions.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrFormat {
    #[default]
    Compound = 0,
    Unsigned = 1,
    Binary = 2,
    String = 3,
    Timestamp = 4,
    Signed = 5,
    Boolean = 6,
}

impl AttrFormat {
    pub fn from_code(code: u64) -> Result<Self> {
        Ok(match code {
            0 => Self::Compound,
            1 => Self::Unsigned,
            2 => Self::Binary,
            3 => Self::String,
            4 => Self::Timestamp,
            5 => Self::Signed,
            6 => Self::Boolean,
            other => {
                return Err(HoraceError::malformed(format!(
                    "unrecognised attribute format code {other}"
                )));
            },
        })
    }

    pub fn code(self) -> u64 {
        self as u64
    }
}
