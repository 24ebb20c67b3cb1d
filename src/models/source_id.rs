// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::fmt;

use crate::errors::{HoraceError, Result};

/// A validated source identifier.
///
/// Source IDs name a capture origin and double as spool subdirectory
/// names, so the character set is restricted to alphanumerics, `-` and
/// `.`, with no leading full stop.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(HoraceError::protocol("invalid source ID (empty string)"));
        }
        if id.len() > 255 {
            return Err(HoraceError::protocol("invalid source ID (too long)"));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        {
            return Err(HoraceError::protocol(
                "invalid source ID (invalid character)",
            ));
        }
        if id.starts_with('.') {
            return Err(HoraceError::protocol(
                "invalid source ID (initial full stop)",
            ));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for SourceId {
    type Error = HoraceError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}
