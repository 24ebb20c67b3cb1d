// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::errors::{HoraceError, Result};

/// A parsed spoolfile name: the decimal file number plus whether the
/// name carries zero-padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpoolfileName {
    pub filenum: u64,
    pub padded: bool,
    pub width: usize,
}

impl SpoolfileName {
    /// Parse a filename as a spoolfile name.
    ///
    /// Names must be non-empty decimal digit strings; a file number of
    /// 2⁶⁴−1 is rejected because the store could not allocate a
    /// successor.
    pub fn parse(filename: &str) -> Result<Self> {
        if filename.is_empty() || !filename.bytes().all(|b| b.is_ascii_digit()) {
            return Err(HoraceError::fatal(format!(
                "invalid filename in filestore: {filename}"
            )));
        }
        let filenum: u64 = filename
            .parse()
            .map_err(|_| HoraceError::exhausted("file number overflow"))?;
        if filenum == u64::MAX {
            return Err(HoraceError::exhausted("file number overflow"));
        }
        Ok(Self {
            filenum,
            padded: filename.len() > 1 && filename.starts_with('0'),
            width: filename.len(),
        })
    }

    /// Render a file number as a spoolfile name, zero-padded to the
    /// given minimum width.
    pub fn format(filenum: u64, minwidth: usize) -> String {
        format!("{filenum:0minwidth$}")
    }
}
