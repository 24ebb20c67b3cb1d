// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::Path;

use crate::{
    errors::{HoraceError, Result},
    spool::spoolfile::SpoolfileName,
};

/// The result of scanning a filestore directory.
///
/// `minwidth == 0` means the store is empty. Otherwise `first_filenum`
/// is the lowest file number present, `next_filenum` is one past the
/// highest, and `minwidth` is the established minimum filename width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilestoreScan {
    pub first_filenum: u64,
    pub next_filenum: u64,
    pub minwidth: usize,
}

impl FilestoreScan {
    /// Scan a filestore directory, ignoring dotfiles.
    ///
    /// The store is rejected on invalid filenames, file-number overflow,
    /// or zero-padding inconsistent between files: a padded name fixes
    /// the width exactly, an unpadded name constrains it from below.
    pub fn scan(pathname: &Path) -> Result<Self> {
        let mut first_filenum = u64::MAX;
        let mut next_filenum: u64 = 0;
        let mut minwidth = usize::MAX;
        let mut minwidth_fixed = false;

        let entries = std::fs::read_dir(pathname)
            .map_err(|e| HoraceError::fatal(format!("cannot scan filestore: {e}")))?;
        for entry in entries {
            let entry = entry
                .map_err(|e| HoraceError::fatal(format!("cannot scan filestore: {e}")))?;
            let filename = entry.file_name();
            let filename = filename.to_string_lossy();
            if filename.is_empty() || filename.starts_with('.') {
                continue;
            }
            let sf = SpoolfileName::parse(&filename)?;

            if !minwidth_fixed {
                if sf.padded {
                    // Padding fixes the width, after checking that it is
                    // consistent with names already seen.
                    if sf.width > minwidth {
                        return Err(HoraceError::exhausted(
                            "inconsistent padding in filestore",
                        ));
                    }
                    minwidth = sf.width;
                    minwidth_fixed = true;
                } else if sf.width < minwidth {
                    minwidth = sf.width;
                }
            } else if sf.padded {
                if sf.width != minwidth {
                    return Err(HoraceError::exhausted(
                        "inconsistent padding in filestore",
                    ));
                }
            } else if sf.width < minwidth {
                return Err(HoraceError::exhausted(
                    "inconsistent padding in filestore",
                ));
            }

            first_filenum = first_filenum.min(sf.filenum);
            next_filenum = next_filenum.max(sf.filenum + 1);
        }

        if first_filenum == u64::MAX {
            first_filenum = 0;
        }
        if minwidth == usize::MAX {
            minwidth = 0;
        }
        Ok(Self {
            first_filenum,
            next_filenum,
            minwidth,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.minwidth == 0
    }
}
