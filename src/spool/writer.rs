// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::PathBuf;

use tokio::{fs::OpenOptions, io::AsyncWriteExt};
use tracing::info;

use crate::{
    errors::{HoraceError, Result},
    models::Record,
};

/// Writes records to a single spoolfile.
///
/// The capacity is a budget, not a hard bound: at least one event record
/// may always be written regardless of size, so that a spoolfile is
/// never left without an event.
#[derive(Debug)]
pub struct SpoolfileWriter {
    pathname: PathBuf,
    file: tokio::fs::File,
    size: u64,
    capacity: u64,
    has_event: bool,
}

impl SpoolfileWriter {
    pub async fn create(pathname: PathBuf, capacity: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&pathname)
            .await
            .map_err(|e| {
                HoraceError::fatal(format!(
                    "cannot create spoolfile {}: {e}",
                    pathname.display()
                ))
            })?;
        info!(spoolfile = %pathname.display(), "created spoolfile");
        Ok(Self {
            pathname,
            file,
            size: 0,
            capacity,
            has_event: false,
        })
    }

    /// Attempt to write a record.
    ///
    /// Returns false without writing if the record would exceed the
    /// capacity budget and the file already contains an event record.
    pub async fn write(&mut self, rec: &Record) -> Result<bool> {
        let encoded = rec.to_bytes();
        if self.size + encoded.len() as u64 > self.capacity && self.has_event {
            return Ok(false);
        }
        self.file.write_all(&encoded).await?;
        self.size += encoded.len() as u64;
        if rec.is_event() {
            self.has_event = true;
        }
        Ok(true)
    }

    /// Ensure the spoolfile content has been written durably.
    ///
    /// This does not cover the directory entry; the session writer
    /// syncs the directory when it creates or removes files.
    pub async fn sync(&mut self) -> Result<()> {
        self.file.sync_data().await?;
        info!(spoolfile = %self.pathname.display(), "synced spoolfile");
        Ok(())
    }
}
