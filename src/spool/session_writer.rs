// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    path::PathBuf,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use nix::sys::statvfs::statvfs;
use tracing::warn;

use crate::{
    endpoint::SessionWriter,
    errors::{HoraceError, Result},
    models::{
        Record, SourceId,
        ids::{CHANNEL_ACK, CHANNEL_SESSION, CHANNEL_SYNC},
    },
    spool::{
        DEFAULT_MINWIDTH, FilestoreScan, Lockfile, SpoolfileWriter, WRLOCK,
        spoolfile::SpoolfileName,
    },
};

/// Free-space hysteresis thresholds as fractions of the filesystem's
/// unprivileged capacity.
#[derive(Debug, Clone, Copy)]
pub struct FreeSpaceMarks {
    /// At or above this used fraction, collection is turned off.
    pub hwm: f64,
    /// Below this used fraction, collection is turned back on.
    pub lwm: f64,
}

/// Writes sessions into a filestore subdirectory, one capped spoolfile
/// at a time.
///
/// The writer holds the `.wrlock` lockfile for its lifetime. Each
/// spoolfile begins with the session record of the session in progress,
/// so a reader can begin mid-stream at any file boundary.
pub struct FileSessionWriter {
    pathname: PathBuf,
    dir: std::fs::File,
    _lockfile: Lockfile,
    filesize: u64,
    next_filenum: u64,
    minwidth: usize,
    sfw: Option<SpoolfileWriter>,
    srec: Option<Record>,
    reply: Option<Record>,
    space: Option<FreeSpaceMarks>,
    collecting: AtomicBool,
}

impl FileSessionWriter {
    pub async fn new(
        root: PathBuf,
        source_id: &SourceId,
        filesize: u64,
        space: Option<FreeSpaceMarks>,
    ) -> Result<Self> {
        let pathname = root.join(source_id.as_str());
        tokio::fs::create_dir_all(&pathname).await.map_err(|e| {
            HoraceError::fatal(format!("cannot create filestore directory: {e}"))
        })?;
        let dir = std::fs::File::open(&pathname).map_err(|e| {
            HoraceError::fatal(format!("cannot open filestore directory: {e}"))
        })?;
        let lockfile = Lockfile::acquire(pathname.join(WRLOCK))?;

        let scan = FilestoreScan::scan(&pathname)?;
        let minwidth = if scan.is_empty() {
            DEFAULT_MINWIDTH
        } else {
            scan.minwidth
        };
        Ok(Self {
            pathname,
            dir,
            _lockfile: lockfile,
            filesize,
            next_filenum: scan.next_filenum,
            minwidth,
            sfw: None,
            srec: None,
            reply: None,
            space,
            collecting: AtomicBool::new(true),
        })
    }

    /// The pathname for the next spoolfile, advancing the file number.
    fn next_pathname(&mut self) -> Result<PathBuf> {
        let filename = SpoolfileName::format(self.next_filenum, self.minwidth);
        self.next_filenum = self
            .next_filenum
            .checked_add(1)
            .filter(|&n| n != u64::MAX)
            .ok_or_else(|| HoraceError::exhausted("file number overflow"))?;
        Ok(self.pathname.join(filename))
    }

    fn sync_dir(&self) -> Result<()> {
        self.dir.sync_all().map_err(|e| {
            HoraceError::fatal(format!("cannot sync filestore directory: {e}"))
        })?;
        Ok(())
    }

    async fn open_spoolfile(&mut self) -> Result<()> {
        let pathname = self.next_pathname()?;
        self.sfw = Some(SpoolfileWriter::create(pathname, self.filesize).await?);
        self.sync_dir()?;
        Ok(())
    }

    async fn process_session_record(&mut self, rec: &Record) -> Result<()> {
        let is_new = match &self.srec {
            Some(srec) => !srec.same_session(rec),
            None => true,
        };
        if is_new {
            // Flush any file belonging to the previous session before
            // starting the next one in a fresh spoolfile.
            if let Some(sfw) = self.sfw.as_mut() {
                sfw.sync().await?;
            }
            self.open_spoolfile().await?;
            let sfw = self.sfw.as_mut().ok_or_else(|| {
                HoraceError::fatal("spoolfile writer unavailable")
            })?;
            sfw.write(rec).await?;
        }
        self.srec = Some(rec.clone());

        if rec.is_session_end() {
            if !is_new {
                let sfw = self.sfw.as_mut().ok_or_else(|| {
                    HoraceError::protocol("no session in progress")
                })?;
                sfw.write(rec).await?;
            }
            if let Some(sfw) = self.sfw.as_mut() {
                sfw.sync().await?;
            }
            self.sfw = None;
            self.srec = None;
        }
        Ok(())
    }

    async fn process_sync_record(&mut self, rec: &Record) -> Result<()> {
        if let Some(sfw) = self.sfw.as_mut() {
            sfw.sync().await?;
        }
        // The ack echoes the attributes of the sync it answers.
        self.reply = Some(Record::new(CHANNEL_ACK, rec.attributes().clone()));
        Ok(())
    }

    async fn process_event_record(&mut self, rec: &Record) -> Result<()> {
        let mut written = false;
        if let Some(sfw) = self.sfw.as_mut() {
            written = sfw.write(rec).await?;
        }
        if !written {
            // Either no spoolfile is in progress or the current one is
            // full: open the next and re-emit the session record at its
            // head so a reader can begin mid-stream.
            let srec = self.srec.clone().ok_or_else(|| {
                HoraceError::protocol("no session in progress")
            })?;
            self.open_spoolfile().await?;
            let sfw = self.sfw.as_mut().ok_or_else(|| {
                HoraceError::fatal("spoolfile writer unavailable")
            })?;
            sfw.write(&srec).await?;
            written = sfw.write(rec).await?;
        }
        // Spoolfiles always admit at least one event record.
        if !written {
            return Err(HoraceError::fatal(
                "failed to write record to new spoolfile",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionWriter for FileSessionWriter {
    async fn write(&mut self, rec: &Record) -> Result<()> {
        match rec.channel() {
            CHANNEL_SESSION => self.process_session_record(rec).await,
            CHANNEL_SYNC => self.process_sync_record(rec).await,
            _ => self.process_event_record(rec).await,
        }
    }

    async fn read(&mut self) -> Result<Record> {
        self.reply
            .take()
            .ok_or_else(|| HoraceError::protocol("no reply record available"))
    }

    fn writable(&self) -> bool {
        let Some(marks) = self.space else {
            return true;
        };
        let stats = match statvfs(&self.pathname) {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "cannot determine free space");
                return false;
            },
        };
        // Fraction of blocks used, out of those available to
        // unprivileged users.
        let used = (stats.blocks() - stats.blocks_free()) as f64;
        let total = used + stats.blocks_available() as f64;
        let used_frac = used / total;

        // Between the two marks lies the hysteresis region, where the
        // previous answer stands.
        if used_frac >= marks.hwm {
            self.collecting.store(false, Ordering::Relaxed);
        } else if used_frac < marks.lwm {
            self.collecting.store(true, Ordering::Relaxed);
        }
        self.collecting.load(Ordering::Relaxed)
    }
}
