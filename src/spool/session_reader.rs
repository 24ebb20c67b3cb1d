// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    codec::{OctetReader, RawRead},
    endpoint::SessionReader,
    errors::{HoraceError, Result},
    models::{
        Attribute, AttributeList, Record, SourceId, Timestamp,
        ids::{ATTR_SEQNUM, ATTR_TIMESTAMP, CHANNEL_ACK, CHANNEL_SYNC},
    },
    session::SessionContext,
    spool::{
        DirectoryWatcher, FilestoreScan, Lockfile, RDLOCK, spoolfile::SpoolfileName,
    },
};

/// Raw octet source for one spoolfile.
///
/// End of file is only final once a higher-numbered spoolfile has been
/// observed; until then the file may still be growing, so reads block on
/// the directory watcher instead of reporting EOF.
struct SpoolfileRaw {
    file: tokio::fs::File,
    next_pathname: PathBuf,
    watcher: DirectoryWatcher,
}

impl RawRead for SpoolfileRaw {
    async fn read_chunk(&mut self, buf: &mut BytesMut) -> Result<usize> {
        let mut successor_observed = false;
        loop {
            let n = self.file.read_buf(buf).await?;
            if n > 0 {
                return Ok(n);
            }
            if successor_observed {
                // The observation of the successor preceded this read
                // attempt, so end of file is now final.
                return Ok(0);
            }
            if tokio::fs::try_exists(&self.next_pathname)
                .await
                .unwrap_or(false)
            {
                successor_observed = true;
            } else {
                self.watcher.changed().await?;
            }
        }
    }
}

struct CurrentSpoolfile {
    reader: OctetReader<SpoolfileRaw>,
    pathname: PathBuf,
}

/// Reads one source's sessions back out of a filestore subdirectory.
///
/// Holds the `.rdlock` lockfile for its lifetime. Emits a synthetic sync
/// record whenever the current spoolfile is exhausted and a successor
/// exists; the matching ack deletes the file (unless suppressed) and
/// advances to the successor.
pub struct FileSessionReader {
    pathname: PathBuf,
    dir: std::fs::File,
    _lockfile: Lockfile,
    watcher: DirectoryWatcher,
    cancel: CancellationToken,
    nodelete: bool,
    current_filenum: u64,
    minwidth: usize,
    current: Option<CurrentSpoolfile>,
    ctx: SessionContext,
    session_ts: Option<Timestamp>,
    seqnum: u64,
    seen_event: bool,
    syncing: bool,
}

impl FileSessionReader {
    pub async fn new(
        root: PathBuf,
        source_id: &SourceId,
        nodelete: bool,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let pathname = root.join(source_id.as_str());
        tokio::fs::create_dir_all(&pathname).await.map_err(|e| {
            HoraceError::fatal(format!("cannot create filestore directory: {e}"))
        })?;
        let dir = std::fs::File::open(&pathname).map_err(|e| {
            HoraceError::fatal(format!("cannot open filestore directory: {e}"))
        })?;
        let lockfile = Lockfile::acquire(pathname.join(RDLOCK))?;
        let watcher = DirectoryWatcher::watch(&pathname, cancel.clone())?;
        Ok(Self {
            pathname,
            dir,
            _lockfile: lockfile,
            watcher,
            cancel,
            nodelete,
            current_filenum: 0,
            minwidth: 0,
            current: None,
            ctx: SessionContext::new(),
            session_ts: None,
            seqnum: 0,
            seen_event: false,
            syncing: false,
        })
    }

    fn spoolfile_pathname(&self, filenum: u64) -> PathBuf {
        self.pathname
            .join(SpoolfileName::format(filenum, self.minwidth))
    }

    async fn open_current(&mut self) -> Result<()> {
        let next_filenum = self
            .current_filenum
            .checked_add(1)
            .filter(|&n| n != u64::MAX)
            .ok_or_else(|| HoraceError::exhausted("file number overflow"))?;
        let pathname = self.spoolfile_pathname(self.current_filenum);
        let next_pathname = self.spoolfile_pathname(next_filenum);

        // Register the watcher before opening so a concurrent writer
        // cannot slip a change between the two.
        let watcher = DirectoryWatcher::watch(&self.pathname, self.cancel.clone())?;
        let file = tokio::fs::File::open(&pathname).await.map_err(|e| {
            HoraceError::fatal(format!(
                "cannot open spoolfile {}: {e}",
                pathname.display()
            ))
        })?;
        self.current = Some(CurrentSpoolfile {
            reader: OctetReader::new(SpoolfileRaw {
                file,
                next_pathname,
                watcher,
            }),
            pathname,
        });
        Ok(())
    }

    /// Wait until the store is non-empty, then open the lowest-numbered
    /// spoolfile.
    async fn open_first(&mut self) -> Result<()> {
        while self.minwidth == 0 {
            let scan = FilestoreScan::scan(&self.pathname)?;
            if scan.is_empty() {
                self.watcher.changed().await?;
            } else {
                self.current_filenum = scan.first_filenum;
                self.minwidth = scan.minwidth;
            }
        }
        self.open_current().await
    }

    fn session_timestamp(&self) -> Timestamp {
        self.session_ts.unwrap_or_default()
    }
}

#[async_trait]
impl SessionReader for FileSessionReader {
    async fn read(&mut self) -> Result<Record> {
        // Once a sync record has been returned for the current
        // spoolfile, it is an error to read further before it has been
        // acknowledged.
        if self.syncing {
            return Err(HoraceError::protocol("ack record expected"));
        }
        if self.current.is_none() {
            self.open_first().await?;
        }
        let current = self
            .current
            .as_mut()
            .ok_or_else(|| HoraceError::fatal("no spoolfile open"))?;

        match Record::read(&mut current.reader, &self.ctx).await {
            Ok(rec) => {
                if rec.is_session() {
                    self.ctx.absorb_session_record(&rec)?;
                    if let Ok(ts) = rec.timestamp()
                        && self.session_ts != Some(ts)
                    {
                        self.session_ts = Some(ts);
                        self.seqnum = 0;
                        self.seen_event = false;
                    }
                } else if rec.is_event() {
                    let expected = if self.seen_event { self.seqnum + 1 } else { 0 };
                    self.seqnum = rec.update_seqnum(expected);
                    self.seen_event = true;
                }
                Ok(rec)
            },
            Err(e) if matches!(e, HoraceError::EndOfStream) || e.is_truncated_frame() => {
                // The spoolfile is exhausted and a successor exists:
                // checkpoint it with a synthetic sync record. A record
                // cut short at the tail means the writer died mid-write;
                // the complete records before it have already been
                // delivered, so the file is checkpointed the same way.
                if e.is_truncated_frame() {
                    warn!(
                        spoolfile = %current.pathname.display(),
                        "spoolfile ends with a truncated record"
                    );
                }
                self.syncing = true;
                Ok(Record::new(
                    CHANNEL_SYNC,
                    AttributeList::new()
                        .with(Attribute::timestamp(
                            ATTR_TIMESTAMP,
                            self.session_timestamp(),
                        ))
                        .with(Attribute::unsigned(ATTR_SEQNUM, self.seqnum)),
                ))
            },
            Err(e) => Err(e),
        }
    }

    async fn write(&mut self, rec: &Record) -> Result<()> {
        if rec.channel() != CHANNEL_ACK {
            return Err(HoraceError::protocol(
                "unexpected record type sent to session reader",
            ));
        }
        if !self.syncing {
            return Err(HoraceError::protocol(
                "unexpected ack record sent to session reader",
            ));
        }
        let ack_ts = rec.timestamp()?;
        let ack_seqnum = rec.attributes().find_one(ATTR_SEQNUM)?.as_unsigned()?;
        if ack_ts != self.session_timestamp() || ack_seqnum != self.seqnum {
            return Err(HoraceError::protocol(
                "acknowledgement record does not match sync record",
            ));
        }

        let current = self
            .current
            .take()
            .ok_or_else(|| HoraceError::fatal("no spoolfile open"))?;
        if !self.nodelete {
            tokio::fs::remove_file(&current.pathname).await.map_err(|e| {
                HoraceError::fatal(format!(
                    "cannot delete spoolfile {}: {e}",
                    current.pathname.display()
                ))
            })?;
            self.dir.sync_all().map_err(|e| {
                HoraceError::fatal(format!("cannot sync filestore directory: {e}"))
            })?;
            info!(spoolfile = %current.pathname.display(), "deleted spoolfile");
        }

        self.current_filenum = self
            .current_filenum
            .checked_add(1)
            .filter(|&n| n != u64::MAX)
            .ok_or_else(|| HoraceError::exhausted("file number overflow"))?;
        self.open_current().await?;
        self.syncing = false;
        Ok(())
    }

    async fn reset(&mut self) -> bool {
        // Reopens the current (unacknowledged) spoolfile from its
        // beginning on the next read. Safe to call before any records
        // were read.
        self.current = None;
        self.session_ts = None;
        self.seqnum = 0;
        self.seen_event = false;
        self.syncing = false;
        true
    }
}
