// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    collections::{BTreeSet, HashSet},
    path::PathBuf,
};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    endpoint::{SessionListener, SessionReader},
    errors::{HoraceError, Result},
    models::SourceId,
    spool::{DirectoryWatcher, FileSessionReader},
};

/// Yields one session reader per source subdirectory of a filestore.
///
/// Sources already present are picked up by an initial scan; new ones
/// arrive via the directory watcher, after which the directory is
/// rescanned. Rescanning on every wake-up is slightly inefficient but
/// immune to watcher queue overruns, and new sources are infrequent.
pub struct FileSessionListener {
    pathname: PathBuf,
    nodelete: bool,
    watcher: DirectoryWatcher,
    cancel: CancellationToken,
    accepted: HashSet<String>,
    pending: BTreeSet<String>,
}

impl FileSessionListener {
    pub async fn new(
        pathname: PathBuf,
        nodelete: bool,
        cancel: CancellationToken,
    ) -> Result<Self> {
        tokio::fs::create_dir_all(&pathname).await.map_err(|e| {
            HoraceError::fatal(format!("cannot create filestore directory: {e}"))
        })?;
        let watcher = DirectoryWatcher::watch(&pathname, cancel.clone())?;
        let mut listener = Self {
            pathname,
            nodelete,
            watcher,
            cancel,
            accepted: HashSet::new(),
            pending: BTreeSet::new(),
        };
        listener.scan()?;
        Ok(listener)
    }

    /// Pick up source subdirectories, excluding dotfiles and sources
    /// already accepted.
    fn scan(&mut self) -> Result<()> {
        let entries = std::fs::read_dir(&self.pathname)
            .map_err(|e| HoraceError::fatal(format!("cannot scan filestore: {e}")))?;
        for entry in entries {
            let entry = entry
                .map_err(|e| HoraceError::fatal(format!("cannot scan filestore: {e}")))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.is_empty() || name.starts_with('.') {
                continue;
            }
            if !self.accepted.contains(&name) {
                self.pending.insert(name);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SessionListener for FileSessionListener {
    async fn accept(&mut self) -> Result<Box<dyn SessionReader>> {
        loop {
            if let Some(srcid) = self.pending.pop_first() {
                self.accepted.insert(srcid.clone());
                let source_id = SourceId::new(srcid)?;
                let reader = FileSessionReader::new(
                    self.pathname.clone(),
                    &source_id,
                    self.nodelete,
                    self.cancel.clone(),
                )
                .await?;
                return Ok(Box::new(reader));
            }
            self.watcher.changed().await?;
            self.scan()?;
        }
    }
}
