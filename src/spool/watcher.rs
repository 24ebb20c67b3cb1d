// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::Path;

use notify::{EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::errors::{HoraceError, Result};

/// Monitors a directory for newly-created or modified entries.
///
/// Notifications are collapsed into wake-ups: the watcher does not say
/// what changed, only that something did, and occasional false positives
/// are tolerable because callers rescan or re-probe after each wake-up.
pub struct DirectoryWatcher {
    _watcher: notify::RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<()>,
    cancel: CancellationToken,
}

impl DirectoryWatcher {
    pub fn watch(pathname: &Path, cancel: CancellationToken) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher =
            notify::recommended_watcher(move |res: Result<notify::Event, _>| {
                if let Ok(event) = res
                    && matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_)
                    )
                {
                    let _ = tx.send(());
                }
            })
            .map_err(|e| {
                HoraceError::fatal(format!("cannot watch directory: {e}"))
            })?;
        watcher
            .watch(pathname, RecursiveMode::NonRecursive)
            .map_err(|e| {
                HoraceError::fatal(format!("cannot watch directory: {e}"))
            })?;
        Ok(Self {
            _watcher: watcher,
            rx,
            cancel,
        })
    }

    /// Wait for the next change to the directory.
    pub async fn changed(&mut self) -> Result<()> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(HoraceError::Terminate),
            received = self.rx.recv() => {
                received.ok_or_else(|| {
                    HoraceError::fatal("directory watcher channel closed")
                })
            },
        }
    }
}
