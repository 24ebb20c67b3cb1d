// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

fn default_sign_delay_ms() -> u64 {
    250
}

fn default_sync_interval_secs() -> u64 {
    60
}

/// Capture configuration, loadable from a YAML file.
///
/// Command-line flags override anything given here. The signer delay
/// accepts any non-negative value; 250 ms is the default, chosen so that
/// a burst of events usually collapses into one signature.
#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    #[serde(default)]
    pub source_id: Option<String>,

    /// Hash algorithm for the event hash chain (sha256 or sha512).
    #[serde(default)]
    pub hash: Option<String>,

    /// Keyfile for event signing.
    #[serde(default)]
    pub keyfile: Option<PathBuf>,

    #[serde(default = "default_sign_delay_ms")]
    pub sign_delay_ms: u64,

    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source_id: None,
            hash: None,
            keyfile: None,
            sign_delay_ms: default_sign_delay_ms(),
            sync_interval_secs: default_sync_interval_secs(),
        }
    }
}

impl CaptureConfig {
    pub fn load_from_file(path: PathBuf) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {path:?}"))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {path:?}"))
    }
}
