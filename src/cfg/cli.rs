// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "horace",
    version,
    about = "Capture-and-forward pipeline for host-observation telemetry"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Capture events from a source endpoint into a destination endpoint
    Capture(CaptureArgs),
    /// Forward sessions from a listener endpoint to a writer endpoint
    Forward(ForwardArgs),
    /// Generate an Ed25519 signing keypair on stdout
    Genkey,
}

#[derive(Debug, Args)]
pub struct CaptureArgs {
    /// Optional YAML capture configuration file
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Source ID (defaults to the hostname)
    #[arg(short = 's', long = "source-id")]
    pub source_id: Option<String>,

    /// Hash algorithm for the event hash chain (sha256 or sha512)
    #[arg(short = 'H', long = "hash")]
    pub hash: Option<String>,

    /// Keyfile for event signing, as produced by `horace genkey`
    #[arg(short = 'k', long = "keyfile")]
    pub keyfile: Option<PathBuf>,

    /// Delay in milliseconds before signing an offered event
    #[arg(short = 'D', long = "sign-delay")]
    pub sign_delay_ms: Option<u64>,

    /// Interval in seconds between sync checkpoints
    #[arg(short = 'y', long = "sync-interval")]
    pub sync_interval_secs: Option<u64>,

    /// Increase verbosity of log messages
    #[arg(short = 'v', action = ArgAction::Count)]
    pub verbose: u8,

    /// Source endpoint (event reader)
    pub source: String,

    /// Destination endpoint (session writer)
    pub destination: String,
}

#[derive(Debug, Args)]
pub struct ForwardArgs {
    /// Increase verbosity of log messages
    #[arg(short = 'v', action = ArgAction::Count)]
    pub verbose: u8,

    /// Source endpoint (session listener)
    pub source: String,

    /// Destination endpoint (session writer)
    pub destination: String,
}

/// Resolve a possibly-relative configuration path against the current
/// working directory.
pub fn resolve_config_path(rel: &Path) -> Result<PathBuf> {
    let abs = if rel.is_absolute() {
        rel.to_path_buf()
    } else {
        std::env::current_dir()
            .context("cannot get current working dir")?
            .join(rel)
    };

    let canon = abs
        .canonicalize()
        .with_context(|| format!("failed to canonicalize path {abs:?}"))?;

    Ok(canon)
}
