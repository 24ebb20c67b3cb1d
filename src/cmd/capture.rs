// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result, bail};
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::{
    cfg::{
        cli::{CaptureArgs, resolve_config_path},
        config::CaptureConfig,
    },
    crypto::{Ed25519Keypair, RecordHash},
    endpoint::make_endpoint,
    errors::HoraceError,
    models::SourceId,
    session::{EventSigner, SessionBuilder, SessionPipeline},
    utils::hostname,
};

/// Run the capture command: read events from the source endpoint and
/// stream them to the destination as one session, with periodic sync
/// checkpoints and optional hashing and signing.
pub async fn run(args: CaptureArgs, cancel: CancellationToken) -> Result<()> {
    let config = match &args.config {
        Some(path) => {
            let path = resolve_config_path(path)?;
            CaptureConfig::load_from_file(path)
                .context("failed to load capture config")?
        },
        None => CaptureConfig::default(),
    };

    let source_id = match args
        .source_id
        .as_deref()
        .or_else(|| config.source_id.as_deref())
    {
        Some(id) => SourceId::new(id)?,
        None => SourceId::new(hostname()?)?,
    };

    let hashfn = args
        .hash
        .as_deref()
        .or_else(|| config.hash.as_deref())
        .map(RecordHash::make)
        .transpose()?;

    let keypair = match args.keyfile.as_ref().or_else(|| config.keyfile.as_ref()) {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read keyfile {path:?}"))?;
            Some(Ed25519Keypair::from_keyfile(&content)?)
        },
        None => None,
    };

    let sign_delay =
        Duration::from_millis(args.sign_delay_ms.unwrap_or(config.sign_delay_ms));
    let sync_interval = Duration::from_secs(
        args.sync_interval_secs.unwrap_or(config.sync_interval_secs),
    );
    if sync_interval.is_zero() {
        bail!("sync interval must be non-zero");
    }

    // Bind the endpoints.
    let src_ep = make_endpoint(&args.source)
        .context("source endpoint is unable to capture events")?;
    let dst_ep = make_endpoint(&args.destination)
        .context("destination endpoint is unable to receive sessions")?;

    // Build the session record while binding the event reader, which
    // defines its channels and attributes through the builder.
    let mut builder = SessionBuilder::new(&source_id);
    if let Some(hashfn) = &hashfn {
        builder.define_hash(hashfn);
    }
    if let Some(keypair) = &keypair {
        builder.define_keypair(keypair);
    }
    let mut event_reader = src_ep
        .make_event_reader(&mut builder, &cancel)
        .await
        .context("source endpoint is unable to capture events")?;
    let session_writer = dst_ep
        .make_session_writer(&source_id, &cancel)
        .await
        .context("destination endpoint is unable to receive sessions")?;

    let pipeline = Arc::new(SessionPipeline::new(
        session_writer,
        hashfn,
        cancel.clone(),
    ));
    if let Some(keypair) = keypair {
        let signer = EventSigner::spawn(
            Arc::downgrade(&pipeline),
            keypair,
            sign_delay,
            cancel.clone(),
        );
        pipeline.attach_signer(signer).await;
    }

    pipeline.begin_session(&builder.build()).await?;

    let mut ticker = tokio::time::interval(sync_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await; // the zeroth tick fires immediately

    let result = loop {
        tokio::select! {
            _ = cancel.cancelled() => break Ok(()),
            _ = ticker.tick() => {
                match pipeline.sync_tick().await {
                    Ok(()) => {},
                    Err(HoraceError::Terminate) => break Ok(()),
                    Err(e) => break Err(e),
                }
            },
            rec = event_reader.read() => {
                let rec = match rec {
                    Ok(rec) => rec,
                    Err(HoraceError::Terminate) => break Ok(()),
                    Err(e) => break Err(e),
                };
                match pipeline.write_event(rec).await {
                    Ok(()) => {},
                    Err(HoraceError::Terminate) => break Ok(()),
                    Err(e) => break Err(e),
                }
            },
        }
    };

    // Close the session cleanly where reachable, even after an error.
    match pipeline.end_session().await {
        Ok(()) | Err(HoraceError::Terminate) => {},
        Err(e) => error!(error = %e, "failed to end session"),
    }

    result.map_err(Into::into)
}
