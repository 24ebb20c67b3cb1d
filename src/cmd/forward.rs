// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use anyhow::{Context, Result};
use dashmap::DashMap;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    cfg::cli::ForwardArgs,
    endpoint::{Endpoint, SessionReader, SessionWriter, make_endpoint},
    errors::HoraceError,
    models::{
        Record, SourceId,
        ids::{CHANNEL_SESSION, CHANNEL_SYNC},
    },
};

/// Run the forward command: accept session streams from the source
/// endpoint and relay them to the destination, one task per source.
pub async fn run(args: ForwardArgs, cancel: CancellationToken) -> Result<()> {
    let src_ep = make_endpoint(&args.source)
        .context("source endpoint is unable to supply sessions")?;
    let dst_ep: Arc<Box<dyn Endpoint>> = Arc::new(
        make_endpoint(&args.destination)
            .context("destination endpoint is unable to receive sessions")?,
    );

    let mut listener = src_ep
        .make_session_listener(&cancel)
        .await
        .context("source endpoint is unable to supply sessions")?;

    // Source IDs currently being forwarded, for duplicate detection.
    let active: Arc<DashMap<String, ()>> = Arc::new(DashMap::new());
    let mut tasks = JoinSet::new();

    loop {
        let reader = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(reader) => reader,
                Err(HoraceError::Terminate) => break,
                Err(e) => return Err(e.into()),
            },
        };
        let dst_ep = Arc::clone(&dst_ep);
        let active = Arc::clone(&active);
        let cancel = cancel.clone();
        tasks.spawn(async move {
            forward_one_with_retry(reader, dst_ep, active, cancel).await;
        });
    }

    // Let per-source tasks notice the cancellation and unwind.
    while tasks.join_next().await.is_some() {}
    Ok(())
}

/// Forward one source's records, retrying from the last checkpoint when
/// the reader supports reset.
async fn forward_one_with_retry(
    mut reader: Box<dyn SessionReader>,
    dst_ep: Arc<Box<dyn Endpoint>>,
    active: Arc<DashMap<String, ()>>,
    cancel: CancellationToken,
) {
    loop {
        match forward_one(reader.as_mut(), &dst_ep, &active, &cancel).await {
            Ok(()) | Err(HoraceError::Terminate) => break,
            Err(e) if e.is_transient() => {
                let retry = reader.reset().await;
                if retry {
                    warn!(error = %e, "error during forwarding (will retry)");
                } else {
                    error!(error = %e, "error during forwarding");
                    break;
                }
            },
            Err(e) => {
                error!(error = %e, "error during forwarding");
                break;
            },
        }
    }
}

/// Forward one source's records until the stream ends.
///
/// Transient destination failures surface to the caller for retry; a
/// protocol violation is fatal to this session only.
async fn forward_one(
    reader: &mut dyn SessionReader,
    dst_ep: &Arc<Box<dyn Endpoint>>,
    active: &Arc<DashMap<String, ()>>,
    cancel: &CancellationToken,
) -> Result<(), HoraceError> {
    // The stream must open with a session record; its source ID selects
    // the destination session writer.
    let srec = reader.read().await?;
    if srec.channel() != CHANNEL_SESSION {
        return Err(HoraceError::protocol("start of session record expected"));
    }
    let source_id = SourceId::new(srec.source_id()?)?;

    if active.insert(source_id.to_string(), ()).is_some() {
        warn!(source = %source_id, "source is already being forwarded");
    }
    let mut writer: Box<dyn SessionWriter> =
        dst_ep.make_session_writer(&source_id, cancel).await?;
    let result = forward_session(reader, writer.as_mut(), &source_id, srec).await;
    active.remove(source_id.as_str());
    result
}

/// Relay one session stream from a reader to a writer, starting with its
/// session record.
pub async fn forward_session(
    reader: &mut dyn SessionReader,
    writer: &mut dyn SessionWriter,
    source_id: &SourceId,
    srec: Record,
) -> Result<(), HoraceError> {
    writer.write(&srec).await?;
    info!(source = %source_id, "session opened");

    let mut current_seqnum: u64 = 0;
    let mut expected_seqnum: u64 = 0;
    let mut initial_seqnum = true;

    let result = loop {
        let rec = match reader.read().await {
            Ok(rec) => rec,
            Err(HoraceError::EndOfStream) => break Ok(()),
            Err(e) => break Err(e),
        };

        // Update the sequence number, logging any discontinuity; the
        // observed numbering is adopted and forwarding continues.
        current_seqnum = rec.update_seqnum(current_seqnum);
        if initial_seqnum {
            if rec.is_event() {
                info!(source = %source_id, seqnum = current_seqnum,
                    "forwarding from seqnum");
                initial_seqnum = false;
            }
        } else if rec.is_event() && current_seqnum != expected_seqnum {
            warn!(
                source = %source_id,
                expected = expected_seqnum,
                observed = current_seqnum,
                "seqnum discontinuity"
            );
        }

        if let Err(e) = writer.write(&rec).await {
            break Err(e);
        }

        match rec.channel() {
            CHANNEL_SESSION => {
                current_seqnum = 0;
                expected_seqnum = 0;
                initial_seqnum = true;
            },
            CHANNEL_SYNC => {
                // Sync records must be acknowledged: relay the
                // destination's ack back to the source.
                let ack = match writer.read().await {
                    Ok(ack) => ack,
                    Err(e) => break Err(e),
                };
                if let Err(e) = reader.write(&ack).await {
                    break Err(e);
                }
            },
            _ if rec.is_event() => {
                current_seqnum += 1;
                expected_seqnum = current_seqnum;
            },
            _ => {},
        }
    };

    info!(source = %source_id, "session closed");
    result
}
