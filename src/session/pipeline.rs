// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The capture-side session state machine.
//!
//! ```text
//!   Idle ──begin_session──► Streaming
//!   Streaming ──write_event──► Streaming   (seqnum += 1)
//!   Streaming ──sync_tick──► AwaitAck ──matching ack──► Streaming
//!   AwaitAck ──mismatched ack──► Error
//!   Streaming ──end_session──► Idle
//! ```
//!
//! The pipeline is entered concurrently from every capture task, so the
//! whole of the mutable state sits behind one mutex: sequence numbers,
//! the hash attribute carried into the next event, and the signer
//! hand-off are updated atomically with the write. AwaitAck is never
//! observed from outside; the ack exchange completes under the same lock
//! that emitted the sync.

use std::time::Duration;

use tokio::{sync::Mutex, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    crypto::RecordHash,
    endpoint::SessionWriter,
    errors::{HoraceError, Result},
    models::{
        Attribute, AttributeList, Record, Timestamp,
        ids::{
            ATTR_END, ATTR_HASH, ATTR_SEQNUM, ATTR_TIMESTAMP, CHANNEL_ACK,
            CHANNEL_SESSION, CHANNEL_SYNC,
        },
    },
    session::signer::EventSigner,
};

const MAX_WRITE_RETRIES: u32 = 8;
const RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    Idle,
    Streaming,
    Error,
}

struct Inner {
    state: PipelineState,
    writer: Box<dyn SessionWriter>,
    srec: Option<Record>,
    session_ts: Option<Timestamp>,
    seqnum: u64,
    hashfn: Option<RecordHash>,
    hash_attr: Option<Attribute>,
    signer: Option<EventSigner>,
}

/// Writes one source's sessions to a destination session writer.
pub struct SessionPipeline {
    cancel: CancellationToken,
    inner: Mutex<Inner>,
}

impl SessionPipeline {
    pub fn new(
        writer: Box<dyn SessionWriter>,
        hashfn: Option<RecordHash>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            cancel,
            inner: Mutex::new(Inner {
                state: PipelineState::Idle,
                writer,
                srec: None,
                session_ts: None,
                seqnum: 0,
                hashfn,
                hash_attr: None,
                signer: None,
            }),
        }
    }

    /// Attach an event signer. Must be called before the session begins.
    pub async fn attach_signer(&self, signer: EventSigner) {
        self.inner.lock().await.signer = Some(signer);
    }

    /// Whether the destination is currently able to accept data.
    pub async fn writable(&self) -> bool {
        self.inner.lock().await.writer.writable()
    }

    /// Begin a session by writing its session record.
    ///
    /// At most one session may be in progress per source; beginning a
    /// session in any other state is out of order.
    pub async fn begin_session(&self, srec: &Record) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state != PipelineState::Idle {
            return Err(HoraceError::protocol("out-of-order session start"));
        }
        self.write_with_retry(&mut inner, srec).await?;
        info!(
            source = srec.source_id().unwrap_or("?"),
            "session started"
        );
        inner.session_ts = srec.timestamp().ok();
        inner.srec = Some(srec.clone());
        inner.seqnum = 0;
        inner.hash_attr = None;
        inner.state = PipelineState::Streaming;
        Ok(())
    }

    /// Write one event record.
    ///
    /// The record is augmented with the next sequence number and, when
    /// hashing is enabled, the hash of the previously emitted event
    /// record; the augmented encoding is then itself hashed for the next
    /// event and offered to the signer.
    pub async fn write_event(&self, rec: Record) -> Result<()> {
        if !rec.is_event() {
            return Err(HoraceError::protocol(
                "non-event record submitted as event",
            ));
        }
        let mut inner = self.inner.lock().await;
        let inner = &mut *inner;
        if inner.state != PipelineState::Streaming {
            return Err(HoraceError::protocol("event written outside a session"));
        }

        let channel = rec.channel();
        let mut attrs = rec.into_attributes();
        attrs.insert(Attribute::unsigned(ATTR_SEQNUM, inner.seqnum));
        if let Some(hash_attr) = inner.hash_attr.take() {
            attrs.insert(hash_attr);
        }
        let nrec = Record::new(channel, attrs);

        self.write_with_retry(inner, &nrec).await?;

        let seqnum = inner.seqnum;
        if let Some(hashfn) = inner.hashfn.as_mut() {
            let digest = hashfn.digest(&nrec.to_bytes());
            inner.hash_attr = Some(Attribute::binary(ATTR_HASH, digest.clone()));
            if let Some(signer) = &inner.signer {
                signer.offer(seqnum, digest);
            }
        }

        // Not incremented earlier: the value is needed for signing.
        inner.seqnum += 1;
        Ok(())
    }

    /// Write a signature record produced by the event signer.
    pub async fn write_signature(&self, sigrec: &Record) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state != PipelineState::Streaming {
            // The session ended while the signature was being prepared.
            return Ok(());
        }
        self.write_with_retry(&mut inner, sigrec).await
    }

    /// Emit a sync checkpoint and wait for the matching ack.
    ///
    /// The sync carries the session timestamp and the sequence number of
    /// the most recent event. An ack carrying anything else aborts the
    /// session.
    pub async fn sync_tick(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state != PipelineState::Streaming || inner.seqnum == 0 {
            return Ok(());
        }
        let Some(session_ts) = inner.session_ts else {
            return Ok(());
        };
        let last_seqnum = inner.seqnum - 1;

        let sync = Record::new(
            CHANNEL_SYNC,
            AttributeList::new()
                .with(Attribute::timestamp(ATTR_TIMESTAMP, session_ts))
                .with(Attribute::unsigned(ATTR_SEQNUM, last_seqnum)),
        );
        self.write_with_retry(&mut inner, &sync).await?;

        let ack = tokio::select! {
            _ = self.cancel.cancelled() => return Err(HoraceError::Terminate),
            ack = inner.writer.read() => ack?,
        };
        if ack.channel() != CHANNEL_ACK {
            inner.state = PipelineState::Error;
            return Err(HoraceError::protocol("expected acknowledgement record"));
        }
        let ack_ts = ack.timestamp()?;
        let ack_seqnum = ack.attributes().find_one(ATTR_SEQNUM)?.as_unsigned()?;
        if ack_ts != session_ts || ack_seqnum != last_seqnum {
            inner.state = PipelineState::Error;
            return Err(HoraceError::protocol(
                "acknowledgement record does not match sync record",
            ));
        }
        debug!(seqnum = last_seqnum, "sync acknowledged");
        Ok(())
    }

    /// End the session, re-emitting the session record with an `end`
    /// compound carrying the final timestamp, sequence number and hash.
    pub async fn end_session(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            PipelineState::Idle => return Ok(()),
            PipelineState::Error => {
                inner.state = PipelineState::Idle;
                return Ok(());
            },
            PipelineState::Streaming => {},
        }

        let Some(srec) = inner.srec.take() else {
            inner.state = PipelineState::Idle;
            return Ok(());
        };

        let mut end_attrs = AttributeList::new()
            .with(Attribute::timestamp(ATTR_TIMESTAMP, Timestamp::now()))
            .with(Attribute::unsigned(ATTR_SEQNUM, inner.seqnum));
        if let Some(hash_attr) = inner.hash_attr.take() {
            end_attrs.insert(hash_attr);
        }

        let mut attrs = srec.into_attributes();
        attrs.insert(Attribute::compound(ATTR_END, end_attrs));
        let erec = Record::new(CHANNEL_SESSION, attrs);

        self.write_with_retry(&mut inner, &erec).await?;
        info!(seqnum = inner.seqnum, "session ended");
        inner.state = PipelineState::Idle;
        inner.session_ts = None;
        Ok(())
    }

    /// Write a record with retry on transient failures.
    ///
    /// Retries that make no progress convert to a fatal endpoint error.
    /// After each successful write the destination's writable state is
    /// checked; capture cannot currently be suspended, so a non-writable
    /// destination terminates the process via the cancellation token.
    async fn write_with_retry(&self, inner: &mut Inner, rec: &Record) -> Result<()> {
        let mut attempts = 0;
        loop {
            match inner.writer.write(rec).await {
                Ok(()) => break,
                Err(HoraceError::Terminate) => return Err(HoraceError::Terminate),
                Err(e) if e.is_transient() => {
                    attempts += 1;
                    if attempts > MAX_WRITE_RETRIES {
                        return Err(HoraceError::fatal(format!(
                            "write failed after {MAX_WRITE_RETRIES} retries: {e}"
                        )));
                    }
                    warn!(error = %e, "error during capture (will retry)");
                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            return Err(HoraceError::Terminate);
                        },
                        _ = sleep(RETRY_DELAY) => {},
                    }
                },
                Err(e) => return Err(e),
            }
        }

        if !inner.writer.writable() {
            // Data capture should be suspended while the destination is
            // not able to accept it, but there is no mechanism for that
            // yet, so the process terminates instead.
            warn!("endpoint not ready to receive data; terminating capture");
            self.cancel.cancel();
            return Err(HoraceError::Terminate);
        }
        Ok(())
    }
}
