// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Asynchronous event signing.
//!
//! Signatures are generated on a separate task so that capture is never
//! stalled while one is being computed, and so that signature records can
//! be emitted even while the capture tasks are blocked. The hand-off is a
//! single-slot mailbox: capture deposits the `(seqnum, hash)` of the most
//! recent event, overwriting any unread predecessor, and the signer signs
//! whatever is newest once the configured delay has elapsed.

use std::{sync::Weak, time::Duration};

use bytes::{BufMut, Bytes, BytesMut};
use tokio::{sync::watch, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    crypto::Ed25519Keypair,
    errors::HoraceError,
    models::{
        Attribute, AttributeList, Record,
        ids::{ATTR_SEQNUM, ATTR_SIG, CHANNEL_SIGNATURE},
    },
    session::pipeline::SessionPipeline,
};

type SignJob = (u64, Bytes);

/// The octets covered by an event signature: the sequence number as a
/// big-endian 64-bit integer followed by the event record's hash.
pub fn signature_message(seqnum: u64, hash: &[u8]) -> Bytes {
    let mut msg = BytesMut::with_capacity(8 + hash.len());
    msg.put_u64(seqnum);
    msg.extend_from_slice(hash);
    msg.freeze()
}

/// Handle for offering events to the signing task.
#[derive(Debug, Clone)]
pub struct EventSigner {
    tx: watch::Sender<Option<SignJob>>,
}

impl EventSigner {
    /// Spawn the signing task.
    ///
    /// `delay` is the interval from when an event becomes available for
    /// signing to when it (or a successor) is signed; any non-negative
    /// value is accepted.
    pub fn spawn(
        pipeline: Weak<SessionPipeline>,
        keypair: Ed25519Keypair,
        delay: Duration,
        cancel: CancellationToken,
    ) -> Self {
        let (tx, rx) = watch::channel(None);
        tokio::spawn(run(pipeline, keypair, delay, cancel, rx));
        Self { tx }
    }

    /// Offer an event for signing. Whether and when it is signed is the
    /// signer's decision; a newer offer supersedes an unsigned older one.
    pub fn offer(&self, seqnum: u64, hash: Bytes) {
        let _ = self.tx.send_replace(Some((seqnum, hash)));
    }
}

async fn run(
    pipeline: Weak<SessionPipeline>,
    keypair: Ed25519Keypair,
    delay: Duration,
    cancel: CancellationToken,
    mut rx: watch::Receiver<Option<SignJob>>,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
            },
        }

        // Sleep for the requested delay before signing; an event arriving
        // meanwhile supersedes the one that woke us.
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep(delay) => {},
        }

        let job = rx.borrow_and_update().clone();
        let Some((seqnum, hash)) = job else {
            continue;
        };

        let sig = keypair.sign(&signature_message(seqnum, &hash));
        let sigrec = Record::new(
            CHANNEL_SIGNATURE,
            AttributeList::new()
                .with(Attribute::unsigned(ATTR_SEQNUM, seqnum))
                .with(Attribute::binary(ATTR_SIG, Bytes::copy_from_slice(&sig))),
        );

        let Some(pipeline) = pipeline.upgrade() else {
            break;
        };
        match pipeline.write_signature(&sigrec).await {
            Ok(()) => {},
            Err(HoraceError::Terminate) => break,
            Err(e) => warn!(error = %e, seqnum, "failed to write signature record"),
        }
    }
}
