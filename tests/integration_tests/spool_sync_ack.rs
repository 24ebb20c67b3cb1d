// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use horace::{
    crypto::RecordHash,
    endpoint::SessionReader,
    models::{
        Attribute, AttributeList, Record,
        ids::{ATTR_HASH, ATTR_SEQNUM, CHANNEL_ACK, CHANNEL_SYNC},
    },
    session::SessionPipeline,
    spool::{FileSessionReader, FileSessionWriter},
};
use serial_test::serial;
use tokio_util::sync::CancellationToken;

use crate::integration_tests::common::{payload_session, source_id, timestamp};

/// Sync and ack with hashing enabled: the reader checkpoints the first
/// spoolfile with a sync carrying the last event's seqnum, and deletes
/// it only once the matching ack arrives. Every event after the first
/// carries the hash of its predecessor's on-wire encoding.
#[tokio::test]
#[serial]
async fn test_sync_ack_and_hash_chain() {
    let dir = tempfile::TempDir::new().expect("cannot create temp dir");
    let root = dir.path().to_path_buf();
    let cancel = CancellationToken::new();
    let srcid = source_id("h1");
    let session_ts = timestamp(1_700_000_000);

    // First session: five hashed events, a sync checkpoint, session end.
    let (mut sb, payload, channel) = payload_session(&srcid, session_ts);
    let hashfn = RecordHash::make("sha256").expect("bad algorithm");
    sb.define_hash(&hashfn);
    let srec = sb.build();

    let writer = FileSessionWriter::new(root.clone(), &srcid, 4096, None)
        .await
        .expect("cannot open session writer");
    let pipeline = Arc::new(SessionPipeline::new(
        Box::new(writer),
        Some(hashfn),
        cancel.clone(),
    ));
    pipeline
        .begin_session(&srec)
        .await
        .expect("begin session failed");
    for k in 0..5 {
        let rec = Record::new(
            channel,
            AttributeList::new()
                .with(Attribute::string(payload, format!("event {k}"))),
        );
        pipeline.write_event(rec).await.expect("write event failed");
    }
    pipeline.sync_tick().await.expect("sync failed");
    pipeline.end_session().await.expect("end session failed");

    // Second session: opens the successor spoolfile the reader needs in
    // order to conclude that the first one is complete.
    let (sb2, _, _) = payload_session(&srcid, timestamp(1_700_000_100));
    let srec2 = sb2.build();
    pipeline
        .begin_session(&srec2)
        .await
        .expect("begin session failed");

    // Read the first session back.
    let mut reader = FileSessionReader::new(root.clone(), &srcid, false, cancel)
        .await
        .expect("cannot open session reader");
    let first = reader.read().await.expect("read failed");
    assert_eq!(first.to_bytes(), srec.to_bytes());

    let mut events = Vec::new();
    let sync = loop {
        let rec = reader.read().await.expect("read failed");
        if rec.channel() == CHANNEL_SYNC {
            break rec;
        }
        if rec.is_event() {
            events.push(rec);
        }
    };
    assert_eq!(events.len(), 5);

    // The synthetic sync covers events 0..4.
    assert_eq!(sync.timestamp().expect("sync without timestamp"), session_ts);
    assert_eq!(
        sync.attributes()
            .find_one(ATTR_SEQNUM)
            .expect("sync without seqnum")
            .as_unsigned()
            .expect("wrong type"),
        4
    );

    // Hash-chain integrity: each event after the first carries the
    // SHA-256 of the previous event's on-wire encoding.
    assert!(!events[0].attributes().contains(ATTR_HASH));
    let mut hashfn = RecordHash::make("sha256").expect("bad algorithm");
    for k in 1..events.len() {
        let expected = hashfn.digest(&events[k - 1].to_bytes());
        let carried = events[k]
            .attributes()
            .find_one(ATTR_HASH)
            .expect("event without hash")
            .as_binary()
            .expect("wrong type")
            .clone();
        assert_eq!(carried, expected, "hash mismatch at event {k}");
    }

    // The spoolfile is deleted only after the matching ack.
    let spoolfile = root.join(srcid.as_str()).join("000000");
    assert!(spoolfile.exists());
    let ack = Record::new(CHANNEL_ACK, sync.attributes().clone());
    reader.write(&ack).await.expect("ack failed");
    assert!(!spoolfile.exists());

    // The reader continues into the second session.
    let next = reader.read().await.expect("read failed");
    assert_eq!(next.to_bytes(), srec2.to_bytes());
}
