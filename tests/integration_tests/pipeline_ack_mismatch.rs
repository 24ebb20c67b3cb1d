// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use horace::{
    errors::HoraceError,
    models::{Attribute, AttributeList, Record},
    session::SessionPipeline,
};
use tokio_util::sync::CancellationToken;

use crate::integration_tests::common::{
    CollectWriter, payload_session, source_id, timestamp,
};

/// An ack that does not match the outstanding sync is fatal to the
/// session, but sibling sessions continue.
#[tokio::test]
async fn test_ack_mismatch_is_fatal_to_session_only() {
    let cancel = CancellationToken::new();
    let srcid = source_id("h1");
    let (sb, payload, channel) = payload_session(&srcid, timestamp(1_700_000_000));
    let srec = sb.build();

    // The destination acknowledges seqnum 6 instead of 7.
    let (mut writer, _records) = CollectWriter::new();
    writer.ack_seqnum_override = Some(6);
    let pipeline = SessionPipeline::new(Box::new(writer), None, cancel.clone());
    pipeline
        .begin_session(&srec)
        .await
        .expect("begin session failed");
    for k in 0..8 {
        let rec = Record::new(
            channel,
            AttributeList::new()
                .with(Attribute::string(payload, format!("event {k}"))),
        );
        pipeline.write_event(rec).await.expect("write event failed");
    }

    let err = pipeline.sync_tick().await.expect_err("sync should fail");
    assert!(matches!(err, HoraceError::Protocol(_)));

    // The session is dead: further events are refused.
    let rec = Record::new(
        channel,
        AttributeList::new().with(Attribute::string(payload, "too late")),
    );
    assert!(pipeline.write_event(rec).await.is_err());

    // A sibling session on its own pipeline is unaffected.
    let sibling_src = source_id("h2");
    let (sb2, payload2, channel2) =
        payload_session(&sibling_src, timestamp(1_700_000_000));
    let (writer2, records2) = CollectWriter::new();
    let sibling = Arc::new(SessionPipeline::new(Box::new(writer2), None, cancel));
    sibling
        .begin_session(&sb2.build())
        .await
        .expect("begin session failed");
    let rec = Record::new(
        channel2,
        AttributeList::new().with(Attribute::string(payload2, "still fine")),
    );
    sibling.write_event(rec).await.expect("write event failed");
    sibling.sync_tick().await.expect("sync failed");
    sibling.end_session().await.expect("end session failed");

    let records2 = records2.lock().expect("records lock poisoned");
    // Session record, one event, sync, end record.
    assert_eq!(records2.len(), 4);
}
