// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::{BufMut, Bytes, BytesMut};
use hex_literal::hex;
use horace::{
    codec::OctetReader,
    errors::HoraceError,
    models::{
        Attribute, AttributeList, Record, Timestamp,
        ids::{
            ATTR_SEQNUM, ATTR_SOURCE, ATTR_TIMESTAMP, CHANNEL_SESSION, CHANNEL_SYNC,
        },
    },
    session::SessionContext,
};

async fn parse(ctx: &SessionContext, bytes: &[u8]) -> Result<Record, HoraceError> {
    let mut reader = OctetReader::new(bytes);
    Record::read(&mut reader, ctx).await
}

fn sample_session_record() -> Record {
    Record::new(
        CHANNEL_SESSION,
        AttributeList::new()
            .with(Attribute::string(ATTR_SOURCE, "h1"))
            .with(Attribute::timestamp(
                ATTR_TIMESTAMP,
                Timestamp::new(1_700_000_000, 0).expect("bad timestamp"),
            )),
    )
}

#[tokio::test]
async fn test_record_round_trip() {
    let ctx = SessionContext::new();
    let rec = sample_session_record();
    let parsed = parse(&ctx, &rec.to_bytes()).await.expect("parse failed");
    assert_eq!(parsed, rec);
    assert_eq!(parsed.to_bytes(), rec.to_bytes());
}

#[tokio::test]
async fn test_record_framing() {
    // channel 0, declared length 3, one seqnum attribute.
    let rec = Record::new(
        0,
        AttributeList::new().with(Attribute::unsigned(ATTR_SEQNUM, 7)),
    );
    let bytes = rec.to_bytes();
    assert_eq!(&bytes[..], hex!("00 03 76 01 07"));
    assert_eq!(rec.wire_length(), bytes.len() as u64);
}

#[tokio::test]
async fn test_is_event() {
    assert!(Record::new(0, AttributeList::new()).is_event());
    assert!(Record::new(12, AttributeList::new()).is_event());
    assert!(!sample_session_record().is_event());
    assert!(!Record::new(CHANNEL_SYNC, AttributeList::new()).is_event());
}

#[tokio::test]
async fn test_update_seqnum() {
    let with_seqnum = Record::new(
        0,
        AttributeList::new().with(Attribute::unsigned(ATTR_SEQNUM, 9)),
    );
    assert_eq!(with_seqnum.update_seqnum(4), 9);

    let without_seqnum = Record::new(0, AttributeList::new());
    assert_eq!(without_seqnum.update_seqnum(4), 4);

    // Non-event records never adopt a new numbering.
    let sync = Record::new(
        CHANNEL_SYNC,
        AttributeList::new().with(Attribute::unsigned(ATTR_SEQNUM, 9)),
    );
    assert_eq!(sync.update_seqnum(4), 4);
}

#[tokio::test]
async fn test_attribute_overruns_record_length() {
    // The record declares 20 octets of attribute list, but its first
    // attribute declares 21 octets of content. The parser must reject
    // the record without consuming beyond the declared length.
    let mut buf = BytesMut::new();
    buf.put_u8(0x00); // channel 0
    buf.put_u8(20); // declared record length
    buf.put_u8(0x00); // attribute ID 0
    buf.put_u8(21); // attribute content length
    buf.put_slice(&[0u8; 18]); // remainder of the declared 20 octets
    buf.put_u8(0xee); // one trailing octet beyond the record

    let ctx = SessionContext::new();
    let mut reader = OctetReader::new(&buf[..]);
    let err = Record::read(&mut reader, &ctx)
        .await
        .expect_err("parse should fail");
    assert!(matches!(err, HoraceError::Malformed(_)));

    // The stream is positioned exactly after the bad record.
    assert_eq!(reader.read_byte().await.expect("read failed"), 0xee);
}

#[tokio::test]
async fn test_truncated_record() {
    let rec = sample_session_record();
    let bytes = rec.to_bytes();
    let ctx = SessionContext::new();
    let err = parse(&ctx, &bytes[..bytes.len() - 1])
        .await
        .expect_err("parse should fail");
    assert!(matches!(err, HoraceError::Malformed(_)));
}

#[tokio::test]
async fn test_end_of_stream_on_record_boundary() {
    let ctx = SessionContext::new();
    let err = parse(&ctx, &[]).await.expect_err("parse should fail");
    assert!(matches!(err, HoraceError::EndOfStream));
}

#[tokio::test]
async fn test_session_identity() {
    let a = sample_session_record();
    let b = sample_session_record();
    assert!(a.same_session(&b));

    let c = Record::new(
        CHANNEL_SESSION,
        AttributeList::new()
            .with(Attribute::string(ATTR_SOURCE, "h2"))
            .with(Attribute::timestamp(
                ATTR_TIMESTAMP,
                Timestamp::new(1_700_000_000, 0).expect("bad timestamp"),
            )),
    );
    assert!(!a.same_session(&c));
    assert_eq!(a.source_id().expect("missing source"), "h1");
}

#[tokio::test]
async fn test_unknown_user_attribute_forwards_byte_identically() {
    // A record carrying an attribute the context cannot interpret still
    // parses (as unrecognised) and re-encodes to the same octets.
    let rec = Record::new(
        5,
        AttributeList::new()
            .with(Attribute::binary(77, Bytes::from_static(b"opaque"))),
    );
    let ctx = SessionContext::new();
    let parsed = parse(&ctx, &rec.to_bytes()).await.expect("parse failed");
    assert_eq!(parsed.to_bytes(), rec.to_bytes());
}

#[test]
fn test_human_render() {
    let rec = Record::new(
        0,
        AttributeList::new().with(Attribute::unsigned(ATTR_SEQNUM, 3)),
    );
    let rendered = format!("{rec}");
    assert!(rendered.starts_with("rec0("));
    assert!(rendered.contains("attr-10(3)"));
    assert!(rendered.ends_with(")\n"));

    let session = sample_session_record();
    assert!(format!("{session}").starts_with("session("));
}
