// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::{Bytes, BytesMut};
use hex_literal::hex;
use horace::{
    codec::varint,
    models::{
        Attribute, AttributeList, Timestamp, WireAttribute,
        ids::{
            ATTR_CODE, ATTR_DEF, ATTR_FORMAT, ATTR_HASH, ATTR_LABEL, ATTR_SEQNUM,
            ATTR_SOURCE, ATTR_TIMESTAMP, AttrFormat,
        },
    },
    session::SessionContext,
};

fn encode(attr: &Attribute) -> Bytes {
    let mut buf = BytesMut::new();
    attr.encode(&mut buf);
    buf.freeze()
}

/// Decode one attribute from its full wire form.
fn decode(ctx: &SessionContext, mut wire: Bytes) -> Attribute {
    let id = varint::get_signed_base128(&mut wire).expect("bad id");
    let len = varint::get_unsigned_base128(&mut wire).expect("bad length");
    assert_eq!(len as usize, wire.len());
    Attribute::parse(ctx, id, wire).expect("parse failed")
}

/// A context with one user attribute of each format.
fn user_context() -> SessionContext {
    let mut ctx = SessionContext::new();
    for (code, format) in [
        (0u64, AttrFormat::Unsigned),
        (1, AttrFormat::Signed),
        (2, AttrFormat::Binary),
        (3, AttrFormat::String),
        (4, AttrFormat::Timestamp),
        (5, AttrFormat::Boolean),
        (6, AttrFormat::Compound),
    ] {
        let def = AttributeList::new()
            .with(Attribute::unsigned(ATTR_CODE, code))
            .with(Attribute::string(ATTR_LABEL, format!("attr{code}")))
            .with(Attribute::unsigned(ATTR_FORMAT, format.code()));
        ctx.handle_attr_def(&def).expect("attr def failed");
    }
    ctx
}

#[test]
fn test_attribute_round_trips() {
    let ctx = user_context();
    let ts = Timestamp::new(1_700_000_000, 123_456_789).expect("bad timestamp");
    let compound = AttributeList::new()
        .with(Attribute::unsigned(0, 42))
        .with(Attribute::string(3, "nested"));
    let attrs = [
        Attribute::unsigned(0, 0),
        Attribute::unsigned(0, u64::MAX),
        Attribute::signed(1, -12345),
        Attribute::binary(2, Bytes::from_static(b"\x00\x01\x02")),
        Attribute::string(3, "hello"),
        Attribute::timestamp(4, ts),
        Attribute::boolean(5, true),
        Attribute::boolean(5, false),
        Attribute::compound(6, compound),
        Attribute::unsigned(ATTR_SEQNUM, 7),
        Attribute::string(ATTR_SOURCE, "h1"),
        Attribute::binary(ATTR_HASH, Bytes::from_static(&[0xaa; 32])),
    ];
    for attr in attrs {
        let decoded = decode(&ctx, encode(&attr));
        assert_eq!(decoded, attr);
    }
}

#[test]
fn test_unsigned_minimal_width() {
    // Content is the minimal big-endian width, at least one octet.
    assert_eq!(&encode(&Attribute::unsigned(0, 0))[..], hex!("00 01 00"));
    assert_eq!(&encode(&Attribute::unsigned(0, 5))[..], hex!("00 01 05"));
    assert_eq!(
        &encode(&Attribute::unsigned(0, 0x1234))[..],
        hex!("00 02 12 34")
    );
}

#[test]
fn test_timestamp_encoding() {
    // sec in minimal width, nsec always four octets.
    let ts = Timestamp::new(1, 2).expect("bad timestamp");
    let attr = Attribute::timestamp(4, ts);
    assert_eq!(attr.content_length(), 5);
    assert_eq!(&encode(&attr)[..], hex!("04 05 01 00 00 00 02"));
}

#[test]
fn test_timestamp_leap_second() {
    let ctx = user_context();
    let ts = Timestamp::new(1_700_000_000, 1_500_000_000).expect("bad timestamp");
    assert!(ts.is_leap_second());
    let attr = Attribute::timestamp(4, ts);
    assert_eq!(decode(&ctx, encode(&attr)), attr);
}

#[test]
fn test_timestamp_nsec_out_of_range() {
    assert!(Timestamp::new(0, 2_000_000_000).is_err());
    let ctx = user_context();
    // attr 4, length 8: sec 0 (4 octets), nsec 2_000_000_000.
    let wire = Bytes::from_static(&hex!("04 08 00 00 00 00 77 35 94 00"));
    let id = 4;
    let content = wire.slice(2..);
    assert!(Attribute::parse(&ctx, id, content).is_err());
}

#[test]
fn test_timestamp_bad_length() {
    let ctx = user_context();
    assert!(Attribute::parse(&ctx, 4, Bytes::from_static(&[0u8; 4])).is_err());
    assert!(Attribute::parse(&ctx, 4, Bytes::from_static(&[0u8; 13])).is_err());
}

#[test]
fn test_boolean_out_of_range() {
    let ctx = user_context();
    assert!(Attribute::parse(&ctx, 5, Bytes::from_static(&[2])).is_err());
    assert!(Attribute::parse(&ctx, 5, Bytes::from_static(&[0, 0])).is_err());
}

#[test]
fn test_unknown_id_parses_as_unrecognised() {
    let ctx = SessionContext::new();
    let content = Bytes::from_static(b"\xde\xad\xbe\xef");
    let attr = Attribute::parse(&ctx, 99, content.clone()).expect("parse failed");
    assert_eq!(attr.attrid(), 99);
    assert!(attr.format().is_none());
    // The raw content is preserved so forwarding stays byte-faithful.
    let mut buf = BytesMut::new();
    attr.encode(&mut buf);
    assert_eq!(&buf[2..], &content[..]);
}

#[test]
fn test_compound_uses_reserved_dictionary() {
    let ctx = SessionContext::new();
    let def = AttributeList::new()
        .with(Attribute::unsigned(ATTR_CODE, 3))
        .with(Attribute::string(ATTR_LABEL, "payload"))
        .with(Attribute::unsigned(ATTR_FORMAT, AttrFormat::Binary.code()));
    let attr = Attribute::compound(ATTR_DEF, def);
    let decoded = decode(&ctx, encode(&attr));
    assert_eq!(decoded, attr);
}

#[test]
fn test_canonical_order_and_equality() {
    // Reserved IDs before user IDs, ascending absolute value, insertion
    // order preserved within one ID.
    let a = AttributeList::new()
        .with(Attribute::unsigned(3, 1))
        .with(Attribute::string(ATTR_SOURCE, "h1"))
        .with(Attribute::unsigned(0, 2))
        .with(Attribute::unsigned(3, 9))
        .with(Attribute::timestamp(
            ATTR_TIMESTAMP,
            Timestamp::new(1, 0).expect("bad timestamp"),
        ));
    let b = AttributeList::new()
        .with(Attribute::timestamp(
            ATTR_TIMESTAMP,
            Timestamp::new(1, 0).expect("bad timestamp"),
        ))
        .with(Attribute::unsigned(0, 2))
        .with(Attribute::string(ATTR_SOURCE, "h1"))
        .with(Attribute::unsigned(3, 1))
        .with(Attribute::unsigned(3, 9));
    assert_eq!(a, b);

    let ids: Vec<i64> = a.iter().map(|attr| attr.attrid()).collect();
    assert_eq!(ids, vec![ATTR_SOURCE, ATTR_TIMESTAMP, 0, 3, 3]);
}

#[test]
fn test_find_one() {
    let list = AttributeList::new()
        .with(Attribute::unsigned(0, 1))
        .with(Attribute::unsigned(3, 2))
        .with(Attribute::unsigned(3, 3));
    assert_eq!(
        list.find_one(0).expect("find failed").as_unsigned().expect("wrong type"),
        1
    );
    // Missing and duplicate lookups both fail.
    assert!(list.find_one(1).is_err());
    assert!(list.find_one(3).is_err());
    assert!(list.contains(3));
    assert!(!list.contains(1));
}

#[test]
fn test_prefix_subset() {
    let short = AttributeList::new()
        .with(Attribute::unsigned(0, 1))
        .with(Attribute::unsigned(1, 2));
    let long = AttributeList::new()
        .with(Attribute::unsigned(0, 1))
        .with(Attribute::unsigned(1, 2))
        .with(Attribute::unsigned(2, 3));
    assert!(short.is_prefix_of(&long));
    assert!(!long.is_prefix_of(&short));

    let different = AttributeList::new()
        .with(Attribute::unsigned(0, 9))
        .with(Attribute::unsigned(1, 2));
    assert!(!different.is_prefix_of(&long));
}
