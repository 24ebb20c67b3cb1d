// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use horace::{
    models::{
        Attribute, AttributeList,
        ids::{
            ATTR_CHANNEL_LABEL, ATTR_CHANNEL_NUM, ATTR_CODE, ATTR_DEF, ATTR_FORMAT,
            ATTR_LABEL, ATTR_SEQNUM, ATTR_SOURCE, AttrFormat,
        },
    },
    session::SessionContext,
};

fn attr_def(code: u64, label: &str, format: AttrFormat) -> AttributeList {
    AttributeList::new()
        .with(Attribute::unsigned(ATTR_CODE, code))
        .with(Attribute::string(ATTR_LABEL, label))
        .with(Attribute::unsigned(ATTR_FORMAT, format.code()))
}

#[test]
fn test_reserved_entries() {
    let ctx = SessionContext::new();
    assert_eq!(ctx.attr_label(ATTR_SOURCE).expect("lookup failed"), "source");
    assert_eq!(
        ctx.attr_format(ATTR_SEQNUM).expect("lookup failed"),
        AttrFormat::Unsigned
    );
    assert_eq!(
        ctx.attr_format(ATTR_DEF).expect("lookup failed"),
        AttrFormat::Compound
    );
}

#[test]
fn test_unknown_lookups_fail() {
    let ctx = SessionContext::new();
    assert!(ctx.attr_label(42).is_err());
    assert!(ctx.require_attr_format(42).is_err());
    assert!(ctx.channel_label(0).is_err());
    assert!(ctx.attr_format(42).is_none());
}

#[test]
fn test_handle_attr_def() {
    let mut ctx = SessionContext::new();
    ctx.handle_attr_def(&attr_def(0, "payload", AttrFormat::Binary))
        .expect("attr def failed");
    assert_eq!(ctx.attr_label(0).expect("lookup failed"), "payload");
    assert_eq!(
        ctx.attr_format(0).expect("lookup failed"),
        AttrFormat::Binary
    );

    // Redefinition of a user ID is append-only but permitted.
    ctx.handle_attr_def(&attr_def(0, "payload2", AttrFormat::String))
        .expect("attr def failed");
    assert_eq!(ctx.attr_label(0).expect("lookup failed"), "payload2");
}

#[test]
fn test_attr_def_requires_all_fields() {
    let mut ctx = SessionContext::new();
    let incomplete = AttributeList::new()
        .with(Attribute::unsigned(ATTR_CODE, 0))
        .with(Attribute::string(ATTR_LABEL, "payload"));
    assert!(ctx.handle_attr_def(&incomplete).is_err());
}

#[test]
fn test_attr_def_rejects_bad_format_code() {
    let mut ctx = SessionContext::new();
    let def = AttributeList::new()
        .with(Attribute::unsigned(ATTR_CODE, 0))
        .with(Attribute::string(ATTR_LABEL, "payload"))
        .with(Attribute::unsigned(ATTR_FORMAT, 99));
    assert!(ctx.handle_attr_def(&def).is_err());
}

#[test]
fn test_handle_channel_def() {
    let mut ctx = SessionContext::new();
    let def = AttributeList::new()
        .with(Attribute::signed(ATTR_CHANNEL_NUM, 0))
        .with(Attribute::string(ATTR_CHANNEL_LABEL, "packet"));
    ctx.handle_channel_def(&def).expect("channel def failed");
    assert_eq!(ctx.channel_label(0).expect("lookup failed"), "packet");
}

#[test]
fn test_channel_def_rejects_reserved_channel() {
    let mut ctx = SessionContext::new();
    let def = AttributeList::new()
        .with(Attribute::signed(ATTR_CHANNEL_NUM, -2))
        .with(Attribute::string(ATTR_CHANNEL_LABEL, "bogus"));
    assert!(ctx.handle_channel_def(&def).is_err());
}
