// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The attribute sum type.
//!
//! An attribute is a tagged value inside a record: an ID paired with
//! content in one of the seven wire formats. IDs are open-ended integers
//! which only acquire meaning through the session context, so parsing
//! dispatches on the format the context declares for the ID; an ID the
//! context does not know decodes as [`UnrecognisedAttribute`], which
//! preserves the raw content so the record can still be routed and
//! forwarded.

use std::fmt;

use bytes::{Buf, Bytes, BytesMut};
use enum_dispatch::enum_dispatch;

use crate::{
    codec::varint,
    errors::{HoraceError, Result},
    models::{AttributeList, ids::AttrFormat, timestamp::Timestamp},
    session::SessionContext,
};

/// Operations common to every attribute variant.
#[enum_dispatch]
pub trait WireAttribute {
    /// The attribute ID.
    fn attrid(&self) -> i64;

    /// The length of the content on the wire, in octets, not counting
    /// the ID and length prefix.
    fn content_length(&self) -> u64;

    /// Append the content octets to a buffer.
    fn encode_content(&self, buf: &mut BytesMut);
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnsignedAttribute {
    pub id: i64,
    pub value: u64,
}

impl WireAttribute for UnsignedAttribute {
    fn attrid(&self) -> i64 {
        self.id
    }

    fn content_length(&self) -> u64 {
        varint::unsigned_length(self.value) as u64
    }

    fn encode_content(&self, buf: &mut BytesMut) {
        varint::put_unsigned(buf, self.value, varint::unsigned_length(self.value));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignedAttribute {
    pub id: i64,
    pub value: i64,
}

impl WireAttribute for SignedAttribute {
    fn attrid(&self) -> i64 {
        self.id
    }

    fn content_length(&self) -> u64 {
        varint::signed_length(self.value) as u64
    }

    fn encode_content(&self, buf: &mut BytesMut) {
        varint::put_signed(buf, self.value, varint::signed_length(self.value));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryAttribute {
    pub id: i64,
    pub content: Bytes,
}

impl WireAttribute for BinaryAttribute {
    fn attrid(&self) -> i64 {
        self.id
    }

    fn content_length(&self) -> u64 {
        self.content.len() as u64
    }

    fn encode_content(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(&self.content);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringAttribute {
    pub id: i64,
    pub content: String,
}

impl WireAttribute for StringAttribute {
    fn attrid(&self) -> i64 {
        self.id
    }

    fn content_length(&self) -> u64 {
        self.content.len() as u64
    }

    fn encode_content(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(self.content.as_bytes());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimestampAttribute {
    pub id: i64,
    pub content: Timestamp,
}

impl WireAttribute for TimestampAttribute {
    fn attrid(&self) -> i64 {
        self.id
    }

    fn content_length(&self) -> u64 {
        varint::unsigned_length(self.content.sec()) as u64 + 4
    }

    fn encode_content(&self, buf: &mut BytesMut) {
        let sec_len = varint::unsigned_length(self.content.sec());
        varint::put_unsigned(buf, self.content.sec(), sec_len);
        varint::put_unsigned(buf, u64::from(self.content.nsec()), 4);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BooleanAttribute {
    pub id: i64,
    pub value: bool,
}

impl WireAttribute for BooleanAttribute {
    fn attrid(&self) -> i64 {
        self.id
    }

    fn content_length(&self) -> u64 {
        1
    }

    fn encode_content(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(&[u8::from(self.value)]);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompoundAttribute {
    pub id: i64,
    pub content: AttributeList,
}

impl WireAttribute for CompoundAttribute {
    fn attrid(&self) -> i64 {
        self.id
    }

    fn content_length(&self) -> u64 {
        self.content.wire_length()
    }

    fn encode_content(&self, buf: &mut BytesMut) {
        self.content.encode(buf);
    }
}

/// An attribute whose ID is not known to the active session context.
///
/// The raw content is preserved so that the attribute re-encodes
/// byte-identically when forwarded.
#[derive(Debug, Clone, PartialEq)]
pub struct UnrecognisedAttribute {
    pub id: i64,
    pub content: Bytes,
}

impl WireAttribute for UnrecognisedAttribute {
    fn attrid(&self) -> i64 {
        self.id
    }

    fn content_length(&self) -> u64 {
        self.content.len() as u64
    }

    fn encode_content(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(&self.content);
    }
}

#[enum_dispatch(WireAttribute)]
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Unsigned(UnsignedAttribute),
    Signed(SignedAttribute),
    Binary(BinaryAttribute),
    String(StringAttribute),
    Timestamp(TimestampAttribute),
    Boolean(BooleanAttribute),
    Compound(CompoundAttribute),
    Unrecognised(UnrecognisedAttribute),
}

impl Attribute {
    pub fn unsigned(id: i64, value: u64) -> Self {
        Self::Unsigned(UnsignedAttribute { id, value })
    }

    pub fn signed(id: i64, value: i64) -> Self {
        Self::Signed(SignedAttribute { id, value })
    }

    pub fn binary(id: i64, content: impl Into<Bytes>) -> Self {
        Self::Binary(BinaryAttribute {
            id,
            content: content.into(),
        })
    }

    pub fn string(id: i64, content: impl Into<String>) -> Self {
        Self::String(StringAttribute {
            id,
            content: content.into(),
        })
    }

    pub fn timestamp(id: i64, content: Timestamp) -> Self {
        Self::Timestamp(TimestampAttribute { id, content })
    }

    pub fn boolean(id: i64, value: bool) -> Self {
        Self::Boolean(BooleanAttribute { id, value })
    }

    pub fn compound(id: i64, content: AttributeList) -> Self {
        Self::Compound(CompoundAttribute { id, content })
    }

    /// The format of this attribute's concrete variant, or `None` for the
    /// unrecognised variant.
    pub fn format(&self) -> Option<AttrFormat> {
        Some(match self {
            Self::Compound(_) => AttrFormat::Compound,
            Self::Unsigned(_) => AttrFormat::Unsigned,
            Self::Binary(_) => AttrFormat::Binary,
            Self::String(_) => AttrFormat::String,
            Self::Timestamp(_) => AttrFormat::Timestamp,
            Self::Signed(_) => AttrFormat::Signed,
            Self::Boolean(_) => AttrFormat::Boolean,
            Self::Unrecognised(_) => return None,
        })
    }

    /// The length of this attribute on the wire, including the ID and
    /// length prefix.
    pub fn wire_length(&self) -> u64 {
        let content_len = self.content_length();
        varint::signed_base128_length(self.attrid()) as u64
            + varint::unsigned_base128_length(content_len) as u64
            + content_len
    }

    /// Append the full wire form: `ID ‖ length ‖ content`.
    pub fn encode(&self, buf: &mut BytesMut) {
        varint::put_signed_base128(buf, self.attrid());
        varint::put_unsigned_base128(buf, self.content_length());
        self.encode_content(buf);
    }

    pub fn as_unsigned(&self) -> Result<u64> {
        match self {
            Self::Unsigned(a) => Ok(a.value),
            _ => Err(HoraceError::protocol(format!(
                "expected unsigned integer attribute (ID={})",
                self.attrid()
            ))),
        }
    }

    pub fn as_signed(&self) -> Result<i64> {
        match self {
            Self::Signed(a) => Ok(a.value),
            _ => Err(HoraceError::protocol(format!(
                "expected signed integer attribute (ID={})",
                self.attrid()
            ))),
        }
    }

    pub fn as_binary(&self) -> Result<&Bytes> {
        match self {
            Self::Binary(a) => Ok(&a.content),
            _ => Err(HoraceError::protocol(format!(
                "expected binary attribute (ID={})",
                self.attrid()
            ))),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Self::String(a) => Ok(&a.content),
            _ => Err(HoraceError::protocol(format!(
                "expected string attribute (ID={})",
                self.attrid()
            ))),
        }
    }

    pub fn as_timestamp(&self) -> Result<Timestamp> {
        match self {
            Self::Timestamp(a) => Ok(a.content),
            _ => Err(HoraceError::protocol(format!(
                "expected timestamp attribute (ID={})",
                self.attrid()
            ))),
        }
    }

    pub fn as_boolean(&self) -> Result<bool> {
        match self {
            Self::Boolean(a) => Ok(a.value),
            _ => Err(HoraceError::protocol(format!(
                "expected boolean attribute (ID={})",
                self.attrid()
            ))),
        }
    }

    pub fn as_compound(&self) -> Result<&AttributeList> {
        match self {
            Self::Compound(a) => Ok(&a.content),
            _ => Err(HoraceError::protocol(format!(
                "expected compound attribute (ID={})",
                self.attrid()
            ))),
        }
    }

    /// Parse an attribute whose ID and content length have already been
    /// read, dispatching on the format the session context declares for
    /// the ID.
    ///
    /// `content` holds exactly the attribute's content octets.
    pub fn parse(ctx: &SessionContext, id: i64, mut content: Bytes) -> Result<Self> {
        let Some(format) = ctx.attr_format(id) else {
            return Ok(Self::Unrecognised(UnrecognisedAttribute { id, content }));
        };
        let length = content.len();
        match format {
            AttrFormat::Compound => {
                let list = AttributeList::parse(ctx, content)?;
                Ok(Self::Compound(CompoundAttribute { id, content: list }))
            },
            AttrFormat::Unsigned => {
                let value = varint::get_unsigned(&mut content, length)?;
                Ok(Self::Unsigned(UnsignedAttribute { id, value }))
            },
            AttrFormat::Signed => {
                let value = varint::get_signed(&mut content, length)?;
                Ok(Self::Signed(SignedAttribute { id, value }))
            },
            AttrFormat::Binary => Ok(Self::Binary(BinaryAttribute { id, content })),
            AttrFormat::String => {
                let text = std::str::from_utf8(&content).map_err(|_| {
                    HoraceError::malformed(format!(
                        "invalid UTF-8 in string attribute (ID={id})"
                    ))
                })?;
                Ok(Self::String(StringAttribute {
                    id,
                    content: text.to_string(),
                }))
            },
            AttrFormat::Timestamp => {
                if !(5..=12).contains(&length) {
                    return Err(HoraceError::malformed(
                        "invalid length for timestamp attribute",
                    ));
                }
                let sec = varint::get_unsigned(&mut content, length - 4)?;
                let nsec = varint::get_unsigned(&mut content, 4)?;
                let ts = Timestamp::new(sec, nsec as u32)?;
                Ok(Self::Timestamp(TimestampAttribute { id, content: ts }))
            },
            AttrFormat::Boolean => {
                if length != 1 {
                    return Err(HoraceError::malformed(
                        "invalid length for boolean attribute",
                    ));
                }
                match content.get_u8() {
                    0 => Ok(Self::Boolean(BooleanAttribute { id, value: false })),
                    1 => Ok(Self::Boolean(BooleanAttribute { id, value: true })),
                    other => Err(HoraceError::malformed(format!(
                        "invalid value {other} for boolean attribute"
                    ))),
                }
            },
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsigned(a) => write!(f, "attr{}({})", a.id, a.value),
            Self::Signed(a) => write!(f, "attr{}({})", a.id, a.value),
            Self::Binary(a) => write!(f, "attr{}({})", a.id, hex::encode(&a.content)),
            Self::String(a) => write!(f, "attr{}({})", a.id, a.content),
            Self::Timestamp(a) => write!(f, "attr{}({})", a.id, a.content),
            Self::Boolean(a) => write!(f, "attr{}({})", a.id, u8::from(a.value)),
            Self::Compound(a) => write!(f, "attr{}{}", a.id, a.content),
            Self::Unrecognised(a) => {
                write!(f, "attr{}[{}]", a.id, hex::encode(&a.content))
            },
        }
    }
}
