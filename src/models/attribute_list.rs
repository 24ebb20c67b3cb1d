// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::fmt;

use bytes::{Buf, Bytes, BytesMut};

use crate::{
    codec::varint,
    errors::{HoraceError, Result},
    models::attribute::{Attribute, WireAttribute},
    session::SessionContext,
};

/// The canonical ordering key for an attribute ID.
///
/// Reserved (negative) IDs sort before user-defined IDs; within each group
/// the ordering is by ascending absolute value. Attributes with the same ID
/// keep their insertion order.
fn canonical_key(attrid: i64) -> (bool, u64) {
    (attrid >= 0, attrid.unsigned_abs())
}

/// An ordered, canonicalised sequence of attributes.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AttributeList {
    attributes: Vec<Attribute>,
}

impl AttributeList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter()
    }

    /// Insert an attribute at the position required by canonical order.
    pub fn insert(&mut self, attr: Attribute) -> &mut Self {
        let key = canonical_key(attr.attrid());
        let at = self
            .attributes
            .partition_point(|a| canonical_key(a.attrid()) <= key);
        self.attributes.insert(at, attr);
        self
    }

    /// Builder-style insert.
    pub fn with(mut self, attr: Attribute) -> Self {
        self.insert(attr);
        self
    }

    pub fn contains(&self, attrid: i64) -> bool {
        self.attributes.iter().any(|a| a.attrid() == attrid)
    }

    /// Find the single attribute with the given ID.
    ///
    /// It is a protocol violation for no attribute to match, or for more
    /// than one to match.
    pub fn find_one(&self, attrid: i64) -> Result<&Attribute> {
        let mut found = None;
        for attr in &self.attributes {
            if attr.attrid() == attrid {
                if found.is_some() {
                    return Err(HoraceError::protocol(format!(
                        "unexpected multiple attributes (ID={attrid})"
                    )));
                }
                found = Some(attr);
            }
        }
        found.ok_or_else(|| {
            HoraceError::protocol(format!("expected attribute (ID={attrid})"))
        })
    }

    /// All attributes with the given ID, in order.
    pub fn find_all(&self, attrid: i64) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter().filter(move |a| a.attrid() == attrid)
    }

    /// True if this list is a positional prefix of `other`.
    pub fn is_prefix_of(&self, other: &AttributeList) -> bool {
        self.attributes.len() <= other.attributes.len()
            && self
                .attributes
                .iter()
                .zip(other.attributes.iter())
                .all(|(a, b)| a == b)
    }

    /// The length of the encoded attribute sequence, in octets.
    pub fn wire_length(&self) -> u64 {
        self.attributes.iter().map(Attribute::wire_length).sum()
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        for attr in &self.attributes {
            attr.encode(buf);
        }
    }

    /// Parse an attribute sequence occupying exactly the given buffer.
    pub fn parse(ctx: &SessionContext, mut content: Bytes) -> Result<Self> {
        let mut list = Self::new();
        while content.has_remaining() {
            let attrid = varint::get_signed_base128(&mut content)?;
            let length = varint::get_unsigned_base128(&mut content)?;
            if length > content.remaining() as u64 {
                return Err(HoraceError::malformed(
                    "attribute extends beyond length of record",
                ));
            }
            let attr_content = content.split_to(length as usize);
            list.insert(Attribute::parse(ctx, attrid, attr_content)?);
        }
        Ok(list)
    }
}

impl FromIterator<Attribute> for AttributeList {
    fn from_iter<T: IntoIterator<Item = Attribute>>(iter: T) -> Self {
        let mut list = Self::new();
        for attr in iter {
            list.insert(attr);
        }
        list
    }
}

impl fmt::Display for AttributeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for attr in &self.attributes {
            write!(f, "\n  {attr}")?;
        }
        writeln!(f, ")")
    }
}
