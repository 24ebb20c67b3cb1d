// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::fmt;

use bytes::{Bytes, BytesMut};

use crate::{
    codec::{OctetReader, RawRead, varint},
    errors::{HoraceError, Result},
    models::{
        AttributeList, Timestamp,
        ids::{
            ATTR_END, ATTR_SEQNUM, ATTR_SOURCE, ATTR_TIMESTAMP, CHANNEL_ACK,
            CHANNEL_ERROR, CHANNEL_SESSION, CHANNEL_SESSION_END, CHANNEL_SIGNATURE,
            CHANNEL_SYNC,
        },
    },
    session::SessionContext,
};

/// A channel-tagged attribute list, framed on the wire as
/// `channel ‖ length ‖ attribute-list`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    channel: i64,
    attributes: AttributeList,
}

impl Record {
    pub fn new(channel: i64, attributes: AttributeList) -> Self {
        Self {
            channel,
            attributes,
        }
    }

    pub fn channel(&self) -> i64 {
        self.channel
    }

    pub fn attributes(&self) -> &AttributeList {
        &self.attributes
    }

    pub fn into_attributes(self) -> AttributeList {
        self.attributes
    }

    /// A record is an event iff its channel is non-negative.
    pub fn is_event(&self) -> bool {
        self.channel >= 0
    }

    pub fn is_session(&self) -> bool {
        self.channel == CHANNEL_SESSION
    }

    /// True for a session record carrying the end-of-session marker.
    pub fn is_session_end(&self) -> bool {
        self.is_session() && self.attributes.contains(ATTR_END)
    }

    /// For an event record carrying a seqnum attribute, that attribute's
    /// value; otherwise the expected value. Lets a forwarder realign after
    /// a gap without committing to a new numbering.
    pub fn update_seqnum(&self, seqnum: u64) -> u64 {
        if self.is_event() {
            for attr in self.attributes.find_all(ATTR_SEQNUM) {
                if let Ok(value) = attr.as_unsigned() {
                    return value;
                }
            }
        }
        seqnum
    }

    /// The source ID attribute of a session record.
    pub fn source_id(&self) -> Result<&str> {
        self.attributes.find_one(ATTR_SOURCE)?.as_str()
    }

    /// The timestamp attribute of a session or control record.
    pub fn timestamp(&self) -> Result<Timestamp> {
        self.attributes.find_one(ATTR_TIMESTAMP)?.as_timestamp()
    }

    /// Whether two session records identify the same session
    /// (same source ID, same start timestamp).
    pub fn same_session(&self, other: &Record) -> bool {
        match (
            self.source_id(),
            other.source_id(),
            self.timestamp(),
            other.timestamp(),
        ) {
            (Ok(a), Ok(b), Ok(ta), Ok(tb)) => a == b && ta == tb,
            _ => false,
        }
    }

    /// The length of the record content (the attribute list), in octets.
    pub fn content_length(&self) -> u64 {
        self.attributes.wire_length()
    }

    /// The full framed length, including channel and length prefix.
    pub fn wire_length(&self) -> u64 {
        let content_len = self.content_length();
        varint::signed_base128_length(self.channel) as u64
            + varint::unsigned_base128_length(content_len) as u64
            + content_len
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        varint::put_signed_base128(buf, self.channel);
        varint::put_unsigned_base128(buf, self.content_length());
        self.attributes.encode(buf);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_length() as usize);
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Read one framed record.
    ///
    /// `EndOfStream` is returned only when the stream ends exactly on a
    /// record boundary; anywhere inside the frame it is malformed input.
    /// The attribute list is parsed from exactly the declared number of
    /// octets, so a malformed attribute can never consume past the frame.
    pub async fn read<R: RawRead>(
        reader: &mut OctetReader<R>,
        ctx: &SessionContext,
    ) -> Result<Self> {
        let channel = reader.read_signed_base128().await?;
        let in_frame = |e| match e {
            HoraceError::EndOfStream => {
                HoraceError::malformed(crate::errors::TRUNCATED_FRAME)
            },
            other => other,
        };
        let length = reader.read_unsigned_base128().await.map_err(in_frame)?;
        let content = reader
            .read_exact(length as usize)
            .await
            .map_err(in_frame)?;
        let attributes = AttributeList::parse(ctx, content)?;
        Ok(Self {
            channel,
            attributes,
        })
    }

    /// The display name of this record's channel.
    pub fn channel_name(&self) -> String {
        match self.channel {
            CHANNEL_ERROR => "error".to_string(),
            CHANNEL_SESSION => "session".to_string(),
            CHANNEL_SESSION_END => "end".to_string(),
            CHANNEL_SYNC => "sync".to_string(),
            CHANNEL_ACK => "ack".to_string(),
            CHANNEL_SIGNATURE => "signature".to_string(),
            n => format!("rec{n}"),
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.channel_name(), self.attributes)
    }
}
