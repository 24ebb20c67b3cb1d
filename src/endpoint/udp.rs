// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::{
    endpoint::{Endpoint, EndpointUri, EventReader, QueryString},
    errors::{HoraceError, Result},
    models::{
        Attribute, AttributeList, Record, Timestamp,
        ids::{ATTR_TIMESTAMP, AttrFormat},
    },
    session::SessionBuilder,
};

const DEFAULT_PORT: &str = "514";
const DEFAULT_SNAPLEN: u64 = 8192;

/// A datagram capture endpoint for syslog-style log sources.
///
/// Each received datagram becomes one event record on the `log` channel.
/// A leading RFC 3164 `<priority>` prefix, when present and valid, is
/// decoded into severity and facility attributes; the remainder of the
/// datagram is the message.
pub struct UdpEndpoint {
    hostname: String,
    portname: String,
    snaplen: u64,
}

impl UdpEndpoint {
    pub fn construct(uri: &EndpointUri) -> Result<Box<dyn Endpoint>> {
        let authority = uri.authority().unwrap_or("");
        let (hostname, portname) = match authority.rsplit_once(':') {
            Some((host, port)) => (host.to_string(), port.to_string()),
            None => (authority.to_string(), DEFAULT_PORT.to_string()),
        };
        let query = QueryString::parse(uri.query().unwrap_or(""));
        let snaplen = query.get_u64("snaplen")?.unwrap_or(DEFAULT_SNAPLEN);
        if snaplen == 0 {
            return Err(HoraceError::exhausted("snaplen must be non-zero"));
        }
        Ok(Box::new(Self {
            hostname,
            portname,
            snaplen,
        }))
    }
}

#[async_trait]
impl Endpoint for UdpEndpoint {
    async fn make_event_reader(
        &self,
        builder: &mut SessionBuilder,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn EventReader>> {
        let channel = builder.define_channel("log", AttributeList::new());
        let attr_message = builder.define_attribute("message", AttrFormat::String);
        let attr_severity = builder.define_attribute("severity", AttrFormat::Unsigned);
        let attr_facility = builder.define_attribute("facility", AttrFormat::Unsigned);

        let host = if self.hostname.is_empty() {
            "0.0.0.0"
        } else {
            &self.hostname
        };
        let address = format!("{host}:{}", self.portname);
        let socket = UdpSocket::bind(&address)
            .await
            .map_err(|e| HoraceError::fatal(format!("cannot bind {address}: {e}")))?;

        Ok(Box::new(UdpEventReader {
            socket,
            buf: vec![0u8; self.snaplen as usize],
            channel,
            attr_message,
            attr_severity,
            attr_facility,
            cancel: cancel.clone(),
        }))
    }
}

/// Decode a syslog `<priority>` prefix, returning the priority value and
/// the offset of the first octet after the closing `>`.
///
/// The priority is one to three digits with no leading zero, at most
/// 191. Anything else leaves the datagram untouched.
fn parse_priority(content: &[u8]) -> Option<(u32, usize)> {
    let rest = content.strip_prefix(b"<")?;
    let end = rest.iter().position(|&b| b == b'>')?;
    let digits = &rest[..end];
    if digits.is_empty() || digits.len() > 3 {
        return None;
    }
    if !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    if digits.len() > 1 && digits[0] == b'0' {
        return None;
    }
    let priority: u32 = std::str::from_utf8(digits).ok()?.parse().ok()?;
    if priority > 191 {
        return None;
    }
    Some((priority, end + 2))
}

pub struct UdpEventReader {
    socket: UdpSocket,
    buf: Vec<u8>,
    channel: i64,
    attr_message: i64,
    attr_severity: i64,
    attr_facility: i64,
    cancel: CancellationToken,
}

#[async_trait]
impl EventReader for UdpEventReader {
    async fn read(&mut self) -> Result<Record> {
        let (len, _peer) = tokio::select! {
            _ = self.cancel.cancelled() => return Err(HoraceError::Terminate),
            received = self.socket.recv_from(&mut self.buf) => received?,
        };
        let content = &self.buf[..len];

        let mut attrs = AttributeList::new()
            .with(Attribute::timestamp(ATTR_TIMESTAMP, Timestamp::now()));
        let message = match parse_priority(content) {
            Some((priority, offset)) => {
                attrs.insert(Attribute::unsigned(
                    self.attr_severity,
                    u64::from(priority & 7),
                ));
                attrs.insert(Attribute::unsigned(
                    self.attr_facility,
                    u64::from(priority >> 3),
                ));
                &content[offset..]
            },
            None => content,
        };
        // Datagrams are not guaranteed to be valid UTF-8; substitution
        // is preferable to dropping the message.
        attrs.insert(Attribute::string(
            self.attr_message,
            String::from_utf8_lossy(message),
        ));
        Ok(Record::new(self.channel, attrs))
    }
}
