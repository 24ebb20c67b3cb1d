// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use horace::{
    endpoint::{SessionReader, SessionWriter},
    errors::{HoraceError, Result},
    models::{
        Attribute, AttributeList, Record, SourceId, Timestamp,
        ids::{ATTR_SEQNUM, CHANNEL_ACK, CHANNEL_SYNC},
    },
    session::SessionBuilder,
};

pub fn source_id(id: &str) -> SourceId {
    SourceId::new(id).expect("bad source id")
}

pub fn timestamp(sec: u64) -> Timestamp {
    Timestamp::new(sec, 0).expect("bad timestamp")
}

/// A session builder with one string payload attribute and one event
/// channel, as a capture source would produce.
pub fn payload_session(
    srcid: &SourceId,
    ts: Timestamp,
) -> (SessionBuilder, i64, i64) {
    let mut sb = SessionBuilder::with_timestamp(srcid, ts);
    let payload = sb.define_attribute(
        "payload",
        horace::models::ids::AttrFormat::String,
    );
    let channel = sb.define_channel("events", AttributeList::new());
    (sb, payload, channel)
}

/// An event record as the pipeline would emit it: payload plus explicit
/// seqnum attribute.
pub fn numbered_event(
    channel: i64,
    payload_attr: i64,
    seqnum: u64,
    payload: &str,
) -> Record {
    Record::new(
        channel,
        AttributeList::new()
            .with(Attribute::unsigned(ATTR_SEQNUM, seqnum))
            .with(Attribute::string(payload_attr, payload)),
    )
}

/// A session writer collecting everything it is given, acking syncs.
pub struct CollectWriter {
    pub records: Arc<Mutex<Vec<Record>>>,
    reply: Option<Record>,
    /// When set, acks carry this seqnum instead of the sync's.
    pub ack_seqnum_override: Option<u64>,
}

impl CollectWriter {
    pub fn new() -> (Self, Arc<Mutex<Vec<Record>>>) {
        let records = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                records: Arc::clone(&records),
                reply: None,
                ack_seqnum_override: None,
            },
            records,
        )
    }
}

#[async_trait]
impl SessionWriter for CollectWriter {
    async fn write(&mut self, rec: &Record) -> Result<()> {
        self.records
            .lock()
            .expect("records lock poisoned")
            .push(rec.clone());
        if rec.channel() == CHANNEL_SYNC {
            let mut attrs = rec.attributes().clone();
            if let Some(seqnum) = self.ack_seqnum_override {
                let ts = rec.timestamp().expect("sync without timestamp");
                attrs = AttributeList::new()
                    .with(Attribute::timestamp(
                        horace::models::ids::ATTR_TIMESTAMP,
                        ts,
                    ))
                    .with(Attribute::unsigned(ATTR_SEQNUM, seqnum));
            }
            self.reply = Some(Record::new(CHANNEL_ACK, attrs));
        }
        Ok(())
    }

    async fn read(&mut self) -> Result<Record> {
        self.reply
            .take()
            .ok_or_else(|| HoraceError::protocol("no reply record available"))
    }
}

/// A session reader yielding a fixed sequence of records, collecting
/// acks written back to it.
pub struct VecReader {
    records: VecDeque<Record>,
    pub acks: Vec<Record>,
}

impl VecReader {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: records.into(),
            acks: Vec::new(),
        }
    }
}

#[async_trait]
impl SessionReader for VecReader {
    async fn read(&mut self) -> Result<Record> {
        self.records.pop_front().ok_or(HoraceError::EndOfStream)
    }

    async fn write(&mut self, rec: &Record) -> Result<()> {
        self.acks.push(rec.clone());
        Ok(())
    }
}
