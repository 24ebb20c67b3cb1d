// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, Offset};
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

const DEFAULT_POLL_SECS: u64 = 3600;

/// A clock-state capture endpoint.
///
/// Emits one event on the `clock` channel every `poll` seconds (default
/// 3600), recording the wall-clock reading and the local timezone's
/// offset from UTC at that moment.
pub struct ClockEndpoint {
    poll: Duration,
}

impl ClockEndpoint {
    pub fn construct(uri: &EndpointUri) -> Result<Box<dyn Endpoint>> {
        let query = QueryString::parse(uri.query().unwrap_or(""));
        let poll = query.get_u64("poll")?.unwrap_or(DEFAULT_POLL_SECS);
        if poll == 0 {
            return Err(HoraceError::fatal("poll interval must be non-zero"));
        }
        Ok(Box::new(Self {
            poll: Duration::from_secs(poll),
        }))
    }
}

#[async_trait]
impl Endpoint for ClockEndpoint {
    async fn make_event_reader(
        &self,
        builder: &mut SessionBuilder,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn EventReader>> {
        let channel = builder.define_channel("clock", AttributeList::new());
        let attr_utc_offset =
            builder.define_attribute("utc-offset", AttrFormat::Signed);
        Ok(Box::new(ClockEventReader {
            poll: self.poll,
            channel,
            attr_utc_offset,
            first: true,
            cancel: cancel.clone(),
        }))
    }
}

pub struct ClockEventReader {
    poll: Duration,
    channel: i64,
    attr_utc_offset: i64,
    first: bool,
    cancel: CancellationToken,
}

#[async_trait]
impl EventReader for ClockEventReader {
    async fn read(&mut self) -> Result<Record> {
        if self.first {
            // The first reading is taken immediately so a short-lived
            // session still records the clock state.
            self.first = false;
        } else {
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(HoraceError::Terminate),
                _ = tokio::time::sleep(self.poll) => {},
            }
        }

        let utc_offset = Local::now().offset().fix().local_minus_utc();
        let attrs = AttributeList::new()
            .with(Attribute::timestamp(ATTR_TIMESTAMP, Timestamp::now()))
            .with(Attribute::signed(
                self.attr_utc_offset,
                i64::from(utc_offset),
            ));
        Ok(Record::new(self.channel, attrs))
    }
}
