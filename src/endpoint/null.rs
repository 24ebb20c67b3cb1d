// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    endpoint::{Endpoint, EndpointUri, SessionWriter},
    errors::{HoraceError, Result},
    models::{
        Record, SourceId,
        ids::{CHANNEL_ACK, CHANNEL_SYNC},
    },
};

/// A session writer that discards everything it is given.
///
/// Syncs are acknowledged immediately, so a pipeline pointed at this
/// endpoint behaves normally while persisting nothing. Useful for
/// testing capture sources.
pub struct NullEndpoint;

impl NullEndpoint {
    pub fn construct(_uri: &EndpointUri) -> Result<Box<dyn Endpoint>> {
        Ok(Box::new(Self))
    }
}

#[async_trait]
impl Endpoint for NullEndpoint {
    async fn make_session_writer(
        &self,
        _source_id: &SourceId,
        _cancel: &CancellationToken,
    ) -> Result<Box<dyn SessionWriter>> {
        Ok(Box::new(NullSessionWriter { reply: None }))
    }
}

pub struct NullSessionWriter {
    reply: Option<Record>,
}

#[async_trait]
impl SessionWriter for NullSessionWriter {
    async fn write(&mut self, rec: &Record) -> Result<()> {
        if rec.channel() == CHANNEL_SYNC {
            self.reply = Some(Record::new(CHANNEL_ACK, rec.attributes().clone()));
        }
        Ok(())
    }

    async fn read(&mut self) -> Result<Record> {
        self.reply
            .take()
            .ok_or_else(|| HoraceError::protocol("no reply record available"))
    }
}
