// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::{
    TcpListener, TcpStream,
    tcp::{OwnedReadHalf, OwnedWriteHalf},
};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    codec::{OctetReader, OctetWriter},
    endpoint::{
        Endpoint, EndpointUri, QueryString, SessionListener, SessionReader,
        SessionWriter,
    },
    errors::{HoraceError, Result},
    models::{
        Record, SourceId,
        ids::{CHANNEL_ACK, CHANNEL_ERROR, CHANNEL_SYNC},
    },
    session::SessionContext,
};

const DEFAULT_PORT: &str = "40960";
const DEFAULT_RETRY_SECS: u64 = 10;

/// A TCP transport endpoint.
///
/// As a destination it yields a session writer that connects lazily and
/// reconnects with retry; as a source it yields a session listener that
/// accepts one session reader per inbound connection. The `diode` option
/// disables the ack back-channel: syncs are not transmitted and acks are
/// synthesised locally, for use across one-way links.
pub struct TcpEndpoint {
    hostname: String,
    portname: String,
    retry: Duration,
    diode: bool,
}

impl TcpEndpoint {
    pub fn construct(uri: &EndpointUri) -> Result<Box<dyn Endpoint>> {
        let authority = uri.authority().unwrap_or("");
        let (hostname, portname) = match authority.rsplit_once(':') {
            Some((host, port)) => (host.to_string(), port.to_string()),
            None => (authority.to_string(), DEFAULT_PORT.to_string()),
        };
        let query = QueryString::parse(uri.query().unwrap_or(""));
        let retry = query.get_u64("retry")?.unwrap_or(DEFAULT_RETRY_SECS);
        let diode = query.get_bool("diode")?.unwrap_or(false);
        Ok(Box::new(Self {
            hostname,
            portname,
            retry: Duration::from_secs(retry),
            diode,
        }))
    }

    fn address(&self) -> String {
        let host = if self.hostname.is_empty() {
            "0.0.0.0"
        } else {
            &self.hostname
        };
        format!("{host}:{}", self.portname)
    }
}

#[async_trait]
impl Endpoint for TcpEndpoint {
    async fn make_session_writer(
        &self,
        _source_id: &SourceId,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn SessionWriter>> {
        Ok(Box::new(TcpSessionWriter {
            address: self.address(),
            retry: self.retry,
            diode: self.diode,
            cancel: cancel.clone(),
            conn: None,
            reply: None,
            ctx: SessionContext::new(),
        }))
    }

    async fn make_session_listener(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn SessionListener>> {
        let listener = TcpListener::bind(self.address()).await.map_err(|e| {
            HoraceError::fatal(format!("cannot bind {}: {e}", self.address()))
        })?;
        Ok(Box::new(TcpSessionListener {
            listener,
            cancel: cancel.clone(),
        }))
    }
}

struct Conn {
    reader: OctetReader<OwnedReadHalf>,
    writer: OctetWriter<OwnedWriteHalf>,
}

/// Writes one session stream over a TCP connection.
pub struct TcpSessionWriter {
    address: String,
    retry: Duration,
    diode: bool,
    cancel: CancellationToken,
    conn: Option<Conn>,
    reply: Option<Record>,
    ctx: SessionContext,
}

impl TcpSessionWriter {
    /// Connect if not already connected, retrying until successful.
    ///
    /// A fresh connection attempt is made before each retry so that
    /// recovery is responsive to changes in the remote's availability.
    async fn ensure_open(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        let mut logged = false;
        loop {
            match TcpStream::connect(&self.address).await {
                Ok(stream) => {
                    let _ = stream.set_nodelay(true);
                    let (r, w) = stream.into_split();
                    self.conn = Some(Conn {
                        reader: OctetReader::new(r),
                        writer: OctetWriter::new(w),
                    });
                    info!(address = %self.address, "connection established");
                    return Ok(());
                },
                Err(e) => {
                    if !logged {
                        warn!(
                            address = %self.address,
                            error = %e,
                            "failed to establish connection (will retry)"
                        );
                        logged = true;
                    }
                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            return Err(HoraceError::Terminate);
                        },
                        _ = tokio::time::sleep(self.retry) => {},
                    }
                },
            }
        }
    }

    async fn send(&mut self, rec: &Record, flush: bool) -> Result<()> {
        self.ensure_open().await?;
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| HoraceError::transient("connection unavailable"))?;
        let encoded = rec.to_bytes();
        let result = async {
            conn.writer.write(&encoded).await?;
            if flush {
                conn.writer.flush().await?;
            }
            Ok(())
        }
        .await;
        if result.is_err() {
            // The connection is broken; reconnect on the next attempt.
            self.conn = None;
        }
        result
    }
}

#[async_trait]
impl SessionWriter for TcpSessionWriter {
    async fn write(&mut self, rec: &Record) -> Result<()> {
        match rec.channel() {
            CHANNEL_SYNC if self.diode => {
                // No back-channel: acknowledge locally without
                // transmitting the sync.
                self.reply = Some(Record::new(CHANNEL_ACK, rec.attributes().clone()));
                Ok(())
            },
            CHANNEL_SYNC => self.send(rec, true).await,
            _ => self.send(rec, rec.is_session()).await,
        }
    }

    async fn read(&mut self) -> Result<Record> {
        if self.diode {
            return self
                .reply
                .take()
                .ok_or_else(|| HoraceError::protocol("no reply record available"));
        }
        self.ensure_open().await?;
        let cancel = self.cancel.clone();
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| HoraceError::transient("connection unavailable"))?;
        conn.writer.flush().await?;
        let result = tokio::select! {
            _ = cancel.cancelled() => Err(HoraceError::Terminate),
            rec = Record::read(&mut conn.reader, &self.ctx) => rec,
        };
        match result {
            Ok(rec) => Ok(rec),
            Err(HoraceError::EndOfStream) => {
                self.conn = None;
                Err(HoraceError::transient("connection closed by remote"))
            },
            Err(e) => {
                if e.is_transient() {
                    self.conn = None;
                }
                Err(e)
            },
        }
    }
}

/// Accepts one session reader per inbound TCP connection.
pub struct TcpSessionListener {
    listener: TcpListener,
    cancel: CancellationToken,
}

#[async_trait]
impl SessionListener for TcpSessionListener {
    async fn accept(&mut self) -> Result<Box<dyn SessionReader>> {
        let (stream, peer) = tokio::select! {
            _ = self.cancel.cancelled() => return Err(HoraceError::Terminate),
            accepted = self.listener.accept() => accepted?,
        };
        info!(%peer, "accepted connection");
        let _ = stream.set_nodelay(true);
        let (r, w) = stream.into_split();
        Ok(Box::new(TcpSessionReader {
            reader: OctetReader::new(r),
            writer: OctetWriter::new(w),
            ctx: SessionContext::new(),
            cancel: self.cancel.clone(),
        }))
    }
}

/// Reads one session stream from an accepted TCP connection.
pub struct TcpSessionReader {
    reader: OctetReader<OwnedReadHalf>,
    writer: OctetWriter<OwnedWriteHalf>,
    ctx: SessionContext,
    cancel: CancellationToken,
}

#[async_trait]
impl SessionReader for TcpSessionReader {
    async fn read(&mut self) -> Result<Record> {
        let rec = tokio::select! {
            _ = self.cancel.cancelled() => return Err(HoraceError::Terminate),
            rec = Record::read(&mut self.reader, &self.ctx) => rec?,
        };
        if rec.is_session() {
            self.ctx.absorb_session_record(&rec)?;
        }
        Ok(rec)
    }

    async fn write(&mut self, rec: &Record) -> Result<()> {
        let encoded = rec.to_bytes();
        self.writer.write(&encoded).await?;
        self.writer.flush().await?;

        if rec.channel() == CHANNEL_ERROR {
            // Refuse further input, then drain whatever is in flight so
            // the remote sees the error record before the reset.
            let _ = self.writer.get_mut().shutdown().await;
            loop {
                match Record::read(&mut self.reader, &self.ctx).await {
                    Ok(_) => {},
                    Err(HoraceError::Terminate) => {
                        return Err(HoraceError::Terminate);
                    },
                    Err(_) => break,
                }
            }
        }
        Ok(())
    }
}
