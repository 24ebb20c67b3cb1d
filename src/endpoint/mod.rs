// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Endpoint abstraction.
//!
//! An endpoint is named by a URI-like string; its scheme selects a
//! constructor from a static registry, and the capability set it offers
//! is expressed through the `make_*` constructors below. Asking an
//! endpoint for a capability it does not implement yields a clear
//! `Unsupported` error rather than a partially-working object.

pub mod clock;
pub mod file;
pub mod null;
pub mod query;
pub mod tcp;
pub mod udp;
pub mod uri;

use std::collections::HashMap;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use tokio_util::sync::CancellationToken;

pub use query::QueryString;
pub use uri::EndpointUri;

use crate::{
    errors::{HoraceError, Result},
    models::{Record, SourceId},
    session::SessionBuilder,
};

/// Reads newly-observed events from a local capture source.
#[async_trait]
pub trait EventReader: Send {
    /// Read the next event record, blocking until one is available.
    async fn read(&mut self) -> Result<Record>;
}

/// Accepts the records of one session stream for a single source ID.
#[async_trait]
pub trait SessionWriter: Send {
    async fn write(&mut self, rec: &Record) -> Result<()>;

    /// Read a reply record (an ack in response to a sync).
    async fn read(&mut self) -> Result<Record>;

    /// Whether the endpoint is currently able to accept data.
    fn writable(&self) -> bool {
        true
    }
}

/// Reads the records of one session stream, with an ack back-channel.
#[async_trait]
pub trait SessionReader: Send {
    async fn read(&mut self) -> Result<Record>;

    /// Send a reply record (an ack) back towards the source.
    async fn write(&mut self, rec: &Record) -> Result<()>;

    /// Rewind to the last checkpoint after a downstream failure.
    /// Returns false if this reader cannot rewind.
    async fn reset(&mut self) -> bool {
        false
    }
}

/// Yields one session reader per source that presents itself.
#[async_trait]
pub trait SessionListener: Send {
    async fn accept(&mut self) -> Result<Box<dyn SessionReader>>;
}

/// A named endpoint with a scheme-determined capability set.
#[async_trait]
pub trait Endpoint: Send + Sync {
    async fn make_event_reader(
        &self,
        _builder: &mut SessionBuilder,
        _cancel: &CancellationToken,
    ) -> Result<Box<dyn EventReader>> {
        Err(HoraceError::Unsupported("event capture"))
    }

    async fn make_session_writer(
        &self,
        _source_id: &SourceId,
        _cancel: &CancellationToken,
    ) -> Result<Box<dyn SessionWriter>> {
        Err(HoraceError::Unsupported("session writing"))
    }

    async fn make_session_reader(
        &self,
        _source_id: &SourceId,
        _cancel: &CancellationToken,
    ) -> Result<Box<dyn SessionReader>> {
        Err(HoraceError::Unsupported("session reading"))
    }

    async fn make_session_listener(
        &self,
        _cancel: &CancellationToken,
    ) -> Result<Box<dyn SessionListener>> {
        Err(HoraceError::Unsupported("session listening"))
    }
}

type EndpointConstructor = fn(&EndpointUri) -> Result<Box<dyn Endpoint>>;

static REGISTRY: Lazy<HashMap<&'static str, EndpointConstructor>> = Lazy::new(|| {
    let mut map: HashMap<&'static str, EndpointConstructor> = HashMap::new();
    map.insert("horace+file", file::FileEndpoint::construct);
    map.insert("file", file::FileEndpoint::construct);
    map.insert("horace+tcp", tcp::TcpEndpoint::construct);
    map.insert("tcp", tcp::TcpEndpoint::construct);
    map.insert("udp", udp::UdpEndpoint::construct);
    map.insert("clock", clock::ClockEndpoint::construct);
    map.insert("null", null::NullEndpoint::construct);
    map
});

/// Make an endpoint from its URI-like name.
pub fn make_endpoint(name: &str) -> Result<Box<dyn Endpoint>> {
    let uri = EndpointUri::parse(name);
    let scheme = uri
        .scheme()
        .ok_or_else(|| HoraceError::fatal(format!("missing endpoint scheme: {name}")))?;
    let construct = REGISTRY.get(scheme).ok_or_else(|| {
        HoraceError::fatal(format!("unrecognised endpoint scheme {scheme}"))
    })?;
    construct(&uri)
}
