// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::collections::HashMap;

use bytes::Bytes;

use crate::{
    crypto::{Ed25519Keypair, RecordHash},
    errors::Result,
    models::{
        Attribute, AttributeList, Record, SourceId, Timestamp,
        ids::{
            ATTR_CHANNEL_DEF, ATTR_CHANNEL_LABEL, ATTR_CHANNEL_NUM, ATTR_CODE,
            ATTR_DEF, ATTR_FORMAT, ATTR_HASH_ALG, ATTR_LABEL, ATTR_SIG_ALG,
            ATTR_SIG_PUBKEY, ATTR_SOURCE, ATTR_TIMESTAMP, AttrFormat,
            CHANNEL_SESSION,
        },
    },
    session::SessionContext,
};

/// Accumulates the contents of a session record.
///
/// The builder owns the attribute and channel definitions it allocates;
/// callers hold only the integer IDs. User attribute IDs and channel
/// numbers are both allocated from monotonic counters starting at zero.
#[derive(Debug)]
pub struct SessionBuilder {
    attributes: AttributeList,
    attr_count: i64,
    chan_count: i64,
    defined: HashMap<(String, AttrFormat), i64>,
}

impl SessionBuilder {
    pub fn new(source_id: &SourceId) -> Self {
        Self::with_timestamp(source_id, Timestamp::now())
    }

    pub fn with_timestamp(source_id: &SourceId, started: Timestamp) -> Self {
        let attributes = AttributeList::new()
            .with(Attribute::string(ATTR_SOURCE, source_id.as_str()))
            .with(Attribute::timestamp(ATTR_TIMESTAMP, started));
        Self {
            attributes,
            attr_count: 0,
            chan_count: 0,
            defined: HashMap::new(),
        }
    }

    /// Define a user attribute, returning its allocated ID.
    ///
    /// A label and format matching a previous definition reuse that
    /// definition's ID.
    pub fn define_attribute(&mut self, label: &str, format: AttrFormat) -> i64 {
        if let Some(&id) = self.defined.get(&(label.to_string(), format)) {
            return id;
        }
        let id = self.attr_count;
        self.attr_count += 1;

        let def = AttributeList::new()
            .with(Attribute::unsigned(ATTR_CODE, id as u64))
            .with(Attribute::string(ATTR_LABEL, label))
            .with(Attribute::unsigned(ATTR_FORMAT, format.code()));
        self.attributes.insert(Attribute::compound(ATTR_DEF, def));
        self.defined.insert((label.to_string(), format), id);
        id
    }

    /// Define an event channel, returning its allocated number.
    ///
    /// Every invocation allocates a distinct channel, regardless of
    /// whether an equivalent one already exists.
    pub fn define_channel(&mut self, label: &str, extra: AttributeList) -> i64 {
        let channel = self.chan_count;
        self.chan_count += 1;

        let mut def = extra;
        def.insert(Attribute::signed(ATTR_CHANNEL_NUM, channel));
        def.insert(Attribute::string(ATTR_CHANNEL_LABEL, label));
        self.attributes
            .insert(Attribute::compound(ATTR_CHANNEL_DEF, def));
        channel
    }

    /// Record the hash algorithm used for the event hash chain.
    pub fn define_hash(&mut self, hashfn: &RecordHash) {
        self.attributes
            .insert(Attribute::string(ATTR_HASH_ALG, hashfn.algorithm()));
    }

    /// Record the signature algorithm and public key.
    pub fn define_keypair(&mut self, keypair: &Ed25519Keypair) {
        self.attributes
            .insert(Attribute::string(ATTR_SIG_ALG, keypair.algorithm()));
        self.attributes.insert(Attribute::binary(
            ATTR_SIG_PUBKEY,
            Bytes::copy_from_slice(&keypair.public_key()),
        ));
    }

    /// Build the session record.
    pub fn build(&self) -> Record {
        Record::new(CHANNEL_SESSION, self.attributes.clone())
    }

    /// A session context seeded with this builder's definitions.
    pub fn context(&self) -> Result<SessionContext> {
        let mut ctx = SessionContext::new();
        ctx.absorb_session_record(&self.build())?;
        Ok(ctx)
    }
}
