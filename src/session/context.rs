// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::collections::HashMap;

use crate::{
    errors::{HoraceError, Result},
    models::{
        AttributeList, Record,
        ids::{
            ATTR_CHANNEL_DEF, ATTR_CHANNEL_LABEL, ATTR_CHANNEL_NUM, ATTR_CODE,
            ATTR_DEF, ATTR_END, ATTR_FORMAT, ATTR_HASH, ATTR_HASH_ALG, ATTR_LABEL,
            ATTR_SEQNUM, ATTR_SIG, ATTR_SIG_ALG, ATTR_SIG_PUBKEY, ATTR_SOURCE,
            ATTR_TIMESTAMP, AttrFormat,
        },
    },
};

/// The live dictionaries of a session: attribute ID to (label, format)
/// and channel number to label.
///
/// This is the only place attribute IDs are given meaning. It is seeded
/// with the reserved entries and extended, append-only, by the
/// attribute and channel definitions carried in session records.
#[derive(Debug, Clone)]
pub struct SessionContext {
    attr_labels: HashMap<i64, String>,
    attr_formats: HashMap<i64, AttrFormat>,
    chan_labels: HashMap<i64, String>,
}

const RESERVED: &[(i64, &str, AttrFormat)] = &[
    (ATTR_DEF, "attributes", AttrFormat::Compound),
    (ATTR_CODE, "code", AttrFormat::Unsigned),
    (ATTR_LABEL, "label", AttrFormat::String),
    (ATTR_FORMAT, "format", AttrFormat::Unsigned),
    (ATTR_CHANNEL_DEF, "channels", AttrFormat::Compound),
    (ATTR_CHANNEL_NUM, "channel", AttrFormat::Signed),
    (ATTR_CHANNEL_LABEL, "label", AttrFormat::String),
    (ATTR_SOURCE, "source", AttrFormat::String),
    (ATTR_TIMESTAMP, "timestamp", AttrFormat::Timestamp),
    (ATTR_SEQNUM, "seqnum", AttrFormat::Unsigned),
    (ATTR_HASH, "hash", AttrFormat::Binary),
    (ATTR_SIG, "sig", AttrFormat::Binary),
    (ATTR_END, "end", AttrFormat::Compound),
    (ATTR_HASH_ALG, "hash-alg", AttrFormat::String),
    (ATTR_SIG_ALG, "sig-alg", AttrFormat::String),
    (ATTR_SIG_PUBKEY, "sig-pubkey", AttrFormat::Binary),
];

impl Default for SessionContext {
    fn default() -> Self {
        let mut attr_labels = HashMap::with_capacity(RESERVED.len());
        let mut attr_formats = HashMap::with_capacity(RESERVED.len());
        for &(id, label, format) in RESERVED {
            attr_labels.insert(id, label.to_string());
            attr_formats.insert(id, format);
        }
        Self {
            attr_labels,
            attr_formats,
            chan_labels: HashMap::new(),
        }
    }
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The declared format of an attribute ID, if known.
    pub fn attr_format(&self, attrid: i64) -> Option<AttrFormat> {
        self.attr_formats.get(&attrid).copied()
    }

    /// The label of an attribute ID; unknown IDs are an error.
    pub fn attr_label(&self, attrid: i64) -> Result<&str> {
        self.attr_labels
            .get(&attrid)
            .map(String::as_str)
            .ok_or_else(|| {
                HoraceError::malformed(format!("unrecognised attribute ID {attrid}"))
            })
    }

    /// The format of an attribute ID; unknown IDs are an error.
    pub fn require_attr_format(&self, attrid: i64) -> Result<AttrFormat> {
        self.attr_format(attrid).ok_or_else(|| {
            HoraceError::malformed(format!("unrecognised attribute ID {attrid}"))
        })
    }

    /// The label of an event channel; unknown channels are an error.
    pub fn channel_label(&self, channel: i64) -> Result<&str> {
        self.chan_labels
            .get(&channel)
            .map(String::as_str)
            .ok_or_else(|| {
                HoraceError::malformed(format!("unrecognised channel number {channel}"))
            })
    }

    /// Ingest one attribute definition: a compound of (code, label,
    /// format) sub-attributes.
    pub fn handle_attr_def(&mut self, def: &AttributeList) -> Result<()> {
        let code = def.find_one(ATTR_CODE)?.as_unsigned()?;
        let code = i64::try_from(code).map_err(|_| {
            HoraceError::malformed(format!("attribute code {code} out of range"))
        })?;
        if code < 0 {
            return Err(HoraceError::protocol(format!(
                "attempt to redefine reserved attribute ID {code}"
            )));
        }
        let label = def.find_one(ATTR_LABEL)?.as_str()?;
        let format =
            AttrFormat::from_code(def.find_one(ATTR_FORMAT)?.as_unsigned()?)?;
        self.attr_labels.insert(code, label.to_string());
        self.attr_formats.insert(code, format);
        Ok(())
    }

    /// Ingest one channel definition: a compound of (channel, label)
    /// sub-attributes, possibly with further descriptive attributes.
    pub fn handle_channel_def(&mut self, def: &AttributeList) -> Result<()> {
        let channel = def.find_one(ATTR_CHANNEL_NUM)?.as_signed()?;
        if channel < 0 {
            return Err(HoraceError::protocol(format!(
                "attempt to define reserved channel {channel}"
            )));
        }
        let label = def.find_one(ATTR_CHANNEL_LABEL)?.as_str()?;
        self.chan_labels.insert(channel, label.to_string());
        Ok(())
    }

    /// Ingest every attribute and channel definition carried in a
    /// session record.
    pub fn absorb_session_record(&mut self, rec: &Record) -> Result<()> {
        for attr in rec.attributes().find_all(ATTR_DEF) {
            self.handle_attr_def(attr.as_compound()?)?;
        }
        for attr in rec.attributes().find_all(ATTR_CHANNEL_DEF) {
            self.handle_channel_def(attr.as_compound()?)?;
        }
        Ok(())
    }
}
