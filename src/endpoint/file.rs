// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::PathBuf;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    endpoint::{
        Endpoint, EndpointUri, QueryString, SessionListener, SessionReader,
        SessionWriter,
    },
    errors::{HoraceError, Result},
    models::SourceId,
    spool::{
        DEFAULT_FILESIZE, FileSessionListener, FileSessionReader, FileSessionWriter,
        session_writer::FreeSpaceMarks,
    },
};

fn parse_percent(value: &str, name: &str) -> Result<f64> {
    let digits = value.strip_suffix('%').ok_or_else(|| {
        HoraceError::fatal(format!("{name} does not specify a percentage threshold"))
    })?;
    let percent: f64 = digits.parse().map_err(|_| {
        HoraceError::fatal(format!("{name} does not specify a percentage threshold"))
    })?;
    if !(0.0..=100.0).contains(&percent) {
        return Err(HoraceError::fatal(format!("{name} outside range 0-100%")));
    }
    Ok(percent / 100.0)
}

/// A filestore endpoint: one subdirectory of capped spoolfiles per
/// source ID.
///
/// Options: `filesize` (spoolfile capacity budget, default 16 MiB),
/// `nodelete` (retain spoolfiles after ack), `hwm`/`lwm` (free-space
/// hysteresis thresholds as percentages).
pub struct FileEndpoint {
    pathname: PathBuf,
    filesize: u64,
    nodelete: bool,
    space: Option<FreeSpaceMarks>,
}

impl FileEndpoint {
    pub fn construct(uri: &EndpointUri) -> Result<Box<dyn Endpoint>> {
        let query = QueryString::parse(uri.query().unwrap_or(""));
        let filesize = query.get_u64("filesize")?.unwrap_or(DEFAULT_FILESIZE);
        let nodelete = query.get_bool("nodelete")?.unwrap_or(false);
        let space = match (query.get("hwm"), query.get("lwm")) {
            (None, None) => None,
            (Some(hwm), Some(lwm)) => {
                let hwm = parse_percent(hwm, "hwm")?;
                let lwm = parse_percent(lwm, "lwm")?;
                if lwm > hwm {
                    return Err(HoraceError::fatal("lwm exceeds hwm"));
                }
                Some(FreeSpaceMarks { hwm, lwm })
            },
            _ => {
                return Err(HoraceError::fatal(
                    "hwm and lwm must be specified together",
                ));
            },
        };
        if uri.path().is_empty() {
            return Err(HoraceError::fatal("filestore pathname not specified"));
        }
        Ok(Box::new(Self {
            pathname: PathBuf::from(uri.path()),
            filesize,
            nodelete,
            space,
        }))
    }
}

#[async_trait]
impl Endpoint for FileEndpoint {
    async fn make_session_writer(
        &self,
        source_id: &SourceId,
        _cancel: &CancellationToken,
    ) -> Result<Box<dyn SessionWriter>> {
        let writer = FileSessionWriter::new(
            self.pathname.clone(),
            source_id,
            self.filesize,
            self.space,
        )
        .await?;
        Ok(Box::new(writer))
    }

    async fn make_session_reader(
        &self,
        source_id: &SourceId,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn SessionReader>> {
        let reader = FileSessionReader::new(
            self.pathname.clone(),
            source_id,
            self.nodelete,
            cancel.clone(),
        )
        .await?;
        Ok(Box::new(reader))
    }

    async fn make_session_listener(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn SessionListener>> {
        let listener = FileSessionListener::new(
            self.pathname.clone(),
            self.nodelete,
            cancel.clone(),
        )
        .await?;
        Ok(Box::new(listener))
    }
}
