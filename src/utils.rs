// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Context, Result};

/// The local hostname, used as the default source ID.
pub fn hostname() -> Result<String> {
    let name = nix::unistd::gethostname().context("cannot determine hostname")?;
    Ok(name.to_string_lossy().into_owned())
}
