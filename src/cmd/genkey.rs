// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;

use crate::crypto::Ed25519Keypair;

/// Generate an Ed25519 keypair and print it on stdout in keyfile form.
pub fn run() -> Result<()> {
    let keypair = Ed25519Keypair::generate();
    println!("{}", keypair.to_keyfile());
    Ok(())
}
