// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use clap::error::ErrorKind;
use horace::{
    cfg::{
        cli::{Cli, Command},
        logger::init_logger,
    },
    cmd,
};
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    ExitCode::SUCCESS
                },
                _ => ExitCode::from(1),
            };
        },
    };

    let verbosity = match &cli.command {
        Command::Capture(args) => args.verbose,
        Command::Forward(args) => args.verbose,
        Command::Genkey => 0,
    };
    let logger_config = std::env::var_os("HORACE_LOG_CONFIG").map(PathBuf::from);
    let _logger_guard = match init_logger(logger_config.as_deref(), verbosity) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{e:#}");
            return ExitCode::from(1);
        },
    };

    // Process-wide termination flag: a terminating signal cancels the
    // token and every blocking operation unwinds cooperatively.
    let cancel = CancellationToken::new();
    match terminate_on_signal(cancel.clone()) {
        Ok(()) => {},
        Err(e) => {
            error!(error = %e, "cannot install signal handlers");
            return ExitCode::from(1);
        },
    }

    let result = match cli.command {
        Command::Capture(args) => cmd::capture::run(args, cancel.clone()).await,
        Command::Forward(args) => cmd::forward::run(args, cancel.clone()).await,
        Command::Genkey => cmd::genkey::run(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = format!("{e:#}"), "exiting on error");
            ExitCode::from(1)
        },
    }
}

fn terminate_on_signal(cancel: CancellationToken) -> anyhow::Result<()> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut quit = signal(SignalKind::quit())?;
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::spawn(async move {
        tokio::select! {
            _ = interrupt.recv() => {},
            _ = quit.recv() => {},
            _ = terminate.recv() => {},
        }
        info!("terminating on signal");
        cancel.cancel();
    });
    Ok(())
}
