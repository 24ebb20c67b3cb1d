// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The durable spool: a directory-backed, append-only, capacity-bounded,
//! lock-protected sequence of spoolfiles realising a single-source,
//! at-least-once queue with reader-driven delete-after-ack.

pub mod lockfile;
pub mod scanner;
pub mod session_listener;
pub mod session_reader;
pub mod session_writer;
pub mod spoolfile;
pub mod watcher;
pub mod writer;

pub use lockfile::Lockfile;
pub use scanner::FilestoreScan;
pub use session_listener::FileSessionListener;
pub use session_reader::FileSessionReader;
pub use session_writer::FileSessionWriter;
pub use watcher::DirectoryWatcher;
pub use writer::SpoolfileWriter;

/// Default spoolfile capacity budget, in octets.
pub const DEFAULT_FILESIZE: u64 = 16 * 1024 * 1024;

/// Default minimum filename width, in digits, for an empty store.
pub const DEFAULT_MINWIDTH: usize = 6;

/// The writer lockfile name.
pub const WRLOCK: &str = ".wrlock";

/// The reader lockfile name.
pub const RDLOCK: &str = ".rdlock";
