// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fmt, time::SystemTime};

use crate::errors::{HoraceError, Result};

/// Nanosecond values at or above this threshold encode a leap second in
/// progress (the value less 10⁹ is the position within the repeated
/// second).
pub const LEAP_SECOND_NSEC: u32 = 1_000_000_000;

const MAX_NSEC: u32 = 2_000_000_000;

/// A timestamp of whole seconds plus nanoseconds.
///
/// The time system it is interpreted against is a property of the session
/// as a whole, so it is not carried here. `nsec` is normally below 10⁹;
/// the range `[10⁹, 2·10⁹)` is permitted to represent a leap second.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timestamp {
    sec: u64,
    nsec: u32,
}

impl Timestamp {
    pub fn new(sec: u64, nsec: u32) -> Result<Self> {
        if nsec >= MAX_NSEC {
            return Err(HoraceError::malformed(
                "invalid nsec field in timestamp attribute",
            ));
        }
        Ok(Self { sec, nsec })
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        let elapsed = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            sec: elapsed.as_secs(),
            nsec: elapsed.subsec_nanos(),
        }
    }

    pub fn sec(&self) -> u64 {
        self.sec
    }

    pub fn nsec(&self) -> u32 {
        self.nsec
    }

    /// True if this timestamp falls within a leap second.
    pub fn is_leap_second(&self) -> bool {
        self.nsec >= LEAP_SECOND_NSEC
    }

    /// Annotate this timestamp as falling within a leap second.
    pub fn with_leap_second(self) -> Self {
        Self {
            sec: self.sec,
            nsec: self.nsec % LEAP_SECOND_NSEC + LEAP_SECOND_NSEC,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.sec, self.nsec)
    }
}
