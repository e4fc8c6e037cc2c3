// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors raised by `radiohal`'s setters and lifecycle operations (§7).
//!
//! Stream *runtime events* (`Overflow`, `Underflow`, `Timeout`,
//! `EndAbrupt`) are not raised — they travel through [`crate::stream::StreamResult`]
//! instead, per §7 "Stream runtime events". This enum only covers the
//! four kinds that do raise: configuration errors, transient I/O
//! failures surfaced with propagation requested, lifecycle violations,
//! and the unrecoverable case.

use crate::types::ErrorCode;
use std::fmt;

/// Errors returned by `radiohal` operations that raise rather than
/// return a typed stream result.
#[derive(Debug)]
pub enum Error {
    // ------------------------------------------------------------------
    // Configuration errors (§7) — caller-visible, state unchanged.
    // ------------------------------------------------------------------
    /// Requested channel index is out of range (only channel 0 exists, §4.4).
    InvalidChannel(usize),
    /// Requested stream format is not in the driver's advertised set.
    UnsupportedFormat(String),
    /// A setter received a value the driver rejected.
    InvalidSetting { setting: String, reason: String },
    /// Argument markup could not be parsed or a required key was missing.
    InvalidArgs(String),

    // ------------------------------------------------------------------
    // Transient I/O error (§7) — driver returned non-success, propagation
    // explicitly requested by the caller.
    // ------------------------------------------------------------------
    /// The underlying driver call returned a non-zero status.
    DriverError {
        driver: String,
        operation: &'static str,
        code: i32,
    },

    // ------------------------------------------------------------------
    // Lifecycle violations (§7) — always raise.
    // ------------------------------------------------------------------
    /// Activated a stream that is already closed.
    StreamClosed,
    /// Activated a stream that is already active, or deactivated one
    /// that is already idle.
    InvalidStreamState { expected: &'static str, actual: &'static str },
    /// Attempted to register a driver name twice, or register a stream
    /// direction/channel combination already opened on a device.
    AlreadyRegistered(String),

    // ------------------------------------------------------------------
    // Unrecoverable (§7) — the device handle became invalid and
    // close+reopen recovery failed.
    // ------------------------------------------------------------------
    /// Recovery from a spurious stream exit failed; the stream is now closed.
    Unrecoverable { driver: String, reason: String },

    /// No driver matched the requested filter, or more than the
    /// built-in `null` driver is registered and none was named (§4.7).
    NoMatchingDriver,
    /// Requested a device/stream operation not supported by the driver.
    NotSupported(&'static str),
}

impl Error {
    /// Maps this error onto the exact numeric codes from §6, for the
    /// FFI boundary and for log messages.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::NotSupported(_) => ErrorCode::NotSupported,
            Error::Unrecoverable { .. } => ErrorCode::StreamError,
            Error::DriverError { .. } => ErrorCode::StreamError,
            _ => ErrorCode::StreamError,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidChannel(ch) => write!(f, "invalid channel {ch}: only channel 0 is supported"),
            Error::UnsupportedFormat(fmt_str) => write!(f, "unsupported stream format: {fmt_str}"),
            Error::InvalidSetting { setting, reason } => {
                write!(f, "invalid setting '{setting}': {reason}")
            }
            Error::InvalidArgs(msg) => write!(f, "invalid argument markup: {msg}"),
            Error::DriverError { driver, operation, code } => {
                write!(f, "driver '{driver}' operation '{operation}' returned {code}")
            }
            Error::StreamClosed => write!(f, "stream is closed"),
            Error::InvalidStreamState { expected, actual } => {
                write!(f, "invalid stream state: expected {expected}, was {actual}")
            }
            Error::AlreadyRegistered(name) => write!(f, "'{name}' is already registered"),
            Error::Unrecoverable { driver, reason } => {
                write!(f, "driver '{driver}' is unrecoverable: {reason}")
            }
            Error::NoMatchingDriver => write!(f, "no driver matched the requested arguments"),
            Error::NotSupported(what) => write!(f, "{what} is not supported by this driver"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_driver_name_and_code_for_driver_errors() {
        let err = Error::DriverError {
            driver: "hackrf".into(),
            operation: "set_freq",
            code: -7,
        };
        let msg = err.to_string();
        assert!(msg.contains("hackrf"));
        assert!(msg.contains("-7"));
    }
}
