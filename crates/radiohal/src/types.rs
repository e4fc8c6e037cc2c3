// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Wire-level constants shared by the core and the C ABI: stream
//! directions, sample-format strings, and the stream-result flag bits.

use std::fmt;

/// Transmit or receive direction of a stream, matching the wire values
/// `Tx=0, Rx=1` from the external driver surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Direction {
    Tx = 0,
    Rx = 1,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Tx => write!(f, "TX"),
            Direction::Rx => write!(f, "RX"),
        }
    }
}

/// Client-facing sample format. Only the four complex formats named in
/// §4.2 are implemented by the codec; the remaining wire strings are
/// recognized for parsing/introspection but rejected by `setup_stream`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamFormat {
    ComplexInt8,
    ComplexInt16,
    ComplexFloat32,
    ComplexFloat64,
}

impl StreamFormat {
    /// Exact wire constant, e.g. `"CS8"`.
    pub const fn as_str(self) -> &'static str {
        match self {
            StreamFormat::ComplexInt8 => "CS8",
            StreamFormat::ComplexInt16 => "CS16",
            StreamFormat::ComplexFloat32 => "CF32",
            StreamFormat::ComplexFloat64 => "CF64",
        }
    }

    /// Parse one of the four supported wire constants.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CS8" => Some(StreamFormat::ComplexInt8),
            "CS16" => Some(StreamFormat::ComplexInt16),
            "CF32" => Some(StreamFormat::ComplexFloat32),
            "CF64" => Some(StreamFormat::ComplexFloat64),
            _ => None,
        }
    }

    /// Bytes per complex sample (2 components, each `width` bytes).
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            StreamFormat::ComplexInt8 => 2,
            StreamFormat::ComplexInt16 => 4,
            StreamFormat::ComplexFloat32 => 8,
            StreamFormat::ComplexFloat64 => 16,
        }
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every wire format string recognized by `GetStreamFormats`, including
/// the ones the codec does not implement. Used only for advertising and
/// for rejecting unsupported formats with a clear message.
pub const ALL_STREAM_FORMAT_STRINGS: &[&str] = &[
    "CF64", "CF32", "CS32", "CU32", "CS16", "CU16", "CS12", "CU12", "CS8", "CU8", "CS4", "CU4",
    "F64", "F32", "S32", "U32", "S16", "U16", "S8", "U8",
];

/// Hand-rolled, dependency-free bitflags macro.
///
/// The teacher's dependency stack has no `bitflags` crate in scope for
/// this kind of small fixed bitfield; a three-method wrapper is simpler
/// than adding a dependency for five constants.
macro_rules! bitflags_lite {
    (
        $(#[$meta:meta])*
        pub struct $name:ident: $ty:ty {
            $(const $flag:ident = $value:expr;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name(pub $ty);

        impl $name {
            $(pub const $flag: $name = $name($value);)*

            pub const NONE: $name = $name(0);

            #[must_use]
            pub const fn contains(self, other: $name) -> bool {
                (self.0 & other.0) == other.0
            }

            #[must_use]
            pub const fn union(self, other: $name) -> $name {
                $name(self.0 | other.0)
            }

            #[must_use]
            pub const fn remove(self, other: $name) -> $name {
                $name(self.0 & !other.0)
            }
        }

        impl std::ops::BitOr for $name {
            type Output = $name;
            fn bitor(self, rhs: $name) -> $name {
                self.union(rhs)
            }
        }
    };
}

bitflags_lite! {
    /// Stream-result flag bitfield from §6.
    pub struct StreamFlags: u32 {
        const END_BURST = 1 << 1;
        const HAS_TIME = 1 << 2;
        const END_ABRUPT = 1 << 3;
        const ONE_PACKET = 1 << 4;
        const MORE_FRAGMENTS = 1 << 5;
        const WAIT_TRIGGER = 1 << 6;
        // User flags occupy bits 16..20 and are opaque to radiohal itself.
        const USER_FLAG_MASK = 0b1111 << 16;
    }
}

/// Exact integer error codes from §6, used at the FFI boundary and in
/// log messages alongside the driver name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorCode {
    None = 0,
    Timeout = -1,
    StreamError = -2,
    Corruption = -3,
    Overflow = -4,
    NotSupported = -5,
    TimeError = -6,
    Underflow = -7,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_format_round_trips_through_wire_string() {
        for fmt in [
            StreamFormat::ComplexInt8,
            StreamFormat::ComplexInt16,
            StreamFormat::ComplexFloat32,
            StreamFormat::ComplexFloat64,
        ] {
            assert_eq!(StreamFormat::parse(fmt.as_str()), Some(fmt));
        }
    }

    #[test]
    fn bytes_per_sample_matches_component_width() {
        assert_eq!(StreamFormat::ComplexInt8.bytes_per_sample(), 2);
        assert_eq!(StreamFormat::ComplexInt16.bytes_per_sample(), 4);
        assert_eq!(StreamFormat::ComplexFloat32.bytes_per_sample(), 8);
        assert_eq!(StreamFormat::ComplexFloat64.bytes_per_sample(), 16);
    }

    #[test]
    fn stream_flags_compose() {
        let f = StreamFlags::END_BURST | StreamFlags::HAS_TIME;
        assert!(f.contains(StreamFlags::END_BURST));
        assert!(f.contains(StreamFlags::HAS_TIME));
        assert!(!f.contains(StreamFlags::END_ABRUPT));
    }

    #[test]
    fn error_code_values_match_spec() {
        assert_eq!(ErrorCode::None as i32, 0);
        assert_eq!(ErrorCode::Timeout as i32, -1);
        assert_eq!(ErrorCode::StreamError as i32, -2);
        assert_eq!(ErrorCode::Corruption as i32, -3);
        assert_eq!(ErrorCode::Overflow as i32, -4);
        assert_eq!(ErrorCode::NotSupported as i32, -5);
        assert_eq!(ErrorCode::TimeError as i32, -6);
        assert_eq!(ErrorCode::Underflow as i32, -7);
    }
}
