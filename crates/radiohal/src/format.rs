// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sample-format codec (§4.2): conversion between the hardware's native
//! interleaved-complex int8 layout and the four client formats, plus
//! the RTL-SDR unsigned-8-bit lookup tables.

use crate::types::StreamFormat;
use std::sync::OnceLock;

/// Round half-away-from-zero, used for the float -> int8 conversions.
fn round_haz(x: f32) -> f32 {
    if x >= 0.0 {
        (x + 0.5).floor()
    } else {
        (x - 0.5).ceil()
    }
}

fn clamp_i8(x: f32) -> i8 {
    x.clamp(i8::MIN as f32, i8::MAX as f32) as i8
}

/// Convert one native int8 I/Q component to the target representation.
mod component {
    use super::{clamp_i8, round_haz};

    pub fn i8_to_i8(x: i8) -> i8 {
        x
    }

    pub fn i8_to_i16(x: i8) -> i16 {
        (x as i16) << 8
    }

    pub fn i8_to_f32(x: i8) -> f32 {
        x as f32 / 127.0
    }

    pub fn i8_to_f64(x: i8) -> f64 {
        x as f64 / 127.0
    }

    pub fn f32_to_i8(x: f32) -> i8 {
        clamp_i8(round_haz(x * 127.0))
    }

    pub fn f64_to_i8(x: f64) -> i8 {
        clamp_i8(round_haz((x * 127.0) as f32))
    }

    pub fn i16_to_i8(x: i16) -> i8 {
        (x >> 8) as i8
    }
}

/// Decode a buffer of native interleaved-complex int8 samples into the
/// client's chosen format, optionally swapping I and Q.
///
/// `native` holds `len * 2` signed bytes (I, Q interleaved). `len`
/// counts complex samples, matching §4.2's definition of `len`.
pub fn decode(native: &[i8], len: usize, format: StreamFormat, iq_swap: bool, out: &mut [u8]) {
    debug_assert!(native.len() >= len * 2);
    debug_assert!(out.len() >= len * format.bytes_per_sample());

    for i in 0..len {
        let (mut re, mut im) = (native[i * 2], native[i * 2 + 1]);
        if iq_swap {
            std::mem::swap(&mut re, &mut im);
        }
        match format {
            StreamFormat::ComplexInt8 => {
                out[i * 2] = component::i8_to_i8(re) as u8;
                out[i * 2 + 1] = component::i8_to_i8(im) as u8;
            }
            StreamFormat::ComplexInt16 => {
                let re16 = component::i8_to_i16(re).to_le_bytes();
                let im16 = component::i8_to_i16(im).to_le_bytes();
                out[i * 4..i * 4 + 2].copy_from_slice(&re16);
                out[i * 4 + 2..i * 4 + 4].copy_from_slice(&im16);
            }
            StreamFormat::ComplexFloat32 => {
                let re32 = component::i8_to_f32(re).to_le_bytes();
                let im32 = component::i8_to_f32(im).to_le_bytes();
                out[i * 8..i * 8 + 4].copy_from_slice(&re32);
                out[i * 8 + 4..i * 8 + 8].copy_from_slice(&im32);
            }
            StreamFormat::ComplexFloat64 => {
                let re64 = component::i8_to_f64(re).to_le_bytes();
                let im64 = component::i8_to_f64(im).to_le_bytes();
                out[i * 16..i * 16 + 8].copy_from_slice(&re64);
                out[i * 16 + 8..i * 16 + 16].copy_from_slice(&im64);
            }
        }
    }
}

/// Encode the client's format into native interleaved-complex int8
/// samples (used on the TX path).
pub fn encode(input: &[u8], len: usize, format: StreamFormat, iq_swap: bool, native: &mut [i8]) {
    debug_assert!(input.len() >= len * format.bytes_per_sample());
    debug_assert!(native.len() >= len * 2);

    for i in 0..len {
        let (mut re, mut im) = match format {
            StreamFormat::ComplexInt8 => (input[i * 2] as i8, input[i * 2 + 1] as i8),
            StreamFormat::ComplexInt16 => {
                let re16 = i16::from_le_bytes([input[i * 4], input[i * 4 + 1]]);
                let im16 = i16::from_le_bytes([input[i * 4 + 2], input[i * 4 + 3]]);
                (component::i16_to_i8(re16), component::i16_to_i8(im16))
            }
            StreamFormat::ComplexFloat32 => {
                let re32 = f32::from_le_bytes(input[i * 8..i * 8 + 4].try_into().unwrap());
                let im32 = f32::from_le_bytes(input[i * 8 + 4..i * 8 + 8].try_into().unwrap());
                (component::f32_to_i8(re32), component::f32_to_i8(im32))
            }
            StreamFormat::ComplexFloat64 => {
                let re64 = f64::from_le_bytes(input[i * 16..i * 16 + 8].try_into().unwrap());
                let im64 =
                    f64::from_le_bytes(input[i * 16 + 8..i * 16 + 16].try_into().unwrap());
                (component::f64_to_i8(re64), component::f64_to_i8(im64))
            }
        };
        if iq_swap {
            std::mem::swap(&mut re, &mut im);
        }
        native[i * 2] = re;
        native[i * 2 + 1] = im;
    }
}

/// Pair of (re, im) float values produced by the RTL-SDR LUTs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComplexF32 {
    pub re: f32,
    pub im: f32,
}

/// 65,536-entry RTL-SDR unsigned-8-bit -> float lookup table, keyed by
/// `(Q << 8) | I`. Built once, lazily, per §4.2.
pub struct RtlSdrLut {
    float_table: Vec<ComplexF32>,
    int16_table: Vec<(i16, i16)>,
}

impl RtlSdrLut {
    fn build() -> Self {
        let mut float_table = vec![ComplexF32 { re: 0.0, im: 0.0 }; 65536];
        let mut int16_table = vec![(0i16, 0i16); 65536];
        for q in 0u32..256 {
            for i in 0u32..256 {
                let key = ((q << 8) | i) as usize;
                let re = (i as f32 - 127.4) / 128.0;
                let im = (q as f32 - 127.4) / 128.0;
                float_table[key] = ComplexF32 { re, im };
                int16_table[key] = ((re * 32767.0) as i16, (im * 32767.0) as i16);
            }
        }
        Self {
            float_table,
            int16_table,
        }
    }

    /// Float-scaled (re, im) for a raw `(Q<<8)|I` native sample.
    pub fn lookup_f32(&self, i: u8, q: u8) -> ComplexF32 {
        self.float_table[((q as usize) << 8) | i as usize]
    }

    /// Int16-scaled (re, im) for a raw `(Q<<8)|I` native sample.
    pub fn lookup_i16(&self, i: u8, q: u8) -> (i16, i16) {
        self.int16_table[((q as usize) << 8) | i as usize]
    }
}

static RTLSDR_LUT: OnceLock<RtlSdrLut> = OnceLock::new();

/// Process-wide RTL-SDR lookup table, built on first use.
pub fn rtlsdr_lut() -> &'static RtlSdrLut {
    RTLSDR_LUT.get_or_init(RtlSdrLut::build)
}
