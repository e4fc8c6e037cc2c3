// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tick <-> nanosecond conversion at arbitrary sample rates (§4.9).
//!
//! Splits the rate into integer and fractional parts so that the
//! round-trip is exact for ticks in the lower 56 bits, at any rate
//! (including irrational-looking ones like `100e6/3`). Rounding is
//! half-away-from-zero throughout.

/// Round half-away-from-zero, matching the codec's rounding rule (§4.2)
/// and the rounding called for in §4.9.
fn round_half_away_from_zero(x: f64) -> f64 {
    if x >= 0.0 {
        (x + 0.5).floor()
    } else {
        (x - 0.5).ceil()
    }
}

/// Convert a sample tick count to nanoseconds at the given rate (Hz).
///
/// `full`/`err` are computed with exact `i64` arithmetic so ticks near
/// the 56-bit limit don't lose precision in the `f64` domain; only the
/// sub-second remainder ever goes through floating point.
pub fn ticks_to_time_ns(ticks: i64, rate: f64) -> i64 {
    if rate <= 0.0 {
        return 0;
    }
    let rate_int = rate.trunc() as i64;
    let full = ticks / rate_int;
    let err = ticks - full * rate_int;
    let part = full as f64 * (rate - rate_int as f64);
    let frac_ns = round_half_away_from_zero((err as f64 - part) * 1e9 / rate);
    full * 1_000_000_000 + frac_ns as i64
}

/// Inverse of [`ticks_to_time_ns`]: nanoseconds to sample tick count at
/// the given rate (Hz). Symmetric split into integer/fractional parts.
pub fn time_ns_to_ticks(time_ns: i64, rate: f64) -> i64 {
    if rate <= 0.0 {
        return 0;
    }
    let rate_int = rate.trunc() as i64;
    let full = time_ns / 1_000_000_000;
    let err = time_ns - full * 1_000_000_000;
    let part = full as f64 * (rate - rate_int as f64);
    let frac_ticks = round_half_away_from_zero(err as f64 * rate / 1e9 + part);
    full * rate_int + frac_ticks as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The four rates named in §8 property 1/2.
    const RATES: [f64; 4] = [1e9, 52e6, 61.44e6, 100e6 / 3.0];

    #[test]
    fn tick_round_trip_is_exact_for_representative_magnitudes() {
        // |t| < 2^55; sample across orders of magnitude rather than
        // exhaustively, matching the teacher's fixed-value-set style.
        let magnitudes: [i64; 9] = [
            0,
            1,
            -1,
            1_000,
            -1_000,
            1_000_000_000,
            -1_000_000_000,
            (1i64 << 54) - 7,
            -((1i64 << 54) - 7),
        ];
        for &rate in &RATES {
            for &t in &magnitudes {
                let ns = ticks_to_time_ns(t, rate);
                let back = time_ns_to_ticks(ns, rate);
                assert_eq!(back, t, "round trip failed for t={t} rate={rate}");
            }
        }
    }

    #[test]
    fn ns_round_trip_is_within_one_sample_period() {
        let magnitudes: [i64; 7] = [
            0,
            1,
            -1,
            1_000_000_000,
            -1_000_000_000,
            (1i64 << 61),
            -(1i64 << 61),
        ];
        for &rate in &RATES {
            for &n in &magnitudes {
                let ticks = time_ns_to_ticks(n, rate);
                let back = ticks_to_time_ns(ticks, rate);
                let diff = (n - back).unsigned_abs() as f64;
                assert!(
                    diff < 1e9 / rate + 1.0,
                    "ns round trip exceeded one sample period: n={n} rate={rate} diff={diff}"
                );
            }
        }
    }

    #[test]
    fn zero_ticks_is_zero_ns() {
        for &rate in &RATES {
            assert_eq!(ticks_to_time_ns(0, rate), 0);
            assert_eq!(time_ns_to_ticks(0, rate), 0);
        }
    }
}
