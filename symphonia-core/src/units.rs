// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `units` module provides definitions for common units used across format and codec
//! boundaries.

/// A timestamp expressed in samples relative to the start of a logical stream.
pub type TimeStamp = u64;

/// A span of time expressed in samples.
pub type Duration = u64;

/// Converts a sample count at `sample_rate` into whole milliseconds.
pub fn samples_to_ms(samples: u64, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    samples.saturating_mul(1000) / u64::from(sample_rate)
}

/// Converts a millisecond timestamp into a sample count at `sample_rate`.
pub fn ms_to_samples(ms: u64, sample_rate: u32) -> u64 {
    ms.saturating_mul(u64::from(sample_rate)) / 1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_samples_to_ms_round_trip() {
        assert_eq!(samples_to_ms(44_100, 44_100), 1000);
        assert_eq!(samples_to_ms(0, 44_100), 0);
        assert_eq!(samples_to_ms(100, 0), 0);
    }
}
