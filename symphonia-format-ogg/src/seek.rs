// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Granule-position arithmetic and bisection seeking.

use symphonia_core::errors::Result;
use symphonia_core::io::{MediaSourceStream, ReadBytes, Seek, SeekFrom};

use crate::sync::{PageReader, OGG_PAGE_HEADER_SIZE};

/// The wire sentinel for "no granule position" (an all-ones 64-bit absolute granule position).
pub const GRANULE_UNKNOWN: u64 = u64::MAX;

/// Saturating, sentinel-aware granule addition. `GRANULE_UNKNOWN` propagates rather than
/// participating in the arithmetic.
pub fn granule_add(a: u64, b: u64) -> u64 {
    if a == GRANULE_UNKNOWN || b == GRANULE_UNKNOWN {
        GRANULE_UNKNOWN
    }
    else {
        a.saturating_add(b)
    }
}

/// Saturating, sentinel-aware granule subtraction.
pub fn granule_sub(a: u64, b: u64) -> u64 {
    if a == GRANULE_UNKNOWN {
        GRANULE_UNKNOWN
    }
    else {
        a.saturating_sub(b)
    }
}

/// Converts a granule position on `codec_name`'s logical stream into milliseconds.
///
/// Opus always decodes at 48 kHz and its granule counts samples at that rate from the stream's
/// start, inclusive of `pre_skip` samples that are discarded rather than played; every other
/// codec's granule is a sample count at its own `sample_rate`.
pub fn granule_to_ms(granule: u64, codec_name: &str, sample_rate: u32, pre_skip: u64) -> u64 {
    if granule == GRANULE_UNKNOWN {
        return 0;
    }

    match codec_name {
        "opus" => granule.saturating_sub(pre_skip).saturating_mul(1000) / 48_000,
        _ if sample_rate > 0 => granule.saturating_mul(1000) / u64::from(sample_rate),
        _ => 0,
    }
}

/// Converts a millisecond timestamp into the equivalent granule position on `codec_name`'s
/// logical stream (the inverse of [`granule_to_ms`]).
pub fn ms_to_granule(ms: u64, codec_name: &str, sample_rate: u32, pre_skip: u64) -> u64 {
    match codec_name {
        "opus" => ms.saturating_mul(48_000) / 1000 + pre_skip,
        _ if sample_rate > 0 => ms.saturating_mul(u64::from(sample_rate)) / 1000,
        _ => 0,
    }
}

/// The outcome of a successful bisection seek: the byte offset to resume reading pages from, and
/// the granule position of the page found at that offset.
#[derive(Copy, Clone, Debug)]
pub struct SeekOutcome {
    pub page_pos: u64,
    pub granule: u64,
}

/// Narrows the minimum window size has shrunk below 8 KiB before accepting the bisection's
/// current best candidate.
const MIN_WINDOW_LEN: u64 = 8 * 1024;

/// Binary-searches `[0, file_size)` for the page belonging to `serial` whose granule position is
/// the greatest value not exceeding `target_granule`. Pages with an unknown (`-1`) granule are
/// skipped when narrowing the window, per spec: only positions with a known granule can anchor
/// the search.
///
/// On return, `reader` is left positioned at the start of the returned page; the caller is
/// expected to resume demuxing (and reset every `LogicalStream`) from there.
pub fn seek_to_granule(
    reader: &mut MediaSourceStream,
    file_size: u64,
    serial: i32,
    target_granule: u64,
) -> Result<Option<SeekOutcome>> {
    let mut lo = 0u64;
    let mut hi = file_size;
    let mut best: Option<SeekOutcome> = None;

    while hi > lo && hi - lo >= MIN_WINDOW_LEN {
        let mid = lo + (hi - lo) / 2;

        match find_next_page_for_serial(reader, mid, serial) {
            Some((page_pos, granule, next_pos)) if granule != GRANULE_UNKNOWN => {
                if granule <= target_granule {
                    best = Some(SeekOutcome { page_pos, granule });
                    lo = next_pos.max(mid + 1);
                }
                else {
                    hi = mid;
                }
            }
            // A page with an unknown granule, or no page at all forward of `mid`: the interval
            // can't be narrowed from this probe, so give up on this half.
            _ => hi = mid,
        }
    }

    if let Some(outcome) = best {
        reader.seek(SeekFrom::Start(outcome.page_pos))?;
    }

    Ok(best)
}

/// Seeks `reader` to `from`, then scans forward for the next page belonging to `serial`.
/// Returns `(page_start, granule, byte_offset_immediately_after_the_page)`.
fn find_next_page_for_serial(
    reader: &mut MediaSourceStream,
    from: u64,
    serial: i32,
) -> Option<(u64, u64, u64)> {
    reader.seek(SeekFrom::Start(from)).ok()?;

    let mut pages = PageReader::try_new(reader).ok()?;

    loop {
        let header = pages.header();

        if header.serial == serial {
            let page_len = (OGG_PAGE_HEADER_SIZE + header.n_segments as usize + pages.page().body_len()) as u64;
            let next_pos = pages.page_pos() + page_len;
            return Some((pages.page_pos(), header.absgp, next_pos));
        }

        pages.try_next_page(reader).ok()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_opus_granule_to_ms() {
        // Testable property: duration of a synthesized single-Opus-stream Ogg file with granule
        // `G` and pre-skip `S` equals `((G - S) * 1000) / 48000` ms.
        let granule = 48_000 * 10 + 312;
        let pre_skip = 312;
        assert_eq!(granule_to_ms(granule, "opus", 48_000, pre_skip), 10_000);
    }

    #[test]
    fn verify_vorbis_granule_to_ms() {
        assert_eq!(granule_to_ms(44_100, "vorbis", 44_100, 0), 1000);
    }

    #[test]
    fn verify_granule_unknown_is_sentinel() {
        assert_eq!(granule_add(GRANULE_UNKNOWN, 5), GRANULE_UNKNOWN);
        assert_eq!(granule_sub(GRANULE_UNKNOWN, 5), GRANULE_UNKNOWN);
        assert_eq!(granule_add(10, 5), 15);
    }

    #[test]
    fn verify_granule_sub_floors_at_zero() {
        assert_eq!(granule_sub(3, 10), 0);
    }
}
