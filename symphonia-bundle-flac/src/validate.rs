// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::mem;
use std::vec::Vec;

use symphonia_core::checksum::Md5;
use symphonia_core::io::Monitor;

/// `Validator` computes the MD5 checksum of a decoded FLAC stream, taking into account the
/// peculiarities of FLAC's MD5 validation scheme (RFC 9639 §8.2).
#[derive(Default)]
pub struct Validator {
    state: Md5,
    buf: Vec<u8>,
}

impl Validator {
    /// Processes one frame's worth of decoded, planar, undecorrelated channel buffers and updates
    /// the state of the validator. `bps` is the bit depth the samples were originally encoded at
    /// before any shift to a wider common denominator.
    pub fn update(&mut self, channels: &[Vec<i32>], bps: u32) {
        // The MD5 checksum is calculated over a buffer of interleaved audio samples truncated to
        // the stream's original bit width, packed little-endian. FLAC only supports bit widths
        // that are a multiple of 4, but the checksum buffer itself is always byte-aligned, so round
        // up to the nearest byte width.
        let bytes_per_sample = match bps {
            0 => return,
            1..=8 => 1,
            9..=16 => 2,
            17..=24 => 3,
            25..=32 => 4,
            _ => unreachable!(),
        };

        let n_channels = channels.len();
        let n_frames = channels.first().map_or(0, Vec::len);

        let buf_len = n_channels * n_frames * bytes_per_sample;

        if self.buf.len() < buf_len {
            self.buf.resize(buf_len, 0u8);
        }

        let buf_slice = match bytes_per_sample {
            1 => copy_as_i8(channels, &mut self.buf, n_channels, n_frames),
            2 => copy_as_i16(channels, &mut self.buf, n_channels, n_frames),
            3 => copy_as_i24(channels, &mut self.buf, n_channels, n_frames),
            4 => copy_as_i32(channels, &mut self.buf, n_channels, n_frames),
            _ => unreachable!(),
        };

        self.state.process_buf_bytes(buf_slice);
    }

    /// Finalizes and returns the computed checksum.
    pub fn md5(&mut self) -> [u8; 16] {
        self.state.md5()
    }
}

fn copy_as_i24<'a>(
    channels: &[Vec<i32>],
    buf: &'a mut [u8],
    n_channels: usize,
    n_frames: usize,
) -> &'a [u8] {
    const SIZE_OF_I24: usize = 24 / 8;

    for (ch, samples) in channels.iter().enumerate() {
        for (out, sample) in
            buf.chunks_exact_mut(SIZE_OF_I24).skip(ch).step_by(n_channels).zip(samples)
        {
            out.copy_from_slice(&sample.to_le_bytes()[0..SIZE_OF_I24]);
        }
    }

    &buf[..n_channels * n_frames * SIZE_OF_I24]
}

macro_rules! copy_as {
    ($name:ident, $type:ty) => {
        fn $name<'a>(
            channels: &[Vec<i32>],
            buf: &'a mut [u8],
            n_channels: usize,
            n_frames: usize,
        ) -> &'a [u8] {
            for (ch, samples) in channels.iter().enumerate() {
                for (out, sample) in buf
                    .chunks_exact_mut(mem::size_of::<$type>())
                    .skip(ch)
                    .step_by(n_channels)
                    .zip(samples)
                {
                    out.copy_from_slice(&(*sample as $type).to_le_bytes());
                }
            }

            &buf[..n_channels * n_frames * mem::size_of::<$type>()]
        }
    };
}

copy_as!(copy_as_i8, i8);
copy_as!(copy_as_i16, i16);
copy_as!(copy_as_i32, i32);

#[cfg(test)]
mod tests {
    use super::Validator;

    #[test]
    fn verify_validator_matches_known_silence_checksum() {
        let channels = vec![vec![0i32; 4]; 2];

        let mut validator = Validator::default();
        validator.update(&channels, 16);

        // 16 bytes of zeroes MD5-hash to a well-known constant.
        assert_eq!(
            validator.md5(),
            [
                0x4a, 0xe7, 0x13, 0x36, 0xe4, 0x4b, 0xf9, 0xbf, 0x79, 0xd2, 0x75, 0x2e, 0x23, 0x48,
                0x18, 0xa5,
            ]
        );
    }
}
