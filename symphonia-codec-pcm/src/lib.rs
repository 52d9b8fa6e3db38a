// Symphonia
// Copyright (c) 2019-2026 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Linear and companded PCM decoding: `"pcm"` (signed/unsigned/float, 8/16/24/32-bit,
//! little-endian), `"alaw"`, and `"mulaw"`.
//!
//! A demuxer that exposes raw PCM publishes the sample layout through `StreamInfo::extra_data`:
//! a single byte, [`SampleFormat`] as `u8`, alongside `StreamInfo::bits_per_sample` for the
//! encoded width. `"alaw"`/`"mulaw"` streams need neither; every companded byte decodes to one
//! 16-bit sample independent of `bits_per_sample`.

use symphonia_core::audio::{AudioFrame, FramePool};
use symphonia_core::codecs::{Decoder, DecoderOptions, FinalizeResult};
use symphonia_core::errors::{decode_error, unsupported_error, Result};
use symphonia_core::formats::StreamInfo;
use symphonia_core::io::ReadBytes;
use symphonia_core::packet::MediaChunk;

/// The interpretation of a raw `"pcm"` stream's sample words, carried as the first byte of
/// `StreamInfo::extra_data`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SampleFormat {
    SignedInt = 0,
    UnsignedInt = 1,
    Float = 2,
}

impl SampleFormat {
    fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(SampleFormat::SignedInt),
            1 => Ok(SampleFormat::UnsignedInt),
            2 => Ok(SampleFormat::Float),
            _ => decode_error("pcm: invalid sample format tag"),
        }
    }
}

/// The least-significant nibble of an A-law/mu-law byte.
const XLAW_QUANT_MASK: u8 = 0x0f;
/// The 3 segment bits of an A-law/mu-law byte.
const XLAW_SEG_MASK: u8 = 0x70;
const XLAW_SEG_SHIFT: u32 = 4;

/// Decodes one ITU-T G.711 A-law byte to a linear 16-bit sample.
fn alaw_to_linear(a_val: u8) -> i16 {
    let a_val = a_val ^ 0x55;

    let segment = (a_val & XLAW_SEG_MASK) >> XLAW_SEG_SHIFT;
    let mantissa = i32::from(a_val & XLAW_QUANT_MASK);

    let mut sample = match segment {
        0 => (mantissa << 4) + 8,
        _ => ((mantissa << 4) + 0x108) << (segment - 1),
    };

    if a_val & 0x80 == 0 {
        sample = -sample;
    }

    sample as i16
}

/// Decodes one ITU-T G.711 mu-law byte to a linear 16-bit sample.
fn mulaw_to_linear(mu_val: u8) -> i16 {
    let mu_val = !mu_val;

    let segment = (mu_val & XLAW_SEG_MASK) >> XLAW_SEG_SHIFT;
    let mantissa = i32::from(mu_val & XLAW_QUANT_MASK);

    let sample = ((mantissa << 3) + 0x84) << segment;
    let sample = sample - 0x84;

    if mu_val & 0x80 != 0 {
        sample as i16
    }
    else {
        -sample as i16
    }
}

/// Widens a `width`-bit signed sample (sign-extended into `val`'s full 32 bits) to 16-bit by
/// shifting it to occupy the top of a 32-bit lane and truncating, matching the scaling every
/// other bit depth is normalized through.
fn signed_to_i16(val: i32, width: u32) -> i16 {
    let shift = 32 - width;
    ((val << shift) >> 16) as i16
}

fn unsigned_to_i16(val: u32, width: u32) -> i16 {
    let top_aligned = (val << (32 - width)) as i32;
    (top_aligned.wrapping_sub(i32::MIN) >> 16) as i16
}

fn float_to_i16(val: f32) -> i16 {
    (val.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16
}

/// One logical stream's linear/companded PCM decoder.
pub struct PcmDecoder {
    sample_rate: u32,
    channels: u32,
    bits_per_sample: u32,
    bytes_per_sample: usize,
    kind: Kind,
    pool: FramePool,
}

enum Kind {
    Linear(SampleFormat),
    Alaw,
    Mulaw,
}

impl Decoder for PcmDecoder {
    fn try_new(info: &StreamInfo, _options: DecoderOptions) -> Result<Self> {
        if !info.is_valid() {
            return decode_error("pcm: invalid stream parameters");
        }

        let (kind, bytes_per_sample) = match info.codec_name {
            "alaw" => (Kind::Alaw, 1),
            "mulaw" => (Kind::Mulaw, 1),
            "pcm" => {
                let tag = match info.extra_data.as_deref().and_then(|b| b.first().copied()) {
                    Some(tag) => tag,
                    None => return decode_error("pcm: missing sample format descriptor"),
                };
                let format = SampleFormat::from_tag(tag)?;

                if !matches!(info.bits_per_sample, 8 | 16 | 24 | 32) {
                    return decode_error("pcm: unsupported bit depth");
                }
                if format == SampleFormat::Float && info.bits_per_sample != 32 {
                    return decode_error("pcm: float samples must be 32-bit");
                }

                (Kind::Linear(format), (info.bits_per_sample as usize + 7) / 8)
            }
            _ => return unsupported_error("pcm: unrecognized codec name"),
        };

        Ok(PcmDecoder {
            sample_rate: info.sample_rate,
            channels: info.channels,
            bits_per_sample: info.bits_per_sample,
            bytes_per_sample,
            kind,
            pool: FramePool::new(),
        })
    }

    fn decode(&mut self, chunk: &MediaChunk) -> Result<AudioFrame> {
        let data = chunk.data();

        if data.len() % self.bytes_per_sample != 0 {
            return decode_error("pcm: chunk length not a whole number of samples");
        }

        let n_samples = data.len() / self.bytes_per_sample;
        let mut reader = chunk.reader();
        let mut samples = self.pool.acquire(n_samples);

        for _ in 0..n_samples {
            let sample = match self.kind {
                Kind::Alaw => alaw_to_linear(reader.read_byte()?),
                Kind::Mulaw => mulaw_to_linear(reader.read_byte()?),
                Kind::Linear(SampleFormat::Float) => float_to_i16(reader.read_f32()?),
                Kind::Linear(SampleFormat::SignedInt) => {
                    let raw = read_le_word(&mut reader, self.bytes_per_sample)? as i32;
                    let sign_extended = (raw << (32 - self.bits_per_sample)) >> (32 - self.bits_per_sample);
                    signed_to_i16(sign_extended, self.bits_per_sample)
                }
                Kind::Linear(SampleFormat::UnsignedInt) => {
                    let raw = read_le_word(&mut reader, self.bytes_per_sample)?;
                    unsigned_to_i16(raw, self.bits_per_sample)
                }
            };

            samples.push(sample);
        }

        let ts = chunk.granule.unwrap_or(0);

        Ok(AudioFrame::from_pool(samples, self.sample_rate, self.channels, ts, self.pool.clone()))
    }

    fn flush(&mut self) -> Result<AudioFrame> {
        Ok(AudioFrame::empty(self.sample_rate, self.channels))
    }

    fn reset(&mut self) {}

    fn finalize(&mut self) -> FinalizeResult {
        FinalizeResult::default()
    }
}

/// Reads a `width`-byte (1-4) little-endian word into the low bits of a `u32`.
fn read_le_word<B: ReadBytes>(reader: &mut B, width: usize) -> Result<u32> {
    match width {
        1 => Ok(u32::from(reader.read_u8()?)),
        2 => Ok(u32::from(reader.read_u16()?)),
        3 => Ok(reader.read_u24()?),
        4 => Ok(reader.read_u32()?),
        _ => unreachable!("bytes_per_sample is always in [1, 4]"),
    }
}

/// Registers `"pcm"`, `"alaw"`, and `"mulaw"` under `registry`.
pub fn register_codecs(registry: &mut symphonia_core::codecs::CodecRegistry) {
    registry.register_codec("pcm", try_new_decoder);
    registry.register_codec("alaw", try_new_decoder);
    registry.register_codec("mulaw", try_new_decoder);
}

fn try_new_decoder(info: &StreamInfo, options: DecoderOptions) -> Result<Box<dyn Decoder>> {
    Ok(Box::new(PcmDecoder::try_new(info, options)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_info(codec_name: &'static str, bits_per_sample: u32, format: Option<SampleFormat>) -> StreamInfo {
        StreamInfo {
            stream_id: 0,
            codec_name,
            sample_rate: 44_100,
            channels: 1,
            bits_per_sample,
            duration_ms: None,
            extra_data: format.map(|f| vec![f as u8].into_boxed_slice()),
        }
    }

    #[test]
    fn verify_alaw_silence_is_near_zero() {
        let info = stream_info("alaw", 8, None);
        let mut decoder = PcmDecoder::try_new(&info, DecoderOptions::default()).unwrap();
        // 0xd5 is the A-law "digital silence" code.
        let chunk = MediaChunk::new(0, vec![0xd5u8; 4].into_boxed_slice());
        let frame = decoder.decode(&chunk).unwrap();
        assert_eq!(frame.frame_count(), 4);
        assert!(frame.samples().iter().all(|&s| s.abs() < 16));
    }

    #[test]
    fn verify_mulaw_silence_is_near_zero() {
        let info = stream_info("mulaw", 8, None);
        let mut decoder = PcmDecoder::try_new(&info, DecoderOptions::default()).unwrap();
        let chunk = MediaChunk::new(0, vec![0xffu8; 2].into_boxed_slice());
        let frame = decoder.decode(&chunk).unwrap();
        assert!(frame.samples().iter().all(|&s| s.abs() < 16));
    }

    #[test]
    fn verify_pcm_s16le_round_trips() {
        let info = stream_info("pcm", 16, Some(SampleFormat::SignedInt));
        let mut decoder = PcmDecoder::try_new(&info, DecoderOptions::default()).unwrap();
        let chunk = MediaChunk::new(0, (-1234i16).to_le_bytes().to_vec().into_boxed_slice());
        let frame = decoder.decode(&chunk).unwrap();
        assert_eq!(frame.samples(), &[-1234i16]);
    }

    #[test]
    fn verify_pcm_u8_midpoint_is_silence() {
        let info = stream_info("pcm", 8, Some(SampleFormat::UnsignedInt));
        let mut decoder = PcmDecoder::try_new(&info, DecoderOptions::default()).unwrap();
        let chunk = MediaChunk::new(0, vec![0x80u8].into_boxed_slice());
        let frame = decoder.decode(&chunk).unwrap();
        assert_eq!(frame.samples(), &[0i16]);
    }

    #[test]
    fn verify_pcm_u8_extremes_are_not_flattened_to_silence() {
        let info = stream_info("pcm", 8, Some(SampleFormat::UnsignedInt));
        let mut decoder = PcmDecoder::try_new(&info, DecoderOptions::default()).unwrap();

        let chunk = MediaChunk::new(0, vec![0x00u8].into_boxed_slice());
        let frame = decoder.decode(&chunk).unwrap();
        assert_eq!(frame.samples(), &[i16::MIN]);

        let chunk = MediaChunk::new(0, vec![0xffu8].into_boxed_slice());
        let frame = decoder.decode(&chunk).unwrap();
        assert_eq!(frame.samples(), &[32512i16]);
    }

    #[test]
    fn verify_pcm_f32_full_scale() {
        let info = stream_info("pcm", 32, Some(SampleFormat::Float));
        let mut decoder = PcmDecoder::try_new(&info, DecoderOptions::default()).unwrap();
        let chunk = MediaChunk::new(0, 1.0f32.to_le_bytes().to_vec().into_boxed_slice());
        let frame = decoder.decode(&chunk).unwrap();
        assert_eq!(frame.samples(), &[i16::MAX]);
    }

    #[test]
    fn verify_float_must_be_32_bit() {
        let info = stream_info("pcm", 16, Some(SampleFormat::Float));
        assert!(PcmDecoder::try_new(&info, DecoderOptions::default()).is_err());
    }

    #[test]
    fn verify_unrecognized_codec_name_rejected() {
        let info = stream_info("mp3", 16, None);
        assert!(PcmDecoder::try_new(&info, DecoderOptions::default()).is_err());
    }
}
