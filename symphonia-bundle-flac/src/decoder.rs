// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp;
use std::cmp::Ordering;
use std::num::Wrapping;

use log::{debug, log_enabled, warn};

use symphonia_core::audio::{AudioFrame, FramePool};
use symphonia_core::checksum::Crc16Ansi;
use symphonia_core::codecs::{Decoder, DecoderOptions, FinalizeResult};
use symphonia_core::errors::{decode_error, invalid_residual_error, invalid_subframe_error};
use symphonia_core::errors::{unsupported_error, Result};
use symphonia_core::formats::StreamInfo;
use symphonia_core::io::{BitstreamReader, BufReader, FiniteStream, Monitor, ReadBytes};
use symphonia_core::packet::MediaChunk;

use symphonia_common::xiph::audio::flac as common_flac;

use super::frame::*;
use super::validate::Validator;

fn decorrelate_left_side(left: &[i32], side: &mut [i32]) {
    for (s, l) in side.iter_mut().zip(left) {
        *s = *l - *s;
    }
}

fn decorrelate_mid_side(mid: &mut [i32], side: &mut [i32]) {
    for (m, s) in mid.iter_mut().zip(side) {
        // Mid (M) is given as M = L/2 + R/2, while Side (S) is given as S = L - R.
        //
        // To calculate the individual channels, the following equations can be used:
        //      - L = S/2 + M
        //      - R = M - S/2
        //
        // Since samples are integers, division truncates towards zero, so the above
        // equations are only correct if S is even. To get proper rounding when S is odd, add
        // one to the result:
        //      - L = floor(S/2) + M + (S%2)
        //      - R = M - floor(S/2) + (S%2)
        //
        // To avoid the intermediate loss of precision from dividing S by two, multiply M by
        // two instead (M's low bit is always 0, so S's parity can be OR'd in directly), add or
        // subtract S, then divide the whole sum by two:
        //      - L = (2*M + (S%2) + S) / 2
        //      - R = (2*M + (S%2) - S) / 2
        let mid = (*m << 1) | (*s & 1);
        let side = *s;
        *m = (mid + side) >> 1;
        *s = (mid - side) >> 1;
    }
}

fn decorrelate_right_side(right: &[i32], side: &mut [i32]) {
    for (s, r) in side.iter_mut().zip(right) {
        *s += *r;
    }
}

/// Rescales a decoded sample at `bps` bits per sample to 16-bit signed PCM, rounding to nearest
/// and clamping to `i16`'s range.
fn rescale_to_i16(sample: i32, bps: u32) -> i16 {
    let value: i64 = match bps.cmp(&16) {
        Ordering::Equal => i64::from(sample),
        Ordering::Less => i64::from(sample) << (16 - bps),
        Ordering::Greater => {
            let shift = bps - 16;
            let bias: i64 = 1i64 << (shift - 1);
            (i64::from(sample) + bias) >> shift
        }
    };

    value.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16
}

struct FrameMeta {
    sample_rate: u32,
    ts: u64,
    n_samples: usize,
    bits_per_sample: u32,
}

/// Free Lossless Audio Codec (FLAC) decoder.
pub struct FlacDecoder {
    sample_rate: u32,
    channels: u32,
    bits_per_sample: u32,
    /// The STREAMINFO-declared minimum block size, used to derive a sample timestamp for frames
    /// encoded with the fixed-blocksize strategy (which carry a frame number rather than a
    /// sample number). Zero if unknown, in which case timestamps fall back to a running count.
    nominal_block_len: u64,
    expected_md5: Option<[u8; 16]>,
    verify: bool,
    validator: Validator,
    pool: FramePool,
    channel_bufs: Vec<Vec<i32>>,
    next_ts: u64,
}

impl FlacDecoder {
    fn decode_inner(&mut self, chunk: &MediaChunk) -> Result<FrameMeta> {
        let data = chunk.data();

        if data.len() < FLAC_MIN_FRAME_HEADER_SIZE + 2 {
            return decode_error("flac: frame is too small to contain a header and footer");
        }

        let footer_crc16 = u16::from_be_bytes([data[data.len() - 2], data[data.len() - 1]]);
        let body = &data[..data.len() - 2];

        let mut reader = BufReader::new(body);

        let sync = sync_frame(&mut reader)?;
        let header = read_frame_header(&mut reader, sync)?;

        let bits_per_sample = match header.bits_per_sample.or(Some(self.bits_per_sample)) {
            Some(bps) if bps > 0 => bps,
            _ => return decode_error("flac: bits per sample not provided"),
        };

        let sample_rate = header.sample_rate.unwrap_or(self.sample_rate);

        let n_samples = header.block_num_samples as usize;
        let n_channels = self.channel_bufs.len();

        for buf in self.channel_bufs.iter_mut() {
            buf.clear();
            buf.resize(n_samples, 0);
        }

        let remaining = reader.bytes_available() as usize;
        let subframe_bytes = reader.read_buf_bytes_ref(remaining)?;

        let mut bits = BitstreamReader::new();
        bits.feed(subframe_bytes);

        match header.channel_assignment {
            ChannelAssignment::Independant(channels) => {
                if channels as usize != n_channels {
                    return decode_error(
                        "flac: frame channel count does not match stream channel count",
                    );
                }

                for buf in self.channel_bufs.iter_mut() {
                    read_subframe(&mut bits, bits_per_sample, buf)?;
                }
            }
            ChannelAssignment::LeftSide => {
                if n_channels != 2 {
                    return decode_error("flac: left/side assignment requires 2 channels");
                }

                let (first, rest) = self.channel_bufs.split_at_mut(1);
                let (left, side) = (&mut first[0], &mut rest[0]);

                read_subframe(&mut bits, bits_per_sample, left)?;
                read_subframe(&mut bits, bits_per_sample + 1, side)?;

                decorrelate_left_side(left, side);
            }
            ChannelAssignment::MidSide => {
                if n_channels != 2 {
                    return decode_error("flac: mid/side assignment requires 2 channels");
                }

                let (first, rest) = self.channel_bufs.split_at_mut(1);
                let (mid, side) = (&mut first[0], &mut rest[0]);

                read_subframe(&mut bits, bits_per_sample, mid)?;
                read_subframe(&mut bits, bits_per_sample + 1, side)?;

                decorrelate_mid_side(mid, side);
            }
            ChannelAssignment::RightSide => {
                if n_channels != 2 {
                    return decode_error("flac: right/side assignment requires 2 channels");
                }

                let (first, rest) = self.channel_bufs.split_at_mut(1);
                let (side, right) = (&mut first[0], &mut rest[0]);

                read_subframe(&mut bits, bits_per_sample + 1, side)?;
                read_subframe(&mut bits, bits_per_sample, right)?;

                decorrelate_right_side(right, side);
            }
        }

        // The frame footer is a CRC-16 over every byte of the frame, including the header, but
        // excluding the footer itself. Unlike the header CRC-8, a mismatch here is not a hard
        // decode error: RFC 9639 permits a decoder to surface the frame anyway.
        let mut crc16 = Crc16Ansi::new(0);
        crc16.process_buf_bytes(body);

        if crc16.crc() != footer_crc16 {
            warn!("flac: frame footer CRC-16 mismatch, outputting frame anyway");
        }

        if self.verify {
            self.validator.update(&self.channel_bufs, bits_per_sample);
        }

        let ts = match header.block_sequence {
            BlockSequence::BySample(sample) => sample,
            BlockSequence::ByFrame(frame) => {
                if self.nominal_block_len > 0 {
                    u64::from(frame) * self.nominal_block_len
                }
                else {
                    self.next_ts
                }
            }
        };

        self.next_ts = ts + n_samples as u64;

        Ok(FrameMeta { sample_rate, ts, n_samples, bits_per_sample })
    }
}

impl Decoder for FlacDecoder {
    fn try_new(info: &StreamInfo, options: DecoderOptions) -> Result<Self> {
        if !info.is_valid() {
            return decode_error("flac: invalid stream parameters");
        }

        let (nominal_block_len, expected_md5) = match &info.extra_data {
            Some(extra) => {
                let mut reader = BufReader::new(extra);
                let stream_info = common_flac::StreamInfo::read(&mut reader)?;
                (u64::from(stream_info.block_len_min), stream_info.md5)
            }
            None => (0, None),
        };

        Ok(FlacDecoder {
            sample_rate: info.sample_rate,
            channels: info.channels,
            bits_per_sample: info.bits_per_sample,
            nominal_block_len,
            expected_md5,
            verify: options.verify_checksums,
            validator: Validator::default(),
            pool: FramePool::new(),
            channel_bufs: vec![Vec::new(); info.channels as usize],
            next_ts: 0,
        })
    }

    fn decode(&mut self, chunk: &MediaChunk) -> Result<AudioFrame> {
        let meta = self.decode_inner(chunk)?;

        let n_channels = self.channel_bufs.len();
        let mut samples = self.pool.acquire(meta.n_samples * n_channels);
        samples.clear();

        for i in 0..meta.n_samples {
            for ch in self.channel_bufs.iter() {
                samples.push(rescale_to_i16(ch[i], meta.bits_per_sample));
            }
        }

        Ok(AudioFrame::from_pool(samples, meta.sample_rate, self.channels, meta.ts, self.pool.clone()))
    }

    fn flush(&mut self) -> Result<AudioFrame> {
        // Every MediaChunk carries exactly one complete frame; there is nothing buffered between
        // chunks to flush.
        Ok(AudioFrame::empty(self.sample_rate, self.channels))
    }

    fn reset(&mut self) {
        // No subframe state is carried between frames. The STREAMINFO MD5 checksum, however,
        // covers the decoded stream from the very first sample, so it can no longer be verified
        // once a seek has skipped part of the stream.
        if self.verify {
            self.verify = false;
            self.validator = Validator::default();
        }

        self.next_ts = 0;
    }

    fn finalize(&mut self) -> FinalizeResult {
        let mut result = FinalizeResult::default();

        if self.verify {
            if let Some(expected) = self.expected_md5 {
                let decoded = self.validator.md5();

                if log_enabled!(log::Level::Debug) {
                    use std::fmt::Write;

                    let mut expected_s = String::with_capacity(32);
                    let mut decoded_s = String::with_capacity(32);

                    expected.iter().for_each(|b| write!(expected_s, "{:02x}", b).unwrap());
                    decoded.iter().for_each(|b| write!(decoded_s, "{:02x}", b).unwrap());

                    debug!("verification: expected md5 = {}", expected_s);
                    debug!("verification: decoded md5  = {}", decoded_s);
                }

                result.verify_ok = Some(decoded == expected);
            }
            else {
                warn!("verification requested but the STREAMINFO md5 checksum was not provided");
            }
        }

        result
    }
}

// Subframe decoding.

#[derive(Debug)]
enum SubFrameType {
    Constant,
    Verbatim,
    FixedLinear(u32),
    Linear(u32),
}

fn read_subframe(bs: &mut BitstreamReader, frame_bps: u32, buf: &mut [i32]) -> Result<()> {
    // First sub-frame bit must always be 0.
    if bs.read_bits(1)? == 1 {
        return invalid_subframe_error("flac: subframe padding bit is not 0");
    }

    // Next 6 bits designate the sub-frame type.
    let subframe_type_enc = bs.read_bits(6)? as u32;

    let subframe_type = match subframe_type_enc {
        0x00 => SubFrameType::Constant,
        0x01 => SubFrameType::Verbatim,
        0x08..=0x0f => {
            let order = subframe_type_enc & 0x07;
            if order > 4 {
                return invalid_subframe_error("flac: fixed predictor orders greater than 4 are invalid");
            }
            SubFrameType::FixedLinear(order)
        }
        0x20..=0x3f => SubFrameType::Linear((subframe_type_enc & 0x1f) + 1),
        _ => return invalid_subframe_error("flac: subframe type set to reserved value"),
    };

    // Bit 7 of the sub-frame header designates whether any trailing ("wasted") bits per sample
    // were dropped from the audio sub-block. If set, unary decode the count of dropped bits.
    let dropped_bps = if bs.read_bits(1)? == 1 { bs.read_unary()? + 1 } else { 0 };

    let bps = frame_bps - dropped_bps;

    match subframe_type {
        SubFrameType::Constant => decode_constant(bs, bps, buf)?,
        SubFrameType::Verbatim => decode_verbatim(bs, bps, buf)?,
        SubFrameType::FixedLinear(order) => decode_fixed_linear(bs, bps, order, buf)?,
        SubFrameType::Linear(order) => decode_linear(bs, bps, order, buf)?,
    };

    samples_shl(dropped_bps, buf);

    Ok(())
}

#[inline(always)]
fn samples_shl(shift: u32, buf: &mut [i32]) {
    if shift > 0 {
        for sample in buf.iter_mut() {
            *sample = sample.wrapping_shl(shift);
        }
    }
}

fn decode_constant(bs: &mut BitstreamReader, bps: u32, buf: &mut [i32]) -> Result<()> {
    let const_sample = bs.read_bits_signed(bps)? as i32;

    for sample in buf.iter_mut() {
        *sample = const_sample;
    }

    Ok(())
}

fn decode_verbatim(bs: &mut BitstreamReader, bps: u32, buf: &mut [i32]) -> Result<()> {
    for sample in buf.iter_mut() {
        *sample = bs.read_bits_signed(bps)? as i32;
    }

    Ok(())
}

fn decode_fixed_linear(bs: &mut BitstreamReader, bps: u32, order: u32, buf: &mut [i32]) -> Result<()> {
    // The first `order` samples are encoded verbatim to warm-up the predictor.
    decode_verbatim(bs, bps, &mut buf[..order as usize])?;

    decode_residual(bs, order, buf)?;

    fixed_predict(order, buf)?;

    Ok(())
}

fn decode_linear(bs: &mut BitstreamReader, bps: u32, order: u32, buf: &mut [i32]) -> Result<()> {
    debug_assert!(order > 0 && order <= 32);

    // The first `order` samples are encoded verbatim to warm-up the predictor.
    decode_verbatim(bs, bps, &mut buf[0..order as usize])?;

    // Quantized linear predictor (QLP) coefficient precision, in bits.
    let qlp_precision = bs.read_bits(4)? as u32 + 1;
    if qlp_precision > 15 {
        return decode_error("flac: qlp precision set to reserved value");
    }

    // QLP coefficient shift, in [-16, 15]. Only non-negative shifts are supported by this
    // decoder; negative shifts appear only in pre-standardization FLAC streams.
    let qlp_coeff_shift = bs.read_bits_signed(5)? as i32;

    if qlp_coeff_shift < 0 {
        return unsupported_error("flac: lpc shifts less than 0 are not supported");
    }

    // Dispatch to a predictor specialized for the coefficient array size. Most FLAC streams use
    // an order <= 12; the larger arrays still work correctly for smaller orders, just with
    // zero-padding at their front.
    if order <= 4 {
        let mut qlp_coeffs = [0i32; 4];
        for c in qlp_coeffs[4 - order as usize..4].iter_mut() {
            *c = bs.read_bits_signed(qlp_precision)? as i32;
        }
        decode_residual(bs, order, buf)?;
        lpc_predict_4(order as usize, &qlp_coeffs, qlp_coeff_shift as u32, buf)?;
    }
    else if order <= 8 {
        let mut qlp_coeffs = [0i32; 8];
        for c in qlp_coeffs[8 - order as usize..8].iter_mut() {
            *c = bs.read_bits_signed(qlp_precision)? as i32;
        }
        decode_residual(bs, order, buf)?;
        lpc_predict_8(order as usize, &qlp_coeffs, qlp_coeff_shift as u32, buf)?;
    }
    else if order <= 12 {
        let mut qlp_coeffs = [0i32; 12];
        for c in qlp_coeffs[12 - order as usize..12].iter_mut() {
            *c = bs.read_bits_signed(qlp_precision)? as i32;
        }
        decode_residual(bs, order, buf)?;
        lpc_predict_12(order as usize, &qlp_coeffs, qlp_coeff_shift as u32, buf)?;
    }
    else {
        let mut qlp_coeffs = [0i32; 32];
        for c in qlp_coeffs[32 - order as usize..32].iter_mut() {
            *c = bs.read_bits_signed(qlp_precision)? as i32;
        }
        decode_residual(bs, order, buf)?;
        lpc_predict_32(order as usize, &qlp_coeffs, qlp_coeff_shift as u32, buf)?;
    }

    Ok(())
}

fn decode_residual(bs: &mut BitstreamReader, n_prelude_samples: u32, buf: &mut [i32]) -> Result<()> {
    let method_enc = bs.read_bits(2)? as u32;

    // The only difference between the Rice and Rice2 residual coding methods is the bit width of
    // the partition's Rice parameter.
    let param_bit_width = match method_enc {
        0x0 => 4,
        0x1 => 5,
        _ => return decode_error("flac: residual method set to reserved value"),
    };

    let order = bs.read_bits(4)? as u32;
    let n_partitions = 1usize << order;

    // Every partition has the same number of samples, except the first (and, if there is only
    // one partition, only) partition, which has `n_prelude_samples` fewer to account for the
    // warm-up samples stored verbatim in the subframe header.
    let n_partition_samples = buf.len() >> order;

    if n_prelude_samples as usize > n_partition_samples {
        return invalid_residual_error("flac: residual partition too small for predictor order");
    }

    if n_partitions * n_partition_samples != buf.len() {
        return invalid_residual_error("flac: block size does not match encoded residual");
    }

    decode_rice_partition(
        bs,
        param_bit_width,
        &mut buf[n_prelude_samples as usize..n_partition_samples],
    )?;

    for buf_chunk in buf[n_partition_samples..].chunks_mut(n_partition_samples) {
        decode_rice_partition(bs, param_bit_width, buf_chunk)?;
    }

    Ok(())
}

fn decode_rice_partition(bs: &mut BitstreamReader, param_bit_width: u32, buf: &mut [i32]) -> Result<()> {
    let rice_param = bs.read_bits(param_bit_width)? as u32;

    // A Rice parameter of all-1s (e.g. 0xf for a 4-bit parameter) signals that this partition's
    // residuals are binary (unencoded) rather than Rice coded.
    if rice_param < (1 << param_bit_width) - 1 {
        for sample in buf.iter_mut() {
            let residual = bs.read_rice(rice_param)?;

            if residual == i32::MIN {
                return invalid_residual_error("flac: residual equal to i32::MIN is not permitted");
            }

            *sample = residual;
        }
    }
    else {
        let residual_bits = bs.read_bits(5)? as u32;

        for sample in buf.iter_mut() {
            *sample = bs.read_bits_signed(residual_bits)? as i32;
        }
    }

    Ok(())
}

fn fixed_predict(order: u32, buf: &mut [i32]) -> Result<()> {
    debug_assert!(order <= 4);

    // The Fixed Predictor is a hard-coded version of the Linear Predictor up to order 4 with
    // fixed coefficients.
    match order {
        // A 0th order predictor always predicts 0: do nothing.
        0 => (),
        // s(i) = 1*s(i-1).
        1 => {
            for i in 1..buf.len() {
                buf[i] += buf[i - 1];
            }
        }
        // s(i) = 2*s(i-1) - 1*s(i-2).
        2 => {
            for i in 2..buf.len() {
                let a = Wrapping(-1) * Wrapping(i64::from(buf[i - 2]));
                let b = Wrapping(2) * Wrapping(i64::from(buf[i - 1]));
                buf[i] += (a + b).0 as i32;
            }
        }
        // s(i) = 3*s(i-1) - 3*s(i-2) + 1*s(i-3).
        3 => {
            for i in 3..buf.len() {
                let a = Wrapping(1) * Wrapping(i64::from(buf[i - 3]));
                let b = Wrapping(-3) * Wrapping(i64::from(buf[i - 2]));
                let c = Wrapping(3) * Wrapping(i64::from(buf[i - 1]));
                buf[i] += (a + b + c).0 as i32;
            }
        }
        // s(i) = 4*s(i-1) - 6*s(i-2) + 4*s(i-3) - 1*s(i-4).
        4 => {
            for i in 4..buf.len() {
                let a = Wrapping(-1) * Wrapping(i64::from(buf[i - 4]));
                let b = Wrapping(4) * Wrapping(i64::from(buf[i - 3]));
                let c = Wrapping(-6) * Wrapping(i64::from(buf[i - 2]));
                let d = Wrapping(4) * Wrapping(i64::from(buf[i - 1]));
                buf[i] += (a + b + c + d).0 as i32;
            }
        }
        _ => unreachable!(),
    };

    Ok(())
}

/// Generalized linear predictive coding (LPC) decoder macro for orders up to `$order`. Real
/// coefficient count is `order`, right-aligned in `coeffs` (unused leading slots are 0). The
/// first `order` samples of `buf` must already hold the warm-up samples.
macro_rules! lpc_predictor {
    ($func_name:ident, $order:expr) => {
        fn $func_name(order: usize, coeffs: &[i32; $order], coeff_shift: u32, buf: &mut [i32]) -> Result<()> {
            debug_assert!(order <= coeffs.len());
            debug_assert!(order <= buf.len());

            let n_prefill = cmp::min($order, buf.len()) - order;

            for i in order..order + n_prefill {
                let predicted = coeffs[$order - order..$order]
                    .iter()
                    .zip(&buf[i - order..i])
                    .map(|(&c, &sample)| i64::from(c) * i64::from(sample))
                    .sum::<i64>();

                buf[i] += (predicted >> coeff_shift) as i32;
            }

            if buf.len() <= $order {
                return Ok(());
            }

            for i in $order..buf.len() {
                // This unrolled form pipelines noticeably better than a zip-map-sum iterator
                // chain, since the latter forces a sum before each next multiply.
                let s = &buf[i - $order..i];

                let mut predicted = 0i64;

                for j in 0..($order / 4) {
                    let a = i64::from(coeffs[4 * j]) * i64::from(s[4 * j]);
                    let b = i64::from(coeffs[4 * j + 1]) * i64::from(s[4 * j + 1]);
                    let c = i64::from(coeffs[4 * j + 2]) * i64::from(s[4 * j + 2]);
                    let d = i64::from(coeffs[4 * j + 3]) * i64::from(s[4 * j + 3]);
                    predicted += a + b + c + d;
                }

                buf[i] += (predicted >> coeff_shift) as i32;
            }

            Ok(())
        }
    };
}

lpc_predictor!(lpc_predict_32, 32);
lpc_predictor!(lpc_predict_12, 12);
lpc_predictor!(lpc_predict_8, 8);
lpc_predictor!(lpc_predict_4, 4);

#[cfg(test)]
mod tests {
    use super::{decorrelate_left_side, decorrelate_mid_side, decorrelate_right_side};
    use super::rescale_to_i16;
    use super::{FlacDecoder, StreamInfo};
    use symphonia_core::checksum::{Crc16Ansi, Crc8Ccitt};
    use symphonia_core::codecs::{Decoder, DecoderOptions};
    use symphonia_core::io::Monitor;
    use symphonia_core::packet::MediaChunk;

    /// Builds a single fixed-blocksize FLAC frame for a two-channel, 16-bit, 44100 Hz stream,
    /// with the given CRC-8-covered header trailer bytes (whatever extra fields the block size
    /// or sample rate encoding demand) and subframe payload, computing both CRCs the same way
    /// `read_frame_header`/`decode_inner` check them.
    fn make_frame(desc: [u8; 2], header_trailer: &[u8], subframes: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&[0xFF, 0xF8]);
        body.extend_from_slice(&desc);
        body.extend_from_slice(header_trailer);

        let mut crc8 = Crc8Ccitt::new(0);
        crc8.process_buf_bytes(&body);
        body.push(crc8.crc());

        body.extend_from_slice(subframes);

        let mut crc16 = Crc16Ansi::new(0);
        crc16.process_buf_bytes(&body);
        body.extend_from_slice(&crc16.crc().to_be_bytes());

        body
    }

    fn stream_info() -> StreamInfo {
        StreamInfo {
            stream_id: 0,
            codec_name: "flac",
            sample_rate: 44_100,
            channels: 2,
            bits_per_sample: 16,
            duration_ms: None,
            extra_data: None,
        }
    }

    #[test]
    fn verify_constant_frame_end_to_end() {
        // desc: block_size_enc=0x1 (192), sample_rate_enc=0x9 (44100), channels_enc=0x1
        // (Independant(2)), bits_per_sample_enc=0x4 (16), reserved=0.
        let desc = [0x19, 0x18];
        // Frame number 0, fixed blocking strategy, single UTF-8-coded byte.
        let header_trailer = [0x00];

        let mut subframes = Vec::new();
        for _ in 0..2 {
            subframes.push(0x00); // pad=0, type=CONSTANT(0x00), wasted-bits flag=0
            subframes.extend_from_slice(&0x0100i16.to_be_bytes());
        }

        let frame_bytes = make_frame(desc, &header_trailer, &subframes);

        let mut decoder = FlacDecoder::try_new(&stream_info(), DecoderOptions::default()).unwrap();
        let chunk = MediaChunk::new(0, frame_bytes.into_boxed_slice());
        let frame = decoder.decode(&chunk).unwrap();

        assert_eq!(frame.channels(), 2);
        assert_eq!(frame.sample_rate(), 44_100);
        assert_eq!(frame.samples().len(), 384);
        assert!(frame.samples().iter().all(|&s| s == 0x0100));
    }

    #[test]
    fn verify_verbatim_frame_end_to_end_interleaves_channels() {
        // desc: block_size_enc=0x6 (explicit 8-bit block size follows), sample_rate_enc=0x9
        // (44100), channels_enc=0x1 (Independant(2)), bits_per_sample_enc=0x4 (16), reserved=0.
        let desc = [0x69, 0x18];
        // Frame number 0 (1 byte), then block size - 1 = 3 (1 byte).
        let header_trailer = [0x00, 0x03];

        let left = [0i16, 1, 2, 3];
        let right = [10i16, 20, 30, 40];

        let mut subframes = Vec::new();
        for channel in [&left, &right] {
            subframes.push(0x02); // pad=0, type=VERBATIM(0x01), wasted-bits flag=0
            for &sample in channel.iter() {
                subframes.extend_from_slice(&sample.to_be_bytes());
            }
        }

        let frame_bytes = make_frame(desc, &header_trailer, &subframes);

        let mut decoder = FlacDecoder::try_new(&stream_info(), DecoderOptions::default()).unwrap();
        let chunk = MediaChunk::new(0, frame_bytes.into_boxed_slice());
        let frame = decoder.decode(&chunk).unwrap();

        assert_eq!(frame.channels(), 2);
        assert_eq!(frame.samples(), &[0, 10, 1, 20, 2, 30, 3, 40]);
    }

    #[test]
    fn verify_left_side_decorrelation_is_involutive() {
        let left = [-1000i32, -1, 0, 1, 999, 1000, -713, 42];
        let right = [1000i32, -1000, 500, 0, -1, -999, -500, -1000];

        let mut side: Vec<i32> = left.iter().zip(&right).map(|(l, r)| l - r).collect();
        decorrelate_left_side(&left, &mut side);

        assert_eq!(side, right);
    }

    #[test]
    fn verify_right_side_decorrelation_is_involutive() {
        let left = [-1000i32, -1, 0, 1, 999, 1000, -713, 42];
        let right = [1000i32, -1000, 500, 0, -1, -999, -500, -1000];

        let mut side: Vec<i32> = left.iter().zip(&right).map(|(l, r)| l - r).collect();
        decorrelate_right_side(&right, &mut side);

        assert_eq!(side, left);
    }

    #[test]
    fn verify_mid_side_odd_side_matches_rfc_example() {
        // left=110, right=89 encodes to mid=(110+89)>>1=99 (floor division), side=110-89=21.
        // Decoding must recover the original samples despite side's odd parity.
        let mut mid = [99i32];
        let mut side = [21i32];
        decorrelate_mid_side(&mut mid, &mut side);
        assert_eq!(mid[0], 110);
        assert_eq!(side[0], 89);
    }

    #[test]
    fn verify_mid_side_decorrelation_is_involutive_with_encode() {
        fn encode_mid_side(left: &[i32], right: &[i32]) -> (Vec<i32>, Vec<i32>) {
            let mid = left.iter().zip(right).map(|(l, r)| (l + r) >> 1).collect();
            let side = left.iter().zip(right).map(|(l, r)| l - r).collect();
            (mid, side)
        }

        let samples_l = [-1000i32, -713, -1, 0, 1, 42, 999, 1000];
        let samples_r = [1000i32, -1000, 500, 0, -1, -999, -500, -1000];

        let (mut mid, mut side) = encode_mid_side(&samples_l, &samples_r);
        decorrelate_mid_side(&mut mid, &mut side);

        assert_eq!(mid, samples_l);
        assert_eq!(side, samples_r);
    }

    #[test]
    fn verify_mid_side_decorrelation_is_involutive_exhaustive_small_range() {
        for l in -50i32..=50 {
            for r in -50i32..=50 {
                let mut mid = [(l + r) >> 1];
                let mut side = [l - r];
                decorrelate_mid_side(&mut mid, &mut side);
                assert_eq!(mid[0], l);
                assert_eq!(side[0], r);
            }
        }
    }

    #[test]
    fn verify_rescale_copies_at_16_bits() {
        assert_eq!(rescale_to_i16(1234, 16), 1234);
        assert_eq!(rescale_to_i16(-1234, 16), -1234);
    }

    #[test]
    fn verify_rescale_shifts_up_for_shallower_depths() {
        assert_eq!(rescale_to_i16(1, 8), 1 << 8);
        assert_eq!(rescale_to_i16(1, 4), 1 << 12);
    }

    #[test]
    fn verify_rescale_rounds_for_deeper_depths() {
        assert_eq!(rescale_to_i16(0, 20), 0);
        // Half-integer results round towards positive infinity.
        assert_eq!(rescale_to_i16(8, 20), 1);
        assert_eq!(rescale_to_i16(-16, 20), -1);
        assert_eq!(rescale_to_i16(i32::MAX, 32), i16::MAX);
        assert_eq!(rescale_to_i16(i32::MIN, 32), i16::MIN);
    }

    #[test]
    fn verify_rescale_clamps() {
        assert_eq!(rescale_to_i16(i32::MAX, 8), i16::MAX);
        assert_eq!(rescale_to_i16(i32::MIN, 8), i16::MIN);
    }
}
