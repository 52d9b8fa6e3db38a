// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use symphonia_common::xiph::audio::flac::{
    read_seek_table_block, MetadataBlockHeader, MetadataBlockType, SeekTable, StreamInfo as FlacStreamInfo,
};
use symphonia_core::errors::{decode_error, end_of_stream_error, seek_error, Result, SeekErrorKind};
use symphonia_core::formats::{FormatOptions, FormatReader, StreamInfo};
use symphonia_core::io::{BufReader, MediaSourceStream, ReadBytes, Seek, SeekFrom};
use symphonia_core::packet::MediaChunk;
use symphonia_core::units::{ms_to_samples, samples_to_ms};

use crate::frame::{is_likely_frame_header, read_frame_header, sync_frame, BlockSequence, FLAC_MIN_FRAME_HEADER_SIZE};

/// The 4-byte marker every native FLAC stream begins with.
const FLAC_MARKER: [u8; 4] = *b"fLaC";

/// Number of bytes to append to the resync buffer at a time while searching for the next frame.
const RESYNC_CHUNK_LEN: usize = 8 * 1024;

/// `FlacReader` demuxes a native `.flac` file: the `fLaC` marker, its chain of metadata blocks,
/// and the frame stream that follows.
///
/// FLAC frames carry no explicit length field, so frame boundaries are found by scanning forward
/// for the next plausible frame header (`frame::is_likely_frame_header`) rather than by a
/// `PacketParser`-style fragment search: a native FLAC stream has exactly one logical stream and
/// no interleaving to resolve, so the simpler loop suffices.
pub struct FlacReader {
    reader: MediaSourceStream,
    streams: [StreamInfo; 1],
    seek_table: Option<SeekTable>,
    first_frame_pos: u64,
    nominal_block_len: u64,
    total_samples: Option<u64>,
    cur_sample: u64,
    /// Bytes already pulled from `reader` but not yet handed out as a chunk. Always begins with
    /// the sync of the frame currently being assembled.
    pending: Vec<u8>,
    eof: bool,
}

impl FlacReader {
    /// Reads the next frame's raw bytes (sync through footer CRC-16, exclusive of the following
    /// frame's sync) from `self.pending`/`self.reader`, or `None` at end of stream.
    fn next_frame_bytes(&mut self) -> Result<Option<Box<[u8]>>> {
        loop {
            if self.pending.len() >= 2 * FLAC_MIN_FRAME_HEADER_SIZE {
                let scan_end = self.pending.len() - FLAC_MIN_FRAME_HEADER_SIZE;
                let mut found = None;

                for i in FLAC_MIN_FRAME_HEADER_SIZE..scan_end {
                    if is_likely_frame_header(&self.pending[i..]) {
                        found = Some(i);
                        break;
                    }
                }

                if let Some(i) = found {
                    let frame: Vec<u8> = self.pending.drain(..i).collect();
                    return Ok(Some(frame.into_boxed_slice()));
                }
            }

            if self.eof {
                if self.pending.is_empty() {
                    return Ok(None);
                }
                let frame = std::mem::take(&mut self.pending);
                return Ok(Some(frame.into_boxed_slice()));
            }

            let start = self.pending.len();
            self.pending.resize(start + RESYNC_CHUNK_LEN, 0);
            let read = self.reader.read_buf(&mut self.pending[start..])?;
            self.pending.truncate(start + read);

            if read == 0 {
                self.eof = true;
            }
        }
    }

    /// Parses a frame's header to determine the sample-time position its first sample occupies.
    fn frame_start_sample(&self, body: &[u8]) -> Result<u64> {
        let mut header_reader = BufReader::new(body);
        let sync = sync_frame(&mut header_reader)?;
        let header = read_frame_header(&mut header_reader, sync)?;

        Ok(match header.block_sequence {
            BlockSequence::BySample(sample) => sample,
            BlockSequence::ByFrame(frame) if self.nominal_block_len > 0 => {
                u64::from(frame) * self.nominal_block_len
            }
            BlockSequence::ByFrame(_) => self.cur_sample,
        })
    }
}

impl FormatReader for FlacReader {
    fn try_new(mut source: MediaSourceStream, _options: FormatOptions) -> Result<Self> {
        let mut marker = [0u8; 4];
        source.read_buf_exact(&mut marker)?;

        if marker != FLAC_MARKER {
            return decode_error("flac: missing 'fLaC' stream marker");
        }

        let mut flac_info: Option<FlacStreamInfo> = None;
        let mut seek_table = None;

        loop {
            let header = MetadataBlockHeader::read(&mut source)?;

            match header.block_type {
                MetadataBlockType::StreamInfo => {
                    if !FlacStreamInfo::is_valid_size(u64::from(header.block_len)) {
                        return decode_error("flac: STREAMINFO block has the wrong size");
                    }
                    flac_info = Some(FlacStreamInfo::read(&mut source)?);
                }
                MetadataBlockType::SeekTable => {
                    seek_table = Some(read_seek_table_block(&mut source, header.block_len)?);
                }
                MetadataBlockType::Application
                | MetadataBlockType::VorbisComment
                | MetadataBlockType::Cuesheet
                | MetadataBlockType::Picture
                | MetadataBlockType::Padding
                | MetadataBlockType::Reserved(_) => {
                    source.ignore_bytes(u64::from(header.block_len))?;
                }
            }

            if header.is_last {
                break;
            }
        }

        let flac_info = match flac_info {
            Some(info) => info,
            None => return decode_error("flac: stream is missing a STREAMINFO block"),
        };

        let duration_ms = flac_info.n_samples.map(|n| samples_to_ms(n, flac_info.sample_rate));

        let streams = [StreamInfo {
            stream_id: 0,
            codec_name: "flac",
            sample_rate: flac_info.sample_rate,
            channels: flac_info.channels,
            bits_per_sample: flac_info.bits_per_sample,
            duration_ms,
            extra_data: Some(encode_streaminfo(&flac_info)),
        }];

        let first_frame_pos = source.pos();

        Ok(FlacReader {
            reader: source,
            streams,
            seek_table,
            first_frame_pos,
            nominal_block_len: u64::from(flac_info.block_len_min),
            total_samples: flac_info.n_samples,
            cur_sample: 0,
            pending: Vec::new(),
            eof: false,
        })
    }

    fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    fn next_chunk(&mut self) -> Result<MediaChunk> {
        let data = match self.next_frame_bytes()? {
            Some(data) => data,
            None => return end_of_stream_error(),
        };

        if data.len() < FLAC_MIN_FRAME_HEADER_SIZE + 2 {
            return decode_error("flac: frame is too small to contain a header and footer");
        }

        let body = &data[..data.len() - 2];
        let ts = self.frame_start_sample(body)?;
        self.cur_sample = ts;

        let mut chunk = MediaChunk::new(0, data);
        chunk.granule = Some(ts);

        Ok(chunk)
    }

    fn seek_to(&mut self, time_ms: u64) -> Result<()> {
        let sample_rate = self.streams[0].sample_rate;
        let target_sample = ms_to_samples(time_ms, sample_rate);

        if let Some(total) = self.total_samples {
            if target_sample > total {
                return seek_error(SeekErrorKind::OutOfRange);
            }
        }

        let seek_pos = match &self.seek_table {
            Some(table) if !table.points.is_empty() => {
                let point = table
                    .points
                    .iter()
                    .rev()
                    .find(|p| p.sample <= target_sample)
                    .unwrap_or(&table.points[0]);
                Some((self.first_frame_pos + point.offset, point.sample))
            }
            _ => None,
        };

        match seek_pos {
            Some((pos, sample)) => {
                self.reader.seek(SeekFrom::Start(pos))?;
                self.pending.clear();
                self.eof = false;
                self.cur_sample = sample;
            }
            None => {
                // No seek table, or the table has no point at or before the target: rewind to the
                // first frame and linear-scan forward.
                self.reader.seek(SeekFrom::Start(self.first_frame_pos))?;
                self.pending.clear();
                self.eof = false;
                self.cur_sample = 0;
            }
        }

        // Linear-scan forward from wherever we landed until the target sample is reached.
        loop {
            if self.cur_sample >= target_sample {
                break;
            }

            let data = match self.next_frame_bytes()? {
                Some(data) => data,
                None => break,
            };

            if data.len() < FLAC_MIN_FRAME_HEADER_SIZE + 2 {
                return decode_error("flac: frame is too small to contain a header and footer");
            }

            let body = &data[..data.len() - 2];
            let ts = self.frame_start_sample(body)?;

            if ts >= target_sample {
                // This frame covers the target: push it back so the next `next_chunk` returns it.
                self.cur_sample = ts;
                self.pending.splice(0..0, data.iter().copied());
                break;
            }

            self.cur_sample = ts;
        }

        Ok(())
    }

    fn is_eof(&self) -> bool {
        self.eof && self.pending.is_empty()
    }

    fn duration_ms(&mut self) -> Option<u64> {
        self.streams[0].duration_ms
    }

    fn position_ms(&self) -> u64 {
        samples_to_ms(self.cur_sample, self.streams[0].sample_rate)
    }
}

/// Re-encodes a parsed `FlacStreamInfo` back into its raw 34-byte STREAMINFO payload so it can be
/// stashed in `StreamInfo::extra_data` and handed to `FlacDecoder::try_new` unchanged.
fn encode_streaminfo(info: &FlacStreamInfo) -> Box<[u8]> {
    let mut buf = [0u8; 34];

    buf[0..2].copy_from_slice(&info.block_len_min.to_be_bytes());
    buf[2..4].copy_from_slice(&info.block_len_max.to_be_bytes());
    buf[4..7].copy_from_slice(&info.frame_byte_len_min.to_be_bytes()[1..]);
    buf[7..10].copy_from_slice(&info.frame_byte_len_max.to_be_bytes()[1..]);

    // Sample rate (20 bits), channels - 1 (3 bits), bits-per-sample - 1 (5 bits), and total
    // samples (36 bits) pack into the next 8 bytes, big-endian, bit-for-bit.
    let packed: u64 = (u64::from(info.sample_rate) << 44)
        | (u64::from(info.channels - 1) << 41)
        | (u64::from(info.bits_per_sample - 1) << 36)
        | info.n_samples.unwrap_or(0);

    buf[10..18].copy_from_slice(&packed.to_be_bytes());

    match info.md5 {
        Some(md5) => buf[18..34].copy_from_slice(&md5),
        None => buf[18..34].fill(0),
    }

    Box::new(buf)
}

#[cfg(test)]
mod tests {
    use super::encode_streaminfo;
    use symphonia_common::xiph::audio::flac::StreamInfo as FlacStreamInfo;
    use symphonia_core::io::BufReader;

    #[test]
    fn verify_streaminfo_round_trips_through_raw_encoding() {
        let info = FlacStreamInfo {
            block_len_min: 4096,
            block_len_max: 4096,
            frame_byte_len_min: 100,
            frame_byte_len_max: 2000,
            sample_rate: 44_100,
            channels: 2,
            bits_per_sample: 16,
            n_samples: Some(123_456),
            md5: Some([0xab; 16]),
        };

        let encoded = encode_streaminfo(&info);
        let mut reader = BufReader::new(&encoded);
        let decoded = FlacStreamInfo::read(&mut reader).unwrap();

        assert_eq!(decoded.block_len_min, info.block_len_min);
        assert_eq!(decoded.block_len_max, info.block_len_max);
        assert_eq!(decoded.sample_rate, info.sample_rate);
        assert_eq!(decoded.channels, info.channels);
        assert_eq!(decoded.bits_per_sample, info.bits_per_sample);
        assert_eq!(decoded.n_samples, info.n_samples);
        assert_eq!(decoded.md5, info.md5);
    }
}
