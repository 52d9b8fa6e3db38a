// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Readers for the FLAC metadata block types (RFC 9639 §8): STREAMINFO, PADDING, APPLICATION,
//! SEEKTABLE, VORBIS_COMMENT, CUESHEET, and PICTURE.

use std::ascii;

use symphonia_core::errors::{decode_error, Result};
use symphonia_core::io::{BitstreamReader, ReadBytes};
use symphonia_core::meta::{StandardTagKey, Tag, Value, VendorData};

pub use symphonia_metadata::embedded::flac::{read_comment_block, read_picture_block};

/// The type of a FLAC metadata block, decoded from the low 7 bits of a block header's first byte.
/// Block type 127 is forbidden by RFC 9639 §8.1 since it would collide with the frame sync code
/// if a decoder lost synchronization; types in 7-126 are reserved for future use.
#[derive(Debug, PartialEq, Eq)]
pub enum MetadataBlockType {
    StreamInfo,
    Padding,
    Application,
    SeekTable,
    VorbisComment,
    Cuesheet,
    Picture,
    Reserved(u8),
}

/// A decoded metadata block header.
pub struct MetadataBlockHeader {
    /// True if this is the last metadata block before the first frame.
    pub is_last: bool,
    pub block_type: MetadataBlockType,
    /// The length of the block's payload in bytes, not including this header.
    pub block_len: u32,
}

impl MetadataBlockHeader {
    /// Reads a metadata block header.
    pub fn read<B: ReadBytes>(reader: &mut B) -> Result<MetadataBlockHeader> {
        let header_enc = reader.read_u8()?;

        let is_last = (header_enc & 0x80) == 0x80;
        let block_type_id = header_enc & 0x7f;

        let block_type = match block_type_id {
            0 => MetadataBlockType::StreamInfo,
            1 => MetadataBlockType::Padding,
            2 => MetadataBlockType::Application,
            3 => MetadataBlockType::SeekTable,
            4 => MetadataBlockType::VorbisComment,
            5 => MetadataBlockType::Cuesheet,
            6 => MetadataBlockType::Picture,
            127 => return decode_error("flac: metadata block type 127 is forbidden"),
            other => MetadataBlockType::Reserved(other),
        };

        let block_len = reader.read_be_u24()?;

        Ok(MetadataBlockHeader { is_last, block_type, block_len })
    }
}

/// The decoded STREAMINFO block (RFC 9639 §8.2). Channel count and bits-per-sample are plain
/// integer counts, not a speaker-position bitmask.
#[derive(Debug, Default, Clone)]
pub struct StreamInfo {
    /// The minimum and maximum number of samples in a block of audio, in [16, 65535].
    pub block_len_min: u16,
    pub block_len_max: u16,
    /// The minimum and maximum byte length of an encoded frame. Either may be 0 if unknown.
    pub frame_byte_len_min: u32,
    pub frame_byte_len_max: u32,
    /// The sample rate in Hz, in [1, 655_350].
    pub sample_rate: u32,
    /// The number of channels, in [1, 8].
    pub channels: u32,
    /// The bit depth of each sample, in [4, 32].
    pub bits_per_sample: u32,
    /// The total number of inter-channel samples in the stream, if known.
    pub n_samples: Option<u64>,
    /// The MD5 checksum of the unencoded audio data, if present (all-zero means absent).
    pub md5: Option<[u8; 16]>,
}

impl StreamInfo {
    /// The fixed on-disk size, in bytes, of a STREAMINFO block payload.
    pub const BLOCK_SIZE: u64 = 34;

    /// Reads a STREAMINFO block.
    pub fn read<B: ReadBytes>(reader: &mut B) -> Result<StreamInfo> {
        let mut info = StreamInfo::default();

        info.block_len_min = reader.read_be_u16()?;
        info.block_len_max = reader.read_be_u16()?;

        if info.block_len_min < 16 || info.block_len_max < 16 {
            return decode_error("flac: minimum block length is 16 samples");
        }

        if info.block_len_max < info.block_len_min {
            return decode_error("flac: maximum block length is less than the minimum block length");
        }

        info.frame_byte_len_min = reader.read_be_u24()?;
        info.frame_byte_len_max = reader.read_be_u24()?;

        if info.frame_byte_len_min > 0
            && info.frame_byte_len_max > 0
            && info.frame_byte_len_max < info.frame_byte_len_min
        {
            return decode_error("flac: maximum frame length is less than the minimum frame length");
        }

        // The sample rate (20 bits), channel count minus one (3 bits), bits-per-sample minus one
        // (5 bits), and total sample count (36 bits) pack into exactly 8 bytes.
        let mut packed = [0u8; 8];
        reader.read_buf_exact(&mut packed)?;

        let mut bits = BitstreamReader::new();
        bits.feed(&packed);

        info.sample_rate = bits.read_bits(20)? as u32;

        if info.sample_rate < 1 || info.sample_rate > 655_350 {
            return decode_error("flac: stream sample rate out of bounds");
        }

        let channels_enc = bits.read_bits(3)? as u32 + 1;
        info.channels = channels_enc;

        if !(1..=8).contains(&info.channels) {
            return decode_error("flac: stream channels are out of bounds");
        }

        info.bits_per_sample = bits.read_bits(5)? as u32 + 1;

        if !(4..=32).contains(&info.bits_per_sample) {
            return decode_error("flac: stream bits per sample are out of bounds");
        }

        info.n_samples = match bits.read_bits(36)? {
            0 => None,
            samples => Some(samples),
        };

        let mut md5 = [0; 16];
        reader.read_buf_exact(&mut md5)?;

        if md5 != [0; 16] {
            info.md5 = Some(md5);
        }

        Ok(info)
    }

    /// Checks if `size` is the valid on-disk size of a STREAMINFO block.
    pub fn is_valid_size(size: u64) -> bool {
        size == Self::BLOCK_SIZE
    }
}

/// A single entry of a SEEKTABLE block.
#[derive(Debug, Clone, Copy)]
pub struct SeekPoint {
    /// The sample number of the first sample in the target frame.
    pub sample: u64,
    /// The byte offset of the target frame from the first byte of the first frame.
    pub offset: u64,
    /// The number of samples in the target frame.
    pub frame_samples: u32,
}

/// A decoded SEEKTABLE block (RFC 9639 §8.3). Placeholder points (sample value `0xffff_ffff_ffff_ffff`)
/// are omitted.
#[derive(Debug, Clone, Default)]
pub struct SeekTable {
    pub points: Vec<SeekPoint>,
}

/// Reads a SEEKTABLE block. `block_length` is the header's declared payload length in bytes.
pub fn read_seek_table_block<B: ReadBytes>(reader: &mut B, block_length: u32) -> Result<SeekTable> {
    const SEEK_POINT_SIZE: u32 = 18;

    let count = block_length / SEEK_POINT_SIZE;
    let mut table = SeekTable { points: Vec::with_capacity(count as usize) };
    let mut last_sample: Option<u64> = None;

    for _ in 0..count {
        let sample = reader.read_be_u64()?;

        if sample != 0xffff_ffff_ffff_ffff {
            if let Some(last) = last_sample {
                if sample <= last {
                    return decode_error("flac: seek table points are not in strictly ascending order");
                }
            }
            last_sample = Some(sample);

            let offset = reader.read_be_u64()?;
            let frame_samples = u32::from(reader.read_be_u16()?);
            table.points.push(SeekPoint { sample, offset, frame_samples });
        }
        else {
            // The remaining 10 bytes of a placeholder point are undefined but must still be
            // consumed.
            reader.ignore_bytes(10)?;
        }
    }

    Ok(table)
}

/// A single index point within a CUESHEET track.
#[derive(Debug, Clone, Copy)]
pub struct CueIndexPoint {
    /// The sample offset of this index point, relative to the track's own offset.
    pub offset: u64,
    /// The index point number (0 or 1 for the first index of a CD-DA track).
    pub number: u8,
}

/// A single track within a CUESHEET block.
#[derive(Debug, Clone)]
pub struct CueSheetTrack {
    /// The track number. 0 is disallowed; 170 designates the CD-DA lead-out track.
    pub number: u32,
    /// The track's ISRC, if present (12 printable-ASCII characters, may be all-zero/empty).
    pub isrc: String,
    /// Whether this is an audio track (vs. e.g. a data track on a mixed-mode CD).
    pub is_audio: bool,
    /// Whether the track has pre-emphasis applied.
    pub use_pre_emphasis: bool,
    /// The sample offset of the track relative to the start of the CUESHEET's lead-in.
    pub start_offset: u64,
    pub points: Vec<CueIndexPoint>,
}

/// A decoded CUESHEET block (RFC 9639 §8.7).
#[derive(Debug, Clone)]
pub struct CueSheet {
    /// The media catalog number, if present.
    pub catalog_number: String,
    /// The number of lead-in samples, non-zero only for CD-DA cuesheets.
    pub n_lead_in_samples: u64,
    /// True if the cuesheet corresponds to a Compact Disc.
    pub is_cdda: bool,
    pub tracks: Vec<CueSheetTrack>,
}

/// Reads a CUESHEET block.
pub fn read_cuesheet_block<B: ReadBytes>(reader: &mut B) -> Result<CueSheet> {
    let mut catalog_number_buf = vec![0u8; 128];
    reader.read_buf_exact(&mut catalog_number_buf)?;

    let catalog_number = match printable_ascii_to_string(&catalog_number_buf) {
        Some(s) => s,
        None => return decode_error("flac: cuesheet catalog number contains invalid characters"),
    };

    let n_lead_in_samples = reader.read_be_u64()?;

    let is_cdda = (reader.read_u8()? & 0x80) == 0x80;

    if !is_cdda && n_lead_in_samples > 0 {
        return decode_error("flac: cuesheet lead-in samples should be zero if not CD-DA");
    }

    // 258 reserved bytes, read as 129 u16s, must be zero.
    for _ in 0..129 {
        if reader.read_be_u16()? != 0 {
            return decode_error("flac: cuesheet reserved bits should be zero");
        }
    }

    let n_tracks = reader.read_u8()?;

    if n_tracks == 0 {
        return decode_error("flac: cuesheet must have at-least one track");
    }

    if is_cdda && n_tracks > 100 {
        return decode_error("flac: cuesheets for CD-DA must not have more than 100 tracks");
    }

    let mut tracks = Vec::with_capacity(n_tracks as usize);

    for _ in 0..n_tracks {
        tracks.push(read_cuesheet_track(reader, is_cdda)?);
    }

    Ok(CueSheet { catalog_number, n_lead_in_samples, is_cdda, tracks })
}

fn read_cuesheet_track<B: ReadBytes>(reader: &mut B, is_cdda: bool) -> Result<CueSheetTrack> {
    let start_offset = reader.read_be_u64()?;

    if is_cdda && start_offset % 588 != 0 {
        return decode_error("flac: cuesheet track sample offset is not a multiple of 588 for CD-DA");
    }

    let number = u32::from(reader.read_u8()?);

    if number == 0 {
        return decode_error("flac: cuesheet track number of 0 not allowed");
    }

    if is_cdda && number > 99 && number != 170 {
        return decode_error("flac: cuesheet track numbers greater than 99 are not allowed for CD-DA");
    }

    let mut isrc_buf = vec![0u8; 12];
    reader.read_buf_exact(&mut isrc_buf)?;

    let isrc = match printable_ascii_to_string(&isrc_buf) {
        Some(s) => s,
        None => return decode_error("flac: cuesheet track ISRC contains invalid characters"),
    };

    let flags = reader.read_be_u16()?;

    let is_audio = (flags & 0x8000) == 0x0000;
    let use_pre_emphasis = (flags & 0x4000) == 0x4000;

    if flags & 0x3fff != 0 {
        return decode_error("flac: cuesheet track reserved bits should be zero");
    }

    for _ in 0..3 {
        if reader.read_be_u32()? != 0 {
            return decode_error("flac: cuesheet track reserved bits should be zero");
        }
    }

    let n_indices = reader.read_u8()? as usize;

    if is_cdda && n_indices > 100 {
        return decode_error("flac: cuesheet track indices cannot exceed 100 for CD-DA");
    }

    let mut points = Vec::with_capacity(n_indices);

    for _ in 0..n_indices {
        points.push(read_cuesheet_track_index(reader, is_cdda)?);
    }

    Ok(CueSheetTrack { number, isrc, is_audio, use_pre_emphasis, start_offset, points })
}

fn read_cuesheet_track_index<B: ReadBytes>(reader: &mut B, is_cdda: bool) -> Result<CueIndexPoint> {
    let offset = reader.read_be_u64()?;
    let idx_point_enc = reader.read_be_u32()?;

    if is_cdda && offset % 588 != 0 {
        return decode_error(
            "flac: cuesheet track index point sample offset is not a multiple of 588 for CD-DA",
        );
    }

    if idx_point_enc & 0x00ff_ffff != 0 {
        return decode_error("flac: cuesheet track index reserved bits should be 0");
    }

    let number = ((idx_point_enc & 0xff00_0000) >> 24) as u8;

    Ok(CueIndexPoint { offset, number })
}

/// Reads a vendor-specific APPLICATION block (RFC 9639 §8.6). `block_length` is the header's
/// declared payload length, including the 4-byte application identifier.
pub fn read_application_block<B: ReadBytes>(reader: &mut B, block_length: u32) -> Result<VendorData> {
    let ident_buf = reader.read_quad_bytes()?;
    let ident = String::from_utf8(
        ident_buf.as_ref().iter().copied().flat_map(ascii::escape_default).collect(),
    )
    .unwrap();

    let data = reader.read_boxed_slice_exact(block_length as usize - 4)?;
    Ok(VendorData { ident, data })
}

/// Converts a string of bytes to an ASCII string if all characters are within the printable ASCII
/// range. If a null byte is encountered, the string terminates at that point.
fn printable_ascii_to_string(bytes: &[u8]) -> Option<String> {
    let mut result = String::with_capacity(bytes.len());

    for c in bytes {
        match c {
            0x00 => break,
            0x20..=0x7e => result.push(char::from(*c)),
            _ => return None,
        }
    }

    Some(result)
}

/// Builds a stand-in ISRC tag for a cuesheet track, matching the convention used by FLAC's
/// embedded VORBIS_COMMENT reader for standard tag assignment.
pub fn isrc_tag(isrc: &str) -> Tag {
    Tag::new(Some(StandardTagKey::IdentIsrc), "ISRC", Value::from(isrc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use symphonia_core::io::BufReader;

    #[test]
    fn verify_metadata_block_header() {
        let mut reader = BufReader::new(&[0x84, 0x00, 0x00, 0x22]);
        let header = MetadataBlockHeader::read(&mut reader).unwrap();
        assert!(header.is_last);
        assert_eq!(header.block_type, MetadataBlockType::StreamInfo);
        assert_eq!(header.block_len, 0x22);
    }

    #[test]
    fn verify_metadata_block_type_127_forbidden() {
        let mut reader = BufReader::new(&[0x7f, 0x00, 0x00, 0x00]);
        assert!(MetadataBlockHeader::read(&mut reader).is_err());
    }

    #[test]
    fn verify_stream_info_rejects_short_block() {
        assert!(!StreamInfo::is_valid_size(33));
        assert!(StreamInfo::is_valid_size(34));
    }

    #[test]
    fn verify_seek_table_skips_placeholders() {
        let mut data = Vec::new();
        // One real point: sample=0, offset=0, frame_samples=4096.
        data.extend_from_slice(&0u64.to_be_bytes());
        data.extend_from_slice(&0u64.to_be_bytes());
        data.extend_from_slice(&4096u16.to_be_bytes());
        // One placeholder point.
        data.extend_from_slice(&0xffff_ffff_ffff_ffffu64.to_be_bytes());
        data.extend_from_slice(&[0u8; 10]);

        let mut reader = BufReader::new(&data);
        let table = read_seek_table_block(&mut reader, data.len() as u32).unwrap();

        assert_eq!(table.points.len(), 1);
        assert_eq!(table.points[0].frame_samples, 4096);
    }
}
