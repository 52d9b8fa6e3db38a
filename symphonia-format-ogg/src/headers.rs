// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Recognizes a BOS packet's codec and parses its standardized header sequence (identification,
//! comment, and any codec-specific setup headers) into a `CodecHeader` summary.

use symphonia_common::xiph::audio::flac::{
    MetadataBlockHeader, MetadataBlockType, StreamInfo as FlacStreamInfo,
};
use symphonia_core::errors::{decode_error, unsupported_error, Result};
use symphonia_core::io::{BufReader, ReadBytes};

const VORBIS_PACKET_TYPE_IDENTIFICATION: u8 = 1;
const VORBIS_PACKET_TYPE_COMMENT: u8 = 3;
const VORBIS_PACKET_TYPE_SETUP: u8 = 5;
const VORBIS_HEADER_PACKET_SIGNATURE: &[u8] = b"vorbis";
const VORBIS_IDENTIFICATION_HEADER_SIZE: usize = 30;
const VORBIS_VERSION: u32 = 0;
const VORBIS_BLOCKSIZE_MIN: u8 = 6;
const VORBIS_BLOCKSIZE_MAX: u8 = 13;

const OGG_OPUS_MAGIC_SIGNATURE: &[u8] = b"OpusHead";
const OGG_OPUS_MIN_IDENTIFICATION_PACKET_SIZE: usize = 19;
const OGG_OPUS_MAPPING_VERSION_MAX: u8 = 0x0f;

const OGG_FLAC_HEADER_SIGNATURE: &[u8] = b"FLAC";
const OGG_FLAC_PACKET_TYPE: u8 = 0x7f;
const OGG_FLAC_MAPPING_MAJOR_VERSION: u8 = 1;
const OGG_FLAC_HEADER_PACKET_SIZE: usize = 51;
const FLAC_SIGNATURE: &[u8] = b"fLaC";

const SPEEX_HEADER_SIGNATURE: &[u8] = b"Speex   ";
const SPEEX_HEADER_SIZE: usize = 80;

/// The codec identified from a stream's BOS packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodecKind {
    Vorbis,
    Opus,
    FlacInOgg,
    Speex,
}

/// Summary of the fields `CodecHeaderParser` extracts from a logical stream's header packets.
#[derive(Clone, Debug)]
pub struct CodecHeader {
    pub codec_name: &'static str,
    pub sample_rate: u32,
    pub channels: u32,
    pub bits_per_sample: u32,
    /// Opus encoder delay, in samples at 48 kHz. Zero for every other codec.
    pub pre_skip: u16,
    pub extra_data: Option<Box<[u8]>>,
}

/// Incrementally consumes a logical stream's standardized header packets (BOS, then the
/// codec-specific comment/setup sequence) and reports `headers_complete` once every required
/// header has been seen.
pub struct CodecHeaderParser {
    kind: CodecKind,
    header: CodecHeader,
    headers_seen: u32,
    headers_needed: u32,
}

impl CodecHeaderParser {
    /// Inspects a BOS packet and, if its codec is recognized, returns a parser seeded with the
    /// identification header it decoded.
    pub fn detect(bos_packet: &[u8]) -> Result<Option<Self>> {
        if bos_packet.len() >= 7 && bos_packet[0] == 0x01 && &bos_packet[1..7] == b"vorbis" {
            return Ok(Some(parse_vorbis_ident(bos_packet)?));
        }

        if bos_packet.len() >= OGG_OPUS_MAGIC_SIGNATURE.len()
            && &bos_packet[..OGG_OPUS_MAGIC_SIGNATURE.len()] == OGG_OPUS_MAGIC_SIGNATURE
        {
            return Ok(Some(parse_opus_ident(bos_packet)?));
        }

        if bos_packet.len() >= 5 && bos_packet[0] == OGG_FLAC_PACKET_TYPE && &bos_packet[1..5] == OGG_FLAC_HEADER_SIGNATURE
        {
            return Ok(Some(parse_flac_ident(bos_packet)?));
        }

        if bos_packet.len() >= SPEEX_HEADER_SIGNATURE.len()
            && &bos_packet[..SPEEX_HEADER_SIGNATURE.len()] == SPEEX_HEADER_SIGNATURE
        {
            return Ok(Some(parse_speex_ident(bos_packet)?));
        }

        Ok(None)
    }

    pub fn kind(&self) -> CodecKind {
        self.kind
    }

    pub fn header(&self) -> &CodecHeader {
        &self.header
    }

    pub fn headers_complete(&self) -> bool {
        self.headers_seen >= self.headers_needed
    }

    /// Feeds the next packet of the logical stream (the header packets that follow the BOS
    /// identification packet) into the parser. Must not be called again once
    /// `headers_complete` returns true.
    pub fn feed(&mut self, packet: &[u8]) -> Result<()> {
        match self.kind {
            CodecKind::Vorbis => self.feed_vorbis(packet),
            CodecKind::Opus => self.feed_opus(packet),
            CodecKind::FlacInOgg => self.feed_flac(packet),
            CodecKind::Speex => self.feed_speex(packet),
        }
    }

    fn feed_vorbis(&mut self, packet: &[u8]) -> Result<()> {
        let packet_type = packet.first().copied().unwrap_or(0);

        match packet_type {
            VORBIS_PACKET_TYPE_COMMENT => {
                self.headers_seen += 1;
            }
            VORBIS_PACKET_TYPE_SETUP => {
                self.header.extra_data = Some(Box::from(packet));
                self.headers_seen += 1;
            }
            _ => return decode_error("ogg (vorbis): expected a comment or setup header packet"),
        }

        Ok(())
    }

    fn feed_opus(&mut self, packet: &[u8]) -> Result<()> {
        if packet.len() < 8 || &packet[..8] != b"OpusTags" {
            return decode_error("ogg (opus): expected a comment header packet");
        }

        self.headers_seen += 1;

        Ok(())
    }

    fn feed_flac(&mut self, packet: &[u8]) -> Result<()> {
        // Every header packet after the BOS packet is a native FLAC metadata block: a 4-byte
        // `MetadataBlockHeader` followed by its payload.
        let mut reader = BufReader::new(packet);
        let header = MetadataBlockHeader::read(&mut reader)?;

        match header.block_type {
            MetadataBlockType::SeekTable | MetadataBlockType::VorbisComment => {
                // Pass-through only; not retained.
                reader.ignore_bytes(u64::from(header.block_len))?;
            }
            _ => {
                reader.ignore_bytes(u64::from(header.block_len))?;
            }
        }

        self.headers_seen += 1;

        Ok(())
    }

    fn feed_speex(&mut self, packet: &[u8]) -> Result<()> {
        // The second Speex header is a VorbisComment-style comment block; no further structural
        // validation is required of it.
        let _ = packet;
        self.headers_seen += 1;

        Ok(())
    }
}

fn parse_vorbis_ident(buf: &[u8]) -> Result<CodecHeaderParser> {
    if buf.len() != VORBIS_IDENTIFICATION_HEADER_SIZE {
        return decode_error("ogg (vorbis): identification header has the wrong size");
    }

    let mut reader = BufReader::new(buf);

    let packet_type = reader.read_u8()?;
    if packet_type != VORBIS_PACKET_TYPE_IDENTIFICATION {
        return decode_error("ogg (vorbis): invalid packet type for identification header");
    }

    let mut sig = [0; 6];
    reader.read_buf_exact(&mut sig)?;
    if sig != VORBIS_HEADER_PACKET_SIGNATURE {
        return decode_error("ogg (vorbis): invalid header signature");
    }

    let version = reader.read_u32()?;
    if version != VORBIS_VERSION {
        return unsupported_error("ogg (vorbis): only vorbis 1 is supported");
    }

    let channels = reader.read_u8()?;
    if channels == 0 {
        return decode_error("ogg (vorbis): number of channels cannot be 0");
    }

    let sample_rate = reader.read_u32()?;
    if sample_rate == 0 {
        return decode_error("ogg (vorbis): sample rate cannot be 0");
    }

    let _bitrate_max = reader.read_u32()?;
    let _bitrate_nom = reader.read_u32()?;
    let _bitrate_min = reader.read_u32()?;

    let block_sizes = reader.read_u8()?;
    let bs0_exp = block_sizes & 0x0f;
    let bs1_exp = (block_sizes & 0xf0) >> 4;

    if !(VORBIS_BLOCKSIZE_MIN..=VORBIS_BLOCKSIZE_MAX).contains(&bs0_exp)
        || !(VORBIS_BLOCKSIZE_MIN..=VORBIS_BLOCKSIZE_MAX).contains(&bs1_exp)
        || bs0_exp > bs1_exp
    {
        return decode_error("ogg (vorbis): blocksize_0/blocksize_1 out-of-bounds");
    }

    let framing = reader.read_u8()?;
    if framing & 0x1 != 1 {
        return decode_error("ogg (vorbis): invalid framing bit");
    }

    Ok(CodecHeaderParser {
        kind: CodecKind::Vorbis,
        header: CodecHeader {
            codec_name: "vorbis",
            sample_rate,
            channels: u32::from(channels),
            bits_per_sample: 0,
            pre_skip: 0,
            extra_data: Some(Box::from(buf)),
        },
        headers_seen: 1,
        headers_needed: 3,
    })
}

fn parse_opus_ident(buf: &[u8]) -> Result<CodecHeaderParser> {
    if buf.len() < OGG_OPUS_MIN_IDENTIFICATION_PACKET_SIZE {
        return decode_error("ogg (opus): identification header is too small");
    }

    let mut reader = BufReader::new(buf);

    let mut magic = [0; 8];
    reader.read_buf_exact(&mut magic)?;

    let version = reader.read_u8()?;
    if version > OGG_OPUS_MAPPING_VERSION_MAX {
        return unsupported_error("ogg (opus): unsupported mapping version");
    }

    let channels = reader.read_u8()?;
    if channels == 0 {
        return decode_error("ogg (opus): channel count cannot be 0");
    }

    let pre_skip = reader.read_u16()?;
    let _input_sample_rate = reader.read_u32()?;
    let _output_gain = reader.read_u16()?;
    let _channel_mapping = reader.read_u8()?;

    Ok(CodecHeaderParser {
        kind: CodecKind::Opus,
        header: CodecHeader {
            codec_name: "opus",
            // Opus always decodes at 48 kHz regardless of the informational input sample rate.
            sample_rate: 48_000,
            channels: u32::from(channels),
            bits_per_sample: 0,
            pre_skip,
            extra_data: Some(Box::from(buf)),
        },
        headers_seen: 1,
        headers_needed: 2,
    })
}

fn parse_flac_ident(buf: &[u8]) -> Result<CodecHeaderParser> {
    if buf.len() != OGG_FLAC_HEADER_PACKET_SIZE {
        return decode_error("ogg (flac): identification header has the wrong size");
    }

    let mut reader = BufReader::new(buf);

    let packet_type = reader.read_u8()?;
    if packet_type != OGG_FLAC_PACKET_TYPE {
        return decode_error("ogg (flac): invalid packet type for identification header");
    }

    let mut sig = [0; 4];
    reader.read_buf_exact(&mut sig)?;
    if sig != OGG_FLAC_HEADER_SIGNATURE {
        return decode_error("ogg (flac): invalid header signature");
    }

    let major_version = reader.read_u8()?;
    let _minor_version = reader.read_u8()?;
    if major_version != OGG_FLAC_MAPPING_MAJOR_VERSION {
        return unsupported_error("ogg (flac): unsupported flac-in-ogg mapping version");
    }

    let num_header_packets = reader.read_u16()?;

    let mut native_sig = [0; 4];
    reader.read_buf_exact(&mut native_sig)?;
    if native_sig != FLAC_SIGNATURE {
        return decode_error("ogg (flac): missing native 'fLaC' marker");
    }

    let header = MetadataBlockHeader::read(&mut reader)?;
    if header.block_type != MetadataBlockType::StreamInfo {
        return decode_error("ogg (flac): first native metadata block is not STREAMINFO");
    }

    if !FlacStreamInfo::is_valid_size(u64::from(header.block_len)) {
        return decode_error("ogg (flac): STREAMINFO block has the wrong size");
    }

    let info = FlacStreamInfo::read(&mut reader)?;

    // One more header-count packet remains beyond the BOS packet for every additional metadata
    // block the stream declares (minus the STREAMINFO block, consumed above).
    let headers_needed = u32::from(num_header_packets.max(1));

    Ok(CodecHeaderParser {
        kind: CodecKind::FlacInOgg,
        header: CodecHeader {
            codec_name: "flac",
            sample_rate: info.sample_rate,
            channels: info.channels,
            bits_per_sample: info.bits_per_sample,
            pre_skip: 0,
            extra_data: Some(Box::from(buf)),
        },
        headers_seen: 1,
        headers_needed,
    })
}

fn parse_speex_ident(buf: &[u8]) -> Result<CodecHeaderParser> {
    if buf.len() < SPEEX_HEADER_SIZE {
        return decode_error("ogg (speex): identification header is too small");
    }

    let mut reader = BufReader::new(buf);

    let mut sig = [0; 8];
    reader.read_buf_exact(&mut sig)?;

    let mut version_string = [0; 20];
    reader.read_buf_exact(&mut version_string)?;

    let _version_id = reader.read_u32()?;
    let _header_size = reader.read_u32()?;
    let sample_rate = reader.read_u32()?;
    let _mode = reader.read_u32()?;
    let _mode_bitstream_version = reader.read_u32()?;
    let channels = reader.read_u32()?;

    if sample_rate == 0 {
        return decode_error("ogg (speex): sample rate cannot be 0");
    }

    if channels == 0 {
        return decode_error("ogg (speex): number of channels cannot be 0");
    }

    Ok(CodecHeaderParser {
        kind: CodecKind::Speex,
        header: CodecHeader {
            codec_name: "speex",
            sample_rate,
            channels,
            bits_per_sample: 0,
            pre_skip: 0,
            extra_data: Some(Box::from(buf)),
        },
        headers_seen: 1,
        headers_needed: 2,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vorbis_ident_packet(sample_rate: u32, channels: u8) -> Vec<u8> {
        let mut buf = vec![0u8; VORBIS_IDENTIFICATION_HEADER_SIZE];
        buf[0] = VORBIS_PACKET_TYPE_IDENTIFICATION;
        buf[1..7].copy_from_slice(VORBIS_HEADER_PACKET_SIGNATURE);
        buf[7..11].copy_from_slice(&VORBIS_VERSION.to_le_bytes());
        buf[11] = channels;
        buf[12..16].copy_from_slice(&sample_rate.to_le_bytes());
        buf[28] = (8 << 4) | 6; // bs1_exp=8, bs0_exp=6
        buf[29] = 1; // framing bit
        buf
    }

    #[test]
    fn verify_vorbis_ident_detected() {
        let packet = vorbis_ident_packet(44_100, 2);
        let parser = CodecHeaderParser::detect(&packet).unwrap().unwrap();
        assert_eq!(parser.kind(), CodecKind::Vorbis);
        assert_eq!(parser.header().sample_rate, 44_100);
        assert_eq!(parser.header().channels, 2);
        assert!(!parser.headers_complete());
    }

    #[test]
    fn verify_vorbis_headers_complete_after_comment_and_setup() {
        let packet = vorbis_ident_packet(44_100, 2);
        let mut parser = CodecHeaderParser::detect(&packet).unwrap().unwrap();
        parser.feed(&[VORBIS_PACKET_TYPE_COMMENT]).unwrap();
        assert!(!parser.headers_complete());
        parser.feed(&[VORBIS_PACKET_TYPE_SETUP]).unwrap();
        assert!(parser.headers_complete());
    }

    #[test]
    fn verify_opus_ident_detected() {
        let mut buf = vec![0u8; OGG_OPUS_MIN_IDENTIFICATION_PACKET_SIZE];
        buf[..8].copy_from_slice(b"OpusHead");
        buf[8] = 1; // version
        buf[9] = 2; // channels
        buf[10..12].copy_from_slice(&312u16.to_le_bytes()); // pre-skip

        let mut parser = CodecHeaderParser::detect(&buf).unwrap().unwrap();
        assert_eq!(parser.kind(), CodecKind::Opus);
        assert_eq!(parser.header().sample_rate, 48_000);
        assert_eq!(parser.header().pre_skip, 312);
        assert!(!parser.headers_complete());
        parser.feed(b"OpusTags").unwrap();
        assert!(parser.headers_complete());
    }

    #[test]
    fn verify_non_matching_packet_returns_none() {
        let packet = [0u8; 10];
        assert!(CodecHeaderParser::detect(&packet).unwrap().is_none());
    }
}
