// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;

use symphonia_core::errors::{decode_error, end_of_stream_error, seek_error, CoreError, Result, SeekErrorKind};
use symphonia_core::formats::{FormatOptions, FormatReader, StreamInfo};
use symphonia_core::io::{MediaSource, MediaSourceStream, ReadBytes, Seek, SeekFrom};
use symphonia_core::packet::MediaChunk;

use crate::headers::CodecHeaderParser;
use crate::seek::{granule_to_ms, ms_to_granule, seek_to_granule, GRANULE_UNKNOWN};
use crate::stream::LogicalStream;
use crate::sync::{find_last_page_before, PageReader};

/// The bits of a logical stream's identification header that the demuxer needs after the
/// header-scanning phase is over (everything else lives in its `StreamInfo`).
struct StreamMeta {
    codec_name: &'static str,
    sample_rate: u32,
    pre_skip: u64,
}

/// `OggDemuxer` demuxes an OGG container: it synchronizes on pages, reassembles each logical
/// bitstream's packets, and identifies and parses the standardized header packets of every
/// logical stream present before handing packets off as `MediaChunk`s.
///
/// The first logical stream encountered (the first BOS page in the file) is treated as the
/// primary stream: `seek_to`, `is_eof`, `duration_ms`, and `position_ms` all refer to it.
pub struct OggDemuxer {
    reader: MediaSourceStream,
    page_reader: PageReader,
    streams: Vec<StreamInfo>,
    meta: Vec<StreamMeta>,
    logical: HashMap<i32, LogicalStream>,
    stream_index: HashMap<i32, usize>,
    serial_order: Vec<i32>,
    primary_serial: i32,
    byte_len: Option<u64>,
    /// Set once the primary stream's EOS page has been read. Distinct from `is_eof`: packets
    /// already queued from that page still need to be drained before the stream is truly over.
    primary_eos_seen: bool,
    cur_granule: u64,
    duration_ms: Option<u64>,
}

impl OggDemuxer {
    /// Dispatches the page `self.page_reader` currently holds to its logical stream's packet
    /// reassembler. Pages belonging to an unrecognized or unseen serial are silently dropped.
    fn route_current_page(&mut self) -> Result<()> {
        let serial = self.page_reader.header().serial;

        if let Some(stream) = self.logical.get_mut(&serial) {
            let page = self.page_reader.page();
            stream.read_page(&page)?;
        }

        Ok(())
    }

    /// Computes the primary stream's duration by scanning backward from the end of the stream
    /// for the last page carrying its serial, without disturbing the demuxer's read position.
    fn compute_duration(&mut self) -> Option<u64> {
        let byte_len = self.byte_len?;
        let saved_pos = self.reader.pos();

        let found = find_last_page_before(&mut self.reader, byte_len, Some(self.primary_serial));

        // `find_last_page_before` leaves the reader positioned arbitrarily on failure and at the
        // found page on success; either way, restore the position the demuxer was at before this
        // scan started.
        let _ = self.reader.seek(SeekFrom::Start(saved_pos));

        let (_, header) = found?;

        if header.absgp == GRANULE_UNKNOWN {
            return None;
        }

        let index = *self.stream_index.get(&self.primary_serial)?;
        let meta = &self.meta[index];

        Some(granule_to_ms(header.absgp, meta.codec_name, meta.sample_rate, meta.pre_skip))
    }
}

impl FormatReader for OggDemuxer {
    fn try_new(mut source: MediaSourceStream, options: FormatOptions) -> Result<Self> {
        let byte_len = source.byte_len();
        let mut page_reader = PageReader::try_new(&mut source)?;

        /// Per-serial state tracked only while a logical stream's header packets are still being
        /// collected.
        struct PendingEntry {
            parser: CodecHeaderParser,
            stream: LogicalStream,
        }

        let mut entries: HashMap<i32, PendingEntry> = HashMap::new();
        let mut serial_order: Vec<i32> = Vec::new();
        let mut unrecognized: std::collections::HashSet<i32> = std::collections::HashSet::new();

        // Header-scanning phase: BOS pages identify each logical stream's codec, and the pages
        // that follow carry the rest of its standardized header sequence (comment/setup packets
        // for Vorbis/Opus/Speex, further native metadata blocks for FLAC-in-OGG). The loop exits
        // the moment it reads a page that isn't contributing to an incomplete header sequence —
        // that page is the first page of actual packet data and has not been fed to any logical
        // stream yet, unlike every page the loop consumed on the way here.
        let first_data_page_pending = loop {
            let header = page_reader.header();

            if header.is_first_page {
                if !entries.contains_key(&header.serial) && !unrecognized.contains(&header.serial) {
                    let page = page_reader.page();

                    match page.packets().next() {
                        Some(packet) => match CodecHeaderParser::detect(packet)? {
                            Some(parser) => {
                                serial_order.push(header.serial);
                                entries.insert(
                                    header.serial,
                                    PendingEntry { parser, stream: LogicalStream::new() },
                                );
                            }
                            None => {
                                unrecognized.insert(header.serial);
                            }
                        },
                        None => {
                            unrecognized.insert(header.serial);
                        }
                    }
                }

                match page_reader.try_next_page(&mut source) {
                    Ok(()) => continue,
                    Err(CoreError::EndOfFile) => break false,
                    Err(e) => return Err(e),
                }
            }

            let needs_headers = entries
                .get(&header.serial)
                .map(|entry| !entry.parser.headers_complete())
                .unwrap_or(false);

            if !needs_headers {
                break true;
            }

            {
                let page = page_reader.page();
                let entry = entries.get_mut(&header.serial).expect("checked above");
                entry.stream.read_page(&page)?;

                while let Some(packet) = entry.stream.next_packet() {
                    entry.parser.feed(&packet.data)?;
                }
            }

            match page_reader.try_next_page(&mut source) {
                Ok(()) => continue,
                Err(CoreError::EndOfFile) => break false,
                Err(e) => return Err(e),
            }
        };

        if serial_order.is_empty() {
            return decode_error("ogg: no recognized logical streams");
        }

        let mut streams = Vec::with_capacity(serial_order.len());
        let mut meta = Vec::with_capacity(serial_order.len());
        let mut logical = HashMap::with_capacity(serial_order.len());
        let mut stream_index = HashMap::with_capacity(serial_order.len());

        for (index, serial) in serial_order.iter().enumerate() {
            let entry = entries.remove(serial).expect("serial was recorded in serial_order");

            if !entry.parser.headers_complete() {
                return decode_error("ogg: logical stream's header packets were truncated");
            }

            let header = entry.parser.header().clone();

            // Vorbis, Opus, and Speex carry no fixed encoded bit depth (Vorbis is a floating
            // point codec); output is always resampled to 16-bit PCM regardless, so report that
            // as the nominal depth rather than leaving the field at the invalid sentinel 0.
            let bits_per_sample = if header.bits_per_sample > 0 { header.bits_per_sample } else { 16 };

            let stream_info = StreamInfo {
                stream_id: i64::from(*serial),
                codec_name: header.codec_name,
                sample_rate: header.sample_rate,
                channels: header.channels,
                bits_per_sample,
                duration_ms: None,
                extra_data: header.extra_data,
            };

            if !stream_info.is_valid() {
                return decode_error("ogg: logical stream has invalid parameters");
            }

            streams.push(stream_info);
            meta.push(StreamMeta {
                codec_name: header.codec_name,
                sample_rate: header.sample_rate,
                pre_skip: u64::from(header.pre_skip),
            });
            logical.insert(*serial, entry.stream);
            stream_index.insert(*serial, index);
        }

        let primary_serial = serial_order[0];

        let mut demuxer = OggDemuxer {
            reader: source,
            page_reader,
            streams,
            meta,
            logical,
            stream_index,
            serial_order,
            primary_serial,
            byte_len,
            primary_eos_seen: false,
            cur_granule: 0,
            duration_ms: None,
        };

        // The page that ended the header-scanning loop above is the first page of actual packet
        // data; route it now so it isn't lost.
        demuxer.route_current_page()?;

        if options.eager_duration {
            demuxer.duration_ms = demuxer.compute_duration();
        }

        Ok(demuxer)
    }

    fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    fn next_chunk(&mut self) -> Result<MediaChunk> {
        loop {
            for &serial in &self.serial_order {
                if let Some(stream) = self.logical.get_mut(&serial) {
                    if let Some(packet) = stream.next_packet() {
                        if serial == self.primary_serial {
                            if let Some(granule) = packet.granule {
                                self.cur_granule = granule;
                            }
                        }

                        return Ok(MediaChunk::with_granule(
                            i64::from(serial),
                            packet.data,
                            packet.granule,
                        ));
                    }
                }
            }

            if self.primary_eos_seen {
                return end_of_stream_error();
            }

            match self.page_reader.next_page(&mut self.reader) {
                Ok(()) => {
                    let header = self.page_reader.header();
                    let is_primary_eos = header.serial == self.primary_serial && header.is_last_page;

                    self.route_current_page()?;

                    if is_primary_eos {
                        self.primary_eos_seen = true;
                    }
                }
                Err(CoreError::EndOfFile) => {
                    self.primary_eos_seen = true;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn seek_to(&mut self, time_ms: u64) -> Result<()> {
        let index = *self
            .stream_index
            .get(&self.primary_serial)
            .expect("primary stream is always indexed");

        let target_granule = {
            let meta = &self.meta[index];
            ms_to_granule(time_ms, meta.codec_name, meta.sample_rate, meta.pre_skip)
        };

        let byte_len = match self.byte_len {
            Some(len) => len,
            None => return seek_error(SeekErrorKind::Unseekable),
        };

        let outcome = seek_to_granule(&mut self.reader, byte_len, self.primary_serial, target_granule)?;

        let outcome = match outcome {
            Some(outcome) => outcome,
            None => return seek_error(SeekErrorKind::OutOfRange),
        };

        self.page_reader = PageReader::try_new(&mut self.reader)?;

        for stream in self.logical.values_mut() {
            stream.reset();
        }

        self.cur_granule = outcome.granule;
        self.primary_eos_seen = false;

        self.route_current_page()?;

        Ok(())
    }

    fn is_eof(&self) -> bool {
        self.primary_eos_seen
            && self.logical.get(&self.primary_serial).map_or(true, |stream| !stream.has_packets())
    }

    fn duration_ms(&mut self) -> Option<u64> {
        if self.duration_ms.is_none() {
            self.duration_ms = self.compute_duration();
        }

        self.duration_ms
    }

    fn position_ms(&self) -> u64 {
        let index = self.stream_index[&self.primary_serial];
        let meta = &self.meta[index];

        granule_to_ms(self.cur_granule, meta.codec_name, meta.sample_rate, meta.pre_skip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symphonia_core::checksum::Crc32;
    use symphonia_core::io::{Monitor, MediaSourceStreamOptions};

    const FLAG_BOS: u8 = 0x02;
    const FLAG_EOS: u8 = 0x04;

    /// Builds a one-page-per-call OGG page carrying a single packet, with a correct CRC-32.
    fn make_page(serial: i32, sequence: u32, absgp: u64, flags: u8, payload: &[u8]) -> Vec<u8> {
        assert!(payload.len() < 255, "test helper only builds single-segment pages");

        let mut page = Vec::new();
        page.extend_from_slice(b"OggS");
        page.push(0); // version
        page.push(flags);
        page.extend_from_slice(&absgp.to_le_bytes());
        page.extend_from_slice(&serial.to_le_bytes());
        page.extend_from_slice(&sequence.to_le_bytes());
        page.extend_from_slice(&[0u8; 4]); // crc placeholder
        page.push(1); // one segment
        page.push(payload.len() as u8);
        page.extend_from_slice(payload);

        let mut header_for_crc = page.clone();
        header_for_crc[22..26].copy_from_slice(&[0u8; 4]);

        let mut crc32 = Crc32::new(0);
        crc32.process_buf_bytes(&header_for_crc);
        page[22..26].copy_from_slice(&crc32.crc().to_le_bytes());

        page
    }

    fn opus_ident_packet(pre_skip: u16) -> Vec<u8> {
        let mut buf = vec![0u8; 19];
        buf[..8].copy_from_slice(b"OpusHead");
        buf[8] = 1; // version
        buf[9] = 1; // channels
        buf[10..12].copy_from_slice(&pre_skip.to_le_bytes());
        buf
    }

    fn opus_comment_packet() -> Vec<u8> {
        b"OpusTags".to_vec()
    }

    fn mss(buf: Vec<u8>) -> MediaSourceStream {
        MediaSourceStream::new(Box::new(std::io::Cursor::new(buf)), MediaSourceStreamOptions::default())
    }

    /// A minimal single-Opus-stream OGG file: BOS page, comment page, one data page carrying
    /// `data_granule` and the EOS flag.
    fn opus_file(serial: i32, data_granule: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&make_page(serial, 0, 0, FLAG_BOS, &opus_ident_packet(312)));
        buf.extend_from_slice(&make_page(serial, 1, 0, 0, &opus_comment_packet()));
        buf.extend_from_slice(&make_page(serial, 2, data_granule, FLAG_EOS, &[0xAB, 0xCD]));
        buf
    }

    #[test]
    fn verify_parse_container_skips_garbage_prefix() {
        let mut buf = vec![0u8; 7];
        buf.extend_from_slice(&opus_file(1234, 960));

        let reader = mss(buf);
        let demuxer = OggDemuxer::try_new(reader, FormatOptions::default()).unwrap();

        assert_eq!(demuxer.streams().len(), 1);
        assert_eq!(demuxer.streams()[0].codec_name, "opus");
        assert_eq!(demuxer.streams()[0].sample_rate, 48_000);
    }

    #[test]
    fn verify_negative_serial_is_preserved() {
        let serial: i32 = -975_925_429;
        let reader = mss(opus_file(serial, 960));
        let demuxer = OggDemuxer::try_new(reader, FormatOptions::default()).unwrap();

        assert_eq!(demuxer.streams()[0].stream_id, i64::from(serial));
    }

    #[test]
    fn verify_duration_from_opus_granule_and_pre_skip() {
        // pre_skip = 312, granule = 48_312 -> (48_312 - 312) / 48_000 * 1000 = 1000 ms.
        let reader = mss(opus_file(99, 48_312));
        let mut demuxer = OggDemuxer::try_new(reader, FormatOptions::default()).unwrap();

        assert_eq!(demuxer.duration_ms(), Some(1000));
    }

    #[test]
    fn verify_next_chunk_reaches_eof_after_data_page() {
        let reader = mss(opus_file(7, 960));
        let mut demuxer = OggDemuxer::try_new(reader, FormatOptions::default()).unwrap();

        let chunk = demuxer.next_chunk().unwrap();
        assert_eq!(chunk.stream_id(), 7i64);
        assert_eq!(chunk.data(), &[0xAB, 0xCD]);

        assert!(demuxer.next_chunk().is_err());
        assert!(demuxer.is_eof());
    }
}
