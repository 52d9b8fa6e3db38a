// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-logical-stream packet reassembly: takes whole pages and emits packets, stitching
//! continuation segments across page boundaries.

use std::collections::VecDeque;

use symphonia_core::errors::{decode_error, Result};

use crate::sync::Page;

/// A packet is the concatenation of consecutive segments whose length bytes were all 255 except
/// the last; `granule` is `Some` only for the packet that terminated the page it arrived on, per
/// the OGG framing rule that a page's granule position describes its last completed packet.
pub struct PendingPacket {
    pub data: Box<[u8]>,
    pub granule: Option<u64>,
}

/// Guards against a corrupt stream accumulating an unbounded partial packet.
const MAX_PARTIAL_PACKET_LEN: usize = 10 * 1024 * 1024;

/// Backpressure limit on completed packets awaiting consumption. A consumer that stalls while
/// pages keep arriving hits this before memory grows unbounded.
const MAX_QUEUED_PACKETS: usize = 100;

/// Holds per-serial packet reassembly state for one logical OGG bitstream.
#[derive(Default)]
pub struct LogicalStream {
    packets: VecDeque<PendingPacket>,
    partial: Vec<u8>,
    last_sequence: Option<u32>,
}

impl LogicalStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a page's packets to this stream's queue.
    ///
    /// `page.packets()` already reassembles any run of 255-byte segments into a single complete
    /// packet within the page; the only cross-page stitching left to do here is joining a page's
    /// leading packet to a partial packet still buffered from the previous page when the
    /// continuation flag is set.
    ///
    /// If the page is not a continuation but a partial packet is still buffered from a previous
    /// page, the stream has lost its place (e.g. after a discontinuity); the partial data is
    /// discarded.
    pub fn read_page(&mut self, page: &Page<'_>) -> Result<()> {
        if let Some(last_sequence) = self.last_sequence {
            if page.header.sequence != last_sequence.wrapping_add(1) {
                log::warn!(
                    "ogg: page sequence discontinuity on serial={:#x} ({} -> {})",
                    page.header.serial,
                    last_sequence,
                    page.header.sequence,
                );
            }
        }
        self.last_sequence = Some(page.header.sequence);

        if !page.header.is_continuation && !self.partial.is_empty() {
            log::warn!(
                "ogg: dropping {} buffered bytes on non-continuation page for serial={:#x}",
                self.partial.len(),
                page.header.serial,
            );
            self.partial.clear();
        }

        let granule = if page.header.absgp == u64::MAX { None } else { Some(page.header.absgp) };
        let has_trailing_partial = page.packets().partial_packet().is_some();

        let completed: Vec<&[u8]> = page.packets().collect();
        let n_completed = completed.len();

        for (i, segment) in completed.into_iter().enumerate() {
            let data: Box<[u8]> = if i == 0 && !self.partial.is_empty() {
                self.partial.extend_from_slice(segment);
                std::mem::take(&mut self.partial).into_boxed_slice()
            }
            else {
                Box::from(segment)
            };

            // The page's granule position describes only the last packet the page completes; if
            // the page ends with a trailing partial packet, no packet completes on this page.
            let is_last_on_page = i + 1 == n_completed && !has_trailing_partial;

            if self.packets.len() >= MAX_QUEUED_PACKETS {
                return decode_error("ogg: packet queue is full, consumer is not keeping up");
            }

            self.packets.push_back(PendingPacket {
                data,
                granule: if is_last_on_page { granule } else { None },
            });
        }

        if let Some(partial) = page.packets().partial_packet() {
            if self.partial.len() + partial.len() > MAX_PARTIAL_PACKET_LEN {
                return decode_error("ogg: partial packet exceeds maximum length");
            }
            self.partial.extend_from_slice(partial);
        }

        Ok(())
    }

    /// Pops the next completed packet, if any are queued.
    pub fn next_packet(&mut self) -> Option<PendingPacket> {
        self.packets.pop_front()
    }

    pub fn has_packets(&self) -> bool {
        !self.packets.is_empty()
    }

    /// Drops all buffered state. Used after a seek repositions the underlying reader.
    pub fn reset(&mut self) {
        self.packets.clear();
        self.partial.clear();
        self.last_sequence = None;
    }
}

#[cfg(test)]
mod tests {
    use super::LogicalStream;
    use crate::sync::PageReader;
    use std::io::Cursor;
    use symphonia_core::io::{MediaSourceStream, MediaSourceStreamOptions, Monitor};

    fn make_page_bytes(serial: u32, sequence: u32, absgp: u64, segments: &[&[u8]]) -> Vec<u8> {
        let mut seg_table = Vec::new();
        let mut body = Vec::new();

        for seg in segments {
            let mut remaining = seg.len();
            if remaining == 0 {
                seg_table.push(0);
            }
            while remaining >= 255 {
                seg_table.push(255);
                remaining -= 255;
            }
            seg_table.push(remaining as u8);
            body.extend_from_slice(seg);
        }

        let mut page = Vec::new();
        page.extend_from_slice(b"OggS");
        page.push(0); // version
        page.push(0); // flags
        page.extend_from_slice(&absgp.to_le_bytes());
        page.extend_from_slice(&serial.to_le_bytes());
        page.extend_from_slice(&sequence.to_le_bytes());
        page.extend_from_slice(&[0u8; 4]); // crc placeholder, filled below
        page.push(seg_table.len() as u8);
        page.extend_from_slice(&seg_table);
        page.extend_from_slice(&body);

        let mut crc32 = symphonia_core::checksum::Crc32::new(0);
        let mut header_for_crc = page.clone();
        header_for_crc[22..26].copy_from_slice(&[0u8; 4]);
        crc32.process_buf_bytes(&header_for_crc);
        let crc = crc32.crc();
        page[22..26].copy_from_slice(&crc.to_le_bytes());

        page
    }

    #[test]
    fn verify_single_packet_page() {
        let page_bytes = make_page_bytes(1, 0, 100, &[b"hello"]);
        let mut mss = MediaSourceStream::new(
            Box::new(Cursor::new(page_bytes)),
            MediaSourceStreamOptions::default(),
        );
        let mut pages = PageReader::try_new(&mut mss).unwrap();
        let page = pages.page();

        let mut stream = LogicalStream::new();
        stream.read_page(&page).unwrap();

        let packet = stream.next_packet().unwrap();
        assert_eq!(&*packet.data, b"hello");
        assert_eq!(packet.granule, Some(100));
        assert!(!stream.has_packets());
    }
}
