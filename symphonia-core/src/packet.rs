// Symphonia
// Copyright (c) 2019-2026 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `packet` module defines `MediaChunk`, the codec-layer unit passed from a demuxer to a
//! decoder.

use crate::io::BufReader;

/// A `MediaChunk` is one opaque, codec-layer packet extracted by a demuxer. It is consumed exactly
/// once by the codec bound to `stream_id`.
#[derive(Clone)]
pub struct MediaChunk {
    /// The stream this chunk belongs to. Matches `StreamInfo::stream_id`, including negative Ogg
    /// serial numbers.
    stream_id: i64,
    /// The packet payload.
    data: Box<[u8]>,
    /// The granule position (demuxer/codec-specific timestamp) carried by this chunk, if known.
    pub granule: Option<u64>,
    /// Whether this chunk begins a decodable unit without reference to prior chunks (e.g. a FLAC
    /// frame boundary). Ogg packets are always keyframes from the demuxer's perspective; the
    /// flag exists for codecs with GOP-like structure.
    pub keyframe: bool,
}

impl MediaChunk {
    /// Creates a new `MediaChunk` for `stream_id` from `data`.
    pub fn new(stream_id: i64, data: Box<[u8]>) -> Self {
        MediaChunk { stream_id, data, granule: None, keyframe: true }
    }

    /// Creates a new `MediaChunk` carrying an explicit granule position.
    pub fn with_granule(stream_id: i64, data: Box<[u8]>, granule: Option<u64>) -> Self {
        MediaChunk { stream_id, data, granule, keyframe: true }
    }

    /// The stream this chunk belongs to.
    pub fn stream_id(&self) -> i64 {
        self.stream_id
    }

    /// The packet payload.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// A `BufReader` over the packet payload.
    pub fn reader(&self) -> BufReader<'_> {
        BufReader::new(&self.data)
    }
}
