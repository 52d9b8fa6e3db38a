// Symphonia
// Copyright (c) 2019-2026 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `formats` module defines `StreamInfo`, the `FormatReader` trait every demuxer implements,
//! and the demuxer registry.

use std::collections::HashMap;

use crate::errors::Result;
use crate::io::MediaSourceStream;
use crate::packet::MediaChunk;

/// Per-stream parameters a demuxer publishes once, at container parse time, and which remain
/// fixed for the stream's lifetime.
#[derive(Clone, Debug)]
pub struct StreamInfo {
    /// The stream's identifier, unique within its container. Ogg logical stream ids are signed
    /// 32-bit serial numbers and are stored verbatim, including negative values.
    pub stream_id: i64,
    /// Lower-case codec name token: `"flac"`, `"vorbis"`, `"opus"`, `"pcm"`, `"alaw"`, `"mulaw"`,
    /// `"mp3"`, `"speex"`.
    pub codec_name: &'static str,
    /// The sample rate in Hz.
    pub sample_rate: u32,
    /// The channel count, in `[1, 8]`.
    pub channels: u32,
    /// The bits-per-sample of the *encoded* stream, in `[4, 32]`. Output is always resampled to
    /// 16-bit PCM regardless of this value.
    pub bits_per_sample: u32,
    /// Total duration in milliseconds, if known at parse time.
    pub duration_ms: Option<u64>,
    /// Opaque, codec-specific setup bytes (e.g. a FLAC STREAMINFO block, a Vorbis setup header).
    pub extra_data: Option<Box<[u8]>>,
}

impl StreamInfo {
    /// Returns true if this descriptor satisfies the invariants every `StreamInfo` must uphold:
    /// a positive sample rate and a channel count between 1 and 8 inclusive.
    pub fn is_valid(&self) -> bool {
        self.sample_rate > 0 && (1..=8).contains(&self.channels)
    }
}

/// Options common to every `FormatReader`.
#[derive(Copy, Clone)]
pub struct FormatOptions {
    /// Trim encoder delay/padding samples signalled by the container (e.g. Opus pre-skip) from
    /// the decoded output.
    pub enable_gapless: bool,
    /// Eagerly compute `duration_ms` for every stream during `try_new` rather than lazily on the
    /// first `duration_ms()` call.
    pub eager_duration: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        FormatOptions { enable_gapless: true, eager_duration: false }
    }
}

/// A `FormatReader` demuxes a container format: it pulls bytes from a `MediaSourceStream`,
/// identifies logical streams, and emits `MediaChunk`s for the codec layer to decode.
pub trait FormatReader: Send {
    /// Probes and parses the container, reading as far as every active logical stream's header
    /// sequence, and returns the constructed reader.
    fn try_new(source: MediaSourceStream, options: FormatOptions) -> Result<Self>
    where
        Self: Sized;

    /// The streams discovered during container parsing.
    fn streams(&self) -> &[StreamInfo];

    /// Reads and returns the next `MediaChunk` belonging to any active stream.
    fn next_chunk(&mut self) -> Result<MediaChunk>;

    /// Reads and returns the next `MediaChunk` belonging specifically to `stream_id`, skipping
    /// chunks from other streams.
    fn next_chunk_for(&mut self, stream_id: i64) -> Result<MediaChunk> {
        loop {
            let chunk = self.next_chunk()?;
            if chunk.stream_id() == stream_id {
                return Ok(chunk);
            }
        }
    }

    /// Seeks the primary stream to the nearest position at or before `time_ms`.
    fn seek_to(&mut self, time_ms: u64) -> Result<()>;

    /// True once the primary stream has been fully consumed.
    fn is_eof(&self) -> bool;

    /// The primary stream's total duration in milliseconds, if known.
    fn duration_ms(&mut self) -> Option<u64>;

    /// The primary stream's current playback position in milliseconds.
    fn position_ms(&self) -> u64;
}

/// A demuxer constructor registered under a format id.
pub type FormatConstructor = fn(MediaSourceStream, FormatOptions) -> Result<Box<dyn FormatReader>>;

/// `FormatRegistry` maps a format id (as produced by `crate::probe::FormatIdentifier`) to a
/// demuxer constructor. Registration happens once, at process start; lookups afterwards are
/// read-only.
#[derive(Default)]
pub struct FormatRegistry {
    demuxers: HashMap<&'static str, FormatConstructor>,
}

impl FormatRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        FormatRegistry::default()
    }

    /// Registers a demuxer constructor under `format_id`.
    pub fn register_demuxer(&mut self, format_id: &'static str, ctor: FormatConstructor) {
        self.demuxers.insert(format_id, ctor);
    }

    /// Instantiates the demuxer registered for `format_id`, if any.
    pub fn make_format_reader(
        &self,
        format_id: &str,
        source: MediaSourceStream,
        options: FormatOptions,
    ) -> Option<Result<Box<dyn FormatReader>>> {
        self.demuxers.get(format_id).map(|ctor| ctor(source, options))
    }
}
