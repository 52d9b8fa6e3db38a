// Symphonia
// Copyright (c) 2019-2026 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `codecs` module defines the `Decoder` trait every codec implements, and the codec
//! registry consulted once a demuxer has published its `StreamInfo` list.

use std::collections::HashMap;

use crate::audio::AudioFrame;
use crate::errors::Result;
use crate::formats::StreamInfo;
use crate::packet::MediaChunk;

/// Options common to every `Decoder`.
#[derive(Copy, Clone, Default)]
pub struct DecoderOptions {
    /// Verify a codec-level integrity checksum during `finalize`, where supported (e.g. the FLAC
    /// STREAMINFO MD5 of decoded audio).
    pub verify_checksums: bool,
}

/// The outcome of `Decoder::finalize`.
#[derive(Default)]
pub struct FinalizeResult {
    /// `Some(true)`/`Some(false)` if a checksum was verified; `None` if none was available or
    /// verification was not requested.
    pub verify_ok: Option<bool>,
}

/// A `Decoder` turns the `MediaChunk`s of a single logical stream into `AudioFrame`s.
pub trait Decoder: Send {
    /// Constructs a decoder configured from a demuxer-supplied `StreamInfo`.
    fn try_new(info: &StreamInfo, options: DecoderOptions) -> Result<Self>
    where
        Self: Sized;

    /// Feeds `chunk` into the decoder and returns the next decoded `AudioFrame`. Returns an empty
    /// `AudioFrame` if more input is required before a frame can be produced.
    fn decode(&mut self, chunk: &MediaChunk) -> Result<AudioFrame>;

    /// Flushes any buffered samples remaining once the stream's `MediaChunk`s are exhausted.
    fn flush(&mut self) -> Result<AudioFrame>;

    /// Resets internal state, discarding any buffered samples. Called after a demuxer seek.
    fn reset(&mut self);

    /// Finalizes the decode session, performing any end-of-stream integrity checks.
    fn finalize(&mut self) -> FinalizeResult {
        FinalizeResult::default()
    }
}

/// A decoder constructor registered under a codec name.
pub type DecoderConstructor = fn(&StreamInfo, DecoderOptions) -> Result<Box<dyn Decoder>>;

/// `CodecRegistry` maps a lowercase codec name (as carried by `StreamInfo::codec_name`) to a
/// decoder constructor. Registration happens once, at process start; lookups afterwards are
/// read-only.
#[derive(Default)]
pub struct CodecRegistry {
    codecs: HashMap<&'static str, DecoderConstructor>,
}

impl CodecRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        CodecRegistry::default()
    }

    /// Registers a decoder constructor under `name`.
    pub fn register_codec(&mut self, name: &'static str, ctor: DecoderConstructor) {
        self.codecs.insert(name, ctor);
    }

    /// Instantiates the decoder registered for `info.codec_name`, if any.
    pub fn create_codec(
        &self,
        info: &StreamInfo,
        options: DecoderOptions,
    ) -> Option<Result<Box<dyn Decoder>>> {
        self.codecs.get(info.codec_name).map(|ctor| ctor(info, options))
    }
}
