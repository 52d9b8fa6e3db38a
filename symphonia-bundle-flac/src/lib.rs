// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pure Rust FLAC demuxer and decoder.
//!
//! `FlacReader` parses a native `.flac` file (the `fLaC` marker, its metadata block chain, and
//! the frame stream that follows) into `MediaChunk`s; `FlacDecoder` turns those chunks into
//! `AudioFrame`s.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// The following lints are allowed in all Symphonia crates. Please see clippy.toml for their
// justification.
#![allow(clippy::comparison_chain)]
#![allow(clippy::excessive_precision)]
#![allow(clippy::identity_op)]
#![allow(clippy::manual_range_contains)]

mod decoder;
mod demuxer;
mod frame;
mod validate;

pub use decoder::FlacDecoder;
pub use demuxer::FlacReader;

use symphonia_core::codecs::{Decoder, DecoderOptions};
use symphonia_core::errors::Result;
use symphonia_core::formats::{FormatOptions, FormatReader, StreamInfo};
use symphonia_core::io::MediaSourceStream;

/// Constructs a boxed `FlacDecoder`, for registration with a `CodecRegistry` under `"flac"`.
pub fn try_new_decoder(info: &StreamInfo, options: DecoderOptions) -> Result<Box<dyn Decoder>> {
    Ok(Box::new(FlacDecoder::try_new(info, options)?))
}

/// Constructs a boxed `FlacReader`, for registration with a `FormatRegistry` under `"flac"`.
pub fn try_new_reader(
    source: MediaSourceStream,
    options: FormatOptions,
) -> Result<Box<dyn FormatReader>> {
    Ok(Box::new(FlacReader::try_new(source, options)?))
}
