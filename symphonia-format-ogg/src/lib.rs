// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pure Rust OGG demuxer.
//!
//! `OggDemuxer` synchronizes on pages (`sync`), reassembles each logical bitstream's packets
//! (`stream`), recognizes and parses the standardized codec header sequence of each logical
//! stream (`headers`), and implements granule-position bisection seeking (`seek`).

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// The following lints are allowed in all Symphonia crates. Please see clippy.toml for their
// justification.
#![allow(clippy::comparison_chain)]
#![allow(clippy::excessive_precision)]
#![allow(clippy::identity_op)]
#![allow(clippy::manual_range_contains)]

mod demuxer;
mod headers;
mod seek;
mod stream;
mod sync;

pub use demuxer::OggDemuxer;

use symphonia_core::errors::Result;
use symphonia_core::formats::{FormatOptions, FormatReader};
use symphonia_core::io::MediaSourceStream;

/// Constructs a boxed `OggDemuxer`, for registration with a `FormatRegistry` under `"ogg"`.
pub fn try_new_reader(
    source: MediaSourceStream,
    options: FormatOptions,
) -> Result<Box<dyn FormatReader>> {
    Ok(Box::new(OggDemuxer::try_new(source, options)?))
}
