// Symphonia
// Copyright (c) 2019-2026 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! # Project Symphonia
//!
//! Symphonia is a 100% pure Rust audio decoding and multimedia format demuxing framework.
//!
//! It consumes a byte stream (file, HTTP, or in-memory), identifies the container format,
//! demuxes the container into codec packets, and decodes those packets into interleaved 16-bit
//! PCM audio. By default only royalty-free, open-standard codecs and formats are enabled; others
//! must be turned on with a feature flag.
//!
//! ## Formats
//!
//! | Format | Feature Flag | Default |
//! |--------|--------------|---------|
//! | OGG    | `ogg`        | Yes     |
//!
//! ## Codecs
//!
//! | Codec  | Feature Flag | Default |
//! |--------|--------------|---------|
//! | FLAC   | `flac`       | Yes     |
//! | PCM    | `pcm`        | Yes     |
//!
//! `vorbis`, `opus`, and `speex` streams inside an Ogg container are identified and their
//! packets extracted, but decoding them is out of this workspace's scope; no decoder is
//! registered for those codec names.
//!
//! # Usage
//!
//! 1.  Obtain a [`core::io::MediaSource`] (`std::fs::File` and `std::io::Cursor` already
//!     implement it) and wrap it in a [`core::io::MediaSourceStream`].
//! 2.  Call [`default::get_format_identifier`] and probe the stream with
//!     [`core::probe::FormatIdentifier::probe`] to resolve its container format id.
//! 3.  Call [`default::get_formats`] and use [`core::formats::FormatRegistry::make_format_reader`]
//!     to construct a [`core::formats::FormatReader`] for that format id.
//! 4.  Inspect [`core::formats::FormatReader::streams`] and, for each stream of interest, call
//!     [`default::get_codecs`] and [`core::codecs::CodecRegistry::create_codec`] to construct a
//!     [`core::codecs::Decoder`].
//! 5.  Repeatedly call `next_chunk`/`next_chunk_for` on the `FormatReader` and pass the resulting
//!     [`core::packet::MediaChunk`] to the `Decoder`'s `decode` method to obtain
//!     [`core::audio::AudioFrame`]s, until the reader reports end-of-stream.
//!
//! # Adding support for new formats and codecs
//!
//! Implement [`core::codecs::Decoder`] for a new decoder, or [`core::formats::FormatReader`] for
//! a new demuxer, and register a constructor with the appropriate registry.

pub mod default {
    //! Convenience functions to get a pre-populated [`FormatIdentifier`][core::probe::FormatIdentifier],
    //! [`FormatRegistry`][core::formats::FormatRegistry], and [`CodecRegistry`][core::codecs::CodecRegistry]
    //! without the boilerplate of registering every enabled format and codec by hand.

    use lazy_static::lazy_static;

    use symphonia_core::codecs::CodecRegistry;
    use symphonia_core::formats::FormatRegistry;
    use symphonia_core::probe::FormatIdentifier;

    lazy_static! {
        static ref FORMAT_IDENTIFIER: FormatIdentifier = FormatIdentifier::with_builtins();
    }

    lazy_static! {
        static ref FORMAT_REGISTRY: FormatRegistry = {
            let mut registry = FormatRegistry::new();
            register_enabled_formats(&mut registry);
            registry
        };
    }

    lazy_static! {
        static ref CODEC_REGISTRY: CodecRegistry = {
            let mut registry = CodecRegistry::new();
            register_enabled_codecs(&mut registry);
            registry
        };
    }

    /// Gets the default `FormatIdentifier`, pre-populated with the built-in magic-byte signature
    /// table and extension map.
    ///
    /// This function is lazy and does not construct the `FormatIdentifier` until the first call.
    pub fn get_format_identifier() -> &'static FormatIdentifier {
        &FORMAT_IDENTIFIER
    }

    /// Gets the default `FormatRegistry`, pre-registered with the demuxers selected by this
    /// crate's enabled feature flags.
    ///
    /// This function is lazy and does not construct the `FormatRegistry` until the first call.
    pub fn get_formats() -> &'static FormatRegistry {
        &FORMAT_REGISTRY
    }

    /// Gets the default `CodecRegistry`, pre-registered with the decoders selected by this
    /// crate's enabled feature flags.
    ///
    /// This function is lazy and does not construct the `CodecRegistry` until the first call.
    pub fn get_codecs() -> &'static CodecRegistry {
        &CODEC_REGISTRY
    }

    /// Registers every demuxer enabled by this crate's feature flags onto `registry`.
    pub fn register_enabled_formats(registry: &mut FormatRegistry) {
        #[cfg(feature = "flac")]
        registry.register_demuxer("flac", symphonia_bundle_flac::try_new_reader);

        #[cfg(feature = "ogg")]
        registry.register_demuxer("ogg", symphonia_format_ogg::try_new_reader);
    }

    /// Registers every decoder enabled by this crate's feature flags onto `registry`.
    pub fn register_enabled_codecs(registry: &mut CodecRegistry) {
        #[cfg(feature = "flac")]
        registry.register_codec("flac", symphonia_bundle_flac::try_new_decoder);

        #[cfg(feature = "pcm")]
        symphonia_codec_pcm::register_codecs(registry);
    }
}

pub use symphonia_core as core;
