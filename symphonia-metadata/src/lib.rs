// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! This crate implements read functions for the metadata formats embedded into the container
//! formats this workspace supports: FLAC's VORBIS_COMMENT/PICTURE blocks and Ogg's identical
//! Vorbis comment framing.
//!
//! Tag *semantics* beyond this (ID3v1, ID3v2, APEv2 as standalone formats) are out of scope;
//! `symphonia_core::probe::FormatIdentifier` only needs to skip a leading ID3v2 tag to resolve
//! the format underneath it, which it does on its own.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// The following lints are allowed in all Symphonia crates. Please see clippy.toml for their
// justification.
#![allow(clippy::comparison_chain)]
#![allow(clippy::excessive_precision)]
#![allow(clippy::identity_op)]
#![allow(clippy::manual_range_contains)]

pub mod embedded;
