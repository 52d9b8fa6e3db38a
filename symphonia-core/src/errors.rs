// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type.

use std::error::Error as StdError;
use std::fmt;
use std::ops::Deref;
use std::result;

/// `SeekErrorKind` is a list of generic reasons why a seek may fail.
#[derive(Debug)]
pub enum SeekErrorKind {
    /// The stream is not seekable at all.
    Unseekable,
    /// The stream can only be seeked forward.
    ForwardOnly,
    /// The timestamp to seek to is out of range.
    OutOfRange,
    /// The stream id provided is invalid.
    InvalidTrack,
}

impl SeekErrorKind {
    fn as_str(&self) -> &'static str {
        match *self {
            SeekErrorKind::Unseekable => "stream is not seekable",
            SeekErrorKind::ForwardOnly => "stream can only be seeked forward",
            SeekErrorKind::OutOfRange => "requested seek timestamp is out-of-range for stream",
            SeekErrorKind::InvalidTrack => "invalid stream id",
        }
    }
}

/// `CoreError` enumerates every error a container parser or codec in this workspace may surface.
///
/// The ten boundary discriminants (`InvalidSync` .. `UnrecoverableError`) are the error codes a
/// consumer of the crate is expected to match on. The remaining variants (`IoError` ..
/// `ResetRequired`) are ambient plumbing inherited from the IO and seek layers; they sit below
/// the codec-visible set and are mostly converted into one of the ten before crossing a demuxer
/// or decoder's public boundary.
#[derive(Debug)]
pub enum CoreError {
    /// An IO error occurred while reading, writing, or seeking the stream.
    IoError(Box<dyn StdError + Send + Sync>),
    /// An IO error occurred while reading, writing, or seeking the stream that is retryable.
    IoInterruptedError(Box<dyn StdError + Send + Sync>),
    /// The stream could not be seeked.
    SeekError(SeekErrorKind),
    /// A default or user-defined limit was reached while decoding or demuxing the stream. Limits
    /// are used to prevent denial-of-service attacks from malicious streams.
    LimitError(&'static str),
    /// The demuxer or decoder needs to be reset before continuing.
    ResetRequired,

    /// Frame or page sync could not be located within the configured resync window.
    InvalidSync,
    /// A header (container or codec) failed structural validation.
    InvalidHeader(&'static str),
    /// A subframe used a reserved or otherwise invalid type code.
    InvalidSubframe(&'static str),
    /// Residual coding data was structurally invalid (bad partition count, `i32::MIN` residual).
    InvalidResidual(&'static str),
    /// A checksum (CRC-8/16/32) did not match.
    CrcMismatch,
    /// A bit or byte read required more data than is currently buffered; not a hard error, the
    /// caller should supply more input and retry.
    BufferUnderflow,
    /// A buffer or pooled allocation could not be satisfied.
    MemoryAllocation,
    /// An unsupported container or codec feature was encountered (e.g. a reserved channel
    /// assignment). Permanent for the affected stream.
    UnsupportedFeature(&'static str),
    /// The stream contained malformed data that could not be decoded or demuxed, but is not
    /// covered by a more specific discriminant above.
    CorruptedData(&'static str),
    /// An error from which the decoder or demuxer cannot recover; the stream must be abandoned.
    UnrecoverableError(&'static str),

    /// End of stream: no more bytes to provide.
    EndOfFile,
    Other(&'static str),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            CoreError::IoError(ref err) => write!(f, "io error: {}", err),
            CoreError::IoInterruptedError(ref err) => write!(f, "io error (retryable): {}", err),
            CoreError::SeekError(ref kind) => write!(f, "seek error: {}", kind.as_str()),
            CoreError::LimitError(constraint) => write!(f, "limit reached: {}", constraint),
            CoreError::ResetRequired => write!(f, "decoder needs to be reset"),
            CoreError::InvalidSync => write!(f, "could not locate sync within resync window"),
            CoreError::InvalidHeader(msg) => write!(f, "invalid header: {}", msg),
            CoreError::InvalidSubframe(msg) => write!(f, "invalid subframe: {}", msg),
            CoreError::InvalidResidual(msg) => write!(f, "invalid residual: {}", msg),
            CoreError::CrcMismatch => write!(f, "checksum mismatch"),
            CoreError::BufferUnderflow => write!(f, "buffer underflow"),
            CoreError::MemoryAllocation => write!(f, "memory allocation failure"),
            CoreError::UnsupportedFeature(feature) => write!(f, "unsupported feature: {}", feature),
            CoreError::CorruptedData(msg) => write!(f, "corrupted data: {}", msg),
            CoreError::UnrecoverableError(msg) => write!(f, "unrecoverable error: {}", msg),
            CoreError::EndOfFile => write!(f, "unexpected end of file"),
            CoreError::Other(msg) => write!(f, "other error: {}", msg),
        }
    }
}

impl StdError for CoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match *self {
            CoreError::IoError(ref err) => Some(err.deref()),
            CoreError::IoInterruptedError(ref err) => Some(err.deref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> CoreError {
        match err.kind() {
            std::io::ErrorKind::Interrupted => CoreError::IoInterruptedError(Box::new(err)),
            std::io::ErrorKind::UnexpectedEof => CoreError::EndOfFile,
            _ => CoreError::IoError(Box::new(err)),
        }
    }
}

pub type Result<T> = result::Result<T, CoreError>;

/// Convenience function to create a generic decode error. Prefer a more specific constructor
/// below when the failure matches one of the boundary discriminants.
pub fn decode_error<T>(desc: &'static str) -> Result<T> {
    Err(CoreError::CorruptedData(desc))
}

/// Convenience function to create a seek error.
pub fn seek_error<T>(kind: SeekErrorKind) -> Result<T> {
    Err(CoreError::SeekError(kind))
}

/// Convenience function to create an unsupported feature error.
pub fn unsupported_error<T>(feature: &'static str) -> Result<T> {
    Err(CoreError::UnsupportedFeature(feature))
}

/// Convenience function to create a limit error.
pub fn limit_error<T>(constraint: &'static str) -> Result<T> {
    Err(CoreError::LimitError(constraint))
}

/// Convenience function to create a reset required error.
pub fn reset_error<T>() -> Result<T> {
    Err(CoreError::ResetRequired)
}

/// Convenience function to create an end-of-stream error.
pub fn end_of_stream_error<T>() -> Result<T> {
    Err(CoreError::EndOfFile)
}

/// Convenience function to create an invalid header error.
pub fn invalid_header_error<T>(msg: &'static str) -> Result<T> {
    Err(CoreError::InvalidHeader(msg))
}

/// Convenience function to create an invalid subframe error.
pub fn invalid_subframe_error<T>(msg: &'static str) -> Result<T> {
    Err(CoreError::InvalidSubframe(msg))
}

/// Convenience function to create an invalid residual error.
pub fn invalid_residual_error<T>(msg: &'static str) -> Result<T> {
    Err(CoreError::InvalidResidual(msg))
}

/// Convenience function to create a CRC mismatch error.
pub fn crc_mismatch_error<T>() -> Result<T> {
    Err(CoreError::CrcMismatch)
}

/// Convenience function to create a buffer underflow error. Not a hard failure: the caller
/// should feed more bytes and retry the read.
pub fn buffer_underflow_error<T>() -> Result<T> {
    Err(CoreError::BufferUnderflow)
}

/// Convenience function to create a corrupted data error.
pub fn corrupted_data_error<T>(msg: &'static str) -> Result<T> {
    Err(CoreError::CorruptedData(msg))
}

/// Convenience function to create an unrecoverable error.
pub fn unrecoverable_error<T>(msg: &'static str) -> Result<T> {
    Err(CoreError::UnrecoverableError(msg))
}
