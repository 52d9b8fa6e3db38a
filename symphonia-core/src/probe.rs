// Symphonia
// Copyright (c) 2019-2026 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `probe` module implements container format identification: magic-byte signature matching,
//! an ID3v2 skip so tagged files probe to their true underlying format, extension fallback, and
//! (for Ogg) a secondary sniff of the BOS packet's codec-identification bytes.

use crate::io::{MediaSourceStream, ReadBytes, Seek, SeekFrom};

/// Bytes read from the start of a stream (or just past a skipped ID3v2 block) for signature
/// matching.
const HEADER_LEN: usize = 128;

/// How far past an Ogg `OggS` page start to scan for an inner codec signature.
const OGG_INNER_SCAN_LEN: usize = 256;

/// A registered magic-byte signature.
#[derive(Clone, Copy)]
pub struct Signature {
    pub format_id: &'static str,
    pub bytes: &'static [u8],
    pub offset: usize,
    /// Specificity score: higher wins ties over a lower-scored signature and over extension
    /// fallback. Highly specific magics (`OggS`, `fLaC`, `RIFF`+`WAVE`, `FORM`+`AIFF`, `ftyp`)
    /// score highest; a bare MPEG frame sync scores lowest since many unrelated byte sequences
    /// contain a false positive.
    pub priority: u8,
}

/// An inner-codec signature sniffed inside an Ogg BOS packet, refining the generic `"ogg"` format
/// id to a codec hint carried alongside it.
#[derive(Clone, Copy)]
struct OggInnerSignature {
    codec_hint: &'static str,
    bytes: &'static [u8],
}

const OGG_INNER_SIGNATURES: &[OggInnerSignature] = &[
    OggInnerSignature { codec_hint: "opus", bytes: b"OpusHead" },
    OggInnerSignature { codec_hint: "vorbis", bytes: b"\x01vorbis" },
    OggInnerSignature { codec_hint: "flac", bytes: b"\x7fFLAC" },
    OggInnerSignature { codec_hint: "speex", bytes: b"Speex   " },
];

/// The result of a successful probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProbeResult {
    pub format_id: &'static str,
    /// For `format_id == "ogg"`, the inner codec hint sniffed from the BOS packet, if any.
    pub codec_hint: Option<&'static str>,
}

/// `FormatIdentifier` holds the registered signature table and extension map, and implements the
/// probe algorithm described by the format identification component.
#[derive(Default)]
pub struct FormatIdentifier {
    signatures: Vec<Signature>,
    extensions: Vec<(&'static str, &'static str)>,
}

impl FormatIdentifier {
    /// Creates an empty identifier with no registered signatures or extensions.
    pub fn new() -> Self {
        FormatIdentifier::default()
    }

    /// Registers a magic-byte signature.
    pub fn register_signature(&mut self, format_id: &'static str, bytes: &'static [u8], offset: usize, priority: u8) {
        self.signatures.push(Signature { format_id, bytes, offset, priority });
    }

    /// Registers a lowercase file extension (without the leading dot) mapping to a format id.
    pub fn register_extension(&mut self, extension: &'static str, format_id: &'static str) {
        self.extensions.push((extension, format_id));
    }

    /// Installs the built-in signature table and extension map described in the external
    /// interface contract.
    pub fn with_builtins() -> Self {
        let mut id = FormatIdentifier::new();

        id.register_signature("riff", b"RIFF", 0, 100);
        id.register_signature("aiff", b"FORM", 0, 100);
        id.register_signature("ogg", b"OggS", 0, 100);
        id.register_signature("flac", b"fLaC", 0, 100);
        id.register_signature("mp4", b"ftyp", 4, 90);
        id.register_signature("mp3", b"ID3", 0, 80);
        id.register_signature("mp3", b"\xff\xfb", 0, 70);

        id.register_extension("flac", "flac");
        id.register_extension("ogg", "ogg");
        id.register_extension("oga", "ogg");
        id.register_extension("opus", "ogg");
        id.register_extension("wav", "riff");
        id.register_extension("wave", "riff");
        id.register_extension("aif", "aiff");
        id.register_extension("aiff", "aiff");
        id.register_extension("mp4", "mp4");
        id.register_extension("m4a", "mp4");
        id.register_extension("m4b", "mp4");
        id.register_extension("mp3", "mp3");

        id
    }

    /// Probes `reader` (and, if provided, `path`'s extension) for its container format. Leaves
    /// the reader's read position at the start of the stream (or, if an ID3v2 block was skipped
    /// for format resolution, at the start of the payload following it) on success.
    pub fn probe(&self, reader: &mut MediaSourceStream, path: Option<&str>) -> Option<ProbeResult> {
        let start_pos = reader.pos();

        let mut header = [0u8; HEADER_LEN];
        let n = read_up_to(reader, &mut header).ok()?;
        let header = &header[..n];

        // ID3v2-prefixed payload: decode the synchsafe length, skip the tag, and re-probe the
        // underlying bytes directly (bypassing the generic signature match for those bytes).
        if header.len() >= 10 && &header[0..3] == b"ID3" {
            let synchsafe = &header[6..10];
            let tag_len = decode_synchsafe_u32(synchsafe);
            let payload_offset = start_pos + 10 + u64::from(tag_len);

            if reader.seek(SeekFrom::Start(payload_offset)).is_ok() {
                let mut post = [0u8; 64];
                let post_n = read_up_to(reader, &mut post).ok()?;
                let post = &post[..post_n];

                if post.starts_with(b"fLaC") {
                    reader.seek(SeekFrom::Start(payload_offset)).ok()?;
                    return Some(ProbeResult { format_id: "flac", codec_hint: None });
                }
                if post.starts_with(b"OggS") {
                    reader.seek(SeekFrom::Start(payload_offset)).ok()?;
                    return self.probe_ogg_inner(reader, payload_offset);
                }
                if is_mpeg_audio_sync(post) {
                    reader.seek(SeekFrom::Start(payload_offset)).ok()?;
                    return Some(ProbeResult { format_id: "mp3", codec_hint: None });
                }
            }

            // Inconclusive: fall through to a plain signature/extension match on the original
            // header bytes (the ID3 signature itself will still match mp3).
            reader.seek(SeekFrom::Start(start_pos)).ok()?;
        }

        let mut candidates: Vec<(&'static str, u8)> = Vec::new();

        for sig in &self.signatures {
            if header.len() >= sig.offset + sig.bytes.len()
                && &header[sig.offset..sig.offset + sig.bytes.len()] == sig.bytes
            {
                candidates.push((sig.format_id, sig.priority));
            }
        }

        candidates.sort_by(|a, b| b.1.cmp(&a.1));

        if let Some(&(format_id, _)) = candidates.first() {
            reader.seek(SeekFrom::Start(start_pos)).ok()?;

            if format_id == "ogg" {
                return self.probe_ogg_inner(reader, start_pos);
            }

            return Some(ProbeResult { format_id, codec_hint: None });
        }

        // No content match: fall back to the extension map.
        if let Some(path) = path {
            if let Some(ext) = path.rsplit('.').next() {
                let ext = ext.to_ascii_lowercase();

                if let Some(&(_, format_id)) = self.extensions.iter().find(|(e, _)| *e == ext) {
                    reader.seek(SeekFrom::Start(start_pos)).ok()?;
                    return Some(ProbeResult { format_id, codec_hint: None });
                }
            }
        }

        reader.seek(SeekFrom::Start(start_pos)).ok()?;
        None
    }

    /// Scans forward from `ogg_start` for an inner codec signature inside the BOS page's packet
    /// payload, to refine the `"ogg"` match with a codec hint.
    fn probe_ogg_inner(&self, reader: &mut MediaSourceStream, ogg_start: u64) -> Option<ProbeResult> {
        let mut scan = [0u8; OGG_INNER_SCAN_LEN];
        let n = read_up_to(reader, &mut scan).ok()?;
        let scan = &scan[..n];

        let codec_hint = OGG_INNER_SIGNATURES
            .iter()
            .find(|sig| contains_subslice(scan, sig.bytes))
            .map(|sig| sig.codec_hint);

        reader.seek(SeekFrom::Start(ogg_start)).ok()?;

        Some(ProbeResult { format_id: "ogg", codec_hint })
    }
}

fn read_up_to(reader: &mut MediaSourceStream, buf: &mut [u8]) -> crate::errors::Result<usize> {
    let mut total = 0;

    while total < buf.len() {
        match reader.read_buf(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(crate::errors::CoreError::EndOfFile) => break,
            Err(e) => return Err(e),
        }
    }

    Ok(total)
}

fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() || haystack.len() < needle.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn is_mpeg_audio_sync(buf: &[u8]) -> bool {
    buf.len() >= 2 && buf[0] == 0xff && (buf[1] & 0xe0) == 0xe0
}

/// Decodes a 4-byte ID3v2 synchsafe integer: each byte contributes 7 bits, top bit always 0.
fn decode_synchsafe_u32(bytes: &[u8]) -> u32 {
    ((bytes[0] as u32 & 0x7f) << 21)
        | ((bytes[1] as u32 & 0x7f) << 14)
        | ((bytes[2] as u32 & 0x7f) << 7)
        | (bytes[3] as u32 & 0x7f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{MediaSourceStream, MediaSourceStreamOptions};

    fn stream_of(bytes: Vec<u8>) -> MediaSourceStream {
        MediaSourceStream::new(Box::new(std::io::Cursor::new(bytes)), MediaSourceStreamOptions::default())
    }

    #[test]
    fn verify_probe_flac() {
        let id = FormatIdentifier::with_builtins();
        let data = b"fLaC\x00\x00\x00\x22".to_vec();
        let mut reader = stream_of(data);
        let result = id.probe(&mut reader, None).unwrap();
        assert_eq!(result.format_id, "flac");
    }

    #[test]
    fn verify_probe_flac_after_id3v2() {
        let id = FormatIdentifier::with_builtins();
        let mut data = b"ID3".to_vec();
        data.extend_from_slice(&[0x03, 0x00, 0x00]); // version + flags
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x20]); // synchsafe length = 32
        data.extend(std::iter::repeat(0u8).take(32));
        data.extend_from_slice(b"fLaC\x00\x00\x00\x22");
        data.extend(std::iter::repeat(0u8).take(34));

        let mut reader = stream_of(data);
        let result = id.probe(&mut reader, None).unwrap();
        assert_eq!(result.format_id, "flac");
    }

    #[test]
    fn verify_probe_extension_fallback() {
        let id = FormatIdentifier::with_builtins();
        let mut reader = stream_of(Vec::new());
        let result = id.probe(&mut reader, Some("silence.wav")).unwrap();
        assert_eq!(result.format_id, "riff");
    }

    #[test]
    fn verify_probe_ogg_opus_hint() {
        let id = FormatIdentifier::with_builtins();
        let mut data = b"OggS".to_vec();
        data.extend(std::iter::repeat(0u8).take(23));
        data.extend_from_slice(b"OpusHead");
        let mut reader = stream_of(data);
        let result = id.probe(&mut reader, None).unwrap();
        assert_eq!(result.format_id, "ogg");
        assert_eq!(result.codec_hint, Some("opus"));
    }
}
