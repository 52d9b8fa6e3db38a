// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! An HTTP(S) range-request backed [`MediaSource`].

use std::io::Read as StdRead;

use crate::errors::CoreError;
use crate::io::{MediaSource, Read, Seek, SeekFrom};

/// `HttpSource` wraps a URL in a [`MediaSource`], using `Range` requests to implement random
/// access. Each `read` issues (or continues) a single range request starting at the current
/// logical offset; `seek` only adjusts the offset bookkeeping, the next read opens a fresh range
/// request at the new offset.
///
/// A short read from the underlying socket is not an error: the `Read` implementation on
/// [`ureq::Body`] already returns it as `Ok(n)` with `n < buf.len()`, matching this crate's
/// temporary/permanent error split.
pub struct HttpSource {
    url: String,
    pos: u64,
    len: Option<u64>,
    body: Option<Box<dyn StdRead + Send + Sync>>,
    body_start: u64,
}

impl HttpSource {
    /// Opens `url`, issuing a `HEAD` request to discover the content length (if the server
    /// provides one) and whether the server supports byte ranges.
    pub fn new(url: impl Into<String>) -> Result<Self, CoreError> {
        let url = url.into();

        let len = ureq::head(&url)
            .call()
            .ok()
            .and_then(|resp| resp.headers().get("Content-Length").cloned())
            .and_then(|v| v.to_str().ok().and_then(|s| s.parse::<u64>().ok()));

        Ok(HttpSource { url, pos: 0, len, body: None, body_start: 0 })
    }

    fn ensure_body(&mut self) -> std::io::Result<()> {
        if self.body.is_some() && self.body_start <= self.pos {
            return Ok(());
        }

        let range = format!("bytes={}-", self.pos);

        let resp = ureq::get(&self.url)
            .header("Range", &range)
            .call()
            .map_err(|e| std::io::Error::other(e.to_string()))?;

        self.body_start = self.pos;
        self.body = Some(Box::new(resp.into_body().into_reader()));

        Ok(())
    }
}

impl Read for HttpSource {
    fn read(&mut self, buf: &mut [u8]) -> crate::errors::Result<usize> {
        self.ensure_body().map_err(CoreError::from)?;

        let body = self.body.as_mut().expect("body connected above");

        match body.read(buf) {
            Ok(0) => Ok(0),
            Ok(n) => {
                self.pos += n as u64;
                Ok(n)
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => Ok(0),
            Err(e) => {
                // The connection dropped mid-range: drop it so the next read reopens at `pos`.
                self.body = None;
                Err(CoreError::from(e))
            }
        }
    }
}

impl Seek for HttpSource {
    fn seek(&mut self, from: SeekFrom) -> crate::errors::Result<u64> {
        let new_pos = match from {
            SeekFrom::Start(off) => off as i128,
            SeekFrom::Current(off) => self.pos as i128 + off as i128,
            SeekFrom::End(off) => {
                let len = self.len.ok_or(CoreError::Other("stream length unknown"))?;
                len as i128 + off as i128
            }
        };

        if new_pos < 0 {
            return Err(CoreError::Other("cannot seek before byte 0"));
        }

        self.pos = new_pos as u64;
        // Force re-connection on next read at the new offset.
        self.body = None;

        Ok(self.pos)
    }
}

impl MediaSource for HttpSource {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        self.len
    }
}
