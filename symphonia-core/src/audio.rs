// Symphonia
// Copyright (c) 2019-2026 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `audio` module defines `AudioFrame`, the decoded PCM output type, and `FramePool`, the
//! thread-safe sample-buffer pool decoders recycle allocations through.

use std::sync::{Arc, Mutex};

/// Maximum number of pooled buffers retained by a `FramePool`.
const POOL_MAX_BUFFERS: usize = 16;

/// Maximum sample capacity (per channel) of a buffer the pool will hold onto. Roughly 4 seconds
/// at 48 kHz stereo.
const POOL_MAX_CAPACITY: usize = 192_000;

/// `FramePool` recycles `Vec<i16>` sample buffers keyed loosely by capacity. Reuse is a pure
/// optimization: a decoder that never hits the pool is just as correct, only slower to allocate.
#[derive(Clone, Default)]
pub struct FramePool {
    inner: Arc<Mutex<Vec<Vec<i16>>>>,
}

impl FramePool {
    /// Creates a new, empty `FramePool`.
    pub fn new() -> Self {
        FramePool::default()
    }

    /// Takes a buffer with at least `capacity` spare room from the pool, or allocates a new one.
    pub fn acquire(&self, capacity: usize) -> Vec<i16> {
        let mut pool = self.inner.lock().unwrap();

        if let Some(pos) = pool.iter().position(|buf| buf.capacity() >= capacity) {
            let mut buf = pool.swap_remove(pos);
            buf.clear();
            return buf;
        }

        Vec::with_capacity(capacity)
    }

    /// Returns `buf` to the pool for future reuse, subject to the pool's size caps.
    pub fn release(&self, mut buf: Vec<i16>) {
        if buf.capacity() == 0 || buf.capacity() > POOL_MAX_CAPACITY {
            return;
        }

        buf.clear();

        let mut pool = self.inner.lock().unwrap();

        if pool.len() < POOL_MAX_BUFFERS {
            pool.push(buf);
        }
    }
}

/// A decoded block of interleaved, 16-bit signed PCM audio.
///
/// `samples.len() == channels as usize * frame_count`. An `AudioFrame` with zero frames is valid
/// and signals "no output produced this call" (e.g. the decoder is still buffering input).
pub struct AudioFrame {
    samples: Vec<i16>,
    sample_rate: u32,
    channels: u32,
    /// The timestamp of the first sample in this frame, in sample units, relative to the start
    /// of the logical stream.
    pub ts: u64,
    pool: Option<FramePool>,
}

impl AudioFrame {
    /// Creates a new `AudioFrame` from already-interleaved samples.
    ///
    /// # Panics
    ///
    /// Panics if `samples.len()` is not a multiple of `channels`, or if `channels` is 0 while
    /// `samples` is non-empty.
    pub fn new(samples: Vec<i16>, sample_rate: u32, channels: u32, ts: u64) -> Self {
        assert!(
            channels > 0 || samples.is_empty(),
            "a non-empty AudioFrame must declare at least one channel"
        );
        if channels > 0 {
            assert_eq!(samples.len() % channels as usize, 0, "samples not a whole number of frames");
        }

        AudioFrame { samples, sample_rate, channels, ts, pool: None }
    }

    /// Creates a new `AudioFrame` whose backing buffer was drawn from `pool` and will be returned
    /// to it on drop.
    pub fn from_pool(samples: Vec<i16>, sample_rate: u32, channels: u32, ts: u64, pool: FramePool) -> Self {
        let mut frame = AudioFrame::new(samples, sample_rate, channels, ts);
        frame.pool = Some(pool);
        frame
    }

    /// Creates an empty `AudioFrame` signalling "no output this call".
    pub fn empty(sample_rate: u32, channels: u32) -> Self {
        AudioFrame { samples: Vec::new(), sample_rate, channels, ts: 0, pool: None }
    }

    /// Returns true if this frame carries no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The number of decoded sample-frames (i.e. samples per channel).
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            0
        }
        else {
            self.samples.len() / self.channels as usize
        }
    }

    /// The sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The channel count.
    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// The timestamp of this frame, in milliseconds, relative to the start of the logical stream.
    pub fn timestamp_ms(&self) -> u64 {
        crate::units::samples_to_ms(self.ts, self.sample_rate)
    }

    /// The interleaved 16-bit PCM samples.
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Takes ownership of the backing sample buffer, detaching it from any pool.
    pub fn into_samples(mut self) -> Vec<i16> {
        self.pool = None;
        std::mem::take(&mut self.samples)
    }
}

impl Drop for AudioFrame {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.release(std::mem::take(&mut self.samples));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_frame_count() {
        let frame = AudioFrame::new(vec![0i16; 8], 44_100, 2, 0);
        assert_eq!(frame.frame_count(), 4);
    }

    #[test]
    fn verify_empty_frame() {
        let frame = AudioFrame::empty(44_100, 2);
        assert!(frame.is_empty());
        assert_eq!(frame.frame_count(), 0);
    }

    #[test]
    fn verify_pool_round_trip() {
        let pool = FramePool::new();
        let buf = pool.acquire(128);
        assert!(buf.capacity() >= 128);
        pool.release(buf);
        let buf2 = pool.acquire(64);
        assert!(buf2.capacity() >= 64);
    }
}
