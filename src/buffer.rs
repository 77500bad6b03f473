//! Immutable PCM sample buffers and the session-lifetime buffer cache.

use std::collections::HashMap;
use std::sync::Arc;

/// Immutable PCM data tagged with a logical name. Created once by a
/// generator, shared by every voice that plays it, never mutated.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    name: String,
    channels: usize,
    sample_rate: f64,
    /// Interleaved samples, `frames * channels` long.
    data: Vec<f32>,
}

impl SampleBuffer {
    pub fn new(name: impl Into<String>, channels: usize, sample_rate: f64, data: Vec<f32>) -> Self {
        debug_assert!(channels == 1 || channels == 2);
        SampleBuffer {
            name: name.into(),
            channels,
            sample_rate,
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Frames per channel.
    pub fn frames(&self) -> usize {
        self.data.len() / self.channels
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frames() as f64 / self.sample_rate
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Stereo frame at `frame`, duplicating the channel for mono buffers.
    /// Out-of-range reads are silence.
    #[inline]
    pub fn frame(&self, frame: usize) -> (f32, f32) {
        if frame >= self.frames() {
            return (0.0, 0.0);
        }
        match self.channels {
            1 => {
                let s = self.data[frame];
                (s, s)
            }
            _ => (self.data[frame * 2], self.data[frame * 2 + 1]),
        }
    }

    /// Stereo frame at a fractional position, linearly interpolated.
    /// Used by rate-shifted voices.
    #[inline]
    pub fn frame_lerp(&self, position: f64) -> (f32, f32) {
        let i = position.floor() as usize;
        let frac = (position - i as f64) as f32;
        let (l0, r0) = self.frame(i);
        let (l1, r1) = self.frame(i + 1);
        (l0 + (l1 - l0) * frac, r0 + (r1 - r0) * frac)
    }
}

/// Session-lifetime cache of generated buffers, keyed by logical name.
/// Regeneration overwrites the entry; existing `Arc`s keep playing the
/// old data until their voices end.
#[derive(Debug, Default)]
pub struct BufferCache {
    buffers: HashMap<String, Arc<SampleBuffer>>,
}

impl BufferCache {
    pub fn new() -> Self {
        BufferCache {
            buffers: HashMap::new(),
        }
    }

    pub fn insert(&mut self, buffer: SampleBuffer) -> Arc<SampleBuffer> {
        let arc = Arc::new(buffer);
        self.buffers.insert(arc.name().to_string(), Arc::clone(&arc));
        arc
    }

    pub fn get(&self, name: &str) -> Option<Arc<SampleBuffer>> {
        self.buffers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.buffers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_frames_duplicate_to_stereo() {
        let b = SampleBuffer::new("t", 1, 44100.0, vec![0.25, -0.5]);
        assert_eq!(b.frames(), 2);
        assert_eq!(b.frame(1), (-0.5, -0.5));
    }

    #[test]
    fn out_of_range_reads_are_silent() {
        let b = SampleBuffer::new("t", 2, 44100.0, vec![1.0, 1.0]);
        assert_eq!(b.frame(5), (0.0, 0.0));
    }

    #[test]
    fn fractional_read_interpolates() {
        let b = SampleBuffer::new("t", 1, 44100.0, vec![0.0, 1.0]);
        let (l, _) = b.frame_lerp(0.5);
        assert!((l - 0.5).abs() < 1e-6, "expected midpoint, got {l}");
    }

    #[test]
    fn cache_overwrites_by_name() {
        let mut cache = BufferCache::new();
        cache.insert(SampleBuffer::new("pop", 1, 44100.0, vec![0.1]));
        let held = cache.get("pop").unwrap();
        cache.insert(SampleBuffer::new("pop", 1, 44100.0, vec![0.9]));
        // The held Arc still sees the old data; the cache serves the new one.
        assert_eq!(held.data()[0], 0.1);
        assert_eq!(cache.get("pop").unwrap().data()[0], 0.9);
        assert_eq!(cache.len(), 1);
    }
}
