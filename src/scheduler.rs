//! Voice scheduler — admits, mixes, and reclaims one-shot voices under a
//! concurrency ceiling.
//!
//! Eviction is strictly insertion-order (the oldest live voice goes first).
//! Reclamation is tick-driven: `reap` runs at every render quantum and
//! forgets voices that finished since the last one.

use std::sync::Arc;

use crate::buffer::SampleBuffer;
use crate::context::Category;
use crate::dsp::mixer::StereoBus;
use crate::voice::{Voice, VoiceHandle};

/// Default ceiling on simultaneous voices.
pub const DEFAULT_MAX_VOICES: usize = 32;

/// Playback-rate clamp for pitch shifting.
pub const PITCH_RANGE: (f64, f64) = (0.25, 4.0);

/// Options for a single play request.
#[derive(Debug, Clone, Copy)]
pub struct PlayOptions {
    /// Linear gain; composes with any category base multiplier.
    pub volume: f64,
    /// Playback-rate multiplier, clamped to [0.25, 4.0].
    pub pitch: f64,
    /// Pan in [-1, 1].
    pub pan: f64,
    /// Fade-in seconds (exponential ramp from silence).
    pub fade_in: f64,
    /// Fade-out seconds, ending exactly at clip end when the clip is long
    /// enough to hold it.
    pub fade_out: f64,
    pub looping: bool,
    pub category: Category,
}

impl Default for PlayOptions {
    fn default() -> Self {
        PlayOptions {
            volume: 1.0,
            pitch: 1.0,
            pan: 0.0,
            fade_in: 0.0,
            fade_out: 0.0,
            looping: false,
            category: Category::Sfx,
        }
    }
}

/// Owner of every live one-shot voice.
#[derive(Debug)]
pub struct VoiceScheduler {
    sample_rate: f64,
    max_voices: usize,
    /// Insertion-ordered: index 0 is always the oldest.
    voices: Vec<Voice>,
    next_id: u64,
    peak: usize,
}

impl VoiceScheduler {
    pub fn new(sample_rate: f64, max_voices: usize) -> Self {
        VoiceScheduler {
            sample_rate,
            max_voices: max_voices.max(1),
            voices: Vec::new(),
            next_id: 1,
            peak: 0,
        }
    }

    /// Admit a new voice for `buffer`. At the ceiling, exactly one voice —
    /// the oldest — is evicted first; the live count never exceeds the
    /// ceiling.
    pub fn play_buffer(
        &mut self,
        buffer: Arc<SampleBuffer>,
        options: PlayOptions,
        now_frame: u64,
    ) -> Option<VoiceHandle> {
        if buffer.frames() == 0 {
            return None;
        }

        self.reap();
        if self.voices.len() >= self.max_voices {
            let evicted = self.voices.remove(0);
            log::debug!(
                "voice ceiling {} reached, evicting oldest voice {} ({})",
                self.max_voices,
                evicted.id(),
                evicted.buffer().name()
            );
        }

        let id = self.next_id;
        self.next_id += 1;

        let mut voice = Voice::new(
            id,
            buffer,
            options.category,
            options.volume.clamp(0.0, 2.0),
            options.pitch.clamp(PITCH_RANGE.0, PITCH_RANGE.1),
            options.pan,
            options.looping,
            now_frame,
        );
        if options.fade_in > 0.0 {
            voice.fade_in(options.fade_in, self.sample_rate, now_frame);
        }
        voice.arm_fade_out(options.fade_out, options.fade_in);

        self.voices.push(voice);
        self.peak = self.peak.max(self.voices.len());
        Some(VoiceHandle(id))
    }

    /// Stop one voice. Unknown or already-ended handles are a no-op.
    pub fn stop(&mut self, handle: VoiceHandle) {
        if let Some(voice) = self.voices.iter_mut().find(|v| v.handle() == handle) {
            voice.stop();
        }
    }

    /// Force-stop every live voice.
    pub fn stop_all(&mut self) {
        for voice in &mut self.voices {
            voice.stop();
        }
        self.reap();
    }

    /// Forget voices that have finished. Called each tick.
    pub fn reap(&mut self) {
        self.voices.retain(|v| !v.is_finished());
    }

    /// Render all live voices into their category buses for one quantum.
    pub fn mix_into(
        &mut self,
        sfx_bus: &mut StereoBus,
        music_bus: &mut StereoBus,
        now_frame: u64,
        frames: usize,
    ) {
        for voice in &mut self.voices {
            let bus = match voice.category() {
                Category::Sfx => &mut *sfx_bus,
                Category::Music => &mut *music_bus,
            };
            voice.render_into(bus, now_frame, frames);
        }
        self.reap();
    }

    pub fn is_live(&self, handle: VoiceHandle) -> bool {
        self.voices
            .iter()
            .any(|v| v.handle() == handle && !v.is_finished())
    }

    pub fn live_count(&self) -> usize {
        self.voices.len()
    }

    /// Highest simultaneous voice count seen this session.
    pub fn peak_concurrency(&self) -> usize {
        self.peak
    }

    pub fn max_voices(&self) -> usize {
        self.max_voices
    }
}
