//! Signal graph context — processing clock, lifecycle, category levels,
//! and the switchable master effects chain.
//!
//! Effect patching is an explicit two-state machine per effect
//! ([`EffectSlot`]): a single transition function swaps the route and fixes
//! up effect state, so the chain can never be half-connected. Each category
//! bus always has exactly one path to the master output.

use serde::{Deserialize, Serialize};

use crate::dsp::compressor::Compressor;
use crate::dsp::equalizer::Equalizer;
use crate::dsp::mixer::soft_clip;
use crate::dsp::reverb::Reverb;
use crate::error::EngineError;

/// Mixing buses with independent levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Sfx,
    Music,
}

/// Switchable master-chain effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    Compressor,
    Reverb,
    Equalizer,
}

/// Patch state of one effect. There is no third state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectSlot {
    Bypassed,
    Active,
}

/// Context lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Uninitialized,
    Active,
    /// Host-style "waiting for a user gesture" state; rendering yields
    /// silence and the clock does not advance.
    Suspended,
    Closed,
}

/// Supported host sample rates.
const SAMPLE_RATE_RANGE: (f64, f64) = (8000.0, 192000.0);

/// The audio session: one per engine instance.
#[derive(Debug)]
pub struct AudioContext {
    sample_rate: f64,
    state: ContextState,
    /// Monotonic processing clock in frames.
    frames: u64,

    master_gain: f64,
    muted: bool,
    sfx_gain: f64,
    music_gain: f64,

    compressor: Compressor,
    compressor_slot: EffectSlot,
    reverb: Reverb,
    reverb_slot: EffectSlot,
    equalizer: Equalizer,
}

impl AudioContext {
    /// Build the processing context and node topology. Fails with
    /// `UnsupportedPlatform` when the host configuration cannot be used;
    /// the caller is expected to hold the error and go inert.
    pub fn initialize(
        sample_rate: f64,
        output_channels: u16,
        start_suspended: bool,
    ) -> Result<Self, EngineError> {
        if !(SAMPLE_RATE_RANGE.0..=SAMPLE_RATE_RANGE.1).contains(&sample_rate) {
            return Err(EngineError::UnsupportedPlatform(format!(
                "sample rate {sample_rate} Hz outside {}..{} Hz",
                SAMPLE_RATE_RANGE.0, SAMPLE_RATE_RANGE.1
            )));
        }
        if output_channels != 2 {
            return Err(EngineError::UnsupportedPlatform(format!(
                "{output_channels}-channel output (stereo required)"
            )));
        }

        let state = if start_suspended {
            ContextState::Suspended
        } else {
            ContextState::Active
        };
        log::info!("audio context initialized at {sample_rate} Hz ({state:?})");

        let mut compressor = Compressor::new(sample_rate);
        // Bypassed by default; keep the threshold inert until patched in.
        compressor.make_inert();

        Ok(AudioContext {
            sample_rate,
            state,
            frames: 0,
            master_gain: 1.0,
            muted: false,
            sfx_gain: 1.0,
            music_gain: 1.0,
            compressor,
            compressor_slot: EffectSlot::Bypassed,
            reverb: Reverb::new(sample_rate),
            reverb_slot: EffectSlot::Bypassed,
            equalizer: Equalizer::new(sample_rate),
        })
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == ContextState::Active
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn now_seconds(&self) -> f64 {
        self.frames as f64 / self.sample_rate
    }

    /// Advance the clock; the render loop calls this once per quantum while
    /// the context is active.
    pub fn advance(&mut self, frames: u64) {
        if self.is_active() {
            self.frames += frames;
        }
    }

    // ── Lifecycle ───────────────────────────────────────────

    /// Idempotent: meaningful only from `Suspended`.
    pub fn resume(&mut self) {
        match self.state {
            ContextState::Suspended => {
                self.state = ContextState::Active;
                log::info!("audio context resumed");
            }
            ContextState::Active => {}
            ContextState::Uninitialized | ContextState::Closed => {
                log::warn!("resume() on a {:?} context ignored", self.state);
            }
        }
    }

    pub fn suspend(&mut self) {
        if self.state == ContextState::Active {
            self.state = ContextState::Suspended;
            log::info!("audio context suspended");
        }
    }

    /// Tear down, releasing effect state leaf-to-root. Idempotent.
    pub fn dispose(&mut self) {
        if self.state == ContextState::Closed {
            return;
        }
        self.reverb.clear();
        self.compressor.reset();
        self.equalizer.reset();
        self.state = ContextState::Closed;
        log::info!("audio context disposed");
    }

    // ── Levels ──────────────────────────────────────────────

    /// Clamped to [0, 1], applied immediately.
    pub fn set_category_volume(&mut self, category: Category, level: f64) {
        let level = level.clamp(0.0, 1.0);
        match category {
            Category::Sfx => self.sfx_gain = level,
            Category::Music => self.music_gain = level,
        }
    }

    pub fn category_volume(&self, category: Category) -> f64 {
        match category {
            Category::Sfx => self.sfx_gain,
            Category::Music => self.music_gain,
        }
    }

    pub fn set_master_volume(&mut self, level: f64) {
        self.master_gain = level.clamp(0.0, 1.0);
    }

    pub fn master_volume(&self) -> f64 {
        self.master_gain
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    // ── Effect patching ─────────────────────────────────────

    /// Re-patch one effect. Both the route and the effect's internal state
    /// change in this one call; disabling the compressor also forces its
    /// threshold inert so buffered envelope state cannot act later.
    pub fn set_effect_enabled(&mut self, effect: EffectKind, enabled: bool) {
        let slot = if enabled { EffectSlot::Active } else { EffectSlot::Bypassed };
        match effect {
            EffectKind::Compressor => {
                if self.compressor_slot == slot {
                    return;
                }
                self.compressor_slot = slot;
                match slot {
                    EffectSlot::Active => {
                        self.compressor.restore();
                        self.compressor.reset();
                    }
                    EffectSlot::Bypassed => self.compressor.make_inert(),
                }
            }
            EffectKind::Reverb => {
                if self.reverb_slot == slot {
                    return;
                }
                self.reverb_slot = slot;
                if slot == EffectSlot::Bypassed {
                    self.reverb.clear();
                }
            }
            EffectKind::Equalizer => self.equalizer.set_enabled(enabled),
        }
        log::debug!("effect {effect:?} → {slot:?}");
    }

    pub fn is_effect_enabled(&self, effect: EffectKind) -> bool {
        match effect {
            EffectKind::Compressor => self.compressor_slot == EffectSlot::Active,
            EffectKind::Reverb => self.reverb_slot == EffectSlot::Active,
            EffectKind::Equalizer => self.equalizer.is_enabled(),
        }
    }

    pub fn equalizer(&self) -> &Equalizer {
        &self.equalizer
    }

    pub fn equalizer_mut(&mut self) -> &mut Equalizer {
        &mut self.equalizer
    }

    pub fn compressor(&self) -> &Compressor {
        &self.compressor
    }

    /// Mix pre-scaled category frames through the master chain. The match
    /// on each [`EffectSlot`] is the one route decision per effect — active
    /// processes, bypassed passes through untouched.
    #[inline]
    pub fn process_master(&mut self, sfx: (f32, f32), music: (f32, f32)) -> (f32, f32) {
        let mut l = sfx.0 * self.sfx_gain as f32 + music.0 * self.music_gain as f32;
        let mut r = sfx.1 * self.sfx_gain as f32 + music.1 * self.music_gain as f32;

        if self.compressor_slot == EffectSlot::Active {
            (l, r) = self.compressor.process(l, r);
        }
        if self.reverb_slot == EffectSlot::Active {
            (l, r) = self.reverb.process(l, r);
        }
        (l, r) = self.equalizer.process(l, r);

        let gain = if self.muted { 0.0 } else { self.master_gain as f32 };
        (soft_clip(l * gain), soft_clip(r * gain))
    }
}
