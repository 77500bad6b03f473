//! 5-band equalizer with atomic bypass switching and named presets.
//!
//! Band layout: 60 Hz low shelf, 250 Hz / 1 kHz / 4 kHz peaks, 16 kHz high
//! shelf. The active path is selected by a pair of switch gains that are
//! always exactly {1,0} or {0,1} — there is no half-connected state to
//! click through.

use serde::{Deserialize, Serialize};

use super::filter::{BiquadFilter, FilterType};

pub const BAND_COUNT: usize = 5;

/// Center/corner frequencies of the fixed bands.
pub const BAND_FREQUENCIES: [f64; BAND_COUNT] = [60.0, 250.0, 1000.0, 4000.0, 16000.0];

const BAND_TYPES: [FilterType; BAND_COUNT] = [
    FilterType::LowShelf,
    FilterType::Peaking,
    FilterType::Peaking,
    FilterType::Peaking,
    FilterType::HighShelf,
];

/// Band gain limits in dB.
pub const GAIN_RANGE_DB: (f64, f64) = (-20.0, 20.0);

/// Named preset gain vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EqPreset {
    Flat,
    Gaming,
    Music,
    Movie,
    Vocal,
    BassBoost,
    TrebleBoost,
}

impl EqPreset {
    /// The gain vector the preset applies.
    pub fn gains(self) -> [f64; BAND_COUNT] {
        match self {
            EqPreset::Flat => [0.0, 0.0, 0.0, 0.0, 0.0],
            EqPreset::Gaming => [4.0, 1.0, -1.0, 3.0, 4.0],
            EqPreset::Music => [3.0, 1.0, 0.0, 1.0, 3.0],
            EqPreset::Movie => [5.0, 2.0, 0.0, 2.0, 3.0],
            EqPreset::Vocal => [-2.0, 1.0, 4.0, 3.0, -1.0],
            EqPreset::BassBoost => [8.0, 5.0, 0.0, -1.0, -2.0],
            EqPreset::TrebleBoost => [-2.0, -1.0, 0.0, 5.0, 8.0],
        }
    }
}

/// One sampled point of the composed frequency response.
#[derive(Debug, Clone, Copy)]
pub struct ResponsePoint {
    pub frequency: f64,
    /// Composed linear magnitude (product of per-band magnitudes).
    pub magnitude: f64,
    /// Composed phase in radians (sum of per-band phases).
    pub phase: f64,
}

/// Stereo 5-band equalizer.
#[derive(Debug, Clone)]
pub struct Equalizer {
    left: [BiquadFilter; BAND_COUNT],
    right: [BiquadFilter; BAND_COUNT],
    /// Gain of the filtered path; 1.0 when enabled.
    chain_gain: f32,
    /// Gain of the bypass path; 1.0 when disabled.
    bypass_gain: f32,
}

fn band_chain(sample_rate: f64) -> [BiquadFilter; BAND_COUNT] {
    std::array::from_fn(|i| {
        let q = if BAND_TYPES[i] == FilterType::Peaking { 1.0 } else { 0.707 };
        BiquadFilter::band(BAND_TYPES[i], sample_rate, BAND_FREQUENCIES[i], q)
    })
}

impl Equalizer {
    pub fn new(sample_rate: f64) -> Self {
        Equalizer {
            left: band_chain(sample_rate),
            right: band_chain(sample_rate),
            chain_gain: 0.0,
            bypass_gain: 1.0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.chain_gain == 1.0
    }

    /// Swap the active path. Both switch gains flip in the same call, so
    /// the signal is never on both paths or neither.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled == self.is_enabled() {
            return;
        }
        if enabled {
            // Entering the chain with stale state would replay old audio.
            self.reset();
            self.chain_gain = 1.0;
            self.bypass_gain = 0.0;
        } else {
            self.chain_gain = 0.0;
            self.bypass_gain = 1.0;
        }
        log::debug!("equalizer path: {}", if enabled { "chain" } else { "bypass" });
    }

    /// Set one band's gain, clamped to [-20, +20] dB.
    pub fn set_band_gain(&mut self, band: usize, gain_db: f64) {
        if band >= BAND_COUNT {
            return;
        }
        let g = gain_db.clamp(GAIN_RANGE_DB.0, GAIN_RANGE_DB.1);
        self.left[band].set_gain_db(g);
        self.right[band].set_gain_db(g);
    }

    /// Apply a full gain vector atomically (one pass, then state reset so
    /// no band carries history shaped by the previous curve).
    pub fn set_all_gains(&mut self, gains: [f64; BAND_COUNT]) {
        for (band, gain) in gains.iter().enumerate() {
            self.set_band_gain(band, *gain);
        }
        self.reset();
    }

    pub fn apply_preset(&mut self, preset: EqPreset) {
        self.set_all_gains(preset.gains());
    }

    /// Current gains, elementwise clamped at set time.
    pub fn band_gains(&self) -> [f64; BAND_COUNT] {
        std::array::from_fn(|i| self.left[i].gain_db())
    }

    /// Sample `n` log-spaced frequencies in [20 Hz, 20 kHz] and compose the
    /// chain response: magnitudes multiply, phases add. Pure query.
    pub fn frequency_response(&self, n: usize) -> Vec<ResponsePoint> {
        let n = n.max(2);
        (0..n)
            .map(|i| {
                let t = i as f64 / (n - 1) as f64;
                // 20 Hz → 20 kHz spans exactly three decades.
                let freq = 20.0 * (1000.0_f64).powf(t);
                let mut magnitude = 1.0;
                let mut phase = 0.0;
                for band in &self.left {
                    let h = band.response_at(freq);
                    magnitude *= h.norm();
                    phase += h.arg();
                }
                ResponsePoint { frequency: freq, magnitude, phase }
            })
            .collect()
    }

    /// Process one stereo frame through whichever path is active.
    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        if self.chain_gain == 0.0 {
            return (left * self.bypass_gain, right * self.bypass_gain);
        }
        let mut l = left as f64;
        let mut r = right as f64;
        for band in &mut self.left {
            l = band.process(l);
        }
        for band in &mut self.right {
            r = band.process(r);
        }
        (l as f32 * self.chain_gain, r as f32 * self.chain_gain)
    }

    /// Clear all band state.
    pub fn reset(&mut self) {
        for band in self.left.iter_mut().chain(self.right.iter_mut()) {
            band.reset();
        }
    }
}
