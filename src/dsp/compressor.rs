//! Feed-forward dynamics compressor for the master bus.
//!
//! Threshold/ratio/knee/attack/release parameter set in the WebAudio
//! DynamicsCompressorNode tradition, with a peak envelope follower.

/// Threshold value that compresses nothing. Applied when the compressor is
/// bypassed so residual envelope state cannot pump the signal if it is
/// patched back in.
pub const INERT_THRESHOLD_DB: f64 = 0.0;

/// A stereo dynamics compressor.
#[derive(Debug, Clone)]
pub struct Compressor {
    sample_rate: f64,

    /// Threshold in dB (typical: -50 to 0).
    threshold: f64,
    /// Compression ratio (4.0 = 4:1).
    pub ratio: f64,
    /// Knee width in dB (0 = hard knee).
    pub knee: f64,
    /// Makeup gain in dB.
    pub makeup_gain: f64,

    attack_coef: f64,
    release_coef: f64,
    /// Envelope follower level (linear).
    envelope: f64,
    /// Threshold to restore when leaving the inert state.
    saved_threshold: f64,
}

impl Compressor {
    pub fn new(sample_rate: f64) -> Self {
        let mut c = Compressor {
            sample_rate,
            threshold: -24.0,
            ratio: 4.0,
            knee: 6.0,
            makeup_gain: 0.0,
            attack_coef: 0.0,
            release_coef: 0.0,
            envelope: 0.0,
            saved_threshold: -24.0,
        };
        c.set_times(0.003, 0.25);
        c
    }

    pub fn with_params(
        sample_rate: f64,
        threshold: f64,
        ratio: f64,
        attack: f64,
        release: f64,
    ) -> Self {
        let mut c = Self::new(sample_rate);
        c.set_threshold(threshold);
        c.ratio = ratio.clamp(1.0, 20.0);
        c.set_times(attack, release);
        c
    }

    /// Set attack/release times in seconds (envelope follower one-pole
    /// coefficients are derived once here, not per sample).
    pub fn set_times(&mut self, attack: f64, release: f64) {
        let attack = attack.clamp(0.0001, 1.0);
        let release = release.clamp(0.001, 5.0);
        self.attack_coef = (-1.0 / (attack * self.sample_rate)).exp();
        self.release_coef = (-1.0 / (release * self.sample_rate)).exp();
    }

    pub fn set_threshold(&mut self, threshold_db: f64) {
        self.threshold = threshold_db.clamp(-60.0, 0.0);
        self.saved_threshold = self.threshold;
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Force the inert threshold without forgetting the configured one.
    pub fn make_inert(&mut self) {
        self.threshold = INERT_THRESHOLD_DB;
        self.envelope = 0.0;
    }

    /// Restore the configured threshold after a bypass.
    pub fn restore(&mut self) {
        self.threshold = self.saved_threshold;
    }

    #[inline]
    fn linear_to_db(linear: f64) -> f64 {
        if linear <= 0.0 { -120.0 } else { 20.0 * linear.log10() }
    }

    #[inline]
    fn db_to_linear(db: f64) -> f64 {
        10.0_f64.powf(db / 20.0)
    }

    /// Gain reduction in dB (≤ 0) for an input level in dB.
    #[inline]
    fn compute_gain(&self, input_db: f64) -> f64 {
        if self.knee <= 0.0 {
            if input_db <= self.threshold {
                0.0
            } else {
                (self.threshold - input_db) * (1.0 - 1.0 / self.ratio)
            }
        } else {
            let half_knee = self.knee / 2.0;
            let knee_start = self.threshold - half_knee;
            if input_db <= knee_start {
                0.0
            } else if input_db >= self.threshold + half_knee {
                (self.threshold - input_db) * (1.0 - 1.0 / self.ratio)
            } else {
                // Quadratic interpolation through the knee.
                let x = (input_db - knee_start) / self.knee;
                -x * x * (1.0 - 1.0 / self.ratio) * half_knee
            }
        }
    }

    /// Process a stereo sample pair.
    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let input_level = (left.abs()).max(right.abs()) as f64;

        let coef = if input_level > self.envelope {
            self.attack_coef
        } else {
            self.release_coef
        };
        self.envelope = coef * self.envelope + (1.0 - coef) * input_level;

        let gain_db = self.compute_gain(Self::linear_to_db(self.envelope)) + self.makeup_gain;
        let gain = Self::db_to_linear(gain_db) as f32;

        (left * gain, right * gain)
    }

    /// Reset the envelope follower.
    pub fn reset(&mut self) {
        self.envelope = 0.0;
    }

    /// Current gain reduction in dB (for status snapshots).
    pub fn gain_reduction_db(&self) -> f64 {
        -self.compute_gain(Self::linear_to_db(self.envelope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_below_threshold() {
        let mut comp = Compressor::with_params(44100.0, -20.0, 4.0, 0.001, 0.1);
        for _ in 0..1000 {
            comp.process(0.05, 0.05); // -26 dB, under the threshold
        }
        let (out_l, out_r) = comp.process(0.05, 0.05);
        assert!((out_l - 0.05).abs() < 0.01, "below threshold should be ~unity: {out_l}");
        assert!((out_r - 0.05).abs() < 0.01);
    }

    #[test]
    fn test_reduces_loud_signals() {
        let mut comp = Compressor::with_params(44100.0, -12.0, 4.0, 0.001, 0.1);
        for _ in 0..5000 {
            comp.process(1.0, 1.0);
        }
        let (out_l, _) = comp.process(1.0, 1.0);
        // 12 dB over at 4:1 → ~9 dB of reduction.
        assert!(out_l < 0.5, "loud signal should be reduced: {out_l}");
        assert!(out_l > 0.1, "should not be crushed: {out_l}");
        assert!(comp.gain_reduction_db() > 3.0);
    }

    #[test]
    fn test_attack_lets_first_samples_through() {
        let mut comp = Compressor::with_params(44100.0, -20.0, 10.0, 0.01, 0.5);
        let (first, _) = comp.process(1.0, 1.0);
        for _ in 0..500 {
            comp.process(1.0, 1.0);
        }
        let (later, _) = comp.process(1.0, 1.0);
        assert!(first > later, "gain should fall during attack: {first} vs {later}");
    }

    #[test]
    fn test_inert_threshold_disables_compression() {
        let mut comp = Compressor::with_params(44100.0, -30.0, 8.0, 0.001, 0.1);
        comp.make_inert();
        for _ in 0..5000 {
            comp.process(0.9, 0.9);
        }
        let (out, _) = comp.process(0.9, 0.9);
        // 0.9 peaks are still below 0 dBFS, so an inert threshold means no
        // gain reduction at all.
        assert!((out - 0.9).abs() < 0.02, "inert compressor should pass through: {out}");

        comp.restore();
        assert_eq!(comp.threshold(), -30.0);
    }

    #[test]
    fn test_release_recovers_gain() {
        let mut comp = Compressor::with_params(44100.0, -20.0, 10.0, 0.001, 0.05);
        for _ in 0..1000 {
            comp.process(1.0, 1.0);
        }
        let (compressed, _) = comp.process(0.1, 0.1);
        for _ in 0..5000 {
            comp.process(0.1, 0.1);
        }
        let (released, _) = comp.process(0.1, 0.1);
        assert!(released > compressed, "gain should recover: {compressed} → {released}");
    }
}
