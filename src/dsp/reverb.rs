//! Master-bus reverb — Schroeder/Freeverb topology.
//!
//! Eight parallel damped comb filters per channel feed four series allpass
//! diffusers. The right channel's delay lines are offset by a fixed spread
//! for stereo decorrelation.

/// A comb filter delay line with damped feedback.
#[derive(Debug, Clone)]
struct Comb {
    buffer: Vec<f32>,
    index: usize,
    feedback: f32,
    damp1: f32,
    damp2: f32,
    filterstore: f32,
}

impl Comb {
    fn new(size: usize) -> Self {
        Comb {
            buffer: vec![0.0; size.max(1)],
            index: 0,
            feedback: 0.84,
            damp1: 0.2,
            damp2: 0.8,
            filterstore: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let output = self.buffer[self.index];
        // Lowpass in the feedback path (damping).
        self.filterstore = output * self.damp2 + self.filterstore * self.damp1;
        self.buffer[self.index] = input + self.filterstore * self.feedback;
        self.index = (self.index + 1) % self.buffer.len();
        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.filterstore = 0.0;
    }
}

/// An allpass diffuser.
#[derive(Debug, Clone)]
struct Allpass {
    buffer: Vec<f32>,
    index: usize,
    feedback: f32,
}

impl Allpass {
    fn new(size: usize) -> Self {
        Allpass {
            buffer: vec![0.0; size.max(1)],
            index: 0,
            feedback: 0.5,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let bufout = self.buffer[self.index];
        let output = bufout - input;
        self.buffer[self.index] = input + bufout * self.feedback;
        self.index = (self.index + 1) % self.buffer.len();
        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
    }
}

// Delay-line tunings in samples at 44100 Hz (classic Freeverb values).
const COMB_TUNING: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];
const ALLPASS_TUNING: [usize; 4] = [556, 441, 341, 225];
const STEREO_SPREAD: usize = 23;

/// One channel's filter bank.
#[derive(Debug, Clone)]
struct ReverbChannel {
    combs: Vec<Comb>,
    allpasses: Vec<Allpass>,
}

impl ReverbChannel {
    fn new(sample_rate: f64, spread: usize) -> Self {
        let scale = sample_rate / 44100.0;
        ReverbChannel {
            combs: COMB_TUNING
                .iter()
                .map(|&t| Comb::new((t as f64 * scale) as usize + spread))
                .collect(),
            allpasses: ALLPASS_TUNING
                .iter()
                .map(|&t| Allpass::new((t as f64 * scale) as usize + spread))
                .collect(),
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let mut out = 0.0;
        for comb in &mut self.combs {
            out += comb.process(input);
        }
        for allpass in &mut self.allpasses {
            out = allpass.process(out);
        }
        out
    }

    fn set_feedback_damp(&mut self, feedback: f32, damp: f32) {
        for comb in &mut self.combs {
            comb.feedback = feedback;
            comb.damp1 = damp;
            comb.damp2 = 1.0 - damp;
        }
    }

    fn clear(&mut self) {
        for comb in &mut self.combs {
            comb.clear();
        }
        for allpass in &mut self.allpasses {
            allpass.clear();
        }
    }
}

/// Stereo algorithmic reverb.
#[derive(Debug, Clone)]
pub struct Reverb {
    left: ReverbChannel,
    right: ReverbChannel,

    /// Room size [0, 1]; scales decay time.
    pub room_size: f64,
    /// Damping [0, 1]; higher is darker.
    pub damping: f64,
    /// Dry/wet mix [0, 1].
    pub mix: f64,
    /// Stereo width [0, 1].
    pub width: f64,

    input_gain: f32,
}

impl Reverb {
    pub fn new(sample_rate: f64) -> Self {
        let mut r = Reverb {
            left: ReverbChannel::new(sample_rate, 0),
            right: ReverbChannel::new(sample_rate, STEREO_SPREAD),
            room_size: 0.5,
            damping: 0.5,
            mix: 0.2,
            width: 1.0,
            input_gain: 0.015,
        };
        r.update_parameters();
        r
    }

    pub fn with_params(sample_rate: f64, room_size: f64, damping: f64, mix: f64) -> Self {
        let mut r = Self::new(sample_rate);
        r.room_size = room_size.clamp(0.0, 1.0);
        r.damping = damping.clamp(0.0, 1.0);
        r.mix = mix.clamp(0.0, 1.0);
        r.update_parameters();
        r
    }

    /// Push room_size/damping into the comb banks.
    pub fn update_parameters(&mut self) {
        let feedback = (self.room_size * 0.28 + 0.7) as f32;
        let damp = self.damping as f32;
        self.left.set_feedback_damp(feedback, damp);
        self.right.set_feedback_damp(feedback, damp);
    }

    /// Process a stereo sample pair.
    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let input = (left + right) * self.input_gain;

        let out_l = self.left.process(input);
        let out_r = self.right.process(input);

        let width = self.width as f32;
        let wet1 = width / 2.0 + 0.5;
        let wet2 = (1.0 - width) / 2.0;
        let wet_l = out_l * wet1 + out_r * wet2;
        let wet_r = out_r * wet1 + out_l * wet2;

        let mix = self.mix as f32;
        (
            left * (1.0 - mix) + wet_l * mix,
            right * (1.0 - mix) + wet_r * mix,
        )
    }

    /// Drop all reverberant state (used on dispose).
    pub fn clear(&mut self) {
        self.left.clear();
        self.right.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dry_mix_is_passthrough() {
        let mut reverb = Reverb::with_params(44100.0, 0.5, 0.5, 0.0);
        let (l, r) = reverb.process(0.5, -0.5);
        assert!((l - 0.5).abs() < 1e-6);
        assert!((r + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_impulse_produces_tail() {
        let mut reverb = Reverb::with_params(44100.0, 0.5, 0.5, 1.0);
        reverb.process(1.0, 1.0);
        let mut found = false;
        for _ in 0..5000 {
            let (l, r) = reverb.process(0.0, 0.0);
            if l.abs() > 0.001 || r.abs() > 0.001 {
                found = true;
                break;
            }
        }
        assert!(found, "impulse should leave a tail");
    }

    #[test]
    fn test_tail_decays() {
        let mut reverb = Reverb::with_params(44100.0, 0.3, 0.5, 1.0);
        reverb.process(1.0, 1.0);
        for _ in 0..2000 {
            reverb.process(0.0, 0.0);
        }
        let mut late_max = 0.0f32;
        for _ in 0..44100 {
            let (l, r) = reverb.process(0.0, 0.0);
            late_max = late_max.max(l.abs().max(r.abs()));
        }
        assert!(late_max < 0.1, "tail should decay within a second, got {late_max}");
    }

    #[test]
    fn test_clear_silences_tail() {
        let mut reverb = Reverb::with_params(44100.0, 0.9, 0.1, 1.0);
        for _ in 0..100 {
            reverb.process(1.0, 1.0);
        }
        reverb.clear();
        for _ in 0..2000 {
            let (l, r) = reverb.process(0.0, 0.0);
            assert!(l.abs() < 1e-6 && r.abs() < 1e-6, "cleared reverb must be silent");
        }
    }
}
