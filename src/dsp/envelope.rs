//! Amplitude envelopes: gated ADSR for sustained layers, one-shot
//! exponential decay for percussive material.

/// ADSR stages.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Stage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// Gated ADSR envelope with linear segments. Pad layers of the music
/// generator gate one of these per chord.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Attack time in seconds.
    pub attack: f64,
    /// Decay time in seconds.
    pub decay: f64,
    /// Sustain level [0, 1].
    pub sustain: f64,
    /// Release time in seconds.
    pub release: f64,

    stage: Stage,
    level: f64,
    sample_rate: f64,
    stage_samples: usize,
    stage_counter: usize,
    start_level: f64,
}

impl Envelope {
    pub fn new(sample_rate: f64) -> Self {
        Envelope {
            attack: 0.01,
            decay: 0.1,
            sustain: 0.7,
            release: 0.3,
            stage: Stage::Idle,
            level: 0.0,
            sample_rate,
            stage_samples: 0,
            stage_counter: 0,
            start_level: 0.0,
        }
    }

    /// ADSR tuned for slow pads: long attack and release, full sustain.
    pub fn pad(sample_rate: f64, attack: f64, release: f64) -> Self {
        let mut env = Self::new(sample_rate);
        env.attack = attack;
        env.decay = 0.0;
        env.sustain = 1.0;
        env.release = release;
        env
    }

    /// Trigger the envelope. Retriggers from the current level.
    pub fn gate_on(&mut self) {
        self.stage = Stage::Attack;
        self.stage_samples = (self.attack * self.sample_rate) as usize;
        self.stage_counter = 0;
        self.start_level = self.level;
    }

    /// Release the envelope.
    pub fn gate_off(&mut self) {
        if self.stage == Stage::Idle {
            return;
        }
        self.stage = Stage::Release;
        self.stage_samples = (self.release * self.sample_rate) as usize;
        self.stage_counter = 0;
        self.start_level = self.level;
    }

    /// Next envelope value in [0, 1].
    pub fn next_sample(&mut self) -> f64 {
        match self.stage {
            Stage::Idle => {
                self.level = 0.0;
            }
            Stage::Attack => {
                if self.stage_counter >= self.stage_samples {
                    self.level = 1.0;
                    self.stage = Stage::Decay;
                    self.stage_samples = (self.decay * self.sample_rate) as usize;
                    self.stage_counter = 0;
                } else {
                    let t = self.stage_counter as f64 / self.stage_samples as f64;
                    self.level = self.start_level + (1.0 - self.start_level) * t;
                    self.stage_counter += 1;
                }
            }
            Stage::Decay => {
                if self.stage_counter >= self.stage_samples {
                    self.level = self.sustain;
                    self.stage = Stage::Sustain;
                } else {
                    let t = self.stage_counter as f64 / self.stage_samples as f64;
                    self.level = 1.0 - (1.0 - self.sustain) * t;
                    self.stage_counter += 1;
                }
            }
            Stage::Sustain => {
                self.level = self.sustain;
            }
            Stage::Release => {
                if self.stage_counter >= self.stage_samples {
                    self.level = 0.0;
                    self.stage = Stage::Idle;
                } else {
                    let t = self.stage_counter as f64 / self.stage_samples as f64;
                    self.level = self.start_level * (1.0 - t);
                    self.stage_counter += 1;
                }
            }
        }
        self.level
    }

    pub fn is_finished(&self) -> bool {
        self.stage == Stage::Idle
    }
}

/// One-shot percussive envelope: instant (or very short) attack, then
/// `exp(-t * decay_rate)`. The effect recipes and the drum layers of the
/// music generator shape every hit with one of these.
#[inline]
pub fn percussive(t: f64, attack: f64, decay_rate: f64) -> f64 {
    if t < 0.0 {
        return 0.0;
    }
    let env = (-t * decay_rate).exp();
    if t < attack && attack > 0.0 {
        // Short linear ramp to kill the onset click.
        env * (t / attack)
    } else {
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        let env = Envelope::new(44100.0);
        assert!(env.is_finished());
    }

    #[test]
    fn attack_reaches_full_level() {
        let mut env = Envelope::new(44100.0);
        env.attack = 0.01;
        env.gate_on();
        let mut max = 0.0;
        for _ in 0..500 {
            max = f64::max(max, env.next_sample());
        }
        assert!((max - 1.0).abs() < 0.01, "attack should peak near 1.0, got {max}");
    }

    #[test]
    fn release_returns_to_idle() {
        let mut env = Envelope::new(44100.0);
        env.attack = 0.001;
        env.decay = 0.001;
        env.sustain = 0.6;
        env.release = 0.01;
        env.gate_on();
        for _ in 0..500 {
            env.next_sample();
        }
        env.gate_off();
        for _ in 0..1000 {
            env.next_sample();
        }
        assert!(env.is_finished());
    }

    #[test]
    fn pad_sustains_at_one() {
        let mut env = Envelope::pad(44100.0, 0.005, 0.1);
        env.gate_on();
        for _ in 0..1000 {
            env.next_sample();
        }
        let s = env.next_sample();
        assert!((s - 1.0).abs() < 1e-9, "pad sustain should be 1.0, got {s}");
    }

    #[test]
    fn envelope_always_in_range() {
        let mut env = Envelope::new(44100.0);
        env.gate_on();
        for _ in 0..20000 {
            let s = env.next_sample();
            assert!((0.0..=1.0).contains(&s), "out of range: {s}");
        }
        env.gate_off();
        for _ in 0..20000 {
            let s = env.next_sample();
            assert!((0.0..=1.0).contains(&s), "out of range after release: {s}");
        }
    }

    #[test]
    fn percussive_decays_monotonically() {
        let mut prev = percussive(0.002, 0.002, 8.0);
        for i in 1..100 {
            let t = 0.002 + i as f64 * 0.01;
            let v = percussive(t, 0.002, 8.0);
            assert!(v <= prev, "decay should be monotonic after attack");
            prev = v;
        }
        assert!(percussive(-0.5, 0.002, 8.0) == 0.0);
    }
}
