//! Procedural one-shot effect synthesis.
//!
//! Every game sound is rendered from a named parametric recipe — an
//! oscillator with an optional pitch bend, an exponential decay envelope,
//! and a dash of noise or second harmonic. No sample assets exist.

use std::f64::consts::PI;

use crate::buffer::SampleBuffer;
use crate::dsp::envelope::percussive;
use crate::dsp::filter::{BiquadFilter, FilterType};
use crate::error::EngineError;

/// Recipe used when an unknown effect name is requested.
pub const FALLBACK_RECIPE: &str = "pop";

/// How the noise component is colored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NoiseColor {
    White,
    /// Highpassed at 2 kHz — splashy, for breaking/shattering effects.
    Bright,
}

/// A parametric one-shot recipe. Multi-entry `freqs` render as equal-length
/// sequential segments (rising arpeggios, falling jingles).
#[derive(Debug, Clone, Copy)]
struct SfxRecipe {
    freqs: &'static [f64],
    /// Total duration in seconds.
    duration: f64,
    /// Exponential decay rate per segment.
    decay: f64,
    /// Frequency multiplier reached at each segment's end (1.0 = flat).
    bend: f64,
    /// Additive noise mix [0, 1].
    noise: f64,
    noise_color: NoiseColor,
    /// Second-harmonic mix [0, 1].
    harmonic: f64,
}

const C5: f64 = 523.25;
const E5: f64 = 659.25;
const G5: f64 = 783.99;
const C6: f64 = 1046.5;

fn recipe(name: &str) -> Option<SfxRecipe> {
    use NoiseColor::*;
    let r = match name {
        "pop" => SfxRecipe {
            freqs: &[C5],
            duration: 0.12,
            decay: 18.0,
            bend: 1.5,
            noise: 0.2,
            noise_color: White,
            harmonic: 0.2,
        },
        "pop-small" => SfxRecipe {
            freqs: &[E5],
            duration: 0.08,
            decay: 22.0,
            bend: 1.4,
            noise: 0.15,
            noise_color: White,
            harmonic: 0.15,
        },
        "pop-big" => SfxRecipe {
            freqs: &[392.0],
            duration: 0.18,
            decay: 14.0,
            bend: 1.6,
            noise: 0.3,
            noise_color: White,
            harmonic: 0.25,
        },
        "ui-click" => SfxRecipe {
            freqs: &[880.0],
            duration: 0.05,
            decay: 40.0,
            bend: 1.0,
            noise: 0.05,
            noise_color: White,
            harmonic: 0.3,
        },
        "ui-hover" => SfxRecipe {
            freqs: &[1318.5],
            duration: 0.04,
            decay: 45.0,
            bend: 1.0,
            noise: 0.0,
            noise_color: White,
            harmonic: 0.2,
        },
        "combo" => SfxRecipe {
            freqs: &[C5, E5, G5],
            duration: 0.3,
            decay: 12.0,
            bend: 1.2,
            noise: 0.1,
            noise_color: White,
            harmonic: 0.2,
        },
        "achievement" => SfxRecipe {
            freqs: &[C5, E5, G5, C6],
            duration: 0.6,
            decay: 8.0,
            bend: 1.0,
            noise: 0.05,
            noise_color: White,
            harmonic: 0.3,
        },
        "level-up" => SfxRecipe {
            freqs: &[392.0, C5, E5, G5],
            duration: 0.5,
            decay: 8.0,
            bend: 1.05,
            noise: 0.05,
            noise_color: White,
            harmonic: 0.25,
        },
        "game-over" => SfxRecipe {
            freqs: &[440.0, 415.3, 392.0, 370.0],
            duration: 0.8,
            decay: 6.0,
            bend: 0.97,
            noise: 0.1,
            noise_color: White,
            harmonic: 0.2,
        },
        "countdown" => SfxRecipe {
            freqs: &[880.0],
            duration: 0.15,
            decay: 20.0,
            bend: 1.0,
            noise: 0.0,
            noise_color: White,
            harmonic: 0.1,
        },
        "bonus" => SfxRecipe {
            freqs: &[E5, 830.61, 987.77],
            duration: 0.35,
            decay: 10.0,
            bend: 1.1,
            noise: 0.1,
            noise_color: White,
            harmonic: 0.25,
        },
        "power-up" => SfxRecipe {
            freqs: &[261.63],
            duration: 0.4,
            decay: 6.0,
            bend: 2.0,
            noise: 0.1,
            noise_color: White,
            harmonic: 0.3,
        },
        "shield-break" => SfxRecipe {
            freqs: &[196.0],
            duration: 0.3,
            decay: 10.0,
            bend: 0.8,
            noise: 0.8,
            noise_color: Bright,
            harmonic: 0.1,
        },
        _ => return None,
    };
    Some(r)
}

/// Every recipe name the generator knows, for preloading.
pub const RECIPE_NAMES: [&str; 13] = [
    "pop",
    "pop-small",
    "pop-big",
    "ui-click",
    "ui-hover",
    "combo",
    "achievement",
    "level-up",
    "game-over",
    "countdown",
    "bonus",
    "power-up",
    "shield-break",
];

/// Stateless-per-call effect synthesizer.
#[derive(Debug, Clone)]
pub struct SfxGenerator {
    sample_rate: f64,
}

impl SfxGenerator {
    pub fn new(sample_rate: f64) -> Self {
        SfxGenerator { sample_rate }
    }

    /// Render the named recipe to a mono buffer.
    pub fn generate(&self, name: &str) -> Result<SampleBuffer, EngineError> {
        let recipe = recipe(name).ok_or_else(|| EngineError::Generation {
            name: name.to_string(),
            reason: "unknown effect recipe".to_string(),
        })?;
        Ok(self.render(name, &recipe))
    }

    fn render(&self, name: &str, recipe: &SfxRecipe) -> SampleBuffer {
        let frames = (recipe.duration * self.sample_rate).round() as usize;
        let segments = recipe.freqs.len();
        let segment_dur = recipe.duration / segments as f64;
        let mut data = Vec::with_capacity(frames);

        let mut highpass = BiquadFilter::band(FilterType::Highpass, self.sample_rate, 2000.0, 0.707);
        let mut phase = 0.0_f64;

        for i in 0..frames {
            let t = i as f64 / self.sample_rate;
            let segment = ((t / segment_dur) as usize).min(segments - 1);
            let seg_t = t - segment as f64 * segment_dur;
            let seg_progress = seg_t / segment_dur;

            // Pitch bend within the segment; phase accumulates continuously
            // so segment joins never click.
            let freq = recipe.freqs[segment] * (1.0 + (recipe.bend - 1.0) * seg_progress);
            phase += 2.0 * PI * freq / self.sample_rate;

            let env = percussive(seg_t, 0.002, recipe.decay);
            let tone = phase.sin() * (1.0 - recipe.harmonic) + (2.0 * phase).sin() * recipe.harmonic;

            let mut noise = 0.0;
            if recipe.noise > 0.0 {
                let white = fastrand::f64() * 2.0 - 1.0;
                noise = match recipe.noise_color {
                    NoiseColor::White => white,
                    NoiseColor::Bright => highpass.process(white),
                } * recipe.noise;
            }

            let sample = (tone * (1.0 - recipe.noise * 0.5) + noise) * env * 0.8;
            data.push(sample as f32);
        }

        SampleBuffer::new(name, 1, self.sample_rate, data)
    }

    /// Derive a perceptual variation of an existing buffer: time-stretch by
    /// linear resampling, scale amplitude, inject extra noise. Keeps common
    /// effects from sounding machine-gun identical.
    pub fn generate_variation(
        &self,
        base: &SampleBuffer,
        name: &str,
        stretch: f64,
        amp_scale: f64,
        extra_noise: f64,
    ) -> SampleBuffer {
        let stretch = stretch.clamp(0.25, 4.0);
        let amp_scale = amp_scale.clamp(0.0, 2.0);
        let out_frames = ((base.frames() as f64) * stretch).round().max(1.0) as usize;
        let mut data = Vec::with_capacity(out_frames * base.channels());

        for i in 0..out_frames {
            let src = i as f64 / stretch;
            let (l, r) = base.frame_lerp(src);
            // Noise fades with position so tails stay clean.
            let fade = 1.0 - i as f64 / out_frames as f64;
            for s in [l, r].iter().take(base.channels()) {
                let noise = (fastrand::f64() * 2.0 - 1.0) * extra_noise * fade;
                data.push(((*s as f64) * amp_scale + noise * 0.3) as f32);
            }
        }

        SampleBuffer::new(name, base.channels(), base.sample_rate(), data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_recipe_renders_nonsilent_audio() {
        let generator = SfxGenerator::new(44100.0);
        for name in RECIPE_NAMES {
            let buf = generator.generate(name).unwrap();
            assert_eq!(buf.channels(), 1);
            assert!(buf.frames() > 0, "{name} rendered no frames");
            let peak = buf.data().iter().fold(0.0f32, |m, s| m.max(s.abs()));
            assert!(peak > 0.01, "{name} should be audible, peak {peak}");
            assert!(peak <= 1.0, "{name} should not clip, peak {peak}");
        }
    }

    #[test]
    fn unknown_recipe_is_a_generation_error() {
        let generator = SfxGenerator::new(44100.0);
        let err = generator.generate("kazoo-solo").unwrap_err();
        assert!(matches!(err, EngineError::Generation { .. }));
    }

    #[test]
    fn duration_matches_recipe() {
        let generator = SfxGenerator::new(44100.0);
        let buf = generator.generate("pop").unwrap();
        // pop is 0.12 s
        assert_eq!(buf.frames(), (0.12f64 * 44100.0).round() as usize);
    }

    #[test]
    fn effects_decay_toward_silence() {
        let generator = SfxGenerator::new(44100.0);
        let buf = generator.generate("ui-click").unwrap();
        let frames = buf.frames();
        let head: f32 = buf.data()[..frames / 4].iter().map(|s| s.abs()).sum();
        let tail: f32 = buf.data()[frames * 3 / 4..].iter().map(|s| s.abs()).sum();
        assert!(head > tail * 4.0, "one-shots should decay: head {head}, tail {tail}");
    }

    #[test]
    fn variation_stretches_and_scales() {
        let generator = SfxGenerator::new(44100.0);
        let base = generator.generate("pop").unwrap();
        let varied = generator.generate_variation(&base, "pop-var", 1.5, 0.5, 0.1);
        assert_eq!(varied.frames(), ((base.frames() as f64) * 1.5).round() as usize);
        let base_peak = base.data().iter().fold(0.0f32, |m, s| m.max(s.abs()));
        let varied_peak = varied.data().iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(varied_peak < base_peak, "half amplitude should lower the peak");
    }
}
