//! Procedural music synthesis.
//!
//! Four compositional recipes (ambient pad, energetic pop-progression,
//! high-energy syncopated, dramatic orchestral swell) rendered from shared
//! primitives: the scale and progression tables in [`crate::theory`], a
//! per-beat rhythm gate, per-note envelopes, and a cheap feedback echo.
//! Output is statistically similar run to run, not bit-identical — several
//! layers draw uniform noise.

use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::buffer::SampleBuffer;
use crate::dsp::envelope::{Envelope, percussive};
use crate::dsp::filter::{BiquadFilter, FilterType};
use crate::dsp::oscillator::{Oscillator, Waveform};
use crate::error::EngineError;
use crate::theory::{Key, Scale, chord_degrees, midi_to_frequency, parse_key};

/// Compositional style of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MusicStyle {
    Ambient,
    Energetic,
    Exciting,
    Dramatic,
}

impl MusicStyle {
    /// Chord progression as scale-degree roots, one per bar.
    pub fn progression(self) -> &'static [usize] {
        match self {
            MusicStyle::Ambient => &[0, 3, 1, 4],
            MusicStyle::Energetic => &[0, 4, 5, 3], // I–V–vi–IV
            MusicStyle::Exciting => &[0, 0, 3, 4],  // blues turnaround
            MusicStyle::Dramatic => &[0, 5, 3, 4],  // i–VI–iv–v
        }
    }

    /// The scale family the style leans on, given the track's key.
    pub fn scale(self, key: Key) -> Scale {
        match self {
            MusicStyle::Ambient => Scale::Pentatonic,
            MusicStyle::Energetic => key.scale(),
            MusicStyle::Exciting => Scale::Blues,
            MusicStyle::Dramatic => Scale::Minor,
        }
    }

    /// Symmetric style-compatibility score for transition planning.
    pub fn compatibility(self, other: MusicStyle) -> f64 {
        use MusicStyle::*;
        if self == other {
            return 1.0;
        }
        match (self, other) {
            (Energetic, Exciting) | (Exciting, Energetic) => 0.8,
            (Ambient, Dramatic) | (Dramatic, Ambient) => 0.6,
            (Dramatic, Exciting) | (Exciting, Dramatic) => 0.5,
            (Dramatic, Energetic) | (Energetic, Dramatic) => 0.4,
            (Ambient, Energetic) | (Energetic, Ambient) => 0.3,
            (Ambient, Exciting) | (Exciting, Ambient) => 0.2,
            _ => 0.3,
        }
    }
}

/// Descriptor of a generatable track.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSpec {
    pub name: String,
    pub style: MusicStyle,
    pub duration_secs: f64,
    pub tempo_bpm: f64,
    pub key: Key,
    pub beats_per_bar: u32,
}

impl TrackSpec {
    pub fn new(
        name: impl Into<String>,
        style: MusicStyle,
        duration_secs: f64,
        tempo_bpm: f64,
        key: &str,
        beats_per_bar: u32,
    ) -> Option<Self> {
        Some(TrackSpec {
            name: name.into(),
            style,
            duration_secs,
            tempo_bpm,
            key: parse_key(key)?,
            beats_per_bar: beats_per_bar.max(1),
        })
    }
}

/// The track set the game ships. Unknown names are a generation failure.
pub fn builtin_track(name: &str) -> Option<TrackSpec> {
    match name {
        "menu" => TrackSpec::new("menu", MusicStyle::Ambient, 45.0, 60.0, "C", 4),
        "gameplay" => TrackSpec::new("gameplay", MusicStyle::Energetic, 60.0, 120.0, "G", 4),
        "bonus" => TrackSpec::new("bonus", MusicStyle::Exciting, 30.0, 140.0, "D", 4),
        "finale" => TrackSpec::new("finale", MusicStyle::Dramatic, 40.0, 100.0, "Am", 3),
        _ => None,
    }
}

/// Per-render constants derived from a spec.
struct RenderCtx {
    sample_rate: f64,
    frames: usize,
    beat_frames: f64,
    bar_frames: f64,
    key: Key,
    scale: Scale,
    progression: &'static [usize],
}

impl RenderCtx {
    fn new(spec: &TrackSpec, sample_rate: f64) -> Self {
        let beat_frames = 60.0 / spec.tempo_bpm * sample_rate;
        RenderCtx {
            sample_rate,
            frames: (spec.duration_secs * sample_rate).round() as usize,
            beat_frames,
            bar_frames: beat_frames * spec.beats_per_bar as f64,
            key: spec.key,
            scale: spec.style.scale(spec.key),
            progression: spec.style.progression(),
        }
    }

    fn bars(&self) -> usize {
        (self.frames as f64 / self.bar_frames).ceil() as usize
    }

    /// Chord-tone frequencies (root, third, fifth) for a bar.
    fn chord(&self, bar: usize, octave: i32) -> [f64; 3] {
        let step = self.progression[bar % self.progression.len()];
        chord_degrees(step).map(|d| self.scale_freq(d, octave))
    }

    /// Frequency of a scale degree in the style's scale, folding octaves.
    fn scale_freq(&self, degree: usize, octave: i32) -> f64 {
        let semis = self.scale.degree_semitones(degree);
        let midi = (octave + 1) * 12 + self.key.pitch_class + semis;
        midi_to_frequency(midi)
    }
}

/// Renders whole tracks from specs.
#[derive(Debug, Clone)]
pub struct MusicGenerator {
    sample_rate: f64,
}

impl MusicGenerator {
    pub fn new(sample_rate: f64) -> Self {
        MusicGenerator { sample_rate }
    }

    /// Render a stereo buffer of `duration × sample_rate` frames.
    pub fn generate(&self, spec: &TrackSpec) -> Result<SampleBuffer, EngineError> {
        if spec.duration_secs <= 0.0 || spec.tempo_bpm <= 0.0 {
            return Err(EngineError::Generation {
                name: spec.name.clone(),
                reason: format!(
                    "invalid spec: duration {}s at {} bpm",
                    spec.duration_secs, spec.tempo_bpm
                ),
            });
        }

        let ctx = RenderCtx::new(spec, self.sample_rate);
        let mut out = vec![0.0f32; ctx.frames * 2];

        match spec.style {
            MusicStyle::Ambient => self.render_ambient(&ctx, &mut out),
            MusicStyle::Energetic => self.render_energetic(&ctx, &mut out),
            MusicStyle::Exciting => self.render_exciting(&ctx, &mut out),
            MusicStyle::Dramatic => self.render_dramatic(&ctx, &mut out),
        }

        // Cheap room: feed a delayed, scaled copy of the buffer back into
        // itself (an IIR echo, not convolution).
        let (delay, feedback) = match spec.style {
            MusicStyle::Ambient | MusicStyle::Dramatic => (0.25, 0.35),
            MusicStyle::Energetic | MusicStyle::Exciting => (0.12, 0.22),
        };
        apply_echo(&mut out, (delay * self.sample_rate) as usize, feedback);

        // Keep the buffer inside [-1, 1] without hard edges.
        for s in &mut out {
            *s = s.tanh();
        }

        log::debug!(
            "generated track '{}' ({:?}, {:.0}s, {} frames)",
            spec.name,
            spec.style,
            spec.duration_secs,
            ctx.frames
        );
        Ok(SampleBuffer::new(spec.name.clone(), 2, self.sample_rate, out))
    }

    /// Slow detuned pad chords, a soft root drone, sparse shimmer notes.
    fn render_ambient(&self, ctx: &RenderCtx, out: &mut [f32]) {
        for bar in 0..ctx.bars() {
            let bar_start = (bar as f64 * ctx.bar_frames) as usize;
            let bar_len = ctx.bar_frames as usize;
            let chord = ctx.chord(bar, 4);

            // Pad: each chord tone on a detuned L/R sine pair shaped by a
            // long ADSR gate.
            for (i, freq) in chord.iter().enumerate() {
                let level = 0.10 - i as f64 * 0.015;
                add_pad_note(ctx, out, bar_start, bar_len, *freq, level);
            }

            // Root drone an octave down, one gentle swell per bar.
            let root = ctx.chord(bar, 2)[0];
            add_note(ctx, out, bar_start, bar_len, root, Waveform::Sine, 0.12, 0.8, 0.0);

            // Sparse shimmer: maybe one high chord tone per bar.
            if fastrand::f64() < 0.6 {
                let tone = chord[fastrand::usize(0..3)] * 2.0;
                let at = bar_start + fastrand::usize(0..bar_len.max(1));
                let dur = (ctx.beat_frames * 2.0) as usize;
                let pan = fastrand::f64() * 1.6 - 0.8;
                add_note(ctx, out, at, dur, tone, Waveform::Sine, 0.05, 1.2, pan);
            }
        }
    }

    /// Driving eighth-note arps over a kick/snare backbeat.
    fn render_energetic(&self, ctx: &RenderCtx, out: &mut [f32]) {
        const BASS_GATE: [bool; 8] = [true, false, false, true, false, true, false, false];
        let eighth = ctx.beat_frames / 2.0;

        for bar in 0..ctx.bars() {
            let bar_start = (bar as f64 * ctx.bar_frames) as usize;
            let chord = ctx.chord(bar, 4);
            let bass_root = ctx.chord(bar, 2)[0];
            let eighths = ((ctx.bar_frames / eighth) as usize).max(1);

            for step in 0..eighths {
                let at = bar_start + (step as f64 * eighth) as usize;

                // Arpeggio cycles root→third→fifth→third.
                let tone = chord[[0, 1, 2, 1][step % 4]];
                let pan = if step % 2 == 0 { -0.3 } else { 0.3 };
                add_note(ctx, out, at, eighth as usize, tone, Waveform::Triangle, 0.12, 8.0, pan);

                if BASS_GATE[step % BASS_GATE.len()] {
                    add_note(ctx, out, at, eighth as usize, bass_root, Waveform::Square, 0.10, 6.0, 0.0);
                }
            }

            // Backbeat: kick on 1 and 3, snare-ish noise on 2 and 4.
            for beat in 0..4 {
                let at = bar_start + (beat as f64 * ctx.beat_frames) as usize;
                if beat % 2 == 0 {
                    add_kick(ctx, out, at, 0.28);
                } else {
                    add_noise_hit(ctx, out, at, 0.10, 20.0);
                }
            }
        }
    }

    /// Syncopated sixteenth-note pattern with a four-on-the-floor kick.
    fn render_exciting(&self, ctx: &RenderCtx, out: &mut [f32]) {
        const SYNCOPATION: [bool; 16] = [
            true, false, false, true, false, false, true, false,
            false, true, false, true, false, false, true, false,
        ];
        let sixteenth = ctx.beat_frames / 4.0;

        for bar in 0..ctx.bars() {
            let bar_start = (bar as f64 * ctx.bar_frames) as usize;
            let chord = ctx.chord(bar, 4);
            let bass_root = ctx.chord(bar, 2)[0];
            let steps = ((ctx.bar_frames / sixteenth) as usize).max(1);

            for step in 0..steps {
                let at = bar_start + (step as f64 * sixteenth) as usize;

                if SYNCOPATION[step % 16] {
                    let tone = chord[step % 3];
                    let pan = ((step % 4) as f64 - 1.5) * 0.4;
                    add_note(ctx, out, at, sixteenth as usize, tone, Waveform::Sawtooth, 0.09, 14.0, pan);
                    add_note(ctx, out, at, sixteenth as usize, bass_root, Waveform::Square, 0.08, 10.0, 0.0);
                }

                // Closed-hat tick on every sixteenth.
                add_noise_hit(ctx, out, at, 0.035, 60.0);
            }

            for beat in 0..4 {
                let at = bar_start + (beat as f64 * ctx.beat_frames) as usize;
                add_kick(ctx, out, at, 0.3);
            }
        }
    }

    /// Orchestral swell: filtered saw strings under a timpani pulse, with a
    /// melody that enters only past the swell's shoulder.
    fn render_dramatic(&self, ctx: &RenderCtx, out: &mut [f32]) {
        const MELODY_WALK: [usize; 6] = [0, 2, 4, 5, 4, 2];
        let mut melody_idx = 0;

        for bar in 0..ctx.bars() {
            let bar_start = (bar as f64 * ctx.bar_frames) as usize;
            let bar_len = ctx.bar_frames as usize;
            let progress = bar_start as f64 / ctx.frames.max(1) as f64;
            let intensity = (progress * PI).sin();

            // String pad: detuned saws through a lowpass that opens with
            // the swell.
            let chord = ctx.chord(bar, 3);
            let cutoff = 600.0 + intensity * 2200.0;
            for (i, freq) in chord.iter().enumerate() {
                let level = (0.09 - i as f64 * 0.01) * (0.4 + 0.6 * intensity);
                add_filtered_saw(ctx, out, bar_start, bar_len, *freq, level, cutoff);
            }

            // Timpani hit at every bar line, growing with intensity.
            add_timpani(ctx, out, bar_start, ctx.chord(bar, 1)[0], 0.25 * (0.3 + 0.7 * intensity));

            // Melody gated by the swell.
            if intensity > 0.7 {
                for beat in 0..4 {
                    let at = bar_start + (beat as f64 * ctx.beat_frames) as usize;
                    let tone = ctx.scale_freq(MELODY_WALK[melody_idx % MELODY_WALK.len()], 5);
                    melody_idx += 1;
                    add_note(ctx, out, at, ctx.beat_frames as usize, tone, Waveform::Triangle, 0.12, 3.0, 0.2);
                }
            }
        }
    }
}

/// Write one percussive note into the interleaved stereo buffer.
fn add_note(
    ctx: &RenderCtx,
    out: &mut [f32],
    start: usize,
    dur_frames: usize,
    freq: f64,
    waveform: Waveform,
    level: f64,
    decay: f64,
    pan: f64,
) {
    let mut osc = Oscillator::with_frequency(waveform, ctx.sample_rate, freq);
    let (gain_l, gain_r) = pan_gains(pan);
    for i in 0..dur_frames {
        let frame = start + i;
        if frame * 2 + 1 >= out.len() {
            break;
        }
        let t = i as f64 / ctx.sample_rate;
        let s = osc.next_sample() * percussive(t, 0.003, decay) * level;
        out[frame * 2] += (s * gain_l) as f32;
        out[frame * 2 + 1] += (s * gain_r) as f32;
    }
}

/// Pad note: detuned L/R sine pair under a gated ADSR.
fn add_pad_note(ctx: &RenderCtx, out: &mut [f32], start: usize, dur_frames: usize, freq: f64, level: f64) {
    let mut left = Oscillator::with_frequency(Waveform::Sine, ctx.sample_rate, freq);
    let mut right = Oscillator::with_frequency(Waveform::Sine, ctx.sample_rate, freq);
    left.detune = -5.0;
    right.detune = 5.0;

    let attack = dur_frames as f64 / ctx.sample_rate * 0.4;
    let mut env = Envelope::pad(ctx.sample_rate, attack, attack);
    env.gate_on();
    let gate_off_at = dur_frames * 3 / 5;

    for i in 0..dur_frames {
        let frame = start + i;
        if frame * 2 + 1 >= out.len() {
            break;
        }
        if i == gate_off_at {
            env.gate_off();
        }
        let e = env.next_sample() * level;
        out[frame * 2] += (left.next_sample() * e) as f32;
        out[frame * 2 + 1] += (right.next_sample() * e) as f32;
    }
}

/// Saw voice through a lowpass, for the dramatic string layer.
fn add_filtered_saw(
    ctx: &RenderCtx,
    out: &mut [f32],
    start: usize,
    dur_frames: usize,
    freq: f64,
    level: f64,
    cutoff: f64,
) {
    let mut osc = Oscillator::with_frequency(Waveform::Sawtooth, ctx.sample_rate, freq);
    let mut lp = BiquadFilter::band(FilterType::Lowpass, ctx.sample_rate, cutoff, 0.9);
    let fade = (dur_frames / 10).max(1);
    for i in 0..dur_frames {
        let frame = start + i;
        if frame * 2 + 1 >= out.len() {
            break;
        }
        // Linear edge fades keep bar joins from clicking.
        let edge = (i.min(dur_frames - i) as f64 / fade as f64).min(1.0);
        let s = lp.process(osc.next_sample()) * level * edge;
        out[frame * 2] += s as f32;
        out[frame * 2 + 1] += s as f32;
    }
}

/// Kick drum: a fast downward-bending sine thump.
fn add_kick(ctx: &RenderCtx, out: &mut [f32], start: usize, level: f64) {
    let dur = (ctx.sample_rate * 0.12) as usize;
    let mut phase = 0.0;
    for i in 0..dur {
        let frame = start + i;
        if frame * 2 + 1 >= out.len() {
            break;
        }
        let t = i as f64 / ctx.sample_rate;
        let freq = 120.0 * (-t * 30.0).exp() + 45.0;
        phase += 2.0 * PI * freq / ctx.sample_rate;
        let s = phase.sin() * percussive(t, 0.001, 25.0) * level;
        out[frame * 2] += s as f32;
        out[frame * 2 + 1] += s as f32;
    }
}

/// Unpitched noise burst (snare, hat) with the given decay rate.
fn add_noise_hit(ctx: &RenderCtx, out: &mut [f32], start: usize, level: f64, decay: f64) {
    let dur = (ctx.sample_rate * 0.1) as usize;
    for i in 0..dur {
        let frame = start + i;
        if frame * 2 + 1 >= out.len() {
            break;
        }
        let t = i as f64 / ctx.sample_rate;
        let s = (fastrand::f64() * 2.0 - 1.0) * percussive(t, 0.0005, decay) * level;
        out[frame * 2] += s as f32;
        out[frame * 2 + 1] += s as f32;
    }
}

/// Timpani: low sine plus a skin-noise transient.
fn add_timpani(ctx: &RenderCtx, out: &mut [f32], start: usize, freq: f64, level: f64) {
    let dur = (ctx.sample_rate * 0.5) as usize;
    let mut osc = Oscillator::with_frequency(Waveform::Sine, ctx.sample_rate, freq);
    for i in 0..dur {
        let frame = start + i;
        if frame * 2 + 1 >= out.len() {
            break;
        }
        let t = i as f64 / ctx.sample_rate;
        let tone = osc.next_sample() * percussive(t, 0.002, 6.0);
        let skin = (fastrand::f64() * 2.0 - 1.0) * percussive(t, 0.0005, 40.0) * 0.3;
        let s = (tone + skin) * level;
        out[frame * 2] += s as f32;
        out[frame * 2 + 1] += s as f32;
    }
}

/// In-place feedback echo over an interleaved stereo buffer.
fn apply_echo(out: &mut [f32], delay_frames: usize, feedback: f32) {
    let delay = delay_frames * 2;
    if delay == 0 || delay >= out.len() {
        return;
    }
    for i in delay..out.len() {
        out[i] += out[i - delay] * feedback;
    }
}

/// Constant-power pan gains for pan in [-1, 1].
fn pan_gains(pan: f64) -> (f64, f64) {
    let theta = (pan.clamp(-1.0, 1.0) + 1.0) * PI / 4.0;
    (theta.cos(), theta.sin())
}

/// A generated track: descriptor plus its cached buffer.
#[derive(Debug, Clone)]
pub struct MusicTrack {
    pub spec: TrackSpec,
    pub buffer: Arc<SampleBuffer>,
}

/// Lazily generates and caches tracks by name.
#[derive(Debug)]
pub struct TrackLibrary {
    generator: MusicGenerator,
    tracks: HashMap<String, MusicTrack>,
    custom_specs: HashMap<String, TrackSpec>,
}

impl TrackLibrary {
    pub fn new(sample_rate: f64) -> Self {
        TrackLibrary {
            generator: MusicGenerator::new(sample_rate),
            tracks: HashMap::new(),
            custom_specs: HashMap::new(),
        }
    }

    /// Register a custom descriptor (overrides a builtin of the same name
    /// for future generations).
    pub fn define(&mut self, spec: TrackSpec) {
        self.custom_specs.insert(spec.name.clone(), spec);
    }

    /// Descriptor lookup without generating.
    pub fn spec(&self, name: &str) -> Option<TrackSpec> {
        if let Some(track) = self.tracks.get(name) {
            return Some(track.spec.clone());
        }
        self.custom_specs
            .get(name)
            .cloned()
            .or_else(|| builtin_track(name))
    }

    /// The buffer is generated once per name and reused afterwards.
    pub fn get_or_generate(&mut self, name: &str) -> Result<MusicTrack, EngineError> {
        if let Some(track) = self.tracks.get(name) {
            return Ok(track.clone());
        }
        let spec = self.spec(name).ok_or_else(|| EngineError::Generation {
            name: name.to_string(),
            reason: "unknown track".to_string(),
        })?;
        let buffer = Arc::new(self.generator.generate(&spec)?);
        let track = MusicTrack { spec, buffer };
        self.tracks.insert(name.to_string(), track.clone());
        Ok(track)
    }
}
