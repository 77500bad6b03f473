//! Voice — one playing instance of a sample buffer.
//!
//! A voice reads its buffer at a rate multiplier (pitch), applies a private
//! gain with ramp automation and a simple pan law, and accumulates into a
//! category bus. Voices are created by the scheduler or the music player
//! and forgotten when they finish.

use std::sync::Arc;

use crate::buffer::SampleBuffer;
use crate::context::Category;
use crate::dsp::mixer::StereoBus;

/// Opaque handle returned by `play`. Stale handles are harmless: stopping a
/// voice that already ended is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceHandle(pub(crate) u64);

/// Ramp shapes for gain automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampCurve {
    Linear,
    /// WebAudio-style exponential ramp; endpoints are floored at a small
    /// positive value since the curve cannot touch zero.
    Exponential,
}

/// A frame-bounded gain ramp.
#[derive(Debug, Clone, Copy)]
pub struct GainRamp {
    pub start_frame: u64,
    pub end_frame: u64,
    pub from: f64,
    pub to: f64,
    pub curve: RampCurve,
}

const EXP_FLOOR: f64 = 1.0e-4;

impl GainRamp {
    pub fn value_at(&self, frame: u64) -> f64 {
        if frame <= self.start_frame || self.end_frame <= self.start_frame {
            return self.from;
        }
        if frame >= self.end_frame {
            return self.to;
        }
        let p = (frame - self.start_frame) as f64 / (self.end_frame - self.start_frame) as f64;
        match self.curve {
            RampCurve::Linear => self.from + (self.to - self.from) * p,
            RampCurve::Exponential => {
                let from = self.from.max(EXP_FLOOR);
                let to = self.to.max(EXP_FLOOR);
                from * (to / from).powf(p)
            }
        }
    }

    pub fn is_done(&self, frame: u64) -> bool {
        frame >= self.end_frame
    }
}

/// One playback instance.
#[derive(Debug, Clone)]
pub struct Voice {
    id: u64,
    buffer: Arc<SampleBuffer>,
    category: Category,
    /// Fractional read position in buffer frames.
    position: f64,
    /// Playback-rate multiplier (pitch).
    rate: f64,
    /// Base gain; the momentary gain may be ramping toward it.
    gain: f64,
    ramp: Option<GainRamp>,
    /// Pan in [-1, 1]; simple linear law, unity at center.
    pan: f64,
    looping: bool,
    started_frame: u64,
    /// Armed when a fade-out should begin at this buffer position.
    fade_out_at: Option<(f64, u64)>,
    stopped: bool,
}

impl Voice {
    pub fn new(
        id: u64,
        buffer: Arc<SampleBuffer>,
        category: Category,
        gain: f64,
        rate: f64,
        pan: f64,
        looping: bool,
        now_frame: u64,
    ) -> Self {
        Voice {
            id,
            buffer,
            category,
            position: 0.0,
            rate,
            gain,
            ramp: None,
            pan: pan.clamp(-1.0, 1.0),
            looping,
            started_frame: now_frame,
            fade_out_at: None,
            stopped: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn handle(&self) -> VoiceHandle {
        VoiceHandle(self.id)
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn started_frame(&self) -> u64 {
        self.started_frame
    }

    pub fn buffer(&self) -> &Arc<SampleBuffer> {
        &self.buffer
    }

    /// Playback position in buffer seconds.
    pub fn position_seconds(&self) -> f64 {
        self.position / self.buffer.sample_rate()
    }

    /// Momentary gain at `frame`.
    pub fn gain_at(&self, frame: u64) -> f64 {
        match &self.ramp {
            Some(ramp) => ramp.value_at(frame),
            None => self.gain,
        }
    }

    /// Ramp the gain from its momentary value to `target` over `frames`.
    /// Zero `frames` snaps immediately.
    pub fn ramp_gain(&mut self, target: f64, frames: u64, curve: RampCurve, now_frame: u64) {
        let from = self.gain_at(now_frame);
        self.gain = target;
        self.ramp = if frames == 0 {
            None
        } else {
            Some(GainRamp {
                start_frame: now_frame,
                end_frame: now_frame + frames,
                from,
                to: target,
                curve,
            })
        };
    }

    /// Exponential fade-in from silence to the base gain.
    pub fn fade_in(&mut self, seconds: f64, sample_rate: f64, now_frame: u64) {
        if seconds <= 0.0 {
            return;
        }
        let target = self.gain;
        self.ramp = Some(GainRamp {
            start_frame: now_frame,
            end_frame: now_frame + (seconds * sample_rate) as u64,
            from: EXP_FLOOR,
            to: target,
            curve: RampCurve::Exponential,
        });
    }

    /// Arm a fade-out ending exactly at clip end, if the clip is long
    /// enough to hold it after any fade-in.
    pub fn arm_fade_out(&mut self, seconds: f64, fade_in_seconds: f64) {
        if seconds <= 0.0 || self.looping {
            return;
        }
        let clip = self.buffer.duration_seconds();
        if clip <= seconds + fade_in_seconds {
            return;
        }
        let start_pos = (clip - seconds) * self.buffer.sample_rate();
        let frames = (seconds * self.buffer.sample_rate() / self.rate) as u64;
        self.fade_out_at = Some((start_pos, frames));
    }

    /// Immediate, idempotent stop.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn is_finished(&self) -> bool {
        self.stopped || (!self.looping && self.position >= self.buffer.frames() as f64)
    }

    /// Render `frames` samples into `bus` starting at bus frame 0, reading
    /// from the current position. Returns false once the voice finished.
    pub fn render_into(&mut self, bus: &mut StereoBus, now_frame: u64, frames: usize) -> bool {
        if self.is_finished() {
            return false;
        }
        let len = self.buffer.frames() as f64;
        let (pan_l, pan_r) = pan_law(self.pan);

        for i in 0..frames {
            if self.position >= len {
                if self.looping {
                    self.position -= len;
                } else {
                    break;
                }
            }

            let frame = now_frame + i as u64;
            // Promote the armed fade-out once the read head crosses it.
            if let Some((at_pos, dur)) = self.fade_out_at
                && self.position >= at_pos
            {
                let from = self.gain_at(frame);
                self.ramp = Some(GainRamp {
                    start_frame: frame,
                    end_frame: frame + dur,
                    from,
                    to: EXP_FLOOR,
                    curve: RampCurve::Exponential,
                });
                self.gain = EXP_FLOOR;
                self.fade_out_at = None;
            }

            let gain = self.gain_at(frame) as f32;
            let (l, r) = self.buffer.frame_lerp(self.position);
            bus.add(i, l * gain * pan_l, r * gain * pan_r);
            self.position += self.rate;
        }

        !self.is_finished()
    }
}

/// Linear pan law: unity at center, full attenuation of the far channel at
/// the extremes.
#[inline]
fn pan_law(pan: f64) -> (f32, f32) {
    ((1.0 - pan.max(0.0)) as f32, (1.0 + pan.min(0.0)) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_buffer(frames: usize) -> Arc<SampleBuffer> {
        Arc::new(SampleBuffer::new(
            "t",
            1,
            44100.0,
            (0..frames).map(|i| ((i % 100) as f32 / 100.0) * 0.5).collect(),
        ))
    }

    #[test]
    fn voice_finishes_at_buffer_end() {
        let mut v = Voice::new(1, test_buffer(100), Category::Sfx, 1.0, 1.0, 0.0, false, 0);
        let mut bus = StereoBus::new();
        bus.clear(256);
        assert!(!v.render_into(&mut bus, 0, 256), "100-frame clip ends inside the quantum");
        assert!(v.is_finished());
    }

    #[test]
    fn looping_voice_wraps_instead_of_finishing() {
        let mut v = Voice::new(1, test_buffer(100), Category::Sfx, 1.0, 1.0, 0.0, true, 0);
        let mut bus = StereoBus::new();
        bus.clear(1000);
        assert!(v.render_into(&mut bus, 0, 1000));
        assert!(!v.is_finished());
    }

    #[test]
    fn double_rate_consumes_buffer_twice_as_fast() {
        let mut v = Voice::new(1, test_buffer(200), Category::Sfx, 1.0, 2.0, 0.0, false, 0);
        let mut bus = StereoBus::new();
        bus.clear(100);
        v.render_into(&mut bus, 0, 100);
        assert!((v.position_seconds() - 200.0 / 44100.0).abs() < 1e-6);
        assert!(v.is_finished());
    }

    #[test]
    fn stop_is_idempotent() {
        let mut v = Voice::new(1, test_buffer(100), Category::Music, 1.0, 1.0, 0.0, true, 0);
        v.stop();
        assert!(v.is_finished());
        v.stop();
        assert!(v.is_finished());
    }

    #[test]
    fn linear_ramp_hits_target_midway() {
        let ramp = GainRamp {
            start_frame: 0,
            end_frame: 100,
            from: 0.0,
            to: 1.0,
            curve: RampCurve::Linear,
        };
        assert!((ramp.value_at(50) - 0.5).abs() < 1e-9);
        assert_eq!(ramp.value_at(200), 1.0);
    }

    #[test]
    fn exponential_ramp_is_monotonic_and_bounded() {
        let ramp = GainRamp {
            start_frame: 0,
            end_frame: 1000,
            from: 0.0, // floored internally
            to: 0.8,
            curve: RampCurve::Exponential,
        };
        let mut prev = ramp.value_at(0);
        for f in (0..=1000).step_by(50) {
            let v = ramp.value_at(f);
            assert!(v >= prev - 1e-12, "ramp should rise monotonically");
            assert!(v <= 0.8 + 1e-12);
            prev = v;
        }
    }

    #[test]
    fn fade_in_starts_near_silence() {
        let mut v = Voice::new(1, test_buffer(44100), Category::Music, 0.8, 1.0, 0.0, false, 0);
        v.fade_in(0.5, 44100.0, 0);
        assert!(v.gain_at(0) < 0.001, "fade-in should start near silence");
        assert!((v.gain_at(44100) - 0.8).abs() < 1e-6, "and end at the base gain");
    }

    #[test]
    fn pan_law_is_unity_at_center() {
        assert_eq!(pan_law(0.0), (1.0, 1.0));
        let (l, r) = pan_law(1.0);
        assert_eq!((l, r), (0.0, 1.0));
        let (l, r) = pan_law(-1.0);
        assert_eq!((l, r), (1.0, 0.0));
    }
}
