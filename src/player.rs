//! Music player — drives the single "now playing" track with fade-in/out,
//! pause bookkeeping, seamless loop crossfades, and one queued successor.
//!
//! The loop seam is position-driven: when the read head reaches
//! `duration − crossfade`, a second voice for the same buffer starts while
//! the outgoing one ramps down; after the window the outgoing voice is
//! hard-stopped and the incoming one becomes current. There is no instant
//! at which both voices are silent.

use crate::context::Category;
use crate::dsp::mixer::StereoBus;
use crate::synth::music::{MusicTrack, TrackSpec};
use crate::voice::{RampCurve, Voice};

/// Default loop crossfade window in seconds.
pub const DEFAULT_LOOP_CROSSFADE: f64 = 0.5;

/// Seconds of ramp used to soften pause/resume.
const PAUSE_RAMP: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Playing,
    Paused,
}

/// Options for starting a track.
#[derive(Debug, Clone, Copy)]
pub struct PlayTrackOptions {
    pub volume: f64,
    pub fade_in: f64,
    pub looping: bool,
    /// Loop-seam crossfade window in seconds.
    pub crossfade: f64,
}

impl Default for PlayTrackOptions {
    fn default() -> Self {
        PlayTrackOptions {
            volume: 1.0,
            fade_in: 0.0,
            looping: true,
            crossfade: DEFAULT_LOOP_CROSSFADE,
        }
    }
}

/// Emitted by `tick` when the player needs its owner to act.
#[derive(Debug, Clone)]
pub enum TickEvent {
    /// The current track ended naturally and this queued track should start.
    StartQueued(String, PlayTrackOptions),
}

#[derive(Debug)]
struct ActiveTrack {
    track: MusicTrack,
    voice: Voice,
    /// Previous loop iteration (or crossfade source) still ringing out.
    outgoing: Option<Voice>,
    /// Frame at which the outgoing voice is hard-stopped.
    outgoing_deadline: Option<u64>,
    started_frame: u64,
    looping: bool,
    crossfade: f64,
    volume: f64,
    /// Armed while a stop-with-fade is in flight.
    stop_deadline: Option<u64>,
}

/// The single music playback slot of the session.
#[derive(Debug)]
pub struct MusicPlayer {
    sample_rate: f64,
    state: PlayerState,
    current: Option<ActiveTrack>,
    queued: Option<(String, PlayTrackOptions)>,
    next_voice_id: u64,
    /// While pausing, rendering continues to this frame so the pause ramp
    /// can be heard.
    pause_render_until: Option<u64>,
    paused_at_frame: Option<u64>,
    paused_frames_total: u64,
}

impl MusicPlayer {
    pub fn new(sample_rate: f64) -> Self {
        MusicPlayer {
            sample_rate,
            state: PlayerState::Idle,
            current: None,
            queued: None,
            next_voice_id: 1,
            pause_render_until: None,
            paused_at_frame: None,
            paused_frames_total: 0,
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn current_track_name(&self) -> Option<&str> {
        self.current.as_ref().map(|a| a.track.spec.name.as_str())
    }

    pub fn current_spec(&self) -> Option<&TrackSpec> {
        self.current.as_ref().map(|a| &a.track.spec)
    }

    pub fn current_volume(&self) -> f64 {
        self.current.as_ref().map(|a| a.volume).unwrap_or(0.0)
    }

    /// Playback position within the track buffer, in seconds.
    pub fn position_seconds(&self) -> f64 {
        self.current
            .as_ref()
            .map(|a| a.voice.position_seconds())
            .unwrap_or(0.0)
    }

    /// Frame at which the current loop iteration (or track) started.
    pub fn current_started_frame(&self) -> Option<u64> {
        self.current.as_ref().map(|a| a.started_frame)
    }

    /// Total frames spent paused this session (status bookkeeping).
    pub fn paused_frames_total(&self) -> u64 {
        self.paused_frames_total
    }

    /// Loop wrapping is the seam's job, so player voices never self-loop.
    fn make_voice(&mut self, track: &MusicTrack, gain: f64, now_frame: u64) -> Voice {
        let id = self.next_voice_id;
        self.next_voice_id += 1;
        Voice::new(
            id,
            track.buffer.clone(),
            Category::Music,
            gain,
            1.0,
            0.0,
            false,
            now_frame,
        )
    }

    /// Start a track, replacing whatever is playing. Cancels the previous
    /// track's pending seam implicitly — its voices are dropped here.
    pub fn play(&mut self, track: MusicTrack, options: PlayTrackOptions, now_frame: u64) {
        let mut voice = self.make_voice(&track, options.volume, now_frame);
        if options.fade_in > 0.0 {
            voice.fade_in(options.fade_in, self.sample_rate, now_frame);
        }
        log::debug!("music: playing '{}'", track.spec.name);
        let crossfade = clamp_crossfade(options.crossfade, &track);
        self.current = Some(ActiveTrack {
            track,
            voice,
            outgoing: None,
            outgoing_deadline: None,
            started_frame: now_frame,
            looping: options.looping,
            crossfade,
            volume: options.volume,
            stop_deadline: None,
        });
        self.state = PlayerState::Playing;
        self.pause_render_until = None;
        self.paused_at_frame = None;
    }

    /// Stop the current track, optionally fading out first. Idempotent.
    pub fn stop(&mut self, fade_out: f64, now_frame: u64) {
        let Some(active) = self.current.as_mut() else {
            return;
        };
        if fade_out > 0.0 && self.state == PlayerState::Playing {
            let frames = (fade_out * self.sample_rate) as u64;
            active.voice.ramp_gain(0.0, frames, RampCurve::Exponential, now_frame);
            active.stop_deadline = Some(now_frame + frames);
        } else {
            self.current = None;
            self.state = PlayerState::Idle;
        }
    }

    /// Drive the fade amplitude to zero and freeze the read head.
    pub fn pause(&mut self, now_frame: u64) {
        if self.state != PlayerState::Playing || self.current.is_none() {
            return;
        }
        let ramp_frames = (PAUSE_RAMP * self.sample_rate) as u64;
        if let Some(active) = self.current.as_mut() {
            active.voice.ramp_gain(0.0, ramp_frames, RampCurve::Linear, now_frame);
        }
        self.state = PlayerState::Paused;
        self.pause_render_until = Some(now_frame + ramp_frames);
        self.paused_at_frame = Some(now_frame);
    }

    /// Restore the fade amplitude and resume the read head.
    pub fn resume(&mut self, now_frame: u64) {
        if self.state != PlayerState::Paused {
            return;
        }
        if let Some(paused_at) = self.paused_at_frame.take() {
            self.paused_frames_total += now_frame.saturating_sub(paused_at);
        }
        let ramp_frames = (PAUSE_RAMP * self.sample_rate) as u64;
        if let Some(active) = self.current.as_mut() {
            let target = active.volume;
            active.voice.ramp_gain(target, ramp_frames, RampCurve::Linear, now_frame);
        }
        self.state = PlayerState::Playing;
        self.pause_render_until = None;
    }

    /// Ramped volume change of the current track's fade gain.
    pub fn set_volume(&mut self, level: f64, fade_seconds: f64, now_frame: u64) {
        let Some(active) = self.current.as_mut() else {
            return;
        };
        let level = level.clamp(0.0, 1.0);
        active.volume = level;
        let frames = (fade_seconds.max(0.0) * self.sample_rate) as u64;
        active.voice.ramp_gain(level, frames, RampCurve::Linear, now_frame);
    }

    /// Queue a single successor, replacing any previous one. It starts when
    /// the current non-looping track ends naturally.
    pub fn queue_next(&mut self, name: impl Into<String>, options: PlayTrackOptions) {
        self.queued = Some((name.into(), options));
    }

    pub fn queued_track(&self) -> Option<&str> {
        self.queued.as_ref().map(|(n, _)| n.as_str())
    }

    // ── Crossfade support (driven by the transition manager) ─

    /// Hand the current voice to the outgoing slot and start `track` muted
    /// alongside it. The caller steps the two gains, then calls
    /// [`finish_crossfade`](Self::finish_crossfade).
    pub fn begin_crossfade(&mut self, track: MusicTrack, options: PlayTrackOptions, now_frame: u64) {
        let outgoing = self.current.take().map(|mut a| {
            a.voice.ramp_gain(a.voice.gain_at(now_frame), 0, RampCurve::Linear, now_frame);
            a.voice
        });
        let voice = self.make_voice(&track, 0.0, now_frame);
        let crossfade = clamp_crossfade(options.crossfade, &track);
        self.current = Some(ActiveTrack {
            track,
            voice,
            outgoing,
            outgoing_deadline: None,
            started_frame: now_frame,
            looping: options.looping,
            crossfade,
            volume: options.volume,
            stop_deadline: None,
        });
        self.state = PlayerState::Playing;
    }

    /// Set both sides of an in-flight crossfade. Gains are snapped; the
    /// caller steps them at its own resolution.
    pub fn set_crossfade_gains(&mut self, outgoing: f64, incoming: f64, now_frame: u64) {
        if let Some(active) = self.current.as_mut() {
            active.voice.ramp_gain(incoming, 0, RampCurve::Linear, now_frame);
            if let Some(out) = active.outgoing.as_mut() {
                out.ramp_gain(outgoing, 0, RampCurve::Linear, now_frame);
            }
        }
    }

    /// Hard-stop the outgoing side and settle the incoming gain.
    pub fn finish_crossfade(&mut self, now_frame: u64) {
        if let Some(active) = self.current.as_mut() {
            if let Some(mut out) = active.outgoing.take() {
                out.stop();
            }
            active.outgoing_deadline = None;
            let target = active.volume;
            active.voice.ramp_gain(target, 0, RampCurve::Linear, now_frame);
        }
    }

    pub fn has_outgoing(&self) -> bool {
        self.current
            .as_ref()
            .map(|a| a.outgoing.is_some())
            .unwrap_or(false)
    }

    // ── Per-quantum reconciliation ──────────────────────────

    /// Advance the state machine against the frame clock. Loop seams fire
    /// here; a returned event asks the owner to start the queued track.
    pub fn tick(&mut self, now_frame: u64) -> Option<TickEvent> {
        let Some(active) = self.current.as_mut() else {
            return None;
        };

        // Finish a stop-with-fade.
        if let Some(deadline) = active.stop_deadline
            && now_frame >= deadline
        {
            self.current = None;
            self.state = PlayerState::Idle;
            return None;
        }

        // Hard-stop an outgoing loop voice whose window has passed.
        if let Some(deadline) = active.outgoing_deadline
            && now_frame >= deadline
        {
            if let Some(mut out) = active.outgoing.take() {
                out.stop();
            }
            active.outgoing_deadline = None;
        }

        if self.state != PlayerState::Playing {
            return None;
        }

        let duration = active.track.buffer.duration_seconds();

        // Loop seam: start the next iteration `crossfade` seconds before
        // the buffer runs out.
        if active.looping
            && active.outgoing.is_none()
            && active.voice.position_seconds() >= duration - active.crossfade
        {
            let crossfade_frames = (active.crossfade * self.sample_rate) as u64;
            let volume = active.volume;

            // Incoming rises from silence to the prior volume while the
            // outgoing ramps to zero over the same window.
            let mut incoming = Voice::new(
                self.next_voice_id,
                active.track.buffer.clone(),
                Category::Music,
                0.0,
                1.0,
                0.0,
                false,
                now_frame,
            );
            self.next_voice_id += 1;
            incoming.ramp_gain(volume, crossfade_frames, RampCurve::Linear, now_frame);

            let mut outgoing = std::mem::replace(&mut active.voice, incoming);
            outgoing.ramp_gain(0.0, crossfade_frames, RampCurve::Linear, now_frame);

            active.outgoing = Some(outgoing);
            active.outgoing_deadline = Some(now_frame + crossfade_frames);
            active.started_frame = now_frame;
            log::debug!(
                "music: loop seam on '{}' ({}s window)",
                active.track.spec.name,
                active.crossfade
            );
            return None;
        }

        // Natural end of a non-looping track.
        if !active.looping && active.voice.is_finished() {
            log::debug!("music: '{}' ended", active.track.spec.name);
            self.current = None;
            self.state = PlayerState::Idle;
            if let Some((name, options)) = self.queued.take() {
                return Some(TickEvent::StartQueued(name, options));
            }
        }

        None
    }

    /// Render the current (and any outgoing) voice into the music bus.
    pub fn mix_into(&mut self, bus: &mut StereoBus, now_frame: u64, frames: usize) {
        let frames = match self.state {
            PlayerState::Playing => frames,
            // Render only the tail of the pause ramp so it is audible but
            // the read head does not creep past it.
            PlayerState::Paused => self
                .pause_render_until
                .map(|until| frames.min(until.saturating_sub(now_frame) as usize))
                .unwrap_or(0),
            PlayerState::Idle => 0,
        };
        if frames == 0 {
            return;
        }
        if let Some(active) = self.current.as_mut() {
            active.voice.render_into(bus, now_frame, frames);
            if let Some(out) = active.outgoing.as_mut() {
                out.render_into(bus, now_frame, frames);
            }
        }
    }
}

/// Seam windows never exceed half the buffer, so a seam cannot re-trigger
/// while its own window is still draining.
fn clamp_crossfade(crossfade: f64, track: &MusicTrack) -> f64 {
    crossfade
        .max(0.05)
        .min(track.buffer.duration_seconds() / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SampleBuffer;
    use crate::synth::music::{MusicStyle, TrackSpec};
    use std::sync::Arc;

    const SR: f64 = 1000.0; // coarse rate keeps the arithmetic readable

    fn track(duration: f64) -> MusicTrack {
        let frames = (duration * SR) as usize;
        MusicTrack {
            spec: TrackSpec::new("loop", MusicStyle::Energetic, duration, 120.0, "C", 4).unwrap(),
            buffer: Arc::new(SampleBuffer::new("loop", 2, SR, vec![0.5; frames * 2])),
        }
    }

    /// Render forward in fixed quanta, ticking like the engine does.
    fn run(player: &mut MusicPlayer, start: u64, quanta: usize, quantum: usize) -> u64 {
        let mut now = start;
        let mut bus = StereoBus::new();
        for _ in 0..quanta {
            player.tick(now);
            bus.clear(quantum);
            player.mix_into(&mut bus, now, quantum);
            now += quantum as u64;
        }
        now
    }

    #[test]
    fn play_enters_playing_state() {
        let mut p = MusicPlayer::new(SR);
        assert_eq!(p.state(), PlayerState::Idle);
        p.play(track(2.0), PlayTrackOptions::default(), 250);
        assert_eq!(p.state(), PlayerState::Playing);
        assert_eq!(p.current_track_name(), Some("loop"));
        assert_eq!(p.current_started_frame(), Some(250));
    }

    #[test]
    fn loop_seam_spawns_second_voice_before_the_end() {
        let mut p = MusicPlayer::new(SR);
        p.play(
            track(1.0),
            PlayTrackOptions { crossfade: 0.2, ..Default::default() },
            0,
        );
        // Render up to just before the seam point (0.8 s).
        let now = run(&mut p, 0, 7, 100); // 0.7 s
        assert!(!p.has_outgoing());
        // Crossing 0.8 s arms the seam.
        let now = run(&mut p, now, 2, 100); // 0.9 s
        assert!(p.has_outgoing(), "a second voice should exist inside the seam window");

        // After the window the outgoing voice is hard-stopped and playback
        // continues from the new iteration.
        let _ = run(&mut p, now, 3, 100);
        assert!(!p.has_outgoing(), "outgoing voice should be gone after the window");
        assert_eq!(p.state(), PlayerState::Playing);
        assert!(p.position_seconds() < 0.5, "the new iteration restarted the buffer");
    }

    #[test]
    fn music_is_never_silent_across_the_seam() {
        let mut p = MusicPlayer::new(SR);
        p.play(
            track(1.0),
            PlayTrackOptions { crossfade: 0.2, ..Default::default() },
            0,
        );
        let mut now = 0u64;
        let mut bus = StereoBus::new();
        for _ in 0..15 {
            p.tick(now);
            bus.clear(100);
            p.mix_into(&mut bus, now, 100);
            let peak = (0..100)
                .map(|i| bus.frame(i, 1.0).0.abs())
                .fold(0.0f32, f32::max);
            assert!(peak > 0.01, "silence at t={}s", now as f64 / SR);
            now += 100;
        }
    }

    #[test]
    fn pause_freezes_position_and_resume_restores_it() {
        let mut p = MusicPlayer::new(SR);
        p.play(track(5.0), PlayTrackOptions::default(), 0);
        let now = run(&mut p, 0, 5, 100);
        let pos = p.position_seconds();
        assert!(pos > 0.4);

        p.pause(now);
        assert_eq!(p.state(), PlayerState::Paused);
        // Render a long paused stretch; position may creep only through the
        // short pause ramp.
        let now = run(&mut p, now, 10, 100);
        assert!(p.position_seconds() - pos < 0.06, "paused head must hold still");

        p.resume(now);
        assert_eq!(p.state(), PlayerState::Playing);
        assert!(p.paused_frames_total() >= 900);
        let _ = run(&mut p, now, 5, 100);
        assert!(p.position_seconds() > pos + 0.4);
    }

    #[test]
    fn queued_track_is_requested_at_natural_end() {
        let mut p = MusicPlayer::new(SR);
        p.play(
            track(0.5),
            PlayTrackOptions { looping: false, ..Default::default() },
            0,
        );
        p.queue_next("finale", PlayTrackOptions::default());
        assert_eq!(p.queued_track(), Some("finale"));

        let mut event = None;
        let mut now = 0u64;
        let mut bus = StereoBus::new();
        for _ in 0..10 {
            if let Some(e) = p.tick(now) {
                event = Some(e);
                break;
            }
            bus.clear(100);
            p.mix_into(&mut bus, now, 100);
            now += 100;
        }
        match event {
            Some(TickEvent::StartQueued(name, _)) => assert_eq!(name, "finale"),
            None => panic!("queued track was never requested"),
        }
        assert_eq!(p.state(), PlayerState::Idle);
        assert_eq!(p.queued_track(), None);
    }

    #[test]
    fn stop_with_fade_tears_down_at_the_deadline() {
        let mut p = MusicPlayer::new(SR);
        p.play(track(5.0), PlayTrackOptions::default(), 0);
        p.stop(0.2, 0);
        assert_eq!(p.state(), PlayerState::Playing, "fade-out is still audible");
        let _ = run(&mut p, 0, 4, 100);
        assert_eq!(p.state(), PlayerState::Idle);
        // Stopping again is a no-op.
        p.stop(0.0, 400);
        assert_eq!(p.state(), PlayerState::Idle);
    }

    #[test]
    fn crossfade_handoff_keeps_both_voices_then_one() {
        let mut p = MusicPlayer::new(SR);
        p.play(track(5.0), PlayTrackOptions::default(), 0);
        let now = run(&mut p, 0, 2, 100);

        p.begin_crossfade(track(5.0), PlayTrackOptions::default(), now);
        assert!(p.has_outgoing());
        p.set_crossfade_gains(0.5, 0.5, now);
        p.finish_crossfade(now);
        assert!(!p.has_outgoing());
        assert!((p.current_volume() - 1.0).abs() < 1e-9);
    }
}
