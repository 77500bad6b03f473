//! Track-to-track transitions as a queued state machine.
//!
//! One transition runs at a time; requests that arrive meanwhile queue in
//! FIFO order and drain after a short settling delay. Crossfades step both
//! sides at a fixed resolution against the frame clock. The smart variant
//! scores harmonic compatibility between the outgoing and incoming tracks
//! and picks its window and curve from the score.

use std::collections::VecDeque;

use crate::error::{EngineError, FaultReport, FaultReporter};
use crate::player::{MusicPlayer, PlayTrackOptions};
use crate::synth::music::{TrackLibrary, TrackSpec};
use crate::theory::key_compatibility;

/// Fade steps per second during a crossfade.
pub const STEP_RATE: f64 = 30.0;

/// Settling delay between queued transitions, in seconds.
const SETTLE_SECONDS: f64 = 0.25;

/// Harmony thresholds: above the high mark the crossfade shortens, below
/// the low mark it stretches.
const HARMONY_HIGH: f64 = 0.8;
const HARMONY_LOW: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// Stop current, start target, no ramp.
    Cut,
    /// Fade current to silence, then fade the target in.
    FadeOutIn,
    /// Ramp both tracks concurrently.
    Crossfade,
    /// Crossfade with harmony-scored duration and curve.
    SmartCrossfade,
}

/// Fade progress shaping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeCurve {
    Linear,
    Exponential,
    Logarithmic,
    Smooth,
}

impl FadeCurve {
    /// Map linear progress p ∈ [0, 1] onto the curve.
    pub fn apply(self, p: f64) -> f64 {
        let p = p.clamp(0.0, 1.0);
        match self {
            FadeCurve::Linear => p,
            FadeCurve::Exponential => p * p,
            FadeCurve::Logarithmic => p.sqrt(),
            FadeCurve::Smooth => p * p * (3.0 - 2.0 * p),
        }
    }
}

/// Options for one transition request.
#[derive(Debug, Clone, Copy)]
pub struct TransitionOptions {
    pub kind: TransitionKind,
    /// Crossfade window (and fade-in for FadeOutIn), seconds.
    pub duration: f64,
    pub curve: FadeCurve,
    /// Delay before the transition begins, seconds.
    pub delay: f64,
    /// Target volume of the incoming track.
    pub volume: f64,
    /// Fade-out window of the outgoing track (FadeOutIn only).
    pub fade_out: f64,
}

impl Default for TransitionOptions {
    fn default() -> Self {
        TransitionOptions {
            kind: TransitionKind::Crossfade,
            duration: 2.0,
            curve: FadeCurve::Smooth,
            delay: 0.0,
            volume: 1.0,
            fade_out: 1.0,
        }
    }
}

/// Heuristic compatibility of two tracks in [0, 1]:
/// `0.4·tempo + 0.3·style + 0.3·key`.
pub fn harmony_score(from: &TrackSpec, to: &TrackSpec) -> f64 {
    let tempo = (1.0 - (from.tempo_bpm - to.tempo_bpm).abs() / 60.0).max(0.0);
    let style = from.style.compatibility(to.style);
    let key = key_compatibility(from.key, to.key);
    0.4 * tempo + 0.3 * style + 0.3 * key
}

#[derive(Debug)]
enum Phase {
    /// Waiting out the request's delay.
    Delayed { until: u64 },
    /// FadeOutIn: outgoing fade still running.
    FadingOut { until: u64 },
    /// Stepped two-sided fade.
    Crossfading {
        start: u64,
        end: u64,
        next_step: u64,
        from_volume: f64,
        to_volume: f64,
        curve: FadeCurve,
    },
}

#[derive(Debug)]
struct ActiveTransition {
    to: String,
    options: TransitionOptions,
    phase: Phase,
}

/// FIFO transition orchestrator. All timing is reconciled in `tick`.
#[derive(Debug)]
pub struct TransitionManager {
    sample_rate: f64,
    active: Option<ActiveTransition>,
    queue: VecDeque<(String, TransitionOptions)>,
    settle_until: u64,
}

impl TransitionManager {
    pub fn new(sample_rate: f64) -> Self {
        TransitionManager {
            sample_rate,
            active: None,
            queue: VecDeque::new(),
            settle_until: 0,
        }
    }

    /// Request a transition. Runs on the next tick, or queues behind the
    /// one in flight.
    pub fn transition_to(&mut self, to: impl Into<String>, options: TransitionOptions) {
        self.queue.push_back((to.into(), options));
    }

    pub fn in_progress(&self) -> bool {
        self.active.is_some()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Standalone volume-only fade, independent of track switching.
    pub fn fade_out(&self, player: &mut MusicPlayer, duration: f64, now_frame: u64) {
        player.set_volume(0.0, duration, now_frame);
    }

    /// Standalone fade to `target`, independent of track switching.
    pub fn fade_in(&self, player: &mut MusicPlayer, target: f64, duration: f64, now_frame: u64) {
        player.set_volume(target, duration, now_frame);
    }

    fn frames(&self, seconds: f64) -> u64 {
        (seconds.max(0.0) * self.sample_rate) as u64
    }

    /// Advance the in-flight transition and drain the queue.
    pub fn tick(
        &mut self,
        now_frame: u64,
        player: &mut MusicPlayer,
        library: &mut TrackLibrary,
        reporter: &dyn FaultReporter,
    ) {
        if let Some(mut transition) = self.active.take() {
            if self.advance(&mut transition, now_frame, player, library, reporter) {
                self.active = Some(transition);
            } else {
                self.settle_until = now_frame + self.frames(SETTLE_SECONDS);
            }
        }

        if self.active.is_none() && now_frame >= self.settle_until
            && let Some((to, options)) = self.queue.pop_front()
        {
            self.start(to, options, now_frame, player, library, reporter);
        }
    }

    /// Returns false once the transition completed.
    fn advance(
        &mut self,
        transition: &mut ActiveTransition,
        now_frame: u64,
        player: &mut MusicPlayer,
        library: &mut TrackLibrary,
        reporter: &dyn FaultReporter,
    ) -> bool {
        match &mut transition.phase {
            Phase::Delayed { until } => {
                if now_frame < *until {
                    return true;
                }
                let mut options = transition.options;
                options.delay = 0.0;
                self.begin(transition.to.clone(), options, now_frame, player, library, reporter)
                    .map(|phase| {
                        transition.phase = phase;
                        true
                    })
                    .unwrap_or(false)
            }
            Phase::FadingOut { until } => {
                if now_frame < *until {
                    return true;
                }
                // Outgoing is silent; bring the target up on its own fade.
                match library.get_or_generate(&transition.to) {
                    Ok(track) => {
                        player.play(
                            track,
                            PlayTrackOptions {
                                volume: transition.options.volume,
                                fade_in: transition.options.duration,
                                ..Default::default()
                            },
                            now_frame,
                        );
                        false
                    }
                    Err(err) => {
                        self.abort(reporter, "fade_out_in", &err.to_string());
                        false
                    }
                }
            }
            Phase::Crossfading { start, end, next_step, from_volume, to_volume, curve } => {
                let step_frames = (self.sample_rate / STEP_RATE) as u64;
                let span = (*end - *start).max(1) as f64;
                while *next_step <= now_frame && *next_step <= *end {
                    let p = (*next_step - *start) as f64 / span;
                    let c = curve.apply(p);
                    player.set_crossfade_gains(*from_volume * (1.0 - c), *to_volume * c, now_frame);
                    *next_step += step_frames;
                }
                if now_frame >= *end {
                    player.finish_crossfade(now_frame);
                    log::debug!("transition to '{}' complete", transition.to);
                    return false;
                }
                true
            }
        }
    }

    fn start(
        &mut self,
        to: String,
        options: TransitionOptions,
        now_frame: u64,
        player: &mut MusicPlayer,
        library: &mut TrackLibrary,
        reporter: &dyn FaultReporter,
    ) {
        if options.delay > 0.0 {
            self.active = Some(ActiveTransition {
                to,
                options,
                phase: Phase::Delayed { until: now_frame + self.frames(options.delay) },
            });
            return;
        }
        if let Some(phase) = self.begin(to.clone(), options, now_frame, player, library, reporter) {
            self.active = Some(ActiveTransition { to, options, phase });
        }
    }

    /// Kick off the transition body. `None` means it finished immediately
    /// (cut, idle player) or failed and was reported.
    fn begin(
        &mut self,
        to: String,
        options: TransitionOptions,
        now_frame: u64,
        player: &mut MusicPlayer,
        library: &mut TrackLibrary,
        reporter: &dyn FaultReporter,
    ) -> Option<Phase> {
        let track = match library.get_or_generate(&to) {
            Ok(track) => track,
            Err(err) => {
                self.abort(reporter, "begin", &err.to_string());
                return None;
            }
        };

        match options.kind {
            TransitionKind::Cut => {
                player.stop(0.0, now_frame);
                player.play(
                    track,
                    PlayTrackOptions { volume: options.volume, ..Default::default() },
                    now_frame,
                );
                None
            }
            TransitionKind::FadeOutIn => {
                if player.current_track_name().is_none() {
                    player.play(
                        track,
                        PlayTrackOptions {
                            volume: options.volume,
                            fade_in: options.duration,
                            ..Default::default()
                        },
                        now_frame,
                    );
                    return None;
                }
                player.stop(options.fade_out, now_frame);
                Some(Phase::FadingOut { until: now_frame + self.frames(options.fade_out) })
            }
            TransitionKind::Crossfade | TransitionKind::SmartCrossfade => {
                // No current track (or unknown metadata) downgrades the
                // smart variant to a plain fade-in.
                let Some(from_spec) = player.current_spec().cloned() else {
                    if options.kind == TransitionKind::SmartCrossfade {
                        reporter.report(FaultReport::new(
                            "transition",
                            "smart_crossfade",
                            "no current track metadata; downgrading to fade-in",
                        ));
                    }
                    player.play(
                        track,
                        PlayTrackOptions {
                            volume: options.volume,
                            fade_in: options.duration,
                            ..Default::default()
                        },
                        now_frame,
                    );
                    return None;
                };

                let (duration, curve) = if options.kind == TransitionKind::SmartCrossfade {
                    let score = harmony_score(&from_spec, &track.spec);
                    log::debug!(
                        "harmony '{}' → '{}': {score:.2}",
                        from_spec.name,
                        track.spec.name
                    );
                    if score > HARMONY_HIGH {
                        (options.duration * 0.6, FadeCurve::Linear)
                    } else if score < HARMONY_LOW {
                        (options.duration * 1.5, FadeCurve::Exponential)
                    } else {
                        (options.duration, FadeCurve::Smooth)
                    }
                } else {
                    (options.duration, options.curve)
                };

                let from_volume = player.current_volume();
                player.begin_crossfade(
                    track,
                    PlayTrackOptions { volume: options.volume, ..Default::default() },
                    now_frame,
                );
                let end = now_frame + self.frames(duration).max(1);
                Some(Phase::Crossfading {
                    start: now_frame,
                    end,
                    next_step: now_frame,
                    from_volume,
                    to_volume: options.volume,
                    curve,
                })
            }
        }
    }

    /// A failure never aborts the drain loop mid-flight; the queue is
    /// cleared defensively and the fault reported once.
    fn abort(&mut self, reporter: &dyn FaultReporter, operation: &'static str, detail: &str) {
        let err = EngineError::Transition(detail.to_string());
        reporter.report(FaultReport::new("transition", operation, err.to_string()));
        self.queue.clear();
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::mixer::StereoBus;
    use crate::error::NullReporter;
    use crate::player::PlayerState;
    use crate::synth::music::{MusicStyle, TrackSpec};

    const SR: f64 = 1000.0;

    fn library() -> TrackLibrary {
        let mut lib = TrackLibrary::new(SR);
        lib.define(TrackSpec::new("a", MusicStyle::Energetic, 3.0, 120.0, "C", 4).unwrap());
        lib.define(TrackSpec::new("b", MusicStyle::Exciting, 3.0, 125.0, "G", 4).unwrap());
        lib.define(TrackSpec::new("far", MusicStyle::Ambient, 3.0, 40.0, "F#", 4).unwrap());
        lib
    }

    fn run(
        manager: &mut TransitionManager,
        player: &mut MusicPlayer,
        library: &mut TrackLibrary,
        start: u64,
        quanta: usize,
    ) -> u64 {
        let mut now = start;
        let mut bus = StereoBus::new();
        for _ in 0..quanta {
            manager.tick(now, player, library, &NullReporter);
            player.tick(now);
            bus.clear(50);
            player.mix_into(&mut bus, now, 50);
            now += 50;
        }
        now
    }

    #[test]
    fn identical_tracks_score_perfect_harmony() {
        let spec = TrackSpec::new("x", MusicStyle::Energetic, 10.0, 120.0, "C", 4).unwrap();
        assert!((harmony_score(&spec, &spec) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn distant_tracks_score_below_the_low_mark() {
        let a = TrackSpec::new("a", MusicStyle::Exciting, 10.0, 140.0, "C", 4).unwrap();
        // ≥ 60 BPM apart, unrelated style, tritone key.
        let b = TrackSpec::new("b", MusicStyle::Ambient, 10.0, 60.0, "F#", 4).unwrap();
        let score = harmony_score(&a, &b);
        assert!(score < HARMONY_LOW, "expected < {HARMONY_LOW}, got {score}");
    }

    #[test]
    fn cut_switches_immediately() {
        let mut manager = TransitionManager::new(SR);
        let mut player = MusicPlayer::new(SR);
        let mut lib = library();

        let track = lib.get_or_generate("a").unwrap();
        player.play(track, PlayTrackOptions::default(), 0);

        manager.transition_to("b", TransitionOptions { kind: TransitionKind::Cut, ..Default::default() });
        manager.tick(0, &mut player, &mut lib, &NullReporter);
        assert_eq!(player.current_track_name(), Some("b"));
        assert!(!manager.in_progress());
    }

    #[test]
    fn crossfade_ends_with_target_active_and_source_gone() {
        let mut manager = TransitionManager::new(SR);
        let mut player = MusicPlayer::new(SR);
        let mut lib = library();

        let track = lib.get_or_generate("a").unwrap();
        player.play(track, PlayTrackOptions::default(), 0);

        manager.transition_to(
            "b",
            TransitionOptions {
                kind: TransitionKind::Crossfade,
                duration: 0.5,
                ..Default::default()
            },
        );
        let now = run(&mut manager, &mut player, &mut lib, 0, 2);
        assert!(manager.in_progress());
        assert!(player.has_outgoing(), "both tracks sound during the crossfade");

        let _ = run(&mut manager, &mut player, &mut lib, now, 12);
        assert!(!manager.in_progress());
        assert_eq!(player.current_track_name(), Some("b"));
        assert!(!player.has_outgoing(), "source voice must be fully disconnected");
        assert_eq!(player.state(), PlayerState::Playing);
    }

    #[test]
    fn requests_queue_fifo_while_one_is_running() {
        let mut manager = TransitionManager::new(SR);
        let mut player = MusicPlayer::new(SR);
        let mut lib = library();

        let track = lib.get_or_generate("a").unwrap();
        player.play(track, PlayTrackOptions::default(), 0);

        let slow = TransitionOptions {
            kind: TransitionKind::Crossfade,
            duration: 1.0,
            ..Default::default()
        };
        manager.transition_to("b", slow);
        manager.tick(0, &mut player, &mut lib, &NullReporter);
        manager.transition_to("far", slow);
        assert!(manager.in_progress());
        assert_eq!(manager.queue_len(), 1);

        // Long enough for both transitions plus the settling delay.
        let _ = run(&mut manager, &mut player, &mut lib, 50, 70);
        assert_eq!(player.current_track_name(), Some("far"));
        assert_eq!(manager.queue_len(), 0);
        assert!(!manager.in_progress());
    }

    #[test]
    fn smart_crossfade_without_current_track_downgrades() {
        let mut manager = TransitionManager::new(SR);
        let mut player = MusicPlayer::new(SR);
        let mut lib = library();

        manager.transition_to(
            "a",
            TransitionOptions { kind: TransitionKind::SmartCrossfade, ..Default::default() },
        );
        manager.tick(0, &mut player, &mut lib, &NullReporter);
        // Downgraded to a plain fade-in start, not an error.
        assert_eq!(player.current_track_name(), Some("a"));
        assert!(!manager.in_progress());
    }

    #[test]
    fn unknown_target_clears_the_queue() {
        let mut manager = TransitionManager::new(SR);
        let mut player = MusicPlayer::new(SR);
        let mut lib = library();

        let track = lib.get_or_generate("a").unwrap();
        player.play(track, PlayTrackOptions::default(), 0);

        manager.transition_to("missing-track", TransitionOptions::default());
        manager.transition_to("b", TransitionOptions::default());
        manager.tick(0, &mut player, &mut lib, &NullReporter);
        assert!(!manager.in_progress());
        assert_eq!(manager.queue_len(), 0, "queue is cleared defensively");
        assert_eq!(player.current_track_name(), Some("a"), "current playback is untouched");
    }

    #[test]
    fn curves_are_monotonic_and_bounded() {
        for curve in [
            FadeCurve::Linear,
            FadeCurve::Exponential,
            FadeCurve::Logarithmic,
            FadeCurve::Smooth,
        ] {
            let mut prev = 0.0;
            for i in 0..=20 {
                let v = curve.apply(i as f64 / 20.0);
                assert!((0.0..=1.0).contains(&v), "{curve:?} out of range: {v}");
                assert!(v >= prev - 1e-12, "{curve:?} must be monotonic");
                prev = v;
            }
            assert!((curve.apply(1.0) - 1.0).abs() < 1e-12);
        }
    }
}
