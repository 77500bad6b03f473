//! The engine facade — one explicitly constructed object owning the whole
//! audio core: context, generators, caches, scheduler, player, transitions.
//!
//! Construction never panics. If the host configuration is unusable the
//! engine comes up inert: every call is a safe no-op, `status().failed`
//! says why once, and nothing throws later. The host drives time by
//! calling [`AudioEngine::render`] from its output callback (or
//! [`AudioEngine::tick`] for bookkeeping between quanta).

use std::sync::Arc;

use crate::buffer::{BufferCache, SampleBuffer};
use crate::config::{AudioSettings, EngineConfig};
use crate::context::{AudioContext, Category, ContextState, EffectKind};
use crate::dsp::equalizer::{BAND_COUNT, EqPreset, ResponsePoint};
use crate::dsp::mixer::StereoBus;
use crate::error::{EngineError, FaultReport, FaultReporter, LogReporter};
use crate::player::{MusicPlayer, PlayTrackOptions, PlayerState, TickEvent};
use crate::renderer::buffer_to_wav;
use crate::scheduler::{PlayOptions, VoiceScheduler};
use crate::synth::music::{TrackLibrary, TrackSpec};
use crate::synth::sfx::{FALLBACK_RECIPE, RECIPE_NAMES, SfxGenerator};
use crate::transition::{TransitionManager, TransitionOptions};
use crate::voice::VoiceHandle;

/// Bubble pop size, mapped to the pop recipe family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BubbleSize {
    Small,
    Medium,
    Large,
}

/// UI interaction sounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiSound {
    Click,
    Hover,
}

/// Achievement-category sounds (1.1× base volume).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AchievementSound {
    Unlock,
    LevelUp,
}

/// Game-state sounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStateSound {
    Countdown,
    Bonus,
    PowerUp,
    ShieldBreak,
    GameOver,
}

/// Synchronous status snapshot for the presentation layers.
#[derive(Debug, Clone)]
pub struct EngineStatus {
    /// True when initialization failed and the engine is inert.
    pub failed: bool,
    pub state: ContextState,
    pub live_voices: usize,
    pub peak_concurrency: usize,
    pub player_state: PlayerState,
    pub current_track: Option<String>,
    pub track_position: f64,
    pub transition_in_progress: bool,
    pub transition_queue: usize,
    pub compressor_enabled: bool,
    pub reverb_enabled: bool,
    pub equalizer_enabled: bool,
    pub master_volume: f64,
    pub sfx_volume: f64,
    pub music_volume: f64,
    pub muted: bool,
}

/// The audio core. One per session.
pub struct AudioEngine {
    /// `None` after a failed initialization — the inert state.
    context: Option<AudioContext>,
    cache: BufferCache,
    sfx: SfxGenerator,
    tracks: TrackLibrary,
    scheduler: VoiceScheduler,
    player: MusicPlayer,
    transitions: TransitionManager,
    reporter: Box<dyn FaultReporter>,
    sfx_bus: StereoBus,
    music_bus: StereoBus,
}

impl AudioEngine {
    /// Build the engine with the default log-backed fault reporter.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_reporter(config, Box::new(LogReporter))
    }

    /// Build the engine with an injected fault reporter.
    pub fn with_reporter(config: EngineConfig, reporter: Box<dyn FaultReporter>) -> Self {
        let context = match AudioContext::initialize(
            config.sample_rate,
            config.output_channels,
            config.start_suspended,
        ) {
            Ok(ctx) => Some(ctx),
            Err(err) => {
                // Reported once; every later call is a safe no-op.
                reporter.report(FaultReport::new("engine", "initialize", err.to_string()));
                None
            }
        };

        AudioEngine {
            context,
            cache: BufferCache::new(),
            sfx: SfxGenerator::new(config.sample_rate),
            tracks: TrackLibrary::new(config.sample_rate),
            scheduler: VoiceScheduler::new(config.sample_rate, config.max_voices),
            player: MusicPlayer::new(config.sample_rate),
            transitions: TransitionManager::new(config.sample_rate),
            reporter,
            sfx_bus: StereoBus::new(),
            music_bus: StereoBus::new(),
        }
    }

    fn usable(&self) -> bool {
        self.context
            .as_ref()
            .map(|c| c.state() != ContextState::Closed)
            .unwrap_or(false)
    }

    fn now_frame(&self) -> u64 {
        self.context.as_ref().map(|c| c.frames()).unwrap_or(0)
    }

    // ── Lifecycle ───────────────────────────────────────────

    pub fn resume(&mut self) {
        if let Some(ctx) = self.context.as_mut() {
            ctx.resume();
        }
    }

    pub fn suspend(&mut self) {
        if let Some(ctx) = self.context.as_mut() {
            ctx.suspend();
        }
    }

    /// Tear everything down. Idempotent.
    pub fn dispose(&mut self) {
        self.scheduler.stop_all();
        let now = self.now_frame();
        self.player.stop(0.0, now);
        if let Some(ctx) = self.context.as_mut() {
            ctx.dispose();
        }
    }

    // ── Playback API (one-shot effects) ─────────────────────

    /// Play a named effect. `None` means "sound skipped" (inert engine,
    /// missing buffer) and is never fatal for the caller.
    pub fn play(&mut self, name: &str, options: PlayOptions) -> Option<VoiceHandle> {
        if !self.usable() {
            return None;
        }
        let now = self.now_frame();
        match self.buffer_for(name) {
            Some(buffer) => self.scheduler.play_buffer(buffer, options, now),
            None => {
                let err = EngineError::Playback(format!("no buffer for '{name}'"));
                self.reporter
                    .report(FaultReport::new("scheduler", "play", err.to_string()));
                None
            }
        }
    }

    /// Stop one voice; stale handles are a harmless no-op.
    pub fn stop(&mut self, handle: VoiceHandle) {
        self.scheduler.stop(handle);
    }

    /// Force-stop every live one-shot voice.
    pub fn stop_all(&mut self) {
        self.scheduler.stop_all();
    }

    /// Generate every effect recipe up front so first plays never stall.
    pub fn preload_effects(&mut self) {
        if !self.usable() {
            return;
        }
        for name in RECIPE_NAMES {
            if !self.cache.contains(name) {
                self.buffer_for(name);
            }
        }
    }

    /// Derive and cache a variation of a cached effect under a new name.
    pub fn vary_effect(
        &mut self,
        base: &str,
        name: &str,
        stretch: f64,
        amp_scale: f64,
        extra_noise: f64,
    ) -> bool {
        let Some(buffer) = self.buffer_for(base) else {
            return false;
        };
        let varied = self
            .sfx
            .generate_variation(&buffer, name, stretch, amp_scale, extra_noise);
        self.cache.insert(varied);
        true
    }

    /// Cache lookup with generate-on-miss. A failed recipe falls back to
    /// the default pop and is reported, never surfaced to the caller.
    fn buffer_for(&mut self, name: &str) -> Option<Arc<SampleBuffer>> {
        if let Some(buffer) = self.cache.get(name) {
            return Some(buffer);
        }
        match self.sfx.generate(name) {
            Ok(buffer) => Some(self.cache.insert(buffer)),
            Err(err) => {
                self.reporter
                    .report(FaultReport::new("sfx", "generate", err.to_string()));
                if name == FALLBACK_RECIPE {
                    return None;
                }
                self.buffer_for(FALLBACK_RECIPE)
            }
        }
    }

    // ── Semantic convenience wrappers ───────────────────────

    /// Bubble pops get a small random pitch spread so rapid chains do not
    /// sound machine-gunned.
    pub fn play_bubble(&mut self, size: BubbleSize) -> Option<VoiceHandle> {
        let name = match size {
            BubbleSize::Small => "pop-small",
            BubbleSize::Medium => "pop",
            BubbleSize::Large => "pop-big",
        };
        let pitch = 0.95 + fastrand::f64() * 0.1;
        self.play(name, PlayOptions { pitch, ..Default::default() })
    }

    pub fn play_ui(&mut self, sound: UiSound) -> Option<VoiceHandle> {
        let name = match sound {
            UiSound::Click => "ui-click",
            UiSound::Hover => "ui-hover",
        };
        self.play(name, PlayOptions { volume: 0.8, ..Default::default() })
    }

    /// Combo pitch rises with the streak: `1 + level · 0.1`.
    pub fn play_combo(&mut self, level: u32) -> Option<VoiceHandle> {
        let pitch = 1.0 + level as f64 * 0.1;
        self.play(
            "combo",
            PlayOptions { volume: 1.2, pitch, ..Default::default() },
        )
    }

    pub fn play_achievement(&mut self, sound: AchievementSound) -> Option<VoiceHandle> {
        let name = match sound {
            AchievementSound::Unlock => "achievement",
            AchievementSound::LevelUp => "level-up",
        };
        self.play(name, PlayOptions { volume: 1.1, ..Default::default() })
    }

    pub fn play_game_state(&mut self, sound: GameStateSound) -> Option<VoiceHandle> {
        let name = match sound {
            GameStateSound::Countdown => "countdown",
            GameStateSound::Bonus => "bonus",
            GameStateSound::PowerUp => "power-up",
            GameStateSound::ShieldBreak => "shield-break",
            GameStateSound::GameOver => "game-over",
        };
        self.play(name, PlayOptions::default())
    }

    // ── Music API ───────────────────────────────────────────

    /// Register a custom track descriptor for later generation.
    pub fn define_track(&mut self, spec: TrackSpec) {
        self.tracks.define(spec);
    }

    /// Start a track by name, replacing whatever is playing. Unknown names
    /// are reported and skipped.
    pub fn play_track(&mut self, name: &str, options: PlayTrackOptions) {
        if !self.usable() {
            return;
        }
        let now = self.now_frame();
        match self.tracks.get_or_generate(name) {
            Ok(track) => self.player.play(track, options, now),
            Err(err) => self
                .reporter
                .report(FaultReport::new("music", "play_track", err.to_string())),
        }
    }

    pub fn stop_track(&mut self, fade_out: f64) {
        let now = self.now_frame();
        self.player.stop(fade_out, now);
    }

    pub fn pause_music(&mut self) {
        let now = self.now_frame();
        self.player.pause(now);
    }

    pub fn resume_music(&mut self) {
        let now = self.now_frame();
        self.player.resume(now);
    }

    /// Ramped music volume change (volume only, no track switch).
    pub fn set_music_volume(&mut self, level: f64, fade_seconds: f64) {
        let now = self.now_frame();
        self.player.set_volume(level, fade_seconds, now);
    }

    /// Queue one successor to start when the current track ends naturally.
    pub fn queue_next(&mut self, name: &str, options: PlayTrackOptions) {
        self.player.queue_next(name, options);
    }

    /// Volume-only fade to silence; the track keeps playing underneath.
    pub fn fade_out_music(&mut self, duration: f64) {
        let now = self.now_frame();
        self.transitions.fade_out(&mut self.player, duration, now);
    }

    /// Volume-only fade back up to `target`.
    pub fn fade_in_music(&mut self, target: f64, duration: f64) {
        let now = self.now_frame();
        self.transitions.fade_in(&mut self.player, target, duration, now);
    }

    /// Request a transition; queued FIFO behind any in flight.
    pub fn transition_to(&mut self, name: &str, options: TransitionOptions) {
        if !self.usable() {
            return;
        }
        self.transitions.transition_to(name, options);
    }

    // ── Mixer API ───────────────────────────────────────────

    pub fn set_category_volume(&mut self, category: Category, level: f64) {
        if let Some(ctx) = self.context.as_mut() {
            ctx.set_category_volume(category, level);
        }
    }

    pub fn set_master_volume(&mut self, level: f64) {
        if let Some(ctx) = self.context.as_mut() {
            ctx.set_master_volume(level);
        }
    }

    pub fn set_muted(&mut self, muted: bool) {
        if let Some(ctx) = self.context.as_mut() {
            ctx.set_muted(muted);
        }
    }

    pub fn set_effect_enabled(&mut self, effect: EffectKind, enabled: bool) {
        if let Some(ctx) = self.context.as_mut() {
            ctx.set_effect_enabled(effect, enabled);
        }
    }

    pub fn set_eq_band_gain(&mut self, band: usize, gain_db: f64) {
        if let Some(ctx) = self.context.as_mut() {
            ctx.equalizer_mut().set_band_gain(band, gain_db);
        }
    }

    pub fn set_eq_gains(&mut self, gains: [f64; BAND_COUNT]) {
        if let Some(ctx) = self.context.as_mut() {
            ctx.equalizer_mut().set_all_gains(gains);
        }
    }

    pub fn apply_eq_preset(&mut self, preset: EqPreset) {
        if let Some(ctx) = self.context.as_mut() {
            ctx.equalizer_mut().apply_preset(preset);
        }
    }

    pub fn eq_band_gains(&self) -> [f64; BAND_COUNT] {
        self.context
            .as_ref()
            .map(|c| c.equalizer().band_gains())
            .unwrap_or([0.0; BAND_COUNT])
    }

    pub fn eq_frequency_response(&self, points: usize) -> Vec<ResponsePoint> {
        self.context
            .as_ref()
            .map(|c| c.equalizer().frequency_response(points))
            .unwrap_or_default()
    }

    // ── Configuration push contract ─────────────────────────

    /// Apply a full settings snapshot from the configuration layer.
    pub fn apply_settings(&mut self, settings: &AudioSettings) {
        let Some(ctx) = self.context.as_mut() else {
            return;
        };
        ctx.set_master_volume(settings.master_volume);
        ctx.set_category_volume(Category::Sfx, settings.sfx_volume);
        ctx.set_category_volume(Category::Music, settings.music_volume);
        ctx.set_muted(settings.muted);
        ctx.set_effect_enabled(EffectKind::Compressor, settings.compressor_enabled);
        ctx.set_effect_enabled(EffectKind::Reverb, settings.reverb_enabled);
        ctx.set_effect_enabled(EffectKind::Equalizer, settings.equalizer_enabled);
        if let Some(preset) = settings.eq_preset {
            ctx.equalizer_mut().apply_preset(preset);
        }
        if let Some(gains) = settings.eq_gains {
            ctx.equalizer_mut().set_all_gains(gains);
        }
    }

    /// Incremental push: one volume changed.
    pub fn on_volume_changed(&mut self, category: Category, level: f64) {
        self.set_category_volume(category, level);
    }

    /// Incremental push: one effect toggled.
    pub fn on_effect_toggled(&mut self, effect: EffectKind, enabled: bool) {
        self.set_effect_enabled(effect, enabled);
    }

    // ── Status / Query API ──────────────────────────────────

    pub fn status(&self) -> EngineStatus {
        match self.context.as_ref() {
            Some(ctx) => EngineStatus {
                failed: false,
                state: ctx.state(),
                live_voices: self.scheduler.live_count(),
                peak_concurrency: self.scheduler.peak_concurrency(),
                player_state: self.player.state(),
                current_track: self.player.current_track_name().map(String::from),
                track_position: self.player.position_seconds(),
                transition_in_progress: self.transitions.in_progress(),
                transition_queue: self.transitions.queue_len(),
                compressor_enabled: ctx.is_effect_enabled(EffectKind::Compressor),
                reverb_enabled: ctx.is_effect_enabled(EffectKind::Reverb),
                equalizer_enabled: ctx.is_effect_enabled(EffectKind::Equalizer),
                master_volume: ctx.master_volume(),
                sfx_volume: ctx.category_volume(Category::Sfx),
                music_volume: ctx.category_volume(Category::Music),
                muted: ctx.is_muted(),
            },
            None => EngineStatus {
                failed: true,
                state: ContextState::Uninitialized,
                live_voices: 0,
                peak_concurrency: 0,
                player_state: PlayerState::Idle,
                current_track: None,
                track_position: 0.0,
                transition_in_progress: false,
                transition_queue: 0,
                compressor_enabled: false,
                reverb_enabled: false,
                equalizer_enabled: false,
                master_volume: 0.0,
                sfx_volume: 0.0,
                music_volume: 0.0,
                muted: false,
            },
        }
    }

    /// Export a cached effect or track buffer as WAV bytes (debug surface).
    pub fn export_wav(&mut self, name: &str) -> Option<Vec<u8>> {
        if let Some(buffer) = self.cache.get(name) {
            return Some(buffer_to_wav(&buffer));
        }
        self.tracks
            .get_or_generate(name)
            .ok()
            .map(|track| buffer_to_wav(&track.buffer))
    }

    // ── Rendering ───────────────────────────────────────────

    /// Reconcile the timed state machines against the clock without
    /// rendering audio. `render` does this implicitly.
    pub fn tick(&mut self) {
        let Some(now) = self
            .context
            .as_ref()
            .filter(|c| c.is_active())
            .map(|c| c.frames())
        else {
            return;
        };
        self.reconcile(now);
        self.scheduler.reap();
    }

    fn reconcile(&mut self, now: u64) {
        self.transitions.tick(
            now,
            &mut self.player,
            &mut self.tracks,
            self.reporter.as_ref(),
        );
        if let Some(TickEvent::StartQueued(name, options)) = self.player.tick(now) {
            match self.tracks.get_or_generate(&name) {
                Ok(track) => self.player.play(track, options, now),
                Err(err) => self
                    .reporter
                    .report(FaultReport::new("music", "queue_next", err.to_string())),
            }
        }
    }

    /// Render one quantum of interleaved stereo. While the context is
    /// suspended, closed, or failed, the output is silence and the clock
    /// does not advance.
    pub fn render(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        let frames = out.len() / 2;
        if frames == 0 {
            return;
        }
        let Some(now) = self
            .context
            .as_ref()
            .filter(|c| c.is_active())
            .map(|c| c.frames())
        else {
            return;
        };

        self.reconcile(now);

        self.sfx_bus.clear(frames);
        self.music_bus.clear(frames);
        self.scheduler
            .mix_into(&mut self.sfx_bus, &mut self.music_bus, now, frames);
        self.player.mix_into(&mut self.music_bus, now, frames);

        let Some(ctx) = self.context.as_mut() else {
            return;
        };
        for i in 0..frames {
            let sfx = self.sfx_bus.frame(i, 1.0);
            let music = self.music_bus.frame(i, 1.0);
            let (l, r) = ctx.process_master(sfx, music);
            out[i * 2] = l;
            out[i * 2 + 1] = r;
        }
        ctx.advance(frames as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NullReporter;
    use crate::synth::music::MusicStyle;

    fn engine() -> AudioEngine {
        AudioEngine::with_reporter(
            EngineConfig { sample_rate: 8000.0, ..Default::default() },
            Box::new(NullReporter),
        )
    }

    fn render_for(engine: &mut AudioEngine, quanta: usize) -> f32 {
        let mut out = vec![0.0f32; 512];
        let mut peak = 0.0f32;
        for _ in 0..quanta {
            engine.render(&mut out);
            peak = out.iter().fold(peak, |m, s| m.max(s.abs()));
        }
        peak
    }

    #[test]
    fn failed_initialization_goes_inert_not_fatal() {
        let mut engine = AudioEngine::with_reporter(
            EngineConfig { sample_rate: 100.0, ..Default::default() },
            Box::new(NullReporter),
        );
        assert!(engine.status().failed);
        assert!(engine.play("pop", PlayOptions::default()).is_none());
        engine.play_track("menu", PlayTrackOptions::default());
        engine.set_category_volume(Category::Sfx, 0.5);
        engine.resume();
        engine.dispose();
        let mut out = vec![0.0f32; 128];
        engine.render(&mut out);
        assert!(out.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn playing_an_effect_produces_audio() {
        let mut engine = engine();
        let handle = engine.play("pop", PlayOptions::default());
        assert!(handle.is_some());
        assert_eq!(engine.status().live_voices, 1);
        let peak = render_for(&mut engine, 2);
        assert!(peak > 0.0, "rendered output should contain the pop");
    }

    #[test]
    fn unknown_effect_falls_back_instead_of_failing() {
        let mut engine = engine();
        let handle = engine.play("definitely-not-a-sound", PlayOptions::default());
        assert!(handle.is_some(), "fallback recipe should play");
        assert_eq!(engine.status().live_voices, 1);
    }

    #[test]
    fn category_volume_snapshot_reflects_clamped_set() {
        let mut engine = engine();
        engine.set_category_volume(Category::Music, 7.0);
        engine.set_category_volume(Category::Sfx, 0.3);
        let status = engine.status();
        assert_eq!(status.music_volume, 1.0);
        assert_eq!(status.sfx_volume, 0.3);
    }

    #[test]
    fn convenience_wrappers_return_handles() {
        let mut engine = engine();
        assert!(engine.play_bubble(BubbleSize::Medium).is_some());
        assert!(engine.play_ui(UiSound::Click).is_some());
        assert!(engine.play_combo(5).is_some());
        assert!(engine.play_achievement(AchievementSound::Unlock).is_some());
        assert!(engine.play_game_state(GameStateSound::Bonus).is_some());
        assert_eq!(engine.status().live_voices, 5);
    }

    #[test]
    fn suspended_engine_renders_silence_and_holds_the_clock() {
        let mut engine = AudioEngine::with_reporter(
            EngineConfig { sample_rate: 8000.0, start_suspended: true, ..Default::default() },
            Box::new(NullReporter),
        );
        engine.play("pop", PlayOptions::default());
        let peak = render_for(&mut engine, 2);
        assert_eq!(peak, 0.0);

        engine.resume();
        let peak = render_for(&mut engine, 2);
        assert!(peak > 0.0, "audio should flow after resume()");
    }

    #[test]
    fn music_track_plays_and_transitions_smartly() {
        let mut engine = engine();
        engine.define_track(
            TrackSpec::new("fieldwork", MusicStyle::Energetic, 2.0, 120.0, "C", 4).unwrap(),
        );
        engine.define_track(
            TrackSpec::new("rush", MusicStyle::Exciting, 2.0, 125.0, "G", 4).unwrap(),
        );

        engine.play_track("fieldwork", PlayTrackOptions::default());
        assert_eq!(engine.status().current_track.as_deref(), Some("fieldwork"));

        engine.transition_to(
            "rush",
            TransitionOptions {
                kind: crate::transition::TransitionKind::SmartCrossfade,
                duration: 0.3,
                ..Default::default()
            },
        );
        // 40 quanta × 256 frames at 8 kHz ≈ 1.3 s — enough for the window.
        render_for(&mut engine, 40);
        let status = engine.status();
        assert_eq!(status.current_track.as_deref(), Some("rush"));
        assert!(!status.transition_in_progress);
        assert!(!engine.player.has_outgoing(), "source voice must be disconnected");
    }

    #[test]
    fn queued_track_starts_after_natural_end() {
        let mut engine = engine();
        engine.define_track(
            TrackSpec::new("intro", MusicStyle::Ambient, 0.5, 60.0, "C", 4).unwrap(),
        );
        engine.define_track(
            TrackSpec::new("main", MusicStyle::Ambient, 2.0, 60.0, "C", 4).unwrap(),
        );
        engine.play_track("intro", PlayTrackOptions { looping: false, ..Default::default() });
        engine.queue_next("main", PlayTrackOptions::default());
        render_for(&mut engine, 30);
        assert_eq!(engine.status().current_track.as_deref(), Some("main"));
    }

    #[test]
    fn standalone_fades_change_volume_without_switching_tracks() {
        let mut engine = engine();
        engine.define_track(
            TrackSpec::new("bed", MusicStyle::Ambient, 2.0, 60.0, "C", 4).unwrap(),
        );
        engine.play_track("bed", PlayTrackOptions::default());
        engine.fade_out_music(0.1);
        render_for(&mut engine, 10);
        let status = engine.status();
        assert_eq!(status.current_track.as_deref(), Some("bed"));
        assert_eq!(status.player_state, PlayerState::Playing);

        engine.fade_in_music(0.9, 0.1);
        render_for(&mut engine, 5);
        assert!((engine.player.current_volume() - 0.9).abs() < 1e-9);
    }

    #[test]
    fn dispose_is_idempotent_and_silences_everything() {
        let mut engine = engine();
        engine.play("pop", PlayOptions::default());
        engine.dispose();
        assert_eq!(engine.status().live_voices, 0);
        assert_eq!(engine.status().state, ContextState::Closed);
        engine.dispose();
        assert!(engine.play("pop", PlayOptions::default()).is_none());
    }

    #[test]
    fn settings_snapshot_applies_everything_at_once() {
        let mut engine = engine();
        let settings = AudioSettings {
            master_volume: 0.7,
            sfx_volume: 0.6,
            music_volume: 0.5,
            compressor_enabled: true,
            equalizer_enabled: true,
            eq_preset: Some(EqPreset::Music),
            ..Default::default()
        };
        engine.apply_settings(&settings);
        let status = engine.status();
        assert_eq!(status.master_volume, 0.7);
        assert!(status.compressor_enabled);
        assert!(status.equalizer_enabled);
        assert_eq!(engine.eq_band_gains(), EqPreset::Music.gains());
    }

    #[test]
    fn export_wav_covers_effects_and_tracks() {
        let mut engine = engine();
        engine.play("pop", PlayOptions::default()); // populates the cache
        let wav = engine.export_wav("pop").unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert!(engine.export_wav("nothing-cached-or-known").is_none());
    }
}
