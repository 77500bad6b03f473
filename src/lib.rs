//! popwave_core — the audio engine of the PopWave arcade game.
//!
//! Everything the player hears is synthesized procedurally: one-shot
//! effects come from parametric recipes, music tracks from music-theory
//! primitives. Voices are mixed through category buses into a switchable
//! master chain (compressor, reverb, 5-band equalizer), and a transition
//! manager crossfades between tracks with harmony-aware timing.
//!
//! The host owns the audio device; it constructs an [`AudioEngine`] and
//! pulls interleaved stereo from [`AudioEngine::render`] inside its output
//! callback. All timed behavior (fades, loop seams, transition steps) is
//! reconciled against the engine's frame clock — no background threads,
//! no host event system.

pub mod buffer;
pub mod config;
pub mod context;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod player;
pub mod renderer;
pub mod scheduler;
pub mod synth;
pub mod theory;
pub mod transition;
pub mod voice;

pub use buffer::SampleBuffer;
pub use config::{AudioSettings, EngineConfig};
pub use context::{Category, ContextState, EffectKind};
pub use dsp::equalizer::EqPreset;
pub use engine::{
    AchievementSound, AudioEngine, BubbleSize, EngineStatus, GameStateSound, UiSound,
};
pub use error::{EngineError, FaultReport, FaultReporter, LogReporter};
pub use player::{PlayTrackOptions, PlayerState};
pub use scheduler::PlayOptions;
pub use synth::music::{MusicStyle, TrackSpec};
pub use transition::{FadeCurve, TransitionKind, TransitionOptions};
pub use voice::VoiceHandle;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
