//! Engine fault taxonomy and the reporting collaborator contract.
//!
//! Recoverable failures never cross the public playback API; they are
//! funneled through a [`FaultReporter`] owned by the engine. Only
//! initialization can hand an error back to the caller.

use std::fmt;

use thiserror::Error;

/// All failure classes the engine distinguishes.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// No usable audio configuration — fatal to the engine instance.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// The mixing topology could not be built — fatal to the engine instance.
    #[error("signal graph construction failed: {0}")]
    GraphConstruction(String),

    /// A synthesis recipe failed. Recovered locally with a fallback.
    #[error("generation failed for '{name}': {reason}")]
    Generation { name: String, reason: String },

    /// A play request could not be honored (missing buffer, closed engine).
    #[error("playback failed: {0}")]
    Playback(String),

    /// A transition could not run as requested.
    #[error("transition failed: {0}")]
    Transition(String),
}

/// A single reported fault: which component, doing what, with what context.
#[derive(Debug, Clone)]
pub struct FaultReport {
    pub component: &'static str,
    pub operation: &'static str,
    pub detail: String,
}

impl FaultReport {
    pub fn new(component: &'static str, operation: &'static str, detail: impl Into<String>) -> Self {
        FaultReport {
            component,
            operation,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for FaultReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}: {}", self.component, self.operation, self.detail)
    }
}

/// Sink for recovered faults. The surrounding telemetry layer implements
/// this; the engine only pushes.
pub trait FaultReporter {
    fn report(&self, report: FaultReport);
}

/// Default reporter: forwards every fault to the `log` facade.
#[derive(Debug, Default)]
pub struct LogReporter;

impl FaultReporter for LogReporter {
    fn report(&self, report: FaultReport) {
        log::warn!("{report}");
    }
}

/// Reporter that drops everything. Used by tests that assert on behavior,
/// not on telemetry.
#[derive(Debug, Default)]
pub struct NullReporter;

impl FaultReporter for NullReporter {
    fn report(&self, _report: FaultReport) {}
}
