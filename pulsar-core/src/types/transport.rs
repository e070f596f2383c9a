//! Per-engine transport state: running flag, tempo and subdivision.

use crate::error::{PulsarError, Result};
use std::time::Duration;

pub const DEFAULT_BPM: f32 = 120.0;
pub const MAX_BPM: f32 = 999.0;
pub const MAX_SUBDIVISION: u32 = 32;

/// Milliseconds between ticks: `(60000 / bpm) / subdivision`.
///
/// Rejects non-finite or non-positive tempos and a zero subdivision instead
/// of handing a zero period to a timer.
pub fn tick_period(bpm: f32, subdivision: u32) -> Result<Duration> {
    validate_bpm(bpm)?;
    validate_subdivision(subdivision)?;
    let period_ms = (60_000.0 / bpm as f64) / subdivision as f64;
    Ok(Duration::from_secs_f64(period_ms / 1000.0))
}

fn validate_bpm(bpm: f32) -> Result<()> {
    if !bpm.is_finite() || bpm <= 0.0 {
        return Err(PulsarError::invalid(
            "tempo",
            format!("{} BPM is not a positive tempo", bpm),
        ));
    }
    if bpm > MAX_BPM {
        return Err(PulsarError::invalid(
            "tempo",
            format!("{} BPM exceeds {} BPM", bpm, MAX_BPM),
        ));
    }
    Ok(())
}

fn validate_subdivision(subdivision: u32) -> Result<()> {
    if subdivision == 0 || subdivision > MAX_SUBDIVISION {
        return Err(PulsarError::invalid(
            "subdivision",
            format!("{} is outside 1-{}", subdivision, MAX_SUBDIVISION),
        ));
    }
    Ok(())
}

/// Running flag plus tempo. Each engine owns exactly one.
#[derive(Debug, Clone, PartialEq)]
pub struct Transport {
    running: bool,
    bpm: f32,
    /// Ticks per beat (4 = sixteenth notes)
    subdivision: u32,
}

impl Transport {
    pub fn new(bpm: f32, subdivision: u32) -> Result<Self> {
        validate_bpm(bpm)?;
        validate_subdivision(subdivision)?;
        Ok(Self {
            running: false,
            bpm,
            subdivision,
        })
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Returns false if it was already running
    pub fn start(&mut self) -> bool {
        !std::mem::replace(&mut self.running, true)
    }

    /// Returns false if it was already stopped
    pub fn stop(&mut self) -> bool {
        std::mem::replace(&mut self.running, false)
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    pub fn set_bpm(&mut self, bpm: f32) -> Result<()> {
        validate_bpm(bpm)?;
        self.bpm = bpm;
        Ok(())
    }

    pub fn subdivision(&self) -> u32 {
        self.subdivision
    }

    pub fn set_subdivision(&mut self, subdivision: u32) -> Result<()> {
        validate_subdivision(subdivision)?;
        self.subdivision = subdivision;
        Ok(())
    }

    /// Time between ticks
    pub fn period(&self) -> Duration {
        // Both fields were validated on the way in
        Duration::from_secs_f64(self.step_secs())
    }

    /// Seconds per tick
    pub fn step_secs(&self) -> f64 {
        60.0 / self.bpm as f64 / self.subdivision as f64
    }

    /// Seconds per beat
    pub fn beat_secs(&self) -> f64 {
        60.0 / self.bpm as f64
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            running: false,
            bpm: DEFAULT_BPM,
            subdivision: 4,
        }
    }
}
