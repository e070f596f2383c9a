//! Engine configuration
//!
//! Plain data with defaults. Engines accept these on construction and
//! through `apply_config`; values that can be clamped are clamped, values
//! that cannot (tempo, ring count) are rejected with
//! [`PulsarError::InvalidParameter`].

use crate::error::{PulsarError, Result};
use crate::pattern::Scale;
use crate::types::transport::DEFAULT_BPM;
use crate::types::TriggerEvent;

/// Longest Euclidean pattern
pub const MAX_STEPS: usize = 64;
/// Ring r has 2^r steps, so ring 7 has 128
pub const MAX_RINGS: usize = 8;
pub const MAX_OCTAVE_RANGE: u8 = 4;
/// Shortest gate, as a fraction of a step
pub const MIN_GATE: f32 = 0.01;

/// Euclidean gate configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EuclideanConfig {
    pub pulses: usize,
    pub steps: usize,
    pub offset: usize,
    pub bpm: f32,
    pub subdivision: u32,
    /// Event forwarded on onsets until something else is fed in
    pub note: TriggerEvent,
}

impl Default for EuclideanConfig {
    fn default() -> Self {
        Self {
            pulses: 4,
            steps: 16,
            offset: 0,
            bpm: DEFAULT_BPM,
            subdivision: 4,
            note: TriggerEvent::default(),
        }
    }
}

/// How the ring sequencer walks its rings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Traversal {
    /// One ring per tick: all steps of ring 0, then ring 1, ... then back
    #[default]
    Spiral,
    /// Every ring advances one step on every tick
    Lockstep,
}

impl Traversal {
    pub fn from_name(s: &str) -> Option<Traversal> {
        match s.to_lowercase().as_str() {
            "spiral" | "round_robin" | "roundrobin" => Some(Traversal::Spiral),
            "lockstep" | "parallel" => Some(Traversal::Lockstep),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Traversal::Spiral => "spiral",
            Traversal::Lockstep => "lockstep",
        }
    }
}

/// Ring sequencer configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RingConfig {
    pub ring_count: usize,
    pub root_note: u8,
    pub scale: Scale,
    pub traversal: Traversal,
    pub bpm: f32,
    pub subdivision: u32,
    pub velocity: u8,
    /// Fraction of a step each note sounds for
    pub gate_length: f32,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            ring_count: 4,
            root_note: 48,
            scale: Scale::Major,
            traversal: Traversal::Spiral,
            bpm: DEFAULT_BPM,
            subdivision: 4,
            velocity: 100,
            gate_length: 0.5,
        }
    }
}

/// Note selection policy of the arpeggiator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PatternMode {
    #[default]
    Up,
    Down,
    UpDown,
    Random,
    Drunk,
}

impl PatternMode {
    pub const ALL: [PatternMode; 5] = [
        PatternMode::Up,
        PatternMode::Down,
        PatternMode::UpDown,
        PatternMode::Random,
        PatternMode::Drunk,
    ];

    /// Parse a mode from its name (case-insensitive)
    pub fn from_name(s: &str) -> Option<PatternMode> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "up" => Some(PatternMode::Up),
            "down" => Some(PatternMode::Down),
            "updown" => Some(PatternMode::UpDown),
            "random" | "rand" => Some(PatternMode::Random),
            "drunk" | "walk" => Some(PatternMode::Drunk),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PatternMode::Up => "up",
            PatternMode::Down => "down",
            PatternMode::UpDown => "updown",
            PatternMode::Random => "random",
            PatternMode::Drunk => "drunk",
        }
    }
}

/// Arpeggiator configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ArpeggiatorConfig {
    /// Chance each tick actually plays (0.0-1.0)
    pub probability: f32,
    /// Pitch, duration and timing deviation amount (0.0-1.0)
    pub chaos: f32,
    /// Octaves swept by the octave fold (1 = no sweep)
    pub octave_range: u8,
    /// Fraction of a step each note sounds for (0.0-1.0]
    pub gate_length: f32,
    pub pattern_mode: PatternMode,
    pub velocity: u8,
    pub bpm: f32,
    pub subdivision: u32,
}

impl Default for ArpeggiatorConfig {
    fn default() -> Self {
        Self {
            probability: 1.0,
            chaos: 0.0,
            octave_range: 1,
            gate_length: 0.8,
            pattern_mode: PatternMode::Up,
            velocity: 100,
            bpm: DEFAULT_BPM,
            subdivision: 4,
        }
    }
}

/// Clamp a probability-like value into [0, 1]. NaN is rejected.
pub(crate) fn unit_interval(name: &'static str, value: f32) -> Result<f32> {
    if value.is_nan() {
        return Err(PulsarError::invalid(name, "NaN is not a valid amount"));
    }
    Ok(value.clamp(0.0, 1.0))
}

/// Clamp a gate length into [MIN_GATE, 1]. NaN is rejected.
pub(crate) fn gate_length(value: f32) -> Result<f32> {
    if value.is_nan() {
        return Err(PulsarError::invalid("gate_length", "NaN is not a valid gate"));
    }
    Ok(value.clamp(MIN_GATE, 1.0))
}

/// Accepts 1 to `MAX_RINGS` rings
pub fn ring_count(count: usize) -> Result<usize> {
    if count == 0 || count > MAX_RINGS {
        return Err(PulsarError::invalid(
            "ring_count",
            format!("{} is outside 1-{}", count, MAX_RINGS),
        ));
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_mode_names_round_trip() {
        for mode in PatternMode::ALL {
            assert_eq!(PatternMode::from_name(mode.name()), Some(mode));
        }
        assert_eq!(PatternMode::from_name("Up-Down"), Some(PatternMode::UpDown));
        assert_eq!(PatternMode::from_name("sideways"), None);
    }

    #[test]
    fn test_traversal_names() {
        assert_eq!(Traversal::from_name("Spiral"), Some(Traversal::Spiral));
        assert_eq!(Traversal::from_name("parallel"), Some(Traversal::Lockstep));
        assert_eq!(Traversal::from_name("zigzag"), None);
    }

    #[test]
    fn test_unit_interval() {
        assert_eq!(unit_interval("p", 1.5).unwrap(), 1.0);
        assert_eq!(unit_interval("p", -0.5).unwrap(), 0.0);
        assert_eq!(unit_interval("p", 0.25).unwrap(), 0.25);
        assert!(unit_interval("p", f32::NAN).is_err());
    }

    #[test]
    fn test_gate_length() {
        assert_eq!(gate_length(0.0).unwrap(), MIN_GATE);
        assert_eq!(gate_length(2.0).unwrap(), 1.0);
        assert!(gate_length(f32::NAN).is_err());
    }

    #[test]
    fn test_ring_count_bounds() {
        assert!(ring_count(0).is_err());
        assert!(ring_count(MAX_RINGS + 1).is_err());
        assert_eq!(ring_count(MAX_RINGS).unwrap(), MAX_RINGS);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_partial_config_uses_defaults() {
        let cfg: ArpeggiatorConfig =
            serde_json::from_str(r#"{"pattern_mode": "drunk", "chaos": 0.5}"#).unwrap();
        assert_eq!(cfg.pattern_mode, PatternMode::Drunk);
        assert_eq!(cfg.chaos, 0.5);
        assert_eq!(cfg.probability, 1.0);
    }
}
