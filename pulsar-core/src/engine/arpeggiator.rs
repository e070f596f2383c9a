//! Probabilistic / chaotic arpeggiator
//!
//! Each tick snapshots the held notes, rolls the probability gate, picks a
//! note with the current [`PatternMode`], folds it through the octave sweep,
//! and applies chaos to pitch, duration and timing. All randomness comes
//! from one seedable `StdRng`.

use super::{Engine, StepNotice, TickOutcome};
use crate::config::{self, ArpeggiatorConfig, PatternMode, MAX_OCTAVE_RANGE};
use crate::error::Result;
use crate::pattern::octave_fold;
use crate::types::{HeldNotes, ScheduledTrigger, Transport, TriggerEvent};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Largest scheduling jitter at full chaos
const MAX_JITTER_SECS: f32 = 0.020;

/// Pick a note index for one tick.
///
/// `draw` is a uniform sample in [0, 1) used by `Random` (as the index) and
/// `Drunk` (as the coin flip); the other modes ignore it. `walk` is the
/// drunk-walk position, updated in place and kept within `[0, len-1]`.
/// `len` must be at least 1.
pub fn select_index(
    mode: PatternMode,
    step: usize,
    len: usize,
    draw: f32,
    walk: &mut usize,
) -> usize {
    debug_assert!(len > 0);
    match mode {
        PatternMode::Up => step % len,
        PatternMode::Down => len - 1 - (step % len),
        PatternMode::UpDown => {
            if len == 1 {
                return 0;
            }
            let cycle = 2 * len - 2;
            let position = step % cycle;
            if position < len {
                position
            } else {
                cycle - position
            }
        }
        PatternMode::Random => ((draw * len as f32) as usize).min(len - 1),
        PatternMode::Drunk => {
            let position = (*walk).min(len - 1);
            *walk = if draw < 0.5 {
                position.saturating_sub(1)
            } else {
                (position + 1).min(len - 1)
            };
            *walk
        }
    }
}

pub struct ArpeggiatorEngine {
    transport: Transport,
    held: HeldNotes,
    probability: f32,
    chaos: f32,
    octave_range: u8,
    gate_length: f32,
    pattern_mode: PatternMode,
    velocity: u8,
    step: usize,
    pattern_index: usize,
    drunk_position: usize,
    rng: StdRng,
}

impl ArpeggiatorEngine {
    /// Engine seeded from OS entropy
    pub fn new(config: ArpeggiatorConfig) -> Result<Self> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Engine with a reproducible random sequence
    pub fn with_seed(config: ArpeggiatorConfig, seed: u64) -> Result<Self> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: ArpeggiatorConfig, rng: StdRng) -> Result<Self> {
        let transport = Transport::new(config.bpm, config.subdivision)?;
        Ok(Self {
            transport,
            held: HeldNotes::new(),
            probability: config::unit_interval("probability", config.probability)?,
            chaos: config::unit_interval("chaos", config.chaos)?,
            octave_range: config.octave_range.clamp(1, MAX_OCTAVE_RANGE),
            gate_length: config::gate_length(config.gate_length)?,
            pattern_mode: config.pattern_mode,
            velocity: config.velocity.min(127),
            step: 0,
            pattern_index: 0,
            drunk_position: 0,
            rng,
        })
    }

    /// Replace the configuration. Everything is validated before any field
    /// changes.
    pub fn apply_config(&mut self, config: ArpeggiatorConfig) -> Result<()> {
        let mut transport = Transport::new(config.bpm, config.subdivision)?;
        let probability = config::unit_interval("probability", config.probability)?;
        let chaos = config::unit_interval("chaos", config.chaos)?;
        let gate_length = config::gate_length(config.gate_length)?;
        if self.transport.is_running() {
            transport.start();
        }
        self.transport = transport;
        self.probability = probability;
        self.chaos = chaos;
        self.gate_length = gate_length;
        self.velocity = config.velocity.min(127);
        self.set_pattern_mode(config.pattern_mode);
        self.set_octave_range(config.octave_range);
        Ok(())
    }

    pub fn config(&self) -> ArpeggiatorConfig {
        ArpeggiatorConfig {
            probability: self.probability,
            chaos: self.chaos,
            octave_range: self.octave_range,
            gate_length: self.gate_length,
            pattern_mode: self.pattern_mode,
            velocity: self.velocity,
            bpm: self.transport.bpm(),
            subdivision: self.transport.subdivision(),
        }
    }

    /// Handle onto the held-note set; note-on/off through it are seen on
    /// the next tick
    pub fn held_notes(&self) -> HeldNotes {
        self.held.clone()
    }

    /// Share an existing held-note set (e.g. one fed by MIDI input)
    pub fn set_held_notes(&mut self, held: HeldNotes) {
        self.held = held;
    }

    pub fn set_probability(&mut self, probability: f32) -> Result<()> {
        self.probability = config::unit_interval("probability", probability)?;
        Ok(())
    }

    pub fn set_chaos(&mut self, chaos: f32) -> Result<()> {
        self.chaos = config::unit_interval("chaos", chaos)?;
        Ok(())
    }

    pub fn set_gate_length(&mut self, gate_length: f32) -> Result<()> {
        self.gate_length = config::gate_length(gate_length)?;
        Ok(())
    }

    pub fn set_velocity(&mut self, velocity: u8) {
        self.velocity = velocity.min(127);
    }

    /// Changing the range rewinds the step, octave and walk cursors
    pub fn set_octave_range(&mut self, octave_range: u8) {
        let octave_range = octave_range.clamp(1, MAX_OCTAVE_RANGE);
        if self.octave_range != octave_range {
            self.octave_range = octave_range;
            self.reset();
        }
    }

    /// Changing the mode rewinds the step, octave and walk cursors
    pub fn set_pattern_mode(&mut self, mode: PatternMode) {
        if self.pattern_mode != mode {
            self.pattern_mode = mode;
            self.reset();
        }
    }

    pub fn probability(&self) -> f32 {
        self.probability
    }

    pub fn chaos(&self) -> f32 {
        self.chaos
    }

    pub fn octave_range(&self) -> u8 {
        self.octave_range
    }

    pub fn gate_length(&self) -> f32 {
        self.gate_length
    }

    pub fn pattern_mode(&self) -> PatternMode {
        self.pattern_mode
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn pattern_index(&self) -> usize {
        self.pattern_index
    }

    pub fn drunk_position(&self) -> usize {
        self.drunk_position
    }

    fn advance(&mut self) {
        self.step = self.step.wrapping_add(1);
        self.pattern_index = self.pattern_index.wrapping_add(1);
    }

    /// (pitch offset in semitones, duration factor, scheduling delay)
    fn roll_chaos(&mut self) -> (i32, f64, Duration) {
        if self.chaos <= 0.0 {
            return (0, 1.0, Duration::ZERO);
        }
        let chaos = self.chaos;
        let pitch_offset = if self.rng.gen::<f32>() < chaos {
            ((self.rng.gen::<f32>() - 0.5) * chaos * 12.0).round() as i32
        } else {
            0
        };
        let timing_deviation = chaos * (self.rng.gen::<f32>() - 0.5) * 0.5;
        let jitter = self.rng.gen::<f32>() * chaos * MAX_JITTER_SECS;
        (
            pitch_offset,
            1.0 + timing_deviation as f64,
            Duration::from_secs_f32(jitter),
        )
    }
}

impl Default for ArpeggiatorEngine {
    fn default() -> Self {
        Self::new(ArpeggiatorConfig::default()).expect("default arpeggiator config is valid")
    }
}

impl Engine for ArpeggiatorEngine {
    fn name(&self) -> &'static str {
        "arp"
    }

    fn transport(&self) -> &Transport {
        &self.transport
    }

    fn transport_mut(&mut self) -> &mut Transport {
        &mut self.transport
    }

    fn tick(&mut self) -> TickOutcome {
        if !self.transport.is_running() {
            return TickOutcome::default();
        }
        let notes = self.held.snapshot();
        if notes.is_empty() {
            return TickOutcome::default();
        }
        let len = notes.len();
        self.drunk_position = self.drunk_position.min(len - 1);

        // Skipped steps still advance, so the pattern does not stall
        if self.rng.gen::<f32>() >= self.probability {
            let notice = StepNotice {
                ring: 0,
                step: self.step % len,
                fired: false,
            };
            self.advance();
            return TickOutcome {
                steps: vec![notice],
                triggers: Vec::new(),
            };
        }

        let draw = self.rng.gen::<f32>();
        let index = select_index(
            self.pattern_mode,
            self.step,
            len,
            draw,
            &mut self.drunk_position,
        );
        let octave = octave_fold(self.pattern_index, self.octave_range);
        let (pitch_offset, duration_factor, jitter) = self.roll_chaos();

        let pitch = (notes[index] as i32 + octave + pitch_offset).clamp(0, 127) as u8;
        let duration = self.transport.beat_secs() * self.gate_length as f64 * duration_factor;
        let event = TriggerEvent::new(pitch, self.velocity, duration as f32);
        log::trace!("arp step {} -> note {} ({})", self.step, pitch, index);
        self.advance();

        TickOutcome {
            steps: vec![StepNotice {
                ring: 0,
                step: index,
                fired: true,
            }],
            triggers: vec![ScheduledTrigger::delayed(event, jitter)],
        }
    }

    fn reset(&mut self) {
        self.step = 0;
        self.pattern_index = 0;
        self.drunk_position = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arp(mode: PatternMode, notes: &[u8]) -> ArpeggiatorEngine {
        let mut engine = ArpeggiatorEngine::with_seed(
            ArpeggiatorConfig {
                pattern_mode: mode,
                ..Default::default()
            },
            7,
        )
        .unwrap();
        for &n in notes {
            engine.held_notes().note_on(n).unwrap();
        }
        engine.start();
        engine
    }

    fn play(engine: &mut ArpeggiatorEngine, ticks: usize) -> Vec<u8> {
        (0..ticks)
            .flat_map(|_| engine.tick().triggers)
            .map(|t| t.event.pitch)
            .collect()
    }

    #[test]
    fn test_select_index_up_down() {
        let mut walk = 0;
        let up: Vec<usize> = (0..6)
            .map(|s| select_index(PatternMode::Up, s, 3, 0.0, &mut walk))
            .collect();
        assert_eq!(up, vec![0, 1, 2, 0, 1, 2]);
        let down: Vec<usize> = (0..6)
            .map(|s| select_index(PatternMode::Down, s, 3, 0.0, &mut walk))
            .collect();
        assert_eq!(down, vec![2, 1, 0, 2, 1, 0]);
    }

    #[test]
    fn test_select_index_updown_does_not_double_endpoints() {
        let mut walk = 0;
        let seq: Vec<usize> = (0..9)
            .map(|s| select_index(PatternMode::UpDown, s, 4, 0.0, &mut walk))
            .collect();
        assert_eq!(seq, vec![0, 1, 2, 3, 2, 1, 0, 1, 2]);
        assert_eq!(select_index(PatternMode::UpDown, 5, 1, 0.0, &mut walk), 0);
        let two: Vec<usize> = (0..4)
            .map(|s| select_index(PatternMode::UpDown, s, 2, 0.0, &mut walk))
            .collect();
        assert_eq!(two, vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_select_index_random_in_range() {
        let mut walk = 0;
        assert_eq!(select_index(PatternMode::Random, 0, 4, 0.0, &mut walk), 0);
        assert_eq!(select_index(PatternMode::Random, 0, 4, 0.99, &mut walk), 3);
        assert_eq!(select_index(PatternMode::Random, 0, 4, 0.5, &mut walk), 2);
    }

    #[test]
    fn test_select_index_drunk_reflects_at_edges() {
        let mut walk = 0;
        // down at the bottom stays at 0
        assert_eq!(select_index(PatternMode::Drunk, 0, 3, 0.1, &mut walk), 0);
        assert_eq!(select_index(PatternMode::Drunk, 0, 3, 0.9, &mut walk), 1);
        assert_eq!(select_index(PatternMode::Drunk, 0, 3, 0.9, &mut walk), 2);
        // up at the top stays at the top
        assert_eq!(select_index(PatternMode::Drunk, 0, 3, 0.9, &mut walk), 2);
        assert_eq!(select_index(PatternMode::Drunk, 0, 3, 0.2, &mut walk), 1);
        // shrinking set pulls the walk back in range
        walk = 10;
        assert_eq!(select_index(PatternMode::Drunk, 0, 2, 0.9, &mut walk), 1);
    }

    #[test]
    fn test_up_cycles_held_notes() {
        let mut engine = arp(PatternMode::Up, &[67, 60, 64]);
        assert_eq!(play(&mut engine, 6), vec![60, 64, 67, 60, 64, 67]);
    }

    #[test]
    fn test_down_and_updown() {
        let mut engine = arp(PatternMode::Down, &[60, 64, 67]);
        assert_eq!(play(&mut engine, 4), vec![67, 64, 60, 67]);
        let mut engine = arp(PatternMode::UpDown, &[60, 64, 67]);
        assert_eq!(play(&mut engine, 6), vec![60, 64, 67, 64, 60, 64]);
    }

    #[test]
    fn test_zero_probability_never_triggers() {
        let mut engine = arp(PatternMode::Up, &[60, 64, 67]);
        engine.set_probability(0.0).unwrap();
        assert!(play(&mut engine, 500).is_empty());
        // counters still advance
        assert_eq!(engine.step(), 500);
    }

    #[test]
    fn test_skipped_steps_are_not_repeated() {
        let mut engine = arp(PatternMode::Up, &[60, 64, 67]);
        engine.set_probability(0.0).unwrap();
        engine.tick();
        engine.set_probability(1.0).unwrap();
        // step 0 (60) was skipped, so the next note is 64
        assert_eq!(play(&mut engine, 2), vec![64, 67]);
    }

    #[test]
    fn test_empty_held_set_is_noop() {
        let mut engine = arp(PatternMode::Up, &[]);
        let outcome = engine.tick();
        assert!(outcome.is_silent());
        assert!(outcome.steps.is_empty());
        assert_eq!(engine.step(), 0);
    }

    #[test]
    fn test_octave_sweep() {
        let mut engine = arp(PatternMode::Up, &[60]);
        engine.set_octave_range(2);
        assert_eq!(play(&mut engine, 6), vec![60, 72, 72, 60, 60, 72]);
    }

    #[test]
    fn test_mode_and_range_changes_reset_cursors() {
        let mut engine = arp(PatternMode::Drunk, &[60, 62, 64, 65, 67]);
        play(&mut engine, 9);
        assert_eq!(engine.step(), 9);
        engine.set_pattern_mode(PatternMode::Up);
        assert_eq!(engine.step(), 0);
        assert_eq!(engine.pattern_index(), 0);
        assert_eq!(engine.drunk_position(), 0);

        play(&mut engine, 3);
        engine.set_octave_range(3);
        assert_eq!(engine.step(), 0);

        // same value is not a change
        play(&mut engine, 2);
        engine.set_octave_range(3);
        assert_eq!(engine.step(), 2);
    }

    #[test]
    fn test_duration_without_chaos() {
        let mut engine = arp(PatternMode::Up, &[60]);
        engine.set_gate_length(0.5).unwrap();
        let t = engine.tick().triggers[0];
        // 120 BPM: one 0.5s beat * 0.5, whatever the subdivision
        assert!((t.event.duration_secs - 0.25).abs() < 1e-6);
        engine.set_subdivision(3).unwrap();
        let t = engine.tick().triggers[0];
        assert!((t.event.duration_secs - 0.25).abs() < 1e-6);
        engine.set_gate_length(0.8).unwrap();
        let t = engine.tick().triggers[0];
        assert!((t.event.duration_secs - 0.4).abs() < 1e-6);
        assert!(t.is_immediate());
        assert_eq!(t.event.velocity, 100);
    }

    #[test]
    fn test_chaos_stays_in_bounds() {
        let mut engine = arp(PatternMode::Up, &[60, 64, 67]);
        engine.set_chaos(1.0).unwrap();
        let base = engine.transport().beat_secs() as f32 * engine.gate_length();
        for _ in 0..300 {
            let t = engine.tick().triggers[0];
            // pitch deviation at most half an octave either side
            assert!(t.event.pitch >= 54 && t.event.pitch <= 73, "{}", t.event.pitch);
            // duration within +-25%
            assert!(t.event.duration_secs >= base * 0.75 - 1e-4);
            assert!(t.event.duration_secs <= base * 1.25 + 1e-4);
            assert!(t.delay <= Duration::from_millis(20));
        }
    }

    #[test]
    fn test_seeded_engines_agree() {
        let mut a = arp(PatternMode::Random, &[60, 62, 64, 65, 67]);
        let mut b = arp(PatternMode::Random, &[60, 62, 64, 65, 67]);
        a.set_chaos(0.6).unwrap();
        b.set_chaos(0.6).unwrap();
        let run_a: Vec<_> = (0..50).map(|_| a.tick()).collect();
        let run_b: Vec<_> = (0..50).map(|_| b.tick()).collect();
        assert_eq!(run_a, run_b);
    }

    #[test]
    fn test_drunk_stays_on_held_notes() {
        let notes = [48, 55, 60, 63];
        let mut engine = arp(PatternMode::Drunk, &notes);
        for pitch in play(&mut engine, 200) {
            assert!(notes.contains(&pitch));
        }
    }

    #[test]
    fn test_nan_parameters_rejected() {
        let mut engine = arp(PatternMode::Up, &[60]);
        assert!(engine.set_probability(f32::NAN).is_err());
        assert!(engine.set_chaos(f32::NAN).is_err());
        assert_eq!(engine.probability(), 1.0);
        engine.set_probability(3.0).unwrap();
        assert_eq!(engine.probability(), 1.0);
    }
}
