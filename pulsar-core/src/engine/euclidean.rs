//! Euclidean gate: forwards the incoming event on onsets, blocks it on rests.

use super::{Engine, StepNotice, TickOutcome};
use crate::config::{EuclideanConfig, MAX_STEPS};
use crate::error::Result;
use crate::pattern::{distribute, rotate, Pattern};
use crate::types::{ScheduledTrigger, Transport, TriggerEvent};

pub struct EuclideanEngine {
    transport: Transport,
    pulses: usize,
    steps: usize,
    offset: usize,
    pattern: Pattern,
    current_step: usize,
    /// Event forwarded on onsets
    incoming: Option<TriggerEvent>,
}

impl EuclideanEngine {
    pub fn new(config: EuclideanConfig) -> Result<Self> {
        let transport = Transport::new(config.bpm, config.subdivision)?;
        let mut engine = Self {
            transport,
            pulses: 0,
            steps: 1,
            offset: 0,
            pattern: Pattern::silent(1),
            current_step: 0,
            incoming: Some(config.note),
        };
        engine.set_pattern(config.pulses, config.steps, config.offset);
        Ok(engine)
    }

    /// Replace the whole configuration. Tempo is validated first so a
    /// rejected config changes nothing.
    pub fn apply_config(&mut self, config: EuclideanConfig) -> Result<()> {
        let mut transport = Transport::new(config.bpm, config.subdivision)?;
        if self.transport.is_running() {
            transport.start();
        }
        self.transport = transport;
        self.incoming = Some(config.note);
        self.set_pattern(config.pulses, config.steps, config.offset);
        Ok(())
    }

    pub fn config(&self) -> EuclideanConfig {
        EuclideanConfig {
            pulses: self.pulses,
            steps: self.steps,
            offset: self.offset,
            bpm: self.transport.bpm(),
            subdivision: self.transport.subdivision(),
            note: self.incoming.unwrap_or_default(),
        }
    }

    pub fn set_pulses(&mut self, pulses: usize) {
        self.set_pattern(pulses, self.steps, self.offset);
    }

    pub fn set_steps(&mut self, steps: usize) {
        self.set_pattern(self.pulses, steps, self.offset);
    }

    pub fn set_offset(&mut self, offset: usize) {
        self.set_pattern(self.pulses, self.steps, offset);
    }

    /// Regenerate from (pulses, steps, offset), clamping into range.
    /// The cursor goes back to step 0.
    pub fn set_pattern(&mut self, pulses: usize, steps: usize, offset: usize) {
        self.steps = steps.clamp(1, MAX_STEPS);
        self.pulses = pulses.min(self.steps);
        self.offset = offset % self.steps;
        self.pattern = rotate(&distribute(self.pulses, self.steps), self.offset);
        self.current_step = 0;
    }

    /// Event to forward on the next onsets
    pub fn set_incoming(&mut self, event: TriggerEvent) {
        self.incoming = Some(event);
    }

    /// With nothing to forward, onsets pass silently
    pub fn clear_incoming(&mut self) {
        self.incoming = None;
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Step the next tick will read
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn pulses(&self) -> usize {
        self.pulses
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl Default for EuclideanEngine {
    fn default() -> Self {
        Self::new(EuclideanConfig::default()).expect("default Euclidean config is valid")
    }
}

impl Engine for EuclideanEngine {
    fn name(&self) -> &'static str {
        "euclid"
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

        let step = self.current_step;
        let forwarded = if self.pattern.is_active(step) {
            self.incoming
        } else {
            None
        };
        self.current_step = (step + 1) % self.pattern.len();

        TickOutcome {
            steps: vec![StepNotice {
                ring: 0,
                step,
                fired: forwarded.is_some(),
            }],
            triggers: forwarded.map(ScheduledTrigger::now).into_iter().collect(),
        }
    }

    fn reset(&mut self) {
        self.current_step = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(pulses: usize, steps: usize, offset: usize) -> EuclideanEngine {
        let mut engine = EuclideanEngine::new(EuclideanConfig {
            pulses,
            steps,
            offset,
            ..Default::default()
        })
        .unwrap();
        engine.start();
        engine
    }

    #[test]
    fn test_forwards_on_onsets_only() {
        let mut engine = running(5, 16, 0);
        let fired: Vec<bool> = (0..16).map(|_| !engine.tick().is_silent()).collect();
        assert_eq!(fired, engine.pattern().as_slice());
        assert_eq!(fired.iter().filter(|&&f| f).count(), 5);
    }

    #[test]
    fn test_forwards_event_unchanged() {
        let mut engine = running(1, 1, 0);
        let event = TriggerEvent::new(38, 77, 0.3);
        engine.set_incoming(event);
        let outcome = engine.tick();
        assert_eq!(outcome.triggers, vec![ScheduledTrigger::now(event)]);
    }

    #[test]
    fn test_notice_reports_previous_step() {
        let mut engine = running(2, 4, 0);
        let notices: Vec<usize> = (0..6).map(|_| engine.tick().steps[0].step).collect();
        assert_eq!(notices, vec![0, 1, 2, 3, 0, 1]);
        assert_eq!(engine.current_step(), 2);
    }

    #[test]
    fn test_cursor_advances_on_rests() {
        let mut engine = running(0, 3, 0);
        for _ in 0..4 {
            assert!(engine.tick().is_silent());
        }
        assert_eq!(engine.current_step(), 1);
    }

    #[test]
    fn test_regeneration_resets_cursor() {
        let mut engine = running(3, 8, 0);
        for _ in 0..7 {
            engine.tick();
        }
        engine.set_steps(4);
        assert_eq!(engine.current_step(), 0);
        assert_eq!(engine.pattern().len(), 4);
        assert_eq!(engine.pulses(), 3);

        for _ in 0..3 {
            engine.tick();
        }
        engine.set_offset(1);
        assert_eq!(engine.current_step(), 0);
    }

    #[test]
    fn test_parameters_are_clamped() {
        let mut engine = running(4, 16, 0);
        engine.set_pulses(40);
        assert_eq!(engine.pulses(), 16);
        engine.set_steps(0);
        assert_eq!(engine.steps(), 1);
        assert_eq!(engine.pulses(), 1);
        engine.set_steps(1000);
        assert_eq!(engine.steps(), MAX_STEPS);
        engine.set_offset(MAX_STEPS + 3);
        assert_eq!(engine.offset(), 3);
    }

    #[test]
    fn test_offset_rotates_pattern() {
        let engine = running(5, 16, 3);
        assert_eq!(engine.pattern(), &rotate(&distribute(5, 16), 3));
    }

    #[test]
    fn test_stopped_engine_is_silent() {
        let mut engine = EuclideanEngine::default();
        assert!(engine.tick().steps.is_empty());
        engine.start();
        engine.tick();
        assert!(engine.stop());
        assert!(!engine.stop());
        assert_eq!(engine.current_step(), 0);
        assert!(engine.tick().steps.is_empty());
    }

    #[test]
    fn test_clear_incoming_blocks_everything() {
        let mut engine = running(4, 4, 0);
        engine.clear_incoming();
        let outcome = engine.tick();
        assert!(outcome.is_silent());
        assert!(!outcome.steps[0].fired);
    }

    #[test]
    fn test_bad_tempo_config_rejected() {
        let mut engine = running(4, 16, 0);
        let bad = EuclideanConfig {
            bpm: 0.0,
            pulses: 1,
            ..Default::default()
        };
        assert!(engine.apply_config(bad.clone()).is_err());
        assert_eq!(engine.pulses(), 4);
        assert!(EuclideanEngine::new(bad).is_err());
    }

    #[test]
    fn test_apply_config_keeps_running() {
        let mut engine = running(4, 16, 0);
        engine
            .apply_config(EuclideanConfig {
                pulses: 3,
                steps: 8,
                bpm: 90.0,
                ..Default::default()
            })
            .unwrap();
        assert!(engine.is_running());
        assert_eq!(engine.transport().bpm(), 90.0);
        assert_eq!(engine.config().steps, 8);
    }
}
