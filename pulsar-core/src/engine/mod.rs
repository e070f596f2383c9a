//! Tick-driven pattern engines
//!
//! An engine is a state machine that advances by one step each time
//! [`Engine::tick`] is called and reports what to trigger. It owns its
//! [`Transport`] (running flag and tempo) but never a timer; the caller
//! decides how ticks are produced, using [`Engine::period`] as the nominal
//! spacing.

mod arpeggiator;
mod euclidean;
mod ring;

pub use arpeggiator::{select_index, ArpeggiatorEngine};
pub use euclidean::EuclideanEngine;
pub use ring::{Ring, RingSequencerEngine};

use crate::error::Result;
use crate::types::{ScheduledTrigger, Transport, TriggerSink};
use std::time::Duration;

/// Position that was just played, for step highlighting.
///
/// Always the step that fired on this tick, never the upcoming one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepNotice {
    /// Ring index (always 0 for single-lane engines)
    pub ring: usize,
    pub step: usize,
    /// Whether this step produced a trigger
    pub fired: bool,
}

/// Everything one tick produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    pub steps: Vec<StepNotice>,
    pub triggers: Vec<ScheduledTrigger>,
}

impl TickOutcome {
    pub fn is_silent(&self) -> bool {
        self.triggers.is_empty()
    }

    /// Hand every trigger to `sink` right away, ignoring any jitter delay.
    /// Returns how many were delivered.
    pub fn deliver_now(&self, sink: &dyn TriggerSink) -> usize {
        for trigger in &self.triggers {
            sink.trigger(&trigger.event);
        }
        self.triggers.len()
    }
}

/// Common control surface of every engine
pub trait Engine: Send {
    /// Short display name
    fn name(&self) -> &'static str;

    fn transport(&self) -> &Transport;

    fn transport_mut(&mut self) -> &mut Transport;

    /// Advance one step. Returns an empty outcome while stopped.
    fn tick(&mut self) -> TickOutcome;

    /// Rewind every cursor to the start of the pattern
    fn reset(&mut self);

    fn is_running(&self) -> bool {
        self.transport().is_running()
    }

    /// Start playback. Starting a running engine is a no-op that returns false.
    fn start(&mut self) -> bool {
        let started = self.transport_mut().start();
        if started {
            log::debug!("{} started", self.name());
        } else {
            log::debug!("{} already running, start ignored", self.name());
        }
        started
    }

    /// Stop playback and rewind. Stopping a stopped engine is a no-op that
    /// returns false.
    fn stop(&mut self) -> bool {
        let stopped = self.transport_mut().stop();
        if stopped {
            self.reset();
            log::debug!("{} stopped", self.name());
        }
        stopped
    }

    fn set_tempo(&mut self, bpm: f32) -> Result<()> {
        self.transport_mut().set_bpm(bpm)
    }

    fn set_subdivision(&mut self, subdivision: u32) -> Result<()> {
        self.transport_mut().set_subdivision(subdivision)
    }

    /// Nominal time between ticks
    fn period(&self) -> Duration {
        self.transport().period()
    }
}
