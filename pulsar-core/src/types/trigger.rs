//! Trigger events and the sink they are delivered to
//!
//! Engines never make sound themselves. Every decision ends up as a
//! [`TriggerEvent`] handed to a [`TriggerSink`], which is implemented by
//! whatever actually plays notes (a MIDI port, a synth voice allocator, a
//! logger).

use std::sync::Mutex;
use std::time::Duration;

/// One note to sound: pitch and velocity in MIDI range, duration in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TriggerEvent {
    pub pitch: u8,
    pub velocity: u8,
    pub duration_secs: f32,
}

impl TriggerEvent {
    /// Create an event, clamping pitch/velocity to 0..=127 and the duration
    /// to a positive value
    pub fn new(pitch: u8, velocity: u8, duration_secs: f32) -> Self {
        Self {
            pitch: pitch.min(127),
            velocity: velocity.min(127),
            duration_secs: if duration_secs.is_finite() {
                duration_secs.max(0.001)
            } else {
                0.001
            },
        }
    }
}

impl Default for TriggerEvent {
    fn default() -> Self {
        Self::new(60, 100, 0.1)
    }
}

/// A trigger plus how long after the nominal tick it should fire.
///
/// `delay` is zero unless chaos jitter is in play.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledTrigger {
    pub event: TriggerEvent,
    pub delay: Duration,
}

impl ScheduledTrigger {
    pub fn now(event: TriggerEvent) -> Self {
        Self {
            event,
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(event: TriggerEvent, delay: Duration) -> Self {
        Self { event, delay }
    }

    pub fn is_immediate(&self) -> bool {
        self.delay.is_zero()
    }
}

/// The voice/synthesis side. Fire-and-forget, must not block.
pub trait TriggerSink: Send + Sync {
    fn trigger_note(&self, pitch: u8, velocity: u8, duration_secs: f32);

    fn trigger(&self, event: &TriggerEvent) {
        self.trigger_note(event.pitch, event.velocity, event.duration_secs);
    }
}

/// Sink that just records every event (capture buffers, tests, dry runs)
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<TriggerEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything received so far
    pub fn events(&self) -> Vec<TriggerEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Drain the recorded events
    pub fn take(&self) -> Vec<TriggerEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pitches(&self) -> Vec<u8> {
        self.events().iter().map(|e| e.pitch).collect()
    }
}

impl TriggerSink for CollectingSink {
    fn trigger_note(&self, pitch: u8, velocity: u8, duration_secs: f32) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(TriggerEvent {
                pitch,
                velocity,
                duration_secs,
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_event_clamps() {
        let e = TriggerEvent::new(200, 255, -1.0);
        assert_eq!(e.pitch, 127);
        assert_eq!(e.velocity, 127);
        assert!(e.duration_secs > 0.0);

        let e = TriggerEvent::new(60, 100, f32::NAN);
        assert!(e.duration_secs > 0.0);
    }

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingSink::new();
        assert!(sink.is_empty());
        sink.trigger_note(60, 100, 0.25);
        sink.trigger(&TriggerEvent::new(64, 90, 0.5));
        assert_eq!(sink.pitches(), vec![60, 64]);
        assert_eq!(sink.take().len(), 2);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_scheduled_trigger_immediate() {
        let e = TriggerEvent::default();
        assert!(ScheduledTrigger::now(e).is_immediate());
        assert!(!ScheduledTrigger::delayed(e, Duration::from_millis(3)).is_immediate());
    }
}
