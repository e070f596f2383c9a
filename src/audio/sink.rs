//! Trigger sinks used by the app

use crate::audio::midi::{note_name, MidiOutputHandle};
use pulsar_core::types::TriggerSink;
use std::sync::Arc;

/// Logs every trigger instead of playing it
#[derive(Debug, Clone)]
pub struct LogSink {
    label: &'static str,
}

impl LogSink {
    pub fn new(label: &'static str) -> Self {
        Self { label }
    }
}

impl TriggerSink for LogSink {
    fn trigger_note(&self, pitch: u8, velocity: u8, duration_secs: f32) {
        log::info!(
            "[{}] {} ({}) vel {} for {:.3}s",
            self.label,
            note_name(pitch),
            pitch,
            velocity,
            duration_secs
        );
    }
}

/// One engine's output: MIDI on the track's channel while a port is
/// connected, the log otherwise
pub struct TrackSink {
    track: usize,
    midi: Arc<MidiOutputHandle>,
    fallback: LogSink,
}

impl TrackSink {
    pub fn new(track: usize, label: &'static str, midi: Arc<MidiOutputHandle>) -> Self {
        Self {
            track,
            midi,
            fallback: LogSink::new(label),
        }
    }

    pub fn track(&self) -> usize {
        self.track
    }
}

impl TriggerSink for TrackSink {
    fn trigger_note(&self, pitch: u8, velocity: u8, duration_secs: f32) {
        if !self.midi.is_connected() {
            self.fallback.trigger_note(pitch, velocity, duration_secs);
            return;
        }
        if let Err(e) = self
            .midi
            .play_note(self.track, pitch, velocity, duration_secs)
        {
            log::warn!("dropped note {}: {}", pitch, e);
        }
    }
}
