//! The three engines wired to their clocks, outputs and the step channel

use crate::audio::dispatcher::{DispatcherHandle, TriggerDispatcher};
use crate::audio::midi::MidiOutputHandle;
use crate::audio::runner::{EngineRunner, StepEvent};
use crate::audio::sink::TrackSink;
use anyhow::{anyhow, Result};
use crossbeam_channel::{unbounded, Receiver};
use pulsar_core::engine::{ArpeggiatorEngine, Engine, EuclideanEngine, RingSequencerEngine};
use pulsar_core::types::HeldNotes;
use std::fmt;
use std::sync::Arc;

pub const EUCLID_TRACK: usize = 0;
pub const RING_TRACK: usize = 1;
pub const ARP_TRACK: usize = 2;

/// Which engine a command addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Euclid,
    Ring,
    Arp,
    All,
}

impl Target {
    pub fn from_name(s: &str) -> Option<Target> {
        match s.to_lowercase().as_str() {
            "" | "all" => Some(Target::All),
            "euclid" | "euclidean" => Some(Target::Euclid),
            "ring" | "rings" => Some(Target::Ring),
            "arp" | "arpeggiator" => Some(Target::Arp),
            _ => None,
        }
    }

    fn includes(&self, other: Target) -> bool {
        *self == Target::All || *self == other
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Target::Euclid => "euclid",
            Target::Ring => "ring",
            Target::Arp => "arp",
            Target::All => "all engines",
        };
        write!(f, "{}", name)
    }
}

pub struct Rack {
    pub euclid: EngineRunner<EuclideanEngine>,
    pub ring: EngineRunner<RingSequencerEngine>,
    pub arp: EngineRunner<ArpeggiatorEngine>,
    /// Notes the arpeggiator plays from, fed by `note on/off` and MIDI in
    pub held: HeldNotes,
    pub midi_out: Arc<MidiOutputHandle>,
    pub dispatcher: DispatcherHandle,
    steps: Receiver<StepEvent>,
}

impl Rack {
    pub fn new(midi_out: Arc<MidiOutputHandle>) -> Result<Self> {
        let dispatcher = TriggerDispatcher::spawn();
        let (step_tx, steps) = unbounded();

        let arp_engine = ArpeggiatorEngine::default();
        let held = arp_engine.held_notes();

        let euclid = EngineRunner::new(
            EuclideanEngine::default(),
            Arc::new(TrackSink::new(EUCLID_TRACK, "euclid", midi_out.clone())),
        )
        .with_observer(step_tx.clone());
        let ring = EngineRunner::new(
            RingSequencerEngine::default(),
            Arc::new(TrackSink::new(RING_TRACK, "ring", midi_out.clone())),
        )
        .with_observer(step_tx.clone());
        let arp = EngineRunner::new(
            arp_engine,
            Arc::new(TrackSink::new(ARP_TRACK, "arp", midi_out.clone())),
        )
        .with_dispatcher(dispatcher.clone())
        .with_observer(step_tx);

        Ok(Self {
            euclid,
            ring,
            arp,
            held,
            midi_out,
            dispatcher,
            steps,
        })
    }

    /// Played steps from every engine
    pub fn steps(&self) -> &Receiver<StepEvent> {
        &self.steps
    }

    /// Start the addressed engines; returns how many actually started
    pub fn start(&mut self, target: Target) -> Result<usize> {
        let mut started = 0;
        if target.includes(Target::Euclid) && self.euclid.start()? {
            started += 1;
        }
        if target.includes(Target::Ring) && self.ring.start()? {
            started += 1;
        }
        if target.includes(Target::Arp) && self.arp.start()? {
            started += 1;
        }
        Ok(started)
    }

    /// Stop the addressed engines; returns how many were running
    pub fn stop(&mut self, target: Target) -> usize {
        let mut stopped = 0;
        if target.includes(Target::Euclid) && self.euclid.stop() {
            stopped += 1;
        }
        if target.includes(Target::Ring) && self.ring.stop() {
            stopped += 1;
        }
        if target.includes(Target::Arp) && self.arp.stop() {
            stopped += 1;
        }
        stopped
    }

    /// Set the tempo of the addressed engines. Validated up front so a bad
    /// value leaves every engine untouched.
    pub fn set_tempo(&mut self, target: Target, bpm: f32) -> Result<()> {
        pulsar_core::types::tick_period(bpm, 1)?;
        if target.includes(Target::Euclid) {
            self.euclid.set_tempo(bpm)?;
        }
        if target.includes(Target::Ring) {
            self.ring.set_tempo(bpm)?;
        }
        if target.includes(Target::Arp) {
            self.arp.set_tempo(bpm)?;
        }
        Ok(())
    }

    pub fn set_subdivision(&mut self, target: Target, subdivision: u32) -> Result<()> {
        pulsar_core::types::tick_period(1.0, subdivision)?;
        if target.includes(Target::Euclid) {
            self.euclid.set_subdivision(subdivision)?;
        }
        if target.includes(Target::Ring) {
            self.ring.set_subdivision(subdivision)?;
        }
        if target.includes(Target::Arp) {
            self.arp.set_subdivision(subdivision)?;
        }
        Ok(())
    }

    /// Tempo of one engine (`All` reads the Euclidean gate)
    pub fn tempo(&self, target: Target) -> f32 {
        match target {
            Target::Euclid | Target::All => self.euclid.inspect(|e| e.transport().bpm()),
            Target::Ring => self.ring.inspect(|e| e.transport().bpm()),
            Target::Arp => self.arp.inspect(|e| e.transport().bpm()),
        }
    }

    /// Stop everything and flush pending jittered notes
    pub fn shutdown(&mut self) {
        self.stop(Target::All);
        self.dispatcher.clear();
        self.dispatcher.shutdown();
        if let Err(e) = self.midi_out.panic_all() {
            log::warn!("MIDI panic on shutdown failed: {}", e);
        }
    }

    /// Resolve a target name or fail with the list of valid ones
    pub fn target(name: &str) -> Result<Target> {
        Target::from_name(name)
            .ok_or_else(|| anyhow!("unknown engine '{}' (euclid, ring, arp or all)", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rack() -> Rack {
        Rack::new(Arc::new(MidiOutputHandle::new().unwrap())).unwrap()
    }

    #[test]
    fn test_target_names() {
        assert_eq!(Target::from_name("ARP"), Some(Target::Arp));
        assert_eq!(Target::from_name(""), Some(Target::All));
        assert_eq!(Target::from_name("drums"), None);
        assert!(Rack::target("drums").is_err());
    }

    #[test]
    fn test_start_stop_counts() {
        let mut rack = rack();
        assert_eq!(rack.start(Target::Euclid).unwrap(), 1);
        assert_eq!(rack.start(Target::All).unwrap(), 2);
        assert_eq!(rack.start(Target::All).unwrap(), 0);
        assert_eq!(rack.stop(Target::Ring), 1);
        assert_eq!(rack.stop(Target::All), 2);
        assert_eq!(rack.stop(Target::All), 0);
    }

    #[test]
    fn test_tempo_is_all_or_nothing() {
        let mut rack = rack();
        rack.set_tempo(Target::All, 90.0).unwrap();
        assert!(rack.set_tempo(Target::All, -1.0).is_err());
        assert_eq!(rack.tempo(Target::Euclid), 90.0);
        assert_eq!(rack.tempo(Target::Ring), 90.0);
        assert_eq!(rack.tempo(Target::Arp), 90.0);

        rack.set_tempo(Target::Arp, 140.0).unwrap();
        assert_eq!(rack.tempo(Target::Arp), 140.0);
        assert_eq!(rack.tempo(Target::Ring), 90.0);
    }

    #[test]
    fn test_held_notes_are_shared_with_arp() {
        let rack = rack();
        rack.held.note_on(62).unwrap();
        let engine = rack.arp.engine();
        let held = engine.lock().unwrap().held_notes();
        assert!(held.contains(62));
    }

    #[test]
    fn test_steps_reach_the_channel() {
        let mut rack = rack();
        rack.set_tempo(Target::Euclid, 600.0).unwrap();
        rack.set_subdivision(Target::Euclid, 10).unwrap();
        rack.start(Target::Euclid).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(50));
        rack.shutdown();
        let events: Vec<StepEvent> = rack.steps().try_iter().collect();
        assert!(!events.is_empty());
        assert!(events.iter().all(|e| e.engine == "euclid"));
    }
}
