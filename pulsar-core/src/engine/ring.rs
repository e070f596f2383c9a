//! Multi-ring polyrhythmic sequencer ("binary spiral")
//!
//! Ring r has 2^r steps. All rings share the engine's single tick, so their
//! relative phase is fixed by the tick count and cannot drift. Every active
//! cell fires the ring's scale degree above the root note.

use super::{Engine, StepNotice, TickOutcome};
use crate::config::{self, RingConfig, Traversal};
use crate::error::{PulsarError, Result};
use crate::pattern::{distribute, quantize_to_scale, rotate, Scale};
use crate::types::{ScheduledTrigger, Transport, TriggerEvent};

/// One concentric step sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ring {
    cells: Vec<bool>,
    current_step: usize,
}

impl Ring {
    /// Empty ring with 2^index steps
    pub fn new(index: usize) -> Self {
        Self {
            cells: vec![false; 1 << index],
            current_step: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[bool] {
        &self.cells
    }

    /// Step this ring will play next
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Read the cell under the cursor and move the cursor on.
    /// Returns (step, active, wrapped).
    fn advance(&mut self) -> (usize, bool, bool) {
        let step = self.current_step;
        let active = self.cells[step];
        self.current_step = (step + 1) % self.cells.len();
        (step, active, self.current_step == 0)
    }
}

pub struct RingSequencerEngine {
    transport: Transport,
    rings: Vec<Ring>,
    /// Ring the next spiral tick visits
    current_ring: usize,
    root_note: u8,
    scale: Scale,
    traversal: Traversal,
    velocity: u8,
    gate_length: f32,
    /// Ticks since the last reset
    ticks: u64,
}

impl RingSequencerEngine {
    pub fn new(config: RingConfig) -> Result<Self> {
        let ring_count = config::ring_count(config.ring_count)?;
        let gate_length = config::gate_length(config.gate_length)?;
        let transport = Transport::new(config.bpm, config.subdivision)?;
        Ok(Self {
            transport,
            rings: (0..ring_count).map(Ring::new).collect(),
            current_ring: 0,
            root_note: config.root_note.min(127),
            scale: config.scale,
            traversal: config.traversal,
            velocity: config.velocity.min(127),
            gate_length,
            ticks: 0,
        })
    }

    /// Replace the configuration, keeping cell contents of surviving rings.
    /// Validation happens before anything is touched.
    pub fn apply_config(&mut self, config: RingConfig) -> Result<()> {
        config::ring_count(config.ring_count)?;
        let gate_length = config::gate_length(config.gate_length)?;
        let mut transport = Transport::new(config.bpm, config.subdivision)?;
        if self.transport.is_running() {
            transport.start();
        }
        self.transport = transport;
        self.set_ring_count(config.ring_count)?;
        self.root_note = config.root_note.min(127);
        self.scale = config.scale;
        self.set_traversal(config.traversal);
        self.velocity = config.velocity.min(127);
        self.gate_length = gate_length;
        Ok(())
    }

    pub fn config(&self) -> RingConfig {
        RingConfig {
            ring_count: self.rings.len(),
            root_note: self.root_note,
            scale: self.scale,
            traversal: self.traversal,
            bpm: self.transport.bpm(),
            subdivision: self.transport.subdivision(),
            velocity: self.velocity,
            gate_length: self.gate_length,
        }
    }

    pub fn ring_count(&self) -> usize {
        self.rings.len()
    }

    /// Grow or shrink the ring set. Surviving rings keep their cells; every
    /// cursor and the tick count start over, and the spiral cursor is
    /// clamped into the new range.
    pub fn set_ring_count(&mut self, count: usize) -> Result<()> {
        let count = config::ring_count(count)?;
        if count < self.rings.len() {
            self.rings.truncate(count);
        } else {
            let existing = self.rings.len();
            self.rings.extend((existing..count).map(Ring::new));
        }
        self.current_ring = self.current_ring.min(count - 1);
        for ring in &mut self.rings {
            ring.current_step = 0;
        }
        self.ticks = 0;
        Ok(())
    }

    pub fn rings(&self) -> &[Ring] {
        &self.rings
    }

    pub fn ring(&self, index: usize) -> Option<&Ring> {
        self.rings.get(index)
    }

    /// Ring the next spiral tick will visit
    pub fn current_ring(&self) -> usize {
        self.current_ring
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Flip one cell; takes effect on the next visit. Returns the new value.
    pub fn toggle_cell(&mut self, ring: usize, step: usize) -> Result<bool> {
        let cell = self.cell_mut(ring, step)?;
        *cell = !*cell;
        Ok(*cell)
    }

    pub fn set_cell(&mut self, ring: usize, step: usize, active: bool) -> Result<()> {
        *self.cell_mut(ring, step)? = active;
        Ok(())
    }

    pub fn cell(&self, ring: usize, step: usize) -> bool {
        self.rings
            .get(ring)
            .and_then(|r| r.cells.get(step))
            .copied()
            .unwrap_or(false)
    }

    /// Overwrite a ring with a Euclidean pattern of `pulses` onsets
    pub fn fill_ring(&mut self, ring: usize, pulses: usize, offset: usize) -> Result<()> {
        let target = self.ring_mut(ring)?;
        let pattern = rotate(&distribute(pulses, target.len()), offset);
        target.cells.copy_from_slice(pattern.as_slice());
        Ok(())
    }

    /// Clear every cell and rewind
    pub fn clear(&mut self) {
        for ring in &mut self.rings {
            ring.cells.iter_mut().for_each(|c| *c = false);
        }
        self.reset();
    }

    pub fn root_note(&self) -> u8 {
        self.root_note
    }

    pub fn set_root_note(&mut self, root_note: u8) {
        self.root_note = root_note.min(127);
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    pub fn set_scale(&mut self, scale: Scale) {
        self.scale = scale;
    }

    pub fn traversal(&self) -> Traversal {
        self.traversal
    }

    /// Switching traversal rewinds, since cursors mean different things
    pub fn set_traversal(&mut self, traversal: Traversal) {
        if self.traversal != traversal {
            self.traversal = traversal;
            self.reset();
        }
    }

    pub fn set_velocity(&mut self, velocity: u8) {
        self.velocity = velocity.min(127);
    }

    pub fn set_gate_length(&mut self, gate_length: f32) -> Result<()> {
        self.gate_length = config::gate_length(gate_length)?;
        Ok(())
    }

    /// Pitch ring `index` plays
    pub fn pitch_for_ring(&self, index: usize) -> u8 {
        quantize_to_scale(index, self.root_note, self.scale.intervals())
    }

    fn note_for_ring(&self, index: usize) -> TriggerEvent {
        let duration = self.transport.step_secs() * self.gate_length as f64;
        TriggerEvent::new(self.pitch_for_ring(index), self.velocity, duration as f32)
    }

    fn ring_mut(&mut self, ring: usize) -> Result<&mut Ring> {
        let count = self.rings.len();
        self.rings.get_mut(ring).ok_or_else(|| {
            PulsarError::invalid("ring", format!("ring {} does not exist ({} rings)", ring, count))
        })
    }

    fn cell_mut(&mut self, ring: usize, step: usize) -> Result<&mut bool> {
        let target = self.ring_mut(ring)?;
        let len = target.len();
        target.cells.get_mut(step).ok_or_else(|| {
            PulsarError::invalid(
                "step",
                format!("step {} is outside ring {} (0-{})", step, ring, len - 1),
            )
        })
    }

    fn tick_spiral(&mut self) -> TickOutcome {
        let index = self.current_ring;
        let (step, active, wrapped) = self.rings[index].advance();
        if wrapped {
            self.current_ring = (index + 1) % self.rings.len();
        }
        TickOutcome {
            steps: vec![StepNotice {
                ring: index,
                step,
                fired: active,
            }],
            triggers: if active {
                vec![ScheduledTrigger::now(self.note_for_ring(index))]
            } else {
                Vec::new()
            },
        }
    }

    fn tick_lockstep(&mut self) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        for index in 0..self.rings.len() {
            let (step, active, _) = self.rings[index].advance();
            outcome.steps.push(StepNotice {
                ring: index,
                step,
                fired: active,
            });
            if active {
                outcome
                    .triggers
                    .push(ScheduledTrigger::now(self.note_for_ring(index)));
            }
        }
        outcome
    }
}

impl Default for RingSequencerEngine {
    fn default() -> Self {
        Self::new(RingConfig::default()).expect("default ring config is valid")
    }
}

impl Engine for RingSequencerEngine {
    fn name(&self) -> &'static str {
        "ring"
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
        let outcome = match self.traversal {
            Traversal::Spiral => self.tick_spiral(),
            Traversal::Lockstep => self.tick_lockstep(),
        };
        self.ticks += 1;
        outcome
    }

    fn reset(&mut self) {
        self.current_ring = 0;
        for ring in &mut self.rings {
            ring.current_step = 0;
        }
        self.ticks = 0;
    }
}
