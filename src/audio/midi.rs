//! MIDI output and input
//!
//! Output runs on its own thread (the connection lives there) and is driven
//! through `MidiOutputHandle`. Timed notes are sent as Note On right away and
//! the matching Note Off is kept in a min-heap on the same thread until it is
//! due. Input feeds note-on/off messages from a controller straight into a
//! `HeldNotes` set.

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use midir::{MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use pulsar_core::types::HeldNotes;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::{Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const CLIENT_NAME: &str = "Pulsar";

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Convert a pitch class + octave to a MIDI note number.
/// MIDI note 60 = Middle C (C4).
pub fn note_to_midi(pitch_class: u8, octave: i8) -> u8 {
    let midi_note = (octave as i16 + 1) * 12 + pitch_class as i16;
    midi_note.clamp(0, 127) as u8
}

/// Parse `60`, `C4`, `c#3`, `Eb2` or `A-1` into a MIDI note number
pub fn parse_note(s: &str) -> Option<u8> {
    let s = s.trim();
    if let Ok(n) = s.parse::<u8>() {
        return (n <= 127).then_some(n);
    }

    let mut chars = s.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    let mut pitch_class: i16 = match letter {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let rest = chars.as_str();
    let octave_str = if let Some(r) = rest.strip_prefix('#') {
        pitch_class += 1;
        r
    } else if let Some(r) = rest.strip_prefix('b') {
        pitch_class -= 1;
        r
    } else {
        rest
    };
    let octave: i16 = octave_str.parse().ok()?;
    let midi = (octave + 1) * 12 + pitch_class;
    (0..=127).contains(&midi).then_some(midi as u8)
}

/// `60` -> `C4`
pub fn note_name(note: u8) -> String {
    let octave = (note / 12) as i8 - 1;
    format!("{}{}", NOTE_NAMES[(note % 12) as usize], octave)
}

/// MIDI channel mode configuration
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum MidiChannelMode {
    /// Each engine on its own channel (euclid -> 1, ring -> 2, arp -> 3)
    #[default]
    PerTrack,
    /// Everything on one channel (0-indexed)
    Mono(u8),
}

/// Commands that can be sent to the MIDI output thread
enum MidiCommand {
    Connect {
        port_name: String,
        reply: Sender<Result<String>>,
    },
    NoteOn {
        channel: u8,
        note: u8,
        velocity: u8,
    },
    NoteOff {
        channel: u8,
        note: u8,
    },
    /// Note On now, Note Off after `duration`
    Play {
        channel: u8,
        note: u8,
        velocity: u8,
        duration: Duration,
    },
    AllNotesOff {
        channel: u8,
    },
    Disconnect,
    Shutdown,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct PendingOff {
    due: Instant,
    channel: u8,
    note: u8,
    generation: u64,
}

/// Owns the connection; lives on the MIDI thread
struct MidiOutputInternal {
    connection: Option<MidiOutputConnection>,
    command_rx: Receiver<MidiCommand>,
    pending_offs: BinaryHeap<Reverse<PendingOff>>,
    /// Latest Play per (channel, note); older Note Offs for a retriggered
    /// note are skipped
    generations: HashMap<(u8, u8), u64>,
    next_generation: u64,
}

impl MidiOutputInternal {
    fn new(command_rx: Receiver<MidiCommand>) -> Self {
        Self {
            connection: None,
            command_rx,
            pending_offs: BinaryHeap::new(),
            generations: HashMap::new(),
            next_generation: 0,
        }
    }

    fn connect(&mut self, port_name: &str) -> Result<String> {
        let midi_out = MidiOutput::new(CLIENT_NAME)?;
        let ports = midi_out.ports();
        let port = ports
            .iter()
            .find(|p| {
                midi_out
                    .port_name(p)
                    .map(|name| name.contains(port_name))
                    .unwrap_or(false)
            })
            .ok_or_else(|| anyhow!("MIDI port '{}' not found", port_name))?;
        let actual_name = midi_out.port_name(port)?;

        let connection = midi_out
            .connect(port, "pulsar-out")
            .map_err(|e| anyhow!("{}", e))?;
        self.release_all();
        self.connection = Some(connection);
        Ok(actual_name)
    }

    fn send(&mut self, message: &[u8]) {
        if let Some(conn) = &mut self.connection {
            if let Err(e) = conn.send(message) {
                log::warn!("MIDI send failed: {}", e);
            }
        }
    }

    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) {
        self.send(&[0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]);
    }

    fn note_off(&mut self, channel: u8, note: u8) {
        self.send(&[0x80 | (channel & 0x0F), note & 0x7F, 0]);
    }

    fn all_notes_off(&mut self, channel: u8) {
        // CC 123
        self.send(&[0xB0 | (channel & 0x0F), 123, 0]);
    }

    /// Send every outstanding Note Off now
    fn release_all(&mut self) {
        while let Some(Reverse(off)) = self.pending_offs.pop() {
            self.note_off(off.channel, off.note);
        }
        self.generations.clear();
    }

    fn release_due(&mut self, now: Instant) {
        while self
            .pending_offs
            .peek()
            .is_some_and(|Reverse(off)| off.due <= now)
        {
            let Some(Reverse(off)) = self.pending_offs.pop() else {
                break;
            };
            let key = (off.channel, off.note);
            if self.generations.get(&key) == Some(&off.generation) {
                self.generations.remove(&key);
                self.note_off(off.channel, off.note);
            }
        }
    }

    fn run(&mut self) {
        loop {
            let received = match self.pending_offs.peek() {
                Some(Reverse(next)) => {
                    let wait = next.due.saturating_duration_since(Instant::now());
                    match self.command_rx.recv_timeout(wait) {
                        Ok(cmd) => Some(cmd),
                        Err(RecvTimeoutError::Timeout) => None,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match self.command_rx.recv() {
                    Ok(cmd) => Some(cmd),
                    Err(_) => break,
                },
            };

            if let Some(cmd) = received {
                if !self.handle_command(cmd) {
                    break;
                }
            }
            self.release_due(Instant::now());
        }
    }

    /// Returns false on shutdown
    fn handle_command(&mut self, cmd: MidiCommand) -> bool {
        match cmd {
            MidiCommand::Connect { port_name, reply } => {
                let result = self.connect(&port_name);
                if let Err(e) = &result {
                    log::warn!("MIDI connect error: {}", e);
                }
                let _ = reply.send(result);
            }
            MidiCommand::NoteOn {
                channel,
                note,
                velocity,
            } => self.note_on(channel, note, velocity),
            MidiCommand::NoteOff { channel, note } => {
                self.generations.remove(&(channel, note));
                self.note_off(channel, note);
            }
            MidiCommand::Play {
                channel,
                note,
                velocity,
                duration,
            } => {
                let generation = self.next_generation;
                self.next_generation += 1;
                self.generations.insert((channel, note), generation);
                self.note_on(channel, note, velocity);
                self.pending_offs.push(Reverse(PendingOff {
                    due: Instant::now() + duration,
                    channel,
                    note,
                    generation,
                }));
            }
            MidiCommand::AllNotesOff { channel } => self.all_notes_off(channel),
            MidiCommand::Disconnect => {
                self.release_all();
                self.connection = None;
            }
            MidiCommand::Shutdown => {
                self.release_all();
                for ch in 0..16u8 {
                    self.all_notes_off(ch);
                }
                return false;
            }
        }
        true
    }
}

/// Thread-safe handle to the MIDI output
pub struct MidiOutputHandle {
    command_tx: Sender<MidiCommand>,
    _thread: JoinHandle<()>,
    channel_mode: RwLock<MidiChannelMode>,
    /// Notes turned on through `note_on` and not yet turned off
    active_notes: Mutex<HashSet<(u8, u8)>>,
    port_name: RwLock<Option<String>>,
}

impl MidiOutputHandle {
    /// Create a new MIDI output handle (not connected to any port yet)
    pub fn new() -> Result<Self> {
        let (tx, rx) = unbounded();
        let thread = thread::Builder::new()
            .name("pulsar-midi-out".to_string())
            .spawn(move || MidiOutputInternal::new(rx).run())
            .context("Failed to spawn MIDI output thread")?;

        Ok(Self {
            command_tx: tx,
            _thread: thread,
            channel_mode: RwLock::new(MidiChannelMode::default()),
            active_notes: Mutex::new(HashSet::new()),
            port_name: RwLock::new(None),
        })
    }

    /// List available MIDI output ports
    pub fn list_ports() -> Result<Vec<String>> {
        let midi_out = MidiOutput::new(CLIENT_NAME).context("MIDI initialization failed")?;
        Ok(midi_out
            .ports()
            .iter()
            .filter_map(|p| midi_out.port_name(p).ok())
            .collect())
    }

    /// Connect to a MIDI output port by name (partial match supported).
    /// Returns the full port name.
    pub fn connect(&self, port_name: &str) -> Result<String> {
        let (reply_tx, reply_rx) = bounded(1);
        self.send(MidiCommand::Connect {
            port_name: port_name.to_string(),
            reply: reply_tx,
        })?;
        let actual_name = reply_rx
            .recv_timeout(Duration::from_secs(5))
            .map_err(|_| anyhow!("MIDI thread did not answer"))??;

        *self.port_name.write().unwrap_or_else(|e| e.into_inner()) = Some(actual_name.clone());
        log::info!("MIDI output connected to {}", actual_name);
        Ok(actual_name)
    }

    pub fn disconnect(&self) -> Result<()> {
        self.send(MidiCommand::Disconnect)?;
        *self.port_name.write().unwrap_or_else(|e| e.into_inner()) = None;
        self.active_notes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.port_name
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    pub fn connected_port(&self) -> Option<String> {
        self.port_name
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set_channel_mode(&self, mode: MidiChannelMode) {
        *self.channel_mode.write().unwrap_or_else(|e| e.into_inner()) = mode;
    }

    pub fn channel_mode(&self) -> MidiChannelMode {
        *self.channel_mode.read().unwrap_or_else(|e| e.into_inner())
    }

    /// MIDI channel (0-15) for a track
    pub fn channel_for_track(&self, track: usize) -> u8 {
        match self.channel_mode() {
            MidiChannelMode::PerTrack => (track as u8) & 0x0F,
            MidiChannelMode::Mono(ch) => ch & 0x0F,
        }
    }

    pub fn note_on(&self, track: usize, note: u8, velocity: u8) -> Result<()> {
        let channel = self.channel_for_track(track);
        self.active_notes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((channel, note));
        self.send(MidiCommand::NoteOn {
            channel,
            note,
            velocity,
        })
    }

    pub fn note_off(&self, track: usize, note: u8) -> Result<()> {
        let channel = self.channel_for_track(track);
        self.active_notes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&(channel, note));
        self.send(MidiCommand::NoteOff { channel, note })
    }

    /// Note On now, Note Off after `duration_secs`
    pub fn play_note(&self, track: usize, note: u8, velocity: u8, duration_secs: f32) -> Result<()> {
        let duration = Duration::try_from_secs_f32(duration_secs.max(0.0))
            .map_err(|e| anyhow!("invalid note duration {}: {}", duration_secs, e))?;
        self.send(MidiCommand::Play {
            channel: self.channel_for_track(track),
            note,
            velocity,
            duration,
        })
    }

    /// Send All Notes Off on all channels (MIDI panic)
    pub fn panic_all(&self) -> Result<()> {
        for channel in 0..16u8 {
            self.send(MidiCommand::AllNotesOff { channel })?;
        }
        self.active_notes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        Ok(())
    }

    /// Notes held with `note_on` and not released
    pub fn active_notes(&self) -> usize {
        self.active_notes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    fn send(&self, cmd: MidiCommand) -> Result<()> {
        self.command_tx
            .send(cmd)
            .map_err(|_| anyhow!("MIDI output thread has stopped"))
    }
}

impl Drop for MidiOutputHandle {
    fn drop(&mut self) {
        let _ = self.command_tx.send(MidiCommand::Shutdown);
    }
}

/// What an incoming message did to the held-note set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputNote {
    On(u8),
    Off(u8),
}

/// Apply one raw MIDI message to `held`. Note On with velocity 0 counts as
/// Note Off; everything else is ignored.
pub fn apply_input_message(message: &[u8], held: &HeldNotes) -> Option<InputNote> {
    let (&status, data) = message.split_first()?;
    let note = *data.first()? & 0x7F;
    let velocity = data.get(1).copied().unwrap_or(0);
    let applied = match status & 0xF0 {
        0x90 if velocity > 0 => held.note_on(note).map(|_| InputNote::On(note)),
        0x90 | 0x80 => held.note_off(note).map(|_| InputNote::Off(note)),
        _ => return None,
    };
    applied.ok()
}

/// MIDI input connection feeding a held-note set
#[derive(Default)]
pub struct MidiInputHandle {
    connection: Option<MidiInputConnection<()>>,
    port_name: Option<String>,
}

impl MidiInputHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list_ports() -> Result<Vec<String>> {
        let midi_in = MidiInput::new(CLIENT_NAME).context("MIDI initialization failed")?;
        Ok(midi_in
            .ports()
            .iter()
            .filter_map(|p| midi_in.port_name(p).ok())
            .collect())
    }

    /// Connect to an input port by name (partial match); its notes update
    /// `held` until disconnected. Returns the full port name.
    pub fn connect(&mut self, port_name: &str, held: HeldNotes) -> Result<String> {
        self.disconnect();

        let midi_in = MidiInput::new(CLIENT_NAME).context("MIDI initialization failed")?;
        let ports = midi_in.ports();
        let port = ports
            .iter()
            .find(|p| {
                midi_in
                    .port_name(p)
                    .map(|name| name.contains(port_name))
                    .unwrap_or(false)
            })
            .ok_or_else(|| anyhow!("MIDI input '{}' not found", port_name))?;
        let actual_name = midi_in.port_name(port)?;

        let connection = midi_in
            .connect(
                port,
                "pulsar-in",
                move |_stamp, message, _| {
                    if let Some(change) = apply_input_message(message, &held) {
                        log::trace!("MIDI in {:?}", change);
                    }
                },
                (),
            )
            .map_err(|e| anyhow!("{}", e))?;

        log::info!("MIDI input connected to {}", actual_name);
        self.connection = Some(connection);
        self.port_name = Some(actual_name.clone());
        Ok(actual_name)
    }

    /// Returns false if nothing was connected
    pub fn disconnect(&mut self) -> bool {
        self.port_name = None;
        match self.connection.take() {
            Some(conn) => {
                conn.close();
                true
            }
            None => false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn connected_port(&self) -> Option<&str> {
        self.port_name.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_to_midi() {
        assert_eq!(note_to_midi(0, 4), 60);
        assert_eq!(note_to_midi(9, 4), 69);
        assert_eq!(note_to_midi(0, -1), 0);
        // G9 = 127, anything above clamps
        assert_eq!(note_to_midi(7, 9), 127);
        assert_eq!(note_to_midi(11, 9), 127);
    }

    #[test]
    fn test_parse_note() {
        assert_eq!(parse_note("60"), Some(60));
        assert_eq!(parse_note("C4"), Some(60));
        assert_eq!(parse_note("c#4"), Some(61));
        assert_eq!(parse_note("Eb2"), Some(39));
        assert_eq!(parse_note("A-1"), Some(9));
        assert_eq!(parse_note("Cb-1"), None);
        assert_eq!(parse_note("128"), None);
        assert_eq!(parse_note("H2"), None);
        assert_eq!(parse_note(""), None);
    }

    #[test]
    fn test_note_name() {
        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(61), "C#4");
        assert_eq!(note_name(0), "C-1");
        for n in [0u8, 37, 60, 99, 127] {
            assert_eq!(parse_note(&note_name(n)), Some(n));
        }
    }

    #[test]
    fn test_channel_mode_per_track() {
        let handle = MidiOutputHandle::new().unwrap();
        handle.set_channel_mode(MidiChannelMode::PerTrack);
        assert_eq!(handle.channel_for_track(0), 0);
        assert_eq!(handle.channel_for_track(2), 2);
        assert_eq!(handle.channel_for_track(16), 0);
    }

    #[test]
    fn test_channel_mode_mono() {
        let handle = MidiOutputHandle::new().unwrap();
        handle.set_channel_mode(MidiChannelMode::Mono(5));
        assert_eq!(handle.channel_for_track(0), 5);
        assert_eq!(handle.channel_for_track(2), 5);
    }

    #[test]
    fn test_unconnected_output_accepts_notes() {
        let handle = MidiOutputHandle::new().unwrap();
        assert!(!handle.is_connected());
        handle.note_on(0, 60, 100).unwrap();
        assert_eq!(handle.active_notes(), 1);
        handle.play_note(1, 64, 90, 0.01).unwrap();
        handle.panic_all().unwrap();
        assert_eq!(handle.active_notes(), 0);
    }

    #[test]
    fn test_input_messages_update_held_notes() {
        let held = HeldNotes::new();
        assert_eq!(
            apply_input_message(&[0x90, 60, 100], &held),
            Some(InputNote::On(60))
        );
        assert_eq!(
            apply_input_message(&[0x93, 64, 1], &held),
            Some(InputNote::On(64))
        );
        assert_eq!(held.snapshot(), vec![60, 64]);

        // velocity-zero note on is a release
        assert_eq!(
            apply_input_message(&[0x90, 60, 0], &held),
            Some(InputNote::Off(60))
        );
        assert_eq!(
            apply_input_message(&[0x80, 64, 40], &held),
            Some(InputNote::Off(64))
        );
        assert!(held.is_empty());

        // control change, clock, truncated messages
        assert_eq!(apply_input_message(&[0xB0, 1, 64], &held), None);
        assert_eq!(apply_input_message(&[0xF8], &held), None);
        assert_eq!(apply_input_message(&[], &held), None);
        assert!(held.is_empty());
    }
}
