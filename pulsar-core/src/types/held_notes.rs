use crate::error::{PulsarError, Result};
use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

/// Set of currently held pitches, shared between whoever receives note-on /
/// note-off (MIDI input, the REPL) and the arpeggiator.
///
/// Cloning gives another handle onto the same set. The arpeggiator only ever
/// reads it through [`HeldNotes::snapshot`], once per tick.
#[derive(Debug, Clone, Default)]
pub struct HeldNotes {
    notes: Arc<RwLock<BTreeSet<u8>>>,
}

impl HeldNotes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pitch. Returns whether it was newly inserted.
    pub fn note_on(&self, pitch: u8) -> Result<bool> {
        check_pitch(pitch)?;
        Ok(self.write().insert(pitch))
    }

    /// Remove a pitch. Returns whether it was held.
    pub fn note_off(&self, pitch: u8) -> Result<bool> {
        check_pitch(pitch)?;
        Ok(self.write().remove(&pitch))
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    /// Held pitches, ascending
    pub fn snapshot(&self) -> Vec<u8> {
        self.notes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.notes.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, pitch: u8) -> bool {
        self.notes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&pitch)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeSet<u8>> {
        self.notes.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn check_pitch(pitch: u8) -> Result<()> {
    if pitch > 127 {
        return Err(PulsarError::invalid(
            "pitch",
            format!("{} is outside 0-127", pitch),
        ));
    }
    Ok(())
}
