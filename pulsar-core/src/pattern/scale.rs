//! Scale tables and pitch mapping.

/// Scales available to the ring sequencer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Scale {
    #[default]
    Major,
    Minor,
    Pentatonic,
    MinorPentatonic,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    HarmonicMinor,
    Blues,
    WholeTone,
    Chromatic,
}

impl Scale {
    pub const ALL: [Scale; 12] = [
        Scale::Major,
        Scale::Minor,
        Scale::Pentatonic,
        Scale::MinorPentatonic,
        Scale::Dorian,
        Scale::Phrygian,
        Scale::Lydian,
        Scale::Mixolydian,
        Scale::HarmonicMinor,
        Scale::Blues,
        Scale::WholeTone,
        Scale::Chromatic,
    ];

    /// Semitone offsets from the root, ascending, all below 12
    pub fn intervals(&self) -> &'static [u8] {
        match self {
            Scale::Major => &[0, 2, 4, 5, 7, 9, 11],
            Scale::Minor => &[0, 2, 3, 5, 7, 8, 10],
            Scale::Pentatonic => &[0, 2, 4, 7, 9],
            Scale::MinorPentatonic => &[0, 3, 5, 7, 10],
            Scale::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            Scale::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            Scale::Lydian => &[0, 2, 4, 6, 7, 9, 11],
            Scale::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            Scale::HarmonicMinor => &[0, 2, 3, 5, 7, 8, 11],
            Scale::Blues => &[0, 3, 5, 6, 7, 10],
            Scale::WholeTone => &[0, 2, 4, 6, 8, 10],
            Scale::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
        }
    }

    /// Parse a scale from its name (case-insensitive)
    pub fn from_name(s: &str) -> Option<Scale> {
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "major" | "ionian" => Some(Scale::Major),
            "minor" | "aeolian" => Some(Scale::Minor),
            "pentatonic" | "major_pentatonic" => Some(Scale::Pentatonic),
            "minor_pentatonic" => Some(Scale::MinorPentatonic),
            "dorian" => Some(Scale::Dorian),
            "phrygian" => Some(Scale::Phrygian),
            "lydian" => Some(Scale::Lydian),
            "mixolydian" => Some(Scale::Mixolydian),
            "harmonic_minor" => Some(Scale::HarmonicMinor),
            "blues" => Some(Scale::Blues),
            "whole_tone" | "wholetone" => Some(Scale::WholeTone),
            "chromatic" => Some(Scale::Chromatic),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Scale::Major => "major",
            Scale::Minor => "minor",
            Scale::Pentatonic => "pentatonic",
            Scale::MinorPentatonic => "minor_pentatonic",
            Scale::Dorian => "dorian",
            Scale::Phrygian => "phrygian",
            Scale::Lydian => "lydian",
            Scale::Mixolydian => "mixolydian",
            Scale::HarmonicMinor => "harmonic_minor",
            Scale::Blues => "blues",
            Scale::WholeTone => "whole_tone",
            Scale::Chromatic => "chromatic",
        }
    }
}

/// Map a ring index onto a scale degree above `root_note`.
///
/// `root + intervals[r mod len] + 12 * (r / len)`, clamped to 0..=127. For
/// ascending interval sets the pitch never decreases as `ring_index` grows.
/// An empty interval set maps everything to the root.
pub fn quantize_to_scale(ring_index: usize, root_note: u8, intervals: &[u8]) -> u8 {
    if intervals.is_empty() {
        return root_note.min(127);
    }
    let degree = intervals[ring_index % intervals.len()] as i64;
    let octave_shift = (ring_index / intervals.len()) as i64 * 12;
    (root_note as i64 + degree + octave_shift).clamp(0, 127) as u8
}

/// Triangular octave sweep, in semitones.
///
/// The position `pattern_index mod 2R` climbs one octave per step through
/// `R` positions and then walks back down: for R = 3 the shifts are
/// 0, 12, 24, 24, 12, 0. R of 0 or 1 never shifts.
pub fn octave_fold(pattern_index: usize, octave_range: u8) -> i32 {
    let range = octave_range.max(1) as usize;
    let position = pattern_index % (2 * range);
    let octave = if position < range {
        position
    } else {
        2 * range - 1 - position
    };
    octave as i32 * 12
}
