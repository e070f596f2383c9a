//! Euclidean onset distribution and rotation.

use num_rational::Ratio;
use num_traits::Zero;
use std::fmt;

/// A fixed-length onset pattern. `true` = onset at that step.
///
/// Always holds at least one step.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pattern {
    cells: Vec<bool>,
}

impl Pattern {
    /// An all-rest pattern of `steps` steps (at least one).
    pub fn silent(steps: usize) -> Self {
        Self {
            cells: vec![false; steps.max(1)],
        }
    }

    /// Build a pattern from explicit cells. Returns `None` for an empty slice.
    pub fn from_cells(cells: Vec<bool>) -> Option<Self> {
        if cells.is_empty() {
            None
        } else {
            Some(Self { cells })
        }
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Patterns are never empty; provided for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Onset at `step`? Out-of-range steps are rests.
    pub fn is_active(&self, step: usize) -> bool {
        self.cells.get(step).copied().unwrap_or(false)
    }

    /// Number of onsets
    pub fn pulses(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    /// Indices of every onset, ascending
    pub fn onsets(&self) -> Vec<usize> {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(i, &c)| c.then_some(i))
            .collect()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.cells
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &cell in &self.cells {
            write!(f, "{}", if cell { 'x' } else { '.' })?;
        }
        Ok(())
    }
}

/// Distribute `pulses` onsets as evenly as possible across `steps` slots.
///
/// `steps` is clamped to at least 1 and `pulses` into `[0, steps]`. Step `i`
/// is an onset when the bucket `pulses/steps * (i+1)` crosses an integer
/// boundary. The buckets are exact rationals, so no float rounding can
/// move an onset. The result is anchored so that the first onset sits on
/// step 0, which gives the canonical Euclidean patterns
/// (`distribute(5, 16)` is `x..x..x..x..x...`).
pub fn distribute(pulses: usize, steps: usize) -> Pattern {
    let steps = steps.max(1);
    let pulses = pulses.min(steps);
    if pulses.is_zero() {
        return Pattern::silent(steps);
    }

    let density = Ratio::new(pulses, steps);
    let mut previous = 0usize;
    let mut cells = Vec::with_capacity(steps);
    for i in 0..steps {
        let bucket = (density * Ratio::from_integer(i + 1)).floor().to_integer();
        cells.push(bucket > previous);
        previous = bucket;
    }

    let first_onset = cells.iter().position(|&c| c).unwrap_or(0);
    cells.rotate_left(first_onset);
    Pattern { cells }
}

/// Cyclic left rotation by `offset mod len`.
pub fn rotate(pattern: &Pattern, offset: usize) -> Pattern {
    let mut cells = pattern.cells.clone();
    let len = cells.len();
    if len > 0 {
        cells.rotate_left(offset % len);
    }
    Pattern { cells }
}
