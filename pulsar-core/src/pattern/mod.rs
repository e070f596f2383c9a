//! Pattern math shared by every engine
//!
//! Pure, stateless functions: Euclidean distribution, cyclic rotation,
//! scale quantisation and the triangular octave fold. Nothing in here knows
//! about time.

mod euclidean;
mod scale;

#[cfg(test)]
mod tests;

// Re-export public types
pub use euclidean::{distribute, rotate, Pattern};
pub use scale::{octave_fold, quantize_to_scale, Scale};
