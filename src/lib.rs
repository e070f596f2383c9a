//! # Pulsar
//!
//! Pulsar runs three generative rhythm engines from an interactive shell:
//! a Euclidean gate, a concentric ring sequencer and a probabilistic
//! arpeggiator. The engines themselves live in `pulsar-core`; this crate
//! drives them from real-time clocks and sends their notes to MIDI.
//!
//! ## Modules
//!
//! - `audio`: the per-engine clock, the jitter dispatcher, trigger sinks and
//!   the MIDI input/output threads.
//! - `rack`: the three engines wired together with a shared held-note set.
//! - `preset`: JSON presets, loaded at startup or hot-reloaded by `watch`.
//! - `commands`: the command registry behind the shell.
//! - `repl`: the Read-Eval-Print Loop itself.

pub mod audio;
pub mod commands;
pub mod preset;
pub mod rack;
pub mod repl;

pub use crate::preset::Preset;
pub use crate::rack::{Rack, Target};

/// Log filter used when `RUST_LOG` is unset. Notes played without a MIDI
/// port go to the log at `info`, so this crate logs at `info`.
pub const DEFAULT_LOG_FILTER: &str = "warn,pulsar=info";
