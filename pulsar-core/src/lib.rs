//! # Pulsar Core
//!
//! Thread-free core of the Pulsar rhythm engines. Provides the pattern math
//! (Euclidean distribution, rotation, scale quantisation), the shared data
//! model and the three tick-driven engines, without any clock or MIDI
//! dependency.
//!
//! Engines never own a timer: something else calls [`Engine::tick`] at the
//! engine's [`Engine::period`]. The `pulsar` crate drives them from soft
//! clock threads; tests drive them from a plain loop.
//!
//! ## Features
//!
//! - **serde**: Serialize/deserialize the engine configuration types
//!
//! ## Example
//!
//! ```
//! use pulsar_core::engine::{Engine, EuclideanEngine};
//! use pulsar_core::config::EuclideanConfig;
//!
//! let mut engine = EuclideanEngine::new(EuclideanConfig {
//!     pulses: 5,
//!     steps: 16,
//!     ..Default::default()
//! })?;
//! engine.start();
//! let outcome = engine.tick();
//! assert_eq!(outcome.steps[0].step, 0);
//! assert!(!outcome.is_silent());
//! # Ok::<(), pulsar_core::PulsarError>(())
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod pattern;
pub mod types;

// Re-export commonly used types
pub use config::{ArpeggiatorConfig, EuclideanConfig, PatternMode, RingConfig, Traversal};
pub use engine::{ArpeggiatorEngine, Engine, EuclideanEngine, RingSequencerEngine, TickOutcome};
pub use error::{PulsarError, Result};
pub use pattern::{distribute, quantize_to_scale, rotate, Pattern, Scale};
pub use types::{HeldNotes, ScheduledTrigger, Transport, TriggerEvent, TriggerSink};
