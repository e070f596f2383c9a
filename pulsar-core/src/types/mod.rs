// pulsar-core/src/types/mod.rs

pub mod held_notes;
pub mod transport;
pub mod trigger;

pub use held_notes::HeldNotes;
pub use transport::{tick_period, Transport};
pub use trigger::{CollectingSink, ScheduledTrigger, TriggerEvent, TriggerSink};
