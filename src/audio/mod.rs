pub mod clock;
pub mod dispatcher;
pub mod midi;
pub mod runner;
pub mod sink;

pub use clock::{Clock, ClockError};
pub use dispatcher::{DispatcherHandle, TriggerDispatcher};
pub use midi::{MidiInputHandle, MidiOutputHandle};
pub use runner::{EngineRunner, StepEvent};
pub use sink::{LogSink, TrackSink};
