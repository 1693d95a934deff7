pub mod console_sink;
pub mod gate;
pub mod sink;

pub use console_sink::ConsoleSink;
pub use gate::{AlertGate, AlertMessage, GateState};
pub use sink::{NotificationSink, PlaybackDone};
