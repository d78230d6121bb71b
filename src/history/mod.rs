//! Opt-in, in-memory record of the changes a machine goes through.
//!
//! History is diagnostic. It is never consulted by the runtime and is not
//! a persistence layer.

mod log;
mod recorder;

pub use log::{ChangeRecord, StateHistory};
pub use recorder::HistoryRecorder;
