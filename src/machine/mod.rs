//! The runtime: machines, their states and their transitions.
//!
//! - **Machine**: owns the current state, the start lock and the
//!   machine-wide change channel
//! - **State**: observable point in the state space with enter and leave
//!   channels
//! - **Transition**: named edge with source legality and veto checks
//!
//! All three are reference handles compared by identity.

mod error;
#[allow(clippy::module_inception)]
mod machine;
mod snapshot;
mod state;
mod transition;

pub use error::{MachineError, Result};
pub use machine::{Machine, MachineId, NONE_STATE_NAME};
pub use snapshot::{MachineSnapshot, StateSummary, TransitionSummary};
pub use state::State;
pub use transition::Transition;
