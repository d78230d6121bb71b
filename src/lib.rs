//! Statekit: an embeddable finite state machine runtime
//!
//! A host declares named states and named, directed transitions on a
//! [`Machine`], starts it in an initial state and then drives it by
//! invoking transitions. Observers are told when states are entered and
//! left and when transitions run.
//!
//! # Core Concepts
//!
//! - **Machine**: owns the current state and locks its structure on start
//! - **State**: observable point with enter and leave channels
//! - **Transition**: edge from one or more sources to one target, checked
//!   for legality and cancellable by vetoes
//! - **StateChange**: the `(from, to, payload)` record every observer gets
//! - **Wildcard**: [`State::ANY`] in a source list means "from any state"
//!
//! Transitions run synchronously. When `invoke` returns, every subscriber
//! has been called, in this order: leave of the old state, enter of the new
//! state, the machine-wide channel, the transition's own channel.
//!
//! # Example
//!
//! ```rust
//! use statekit::{Machine, MachineError, State};
//! use std::sync::{Arc, Mutex};
//!
//! let machine: Machine<&str> = Machine::new("door");
//! let open = machine.new_state("Open").unwrap();
//! let closed = machine.new_state("Closed").unwrap();
//! let broken = machine.new_state("Broken").unwrap();
//!
//! let close = machine.new_transition("close", &[open.clone()], &closed).unwrap();
//! let smash = machine.new_transition("break", &[State::ANY], &broken).unwrap();
//!
//! let log = Arc::new(Mutex::new(Vec::new()));
//! let sink = log.clone();
//! closed.on_enter(move |change| {
//!     sink.lock().unwrap().push(format!("closed {:?}", change.payload));
//! });
//!
//! machine.start(&open).unwrap();
//! assert!(close.invoke(Some("gently")).unwrap());
//!
//! // Closed is not a source of `close`.
//! assert!(matches!(
//!     close.invoke(None),
//!     Err(MachineError::IllegalTransition { .. })
//! ));
//!
//! assert!(smash.invoke(None).unwrap());
//! assert!(broken.is_active());
//! assert_eq!(*log.lock().unwrap(), vec!["closed Some(\"gently\")"]);
//! ```

pub mod builder;
pub mod core;
pub mod history;
pub mod machine;
pub mod teardown;

// Re-export commonly used types
pub use builder::{BuildError, MachineBuilder};
pub use crate::core::{StateChange, Subscription, SubscriptionId, Veto};
pub use history::HistoryRecorder;
pub use machine::{
    Machine, MachineError, MachineId, MachineSnapshot, Result, State, Transition,
    NONE_STATE_NAME,
};
pub use teardown::{Dispose, Disposer};
