//! Build errors for the declaration builder.

use crate::machine::MachineError;
use thiserror::Error;

/// Errors that can occur when building a machine from names.
#[derive(Debug, Error)]
pub enum BuildError<P = ()> {
    #[error("Initial state not specified. Call .initial(name) before .build()")]
    MissingInitialState,

    #[error("State '{0}' declared more than once")]
    DuplicateState(String),

    #[error("Transition '{0}' declared more than once")]
    DuplicateTransition(String),

    #[error("Unknown state '{name}' referenced by {referenced_by}")]
    UnknownState { name: String, referenced_by: String },

    #[error("Unknown transition '{0}' referenced by cancel_if")]
    UnknownTransition(String),

    #[error(transparent)]
    Machine(#[from] MachineError<P>),
}
