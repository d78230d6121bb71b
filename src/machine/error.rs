//! Errors raised by machine declaration, start and transition invocation.

use super::{State, Transition};
use std::fmt;
use thiserror::Error;

/// Hard failures of the runtime.
///
/// A vetoed transition is not an error: [`Transition::invoke`] reports it
/// as `Ok(false)`.
#[derive(Error)]
pub enum MachineError<P = ()> {
    /// A state or transition was declared after the machine started.
    #[error("cannot {operation} on machine '{machine}' after it has started")]
    IllegalMutation {
        machine: String,
        operation: String,
    },

    /// `start` was called a second time.
    #[error("machine '{machine}' has already been started")]
    AlreadyStarted { machine: String },

    /// An argument cannot be used where it was passed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The current state is not a legal source of the transition.
    #[error(
        "transition '{}' is not legal from '{}' to '{}'",
        .transition.name(),
        .from.name(),
        .to.name()
    )]
    IllegalTransition {
        transition: Transition<P>,
        from: State<P>,
        to: State<P>,
    },

    /// A transition was invoked before its machine started.
    #[error("transition '{transition}' invoked before machine '{machine}' was started")]
    NotStarted { transition: String, machine: String },

    /// A transition was invoked from a handler or veto while its machine was
    /// still dispatching another change.
    #[error("transition '{transition}' invoked while machine '{machine}' is dispatching a change")]
    Reentrant { transition: String, machine: String },

    /// The machine owning a state or transition has been dropped.
    #[error("'{0}' outlived the machine that declared it")]
    Detached(String),
}

impl<P> MachineError<P> {
    /// True for [`MachineError::IllegalTransition`].
    pub fn is_illegal_transition(&self) -> bool {
        matches!(self, Self::IllegalTransition { .. })
    }
}

impl<P> fmt::Debug for MachineError<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IllegalMutation { machine, operation } => f
                .debug_struct("IllegalMutation")
                .field("machine", machine)
                .field("operation", operation)
                .finish(),
            Self::AlreadyStarted { machine } => f
                .debug_struct("AlreadyStarted")
                .field("machine", machine)
                .finish(),
            Self::InvalidArgument(message) => {
                f.debug_tuple("InvalidArgument").field(message).finish()
            }
            Self::IllegalTransition {
                transition,
                from,
                to,
            } => f
                .debug_struct("IllegalTransition")
                .field("transition", &transition.name())
                .field("from", &from.name())
                .field("to", &to.name())
                .finish(),
            Self::NotStarted {
                transition,
                machine,
            } => f
                .debug_struct("NotStarted")
                .field("transition", transition)
                .field("machine", machine)
                .finish(),
            Self::Reentrant {
                transition,
                machine,
            } => f
                .debug_struct("Reentrant")
                .field("transition", transition)
                .field("machine", machine)
                .finish(),
            Self::Detached(name) => f.debug_tuple("Detached").field(name).finish(),
        }
    }
}

/// Result type for machine operations.
pub type Result<T, P = ()> = std::result::Result<T, MachineError<P>>;
