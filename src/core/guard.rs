//! Cancellation predicates evaluated at transition time.
//!
//! A veto is a boolean function over the candidate [`StateChange`]. When it
//! returns `true` the transition is cancelled for this invocation: nothing
//! changes and nothing is notified. A veto is runtime policy, not structure,
//! so it may be registered before or after the machine starts.

use super::change::StateChange;
use std::fmt;
use std::sync::Arc;

/// Predicate that cancels a transition when it returns `true`.
///
/// # Example
///
/// ```rust
/// use statekit::{Machine, Veto};
///
/// let machine: Machine<u32> = Machine::new("lock");
/// let locked = machine.new_state("Locked").unwrap();
/// let unlocked = machine.new_state("Unlocked").unwrap();
/// let unlock = machine.new_transition("unlock", &[locked.clone()], &unlocked).unwrap();
///
/// // Wrong code vetoes the transition.
/// unlock.cancel_if(|change| change.payload != Some(1234));
///
/// machine.start(&locked).unwrap();
/// assert!(!unlock.invoke(Some(1)).unwrap());
/// assert!(locked.is_active());
/// assert!(unlock.invoke(Some(1234)).unwrap());
/// assert!(unlocked.is_active());
/// ```
pub struct Veto<P> {
    predicate: Arc<dyn Fn(&StateChange<P>) -> bool + Send + Sync>,
}

impl<P> Veto<P> {
    /// Create a veto from a predicate.
    ///
    /// The predicate runs inside the machine's dispatch, while the
    /// transition is being validated. Invoking a transition of the same
    /// machine from it fails with `MachineError::Reentrant`.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&StateChange<P>) -> bool + Send + Sync + 'static,
    {
        Veto {
            predicate: Arc::new(predicate),
        }
    }

    /// Returns `true` if this veto cancels the given change.
    pub fn check(&self, change: &StateChange<P>) -> bool {
        (self.predicate)(change)
    }
}

impl<P> Clone for Veto<P> {
    fn clone(&self) -> Self {
        Self {
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl<P> fmt::Debug for Veto<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Veto(..)")
    }
}

/// Index of the first veto that cancels `change`, if any.
///
/// Vetoes run in order and evaluation stops at the first one returning `true`.
pub(crate) fn first_veto<P>(vetoes: &[Veto<P>], change: &StateChange<P>) -> Option<usize> {
    vetoes.iter().position(|veto| veto.check(change))
}
