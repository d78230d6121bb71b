//! Builder for declaring a machine by name.

use crate::builder::error::BuildError;
use crate::core::{StateChange, Veto};
use crate::machine::{Machine, MachineError, State, Transition};
use std::collections::HashMap;

/// Source name that stands for [`State::ANY`].
pub const WILDCARD: &str = "*";

struct PendingTransition {
    name: String,
    from: Vec<String>,
    to: String,
}

/// Builder for declaring states and transitions by name with a fluent API.
///
/// Names are resolved when [`build`](MachineBuilder::build) is called, so
/// transitions may reference states declared later in the chain.
pub struct MachineBuilder<P = ()> {
    name: String,
    states: Vec<String>,
    transitions: Vec<PendingTransition>,
    vetoes: Vec<(String, Veto<P>)>,
    initial: Option<String>,
}

impl<P: 'static> MachineBuilder<P> {
    /// Create a new builder for a machine called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            states: Vec::new(),
            transitions: Vec::new(),
            vetoes: Vec::new(),
            initial: None,
        }
    }

    /// Declare a state.
    pub fn state(mut self, name: impl Into<String>) -> Self {
        self.states.push(name.into());
        self
    }

    /// Declare several states at once.
    pub fn states<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.states.extend(names.into_iter().map(Into::into));
        self
    }

    /// Declare a transition. Use [`WILDCARD`] in `from` for "any state".
    pub fn transition(
        mut self,
        name: impl Into<String>,
        from: &[&str],
        to: impl Into<String>,
    ) -> Self {
        self.transitions.push(PendingTransition {
            name: name.into(),
            from: from.iter().map(|s| (*s).to_owned()).collect(),
            to: to.into(),
        });
        self
    }

    /// Attach a veto to a transition declared in this builder.
    pub fn cancel_if<F>(mut self, transition: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&StateChange<P>) -> bool + Send + Sync + 'static,
    {
        self.vetoes.push((transition.into(), Veto::new(predicate)));
        self
    }

    /// Set the initial state (required).
    pub fn initial(mut self, name: impl Into<String>) -> Self {
        self.initial = Some(name.into());
        self
    }

    /// Build the machine without starting it.
    /// Returns an error if a name is missing, unknown or duplicated.
    pub fn build(self) -> Result<Blueprint<P>, BuildError<P>> {
        let initial = self.initial.ok_or(BuildError::MissingInitialState)?;
        let machine = Machine::new(self.name);

        let mut states = HashMap::new();
        for name in self.states {
            if states.contains_key(&name) {
                return Err(BuildError::DuplicateState(name));
            }
            let state = machine.new_state(name.clone())?;
            states.insert(name, state);
        }

        let mut transitions = HashMap::new();
        for pending in self.transitions {
            if transitions.contains_key(&pending.name) {
                return Err(BuildError::DuplicateTransition(pending.name));
            }
            let referenced_by = format!("transition '{}'", pending.name);
            let from = pending
                .from
                .iter()
                .map(|name| resolve_source(&states, name, &referenced_by))
                .collect::<Result<Vec<_>, _>>()?;
            let to = resolve(&states, &pending.to, &referenced_by)?;

            let transition = machine.new_transition(pending.name.clone(), &from, &to)?;
            transitions.insert(pending.name, transition);
        }

        for (name, veto) in self.vetoes {
            let transition = transitions
                .get(&name)
                .ok_or_else(|| BuildError::UnknownTransition(name.clone()))?;
            transition.add_veto(veto);
        }

        let initial = resolve(&states, &initial, "the initial state")?;

        Ok(Blueprint {
            machine,
            states,
            transitions,
            initial,
        })
    }
}

fn resolve<P>(
    states: &HashMap<String, State<P>>,
    name: &str,
    referenced_by: &str,
) -> Result<State<P>, BuildError<P>> {
    states
        .get(name)
        .cloned()
        .ok_or_else(|| BuildError::UnknownState {
            name: name.to_owned(),
            referenced_by: referenced_by.to_owned(),
        })
}

fn resolve_source<P>(
    states: &HashMap<String, State<P>>,
    name: &str,
    referenced_by: &str,
) -> Result<State<P>, BuildError<P>> {
    if name == WILDCARD {
        return Ok(State::ANY);
    }
    resolve(states, name, referenced_by)
}

/// A built machine together with its states and transitions, indexed by
/// name.
pub struct Blueprint<P = ()> {
    machine: Machine<P>,
    states: HashMap<String, State<P>>,
    transitions: HashMap<String, Transition<P>>,
    initial: State<P>,
}

impl<P: 'static> Blueprint<P> {
    pub fn machine(&self) -> &Machine<P> {
        &self.machine
    }

    pub fn state(&self, name: &str) -> Option<&State<P>> {
        self.states.get(name)
    }

    pub fn transition(&self, name: &str) -> Option<&Transition<P>> {
        self.transitions.get(name)
    }

    pub fn initial(&self) -> &State<P> {
        &self.initial
    }

    /// Start the machine in the configured initial state.
    pub fn start(&self) -> Result<(), MachineError<P>> {
        self.machine.start(&self.initial)
    }

    /// Invoke a transition by name.
    ///
    /// Returns `None` if no transition has that name.
    pub fn invoke(
        &self,
        name: &str,
        payload: Option<P>,
    ) -> Option<Result<bool, MachineError<P>>> {
        self.transitions.get(name).map(|t| t.invoke(payload))
    }
}
