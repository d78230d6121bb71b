//! Observer that records a machine's changes into a [`StateHistory`].

use super::log::{ChangeRecord, StateHistory};
use crate::core::Subscription;
use crate::machine::Machine;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;

/// Records every change of one machine, by state name, with a timestamp.
///
/// The recorder subscribes to the machine-wide channel, so it sees each
/// change after the states' enter and leave subscribers. It holds no
/// reference to the machine itself.
///
/// # Example
///
/// ```rust
/// use statekit::{HistoryRecorder, Machine};
///
/// let machine: Machine = Machine::new("job");
/// let queued = machine.new_state("Queued").unwrap();
/// let running = machine.new_state("Running").unwrap();
/// let run = machine.new_transition("run", &[queued.clone()], &running).unwrap();
///
/// let recorder = HistoryRecorder::attach(&machine);
/// machine.start(&queued).unwrap();
/// run.invoke(None).unwrap();
///
/// assert_eq!(recorder.get_path(), vec!["none", "Queued", "Running"]);
/// ```
pub struct HistoryRecorder {
    history: Arc<Mutex<StateHistory>>,
    subscription: Subscription,
}

impl HistoryRecorder {
    pub fn attach<P: 'static>(machine: &Machine<P>) -> Self {
        let history = Arc::new(Mutex::new(StateHistory::new()));
        let sink = Arc::clone(&history);
        let subscription = machine.on_change(move |change| {
            let mut history = sink.lock();
            let sequence = history.len() as u64 + 1;
            history.push(ChangeRecord {
                sequence,
                from: change.from.name().to_owned(),
                to: change.to.name().to_owned(),
                timestamp: Utc::now(),
            });
        });

        Self {
            history,
            subscription,
        }
    }

    /// Copy of everything recorded so far.
    pub fn history(&self) -> StateHistory {
        self.history.lock().clone()
    }

    pub fn get_path(&self) -> Vec<String> {
        self.history
            .lock()
            .get_path()
            .into_iter()
            .map(str::to_owned)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.history.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.lock().is_empty()
    }

    /// Forget recorded changes. Sequence numbers restart at 1.
    pub fn clear(&self) {
        *self.history.lock() = StateHistory::new();
    }

    /// Stop recording. Already recorded changes are kept.
    pub fn detach(&self) {
        self.subscription.unsubscribe();
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.is_active()
    }
}
