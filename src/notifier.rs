use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::messages::StateSnapshot;
use crate::selection::SelectionController;
use crate::store::ParameterStore;

/// Watches the store and selection state and reports a fresh snapshot only
/// when something actually changed since the last broadcast.
pub struct ChangeNotifier {
    store: Arc<Mutex<ParameterStore>>,
    selection: Arc<Mutex<SelectionController>>,
    last: Option<StateSnapshot>,
}

impl ChangeNotifier {
    pub fn new(
        store: Arc<Mutex<ParameterStore>>,
        selection: Arc<Mutex<SelectionController>>,
    ) -> Self {
        Self {
            store,
            selection,
            last: None,
        }
    }

    /// Takes a consistent deep copy under the locks and compares it by value
    /// against the previous broadcast. The first poll always reports.
    pub fn poll_and_diff(&mut self) -> Option<StateSnapshot> {
        let synths = self.store.lock().snapshot();
        let selection_mode = self.selection.lock().snapshot();
        let current = StateSnapshot {
            synths,
            selection_mode,
        };
        if self.last.as_ref() == Some(&current) {
            return None;
        }
        self.last = Some(current.clone());
        Some(current)
    }
}

/// Runs the notifier on its own timer until `shutdown` flips, pushing changed
/// snapshots to `tx`. Returns when the receiver hangs up or shutdown is
/// requested.
pub fn run_notifier(
    mut notifier: ChangeNotifier,
    tx: Sender<StateSnapshot>,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
) {
    while !shutdown.load(Ordering::Relaxed) {
        if let Some(snapshot) = notifier.poll_and_diff() {
            if tx.send(snapshot).is_err() {
                log::debug!("Snapshot subscriber gone, notifier exiting");
                return;
            }
        }
        std::thread::sleep(interval);
    }
}
