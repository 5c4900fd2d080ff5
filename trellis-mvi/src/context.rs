use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::channel::{CommandSender, Commands};

/// Shared current-state cell.
///
/// `state` guards the value itself. `turn` is held for a whole transition
/// (reduce, install, publish) so that transitions from the message loop and
/// the aside loop never interleave and outputs leave in state order.
pub(crate) struct StateCell<S> {
    state: Mutex<S>,
    turn: Mutex<()>,
}

impl<S> StateCell<S> {
    pub(crate) fn new(initial: S) -> Self {
        Self {
            state: Mutex::new(initial),
            turn: Mutex::new(()),
        }
    }

    pub(crate) async fn lock_state(&self) -> MutexGuard<'_, S> {
        self.state.lock().await
    }

    pub(crate) async fn begin_transition(&self) -> MutexGuard<'_, ()> {
        self.turn.lock().await
    }
}

/// Read access to the machine state, handed to message processors and aside
/// command sources.
pub struct StateContext<S> {
    cell: Arc<StateCell<S>>,
    command_capacity: Option<usize>,
}

impl<S> StateContext<S> {
    pub(crate) fn new(
        cell: Arc<StateCell<S>>,
        command_capacity: Option<usize>,
    ) -> Self {
        Self {
            cell,
            command_capacity,
        }
    }

    /// Copy of the current state, read under the state lock.
    pub async fn current_state(&self) -> S
    where
        S: Clone,
    {
        self.cell.lock_state().await.clone()
    }

    /// Run `read` against the current state without cloning it.
    pub async fn with_state<R>(&self, read: impl FnOnce(&S) -> R) -> R {
        let state = self.cell.lock_state().await;
        read(&state)
    }

    /// Command channel sized by the machine's
    /// [`command_capacity`](crate::MachineOptions::command_capacity).
    pub fn command_channel<C>(&self) -> (CommandSender<C>, Commands<C>) {
        Commands::channel(self.command_capacity)
    }
}

impl<S> Clone for StateContext<S> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
            command_capacity: self.command_capacity,
        }
    }
}

impl<S> std::fmt::Debug for StateContext<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateContext")
            .field("command_capacity", &self.command_capacity)
            .finish_non_exhaustive()
    }
}
