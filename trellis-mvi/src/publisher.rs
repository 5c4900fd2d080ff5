/// Decides what, if anything, is published for a state transition.
///
/// Called with the state that was replaced and the state that replaced it,
/// after the state lock is released and before the next transition starts.
pub trait StatePublisher<S>: Send + Sync + 'static {
    type Output: Send + 'static;

    fn publish(&self, old_state: &S, new_state: &S) -> Option<Self::Output>;
}

/// One observed transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateUpdate<S> {
    pub old_state: S,
    pub new_state: S,
}

/// Publishes a [`StateUpdate`] only when the new state differs from the old.
#[derive(Clone, Copy, Debug, Default)]
pub struct DistinctUpdates;

impl<S> StatePublisher<S> for DistinctUpdates
where
    S: Clone + PartialEq + Send + 'static,
{
    type Output = StateUpdate<S>;

    fn publish(&self, old_state: &S, new_state: &S) -> Option<Self::Output> {
        if old_state == new_state {
            log::trace!("state unchanged, nothing published");
            return None;
        }
        Some(StateUpdate {
            old_state: old_state.clone(),
            new_state: new_state.clone(),
        })
    }
}

/// Publishes every new state, changed or not.
#[derive(Clone, Copy, Debug, Default)]
pub struct EveryState;

impl<S> StatePublisher<S> for EveryState
where
    S: Clone + Send + 'static,
{
    type Output = S;

    fn publish(&self, _old_state: &S, new_state: &S) -> Option<Self::Output> {
        Some(new_state.clone())
    }
}
