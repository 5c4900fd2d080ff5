use std::sync::Arc;

use crate::channel::{AsideSender, Commands, SideEffects};
use crate::context::StateContext;

/// Computes the next state for each command.
///
/// `next_state` runs while the state lock is held, so it sees the value the
/// result will replace and must not wait on the machine itself.
pub trait StateReducer<C, S>: Send + Sync + 'static {
    fn initial_state(&self) -> S;

    fn next_state(&self, current: &S, command: C) -> anyhow::Result<S>;
}

/// Translates incoming messages into ordered command sequences.
pub trait MessageProcessor<M, C, S, E = ()>: Send + Sync + 'static {
    fn process_message(
        &self,
        context: &StateContext<S>,
        message: M,
    ) -> Commands<C>;

    /// Auxiliary outputs produced independently of state transitions.
    fn side_effects(&self) -> SideEffects<E> {
        SideEffects::closed()
    }
}

/// Optional source of commands that bypass the message path.
///
/// `attach` is called once, when the machine starts producing outputs. The
/// source keeps the sender (or moves it into its own task) for as long as it
/// wants to inject commands; dropping every clone ends the aside loop
/// without stopping the machine.
pub trait AsideCommandSource<C, S>: Send + Sync + 'static {
    fn attach(&self, sender: AsideSender<C>, context: StateContext<S>);
}

impl<M, C, S, E, T> MessageProcessor<M, C, S, E> for Arc<T>
where
    T: MessageProcessor<M, C, S, E> + ?Sized,
{
    fn process_message(
        &self,
        context: &StateContext<S>,
        message: M,
    ) -> Commands<C> {
        (**self).process_message(context, message)
    }

    fn side_effects(&self) -> SideEffects<E> {
        (**self).side_effects()
    }
}

impl<C, S, F> StateReducer<C, S> for (S, F)
where
    S: Clone + Send + Sync + 'static,
    F: Fn(&S, C) -> anyhow::Result<S> + Send + Sync + 'static,
{
    fn initial_state(&self) -> S {
        self.0.clone()
    }

    fn next_state(&self, current: &S, command: C) -> anyhow::Result<S> {
        (self.1)(current, command)
    }
}
