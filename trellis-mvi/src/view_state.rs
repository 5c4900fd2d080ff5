use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;

use crate::channel::{Outputs, SideEffects};
use crate::error::{Result, join_outcome};
use crate::machine::StateMachine;
use crate::publisher::StateUpdate;

/// Logical state that knows how to present itself on a view `V`.
pub trait ViewState<V> {
    /// Undo what this state applied to `view`; `next` is about to enter.
    fn on_exit_state(&self, next: &Self, view: &mut V);

    /// Apply this state to `view`. `previous` is `None` for the initial
    /// state.
    fn on_enter_state(&self, previous: Option<&Self>, view: &mut V);
}

type UpdateHook<S> = Box<dyn Fn(&S, &S) + Send + Sync>;

/// Keeps a view in step with a [`StateMachine`] publishing
/// [`StateUpdate`]s.
///
/// The initial state enters the view before the machine starts. Each update
/// then exits the old state and enters the new one, in that order, followed
/// by the optional update hook.
pub struct ViewStateDriver<M, C, S, V, E = ()> {
    machine: StateMachine<M, C, S, E>,
    view: Arc<Mutex<V>>,
    task: JoinHandle<Result<()>>,
}

impl<M, C, S, V, E> ViewStateDriver<M, C, S, V, E>
where
    M: Send + 'static,
    C: Send + 'static,
    S: ViewState<V> + Clone + PartialEq + Send + Sync + 'static,
    V: Send + 'static,
    E: 'static,
{
    /// Enter the initial state on `view` and start following the machine.
    pub async fn start(
        machine: StateMachine<M, C, S, E>,
        view: V,
    ) -> Result<Self> {
        Self::start_with_hook(machine, view, |_: &S, _: &S| {}).await
    }

    /// Like [`start`](Self::start), calling `on_state_updated(old, new)`
    /// after each transition has been applied to the view.
    pub async fn start_with_hook<F>(
        machine: StateMachine<M, C, S, E>,
        mut view: V,
        on_state_updated: F,
    ) -> Result<Self>
    where
        F: Fn(&S, &S) + Send + Sync + 'static,
    {
        let initial = machine.current_state().await;
        initial.on_enter_state(None, &mut view);

        let view = Arc::new(Mutex::new(view));
        let outputs = machine.outputs()?;
        let task = tokio::spawn(follow(
            outputs,
            Arc::clone(&view),
            Box::new(on_state_updated),
        ));

        Ok(Self {
            machine,
            view,
            task,
        })
    }

    /// Forward a message to the machine.
    pub fn post_message(&self, message: M) -> Result<()> {
        self.machine.submit_message(message)
    }

    /// The view as last updated.
    pub fn view(&self) -> MutexGuard<'_, V> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Shared handle to the view, still readable after
    /// [`finish`](Self::finish).
    pub fn shared_view(&self) -> Arc<Mutex<V>> {
        Arc::clone(&self.view)
    }

    pub async fn current_state(&self) -> S {
        self.machine.current_state().await
    }

    pub fn side_effects(&self) -> SideEffects<E> {
        self.machine.side_effects()
    }

    /// Close the machine input; queued messages still reach the view.
    pub fn close(&self) {
        self.machine.close();
    }

    /// Stop the machine without draining.
    pub fn cancel(&self) {
        self.machine.cancel();
    }

    /// Close the input, wait until queued messages reach the view and
    /// report how the machine ended.
    pub async fn finish(self) -> Result<()> {
        let Self { machine, task, .. } = self;
        drop(machine);
        join_outcome(task.await)
    }
}

async fn follow<S, V>(
    outputs: Outputs<StateUpdate<S>>,
    view: Arc<Mutex<V>>,
    on_state_updated: UpdateHook<S>,
) -> Result<()>
where
    S: ViewState<V>,
{
    while let Some(update) = outputs.recv().await {
        {
            let mut view =
                view.lock().unwrap_or_else(PoisonError::into_inner);
            update.old_state.on_exit_state(&update.new_state, &mut view);
            update
                .new_state
                .on_enter_state(Some(&update.old_state), &mut view);
        }
        on_state_updated(&update.old_state, &update.new_state);
    }
    outputs.finish().await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::channel::Commands;
    use crate::context::StateContext;
    use crate::error::MachineError;
    use crate::processor::{MessageProcessor, StateReducer};

    #[derive(Clone, Copy, Debug, PartialEq)]
    enum Screen {
        Idle,
        Loading,
        Loaded,
    }

    impl ViewState<Vec<String>> for Screen {
        fn on_exit_state(&self, next: &Self, view: &mut Vec<String>) {
            view.push(format!("exit {self:?} -> {next:?}"));
        }

        fn on_enter_state(
            &self,
            previous: Option<&Self>,
            view: &mut Vec<String>,
        ) {
            view.push(format!("enter {self:?} from {previous:?}"));
        }
    }

    struct Screens;

    impl StateReducer<Screen, Screen> for Screens {
        fn initial_state(&self) -> Screen {
            Screen::Idle
        }

        fn next_state(
            &self,
            _current: &Screen,
            command: Screen,
        ) -> anyhow::Result<Screen> {
            Ok(command)
        }
    }

    struct Load;

    impl MessageProcessor<&'static str, Screen, Screen> for Load {
        fn process_message(
            &self,
            _context: &StateContext<Screen>,
            message: &'static str,
        ) -> Commands<Screen> {
            match message {
                "load" => {
                    [Screen::Loading, Screen::Loaded].into_iter().collect()
                },
                "stay" => Commands::once(Screen::Loaded),
                _ => Commands::failed(anyhow::anyhow!("unknown {message}")),
            }
        }
    }

    #[tokio::test]
    async fn given_driver_when_states_change_then_exit_precedes_enter() {
        let updates = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&updates);
        let driver = ViewStateDriver::start_with_hook(
            StateMachine::new(Screens, Load),
            Vec::new(),
            move |_: &Screen, _: &Screen| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        )
        .await
        .expect("driver starts");

        driver.post_message("load").expect("input open");
        driver.post_message("stay").expect("input open");
        driver.close();
        let journal_handle = driver.shared_view();
        driver.finish().await.expect("clean finish");

        let journal = journal_handle.lock().expect("not poisoned").clone();
        assert_eq!(
            journal,
            vec![
                "enter Idle from None",
                "exit Idle -> Loading",
                "enter Loading from Some(Idle)",
                "exit Loading -> Loaded",
                "enter Loaded from Some(Loading)",
            ]
        );
        assert_eq!(updates.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn given_failing_message_when_driven_then_finish_reports_fault() {
        let machine = StateMachine::new(Screens, Load);
        let driver = ViewStateDriver::start(machine, Vec::new())
            .await
            .expect("driver starts");

        driver.post_message("explode").expect("input open");

        assert!(matches!(
            driver.finish().await,
            Err(MachineError::Processor(_))
        ));
    }
}
