use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use flume::{Receiver, Sender};
use tokio::runtime::Handle;
use tokio::task::{AbortHandle, JoinHandle};

use crate::channel::{AsideSender, Outputs, SideEffects};
use crate::context::{StateCell, StateContext};
use crate::error::{MachineError, Result, join_outcome};
use crate::options::{MachineOptions, channel};
use crate::processor::{AsideCommandSource, MessageProcessor, StateReducer};
use crate::publisher::{DistinctUpdates, StatePublisher};

/// Single-writer reducer loop.
///
/// Messages go in through [`submit_message`](Self::submit_message); each is
/// turned into an ordered command sequence by the [`MessageProcessor`], and
/// every command is reduced into the next state by the [`StateReducer`].
/// After each transition the [`StatePublisher`] decides what is sent to the
/// [`Outputs`] consumer. Commands from an optional [`AsideCommandSource`]
/// are reduced by a second task; both tasks serialize every transition
/// through the same state lock.
///
/// Dropping the machine closes its input, like [`close`](Self::close).
pub struct StateMachine<M, C, S, E = (), P = DistinctUpdates> {
    core: Arc<Core<C, S, P>>,
    processor: Arc<dyn MessageProcessor<M, C, S, E>>,
    aside: Option<Arc<dyn AsideCommandSource<C, S>>>,
    options: MachineOptions,
    input: Mutex<Option<Sender<M>>>,
    intake: Mutex<Option<Receiver<M>>>,
    producer: Mutex<Option<AbortHandle>>,
}

impl<M, C, S, E> StateMachine<M, C, S, E>
where
    M: Send + 'static,
    C: Send + 'static,
    S: Clone + Send + Sync + 'static,
    E: 'static,
{
    /// Machine with default options publishing [`StateUpdate`]s for
    /// transitions that change the state.
    ///
    /// [`StateUpdate`]: crate::StateUpdate
    pub fn new<R, Pr>(reducer: R, processor: Pr) -> Self
    where
        S: PartialEq,
        R: StateReducer<C, S>,
        Pr: MessageProcessor<M, C, S, E>,
    {
        Self::builder(reducer, processor).build()
    }

    /// Builder starting from default options and [`DistinctUpdates`].
    pub fn builder<R, Pr>(
        reducer: R,
        processor: Pr,
    ) -> StateMachineBuilder<M, C, S, E>
    where
        R: StateReducer<C, S>,
        Pr: MessageProcessor<M, C, S, E>,
    {
        StateMachineBuilder {
            reducer: Box::new(reducer),
            processor: Arc::new(processor),
            publisher: DistinctUpdates,
            aside: None,
            options: MachineOptions::default(),
        }
    }
}

impl<M, C, S, E, P> StateMachine<M, C, S, E, P>
where
    M: Send + 'static,
    C: Send + 'static,
    S: Clone + Send + Sync + 'static,
    E: 'static,
    P: StatePublisher<S>,
{
    /// Queue a message. Never waits; messages from one caller are processed
    /// in submission order.
    pub fn submit_message(&self, message: M) -> Result<()> {
        let input = lock(&self.input);
        let sender = input.as_ref().ok_or(MachineError::Closed)?;
        sender.send(message).map_err(|_| MachineError::Closed)
    }

    /// Start the producer task and hand out its published outputs.
    ///
    /// Must be called from within a tokio runtime, and only once per
    /// machine. The aside source, if any, is attached here.
    pub fn outputs(&self) -> Result<Outputs<P::Output>> {
        let runtime =
            Handle::try_current().map_err(|_| MachineError::NoRuntime)?;
        let intake = lock(&self.intake)
            .take()
            .ok_or(MachineError::AlreadyStarted)?;

        let (output_tx, output_rx) = channel(self.options.output_capacity);

        let aside = self.aside.as_ref().map(|source| {
            let (aside_tx, aside_rx) = channel(self.options.aside_capacity);
            let context = self.core.context.clone();
            source.attach(AsideSender::new(aside_tx), context);
            log::debug!("aside command channel configured");
            AsideTask {
                handle: runtime.spawn(run_aside(
                    Arc::clone(&self.core),
                    aside_rx,
                    output_tx.clone(),
                )),
            }
        });

        let producer = runtime.spawn(run_messages(
            Arc::clone(&self.core),
            Arc::clone(&self.processor),
            intake,
            output_tx,
            aside,
        ));
        *lock(&self.producer) = Some(producer.abort_handle());

        Ok(Outputs::new(output_rx, producer))
    }

    /// Side effects emitted by the processor outside state transitions.
    pub fn side_effects(&self) -> SideEffects<E> {
        self.processor.side_effects()
    }

    /// Copy of the current state, read under the state lock.
    pub async fn current_state(&self) -> S {
        self.core.context.current_state().await
    }

    /// Read access to the state, as handed to processors.
    pub fn context(&self) -> StateContext<S> {
        self.core.context.clone()
    }

    /// Close the input. Queued messages are still processed; the producer
    /// task exits once they are drained.
    pub fn close(&self) {
        if lock(&self.input).take().is_some() {
            log::debug!("state machine input closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.input).is_none()
    }

    /// Close the input and abort the producer and aside tasks without
    /// draining. [`Outputs::finish`] then reports
    /// [`MachineError::Cancelled`].
    pub fn cancel(&self) {
        self.close();
        if let Some(producer) = lock(&self.producer).take() {
            producer.abort();
            log::debug!("state machine cancelled");
        }
    }
}

impl<M, C, S, E, P> fmt::Debug for StateMachine<M, C, S, E, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("options", &self.options)
            .field("has_aside", &self.aside.is_some())
            .field("closed", &lock(&self.input).is_none())
            .field("started", &lock(&self.intake).is_none())
            .finish_non_exhaustive()
    }
}

/// Builder that wires a reducer, a processor and their optional
/// collaborators into a [`StateMachine`].
pub struct StateMachineBuilder<M, C, S, E = (), P = DistinctUpdates> {
    reducer: Box<dyn StateReducer<C, S>>,
    processor: Arc<dyn MessageProcessor<M, C, S, E>>,
    publisher: P,
    aside: Option<Arc<dyn AsideCommandSource<C, S>>>,
    options: MachineOptions,
}

impl<M, C, S, E, P> StateMachineBuilder<M, C, S, E, P>
where
    M: Send + 'static,
    C: Send + 'static,
    S: Clone + Send + Sync + 'static,
    E: 'static,
{
    /// Replace the publisher deciding what each transition emits.
    pub fn with_publisher<Q>(
        self,
        publisher: Q,
    ) -> StateMachineBuilder<M, C, S, E, Q>
    where
        Q: StatePublisher<S>,
    {
        StateMachineBuilder {
            reducer: self.reducer,
            processor: self.processor,
            publisher,
            aside: self.aside,
            options: self.options,
        }
    }

    /// Register a source of aside commands, attached when outputs start.
    pub fn with_aside_source<A>(mut self, source: Arc<A>) -> Self
    where
        A: AsideCommandSource<C, S>,
    {
        self.aside = Some(source);
        self
    }

    /// Replace the channel sizing options.
    pub fn with_options(mut self, options: MachineOptions) -> Self {
        self.options = options;
        self
    }

    /// Override the published-output channel capacity.
    pub fn with_output_capacity(mut self, capacity: Option<usize>) -> Self {
        self.options.output_capacity = capacity;
        self
    }
}

impl<M, C, S, E, P> StateMachineBuilder<M, C, S, E, P>
where
    M: Send + 'static,
    C: Send + 'static,
    S: Clone + Send + Sync + 'static,
    E: 'static,
    P: StatePublisher<S>,
{
    pub fn build(self) -> StateMachine<M, C, S, E, P> {
        let StateMachineBuilder {
            reducer,
            processor,
            publisher,
            aside,
            options,
        } = self;

        let cell = Arc::new(StateCell::new(reducer.initial_state()));
        let context =
            StateContext::new(Arc::clone(&cell), options.command_capacity);
        let (input, intake) = flume::unbounded();

        StateMachine {
            core: Arc::new(Core {
                reducer,
                publisher,
                cell,
                context,
            }),
            processor,
            aside,
            options,
            input: Mutex::new(Some(input)),
            intake: Mutex::new(Some(intake)),
            producer: Mutex::new(None),
        }
    }
}

/// State shared by the message loop and the aside loop.
struct Core<C, S, P> {
    reducer: Box<dyn StateReducer<C, S>>,
    publisher: P,
    cell: Arc<StateCell<S>>,
    context: StateContext<S>,
}

impl<C, S, P> Core<C, S, P>
where
    C: 'static,
    S: Clone + Send + Sync + 'static,
    P: StatePublisher<S>,
{
    /// Reduce `command`, install the result and publish it.
    ///
    /// Returns `Ok(false)` once the output consumer is gone.
    async fn apply(
        &self,
        command: C,
        output: &Sender<P::Output>,
    ) -> Result<bool> {
        let _turn = self.cell.begin_transition().await;

        let (old_state, new_state) = {
            let mut state = self.cell.lock_state().await;
            let next =
                self.reducer.next_state(&state, command).map_err(|err| {
                    log::warn!("reducer failed, stopping machine: {err:#}");
                    MachineError::Reducer(err)
                })?;
            let old = std::mem::replace(&mut *state, next.clone());
            (old, next)
        };
        log::trace!("state installed");

        match self.publisher.publish(&old_state, &new_state) {
            Some(update) => Ok(output.send_async(update).await.is_ok()),
            None => Ok(true),
        }
    }
}

/// Aside loop handle; aborts the task when dropped.
struct AsideTask {
    handle: JoinHandle<Result<()>>,
}

impl AsideTask {
    async fn join(&mut self) -> Result<()> {
        join_outcome((&mut self.handle).await)
    }
}

impl Drop for AsideTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

enum Wake<T> {
    Ready(T),
    Aside(Result<()>),
}

async fn aside_outcome(aside: &mut Option<AsideTask>) -> Result<()> {
    match aside {
        Some(task) => task.join().await,
        None => std::future::pending().await,
    }
}

async fn run_messages<M, C, S, E, P>(
    core: Arc<Core<C, S, P>>,
    processor: Arc<dyn MessageProcessor<M, C, S, E>>,
    intake: Receiver<M>,
    output: Sender<P::Output>,
    mut aside: Option<AsideTask>,
) -> Result<()>
where
    M: Send + 'static,
    C: Send + 'static,
    S: Clone + Send + Sync + 'static,
    E: 'static,
    P: StatePublisher<S>,
{
    loop {
        let wake = tokio::select! {
            received = intake.recv_async() => Wake::Ready(received.ok()),
            outcome = aside_outcome(&mut aside) => Wake::Aside(outcome),
        };
        let message = match wake {
            Wake::Ready(Some(message)) => message,
            Wake::Ready(None) => break,
            Wake::Aside(outcome) => {
                aside = None;
                outcome?;
                continue;
            },
        };

        log::trace!("message received");
        let mut commands = processor.process_message(&core.context, message);
        loop {
            let wake = tokio::select! {
                command = commands.next() => Wake::Ready(command),
                outcome = aside_outcome(&mut aside) => Wake::Aside(outcome),
            };
            match wake {
                Wake::Ready(None) => break,
                Wake::Ready(Some(Ok(command))) => {
                    log::trace!("command generated");
                    if !core.apply(command, &output).await? {
                        log::debug!("outputs dropped, stopping state machine");
                        return Ok(());
                    }
                },
                Wake::Ready(Some(Err(err))) => {
                    log::warn!(
                        "message processor failed, stopping state machine: \
                         {err:#}"
                    );
                    return Err(MachineError::Processor(err));
                },
                Wake::Aside(outcome) => {
                    aside = None;
                    outcome?;
                },
            }
        }
    }

    log::debug!("state machine input drained, producer finished");
    Ok(())
}

async fn run_aside<C, S, P>(
    core: Arc<Core<C, S, P>>,
    commands: Receiver<C>,
    output: Sender<P::Output>,
) -> Result<()>
where
    C: Send + 'static,
    S: Clone + Send + Sync + 'static,
    P: StatePublisher<S>,
{
    while let Ok(command) = commands.recv_async().await {
        log::trace!("aside command received");
        if !core.apply(command, &output).await? {
            break;
        }
    }
    log::debug!("aside command loop finished");
    Ok(())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
