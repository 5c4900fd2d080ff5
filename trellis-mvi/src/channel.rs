use flume::{Receiver, Sender, TryRecvError, TrySendError};
use tokio::task::JoinHandle;

use crate::error::{MachineError, Result, join_outcome};
use crate::options::channel;

/// Ordered command sequence produced for one message.
///
/// The loop applies the commands in the order they arrive and moves on to
/// the next message once every sender is gone. An `Err` item is a processor
/// fault and terminates the loop.
#[derive(Debug)]
pub struct Commands<C> {
    receiver: Receiver<anyhow::Result<C>>,
}

impl<C> Commands<C> {
    /// Sequence with no commands; the message leaves the state untouched.
    pub fn empty() -> Self {
        let (_, receiver) = flume::bounded(0);
        Self { receiver }
    }

    /// Sequence holding a single command.
    pub fn once(command: C) -> Self {
        std::iter::once(command).collect()
    }

    /// Sequence that fails right away with `error`.
    pub fn failed(error: impl Into<anyhow::Error>) -> Self {
        let (sender, receiver) = flume::bounded(1);
        let _ = sender.send(Err(error.into()));
        Self { receiver }
    }

    /// Sequence fed from a [`CommandSender`], typically moved into a task
    /// that produces commands over time.
    pub fn channel(capacity: Option<usize>) -> (CommandSender<C>, Self) {
        let (sender, receiver) = channel(capacity);
        (CommandSender { sender }, Self { receiver })
    }

    /// Next command, `None` once the sequence is exhausted.
    pub async fn next(&mut self) -> Option<anyhow::Result<C>> {
        self.receiver.recv_async().await.ok()
    }
}

impl<C> FromIterator<C> for Commands<C> {
    fn from_iter<I: IntoIterator<Item = C>>(iter: I) -> Self {
        let (sender, receiver) = flume::unbounded();
        for command in iter {
            let _ = sender.send(Ok(command));
        }
        Self { receiver }
    }
}

/// Producer side of [`Commands::channel`].
#[derive(Debug)]
pub struct CommandSender<C> {
    sender: Sender<anyhow::Result<C>>,
}

impl<C> CommandSender<C> {
    /// Queue the next command, waiting for room on a bounded channel.
    pub async fn send(&self, command: C) -> Result<()> {
        self.sender
            .send_async(Ok(command))
            .await
            .map_err(|_| MachineError::Closed)
    }

    /// Abort the sequence with a processor fault.
    pub async fn fail(self, error: impl Into<anyhow::Error>) -> Result<()> {
        self.sender
            .send_async(Err(error.into()))
            .await
            .map_err(|_| MachineError::Closed)
    }
}

impl<C> Clone for CommandSender<C> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Handle through which an aside source injects commands outside the
/// message path.
#[derive(Debug)]
pub struct AsideSender<C> {
    sender: Sender<C>,
}

impl<C> AsideSender<C> {
    pub(crate) fn new(sender: Sender<C>) -> Self {
        Self { sender }
    }

    /// Send a command, waiting until the aside loop accepts it.
    pub async fn send(&self, command: C) -> Result<()> {
        self.sender
            .send_async(command)
            .await
            .map_err(|_| MachineError::Closed)
    }

    /// Send a command only if the aside loop can take it right now.
    pub fn try_send(&self, command: C) -> Result<bool> {
        match self.sender.try_send(command) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => Ok(false),
            Err(TrySendError::Disconnected(_)) => Err(MachineError::Closed),
        }
    }

    /// Whether the aside loop stopped listening.
    pub fn is_closed(&self) -> bool {
        self.sender.is_disconnected()
    }
}

impl<C> Clone for AsideSender<C> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Auxiliary values a processor emits independently of state transitions.
#[derive(Debug)]
pub struct SideEffects<E> {
    receiver: Receiver<E>,
}

impl<E> SideEffects<E> {
    /// Sequence that is already closed and will never yield.
    pub fn closed() -> Self {
        let (_, receiver) = flume::bounded(0);
        Self { receiver }
    }

    /// Side-effect channel and the sender feeding it.
    pub fn channel(capacity: Option<usize>) -> (Sender<E>, Self) {
        let (sender, receiver) = channel(capacity);
        (sender, Self { receiver })
    }

    pub async fn recv(&self) -> Option<E> {
        self.receiver.recv_async().await.ok()
    }

    pub fn try_recv(&self) -> Option<E> {
        self.receiver.try_recv().ok()
    }

    /// Whether every sender is gone and nothing is left to read.
    pub fn is_closed(&self) -> bool {
        self.receiver.is_disconnected() && self.receiver.is_empty()
    }
}

impl<E> From<Receiver<E>> for SideEffects<E> {
    fn from(receiver: Receiver<E>) -> Self {
        Self { receiver }
    }
}

/// Published outputs of a running state machine.
///
/// Dropping this value stops the loop at its next publication.
#[derive(Debug)]
pub struct Outputs<O> {
    receiver: Receiver<O>,
    producer: JoinHandle<Result<()>>,
}

impl<O> Outputs<O> {
    pub(crate) fn new(
        receiver: Receiver<O>,
        producer: JoinHandle<Result<()>>,
    ) -> Self {
        Self { receiver, producer }
    }

    /// Next published output, `None` once the loop has stopped.
    pub async fn recv(&self) -> Option<O> {
        self.receiver.recv_async().await.ok()
    }

    /// Non-blocking receive; `Ok(None)` when nothing is pending yet.
    pub fn try_recv(&self) -> Result<Option<O>> {
        match self.receiver.try_recv() {
            Ok(output) => Ok(Some(output)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(MachineError::Closed),
        }
    }

    /// Drain outputs until the loop stops, then report how it ended.
    pub async fn collect(self) -> (Vec<O>, Result<()>) {
        let mut outputs = Vec::new();
        while let Some(output) = self.recv().await {
            outputs.push(output);
        }
        let outcome = self.finish().await;
        (outputs, outcome)
    }

    /// Wait for the producer task and surface the fault that stopped it,
    /// if any. Pending outputs are discarded.
    pub async fn finish(self) -> Result<()> {
        let Self { receiver, producer } = self;
        drop(receiver);
        join_outcome(producer.await)
    }
}
