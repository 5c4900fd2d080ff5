use serde::{Deserialize, Serialize};

/// Channel sizing for a [`StateMachine`](crate::StateMachine).
///
/// Every capacity follows the same convention: `Some(n)` is a bounded
/// channel holding `n` values, `Some(0)` is a rendezvous channel where the
/// sender waits for the receiver, and `None` is unbounded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineOptions {
    /// Capacity of the published-output channel. The default rendezvous
    /// makes every publication a blocking hand-off to the consumer.
    pub output_capacity: Option<usize>,
    /// Capacity of the aside-command channel.
    pub aside_capacity: Option<usize>,
    /// Capacity of command channels created through
    /// [`StateContext::command_channel`](crate::StateContext::command_channel).
    pub command_capacity: Option<usize>,
}

impl MachineOptions {
    /// Use unbounded channels everywhere; publications never wait.
    pub fn unbounded() -> Self {
        Self {
            output_capacity: None,
            aside_capacity: None,
            command_capacity: None,
        }
    }
}

impl Default for MachineOptions {
    fn default() -> Self {
        Self {
            output_capacity: Some(0),
            aside_capacity: Some(0),
            command_capacity: None,
        }
    }
}

pub(crate) fn channel<T>(
    capacity: Option<usize>,
) -> (flume::Sender<T>, flume::Receiver<T>) {
    match capacity {
        Some(cap) => flume::bounded(cap),
        None => flume::unbounded(),
    }
}
