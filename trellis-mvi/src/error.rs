use thiserror::Error;

/// Errors originating from the `trellis-mvi` reducer loop.
#[derive(Debug, Error)]
pub enum MachineError {
    #[error("reducer failed: {0}")]
    Reducer(#[source] anyhow::Error),

    #[error("message processor failed: {0}")]
    Processor(#[source] anyhow::Error),

    #[error("outputs already started for this state machine")]
    AlreadyStarted,

    #[error("state machine input closed")]
    Closed,

    #[error("outputs must be started from within a tokio runtime")]
    NoRuntime,

    #[error("producer task cancelled")]
    Cancelled,

    #[error("producer task panicked: {0}")]
    Join(String),
}

impl MachineError {
    /// Whether the error came from caller-supplied reducer or processor code.
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Reducer(_) | Self::Processor(_))
    }
}

pub type Result<T> = std::result::Result<T, MachineError>;

pub(crate) fn join_outcome(
    joined: std::result::Result<Result<()>, tokio::task::JoinError>,
) -> Result<()> {
    match joined {
        Ok(outcome) => outcome,
        Err(err) if err.is_cancelled() => Err(MachineError::Cancelled),
        Err(err) => Err(MachineError::Join(err.to_string())),
    }
}
