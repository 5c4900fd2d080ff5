//! Message -> command -> state reducer loop on tokio tasks and flume
//! channels.
//!
//! The crate is built around a few collaborators:
//! - [`MessageProcessor`] turns each submitted message into an ordered
//!   [`Commands`] sequence and may expose [`SideEffects`];
//! - [`StateReducer`] computes the next state for each command;
//! - [`StatePublisher`] decides what each transition emits, for instance
//!   [`DistinctUpdates`];
//! - an optional [`AsideCommandSource`] injects commands outside the message
//!   path.
//!
//! [`StateMachine`] wires them together. Its producer task applies commands
//! one transition at a time and hands each publication to the [`Outputs`]
//! consumer before moving on. [`ViewStateDriver`] follows a machine and
//! applies every transition to a view through [`ViewState`].
//!
//! # Quick Example
//!
//! ```
//! use trellis_mvi::{
//!     Commands, MessageProcessor, StateContext, StateMachine, StateReducer,
//! };
//!
//! struct Counter;
//!
//! impl StateReducer<i32, i32> for Counter {
//!     fn initial_state(&self) -> i32 {
//!         0
//!     }
//!
//!     fn next_state(&self, current: &i32, delta: i32) -> anyhow::Result<i32> {
//!         Ok(current + delta)
//!     }
//! }
//!
//! struct Clicks;
//!
//! impl MessageProcessor<u32, i32, i32> for Clicks {
//!     fn process_message(
//!         &self,
//!         _context: &StateContext<i32>,
//!         clicks: u32,
//!     ) -> Commands<i32> {
//!         (0..clicks).map(|_| 1).collect()
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> trellis_mvi::Result<()> {
//! let machine = StateMachine::new(Counter, Clicks);
//! let outputs = machine.outputs()?;
//!
//! machine.submit_message(2)?;
//! machine.close();
//!
//! let (updates, outcome) = outputs.collect().await;
//! outcome?;
//! assert_eq!(updates.last().map(|update| update.new_state), Some(2));
//! # Ok(())
//! # }
//! ```

mod channel;
mod context;
mod error;
mod machine;
mod options;
mod processor;
mod publisher;
mod view_state;

pub use channel::{AsideSender, CommandSender, Commands, Outputs, SideEffects};
pub use context::StateContext;
pub use error::{MachineError, Result};
pub use machine::{StateMachine, StateMachineBuilder};
pub use options::MachineOptions;
pub use processor::{AsideCommandSource, MessageProcessor, StateReducer};
pub use publisher::{DistinctUpdates, EveryState, StatePublisher, StateUpdate};
pub use view_state::{ViewState, ViewStateDriver};
