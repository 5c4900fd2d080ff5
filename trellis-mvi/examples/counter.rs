//! Counter driven by clicks plus a background ticker, rendered into a
//! text view.
//!
//! ```text
//! RUST_LOG=trellis_mvi=trace cargo run -p trellis-mvi --example counter
//! TRELLIS_OPTIONS='{"output_capacity": 4}' \
//!     cargo run -p trellis-mvi --example counter
//! ```

use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use env_logger::{Builder, Env};
use flume::Sender;
use trellis_mvi::{
    AsideCommandSource, AsideSender, Commands, MachineOptions,
    MessageProcessor, SideEffects, StateContext, StateMachine, StateReducer,
    ViewState, ViewStateDriver,
};

const LIMIT: i64 = 5;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Counter {
    Below(i64),
    AtLimit,
}

#[derive(Debug)]
enum Click {
    Increment(u8),
    Reset,
}

#[derive(Debug)]
enum Step {
    Add(i64),
    Clear,
}

struct Limits;

impl StateReducer<Step, Counter> for Limits {
    fn initial_state(&self) -> Counter {
        Counter::Below(0)
    }

    fn next_state(&self, current: &Counter, step: Step) -> Result<Counter> {
        Ok(match (current, step) {
            (_, Step::Clear) => Counter::Below(0),
            (Counter::AtLimit, Step::Add(_)) => Counter::AtLimit,
            (Counter::Below(value), Step::Add(delta))
                if value + delta >= LIMIT =>
            {
                Counter::AtLimit
            },
            (Counter::Below(value), Step::Add(delta)) => {
                Counter::Below(value + delta)
            },
        })
    }
}

/// Turns clicks into steps and announces when the limit is in reach.
struct Clicks {
    notices: Sender<String>,
    effects: Mutex<Option<SideEffects<String>>>,
}

impl Clicks {
    fn new() -> Self {
        let (notices, effects) = SideEffects::channel(None);
        Self {
            notices,
            effects: Mutex::new(Some(effects)),
        }
    }
}

impl MessageProcessor<Click, Step, Counter, String> for Clicks {
    fn process_message(
        &self,
        _context: &StateContext<Counter>,
        message: Click,
    ) -> Commands<Step> {
        log::info!("click: {message:?}");
        match message {
            Click::Increment(times) => {
                if i64::from(times) >= LIMIT {
                    let notice = format!("{times} clicks at once");
                    let _ = self.notices.send(notice);
                }
                (0..times).map(|_| Step::Add(1)).collect()
            },
            Click::Reset => Commands::once(Step::Clear),
        }
    }

    fn side_effects(&self) -> SideEffects<String> {
        self.effects
            .lock()
            .ok()
            .and_then(|mut effects| effects.take())
            .unwrap_or_else(SideEffects::closed)
    }
}

/// Adds one every few milliseconds until the limit is reached.
struct Ticker;

impl AsideCommandSource<Step, Counter> for Ticker {
    fn attach(
        &self,
        sender: AsideSender<Step>,
        context: StateContext<Counter>,
    ) {
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_millis(5));
            loop {
                interval.tick().await;
                if context.current_state().await == Counter::AtLimit {
                    break;
                }
                if sender.send(Step::Add(1)).await.is_err() {
                    break;
                }
            }
        });
    }
}

impl ViewState<Vec<String>> for Counter {
    fn on_exit_state(&self, next: &Self, view: &mut Vec<String>) {
        if *self == Counter::AtLimit && *next != Counter::AtLimit {
            view.push("limit cleared".to_owned());
        }
    }

    fn on_enter_state(
        &self,
        _previous: Option<&Self>,
        view: &mut Vec<String>,
    ) {
        view.push(match self {
            Counter::Below(value) => format!("count = {value}"),
            Counter::AtLimit => format!("count = {LIMIT} (limit)"),
        });
    }
}

fn load_options() -> Result<MachineOptions> {
    match std::env::var("TRELLIS_OPTIONS") {
        Ok(json) => serde_json::from_str(&json)
            .context("TRELLIS_OPTIONS is not valid machine options"),
        Err(_) => Ok(MachineOptions::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    Builder::from_env(Env::default().default_filter_or("info")).init();

    let options = load_options()?;
    log::info!("machine options: {options:?}");

    let machine = StateMachine::builder(Limits, Clicks::new())
        .with_aside_source(std::sync::Arc::new(Ticker))
        .with_options(options)
        .build();
    let notices = machine.side_effects();

    let driver = ViewStateDriver::start_with_hook(
        machine,
        Vec::new(),
        |old: &Counter, new: &Counter| log::debug!("{old:?} -> {new:?}"),
    )
    .await?;

    driver.post_message(Click::Increment(2))?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    driver.post_message(Click::Reset)?;
    driver.post_message(Click::Increment(LIMIT as u8))?;

    let view = driver.shared_view();
    driver.finish().await?;

    while let Some(notice) = notices.try_recv() {
        println!("notice: {notice}");
    }
    let lines = view.lock().map(|lines| lines.clone()).unwrap_or_default();
    for line in lines {
        println!("{line}");
    }
    Ok(())
}
