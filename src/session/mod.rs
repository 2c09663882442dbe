//! Browser-session adapter: one session per run, one step at a time.

pub mod pool;
pub mod step;

pub use pool::SessionPool;
pub use step::StepOptions;

use crate::parser::types::Step;
use crate::runner::adapter::{ProgressSignal, SessionAdapter};
use crate::runner::summary::{Expectation, StepResult};
use std::sync::Arc;
use uuid::Uuid;

/// Description used when a session cannot be opened
pub const OPEN_SESSION: &str = "Open browser session";
/// Next-step text once every step has run
pub const DONE: &str = "Done";

/// Commands the adapter asks the transport to carry out
#[derive(Debug, Clone)]
pub enum SessionCommand {
    Open,
    Execute {
        session: Uuid,
        steps: Arc<[Step]>,
        index: usize,
    },
    /// `session` is `None` when the session never opened
    Close { session: Option<Uuid> },
    Idle,
}

/// Completions reported back by the transport
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Opened(Result<Uuid, String>),
    StepDone { index: usize, result: StepResult },
    Closed,
}

#[derive(Debug, Clone)]
pub enum SessionState {
    Opening {
        steps: Arc<[Step]>,
    },
    Running {
        session: Uuid,
        steps: Arc<[Step]>,
        next: usize,
    },
    Closing,
    Done,
}

/// Runs a step list strictly in order inside a single browser session
#[derive(Debug, Clone, Copy, Default)]
pub struct StepSession;

impl SessionAdapter for StepSession {
    type State = SessionState;
    type Command = SessionCommand;
    type Event = SessionEvent;

    fn init(&self, steps: Arc<[Step]>) -> (SessionState, SessionCommand) {
        (SessionState::Opening { steps }, SessionCommand::Open)
    }

    fn update(
        &self,
        event: SessionEvent,
        state: SessionState,
    ) -> (SessionState, SessionCommand, ProgressSignal) {
        match (event, state) {
            (SessionEvent::Opened(Ok(session)), SessionState::Opening { steps }) => {
                if steps.is_empty() {
                    return (
                        SessionState::Closing,
                        SessionCommand::Close {
                            session: Some(session),
                        },
                        ProgressSignal::Spawned,
                    );
                }
                (
                    SessionState::Running {
                        session,
                        steps: Arc::clone(&steps),
                        next: 0,
                    },
                    SessionCommand::Execute {
                        session,
                        steps,
                        index: 0,
                    },
                    ProgressSignal::Spawned,
                )
            }

            // The run cannot proceed; report it as a failed step and wind down
            (SessionEvent::Opened(Err(message)), SessionState::Opening { .. }) => (
                SessionState::Closing,
                SessionCommand::Close { session: None },
                ProgressSignal::Progress {
                    remaining: 0,
                    result: StepResult::failed(
                        OPEN_SESSION,
                        Expectation::Fail {
                            given: None,
                            message,
                        },
                    ),
                    next_step: DONE.to_string(),
                },
            ),

            (
                SessionEvent::StepDone { index, result },
                SessionState::Running {
                    session,
                    steps,
                    next,
                },
            ) if index == next => {
                let following = next + 1;
                if following < steps.len() {
                    let progress = ProgressSignal::Progress {
                        remaining: steps.len() - following,
                        result,
                        next_step: steps[following].description.clone(),
                    };
                    (
                        SessionState::Running {
                            session,
                            steps: Arc::clone(&steps),
                            next: following,
                        },
                        SessionCommand::Execute {
                            session,
                            steps,
                            index: following,
                        },
                        progress,
                    )
                } else {
                    (
                        SessionState::Closing,
                        SessionCommand::Close {
                            session: Some(session),
                        },
                        ProgressSignal::Progress {
                            remaining: 0,
                            result,
                            next_step: DONE.to_string(),
                        },
                    )
                }
            }

            (SessionEvent::Closed, SessionState::Closing) => (
                SessionState::Done,
                SessionCommand::Idle,
                ProgressSignal::Finalized,
            ),

            (event, state) => {
                log::debug!("Ignoring {:?} in state {:?}", event, state);
                (state, SessionCommand::Idle, ProgressSignal::None)
            }
        }
    }
}
