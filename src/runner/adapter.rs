use super::state::DispatchKey;
use super::summary::StepResult;
use crate::parser::types::Step;
use async_trait::async_trait;
use std::sync::Arc;

/// What a session adapter reports after handling an inbound event
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressSignal {
    /// The session became usable
    Spawned,
    /// One step completed
    Progress {
        remaining: usize,
        result: StepResult,
        next_step: String,
    },
    /// No more steps; the session has been torn down
    Finalized,
    /// Transport noise with no visible effect
    None,
}

/// Per-run state machine wrapping a single browser session.
///
/// Adapters are pure: they never perform IO themselves. Each transition
/// returns the next outbound command, which the host hands to a
/// [`SessionTransport`] and whose completion comes back as an `Event`.
pub trait SessionAdapter {
    type State;
    type Command: Send + 'static;
    type Event: Send + 'static;

    /// Steps are shared with the run tree
    fn init(&self, steps: Arc<[Step]>) -> (Self::State, Self::Command);

    fn update(
        &self,
        event: Self::Event,
        state: Self::State,
    ) -> (Self::State, Self::Command, ProgressSignal);
}

/// Executes adapter commands against real sessions.
///
/// Returns `None` for commands that produce no completion event.
#[async_trait]
pub trait SessionTransport<A: SessionAdapter + 'static>: Send + Sync {
    async fn execute(&self, key: &DispatchKey, command: A::Command) -> Option<A::Event>;
}
