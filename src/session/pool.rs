//! Live browser sessions, keyed by session id.

use super::step::{execute_step, StepOptions};
use super::{SessionCommand, SessionEvent, StepSession};
use crate::driver::{BrowserDriver, DriverFactory};
use crate::runner::adapter::SessionTransport;
use crate::runner::state::DispatchKey;
use crate::runner::summary::{Expectation, StepResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Carries out [`StepSession`] commands against real drivers
pub struct SessionPool {
    factory: Arc<dyn DriverFactory>,
    sessions: Mutex<HashMap<Uuid, Arc<dyn BrowserDriver>>>,
    options: StepOptions,
}

impl SessionPool {
    pub fn new(factory: Arc<dyn DriverFactory>, options: StepOptions) -> Self {
        Self {
            factory,
            sessions: Mutex::new(HashMap::new()),
            options,
        }
    }

    /// Number of sessions currently open
    pub async fn open_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }

    async fn open(&self, key: &DispatchKey) -> SessionEvent {
        match self.factory.open().await {
            Ok(driver) => {
                let id = Uuid::new_v4();
                log::debug!("[{}] opened session {}", key, id);
                self.sessions.lock().await.insert(id, Arc::from(driver));
                SessionEvent::Opened(Ok(id))
            }
            Err(e) => {
                log::error!("[{}] could not open a browser session: {:#}", key, e);
                SessionEvent::Opened(Err(format!("{:#}", e)))
            }
        }
    }

    async fn close(&self, key: &DispatchKey, session: Option<Uuid>) -> SessionEvent {
        let driver = match session {
            Some(id) => self.sessions.lock().await.remove(&id),
            None => None,
        };
        if let Some(driver) = driver {
            if let Err(e) = driver.close().await {
                log::warn!("[{}] error while closing session: {:#}", key, e);
            }
        }
        SessionEvent::Closed
    }
}

#[async_trait]
impl SessionTransport<StepSession> for SessionPool {
    async fn execute(&self, key: &DispatchKey, command: SessionCommand) -> Option<SessionEvent> {
        match command {
            SessionCommand::Open => Some(self.open(key).await),
            SessionCommand::Execute {
                session,
                steps,
                index,
            } => {
                let step = steps.get(index)?;
                // Clone the handle so the map is not locked while the step runs
                let driver = self.sessions.lock().await.get(&session).cloned();
                let result = match driver {
                    Some(driver) => {
                        execute_step(driver.as_ref(), key, index, step, &self.options).await
                    }
                    None => StepResult::failed(
                        step.description.clone(),
                        Expectation::fail(format!("Session {} is not open", session)),
                    ),
                };
                Some(SessionEvent::StepDone { index, result })
            }
            SessionCommand::Close { session } => Some(self.close(key, session).await),
            SessionCommand::Idle => None,
        }
    }
}
