//! Realises orchestrator effects on the tokio runtime.

use super::adapter::{SessionAdapter, SessionTransport};
use super::events::{EventEmitter, SuiteEvent};
use super::orchestrator::{Effect, Event, Orchestrator};
use super::summary::Summary;
use crate::report::ScreenshotManifest;
use anyhow::Result;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// What a finished suite leaves behind
#[derive(Debug)]
pub struct HostOutcome {
    pub summary: Summary,
    pub manifest: ScreenshotManifest,
}

/// Drive `orchestrator` until it emits its final report.
///
/// `effects` are the ones returned when the suite was dispatched. Fails
/// only if every task has completed and no final report was produced.
pub async fn drive<A, T>(
    mut orchestrator: Orchestrator<A>,
    effects: Vec<Effect<A>>,
    transport: Arc<T>,
    emitter: &EventEmitter,
) -> Result<HostOutcome>
where
    A: SessionAdapter + 'static,
    T: SessionTransport<A> + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Event<A>>();
    let mut tasks = JoinSet::new();
    let mut pending: VecDeque<Effect<A>> = effects.into();
    let mut manifest = ScreenshotManifest::new();

    loop {
        while let Some(effect) = pending.pop_front() {
            match effect {
                Effect::BeginSession { key, command } => {
                    let tx = tx.clone();
                    tasks.spawn(async move {
                        let _ = tx.send(Event::StartRun {
                            key,
                            command,
                            at: Utc::now(),
                        });
                    });
                }
                Effect::Command { key, command } => {
                    let tx = tx.clone();
                    let transport = Arc::clone(&transport);
                    tasks.spawn(async move {
                        if let Some(event) = transport.execute(&key, command).await {
                            let _ = tx.send(Event::Adapter { key, event });
                        }
                    });
                }
                Effect::RecordStart { key } => {
                    pending.extend(orchestrator.process_event(Event::StartedRun {
                        key,
                        at: Utc::now(),
                    }));
                }
                Effect::RecordStop { key, summary } => {
                    pending.extend(orchestrator.process_event(Event::StopRun {
                        key,
                        summary,
                        at: Utc::now(),
                    }));
                }
                Effect::BroadcastStatus(snapshot) => emitter.emit(SuiteEvent::Status(snapshot)),
                Effect::PersistScreenshots { key, paths } => {
                    manifest.record(&key, &paths);
                    emitter.emit(SuiteEvent::Screenshots { key, paths });
                }
                Effect::Log { key, summary } => emitter.emit(SuiteEvent::RunLog {
                    key,
                    output: summary.output,
                }),
                Effect::Finish(summary) => {
                    emitter.emit(SuiteEvent::Finished {
                        summary: summary.clone(),
                    });
                    // Only idle or abandoned work can still be in flight
                    tasks.abort_all();
                    return Ok(HostOutcome { summary, manifest });
                }
            }
        }

        if tasks.is_empty() {
            // Every completion has been sent; drain what is left or give up
            match rx.try_recv() {
                Ok(event) => pending.extend(orchestrator.process_event(event)),
                Err(_) => anyhow::bail!(
                    "Suite stalled with {} session(s) still active",
                    orchestrator.active_sessions()
                ),
            }
            continue;
        }

        tokio::select! {
            Some(event) = rx.recv() => pending.extend(orchestrator.process_event(event)),
            Some(joined) = tasks.join_next() => {
                if let Err(e) = joined {
                    log::error!("Session task failed: {}", e);
                }
            }
        }
    }
}
