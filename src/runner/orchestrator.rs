//! Suite orchestration.
//!
//! The [`Orchestrator`] owns every piece of mutable suite state and is only
//! ever changed through [`Orchestrator::process_event`]. Each transition
//! returns the side effects a host must realise; completions of the
//! asynchronous ones come back in as new events.

use super::adapter::{ProgressSignal, SessionAdapter};
use super::state::{DispatchKey, RunStatus, StatusSnapshot, StatusTable};
use super::summary::{seconds_between, Summary};
use super::tree::{flatten, select};
use crate::parser::types::RunNode;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};

/// Launch options for a suite
#[derive(Debug, Clone, Default)]
pub struct RunFlags {
    /// Case-sensitive substring a qualified run name must contain
    pub filter: Option<String>,
}

/// Inputs to the orchestrator
pub enum Event<A: SessionAdapter> {
    /// Flatten and dispatch the suite
    Begin,
    /// A session hand-off completed; `at` is the run's init time
    StartRun {
        key: DispatchKey,
        command: A::Command,
        at: DateTime<Utc>,
    },
    /// Start time of a spawned session
    StartedRun { key: DispatchKey, at: DateTime<Utc> },
    /// Stop time of a finalized run, carrying its summary
    StopRun {
        key: DispatchKey,
        summary: Summary,
        at: DateTime<Utc>,
    },
    /// Completion of a command issued by the run's adapter
    Adapter { key: DispatchKey, event: A::Event },
}

/// Side effects for the host to realise
pub enum Effect<A: SessionAdapter> {
    /// Hand the run off for session creation, then reply with `StartRun`
    BeginSession { key: DispatchKey, command: A::Command },
    /// Execute an adapter command, then reply with `Adapter`
    Command { key: DispatchKey, command: A::Command },
    /// Reply with `StartedRun` carrying the current time
    RecordStart { key: DispatchKey },
    /// Reply with `StopRun` carrying the current time
    RecordStop { key: DispatchKey, summary: Summary },
    /// Full status table, replacing any previous snapshot
    BroadcastStatus(StatusSnapshot),
    PersistScreenshots { key: DispatchKey, paths: Vec<String> },
    /// Per-run output with its timing footer
    Log { key: DispatchKey, summary: Summary },
    /// Final report; the host should exit after this
    Finish(Summary),
}

pub struct Orchestrator<A: SessionAdapter> {
    adapter: A,
    tree: RunNode,
    flags: RunFlags,
    dispatched: bool,
    finished: bool,
    statuses: StatusTable,
    summaries: HashMap<DispatchKey, Summary>,
    sessions: HashMap<DispatchKey, A::State>,
    /// Finalized runs whose `StopRun` has not arrived yet
    stopping: HashSet<DispatchKey>,
    init_times: HashMap<DispatchKey, DateTime<Utc>>,
    start_times: HashMap<DispatchKey, DateTime<Utc>>,
    global: Summary,
}

impl<A: SessionAdapter> Orchestrator<A> {
    pub fn new(adapter: A, tree: RunNode, flags: RunFlags) -> Self {
        Self {
            adapter,
            tree,
            flags,
            dispatched: false,
            finished: false,
            statuses: StatusTable::new(),
            summaries: HashMap::new(),
            sessions: HashMap::new(),
            stopping: HashSet::new(),
            init_times: HashMap::new(),
            start_times: HashMap::new(),
            global: Summary::new(),
        }
    }

    /// Create the orchestrator and dispatch the suite
    pub fn begin(adapter: A, tree: RunNode, flags: RunFlags) -> (Self, Vec<Effect<A>>) {
        let mut orchestrator = Self::new(adapter, tree, flags);
        let effects = orchestrator.process_event(Event::Begin);
        (orchestrator, effects)
    }

    pub fn statuses(&self) -> &StatusTable {
        &self.statuses
    }

    pub fn global(&self) -> &Summary {
        &self.global
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The sole state transition
    pub fn process_event(&mut self, event: Event<A>) -> Vec<Effect<A>> {
        match event {
            Event::Begin => self.dispatch(),
            Event::StartRun { key, command, at } => self.start_run(key, command, at),
            Event::StartedRun { key, at } => {
                if self.statuses.contains(&key) {
                    self.start_times.insert(key, at);
                } else {
                    debug!("Ignoring start time for unknown run {}", key);
                }
                Vec::new()
            }
            Event::StopRun { key, summary, at } => self.stop_run(key, summary, at),
            Event::Adapter { key, event } => self.route(key, event),
        }
    }

    fn dispatch(&mut self) -> Vec<Effect<A>> {
        if self.dispatched {
            warn!("Suite already dispatched, ignoring repeated begin");
            return Vec::new();
        }
        self.dispatched = true;

        let selected = select(flatten(&self.tree), self.flags.filter.as_deref());
        info!(
            "Dispatching {} run(s){}",
            selected.len(),
            self.flags
                .filter
                .as_deref()
                .map(|f| format!(" matching {:?}", f))
                .unwrap_or_default()
        );

        // Nothing will ever finalize, so report right away
        if selected.is_empty() {
            self.finished = true;
            self.global.finalize(0.0);
            return vec![Effect::Finish(self.global.clone())];
        }

        let mut effects = Vec::with_capacity(selected.len() + 1);
        for (key, run) in selected {
            let status = RunStatus::new(run.steps.len());
            let (state, command) = self.adapter.init(run.steps);
            self.sessions.insert(key.clone(), state);
            self.summaries.insert(key.clone(), Summary::new());
            self.statuses.insert(key.clone(), status);
            effects.push(Effect::BeginSession { key, command });
        }
        effects.push(Effect::BroadcastStatus(self.statuses.snapshot()));
        effects
    }

    fn start_run(&mut self, key: DispatchKey, command: A::Command, at: DateTime<Utc>) -> Vec<Effect<A>> {
        if !self.sessions.contains_key(&key) {
            debug!("Ignoring start of unknown run {}", key);
            return Vec::new();
        }
        self.init_times.insert(key.clone(), at);
        vec![Effect::Command { key, command }]
    }

    fn route(&mut self, key: DispatchKey, event: A::Event) -> Vec<Effect<A>> {
        let Some(state) = self.sessions.remove(&key) else {
            debug!("Ignoring event for finished or unknown run {}", key);
            return Vec::new();
        };

        let (state, command, signal) = self.adapter.update(event, state);
        match signal {
            ProgressSignal::Spawned => {
                debug!("Run {} spawned", key);
                self.sessions.insert(key.clone(), state);
                vec![
                    Effect::RecordStart { key: key.clone() },
                    Effect::Command { key, command },
                ]
            }
            ProgressSignal::Progress {
                remaining,
                result,
                next_step,
            } => {
                self.sessions.insert(key.clone(), state);
                let summary = self.summaries.entry(key.clone()).or_default();
                summary.record(&result);
                let has_failures = summary.has_failures();
                if let Some(status) = self.statuses.get_mut(&key) {
                    status.advance(remaining, has_failures, next_step);
                }
                vec![
                    Effect::Command { key, command },
                    Effect::BroadcastStatus(self.statuses.snapshot()),
                ]
            }
            ProgressSignal::Finalized => {
                let mut effects = vec![Effect::Command {
                    key: key.clone(),
                    command,
                }];
                effects.extend(self.finalize_run(key));
                effects
            }
            ProgressSignal::None => {
                self.sessions.insert(key.clone(), state);
                vec![Effect::Command { key, command }]
            }
        }
    }

    /// Roll a finished run's counts into the suite totals
    fn finalize_run(&mut self, key: DispatchKey) -> Vec<Effect<A>> {
        let summary = self.summaries.remove(&key).unwrap_or_default();
        self.global.absorb_counts(&summary);
        self.stopping.insert(key.clone());
        debug!(
            "Run {} finalized: {} passed, {} failed, {} active",
            key,
            summary.passed,
            summary.failed,
            self.sessions.len()
        );

        let paths = summary.screenshots.clone();
        vec![
            Effect::RecordStop {
                key: key.clone(),
                summary,
            },
            Effect::PersistScreenshots { key, paths },
        ]
    }

    fn stop_run(&mut self, key: DispatchKey, summary: Summary, at: DateTime<Utc>) -> Vec<Effect<A>> {
        self.stopping.remove(&key);

        let init = self.init_times.get(&key).copied().unwrap_or(at);
        let start = self.start_times.get(&key).copied().unwrap_or(at);
        let waited = seconds_between(init, start);
        let elapsed = seconds_between(start, at);

        let mut effects = vec![Effect::Log {
            key,
            summary: summary.with_timing(elapsed, waited),
        }];

        if let Some(report) = self.try_finish(at) {
            effects.push(Effect::Finish(report));
        }
        effects
    }

    fn try_finish(&mut self, at: DateTime<Utc>) -> Option<Summary> {
        if !self.dispatched || self.finished || !self.sessions.is_empty() || !self.stopping.is_empty() {
            return None;
        }
        self.finished = true;

        let suite_start = self.start_times.values().min().copied().unwrap_or(at);
        self.global.finalize(seconds_between(suite_start, at));
        info!(
            "Suite finished: {} passed, {} failed",
            self.global.passed, self.global.failed
        );
        Some(self.global.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::types::{Step, StepAction};
    use crate::runner::state::WAITING_FOR_START;
    use crate::runner::summary::{Expectation, StepResult};
    use chrono::Duration;
    use std::sync::Arc;

    /// Adapter whose transport events are fed in directly by the test
    struct ScriptedAdapter;

    #[derive(Debug, PartialEq)]
    enum Cmd {
        Open,
        Next,
        Idle,
    }

    enum Ev {
        Opened,
        Done(StepResult),
        Closed,
        Noise,
    }

    impl SessionAdapter for ScriptedAdapter {
        type State = usize;
        type Command = Cmd;
        type Event = Ev;

        fn init(&self, steps: Arc<[Step]>) -> (usize, Cmd) {
            (steps.len(), Cmd::Open)
        }

        fn update(&self, event: Ev, remaining: usize) -> (usize, Cmd, ProgressSignal) {
            match event {
                Ev::Opened => (remaining, Cmd::Next, ProgressSignal::Spawned),
                Ev::Done(result) => {
                    let remaining = remaining.saturating_sub(1);
                    (
                        remaining,
                        Cmd::Next,
                        ProgressSignal::Progress {
                            remaining,
                            result,
                            next_step: format!("{} left", remaining),
                        },
                    )
                }
                Ev::Closed => (remaining, Cmd::Idle, ProgressSignal::Finalized),
                Ev::Noise => (remaining, Cmd::Idle, ProgressSignal::None),
            }
        }
    }

    fn steps(n: u64) -> Vec<Step> {
        (0..n).map(|i| Step::new(StepAction::Wait(i))).collect()
    }

    fn fail(description: &str) -> StepResult {
        StepResult::failed(description, Expectation::fail("boom"))
    }

    fn key(index: usize, name: &str) -> DispatchKey {
        DispatchKey::new(index, name)
    }

    fn adapter_event(
        orchestrator: &mut Orchestrator<ScriptedAdapter>,
        key: &DispatchKey,
        event: Ev,
    ) -> Vec<Effect<ScriptedAdapter>> {
        orchestrator.process_event(Event::Adapter {
            key: key.clone(),
            event,
        })
    }

    fn finish_of(effects: &[Effect<ScriptedAdapter>]) -> Option<&Summary> {
        effects.iter().find_map(|e| match e {
            Effect::Finish(s) => Some(s),
            _ => None,
        })
    }

    fn take_stop(effects: Vec<Effect<ScriptedAdapter>>) -> (DispatchKey, Summary) {
        effects
            .into_iter()
            .find_map(|e| match e {
                Effect::RecordStop { key, summary } => Some((key, summary)),
                _ => None,
            })
            .expect("finalize should request a stop time")
    }

    #[test]
    fn test_begin_dispatches_every_run() {
        let tree = RunNode::group(
            "A",
            vec![
                RunNode::leaf("x", steps(2)),
                RunNode::group("B", vec![RunNode::leaf("y", steps(1))]),
            ],
        );
        let (orchestrator, effects) = Orchestrator::begin(ScriptedAdapter, tree, RunFlags::default());

        assert_eq!(effects.len(), 3);
        assert!(matches!(
            &effects[0],
            Effect::BeginSession { key, command: Cmd::Open } if key.to_string() == "0 - A / x"
        ));
        assert!(matches!(
            &effects[1],
            Effect::BeginSession { key, .. } if key.to_string() == "1 - A / B / y"
        ));
        let Effect::BroadcastStatus(snapshot) = &effects[2] else {
            panic!("expected an initial status broadcast");
        };
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].1.total, 2);
        assert_eq!(snapshot[0].1.remaining, 2);
        assert!(!snapshot[0].1.failed);
        assert_eq!(snapshot[0].1.next_step, WAITING_FOR_START);
        assert_eq!(orchestrator.active_sessions(), 2);
    }

    #[test]
    fn test_filter_keys_by_filtered_position() {
        let tree = RunNode::group(
            "root",
            vec![
                RunNode::group("Login", vec![RunNode::leaf("smoke", steps(1))]),
                RunNode::group("Signup", vec![RunNode::leaf("smoke", steps(1))]),
                RunNode::group("Login", vec![RunNode::leaf("fail", steps(1))]),
            ],
        );
        let flags = RunFlags {
            filter: Some("Login".to_string()),
        };
        let (_, effects) = Orchestrator::begin(ScriptedAdapter, tree, flags);

        let keys: Vec<_> = effects
            .iter()
            .filter_map(|e| match e {
                Effect::BeginSession { key, .. } => Some(key.to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(keys, vec!["0 - root / Login / smoke", "1 - root / Login / fail"]);
    }

    #[test]
    fn test_empty_suite_finishes_immediately() {
        let tree = RunNode::group("A", vec![RunNode::leaf("x", steps(1))]);
        let flags = RunFlags {
            filter: Some("nothing matches".to_string()),
        };
        let (orchestrator, effects) = Orchestrator::begin(ScriptedAdapter, tree, flags);

        assert_eq!(effects.len(), 1);
        let report = finish_of(&effects).expect("empty suite should finish");
        assert_eq!(report.passed, 0);
        assert_eq!(report.failed, 0);
        assert!(report.output.starts_with("\n\nOK. 0 assertions passed."));
        assert!(orchestrator.is_finished());
        assert!(orchestrator.statuses().is_empty());
    }

    #[test]
    fn test_repeated_begin_is_ignored() {
        let tree = RunNode::leaf("x", steps(1));
        let (mut orchestrator, _) = Orchestrator::begin(ScriptedAdapter, tree, RunFlags::default());
        assert!(orchestrator.process_event(Event::Begin).is_empty());
        assert_eq!(orchestrator.active_sessions(), 1);
    }

    #[test]
    fn test_end_to_end_pass_and_fail() {
        let tree = RunNode::leaf("A", steps(2));
        let (mut orchestrator, _) = Orchestrator::begin(ScriptedAdapter, tree, RunFlags::default());
        let k = key(0, "A");
        let t0 = Utc::now();

        let effects = orchestrator.process_event(Event::StartRun {
            key: k.clone(),
            command: Cmd::Open,
            at: t0,
        });
        assert!(matches!(&effects[..], [Effect::Command { command: Cmd::Open, .. }]));

        let effects = adapter_event(&mut orchestrator, &k, Ev::Opened);
        assert!(matches!(effects[0], Effect::RecordStart { .. }));
        orchestrator.process_event(Event::StartedRun {
            key: k.clone(),
            at: t0 + Duration::milliseconds(500),
        });

        let effects = adapter_event(&mut orchestrator, &k, Ev::Done(StepResult::passed("one")));
        let Effect::BroadcastStatus(snapshot) = &effects[1] else {
            panic!("progress should broadcast");
        };
        assert_eq!(snapshot[0].1.remaining, 1);
        assert!(!snapshot[0].1.failed);

        let effects = adapter_event(&mut orchestrator, &k, Ev::Done(fail("two")));
        let Effect::BroadcastStatus(snapshot) = &effects[1] else {
            panic!("progress should broadcast");
        };
        assert_eq!(snapshot[0].1.remaining, 0);
        assert!(snapshot[0].1.failed);

        let effects = adapter_event(&mut orchestrator, &k, Ev::Closed);
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::PersistScreenshots { paths, .. } if paths.is_empty())));
        assert_eq!(orchestrator.active_sessions(), 0);
        assert!(orchestrator.statuses().contains(&k));
        let (stop_key, summary) = take_stop(effects);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);

        let effects = orchestrator.process_event(Event::StopRun {
            key: stop_key,
            summary,
            at: t0 + Duration::milliseconds(2500),
        });
        let Effect::Log { summary: logged, .. } = &effects[0] else {
            panic!("stop should log the run");
        };
        assert!(logged.output.starts_with("✅  one\n❌  two\n    boom\n\n"));
        assert!(logged.output.ends_with("Took 2.00s. Waited 0.50s for dispatch"));

        let report = finish_of(&effects).expect("last stop should finish the suite");
        assert_eq!(report.passed, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(
            report.output,
            "\n\nFailed: 1 assertions failed, 1 assertions passed. Took 2.00s in total."
        );
        assert_eq!(report.exit_code(), 1);
        assert_eq!(orchestrator.global().output, report.output);
    }

    #[test]
    fn test_failed_flag_never_clears() {
        let tree = RunNode::leaf("A", steps(3));
        let (mut orchestrator, _) = Orchestrator::begin(ScriptedAdapter, tree, RunFlags::default());
        let k = key(0, "A");

        adapter_event(&mut orchestrator, &k, Ev::Opened);
        adapter_event(&mut orchestrator, &k, Ev::Done(fail("one")));
        adapter_event(&mut orchestrator, &k, Ev::Done(StepResult::passed("two")));
        adapter_event(&mut orchestrator, &k, Ev::Done(StepResult::passed("three")));

        let status = orchestrator.statuses().get(&k).unwrap();
        assert!(status.failed);
        assert_eq!(status.remaining, 0);
        assert_eq!(status.next_step, "0 left");
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let tree = RunNode::leaf("A", steps(1));
        let (mut orchestrator, _) = Orchestrator::begin(ScriptedAdapter, tree, RunFlags::default());
        let stranger = key(7, "nobody");

        assert!(adapter_event(&mut orchestrator, &stranger, Ev::Opened).is_empty());
        assert!(orchestrator
            .process_event(Event::StartRun {
                key: stranger.clone(),
                command: Cmd::Open,
                at: Utc::now(),
            })
            .is_empty());

        // After finalizing, late events for the same run are dropped too
        let k = key(0, "A");
        adapter_event(&mut orchestrator, &k, Ev::Closed);
        assert!(adapter_event(&mut orchestrator, &k, Ev::Noise).is_empty());
    }

    #[test]
    fn test_noise_forwards_command_only() {
        let tree = RunNode::leaf("A", steps(1));
        let (mut orchestrator, _) = Orchestrator::begin(ScriptedAdapter, tree, RunFlags::default());
        let effects = adapter_event(&mut orchestrator, &key(0, "A"), Ev::Noise);
        assert!(matches!(&effects[..], [Effect::Command { command: Cmd::Idle, .. }]));
        assert_eq!(orchestrator.active_sessions(), 1);
    }

    #[test]
    fn test_stop_without_timing_defaults_to_zero() {
        let tree = RunNode::group(
            "G",
            vec![RunNode::leaf("a", steps(1)), RunNode::leaf("b", steps(1))],
        );
        let (mut orchestrator, _) = Orchestrator::begin(ScriptedAdapter, tree, RunFlags::default());

        let effects = orchestrator.process_event(Event::StopRun {
            key: key(9, "never dispatched"),
            summary: Summary::new(),
            at: Utc::now(),
        });
        assert_eq!(effects.len(), 1);
        let Effect::Log { summary, .. } = &effects[0] else {
            panic!("expected a log line");
        };
        assert_eq!(summary.output, "Took 0.00s. Waited 0.00s for dispatch");
    }

    #[test]
    fn test_finish_waits_for_every_stop() {
        let tree = RunNode::group(
            "G",
            vec![RunNode::leaf("a", steps(1)), RunNode::leaf("b", steps(1))],
        );
        let (mut orchestrator, _) = Orchestrator::begin(ScriptedAdapter, tree, RunFlags::default());
        let a = key(0, "G / a");
        let b = key(1, "G / b");
        let now = Utc::now();

        adapter_event(&mut orchestrator, &a, Ev::Done(StepResult::passed("a1")));
        adapter_event(&mut orchestrator, &b, Ev::Done(StepResult::captured("b1", "b1.png")));
        let stop_a = take_stop(adapter_event(&mut orchestrator, &a, Ev::Closed));
        let stop_b = take_stop(adapter_event(&mut orchestrator, &b, Ev::Closed));
        assert_eq!(stop_b.1.screenshots, vec!["b1.png"]);

        let effects = orchestrator.process_event(Event::StopRun {
            key: stop_a.0,
            summary: stop_a.1,
            at: now,
        });
        assert!(finish_of(&effects).is_none(), "b has not stopped yet");

        let effects = orchestrator.process_event(Event::StopRun {
            key: stop_b.0,
            summary: stop_b.1,
            at: now,
        });
        let report = finish_of(&effects).expect("suite should finish");
        // Screenshot-only steps do not count towards the totals
        assert_eq!(report.passed + report.failed, 1);
        assert_eq!(report.exit_code(), 0);

        let effects = orchestrator.process_event(Event::StopRun {
            key: key(0, "G / a"),
            summary: Summary::new(),
            at: now,
        });
        assert!(finish_of(&effects).is_none(), "finish is emitted once");
    }
}
