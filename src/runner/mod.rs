pub mod adapter;
pub mod events;
pub mod host;
pub mod orchestrator;
pub mod state;
pub mod summary;
pub mod tree;

use anyhow::Result;
use std::sync::Arc;

use crate::driver::DriverFactory;
use crate::parser::types::{RunNode, Suite};
use crate::session::{SessionPool, StepOptions, StepSession};
use crate::utils::config::Config;

pub use events::*;
pub use orchestrator::{Effect, Event, Orchestrator, RunFlags};
pub use state::*;
pub use summary::{Expectation, StepResult, Summary};

/// Run a parsed suite to completion and return the final report.
///
/// Progress is drawn on the console while the suite runs, and any
/// screenshots are listed in `<output>/screenshots.json` afterwards.
pub async fn run_suite(
    suite: Suite,
    config: &Config,
    flags: RunFlags,
    factory: Arc<dyn DriverFactory>,
) -> Result<Summary> {
    let (emitter, receiver) = EventEmitter::new();
    let listener = tokio::spawn(ConsoleEventListener::listen(receiver));

    let pool = Arc::new(SessionPool::new(factory, StepOptions::from(config)));
    let (orchestrator, effects) = Orchestrator::begin(StepSession, suite.root, flags);
    let outcome = host::drive(orchestrator, effects, pool, &emitter).await;

    // Closing the channel lets the listener print what is left and exit
    drop(emitter);
    let _ = listener.await;
    let outcome = outcome?;

    if !outcome.manifest.is_empty() {
        let path = outcome.manifest.write(&config.output_dir)?;
        log::info!("Screenshot manifest written to {}", path.display());
    }

    Ok(outcome.summary)
}

/// Dispatch keys a run with `filter` would start, in order
pub fn list_runs(root: &RunNode, filter: Option<&str>) -> Vec<DispatchKey> {
    tree::select(tree::flatten(root), filter)
        .into_iter()
        .map(|(key, _)| key)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::types::{Step, StepAction};

    #[test]
    fn test_list_runs_applies_filter() {
        let step = || vec![Step::new(StepAction::Navigate("/".to_string()))];
        let root = RunNode::group(
            "app",
            vec![
                RunNode::leaf("login", step()),
                RunNode::group("cart", vec![RunNode::leaf("checkout", step())]),
            ],
        );

        let all = list_runs(&root, None);
        assert_eq!(
            all.iter().map(|k| k.to_string()).collect::<Vec<_>>(),
            vec!["0 - app / login", "1 - app / cart / checkout"]
        );

        let cart = list_runs(&root, Some("cart"));
        assert_eq!(cart, vec![DispatchKey::new(0, "app / cart / checkout")]);
    }
}
