use super::state::{DispatchKey, RunStatus, StatusSnapshot};
use super::summary::Summary;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

/// Suite events for real-time display
#[derive(Debug, Clone)]
pub enum SuiteEvent {
    /// Full status table; replaces the previous one
    Status(StatusSnapshot),
    /// A run finished; `output` includes its timing footer
    RunLog { key: DispatchKey, output: String },
    /// Screenshots captured by a finished run
    Screenshots { key: DispatchKey, paths: Vec<String> },
    /// Final suite report
    Finished { summary: Summary },
}

/// Events buffered per subscriber before the oldest are dropped
pub const EVENT_CAPACITY: usize = 4096;

/// Event emitter for broadcasting suite events
pub struct EventEmitter {
    sender: broadcast::Sender<SuiteEvent>,
}

impl EventEmitter {
    pub fn new() -> (Self, broadcast::Receiver<SuiteEvent>) {
        let (sender, receiver) = broadcast::channel(EVENT_CAPACITY);
        (Self { sender }, receiver)
    }

    pub fn emit(&self, event: SuiteEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SuiteEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }
}

/// Console event listener drawing one progress bar per run
pub struct ConsoleEventListener;

impl ConsoleEventListener {
    pub async fn listen(mut receiver: broadcast::Receiver<SuiteEvent>) {
        use colored::Colorize;
        use indicatif::ProgressDrawTarget;
        use std::io::IsTerminal;

        // Piped output gets no bars, only the printed lines
        let multi = if std::io::stdout().is_terminal() {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };

        let style = ProgressStyle::default_bar()
            .template("{prefix} [{bar:24.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");

        let mut bars: HashMap<DispatchKey, ProgressBar> = HashMap::new();

        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                // The oldest events are gone, run logs included; keep going
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!(
                        "Console fell behind and dropped {} events; some run logs may be missing",
                        skipped
                    );
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            match event {
                SuiteEvent::Status(snapshot) => {
                    for (key, status) in snapshot {
                        let pb = bars.entry(key.clone()).or_insert_with(|| {
                            let pb = multi.add(ProgressBar::new(status.total as u64));
                            pb.set_style(style.clone());
                            pb
                        });
                        if pb.is_finished() {
                            continue;
                        }
                        render_status(pb, &key, &status);
                    }
                }

                SuiteEvent::RunLog { key, output } => {
                    if let Some(pb) = bars.get(&key) {
                        pb.finish();
                    }
                    let failed = output.contains("❌");
                    let marker = if failed { "✗".red() } else { "✓".green() };
                    multi
                        .println(format!("\n{} {}\n{}", marker, key.to_string().bold(), output))
                        .ok();
                }

                SuiteEvent::Screenshots { key, paths } => {
                    if !paths.is_empty() {
                        multi
                            .println(format!(
                                "  {} {} screenshot(s) from {}",
                                "📷".blue(),
                                paths.len(),
                                key
                            ))
                            .ok();
                    }
                }

                SuiteEvent::Finished { summary } => {
                    for (_, pb) in bars.drain() {
                        pb.finish();
                    }
                    // Written straight to stdout so it survives the bars being torn down
                    let text = if summary.has_failures() {
                        summary.output.red().bold()
                    } else {
                        summary.output.green().bold()
                    };
                    println!("{}", text);
                }
            }
        }
    }
}

fn render_status(pb: &ProgressBar, key: &DispatchKey, status: &RunStatus) {
    use colored::Colorize;

    let prefix = if status.failed {
        format!("{} {}", "✗".red(), key)
    } else {
        format!("{} {}", "▶".cyan(), key)
    };
    pb.set_prefix(prefix);
    pb.set_length(status.total as u64);
    pb.set_position(status.completed() as u64);
    pb.set_message(status.next_step.clone());
}
