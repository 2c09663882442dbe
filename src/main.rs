use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use lumi_suite::driver::web::{WebDriverConfig, WebDriverFactory};
use lumi_suite::parser::{parse_suite_path, BrowserKind};
use lumi_suite::runner::{self, RunFlags};
use lumi_suite::utils::config::Config;

#[derive(Parser)]
#[command(name = "lumi-suite")]
#[command(author = "NL Team")]
#[command(version = "0.1.0")]
#[command(about = "Parallel browser test-suite runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a suite file or directory
    Run {
        /// Path to suite file or directory
        path: PathBuf,

        /// Only run tests whose qualified name contains this text (case-sensitive)
        #[arg(short, long)]
        filter: Option<String>,

        /// Browser engine (chromium, firefox, webkit)
        #[arg(short, long)]
        browser: Option<String>,

        /// Run without a visible browser window
        #[arg(long)]
        headless: bool,

        /// Base URL for relative navigate steps
        #[arg(long)]
        base_url: Option<String>,

        /// Output directory for screenshots and the screenshot manifest
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Per-step timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Do not capture a screenshot when a step fails
        #[arg(long, default_value = "false")]
        no_failure_screenshots: bool,
    },

    /// List the tests a run would start, without launching browsers
    List {
        /// Path to suite file or directory
        path: PathBuf,

        /// Only list tests whose qualified name contains this text
        #[arg(short, long)]
        filter: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            path,
            filter,
            browser,
            headless,
            base_url,
            output,
            timeout_ms,
            no_failure_screenshots,
        } => {
            let suite = parse_suite_path(&path)?;

            // defaults < environment < suite header < flags
            let mut config = Config::from_env();
            config.apply_header(&suite.header);
            if let Some(ref b) = browser {
                config.browser = BrowserKind::parse(b)
                    .ok_or_else(|| anyhow::anyhow!("Unknown browser: {}", b))?;
            }
            if headless {
                config.headless = true;
            }
            if base_url.is_some() {
                config.base_url = base_url;
            }
            if let Some(dir) = output {
                config.output_dir = dir;
            }
            if let Some(ms) = timeout_ms {
                config.step_timeout_ms = ms;
            }
            if no_failure_screenshots {
                config.screenshot_on_failure = false;
            }

            println!(
                "{} Running suite from: {}",
                "▶".green().bold(),
                path.display()
            );
            if let Some(ref name) = suite.header.name {
                println!("  Suite: {}", name.cyan());
            }
            println!("  Browser: {}", format!("{:?}", config.browser).cyan());
            if let Some(ref f) = filter {
                println!("  Filter: {}", f.yellow());
            }
            println!("  Output: {}", config.output_dir.display().to_string().cyan());

            let factory = WebDriverFactory::new(WebDriverConfig::from(&config)).await?;
            let summary =
                runner::run_suite(suite, &config, RunFlags { filter }, Arc::new(factory)).await?;

            std::process::exit(summary.exit_code());
        }

        Commands::List { path, filter } => {
            let suite = parse_suite_path(&path)?;
            let keys = runner::list_runs(&suite.root, filter.as_deref());
            if keys.is_empty() {
                println!("{} No tests match.", "ℹ".blue());
            }
            for key in keys {
                println!("{}", key);
            }
        }
    }

    Ok(())
}
