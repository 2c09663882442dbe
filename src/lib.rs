pub mod driver;
pub mod parser;
pub mod report;
pub mod runner;
pub mod session;
pub mod utils;

// Re-export common items
pub use parser::parse_suite_path;
pub use runner::{list_runs, run_suite};
