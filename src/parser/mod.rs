pub mod error;
pub mod types;
pub mod yaml;

pub use error::SuiteError;
pub use types::*;
pub use yaml::parse_suite_path;
