use thiserror::Error;

/// Problems found while reading a suite definition
#[derive(Error, Debug)]
pub enum SuiteError {
    #[error("Suite file contains no runs")]
    Empty,

    #[error("Unknown step action '{0}'")]
    UnknownAction(String),

    #[error("Invalid parameters for '{action}': {reason}")]
    InvalidStep { action: String, reason: String },

    #[error("Node must contain either 'describe' + 'runs' or 'test' + 'steps' (found keys: {keys})")]
    MalformedNode { keys: String },

    #[error("'{field}' must be a non-empty string")]
    MissingName { field: &'static str },
}
