use thiserror::Error;

/// Startup configuration failures. All are fatal: the job does not proceed.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("{0:?} is not a valid table name")]
    InvalidTable(String),

    #[error("no tracked handles configured")]
    EmptyRoster,
}
