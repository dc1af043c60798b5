use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Device specifier errors
    #[error("Invalid MAC address: {0}")]
    InvalidMacAddress(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Lifecycle errors
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Cancelled: {0}")]
    Cancelled(String),
}

pub type Result<T> = std::result::Result<T, Error>;
