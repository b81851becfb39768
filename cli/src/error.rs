//! Error handling for the Veristat CLI

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Service error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;

impl CliError {
    /// Exit code for the shell: network and decode problems are
    /// distinguishable from service-side rejections.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Network(_) => 2,
            CliError::Api { .. } => 3,
            CliError::Decode(_) => 4,
        }
    }
}

/// Render an error for the terminal
pub fn format_error(error: &CliError) -> String {
    format!("error: {error}")
}
