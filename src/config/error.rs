use std::io;

use thiserror::Error;

use crate::errors::WizardError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serde(String),

    #[error("Invalid wizard definition: {0}")]
    Definition(#[from] WizardError),

    #[error("No configuration directory available on this platform")]
    NoConfigDir,
}
