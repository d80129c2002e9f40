use ferroquote_core::ServiceError;
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ferroquote_core::ConfigError),

    #[error(transparent)]
    Validation(#[from] ferroquote_core::ValidationError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Validation(_) => 2,
            Self::Service(error) => service_exit_code(error),
            Self::Serialization(_) => 10,
            Self::Io(_) => 10,
        }
    }
}

pub const fn service_exit_code(error: &ServiceError) -> u8 {
    match error {
        ServiceError::Validation(_) => 2,
        ServiceError::Fetch(_) => 3,
        ServiceError::Timeout { .. } => 4,
    }
}
