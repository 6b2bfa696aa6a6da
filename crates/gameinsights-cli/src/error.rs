use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] gameinsights_core::ValidationError),

    #[error("No appids supplied")]
    NoAppIds,

    #[error("No steamids supplied")]
    NoSteamIds,

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::NoAppIds => 2,
            Self::NoSteamIds => 2,
            Self::Serialization(_) => 4,
            Self::Csv(_) => 4,
            Self::Io(_) => 10,
        }
    }
}
