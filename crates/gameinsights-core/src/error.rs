use thiserror::Error;

/// Validation and contract errors exposed by `gameinsights-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("app id cannot be empty")]
    EmptyAppId,
    #[error("steam id must be a 64-bit decimal account id: '{value}'")]
    InvalidSteamId { value: String },

    #[error(
        "invalid source '{value}', expected one of steamstore, gamalytic, steamspy, steamcharts, \
         steamreview, steamachievements, protondb, howlongtobeat"
    )]
    InvalidSource { value: String },

    #[error("unknown canonical field '{value}'")]
    UnknownField { value: String },
    #[error("recap key '{key}' is not a field of canonical schema {schema_version}")]
    UnknownRecapKey {
        key: String,
        schema_version: &'static str,
    },
    #[error("recap key set must not be empty")]
    EmptyRecapKeys,

    #[error("reviews per page must be between 1 and 100, got {value}")]
    InvalidReviewPageSize { value: u32 },

    #[error("rate limit must allow at least one call per window")]
    ZeroRateLimitCalls,
    #[error("rate limit window must be longer than zero")]
    ZeroRateLimitPeriod,

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },

    #[error("request_id must be at least 8 characters")]
    InvalidRequestId,
    #[error("schema_version must match vMAJOR.MINOR.PATCH: '{value}'")]
    InvalidSchemaVersion { value: String },
    #[error("source_chain must contain at least one source")]
    EmptySourceChain,

    #[error("error code cannot be empty")]
    EmptyErrorCode,
    #[error("error message cannot be empty")]
    EmptyErrorMessage,
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
