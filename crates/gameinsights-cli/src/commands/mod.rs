mod collect;
mod reviews;
mod sources;
mod users;

use std::time::Duration;

use gameinsights_core::{CollectorConfig, Envelope, EnvelopeError, SourceError, SourceId};
use serde_json::Value;

use crate::cli::{Cli, Command, ProviderArgs};
use crate::error::CliError;
use crate::output::Table;

/// Everything a command hands to the renderer.
pub struct CommandResult {
    pub envelope: Envelope<Value>,
    /// Row view used by `--format csv`.
    pub table: Table,
    /// Any requested identifier failed or was cancelled.
    pub has_failures: bool,
}

pub async fn run(cli: &Cli) -> Result<CommandResult, CliError> {
    match &cli.command {
        Command::Collect(args) => collect::run(args).await,
        Command::Sources(args) => sources::run(args),
        Command::Reviews(args) => reviews::run(args).await,
        Command::Users(args) => users::run(args).await,
    }
}

/// Envelope error for one failed call, keyed like the collect errors.
fn source_error(
    source: SourceId,
    identifier: &str,
    error: &SourceError,
) -> Result<EnvelopeError, CliError> {
    let message = if error.message().trim().is_empty() {
        error.kind().as_str().to_owned()
    } else {
        error.message().to_owned()
    };
    Ok(
        EnvelopeError::new(format!("source.{}", error.kind().as_str()), message)?
            .with_retryable(error.retryable())
            .with_source(source)
            .with_app_id(identifier),
    )
}

/// Environment overlaid with command-line flags.
fn collector_config(args: &ProviderArgs) -> Result<CollectorConfig, CliError> {
    let mut config = CollectorConfig::from_env();

    if let Some(region) = &args.region {
        config = config.with_region(region.as_str());
    }
    if let Some(language) = &args.language {
        config = config.with_language(language.as_str());
    }
    if let Some(key) = &args.steam_api_key {
        config = config.with_steam_api_key(key.as_str());
    }
    if let Some(key) = &args.gamalytic_api_key {
        config = config.with_gamalytic_api_key(key.as_str());
    }
    if args.calls.is_some() || args.period.is_some() {
        let current = config.aggregate_limit;
        let calls = args
            .calls
            .or(current.map(|limit| limit.calls()))
            .unwrap_or(gameinsights_core::provider_policy::DEFAULT_QUOTA_LIMIT);
        let period = args
            .period
            .map(Duration::from_secs)
            .or(current.map(|limit| limit.period()))
            .unwrap_or(gameinsights_core::provider_policy::DEFAULT_QUOTA_WINDOW);
        config = config.with_aggregate_limit(calls, period)?;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config = config.with_fetch_timeout(Duration::from_millis(timeout_ms));
    }
    if let Some(max_in_flight) = args.max_in_flight {
        config = config.with_max_in_flight(max_in_flight);
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use gameinsights_core::ValidationError;

    use super::*;

    #[test]
    fn flags_override_aggregate_limit() {
        let args = ProviderArgs {
            calls: Some(5),
            period: Some(2),
            timeout_ms: Some(1500),
            region: Some(String::from("de")),
            ..ProviderArgs::default()
        };

        let config = collector_config(&args).expect("valid flags");
        let limit = config.aggregate_limit.expect("limit set");

        assert_eq!(limit.calls(), 5);
        assert_eq!(limit.period(), Duration::from_secs(2));
        assert_eq!(config.fetch_timeout, Duration::from_millis(1500));
        assert_eq!(config.region, "de");
    }

    #[test]
    fn zero_calls_is_a_validation_error() {
        let args = ProviderArgs {
            calls: Some(0),
            ..ProviderArgs::default()
        };

        let error = collector_config(&args).err().expect("must fail");
        assert!(matches!(
            error,
            CliError::Validation(ValidationError::ZeroRateLimitCalls)
        ));
    }
}
