use gameinsights_core::{
    ActivePlayerTable, BatchEntry, BatchResult, CancelSignal, CollectRequest, Collector, Envelope,
    Field, RecapProjector, SourceSelection,
};
use serde_json::Value;
use tracing::{info, warn};

use crate::cli::{CollectArgs, CollectMode};
use crate::error::CliError;
use crate::output::{cell, Table};

use super::{collector_config, CommandResult};

pub async fn run(args: &CollectArgs) -> Result<CommandResult, CliError> {
    let request = build_request(args)?;
    let collector = Collector::from_config(collector_config(&args.provider)?)?;

    let cancel = CancelSignal::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling remaining appids");
            on_interrupt.cancel();
        }
    });
    let batch = collector.collect_with_cancel(&request, cancel).await;
    interrupt.abort();

    let summary = batch.summary();
    info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        cancelled = summary.cancelled,
        "collection finished"
    );

    match args.mode {
        CollectMode::Records => records_result(&batch, request.recap),
        CollectMode::ActivePlayer => active_player_result(&batch, args.fill_missing),
    }
}

fn build_request(args: &CollectArgs) -> Result<CollectRequest, CliError> {
    if args.appids.is_empty() {
        return Err(CliError::NoAppIds);
    }

    // The active-player table reads the series, which recaps drop.
    let recap = args.recap && args.mode == CollectMode::Records;
    let mut request = CollectRequest::parse(&args.appids)?.with_recap(recap);
    if !args.sources.is_empty() {
        request = request.with_sources(SourceSelection::parse(&args.sources)?);
    }
    Ok(request)
}

fn records_result(batch: &BatchResult, recap: bool) -> Result<CommandResult, CliError> {
    let fields = if recap {
        RecapProjector::new()?.fields().to_vec()
    } else {
        Field::ALL.to_vec()
    };

    let rows = batch
        .entries()
        .iter()
        .filter_map(|entry| match entry {
            BatchEntry::Record { record, .. } => Some(
                fields
                    .iter()
                    .map(|field| cell(*field, Some(record.get(*field))))
                    .collect(),
            ),
            BatchEntry::Recap { recap, .. } => Some(
                fields
                    .iter()
                    .map(|field| cell(*field, recap.get(*field)))
                    .collect(),
            ),
            BatchEntry::Failed(_) | BatchEntry::Cancelled { .. } => None,
        })
        .collect();

    let envelope = batch.to_envelope()?;
    Ok(CommandResult {
        envelope: Envelope::with_errors(envelope.meta, Value::Array(envelope.data), envelope.errors)?,
        table: Table {
            headers: fields.iter().map(|field| field.as_str().to_owned()).collect(),
            rows,
        },
        has_failures: batch.has_failures(),
    })
}

fn active_player_result(batch: &BatchResult, fill_missing: i64) -> Result<CommandResult, CliError> {
    let table = ActivePlayerTable::from_batch(batch, fill_missing);
    let envelope = batch.to_envelope()?;

    Ok(CommandResult {
        envelope: Envelope::with_errors(
            envelope.meta,
            serde_json::to_value(&table)?,
            envelope.errors,
        )?,
        table: Table {
            headers: table.headers(),
            rows: table.text_rows(),
        },
        has_failures: batch.has_failures(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use gameinsights_core::{SourceId, StaticSource};
    use serde_json::json;

    use crate::cli::ProviderArgs;

    use super::*;

    fn args(appids: &[&str], sources: &[&str]) -> CollectArgs {
        CollectArgs {
            appids: appids.iter().map(|id| (*id).to_owned()).collect(),
            sources: sources.iter().map(|source| (*source).to_owned()).collect(),
            recap: true,
            mode: CollectMode::Records,
            fill_missing: -1,
            provider: ProviderArgs::default(),
        }
    }

    #[test]
    fn no_appids_is_rejected() {
        let error = build_request(&args(&[], &[])).err().expect("must fail");

        assert!(matches!(error, CliError::NoAppIds));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn unknown_source_is_a_validation_error() {
        let error = build_request(&args(&["570"], &["steamdb"]))
            .err()
            .expect("must fail");

        assert!(matches!(error, CliError::Validation(_)));
    }

    #[test]
    fn active_player_mode_disables_recap() {
        let mut args = args(&["570", "730"], &["steamcharts"]);
        args.mode = CollectMode::ActivePlayer;

        let request = build_request(&args).expect("valid request");

        assert!(!request.recap);
        assert_eq!(request.app_ids.len(), 2);
    }

    #[tokio::test]
    async fn active_player_table_keeps_failed_appids() {
        let charts = StaticSource::new(SourceId::SteamCharts).respond(
            "570",
            json!({
                "name": "Dota 2",
                "peak_all_time": 1295114,
                "monthly": [{ "month": "2024-01", "average_players": 480000.0 }]
            }),
        );
        let collector = Collector::builder()
            .with_source(Arc::new(charts))
            .build()
            .expect("collector");
        let batch = collector
            .collect(&CollectRequest::parse(["570", "999999"]).expect("valid ids"))
            .await;

        let result = active_player_result(&batch, -1).expect("table");

        assert!(result.has_failures);
        assert_eq!(result.table.rows.len(), 2);
        assert_eq!(result.table.rows[1], vec!["999999", "", "-1", "-1"]);
        assert_eq!(result.envelope.data[1]["steam_appid"], "999999");
        assert_eq!(result.envelope.errors[0].code, "source.not_found");
    }
}
