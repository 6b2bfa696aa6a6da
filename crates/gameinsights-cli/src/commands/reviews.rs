use std::time::Instant;

use gameinsights_core::{
    AppId, Envelope, EnvelopeMeta, ReviewExporter, ReviewQuery, SourceId, SourcePayload,
    SCHEMA_VERSION,
};
use serde_json::Value;
use tracing::{info, warn};

use crate::cli::ReviewsArgs;
use crate::error::CliError;
use crate::output::Table;

use super::{collector_config, source_error, CommandResult};

pub async fn run(args: &ReviewsArgs) -> Result<CommandResult, CliError> {
    let app_id = AppId::parse(&args.appid)?;
    let query = build_query(args)?;
    let exporter = ReviewExporter::from_config(&collector_config(&args.provider)?)?;
    export(&exporter, &app_id, &query).await
}

fn build_query(args: &ReviewsArgs) -> Result<ReviewQuery, CliError> {
    let mut query = ReviewQuery {
        filter: args.filter.as_str().to_owned(),
        ..ReviewQuery::default()
    }
    .with_language(args.review_language.as_str())
    .with_review_type(args.review_type.as_str())
    .with_per_page(args.per_page);
    if let Some(limit) = args.limit {
        query = query.with_limit(limit);
    }
    query.validate()?;
    Ok(query)
}

async fn export(
    exporter: &ReviewExporter,
    app_id: &AppId,
    query: &ReviewQuery,
) -> Result<CommandResult, CliError> {
    let started = Instant::now();
    let outcome = exporter.export(app_id, query).await;
    let mut meta = EnvelopeMeta::new(
        uuid::Uuid::new_v4().to_string(),
        SCHEMA_VERSION,
        vec![SourceId::SteamReview],
        started.elapsed().as_millis() as u64,
    )?;

    match outcome {
        Ok(export) => {
            info!(app_id = %app_id, reviews = export.reviews.len(), pages = export.pages, "reviews exported");
            if !export.complete {
                meta.push_warning(format!(
                    "review listing for appid {app_id} stopped after {} pages",
                    export.pages
                ));
            }
            Ok(CommandResult {
                table: review_table(&export.reviews),
                has_failures: !export.complete,
                envelope: Envelope::success(meta, serde_json::to_value(&export)?),
            })
        }
        Err(error) => {
            warn!(app_id = %app_id, error = %error, "review export failed");
            let errors = vec![source_error(SourceId::SteamReview, app_id.as_str(), &error)?];
            Ok(CommandResult {
                envelope: Envelope::with_errors(meta, Value::Null, errors)?,
                table: review_table(&[]),
                has_failures: true,
            })
        }
    }
}

/// One row per review. Top-level scalars keep their key; the author object
/// is spread into `author_<key>` columns. Columns appear in first-seen order.
fn review_table(reviews: &[SourcePayload]) -> Table {
    let flattened = reviews.iter().map(flatten).collect::<Vec<_>>();

    let mut headers: Vec<String> = Vec::new();
    for row in &flattened {
        for (key, _) in row {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let rows = flattened
        .iter()
        .map(|row| {
            headers
                .iter()
                .map(|header| {
                    row.iter()
                        .find(|(key, _)| key == header)
                        .map(|(_, value)| value.clone())
                        .unwrap_or_default()
                })
                .collect()
        })
        .collect();

    Table { headers, rows }
}

fn flatten(review: &SourcePayload) -> Vec<(String, String)> {
    let mut cells = Vec::with_capacity(review.len());
    for (key, value) in review {
        match value {
            Value::Object(author) if key == "author" => {
                for (field, value) in author {
                    cells.push((format!("author_{field}"), text(value)));
                }
            }
            other => cells.push((key.clone(), text(other))),
        }
    }
    cells
}

fn text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
