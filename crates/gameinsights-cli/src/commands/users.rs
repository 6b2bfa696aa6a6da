use std::time::Instant;

use gameinsights_core::{
    Envelope, EnvelopeMeta, SourceId, SteamId, UserCollector, UserEntry, SCHEMA_VERSION,
};
use tracing::info;

use crate::cli::UsersArgs;
use crate::error::CliError;
use crate::output::Table;

use super::{collector_config, source_error, CommandResult};

const HEADERS: [&str; 9] = [
    "steamid",
    "persona_name",
    "profile_url",
    "country_code",
    "is_public",
    "time_created",
    "game_count",
    "total_playtime_minutes",
    "recent_games",
];

pub async fn run(args: &UsersArgs) -> Result<CommandResult, CliError> {
    let steam_ids = parse_ids(&args.steamids)?;
    let collector = UserCollector::from_config(&collector_config(&args.provider)?)?;

    let started = Instant::now();
    let entries = collector
        .collect(&steam_ids, !args.exclude_free_games)
        .await;
    users_result(&entries, started.elapsed().as_millis() as u64)
}

fn parse_ids(values: &[String]) -> Result<Vec<SteamId>, CliError> {
    if values.is_empty() {
        return Err(CliError::NoSteamIds);
    }
    Ok(values
        .iter()
        .map(|value| SteamId::parse(value))
        .collect::<Result<Vec<_>, _>>()?)
}

/// Failed accounts keep a row with only the steamid filled in.
fn users_result(entries: &[UserEntry], latency_ms: u64) -> Result<CommandResult, CliError> {
    let meta = EnvelopeMeta::new(
        uuid::Uuid::new_v4().to_string(),
        SCHEMA_VERSION,
        vec![SourceId::SteamUser],
        latency_ms,
    )?;

    let mut errors = Vec::new();
    let mut rows = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry {
            UserEntry::Profile(profile) => rows.push(vec![
                profile.steamid.to_string(),
                profile.persona_name.clone().unwrap_or_default(),
                profile.profile_url.clone().unwrap_or_default(),
                profile.country_code.clone().unwrap_or_default(),
                profile.is_public.to_string(),
                profile.time_created.map(|at| at.to_string()).unwrap_or_default(),
                profile.game_count.to_string(),
                profile.total_playtime_minutes.to_string(),
                profile.recently_played.len().to_string(),
            ]),
            UserEntry::Failed { steamid, error } => {
                errors.push(source_error(SourceId::SteamUser, steamid.as_str(), error)?);
                let mut row = vec![String::new(); HEADERS.len()];
                row[0] = steamid.to_string();
                rows.push(row);
            }
        }
    }
    info!(users = entries.len(), failed = errors.len(), "user collection finished");

    let has_failures = !errors.is_empty();
    Ok(CommandResult {
        envelope: Envelope::with_errors(meta, serde_json::to_value(entries)?, errors)?,
        table: Table {
            headers: HEADERS.into_iter().map(str::to_owned).collect(),
            rows,
        },
        has_failures,
    })
}
