use std::collections::BTreeMap;

use gameinsights_core::normalize::fields_supplied_by;
use gameinsights_core::{
    Collector, Credentials, Envelope, EnvelopeMeta, LookupKind, ProviderPolicy, SourceId,
    SCHEMA_VERSION,
};
use serde::Serialize;

use crate::cli::ProviderArgs;
use crate::error::CliError;
use crate::output::Table;

use super::{collector_config, CommandResult};

#[derive(Debug, Serialize)]
struct SourceStatus {
    id: SourceId,
    lookup: LookupKind,
    credentials: Credentials,
    configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    quota_calls: u32,
    quota_period_secs: u64,
    fields: usize,
}

impl SourceStatus {
    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.lookup.as_str().to_owned(),
            self.credentials.as_str().to_owned(),
            self.configured.to_string(),
            self.reason.clone().unwrap_or_default(),
            self.quota_calls.to_string(),
            self.quota_period_secs.to_string(),
            self.fields.to_string(),
        ]
    }
}

#[derive(Debug, Serialize)]
struct SourcesResponseData {
    sources: Vec<SourceStatus>,
}

pub fn run(args: &ProviderArgs) -> Result<CommandResult, CliError> {
    let collector = Collector::from_config(collector_config(args)?)?;
    let statuses = statuses(&collector);

    let table = Table {
        headers: [
            "source",
            "lookup",
            "credentials",
            "configured",
            "reason",
            "quota_calls",
            "quota_period_secs",
            "fields",
        ]
        .into_iter()
        .map(str::to_owned)
        .collect(),
        rows: statuses.iter().map(SourceStatus::cells).collect(),
    };

    let meta = EnvelopeMeta::new(
        uuid::Uuid::new_v4().to_string(),
        SCHEMA_VERSION,
        collector.sources(),
        0,
    )?;
    let data = serde_json::to_value(SourcesResponseData { sources: statuses })?;

    Ok(CommandResult {
        envelope: Envelope::success(meta, data),
        table,
        has_failures: false,
    })
}

fn statuses(collector: &Collector) -> Vec<SourceStatus> {
    let disabled = collector
        .disabled_sources()
        .into_iter()
        .collect::<BTreeMap<_, _>>();
    let policies = collector
        .policies()
        .into_iter()
        .map(|policy| (policy.source, policy))
        .collect::<BTreeMap<_, _>>();

    SourceId::ALL
        .into_iter()
        .map(|id| {
            let policy = policies
                .get(&id)
                .cloned()
                .unwrap_or_else(|| ProviderPolicy::default_for(id));
            let reason = disabled.get(&id).map(|error| error.message().to_owned());
            SourceStatus {
                id,
                lookup: id.lookup(),
                credentials: id.credentials(),
                configured: reason.is_none(),
                reason,
                quota_calls: policy.quota_limit,
                quota_period_secs: policy.quota_window.as_secs(),
                fields: fields_supplied_by(id).len(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_steam_key_marks_achievements_unconfigured() {
        let mut config = collector_config(&ProviderArgs::default()).expect("config");
        config.steam_api_key = None;
        let collector = Collector::from_config(config).expect("collector");

        let statuses = statuses(&collector);

        assert_eq!(statuses.len(), 8);
        let achievements = statuses
            .iter()
            .find(|status| status.id == SourceId::SteamAchievements)
            .expect("listed");
        assert!(!achievements.configured);
        assert_eq!(achievements.credentials, Credentials::Required);
        let hltb = statuses
            .iter()
            .find(|status| status.id == SourceId::HowLongToBeat)
            .expect("listed");
        assert_eq!(hltb.lookup, LookupKind::Name);
        assert!(hltb.configured);
        assert_eq!(hltb.quota_calls, 60);
    }
}
