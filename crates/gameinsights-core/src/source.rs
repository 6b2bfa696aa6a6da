use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Canonical provider identifiers used in outcomes, precedence tables and envelopes.
///
/// The declaration order is the stable ordering used whenever per-source
/// results are listed (failure descriptors, source chains). `SteamUser`
/// answers profile lookups only and never takes part in a game merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    SteamStore,
    Gamalytic,
    SteamSpy,
    SteamCharts,
    SteamReview,
    SteamAchievements,
    ProtonDb,
    HowLongToBeat,
    SteamUser,
}

/// Which key a provider is queried by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupKind {
    /// Queried with the Steam app id verbatim.
    AppId,
    /// Queried with the game name resolved by the app-id providers.
    Name,
    /// Queried with a 64-bit Steam account id.
    SteamId,
}

impl LookupKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AppId => "app_id",
            Self::Name => "name",
            Self::SteamId => "steam_id",
        }
    }
}

/// Whether a provider needs an API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Credentials {
    None,
    /// Works without a key; a key lifts provider-side limits.
    Optional,
    /// Disabled with `config_error` until a key is configured.
    Required,
}

impl Credentials {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Optional => "optional",
            Self::Required => "required",
        }
    }
}

impl SourceId {
    /// Game-data providers, the sources a collection batch may select.
    pub const ALL: [Self; 8] = [
        Self::SteamStore,
        Self::Gamalytic,
        Self::SteamSpy,
        Self::SteamCharts,
        Self::SteamReview,
        Self::SteamAchievements,
        Self::ProtonDb,
        Self::HowLongToBeat,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SteamStore => "steamstore",
            Self::Gamalytic => "gamalytic",
            Self::SteamSpy => "steamspy",
            Self::SteamCharts => "steamcharts",
            Self::SteamReview => "steamreview",
            Self::SteamAchievements => "steamachievements",
            Self::ProtonDb => "protondb",
            Self::HowLongToBeat => "howlongtobeat",
            Self::SteamUser => "steamuser",
        }
    }

    pub const fn lookup(self) -> LookupKind {
        match self {
            Self::HowLongToBeat => LookupKind::Name,
            Self::SteamUser => LookupKind::SteamId,
            _ => LookupKind::AppId,
        }
    }

    pub const fn credentials(self) -> Credentials {
        match self {
            Self::SteamAchievements | Self::SteamUser => Credentials::Required,
            Self::Gamalytic => Credentials::Optional,
            _ => Credentials::None,
        }
    }
}

impl Display for SourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|source| source.as_str() == normalized)
            .ok_or(ValidationError::InvalidSource { value: normalized })
    }
}
