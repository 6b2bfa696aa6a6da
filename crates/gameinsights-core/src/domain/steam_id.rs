use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// 64-bit Steam account id, kept in its decimal text form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SteamId(String);

impl SteamId {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        Self::try_from(input.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SteamId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for SteamId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let trimmed = value.trim();
        let digits = !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit());
        if !digits || trimmed.parse::<u64>().is_err() {
            return Err(ValidationError::InvalidSteamId { value });
        }
        Ok(Self(trimmed.to_owned()))
    }
}

impl From<SteamId> for String {
    fn from(value: SteamId) -> Self {
        value.0
    }
}
