//! User account models

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::ParseEnumError;

/// Account status.
///
/// Serialized with the Arabic labels the dashboard displays; stored as
/// `active` / `inactive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum UserStatus {
    #[default]
    #[serde(rename = "نشط", alias = "active")]
    Active,
    #[serde(rename = "غير نشط", alias = "inactive")]
    Inactive,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
        }
    }

    pub fn label_ar(&self) -> &'static str {
        match self {
            UserStatus::Active => "نشط",
            UserStatus::Inactive => "غير نشط",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, UserStatus::Active)
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label_ar())
    }
}

impl FromStr for UserStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" | "نشط" => Ok(UserStatus::Active),
            "inactive" | "غير نشط" => Ok(UserStatus::Inactive),
            other => Err(ParseEnumError {
                kind: "user status",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for UserStatus {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_in_arabic() {
        assert_eq!(serde_json::to_string(&UserStatus::Active).unwrap(), "\"نشط\"");
        assert_eq!(
            serde_json::to_string(&UserStatus::Inactive).unwrap(),
            "\"غير نشط\""
        );
    }

    #[test]
    fn test_status_accepts_storage_spelling() {
        let parsed: UserStatus = serde_json::from_str("\"inactive\"").unwrap();
        assert_eq!(parsed, UserStatus::Inactive);
        assert_eq!("نشط".parse::<UserStatus>().unwrap(), UserStatus::Active);
        assert!("suspended".parse::<UserStatus>().is_err());
    }
}
