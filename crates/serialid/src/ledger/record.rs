use core::{fmt, str::FromStr};

use chrono::{DateTime, Utc};

use crate::{Error, Identifier, Result};

/// The name of whoever issued an identifier.
///
/// Opaque to the allocator; the only requirement is that it is not blank.
/// Surrounding whitespace is trimmed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub struct Principal(String);

impl Principal {
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `name` is empty after trimming.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(Error::invalid("principal must not be blank"));
        }
        if trimmed.len() == name.len() {
            Ok(Self(name))
        } else {
            Ok(Self(trimmed.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Principal {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Principal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for Principal {
    type Error = Error;

    fn try_from(name: String) -> Result<Self> {
        Self::new(name)
    }
}

impl From<Principal> for String {
    fn from(principal: Principal) -> Self {
        principal.0
    }
}

/// One row of the issuance ledger: an identifier, who issued it and when.
///
/// Records are immutable once written.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IssuanceRecord {
    identifier: Identifier,
    principal: Principal,
    issued_at: DateTime<Utc>,
}

impl IssuanceRecord {
    pub const fn new(identifier: Identifier, principal: Principal, issued_at: DateTime<Utc>) -> Self {
        Self {
            identifier,
            principal,
            issued_at,
        }
    }

    pub const fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub const fn principal(&self) -> &Principal {
        &self.principal
    }

    pub const fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_is_trimmed_and_non_empty() {
        assert_eq!(Principal::new("  ana ").unwrap().as_str(), "ana");
        assert_eq!("joao".parse::<Principal>().unwrap().to_string(), "joao");
        assert!(matches!(
            Principal::new(" \t"),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(Principal::new("").is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn record_serializes_identifier_as_string() {
        use chrono::TimeZone;

        let record = IssuanceRecord::new(
            "2024PT00001".parse().unwrap(),
            Principal::new("ana").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["identifier"], "2024PT00001");
        assert_eq!(json["principal"], "ana");

        let back: IssuanceRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);

        let blank = serde_json::json!({
            "identifier": "2024PT00001",
            "principal": " ",
            "issued_at": "2024-03-01T12:00:00Z",
        });
        assert!(serde_json::from_value::<IssuanceRecord>(blank).is_err());
    }
}
