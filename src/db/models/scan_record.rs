//! Scan record data model.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Wall-clock format used for `captured_at`, second precision, no offset.
pub const CAPTURED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub const IDENTIFIER_LEN: usize = 6;

/// Six ASCII digits extracted from a Codabar payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value, used for ordering listings.
    pub fn value(&self) -> u32 {
        // Six digits always fit; parse cannot fail after construction.
        self.0.bytes().fold(0u32, |acc, b| acc * 10 + u32::from(b - b'0'))
    }
}

impl FromStr for Identifier {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        if value.len() == IDENTIFIER_LEN && value.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(value.to_string()))
        } else {
            Err(anyhow!("identifier must be exactly {IDENTIFIER_LEN} digits, got {value:?}"))
        }
    }
}

impl TryFrom<String> for Identifier {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One persisted scan. `key` is assigned by the store on insert and is `None`
/// for records that have not been written yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<i64>,
    pub identifier: Identifier,
    #[serde(with = "captured_at_serde")]
    pub captured_at: NaiveDateTime,
}

impl ScanRecord {
    pub fn new(identifier: Identifier, captured_at: NaiveDateTime) -> Self {
        Self {
            key: None,
            identifier,
            captured_at,
        }
    }

    /// Record stamped with the current local time, truncated to seconds.
    pub fn captured_now(identifier: Identifier) -> Self {
        Self::new(identifier, local_now())
    }

    pub fn captured_at_text(&self) -> String {
        format_captured_at(&self.captured_at)
    }
}

pub fn local_now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    // Drop sub-second precision so the in-memory value equals what the store
    // will hand back.
    parse_captured_at(&format_captured_at(&now)).unwrap_or(now)
}

pub fn format_captured_at(value: &NaiveDateTime) -> String {
    value.format(CAPTURED_AT_FORMAT).to_string()
}

pub fn parse_captured_at(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, CAPTURED_AT_FORMAT)
        .map_err(|err| anyhow!("invalid captured_at '{value}': {err}"))
}

mod captured_at_serde {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_captured_at(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_captured_at(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_requires_six_digits() {
        assert!("012345".parse::<Identifier>().is_ok());
        assert!("12345".parse::<Identifier>().is_err());
        assert!("1234567".parse::<Identifier>().is_err());
        assert!("12a456".parse::<Identifier>().is_err());
        assert!("１２３４５６".parse::<Identifier>().is_err());
    }

    #[test]
    fn identifier_value_ignores_leading_zeros() {
        let id: Identifier = "000042".parse().unwrap();
        assert_eq!(id.value(), 42);
        assert_eq!(id.to_string(), "000042");
    }

    #[test]
    fn record_serializes_with_camel_case_timestamp() {
        let record = ScanRecord::new(
            "123456".parse().unwrap(),
            parse_captured_at("2024-04-01T08:30:05").unwrap(),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["identifier"], "123456");
        assert_eq!(json["capturedAt"], "2024-04-01T08:30:05");
        assert!(json.get("key").is_none());
    }

    #[test]
    fn local_now_has_second_precision() {
        let now = local_now();
        assert_eq!(parse_captured_at(&format_captured_at(&now)).unwrap(), now);
    }
}
