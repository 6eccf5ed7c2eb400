// Copyright 2025 RustFS Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::types::error::{Error, InvalidTaintKeySnafu, TaintValueTooLongSnafu};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snafu::ensure;
use std::fmt;
use strum::Display;

pub const MAX_TAINT_KEY_LENGTH: usize = 316;
pub const MAX_TAINT_VALUE_LENGTH: usize = 1024;
const MAX_KEY_PREFIX_LENGTH: usize = 253;
const MAX_QUALIFIED_NAME_LENGTH: usize = 63;

/// The effect a taint has on placements that do not tolerate it.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, Display, PartialEq, Eq, Hash)]
#[serde(rename_all = "PascalCase")]
#[schemars(rename_all = "PascalCase")]
pub enum TaintEffect {
    /// Not allowed to select the cluster unless tolerating the taint. A cluster
    /// already selected is removed from the scheduler decisions.
    #[strum(to_string = "NoSelect")]
    NoSelect,

    /// The scheduler tries not to select the cluster instead of prohibiting it.
    #[strum(to_string = "PreferNoSelect")]
    PreferNoSelect,

    /// Not allowed to select the cluster unless tolerating the taint or the
    /// cluster is already part of the scheduler decisions.
    #[strum(to_string = "NoSelectIfNew")]
    NoSelectIfNew,
}

/// A taint attached to a cluster repels any placement that does not tolerate it.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Taint {
    /// Taint key, e.g. `bar` or `foo.example.com/bar`.
    #[schemars(length(max = 316))]
    pub key: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    #[schemars(length(max = 1024))]
    pub value: String,

    pub effect: TaintEffect,

    /// Set when the taint is first applied and never updated afterwards.
    #[schemars(with = "String")]
    pub time_added: DateTime<Utc>,
}

impl Taint {
    pub fn new(
        key: impl Into<String>,
        value: impl Into<String>,
        effect: TaintEffect,
        time_added: DateTime<Utc>,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            effect,
            time_added,
        }
    }

    /// Checks the key against `(dns1123Subdomain/)?qualifiedName` and the value length.
    pub fn validate(&self) -> Result<(), Error> {
        validate_taint_key(&self.key)?;
        ensure!(
            self.value.len() <= MAX_TAINT_VALUE_LENGTH,
            TaintValueTooLongSnafu {
                key: self.key.clone(),
                max: MAX_TAINT_VALUE_LENGTH,
            }
        );
        Ok(())
    }

    /// Two taints are the same fact when key, value and effect agree.
    pub fn same_fact(&self, other: &Taint) -> bool {
        self.key == other.key && self.value == other.value && self.effect == other.effect
    }
}

impl fmt::Display for Taint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value.is_empty() {
            write!(f, "{}:{}", self.key, self.effect)
        } else {
            write!(f, "{}={}:{}", self.key, self.value, self.effect)
        }
    }
}

fn invalid_key(key: &str, reason: impl Into<String>) -> Error {
    InvalidTaintKeySnafu {
        key,
        reason: reason.into(),
    }
    .build()
}

pub fn validate_taint_key(key: &str) -> Result<(), Error> {
    if key.is_empty() {
        return Err(invalid_key(key, "key must not be empty"));
    }
    if key.len() > MAX_TAINT_KEY_LENGTH {
        return Err(invalid_key(
            key,
            format!("key must be no more than {MAX_TAINT_KEY_LENGTH} characters"),
        ));
    }

    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };

    if let Some(prefix) = prefix {
        if prefix.is_empty() || prefix.len() > MAX_KEY_PREFIX_LENGTH {
            return Err(invalid_key(
                key,
                format!("prefix must be 1-{MAX_KEY_PREFIX_LENGTH} characters"),
            ));
        }
        let labels_ok = prefix.split('.').all(|label| {
            !label.is_empty()
                && label
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
                && !label.starts_with('-')
                && !label.ends_with('-')
        });
        if !labels_ok {
            return Err(invalid_key(
                key,
                "prefix must be a lowercase RFC 1123 subdomain",
            ));
        }
    }

    if name.is_empty() || name.len() > MAX_QUALIFIED_NAME_LENGTH {
        return Err(invalid_key(
            key,
            format!("name must be 1-{MAX_QUALIFIED_NAME_LENGTH} characters"),
        ));
    }
    let chars_ok = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    let bounds_ok = name.starts_with(|c: char| c.is_ascii_alphanumeric())
        && name.ends_with(|c: char| c.is_ascii_alphanumeric());
    if !chars_ok || !bounds_ok {
        return Err(invalid_key(
            key,
            "name must consist of alphanumerics, '-', '_' or '.', and start and end with an alphanumeric",
        ));
    }

    Ok(())
}

/// How a toleration compares its value with the taint value.
#[derive(Default, Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, Display, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
#[schemars(rename_all = "PascalCase")]
pub enum TolerationOperator {
    /// Key and value must both match.
    #[strum(to_string = "Equal")]
    #[default]
    Equal,

    /// Any value for the key matches.
    #[strum(to_string = "Exists")]
    Exists,
}

/// A placement-side declaration accepting clusters that carry a matching taint.
#[derive(Default, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Toleration {
    pub key: String,

    #[serde(default)]
    pub operator: TolerationOperator,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,

    /// `None` tolerates every effect for the key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<TaintEffect>,
}

impl Toleration {
    pub fn equal(key: impl Into<String>, value: impl Into<String>, effect: TaintEffect) -> Self {
        Self {
            key: key.into(),
            operator: TolerationOperator::Equal,
            value: value.into(),
            effect: Some(effect),
        }
    }

    pub fn exists(key: impl Into<String>, effect: Option<TaintEffect>) -> Self {
        Self {
            key: key.into(),
            operator: TolerationOperator::Exists,
            value: String::new(),
            effect,
        }
    }

    pub fn tolerates(&self, taint: &Taint) -> bool {
        if self.key != taint.key {
            return false;
        }

        if let Some(effect) = self.effect
            && effect != taint.effect
        {
            return false;
        }

        match self.operator {
            TolerationOperator::Exists => true,
            TolerationOperator::Equal => self.value == taint.value,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn taint(key: &str, value: &str, effect: TaintEffect) -> Taint {
        Taint::new(key, value, effect, Utc.timestamp_opt(0, 0).unwrap())
    }

    #[test]
    fn test_validate_accepts_plain_and_prefixed_keys() {
        for key in ["maintenance", "foo.example.com/bar", "a", "x/Y_z.1", "k8s.io/a-b"] {
            assert!(
                taint(key, "", TaintEffect::NoSelect).validate().is_ok(),
                "{key} should be valid"
            );
        }
    }

    #[test]
    fn test_validate_rejects_malformed_keys() {
        for key in [
            "",
            "-leading",
            "trailing-",
            "Upper.Case/name",
            "a/b/c",
            "/name",
            "prefix/",
            "has space",
        ] {
            let err = taint(key, "", TaintEffect::NoSelect).validate();
            assert!(
                matches!(err, Err(Error::InvalidTaintKey { .. })),
                "{key:?} should be rejected"
            );
        }

        let long_name = "a".repeat(64);
        assert!(validate_taint_key(&long_name).is_err());
    }

    #[test]
    fn test_validate_rejects_long_value() {
        let t = taint("key", &"v".repeat(MAX_TAINT_VALUE_LENGTH + 1), TaintEffect::NoSelect);
        assert!(matches!(t.validate(), Err(Error::TaintValueTooLong { .. })));
    }

    #[test]
    fn test_toleration_matching() {
        let t = taint("gpu", "nvidia", TaintEffect::NoSelect);

        assert!(Toleration::equal("gpu", "nvidia", TaintEffect::NoSelect).tolerates(&t));
        assert!(!Toleration::equal("gpu", "amd", TaintEffect::NoSelect).tolerates(&t));
        assert!(!Toleration::equal("gpu", "nvidia", TaintEffect::PreferNoSelect).tolerates(&t));
        assert!(!Toleration::equal("GPU", "nvidia", TaintEffect::NoSelect).tolerates(&t));
        assert!(Toleration::exists("gpu", Some(TaintEffect::NoSelect)).tolerates(&t));
        assert!(Toleration::exists("gpu", None).tolerates(&t));
        assert!(!Toleration::exists("other", None).tolerates(&t));
    }

    #[test]
    fn test_empty_value_matches_empty_toleration_value() {
        let t = taint("maintenance", "", TaintEffect::NoSelect);
        assert!(Toleration::equal("maintenance", "", TaintEffect::NoSelect).tolerates(&t));
        assert!(!Toleration::equal("maintenance", "x", TaintEffect::NoSelect).tolerates(&t));
    }

    #[test]
    fn test_effect_serializes_as_schema_enum() {
        assert_eq!(
            serde_json::to_string(&TaintEffect::NoSelectIfNew).unwrap(),
            "\"NoSelectIfNew\""
        );
        let parsed: TaintEffect = serde_json::from_str("\"PreferNoSelect\"").unwrap();
        assert_eq!(parsed, TaintEffect::PreferNoSelect);
        assert!(serde_json::from_str::<TaintEffect>("\"NoSchedule\"").is_err());
    }

    #[test]
    fn test_taint_json_field_names() {
        let t = taint("maintenance", "", TaintEffect::NoSelect);
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["key"], "maintenance");
        assert_eq!(json["effect"], "NoSelect");
        assert!(json.get("value").is_none());
        assert_eq!(json["timeAdded"], "1970-01-01T00:00:00Z");
    }
}
