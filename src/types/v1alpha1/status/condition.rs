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

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The cluster has successfully joined the control plane.
pub const CONDITION_JOINED: &str = "Joined";
/// The cluster is available.
pub const CONDITION_AVAILABLE: &str = "Available";

#[derive(
    Default, Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, Display, EnumString, PartialEq, Eq,
)]
pub enum ConditionStatus {
    #[strum(serialize = "True")]
    True,

    #[strum(serialize = "False")]
    False,

    #[strum(serialize = "Unknown")]
    #[default]
    Unknown,
}

/// A typed, timestamped status fact about a cluster.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,

    pub status: ConditionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Changes only when `status` changes.
    #[schemars(with = "String")]
    pub last_transition_time: DateTime<Utc>,

    pub reason: String,

    #[serde(default)]
    pub message: String,
}

impl Condition {
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
        last_transition_time: DateTime<Utc>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            observed_generation: None,
            last_transition_time,
            reason: reason.into(),
            message: message.into(),
        }
    }

    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }
}
