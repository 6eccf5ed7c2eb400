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

pub mod condition;
pub mod resources;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use condition::{CONDITION_AVAILABLE, CONDITION_JOINED, Condition, ConditionStatus};
pub use resources::{RESOURCE_CPU, RESOURCE_MEMORY, ResourceList, Resources};

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "ClusterVersion::is_empty")]
    pub version: ClusterVersion,

    #[serde(default, skip_serializing_if = "Resources::is_empty")]
    pub resources: Resources,

    /// Properties collected from the cluster. Not uniform across a fleet.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<Property>,
}

impl ClusterStatus {
    pub fn condition(&self, type_: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }

    /// Status of the `Available` condition, `Unknown` when absent.
    pub fn available(&self) -> ConditionStatus {
        self.condition(CONDITION_AVAILABLE)
            .map(|c| c.status)
            .unwrap_or_default()
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterVersion {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kubernetes: String,
}

impl ClusterVersion {
    pub fn is_empty(&self) -> bool {
        self.kubernetes.is_empty()
    }
}

/// A free-form fact collected from a cluster, e.g. a unique cluster identifier.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    #[schemars(length(min = 1, max = 253))]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    #[schemars(length(min = 1, max = 1024))]
    pub value: String,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Collapses duplicate names, the latest entry wins. First-seen order is kept.
pub fn dedup_properties(properties: impl IntoIterator<Item = Property>) -> Vec<Property> {
    let mut out: Vec<Property> = Vec::new();
    for property in properties {
        match out.iter_mut().find(|p| p.name == property.name) {
            Some(existing) => *existing = property,
            None => out.push(property),
        }
    }
    out
}
