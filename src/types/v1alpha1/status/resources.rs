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

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of CPUs in cores (500m = .5 cores).
pub const RESOURCE_CPU: &str = "cpu";
/// Amount of memory in bytes (500Gi = 500 * 1024 * 1024 * 1024).
pub const RESOURCE_MEMORY: &str = "memory";

/// Quantities keyed by resource name, as in `core/v1` ResourceList.
pub type ResourceList = BTreeMap<String, Quantity>;

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Resources {
    /// Total capacity across all nodes of the cluster.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub capacity: ResourceList,

    /// Total allocatable resources across all nodes of the cluster.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub allocatable: ResourceList,
}

impl Resources {
    pub fn is_empty(&self) -> bool {
        self.capacity.is_empty() && self.allocatable.is_empty()
    }
}
