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

use crate::types;
use crate::types::error::NegativeHeartbeatIntervalSnafu;
use crate::types::v1alpha1::status::{ClusterStatus, ConditionStatus};
use crate::types::v1alpha1::taint::{Taint, TaintEffect};
use chrono::{DateTime, Utc};
use kube::{CustomResource, KubeSchema, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snafu::ensure;
use std::time::Duration;

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, KubeSchema, Default)]
#[kube(
    group = "cluster.inventory.io",
    version = "v1alpha1",
    kind = "Cluster",
    status = "crate::types::v1alpha1::status::ClusterStatus",
    plural = "clusters",
    singular = "cluster",
    printcolumn = r#"{"name":"Available", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Available\")].status"}"#,
    printcolumn = r#"{"name":"Kubernetes", "type":"string", "jsonPath":".status.version.kubernetes"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#,
    crates(serde_json = "k8s_openapi::serde_json")
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// References to objects providing access info to the cluster, e.g. a
    /// kubeconfig stored in a secret. Referenced, never managed.
    #[serde(rename = "accessObjectRef", default, skip_serializing_if = "Vec::is_empty")]
    pub access_object_refs: Vec<AccessObjectRef>,

    #[serde(default)]
    pub health_probe: HealthProbe,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[x_kube(validation = Rule::new("self.all(t, t.key.matches('^([a-z0-9]([-a-z0-9]*[a-z0-9])?([.][a-z0-9]([-a-z0-9]*[a-z0-9])?)*/)?(([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9])$'))").message("taint key must be a qualified name with an optional DNS subdomain prefix"))]
    pub taints: Vec<Taint>,
}

#[derive(Deserialize, Serialize, Clone, Debug, KubeSchema, Default, PartialEq)]
pub struct HealthProbe {
    /// Interval of the cluster heartbeat. Zero disables probing.
    #[serde(rename = "heatbeatIntervalSeconds", default)]
    #[x_kube(validation = Rule::new("self >= 0").message("heatbeatIntervalSeconds must not be negative"))]
    pub heartbeat_interval_seconds: i32,
}

impl HealthProbe {
    pub fn with_interval(seconds: i32) -> Self {
        Self {
            heartbeat_interval_seconds: seconds,
        }
    }

    /// The configured heartbeat interval, `None` when probing is disabled.
    pub fn interval(&self) -> Result<Option<Duration>, types::error::Error> {
        ensure!(
            self.heartbeat_interval_seconds >= 0,
            NegativeHeartbeatIntervalSnafu {
                seconds: self.heartbeat_interval_seconds,
            }
        );

        Ok(match self.heartbeat_interval_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs as u64)),
        })
    }

    pub fn is_disabled(&self) -> bool {
        self.heartbeat_interval_seconds <= 0
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
pub struct AccessObjectRef {
    /// Type of the access info, e.g. `KUBECONFIG` for a secret holding a kubeconfig key.
    #[serde(rename = "type")]
    pub type_: String,

    /// API group of the resource, empty for the core group.
    #[serde(default)]
    pub group: String,

    pub resource: String,

    pub name: String,

    /// Empty for cluster scoped resources.
    #[serde(default)]
    pub namespace: String,
}

impl ClusterSpec {
    pub fn validate(&self) -> Result<(), types::error::Error> {
        self.health_probe.interval()?;
        for taint in &self.taints {
            taint.validate()?;
        }
        Ok(())
    }

    /// Upserts a taint keyed on `(key, effect)`.
    ///
    /// An identical taint keeps its original `time_added`. A new value for an
    /// existing key and effect is a distinct fact and is stamped with `now`.
    pub fn set_taint(
        &mut self,
        key: &str,
        value: &str,
        effect: TaintEffect,
        now: DateTime<Utc>,
    ) -> &Taint {
        let candidate = Taint::new(key, value, effect, now);
        let index = match self
            .taints
            .iter()
            .position(|t| t.key == key && t.effect == effect)
        {
            Some(index) => {
                if !self.taints[index].same_fact(&candidate) {
                    self.taints[index] = candidate;
                }
                index
            }
            None => {
                self.taints.push(candidate);
                self.taints.len() - 1
            }
        };
        &self.taints[index]
    }

    /// Removes taints with `key`, restricted to `effect` when given. Returns the number removed.
    pub fn remove_taint(&mut self, key: &str, effect: Option<TaintEffect>) -> usize {
        let before = self.taints.len();
        self.taints
            .retain(|t| !(t.key == key && effect.is_none_or(|e| e == t.effect)));
        before - self.taints.len()
    }
}

impl Cluster {
    pub fn name(&self) -> String {
        ResourceExt::name_any(self)
    }

    pub fn available(&self) -> ConditionStatus {
        self.status
            .as_ref()
            .map(ClusterStatus::available)
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_reapplying_identical_taint_keeps_time_added() {
        let mut spec = ClusterSpec::default();
        spec.set_taint("maintenance", "", TaintEffect::NoSelect, at(10));
        spec.set_taint("maintenance", "", TaintEffect::NoSelect, at(20));

        assert_eq!(spec.taints.len(), 1);
        assert_eq!(spec.taints[0].time_added, at(10));
    }

    #[test]
    fn test_changing_value_gets_fresh_time_added() {
        let mut spec = ClusterSpec::default();
        spec.set_taint("maintenance", "a", TaintEffect::NoSelect, at(10));
        let t = spec.set_taint("maintenance", "b", TaintEffect::NoSelect, at(20));

        assert_eq!(t.value, "b");
        assert_eq!(t.time_added, at(20));
        assert_eq!(spec.taints.len(), 1);
    }

    #[test]
    fn test_different_effect_is_a_distinct_taint() {
        let mut spec = ClusterSpec::default();
        spec.set_taint("maintenance", "", TaintEffect::NoSelect, at(10));
        spec.set_taint("maintenance", "", TaintEffect::PreferNoSelect, at(20));

        assert_eq!(spec.taints.len(), 2);
        assert_eq!(spec.taints[0].time_added, at(10));
        assert_eq!(spec.taints[1].time_added, at(20));
    }

    #[test]
    fn test_remove_taint_by_key_and_effect() {
        let mut spec = ClusterSpec::default();
        spec.set_taint("maintenance", "", TaintEffect::NoSelect, at(10));
        spec.set_taint("maintenance", "", TaintEffect::PreferNoSelect, at(10));
        spec.set_taint("gpu", "", TaintEffect::NoSelect, at(10));

        assert_eq!(spec.remove_taint("maintenance", Some(TaintEffect::NoSelect)), 1);
        assert_eq!(spec.taints.len(), 2);
        assert_eq!(spec.remove_taint("maintenance", None), 1);
        assert_eq!(spec.taints.len(), 1);
        assert_eq!(spec.taints[0].key, "gpu");
    }

    #[test]
    fn test_health_probe_interval() {
        assert_eq!(HealthProbe::with_interval(0).interval().unwrap(), None);
        assert_eq!(
            HealthProbe::with_interval(30).interval().unwrap(),
            Some(Duration::from_secs(30))
        );
        assert!(HealthProbe::with_interval(-1).interval().is_err());
        assert!(HealthProbe::default().is_disabled());
    }

    #[test]
    fn test_spec_json_uses_schema_field_names() {
        let spec: ClusterSpec = serde_json::from_value(serde_json::json!({
            "accessObjectRef": [{
                "type": "KUBECONFIG",
                "group": "",
                "resource": "secrets",
                "name": "member-1-kubeconfig",
                "namespace": "fleet-system"
            }],
            "healthProbe": { "heatbeatIntervalSeconds": 30 },
            "taints": [{
                "key": "maintenance",
                "effect": "NoSelect",
                "timeAdded": "2025-01-01T00:00:00Z"
            }]
        }))
        .unwrap();

        assert_eq!(spec.access_object_refs[0].type_, "KUBECONFIG");
        assert_eq!(spec.health_probe.heartbeat_interval_seconds, 30);
        assert_eq!(spec.taints[0].effect, TaintEffect::NoSelect);
        assert!(spec.validate().is_ok());

        let back = serde_json::to_value(&spec).unwrap();
        assert_eq!(back["healthProbe"]["heatbeatIntervalSeconds"], 30);
        assert_eq!(back["accessObjectRef"][0]["resource"], "secrets");
    }

    #[test]
    fn test_validate_rejects_bad_taint_key() {
        let mut spec = ClusterSpec::default();
        spec.set_taint("Bad Key", "", TaintEffect::NoSelect, at(0));
        assert!(spec.validate().is_err());
    }
}
