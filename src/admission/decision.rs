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

use crate::admission::taints::TaintEvaluator;
use crate::resources::spare_ratio;
use crate::types;
use crate::types::v1alpha1::cluster::Cluster;
use crate::types::v1alpha1::status::ConditionStatus;
use crate::types::v1alpha1::taint::Toleration;
use snafu::{ResultExt, Snafu};
use tracing::debug;

pub const DEFAULT_CAPACITY_WEIGHT: f64 = 0.25;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("cluster '{}' carries an invalid taint: {}", cluster, source))]
    InvalidTaint {
        cluster: String,
        source: types::error::Error,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlacementDecision {
    pub eligible: bool,
    pub score: f64,
    pub reason: String,
}

/// Combines health, taints and resources into the decision the scheduler consumes.
///
/// Nothing is cached: callers re-invoke whenever health, taints, tolerations
/// or the resource snapshot change.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdmissionPolicy {
    /// Admit onto clusters whose health probe is disabled.
    pub allow_probe_disabled: bool,
    /// Share of the score driven by spare capacity, in `[0, 1]`.
    pub capacity_weight: f64,
    pub evaluator: TaintEvaluator,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            allow_probe_disabled: false,
            capacity_weight: DEFAULT_CAPACITY_WEIGHT,
            evaluator: TaintEvaluator::default(),
        }
    }
}

impl AdmissionPolicy {
    /// `prefer * ((1 - w) + w * spare)`; missing resource data counts as fully spare.
    pub fn score(&self, prefer: f64, spare: Option<f64>) -> f64 {
        let weight = self.capacity_weight.clamp(0.0, 1.0);
        let spare = spare.unwrap_or(1.0).clamp(0.0, 1.0);
        prefer * ((1.0 - weight) + weight * spare)
    }

    fn health_gate(&self, cluster: &Cluster) -> Option<String> {
        if cluster.spec.health_probe.is_disabled() {
            return if self.allow_probe_disabled {
                None
            } else {
                Some("cluster health probe is disabled".to_owned())
            };
        }

        match cluster.available() {
            ConditionStatus::True => None,
            status => Some(format!("cluster is not available (Available={status})")),
        }
    }

    pub fn decide_placement(
        &self,
        cluster: &Cluster,
        tolerations: &[Toleration],
        is_new_placement: bool,
    ) -> Result<PlacementDecision, Error> {
        let name = cluster.name();
        for taint in &cluster.spec.taints {
            taint
                .validate()
                .context(InvalidTaintSnafu { cluster: &name })?;
        }

        let verdict =
            self.evaluator
                .evaluate(&cluster.spec.taints, tolerations, is_new_placement);
        let health = self.health_gate(cluster);
        let spare = cluster
            .status
            .as_ref()
            .and_then(|status| spare_ratio(&status.resources));

        let eligible = health.is_none() && verdict.admit;
        let score = self.score(verdict.prefer, spare);
        let reasons: Vec<String> = health.into_iter().chain(verdict.reasons).collect();
        let reason = if reasons.is_empty() {
            "cluster admits the placement".to_owned()
        } else {
            reasons.join("; ")
        };

        debug!(cluster = %name, eligible, score, %reason, "placement decided");
        Ok(PlacementDecision {
            eligible,
            score,
            reason,
        })
    }

    /// An already scheduled placement is evicted only for an untolerated
    /// `NoSelect` taint. Health alone never evicts.
    pub fn should_evict(&self, cluster: &Cluster, tolerations: &[Toleration]) -> Result<bool, Error> {
        let name = cluster.name();
        for taint in &cluster.spec.taints {
            taint
                .validate()
                .context(InvalidTaintSnafu { cluster: &name })?;
        }

        Ok(!self
            .evaluator
            .evaluate(&cluster.spec.taints, tolerations, false)
            .admit)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::resources::{NodeResourceReport, aggregate};
    use crate::tests::create_test_cluster;
    use crate::types::v1alpha1::status::RESOURCE_CPU;
    use crate::types::v1alpha1::taint::TaintEffect;
    use chrono::{TimeZone, Utc};

    fn t0() -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_maintenance_taint_end_to_end() {
        let policy = AdmissionPolicy::default();
        let mut cluster = create_test_cluster("member-1", 30, ConditionStatus::True);
        cluster
            .spec
            .set_taint("maintenance", "", TaintEffect::NoSelect, t0());

        let decision = policy.decide_placement(&cluster, &[], true).unwrap();
        assert!(!decision.eligible);
        assert!(decision.reason.contains("maintenance"));

        let tolerations = vec![Toleration::equal("maintenance", "", TaintEffect::NoSelect)];
        let decision = policy.decide_placement(&cluster, &tolerations, true).unwrap();
        assert!(decision.eligible, "{}", decision.reason);
    }

    #[test]
    fn test_unavailable_cluster_is_not_eligible() {
        let policy = AdmissionPolicy::default();
        for status in [ConditionStatus::False, ConditionStatus::Unknown] {
            let cluster = create_test_cluster("member-1", 30, status);
            let decision = policy.decide_placement(&cluster, &[], true).unwrap();
            assert!(!decision.eligible);
            assert!(decision.reason.contains(&format!("Available={status}")));
        }
    }

    #[test]
    fn test_probe_disabled_cluster_requires_opt_in() {
        let cluster = create_test_cluster("member-1", 0, ConditionStatus::Unknown);

        let strict = AdmissionPolicy::default();
        assert!(!strict.decide_placement(&cluster, &[], true).unwrap().eligible);

        let lenient = AdmissionPolicy {
            allow_probe_disabled: true,
            ..Default::default()
        };
        assert!(lenient.decide_placement(&cluster, &[], true).unwrap().eligible);
    }

    #[test]
    fn test_score_drops_with_prefer_no_select_taints() {
        let policy = AdmissionPolicy::default();
        let mut cluster = create_test_cluster("member-1", 30, ConditionStatus::True);
        let mut last = policy.decide_placement(&cluster, &[], true).unwrap().score;

        for key in ["soft-a", "soft-b", "soft-c"] {
            cluster
                .spec
                .set_taint(key, "", TaintEffect::PreferNoSelect, t0());
            let decision = policy.decide_placement(&cluster, &[], true).unwrap();
            assert!(decision.eligible);
            assert!(decision.score <= last);
            last = decision.score;
        }
    }

    #[test]
    fn test_score_grows_with_spare_capacity() {
        let policy = AdmissionPolicy::default();
        let mut tight = create_test_cluster("tight", 30, ConditionStatus::True);
        let mut roomy = create_test_cluster("roomy", 30, ConditionStatus::True);

        tight.status.as_mut().unwrap().resources =
            aggregate(&[NodeResourceReport::new("n").with(RESOURCE_CPU, "4", "1")]).resources;
        roomy.status.as_mut().unwrap().resources =
            aggregate(&[NodeResourceReport::new("n").with(RESOURCE_CPU, "4", "3")]).resources;

        let tight = policy.decide_placement(&tight, &[], true).unwrap();
        let roomy = policy.decide_placement(&roomy, &[], true).unwrap();
        assert!(roomy.score >= tight.score);
        assert!(roomy.score <= 1.0);
    }

    #[test]
    fn test_no_select_if_new_keeps_existing_placements() {
        let policy = AdmissionPolicy::default();
        let mut cluster = create_test_cluster("member-1", 30, ConditionStatus::True);
        cluster
            .spec
            .set_taint("draining", "", TaintEffect::NoSelectIfNew, t0());

        assert!(!policy.decide_placement(&cluster, &[], true).unwrap().eligible);
        assert!(policy.decide_placement(&cluster, &[], false).unwrap().eligible);
        assert!(!policy.should_evict(&cluster, &[]).unwrap());
    }

    #[test]
    fn test_no_select_evicts_existing_placements() {
        let policy = AdmissionPolicy::default();
        let mut cluster = create_test_cluster("member-1", 30, ConditionStatus::True);
        assert!(!policy.should_evict(&cluster, &[]).unwrap());

        cluster
            .spec
            .set_taint("maintenance", "", TaintEffect::NoSelect, t0());
        assert!(policy.should_evict(&cluster, &[]).unwrap());

        let tolerations = vec![Toleration::exists("maintenance", None)];
        assert!(!policy.should_evict(&cluster, &tolerations).unwrap());
    }

    #[test]
    fn test_unhealthy_cluster_does_not_evict() {
        let policy = AdmissionPolicy::default();
        let cluster = create_test_cluster("member-1", 30, ConditionStatus::Unknown);
        assert!(!policy.should_evict(&cluster, &[]).unwrap());
    }

    #[test]
    fn test_invalid_taint_fails_fast() {
        let policy = AdmissionPolicy::default();
        let mut cluster = create_test_cluster("member-1", 30, ConditionStatus::True);
        cluster
            .spec
            .set_taint("not a key", "", TaintEffect::NoSelect, t0());

        assert!(matches!(
            policy.decide_placement(&cluster, &[], true),
            Err(Error::InvalidTaint { .. })
        ));
    }
}
