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

//! Folds per-node capacity reports into cluster level [`Resources`].
//!
//! The total is always recomputed from the full current node set. A node that
//! is no longer reported cannot linger in the totals, and a malformed report
//! only drops that node's contribution.

use crate::types::v1alpha1::status::{ResourceList, Resources};
use crate::utils::quantity::{self, NanoQuantity};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::warn;

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(display("node '{}' resource '{}' {}: {}", node, resource, field, source))]
    InvalidQuantity {
        node: String,
        resource: String,
        field: &'static str,
        source: quantity::Error,
    },

    #[snafu(display("node '{}' reports negative {} for '{}'", node, field, resource))]
    NegativeQuantity {
        node: String,
        resource: String,
        field: &'static str,
    },

    #[snafu(display("node '{}' allocatable '{}' exceeds its capacity", node, resource))]
    AllocatableExceedsCapacity { node: String, resource: String },

    #[snafu(display("node '{}' is reported more than once", node))]
    DuplicateNode { node: String },
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeResourceReport {
    pub node: String,

    #[serde(default)]
    pub capacity: ResourceList,

    #[serde(default)]
    pub allocatable: ResourceList,
}

impl NodeResourceReport {
    pub fn new(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            ..Default::default()
        }
    }

    pub fn with(mut self, resource: &str, capacity: &str, allocatable: &str) -> Self {
        self.capacity
            .insert(resource.to_owned(), quantity_of(capacity));
        self.allocatable
            .insert(resource.to_owned(), quantity_of(allocatable));
        self
    }
}

fn quantity_of(value: &str) -> k8s_openapi::apimachinery::pkg::api::resource::Quantity {
    k8s_openapi::apimachinery::pkg::api::resource::Quantity(value.to_owned())
}

/// A node report that did not contribute to the totals.
#[derive(Clone, Debug, PartialEq)]
pub struct SkippedNode {
    pub node: String,
    pub reason: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Aggregation {
    pub resources: Resources,
    pub skipped: Vec<SkippedNode>,
}

type ParsedList = BTreeMap<String, NanoQuantity>;

fn parse_list(node: &str, field: &'static str, list: &ResourceList) -> Result<ParsedList, Error> {
    list.iter()
        .map(|(resource, q)| -> Result<(String, NanoQuantity), Error> {
            let value = quantity::parse(q).context(InvalidQuantitySnafu {
                node,
                resource: resource.as_str(),
                field,
            })?;
            if value.is_negative() {
                return NegativeQuantitySnafu {
                    node,
                    resource: resource.as_str(),
                    field,
                }
                .fail();
            }
            Ok((resource.clone(), value))
        })
        .collect()
}

fn parse_report(report: &NodeResourceReport) -> Result<(ParsedList, ParsedList), Error> {
    let capacity = parse_list(&report.node, "capacity", &report.capacity)?;
    let allocatable = parse_list(&report.node, "allocatable", &report.allocatable)?;

    // a resource without reported capacity has a capacity of zero
    for (resource, alloc) in &allocatable {
        let cap = capacity.get(resource).copied().unwrap_or(NanoQuantity::ZERO);
        if *alloc > cap {
            return AllocatableExceedsCapacitySnafu {
                node: report.node.as_str(),
                resource: resource.as_str(),
            }
            .fail();
        }
    }

    Ok((capacity, allocatable))
}

pub fn aggregate<'a>(reports: impl IntoIterator<Item = &'a NodeResourceReport>) -> Aggregation {
    let mut capacity: ParsedList = BTreeMap::new();
    let mut allocatable: ParsedList = BTreeMap::new();
    let mut seen = BTreeSet::new();
    let mut skipped = Vec::new();

    for report in reports {
        let parsed = if seen.insert(report.node.as_str()) {
            parse_report(report)
        } else {
            DuplicateNodeSnafu {
                node: report.node.as_str(),
            }
            .fail()
        };

        match parsed {
            Ok((cap, alloc)) => {
                for (resource, value) in cap {
                    let total = capacity.entry(resource).or_default();
                    *total = *total + value;
                }
                for (resource, value) in alloc {
                    let total = allocatable.entry(resource).or_default();
                    *total = *total + value;
                }
            }
            Err(e) => {
                warn!(node = %report.node, reason = %e, "skipping malformed node resource report");
                skipped.push(SkippedNode {
                    node: report.node.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    // a resource reported on either side contributes zero to the other
    let names: BTreeSet<String> = capacity.keys().chain(allocatable.keys()).cloned().collect();
    let render = |totals: &ParsedList| -> ResourceList {
        names
            .iter()
            .map(|name| {
                let value = totals.get(name).copied().unwrap_or(NanoQuantity::ZERO);
                (name.clone(), value.to_quantity())
            })
            .collect()
    };

    Aggregation {
        resources: Resources {
            capacity: render(&capacity),
            allocatable: render(&allocatable),
        },
        skipped,
    }
}

/// Mean `allocatable / capacity` over resources with a positive capacity, in `[0, 1]`.
pub fn spare_ratio(resources: &Resources) -> Option<f64> {
    let ratios: Vec<f64> = resources
        .capacity
        .iter()
        .filter_map(|(name, cap)| {
            let cap = quantity::parse(cap).ok()?;
            if cap.nanos() <= 0 {
                return None;
            }
            let alloc = resources
                .allocatable
                .get(name)
                .and_then(|q| quantity::parse(q).ok())
                .unwrap_or(NanoQuantity::ZERO);
            Some((alloc.as_f64() / cap.as_f64()).clamp(0.0, 1.0))
        })
        .collect();

    if ratios.is_empty() {
        None
    } else {
        Some(ratios.iter().sum::<f64>() / ratios.len() as f64)
    }
}

/// Node reports of one cluster. Readers take an immutable snapshot, writers
/// copy the set when a snapshot is still outstanding.
#[derive(Clone, Debug, Default)]
pub struct NodeInventory {
    nodes: Arc<BTreeMap<String, NodeResourceReport>>,
}

impl NodeInventory {
    pub fn replace_all(&mut self, reports: impl IntoIterator<Item = NodeResourceReport>) {
        self.nodes = Arc::new(
            reports
                .into_iter()
                .map(|report| (report.node.clone(), report))
                .collect(),
        );
    }

    pub fn upsert(&mut self, report: NodeResourceReport) {
        Arc::make_mut(&mut self.nodes).insert(report.node.clone(), report);
    }

    pub fn remove(&mut self, node: &str) -> bool {
        if !self.nodes.contains_key(node) {
            return false;
        }
        Arc::make_mut(&mut self.nodes).remove(node).is_some()
    }

    pub fn snapshot(&self) -> Arc<BTreeMap<String, NodeResourceReport>> {
        Arc::clone(&self.nodes)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::v1alpha1::status::{RESOURCE_CPU, RESOURCE_MEMORY};

    fn cpu(resources: &ResourceList) -> String {
        resources[RESOURCE_CPU].0.clone()
    }

    #[test]
    fn test_aggregate_sums_capacity_and_allocatable() {
        let reports = vec![
            NodeResourceReport::new("node-a").with(RESOURCE_CPU, "4", "2"),
            NodeResourceReport::new("node-b").with(RESOURCE_CPU, "4", "3"),
        ];

        let result = aggregate(&reports);
        assert_eq!(cpu(&result.resources.capacity), "8");
        assert_eq!(cpu(&result.resources.allocatable), "5");
        assert!(result.skipped.is_empty());
    }

    #[test]
    fn test_removed_node_does_not_linger() {
        let mut inventory = NodeInventory::default();
        inventory.replace_all(vec![
            NodeResourceReport::new("node-a").with(RESOURCE_CPU, "4", "2"),
            NodeResourceReport::new("node-b").with(RESOURCE_CPU, "4", "3"),
        ]);
        assert_eq!(cpu(&aggregate(inventory.snapshot().values()).resources.capacity), "8");

        assert!(inventory.remove("node-b"));
        let result = aggregate(inventory.snapshot().values());
        assert_eq!(cpu(&result.resources.capacity), "4");
        assert_eq!(cpu(&result.resources.allocatable), "2");
    }

    #[test]
    fn test_missing_resource_contributes_zero() {
        let reports = vec![
            NodeResourceReport::new("node-a")
                .with(RESOURCE_CPU, "4", "2")
                .with(RESOURCE_MEMORY, "8Gi", "6Gi"),
            NodeResourceReport::new("node-b").with(RESOURCE_CPU, "2", "2"),
        ];

        let result = aggregate(&reports);
        assert_eq!(cpu(&result.resources.capacity), "6");
        assert_eq!(
            result.resources.capacity[RESOURCE_MEMORY].0,
            (8u64 * 1024 * 1024 * 1024).to_string()
        );
    }

    #[test]
    fn test_malformed_node_is_skipped_not_fatal() {
        let mut negative = NodeResourceReport::new("node-neg");
        negative
            .capacity
            .insert(RESOURCE_CPU.to_string(), quantity_of("-2"));

        let reports = vec![
            NodeResourceReport::new("node-a").with(RESOURCE_CPU, "4", "2"),
            NodeResourceReport::new("node-bad").with(RESOURCE_CPU, "four", "2"),
            NodeResourceReport::new("node-over").with(RESOURCE_CPU, "2", "3"),
            negative,
        ];

        let result = aggregate(&reports);
        assert_eq!(cpu(&result.resources.capacity), "4");
        assert_eq!(cpu(&result.resources.allocatable), "2");

        let skipped: Vec<_> = result.skipped.iter().map(|s| s.node.as_str()).collect();
        assert_eq!(skipped, vec!["node-bad", "node-over", "node-neg"]);
    }

    #[test]
    fn test_allocatable_without_capacity_is_skipped() {
        let mut alloc_only = NodeResourceReport::new("node-alloc-only");
        alloc_only
            .allocatable
            .insert(RESOURCE_CPU.to_string(), quantity_of("4"));

        let reports = vec![
            alloc_only,
            NodeResourceReport::new("node-a").with(RESOURCE_CPU, "1", "1"),
        ];

        let result = aggregate(&reports);
        assert_eq!(cpu(&result.resources.capacity), "1");
        assert_eq!(cpu(&result.resources.allocatable), "1");
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].node, "node-alloc-only");
    }

    #[test]
    fn test_duplicate_node_counted_once() {
        let reports = vec![
            NodeResourceReport::new("node-a").with(RESOURCE_CPU, "4", "2"),
            NodeResourceReport::new("node-a").with(RESOURCE_CPU, "4", "2"),
        ];

        let result = aggregate(&reports);
        assert_eq!(cpu(&result.resources.capacity), "4");
        assert_eq!(result.skipped.len(), 1);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_writes() {
        let mut inventory = NodeInventory::default();
        inventory.upsert(NodeResourceReport::new("node-a").with(RESOURCE_CPU, "4", "2"));
        let snapshot = inventory.snapshot();

        inventory.upsert(NodeResourceReport::new("node-b").with(RESOURCE_CPU, "4", "2"));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(inventory.len(), 2);
    }

    #[test]
    fn test_spare_ratio() {
        let result = aggregate(&[
            NodeResourceReport::new("node-a").with(RESOURCE_CPU, "4", "2"),
        ]);
        assert_eq!(spare_ratio(&result.resources), Some(0.5));
        assert_eq!(spare_ratio(&Resources::default()), None);
    }
}
