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

//! Fleet-wide registry of cluster health and inventory.
//!
//! Each cluster's state sits behind its own mutex. The map itself is only
//! touched to find or insert that mutex, so work on one cluster never waits on
//! another.

use crate::config::HealthConfig;
use crate::health::{HealthMonitor, HeartbeatOutcome};
use crate::resources::{self, NodeInventory, NodeResourceReport};
use crate::types;
use crate::types::v1alpha1::cluster::HealthProbe;
use crate::types::v1alpha1::status::{
    ClusterStatus, ClusterVersion, ConditionStatus, Property, dedup_properties,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use snafu::{OptionExt, ResultExt, Snafu};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("cluster '{}' has an invalid health probe: {}", cluster, source))]
    InvalidProbe {
        cluster: String,
        source: types::error::Error,
    },

    #[snafu(display("cluster '{}' has no heartbeat interval but probing is required", cluster))]
    ProbeRequired { cluster: String },

    #[snafu(display("cluster '{}' is not registered", cluster))]
    NotRegistered { cluster: String },
}

impl Error {
    /// Configuration errors are surfaced to the operator and not retried.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::InvalidProbe { .. } | Error::ProbeRequired { .. })
    }
}

#[derive(Debug)]
struct ClusterState {
    health: HealthMonitor,
    nodes: NodeInventory,
    version: ClusterVersion,
    properties: Vec<Property>,
}

type SharedState = Arc<Mutex<ClusterState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, ClusterState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
pub struct Fleet {
    clusters: DashMap<String, SharedState>,
    config: HealthConfig,
}

impl Fleet {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            clusters: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    fn state(&self, cluster: &str) -> Result<SharedState, Error> {
        self.clusters
            .get(cluster)
            .map(|entry| Arc::clone(entry.value()))
            .context(NotRegisteredSnafu { cluster })
    }

    /// Registers a cluster, or applies a changed probe interval to a known one.
    /// Returns `true` when the cluster was newly registered.
    pub fn register(
        &self,
        cluster: &str,
        probe: &HealthProbe,
        now: DateTime<Utc>,
    ) -> Result<bool, Error> {
        self.restore(cluster, probe, None, now)
    }

    /// Like [`Fleet::register`], seeding a new entry from the last persisted
    /// status so condition history, version and properties survive a restart.
    pub fn restore(
        &self,
        cluster: &str,
        probe: &HealthProbe,
        previous: Option<&ClusterStatus>,
        now: DateTime<Utc>,
    ) -> Result<bool, Error> {
        let interval = probe.interval().context(InvalidProbeSnafu { cluster })?;
        if interval.is_none() && self.config.require_health_probe {
            return ProbeRequiredSnafu { cluster }.fail();
        }

        let existing = match self.clusters.entry(cluster.to_owned()) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                let previous = previous.cloned().unwrap_or_default();
                entry.insert(Arc::new(Mutex::new(ClusterState {
                    health: HealthMonitor::restore(interval, &previous.conditions, now),
                    nodes: NodeInventory::default(),
                    version: previous.version,
                    properties: previous.properties,
                })));
                info!(cluster, ?interval, "cluster registered");
                return Ok(true);
            }
        };

        let mut state = lock(&existing);
        if state.health.interval() != interval {
            info!(cluster, ?interval, "heartbeat interval changed");
            state.health.set_interval(interval, now);
        }
        Ok(false)
    }

    pub fn deregister(&self, cluster: &str) -> bool {
        let removed = self.clusters.remove(cluster).is_some();
        if removed {
            info!(cluster, "cluster deregistered");
        }
        removed
    }

    /// Drops every cluster `keep` rejects and returns their names, sorted.
    pub fn retain(&self, mut keep: impl FnMut(&str) -> bool) -> Vec<String> {
        let mut dropped = Vec::new();
        self.clusters.retain(|name, _| {
            let kept = keep(name.as_str());
            if !kept {
                dropped.push(name.clone());
            }
            kept
        });
        dropped.sort();
        for cluster in &dropped {
            info!(cluster = %cluster, "cluster deregistered");
        }
        dropped
    }

    pub fn contains(&self, cluster: &str) -> bool {
        self.clusters.contains_key(cluster)
    }

    pub fn cluster_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clusters.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Feeds a heartbeat outcome. Returns whether `Available` transitioned.
    pub fn record_heartbeat(
        &self,
        cluster: &str,
        outcome: HeartbeatOutcome,
        observed_at: DateTime<Utc>,
    ) -> Result<bool, Error> {
        let state = self.state(cluster)?;
        let mut state = lock(&state);
        let transitioned = state.health.record_heartbeat(&outcome, observed_at);
        if transitioned {
            match &outcome {
                HeartbeatOutcome::Success => info!(cluster, "cluster is available"),
                HeartbeatOutcome::Failure { detail } => {
                    warn!(cluster, ?detail, "cluster heartbeat failed")
                }
            }
        }
        Ok(transitioned)
    }

    pub fn check_staleness(&self, cluster: &str, now: DateTime<Utc>) -> Result<bool, Error> {
        let state = self.state(cluster)?;
        let transitioned = lock(&state)
            .health
            .check_staleness(now, self.config.missed_beat_multiplier);
        Ok(transitioned)
    }

    /// Checks every cluster for staleness and returns the ones that transitioned.
    pub fn sweep(&self, now: DateTime<Utc>) -> Vec<String> {
        let snapshot: Vec<(String, SharedState)> = self
            .clusters
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();

        let mut stale: Vec<String> = snapshot
            .into_iter()
            .filter(|(_, state)| {
                lock(state)
                    .health
                    .check_staleness(now, self.config.missed_beat_multiplier)
            })
            .map(|(name, _)| name)
            .collect();
        stale.sort();

        if !stale.is_empty() {
            info!(clusters = ?stale, "clusters became stale");
        }
        stale
    }

    pub fn available(&self, cluster: &str) -> Result<ConditionStatus, Error> {
        let state = self.state(cluster)?;
        let status = lock(&state).health.available();
        Ok(status)
    }

    /// Replaces the full node set of a cluster.
    pub fn report_nodes(
        &self,
        cluster: &str,
        reports: impl IntoIterator<Item = NodeResourceReport>,
    ) -> Result<(), Error> {
        let state = self.state(cluster)?;
        let mut state = lock(&state);
        state.nodes.replace_all(reports);
        debug!(cluster, nodes = state.nodes.len(), "node set replaced");
        Ok(())
    }

    pub fn upsert_node(&self, cluster: &str, report: NodeResourceReport) -> Result<(), Error> {
        let state = self.state(cluster)?;
        lock(&state).nodes.upsert(report);
        Ok(())
    }

    pub fn remove_node(&self, cluster: &str, node: &str) -> Result<bool, Error> {
        let state = self.state(cluster)?;
        let removed = lock(&state).nodes.remove(node);
        Ok(removed)
    }

    pub fn report_version(&self, cluster: &str, version: ClusterVersion) -> Result<(), Error> {
        let state = self.state(cluster)?;
        lock(&state).version = version;
        Ok(())
    }

    /// Replaces the property list. Duplicate names keep the latest value.
    pub fn report_properties(
        &self,
        cluster: &str,
        properties: impl IntoIterator<Item = Property>,
    ) -> Result<(), Error> {
        let properties = dedup_properties(properties);
        let state = self.state(cluster)?;
        lock(&state).properties = properties;
        Ok(())
    }

    /// Builds a fresh status value. Aggregation runs on a node snapshot taken
    /// under the lock, after the lock is released.
    pub fn status(&self, cluster: &str) -> Result<ClusterStatus, Error> {
        let state = self.state(cluster)?;
        let (conditions, nodes, version, properties) = {
            let state = lock(&state);
            (
                state.health.ledger().conditions().to_vec(),
                state.nodes.snapshot(),
                state.version.clone(),
                state.properties.clone(),
            )
        };

        let aggregation = resources::aggregate(nodes.values());
        for skipped in &aggregation.skipped {
            debug!(cluster, node = %skipped.node, reason = %skipped.reason, "node left out of totals");
        }

        Ok(ClusterStatus {
            conditions,
            version,
            resources: aggregation.resources,
            properties,
        })
    }
}
