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

use crate::context::Context;
use crate::types::v1alpha1::cluster::Cluster;
use crate::types::v1alpha1::status::ConditionStatus;
use crate::{context, fleet, types};
use chrono::Utc;
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use snafu::Snafu;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(transparent)]
    Context { source: context::Error },

    #[snafu(transparent)]
    Types { source: types::error::Error },

    #[snafu(transparent)]
    Fleet { source: fleet::Error },
}

pub async fn reconcile_cluster(cluster: Arc<Cluster>, ctx: Arc<Context>) -> Result<Action, Error> {
    let name = cluster.name();

    if cluster.metadata.deletion_timestamp.is_some() {
        debug!(
            "cluster {} is deleted, deletion_timestamp is {:?}",
            name, cluster.metadata.deletion_timestamp
        );
        ctx.fleet.deregister(&name);
        return Ok(Action::await_change());
    }

    cluster.spec.validate()?;

    let joined = ctx.fleet.restore(
        &name,
        &cluster.spec.health_probe,
        cluster.status.as_ref(),
        Utc::now(),
    )?;
    if joined {
        ctx.record(
            &cluster,
            EventType::Normal,
            "ClusterJoined",
            "cluster registered with the inventory",
        )
        .await?;
    }

    let status = ctx.fleet.status(&name)?;
    if cluster.status.as_ref() != Some(&status) {
        let before = cluster.available();
        let updated = ctx.update_status(&cluster, &status).await?;
        let after = updated.available();

        if let Some((event_type, reason, message)) = availability_event(before, after) {
            info!(cluster = %name, %before, %after, "availability changed");
            ctx.record(&updated, event_type, reason, &message).await?;
        }
    }

    let interval = cluster.spec.health_probe.interval()?;
    Ok(Action::requeue(requeue_after(interval, ctx.config.sweep_interval)))
}

/// Probe-disabled clusters are revisited at the sweep period.
fn requeue_after(heartbeat_interval: Option<Duration>, sweep_interval: Duration) -> Duration {
    heartbeat_interval.unwrap_or(sweep_interval)
}

fn availability_event(
    before: ConditionStatus,
    after: ConditionStatus,
) -> Option<(EventType, &'static str, String)> {
    if before == after {
        return None;
    }

    let message = format!("availability changed from {before} to {after}");
    let event = match after {
        ConditionStatus::True => (EventType::Normal, "ClusterAvailable", message),
        ConditionStatus::False => (EventType::Warning, "ClusterUnavailable", message),
        ConditionStatus::Unknown => (EventType::Warning, "ClusterAvailabilityUnknown", message),
    };
    Some(event)
}

pub fn error_policy(cluster: Arc<Cluster>, error: &Error, _ctx: Arc<Context>) -> Action {
    error!(cluster = %cluster.name(), "error_policy: {:?}", error);

    match error {
        Error::Types { .. } => Action::await_change(),
        Error::Fleet { source } if source.is_configuration() => Action::await_change(),
        _ => Action::requeue(Duration::from_secs(5)),
    }
}
