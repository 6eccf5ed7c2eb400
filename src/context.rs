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

use crate::config::ControllerConfig;
use crate::fleet::Fleet;
use crate::types::v1alpha1::cluster::Cluster;
use crate::types::v1alpha1::status::ClusterStatus;
use kube::api::{Api, PostParams};
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Resource;
use snafu::Snafu;
use snafu::futures::TryFutureExt;
use std::sync::Arc;
use tracing::info;

pub const CONTROLLER_NAME: &str = "cluster-inventory-controller";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Kubernetes API error: {}", source))]
    Kube { source: kube::Error },

    #[snafu(display("record event error: {}", source))]
    Record { source: kube::Error },
}

pub struct Context {
    pub(crate) client: kube::Client,
    pub(crate) recorder: Recorder,
    pub(crate) fleet: Arc<Fleet>,
    pub(crate) config: ControllerConfig,
}

impl Context {
    pub fn new(client: kube::Client, fleet: Arc<Fleet>, config: ControllerConfig) -> Self {
        let reporter = Reporter {
            controller: CONTROLLER_NAME.into(),
            instance: std::env::var("HOSTNAME").ok(),
        };

        let recorder = Recorder::new(client.clone(), reporter);
        Self {
            client,
            recorder,
            fleet,
            config,
        }
    }

    /// send event
    #[inline]
    pub async fn record(
        &self,
        resource: &Cluster,
        event_type: EventType,
        reason: &str,
        message: &str,
    ) -> Result<(), Error> {
        self.recorder
            .publish(
                &Event {
                    type_: event_type,
                    reason: reason.to_owned(),
                    note: Some(message.into()),
                    action: "Reconcile".into(),
                    secondary: None,
                },
                &resource.object_ref(&()),
            )
            .context(RecordSnafu)
            .await
    }

    /// Replaces `.status` wholesale so no stale entries survive.
    pub async fn update_status(
        &self,
        resource: &Cluster,
        status: &ClusterStatus,
    ) -> Result<Cluster, Error> {
        let api: Api<Cluster> = Api::all(self.client.clone());
        let name = &resource.name();

        let update_func = async |cluster: &Cluster| {
            let mut cluster = cluster.clone();
            cluster.status = Some(status.clone());

            api.replace_status(name, &PostParams::default(), &cluster)
                .context(KubeSnafu)
                .await
        };

        if let Ok(updated) = update_func(resource).await {
            return Ok(updated);
        }

        info!("status update failed due to conflict, retrieve the latest resource and retry.");

        let latest = api.get(name).context(KubeSnafu).await?;
        update_func(&latest).await
    }
}
