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
use crate::context::Context;
use crate::fleet::Fleet;
use crate::health::run_staleness_sweep;
use crate::reconcile::{error_policy, reconcile_cluster};
use crate::types::v1alpha1::cluster::Cluster;
use futures::StreamExt;
use kube::CustomResourceExt;
use kube::runtime::{Controller, controller, watcher};
use kube::{Api, Client};
use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

pub mod admission;
pub mod config;
mod context;
pub mod fleet;
pub mod health;
pub mod reconcile;
pub mod resources;
pub mod types;
pub mod utils;


pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_level(true)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();
}

/// Runs the controller until a termination signal arrives.
pub async fn run(config: ControllerConfig, fleet: Arc<Fleet>) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;

    let client = Client::try_default().await?;
    let cluster_client = Api::<Cluster>::all(client.clone());

    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::channel(1);
    let sweep = tokio::spawn(run_staleness_sweep(
        Arc::clone(&fleet),
        config.sweep_interval,
        cancel.clone(),
        Some(tx),
    ));

    let controller = Controller::new(cluster_client, watcher::Config::default());

    // Every sweep transition re-publishes all statuses. Clusters gone from
    // the cache are dropped first.
    let store = controller.store();
    let prune_fleet = Arc::clone(&fleet);
    let refresh = ReceiverStream::new(rx).map(move |()| {
        let present: HashSet<String> = store.state().iter().map(|c| c.name()).collect();
        let dropped = prune_fleet.retain(|name| present.contains(name));
        if !dropped.is_empty() {
            debug!(clusters = ?dropped, "pruned deleted clusters");
        }
    });

    let context = Context::new(client, Arc::clone(&fleet), config);
    controller
        .reconcile_all_on(refresh)
        .shutdown_on_signal()
        .run(reconcile_cluster, error_policy, Arc::new(context))
        .for_each(|res| {
            let fleet = Arc::clone(&fleet);
            async move {
                match res {
                    Ok((cluster, _)) => info!("reconciled successful, object {}", cluster.name),
                    Err(controller::Error::ObjectNotFound(obj_ref)) => {
                        fleet.deregister(&obj_ref.name);
                    }
                    Err(e) => warn!("reconcile failed: {}", e),
                }
            }
        })
        .await;

    cancel.cancel();
    sweep.await?;

    Ok(())
}

pub async fn crd(file: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer: Pin<Box<dyn AsyncWrite + Send>> = if let Some(file) = file {
        Box::pin(
            tokio::fs::OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(file)
                .await?,
        )
    } else {
        Box::pin(tokio::io::stdout())
    };

    writer
        .write_all(serde_yaml_ng::to_string(&Cluster::crd())?.as_bytes())
        .await?;

    Ok(())
}
