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

use crate::fleet::Fleet;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Periodically marks silent clusters `Unknown` until `cancel` fires.
///
/// When any cluster transitions a unit is pushed to `notify` so the status
/// writer can re-publish. A full channel already holds a pending notification.
pub async fn run_staleness_sweep(
    fleet: Arc<Fleet>,
    period: Duration,
    cancel: CancellationToken,
    notify: Option<mpsc::Sender<()>>,
) {
    if period.is_zero() {
        warn!("staleness sweep period is zero, sweep disabled");
        return;
    }

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(?period, "staleness sweep started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("staleness sweep stopped");
                break;
            }
            _ = ticker.tick() => {
                let stale = fleet.sweep(Utc::now());
                if stale.is_empty() {
                    continue;
                }
                if let Some(tx) = &notify
                    && tx.try_send(()).is_err()
                {
                    debug!("status refresh already pending");
                }
            }
        }
    }
}
