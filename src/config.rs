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

use crate::admission::decision::DEFAULT_CAPACITY_WEIGHT;
use crate::admission::taints::DEFAULT_PREFER_NO_SELECT_PENALTY;
use crate::admission::{AdmissionPolicy, TaintEvaluator};
use clap::Args;
use snafu::{Snafu, ensure};
use std::time::Duration;

pub const DEFAULT_MISSED_BEAT_MULTIPLIER: u32 = 3;
pub const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 10;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("invalid setting '{}': {}", name, message))]
    InvalidSetting { name: &'static str, message: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct HealthConfig {
    /// A cluster is stale once silent for `interval * missed_beat_multiplier`.
    pub missed_beat_multiplier: u32,
    /// Refuse to register clusters whose heartbeat interval is zero.
    pub require_health_probe: bool,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            missed_beat_multiplier: DEFAULT_MISSED_BEAT_MULTIPLIER,
            require_health_probe: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ControllerConfig {
    pub health: HealthConfig,
    pub admission: AdmissionPolicy,
    pub sweep_interval: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            health: HealthConfig::default(),
            admission: AdmissionPolicy::default(),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECONDS),
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), Error> {
        ensure!(
            self.health.missed_beat_multiplier > 0,
            InvalidSettingSnafu {
                name: "missed-beat-multiplier",
                message: "must be greater than 0",
            }
        );
        ensure!(
            !self.sweep_interval.is_zero(),
            InvalidSettingSnafu {
                name: "sweep-interval-seconds",
                message: "must be greater than 0",
            }
        );
        ensure!(
            (0.0..=1.0).contains(&self.admission.capacity_weight),
            InvalidSettingSnafu {
                name: "capacity-weight",
                message: format!("must be within [0, 1], got {}", self.admission.capacity_weight),
            }
        );
        Ok(())
    }
}

/// Flags of the `server` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Heartbeat intervals of silence before a cluster's availability becomes Unknown
    #[arg(long, default_value_t = DEFAULT_MISSED_BEAT_MULTIPLIER)]
    pub missed_beat_multiplier: u32,

    /// Period of the staleness sweep
    #[arg(long, default_value_t = DEFAULT_SWEEP_INTERVAL_SECONDS)]
    pub sweep_interval_seconds: u64,

    /// Reject clusters whose heartbeat interval is zero
    #[arg(long)]
    pub require_health_probe: bool,

    /// Admit placements onto clusters with a disabled health probe
    #[arg(long)]
    pub allow_probe_disabled: bool,

    /// Fraction of preference lost per untolerated PreferNoSelect taint
    #[arg(long, default_value_t = DEFAULT_PREFER_NO_SELECT_PENALTY)]
    pub prefer_no_select_penalty: f64,

    /// Share of the placement score driven by spare capacity
    #[arg(long, default_value_t = DEFAULT_CAPACITY_WEIGHT)]
    pub capacity_weight: f64,
}

impl TryFrom<ServerArgs> for ControllerConfig {
    type Error = Error;

    fn try_from(args: ServerArgs) -> Result<Self, Self::Error> {
        ensure!(
            (0.0..=1.0).contains(&args.prefer_no_select_penalty),
            InvalidSettingSnafu {
                name: "prefer-no-select-penalty",
                message: format!("must be within [0, 1], got {}", args.prefer_no_select_penalty),
            }
        );

        let config = ControllerConfig {
            health: HealthConfig {
                missed_beat_multiplier: args.missed_beat_multiplier,
                require_health_probe: args.require_health_probe,
            },
            admission: AdmissionPolicy {
                allow_probe_disabled: args.allow_probe_disabled,
                capacity_weight: args.capacity_weight,
                evaluator: TaintEvaluator::new(args.prefer_no_select_penalty),
            },
            sweep_interval: Duration::from_secs(args.sweep_interval_seconds),
        };
        config.validate()?;
        Ok(config)
    }
}
