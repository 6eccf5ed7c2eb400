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

//! Heartbeat driven health state machine of a single cluster.
//!
//! `Available` is `True` after a successful heartbeat, `False` after an
//! explicit failure and `Unknown` when no heartbeat arrived within the
//! missed-beat threshold. Silence never produces `False`.

use crate::health::conditions::ConditionLedger;
use crate::types::v1alpha1::status::{
    CONDITION_AVAILABLE, CONDITION_JOINED, Condition, ConditionStatus,
};
use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const REASON_CLUSTER_JOINED: &str = "ClusterJoined";
pub const REASON_HEARTBEAT_PENDING: &str = "HeartbeatPending";
pub const REASON_PROBE_DISABLED: &str = "ProbeDisabled";
pub const REASON_HEARTBEAT_SUCCEEDED: &str = "HeartbeatSucceeded";
pub const REASON_HEARTBEAT_FAILED: &str = "HeartbeatFailed";
pub const REASON_HEARTBEAT_STALE: &str = "HeartbeatStale";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    Success,
    Failure { detail: Option<String> },
}

impl HeartbeatOutcome {
    pub fn failure(detail: impl Into<String>) -> Self {
        HeartbeatOutcome::Failure {
            detail: Some(detail.into()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct HealthMonitor {
    interval: Option<Duration>,
    /// Staleness reference until the first heartbeat arrives.
    armed_at: DateTime<Utc>,
    last_observed_at: Option<DateTime<Utc>>,
    ledger: ConditionLedger,
}

impl HealthMonitor {
    pub fn new(interval: Option<Duration>, now: DateTime<Utc>) -> Self {
        Self::restore(interval, &[], now)
    }

    /// Rebuilds a monitor from previously persisted conditions so transition
    /// times survive a restart. The staleness clock starts at `now`.
    pub fn restore(interval: Option<Duration>, previous: &[Condition], now: DateTime<Utc>) -> Self {
        let mut ledger = ConditionLedger::from_conditions(previous.iter().cloned());
        ledger.set(
            CONDITION_JOINED,
            ConditionStatus::True,
            REASON_CLUSTER_JOINED,
            "cluster is registered with the fleet",
            now,
        );
        match interval {
            None => {
                ledger.set(
                    CONDITION_AVAILABLE,
                    ConditionStatus::Unknown,
                    REASON_PROBE_DISABLED,
                    "health probe is disabled",
                    now,
                );
            }
            Some(_) if ledger.get(CONDITION_AVAILABLE).is_none() => {
                ledger.set(
                    CONDITION_AVAILABLE,
                    ConditionStatus::Unknown,
                    REASON_HEARTBEAT_PENDING,
                    "waiting for the first heartbeat",
                    now,
                );
            }
            Some(_) => {}
        }

        Self {
            interval,
            armed_at: now,
            last_observed_at: None,
            ledger,
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn is_probe_disabled(&self) -> bool {
        self.interval.is_none()
    }

    pub fn last_observed_at(&self) -> Option<DateTime<Utc>> {
        self.last_observed_at
    }

    pub fn available(&self) -> ConditionStatus {
        self.ledger.status(CONDITION_AVAILABLE)
    }

    pub fn ledger(&self) -> &ConditionLedger {
        &self.ledger
    }

    /// Applies a new probe interval. Disabling the probe drops `Available` to
    /// `Unknown`; enabling it restarts the staleness clock at `now`.
    pub fn set_interval(&mut self, interval: Option<Duration>, now: DateTime<Utc>) {
        if interval == self.interval {
            return;
        }

        match (self.interval, interval) {
            (Some(_), None) => {
                self.ledger.set(
                    CONDITION_AVAILABLE,
                    ConditionStatus::Unknown,
                    REASON_PROBE_DISABLED,
                    "health probe is disabled",
                    now,
                );
            }
            (None, Some(_)) => self.armed_at = now,
            _ => {}
        }
        self.interval = interval;
    }

    /// Returns whether `Available` transitioned. Heartbeats are ignored while
    /// the probe is disabled.
    pub fn record_heartbeat(
        &mut self,
        outcome: &HeartbeatOutcome,
        observed_at: DateTime<Utc>,
    ) -> bool {
        if self.interval.is_none() {
            debug!(%observed_at, "discarding heartbeat, health probe is disabled");
            return false;
        }
        if let Some(last) = self.last_observed_at
            && observed_at < last
        {
            debug!(
                %observed_at,
                %last,
                "discarding heartbeat older than the latest observation"
            );
            return false;
        }
        self.last_observed_at = Some(observed_at);

        match outcome {
            HeartbeatOutcome::Success => self.ledger.set(
                CONDITION_AVAILABLE,
                ConditionStatus::True,
                REASON_HEARTBEAT_SUCCEEDED,
                "cluster heartbeat succeeded",
                observed_at,
            ),
            HeartbeatOutcome::Failure { detail } => {
                let message = match detail {
                    Some(detail) => format!("cluster heartbeat failed: {detail}"),
                    None => "cluster heartbeat failed".to_owned(),
                };
                self.ledger.set(
                    CONDITION_AVAILABLE,
                    ConditionStatus::False,
                    REASON_HEARTBEAT_FAILED,
                    &message,
                    observed_at,
                )
            }
        }
    }

    /// Forces `Available` to `Unknown` once `now` is more than
    /// `interval * multiplier` past the latest heartbeat. Returns whether it
    /// transitioned. Probe-disabled clusters are never stale.
    pub fn check_staleness(&mut self, now: DateTime<Utc>, multiplier: u32) -> bool {
        let Some(interval) = self.interval else {
            return false;
        };
        let Some(threshold) = interval
            .checked_mul(multiplier)
            .and_then(|d| TimeDelta::from_std(d).ok())
        else {
            warn!(?interval, multiplier, "missed-beat threshold out of range");
            return false;
        };

        let reference = self
            .last_observed_at
            .map_or(self.armed_at, |last| last.max(self.armed_at));
        let silence = now - reference;
        if silence <= threshold {
            return false;
        }

        let transitioned = self.ledger.set(
            CONDITION_AVAILABLE,
            ConditionStatus::Unknown,
            REASON_HEARTBEAT_STALE,
            &format!("no heartbeat within {}s", threshold.num_seconds()),
            now,
        );
        if transitioned {
            info!(
                silence_secs = silence.num_seconds(),
                "heartbeat is stale, availability is unknown"
            );
        }
        transitioned
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

    fn monitor(interval_secs: u64) -> HealthMonitor {
        HealthMonitor::new(Some(Duration::from_secs(interval_secs)), at(0))
    }

    #[test]
    fn test_new_monitor_is_joined_and_unknown() {
        let m = monitor(30);
        assert_eq!(m.ledger().status(CONDITION_JOINED), ConditionStatus::True);
        assert_eq!(m.available(), ConditionStatus::Unknown);
        assert_eq!(
            m.ledger().get(CONDITION_AVAILABLE).unwrap().reason,
            REASON_HEARTBEAT_PENDING
        );
    }

    #[test]
    fn test_success_after_any_state_is_available() {
        let mut m = monitor(30);
        assert!(m.record_heartbeat(&HeartbeatOutcome::Success, at(1)));
        assert_eq!(m.available(), ConditionStatus::True);

        m.record_heartbeat(&HeartbeatOutcome::failure("timeout"), at(2));
        assert_eq!(m.available(), ConditionStatus::False);
        m.record_heartbeat(&HeartbeatOutcome::Success, at(3));
        assert_eq!(m.available(), ConditionStatus::True);

        m.check_staleness(at(1000), 3);
        assert_eq!(m.available(), ConditionStatus::Unknown);
        m.record_heartbeat(&HeartbeatOutcome::Success, at(1001));
        assert_eq!(m.available(), ConditionStatus::True);
    }

    #[test]
    fn test_single_failure_after_true_is_false() {
        let mut m = monitor(30);
        m.record_heartbeat(&HeartbeatOutcome::Success, at(1));
        assert!(m.record_heartbeat(&HeartbeatOutcome::failure("connection refused"), at(31)));

        let c = m.ledger().get(CONDITION_AVAILABLE).unwrap();
        assert_eq!(c.status, ConditionStatus::False);
        assert_eq!(c.reason, REASON_HEARTBEAT_FAILED);
        assert!(c.message.contains("connection refused"));
        assert_eq!(c.last_transition_time, at(31));
    }

    #[test]
    fn test_repeated_outcomes_keep_transition_time() {
        let mut m = monitor(30);
        m.record_heartbeat(&HeartbeatOutcome::Success, at(1));
        assert!(!m.record_heartbeat(&HeartbeatOutcome::Success, at(31)));
        assert!(!m.record_heartbeat(&HeartbeatOutcome::Success, at(61)));

        let c = m.ledger().get(CONDITION_AVAILABLE).unwrap();
        assert_eq!(c.last_transition_time, at(1));
        assert_eq!(m.last_observed_at(), Some(at(61)));
    }

    #[test]
    fn test_staleness_after_threshold_is_unknown_not_false() {
        let mut m = monitor(30);
        m.record_heartbeat(&HeartbeatOutcome::Success, at(0));

        assert!(!m.check_staleness(at(90), 3));
        assert_eq!(m.available(), ConditionStatus::True);

        assert!(m.check_staleness(at(91), 3));
        let c = m.ledger().get(CONDITION_AVAILABLE).unwrap();
        assert_eq!(c.status, ConditionStatus::Unknown);
        assert_eq!(c.reason, REASON_HEARTBEAT_STALE);
        assert_eq!(c.last_transition_time, at(91));

        // a second sweep does not move the transition time
        assert!(!m.check_staleness(at(200), 3));
        assert_eq!(
            m.ledger().get(CONDITION_AVAILABLE).unwrap().last_transition_time,
            at(91)
        );
    }

    #[test]
    fn test_failure_then_silence_becomes_unknown() {
        let mut m = monitor(10);
        m.record_heartbeat(&HeartbeatOutcome::failure("tls"), at(0));
        assert_eq!(m.available(), ConditionStatus::False);
        assert!(m.check_staleness(at(31), 3));
        assert_eq!(m.available(), ConditionStatus::Unknown);
    }

    #[test]
    fn test_out_of_order_heartbeat_is_discarded() {
        let mut m = monitor(30);
        m.record_heartbeat(&HeartbeatOutcome::Success, at(50));
        assert!(!m.record_heartbeat(&HeartbeatOutcome::failure("late"), at(40)));
        assert_eq!(m.available(), ConditionStatus::True);
        assert_eq!(m.last_observed_at(), Some(at(50)));
    }

    #[test]
    fn test_probe_disabled_skips_staleness() {
        let mut m = HealthMonitor::new(None, at(0));
        assert!(m.is_probe_disabled());
        assert_eq!(
            m.ledger().get(CONDITION_AVAILABLE).unwrap().reason,
            REASON_PROBE_DISABLED
        );
        assert!(!m.check_staleness(at(1_000_000), 3));
        assert_eq!(m.available(), ConditionStatus::Unknown);
    }

    #[test]
    fn test_probe_disabled_ignores_heartbeats() {
        let mut m = HealthMonitor::new(None, at(0));
        assert!(!m.record_heartbeat(&HeartbeatOutcome::Success, at(1)));
        assert!(!m.check_staleness(at(10_000_000), 3));

        let c = m.ledger().get(CONDITION_AVAILABLE).unwrap();
        assert_eq!(c.status, ConditionStatus::Unknown);
        assert_eq!(c.reason, REASON_PROBE_DISABLED);
        assert_eq!(m.last_observed_at(), None);
    }

    #[test]
    fn test_repeated_stale_checks_keep_condition_unchanged() {
        let mut m = monitor(30);
        m.record_heartbeat(&HeartbeatOutcome::Success, at(0));
        assert!(m.check_staleness(at(91), 3));
        let first = m.ledger().get(CONDITION_AVAILABLE).unwrap().clone();

        assert!(!m.check_staleness(at(500), 3));
        assert_eq!(m.ledger().get(CONDITION_AVAILABLE).unwrap(), &first);
    }

    #[test]
    fn test_never_beating_cluster_goes_stale_from_registration() {
        let mut m = monitor(30);
        assert!(!m.check_staleness(at(91), 3));
        assert_eq!(
            m.ledger().get(CONDITION_AVAILABLE).unwrap().reason,
            REASON_HEARTBEAT_STALE
        );
    }

    #[test]
    fn test_restore_keeps_persisted_transition_times() {
        let previous = vec![
            Condition::new(CONDITION_JOINED, ConditionStatus::True, REASON_CLUSTER_JOINED, "", at(5)),
            Condition::new(CONDITION_AVAILABLE, ConditionStatus::True, REASON_HEARTBEAT_SUCCEEDED, "", at(7)),
        ];
        let mut m = HealthMonitor::restore(Some(Duration::from_secs(30)), &previous, at(100));

        assert_eq!(m.ledger().get(CONDITION_JOINED).unwrap().last_transition_time, at(5));
        assert_eq!(m.available(), ConditionStatus::True);
        assert!(!m.check_staleness(at(190), 3));
        assert!(m.check_staleness(at(191), 3));
    }

    #[test]
    fn test_set_interval_transitions() {
        let mut m = monitor(30);
        m.record_heartbeat(&HeartbeatOutcome::Success, at(1));

        m.set_interval(None, at(5));
        assert_eq!(m.available(), ConditionStatus::Unknown);
        assert!(m.is_probe_disabled());

        m.set_interval(Some(Duration::from_secs(10)), at(100));
        m.record_heartbeat(&HeartbeatOutcome::Success, at(101));
        assert!(!m.check_staleness(at(120), 3));
        assert_eq!(m.available(), ConditionStatus::True);
    }
}
