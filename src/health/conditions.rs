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

use crate::types::v1alpha1::status::{Condition, ConditionStatus};
use chrono::{DateTime, Utc};

/// Ordered set of conditions with at most one entry per type.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConditionLedger {
    conditions: Vec<Condition>,
}

impl ConditionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a ledger from persisted conditions. A later duplicate replaces an
    /// earlier one in place.
    pub fn from_conditions(conditions: impl IntoIterator<Item = Condition>) -> Self {
        let mut ledger = Self::new();
        for condition in conditions {
            match ledger.position(&condition.type_) {
                Some(index) => ledger.conditions[index] = condition,
                None => ledger.conditions.push(condition),
            }
        }
        ledger
    }

    fn position(&self, type_: &str) -> Option<usize> {
        self.conditions.iter().position(|c| c.type_ == type_)
    }

    /// Records an observation and returns whether the status transitioned.
    ///
    /// `last_transition_time` moves to `observed_at` only when the status
    /// changes; reason and message are always refreshed.
    pub fn set(
        &mut self,
        type_: &str,
        status: ConditionStatus,
        reason: &str,
        message: &str,
        observed_at: DateTime<Utc>,
    ) -> bool {
        match self.position(type_) {
            Some(index) => {
                let current = &mut self.conditions[index];
                if current.status == status {
                    current.reason = reason.to_owned();
                    current.message = message.to_owned();
                    false
                } else {
                    *current = Condition::new(type_, status, reason, message, observed_at);
                    true
                }
            }
            None => {
                self.conditions
                    .push(Condition::new(type_, status, reason, message, observed_at));
                true
            }
        }
    }

    pub fn get(&self, type_: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }

    /// Status of `type_`, `Unknown` when the ledger has no such condition.
    pub fn status(&self, type_: &str) -> ConditionStatus {
        self.get(type_).map(|c| c.status).unwrap_or_default()
    }

    pub fn remove(&mut self, type_: &str) -> Option<Condition> {
        self.position(type_).map(|index| self.conditions.remove(index))
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}
