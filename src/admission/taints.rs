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

//! Taint/toleration admission.
//!
//! Evaluation is a pure function of the taints, the tolerations and whether
//! the placement is new to the cluster:
//!
//! - `NoSelect` rejects unless tolerated, for new and existing placements.
//! - `NoSelectIfNew` rejects only new placements; existing ones are kept.
//! - `PreferNoSelect` never rejects, each untolerated taint lowers `prefer`.

use crate::types::v1alpha1::taint::{Taint, TaintEffect, Toleration};

pub const DEFAULT_PREFER_NO_SELECT_PENALTY: f64 = 0.5;

#[derive(Clone, Debug, PartialEq)]
pub struct Verdict {
    pub admit: bool,
    /// In `[0, 1]`, lower means more avoided.
    pub prefer: f64,
    /// One entry per untolerated taint that affected the verdict.
    pub reasons: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TaintEvaluator {
    prefer_no_select_penalty: f64,
}

impl Default for TaintEvaluator {
    fn default() -> Self {
        Self {
            prefer_no_select_penalty: DEFAULT_PREFER_NO_SELECT_PENALTY,
        }
    }
}

impl TaintEvaluator {
    /// `penalty` is the fraction of preference lost per untolerated
    /// `PreferNoSelect` taint, clamped to `[0, 1]`.
    pub fn new(penalty: f64) -> Self {
        let penalty = if penalty.is_nan() {
            DEFAULT_PREFER_NO_SELECT_PENALTY
        } else {
            penalty.clamp(0.0, 1.0)
        };
        Self {
            prefer_no_select_penalty: penalty,
        }
    }

    pub fn penalty(&self) -> f64 {
        self.prefer_no_select_penalty
    }

    pub fn evaluate(
        &self,
        taints: &[Taint],
        tolerations: &[Toleration],
        is_new_placement: bool,
    ) -> Verdict {
        let mut admit = true;
        let mut unmatched_prefer = 0i32;
        let mut reasons = Vec::new();

        for taint in taints {
            if tolerations.iter().any(|t| t.tolerates(taint)) {
                continue;
            }

            match taint.effect {
                TaintEffect::NoSelect => {
                    admit = false;
                    reasons.push(format!("untolerated taint {taint}"));
                }
                TaintEffect::NoSelectIfNew => {
                    if is_new_placement {
                        admit = false;
                        reasons.push(format!("untolerated taint {taint} rejects new placements"));
                    }
                }
                TaintEffect::PreferNoSelect => {
                    unmatched_prefer = unmatched_prefer.saturating_add(1);
                    reasons.push(format!("untolerated taint {taint} lowers preference"));
                }
            }
        }

        Verdict {
            admit,
            prefer: (1.0 - self.prefer_no_select_penalty).powi(unmatched_prefer),
            reasons,
        }
    }
}

/// Evaluates with the default scoring policy.
pub fn evaluate(taints: &[Taint], tolerations: &[Toleration], is_new_placement: bool) -> Verdict {
    TaintEvaluator::default().evaluate(taints, tolerations, is_new_placement)
}
