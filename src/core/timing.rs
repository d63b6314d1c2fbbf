//! Timing policy and the balancer that pulls a draft toward its target.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::core::context::GenerationContext;
use crate::core::draft::{DraftEntry, Origin, ScriptDraft};
use crate::core::variety::VarietySelector;
use crate::schema::content::ContentBlock;
use crate::schema::session::{TimeClass, TimeStatus};

const EPSILON: f64 = 1e-9;

/// Shortest target a request may ask for, in minutes.
pub const MIN_TARGET_MINUTES: f64 = 15.0;
/// Longest target a request may ask for, in minutes.
pub const MAX_TARGET_MINUTES: f64 = 120.0;

/// Round to hundredths of a minute, the precision results are reported in.
pub fn round_minutes(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Target duration and the bands used to classify a result, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingPolicy {
    pub target: f64,
    pub tolerance: f64,
    pub perfect_band: f64,
}

impl Default for TimingPolicy {
    fn default() -> Self {
        Self {
            target: 60.0,
            tolerance: 5.0,
            perfect_band: 2.0,
        }
    }
}

impl TimingPolicy {
    /// Policy with a tolerance scaled to the length of the session.
    pub fn for_target(target: f64) -> Self {
        let tolerance = if target <= 30.0 {
            3.0
        } else if target <= 45.0 {
            4.0
        } else {
            5.0
        };
        Self {
            target,
            tolerance,
            perfect_band: 2.0_f64.min(tolerance),
        }
    }

    pub fn lower_bound(&self) -> f64 {
        self.target - self.tolerance
    }

    pub fn upper_bound(&self) -> f64 {
        self.target + self.tolerance
    }

    pub fn classify(&self, total: f64) -> TimeStatus {
        let delta = round_minutes(total - self.target);
        let classification = if delta.abs() <= self.perfect_band + EPSILON {
            TimeClass::Perfect
        } else if delta.abs() <= self.tolerance + EPSILON {
            TimeClass::Acceptable
        } else if delta < 0.0 {
            TimeClass::TooShort
        } else {
            TimeClass::TooLong
        };
        TimeStatus {
            classification,
            delta,
        }
    }
}

/// Which balancing pass is running; only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Draft,
    Rebalance,
}

/// What a balancing pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BalanceOutcome {
    pub removed: usize,
    pub added: usize,
    pub total: f64,
    pub within_tolerance: bool,
}

/// Removes optional blocks when too long and adds fillers when too short.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimingBalancer {
    pub policy: TimingPolicy,
    /// Minutes outside the draft that still count toward the total, such as
    /// timed quotes.
    pub fixed_minutes: f64,
}

impl TimingBalancer {
    pub fn new(policy: TimingPolicy) -> Self {
        Self {
            policy,
            fixed_minutes: 0.0,
        }
    }

    pub fn with_fixed_minutes(mut self, minutes: f64) -> Self {
        self.fixed_minutes = minutes;
        self
    }

    fn total(&self, draft: &ScriptDraft) -> f64 {
        draft.total_duration() + self.fixed_minutes
    }

    pub fn balance(
        &self,
        draft: &mut ScriptDraft,
        selector: &VarietySelector,
        ctx: &mut GenerationContext,
        pass: Pass,
    ) -> BalanceOutcome {
        let before = self.total(draft);
        let removed = self.trim(draft);
        let added = self.pad(draft, selector, ctx);
        let total = self.total(draft);
        let within_tolerance = self.within_bounds(total);
        debug!(
            ?pass,
            before,
            after = total,
            removed,
            added,
            within_tolerance,
            "timing balanced"
        );
        BalanceOutcome {
            removed,
            added,
            total,
            within_tolerance,
        }
    }

    fn within_bounds(&self, total: f64) -> bool {
        total >= self.policy.lower_bound() - EPSILON && total <= self.policy.upper_bound() + EPSILON
    }

    /// Drop the smallest removable block from an optional section until the
    /// draft fits under the upper bound.
    fn trim(&self, draft: &mut ScriptDraft) -> usize {
        let mut removed = 0;
        while self.total(draft) > self.policy.upper_bound() + EPSILON {
            let mut smallest: Option<(usize, usize, f64)> = None;
            for (si, section) in draft.sections.iter().enumerate() {
                if !section.section.optional || section.slot_count() <= section.section.min_slots {
                    continue;
                }
                for (ei, entry) in section.entries.iter().enumerate() {
                    if !entry.is_removable() {
                        continue;
                    }
                    if smallest.map_or(true, |(_, _, d)| entry.block.duration < d - EPSILON) {
                        smallest = Some((si, ei, entry.block.duration));
                    }
                }
            }
            let Some((si, ei, _)) = smallest else {
                break;
            };
            let entry = draft.sections[si].entries.remove(ei);
            trace!(block = entry.block.id.0, minutes = entry.block.duration, "removed block");
            removed += 1;
        }
        removed
    }

    /// Add the largest unused block that fits the gap to the upper bound
    /// until the draft reaches the lower bound.
    fn pad(
        &self,
        draft: &mut ScriptDraft,
        selector: &VarietySelector,
        ctx: &mut GenerationContext,
    ) -> usize {
        let mut added = 0;
        while self.total(draft) < self.policy.lower_bound() - EPSILON {
            let gap = self.policy.upper_bound() - self.total(draft);
            let mut best: Option<(usize, ContentBlock)> = None;
            for (si, section) in draft.sections.iter().enumerate() {
                if section.slot_count() >= section.section.max_slots {
                    continue;
                }
                let Some(candidate) =
                    selector.pick_largest_fitting(&section.pool, &ctx.used, gap, &mut ctx.rng)
                else {
                    continue;
                };
                if best
                    .as_ref()
                    .map_or(true, |(_, current)| candidate.duration > current.duration + EPSILON)
                {
                    best = Some((si, candidate));
                }
            }
            let Some((si, block)) = best else {
                break;
            };
            trace!(block = block.id.0, minutes = block.duration, "added filler");
            ctx.mark_used(block.id);
            let section = &mut draft.sections[si];
            let at = section.filler_index();
            section.entries.insert(at, DraftEntry::new(block, Origin::Filler));
            added += 1;
        }
        added
    }
}
