use chrono::{DateTime, Utc};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use super::sport::{Goal, Sport, Tier};

/// Newtype wrapper for content block IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u64);

/// Newtype wrapper for category IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CategoryId(pub u64);

/// Well-known block tags the engine interprets.
pub mod tags {
    /// Marks a block as a load-bearing part of an anchor section.
    pub const ANCHOR: &str = "anchor";
    /// Marks a pose block that may start a new pose family.
    pub const POSE_CHANGE: &str = "pose_change";
    /// Block may be dropped in as a Kickboxing surprise round.
    pub const SURPRISE_ELIGIBLE: &str = "surprise_eligible";
    /// Connective PowerYoga vinyasa block.
    pub const TRANSITION: &str = "transition";
    /// Calisthenics terminal block.
    pub const MAX_CHALLENGE: &str = "max_challenge";
    /// Prefix for pose family tags, e.g. `pose:standing`.
    pub const POSE_PREFIX: &str = "pose:";
    /// Prefix for directed transition tags, e.g. `transition:standing_to_seated`.
    pub const TRANSITION_PREFIX: &str = "transition:";

    /// Tags whose blocks are placed only by the sport strategy.
    pub const RESERVED: &[&str] = &[TRANSITION, MAX_CHALLENGE];

    /// Build the directed transition tag for a pose family change.
    pub fn transition_between(from: &str, to: &str) -> String {
        format!("{TRANSITION_PREFIX}{from}_to_{to}")
    }
}

/// Usage statistics for a block. Mutated by the engine after each
/// generation, never by content authors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UsageStats {
    pub count: u64,
    pub last_used: Option<DateTime<Utc>>,
}

impl UsageStats {
    /// Record one more use at `at`.
    pub fn bump(&mut self, at: DateTime<Utc>) {
        self.count += 1;
        self.last_used = Some(match self.last_used {
            Some(prev) if prev > at => prev,
            _ => at,
        });
    }
}

/// A pre-authored piece of workout script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentBlock {
    pub id: BlockId,
    #[serde(default)]
    pub title: String,
    pub sport: Sport,
    pub category: CategoryId,
    /// Spoken duration in minutes.
    pub duration: f64,
    #[serde(default)]
    pub tier: Tier,
    pub text: String,
    /// `None` means the block suits any goal.
    #[serde(default)]
    pub goal: Option<Goal>,
    #[serde(default)]
    pub tags: FxHashSet<String>,
    #[serde(default)]
    pub usage: UsageStats,
}

impl ContentBlock {
    /// Returns true if this block has the given tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Returns true if this block carries any tag the sport strategy reserves.
    pub fn is_reserved(&self) -> bool {
        tags::RESERVED.iter().any(|t| self.has_tag(t))
    }

    /// The pose family from a `pose:<family>` tag, if any. With several
    /// such tags the lexicographically smallest wins so the answer is stable.
    pub fn pose_family(&self) -> Option<&str> {
        self.tags
            .iter()
            .filter_map(|t| t.strip_prefix(tags::POSE_PREFIX))
            .filter(|f| !f.is_empty())
            .min()
    }

    /// Returns true if this block may be used for a workout with `goal`.
    pub fn fits_goal(&self, goal: Goal) -> bool {
        self.goal.map_or(true, |g| g.fits(goal))
    }
}

/// A grouping of blocks within one sport (e.g. "Warm-up", "Combos").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub sport: Sport,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    /// Display ordering weight; lower sorts first.
    #[serde(default)]
    pub weight: i32,
}

impl Category {
    /// Display name, falling back to the system name when unset.
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }
}
