use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of sports the engine knows how to build workouts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sport {
    Kickboxing,
    PowerYoga,
    Calisthenics,
}

impl Sport {
    pub const ALL: [Sport; 3] = [Sport::Kickboxing, Sport::PowerYoga, Sport::Calisthenics];

    /// Stable key used in content files and logs (e.g., "power_yoga").
    pub fn key(&self) -> &'static str {
        match self {
            Self::Kickboxing => "kickboxing",
            Self::PowerYoga => "power_yoga",
            Self::Calisthenics => "calisthenics",
        }
    }

    /// Human-facing name used in titles.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Kickboxing => "Kickboxing",
            Self::PowerYoga => "Power Yoga",
            Self::Calisthenics => "Calisthenics",
        }
    }

    /// Parse a sport from its key. Accepts hyphens in place of underscores.
    pub fn from_key(key: &str) -> Option<Sport> {
        let normalized = key.trim().to_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|s| s.key() == normalized)
    }
}

impl fmt::Display for Sport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// The training goal a workout (and optionally a content block) targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    Allround,
    Endurance,
    Strength,
    Flexibility,
    Technique,
}

impl Goal {
    pub const ALL: [Goal; 5] = [
        Goal::Allround,
        Goal::Endurance,
        Goal::Strength,
        Goal::Flexibility,
        Goal::Technique,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Allround => "allround",
            Self::Endurance => "endurance",
            Self::Strength => "strength",
            Self::Flexibility => "flexibility",
            Self::Technique => "technique",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Allround => "All-round",
            Self::Endurance => "Endurance",
            Self::Strength => "Strength",
            Self::Flexibility => "Flexibility",
            Self::Technique => "Technique",
        }
    }

    pub fn from_key(key: &str) -> Option<Goal> {
        let normalized = key.trim().to_lowercase().replace(['-', '_'], "");
        Self::ALL.into_iter().find(|g| g.key() == normalized)
    }

    /// Returns true if content authored for `self` may be used in a
    /// workout requested for `requested`. All-round content fits any goal.
    pub fn fits(&self, requested: Goal) -> bool {
        *self == Goal::Allround || *self == requested
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Difficulty / intensity tier of a content block. Ordered from easiest
/// to hardest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
    Max,
}
