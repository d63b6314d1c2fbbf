use serde::{Deserialize, Serialize};

use super::content::CategoryId;
use super::sport::{Goal, Sport};

/// Target duration sub-range for a section, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationRange {
    pub min: f64,
    pub max: f64,
}

impl Default for DurationRange {
    fn default() -> Self {
        Self { min: 0.0, max: f64::MAX }
    }
}

fn default_true() -> bool {
    true
}

fn default_one() -> usize {
    1
}

/// One slot requirement in a template.
///
/// `categories` is an OR-group: the section is satisfied when any member
/// category supplies blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateSection {
    pub position: u32,
    #[serde(default)]
    pub label: Option<String>,
    pub categories: Vec<CategoryId>,
    #[serde(default = "default_one")]
    pub min_slots: usize,
    #[serde(default = "default_one")]
    pub max_slots: usize,
    #[serde(default)]
    pub target: DurationRange,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub anchor: bool,
    #[serde(default = "default_true")]
    pub surprise_eligible: bool,
}

impl TemplateSection {
    /// Short identifier used in errors and logs.
    pub fn describe(&self) -> String {
        match &self.label {
            Some(label) => format!("#{} ({label})", self.position),
            None => format!("#{}", self.position),
        }
    }

    /// Returns true if the given category is a member of this section's OR-group.
    pub fn accepts(&self, category: CategoryId) -> bool {
        self.categories.contains(&category)
    }
}

/// The ordered section structure for a (sport, goal) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub sport: Sport,
    pub goal: Goal,
    pub sections: Vec<TemplateSection>,
}

impl Template {
    /// Sections sorted by position. Authoring order is not trusted.
    pub fn ordered_sections(&self) -> Vec<&TemplateSection> {
        let mut sections: Vec<&TemplateSection> = self.sections.iter().collect();
        sections.sort_by_key(|s| s.position);
        sections
    }
}
