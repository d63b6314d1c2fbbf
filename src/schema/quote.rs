use serde::{Deserialize, Serialize};

use super::sport::Sport;

/// Newtype wrapper for quote IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuoteId(pub u64);

/// Where a quote may be placed in a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertionRule {
    /// Opening line of the script.
    Intro,
    /// Between two completed sections.
    BetweenSections,
    /// Either slot.
    Random,
}

impl InsertionRule {
    pub fn allows_intro(&self) -> bool {
        matches!(self, Self::Intro | Self::Random)
    }

    pub fn allows_boundary(&self) -> bool {
        matches!(self, Self::BetweenSections | Self::Random)
    }
}

/// A motivational line spoken at a structural boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub text: String,
    /// `None` means the quote suits every sport.
    #[serde(default)]
    pub sport: Option<Sport>,
    pub rule: InsertionRule,
}

impl Quote {
    pub fn applies_to(&self, sport: Sport) -> bool {
        self.sport.map_or(true, |s| s == sport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_slots() {
        assert!(InsertionRule::Intro.allows_intro());
        assert!(!InsertionRule::Intro.allows_boundary());
        assert!(InsertionRule::BetweenSections.allows_boundary());
        assert!(!InsertionRule::BetweenSections.allows_intro());
        assert!(InsertionRule::Random.allows_intro());
        assert!(InsertionRule::Random.allows_boundary());
    }

    #[test]
    fn sport_scope() {
        let agnostic: Quote =
            ron::from_str("(id: QuoteId(1), text: \"Keep going.\", rule: random)").unwrap();
        assert!(agnostic.applies_to(Sport::Kickboxing));
        assert!(agnostic.applies_to(Sport::PowerYoga));

        let scoped = Quote {
            sport: Some(Sport::PowerYoga),
            ..agnostic
        };
        assert!(scoped.applies_to(Sport::PowerYoga));
        assert!(!scoped.applies_to(Sport::Calisthenics));
    }
}
