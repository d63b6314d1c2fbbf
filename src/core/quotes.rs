//! Quote placement at the intro and between sections.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::schema::quote::{InsertionRule, Quote};
use crate::schema::sport::Sport;

/// Whether placed quotes count toward the script's duration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteTiming {
    #[default]
    Excluded,
    PerQuote { minutes: f64 },
}

impl QuoteTiming {
    /// Minutes taken by `count` placed quotes.
    pub fn minutes(&self, count: usize) -> f64 {
        match *self {
            Self::Excluded => 0.0,
            Self::PerQuote { minutes } => minutes * count as f64,
        }
    }
}

/// Quotes chosen for one script.
#[derive(Debug, Clone, Default)]
pub struct QuotePlan {
    pub intro: Option<Quote>,
    /// `boundaries[i]` sits after the i-th rendered section.
    pub boundaries: Vec<Option<Quote>>,
}

impl QuotePlan {
    pub fn placed(&self) -> usize {
        self.intro.iter().count() + self.boundaries.iter().flatten().count()
    }

    pub fn boundary_after(&self, index: usize) -> Option<&Quote> {
        self.boundaries.get(index).and_then(Option::as_ref)
    }

    /// Quotes that appear when `sections` sections are rendered.
    pub fn rendered(&self, sections: usize) -> usize {
        let boundaries = sections.saturating_sub(1);
        self.intro.iter().count()
            + (0..boundaries).filter(|i| self.boundary_after(*i).is_some()).count()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QuoteInjector {
    pub timing: QuoteTiming,
}

impl QuoteInjector {
    pub fn new(timing: QuoteTiming) -> Self {
        Self { timing }
    }

    /// Choose an intro quote and one quote per boundary between
    /// `section_count` sections. No text is placed twice.
    pub fn plan(
        &self,
        quotes: &[Quote],
        sport: Sport,
        section_count: usize,
        rng: &mut StdRng,
    ) -> QuotePlan {
        let mut eligible: Vec<&Quote> = quotes.iter().filter(|q| q.applies_to(sport)).collect();
        eligible.sort_by_key(|q| q.id);
        let mut placed: FxHashSet<String> = FxHashSet::default();

        let intro = pick(&eligible, InsertionRule::Intro, &mut placed, rng);
        let boundaries = (0..section_count.saturating_sub(1))
            .map(|_| pick(&eligible, InsertionRule::BetweenSections, &mut placed, rng))
            .collect();

        let plan = QuotePlan { intro, boundaries };
        debug!(%sport, placed = plan.placed(), "quotes planned");
        plan
    }

    /// Minutes the plan adds to a script of `sections` rendered sections.
    pub fn minutes(&self, plan: &QuotePlan, sections: usize) -> f64 {
        self.timing.minutes(plan.rendered(sections))
    }
}

/// Random pick among unplaced quotes of the dedicated rule, falling back to
/// `Random`-rule quotes once those run out.
fn pick(
    eligible: &[&Quote],
    rule: InsertionRule,
    placed: &mut FxHashSet<String>,
    rng: &mut StdRng,
) -> Option<Quote> {
    let available = |wanted: InsertionRule| -> Vec<&Quote> {
        eligible
            .iter()
            .copied()
            .filter(|q| q.rule == wanted && !placed.contains(&q.text))
            .collect()
    };
    let mut candidates = available(rule);
    if candidates.is_empty() {
        candidates = available(InsertionRule::Random);
    }
    let quote = candidates.choose(rng).map(|q| (*q).clone())?;
    placed.insert(quote.text.clone());
    Some(quote)
}
