//! Variety selection: least-used, least-recent blocks first, with seeded
//! tie-breaks so a fixed seed always yields the same script.

use rand::rngs::StdRng;
use rand::Rng;
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::core::context::GenerationContext;
use crate::core::draft::{DraftEntry, Origin, SectionDraft};
use crate::schema::content::{BlockId, ContentBlock};

const EPSILON: f64 = 1e-9;

/// Outcome of filling a number of slots from one pool.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub picks: Vec<ContentBlock>,
    /// Set when the pool had fewer unused blocks than requested.
    pub pool_exhausted: bool,
}

/// Ranks candidates by usage and picks blocks without repeating within a script.
#[derive(Debug, Clone, Copy, Default)]
pub struct VarietySelector;

impl VarietySelector {
    pub fn new() -> Self {
        Self
    }

    /// Order candidates by (usage count asc, last used asc, seeded draw).
    ///
    /// Never-used blocks sort before any dated block. Candidates are put in
    /// id order before drawing so the draw does not depend on input order.
    pub fn rank<'a>(
        &self,
        candidates: impl IntoIterator<Item = &'a ContentBlock>,
        rng: &mut StdRng,
    ) -> Vec<&'a ContentBlock> {
        let mut by_id: Vec<&ContentBlock> = candidates.into_iter().collect();
        by_id.sort_by_key(|b| b.id);
        let mut keyed: Vec<(&ContentBlock, u64)> =
            by_id.into_iter().map(|b| (b, rng.gen::<u64>())).collect();
        keyed.sort_by(|(a, ka), (b, kb)| {
            a.usage
                .count
                .cmp(&b.usage.count)
                .then_with(|| a.usage.last_used.cmp(&b.usage.last_used))
                .then_with(|| ka.cmp(kb))
                .then_with(|| a.id.cmp(&b.id))
        });
        keyed.into_iter().map(|(b, _)| b).collect()
    }

    /// Pick `count` blocks from `pool`, unused ones first.
    ///
    /// Reuse only happens when the pool cannot supply enough unused blocks;
    /// reused blocks are taken in rank order and cycled if necessary.
    pub fn select(
        &self,
        pool: &[ContentBlock],
        count: usize,
        used: &FxHashSet<BlockId>,
        rng: &mut StdRng,
    ) -> Selection {
        if count == 0 || pool.is_empty() {
            return Selection::default();
        }

        let (fresh, seen): (Vec<&ContentBlock>, Vec<&ContentBlock>) =
            pool.iter().partition(|b| !used.contains(&b.id));
        let fresh = self.rank(fresh, rng);

        if fresh.len() >= count {
            return Selection {
                picks: fresh.into_iter().take(count).cloned().collect(),
                pool_exhausted: false,
            };
        }

        let mut picks: Vec<ContentBlock> = fresh.into_iter().cloned().collect();
        // Blocks picked above are reusable too once everything is taken.
        let mut reusable = self.rank(seen, rng);
        reusable.extend(picks.iter().filter_map(|p| pool.iter().find(|b| b.id == p.id)));
        let mut cycle = reusable.into_iter().cycle();
        while picks.len() < count {
            match cycle.next() {
                Some(block) => picks.push(block.clone()),
                None => break,
            }
        }

        Selection {
            picks,
            pool_exhausted: true,
        }
    }

    /// Best-ranked unused block, or `None` if every block is taken.
    pub fn pick_fresh(
        &self,
        pool: &[ContentBlock],
        used: &FxHashSet<BlockId>,
        rng: &mut StdRng,
    ) -> Option<ContentBlock> {
        self.rank(pool.iter().filter(|b| !used.contains(&b.id)), rng)
            .into_iter()
            .next()
            .cloned()
    }

    /// Largest unused, unreserved block no longer than `limit`.
    ///
    /// Equal durations resolve in rank order.
    pub fn pick_largest_fitting(
        &self,
        pool: &[ContentBlock],
        used: &FxHashSet<BlockId>,
        limit: f64,
        rng: &mut StdRng,
    ) -> Option<ContentBlock> {
        let ranked = self.rank(
            pool.iter().filter(|b| {
                !used.contains(&b.id) && !b.is_reserved() && b.duration <= limit + EPSILON
            }),
            rng,
        );
        let mut best: Option<&ContentBlock> = None;
        for block in ranked {
            if best.map_or(true, |b| block.duration > b.duration + EPSILON) {
                best = Some(block);
            }
        }
        best.cloned()
    }

    /// Fill a section's required slots, then grow it toward its target
    /// duration while unused blocks remain and `max_slots` allows.
    ///
    /// Required slots draw on the section's overflow blocks before any block
    /// is repeated.
    pub fn fill_section(&self, draft: &mut SectionDraft, ctx: &mut GenerationContext) {
        let section = &draft.section;
        let fresh = draft.pool.iter().filter(|b| !ctx.is_used(b.id)).count();
        let selection = if fresh >= section.min_slots || draft.overflow.is_empty() {
            self.select(&draft.pool, section.min_slots, &ctx.used, &mut ctx.rng)
        } else {
            let mut first = self.select(&draft.pool, fresh, &ctx.used, &mut ctx.rng);
            let mut taken = ctx.used.clone();
            taken.extend(first.picks.iter().map(|b| b.id));
            let widened: Vec<ContentBlock> =
                draft.pool.iter().chain(&draft.overflow).cloned().collect();
            let rest = self.select(&widened, section.min_slots - fresh, &taken, &mut ctx.rng);
            debug!(
                section = %section.describe(),
                overflow = rest.picks.len(),
                "topped up from blocks outside the difficulty cap"
            );
            first.picks.extend(rest.picks);
            first.pool_exhausted = rest.pool_exhausted;
            first
        };
        if selection.pool_exhausted {
            let fresh = draft
                .pool
                .iter()
                .chain(&draft.overflow)
                .filter(|b| !ctx.is_used(b.id))
                .count();
            ctx.flag_pool_exhausted(format!(
                "section {} needs {} blocks, {} unused available",
                section.describe(),
                section.min_slots,
                fresh
            ));
        }
        for block in selection.picks {
            ctx.mark_used(block.id);
            draft.entries.push(DraftEntry::new(block, Origin::Template));
        }

        while draft.slot_count() < draft.section.max_slots
            && draft.duration() < draft.section.target.min - EPSILON
        {
            match self.pick_fresh(&draft.pool, &ctx.used, &mut ctx.rng) {
                Some(block) => {
                    ctx.mark_used(block.id);
                    draft.entries.push(DraftEntry::new(block, Origin::Template));
                }
                None => break,
            }
        }

        debug!(
            section = %draft.section.describe(),
            blocks = draft.entries.len(),
            minutes = draft.duration(),
            "section filled"
        );
    }
}
