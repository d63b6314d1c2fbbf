//! Sport-specific post-processing: surprise rounds, vinyasa transitions,
//! and difficulty progression.

use tracing::{debug, info, warn};

use crate::core::context::GenerationContext;
use crate::core::draft::{AdditionKind, DraftEntry, Origin, ScriptDraft};
use crate::core::repository::{ContentRepository, RepositoryError};
use crate::core::variety::VarietySelector;
use crate::schema::content::{tags, ContentBlock};
use crate::schema::session::SportAdditions;
use crate::schema::sport::Sport;

/// Closed set of sport behaviors, chosen by the request's training type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SportStrategy {
    /// Append a surprise round after every `surprise_every` anchor sections.
    Kickboxing { surprise_every: usize },
    /// Insert a transition wherever the pose family changes.
    PowerYoga,
    /// Order by difficulty and finish on a max challenge.
    Calisthenics,
}

impl SportStrategy {
    pub fn for_sport(sport: Sport, surprise_every_anchors: usize) -> Self {
        match sport {
            Sport::Kickboxing => Self::Kickboxing {
                surprise_every: surprise_every_anchors.max(1),
            },
            Sport::PowerYoga => Self::PowerYoga,
            Sport::Calisthenics => Self::Calisthenics,
        }
    }

    pub fn sport(&self) -> Sport {
        match self {
            Self::Kickboxing { .. } => Sport::Kickboxing,
            Self::PowerYoga => Sport::PowerYoga,
            Self::Calisthenics => Sport::Calisthenics,
        }
    }

    pub fn apply(
        &self,
        draft: &mut ScriptDraft,
        repo: &dyn ContentRepository,
        selector: &VarietySelector,
        ctx: &mut GenerationContext,
    ) -> Result<SportAdditions, RepositoryError> {
        let mut additions = SportAdditions::default();
        match *self {
            Self::Kickboxing { surprise_every } => {
                insert_surprise_rounds(draft, repo, selector, ctx, surprise_every, &mut additions)?
            }
            Self::PowerYoga => insert_transitions(draft, repo, selector, ctx, &mut additions)?,
            Self::Calisthenics => {
                order_by_difficulty(draft, &mut additions);
                finish_on_max_challenge(draft, repo, selector, ctx, &mut additions)?;
            }
        }
        info!(sport = %self.sport(), additions = %additions.summary(), "sport strategy applied");
        Ok(additions)
    }

    /// Restore the sport's ordering rules after the balancer added blocks.
    ///
    /// Fillers land at a section's filler index, which can break tier order
    /// or open an unbridged pose change. Both passes below leave an already
    /// settled draft untouched.
    pub fn settle(
        &self,
        draft: &mut ScriptDraft,
        repo: &dyn ContentRepository,
        selector: &VarietySelector,
        ctx: &mut GenerationContext,
        additions: &mut SportAdditions,
    ) -> Result<(), RepositoryError> {
        match *self {
            Self::Kickboxing { .. } => {}
            Self::PowerYoga => insert_transitions(draft, repo, selector, ctx, additions)?,
            Self::Calisthenics => order_by_difficulty(draft, additions),
        }
        debug!(sport = %self.sport(), additions = %additions.summary(), "draft settled");
        Ok(())
    }
}

/// Every block of the sport carrying `tag`, across all its categories.
fn tagged_pool(
    repo: &dyn ContentRepository,
    sport: Sport,
    tag: &str,
) -> Result<Vec<ContentBlock>, RepositoryError> {
    let mut pool = Vec::new();
    for category in repo.categories(sport)? {
        pool.extend(
            repo.blocks(category.id, sport, None)?
                .into_iter()
                .filter(|b| b.has_tag(tag)),
        );
    }
    Ok(pool)
}

fn insert_surprise_rounds(
    draft: &mut ScriptDraft,
    repo: &dyn ContentRepository,
    selector: &VarietySelector,
    ctx: &mut GenerationContext,
    every: usize,
    additions: &mut SportAdditions,
) -> Result<(), RepositoryError> {
    let pool = tagged_pool(repo, Sport::Kickboxing, tags::SURPRISE_ELIGIBLE)?;
    let mut anchors = 0;
    for section in draft.sections.iter_mut() {
        let anchor = section.section.anchor
            || section.entries.iter().any(|e| e.block.has_tag(tags::ANCHOR));
        if !anchor {
            continue;
        }
        anchors += 1;
        if anchors % every != 0 {
            continue;
        }
        if !section.section.surprise_eligible {
            debug!(section = %section.section.describe(), "surprise round suppressed");
            continue;
        }
        match selector.pick_fresh(&pool, &ctx.used, &mut ctx.rng) {
            Some(block) => {
                ctx.mark_used(block.id);
                section.entries.push(DraftEntry::new(
                    block,
                    Origin::Addition(AdditionKind::SurpriseRound),
                ));
                additions.surprise_rounds_added += 1;
            }
            None => {
                warn!(section = %section.section.describe(), "no unused surprise block left");
            }
        }
    }
    Ok(())
}

fn insert_transitions(
    draft: &mut ScriptDraft,
    repo: &dyn ContentRepository,
    selector: &VarietySelector,
    ctx: &mut GenerationContext,
    additions: &mut SportAdditions,
) -> Result<(), RepositoryError> {
    let changes = unbridged_changes(draft);
    if changes.is_empty() {
        return Ok(());
    }

    let pool = tagged_pool(repo, Sport::PowerYoga, tags::TRANSITION)?;
    let mut inserts = Vec::with_capacity(changes.len());
    for (si, ei, from, to) in changes {
        let (from, to) = (from.as_str(), to.as_str());
        let preferred_tag = tags::transition_between(from, to);
        let preferred: Vec<ContentBlock> = pool
            .iter()
            .filter(|b| b.has_tag(&preferred_tag))
            .cloned()
            .collect();
        let fresh = selector
            .pick_fresh(&preferred, &ctx.used, &mut ctx.rng)
            .or_else(|| selector.pick_fresh(&pool, &ctx.used, &mut ctx.rng));
        let block = match fresh {
            Some(block) => block,
            None => {
                let source = if preferred.is_empty() { &pool } else { &preferred };
                let selection = selector.select(source, 1, &ctx.used, &mut ctx.rng);
                match selection.picks.into_iter().next() {
                    Some(block) => {
                        ctx.flag_pool_exhausted(format!(
                            "transition {from} to {to} reuses block {}",
                            block.id.0
                        ));
                        block
                    }
                    None => {
                        warn!(from, to, "no transition blocks available");
                        continue;
                    }
                }
            }
        };
        ctx.mark_used(block.id);
        inserts.push((si, ei + 1, block));
    }

    // Back to front so earlier insertion points stay valid.
    for (si, at, block) in inserts.into_iter().rev() {
        draft.sections[si].entries.insert(
            at,
            DraftEntry::new(block, Origin::Addition(AdditionKind::VinyasaTransition)),
        );
        additions.vinyasa_transitions_added += 1;
    }
    Ok(())
}

/// Pose family changes with no transition between them, as
/// (section, entry, from, to) where the entry is the last block before the
/// change. A block tagged `pose_change` always ends its family run.
fn unbridged_changes(draft: &ScriptDraft) -> Vec<(usize, usize, String, String)> {
    let mut changes = Vec::new();
    let mut previous: Option<(usize, usize, &str, bool)> = None;
    let mut bridged = false;
    for (si, section) in draft.sections.iter().enumerate() {
        for (ei, entry) in section.entries.iter().enumerate() {
            if entry.block.has_tag(tags::TRANSITION) {
                bridged = true;
                continue;
            }
            let Some(family) = entry.block.pose_family() else {
                continue;
            };
            if let Some((psi, pei, from, forced)) = previous {
                if !bridged && (from != family || forced) {
                    changes.push((psi, pei, from.to_string(), family.to_string()));
                }
            }
            previous = Some((si, ei, family, entry.block.has_tag(tags::POSE_CHANGE)));
            bridged = false;
        }
    }
    changes
}

/// Sort each section's unpinned entries by tier. Pinned entries keep their
/// place at the end of the section.
fn order_by_difficulty(draft: &mut ScriptDraft, additions: &mut SportAdditions) {
    for section in draft.sections.iter_mut() {
        let end = section.filler_index();
        let head = &mut section.entries[..end];
        let before: Vec<_> = head.iter().map(|e| e.block.id).collect();
        head.sort_by_key(|e| e.block.tier);
        if head.iter().map(|e| e.block.id).ne(before) {
            additions.difficulty_reordered = true;
        }
    }
}

fn finish_on_max_challenge(
    draft: &mut ScriptDraft,
    repo: &dyn ContentRepository,
    selector: &VarietySelector,
    ctx: &mut GenerationContext,
    additions: &mut SportAdditions,
) -> Result<(), RepositoryError> {
    let is_max = |e: &DraftEntry| e.block.has_tag(tags::MAX_CHALLENGE);
    let mut selected: Vec<(usize, usize)> = draft
        .sections
        .iter()
        .enumerate()
        .flat_map(|(si, s)| {
            s.entries
                .iter()
                .enumerate()
                .filter(move |(_, e)| e.origin.fills_slot() && is_max(*e))
                .map(move |(ei, _)| (si, ei))
        })
        .collect();
    let last_selected = selected.pop();

    // Only one max challenge per script. Back to front keeps indices valid.
    for (si, ei) in selected.into_iter().rev() {
        let section = &draft.sections[si];
        let id = section.entries[ei].block.id.0;
        if section.slot_count() > section.section.min_slots {
            draft.sections[si].entries.remove(ei);
            warn!(block = id, "extra max challenge removed");
        } else {
            warn!(
                block = id,
                section = %section.section.describe(),
                "extra max challenge kept, its section is at minimum"
            );
        }
    }

    if draft.last_entry().map_or(false, is_max) {
        return Ok(());
    }
    let Some(tail) = draft.tail_section() else {
        return Ok(());
    };
    let selected = last_selected.and_then(|(si, _)| {
        draft.sections[si]
            .entries
            .iter()
            .rposition(|e| e.origin.fills_slot() && is_max(e))
            .map(|ei| (si, ei))
    });

    match selected {
        None => {
            let pool = tagged_pool(repo, Sport::Calisthenics, tags::MAX_CHALLENGE)?;
            match selector.pick_fresh(&pool, &ctx.used, &mut ctx.rng) {
                Some(block) => {
                    ctx.mark_used(block.id);
                    draft.sections[tail].entries.push(DraftEntry::new(
                        block,
                        Origin::Addition(AdditionKind::MaxChallenge),
                    ));
                    additions.max_challenge_added = true;
                }
                None => warn!("no max challenge blocks available"),
            }
        }
        Some((si, ei)) => {
            let section = &draft.sections[si];
            let can_spare = si == tail || section.slot_count() > section.section.min_slots;
            if can_spare {
                let mut entry = draft.sections[si].entries.remove(ei);
                entry.origin = Origin::Relocated;
                draft.sections[tail].entries.push(entry);
                additions.max_challenge_moved_last = true;
            } else {
                warn!(
                    section = %section.section.describe(),
                    "max challenge left in place, its section is at minimum"
                );
            }
        }
    }
    Ok(())
}
