//! The committed block sequence as it moves through the pipeline.

use crate::core::resolver::ResolvedTemplate;
use crate::schema::content::{BlockId, ContentBlock};
use crate::schema::template::TemplateSection;

/// Which sport strategy placed a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdditionKind {
    SurpriseRound,
    VinyasaTransition,
    MaxChallenge,
}

impl AdditionKind {
    /// Banner printed above the block in the compiled script.
    pub fn banner(&self) -> &'static str {
        match self {
            Self::SurpriseRound => "SURPRISE ROUND",
            Self::VinyasaTransition => "VINYASA TRANSITION",
            Self::MaxChallenge => "MAX CHALLENGE",
        }
    }
}

/// How an entry got into the draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Filled one of the section's required or target slots.
    Template,
    /// Added by the timing balancer.
    Filler,
    /// Inserted by the sport strategy.
    Addition(AdditionKind),
    /// Selected normally, then pinned to the end of the script.
    Relocated,
}

impl Origin {
    /// Entries that count toward a section's slot limits.
    pub fn fills_slot(&self) -> bool {
        matches!(self, Self::Template | Self::Filler)
    }

    /// Entries the balancer must leave alone and fillers must not follow.
    pub fn is_pinned(&self) -> bool {
        matches!(self, Self::Addition(_) | Self::Relocated)
    }
}

#[derive(Debug, Clone)]
pub struct DraftEntry {
    pub block: ContentBlock,
    pub origin: Origin,
}

impl DraftEntry {
    pub fn new(block: ContentBlock, origin: Origin) -> Self {
        Self { block, origin }
    }

    /// Returns true if the timing balancer may remove this entry.
    pub fn is_removable(&self) -> bool {
        self.origin.fills_slot() && !self.block.is_reserved()
    }
}

/// One template section with its eligible pool and committed entries.
#[derive(Debug, Clone)]
pub struct SectionDraft {
    pub section: TemplateSection,
    pub pool: Vec<ContentBlock>,
    /// Uncapped blocks used only to avoid repeats; see `ResolvedSection`.
    pub overflow: Vec<ContentBlock>,
    pub entries: Vec<DraftEntry>,
}

impl SectionDraft {
    pub fn new(section: TemplateSection, pool: Vec<ContentBlock>) -> Self {
        Self {
            section,
            pool,
            overflow: Vec::new(),
            entries: Vec::new(),
        }
    }

    pub fn with_overflow(mut self, overflow: Vec<ContentBlock>) -> Self {
        self.overflow = overflow;
        self
    }

    pub fn slot_count(&self) -> usize {
        self.entries.iter().filter(|e| e.origin.fills_slot()).count()
    }

    pub fn duration(&self) -> f64 {
        self.entries.iter().map(|e| e.block.duration).sum()
    }

    /// Index where a balancer filler goes: before any trailing pinned entries.
    pub fn filler_index(&self) -> usize {
        let trailing = self
            .entries
            .iter()
            .rev()
            .take_while(|e| e.origin.is_pinned())
            .count();
        self.entries.len() - trailing
    }
}

/// The in-progress script: sections in template order.
#[derive(Debug, Clone, Default)]
pub struct ScriptDraft {
    pub sections: Vec<SectionDraft>,
}

impl ScriptDraft {
    pub fn from_resolved(resolved: ResolvedTemplate) -> Self {
        Self {
            sections: resolved
                .sections
                .into_iter()
                .map(|r| SectionDraft::new(r.section, r.pool).with_overflow(r.overflow))
                .collect(),
        }
    }

    /// Exact sum of every entry's duration.
    pub fn total_duration(&self) -> f64 {
        self.sections.iter().map(SectionDraft::duration).sum()
    }

    /// Block ids in script order, repeats included.
    pub fn block_ids(&self) -> Vec<BlockId> {
        self.entries().map(|e| e.block.id).collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &DraftEntry> {
        self.sections.iter().flat_map(|s| s.entries.iter())
    }

    /// Position of the final entry in the script, as (section, entry).
    pub fn last_position(&self) -> Option<(usize, usize)> {
        self.sections
            .iter()
            .enumerate()
            .rev()
            .find(|(_, s)| !s.entries.is_empty())
            .map(|(si, s)| (si, s.entries.len() - 1))
    }

    pub fn last_entry(&self) -> Option<&DraftEntry> {
        self.last_position()
            .map(|(si, ei)| &self.sections[si].entries[ei])
    }

    /// Index of the last section that may receive an appended block.
    pub fn tail_section(&self) -> Option<usize> {
        self.last_position()
            .map(|(si, _)| si)
            .or_else(|| self.sections.len().checked_sub(1))
    }

    pub fn non_empty_sections(&self) -> usize {
        self.sections.iter().filter(|s| !s.entries.is_empty()).count()
    }

    pub fn count_origin(&self, origin: Origin) -> usize {
        self.entries().filter(|e| e.origin == origin).count()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::schema::content::{CategoryId, UsageStats};
    use crate::schema::sport::{Sport, Tier};

    pub fn block(id: u64, duration: f64, tags: &[&str]) -> ContentBlock {
        ContentBlock {
            id: BlockId(id),
            title: format!("Block {id}"),
            sport: Sport::Kickboxing,
            category: CategoryId(1),
            duration,
            tier: Tier::Beginner,
            text: format!("Text of block {id}."),
            goal: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            usage: UsageStats::default(),
        }
    }

    pub fn section(position: u32, min: usize, max: usize) -> TemplateSection {
        TemplateSection {
            position,
            label: None,
            categories: vec![CategoryId(1)],
            min_slots: min,
            max_slots: max,
            target: Default::default(),
            optional: false,
            anchor: false,
            surprise_eligible: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{block, section};
    use super::*;

    #[test]
    fn totals_and_ids_follow_script_order() {
        let mut a = SectionDraft::new(section(1, 1, 2), Vec::new());
        a.entries.push(DraftEntry::new(block(1, 5.0, &[]), Origin::Template));
        a.entries.push(DraftEntry::new(block(2, 2.5, &[]), Origin::Filler));
        let mut b = SectionDraft::new(section(2, 1, 1), Vec::new());
        b.entries.push(DraftEntry::new(
            block(3, 3.0, &[]),
            Origin::Addition(AdditionKind::SurpriseRound),
        ));
        let draft = ScriptDraft {
            sections: vec![a, b],
        };
        assert_eq!(draft.total_duration(), 10.5);
        assert_eq!(draft.block_ids(), vec![BlockId(1), BlockId(2), BlockId(3)]);
        assert_eq!(draft.sections[0].slot_count(), 2);
        assert_eq!(draft.sections[1].slot_count(), 0);
        assert_eq!(draft.last_position(), Some((1, 0)));
        assert_eq!(draft.non_empty_sections(), 2);
    }

    #[test]
    fn filler_index_skips_trailing_pinned_entries() {
        let mut s = SectionDraft::new(section(1, 1, 3), Vec::new());
        s.entries.push(DraftEntry::new(block(1, 5.0, &[]), Origin::Template));
        s.entries.push(DraftEntry::new(
            block(2, 5.0, &[]),
            Origin::Addition(AdditionKind::MaxChallenge),
        ));
        s.entries.push(DraftEntry::new(block(3, 5.0, &[]), Origin::Relocated));
        assert_eq!(s.filler_index(), 1);
    }

    #[test]
    fn reserved_and_pinned_entries_are_not_removable() {
        assert!(DraftEntry::new(block(1, 1.0, &[]), Origin::Template).is_removable());
        assert!(!DraftEntry::new(block(2, 1.0, &["max_challenge"]), Origin::Template).is_removable());
        assert!(!DraftEntry::new(block(3, 1.0, &[]), Origin::Relocated).is_removable());
        assert!(!DraftEntry::new(
            block(4, 1.0, &[]),
            Origin::Addition(AdditionKind::VinyasaTransition)
        )
        .is_removable());
    }

    #[test]
    fn tail_section_skips_trailing_empty_sections() {
        let mut a = SectionDraft::new(section(1, 1, 1), Vec::new());
        a.entries.push(DraftEntry::new(block(1, 5.0, &[]), Origin::Template));
        let b = SectionDraft::new(section(2, 0, 1), Vec::new());
        let draft = ScriptDraft {
            sections: vec![a, b],
        };
        assert_eq!(draft.tail_section(), Some(0));
        assert_eq!(ScriptDraft::default().tail_section(), None);
    }
}
