//! Content repository and session store: the engine's only view of storage.
//!
//! The engine talks to storage through two traits. `InMemoryRepository`
//! implements both over a `ContentLibrary` loaded from RON; usage statistics
//! live in a `DashMap` so concurrent generations never lose an increment.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::RwLock;
use thiserror::Error;
use tracing::debug;

use crate::schema::content::{BlockId, Category, CategoryId, ContentBlock, UsageStats};
use crate::schema::quote::Quote;
use crate::schema::session::{GenerationSession, SessionId};
use crate::schema::sport::{Goal, Sport, Tier};
use crate::schema::template::Template;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("repository unavailable: {0}")]
    Unavailable(String),
    #[error("unknown block: {0:?}")]
    UnknownBlock(BlockId),
}

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid content library: {0}")]
    Invalid(String),
}

/// Read surface over stored content plus the atomic usage mutator.
pub trait ContentRepository: Send + Sync {
    /// Categories for a sport, ordered by display weight.
    fn categories(&self, sport: Sport) -> Result<Vec<Category>, RepositoryError>;

    /// Blocks of one category and sport, optionally capped at a tier.
    /// Returned blocks carry their current usage statistics.
    fn blocks(
        &self,
        category: CategoryId,
        sport: Sport,
        max_tier: Option<Tier>,
    ) -> Result<Vec<ContentBlock>, RepositoryError>;

    fn template(&self, sport: Sport, goal: Goal) -> Result<Option<Template>, RepositoryError>;

    /// Quotes for a sport (scoped plus sport-agnostic), or every quote.
    fn quotes(&self, sport: Option<Sport>) -> Result<Vec<Quote>, RepositoryError>;

    /// Atomically bump a block's usage count and last-used timestamp.
    fn record_usage(&self, block: BlockId, at: DateTime<Utc>)
        -> Result<UsageStats, RepositoryError>;

    /// Undo one `record_usage(block, at)`. The timestamp goes back to
    /// `previous` only if nothing newer has been recorded since.
    fn revert_usage(
        &self,
        block: BlockId,
        at: DateTime<Utc>,
        previous: Option<DateTime<Utc>>,
    ) -> Result<UsageStats, RepositoryError>;
}

/// Append-only storage for generation sessions.
pub trait SessionStore: Send + Sync {
    fn save_session(&self, session: GenerationSession) -> Result<(), RepositoryError>;

    /// All sessions, newest first.
    fn list_sessions(&self) -> Result<Vec<GenerationSession>, RepositoryError>;

    fn get_session(&self, id: SessionId) -> Result<Option<GenerationSession>, RepositoryError>;
}

/// Authored content as stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentLibrary {
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub blocks: Vec<ContentBlock>,
    #[serde(default)]
    pub templates: Vec<Template>,
    #[serde(default)]
    pub quotes: Vec<Quote>,
}

impl ContentLibrary {
    /// Load a content library from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<ContentLibrary, LibraryError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a content library from a RON string.
    pub fn parse_ron(input: &str) -> Result<ContentLibrary, LibraryError> {
        let library: ContentLibrary = ron::from_str(input)?;
        library.validate()?;
        Ok(library)
    }

    /// Merge another library into this one. Entries from `other` replace
    /// entries in `self` with the same id (templates: same sport and goal).
    pub fn merge(&mut self, other: ContentLibrary) {
        for category in other.categories {
            self.categories.retain(|c| c.id != category.id);
            self.categories.push(category);
        }
        for block in other.blocks {
            self.blocks.retain(|b| b.id != block.id);
            self.blocks.push(block);
        }
        for template in other.templates {
            self.templates
                .retain(|t| !(t.sport == template.sport && t.goal == template.goal));
            self.templates.push(template);
        }
        for quote in other.quotes {
            self.quotes.retain(|q| q.id != quote.id);
            self.quotes.push(quote);
        }
    }

    /// Check the structural rules generation depends on.
    pub fn validate(&self) -> Result<(), LibraryError> {
        let mut category_ids = FxHashSet::default();
        for category in &self.categories {
            if !category_ids.insert(category.id) {
                return Err(LibraryError::Invalid(format!(
                    "duplicate category id {:?}",
                    category.id
                )));
            }
        }

        let mut block_ids = FxHashSet::default();
        for block in &self.blocks {
            if !block_ids.insert(block.id) {
                return Err(LibraryError::Invalid(format!(
                    "duplicate block id {:?}",
                    block.id
                )));
            }
            if !(block.duration.is_finite() && block.duration > 0.0) {
                return Err(LibraryError::Invalid(format!(
                    "block {:?} has non-positive duration {}",
                    block.id, block.duration
                )));
            }
            match self.categories.iter().find(|c| c.id == block.category) {
                None => {
                    return Err(LibraryError::Invalid(format!(
                        "block {:?} references unknown category {:?}",
                        block.id, block.category
                    )))
                }
                Some(c) if c.sport != block.sport => {
                    return Err(LibraryError::Invalid(format!(
                        "block {:?} is {} but its category {:?} is {}",
                        block.id, block.sport, c.id, c.sport
                    )))
                }
                Some(_) => {}
            }
        }

        for template in &self.templates {
            for section in &template.sections {
                if section.categories.is_empty() {
                    return Err(LibraryError::Invalid(format!(
                        "{} {} template section {} has an empty category group",
                        template.sport,
                        template.goal,
                        section.describe()
                    )));
                }
                if section.min_slots > section.max_slots {
                    return Err(LibraryError::Invalid(format!(
                        "{} {} template section {} has min_slots > max_slots",
                        template.sport,
                        template.goal,
                        section.describe()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Reference repository that keeps everything in memory.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    categories: Vec<Category>,
    blocks: Vec<ContentBlock>,
    templates: Vec<Template>,
    quotes: Vec<Quote>,
    usage: DashMap<BlockId, UsageStats>,
    sessions: RwLock<Vec<GenerationSession>>,
}

impl InMemoryRepository {
    pub fn new(library: ContentLibrary) -> Self {
        let usage = library
            .blocks
            .iter()
            .map(|b| (b.id, b.usage))
            .collect::<DashMap<_, _>>();
        let mut categories = library.categories;
        categories.sort_by(|a, b| a.weight.cmp(&b.weight).then(a.id.cmp(&b.id)));
        Self {
            categories,
            blocks: library.blocks,
            templates: library.templates,
            quotes: library.quotes,
            usage,
            sessions: RwLock::new(Vec::new()),
        }
    }

    /// Load and validate a RON library file into a fresh repository.
    pub fn load_from_ron(path: &Path) -> Result<Self, LibraryError> {
        Ok(Self::new(ContentLibrary::load_from_ron(path)?))
    }

    /// Current usage statistics for a block.
    pub fn usage(&self, id: BlockId) -> Option<UsageStats> {
        self.usage.get(&id).map(|s| *s)
    }

    /// Look up a single block with its live usage statistics.
    pub fn block(&self, id: BlockId) -> Option<ContentBlock> {
        self.blocks
            .iter()
            .find(|b| b.id == id)
            .map(|b| self.with_usage(b))
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    fn with_usage(&self, block: &ContentBlock) -> ContentBlock {
        let mut block = block.clone();
        if let Some(stats) = self.usage.get(&block.id) {
            block.usage = *stats;
        }
        block
    }
}

impl ContentRepository for InMemoryRepository {
    fn categories(&self, sport: Sport) -> Result<Vec<Category>, RepositoryError> {
        Ok(self
            .categories
            .iter()
            .filter(|c| c.sport == sport)
            .cloned()
            .collect())
    }

    fn blocks(
        &self,
        category: CategoryId,
        sport: Sport,
        max_tier: Option<Tier>,
    ) -> Result<Vec<ContentBlock>, RepositoryError> {
        Ok(self
            .blocks
            .iter()
            .filter(|b| b.category == category && b.sport == sport)
            .filter(|b| max_tier.map_or(true, |cap| b.tier <= cap))
            .map(|b| self.with_usage(b))
            .collect())
    }

    fn template(&self, sport: Sport, goal: Goal) -> Result<Option<Template>, RepositoryError> {
        Ok(self
            .templates
            .iter()
            .find(|t| t.sport == sport && t.goal == goal)
            .cloned())
    }

    fn quotes(&self, sport: Option<Sport>) -> Result<Vec<Quote>, RepositoryError> {
        Ok(self
            .quotes
            .iter()
            .filter(|q| sport.map_or(true, |s| q.applies_to(s)))
            .cloned()
            .collect())
    }

    fn record_usage(
        &self,
        block: BlockId,
        at: DateTime<Utc>,
    ) -> Result<UsageStats, RepositoryError> {
        // get_mut holds the shard write lock for the whole read-increment-write.
        let mut stats = self
            .usage
            .get_mut(&block)
            .ok_or(RepositoryError::UnknownBlock(block))?;
        stats.bump(at);
        debug!(block = block.0, count = stats.count, "recorded block usage");
        Ok(*stats)
    }

    fn revert_usage(
        &self,
        block: BlockId,
        at: DateTime<Utc>,
        previous: Option<DateTime<Utc>>,
    ) -> Result<UsageStats, RepositoryError> {
        let mut stats = self
            .usage
            .get_mut(&block)
            .ok_or(RepositoryError::UnknownBlock(block))?;
        stats.count = stats.count.saturating_sub(1);
        if stats.last_used == Some(at) {
            stats.last_used = previous;
        }
        debug!(block = block.0, count = stats.count, "reverted block usage");
        Ok(*stats)
    }
}

impl SessionStore for InMemoryRepository {
    fn save_session(&self, session: GenerationSession) -> Result<(), RepositoryError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| RepositoryError::Unavailable("session store lock poisoned".into()))?;
        sessions.push(session);
        Ok(())
    }

    fn list_sessions(&self) -> Result<Vec<GenerationSession>, RepositoryError> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| RepositoryError::Unavailable("session store lock poisoned".into()))?;
        let mut listed = sessions.clone();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(listed)
    }

    fn get_session(&self, id: SessionId) -> Result<Option<GenerationSession>, RepositoryError> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| RepositoryError::Unavailable("session store lock poisoned".into()))?;
        Ok(sessions.iter().find(|s| s.id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;
    use std::thread;

    const LIBRARY: &str = r#"(
        categories: [
            (id: CategoryId(1), sport: kickboxing, name: "kb_warmup", display_name: "Warm-up", weight: 10),
            (id: CategoryId(2), sport: kickboxing, name: "kb_combos", weight: 5),
        ],
        blocks: [
            (id: BlockId(1), sport: kickboxing, category: CategoryId(1), duration: 5.0, text: "Jog in place."),
            (id: BlockId(2), sport: kickboxing, category: CategoryId(2), duration: 4.0, tier: advanced,
             text: "Jab cross hook.", tags: ["anchor"]),
            (id: BlockId(3), sport: kickboxing, category: CategoryId(2), duration: 4.0, tier: beginner,
             text: "Jab jab cross."),
        ],
        templates: [
            (sport: kickboxing, goal: allround, sections: [
                (position: 1, categories: [CategoryId(1)]),
            ]),
        ],
        quotes: [
            (id: QuoteId(1), text: "Hands up.", sport: Some(kickboxing), rule: intro),
            (id: QuoteId(2), text: "Breathe.", sport: Some(power_yoga), rule: intro),
            (id: QuoteId(3), text: "Keep moving.", rule: random),
        ],
    )"#;

    fn repo() -> InMemoryRepository {
        InMemoryRepository::new(ContentLibrary::parse_ron(LIBRARY).unwrap())
    }

    #[test]
    fn categories_sorted_by_weight() {
        let cats = repo().categories(Sport::Kickboxing).unwrap();
        assert_eq!(cats.len(), 2);
        assert_eq!(cats[0].name, "kb_combos");
        assert!(repo().categories(Sport::PowerYoga).unwrap().is_empty());
    }

    #[test]
    fn blocks_respect_tier_cap() {
        let repo = repo();
        let all = repo.blocks(CategoryId(2), Sport::Kickboxing, None).unwrap();
        assert_eq!(all.len(), 2);
        let capped = repo
            .blocks(CategoryId(2), Sport::Kickboxing, Some(Tier::Intermediate))
            .unwrap();
        assert_eq!(capped.len(), 1);
        assert_eq!(capped[0].id, BlockId(3));
        assert!(repo
            .blocks(CategoryId(2), Sport::PowerYoga, None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn quotes_filter_by_scope() {
        let repo = repo();
        let kb = repo.quotes(Some(Sport::Kickboxing)).unwrap();
        let ids: Vec<u64> = kb.iter().map(|q| q.id.0).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(repo.quotes(None).unwrap().len(), 3);
    }

    #[test]
    fn template_lookup() {
        let repo = repo();
        assert!(repo
            .template(Sport::Kickboxing, Goal::Allround)
            .unwrap()
            .is_some());
        assert!(repo
            .template(Sport::Kickboxing, Goal::Strength)
            .unwrap()
            .is_none());
    }

    #[test]
    fn record_usage_updates_block_snapshot() {
        let repo = repo();
        let now = Utc::now();
        let stats = repo.record_usage(BlockId(1), now).unwrap();
        assert_eq!(stats.count, 1);
        let block = repo.block(BlockId(1)).unwrap();
        assert_eq!(block.usage.count, 1);
        assert_eq!(block.usage.last_used, Some(now));
        assert!(matches!(
            repo.record_usage(BlockId(99), now),
            Err(RepositoryError::UnknownBlock(BlockId(99)))
        ));
    }

    #[test]
    fn revert_usage_restores_previous_stats() {
        let repo = repo();
        let first = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap();
        repo.record_usage(BlockId(1), first).unwrap();
        repo.record_usage(BlockId(1), second).unwrap();
        let stats = repo.revert_usage(BlockId(1), second, Some(first)).unwrap();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.last_used, Some(first));

        // A newer timestamp from another generation is left in place.
        let third = Utc.with_ymd_and_hms(2024, 5, 3, 8, 0, 0).unwrap();
        repo.record_usage(BlockId(1), third).unwrap();
        let stats = repo.revert_usage(BlockId(1), first, None).unwrap();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.last_used, Some(third));
        assert!(repo.revert_usage(BlockId(99), first, None).is_err());
    }

    #[test]
    fn concurrent_usage_updates_are_not_lost() {
        let repo = Arc::new(repo());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let repo = Arc::clone(&repo);
                thread::spawn(move || {
                    for _ in 0..250 {
                        repo.record_usage(BlockId(2), Utc::now()).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(repo.usage(BlockId(2)).unwrap().count, 2000);
    }

    #[test]
    fn validate_rejects_bad_content() {
        let dup = r#"(
            categories: [(id: CategoryId(1), sport: kickboxing, name: "a")],
            blocks: [
                (id: BlockId(1), sport: kickboxing, category: CategoryId(1), duration: 1.0, text: "x"),
                (id: BlockId(1), sport: kickboxing, category: CategoryId(1), duration: 1.0, text: "y"),
            ],
        )"#;
        assert!(matches!(
            ContentLibrary::parse_ron(dup),
            Err(LibraryError::Invalid(_))
        ));

        let wrong_sport = r#"(
            categories: [(id: CategoryId(1), sport: kickboxing, name: "a")],
            blocks: [(id: BlockId(1), sport: calisthenics, category: CategoryId(1), duration: 1.0, text: "x")],
        )"#;
        assert!(ContentLibrary::parse_ron(wrong_sport).is_err());

        let zero = r#"(
            categories: [(id: CategoryId(1), sport: kickboxing, name: "a")],
            blocks: [(id: BlockId(1), sport: kickboxing, category: CategoryId(1), duration: 0.0, text: "x")],
        )"#;
        assert!(ContentLibrary::parse_ron(zero).is_err());
    }

    #[test]
    fn merge_replaces_by_id() {
        let mut base = ContentLibrary::parse_ron(LIBRARY).unwrap();
        let patch = ContentLibrary::parse_ron(
            r#"(
                categories: [(id: CategoryId(1), sport: kickboxing, name: "kb_warmup", display_name: "Opening")],
            )"#,
        )
        .unwrap();
        base.merge(patch);
        assert_eq!(base.categories.len(), 2);
        let warmup = base.categories.iter().find(|c| c.id == CategoryId(1)).unwrap();
        assert_eq!(warmup.label(), "Opening");
    }

    #[test]
    fn sessions_list_newest_first() {
        use crate::schema::session::{
            GenerationRequest, GenerationResult, SportAdditions, TimeClass, TimeStatus,
        };
        let repo = repo();
        let request = GenerationRequest::new(Sport::Kickboxing, Goal::Allround);
        let result = GenerationResult {
            title: "t".to_string(),
            training_type: Sport::Kickboxing,
            goal: Goal::Allround,
            total_duration: 60.0,
            time_status: TimeStatus {
                classification: TimeClass::Perfect,
                delta: 0.0,
            },
            sport_specific_additions: SportAdditions::default(),
            compiled_script: String::new(),
            used_block_ids: Vec::new(),
            pool_exhausted: false,
            entries: Vec::new(),
            notices: Vec::new(),
        };
        let older = GenerationSession {
            id: SessionId::new(),
            request,
            result: result.clone(),
            created_at: Utc::now() - chrono::Duration::minutes(5),
        };
        let newer = GenerationSession {
            id: SessionId::new(),
            request,
            result,
            created_at: Utc::now(),
        };
        repo.save_session(older.clone()).unwrap();
        repo.save_session(newer.clone()).unwrap();

        let listed = repo.list_sessions().unwrap();
        assert_eq!(listed[0].id, newer.id);
        assert_eq!(listed[1].id, older.id);
        assert_eq!(repo.get_session(older.id).unwrap(), Some(older));
        assert!(repo.get_session(SessionId::new()).unwrap().is_none());
    }
}
