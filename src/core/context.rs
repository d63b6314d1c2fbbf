//! Generation context: anti-repetition tracking for a single script.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rustc_hash::FxHashSet;
use tracing::warn;

use crate::schema::content::BlockId;
use crate::schema::session::{ErrorKind, Notice};

/// Per-request state threaded through every pipeline stage: the seeded RNG,
/// the ids already placed in this script, and any non-fatal notices.
#[derive(Debug, Clone)]
pub struct GenerationContext {
    pub rng: StdRng,
    pub used: FxHashSet<BlockId>,
    pool_exhausted: bool,
    notices: Vec<Notice>,
}

impl GenerationContext {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            used: FxHashSet::default(),
            pool_exhausted: false,
            notices: Vec::new(),
        }
    }

    pub fn used(&self) -> &FxHashSet<BlockId> {
        &self.used
    }

    pub fn is_used(&self, id: BlockId) -> bool {
        self.used.contains(&id)
    }

    pub fn mark_used(&mut self, id: BlockId) {
        self.used.insert(id);
    }

    /// Record that variety could not be fully honored.
    pub fn flag_pool_exhausted(&mut self, detail: impl Into<String>) {
        let detail = detail.into();
        warn!(%detail, "pool exhausted, reusing blocks");
        self.pool_exhausted = true;
        self.notice(ErrorKind::PoolExhausted, detail);
    }

    pub fn pool_exhausted(&self) -> bool {
        self.pool_exhausted
    }

    pub fn notice(&mut self, kind: ErrorKind, detail: impl Into<String>) {
        self.notices.push(Notice {
            kind,
            detail: detail.into(),
        });
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}
