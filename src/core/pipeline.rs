/// The workout pipeline: request → resolved template → balanced, sport-aware
/// script.
///
/// Wires together template resolution, variety selection, timing balance,
/// sport strategy, quote placement, and compilation, then commits usage and
/// the session record.

use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, info_span, warn};

use crate::core::compiler::{CompileInput, ScriptCompiler};
use crate::core::config::{ConfigError, EngineConfig};
use crate::core::context::GenerationContext;
use crate::core::draft::ScriptDraft;
use crate::core::quotes::QuoteInjector;
use crate::core::repository::{
    ContentRepository, InMemoryRepository, LibraryError, RepositoryError, SessionStore,
};
use crate::core::resolver::{ResolveError, TemplateResolver};
use crate::core::sport::SportStrategy;
use crate::core::timing::{
    Pass, TimingBalancer, TimingPolicy, MAX_TARGET_MINUTES, MIN_TARGET_MINUTES,
};
use crate::core::variety::VarietySelector;
use crate::schema::content::BlockId;
use crate::schema::session::{
    ErrorKind, GenerationRequest, GenerationResult, GenerationSession, SessionId,
};
use crate::schema::sport::{Goal, Sport};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no template for {sport} / {goal}")]
    TemplateNotFound { sport: Sport, goal: Goal },
    #[error("insufficient content: section {section} has no available blocks")]
    InsufficientContent { position: u32, section: String },
    #[error("repository access failed: {0}")]
    RepositoryUnavailable(#[from] RepositoryError),
    #[error("content library error: {0}")]
    Library(#[from] LibraryError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("no content repository configured")]
    MissingRepository,
    #[error("target duration {minutes} is outside 15-120 minutes")]
    InvalidTarget { minutes: f64 },
}

impl EngineError {
    /// Shared classification, also used for result notices.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TemplateNotFound { .. } => ErrorKind::TemplateNotFound,
            Self::InsufficientContent { .. } => ErrorKind::InsufficientContent,
            Self::RepositoryUnavailable(_) => ErrorKind::RepositoryUnavailable,
            Self::Library(_) | Self::Config(_) | Self::MissingRepository => {
                ErrorKind::Configuration
            }
            Self::InvalidTarget { .. } => ErrorKind::InvalidRequest,
        }
    }
}

impl From<ResolveError> for EngineError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::TemplateNotFound { sport, goal } => Self::TemplateNotFound { sport, goal },
            ResolveError::InsufficientContent { position, section } => {
                Self::InsufficientContent { position, section }
            }
            ResolveError::Repository(e) => Self::RepositoryUnavailable(e),
        }
    }
}

/// The top-level workout engine. Built via `WorkoutEngine::builder()`.
///
/// Generation takes `&self`; the engine can be shared across threads and
/// run several requests at once against the same repositories.
pub struct WorkoutEngine {
    content: Arc<dyn ContentRepository>,
    sessions: Arc<dyn SessionStore>,
    config: EngineConfig,
    resolver: TemplateResolver,
    selector: VarietySelector,
    injector: QuoteInjector,
    compiler: ScriptCompiler,
    seed: u64,
    generation_count: AtomicU64,
}

/// Builder for constructing a `WorkoutEngine`.
#[derive(Default)]
pub struct WorkoutEngineBuilder {
    library_path: Option<String>,
    config_path: Option<String>,
    seed: Option<u64>,
    /// Directly provided content (for testing without files).
    content: Option<Arc<dyn ContentRepository>>,
    sessions: Option<Arc<dyn SessionStore>>,
    config: Option<EngineConfig>,
}

impl WorkoutEngine {
    pub fn builder() -> WorkoutEngineBuilder {
        WorkoutEngineBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn content(&self) -> &Arc<dyn ContentRepository> {
        &self.content
    }

    /// Number of generations started through [`WorkoutEngine::generate`].
    pub fn generation_count(&self) -> u64 {
        self.generation_count.load(Ordering::Relaxed)
    }

    /// Generate a workout, seeding the RNG from the engine seed and a
    /// per-engine generation counter.
    pub fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, EngineError> {
        let count = self.generation_count.fetch_add(1, Ordering::Relaxed);
        self.generate_seeded(request, self.seed.wrapping_add(count))
    }

    /// Generate a workout with an explicit seed.
    pub fn generate_seeded(
        &self,
        request: &GenerationRequest,
        seed: u64,
    ) -> Result<GenerationResult, EngineError> {
        let span = info_span!(
            "generate",
            sport = %request.training_type,
            goal = %request.goal,
            seed
        );
        let _guard = span.enter();
        let policy = self.policy_for(request)?;
        let content = self.content.as_ref();
        let mut ctx = GenerationContext::new(seed);

        // 1. Resolve template and section pools
        let resolved = self.resolver.resolve(content, request)?;
        let mut draft = ScriptDraft::from_resolved(resolved);

        // 2. Fill every section
        for section in draft.sections.iter_mut() {
            self.selector.fill_section(section, &mut ctx);
        }

        // 3. Plan quotes, so timed quotes count while balancing
        let quotes = content.quotes(Some(request.training_type))?;
        let plan = self.injector.plan(
            &quotes,
            request.training_type,
            draft.sections.len(),
            &mut ctx.rng,
        );
        let balancer = |draft: &ScriptDraft| {
            TimingBalancer::new(policy)
                .with_fixed_minutes(self.injector.minutes(&plan, draft.non_empty_sections()))
        };

        // 4. Draft timing pass
        balancer(&draft).balance(&mut draft, &self.selector, &mut ctx, Pass::Draft);

        // 5. Sport strategy, then re-balance around its additions
        let strategy =
            SportStrategy::for_sport(request.training_type, self.config.surprise_every_anchors);
        let mut additions = strategy.apply(&mut draft, content, &self.selector, &mut ctx)?;
        let outcome =
            balancer(&draft).balance(&mut draft, &self.selector, &mut ctx, Pass::Rebalance);
        if outcome.added > 0 {
            strategy.settle(&mut draft, content, &self.selector, &mut ctx, &mut additions)?;
        }

        // 6. Compile
        let categories = content.categories(request.training_type)?;
        let generated_at = Utc::now();
        let result = self.compiler.compile(
            CompileInput {
                draft: &draft,
                quotes: &plan,
                categories: &categories,
                request: *request,
                additions,
                policy,
                quote_timing: self.injector.timing,
                generated_at,
            },
            &mut ctx,
        );

        // 7. Commit usage, then the session record. A failure in either
        // reverts the usage already written.
        let mut committed: Vec<(BlockId, Option<DateTime<Utc>>)> = Vec::new();
        for entry in draft.entries() {
            let id = entry.block.id;
            let previous = if committed.iter().any(|(c, _)| *c == id) {
                Some(generated_at)
            } else {
                entry.block.usage.last_used
            };
            if let Err(err) = content.record_usage(id, generated_at) {
                self.revert_usage(&committed, generated_at);
                return Err(err.into());
            }
            committed.push((id, previous));
        }
        let session = GenerationSession {
            id: SessionId::new(),
            request: *request,
            result: result.clone(),
            created_at: generated_at,
        };
        debug!(session = %session.id, "saving session");
        if let Err(err) = self.sessions.save_session(session) {
            self.revert_usage(&committed, generated_at);
            return Err(err.into());
        }

        if result.pool_exhausted {
            warn!(title = %result.title, "generated with repeated blocks");
        }
        info!(
            title = %result.title,
            total_duration = result.total_duration,
            status = %result.time_status,
            blocks = result.used_block_ids.len(),
            "workout generated"
        );
        Ok(result)
    }

    /// The configured policy, or one scaled to the request's own target.
    fn policy_for(&self, request: &GenerationRequest) -> Result<TimingPolicy, EngineError> {
        match request.target_duration {
            None => Ok(self.config.timing),
            Some(minutes) if (MIN_TARGET_MINUTES..=MAX_TARGET_MINUTES).contains(&minutes) => {
                Ok(TimingPolicy::for_target(minutes))
            }
            Some(minutes) => Err(EngineError::InvalidTarget { minutes }),
        }
    }

    fn revert_usage(&self, committed: &[(BlockId, Option<DateTime<Utc>>)], at: DateTime<Utc>) {
        for (id, previous) in committed.iter().rev() {
            if let Err(err) = self.content.revert_usage(*id, at, *previous) {
                warn!(block = id.0, error = %err, "could not revert block usage");
            }
        }
        debug!(blocks = committed.len(), "usage reverted");
    }

    /// All recorded sessions, newest first.
    pub fn sessions(&self) -> Result<Vec<GenerationSession>, EngineError> {
        Ok(self.sessions.list_sessions()?)
    }

    pub fn session(&self, id: SessionId) -> Result<Option<GenerationSession>, EngineError> {
        Ok(self.sessions.get_session(id)?)
    }
}

impl WorkoutEngineBuilder {
    /// Load content from a RON library file.
    pub fn library(mut self, path: &str) -> Self {
        self.library_path = Some(path.to_string());
        self
    }

    /// Load configuration from a RON file.
    pub fn config_file(mut self, path: &str) -> Self {
        self.config_path = Some(path.to_string());
        self
    }

    /// Override the configured seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Provide configuration directly (for testing without files).
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn content(mut self, content: Arc<dyn ContentRepository>) -> Self {
        self.content = Some(content);
        self
    }

    pub fn sessions(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Use one repository for both content and sessions.
    pub fn repository<R>(mut self, repository: Arc<R>) -> Self
    where
        R: ContentRepository + SessionStore + 'static,
    {
        let content: Arc<dyn ContentRepository> = repository.clone();
        let sessions: Arc<dyn SessionStore> = repository;
        self.content = Some(content);
        self.sessions = Some(sessions);
        self
    }

    pub fn build(self) -> Result<WorkoutEngine, EngineError> {
        // File config first, then the directly provided one wins
        let mut config = match (&self.config, &self.config_path) {
            (Some(config), _) => config.clone(),
            (None, Some(path)) => EngineConfig::load_from_ron(Path::new(path))?,
            (None, None) => EngineConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        config.validate()?;

        let mut content = self.content;
        let mut sessions = self.sessions;
        if let Some(ref path) = self.library_path {
            let repo = Arc::new(InMemoryRepository::load_from_ron(Path::new(path))?);
            if content.is_none() {
                content = Some(repo.clone() as Arc<dyn ContentRepository>);
            }
            if sessions.is_none() {
                sessions = Some(repo as Arc<dyn SessionStore>);
            }
        }
        let content = content.ok_or(EngineError::MissingRepository)?;
        let sessions =
            sessions.unwrap_or_else(|| Arc::new(InMemoryRepository::default()) as Arc<dyn SessionStore>);

        debug!(seed = config.seed, target = config.timing.target, "engine built");
        Ok(WorkoutEngine {
            content,
            sessions,
            resolver: TemplateResolver::new(
                config.calisthenics_opening_sections,
                config.opening_max_tier,
            ),
            selector: VarietySelector::new(),
            injector: QuoteInjector::new(config.quote_timing),
            compiler: ScriptCompiler::new(config.script.clone()),
            seed: config.seed,
            generation_count: AtomicU64::new(0),
            config,
        })
    }
}
