//! Template resolution: locate the template for a request and compute the
//! eligible block pool of every section.

use thiserror::Error;
use tracing::{debug, trace};

use crate::core::repository::{ContentRepository, RepositoryError};
use crate::schema::content::ContentBlock;
use crate::schema::session::GenerationRequest;
use crate::schema::sport::{Goal, Sport, Tier};
use crate::schema::template::{Template, TemplateSection};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no template for {sport} / {goal}")]
    TemplateNotFound { sport: Sport, goal: Goal },
    #[error("section {section} has no available blocks in any of its categories")]
    InsufficientContent { position: u32, section: String },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A section paired with the blocks it may draw from.
#[derive(Debug, Clone)]
pub struct ResolvedSection {
    pub section: TemplateSection,
    pub pool: Vec<ContentBlock>,
    /// Blocks held back by the opening difficulty cap. Drawn on only when
    /// the capped pool runs out of fresh blocks.
    pub overflow: Vec<ContentBlock>,
}

#[derive(Debug, Clone)]
pub struct ResolvedTemplate {
    pub template: Template,
    pub sections: Vec<ResolvedSection>,
}

/// Resolves templates and section pools against a content repository.
#[derive(Debug, Clone)]
pub struct TemplateResolver {
    /// How many leading Calisthenics sections are difficulty-capped.
    pub opening_sections: usize,
    pub opening_max_tier: Tier,
}

impl Default for TemplateResolver {
    fn default() -> Self {
        Self {
            opening_sections: 2,
            opening_max_tier: Tier::Intermediate,
        }
    }
}

impl TemplateResolver {
    pub fn new(opening_sections: usize, opening_max_tier: Tier) -> Self {
        Self {
            opening_sections,
            opening_max_tier,
        }
    }

    pub fn resolve(
        &self,
        repo: &dyn ContentRepository,
        request: &GenerationRequest,
    ) -> Result<ResolvedTemplate, ResolveError> {
        let sport = request.training_type;
        let goal = request.goal;
        let template = repo
            .template(sport, goal)?
            .ok_or(ResolveError::TemplateNotFound { sport, goal })?;

        let mut sections = Vec::with_capacity(template.sections.len());
        for (index, section) in template.ordered_sections().into_iter().enumerate() {
            let cap = (sport == Sport::Calisthenics && index < self.opening_sections)
                .then_some(self.opening_max_tier);
            let mut pool = self.section_pool(repo, section, sport, goal, cap)?;
            let mut overflow = Vec::new();
            if cap.is_some() {
                let full = self.section_pool(repo, section, sport, goal, None)?;
                if pool.is_empty() {
                    debug!(
                        section = %section.describe(),
                        "no blocks within opening difficulty cap, using full pool"
                    );
                    pool = full;
                } else {
                    overflow = full
                        .into_iter()
                        .filter(|b| !pool.iter().any(|p| p.id == b.id))
                        .collect();
                }
            }
            if pool.is_empty() {
                return Err(ResolveError::InsufficientContent {
                    position: section.position,
                    section: section.describe(),
                });
            }
            trace!(
                section = %section.describe(),
                pool = pool.len(),
                overflow = overflow.len(),
                "section resolved"
            );
            sections.push(ResolvedSection {
                section: section.clone(),
                pool,
                overflow,
            });
        }

        debug!(%sport, %goal, sections = sections.len(), "template resolved");
        Ok(ResolvedTemplate { template, sections })
    }

    /// Union of the section's OR-group, filtered to the requested goal.
    fn section_pool(
        &self,
        repo: &dyn ContentRepository,
        section: &TemplateSection,
        sport: Sport,
        goal: Goal,
        cap: Option<Tier>,
    ) -> Result<Vec<ContentBlock>, RepositoryError> {
        let mut pool: Vec<ContentBlock> = Vec::new();
        for category in &section.categories {
            for block in repo.blocks(*category, sport, cap)? {
                if block.fits_goal(goal) && !pool.iter().any(|b| b.id == block.id) {
                    pool.push(block);
                }
            }
        }
        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::repository::{ContentLibrary, InMemoryRepository};

    const LIBRARY: &str = r#"(
        categories: [
            (id: CategoryId(1), sport: calisthenics, name: "push"),
            (id: CategoryId(2), sport: calisthenics, name: "pull"),
            (id: CategoryId(3), sport: calisthenics, name: "legs"),
        ],
        blocks: [
            (id: BlockId(1), sport: calisthenics, category: CategoryId(1), duration: 5.0, tier: advanced, text: "Archer push-ups."),
            (id: BlockId(2), sport: calisthenics, category: CategoryId(1), duration: 5.0, tier: beginner, text: "Knee push-ups."),
            (id: BlockId(3), sport: calisthenics, category: CategoryId(2), duration: 5.0, tier: advanced, text: "Muscle-ups."),
            (id: BlockId(4), sport: calisthenics, category: CategoryId(3), duration: 5.0, tier: beginner, text: "Squats.", goal: Some(strength)),
            (id: BlockId(5), sport: calisthenics, category: CategoryId(3), duration: 5.0, tier: beginner, text: "Lunges.", goal: Some(endurance)),
        ],
        templates: [
            (sport: calisthenics, goal: strength, sections: [
                (position: 2, categories: [CategoryId(2)]),
                (position: 1, categories: [CategoryId(1)]),
                (position: 3, categories: [CategoryId(3)]),
            ]),
            (sport: calisthenics, goal: flexibility, sections: [
                (position: 1, categories: [CategoryId(1)]),
                (position: 2, categories: [CategoryId(2)]),
                (position: 3, categories: [CategoryId(3)]),
            ]),
        ],
    )"#;

    fn repo() -> InMemoryRepository {
        InMemoryRepository::new(ContentLibrary::parse_ron(LIBRARY).unwrap())
    }

    fn ids(section: &ResolvedSection) -> Vec<u64> {
        let mut ids: Vec<u64> = section.pool.iter().map(|b| b.id.0).collect();
        ids.sort();
        ids
    }

    #[test]
    fn sections_come_back_in_position_order() {
        let resolved = TemplateResolver::default()
            .resolve(&repo(), &GenerationRequest::new(Sport::Calisthenics, Goal::Strength))
            .unwrap();
        let positions: Vec<u32> = resolved.sections.iter().map(|s| s.section.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
    }

    #[test]
    fn opening_sections_are_difficulty_capped() {
        let resolved = TemplateResolver::default()
            .resolve(&repo(), &GenerationRequest::new(Sport::Calisthenics, Goal::Strength))
            .unwrap();
        // Push has a beginner option, so the advanced one is held back.
        assert_eq!(ids(&resolved.sections[0]), vec![2]);
        let overflow: Vec<u64> = resolved.sections[0].overflow.iter().map(|b| b.id.0).collect();
        assert_eq!(overflow, vec![1]);
        // Pull has only advanced content, so the cap falls back to the full pool.
        assert_eq!(ids(&resolved.sections[1]), vec![3]);
        assert!(resolved.sections[1].overflow.is_empty());
        // Past the opening sections nothing is capped.
        assert!(resolved.sections[2].overflow.is_empty());
    }

    #[test]
    fn pools_are_filtered_by_goal() {
        let resolved = TemplateResolver::default()
            .resolve(&repo(), &GenerationRequest::new(Sport::Calisthenics, Goal::Strength))
            .unwrap();
        assert_eq!(ids(&resolved.sections[2]), vec![4]);
    }

    #[test]
    fn missing_template_is_reported() {
        let err = TemplateResolver::default()
            .resolve(&repo(), &GenerationRequest::new(Sport::Kickboxing, Goal::Strength))
            .unwrap_err();
        assert!(matches!(
            err,
            ResolveError::TemplateNotFound {
                sport: Sport::Kickboxing,
                goal: Goal::Strength
            }
        ));
    }

    #[test]
    fn empty_or_group_is_insufficient_content() {
        let err = TemplateResolver::default()
            .resolve(&repo(), &GenerationRequest::new(Sport::Calisthenics, Goal::Flexibility))
            .unwrap_err();
        match err {
            ResolveError::InsufficientContent { position, .. } => assert_eq!(position, 3),
            other => panic!("unexpected error: {other}"),
        }
    }
}
