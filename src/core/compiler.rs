//! Renders a finished draft into the spoken script and builds the result.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::context::GenerationContext;
use crate::core::draft::{AdditionKind, DraftEntry, Origin, ScriptDraft, SectionDraft};
use crate::core::quotes::{QuotePlan, QuoteTiming};
use crate::core::timing::{round_minutes, TimingPolicy};
use crate::schema::content::{tags, Category, CategoryId};
use crate::schema::session::{
    ErrorKind, GenerationRequest, GenerationResult, ScriptEntry, SportAdditions,
};
use crate::schema::sport::Sport;

/// Pacing marker emitted after every block.
pub const PAUSE_MARKER: &str = "[pause strong] [pause strong]";

/// Numbered round headers for the main blocks of a script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundNumbering {
    /// Word before the number, e.g. "Round" or "Ronde".
    pub label: String,
    /// Category names whose blocks are never numbered.
    pub skip_categories: Vec<String>,
}

impl Default for RoundNumbering {
    fn default() -> Self {
        Self {
            label: "Round".to_string(),
            skip_categories: vec!["warmup".to_string(), "cooldown".to_string()],
        }
    }
}

/// Optional presentation layered over the plain script.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptFormat {
    /// First line of the script, per sport.
    pub opening: FxHashMap<Sport, String>,
    /// Last line of the script, per sport.
    pub closing: FxHashMap<Sport, String>,
    pub rounds: Option<RoundNumbering>,
}

impl ScriptFormat {
    /// Opening and closing lines of the Foxing Fit classes, with rounds
    /// numbered after the warm-up.
    pub fn branded() -> Self {
        let lines = |texts: [(Sport, &str); 3]| {
            texts
                .into_iter()
                .map(|(sport, text)| (sport, text.to_string()))
                .collect::<FxHashMap<_, _>>()
        };
        Self {
            opening: lines([
                (Sport::Kickboxing, "Get ready to start your Foxing Fit Heavybag Training."),
                (Sport::PowerYoga, "Get ready to start your Foxing Fit Power Yoga Lesson."),
                (Sport::Calisthenics, "Get ready to start your Foxing Fit Calisthenics workout."),
            ]),
            closing: lines([
                (Sport::Kickboxing, "Stay Sharp, Stay Foxing Fit."),
                (Sport::PowerYoga, "Stay Flexible, Stay Foxing Fit."),
                (Sport::Calisthenics, "Stay Strong, Stay Foxing Fit."),
            ]),
            rounds: Some(RoundNumbering::default()),
        }
    }
}

/// Everything the compiler reads for one script.
#[derive(Debug, Clone, Copy)]
pub struct CompileInput<'a> {
    pub draft: &'a ScriptDraft,
    pub quotes: &'a QuotePlan,
    pub categories: &'a [Category],
    pub request: GenerationRequest,
    pub additions: SportAdditions,
    pub policy: TimingPolicy,
    /// Whether rendered quotes count toward the total.
    pub quote_timing: QuoteTiming,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptCompiler {
    pub format: ScriptFormat,
}

impl ScriptCompiler {
    pub fn new(format: ScriptFormat) -> Self {
        Self { format }
    }

    /// Title in the form `{Sport} - {Goal} - {YYYY-MM-DD HH:MM}`.
    pub fn title(request: &GenerationRequest, at: DateTime<Utc>) -> String {
        format!(
            "{} - {} - {}",
            request.training_type.display_name(),
            request.goal.display_name(),
            at.format("%Y-%m-%d %H:%M")
        )
    }

    pub fn compile(&self, input: CompileInput<'_>, ctx: &mut GenerationContext) -> GenerationResult {
        let CompileInput {
            draft,
            quotes,
            categories,
            request,
            additions,
            policy,
            quote_timing,
            generated_at,
        } = input;
        let sport = request.training_type;

        let mut script = String::new();
        if let Some(opening) = self.format.opening.get(&sport) {
            script.push_str(&format!("{opening}\n\n"));
        }
        let mut spoken_quotes = 0;
        if let Some(intro) = &quotes.intro {
            script.push_str(&format!("**{}**\n\n", intro.text));
            spoken_quotes += 1;
        }

        let mut entries = Vec::new();
        let mut round = 0;
        let rendered: Vec<&SectionDraft> =
            draft.sections.iter().filter(|s| !s.entries.is_empty()).collect();
        for (index, section) in rendered.iter().enumerate() {
            script.push_str(&format!("## {}\n", header(section, categories)));
            for entry in &section.entries {
                if let Some(rounds) = &self.format.rounds {
                    if is_round(entry, rounds, categories) {
                        round += 1;
                        script.push_str(&format!(
                            "### {} {}: {}\n",
                            rounds.label,
                            round,
                            entry_title(entry)
                        ));
                    }
                }
                render_entry(&mut script, entry);
                entries.push(ScriptEntry {
                    block_id: entry.block.id,
                    title: entry.block.title.clone(),
                    section: section.section.position,
                    category_id: entry.block.category,
                    category: category_label(categories, entry.block.category),
                    duration: entry.block.duration,
                    is_sport_addition: matches!(entry.origin, Origin::Addition(_)),
                });
            }
            if index + 1 < rendered.len() {
                if let Some(quote) = quotes.boundary_after(index) {
                    script.push_str(&format!("**{}**\n\n", quote.text));
                    spoken_quotes += 1;
                }
            }
        }
        if let Some(closing) = self.format.closing.get(&sport) {
            script.push_str(closing);
            script.push('\n');
        }

        let total_duration =
            round_minutes(draft.total_duration() + quote_timing.minutes(spoken_quotes));
        let time_status = policy.classify(total_duration);
        if !time_status.classification.is_within_tolerance() {
            warn!(total_duration, status = %time_status, "timing unresolved");
            ctx.notice(
                ErrorKind::TimingUnresolved,
                format!(
                    "{total_duration} minutes against a target of {} (±{})",
                    policy.target, policy.tolerance
                ),
            );
        }

        debug!(
            blocks = entries.len(),
            rounds = round,
            total_duration,
            chars = script.len(),
            "script compiled"
        );

        GenerationResult {
            title: Self::title(&request, generated_at),
            training_type: request.training_type,
            goal: request.goal,
            total_duration,
            time_status,
            sport_specific_additions: additions,
            compiled_script: script,
            used_block_ids: draft.block_ids(),
            pool_exhausted: ctx.pool_exhausted(),
            entries,
            notices: ctx.take_notices(),
        }
    }
}

/// Main blocks get a round number; warm-ups, cool-downs and sport
/// additions do not.
fn is_round(entry: &DraftEntry, rounds: &RoundNumbering, categories: &[Category]) -> bool {
    if !entry.origin.fills_slot() || entry.block.is_reserved() {
        return false;
    }
    let name = categories
        .iter()
        .find(|c| c.id == entry.block.category)
        .map(|c| c.name.as_str());
    !name.map_or(false, |n| rounds.skip_categories.iter().any(|s| s == n))
}

fn entry_title(entry: &DraftEntry) -> String {
    if entry.block.title.is_empty() {
        format!("block {}", entry.block.id.0)
    } else {
        entry.block.title.clone()
    }
}

fn banner(entry: &DraftEntry) -> Option<&'static str> {
    match entry.origin {
        Origin::Addition(kind) => Some(kind.banner()),
        Origin::Relocated if entry.block.has_tag(tags::MAX_CHALLENGE) => {
            Some(AdditionKind::MaxChallenge.banner())
        }
        _ => None,
    }
}

fn render_entry(script: &mut String, entry: &DraftEntry) {
    script.push_str(&format!("<!-- {} -->\n", entry_title(entry)));
    if let Some(banner) = banner(entry) {
        script.push_str(banner);
        script.push('\n');
    }
    script.push_str(entry.block.text.trim_end());
    script.push_str("\n\n");
    script.push_str(PAUSE_MARKER);
    script.push_str("\n\n");
}

fn header(section: &SectionDraft, categories: &[Category]) -> String {
    if let Some(label) = &section.section.label {
        return label.clone();
    }
    section
        .section
        .categories
        .first()
        .map(|id| category_label(categories, *id))
        .unwrap_or_else(|| format!("Section {}", section.section.position))
}

fn category_label(categories: &[Category], id: CategoryId) -> String {
    categories
        .iter()
        .find(|c| c.id == id)
        .map(|c| c.label().to_string())
        .unwrap_or_else(|| format!("Category {}", id.0))
}
