/// Content Linter: validates a content library before it goes live.
///
/// Usage: content_linter <library.ron>... [-v]
///
/// Files are merged in order, later entries replacing earlier ones.

use clap::Parser;
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};
use std::process;
use workout_engine::core::repository::{ContentLibrary, InMemoryRepository};
use workout_engine::core::resolver::TemplateResolver;
use workout_engine::schema::content::{tags, ContentBlock};
use workout_engine::schema::session::GenerationRequest;
use workout_engine::schema::sport::Sport;
use workout_engine::schema::template::Template;

#[derive(Parser)]
#[command(
    name = "content_linter",
    about = "Check that every template resolves and sport pools are stocked"
)]
struct LintArgs {
    /// One or more RON library files, or directories of them
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Enable verbose logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

fn main() {
    let args = LintArgs::parse();

    let log_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut library = ContentLibrary::default();
    for path in &args.paths {
        if path.is_dir() {
            load_recursive(path, &mut library);
        } else if path.is_file() {
            load_file(path, &mut library);
        } else {
            eprintln!("ERROR: Path '{}' does not exist", path.display());
            process::exit(1);
        }
    }

    println!(
        "Loaded {} categories, {} blocks, {} templates, {} quotes",
        library.categories.len(),
        library.blocks.len(),
        library.templates.len(),
        library.quotes.len()
    );

    let (errors, warnings) = lint_library(&library);

    println!("\n=== Content Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        errors.len(),
        warnings.len()
    );

    if errors.is_empty() {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

fn load_recursive(dir: &Path, library: &mut ContentLibrary) {
    if let Ok(entries) = std::fs::read_dir(dir) {
        let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
        paths.sort();
        for path in paths {
            if path.is_dir() {
                load_recursive(&path, library);
            } else if path.extension().and_then(|s| s.to_str()) == Some("ron") {
                load_file(&path, library);
            }
        }
    }
}

/// Parse without validating; cross-file references are checked after merging.
fn load_file(path: &Path, library: &mut ContentLibrary) {
    let parsed = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|s| ron::from_str::<ContentLibrary>(&s).map_err(|e| e.to_string()));
    match parsed {
        Ok(part) => {
            println!("  Loaded: {}", path.display());
            library.merge(part);
        }
        Err(e) => {
            eprintln!("ERROR: Failed to load {}: {}", path.display(), e);
            process::exit(1);
        }
    }
}

fn lint_library(library: &ContentLibrary) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if let Err(e) = library.validate() {
        errors.push(e.to_string());
        // Resolution on an invalid library would only repeat the problem.
        return (errors, warnings);
    }

    let repo = InMemoryRepository::new(library.clone());
    let resolver = TemplateResolver::default();

    for template in &library.templates {
        let request = GenerationRequest::new(template.sport, template.goal);
        match resolver.resolve(&repo, &request) {
            Ok(resolved) => {
                for section in &resolved.sections {
                    let available = section.pool.len() + section.overflow.len();
                    if available < section.section.min_slots {
                        warnings.push(format!(
                            "{} {} section {} needs {} blocks but only {} exist; blocks will repeat",
                            template.sport,
                            template.goal,
                            section.section.describe(),
                            section.section.min_slots,
                            available
                        ));
                    }
                }
            }
            Err(e) => errors.push(format!("{} {}: {}", template.sport, template.goal, e)),
        }
    }

    let sport_blocks = |sport: Sport| -> Vec<&ContentBlock> {
        library.blocks.iter().filter(|b| b.sport == sport).collect()
    };
    let templates_for = |sport: Sport| -> Vec<&Template> {
        library.templates.iter().filter(|t| t.sport == sport).collect()
    };

    // Kickboxing: surprise rounds need a pool.
    let surprise = sport_blocks(Sport::Kickboxing)
        .into_iter()
        .filter(|b| b.has_tag(tags::SURPRISE_ELIGIBLE))
        .count();
    for template in templates_for(Sport::Kickboxing) {
        let anchors = template.sections.iter().filter(|s| s.anchor).count();
        if anchors >= 2 && surprise == 0 {
            errors.push(format!(
                "kickboxing {} has {} anchor sections but no surprise_eligible blocks",
                template.goal, anchors
            ));
        } else if anchors / 2 > surprise {
            warnings.push(format!(
                "kickboxing {} can trigger {} surprise rounds but only {} surprise blocks exist",
                template.goal,
                anchors / 2,
                surprise
            ));
        }
    }

    // PowerYoga: family changes need transitions.
    let yoga = sport_blocks(Sport::PowerYoga);
    let families: FxHashSet<&str> = yoga.iter().filter_map(|b| b.pose_family()).collect();
    let transitions = yoga.iter().filter(|b| b.has_tag(tags::TRANSITION)).count();
    if families.len() > 1 && transitions == 0 {
        errors.push(format!(
            "power_yoga has {} pose families but no transition blocks",
            families.len()
        ));
    }
    for block in &yoga {
        if block.has_tag(tags::TRANSITION) && block.pose_family().is_some() {
            warnings.push(format!(
                "transition block {:?} also carries a pose tag and may trigger transitions itself",
                block.id
            ));
        }
    }

    // Calisthenics: a max challenge must exist and sit in the final section.
    let calisthenics = sport_blocks(Sport::Calisthenics);
    let max_blocks: Vec<&ContentBlock> = calisthenics
        .iter()
        .copied()
        .filter(|b| b.has_tag(tags::MAX_CHALLENGE))
        .collect();
    let cal_templates = templates_for(Sport::Calisthenics);
    if !cal_templates.is_empty() && max_blocks.is_empty() {
        errors.push("calisthenics templates exist but no max_challenge blocks".to_string());
    }
    for template in cal_templates {
        let ordered = template.ordered_sections();
        let last = ordered.len().saturating_sub(1);
        for (index, section) in ordered.iter().enumerate() {
            let hosts_max = max_blocks.iter().any(|b| section.accepts(b.category));
            if hosts_max && index != last {
                warnings.push(format!(
                    "calisthenics {} section {} can select a MAX challenge but is not the last section",
                    template.goal,
                    section.describe()
                ));
            }
        }
    }

    (errors, warnings)
}
