/// Content library and engine configuration loading tests.

use std::path::Path;
use workout_engine::core::config::EngineConfig;
use workout_engine::core::pipeline::{EngineError, WorkoutEngine};
use workout_engine::core::repository::{ContentLibrary, LibraryError};
use workout_engine::schema::content::{tags, BlockId};
use workout_engine::schema::session::{ErrorKind, GenerationRequest, TimeClass};
use workout_engine::schema::sport::{Goal, Sport};

const LIBRARY: &str = "tests/fixtures/test_library.ron";
const CONFIG: &str = "tests/fixtures/engine_config.ron";

#[test]
fn fixture_library_loads() {
    let library = ContentLibrary::load_from_ron(Path::new(LIBRARY)).unwrap();
    assert_eq!(library.categories.len(), 18);
    assert_eq!(library.blocks.len(), 40);
    assert_eq!(library.templates.len(), 5);
    assert_eq!(library.quotes.len(), 7);

    // Every sport has at least one template
    for sport in Sport::ALL {
        assert!(
            library.templates.iter().any(|t| t.sport == sport),
            "no template for {sport}"
        );
    }

    let transitions: Vec<BlockId> = library
        .blocks
        .iter()
        .filter(|b| b.has_tag(tags::TRANSITION))
        .map(|b| b.id)
        .collect();
    assert_eq!(transitions, vec![BlockId(241), BlockId(242), BlockId(243)]);
    assert!(library.blocks.iter().all(|b| b.usage.count == 0));
}

#[test]
fn pose_families_come_from_tags() {
    let library = ContentLibrary::load_from_ron(Path::new(LIBRARY)).unwrap();
    let family = |id: u64| {
        library
            .blocks
            .iter()
            .find(|b| b.id == BlockId(id))
            .and_then(|b| b.pose_family().map(str::to_string))
    };
    assert_eq!(family(201).as_deref(), Some("standing"));
    assert_eq!(family(212).as_deref(), Some("seated"));
    assert_eq!(family(231), None);
}

#[test]
fn override_file_replaces_blocks_by_id() {
    let mut library = ContentLibrary::load_from_ron(Path::new(LIBRARY)).unwrap();
    let patch = ContentLibrary::parse_ron(
        r#"(
            categories: [
                (id: CategoryId(6), sport: kickboxing, name: "cooldown", display_name: "Cool-down"),
            ],
            blocks: [
                (id: BlockId(151), title: "Long stretch", sport: kickboxing,
                 category: CategoryId(6), duration: 9.0, text: "Stretch it out."),
            ],
        )"#,
    )
    .unwrap();
    library.merge(patch);
    assert_eq!(library.blocks.len(), 40);
    let block = library.blocks.iter().find(|b| b.id == BlockId(151)).unwrap();
    assert_eq!(block.title, "Long stretch");
    assert_eq!(block.duration, 9.0);
    library.validate().unwrap();
}

#[test]
fn orphan_block_is_rejected() {
    let err = ContentLibrary::parse_ron(
        r#"(
            blocks: [
                (id: BlockId(1), title: "Jab", sport: kickboxing,
                 category: CategoryId(99), duration: 2.0, text: "Jab."),
            ],
        )"#,
    )
    .unwrap_err();
    assert!(matches!(err, LibraryError::Invalid(_)));
}

#[test]
fn builder_loads_library_and_config_files() {
    let engine = WorkoutEngine::builder()
        .library(LIBRARY)
        .config_file(CONFIG)
        .build()
        .unwrap();
    assert_eq!(engine.config().timing.target, 45.0);
    assert_eq!(engine.config().seed, 11);

    let result = engine
        .generate(&GenerationRequest::new(Sport::Kickboxing, Goal::Allround))
        .unwrap();
    // One surprise round per anchor section
    assert_eq!(result.sport_specific_additions.surprise_rounds_added, 3);
    // Sections are never trimmed below their minimum, so the class runs long
    assert_eq!(result.time_status.classification, TimeClass::TooLong);
    assert!(result.has_notice(ErrorKind::TimingUnresolved));
    assert_eq!(engine.sessions().unwrap().len(), 1);
}

#[test]
fn config_target_changes_classification() {
    let engine = WorkoutEngine::builder()
        .library(LIBRARY)
        .config(EngineConfig::parse_ron("(timing: (target: 55.0))").unwrap())
        .build()
        .unwrap();
    let result = engine
        .generate(&GenerationRequest::new(Sport::Kickboxing, Goal::Allround))
        .unwrap();
    assert_eq!(result.total_duration, 58.0);
    assert_eq!(result.time_status.classification, TimeClass::Acceptable);
    assert_eq!(result.time_status.delta, 3.0);
    assert!(result.notices.is_empty());
}

#[test]
fn missing_library_file_is_configuration_error() {
    let err = WorkoutEngine::builder()
        .library("tests/fixtures/no_such_library.ron")
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, EngineError::Library(LibraryError::Io(_))));
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn builder_without_content_fails() {
    let err = WorkoutEngine::builder().build().err().unwrap();
    assert!(matches!(err, EngineError::MissingRepository));
}
