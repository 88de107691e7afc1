//! QA tests against the demo story shipped in `books/`.
//!
//! Run with: `cargo test -p gamebook-core --test qa_story_file`

use gamebook_core::headless::{HeadlessConfig, HeadlessGame};
use gamebook_core::page::render_page;
use gamebook_core::StoryGraph;
use std::path::PathBuf;
use tempfile::TempDir;

fn castle_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../books/castle.gb")
}

#[tokio::test]
async fn test_demo_story_loads() {
    let graph = StoryGraph::load_file(castle_path()).await.expect("demo story should load");
    assert_eq!(graph.first_unit_id().as_str(), "road");
    assert_eq!(graph.len(), 8);
    assert_eq!(graph.arrow_count(), 11);
}

#[tokio::test]
async fn test_play_to_an_ending_and_back() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = HeadlessConfig::new(castle_path())
        .with_save_dir(temp_dir.path())
        .with_session_id("demo");

    let mut game = HeadlessGame::new(config.clone()).await.unwrap();
    assert_eq!(game.reactions(), vec!["Knock", "Circle the wall", "Go home"]);

    game.choose(1).await.unwrap();
    let view = game.react("Claim to be the baker").await.unwrap();
    assert!(game.is_over());
    assert!(view.reactions.is_empty());
    assert!(view.paragraphs[0].to_html().contains("debug-negative"));

    game.undo().await.unwrap();
    game.react("Tell the truth").await.unwrap();
    assert_eq!(game.session().current_id().as_str(), "courtyard");

    // Picked up again by a new process.
    let resumed = HeadlessGame::new(config).await.unwrap();
    assert!(resumed.resumed());
    assert_eq!(resumed.session().history().len(), 2);
    assert!(render_page(resumed.session()).contains("Go back"));
}

#[tokio::test]
async fn test_json_copy_of_a_story() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("tiny.json");
    std::fs::write(
        &path,
        r#"{ "units": [
            { "id": "a", "text": "Start.", "reactions": [{ "id": "go", "score": 1, "target": "b", "text": "Go" }] },
            { "id": "b", "text": "Done." }
        ] }"#,
    )
    .unwrap();

    let mut game = HeadlessGame::new(HeadlessConfig::new(&path)).await.unwrap();
    game.react("Go").await.unwrap();
    assert!(game.is_over());
}
