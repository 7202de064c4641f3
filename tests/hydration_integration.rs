//! `RecallEngine::hydrate` across all three detail levels, including the
//! degraded-hydration path when the referenced commit can no longer be
//! resolved.

use gitmemory::{
    CaptureEngine, CaptureInput, DetailLevel, EngineConfig, FallbackEmbedder, GitNoteStore,
    IndexStore, Namespace, RecallEngine,
};
use std::time::Duration;

fn init_repo() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().to_path_buf();
    let run = |args: &[&str]| {
        std::process::Command::new("git")
            .current_dir(&path)
            .args(args)
            .output()
            .unwrap()
    };
    run(&["init", "--quiet"]);
    run(&["config", "user.email", "test@example.com"]);
    run(&["config", "user.name", "Test"]);
    std::fs::write(path.join("a.txt"), b"hello").unwrap();
    std::fs::write(path.join("b.txt"), b"world").unwrap();
    run(&["add", "."]);
    run(&["commit", "-q", "-m", "initial"]);
    (dir, path)
}

fn test_config() -> EngineConfig {
    EngineConfig {
        data_dir: std::env::temp_dir(),
        git_prefix: "mem".to_string(),
        embedding_model: "fallback".to_string(),
        embedding_dim: 16,
        max_content_bytes: 102_400,
        max_summary_chars: 100,
        max_hydration_files: 20,
        max_file_bytes: 102_400,
        capture_lock_timeout: Duration::from_secs(5),
        subprocess_timeout: Duration::from_secs(5),
        decay_half_life_days: 30.0,
        archive_after_days: 90,
        gc_horizon_days: 365,
        recall_cache_ttl: Duration::from_secs(60),
        recall_cache_entries: 10,
    }
}

#[test]
fn summary_level_omits_body_and_files() {
    let (_dir, repo) = init_repo();
    let config = test_config();
    let notes = GitNoteStore::new(repo.clone(), config.git_prefix.clone(), config.subprocess_timeout);
    let index = IndexStore::open_in_memory().unwrap();
    let embedder = FallbackEmbedder::new(config.embedding_dim);
    let capture = CaptureEngine::new(&config, &notes, &index, &embedder, repo.clone());
    let recall = RecallEngine::new(&config, &notes, &index, &embedder);

    let result = capture.capture(CaptureInput::new(Namespace::Inception, "Kickoff", "project goals")).unwrap();
    let memory = index.get(result.id.as_ref().unwrap()).unwrap().unwrap();

    let hydrated = recall.hydrate(memory, DetailLevel::Summary).unwrap();
    assert!(hydrated.full_body.is_none());
    assert!(hydrated.files.is_none());
    assert!(hydrated.warnings.is_empty());
}

#[test]
fn full_level_includes_body_but_not_files() {
    let (_dir, repo) = init_repo();
    let config = test_config();
    let notes = GitNoteStore::new(repo.clone(), config.git_prefix.clone(), config.subprocess_timeout);
    let index = IndexStore::open_in_memory().unwrap();
    let embedder = FallbackEmbedder::new(config.embedding_dim);
    let capture = CaptureEngine::new(&config, &notes, &index, &embedder, repo.clone());
    let recall = RecallEngine::new(&config, &notes, &index, &embedder);

    let result = capture.capture(CaptureInput::new(Namespace::Elicitation, "Requirement gathered", "the full body text")).unwrap();
    let memory = index.get(result.id.as_ref().unwrap()).unwrap().unwrap();

    let hydrated = recall.hydrate(memory, DetailLevel::Full).unwrap();
    assert_eq!(hydrated.full_body.as_deref(), Some("the full body text"));
    assert!(hydrated.files.is_none());
}

#[test]
fn files_level_reads_commit_time_snapshots() {
    let (_dir, repo) = init_repo();
    let config = test_config();
    let notes = GitNoteStore::new(repo.clone(), config.git_prefix.clone(), config.subprocess_timeout);
    let index = IndexStore::open_in_memory().unwrap();
    let embedder = FallbackEmbedder::new(config.embedding_dim);
    let capture = CaptureEngine::new(&config, &notes, &index, &embedder, repo.clone());
    let recall = RecallEngine::new(&config, &notes, &index, &embedder);

    let result = capture.capture(CaptureInput::new(Namespace::Research, "Findings", "body")).unwrap();
    let memory = index.get(result.id.as_ref().unwrap()).unwrap().unwrap();

    let hydrated = recall.hydrate(memory, DetailLevel::Files).unwrap();
    let files = hydrated.files.unwrap();
    assert_eq!(files.get("a.txt"), Some(&b"hello".to_vec()));
    assert_eq!(files.get("b.txt"), Some(&b"world".to_vec()));
    assert!(hydrated.warnings.is_empty());
}

#[test]
fn files_level_degrades_gracefully_when_commit_is_unresolvable() {
    let (_dir, repo) = init_repo();
    let config = test_config();
    let notes = GitNoteStore::new(repo.clone(), config.git_prefix.clone(), config.subprocess_timeout);
    let index = IndexStore::open_in_memory().unwrap();
    let embedder = FallbackEmbedder::new(config.embedding_dim);
    let capture = CaptureEngine::new(&config, &notes, &index, &embedder, repo.clone());
    let recall = RecallEngine::new(&config, &notes, &index, &embedder);

    let result = capture.capture(CaptureInput::new(Namespace::Research, "Findings", "body")).unwrap();
    let mut memory = index.get(result.id.as_ref().unwrap()).unwrap().unwrap();
    // Point at a commit sha that cannot possibly resolve.
    memory.commit_sha = "0000000000000000000000000000000000beef".to_string();

    let hydrated = recall.hydrate(memory, DetailLevel::Files).unwrap();
    assert_eq!(hydrated.full_body.as_deref(), Some("body"));
    assert!(hydrated.files.is_none());
    assert!(!hydrated.warnings.is_empty());
}
