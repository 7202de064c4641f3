//! End-to-end capture -> index -> recall scenarios against a real git
//! repository and an in-memory index.

use gitmemory::{
    CaptureEngine, CaptureInput, EngineConfig, FallbackEmbedder, GitNoteStore, IndexStore,
    Namespace, RecallEngine, SearchFilter,
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
    run(&["add", "a.txt"]);
    run(&["commit", "-q", "-m", "initial"]);
    (dir, path)
}

fn head_sha(path: &std::path::Path) -> String {
    let out = std::process::Command::new("git")
        .current_dir(path)
        .args(["rev-parse", "HEAD"])
        .output()
        .unwrap();
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

fn harness() -> (tempfile::TempDir, std::path::PathBuf, EngineConfig, GitNoteStore, IndexStore, FallbackEmbedder) {
    let (dir, repo) = init_repo();
    let config = EngineConfig {
        data_dir: std::env::temp_dir(),
        git_prefix: "mem".to_string(),
        embedding_model: "fallback".to_string(),
        embedding_dim: 64,
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
    };
    let notes = GitNoteStore::new(repo.clone(), config.git_prefix.clone(), config.subprocess_timeout);
    let index = IndexStore::open_in_memory().unwrap();
    let embedder = FallbackEmbedder::new(config.embedding_dim);
    (dir, repo, config, notes, index, embedder)
}

#[test]
fn captured_memory_is_recallable_by_text_search() {
    let (_dir, repo, config, notes, index, embedder) = harness();
    let capture = CaptureEngine::new(&config, &notes, &index, &embedder, repo.clone());

    let result = capture
        .capture(CaptureInput::new(
            Namespace::Decisions,
            "Use SQLite for the derived index",
            "## Context\nNeeded a rebuildable cache on top of git notes.",
        ))
        .unwrap();
    assert!(result.success);
    assert!(result.indexed);

    let recall = RecallEngine::new(&config, &notes, &index, &embedder);
    let filter = SearchFilter::for_repo(repo.clone());
    let results = recall.search("SQLite derived index", &filter, 5).unwrap();
    assert!(results.iter().any(|r| r.memory.summary.contains("SQLite")));
}

#[test]
fn captured_memory_is_recallable_by_vector_search() {
    let (_dir, repo, config, notes, index, embedder) = harness();
    let capture = CaptureEngine::new(&config, &notes, &index, &embedder, repo.clone());

    capture
        .capture(CaptureInput::new(Namespace::Learnings, "Flaky retry logic", "the retry loop never backed off"))
        .unwrap();
    capture
        .capture(CaptureInput::new(Namespace::Learnings, "Unrelated topic entirely", "about something else"))
        .unwrap();

    let recall = RecallEngine::new(&config, &notes, &index, &embedder);
    let filter = SearchFilter::for_repo(repo.clone());
    let results = recall.search("flaky retry loop backoff", &filter, 1).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].memory.summary, "Flaky retry logic");
}

#[test]
fn capture_assigns_sequential_ordinals_on_same_commit() {
    let (_dir, repo, config, notes, index, embedder) = harness();
    let capture = CaptureEngine::new(&config, &notes, &index, &embedder, repo.clone());

    let first = capture.capture(CaptureInput::new(Namespace::Progress, "first", "one")).unwrap();
    let second = capture.capture(CaptureInput::new(Namespace::Progress, "second", "two")).unwrap();

    let sha = head_sha(&repo);
    assert_eq!(first.id.unwrap().as_str(), format!("progress:{sha}:0"));
    assert_eq!(second.id.unwrap().as_str(), format!("progress:{sha}:1"));
}

#[test]
fn capture_convenience_methods_set_expected_namespace() {
    let (_dir, repo, config, notes, index, embedder) = harness();
    let capture = CaptureEngine::new(&config, &notes, &index, &embedder, repo.clone());

    let decision = capture.capture_decision("Adopt approach X", "ctx", "because Y", "low risk").unwrap();
    let memory = index.get(decision.id.as_ref().unwrap()).unwrap().unwrap();
    assert_eq!(memory.namespace, Namespace::Decisions);
    assert!(memory.content.contains("## Context"));
    assert!(memory.content.contains("## Rationale"));
}

#[test]
fn resolve_blocker_transitions_status() {
    let (_dir, repo, config, notes, index, embedder) = harness();
    let capture = CaptureEngine::new(&config, &notes, &index, &embedder, repo.clone());

    let blocker = capture.capture_blocker("CI flaking on macOS", "intermittent timeout", "blocks release").unwrap();
    let blocker_id = blocker.id.unwrap();

    capture.resolve_blocker(&blocker_id, "raised the timeout and added retries").unwrap();

    let memory = index.get(&blocker_id).unwrap().unwrap();
    assert_eq!(memory.status, gitmemory::MemoryStatus::Resolved);
}

#[test]
fn hydrate_at_summary_level_has_no_body() {
    let (_dir, repo, config, notes, index, embedder) = harness();
    let capture = CaptureEngine::new(&config, &notes, &index, &embedder, repo.clone());
    let result = capture.capture(CaptureInput::new(Namespace::Research, "Findings", "detailed body")).unwrap();
    let memory = index.get(result.id.as_ref().unwrap()).unwrap().unwrap();

    let recall = RecallEngine::new(&config, &notes, &index, &embedder);
    let hydrated = recall.hydrate(memory, gitmemory::DetailLevel::Summary).unwrap();
    assert!(hydrated.full_body.is_none());
    assert!(hydrated.files.is_none());
}

#[test]
fn hydrate_at_files_level_reads_commit_snapshot() {
    let (_dir, repo, config, notes, index, embedder) = harness();
    let capture = CaptureEngine::new(&config, &notes, &index, &embedder, repo.clone());
    let result = capture.capture(CaptureInput::new(Namespace::Research, "Findings", "detailed body")).unwrap();
    let memory = index.get(result.id.as_ref().unwrap()).unwrap().unwrap();

    let recall = RecallEngine::new(&config, &notes, &index, &embedder);
    let hydrated = recall.hydrate(memory, gitmemory::DetailLevel::Files).unwrap();
    assert_eq!(hydrated.full_body.as_deref(), Some("detailed body"));
    let files = hydrated.files.unwrap();
    assert_eq!(files.get("a.txt"), Some(&b"hello".to_vec()));
}

#[test]
fn recent_and_by_commit_report_captured_memories() {
    let (_dir, repo, config, notes, index, embedder) = harness();
    let capture = CaptureEngine::new(&config, &notes, &index, &embedder, repo.clone());
    capture.capture(CaptureInput::new(Namespace::Decisions, "Decision one", "body")).unwrap();

    let recall = RecallEngine::new(&config, &notes, &index, &embedder);
    let recent = recall.recent(10, Some(Namespace::Decisions)).unwrap();
    assert_eq!(recent.len(), 1);

    let sha = head_sha(&repo);
    let by_commit = recall.by_commit(&sha).unwrap();
    assert_eq!(by_commit.len(), 1);
}
