//! `SyncEngine` convergence scenarios: incremental sync picks up notes
//! appended directly through `GitNoteStore` (bypassing capture), full
//! reindex rebuilds from nothing, and `verify_and_repair` drives a
//! deliberately corrupted index back to consistency.

use gitmemory::{EngineConfig, FallbackEmbedder, GitNoteStore, IndexStore, Namespace, SyncEngine};
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

fn test_config() -> EngineConfig {
    EngineConfig {
        data_dir: std::env::temp_dir(),
        git_prefix: "mem".to_string(),
        embedding_model: "fallback".to_string(),
        embedding_dim: 32,
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
fn incremental_picks_up_notes_appended_outside_capture() {
    let (_dir, repo) = init_repo();
    let sha = head_sha(&repo);
    let config = test_config();
    let notes = GitNoteStore::new(repo.clone(), config.git_prefix.clone(), config.subprocess_timeout);
    let index = IndexStore::open_in_memory().unwrap();
    let embedder = FallbackEmbedder::new(config.embedding_dim);

    let block = gitmemory::codec::encode(
        &gitmemory::codec::NoteMeta {
            namespace: Namespace::Decisions,
            timestamp: chrono::Utc::now(),
            summary: "Directly appended note".to_string(),
            spec: None,
            phase: None,
            tags: Vec::new(),
            status: gitmemory::MemoryStatus::Active,
            relates_to: Vec::new(),
        },
        "body text",
    )
    .unwrap();
    notes.append(&sha, &block, Namespace::Decisions).unwrap();

    let sync = SyncEngine::new(&config, &notes, &index, &embedder, repo.clone());
    let changed = sync.incremental().unwrap();
    assert_eq!(changed, 1);

    let recent = index.list_recent(Some(Namespace::Decisions), 10).unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].summary, "Directly appended note");
}

#[test]
fn incremental_is_a_noop_on_unchanged_notes() {
    let (_dir, repo) = init_repo();
    let sha = head_sha(&repo);
    let config = test_config();
    let notes = GitNoteStore::new(repo.clone(), config.git_prefix.clone(), config.subprocess_timeout);
    let index = IndexStore::open_in_memory().unwrap();
    let embedder = FallbackEmbedder::new(config.embedding_dim);

    let block = gitmemory::codec::encode(
        &gitmemory::codec::NoteMeta {
            namespace: Namespace::Learnings,
            timestamp: chrono::Utc::now(),
            summary: "A learning".to_string(),
            spec: None,
            phase: None,
            tags: Vec::new(),
            status: gitmemory::MemoryStatus::Active,
            relates_to: Vec::new(),
        },
        "body",
    )
    .unwrap();
    notes.append(&sha, &block, Namespace::Learnings).unwrap();

    let sync = SyncEngine::new(&config, &notes, &index, &embedder, repo.clone());
    assert_eq!(sync.incremental().unwrap(), 1);
    assert_eq!(sync.incremental().unwrap(), 0);
}

#[test]
fn full_reindex_rebuilds_from_git_alone() {
    let (_dir, repo) = init_repo();
    let sha = head_sha(&repo);
    let config = test_config();
    let notes = GitNoteStore::new(repo.clone(), config.git_prefix.clone(), config.subprocess_timeout);
    let index = IndexStore::open_in_memory().unwrap();
    let embedder = FallbackEmbedder::new(config.embedding_dim);

    for i in 0..3 {
        let block = gitmemory::codec::encode(
            &gitmemory::codec::NoteMeta {
                namespace: Namespace::Progress,
                timestamp: chrono::Utc::now(),
                summary: format!("Progress {i}"),
                spec: None,
                phase: None,
                tags: Vec::new(),
                status: gitmemory::MemoryStatus::Active,
                relates_to: Vec::new(),
            },
            "body",
        )
        .unwrap();
        notes.append(&sha, &block, Namespace::Progress).unwrap();
    }

    let sync = SyncEngine::new(&config, &notes, &index, &embedder, repo.clone());
    let reindexed = sync.full_reindex().unwrap();
    assert_eq!(reindexed, 1); // one commit carries all three concatenated blocks

    let recent = index.list_recent(Some(Namespace::Progress), 10).unwrap();
    assert_eq!(recent.len(), 3);
}

#[test]
fn verify_and_repair_converges_after_manual_index_drift() {
    let (_dir, repo) = init_repo();
    let sha = head_sha(&repo);
    let config = test_config();
    let notes = GitNoteStore::new(repo.clone(), config.git_prefix.clone(), config.subprocess_timeout);
    let index = IndexStore::open_in_memory().unwrap();
    let embedder = FallbackEmbedder::new(config.embedding_dim);

    let block = gitmemory::codec::encode(
        &gitmemory::codec::NoteMeta {
            namespace: Namespace::Retrospective,
            timestamp: chrono::Utc::now(),
            summary: "Sprint retro".to_string(),
            spec: None,
            phase: None,
            tags: Vec::new(),
            status: gitmemory::MemoryStatus::Active,
            relates_to: Vec::new(),
        },
        "went well",
    )
    .unwrap();
    notes.append(&sha, &block, Namespace::Retrospective).unwrap();

    let sync = SyncEngine::new(&config, &notes, &index, &embedder, repo.clone());
    sync.incremental().unwrap();

    // Simulate drift: an index row with no corresponding git note.
    let phantom = gitmemory::MemoryId::new_for(Namespace::Retrospective, "deadbeef", 0);
    index
        .upsert(
            &gitmemory::Memory {
                id: phantom.clone(),
                commit_sha: "deadbeef".to_string(),
                repo_path: repo.clone(),
                namespace: Namespace::Retrospective,
                summary: "Phantom row".to_string(),
                content: String::new(),
                timestamp: chrono::Utc::now(),
                spec: None,
                phase: None,
                tags: Vec::new(),
                status: gitmemory::MemoryStatus::Active,
                relates_to: Vec::new(),
            },
            None,
        )
        .unwrap();

    let before = sync.verify_consistency().unwrap();
    assert!(before.contains_key(&Namespace::Retrospective));

    let after = sync.verify_and_repair().unwrap();
    assert!(!after.contains_key(&Namespace::Retrospective));
    assert!(index.get(&phantom).unwrap().is_none());
}

#[test]
fn reindex_drops_index_rows_for_ordinals_the_note_no_longer_has() {
    let (_dir, repo) = init_repo();
    let sha = head_sha(&repo);
    let config = test_config();
    let notes = GitNoteStore::new(repo.clone(), config.git_prefix.clone(), config.subprocess_timeout);
    let index = IndexStore::open_in_memory().unwrap();
    let embedder = FallbackEmbedder::new(config.embedding_dim);

    let meta = |summary: &str| gitmemory::codec::NoteMeta {
        namespace: Namespace::Learnings,
        timestamp: chrono::Utc::now(),
        summary: summary.to_string(),
        spec: None,
        phase: None,
        tags: Vec::new(),
        status: gitmemory::MemoryStatus::Active,
        relates_to: Vec::new(),
    };

    // Two blocks land on the note first.
    let two_blocks = gitmemory::codec::join_blocks(&[
        gitmemory::codec::encode(&meta("First"), "one").unwrap(),
        gitmemory::codec::encode(&meta("Second"), "two").unwrap(),
    ]);
    std::process::Command::new("git")
        .current_dir(&repo)
        .args(["notes", "--ref", &format!("mem/{}", Namespace::Learnings), "add", "-f", "-m", &two_blocks, &sha])
        .output()
        .unwrap();

    let sync = SyncEngine::new(&config, &notes, &index, &embedder, repo.clone());
    sync.incremental().unwrap();
    assert_eq!(index.list_recent(Some(Namespace::Learnings), 10).unwrap().len(), 2);

    // The note is then force-rewritten down to a single block (e.g. a
    // rebase/amend replaced the commit's note text).
    let one_block = gitmemory::codec::encode(&meta("Only"), "one").unwrap();
    std::process::Command::new("git")
        .current_dir(&repo)
        .args(["notes", "--ref", &format!("mem/{}", Namespace::Learnings), "add", "-f", "-m", &one_block, &sha])
        .output()
        .unwrap();

    sync.incremental().unwrap();
    let remaining = index.list_recent(Some(Namespace::Learnings), 10).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].summary, "Only");
}
