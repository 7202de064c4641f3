//! Engine configuration.
//!
//! Every knob in spec.md §6 lives on [`EngineConfig`], loaded from
//! environment variables with the stated defaults (teacher's
//! `expand_env_vars`/`SubcogConfig` pattern, minus config-file parsing,
//! which is explicitly out of scope).

use std::path::PathBuf;
use std::time::Duration;

const ENV_PREFIX: &str = "GITMEMORY_";

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{name}")).ok()
}

fn env_u64(name: &str, default: u64) -> u64 {
    env_var(name)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env_var(name)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_string(name: &str, default: &str) -> String {
    env_var(name).unwrap_or_else(|| default.to_string())
}

/// Every configuration knob named in spec.md §6.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root of the data directory (`index.db`, per-repo locks, model cache,
    /// repair hints).
    pub data_dir: PathBuf,
    /// Root of the git notes ref tree, default `refs/notes/mem`.
    pub git_prefix: String,
    /// Embedding model identifier (opaque to the engine; interpreted by
    /// whichever `Embedder` is configured).
    pub embedding_model: String,
    /// Embedding vector dimension. Fixed per index (spec.md I3).
    pub embedding_dim: usize,
    /// Maximum encoded body size in bytes.
    pub max_content_bytes: usize,
    /// Maximum summary length in characters.
    pub max_summary_chars: usize,
    /// Maximum number of files hydrated at `DetailLevel::Files`.
    pub max_hydration_files: usize,
    /// Maximum bytes read per file during hydration.
    pub max_file_bytes: usize,
    /// Deadline for acquiring the per-repo capture lock.
    pub capture_lock_timeout: Duration,
    /// Wall-clock timeout for any git subprocess invocation.
    pub subprocess_timeout: Duration,
    /// Half-life for `LifecycleEngine` decay.
    pub decay_half_life_days: f64,
    /// Age after which `aging` memories become `archived`.
    pub archive_after_days: u64,
    /// Age after which tombstoned memories are eligible for physical GC.
    pub gc_horizon_days: u64,
    /// TTL for `RecallEngine`'s query cache.
    pub recall_cache_ttl: Duration,
    /// Maximum entries in `RecallEngine`'s query cache.
    pub recall_cache_entries: usize,
}

impl EngineConfig {
    /// Loads configuration from `GITMEMORY_*` environment variables,
    /// falling back to the defaults in spec.md §6 for anything unset.
    #[must_use]
    pub fn from_env() -> Self {
        let data_dir = env_var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        Self {
            data_dir,
            git_prefix: env_string("GIT_PREFIX", "refs/notes/mem"),
            embedding_model: env_string("EMBEDDING_MODEL", "all-MiniLM-L6-v2"),
            embedding_dim: env_usize("EMBEDDING_DIM", 384),
            max_content_bytes: env_usize("MAX_CONTENT_BYTES", 102_400),
            max_summary_chars: env_usize("MAX_SUMMARY_CHARS", 100),
            max_hydration_files: env_usize("MAX_HYDRATION_FILES", 20),
            max_file_bytes: env_usize("MAX_FILE_BYTES", 102_400),
            capture_lock_timeout: Duration::from_millis(env_u64("CAPTURE_LOCK_TIMEOUT_MS", 5_000)),
            subprocess_timeout: Duration::from_millis(env_u64("SUBPROCESS_TIMEOUT_MS", 30_000)),
            decay_half_life_days: env_u64("DECAY_HALF_LIFE_DAYS", 30) as f64,
            archive_after_days: env_u64("ARCHIVE_AFTER_DAYS", 90),
            gc_horizon_days: env_u64("GC_HORIZON_DAYS", 365),
            recall_cache_ttl: Duration::from_millis(env_u64("RECALL_CACHE_TTL_MS", 300_000)),
            recall_cache_entries: env_usize("RECALL_CACHE_ENTRIES", 100),
        }
    }

    /// Path to the single-file index database.
    #[must_use]
    pub fn index_db_path(&self) -> PathBuf {
        self.data_dir.join("index.db")
    }

    /// Path to the per-repo subdirectory holding the capture lock file.
    #[must_use]
    pub fn repo_data_dir(&self, repo_path: &std::path::Path) -> PathBuf {
        let mut hasher = <sha2::Sha256 as sha2::Digest>::new();
        sha2::Digest::update(&mut hasher, repo_path.to_string_lossy().as_bytes());
        let digest = hex::encode(sha2::Digest::finalize(hasher));
        self.data_dir.join("repos").join(&digest[..16])
    }

    /// Path to the repair-hints directory.
    #[must_use]
    pub fn repair_hints_dir(&self) -> PathBuf {
        self.data_dir.join("repair_hints")
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "memory-plugin")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".local/share/memory-plugin")
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        // SAFETY: test runs single-threaded within this process's env scope.
        for key in [
            "GIT_PREFIX",
            "MAX_CONTENT_BYTES",
            "MAX_SUMMARY_CHARS",
            "CAPTURE_LOCK_TIMEOUT_MS",
            "SUBPROCESS_TIMEOUT_MS",
        ] {
            unsafe { std::env::remove_var(format!("{ENV_PREFIX}{key}")) };
        }
        let cfg = EngineConfig::from_env();
        assert_eq!(cfg.git_prefix, "refs/notes/mem");
        assert_eq!(cfg.max_content_bytes, 102_400);
        assert_eq!(cfg.max_summary_chars, 100);
        assert_eq!(cfg.capture_lock_timeout, Duration::from_secs(5));
        assert_eq!(cfg.subprocess_timeout, Duration::from_secs(30));
    }

    #[test]
    fn repo_data_dir_is_stable_for_same_path() {
        let cfg = EngineConfig::from_env();
        let a = cfg.repo_data_dir(std::path::Path::new("/repo/one"));
        let b = cfg.repo_data_dir(std::path::Path::new("/repo/one"));
        let c = cfg.repo_data_dir(std::path::Path::new("/repo/two"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
