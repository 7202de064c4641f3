//! `GitNoteStore`: the durable, authoritative per-namespace note store
//! (spec.md §4.2).

use super::process::run;
use super::sanitize;
use crate::error::StorageErrorKind;
use crate::models::{CommitInfo, Namespace};
use crate::Error;
use chrono::{TimeZone, Utc};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Separator written between concatenated blocks within one note
/// (spec.md §4.1/§6: a single blank line).
const BLOCK_SEPARATOR: &str = "\n\n";

/// Per-call cap on total bytes read by [`GitNoteStore::file_at`] /
/// [`GitNoteStore::batch_file_at`] (spec.md §4.2, §4.6).
const MAX_FILE_BYTES: usize = 100 * 1024;
/// Per-call cap on file count for [`GitNoteStore::batch_file_at`].
const MAX_FILE_COUNT: usize = 20;

/// Thin, sanitizing facade over `git notes` and related plumbing commands.
/// Every external invocation is argument-vector-only with a wall-clock
/// timeout (spec.md §4.2).
pub struct GitNoteStore {
    repo_path: std::path::PathBuf,
    git_prefix: String,
    timeout: Duration,
}

impl GitNoteStore {
    /// Opens a store rooted at `repo_path`, using `git_prefix` as the notes
    /// ref root (default `mem`) and `timeout` as the per-invocation
    /// wall-clock budget.
    #[must_use]
    pub fn new(repo_path: impl Into<std::path::PathBuf>, git_prefix: impl Into<String>, timeout: Duration) -> Self {
        Self {
            repo_path: repo_path.into(),
            git_prefix: git_prefix.into(),
            timeout,
        }
    }

    fn notes_ref(&self, namespace: Namespace) -> Result<String, Error> {
        sanitize::ref_segment(namespace.as_str())?;
        Ok(format!("refs/notes/{}/{}", self.git_prefix, namespace.as_str()))
    }

    fn run(&self, args: &[&str], stdin: Option<&[u8]>) -> Result<super::process::Output, Error> {
        run(&self.repo_path, args, stdin, self.timeout)
    }

    /// Idempotent append: reads the current note (if any), concatenates
    /// `block_text` with [`BLOCK_SEPARATOR`], and writes the result back.
    /// Never rewrites history — notes are a side channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on sanitization failure, timeout, or a
    /// non-timeout `git` failure.
    #[tracing::instrument(skip(self, block_text))]
    pub fn append(&self, commit_sha: &str, block_text: &str, namespace: Namespace) -> Result<(), Error> {
        sanitize::commit_sha(commit_sha)?;
        let note_ref = self.notes_ref(namespace)?;

        let existing = self.read(commit_sha, namespace)?;
        let new_note = match existing {
            Some(current) if !current.is_empty() => format!("{current}{BLOCK_SEPARATOR}{block_text}"),
            _ => block_text.to_string(),
        };

        let out = self.run(
            &["notes", "--ref", &note_ref, "add", "-f", "-F", "-", commit_sha],
            Some(new_note.as_bytes()),
        )?;
        if out.status != 0 {
            return Err(Error::storage(
                StorageErrorKind::Exec,
                format!("git notes add failed: {}", String::from_utf8_lossy(&out.stderr)),
            ));
        }
        Ok(())
    }

    /// Reads the full note text for `(commit_sha, namespace)`, or `None` if
    /// no note is attached.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on sanitization failure, timeout, or a
    /// non-"missing note" `git` failure.
    #[tracing::instrument(skip(self))]
    pub fn read(&self, commit_sha: &str, namespace: Namespace) -> Result<Option<String>, Error> {
        sanitize::commit_sha(commit_sha)?;
        let note_ref = self.notes_ref(namespace)?;

        let out = self.run(&["notes", "--ref", &note_ref, "show", commit_sha], None)?;
        if out.status == 0 {
            return Ok(Some(String::from_utf8_lossy(&out.stdout).trim_end().to_string()));
        }
        let stderr = String::from_utf8_lossy(&out.stderr);
        if stderr.contains("no note found") || stderr.contains("No note found") {
            return Ok(None);
        }
        Err(Error::storage(
            StorageErrorKind::Exec,
            format!("git notes show failed: {stderr}"),
        ))
    }

    /// Lists every `(commit_sha, note_blob_sha)` pair under `namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on sanitization failure, timeout, or a
    /// `git` failure (an empty/absent notes ref is not an error — it
    /// yields an empty list).
    #[tracing::instrument(skip(self))]
    pub fn list(&self, namespace: Namespace) -> Result<Vec<(String, String)>, Error> {
        let note_ref = self.notes_ref(namespace)?;
        let out = self.run(&["notes", "--ref", &note_ref, "list"], None)?;
        if out.status != 0 {
            // An unpopulated notes ref exits non-zero with an empty list,
            // which is the common case rather than a failure.
            return Ok(Vec::new());
        }
        let text = String::from_utf8_lossy(&out.stdout);
        let mut pairs = Vec::new();
        for line in text.lines() {
            let mut parts = line.split_whitespace();
            let (Some(blob), Some(commit)) = (parts.next(), parts.next()) else {
                continue;
            };
            pairs.push((commit.to_string(), blob.to_string()));
        }
        Ok(pairs)
    }

    /// Removes the note attached to `(commit_sha, namespace)`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on sanitization failure or timeout. A
    /// missing note is not an error.
    #[tracing::instrument(skip(self))]
    pub fn remove(&self, commit_sha: &str, namespace: Namespace) -> Result<(), Error> {
        sanitize::commit_sha(commit_sha)?;
        let note_ref = self.notes_ref(namespace)?;
        let out = self.run(&["notes", "--ref", &note_ref, "remove", "--ignore-missing", commit_sha], None)?;
        if out.status != 0 {
            return Err(Error::storage(
                StorageErrorKind::Exec,
                format!("git notes remove failed: {}", String::from_utf8_lossy(&out.stderr)),
            ));
        }
        Ok(())
    }

    /// Resolves a sha's identifying metadata and changed paths relative to
    /// its first parent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on sanitization failure, timeout, or if
    /// `sha` does not resolve to a commit.
    #[tracing::instrument(skip(self))]
    pub fn commit_info(&self, sha: &str) -> Result<CommitInfo, Error> {
        sanitize::commit_sha(sha)?;
        let out = self.run(
            &["show", "-s", "--format=%H%x00%an <%ae>%x00%at%x00%s", sha],
            None,
        )?;
        if out.status != 0 {
            return Err(Error::storage(
                StorageErrorKind::NotAGitRepo,
                format!("commit not found: {sha}"),
            ));
        }
        let text = String::from_utf8_lossy(&out.stdout);
        let mut fields = text.trim_end().splitn(4, '\u{0}');
        let full_sha = fields.next().unwrap_or_default().to_string();
        let author = fields.next().unwrap_or_default().to_string();
        let epoch: i64 = fields.next().unwrap_or("0").parse().unwrap_or(0);
        let subject = fields.next().unwrap_or_default().to_string();
        let author_timestamp = Utc
            .timestamp_opt(epoch, 0)
            .single()
            .unwrap_or_else(Utc::now);

        let changed_paths = self.changed_paths(&full_sha)?;

        Ok(CommitInfo {
            sha: full_sha,
            author,
            author_timestamp,
            subject,
            changed_paths,
        })
    }

    fn changed_paths(&self, sha: &str) -> Result<Vec<String>, Error> {
        let out = self.run(&["diff-tree", "--no-commit-id", "--name-only", "-r", sha], None)?;
        if out.status != 0 {
            // Root commit: diff against the empty tree.
            let empty_tree = self.run(&["hash-object", "-t", "tree", "/dev/null"], None);
            if let Ok(empty_tree) = empty_tree {
                let empty_sha = String::from_utf8_lossy(&empty_tree.stdout).trim().to_string();
                let out = self.run(&["diff-tree", "--no-commit-id", "--name-only", "-r", &empty_sha, sha], None)?;
                return Ok(String::from_utf8_lossy(&out.stdout)
                    .lines()
                    .map(str::to_string)
                    .collect());
            }
            return Ok(Vec::new());
        }
        Ok(String::from_utf8_lossy(&out.stdout)
            .lines()
            .map(str::to_string)
            .collect())
    }

    /// Reads `path` as of `sha`, capped at [`MAX_FILE_BYTES`]. Returns
    /// `None` if the path does not exist at that commit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on sanitization failure or timeout.
    #[tracing::instrument(skip(self))]
    pub fn file_at(&self, sha: &str, path: &str) -> Result<Option<Vec<u8>>, Error> {
        sanitize::commit_sha(sha)?;
        sanitize::repo_path(path)?;

        let spec = format!("{sha}:{path}");
        let out = self.run(&["cat-file", "-p", &spec], None)?;
        if out.status != 0 {
            return Ok(None);
        }
        let mut bytes = out.stdout;
        bytes.truncate(MAX_FILE_BYTES);
        Ok(Some(bytes))
    }

    /// Reads multiple paths as of `sha` using a single streaming
    /// `git cat-file --batch` invocation, amortizing per-object overhead.
    /// Bounded to [`MAX_FILE_COUNT`] paths and [`MAX_FILE_BYTES`] per file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on sanitization failure or timeout.
    #[tracing::instrument(skip(self, paths))]
    pub fn batch_file_at(&self, sha: &str, paths: &[String]) -> Result<BTreeMap<String, Vec<u8>>, Error> {
        sanitize::commit_sha(sha)?;
        for path in paths {
            sanitize::repo_path(path)?;
        }
        let paths: Vec<&String> = paths.iter().take(MAX_FILE_COUNT).collect();
        if paths.is_empty() {
            return Ok(BTreeMap::new());
        }

        let stdin: String = paths
            .iter()
            .map(|p| format!("{sha}:{p}\n"))
            .collect();
        let out = self.run(&["cat-file", "--batch"], Some(stdin.as_bytes()))?;
        if out.status != 0 {
            return Err(Error::storage(
                StorageErrorKind::Exec,
                format!("git cat-file --batch failed: {}", String::from_utf8_lossy(&out.stderr)),
            ));
        }

        parse_batch_output(&out.stdout, &paths)
    }

    /// Sets the refspecs that carry this namespace's notes ref along with
    /// `git fetch`/`git push` (spec.md §4.2, §6).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on sanitization failure, timeout, or a
    /// `git config` failure.
    #[tracing::instrument(skip(self))]
    pub fn ensure_sync_config(&self, namespace: Namespace) -> Result<(), Error> {
        let note_ref = self.notes_ref(namespace)?;
        let refspec = format!("+{note_ref}:{note_ref}");

        let existing = self.run(&["config", "--get-all", "remote.origin.fetch"], None)?;
        let already_present = String::from_utf8_lossy(&existing.stdout)
            .lines()
            .any(|line| line == refspec);
        if already_present {
            return Ok(());
        }

        let out = self.run(&["config", "--add", "remote.origin.fetch", &refspec], None)?;
        if out.status != 0 {
            return Err(Error::storage(
                StorageErrorKind::Exec,
                format!("git config failed: {}", String::from_utf8_lossy(&out.stderr)),
            ));
        }
        Ok(())
    }
}

/// Parses the output of `git cat-file --batch` given for each `<sha>:<path>`
/// line fed on stdin, a response of the form:
/// `<object-sha> <type> <size>\n<size bytes of content>\n` (or
/// `<spec> missing\n` for a path absent at that commit).
fn parse_batch_output(stdout: &[u8], paths: &[&String]) -> Result<BTreeMap<String, Vec<u8>>, Error> {
    let mut result = BTreeMap::new();
    let mut cursor = 0usize;
    let mut path_iter = paths.iter();

    while cursor < stdout.len() {
        let Some(line_end) = stdout[cursor..].iter().position(|&b| b == b'\n') else {
            break;
        };
        let header_line = &stdout[cursor..cursor + line_end];
        cursor += line_end + 1;
        let header = String::from_utf8_lossy(header_line);
        let Some(path) = path_iter.next() else { break };

        if header.ends_with("missing") {
            continue;
        }

        let mut parts = header.split_whitespace();
        let _object_sha = parts.next();
        let _kind = parts.next();
        let Some(size_str) = parts.next() else { continue };
        let Ok(size) = size_str.parse::<usize>() else { continue };

        let capped = size.min(MAX_FILE_BYTES);
        let end = (cursor + capped).min(stdout.len());
        let content = stdout[cursor..end].to_vec();
        result.insert((*path).clone(), content);

        // Advance past the full object (even the truncated tail) plus its
        // trailing newline.
        cursor = (cursor + size).min(stdout.len());
        if cursor < stdout.len() && stdout[cursor] == b'\n' {
            cursor += 1;
        }
    }

    Ok(result)
}

/// Returns true if `path` exists inside the git repository rooted at the
/// current process working directory — used by callers before opening a
/// [`GitNoteStore`].
///
/// # Errors
///
/// Returns [`Error::Storage`] with [`StorageErrorKind::NotAGitRepo`] if
/// `path` is not inside a git working tree.
pub fn resolve_repo_root(path: &Path, timeout: Duration) -> Result<std::path::PathBuf, Error> {
    let out = run(path, &["rev-parse", "--show-toplevel"], None, timeout)?;
    if out.status != 0 {
        return Err(Error::storage(
            StorageErrorKind::NotAGitRepo,
            format!("{} is not inside a git repository", path.display()),
        ));
    }
    Ok(std::path::PathBuf::from(
        String::from_utf8_lossy(&out.stdout).trim().to_string(),
    ))
}
