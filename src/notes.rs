//! [`SnapshotStore`] backed by git notes under `refs/notes/<ref>`.
//!
//! Snapshots are attached as notes to the commit they describe and pushed to
//! `origin`. Lookups use `git log` from the starting commit, so "preceding"
//! follows real commit ancestry.

use tracing::{debug, info};

use crate::error::{CovtrendError, Result};
use crate::runner::Exec;
use crate::store::{SnapshotStore, StoredBlob};

const FIELD_SEP: char = '\x1f';
const RECORD_SEP: char = '\x1e';

pub struct GitNotesStore<E> {
    exec: E,
    notes_ref: String,
}

impl<E: Exec> GitNotesStore<E> {
    pub fn new(exec: E, notes_ref: &str) -> Self {
        Self {
            exec,
            notes_ref: notes_ref.to_string(),
        }
    }

    fn full_ref(&self) -> String {
        format!("refs/notes/{}", self.notes_ref)
    }

    /// Pull the notes ref from `origin`. The ref does not exist until the
    /// first snapshot is pushed, so failure is expected and tolerated.
    pub fn fetch(&self) {
        let full_ref = self.full_ref();
        let args = vec![
            "fetch".to_string(),
            "origin".to_string(),
            format!("+{full_ref}:{full_ref}"),
        ];
        if let Err(e) = self.exec.execute("git", &args, None) {
            info!("no existing {} ref", self.notes_ref);
            debug!("{e}");
        }
    }
}

impl<E: Exec> SnapshotStore for GitNotesStore<E> {
    fn put(&self, commit_id: &str, blob: &str) -> Result<()> {
        self.fetch();

        let add = vec![
            "notes".to_string(),
            format!("--ref={}", self.notes_ref),
            "add".to_string(),
            "-f".to_string(),
            "--file=-".to_string(),
            commit_id.to_string(),
        ];
        self.exec
            .execute("git", &add, Some(blob))
            .map_err(|e| CovtrendError::Publish(format!("git notes add failed: {e}")))?;

        let push = vec!["push".to_string(), "origin".to_string(), self.full_ref()];
        self.exec
            .execute("git", &push, None)
            .map_err(|e| CovtrendError::Publish(format!("git push of notes failed: {e}")))?;
        Ok(())
    }

    fn find_preceding_matching(&self, start_ref: &str, marker: &str) -> Result<Option<StoredBlob>> {
        self.fetch();

        let args = vec![
            "log".to_string(),
            format!("--notes={}", self.notes_ref),
            "--pretty=format:%H%x1f%N%x1e".to_string(),
            "--fixed-strings".to_string(),
            format!("--grep={marker}"),
            start_ref.to_string(),
        ];
        let output = match self.exec.execute("git", &args, None) {
            Ok(output) => output,
            Err(e) => {
                // An unknown or unfetched ref is not an error for history.
                debug!("git log failed for {start_ref}: {e}");
                return Ok(None);
            }
        };

        // --grep also matches commit messages, so keep walking until a
        // note actually carries the marker.
        Ok(parse_log_records(&output)
            .into_iter()
            .find(|record| record.blob.contains(marker)))
    }
}

/// Split `%H%x1f%N%x1e` formatted log output into (commit, note) pairs.
pub fn parse_log_records(output: &str) -> Vec<StoredBlob> {
    output
        .split(RECORD_SEP)
        .filter_map(|record| {
            let (sha, note) = record.trim_start_matches(['\n', '\r']).split_once(FIELD_SEP)?;
            let sha = sha.trim();
            if sha.is_empty() {
                return None;
            }
            Some(StoredBlob {
                commit_id: sha.to_string(),
                blob: note.trim().to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::fake::FakeExec;

    const BLOB: &str = r#"{"go-coverage-action-fmt":1,"coverage_pct":50.0,"pkg_stats":{},"skipped_count":0}"#;

    #[test]
    fn test_parse_log_records() {
        let output = format!("abc123\x1f{BLOB}\n\x1e\ndef456\x1f\x1e");
        let records = parse_log_records(&output);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].commit_id, "abc123");
        assert_eq!(records[0].blob, BLOB);
        assert_eq!(records[1].commit_id, "def456");
        assert_eq!(records[1].blob, "");
    }

    #[test]
    fn test_parse_log_records_empty() {
        assert!(parse_log_records("").is_empty());
    }

    #[test]
    fn test_put_adds_and_pushes() {
        let exec = FakeExec::default();
        exec.respond(FakeExec::failure("git")); // fetch: ref does not exist yet
        let store = GitNotesStore::new(&exec, "gocoverage");
        store.put("abc123", BLOB).unwrap();

        let calls = exec.calls.borrow();
        assert_eq!(calls.len(), 3);
        assert_eq!(
            calls[1].1,
            vec!["notes", "--ref=gocoverage", "add", "-f", "--file=-", "abc123"]
        );
        assert_eq!(calls[1].2.as_deref(), Some(BLOB));
        assert_eq!(calls[2].1, vec!["push", "origin", "refs/notes/gocoverage"]);
    }

    #[test]
    fn test_put_failure_is_publish_error() {
        let exec = FakeExec::default();
        exec.respond(Ok(String::new()));
        exec.respond(Ok(String::new()));
        exec.respond(FakeExec::failure("git"));
        let store = GitNotesStore::new(&exec, "gocoverage");
        let err = store.put("abc123", BLOB).unwrap_err();
        assert!(matches!(err, CovtrendError::Publish(_)));
    }

    #[test]
    fn test_find_returns_matching_note() {
        let exec = FakeExec::default();
        exec.respond(Ok(String::new()));
        exec.respond(Ok(format!("abc123\x1f{BLOB}\n\x1e")));
        let store = GitNotesStore::new(&exec, "gocoverage");

        let found = store
            .find_preceding_matching("base", "coverage_pct")
            .unwrap()
            .unwrap();
        assert_eq!(found.commit_id, "abc123");
        assert_eq!(found.blob, BLOB);

        let calls = exec.calls.borrow();
        assert_eq!(calls[1].1.last().map(String::as_str), Some("base"));
        assert!(calls[1].1.contains(&"--grep=coverage_pct".to_string()));
    }

    #[test]
    fn test_find_on_git_failure_is_none() {
        let exec = FakeExec::default();
        exec.respond(Ok(String::new()));
        exec.respond(FakeExec::failure("git"));
        let store = GitNotesStore::new(&exec, "gocoverage");
        assert_eq!(store.find_preceding_matching("bad-ref", "coverage_pct").unwrap(), None);
    }

    #[test]
    fn test_find_rejects_note_without_marker() {
        let exec = FakeExec::default();
        exec.respond(Ok(String::new()));
        exec.respond(Ok("abc123\x1fcoverage mentioned in message only\x1e".to_string()));
        let store = GitNotesStore::new(&exec, "gocoverage");
        assert_eq!(store.find_preceding_matching("base", "coverage_pct").unwrap(), None);
    }

    #[test]
    fn test_find_skips_message_only_match() {
        let exec = FakeExec::default();
        exec.respond(Ok(String::new()));
        exec.respond(Ok(format!("newer\x1f\x1e\nolder\x1f{BLOB}\n\x1e")));
        let store = GitNotesStore::new(&exec, "gocoverage");

        let found = store
            .find_preceding_matching("base", "coverage_pct")
            .unwrap()
            .unwrap();
        assert_eq!(found.commit_id, "older");
        assert!(!exec.calls.borrow()[1].1.contains(&"-n".to_string()));
    }
}
