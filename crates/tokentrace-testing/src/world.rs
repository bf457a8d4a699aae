//! TestWorld pattern for declarative integration test setup.
//!
//! Provides a fluent interface for:
//! - Creating an isolated home with a transcripts root
//! - Placing transcripts in project directories
//! - Writing config files and store snapshots

use anyhow::Result;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::fixtures::TranscriptBuilder;
use crate::store::TestStore;

/// Declarative test environment builder.
///
/// # Example
/// ```no_run
/// use tokentrace_testing::{TestWorld, TranscriptBuilder};
///
/// let world = TestWorld::new()
///     .with_transcript("-home-me-app", "session-1", &TranscriptBuilder::new().user("u", 1, "hi"));
///
/// assert!(world.transcript_path("-home-me-app", "session-1").exists());
/// ```
pub struct TestWorld {
    temp_dir: TempDir,
    transcripts_root: PathBuf,
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorld {
    /// Create a new isolated test environment.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let transcripts_root = temp_dir.path().join(".claude").join("projects");
        std::fs::create_dir_all(&transcripts_root).expect("Failed to create transcripts root");

        Self {
            temp_dir,
            transcripts_root,
        }
    }

    /// Get the temp directory root.
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Get the transcripts root (`.claude/projects`).
    pub fn transcripts_root(&self) -> &Path {
        &self.transcripts_root
    }

    pub fn transcript_path(&self, project: &str, session_id: &str) -> PathBuf {
        self.transcripts_root
            .join(project)
            .join(format!("{}.jsonl", session_id))
    }

    /// Write a transcript for `session_id` under a project directory.
    pub fn with_transcript(
        self,
        project: &str,
        session_id: &str,
        transcript: &TranscriptBuilder,
    ) -> Self {
        transcript
            .write_to(&self.transcript_path(project, session_id))
            .expect("Failed to write transcript");
        self
    }

    /// Dump a store as a snapshot file; returns its path.
    pub fn write_snapshot(&self, name: &str, store: &TestStore) -> Result<PathBuf> {
        let path = self.temp_dir.path().join(name);
        store.write_snapshot(&path)?;
        Ok(path)
    }

    /// Write a config file; returns its path.
    pub fn write_config(&self, content: &str) -> Result<PathBuf> {
        let path = self.temp_dir.path().join("config.toml");
        std::fs::write(&path, content)?;
        Ok(path)
    }
}
