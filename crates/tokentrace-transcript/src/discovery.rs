use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

use crate::Result;

/// Project directories sit directly under the root and hold one `.jsonl`
/// file per session; sub-agent files may be nested one level deeper.
const MAX_DEPTH: usize = 3;

/// A transcript file found under a transcripts root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptFile {
    pub session_id: String,
    pub path: PathBuf,
    pub modified: Option<SystemTime>,
}

/// `~/.claude/projects`, where the host application writes transcripts.
pub fn default_transcripts_root() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".claude").join("projects"))
}

fn is_transcript(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    if path.extension().is_none_or(|e| e != "jsonl") {
        return false;
    }
    !matches!(std::fs::metadata(path), Ok(meta) if meta.len() == 0)
}

/// Every non-empty transcript under `root`, most recently modified first.
pub fn list_transcripts(root: &Path) -> Result<Vec<TranscriptFile>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .max_depth(MAX_DEPTH)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !is_transcript(path) {
            continue;
        }
        let Some(session_id) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        files.push(TranscriptFile {
            session_id: session_id.to_string(),
            path: path.to_path_buf(),
            modified: entry.metadata().ok().and_then(|m| m.modified().ok()),
        });
    }

    files.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.path.cmp(&b.path)));
    Ok(files)
}

/// Locate the transcript `<session_id>.jsonl` under `root`.
///
/// When the same session appears in several project directories the most
/// recently modified file wins.
pub fn find_transcript(root: &Path, session_id: &str) -> Result<Option<PathBuf>> {
    if session_id.is_empty() {
        return Ok(None);
    }
    let found = list_transcripts(root)?
        .into_iter()
        .find(|file| file.session_id == session_id)
        .map(|file| file.path);
    if found.is_none() {
        tracing::debug!(
            "No transcript for session {} under {}",
            session_id,
            root.display()
        );
    }
    Ok(found)
}
