use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;

use tokentrace_types::TranscriptRecord;

use crate::Result;
use crate::schema::parse_record;

/// Counters describing one pass over a transcript.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadStats {
    pub parsed: usize,
    pub skipped: usize,
}

/// Streaming transcript reader: yields one record per well-formed line.
///
/// Blank lines are ignored; malformed or truncated lines are counted in
/// [`ReadStats::skipped`] and logged at debug level. A non-recoverable IO
/// error ends the stream.
pub struct TranscriptReader<R> {
    reader: R,
    line: usize,
    stats: ReadStats,
    finished: bool,
}

impl TranscriptReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> TranscriptReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            stats: ReadStats::default(),
            finished: false,
        }
    }

    pub fn stats(&self) -> ReadStats {
        self.stats
    }
}

impl<R: BufRead> Iterator for TranscriptReader<R> {
    type Item = TranscriptRecord;

    fn next(&mut self) -> Option<Self::Item> {
        let mut buf = Vec::new();
        while !self.finished {
            buf.clear();
            let line = self.line;
            match self.reader.read_until(b'\n', &mut buf) {
                Ok(0) => {
                    self.finished = true;
                    return None;
                }
                Ok(_) => {}
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    tracing::warn!("Stopping transcript read at line {}: {}", line, err);
                    self.finished = true;
                    return None;
                }
            }
            self.line += 1;

            let text = String::from_utf8_lossy(&buf);
            let text = text.trim();
            if text.is_empty() {
                continue;
            }

            match parse_record(text, line) {
                Ok(record) => {
                    self.stats.parsed += 1;
                    return Some(record);
                }
                Err(err) => {
                    self.stats.skipped += 1;
                    tracing::debug!("Skipping unparseable transcript line {}: {}", line, err);
                }
            }
        }
        None
    }
}

/// Read every well-formed record of a transcript.
///
/// A missing file is not an error: it reads as an empty transcript.
pub fn read_transcript(path: &Path) -> Result<Vec<TranscriptRecord>> {
    match TranscriptReader::open(path) {
        Ok(reader) => Ok(reader.collect()),
        Err(crate::Error::Io(err)) if err.kind() == ErrorKind::NotFound => {
            tracing::debug!("Transcript {} does not exist", path.display());
            Ok(Vec::new())
        }
        Err(err) => Err(err),
    }
}
