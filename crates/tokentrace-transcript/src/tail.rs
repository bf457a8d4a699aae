use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// Yields the complete lines of a file from last to first, reading
/// backwards in fixed-size chunks.
///
/// Reading stops once `max_bytes` have been pulled from disk; a line longer
/// than the remaining budget is never yielded partially.
pub struct TailLines {
    file: File,
    /// File offset where `buf` starts.
    pos: u64,
    buf: Vec<u8>,
    chunk_size: usize,
    max_bytes: u64,
    consumed: u64,
    done: bool,
}

impl TailLines {
    pub fn open(path: &Path, chunk_size: usize, max_bytes: u64) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            file,
            pos: len,
            buf: Vec::new(),
            chunk_size: chunk_size.max(1),
            max_bytes,
            consumed: 0,
            done: false,
        })
    }

    fn read_chunk(&mut self) -> io::Result<()> {
        let remaining_budget = self.max_bytes.saturating_sub(self.consumed);
        let len = (self.chunk_size as u64).min(self.pos).min(remaining_budget);
        let start = self.pos - len;

        let mut chunk = vec![0u8; len as usize];
        self.file.seek(SeekFrom::Start(start))?;
        self.file.read_exact(&mut chunk)?;

        chunk.extend_from_slice(&self.buf);
        self.buf = chunk;
        self.pos = start;
        self.consumed += len;
        Ok(())
    }
}

impl Iterator for TailLines {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            if let Some(newline) = self.buf.iter().rposition(|&b| b == b'\n') {
                let line = self.buf.split_off(newline + 1);
                self.buf.truncate(newline);
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                return Some(Ok(String::from_utf8_lossy(&line).into_owned()));
            }

            if self.pos == 0 {
                self.done = true;
                let line = std::mem::take(&mut self.buf);
                if line.iter().all(u8::is_ascii_whitespace) {
                    return None;
                }
                return Some(Ok(String::from_utf8_lossy(&line).into_owned()));
            }

            if self.consumed >= self.max_bytes {
                self.done = true;
                return None;
            }

            if let Err(err) = self.read_chunk() {
                self.done = true;
                return Some(Err(err));
            }
        }
        None
    }
}
