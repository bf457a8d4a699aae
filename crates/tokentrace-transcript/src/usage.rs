//! Session token totals read from a transcript without correlation.
//!
//! Two measures are offered: the session maximum (the highest per-record
//! usage total ever seen) and the current total (the usage total of the last
//! record that reports usage). Each is resolved by an ordered chain of
//! [`UsageStrategy`] values; the first strategy that produces a reading wins.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tokentrace_types::{EstimationConfig, TokenUsage};

use crate::Result;
use crate::schema::line_usage;
use crate::tail::TailLines;

/// Which total a caller is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    SessionMaximum,
    CurrentTotal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Derived from usage counters in the transcript.
    Exact,
    /// Derived from file size; no usable record was found.
    Estimated,
}

/// Result of a usage query, tagged with the strategy that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenReading {
    pub tokens: u64,
    pub confidence: Confidence,
    pub strategy: &'static str,
}

impl TokenReading {
    fn exact(tokens: u64, strategy: &'static str) -> Self {
        Self {
            tokens,
            confidence: Confidence::Exact,
            strategy,
        }
    }

    fn zero() -> Self {
        Self::exact(0, "none")
    }
}

/// Bounds for the backward tail reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageScanConfig {
    pub tail_chunk_bytes: usize,
    pub max_tail_bytes: u64,
    pub max_tail_lines: usize,
}

impl Default for UsageScanConfig {
    fn default() -> Self {
        Self {
            tail_chunk_bytes: 8 * 1024,
            max_tail_bytes: 4 * 1024 * 1024,
            max_tail_lines: 200,
        }
    }
}

/// One layer of the fallback chain.
///
/// `Ok(None)` means the strategy does not apply or found nothing; `Err` means
/// it failed. Either way the next strategy is tried.
pub trait UsageStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn measure(&self, path: &Path, measure: Measure) -> Result<Option<TokenReading>>;
}

/// Parses only the last complete line.
pub struct TailLine {
    config: UsageScanConfig,
}

impl TailLine {
    pub fn new(config: UsageScanConfig) -> Self {
        Self { config }
    }
}

impl UsageStrategy for TailLine {
    fn name(&self) -> &'static str {
        "tail_line"
    }

    fn measure(&self, path: &Path, measure: Measure) -> Result<Option<TokenReading>> {
        if measure != Measure::CurrentTotal {
            return Ok(None);
        }
        let mut lines =
            TailLines::open(path, self.config.tail_chunk_bytes, self.config.max_tail_bytes)?;
        let Some(last) = lines.next().transpose()? else {
            return Ok(None);
        };
        Ok(line_usage(&last)
            .ok()
            .flatten()
            .map(|usage| TokenReading::exact(usage.total(), self.name())))
    }
}

/// Walks backwards over up to `max_tail_lines` lines looking for usage.
pub struct TailWindow {
    config: UsageScanConfig,
}

impl TailWindow {
    pub fn new(config: UsageScanConfig) -> Self {
        Self { config }
    }
}

impl UsageStrategy for TailWindow {
    fn name(&self) -> &'static str {
        "tail_window"
    }

    fn measure(&self, path: &Path, measure: Measure) -> Result<Option<TokenReading>> {
        if measure != Measure::CurrentTotal {
            return Ok(None);
        }
        let lines =
            TailLines::open(path, self.config.tail_chunk_bytes, self.config.max_tail_bytes)?;
        for line in lines.take(self.config.max_tail_lines) {
            if let Ok(Some(usage)) = line_usage(&line?) {
                return Ok(Some(TokenReading::exact(usage.total(), self.name())));
            }
        }
        Ok(None)
    }
}

/// Progress of a forward scan over the complete lines of a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ScanCheckpoint {
    /// Byte offset just past the last complete line consumed.
    offset: u64,
    max_total: u64,
    last_total: Option<u64>,
    parsed_lines: usize,
}

impl ScanCheckpoint {
    fn observe(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        match line_usage(text) {
            Ok(usage) => {
                self.parsed_lines += 1;
                if let Some(usage) = usage {
                    let total = usage.total();
                    self.max_total = self.max_total.max(total);
                    self.last_total = Some(total);
                }
            }
            Err(err) => tracing::debug!("Skipping unparseable line during usage scan: {}", err),
        }
    }
}

/// Streams every line, tracking the running maximum and the last usage.
///
/// Checkpoints are kept per path, so querying a transcript that has only been
/// appended to since the previous query reads just the new bytes. A file
/// shorter than its checkpoint is rescanned from the start.
#[derive(Default)]
pub struct ForwardScan {
    checkpoints: Mutex<HashMap<PathBuf, ScanCheckpoint>>,
}

impl ForwardScan {
    pub fn new() -> Self {
        Self::default()
    }

    fn scan(&self, path: &Path) -> Result<ScanCheckpoint> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();

        let mut checkpoint = self
            .checkpoints
            .lock()
            .ok()
            .and_then(|map| map.get(path).copied())
            .filter(|cp| cp.offset <= len)
            .unwrap_or_default();

        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(checkpoint.offset))?;

        let mut buf = Vec::new();
        let mut pending_tail = None;
        loop {
            buf.clear();
            let read = match reader.read_until(b'\n', &mut buf) {
                Ok(read) => read,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            };
            if read == 0 {
                break;
            }
            let text = String::from_utf8_lossy(&buf).into_owned();
            if buf.ends_with(b"\n") {
                checkpoint.offset += read as u64;
                checkpoint.observe(&text);
            } else {
                // A trailing line without newline may still be mid-write: count
                // it for this query but keep it out of the checkpoint.
                pending_tail = Some(text);
            }
        }

        if let Ok(mut map) = self.checkpoints.lock() {
            map.insert(path.to_path_buf(), checkpoint);
        }

        if let Some(text) = pending_tail {
            checkpoint.observe(&text);
        }
        Ok(checkpoint)
    }
}

impl UsageStrategy for ForwardScan {
    fn name(&self) -> &'static str {
        "forward_scan"
    }

    fn measure(&self, path: &Path, measure: Measure) -> Result<Option<TokenReading>> {
        let checkpoint = self.scan(path)?;
        if checkpoint.parsed_lines == 0 {
            return Ok(None);
        }
        let tokens = match measure {
            Measure::SessionMaximum => checkpoint.max_total,
            Measure::CurrentTotal => checkpoint.last_total.unwrap_or(0),
        };
        Ok(Some(TokenReading::exact(tokens, self.name())))
    }
}

/// Last resort: file size divided by an empirical bytes-per-token ratio.
pub struct SizeEstimate {
    estimation: EstimationConfig,
}

impl SizeEstimate {
    pub fn new(estimation: EstimationConfig) -> Self {
        Self { estimation }
    }
}

impl UsageStrategy for SizeEstimate {
    fn name(&self) -> &'static str {
        "size_estimate"
    }

    fn measure(&self, path: &Path, _measure: Measure) -> Result<Option<TokenReading>> {
        let size = std::fs::metadata(path)?.len();
        Ok(Some(TokenReading {
            tokens: self.estimation.tokens_for_file_size(size),
            confidence: Confidence::Estimated,
            strategy: self.name(),
        }))
    }
}

/// Ordered strategy chain answering both usage measures.
pub struct UsageCalculator {
    strategies: Vec<Box<dyn UsageStrategy>>,
}

impl Default for UsageCalculator {
    fn default() -> Self {
        Self::standard(UsageScanConfig::default(), EstimationConfig::default())
    }
}

impl UsageCalculator {
    /// Tail line → tail window → forward scan → size estimate.
    pub fn standard(config: UsageScanConfig, estimation: EstimationConfig) -> Self {
        Self::with_strategies(vec![
            Box::new(TailLine::new(config)),
            Box::new(TailWindow::new(config)),
            Box::new(ForwardScan::new()),
            Box::new(SizeEstimate::new(estimation)),
        ])
    }

    pub fn with_strategies(strategies: Vec<Box<dyn UsageStrategy>>) -> Self {
        Self { strategies }
    }

    /// Resolve `measure` for the transcript at `path`.
    ///
    /// Missing and empty files read as zero; every strategy failing also
    /// reads as zero.
    pub fn measure(&self, path: &Path, measure: Measure) -> TokenReading {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() == 0 => return TokenReading::zero(),
            Ok(_) => {}
            Err(err) => {
                tracing::debug!("No transcript at {}: {}", path.display(), err);
                return TokenReading::zero();
            }
        }

        for strategy in &self.strategies {
            match strategy.measure(path, measure) {
                Ok(Some(reading)) => {
                    if reading.confidence == Confidence::Estimated {
                        tracing::debug!(
                            "Token total for {} is a low-confidence estimate",
                            path.display()
                        );
                    }
                    return reading;
                }
                Ok(None) => {}
                Err(err) => tracing::debug!(
                    "Usage strategy {} failed for {}: {}",
                    strategy.name(),
                    path.display(),
                    err
                ),
            }
        }
        TokenReading {
            tokens: 0,
            confidence: Confidence::Estimated,
            strategy: "none",
        }
    }

    pub fn session_maximum(&self, path: &Path) -> u64 {
        self.measure(path, Measure::SessionMaximum).tokens
    }

    pub fn current_total(&self, path: &Path) -> u64 {
        self.measure(path, Measure::CurrentTotal).tokens
    }
}

/// Highest per-record usage total in the transcript (0 when absent).
pub fn get_session_maximum_tokens(path: &Path) -> u64 {
    UsageCalculator::default().session_maximum(path)
}

/// Usage total of the last record that reports usage (0 when absent).
pub fn get_current_token_total(path: &Path) -> u64 {
    UsageCalculator::default().current_total(path)
}

/// Usage of the last usage-carrying line, if any, found by a full scan.
pub fn last_usage(path: &Path) -> Result<Option<TokenUsage>> {
    let file = File::open(path)?;
    let mut last = None;
    for line in BufReader::new(file).lines() {
        if let Ok(Some(usage)) = line_usage(&line?) {
            last = Some(usage);
        }
    }
    Ok(last)
}
