//! Transcript layer: line-tolerant JSONL reading, role classification,
//! backward tail reads and the layered session usage calculator.

pub mod classify;
pub mod discovery;
pub mod error;
pub mod reader;
pub mod schema;
pub mod tail;
pub mod usage;

pub use classify::{
    AssistantPart, ClassifiedMessage, MessageKind, ToolResultPart, classify, resolve,
};
pub use discovery::{TranscriptFile, default_transcripts_root, find_transcript, list_transcripts};
pub use error::{Error, Result};
pub use reader::{ReadStats, TranscriptReader, read_transcript};
pub use schema::{line_usage, parse_record};
pub use tail::TailLines;
pub use usage::{
    Confidence, ForwardScan, Measure, SizeEstimate, TailLine, TailWindow, TokenReading,
    UsageCalculator, UsageScanConfig, UsageStrategy, get_current_token_total,
    get_session_maximum_tokens, last_usage,
};
