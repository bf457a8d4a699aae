pub mod bundle;
pub mod error;
pub mod estimate;
pub mod operation;
pub mod record;
pub mod usage;
mod util;

pub use bundle::{Bundle, SubAgentInfo};
pub use error::{Error, Result};
pub use estimate::EstimationConfig;
pub use operation::{Allocation, Operation, OperationKind, RawOperation};
pub use record::{ContentBlock, Message, MessageContent, RecordContent, TranscriptRecord};
pub use usage::TokenUsage;
pub use util::*;
