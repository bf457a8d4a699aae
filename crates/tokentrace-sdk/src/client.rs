use std::path::{Path, PathBuf};

use tokentrace_engine::EngineOptions;
use tokentrace_store::{OperationStore, SnapshotStore, UnavailableStore};
use tokentrace_transcript::{Measure, TokenReading, UsageCalculator};
use tokentrace_types::Bundle;

use crate::config::Config;
use crate::error::{Error, Result};

/// Entry point for correlating sessions and reading token totals.
///
/// The client owns the operation store handle and a usage calculator whose
/// forward-scan checkpoints persist across calls, so repeated queries on a
/// growing transcript only read the appended bytes.
pub struct Client {
    store: Box<dyn OperationStore>,
    usage: UsageCalculator,
    options: EngineOptions,
    transcripts_root: Option<PathBuf>,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Client over `store` with default settings.
    pub fn new(store: impl OperationStore + 'static) -> Self {
        Self::builder().store(store).build()
    }

    /// Client configured from the default config file location.
    pub fn connect_default() -> Result<Self> {
        let config = Config::load()?;
        Ok(Self::builder().config(config).build())
    }

    /// Client configured from an explicit config file.
    pub fn connect(config_path: impl AsRef<Path>) -> Result<Self> {
        let config = Config::load_from(config_path.as_ref())?;
        Ok(Self::builder().config(config).build())
    }

    pub fn store_available(&self) -> bool {
        self.store.is_available()
    }

    /// Ordered, token-accounted bundles for a session.
    ///
    /// Without a transcript path, or with one that does not exist, the result
    /// is empty.
    pub fn correlate_operations(&self, session_id: &str, transcript: Option<&Path>) -> Vec<Bundle> {
        let Some(transcript) = transcript else {
            tracing::debug!("No transcript given for session {}", session_id);
            return Vec::new();
        };
        tokentrace_engine::correlate_operations(
            self.store.as_ref(),
            session_id,
            transcript,
            &self.options,
        )
    }

    /// Correlate a session whose transcript is located under the transcripts
    /// root.
    pub fn correlate_session(&self, session_id: &str) -> Result<Vec<Bundle>> {
        let path = self
            .find_transcript(session_id)?
            .ok_or_else(|| Error::NotFound(format!("Transcript for session {}", session_id)))?;
        Ok(self.correlate_operations(session_id, Some(&path)))
    }

    /// Highest per-record usage total in the transcript; 0 when absent.
    pub fn session_maximum_tokens(&self, transcript: &Path) -> u64 {
        self.usage.session_maximum(transcript)
    }

    /// Usage total of the last usage-carrying record; 0 when absent.
    pub fn current_token_total(&self, transcript: &Path) -> u64 {
        self.usage.current_total(transcript)
    }

    /// A usage measure together with its confidence and the strategy that
    /// produced it.
    pub fn token_reading(&self, transcript: &Path, measure: Measure) -> TokenReading {
        self.usage.measure(transcript, measure)
    }

    pub fn find_transcript(&self, session_id: &str) -> Result<Option<PathBuf>> {
        if session_id.trim().is_empty() {
            return Err(Error::InvalidInput("session id is empty".to_string()));
        }
        let Some(root) = &self.transcripts_root else {
            return Ok(None);
        };
        Ok(tokentrace_transcript::find_transcript(root, session_id)?)
    }
}

/// Builder for [`Client`].
#[derive(Default)]
pub struct ClientBuilder {
    config: Config,
    store: Option<Box<dyn OperationStore>>,
}

impl ClientBuilder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn store(mut self, store: impl OperationStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn transcripts_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.transcripts_root = Some(root.into());
        self
    }

    /// Without an explicit store, the configured snapshot is opened; a
    /// missing or unreadable snapshot leaves the client without store data.
    pub fn build(self) -> Client {
        let store = self.store.unwrap_or_else(|| open_configured_store(&self.config));
        Client {
            store,
            usage: UsageCalculator::standard(self.config.usage, self.config.estimation),
            options: self.config.engine_options(),
            transcripts_root: self.config.transcripts_root(),
        }
    }
}

fn open_configured_store(config: &Config) -> Box<dyn OperationStore> {
    let Some(path) = &config.store.snapshot_path else {
        return Box::new(UnavailableStore);
    };
    match SnapshotStore::open(path) {
        Ok(store) => Box::new(store),
        Err(err) => {
            tracing::warn!("Cannot open store snapshot {}: {}", path.display(), err);
            Box::new(UnavailableStore)
        }
    }
}
