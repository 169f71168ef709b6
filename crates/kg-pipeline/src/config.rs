//! Pipeline configuration
//!
//! Everything is optional in TOML; absent keys take the defaults below.
//!
//! ```toml
//! max_inspection_rounds = 3
//! concurrency = 8
//! checkpoint_dir = "checkpoints"
//!
//! [mutation]
//! reject_orphaning_deletes = true
//! ```

use crate::error::PipelineError;
use crate::mutation::MutationPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Driver and engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Cap compared against `inspection_iter`
    pub max_inspection_rounds: u32,
    /// Hard cap on driver iterations
    pub max_steps: usize,
    /// Optional cap on nodes per batch round
    pub batch_limit: Option<usize>,
    /// Concurrent per-node calls within one batch
    pub concurrency: usize,
    /// Save a checkpoint after every step when set
    pub checkpoint_dir: Option<PathBuf>,
    /// Default log filter
    pub log_level: String,
    /// Mutation engine policy
    pub mutation: MutationPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_inspection_rounds: 3,
            max_steps: 1000,
            batch_limit: None,
            concurrency: 4,
            checkpoint_dir: None,
            log_level: "info".to_string(),
            mutation: MutationPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With inspection round cap
    #[inline]
    #[must_use]
    pub fn with_max_inspection_rounds(mut self, rounds: u32) -> Self {
        self.max_inspection_rounds = rounds;
        self
    }

    /// With step cap
    #[inline]
    #[must_use]
    pub fn with_max_steps(mut self, steps: usize) -> Self {
        self.max_steps = steps;
        self
    }

    /// With per-round batch limit
    #[inline]
    #[must_use]
    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = Some(limit);
        self
    }

    /// With concurrency
    #[inline]
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// With checkpoint directory
    #[inline]
    #[must_use]
    pub fn with_checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = Some(dir.into());
        self
    }

    /// With mutation policy
    #[inline]
    #[must_use]
    pub fn with_mutation_policy(mut self, policy: MutationPolicy) -> Self {
        self.mutation = policy;
        self
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// [`PipelineError::ConfigParse`] on bad TOML, [`PipelineError::Config`]
    /// when values fail [`Self::validate`]
    pub fn from_toml_str(text: &str) -> Result<Self, PipelineError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    ///
    /// # Errors
    /// I/O, parse or validation failure
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    /// Check value consistency
    ///
    /// # Errors
    /// [`PipelineError::Config`] naming the offending key
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.concurrency == 0 {
            return Err(PipelineError::Config("concurrency must be at least 1".to_string()));
        }
        if self.max_steps == 0 {
            return Err(PipelineError::Config("max_steps must be at least 1".to_string()));
        }
        Ok(())
    }
}
