//! Model configuration structures

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_DOWNSAMPLING_RATE, POSITION_OFFSET};
use crate::Result;

/// Metadata a SaT model declares about itself (`config.json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model architecture name
    #[serde(default)]
    pub architectures: Vec<String>,

    /// Model type identifier
    #[serde(default)]
    pub model_type: String,

    /// Number of labels for token classification
    #[serde(default = "default_num_labels")]
    pub num_labels: usize,

    /// Maximum position embeddings
    #[serde(default = "default_max_position_embeddings")]
    pub max_position_embeddings: usize,

    /// Block sizes must be a multiple of this
    #[serde(default = "default_downsampling_rate")]
    pub downsampling_rate: usize,

    /// Lookahead configuration
    #[serde(default)]
    pub lookahead: Option<usize>,

    /// Base model name
    #[serde(default)]
    pub base_model: String,
}

fn default_num_labels() -> usize {
    1
}

fn default_max_position_embeddings() -> usize {
    514
}

fn default_downsampling_rate() -> usize {
    DEFAULT_DOWNSAMPLING_RATE
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            architectures: vec![],
            model_type: String::new(),
            num_labels: default_num_labels(),
            max_position_embeddings: default_max_position_embeddings(),
            downsampling_rate: default_downsampling_rate(),
            lookahead: None,
            base_model: String::new(),
        }
    }
}

impl ModelConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to the defaults
    pub fn from_file_or_default(path: &Path) -> Result<Self> {
        if path.is_file() {
            Self::from_file(path)
        } else {
            log::debug!("No model config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Widest window (sentinels included) the model accepts
    pub fn max_context(&self) -> usize {
        self.max_position_embeddings.saturating_sub(POSITION_OFFSET)
    }
}
