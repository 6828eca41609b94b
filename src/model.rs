//! Scoring model capability and the ONNX Runtime implementation

use half::f16;
use ndarray::{Array3, ArrayView2, Ix3};
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use ort::value::Value;
use std::path::{Path, PathBuf};

use crate::config::ModelConfig;
use crate::constants::{CONFIG_FILE, MODEL_FILE, OPTIMIZED_MODEL_FILE};
use crate::error::Error;
use crate::Result;

const LOGITS_OUTPUT: &str = "logits";

/// Produces per-token, per-label logits for a batch of windows.
///
/// `input_ids` and `attention_mask` share the shape `[batch, width]`; the
/// returned tensor is `[batch, width, num_labels]`.
pub trait ScoringModel {
    /// Number of labels in the last logits dimension
    fn num_labels(&self) -> usize;

    /// Widest window (sentinels included) the model accepts
    fn max_context(&self) -> usize;

    /// Block sizes are rounded up to a multiple of this
    fn downsampling_rate(&self) -> usize;

    /// Run one forward pass
    fn infer(
        &mut self,
        input_ids: ArrayView2<'_, i64>,
        attention_mask: ArrayView2<'_, f16>,
    ) -> Result<Array3<f32>>;
}

/// ONNX model wrapper for SaT checkpoints.
///
/// The session is owned here and released when the model is dropped.
pub struct OnnxModel {
    session: Session,
    /// Model configuration
    pub config: ModelConfig,
}

impl OnnxModel {
    /// Load an ONNX model from a file
    pub fn new(onnx_path: &Path, config: ModelConfig) -> Result<Self> {
        let builder = Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;
        Self::with_builder(builder, onnx_path, config)
    }

    /// Load a model file or model directory, reading `config.json` beside it
    /// when present
    pub fn from_path(path: &Path) -> Result<Self> {
        let onnx_path = resolve_model_path(path)?;
        let config = ModelConfig::from_file_or_default(&config_path_for(&onnx_path))?;
        Self::new(&onnx_path, config)
    }

    /// Load with caller supplied session options (execution providers,
    /// thread counts)
    pub fn with_builder(builder: SessionBuilder, onnx_path: &Path, config: ModelConfig) -> Result<Self> {
        let model = Self::from_session(builder.commit_from_file(onnx_path)?, config);
        log::info!(
            "Loaded ONNX model from {} ({} labels, downsampling rate {})",
            onnx_path.display(),
            model.config.num_labels,
            model.config.downsampling_rate
        );
        Ok(model)
    }

    /// Load from raw model bytes
    pub fn from_bytes(model: &[u8], config: ModelConfig) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_memory(model)?;
        Ok(Self::from_session(session, config))
    }

    /// Wrap an existing session.
    ///
    /// The label count declared by the session's `logits` output overrides
    /// `config.num_labels` when that dimension is fixed.
    pub fn from_session(session: Session, mut config: ModelConfig) -> Self {
        let declared = session
            .outputs
            .iter()
            .find(|output| output.name == LOGITS_OUTPUT)
            .and_then(|output| output.output_type.tensor_shape())
            .and_then(|shape| shape.last().copied());

        config.num_labels = label_count(declared, config.num_labels);
        Self { session, config }
    }
}

/// Label count from the last `logits` dimension the model declares, or the
/// configured count when that dimension is dynamic (negative) or missing.
fn label_count(declared: Option<i64>, configured: usize) -> usize {
    match declared {
        Some(dim) if dim > 0 => {
            let dim = dim as usize;
            if dim != configured {
                log::debug!(
                    "Model declares {} labels, config says {}; using the model",
                    dim,
                    configured
                );
            }
            dim
        }
        _ => configured,
    }
}

impl ScoringModel for OnnxModel {
    fn num_labels(&self) -> usize {
        self.config.num_labels
    }

    fn max_context(&self) -> usize {
        self.config.max_context()
    }

    fn downsampling_rate(&self) -> usize {
        self.config.downsampling_rate
    }

    fn infer(
        &mut self,
        input_ids: ArrayView2<'_, i64>,
        attention_mask: ArrayView2<'_, f16>,
    ) -> Result<Array3<f32>> {
        let input_ids_value = Value::from_array(input_ids.to_owned())?;
        let attention_mask_value = Value::from_array(attention_mask.to_owned())?;

        let outputs = self.session.run(ort::inputs![
            "input_ids" => input_ids_value,
            "attention_mask" => attention_mask_value
        ])?;

        // Model outputs f16, convert to f32
        let logits = outputs[LOGITS_OUTPUT]
            .try_extract_array::<f16>()
            .map_err(|e| Error::Inference(format!("Failed to extract logits: {}", e)))?;

        let logits = logits.mapv(|x| x.to_f32()).into_dimensionality::<Ix3>()?;
        Ok(logits)
    }
}

/// Resolve a model file from a path.
///
/// A file is used as is. A directory is searched for the optimized export
/// first, then the plain one.
pub fn resolve_model_path(path: &Path) -> Result<PathBuf> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }

    if path.is_dir() {
        let optimized = path.join(OPTIMIZED_MODEL_FILE);
        if optimized.is_file() {
            return Ok(optimized);
        }

        let plain = path.join(MODEL_FILE);
        if plain.is_file() {
            log::warn!(
                "{} not found in {}, using {}",
                OPTIMIZED_MODEL_FILE,
                path.display(),
                MODEL_FILE
            );
            return Ok(plain);
        }
    }

    Err(Error::ModelNotFound(path.to_path_buf()))
}

fn config_path_for(onnx_path: &Path) -> PathBuf {
    onnx_path
        .parent()
        .map(|dir| dir.join(CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
}
