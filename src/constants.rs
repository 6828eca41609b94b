//! Constants used throughout satsplit

/// Index for newline/sentence boundary predictions in the output logits
pub const NEWLINE_INDEX: usize = 0;

/// Upper bound on the number of tokens in a window, excluding BOS/EOS
pub const MAX_BLOCK_SIZE: usize = 510;

/// Downsampling rate assumed when the model does not declare one
pub const DEFAULT_DOWNSAMPLING_RATE: usize = 1;

/// Number of sentinel positions (BOS + EOS) framing every window
pub const SENTINEL_COUNT: usize = 2;

/// RoBERTa reserves the first position ids for padding, so the usable
/// context is two shorter than `max_position_embeddings`
pub const POSITION_OFFSET: usize = 2;

/// XLM-RoBERTa `<s>` id
pub const XLMR_BOS_ID: u32 = 0;

/// XLM-RoBERTa `<pad>` id
pub const XLMR_PAD_ID: u32 = 1;

/// XLM-RoBERTa `</s>` id
pub const XLMR_EOS_ID: u32 = 2;

/// Default sentence threshold for small (`-sm`) models
pub const SM_THRESHOLD: f32 = 0.25;

/// Default sentence threshold for models trained without limited lookahead
pub const NO_LOOKAHEAD_THRESHOLD: f32 = 0.01;

/// Default sentence threshold for every other model
pub const DEFAULT_THRESHOLD: f32 = 0.025;

/// Default paragraph threshold
pub const DEFAULT_PARAGRAPH_THRESHOLD: f32 = 0.5;

/// Preferred ONNX file inside a model directory
pub const OPTIMIZED_MODEL_FILE: &str = "model_optimized.onnx";

/// Fallback ONNX file inside a model directory
pub const MODEL_FILE: &str = "model.onnx";

/// Model metadata file inside a model directory
pub const CONFIG_FILE: &str = "config.json";

/// Pick the default sentence threshold from a model name.
///
/// Small models are calibrated much higher than the full-size ones.
pub fn default_threshold(model_name: &str) -> f32 {
    if model_name.contains("sm") {
        SM_THRESHOLD
    } else if model_name.contains("no-limited-lookahead") {
        NO_LOOKAHEAD_THRESHOLD
    } else {
        DEFAULT_THRESHOLD
    }
}
