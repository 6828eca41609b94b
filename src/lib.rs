//! # satsplit - Sentence and paragraph segmentation with SaT
//!
//! satsplit finds sentence and paragraph boundaries in raw text with SaT
//! ("Segment any Text") models: XLM-RoBERTa token classifiers exported to
//! ONNX that score every subword for "a sentence ends here".
//!
//! ## Pipeline
//!
//! 1. Tokenize each text into subwords with character offsets
//! 2. Tile the token sequence into overlapping windows framed by BOS/EOS
//! 3. Score the windows in batches and average overlapping logits
//! 4. Project token logits onto characters and apply a sigmoid
//! 5. Cut after every character whose probability exceeds the threshold
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use satsplit::{SaT, SaTOptions};
//!
//! let mut sat = SaT::from_path(
//!     "sat-3l-sm",
//!     Path::new("models/sat-3l-sm"),
//!     Path::new("models/xlm-roberta-base/tokenizer.json"),
//! )?;
//!
//! let options = SaTOptions {
//!     strip_whitespace: true,
//!     ..SaTOptions::default()
//! };
//! for sentence in sat.split("This is a test. Another sentence here.", Some(&options))? {
//!     println!("{}", sentence);
//! }
//! # Ok::<(), satsplit::Error>(())
//! ```
//!
//! ## Modules
//!
//! - [`tokenizer`] - Subword tokenization with character offsets
//! - [`model`] - Scoring model capability and the ONNX Runtime backend
//! - [`extract`] - Windowing, batching and logit averaging
//! - [`proba`] - Lazy per-character probabilities
//! - [`split`] - Threshold-driven sentence and paragraph splitting
//! - [`sat`] - The [`SaT`] facade

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod constants;
pub mod error;
pub mod extract;
pub mod model;
pub mod proba;
pub mod sat;
pub mod split;
pub mod tokenizer;
pub mod utils;

pub use config::ModelConfig;
pub use error::Error;
pub use extract::{ExtractConfig, Weighting};
pub use model::{OnnxModel, ScoringModel};
pub use proba::{ProbaConfig, ProbaIter};
pub use sat::{ParagraphBatch, SaT, SaTOptions, SplitBatch};
pub use split::{Paragraphs, Sentences, SplitMode};
pub use tokenizer::{HfTokenizer, Offset, Token, Tokenizer};

/// Result type alias for segmentation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
