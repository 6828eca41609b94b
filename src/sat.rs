//! SaT (Segment any Text) - subword-based sentence and paragraph segmentation
//!
//! [`SaT`] binds a tokenizer and a scoring model together with the model's
//! default sentence threshold. Every operation returns a lazy iterator:
//! probabilities for a list of texts are computed one outer batch at a time,
//! and sentences and paragraphs are carved out as they are pulled.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{default_threshold, DEFAULT_PARAGRAPH_THRESHOLD};
use crate::error::Error;
use crate::extract::{ExtractConfig, Weighting};
use crate::model::{OnnxModel, ScoringModel};
use crate::proba::{ProbaConfig, ProbaIter};
use crate::split::{split_paragraphs, split_sentences, Paragraphs, Sentences, SplitMode};
use crate::tokenizer::{HfTokenizer, Tokenizer};
use crate::Result;

/// Configuration options for SaT splitting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaTOptions {
    /// Probability threshold for sentence boundaries (model default if `None`)
    pub threshold: Option<f32>,
    /// Stride for overlapping windows
    pub stride: usize,
    /// Maximum block size
    pub block_size: usize,
    /// Batch size for inference
    pub batch_size: usize,
    /// Whether to pad the last batch
    pub pad_last_batch: bool,
    /// Weighting scheme for overlapping predictions
    pub weighting: Weighting,
    /// Remove spaces before inference (for some languages)
    pub remove_whitespace_before_inference: bool,
    /// Number of texts processed per outer batch
    pub outer_batch_size: usize,
    /// Strip whitespace from sentences
    pub strip_whitespace: bool,
    /// Split on input newlines
    pub split_on_input_newlines: bool,
    /// Paragraph threshold (for paragraph segmentation)
    pub paragraph_threshold: f32,
}

impl Default for SaTOptions {
    fn default() -> Self {
        Self {
            threshold: None,
            stride: 64,
            block_size: 512,
            batch_size: 32,
            pad_last_batch: false,
            weighting: Weighting::Uniform,
            remove_whitespace_before_inference: false,
            outer_batch_size: 1000,
            strip_whitespace: false,
            split_on_input_newlines: true,
            paragraph_threshold: DEFAULT_PARAGRAPH_THRESHOLD,
        }
    }
}

impl SaTOptions {
    /// Defaults for probability-only calls, which use a wider stride
    pub fn for_probabilities() -> Self {
        Self {
            stride: 256,
            ..Self::default()
        }
    }

    fn proba_config(&self) -> ProbaConfig {
        ProbaConfig {
            extract: ExtractConfig {
                block_size: self.block_size,
                stride: self.stride,
                batch_size: self.batch_size,
                pad_last_batch: self.pad_last_batch,
                weighting: self.weighting,
            },
            remove_whitespace_before_inference: self.remove_whitespace_before_inference,
            outer_batch_size: self.outer_batch_size,
        }
    }

    fn split_mode(&self) -> SplitMode {
        SplitMode {
            strip_whitespace: self.strip_whitespace,
            split_on_input_newlines: self.split_on_input_newlines,
        }
    }
}

/// SaT sentence segmentation model
pub struct SaT<T = HfTokenizer, M = OnnxModel> {
    model: M,
    tokenizer: T,
    model_name: String,
    threshold: f32,
}

impl SaT<HfTokenizer, OnnxModel> {
    /// Load an ONNX model and a `tokenizer.json`
    ///
    /// # Arguments
    /// * `model_name` - Name used to pick the default threshold (e.g. "sat-3l-sm")
    /// * `model_path` - ONNX file, or a directory holding `model_optimized.onnx` / `model.onnx`
    /// * `tokenizer_path` - XLM-RoBERTa `tokenizer.json`
    ///
    /// # Example
    /// ```no_run
    /// use std::path::Path;
    /// use satsplit::SaT;
    ///
    /// let mut sat = SaT::from_path(
    ///     "sat-3l-sm",
    ///     Path::new("models/sat-3l-sm"),
    ///     Path::new("models/xlm-roberta-base/tokenizer.json"),
    /// )?;
    /// for sentence in sat.split("This is a test. Another sentence here.", None)? {
    ///     println!("{}", sentence);
    /// }
    /// # Ok::<(), satsplit::Error>(())
    /// ```
    pub fn from_path(model_name: &str, model_path: &Path, tokenizer_path: &Path) -> Result<Self> {
        let model = OnnxModel::from_path(model_path)?;
        let tokenizer = HfTokenizer::from_file(tokenizer_path)?;
        Ok(Self::new(model_name, model, tokenizer))
    }
}

impl<T: Tokenizer, M: ScoringModel> SaT<T, M> {
    /// Bind a model and tokenizer; the default threshold follows the model name
    pub fn new(model_name: impl Into<String>, model: M, tokenizer: T) -> Self {
        let model_name = model_name.into();
        let threshold = default_threshold(&model_name);
        log::info!("SaT model '{}' ready (default threshold {})", model_name, threshold);

        Self {
            model,
            tokenizer,
            model_name,
            threshold,
        }
    }

    /// Name the model was created with
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Default sentence threshold
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// The scoring model
    pub fn model(&self) -> &M {
        &self.model
    }

    /// The tokenizer
    pub fn tokenizer(&self) -> &T {
        &self.tokenizer
    }

    fn sentence_threshold(&self, options: &SaTOptions) -> f32 {
        options.threshold.unwrap_or(self.threshold)
    }

    fn probabilities<'a, S: AsRef<str>>(
        &'a mut self,
        texts: &'a [S],
        options: &SaTOptions,
    ) -> Result<ProbaIter<'a, T, M, S>> {
        ProbaIter::new(texts, &mut self.model, &self.tokenizer, options.proba_config())
    }

    /// Get sentence boundary probabilities for a text
    ///
    /// # Returns
    /// Per-character probabilities of being a sentence boundary
    pub fn predict_proba(&mut self, text: &str, options: Option<&SaTOptions>) -> Result<Vec<f32>> {
        let options = options.cloned().unwrap_or_else(SaTOptions::for_probabilities);
        self.probabilities(&[text], &options)?
            .next()
            .ok_or_else(|| Error::Inference("no probabilities produced for the text".to_string()))?
    }

    /// Get sentence boundary probabilities for a batch of texts, lazily and
    /// in input order
    pub fn predict_proba_batch<'a, S: AsRef<str>>(
        &'a mut self,
        texts: &'a [S],
        options: Option<&SaTOptions>,
    ) -> Result<ProbaIter<'a, T, M, S>> {
        let options = options.cloned().unwrap_or_else(SaTOptions::for_probabilities);
        self.probabilities(texts, &options)
    }

    /// Split text into sentences
    ///
    /// Sentences are slices of `text`; with the default options they keep
    /// their trailing whitespace.
    pub fn split<'t>(&mut self, text: &'t str, options: Option<&SaTOptions>) -> Result<Sentences<'t>> {
        let options = options.cloned().unwrap_or_default();
        let threshold = self.sentence_threshold(&options);
        let probs = self.predict_proba(text, Some(&options))?;
        Ok(split_sentences(text, probs, threshold, options.split_mode()))
    }

    /// Split a batch of texts into sentences
    pub fn split_batch<'a, S: AsRef<str>>(
        &'a mut self,
        texts: &'a [S],
        options: Option<&SaTOptions>,
    ) -> Result<SplitBatch<'a, T, M, S>> {
        let options = options.cloned().unwrap_or_default();
        let threshold = self.sentence_threshold(&options);
        Ok(SplitBatch {
            texts: texts.iter(),
            probs: self.probabilities(texts, &options)?,
            threshold,
            mode: options.split_mode(),
        })
    }

    /// Split text into paragraphs, each yielding its sentences
    ///
    /// Paragraph boundaries use `paragraph_threshold`; sentences inside a
    /// paragraph use the sentence threshold.
    pub fn split_paragraphs<'t>(
        &mut self,
        text: &'t str,
        options: Option<&SaTOptions>,
    ) -> Result<Paragraphs<'t>> {
        let options = options.cloned().unwrap_or_default();
        let threshold = self.sentence_threshold(&options);
        let probs = self.predict_proba(text, Some(&options))?;
        Ok(split_paragraphs(
            text,
            probs,
            options.paragraph_threshold,
            threshold,
            options.split_mode(),
        ))
    }

    /// Split a batch of texts into paragraphs of sentences
    pub fn split_paragraphs_batch<'a, S: AsRef<str>>(
        &'a mut self,
        texts: &'a [S],
        options: Option<&SaTOptions>,
    ) -> Result<ParagraphBatch<'a, T, M, S>> {
        let options = options.cloned().unwrap_or_default();
        let threshold = self.sentence_threshold(&options);
        Ok(ParagraphBatch {
            texts: texts.iter(),
            probs: self.probabilities(texts, &options)?,
            paragraph_threshold: options.paragraph_threshold,
            threshold,
            mode: options.split_mode(),
        })
    }
}

/// Sentences of each text in a batch, see [`SaT::split_batch`]
pub struct SplitBatch<'a, T, M, S> {
    texts: std::slice::Iter<'a, S>,
    probs: ProbaIter<'a, T, M, S>,
    threshold: f32,
    mode: SplitMode,
}

impl<'a, T, M, S> Iterator for SplitBatch<'a, T, M, S>
where
    T: Tokenizer,
    M: ScoringModel,
    S: AsRef<str>,
{
    type Item = Result<Sentences<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let text = self.texts.next()?;
        Some(
            self.probs
                .next()?
                .map(|probs| split_sentences(text.as_ref(), probs, self.threshold, self.mode)),
        )
    }
}

/// Paragraphs of each text in a batch, see [`SaT::split_paragraphs_batch`]
pub struct ParagraphBatch<'a, T, M, S> {
    texts: std::slice::Iter<'a, S>,
    probs: ProbaIter<'a, T, M, S>,
    paragraph_threshold: f32,
    threshold: f32,
    mode: SplitMode,
}

impl<'a, T, M, S> Iterator for ParagraphBatch<'a, T, M, S>
where
    T: Tokenizer,
    M: ScoringModel,
    S: AsRef<str>,
{
    type Item = Result<Paragraphs<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let text = self.texts.next()?;
        Some(self.probs.next()?.map(|probs| {
            split_paragraphs(
                text.as_ref(),
                probs,
                self.paragraph_threshold,
                self.threshold,
                self.mode,
            )
        }))
    }
}
