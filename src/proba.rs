//! Lazy per-character boundary probabilities
//!
//! Texts are processed in outer batches of `outer_batch_size`. An outer
//! batch is computed in full the first time one of its texts is requested,
//! so peak memory is bounded by the outer batch and a consumer that stops
//! early never pays for later batches.

use std::borrow::Cow;
use std::collections::VecDeque;

use crate::error::Error;
use crate::extract::{extract_sat, ExtractConfig};
use crate::model::ScoringModel;
use crate::tokenizer::Tokenizer;
use crate::utils::{newline_probs, reinsert_space_probs, remove_spaces, token_to_char_probs};
use crate::Result;

/// Probability array given to empty and whitespace-only texts
pub fn empty_probs() -> Vec<f32> {
    vec![f32::NEG_INFINITY]
}

/// Settings of the probability pipeline
#[derive(Debug, Clone)]
pub struct ProbaConfig {
    /// Windowing and batching
    pub extract: ExtractConfig,
    /// Strip `' '` before inference and restore afterwards
    pub remove_whitespace_before_inference: bool,
    /// Number of texts handled per outer batch
    pub outer_batch_size: usize,
}

/// Iterator over the probability arrays of a list of texts, in input order.
///
/// Yields `Err` once if inference for an outer batch fails, then ends.
pub struct ProbaIter<'a, T: ?Sized, M: ?Sized, S> {
    texts: &'a [S],
    model: &'a mut M,
    tokenizer: &'a T,
    config: ProbaConfig,
    next_text: usize,
    ready: VecDeque<Vec<f32>>,
    failed: bool,
}

impl<'a, T, M, S> ProbaIter<'a, T, M, S>
where
    T: Tokenizer + ?Sized,
    M: ScoringModel + ?Sized,
    S: AsRef<str>,
{
    /// Create the iterator; nothing is computed until the first `next`
    pub fn new(texts: &'a [S], model: &'a mut M, tokenizer: &'a T, config: ProbaConfig) -> Result<Self> {
        config.extract.validate()?;
        if config.outer_batch_size == 0 {
            return Err(Error::InvalidConfig(
                "outer batch size must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            texts,
            model,
            tokenizer,
            config,
            next_text: 0,
            ready: VecDeque::new(),
            failed: false,
        })
    }
}

impl<T, M, S> Iterator for ProbaIter<'_, T, M, S>
where
    T: Tokenizer + ?Sized,
    M: ScoringModel + ?Sized,
    S: AsRef<str>,
{
    type Item = Result<Vec<f32>>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(probs) = self.ready.pop_front() {
            return Some(Ok(probs));
        }
        if self.failed || self.next_text >= self.texts.len() {
            return None;
        }

        let start = self.next_text;
        let end = (start + self.config.outer_batch_size).min(self.texts.len());
        self.next_text = end;

        match predict_outer_batch(&self.texts[start..end], &mut *self.model, self.tokenizer, &self.config) {
            Ok(batch) => {
                self.ready.extend(batch);
                self.ready.pop_front().map(Ok)
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            return (0, Some(0));
        }
        let remaining = self.ready.len() + self.texts.len() - self.next_text;
        (0, Some(remaining))
    }
}

/// Probabilities for one outer batch of texts
fn predict_outer_batch<T, M, S>(
    texts: &[S],
    model: &mut M,
    tokenizer: &T,
    config: &ProbaConfig,
) -> Result<Vec<Vec<f32>>>
where
    T: Tokenizer + ?Sized,
    M: ScoringModel + ?Sized,
    S: AsRef<str>,
{
    // Remove spaces and record their positions for later restoration
    let (input_texts, space_positions): (Vec<Cow<'_, str>>, Vec<Vec<usize>>) =
        if config.remove_whitespace_before_inference {
            texts
                .iter()
                .map(|t| {
                    let (stripped, positions) = remove_spaces(t.as_ref());
                    (Cow::Owned(stripped), positions)
                })
                .unzip()
        } else {
            (
                texts.iter().map(|t| Cow::Borrowed(t.as_ref())).collect(),
                vec![vec![]; texts.len()],
            )
        };

    // Empty and whitespace-only texts never reach the model
    let non_empty: Vec<&str> = input_texts
        .iter()
        .map(|t| &**t)
        .filter(|t| !t.trim().is_empty())
        .collect();

    log::debug!(
        "Outer batch of {} texts, {} empty",
        texts.len(),
        texts.len() - non_empty.len()
    );

    let mut extracted = extract_sat(&non_empty, model, tokenizer, &config.extract)?.into_iter();

    let mut results = Vec::with_capacity(texts.len());
    for (text, positions) in input_texts.iter().zip(&space_positions) {
        if text.trim().is_empty() {
            results.push(empty_probs());
            continue;
        }

        let token_logits = extracted.next().ok_or_else(|| {
            Error::Inference("extraction returned fewer results than texts".to_string())
        })?;

        let char_logits = token_to_char_probs(
            text.chars().count(),
            &token_logits.tokens,
            token_logits.logits.view(),
            |id| tokenizer.is_special(id),
        );
        let probs = newline_probs(char_logits.view());

        if positions.is_empty() {
            results.push(probs);
        } else {
            results.push(reinsert_space_probs(&probs, positions));
        }
    }

    Ok(results)
}
