//! Core extraction logic for boundary prediction
//!
//! This module handles:
//! - Tokenizing texts and tiling them into overlapping windows
//! - Batch processing through the model
//! - Logit aggregation across overlapping windows

use half::f16;
use ndarray::{s, Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::constants::{MAX_BLOCK_SIZE, SENTINEL_COUNT};
use crate::error::Error;
use crate::model::ScoringModel;
use crate::tokenizer::{Token, Tokenizer};
use crate::utils::{ceil_div, hat};
use crate::Result;

/// Weighting scheme for aggregating overlapping window predictions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weighting {
    /// All positions weighted equally
    #[default]
    Uniform,
    /// Triangular (hat) weighting - higher weight in the center
    Hat,
}

/// Weight for every position of a window of `window_size` tokens
pub fn weights(weighting: Weighting, window_size: usize) -> Result<Vec<f32>> {
    if window_size == 0 {
        return Err(Error::InvalidConfig(
            "weighting window must hold at least one token".to_string(),
        ));
    }

    Ok(match weighting {
        Weighting::Uniform => vec![1.0; window_size],
        Weighting::Hat => hat(window_size),
    })
}

/// Configuration for extraction
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Maximum block size for windowing
    pub block_size: usize,
    /// Stride between consecutive windows
    pub stride: usize,
    /// Batch size for inference
    pub batch_size: usize,
    /// Whether to pad the last batch
    pub pad_last_batch: bool,
    /// Weighting scheme for overlapping predictions
    pub weighting: Weighting,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            block_size: 512,
            stride: 64,
            batch_size: 32,
            pad_last_batch: false,
            weighting: Weighting::Uniform,
        }
    }
}

impl ExtractConfig {
    /// Reject settings the windowing cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.stride == 0 {
            return Err(Error::InvalidConfig("stride must be at least 1".to_string()));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch size must be at least 1".to_string()));
        }
        if self.block_size == 0 {
            return Err(Error::InvalidConfig("block size must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Position of one window in its source token sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WindowLoc {
    /// Index of the source text
    pub text_idx: usize,
    /// First token of the window
    pub start: usize,
    /// One past the last token of the window
    pub end: usize,
}

impl WindowLoc {
    /// Number of source tokens in the window
    pub fn len(&self) -> usize {
        self.end - self.start
    }
}

/// All windows of an extraction, framed with BOS/EOS
pub(crate) struct Windows {
    /// Token ids (num_windows x block_size + 2), pad id past EOS
    pub input_ids: Array2<i64>,
    /// 1 from BOS through EOS, 0 elsewhere
    pub attention_mask: Array2<f16>,
    /// Source location of each row
    pub locs: Vec<WindowLoc>,
    /// Tokens per window, excluding sentinels
    pub block_size: usize,
}

impl Windows {
    /// Number of windows
    pub fn len(&self) -> usize {
        self.locs.len()
    }

    /// Row width including the two sentinels
    pub fn width(&self) -> usize {
        self.block_size + SENTINEL_COUNT
    }
}

/// Block size actually used for a set of texts.
///
/// Capped by the requested size, the longest text, and [`MAX_BLOCK_SIZE`],
/// then rounded up to a multiple of the downsampling rate.
pub fn effective_block_size(max_block_size: usize, longest: usize, downsampling_rate: usize) -> usize {
    let block_size = MAX_BLOCK_SIZE.min(max_block_size.min(longest)).max(1);
    ceil_div(block_size, downsampling_rate) * downsampling_rate
}

/// Exact number of windows [`build_windows`] emits
pub(crate) fn count_windows(lengths: &[usize], block_size: usize, stride: usize) -> usize {
    lengths
        .iter()
        .map(|&len| ceil_div(len.saturating_sub(block_size), stride) + 1)
        .sum()
}

/// Tile every token sequence into windows of at most `block_size` tokens,
/// advancing by `stride`.
///
/// The last window of a text is shifted left to end exactly on the last
/// token, so the tail is always scored as one full block.
pub(crate) fn build_windows(
    token_ids: &[Vec<u32>],
    block_size: usize,
    stride: usize,
    bos_id: u32,
    eos_id: u32,
    pad_id: u32,
) -> Windows {
    let lengths: Vec<usize> = token_ids.iter().map(Vec::len).collect();
    let num_windows = count_windows(&lengths, block_size, stride);

    let width = block_size + SENTINEL_COUNT;
    let mut input_ids = Array2::<i64>::from_elem((num_windows, width), pad_id as i64);
    let mut attention_mask = Array2::<f16>::from_elem((num_windows, width), f16::ZERO);
    let mut locs = Vec::with_capacity(num_windows);

    let mut current = 0;
    for (text_idx, tokens) in token_ids.iter().enumerate() {
        let text_len = tokens.len();
        let mut j = 0;

        loop {
            let mut start = j;
            let mut end = j + block_size;
            let done = end >= text_len;

            // If this window reaches the end, shift it left to cover the tail
            if done {
                end = text_len;
                start = end.saturating_sub(block_size);
            }

            let window = &tokens[start..end];
            let mut row = input_ids.row_mut(current);
            row[0] = bos_id as i64;
            for (slot, &tok) in row.iter_mut().skip(1).zip(window) {
                *slot = tok as i64;
            }
            row[window.len() + 1] = eos_id as i64;

            attention_mask
                .slice_mut(s![current, ..window.len() + SENTINEL_COUNT])
                .fill(f16::ONE);

            locs.push(WindowLoc {
                text_idx,
                start,
                end,
            });
            current += 1;

            if done {
                break;
            }
            j += stride;
        }
    }

    debug_assert_eq!(current, num_windows);

    Windows {
        input_ids,
        attention_mask,
        locs,
        block_size,
    }
}

/// Weighted running sums of window logits for one text
#[derive(Debug, Clone)]
pub(crate) struct Accumulator {
    logit_sum: Array2<f32>,
    weight_sum: Array1<f32>,
}

impl Accumulator {
    /// Zeroed accumulator for `num_tokens` tokens
    pub fn new(num_tokens: usize, num_labels: usize) -> Self {
        Self {
            logit_sum: Array2::zeros((num_tokens, num_labels)),
            weight_sum: Array1::zeros(num_tokens),
        }
    }

    /// Add one window's logits (rows already stripped of sentinels), starting
    /// at token `start`
    pub fn add(&mut self, start: usize, weights: &[f32], logits: ArrayView2<'_, f32>) {
        for (j, (&weight, row)) in weights.iter().zip(logits.rows()).enumerate() {
            self.logit_sum.row_mut(start + j).scaled_add(weight, &row);
            self.weight_sum[start + j] += weight;
        }
    }

    /// Total weight each token received
    #[cfg(test)]
    pub fn weight_sum(&self) -> &Array1<f32> {
        &self.weight_sum
    }

    /// Divide the sums by the weights, giving averaged logits
    pub fn finalize(self) -> Array2<f32> {
        let Self {
            mut logit_sum,
            weight_sum,
        } = self;

        for (mut row, &total) in logit_sum.rows_mut().into_iter().zip(weight_sum.iter()) {
            if total > 0.0 {
                row /= total;
            }
        }
        logit_sum
    }
}

/// Run every window through the model and scatter the outputs into the
/// per-text accumulators
pub(crate) fn run_batches<M: ScoringModel + ?Sized>(
    model: &mut M,
    windows: &Windows,
    config: &ExtractConfig,
    pad_id: u32,
    weights: &[f32],
    accumulators: &mut [Accumulator],
) -> Result<()> {
    let num_windows = windows.len();
    let width = windows.width();
    let num_labels = model.num_labels();
    let n_batches = ceil_div(num_windows, config.batch_size);
    // A batch never holds more rows than there are windows
    let batch_rows = config.batch_size.min(num_windows);

    for (batch_idx, start) in (0..num_windows).step_by(config.batch_size).enumerate() {
        let end = start.saturating_add(config.batch_size).min(num_windows);
        let size = end - start;

        let real_ids = windows.input_ids.slice(s![start..end, ..]);
        let real_mask = windows.attention_mask.slice(s![start..end, ..]);

        // Pad last batch if necessary
        let batch_logits = if config.pad_last_batch && size < batch_rows {
            let mut batch_ids = Array2::<i64>::from_elem((batch_rows, width), pad_id as i64);
            let mut batch_mask = Array2::<f16>::from_elem((batch_rows, width), f16::ZERO);
            batch_ids.slice_mut(s![..size, ..]).assign(&real_ids);
            batch_mask.slice_mut(s![..size, ..]).assign(&real_mask);

            log::trace!(
                "Batch {}/{}: {} windows, {} padding rows",
                batch_idx + 1,
                n_batches,
                size,
                batch_rows - size
            );
            model.infer(batch_ids.view(), batch_mask.view())?
        } else {
            log::trace!("Batch {}/{}: {} windows", batch_idx + 1, n_batches, size);
            model.infer(real_ids, real_mask)?
        };

        let shape = batch_logits.shape();
        if shape[0] < size || shape[1] != width || shape[2] != num_labels {
            return Err(Error::InvalidConfig(format!(
                "model returned logits of shape {:?}, expected [{}, {}, {}]",
                shape, size, width, num_labels
            )));
        }

        // Remove BOS and EOS predictions (first and last)
        let batch_logits = batch_logits.slice(s![..size, 1..-1, ..]);

        for (i, loc) in windows.locs[start..end].iter().enumerate() {
            let n = loc.len();
            accumulators[loc.text_idx].add(
                loc.start,
                &weights[..n],
                batch_logits.slice(s![i, ..n, ..]),
            );
        }
    }

    Ok(())
}

/// Averaged token logits for one text, with the tokens they belong to
#[derive(Debug, Clone)]
pub struct TokenLogits {
    /// Averaged logits (num_tokens x num_labels)
    pub logits: Array2<f32>,
    /// Tokens of the text
    pub tokens: Vec<Token>,
}

/// Extract averaged token logits for a batch of texts
///
/// This function:
/// 1. Tokenizes the texts
/// 2. Tiles them into overlapping windows
/// 3. Runs inference batch by batch
/// 4. Averages overlapping predictions per token
pub fn extract_sat<T, M>(
    texts: &[&str],
    model: &mut M,
    tokenizer: &T,
    config: &ExtractConfig,
) -> Result<Vec<TokenLogits>>
where
    T: Tokenizer + ?Sized,
    M: ScoringModel + ?Sized,
{
    config.validate()?;
    if texts.is_empty() {
        return Ok(vec![]);
    }

    let downsampling_rate = model.downsampling_rate();
    if downsampling_rate == 0 {
        return Err(Error::InvalidConfig(
            "model downsampling rate must be at least 1".to_string(),
        ));
    }

    let all_tokens: Vec<Vec<Token>> = texts
        .iter()
        .map(|text| tokenizer.encode(text))
        .collect::<Result<_>>()?;
    let token_ids: Vec<Vec<u32>> = all_tokens
        .iter()
        .map(|tokens| tokens.iter().map(|t| t.id).collect())
        .collect();

    let longest = token_ids.iter().map(Vec::len).max().unwrap_or(0);
    let block_size = effective_block_size(config.block_size, longest, downsampling_rate);

    if block_size + SENTINEL_COUNT > model.max_context() {
        return Err(Error::InvalidConfig(format!(
            "block size {} (+{} sentinels) exceeds the model's maximum context of {}",
            block_size,
            SENTINEL_COUNT,
            model.max_context()
        )));
    }
    if config.stride > block_size && longest > block_size {
        return Err(Error::InvalidConfig(format!(
            "stride {} exceeds block size {}; windows would leave tokens unscored",
            config.stride, block_size
        )));
    }

    let windows = build_windows(
        &token_ids,
        block_size,
        config.stride,
        tokenizer.bos_id(),
        tokenizer.eos_id(),
        tokenizer.pad_id(),
    );

    log::debug!(
        "Extracting {} texts: block size {}, {} windows, {} batches",
        texts.len(),
        block_size,
        windows.len(),
        ceil_div(windows.len(), config.batch_size)
    );

    let weights = weights(config.weighting, block_size)?;
    let num_labels = model.num_labels();
    let mut accumulators: Vec<Accumulator> = token_ids
        .iter()
        .map(|ids| Accumulator::new(ids.len(), num_labels))
        .collect();

    run_batches(
        model,
        &windows,
        config,
        tokenizer.pad_id(),
        &weights,
        &mut accumulators,
    )?;

    Ok(accumulators
        .into_iter()
        .zip(all_tokens)
        .map(|(acc, tokens)| TokenLogits {
            logits: acc.finalize(),
            tokens,
        })
        .collect())
}
