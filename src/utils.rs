//! Utility functions for satsplit

use ndarray::{Array2, ArrayView2};

use crate::constants::NEWLINE_INDEX;
use crate::tokenizer::Token;

/// Sigmoid activation function
#[inline]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Integer division rounding up
#[inline]
pub fn ceil_div(x: usize, y: usize) -> usize {
    x.div_ceil(y)
}

/// `points` evenly spaced values over `[start, end]`
pub fn linspace(start: f32, end: f32, points: usize) -> Vec<f32> {
    match points {
        0 => vec![],
        1 => vec![start],
        _ => {
            let step = (end - start) / (points - 1) as f32;
            (0..points).map(|i| start + step * i as f32).collect()
        }
    }
}

/// Triangular weights peaking at 1.0 in the middle.
///
/// The sample points stop half a step short of ±1 so the edges keep a
/// small positive weight.
pub fn hat(points: usize) -> Vec<f32> {
    let x = 1.0 - 1.0 / points as f32;
    linspace(-x, x, points)
        .into_iter()
        .map(|v| 1.0 - v.abs())
        .collect()
}

/// Remove `' '` characters from text and track their positions
///
/// Positions are character indices into the original text, ascending.
///
/// # Returns
/// Tuple of (text without spaces, original positions of spaces)
pub fn remove_spaces(text: &str) -> (String, Vec<usize>) {
    let mut result = String::with_capacity(text.len());
    let mut space_positions = Vec::new();

    for (idx, c) in text.chars().enumerate() {
        if c == ' ' {
            space_positions.push(idx);
        } else {
            result.push(c);
        }
    }

    (result, space_positions)
}

/// Reinsert zero probabilities at the removed space positions.
///
/// The result is as long as the text before [`remove_spaces`] ran.
pub fn reinsert_space_probs(probs: &[f32], space_positions: &[usize]) -> Vec<f32> {
    let total = probs.len() + space_positions.len();
    let mut result = Vec::with_capacity(total);
    let mut src = probs.iter();
    let mut spaces = space_positions.iter().peekable();

    for idx in 0..total {
        if spaces.next_if_eq(&&idx).is_some() {
            result.push(0.0);
        } else if let Some(&p) = src.next() {
            result.push(p);
        }
    }

    result
}

/// Map token-level logits to character-level logits
///
/// Each token's row is written to the last character the token covers
/// (`max(end - 1, 0)`). Characters no token ends on stay at `-inf`.
///
/// # Arguments
/// * `text_len` - Length of the text in characters
/// * `tokens` - Tokens with character offsets
/// * `token_logits` - Averaged logits (shape: num_tokens x num_labels)
/// * `is_special` - Sentinel test; sentinel tokens carry no position
///
/// # Returns
/// Character-level logits (shape: text_len x num_labels)
pub fn token_to_char_probs(
    text_len: usize,
    tokens: &[Token],
    token_logits: ArrayView2<'_, f32>,
    is_special: impl Fn(u32) -> bool,
) -> Array2<f32> {
    let num_labels = token_logits.ncols();
    let mut char_probs = Array2::from_elem((text_len, num_labels), f32::NEG_INFINITY);

    for (token, logits) in tokens.iter().zip(token_logits.rows()) {
        if is_special(token.id) {
            continue;
        }
        let char_idx = token.offset.end.saturating_sub(1);
        if char_idx < text_len {
            char_probs.row_mut(char_idx).assign(&logits);
        }
    }

    char_probs
}

/// Sigmoid of the newline channel, one value per character
pub fn newline_probs(char_logits: ArrayView2<'_, f32>) -> Vec<f32> {
    if char_logits.ncols() <= NEWLINE_INDEX {
        return vec![0.0; char_logits.nrows()];
    }
    char_logits
        .column(NEWLINE_INDEX)
        .iter()
        .map(|&x| sigmoid(x))
        .collect()
}
