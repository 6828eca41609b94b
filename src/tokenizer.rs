//! Tokenizer capability used by the extraction pipeline
//!
//! The pipeline only needs token ids, character offsets, and the three
//! sentinel ids. Any subword or byte-level tokenizer can provide those.

use std::path::Path;

use crate::constants::{XLMR_BOS_ID, XLMR_EOS_ID, XLMR_PAD_ID};
use crate::Result;

/// Half-open character range `[start, end)` of a token in its source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Offset {
    /// Inclusive start character index
    pub start: usize,
    /// Exclusive end character index
    pub end: usize,
}

impl Offset {
    /// Creates a new offset
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// A single token with its id and character offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    /// Vocabulary id
    pub id: u32,
    /// Character range in the encoded text
    pub offset: Offset,
}

impl Token {
    /// Creates a new token
    pub fn new(id: u32, start: usize, end: usize) -> Self {
        Self {
            id,
            offset: Offset::new(start, end),
        }
    }
}

/// Maps text to tokens carrying character offsets.
///
/// Implementations must be deterministic: the same text always encodes to
/// the same tokens. Offsets are measured in `char`s, not bytes.
pub trait Tokenizer {
    /// Beginning-of-sequence id
    fn bos_id(&self) -> u32;

    /// End-of-sequence id
    fn eos_id(&self) -> u32;

    /// Padding id
    fn pad_id(&self) -> u32;

    /// Encode `text` without adding special tokens
    fn encode(&self, text: &str) -> Result<Vec<Token>>;

    /// Whether `id` is one of the sentinel ids
    fn is_special(&self, id: u32) -> bool {
        id == self.bos_id() || id == self.eos_id() || id == self.pad_id()
    }
}

impl<T: Tokenizer + ?Sized> Tokenizer for &T {
    fn bos_id(&self) -> u32 {
        (**self).bos_id()
    }

    fn eos_id(&self) -> u32 {
        (**self).eos_id()
    }

    fn pad_id(&self) -> u32 {
        (**self).pad_id()
    }

    fn encode(&self, text: &str) -> Result<Vec<Token>> {
        (**self).encode(text)
    }
}

/// HuggingFace `tokenizers` backend (XLM-RoBERTa `tokenizer.json`)
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
    bos_id: u32,
    eos_id: u32,
    pad_id: u32,
}

impl HfTokenizer {
    /// Wrap an already loaded tokenizer.
    ///
    /// Sentinel ids are looked up by their XLM-RoBERTa surface forms and fall
    /// back to the XLM-RoBERTa ids when the vocabulary lacks them.
    pub fn new(inner: tokenizers::Tokenizer) -> Self {
        let bos_id = inner.token_to_id("<s>").unwrap_or(XLMR_BOS_ID);
        let eos_id = inner.token_to_id("</s>").unwrap_or(XLMR_EOS_ID);
        let pad_id = inner.token_to_id("<pad>").unwrap_or(XLMR_PAD_ID);
        Self {
            inner,
            bos_id,
            eos_id,
            pad_id,
        }
    }

    /// Load a `tokenizer.json` file
    pub fn from_file(path: &Path) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_file(path)?;
        Ok(Self::new(inner))
    }

    /// Access the wrapped tokenizer
    pub fn inner(&self) -> &tokenizers::Tokenizer {
        &self.inner
    }
}

impl Tokenizer for HfTokenizer {
    fn bos_id(&self) -> u32 {
        self.bos_id
    }

    fn eos_id(&self) -> u32 {
        self.eos_id
    }

    fn pad_id(&self) -> u32 {
        self.pad_id
    }

    fn encode(&self, text: &str) -> Result<Vec<Token>> {
        let encoding = self.inner.encode(text, false)?;
        let byte_to_char = byte_to_char_table(text);

        let tokens = encoding
            .get_ids()
            .iter()
            .zip(encoding.get_offsets())
            .map(|(&id, &(start, end))| {
                let start = byte_to_char[start.min(text.len())];
                let end = byte_to_char[end.min(text.len())];
                Token::new(id, start, end)
            })
            .collect();

        Ok(tokens)
    }
}

/// Character index for every byte position of `text`, plus one entry for
/// the end of the string. Bytes inside a multi-byte character map to that
/// character.
fn byte_to_char_table(text: &str) -> Vec<usize> {
    let mut table = vec![0; text.len() + 1];
    let mut char_count = 0;

    for (char_idx, (byte_idx, ch)) in text.char_indices().enumerate() {
        for slot in &mut table[byte_idx..byte_idx + ch.len_utf8()] {
            *slot = char_idx;
        }
        char_count = char_idx + 1;
    }
    table[text.len()] = char_count;

    table
}
