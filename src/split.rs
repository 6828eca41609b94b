//! Threshold-driven segmentation of text by per-character probabilities
//!
//! A boundary is placed after every character whose probability is strictly
//! greater than the threshold. Whitespace following a boundary stays with
//! the segment it ends, so segments concatenate back to the input.
//!
//! All iterators here borrow the text and yield `&str` slices of it.
//! Probabilities are shared through an `Arc` so paragraphs can hand their
//! sentences a view without copying.

use std::sync::Arc;

/// Extent of one segment, in characters and in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Characters consumed
    pub chars: usize,
    /// Bytes consumed
    pub bytes: usize,
}

/// Length of the next segment of `text`.
///
/// `probs[i]` belongs to the `i`-th character of `text`; characters without
/// a probability never end a segment. Without a boundary the segment runs
/// to the end of the text.
pub fn next_boundary(text: &str, probs: &[f32], threshold: f32) -> Span {
    let mut chars = text.char_indices().enumerate().peekable();
    let mut seen = 0;

    while let Some((idx, _)) = chars.next() {
        seen = idx + 1;
        if !probs.get(idx).is_some_and(|&p| p > threshold) {
            continue;
        }

        // Trailing whitespace belongs to the segment it follows
        while let Some((idx, _)) = chars.next_if(|(_, (_, c))| c.is_whitespace()) {
            seen = idx + 1;
        }

        return match chars.peek() {
            Some(&(idx, (byte, _))) => Span { chars: idx, bytes: byte },
            None => Span {
                chars: seen,
                bytes: text.len(),
            },
        };
    }

    Span {
        chars: seen,
        bytes: text.len(),
    }
}

/// How sentence pieces are post-processed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitMode {
    /// Trim each sentence and drop the ones left empty
    pub strip_whitespace: bool,
    /// Also split at every `'\n'` in the input
    pub split_on_input_newlines: bool,
}

impl Default for SplitMode {
    fn default() -> Self {
        Self {
            strip_whitespace: false,
            split_on_input_newlines: true,
        }
    }
}

/// Raw segments of a text at one threshold
#[derive(Debug, Clone)]
pub struct Segments<'a> {
    text: &'a str,
    probs: Arc<[f32]>,
    offset: usize,
    threshold: f32,
    byte_pos: usize,
    char_pos: usize,
}

impl<'a> Segments<'a> {
    /// Segment `text`; `probs[offset..]` lines up with its characters.
    pub fn new(text: &'a str, probs: Arc<[f32]>, offset: usize, threshold: f32) -> Self {
        Self {
            text,
            probs,
            offset,
            threshold,
            byte_pos: 0,
            char_pos: 0,
        }
    }

    /// Segments of a whole input text. Whitespace-only input has none.
    fn of_input(text: &'a str, probs: Arc<[f32]>, threshold: f32) -> Self {
        let mut segments = Self::new(text, probs, 0, threshold);
        if text.trim().is_empty() {
            segments.byte_pos = text.len();
        }
        segments
    }

    /// Character offset of the next segment within the text
    pub fn char_pos(&self) -> usize {
        self.char_pos
    }
}

impl<'a> Iterator for Segments<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.byte_pos >= self.text.len() {
            return None;
        }

        let rest = &self.text[self.byte_pos..];
        let probs = self.probs.get(self.offset + self.char_pos..).unwrap_or(&[]);
        let span = next_boundary(rest, probs, self.threshold);

        self.byte_pos += span.bytes;
        self.char_pos += span.chars;
        Some(&rest[..span.bytes])
    }
}

/// Sentences of a text, after newline splitting and trimming
#[derive(Debug, Clone)]
pub struct Sentences<'a> {
    segments: Segments<'a>,
    lines: Option<std::str::Split<'a, char>>,
    mode: SplitMode,
}

impl<'a> Sentences<'a> {
    fn from_segments(segments: Segments<'a>, mode: SplitMode) -> Self {
        Self {
            segments,
            lines: None,
            mode,
        }
    }
}

impl<'a> Iterator for Sentences<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        loop {
            let piece = match self.lines.as_mut().map(Iterator::next) {
                Some(Some(line)) => line,
                Some(None) => {
                    self.lines = None;
                    continue;
                }
                None => {
                    let segment = self.segments.next()?;
                    if self.mode.split_on_input_newlines {
                        self.lines = Some(segment.split('\n'));
                        continue;
                    }
                    segment
                }
            };

            if self.mode.split_on_input_newlines && piece.is_empty() {
                continue;
            }

            let piece = if self.mode.strip_whitespace {
                piece.trim()
            } else {
                piece
            };
            if piece.is_empty() {
                continue;
            }

            return Some(piece);
        }
    }
}

/// Paragraphs of a text, each a lazy sequence of sentences
#[derive(Debug, Clone)]
pub struct Paragraphs<'a> {
    segments: Segments<'a>,
    sentence_threshold: f32,
    mode: SplitMode,
}

impl<'a> Iterator for Paragraphs<'a> {
    type Item = Sentences<'a>;

    fn next(&mut self) -> Option<Sentences<'a>> {
        let start = self.segments.char_pos();
        let paragraph = self.segments.next()?;

        let sentences = Segments::new(
            paragraph,
            Arc::clone(&self.segments.probs),
            self.segments.offset + start,
            self.sentence_threshold,
        );
        Some(Sentences::from_segments(sentences, self.mode))
    }
}

/// Split `text` into sentences at `threshold`
pub fn split_sentences(
    text: &str,
    probs: impl Into<Arc<[f32]>>,
    threshold: f32,
    mode: SplitMode,
) -> Sentences<'_> {
    Sentences::from_segments(Segments::of_input(text, probs.into(), threshold), mode)
}

/// Split `text` into paragraphs at `paragraph_threshold`, then each
/// paragraph into sentences at `sentence_threshold`
pub fn split_paragraphs(
    text: &str,
    probs: impl Into<Arc<[f32]>>,
    paragraph_threshold: f32,
    sentence_threshold: f32,
    mode: SplitMode,
) -> Paragraphs<'_> {
    Paragraphs {
        segments: Segments::of_input(text, probs.into(), paragraph_threshold),
        sentence_threshold,
        mode,
    }
}
