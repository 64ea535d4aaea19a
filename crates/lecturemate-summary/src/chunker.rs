//! Token-aligned chunk planning.
//!
//! Chunks are sized so that a chunk plus its expected summary fit the token
//! budget together: `max = floor(budget / (1 + ratio))`.

use crate::error::{Result, SummaryError};

/// A contiguous token range of the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// 0-based position in the plan.
    pub index: usize,
    /// First token (inclusive).
    pub start: usize,
    /// Last token (exclusive).
    pub end: usize,
    /// Word count the summary of this chunk should aim for.
    pub target_words: usize,
}

impl Chunk {
    /// Number of tokens in the chunk.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the chunk covers no tokens.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether this is the first chunk of the plan.
    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    /// The token range as a slice range.
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

fn check_ratio(ratio: f64) -> Result<()> {
    if ratio > 0.0 && ratio <= 1.0 {
        Ok(())
    } else {
        Err(SummaryError::InvalidConfig(format!(
            "compression ratio {} outside (0, 1]",
            ratio
        )))
    }
}

/// Largest chunk that leaves room for its own summary inside `budget`.
pub fn max_chunk_size(budget: usize, ratio: f64) -> Result<usize> {
    check_ratio(ratio)?;
    let size = (budget as f64 / (1.0 + ratio)).floor() as usize;
    if size == 0 {
        return Err(SummaryError::InvalidConfig(format!(
            "token budget {} too small for any chunk",
            budget
        )));
    }
    Ok(size)
}

/// Summary word target for a chunk of `tokens` tokens.
pub fn target_words(tokens: usize, ratio: f64) -> usize {
    // ratio is validated to (0, 1], so the result stays within [0, tokens]
    ((tokens as f64) * ratio).round() as usize
}

/// Partition `total_tokens` into ordered, non-overlapping chunks of at most
/// `max_size` tokens.
///
/// Produces `ceil(total / max)` chunks; an empty input yields an empty plan.
pub fn plan_chunks(total_tokens: usize, max_size: usize, ratio: f64) -> Result<Vec<Chunk>> {
    check_ratio(ratio)?;
    if max_size == 0 {
        return Err(SummaryError::InvalidConfig("chunk size must be positive".into()));
    }

    let count = total_tokens.div_ceil(max_size);
    let chunks = (0..count)
        .map(|index| {
            let start = index * max_size;
            let end = (start + max_size).min(total_tokens);
            Chunk {
                index,
                start,
                end,
                target_words: target_words(end - start, ratio),
            }
        })
        .collect();

    Ok(chunks)
}

/// Split text into slices of at most `size` characters, on char boundaries.
///
/// Used by recursive reduction, which sizes its input by characters.
pub fn split_chars(text: &str, size: usize) -> Vec<&str> {
    if size == 0 || text.is_empty() {
        return if text.is_empty() { Vec::new() } else { vec![text] };
    }

    let mut parts = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (offset, _) in text.char_indices() {
        if count == size {
            parts.push(&text[start..offset]);
            start = offset;
            count = 0;
        }
        count += 1;
    }
    parts.push(&text[start..]);
    parts
}
