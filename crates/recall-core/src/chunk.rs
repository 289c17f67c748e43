//! Overlapping sliding-window text chunker.
//!
//! Splits document text into windows of at most `chunk_size` characters
//! where consecutive windows share exactly `chunk_overlap` trailing/leading
//! characters (the final window may be shorter). Sizes are measured in
//! Unicode scalar values, not bytes.
//!
//! # Algorithm
//!
//! 1. Take a window of `chunk_size` characters from the current start.
//! 2. If the window does not end the text, look back up to
//!    [`BOUNDARY_LOOKBACK`] characters for a whitespace boundary so words
//!    are not split mid-token. A boundary is only taken if the next window
//!    still advances past the previous overlap (progress guarantee —
//!    pathological single-token input falls back to a hard cut).
//! 3. Emit the window; the next window starts `chunk_overlap` characters
//!    before the cut.
//!
//! Concatenating the first chunk with every later chunk minus its leading
//! `chunk_overlap` characters reconstructs the original text exactly.

use crate::error::{Error, Result};

/// How far back (in characters) to search for a whitespace boundary
/// before falling back to a hard cut.
const BOUNDARY_LOOKBACK: usize = 24;

/// Split `text` into overlapping chunk texts.
///
/// Returns an empty vector for empty input. Fails with
/// [`Error::InvalidConfig`] when `chunk_overlap >= chunk_size`.
///
/// # Guarantees
///
/// - Every chunk is at most `chunk_size` characters.
/// - Consecutive chunks share exactly `chunk_overlap` characters, except
///   that the final chunk may be shorter than `chunk_size`.
/// - Every chunk is strictly longer than `chunk_overlap` characters, so
///   the loop always makes progress.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<String>> {
    if chunk_size == 0 {
        return Err(Error::InvalidConfig("chunk_size must be > 0".to_string()));
    }
    if chunk_overlap >= chunk_size {
        return Err(Error::InvalidConfig(format!(
            "chunk_overlap ({}) must be smaller than chunk_size ({})",
            chunk_overlap, chunk_size
        )));
    }
    if text.is_empty() {
        return Ok(Vec::new());
    }

    // Byte offset of every character, plus a sentinel for the end, so the
    // window arithmetic runs in characters while slicing stays byte-exact.
    let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    offsets.push(text.len());
    let total_chars = offsets.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let hard_end = (start + chunk_size).min(total_chars);
        let mut end = hard_end;

        if hard_end < total_chars {
            // The earliest cut that still advances the next window past
            // the previous overlap.
            let floor = start + chunk_overlap + 1;
            let lookback_floor = hard_end.saturating_sub(BOUNDARY_LOOKBACK).max(floor);
            for candidate in (lookback_floor..=hard_end).rev() {
                if char_at(text, &offsets, candidate - 1).is_whitespace() {
                    end = candidate;
                    break;
                }
            }
        }

        chunks.push(text[offsets[start]..offsets[end]].to_string());

        if end == total_chars {
            break;
        }
        start = end - chunk_overlap;
    }

    Ok(chunks)
}

fn char_at(text: &str, offsets: &[usize], index: usize) -> char {
    text[offsets[index]..].chars().next().unwrap_or('\0')
}
