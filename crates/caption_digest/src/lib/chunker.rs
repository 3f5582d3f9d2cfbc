use std::num::NonZeroUsize;

use crate::types::Chunk;

/// Splits `text` greedily into chunks of exactly `max_chunk_chars` characters
/// (the last one may be shorter). Never splits inside a code point.
///
/// Concatenating the chunk texts in index order gives back `text`.
pub fn split(text: &str, max_chunk_chars: NonZeroUsize) -> Vec<Chunk> {
    let max = max_chunk_chars.get();
    let mut chunks = Vec::with_capacity(text.len().div_ceil(max).min(1024));

    let mut start_byte = 0;
    let mut start_char = 0;
    let mut chars_in_chunk = 0;

    for (byte_idx, _) in text.char_indices() {
        if chars_in_chunk == max {
            chunks.push(Chunk {
                index: chunks.len(),
                offset: start_char,
                text: text[start_byte..byte_idx].to_string(),
            });
            start_byte = byte_idx;
            start_char += chars_in_chunk;
            chars_in_chunk = 0;
        }
        chars_in_chunk += 1;
    }

    if chars_in_chunk > 0 {
        chunks.push(Chunk {
            index: chunks.len(),
            offset: start_char,
            text: text[start_byte..].to_string(),
        });
    }

    chunks
}
