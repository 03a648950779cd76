// Sliding-window text splitting for embedding
// Chunks are windows over character positions, not bytes, so multi-byte
// text never splits inside a code point. No tokenizer or sentence awareness.


/// Split `text` into overlapping windows of at most `chunk_size` characters.
///
/// Each window after the first starts `overlap` characters before the end of
/// the previous one. Empty input yields no chunks. Overlap must be smaller
/// than the chunk size; config validation enforces that before this is
/// reached, and the window still advances if handed bad values directly.
#[inline]
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    debug_assert!(
        chunk_size > overlap,
        "chunk overlap must be smaller than chunk size"
    );

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < total {
        let end = usize::min(start + chunk_size, total);
        chunks.push(chars[start..end].iter().collect());
        if end >= total {
            break;
        }
        let next = end.saturating_sub(overlap);
        // Termination guard for overlap >= chunk_size: drop the overlap
        // rather than loop forever on a non-advancing window.
        start = if next > start { next } else { end };
    }

    chunks
}
