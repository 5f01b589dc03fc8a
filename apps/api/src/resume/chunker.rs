//! Fixed-size character windows with overlap.
//!
//! Positions are counted in `char`s, so a window never splits a UTF-8 sequence.
//! Consecutive windows share exactly `overlap` characters and the union of all
//! windows covers the whole input.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

pub const DEFAULT_CHUNK_SIZE: usize = 100;
pub const DEFAULT_OVERLAP: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkParams {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl ChunkParams {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, AppError> {
        let params = Self {
            chunk_size,
            overlap,
        };
        params.validate()?;
        Ok(params)
    }

    /// A window must advance by at least one character, so `overlap < chunk_size`.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.chunk_size == 0 {
            return Err(AppError::Validation(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(AppError::Validation(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    pub chunk_index: usize,
    /// Inclusive start, in chars.
    pub start_pos: usize,
    /// Exclusive end, in chars.
    pub end_pos: usize,
    pub text: String,
    /// Characters shared with the previous chunk. Zero for the first one.
    pub overlap_chars: usize,
}

impl TextChunk {
    pub fn char_len(&self) -> usize {
        self.end_pos - self.start_pos
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkStatistics {
    pub total_chunks: usize,
    pub min_chunk_size: usize,
    pub max_chunk_size: usize,
    pub avg_chunk_size: f64,
    pub total_characters: usize,
    pub overlap_chars: usize,
}

/// Splits `text` into overlapping windows. Callers validate `params` first;
/// invalid params are rejected here as well rather than looping forever.
pub fn chunk_text(text: &str, params: ChunkParams) -> Result<Vec<TextChunk>, AppError> {
    params.validate()?;

    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    if len == 0 {
        return Ok(Vec::new());
    }

    if len <= params.chunk_size {
        return Ok(vec![TextChunk {
            chunk_index: 0,
            start_pos: 0,
            end_pos: len,
            text: text.to_string(),
            overlap_chars: 0,
        }]);
    }

    let mut chunks = Vec::with_capacity(len / (params.chunk_size - params.overlap) + 1);
    let mut start = 0;

    loop {
        let end = (start + params.chunk_size).min(len);
        let chunk_index = chunks.len();

        chunks.push(TextChunk {
            chunk_index,
            start_pos: start,
            end_pos: end,
            text: chars[start..end].iter().collect(),
            overlap_chars: if chunk_index == 0 { 0 } else { params.overlap },
        });

        if end >= len {
            break;
        }
        start = end - params.overlap;
    }

    Ok(chunks)
}

pub fn chunk_statistics(chunks: &[TextChunk]) -> ChunkStatistics {
    if chunks.is_empty() {
        return ChunkStatistics {
            total_chunks: 0,
            min_chunk_size: 0,
            max_chunk_size: 0,
            avg_chunk_size: 0.0,
            total_characters: 0,
            overlap_chars: 0,
        };
    }

    let sizes: Vec<usize> = chunks.iter().map(TextChunk::char_len).collect();
    let total: usize = sizes.iter().sum();

    ChunkStatistics {
        total_chunks: chunks.len(),
        min_chunk_size: sizes.iter().copied().min().unwrap_or(0),
        max_chunk_size: sizes.iter().copied().max().unwrap_or(0),
        avg_chunk_size: total as f64 / chunks.len() as f64,
        total_characters: total,
        overlap_chars: chunks.get(1).map(|c| c.overlap_chars).unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(chunk_size: usize, overlap: usize) -> ChunkParams {
        ChunkParams::new(chunk_size, overlap).unwrap()
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks = chunk_text("Rust engineer", params(100, 10)).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Rust engineer");
        assert_eq!(chunks[0].overlap_chars, 0);
        assert_eq!(chunks[0].end_pos, 13);
    }

    #[test]
    fn test_text_exactly_chunk_size_is_single_chunk() {
        let text = "a".repeat(100);
        let chunks = chunk_text(&text, params(100, 10)).unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(chunk_text("", params(100, 10)).unwrap().is_empty());
    }

    #[test]
    fn test_windows_advance_by_size_minus_overlap() {
        // 25 chars, size 10, overlap 3 → starts at 0, 7, 14, 21
        let text: String = ('a'..='y').collect();
        let chunks = chunk_text(&text, params(10, 3)).unwrap();

        let bounds: Vec<(usize, usize)> = chunks.iter().map(|c| (c.start_pos, c.end_pos)).collect();
        assert_eq!(bounds, vec![(0, 10), (7, 17), (14, 24), (21, 25)]);
        assert_eq!(chunks[0].text, "abcdefghij");
        assert_eq!(chunks[1].text, "hijklmnopq");
        assert_eq!(chunks[3].text, "vwxy");
    }

    #[test]
    fn test_consecutive_chunks_share_overlap() {
        let text = "Senior engineer with ten years of distributed systems experience in Rust and Go.";
        let chunks = chunk_text(text, params(20, 5)).unwrap();

        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].text.chars().collect();
            let prev_tail: String = prev[prev.len() - 5..].iter().collect();
            let next_head: String = pair[1].text.chars().take(5).collect();
            assert_eq!(prev_tail, next_head);
            assert_eq!(pair[1].overlap_chars, 5);
        }
        assert_eq!(chunks[0].overlap_chars, 0);
    }

    #[test]
    fn test_chunks_cover_entire_text() {
        let text = "Education: B.Sc. Computer Science. Skills: Rust, Python, SQL, Kubernetes.";
        let chunks = chunk_text(text, params(16, 4)).unwrap();

        let mut rebuilt = chunks[0].text.clone();
        for chunk in &chunks[1..] {
            rebuilt.extend(chunk.text.chars().skip(chunk.overlap_chars));
        }
        assert_eq!(rebuilt, text);
        assert_eq!(chunks.last().unwrap().end_pos, text.chars().count());
    }

    #[test]
    fn test_multibyte_text_is_split_on_char_boundaries() {
        let text = "Zürich — Müller — Café — naïve résumé ✓✓✓";
        let chunks = chunk_text(text, params(7, 2)).unwrap();
        for chunk in &chunks {
            assert_eq!(chunk.text.chars().count(), chunk.char_len());
            assert!(chunk.char_len() <= 7);
        }
    }

    #[test]
    fn test_zero_overlap_partitions_text() {
        let chunks = chunk_text("abcdefghij", params(4, 0)).unwrap();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_overlap_not_smaller_than_size_rejected() {
        assert!(ChunkParams::new(10, 10).is_err());
        assert!(ChunkParams::new(10, 12).is_err());
        assert!(ChunkParams::new(0, 0).is_err());
        let bad = ChunkParams {
            chunk_size: 5,
            overlap: 5,
        };
        assert!(chunk_text("some text that is long", bad).is_err());
    }

    #[test]
    fn test_statistics() {
        let chunks = chunk_text(&"x".repeat(25), params(10, 2)).unwrap();
        // starts 0, 8, 16 → sizes 10, 10, 9
        let stats = chunk_statistics(&chunks);
        assert_eq!(stats.total_chunks, 3);
        assert_eq!(stats.min_chunk_size, 9);
        assert_eq!(stats.max_chunk_size, 10);
        assert_eq!(stats.total_characters, 29);
        assert_eq!(stats.overlap_chars, 2);
        assert!((stats.avg_chunk_size - 29.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_statistics_empty() {
        assert_eq!(chunk_statistics(&[]).total_chunks, 0);
    }
}
