//! Fixed-window text chunking for retrieval.
//!
//! Documents are cut into windows of at most `window` characters. Each window
//! starts `window - overlap` characters after the previous one, so neighbouring
//! chunks share `overlap` characters of context. Characters here are Unicode
//! scalar values, never bytes, so a chunk boundary cannot split a UTF-8
//! sequence.
//!
//! # Guarantees
//!
//! *   Every character of the input lands in at least one chunk.
//! *   Ordinals are 0-based and strictly increasing.
//! *   Empty input gives no chunks; input no longer than `window` gives one chunk
//!     equal to the whole text.
//! *   Only the final chunk may be shorter than `window`.
//! *   The walk stops at the first chunk that reaches the end of the text, so no
//!     chunk is ever wholly contained in its predecessor.
//!
//! # Example
//!
//! ```
//! use recall_context::text::{ChunkConfig, Chunker};
//!
//! let chunker = Chunker::new(ChunkConfig::new(500, 50)?);
//! let text = "x".repeat(1200);
//! let chunks = chunker.chunks(&text);
//!
//! let spans: Vec<_> = chunks.iter().map(|c| c.span()).collect();
//! assert_eq!(spans, vec![0..500, 450..950, 900..1200]);
//! # Ok::<(), recall_context::text::ChunkError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Default window size in characters
pub const DEFAULT_WINDOW: usize = 500;

/// Default overlap between consecutive chunks in characters
pub const DEFAULT_OVERLAP: usize = 50;

/// Invalid chunking parameters
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    #[error("chunk window must be at least 1 character")]
    ZeroWindow,

    #[error("chunk overlap ({overlap}) must be smaller than the window ({window})")]
    OverlapTooLarge { window: usize, overlap: usize },
}

/// Window and overlap, both measured in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    pub window: usize,
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl ChunkConfig {
    /// Build a validated configuration.
    pub fn new(window: usize, overlap: usize) -> Result<Self, ChunkError> {
        let config = Self { window, overlap };
        config.validate()?;
        Ok(config)
    }

    /// Reject a zero window or an overlap that would stall the walk.
    pub fn validate(&self) -> Result<(), ChunkError> {
        if self.window == 0 {
            return Err(ChunkError::ZeroWindow);
        }
        if self.overlap >= self.window {
            return Err(ChunkError::OverlapTooLarge {
                window: self.window,
                overlap: self.overlap,
            });
        }
        Ok(())
    }

    /// How far each chunk starts after the previous one.
    pub fn step(&self) -> usize {
        self.window - self.overlap
    }
}

/// One window of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Position of this chunk within its document (0-indexed).
    pub ordinal: usize,
    /// First character offset covered by the chunk.
    pub start: usize,
    /// One past the last character offset covered by the chunk.
    pub end: usize,
    /// The chunk's text.
    pub text: String,
}

impl Chunk {
    /// Character range of the chunk within its document.
    pub fn span(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.end - self.start
    }
}

/// Splits documents with a fixed, already validated [`ChunkConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Chunker {
    config: ChunkConfig,
}

impl Chunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> ChunkConfig {
        self.config
    }

    /// Split `text` into overlapping windows.
    pub fn chunks(&self, text: &str) -> Vec<Chunk> {
        // Byte offset of every char boundary, including the end of the text
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(byte, _)| byte)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_count = boundaries.len() - 1;

        let mut chunks = Vec::new();
        if char_count == 0 {
            return chunks;
        }

        let step = self.config.step().max(1);
        let mut start = 0;
        loop {
            let end = (start + self.config.window).min(char_count);
            chunks.push(Chunk {
                ordinal: chunks.len(),
                start,
                end,
                text: text[boundaries[start]..boundaries[end]].to_string(),
            });
            if end == char_count {
                break;
            }
            start += step;
        }
        chunks
    }
}

/// Validate `config` and split `text` with it.
pub fn chunk_text(text: &str, config: ChunkConfig) -> Result<Vec<Chunk>, ChunkError> {
    config.validate()?;
    Ok(Chunker::new(config).chunks(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Concatenate the part of each chunk not already covered by its predecessor.
    fn stitch(chunks: &[Chunk]) -> String {
        let mut out = String::new();
        let mut covered: usize = 0;
        for chunk in chunks {
            let skip = covered.saturating_sub(chunk.start);
            out.extend(chunk.text.chars().skip(skip));
            covered = chunk.end;
        }
        out
    }

    #[test]
    fn test_empty_input_has_no_chunks() {
        assert!(Chunker::default().chunks("").is_empty());
    }

    #[test]
    fn test_short_input_is_one_chunk() {
        let chunks = Chunker::default().chunks("hello world");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello world");
        assert_eq!(chunks[0].span(), 0..11);

        let exact = "a".repeat(DEFAULT_WINDOW);
        assert_eq!(Chunker::default().chunks(&exact).len(), 1);
    }

    #[test]
    fn test_1200_chars_gives_three_chunks() {
        let text: String = (0..1200).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let chunks = Chunker::default().chunks(&text);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].span(), 0..500);
        assert_eq!(chunks[1].span(), 450..950);
        assert_eq!(chunks[2].span(), 900..1200);

        // Neighbours share exactly 50 characters
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end - pair[1].start, 50);
            let tail: String = pair[0].text.chars().skip(450).collect();
            let head: String = pair[1].text.chars().take(50).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn test_no_chunk_contained_in_previous() {
        // 950 chars: a third window starting at 900 would sit inside 450..950
        let text = "z".repeat(950);
        let chunks = Chunker::default().chunks(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].span(), 450..950);
    }

    #[test]
    fn test_coverage_for_many_configs() {
        let texts = [
            "The quick brown fox jumps over the lazy dog. ".repeat(40),
            "naïve café résumé — 日本語のテキスト 🚀 ".repeat(25),
            "   \n\n\t  ".repeat(30),
            "x".to_string(),
        ];
        let configs = [(500, 50), (1, 0), (7, 3), (100, 99), (64, 0), (13, 12)];

        for text in &texts {
            for &(window, overlap) in &configs {
                let chunks = chunk_text(text, ChunkConfig::new(window, overlap).unwrap()).unwrap();
                assert_eq!(&stitch(&chunks), text, "window={window} overlap={overlap}");

                for (i, chunk) in chunks.iter().enumerate() {
                    assert_eq!(chunk.ordinal, i);
                    assert_eq!(chunk.text.chars().count(), chunk.char_len());
                    if i + 1 < chunks.len() {
                        assert_eq!(chunk.char_len(), window);
                    } else {
                        assert!(chunk.char_len() <= window);
                    }
                }
            }
        }
    }

    #[test]
    fn test_multibyte_boundaries() {
        let text = "é".repeat(12);
        let chunks = chunk_text(&text, ChunkConfig::new(5, 1).unwrap()).unwrap();
        assert_eq!(chunks[0].text, "ééééé");
        assert_eq!(chunks[1].span(), 4..9);
        assert_eq!(chunks.last().map(|c| c.end), Some(12));
    }

    #[test]
    fn test_invalid_configs() {
        assert_eq!(ChunkConfig::new(0, 0), Err(ChunkError::ZeroWindow));
        assert_eq!(
            ChunkConfig::new(50, 50),
            Err(ChunkError::OverlapTooLarge {
                window: 50,
                overlap: 50
            })
        );
        let bad = ChunkConfig {
            window: 10,
            overlap: 20,
        };
        assert!(chunk_text("some text", bad).is_err());
    }
}
