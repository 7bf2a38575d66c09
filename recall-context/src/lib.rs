pub mod text;

pub use text::{Chunk, ChunkConfig, ChunkError, Chunker, chunk_text};
