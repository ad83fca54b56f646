//! Whitespace-packing text chunker.
//!
//! Splits a source file's text on whitespace boundaries and packs the
//! tokens greedily into chunks of at most `max_chars` characters, joined
//! by single spaces, with no overlap between consecutive chunks. A chunk
//! only exceeds the bound when a single token does.
//!
//! Each chunk carries the originating file path, its position within the
//! file, and a SHA-256 hash of its text.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::SourceChunk;

/// Split one file's text into chunks. Whitespace-only input produces no
/// chunks; indices are contiguous starting at 0.
pub fn chunk_source(source: &str, text: &str, max_chars: usize) -> Vec<SourceChunk> {
    let mut chunks = Vec::new();
    let mut buf = String::new();
    let mut index: i64 = 0;

    for token in text.split_whitespace() {
        let would_be = if buf.is_empty() {
            token.len()
        } else {
            buf.len() + 1 + token.len()
        };

        if would_be > max_chars && !buf.is_empty() {
            chunks.push(make_chunk(source, index, &buf));
            index += 1;
            buf.clear();
        }

        if !buf.is_empty() {
            buf.push(' ');
        }
        buf.push_str(token);
    }

    if !buf.is_empty() {
        chunks.push(make_chunk(source, index, &buf));
    }

    chunks
}

fn make_chunk(source: &str, index: i64, text: &str) -> SourceChunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    SourceChunk {
        id: Uuid::new_v4().to_string(),
        source: source.to_string(),
        chunk_index: index,
        text: text.to_string(),
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_source("a.py", "def f(x): return x", 1024);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].text, "def f(x): return x");
        assert_eq!(chunks[0].source, "a.py");
    }

    #[test]
    fn test_empty_and_whitespace_only() {
        assert!(chunk_source("a.py", "", 1024).is_empty());
        assert!(chunk_source("a.py", "  \n\t  ", 1024).is_empty());
    }

    #[test]
    fn test_chunks_respect_max_chars() {
        let text = (0..200).map(|i| format!("tok{}", i)).collect::<Vec<_>>().join(" ");
        let chunks = chunk_source("a.py", &text, 32);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(
                chunk.text.len() <= 32,
                "chunk exceeds bound: {:?}",
                chunk.text
            );
        }
    }

    #[test]
    fn test_oversized_token_lands_alone() {
        // A single token longer than the bound cannot be split; it becomes
        // its own over-length chunk and packing resumes after it.
        let long = "y".repeat(50);
        let text = format!("aa bb {} cc", long);
        let chunks = chunk_source("a.py", &text, 10);
        assert_eq!(
            chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>(),
            vec!["aa bb", long.as_str(), "cc"]
        );
    }

    #[test]
    fn test_no_overlap_and_order_preserved() {
        let text = "alpha beta gamma delta epsilon zeta";
        let chunks = chunk_source("a.py", text, 12);
        let rejoined = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(rejoined, text);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i as i64);
        }
    }

    #[test]
    fn test_internal_whitespace_collapses() {
        let chunks = chunk_source("a.py", "a\n\n  b\tc", 1024);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "a b c");
    }

    #[test]
    fn test_same_text_same_hash() {
        let a = chunk_source("a.py", "alpha beta", 1024);
        let b = chunk_source("b.py", "alpha beta", 1024);
        assert_eq!(a[0].hash, b[0].hash);
        assert_ne!(a[0].id, b[0].id);
    }
}
