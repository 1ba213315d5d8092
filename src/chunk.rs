//! Overlapping text chunker.
//!
//! Splits each extracted record independently into windows of at most
//! `chunk_size` characters, where every window after the first keeps
//! `overlap` characters of trailing context from its predecessor. Window
//! ends prefer a paragraph break, then a line break, then a word boundary
//! near the cut before falling back to a hard character cut.
//!
//! The record's metadata is copied verbatim onto every window derived from
//! it. Assigning order and ownership to the resulting pieces happens one
//! layer up, when persistable chunk rows are built.

use crate::models::{ChunkPiece, SourceRecord};

/// Validated chunking parameters.
#[derive(Debug, Clone, Copy)]
pub struct ChunkParams {
    chunk_size: usize,
    overlap: usize,
}

/// Invalid chunking parameters, rejected before any splitting occurs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    InvalidConfig(String),
}

impl std::fmt::Display for ChunkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChunkError::InvalidConfig(msg) => write!(f, "invalid chunking config: {}", msg),
        }
    }
}

impl std::error::Error for ChunkError {}

impl ChunkParams {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ChunkError> {
        if chunk_size == 0 {
            return Err(ChunkError::InvalidConfig(
                "chunk_size must be > 0".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(ChunkError::InvalidConfig(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

/// Splits each record's text into overlapping windows, copying the record's
/// metadata onto every resulting piece.
///
/// Records are never concatenated: all pieces of record *i* precede all
/// pieces of record *i+1*, and pieces within a record are in text order.
/// Records with only whitespace contribute nothing, so an entirely empty
/// input yields an empty output rather than a placeholder piece.
pub fn split(records: &[SourceRecord], params: ChunkParams) -> Vec<ChunkPiece> {
    let mut pieces = Vec::new();
    for record in records {
        if record.text.trim().is_empty() {
            continue;
        }
        for window in split_text(&record.text, params) {
            pieces.push(ChunkPiece {
                text: window,
                metadata: record.metadata.clone(),
            });
        }
    }
    pieces
}

fn split_text(text: &str, params: ChunkParams) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    let mut windows = Vec::new();
    let mut start = 0usize;

    while start < total {
        let hard_end = (start + params.chunk_size).min(total);
        let end = if hard_end < total {
            find_break(&chars, start, hard_end)
        } else {
            hard_end
        };

        let window: String = chars[start..end].iter().collect();
        if !window.trim().is_empty() {
            windows.push(window);
        }

        if end >= total {
            break;
        }
        // Next window keeps `overlap` chars of trailing context. The guard
        // keeps the walk moving forward when a boundary shortened the
        // window below the overlap length.
        start = if end > start + params.overlap {
            end - params.overlap
        } else {
            end
        };
    }

    windows
}

/// Scans backward from the hard cut for a paragraph break, then a line
/// break, then a space, giving up at most a fifth of the window.
fn find_break(chars: &[char], start: usize, hard_end: usize) -> usize {
    let window = hard_end - start;
    let floor = hard_end - (window / 5).max(1);

    for i in ((floor + 1)..=hard_end).rev() {
        if i >= 2 && chars[i - 1] == '\n' && chars[i - 2] == '\n' {
            return i;
        }
    }
    for i in ((floor + 1)..=hard_end).rev() {
        if chars[i - 1] == '\n' {
            return i;
        }
    }
    for i in ((floor + 1)..=hard_end).rev() {
        if chars[i - 1] == ' ' {
            return i;
        }
    }
    hard_end
}
