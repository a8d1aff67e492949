//! Heading-aware markdown chunker.
//!
//! Splits a chapter body into retrieval-sized [`Chunk`]s along ATX
//! heading boundaries, falling back to greedy paragraph packing when a
//! section exceeds the character threshold.
//!
//! # Algorithm
//!
//! 1. Scan line by line. A heading line (`#` through `######` followed
//!    by whitespace and text) flushes the buffer accumulated so far and
//!    then opens the next buffer with the heading line itself.
//! 2. Each flushed chunk carries the nearest heading *preceding* its
//!    content as `heading_path` — exclusive, so the heading line that
//!    opens a chunk names the chunk *after* it, not its own.
//! 3. A flushed buffer at or under `max_chars` becomes one chunk.
//!    Longer buffers are split on blank-line paragraph boundaries,
//!    greedily packed, and tagged `split: true`. A single paragraph
//!    over the threshold is emitted whole — accepted imprecision.
//! 4. If nothing was emitted and the trimmed input is non-empty, the
//!    whole document becomes one chunk with no heading.
//!
//! The chunker is a pure function of its input: no randomness, no
//! clock, no external state. The chunk index is fully replaced on
//! every save, which is only sound because re-chunking identical
//! input yields identical output.

use crate::models::{word_count, Chunk, ChunkMetadata};

/// Default character threshold per chunk.
pub const DEFAULT_MAX_CHARS: usize = 2000;

/// Split a markdown body into ordered, zero-indexed chunks.
pub fn chunk_markdown(markdown: &str, max_chars: usize) -> Vec<Chunk> {
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    // Heading context preceding the current buffer. The buffer's own
    // opening heading line is tracked separately and only becomes
    // context once that buffer has been flushed.
    let mut context_heading: Option<String> = None;
    let mut last_heading: Option<String> = None;

    for line in markdown.split('\n') {
        if let Some(text) = heading_text(line) {
            flush(&mut chunks, &mut buffer, context_heading.as_deref(), max_chars);
            context_heading = last_heading.take();
            last_heading = Some(text.to_string());
        }
        buffer.push(line);
    }
    flush(&mut chunks, &mut buffer, context_heading.as_deref(), max_chars);

    if chunks.is_empty() && !markdown.trim().is_empty() {
        let content = markdown.trim().to_string();
        chunks.push(Chunk {
            chunk_index: 0,
            heading_path: None,
            token_count: word_count(&content),
            metadata: ChunkMetadata {
                length: content.len(),
                split: false,
            },
            content,
        });
    }

    chunks
}

/// Parse an ATX heading line (`^#{1,6}\s+text`), returning the trimmed
/// heading text.
fn heading_text(line: &str) -> Option<&str> {
    let hashes = line.bytes().take_while(|&b| b == b'#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &line[hashes..];
    if !rest.starts_with(|c: char| c == ' ' || c == '\t') {
        return None;
    }
    let text = rest.trim();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Flush the line buffer as one or more chunks attributed to `heading`.
fn flush(chunks: &mut Vec<Chunk>, buffer: &mut Vec<&str>, heading: Option<&str>, max_chars: usize) {
    if buffer.is_empty() {
        return;
    }
    let content = buffer.join("\n").trim().to_string();
    buffer.clear();
    if content.is_empty() {
        return;
    }

    if content.len() <= max_chars {
        push_chunk(chunks, heading, content, false);
        return;
    }

    // Over threshold: greedily pack blank-line paragraphs. A single
    // paragraph longer than max_chars is emitted oversized.
    let mut packed = String::new();
    for part in content.split("\n\n") {
        if part.trim().is_empty() {
            continue;
        }
        if !packed.is_empty() && packed.len() + 2 + part.len() > max_chars {
            push_chunk(chunks, heading, std::mem::take(&mut packed), true);
        }
        if !packed.is_empty() {
            packed.push_str("\n\n");
        }
        packed.push_str(part);
    }
    if !packed.trim().is_empty() {
        push_chunk(chunks, heading, packed, true);
    }
}

fn push_chunk(chunks: &mut Vec<Chunk>, heading: Option<&str>, content: String, split: bool) {
    let content = content.trim().to_string();
    chunks.push(Chunk {
        chunk_index: chunks.len() as i64,
        heading_path: heading.map(|h| h.to_string()),
        token_count: word_count(&content),
        metadata: ChunkMetadata {
            length: content.len(),
            split,
        },
        content,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_attribution_two_sections() {
        let chunks = chunk_markdown("# Intro\nHello\n\n# Body\nWorld", DEFAULT_MAX_CHARS);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].heading_path, None);
        assert_eq!(chunks[0].content, "# Intro\nHello");
        assert_eq!(chunks[1].heading_path.as_deref(), Some("Intro"));
        assert_eq!(chunks[1].content, "# Body\nWorld");
    }

    #[test]
    fn indices_are_contiguous_from_zero() {
        let md = "# A\none\n\n## B\ntwo\n\n### C\nthree";
        let chunks = chunk_markdown(md, DEFAULT_MAX_CHARS);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
        }
    }

    #[test]
    fn no_heading_single_chunk() {
        let chunks = chunk_markdown("Just a plain paragraph.", DEFAULT_MAX_CHARS);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].heading_path, None);
        assert_eq!(chunks[0].content, "Just a plain paragraph.");
        assert_eq!(chunks[0].token_count, 4);
        assert!(!chunks[0].metadata.split);
    }

    #[test]
    fn empty_and_whitespace_input_yield_nothing() {
        assert!(chunk_markdown("", DEFAULT_MAX_CHARS).is_empty());
        assert!(chunk_markdown("  \n\n  ", DEFAULT_MAX_CHARS).is_empty());
    }

    #[test]
    fn long_section_splits_on_paragraphs() {
        let p1 = "alpha ".repeat(10);
        let p2 = "beta ".repeat(10);
        let p3 = "gamma ".repeat(10);
        let md = format!("# Long\n{}\n\n{}\n\n{}", p1.trim(), p2.trim(), p3.trim());
        let chunks = chunk_markdown(&md, 80);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.metadata.split);
        }
        // Heading context precedes the section, so every piece of the
        // first (and only) section has no heading_path.
        assert!(chunks.iter().all(|c| c.heading_path.is_none()));
    }

    #[test]
    fn oversized_paragraph_is_not_subdivided() {
        let big = "word ".repeat(100);
        let md = format!("# H\nshort intro\n\n{}", big.trim());
        let chunks = chunk_markdown(&md, 50);
        let longest = chunks.iter().map(|c| c.content.len()).max().unwrap();
        assert!(longest > 50, "oversized paragraph must be emitted whole");
    }

    #[test]
    fn content_is_never_dropped() {
        let md = "# One\nfirst section text\n\n# Two\nsecond section\n\nmore text\n\n# Three\nlast";
        let chunks = chunk_markdown(md, DEFAULT_MAX_CHARS);
        let rebuilt: String = chunks
            .iter()
            .map(|c| c.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let normalize = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(normalize(&rebuilt), normalize(md));
    }

    #[test]
    fn deterministic() {
        let md = "# A\npara one\n\npara two\n\n## B\npara three";
        let a = chunk_markdown(md, 30);
        let b = chunk_markdown(md, 30);
        assert_eq!(a, b);
    }

    #[test]
    fn heading_parsing_edges() {
        assert_eq!(heading_text("# Title"), Some("Title"));
        assert_eq!(heading_text("###### Deep"), Some("Deep"));
        assert_eq!(heading_text("####### Too deep"), None);
        assert_eq!(heading_text("#NoSpace"), None);
        assert_eq!(heading_text("plain"), None);
        assert_eq!(heading_text("#   "), None);
    }

    #[test]
    fn heading_context_chains_across_sections() {
        let md = "intro before any heading\n\n# First\nbody\n\n# Second\nbody\n\n# Third\nbody";
        let chunks = chunk_markdown(md, DEFAULT_MAX_CHARS);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].heading_path, None); // preamble
        assert_eq!(chunks[1].heading_path, None); // "# First ..." — nothing precedes it
        assert_eq!(chunks[2].heading_path.as_deref(), Some("First"));
        assert_eq!(chunks[3].heading_path.as_deref(), Some("Second"));
    }

    #[test]
    fn multibyte_content_is_preserved() {
        let md = "# Названия\nтекст главы здесь\n\n# Два\nещё текст";
        let chunks = chunk_markdown(md, DEFAULT_MAX_CHARS);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].heading_path.as_deref(), Some("Названия"));
    }
}
