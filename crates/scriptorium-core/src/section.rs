//! Heading-delimited section extraction for the editor.
//!
//! Sections are a navigation aid over the live markdown, not a stored
//! entity: each heading opens a section that runs until the next
//! heading (or end of document). The editor captures a section's byte
//! range at selection time and splices edited text back at those same
//! offsets — if the draft changed in between, the splice lands on
//! stale offsets (accepted single-user risk).

use serde::Serialize;

/// A heading-delimited span of the document, as byte offsets into the
/// markdown it was extracted from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub heading: String,
    pub start: usize,
    pub end: usize,
}

/// Find every heading-delimited section in `markdown`.
///
/// Text before the first heading belongs to no section. A section's
/// range starts at its heading line and ends just before the next
/// heading line (exclusive of the separating newline).
pub fn extract_sections(markdown: &str) -> Vec<Section> {
    let lines: Vec<&str> = markdown.split('\n').collect();
    let mut offsets = Vec::with_capacity(lines.len());
    let mut offset = 0;
    for line in &lines {
        offsets.push(offset);
        offset += line.len() + 1;
    }

    let mut sections = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let Some(heading) = heading_of(line) else {
            continue;
        };
        let start = offsets[i];
        let mut end = markdown.len();
        for (j, later) in lines.iter().enumerate().skip(i + 1) {
            if heading_of(later).is_some() {
                end = offsets[j].saturating_sub(1);
                break;
            }
        }
        sections.push(Section {
            heading: heading.to_string(),
            start,
            end,
        });
    }
    sections
}

/// Splice `replacement` into `markdown` at the section's captured
/// offsets. Offsets past the current end of the document are clamped,
/// and offsets that land mid-character after an intervening edit snap
/// back to the nearest char boundary, so a stale splice degrades
/// instead of panicking.
pub fn splice_section(markdown: &str, section: &Section, replacement: &str) -> String {
    let start = snap_to_boundary(markdown, section.start.min(markdown.len()));
    let end = snap_to_boundary(markdown, section.end.clamp(start, markdown.len()));
    format!("{}{}\n{}", &markdown[..start], replacement, &markdown[end..])
}

// Walking down always terminates at a boundary (0 at worst), and the
// snapped end cannot pass a snapped start since start is a boundary.
fn snap_to_boundary(markdown: &str, mut offset: usize) -> usize {
    while offset > 0 && !markdown.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

fn heading_of(line: &str) -> Option<&str> {
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
