//! Best-effort comment anchor resolution.
//!
//! Comment anchors are captured once and never adjusted as the
//! document changes. Resolution is a highlight aid, not an
//! authoritative mapping: stored offsets win while they still fall
//! inside the document, otherwise the anchor text is re-matched by
//! first occurrence, and an anchor that no longer matches resolves to
//! nothing.

use crate::models::Comment;

/// A resolved anchor span, as byte offsets into the live markdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorSpan {
    pub start: usize,
    pub end: usize,
}

/// Resolve a comment's anchor against the live document.
///
/// Order of preference:
/// 1. Stored `(start_offset, end_offset)` if both are present, ordered,
///    in bounds, and on char boundaries.
/// 2. First occurrence of `anchor_text`.
/// 3. `None` — the anchored text has drifted or been edited away.
pub fn resolve_anchor(markdown: &str, comment: &Comment) -> Option<AnchorSpan> {
    if let (Some(start), Some(end)) = (comment.start_offset, comment.end_offset) {
        if start >= 0 && end > start {
            let (start, end) = (start as usize, end as usize);
            if end <= markdown.len()
                && markdown.is_char_boundary(start)
                && markdown.is_char_boundary(end)
            {
                return Some(AnchorSpan { start, end });
            }
        }
    }

    let needle = comment.anchor_text.as_deref()?.trim();
    if needle.is_empty() {
        return None;
    }
    markdown.find(needle).map(|start| AnchorSpan {
        start,
        end: start + needle.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Comment;

    fn comment_with(
        anchor_text: Option<&str>,
        start: Option<i64>,
        end: Option<i64>,
    ) -> Comment {
        let mut c = Comment::new("ch1", "needs work");
        c.anchor_text = anchor_text.map(|s| s.to_string());
        c.start_offset = start;
        c.end_offset = end;
        c
    }

    #[test]
    fn explicit_offsets_win() {
        let doc = "alpha beta gamma";
        let c = comment_with(Some("gamma"), Some(0), Some(5));
        assert_eq!(
            resolve_anchor(doc, &c),
            Some(AnchorSpan { start: 0, end: 5 })
        );
    }

    #[test]
    fn out_of_bounds_offsets_fall_back_to_text() {
        let doc = "alpha beta gamma";
        let c = comment_with(Some("beta"), Some(10), Some(900));
        assert_eq!(
            resolve_anchor(doc, &c),
            Some(AnchorSpan { start: 6, end: 10 })
        );
    }

    #[test]
    fn first_occurrence_when_text_repeats() {
        let doc = "echo one echo two";
        let c = comment_with(Some("echo"), None, None);
        assert_eq!(
            resolve_anchor(doc, &c),
            Some(AnchorSpan { start: 0, end: 4 })
        );
    }

    #[test]
    fn vanished_anchor_resolves_to_none() {
        let c = comment_with(Some("deleted passage"), None, None);
        assert_eq!(resolve_anchor("fresh rewrite", &c), None);
    }

    #[test]
    fn no_anchor_at_all_resolves_to_none() {
        let c = comment_with(None, None, None);
        assert_eq!(resolve_anchor("whatever", &c), None);
    }
}
