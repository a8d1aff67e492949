//! Editorial comments and AI rewrite suggestions.
//!
//! A comment is anchored (best-effort) to a span of the live chapter.
//! The model can be asked for a suggested patch, which is stored on
//! the comment; applying the comment appends the patch to the chapter
//! through the normal save path.

use anyhow::{bail, Result};

use scriptorium_core::anchor::{resolve_anchor, AnchorSpan};
use scriptorium_core::models::{Comment, CommentStatus};
use scriptorium_core::store::Store;

use crate::model_client::CompletionModel;
use crate::proposals::append_patch;

const SUGGEST_SYSTEM_PROMPT: &str =
    "You are a book editor providing concise rewrite suggestions.";

/// How much of the chapter body is quoted into the suggestion prompt.
const PROMPT_EXCERPT_CHARS: usize = 8000;

/// Attach a comment to a chapter, optionally anchored to a text span
/// and optionally carrying a patch the commenter already wrote.
pub async fn add_comment(
    store: &dyn Store,
    chapter_id: &str,
    text: &str,
    anchor_text: Option<String>,
    span: Option<AnchorSpan>,
    suggested_patch: Option<String>,
) -> Result<Comment> {
    if text.trim().is_empty() {
        bail!("comment text must not be empty");
    }
    if store.get_chapter(chapter_id).await?.is_none() {
        bail!("chapter not found: {}", chapter_id);
    }

    let mut comment = Comment::new(chapter_id, text);
    comment.anchor_text = anchor_text;
    if let Some(span) = span {
        comment.start_offset = Some(span.start as i64);
        comment.end_offset = Some(span.end as i64);
    }
    comment.suggested_patch = suggested_patch;
    store.insert_comment(&comment).await?;
    Ok(comment)
}

/// Ask the model for a rewrite addressing an open comment and store it
/// as the comment's suggested patch. A model failure leaves the
/// comment untouched.
pub async fn suggest_rewrite(
    store: &dyn Store,
    model: &dyn CompletionModel,
    comment_id: &str,
) -> Result<String> {
    let comment = match store.get_comment(comment_id).await? {
        Some(comment) => comment,
        None => bail!("comment not found: {}", comment_id),
    };
    if comment.status != CommentStatus::Open {
        bail!("comment is already {}", comment.status.as_str());
    }
    let chapter = match store.get_chapter(&comment.chapter_id).await? {
        Some(chapter) => chapter,
        None => bail!("chapter not found: {}", comment.chapter_id),
    };

    let anchored = resolve_anchor(&chapter.markdown_current, &comment)
        .map(|span| chapter.markdown_current[span.start..span.end].to_string())
        .unwrap_or_else(|| "(whole chapter)".to_string());

    let excerpt: String = chapter
        .markdown_current
        .chars()
        .take(PROMPT_EXCERPT_CHARS)
        .collect();
    let prompt = format!(
        "Chapter: {}\nComment: {}\nAnchor: {}\nReturn only the suggested replacement text. \
         If the change is global, summarize the change.\n\n{}",
        chapter.title, comment.comment, anchored, excerpt
    );

    let suggestion = model.complete(SUGGEST_SYSTEM_PROMPT, &prompt).await?;
    store.set_comment_patch(comment_id, &suggestion).await?;
    Ok(suggestion)
}

/// Apply a comment's suggested patch by appending it to the chapter,
/// then mark the comment applied. Returns the new version number.
pub async fn apply_comment(
    store: &dyn Store,
    comment_id: &str,
    max_chars: usize,
    created_by: &str,
) -> Result<i64> {
    let comment = match store.get_comment(comment_id).await? {
        Some(comment) => comment,
        None => bail!("comment not found: {}", comment_id),
    };
    if comment.status != CommentStatus::Open {
        bail!("comment is already {}", comment.status.as_str());
    }
    let patch = match &comment.suggested_patch {
        Some(patch) => patch,
        None => bail!("comment has no suggested patch yet"),
    };

    let version = append_patch(store, &comment.chapter_id, patch, max_chars, created_by).await?;
    store
        .set_comment_status(comment_id, CommentStatus::Applied)
        .await?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use scriptorium_core::models::{Book, Chapter};
    use scriptorium_core::store::memory::InMemoryStore;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct FakeModel {
        replies: Mutex<VecDeque<Result<String>>>,
    }

    impl FakeModel {
        fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
            }
        }
    }

    #[async_trait]
    impl CompletionModel for FakeModel {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow!("no scripted reply")))
        }
    }

    async fn seed(store: &InMemoryStore, markdown: &str) -> Chapter {
        let book = Book::new("Book");
        store.insert_book(&book).await.unwrap();
        let mut chapter = Chapter::new(&book.id, "Alpha", 1);
        chapter.markdown_current = markdown.into();
        store.insert_chapter(&chapter).await.unwrap();
        chapter
    }

    #[tokio::test]
    async fn comment_lifecycle_suggest_then_apply() {
        let store = InMemoryStore::new();
        let chapter = seed(&store, "The see was calm.").await;
        let model = FakeModel::new(vec![Ok("The sea was calm.".into())]);

        let comment = add_comment(
            &store,
            &chapter.id,
            "fix the typo",
            Some("see".into()),
            None,
            None,
        )
        .await
        .unwrap();

        let suggestion = suggest_rewrite(&store, &model, &comment.id).await.unwrap();
        assert_eq!(suggestion, "The sea was calm.");

        let version = apply_comment(&store, &comment.id, 2000, "editor")
            .await
            .unwrap();
        assert_eq!(version, 1);

        let stored = store.get_chapter(&chapter.id).await.unwrap().unwrap();
        assert_eq!(
            stored.markdown_current,
            "The see was calm.\n\nThe sea was calm."
        );
        let stored = store.get_comment(&comment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, CommentStatus::Applied);

        let err = apply_comment(&store, &comment.id, 2000, "editor")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already applied"));
    }

    #[tokio::test]
    async fn suggestion_failure_leaves_comment_untouched() {
        let store = InMemoryStore::new();
        let chapter = seed(&store, "body").await;
        let model = FakeModel::new(vec![Err(anyhow!("model API error 500: down"))]);

        let comment = add_comment(&store, &chapter.id, "tighten this", None, None, None)
            .await
            .unwrap();
        assert!(suggest_rewrite(&store, &model, &comment.id).await.is_err());

        let stored = store.get_comment(&comment.id).await.unwrap().unwrap();
        assert_eq!(stored.suggested_patch, None);
        assert_eq!(stored.status, CommentStatus::Open);
    }

    #[tokio::test]
    async fn apply_requires_a_patch() {
        let store = InMemoryStore::new();
        let chapter = seed(&store, "body").await;

        let comment = add_comment(&store, &chapter.id, "vague note", None, None, None)
            .await
            .unwrap();
        let err = apply_comment(&store, &comment.id, 2000, "editor")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no suggested patch"));
    }

    #[tokio::test]
    async fn empty_comment_is_rejected() {
        let store = InMemoryStore::new();
        let chapter = seed(&store, "body").await;
        assert!(add_comment(&store, &chapter.id, "  ", None, None, None)
            .await
            .is_err());
        assert!(add_comment(&store, "missing", "note", None, None, None)
            .await
            .is_err());
    }
}
