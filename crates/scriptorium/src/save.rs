//! Save and restore pipeline for chapters.
//!
//! A save compares the incoming draft against the stored row, and on
//! any difference overwrites the live body, appends an immutable
//! version snapshot, and rebuilds the chunk index. Restoring a version
//! overwrites the live body without appending a new snapshot.

use anyhow::{bail, Result};

use scriptorium_core::chunk::chunk_markdown;
use scriptorium_core::models::{ChapterDraft, ChapterUpdate};
use scriptorium_core::store::Store;

/// Result of a save attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The draft matched the stored chapter field-for-field; nothing
    /// was written and no version was appended.
    Unchanged,
    /// The chapter was updated and a new snapshot recorded.
    Saved { version: i64 },
}

/// Persist a draft: update the chapter row, append a version snapshot,
/// and rebuild the chunk index. Identical drafts are a no-op.
pub async fn save_chapter(
    store: &dyn Store,
    chapter_id: &str,
    draft: &ChapterDraft,
    max_chars: usize,
    created_by: &str,
) -> Result<SaveOutcome> {
    if chapter_id.trim().is_empty() {
        bail!("chapter id must not be empty");
    }
    let chapter = match store.get_chapter(chapter_id).await? {
        Some(chapter) => chapter,
        None => bail!("chapter not found: {}", chapter_id),
    };

    if chapter.title == draft.title
        && chapter.status == draft.status
        && chapter.summary == draft.summary
        && chapter.markdown_current == draft.markdown
    {
        return Ok(SaveOutcome::Unchanged);
    }

    let update = ChapterUpdate::new()
        .title(&draft.title)
        .status(draft.status)
        .summary(draft.summary.clone())
        .markdown(&draft.markdown);
    store.update_chapter(chapter_id, &update).await?;

    let version = store
        .append_version(chapter_id, &draft.markdown, created_by)
        .await?;

    rebuild_chunk_index(store, chapter_id, &draft.markdown, max_chars).await;

    Ok(SaveOutcome::Saved {
        version: version.version_number,
    })
}

/// Overwrite the live chapter body with a historical snapshot. Returns
/// the restored version number. The history itself is untouched: no
/// new version is appended, so the timeline shows the restore only
/// through the live body.
pub async fn restore_version(
    store: &dyn Store,
    chapter_id: &str,
    version_id: &str,
    max_chars: usize,
) -> Result<i64> {
    let version = match store.get_version(version_id).await? {
        Some(version) => version,
        None => bail!("version not found: {}", version_id),
    };
    if version.chapter_id != chapter_id {
        bail!(
            "version {} does not belong to chapter {}",
            version_id,
            chapter_id
        );
    }

    let update = ChapterUpdate::new().markdown(&version.markdown);
    if !store.update_chapter(chapter_id, &update).await? {
        bail!("chapter not found: {}", chapter_id);
    }

    rebuild_chunk_index(store, chapter_id, &version.markdown, max_chars).await;

    Ok(version.version_number)
}

/// Rebuild the chunk rows for a chapter from its current markdown.
/// Failures are reported but never fail the surrounding save: the
/// index is derived data and the next save rebuilds it from scratch.
pub async fn rebuild_chunk_index(
    store: &dyn Store,
    chapter_id: &str,
    markdown: &str,
    max_chars: usize,
) {
    let chunks = chunk_markdown(markdown, max_chars);
    if let Err(e) = store.replace_chunks(chapter_id, &chunks).await {
        eprintln!(
            "Warning: failed to rebuild chunk index for chapter {}: {}",
            chapter_id, e
        );
        return;
    }
    enqueue_embedding_job(chapter_id, chunks.len());
}

/// Placeholder for the async embedding pipeline. Chunk rows are
/// written with a NULL embedding; nothing consumes this yet.
fn enqueue_embedding_job(_chapter_id: &str, _chunk_count: usize) {}
