//! AI proposal engine: whole-chapter rewrites, bulk book passes,
//! additive patches, TOC generation, and concept placement.
//!
//! Proposals are staged: the model's output lands as a pending row and
//! touches the chapter only when explicitly applied. A model failure
//! stores nothing.

use anyhow::{bail, Result};

use scriptorium_core::models::{Chapter, ChapterUpdate, EditIntent, Proposal, ProposalStatus};
use scriptorium_core::store::Store;

use crate::model_client::CompletionModel;
use crate::save::rebuild_chunk_index;

pub const EDITOR_SYSTEM_PROMPT: &str =
    "You are a careful book editor applying requested changes to chapters.";

const TOC_SYSTEM_PROMPT: &str = "You are a book editor generating a chapter outline.";

const PLACE_SYSTEM_PROMPT: &str =
    "You are a book editor that routes concepts to the best fitting chapter.";

pub const DEFAULT_TOC_COUNT: usize = 10;

fn chapter_edit_prompt(intent: &EditIntent, instruction: &str, markdown: &str) -> String {
    format!(
        "Intent: {}\nInstruction: {}\nChapter:\nReturn the updated chapter markdown only. \
         Preserve existing structure unless instructed.\n\n{}",
        intent.label(),
        instruction,
        markdown
    )
}

/// Ask the model for a full rewrite of one chapter and stage it as a
/// pending proposal. The chapter itself is not modified.
pub async fn propose_chapter(
    store: &dyn Store,
    model: &dyn CompletionModel,
    chapter_id: &str,
    intent: &EditIntent,
    instruction: &str,
) -> Result<Proposal> {
    if instruction.trim().is_empty() {
        bail!("instruction must not be empty");
    }
    let chapter = match store.get_chapter(chapter_id).await? {
        Some(chapter) => chapter,
        None => bail!("chapter not found: {}", chapter_id),
    };

    let prompt = chapter_edit_prompt(intent, instruction, &chapter.markdown_current);
    let proposed = model.complete(EDITOR_SYSTEM_PROMPT, &prompt).await?;

    let proposal = Proposal::new(chapter_id, instruction, proposed);
    store.insert_proposal(&proposal).await?;
    Ok(proposal)
}

/// Run one instruction across every chapter of a book, staging one
/// pending proposal per chapter. A failure on one chapter is reported
/// and skipped; the rest of the book still gets its proposals.
pub async fn propose_book(
    store: &dyn Store,
    model: &dyn CompletionModel,
    book_id: &str,
    intent: &EditIntent,
    instruction: &str,
) -> Result<Vec<Proposal>> {
    if store.get_book(book_id).await?.is_none() {
        bail!("book not found: {}", book_id);
    }
    let chapters = store.list_chapters(book_id).await?;

    let mut proposals = Vec::new();
    for chapter in &chapters {
        match propose_chapter(store, model, &chapter.id, intent, instruction).await {
            Ok(proposal) => proposals.push(proposal),
            Err(e) => {
                eprintln!("Warning: skipping chapter '{}': {}", chapter.title, e);
            }
        }
    }
    Ok(proposals)
}

/// Accept a pending proposal: overwrite the chapter body, append a
/// version snapshot, rebuild chunks, then mark the proposal applied.
/// Returns the new version number. If the save fails the proposal
/// stays pending and can be retried.
pub async fn apply_proposal(
    store: &dyn Store,
    proposal_id: &str,
    max_chars: usize,
    created_by: &str,
) -> Result<i64> {
    let proposal = match store.get_proposal(proposal_id).await? {
        Some(proposal) => proposal,
        None => bail!("proposal not found: {}", proposal_id),
    };
    if proposal.status != ProposalStatus::Pending {
        bail!("proposal is already {}", proposal.status.as_str());
    }

    let update = ChapterUpdate::new().markdown(&proposal.proposed_markdown);
    if !store.update_chapter(&proposal.chapter_id, &update).await? {
        bail!("chapter not found: {}", proposal.chapter_id);
    }
    let version = store
        .append_version(&proposal.chapter_id, &proposal.proposed_markdown, created_by)
        .await?;
    rebuild_chunk_index(
        store,
        &proposal.chapter_id,
        &proposal.proposed_markdown,
        max_chars,
    )
    .await;

    store
        .set_proposal_status(proposal_id, ProposalStatus::Applied)
        .await?;
    Ok(version.version_number)
}

/// Discard a pending proposal without touching the chapter.
pub async fn reject_proposal(store: &dyn Store, proposal_id: &str) -> Result<()> {
    let proposal = match store.get_proposal(proposal_id).await? {
        Some(proposal) => proposal,
        None => bail!("proposal not found: {}", proposal_id),
    };
    if proposal.status != ProposalStatus::Pending {
        bail!("proposal is already {}", proposal.status.as_str());
    }
    store
        .set_proposal_status(proposal_id, ProposalStatus::Rejected)
        .await?;
    Ok(())
}

/// Append text to the end of a chapter with a blank line between, as a
/// regular save (version appended, chunks rebuilt). Returns the new
/// version number.
pub async fn append_patch(
    store: &dyn Store,
    chapter_id: &str,
    patch: &str,
    max_chars: usize,
    created_by: &str,
) -> Result<i64> {
    if patch.trim().is_empty() {
        bail!("patch must not be empty");
    }
    let chapter = match store.get_chapter(chapter_id).await? {
        Some(chapter) => chapter,
        None => bail!("chapter not found: {}", chapter_id),
    };

    let merged = format!("{}\n\n{}", chapter.markdown_current, patch)
        .trim()
        .to_string();

    let update = ChapterUpdate::new().markdown(&merged);
    store.update_chapter(chapter_id, &update).await?;
    let version = store.append_version(chapter_id, &merged, created_by).await?;
    rebuild_chunk_index(store, chapter_id, &merged, max_chars).await;
    Ok(version.version_number)
}

/// Generate `count` chapter titles for a concept and create empty
/// outline chapters after the book's existing ones.
pub async fn generate_toc(
    store: &dyn Store,
    model: &dyn CompletionModel,
    book_id: &str,
    concept: &str,
    count: usize,
) -> Result<Vec<Chapter>> {
    if concept.trim().is_empty() {
        bail!("concept must not be empty");
    }
    if store.get_book(book_id).await?.is_none() {
        bail!("book not found: {}", book_id);
    }
    let count = if count == 0 { DEFAULT_TOC_COUNT } else { count };

    let prompt = format!(
        "Concept: {}\nReturn a numbered list of {} chapter titles only.",
        concept, count
    );
    let reply = model.complete(TOC_SYSTEM_PROMPT, &prompt).await?;

    let titles: Vec<String> = reply
        .lines()
        .map(strip_list_marker)
        .filter(|t| !t.is_empty())
        .take(count)
        .map(str::to_string)
        .collect();
    if titles.is_empty() {
        bail!("model returned no chapter titles");
    }

    let mut position = store.max_position(book_id).await?;
    let mut chapters = Vec::with_capacity(titles.len());
    for title in titles {
        position += 1;
        let chapter = Chapter::new(book_id, title, position);
        store.insert_chapter(&chapter).await?;
        chapters.push(chapter);
    }
    Ok(chapters)
}

/// Strip a leading list marker like `3.` or `12)` from a model-emitted
/// title line.
fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return rest.trim_start();
        }
    }
    line
}

/// Ask the model which existing chapter a concept belongs in. Falls
/// back to the first chapter when the model fails or answers with an
/// unknown id, so routing always lands somewhere.
pub async fn place_concept(
    store: &dyn Store,
    model: &dyn CompletionModel,
    book_id: &str,
    concept: &str,
) -> Result<Chapter> {
    if concept.trim().is_empty() {
        bail!("concept must not be empty");
    }
    let chapters = store.list_chapters(book_id).await?;
    if chapters.is_empty() {
        bail!("book has no chapters: {}", book_id);
    }

    let context: Vec<serde_json::Value> = chapters
        .iter()
        .map(|c| {
            let excerpt: String = c.markdown_current.chars().take(800).collect();
            serde_json::json!({
                "id": c.id,
                "title": c.title,
                "summary": c.summary.as_deref().unwrap_or(""),
                "excerpt": excerpt,
            })
        })
        .collect();

    let prompt = format!(
        "Concept: {}\nChapters: {}\nReturn only the chapter id.",
        concept,
        serde_json::to_string(&context)?
    );

    let chosen = match model.complete(PLACE_SYSTEM_PROMPT, &prompt).await {
        Ok(reply) => {
            let reply = reply.trim();
            chapters.iter().find(|c| c.id == reply).cloned()
        }
        Err(e) => {
            eprintln!("Warning: concept placement fell back to first chapter: {}", e);
            None
        }
    };

    Ok(chosen.unwrap_or_else(|| chapters[0].clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use scriptorium_core::models::{Book, ChapterStatus};
    use scriptorium_core::store::memory::InMemoryStore;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted model: pops one canned reply per call.
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
    async fn proposal_lifecycle_propose_then_apply() {
        let store = InMemoryStore::new();
        let chapter = seed(&store, "original body").await;
        let model = FakeModel::new(vec![Ok("# Rewritten\nTighter body".into())]);

        let proposal = propose_chapter(
            &store,
            &model,
            &chapter.id,
            &EditIntent::Tighten,
            "tighten the prose",
        )
        .await
        .unwrap();
        assert_eq!(proposal.status, ProposalStatus::Pending);

        // Staging must not touch the chapter.
        let stored = store.get_chapter(&chapter.id).await.unwrap().unwrap();
        assert_eq!(stored.markdown_current, "original body");

        let version = apply_proposal(&store, &proposal.id, 2000, "editor")
            .await
            .unwrap();
        assert_eq!(version, 1);

        let stored = store.get_chapter(&chapter.id).await.unwrap().unwrap();
        assert_eq!(stored.markdown_current, "# Rewritten\nTighter body");
        assert!(!store.list_chunks(&chapter.id).await.unwrap().is_empty());

        let err = apply_proposal(&store, &proposal.id, 2000, "editor")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already applied"));
    }

    #[tokio::test]
    async fn rejected_proposal_leaves_chapter_alone() {
        let store = InMemoryStore::new();
        let chapter = seed(&store, "keep me").await;
        let model = FakeModel::new(vec![Ok("replacement".into())]);

        let proposal = propose_chapter(
            &store,
            &model,
            &chapter.id,
            &EditIntent::Expand,
            "expand it",
        )
        .await
        .unwrap();
        reject_proposal(&store, &proposal.id).await.unwrap();

        let stored = store.get_chapter(&chapter.id).await.unwrap().unwrap();
        assert_eq!(stored.markdown_current, "keep me");
        assert!(store.list_versions(&chapter.id).await.unwrap().is_empty());

        let err = reject_proposal(&store, &proposal.id).await.unwrap_err();
        assert!(err.to_string().contains("already rejected"));
    }

    #[tokio::test]
    async fn model_failure_stores_nothing() {
        let store = InMemoryStore::new();
        let chapter = seed(&store, "body").await;
        let model = FakeModel::new(vec![Err(anyhow!("model API error 500: boom"))]);

        let err = propose_chapter(&store, &model, &chapter.id, &EditIntent::Outline, "outline")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("model API error"));
        assert!(store
            .list_proposals(&chapter.id, None)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn book_pass_skips_failed_chapters() {
        let store = InMemoryStore::new();
        let book = Book::new("Book");
        store.insert_book(&book).await.unwrap();
        for (i, title) in ["One", "Two", "Three"].iter().enumerate() {
            let chapter = Chapter::new(&book.id, *title, i as i64 + 1);
            store.insert_chapter(&chapter).await.unwrap();
        }
        let model = FakeModel::new(vec![
            Ok("rewrite one".into()),
            Err(anyhow!("model API error 429: rate limited")),
            Ok("rewrite three".into()),
        ]);

        let proposals = propose_book(
            &store,
            &model,
            &book.id,
            &EditIntent::Continuity,
            "ensure continuity",
        )
        .await
        .unwrap();
        assert_eq!(proposals.len(), 2);
    }

    #[tokio::test]
    async fn patch_appends_with_blank_line() {
        let store = InMemoryStore::new();
        let chapter = seed(&store, "Original.").await;

        let version = append_patch(&store, &chapter.id, "Addendum text.", 2000, "editor")
            .await
            .unwrap();
        assert_eq!(version, 1);

        let stored = store.get_chapter(&chapter.id).await.unwrap().unwrap();
        assert_eq!(stored.markdown_current, "Original.\n\nAddendum text.");

        assert!(append_patch(&store, &chapter.id, "   ", 2000, "editor")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn toc_parses_numbered_list() {
        let store = InMemoryStore::new();
        let book = Book::new("Book");
        store.insert_book(&book).await.unwrap();
        let existing = Chapter::new(&book.id, "Preface", 1);
        store.insert_chapter(&existing).await.unwrap();

        let model = FakeModel::new(vec![Ok(
            "1. The Spark\n2) Kindling\n\nNotes Without Marker\n3. The Blaze".into(),
        )]);
        let chapters = generate_toc(&store, &model, &book.id, "a history of fire", 4)
            .await
            .unwrap();

        let titles: Vec<&str> = chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["The Spark", "Kindling", "Notes Without Marker", "The Blaze"]
        );
        let positions: Vec<i64> = chapters.iter().map(|c| c.position).collect();
        assert_eq!(positions, vec![2, 3, 4, 5]);
        assert!(chapters.iter().all(|c| c.status == ChapterStatus::Outline));
    }

    #[tokio::test]
    async fn place_concept_falls_back_to_first_chapter() {
        let store = InMemoryStore::new();
        let book = Book::new("Book");
        store.insert_book(&book).await.unwrap();
        let first = Chapter::new(&book.id, "First", 1);
        let second = Chapter::new(&book.id, "Second", 2);
        store.insert_chapter(&first).await.unwrap();
        store.insert_chapter(&second).await.unwrap();

        let model = FakeModel::new(vec![Ok(second.id.clone())]);
        let chosen = place_concept(&store, &model, &book.id, "dragons")
            .await
            .unwrap();
        assert_eq!(chosen.id, second.id);

        let model = FakeModel::new(vec![Ok("not-a-chapter-id".into())]);
        let chosen = place_concept(&store, &model, &book.id, "dragons")
            .await
            .unwrap();
        assert_eq!(chosen.id, first.id);

        let model = FakeModel::new(vec![Err(anyhow!("model API error 500: down"))]);
        let chosen = place_concept(&store, &model, &book.id, "dragons")
            .await
            .unwrap();
        assert_eq!(chosen.id, first.id);
    }

    #[test]
    fn list_marker_stripping() {
        assert_eq!(strip_list_marker("1. Alpha"), "Alpha");
        assert_eq!(strip_list_marker("12) Beta"), "Beta");
        assert_eq!(strip_list_marker("Gamma"), "Gamma");
        assert_eq!(strip_list_marker("2026 in Review"), "2026 in Review");
    }
}
