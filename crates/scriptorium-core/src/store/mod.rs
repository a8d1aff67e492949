//! Storage abstraction for the chapter pipeline.
//!
//! The [`Store`] trait covers every persistence operation the save
//! path, proposal engine, and editor session need, enabling pluggable
//! backends (SQLite in the app crate, in-memory here for tests).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//!
//! Two consistency notes that shape the trait:
//!
//! - [`append_version`](Store::append_version) assigns the next
//!   version number *atomically* (read max + insert as one unit), so
//!   concurrent saves cannot race to the same number.
//! - Chunk replacement is a separate call from the chapter update and
//!   version insert: the three writes of a save are deliberately not
//!   one transaction, and callers treat the chunk rebuild as
//!   best-effort.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{
    Book, Chapter, ChapterUpdate, ChapterVersion, Chunk, Comment, CommentStatus, Proposal,
    ProposalStatus, VersionSummary,
};

/// Abstract storage backend for Scriptorium.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_book(&self, book: &Book) -> Result<()>;
    async fn get_book(&self, id: &str) -> Result<Option<Book>>;

    async fn insert_chapter(&self, chapter: &Chapter) -> Result<()>;
    async fn get_chapter(&self, id: &str) -> Result<Option<Chapter>>;
    /// Chapters of a book in `position` order.
    async fn list_chapters(&self, book_id: &str) -> Result<Vec<Chapter>>;
    /// Apply an optional-field update; bumps `updated_at`. Returns
    /// false when the chapter does not exist.
    async fn update_chapter(&self, id: &str, update: &ChapterUpdate) -> Result<bool>;
    /// Highest `position` in a book, 0 when empty.
    async fn max_position(&self, book_id: &str) -> Result<i64>;

    /// Append an immutable snapshot with version number = current max
    /// + 1, assigned atomically. Returns the stored version.
    async fn append_version(
        &self,
        chapter_id: &str,
        markdown: &str,
        created_by: &str,
    ) -> Result<ChapterVersion>;
    async fn get_version(&self, version_id: &str) -> Result<Option<ChapterVersion>>;
    /// Version history, newest first, without markdown bodies.
    async fn list_versions(&self, chapter_id: &str) -> Result<Vec<VersionSummary>>;

    /// Replace the chapter's chunk index wholesale (delete-then-insert).
    async fn replace_chunks(&self, chapter_id: &str, chunks: &[Chunk]) -> Result<()>;
    /// Current chunk index in `chunk_index` order.
    async fn list_chunks(&self, chapter_id: &str) -> Result<Vec<Chunk>>;

    async fn insert_proposal(&self, proposal: &Proposal) -> Result<()>;
    async fn get_proposal(&self, id: &str) -> Result<Option<Proposal>>;
    /// Proposals for a chapter, newest first, optionally filtered by status.
    async fn list_proposals(
        &self,
        chapter_id: &str,
        status: Option<ProposalStatus>,
    ) -> Result<Vec<Proposal>>;
    async fn set_proposal_status(&self, id: &str, status: ProposalStatus) -> Result<bool>;

    async fn insert_comment(&self, comment: &Comment) -> Result<()>;
    async fn get_comment(&self, id: &str) -> Result<Option<Comment>>;
    async fn list_comments(&self, chapter_id: &str) -> Result<Vec<Comment>>;
    async fn set_comment_patch(&self, id: &str, patch: &str) -> Result<bool>;
    async fn set_comment_status(&self, id: &str, status: CommentStatus) -> Result<bool>;
}
