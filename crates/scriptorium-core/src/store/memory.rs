//! In-memory [`Store`] implementation for unit tests.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock`. Version
//! numbering takes the write lock for the whole read-max-plus-insert,
//! matching the atomicity the SQLite backend gets from a transaction.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::models::{
    Book, Chapter, ChapterUpdate, ChapterVersion, Chunk, Comment, CommentStatus, Proposal,
    ProposalStatus, VersionSummary,
};

use super::Store;

/// In-memory store backing the unit tests of the save path, proposal
/// engine, and editor session.
#[derive(Default)]
pub struct InMemoryStore {
    books: RwLock<HashMap<String, Book>>,
    chapters: RwLock<HashMap<String, Chapter>>,
    versions: RwLock<Vec<ChapterVersion>>,
    chunks: RwLock<HashMap<String, Vec<Chunk>>>,
    proposals: RwLock<HashMap<String, Proposal>>,
    comments: RwLock<HashMap<String, Comment>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_book(&self, book: &Book) -> Result<()> {
        self.books
            .write()
            .unwrap()
            .insert(book.id.clone(), book.clone());
        Ok(())
    }

    async fn get_book(&self, id: &str) -> Result<Option<Book>> {
        Ok(self.books.read().unwrap().get(id).cloned())
    }

    async fn insert_chapter(&self, chapter: &Chapter) -> Result<()> {
        self.chapters
            .write()
            .unwrap()
            .insert(chapter.id.clone(), chapter.clone());
        Ok(())
    }

    async fn get_chapter(&self, id: &str) -> Result<Option<Chapter>> {
        Ok(self.chapters.read().unwrap().get(id).cloned())
    }

    async fn list_chapters(&self, book_id: &str) -> Result<Vec<Chapter>> {
        let mut chapters: Vec<Chapter> = self
            .chapters
            .read()
            .unwrap()
            .values()
            .filter(|c| c.book_id == book_id)
            .cloned()
            .collect();
        chapters.sort_by_key(|c| c.position);
        Ok(chapters)
    }

    async fn update_chapter(&self, id: &str, update: &ChapterUpdate) -> Result<bool> {
        let mut chapters = self.chapters.write().unwrap();
        let Some(chapter) = chapters.get_mut(id) else {
            return Ok(false);
        };
        if let Some(title) = &update.title {
            chapter.title = title.clone();
        }
        if let Some(status) = update.status {
            chapter.status = status;
        }
        if let Some(summary) = &update.summary {
            chapter.summary = summary.clone();
        }
        if let Some(markdown) = &update.markdown {
            chapter.markdown_current = markdown.clone();
        }
        if let Some(word_count) = update.word_count {
            chapter.word_count = word_count;
        }
        if let Some(position) = update.position {
            chapter.position = position;
        }
        chapter.updated_at = Utc::now().timestamp();
        Ok(true)
    }

    async fn max_position(&self, book_id: &str) -> Result<i64> {
        Ok(self
            .chapters
            .read()
            .unwrap()
            .values()
            .filter(|c| c.book_id == book_id)
            .map(|c| c.position)
            .max()
            .unwrap_or(0))
    }

    async fn append_version(
        &self,
        chapter_id: &str,
        markdown: &str,
        created_by: &str,
    ) -> Result<ChapterVersion> {
        // Write lock held across max-read and insert: no duplicate numbers.
        let mut versions = self.versions.write().unwrap();
        let next = versions
            .iter()
            .filter(|v| v.chapter_id == chapter_id)
            .map(|v| v.version_number)
            .max()
            .unwrap_or(0)
            + 1;
        let version = ChapterVersion {
            id: Uuid::new_v4().to_string(),
            chapter_id: chapter_id.to_string(),
            version_number: next,
            markdown: markdown.to_string(),
            created_by: created_by.to_string(),
            created_at: Utc::now().timestamp(),
        };
        versions.push(version.clone());
        Ok(version)
    }

    async fn get_version(&self, version_id: &str) -> Result<Option<ChapterVersion>> {
        Ok(self
            .versions
            .read()
            .unwrap()
            .iter()
            .find(|v| v.id == version_id)
            .cloned())
    }

    async fn list_versions(&self, chapter_id: &str) -> Result<Vec<VersionSummary>> {
        let mut summaries: Vec<VersionSummary> = self
            .versions
            .read()
            .unwrap()
            .iter()
            .filter(|v| v.chapter_id == chapter_id)
            .map(|v| VersionSummary {
                id: v.id.clone(),
                version_number: v.version_number,
                created_at: v.created_at,
            })
            .collect();
        summaries.sort_by_key(|v| std::cmp::Reverse(v.version_number));
        Ok(summaries)
    }

    async fn replace_chunks(&self, chapter_id: &str, chunks: &[Chunk]) -> Result<()> {
        self.chunks
            .write()
            .unwrap()
            .insert(chapter_id.to_string(), chunks.to_vec());
        Ok(())
    }

    async fn list_chunks(&self, chapter_id: &str) -> Result<Vec<Chunk>> {
        Ok(self
            .chunks
            .read()
            .unwrap()
            .get(chapter_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_proposal(&self, proposal: &Proposal) -> Result<()> {
        self.proposals
            .write()
            .unwrap()
            .insert(proposal.id.clone(), proposal.clone());
        Ok(())
    }

    async fn get_proposal(&self, id: &str) -> Result<Option<Proposal>> {
        Ok(self.proposals.read().unwrap().get(id).cloned())
    }

    async fn list_proposals(
        &self,
        chapter_id: &str,
        status: Option<ProposalStatus>,
    ) -> Result<Vec<Proposal>> {
        let mut proposals: Vec<Proposal> = self
            .proposals
            .read()
            .unwrap()
            .values()
            .filter(|p| p.chapter_id == chapter_id)
            .filter(|p| status.map_or(true, |s| p.status == s))
            .cloned()
            .collect();
        proposals.sort_by_key(|p| std::cmp::Reverse(p.created_at));
        Ok(proposals)
    }

    async fn set_proposal_status(&self, id: &str, status: ProposalStatus) -> Result<bool> {
        let mut proposals = self.proposals.write().unwrap();
        match proposals.get_mut(id) {
            Some(p) => {
                p.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_comment(&self, comment: &Comment) -> Result<()> {
        self.comments
            .write()
            .unwrap()
            .insert(comment.id.clone(), comment.clone());
        Ok(())
    }

    async fn get_comment(&self, id: &str) -> Result<Option<Comment>> {
        Ok(self.comments.read().unwrap().get(id).cloned())
    }

    async fn list_comments(&self, chapter_id: &str) -> Result<Vec<Comment>> {
        let mut comments: Vec<Comment> = self
            .comments
            .read()
            .unwrap()
            .values()
            .filter(|c| c.chapter_id == chapter_id)
            .cloned()
            .collect();
        comments.sort_by_key(|c| std::cmp::Reverse(c.created_at));
        Ok(comments)
    }

    async fn set_comment_patch(&self, id: &str, patch: &str) -> Result<bool> {
        let mut comments = self.comments.write().unwrap();
        match comments.get_mut(id) {
            Some(c) => {
                c.suggested_patch = Some(patch.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_comment_status(&self, id: &str, status: CommentStatus) -> Result<bool> {
        let mut comments = self.comments.write().unwrap();
        match comments.get_mut(id) {
            Some(c) => {
                c.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
