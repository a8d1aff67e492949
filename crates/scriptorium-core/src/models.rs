//! Core data models for the chapter content pipeline.
//!
//! These types represent the chapters, versions, chunks, proposals, and
//! editorial comments that flow through the save/restore and AI review
//! pipeline.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Owning entity for an ordered set of chapters.
#[derive(Debug, Clone, Serialize)]
pub struct Book {
    pub id: String,
    pub title: String,
    pub created_at: i64,
}

impl Book {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            created_at: Utc::now().timestamp(),
        }
    }
}

/// Editorial status of a chapter. Informational only — no transitions
/// are enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChapterStatus {
    Outline,
    Draft,
    Review,
    Final,
}

impl ChapterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChapterStatus::Outline => "outline",
            ChapterStatus::Draft => "draft",
            ChapterStatus::Review => "review",
            ChapterStatus::Final => "final",
        }
    }
}

impl std::str::FromStr for ChapterStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "outline" => Ok(ChapterStatus::Outline),
            "draft" => Ok(ChapterStatus::Draft),
            "review" => Ok(ChapterStatus::Review),
            "final" => Ok(ChapterStatus::Final),
            other => anyhow::bail!(
                "invalid chapter status: '{}'. Use outline, draft, review, or final.",
                other
            ),
        }
    }
}

/// A chapter row: the live markdown body plus cached derived fields.
#[derive(Debug, Clone, Serialize)]
pub struct Chapter {
    pub id: String,
    pub book_id: String,
    pub title: String,
    pub slug: String,
    /// Order within the book, 1-based.
    pub position: i64,
    pub status: ChapterStatus,
    pub summary: Option<String>,
    /// The live markdown body, overwritten by every save.
    pub markdown_current: String,
    /// Whitespace-token count of `markdown_current`, recomputed on save.
    pub word_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Chapter {
    pub fn new(book_id: impl Into<String>, title: impl Into<String>, position: i64) -> Self {
        let title = title.into();
        let now = Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            book_id: book_id.into(),
            slug: slugify(&title),
            title,
            position,
            status: ChapterStatus::Outline,
            summary: None,
            markdown_current: String::new(),
            word_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// An immutable snapshot of a chapter's markdown, appended on every
/// accepted save. Never updated; deleted only when the chapter is.
#[derive(Debug, Clone, Serialize)]
pub struct ChapterVersion {
    pub id: String,
    pub chapter_id: String,
    /// Monotonically increasing per chapter, starting at 1.
    pub version_number: i64,
    pub markdown: String,
    pub created_by: String,
    pub created_at: i64,
}

/// Lightweight version row for history listings (no markdown body).
#[derive(Debug, Clone, Serialize)]
pub struct VersionSummary {
    pub id: String,
    pub version_number: i64,
    pub created_at: i64,
}

/// Extra chunk facts carried alongside the content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Character length of the content at chunking time.
    pub length: usize,
    /// True when this chunk came from splitting an over-threshold section.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub split: bool,
}

/// A retrieval-sized slice of a chapter body, tagged with the nearest
/// preceding heading. Derived and fully rebuilt on every save; the
/// `embedding` column it is stored under stays NULL until the async
/// embedding job exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub chunk_index: i64,
    pub heading_path: Option<String>,
    pub content: String,
    /// Whitespace-token count, not a true tokenizer.
    pub token_count: i64,
    pub metadata: ChunkMetadata,
}

/// Lifecycle of an AI-proposed whole-document replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Pending,
    Applied,
    Rejected,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Pending => "pending",
            ProposalStatus::Applied => "applied",
            ProposalStatus::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for ProposalStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProposalStatus::Pending),
            "applied" => Ok(ProposalStatus::Applied),
            "rejected" => Ok(ProposalStatus::Rejected),
            other => anyhow::bail!("invalid proposal status: '{}'", other),
        }
    }
}

/// A pending AI-suggested replacement body for one chapter. Terminal
/// once applied or rejected — there is no re-opening.
#[derive(Debug, Clone, Serialize)]
pub struct Proposal {
    pub id: String,
    pub chapter_id: String,
    pub instruction: String,
    pub proposed_markdown: String,
    pub status: ProposalStatus,
    pub created_at: i64,
}

impl Proposal {
    pub fn new(
        chapter_id: impl Into<String>,
        instruction: impl Into<String>,
        proposed_markdown: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            chapter_id: chapter_id.into(),
            instruction: instruction.into(),
            proposed_markdown: proposed_markdown.into(),
            status: ProposalStatus::Pending,
            created_at: Utc::now().timestamp(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentStatus {
    Open,
    Applied,
}

impl CommentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentStatus::Open => "open",
            CommentStatus::Applied => "applied",
        }
    }
}

impl std::str::FromStr for CommentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(CommentStatus::Open),
            "applied" => Ok(CommentStatus::Applied),
            other => anyhow::bail!("invalid comment status: '{}'", other),
        }
    }
}

/// An editorial comment anchored (best-effort) to a span of the live
/// document. Offsets are captured at comment time and never adjusted,
/// so anchors can drift after unrelated edits.
#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub id: String,
    pub chapter_id: String,
    pub anchor_text: Option<String>,
    pub start_offset: Option<i64>,
    pub end_offset: Option<i64>,
    pub comment: String,
    pub suggested_patch: Option<String>,
    pub status: CommentStatus,
    pub created_at: i64,
}

impl Comment {
    pub fn new(chapter_id: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            chapter_id: chapter_id.into(),
            anchor_text: None,
            start_offset: None,
            end_offset: None,
            comment: comment.into(),
            suggested_patch: None,
            status: CommentStatus::Open,
            created_at: Utc::now().timestamp(),
        }
    }
}

/// The in-memory draft of a chapter as edited in a session: exactly
/// the four fields the save path compares for no-op detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterDraft {
    pub title: String,
    pub status: ChapterStatus,
    pub summary: Option<String>,
    pub markdown: String,
}

/// Explicit optional-field update for a chapter row.
///
/// Absent (`None`) means "leave as stored"; `summary: Some(None)`
/// clears the summary. Stores always bump `updated_at` when any field
/// is present.
#[derive(Debug, Clone, Default)]
pub struct ChapterUpdate {
    pub title: Option<String>,
    pub status: Option<ChapterStatus>,
    pub summary: Option<Option<String>>,
    pub markdown: Option<String>,
    pub word_count: Option<i64>,
    pub position: Option<i64>,
}

impl ChapterUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn status(mut self, status: ChapterStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn summary(mut self, summary: Option<String>) -> Self {
        self.summary = Some(summary);
        self
    }

    pub fn markdown(mut self, markdown: impl Into<String>) -> Self {
        let markdown = markdown.into();
        self.word_count = Some(word_count(&markdown));
        self.markdown = Some(markdown);
        self
    }

    pub fn position(mut self, position: i64) -> Self {
        self.position = Some(position);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.status.is_none()
            && self.summary.is_none()
            && self.markdown.is_none()
            && self.word_count.is_none()
            && self.position.is_none()
    }
}

/// Supported edit intents for AI proposal prompts.
///
/// The wire-level "mode" strings from the original flow are an open
/// set; internally they collapse to this closed enum with a free-text
/// escape hatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditIntent {
    Outline,
    Tighten,
    Expand,
    Continuity,
    Custom(String),
}

impl EditIntent {
    /// Parse a user-supplied mode string; anything unrecognized becomes
    /// a free-text custom intent rather than an error.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "outline" => EditIntent::Outline,
            "tighten" => EditIntent::Tighten,
            "expand" => EditIntent::Expand,
            "continuity" => EditIntent::Continuity,
            _ => EditIntent::Custom(s.trim().to_string()),
        }
    }

    /// Label rendered into the model prompt.
    pub fn label(&self) -> &str {
        match self {
            EditIntent::Outline => "outline",
            EditIntent::Tighten => "tighten",
            EditIntent::Expand => "expand",
            EditIntent::Continuity => "continuity",
            EditIntent::Custom(s) => s.as_str(),
        }
    }
}

/// Whitespace-token count of a markdown body.
pub fn word_count(markdown: &str) -> i64 {
    markdown.split_whitespace().count() as i64
}

/// Signature over the four draft fields, used by the editor session to
/// suppress redundant autosaves.
pub fn draft_signature(draft: &ChapterDraft) -> String {
    let mut hasher = Sha256::new();
    hasher.update(draft.title.as_bytes());
    hasher.update([0x1f]);
    hasher.update(draft.status.as_str().as_bytes());
    hasher.update([0x1f]);
    hasher.update(draft.summary.as_deref().unwrap_or("").as_bytes());
    hasher.update([0x1f]);
    hasher.update(draft.markdown.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// URL-safe slug for a chapter title, capped at 80 characters.
pub fn slugify(title: &str) -> String {
    let mut slug = String::new();
    let mut last_dash = true;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
        if slug.len() >= 80 {
            break;
        }
    }
    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() {
        "chapter".to_string()
    } else {
        slug
    }
}
