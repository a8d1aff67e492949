//! Editor session: the in-memory draft between keystrokes and saves.
//!
//! Holds the working copy of one chapter, tracks dirtiness against the
//! last saved signature, and decides when a debounced autosave is due.
//! Every edit restarts the debounce clock, so a save fires only after
//! the editor has been quiet for the full interval.

use std::time::{Duration, Instant};

use anyhow::Result;

use scriptorium_core::models::{
    draft_signature, Chapter, ChapterDraft, ChapterStatus,
};
use scriptorium_core::section::{extract_sections, splice_section, Section};
use scriptorium_core::store::Store;

use crate::save::{save_chapter, SaveOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Saving,
    Saved,
    Error(String),
}

/// One open chapter being edited.
pub struct EditorSession {
    chapter_id: String,
    draft: ChapterDraft,
    last_saved_signature: Option<String>,
    state: SessionState,
    debounce: Duration,
    last_edit: Option<Instant>,
}

impl EditorSession {
    /// Open a session over a stored chapter. The draft starts equal to
    /// the stored row, so the session opens clean.
    pub fn open(chapter: &Chapter, debounce: Duration) -> Self {
        let draft = ChapterDraft {
            title: chapter.title.clone(),
            status: chapter.status,
            summary: chapter.summary.clone(),
            markdown: chapter.markdown_current.clone(),
        };
        let signature = draft_signature(&draft);
        Self {
            chapter_id: chapter.id.clone(),
            draft,
            last_saved_signature: Some(signature),
            state: SessionState::Idle,
            debounce,
            last_edit: None,
        }
    }

    pub fn chapter_id(&self) -> &str {
        &self.chapter_id
    }

    pub fn draft(&self) -> &ChapterDraft {
        &self.draft
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    fn note_edit(&mut self) {
        self.last_edit = Some(Instant::now());
        self.state = SessionState::Idle;
    }

    pub fn edit_markdown(&mut self, markdown: impl Into<String>) {
        self.draft.markdown = markdown.into();
        self.note_edit();
    }

    pub fn edit_title(&mut self, title: impl Into<String>) {
        self.draft.title = title.into();
        self.note_edit();
    }

    pub fn edit_summary(&mut self, summary: Option<String>) {
        self.draft.summary = summary;
        self.note_edit();
    }

    pub fn edit_status(&mut self, status: ChapterStatus) {
        self.draft.status = status;
        self.note_edit();
    }

    /// True when the draft differs from the last saved state.
    pub fn is_dirty(&self) -> bool {
        self.last_saved_signature.as_deref() != Some(draft_signature(&self.draft).as_str())
    }

    /// True when the debounce interval has elapsed since the last edit
    /// and the draft is dirty. Each edit restarts the clock.
    pub fn autosave_due(&self, now: Instant) -> bool {
        match self.last_edit {
            Some(last) => now.duration_since(last) >= self.debounce && self.is_dirty(),
            None => false,
        }
    }

    /// Persist the draft through the save pipeline. On success the
    /// signature and state are updated; on failure the draft is kept
    /// so nothing typed is lost, and the error is surfaced in both the
    /// state and the return value.
    pub async fn save(
        &mut self,
        store: &dyn Store,
        max_chars: usize,
        created_by: &str,
    ) -> Result<SaveOutcome> {
        self.state = SessionState::Saving;
        match save_chapter(store, &self.chapter_id, &self.draft, max_chars, created_by).await {
            Ok(outcome) => {
                self.last_saved_signature = Some(draft_signature(&self.draft));
                self.last_edit = None;
                self.state = SessionState::Saved;
                Ok(outcome)
            }
            Err(e) => {
                self.state = SessionState::Error(e.to_string());
                Err(e)
            }
        }
    }

    /// Heading-delimited sections of the current draft.
    pub fn sections(&self) -> Vec<Section> {
        extract_sections(&self.draft.markdown)
    }

    /// Section by index into [`sections`](Self::sections), with its
    /// current text.
    pub fn select_section(&self, index: usize) -> Option<(Section, String)> {
        let section = self.sections().into_iter().nth(index)?;
        let text = self.draft.markdown[section.start..section.end].to_string();
        Some((section, text))
    }

    /// Replace a section's span with new text and mark the draft
    /// edited.
    pub fn apply_section(&mut self, section: &Section, replacement: &str) {
        self.draft.markdown = splice_section(&self.draft.markdown, section, replacement);
        self.note_edit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scriptorium_core::models::Book;
    use scriptorium_core::store::memory::InMemoryStore;

    const DEBOUNCE: Duration = Duration::from_millis(1500);

    async fn seed(store: &InMemoryStore, markdown: &str) -> Chapter {
        let book = Book::new("Book");
        store.insert_book(&book).await.unwrap();
        let mut chapter = Chapter::new(&book.id, "Alpha", 1);
        chapter.markdown_current = markdown.into();
        store.insert_chapter(&chapter).await.unwrap();
        chapter
    }

    #[tokio::test]
    async fn session_opens_clean_and_dirties_on_edit() {
        let store = InMemoryStore::new();
        let chapter = seed(&store, "body").await;

        let mut session = EditorSession::open(&chapter, DEBOUNCE);
        assert!(!session.is_dirty());
        assert_eq!(*session.state(), SessionState::Idle);

        session.edit_markdown("body changed");
        assert!(session.is_dirty());

        session.edit_markdown("body");
        assert!(!session.is_dirty());
    }

    #[test]
    fn autosave_waits_out_the_debounce() {
        let chapter = Chapter::new("book", "Alpha", 1);
        let mut session = EditorSession::open(&chapter, DEBOUNCE);

        assert!(!session.autosave_due(Instant::now()));

        session.edit_markdown("typed something");
        let now = Instant::now();
        assert!(!session.autosave_due(now + Duration::from_millis(100)));
        assert!(session.autosave_due(now + Duration::from_millis(1600)));
    }

    #[test]
    fn clean_draft_never_autosaves() {
        let chapter = Chapter::new("book", "Alpha", 1);
        let mut session = EditorSession::open(&chapter, DEBOUNCE);

        session.edit_markdown("changed");
        session.edit_markdown("");
        assert!(!session.autosave_due(Instant::now() + Duration::from_secs(10)));
    }

    #[tokio::test]
    async fn save_records_signature_and_state() {
        let store = InMemoryStore::new();
        let chapter = seed(&store, "one").await;

        let mut session = EditorSession::open(&chapter, DEBOUNCE);
        session.edit_markdown("two");

        let outcome = session.save(&store, 2000, "tester").await.unwrap();
        assert_eq!(outcome, SaveOutcome::Saved { version: 1 });
        assert_eq!(*session.state(), SessionState::Saved);
        assert!(!session.is_dirty());
        assert!(!session.autosave_due(Instant::now() + Duration::from_secs(10)));
    }

    #[tokio::test]
    async fn failed_save_keeps_the_draft() {
        let store = InMemoryStore::new();
        let mut chapter = Chapter::new("book", "Ghost", 1);
        chapter.markdown_current = "stored".into();
        // Never inserted, so the save pipeline cannot find it.

        let mut session = EditorSession::open(&chapter, DEBOUNCE);
        session.edit_markdown("typed but unsaved");

        let err = session.save(&store, 2000, "tester").await.unwrap_err();
        assert!(err.to_string().contains("chapter not found"));
        assert!(matches!(session.state(), SessionState::Error(_)));
        assert_eq!(session.draft().markdown, "typed but unsaved");
        assert!(session.is_dirty());
    }

    #[tokio::test]
    async fn section_edit_splices_into_the_draft() {
        let store = InMemoryStore::new();
        let chapter = seed(&store, "intro\n\n# One\nalpha\n\n# Two\nbeta").await;

        let mut session = EditorSession::open(&chapter, DEBOUNCE);
        let sections = session.sections();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].heading, "One");

        let (section, text) = session.select_section(0).unwrap();
        assert_eq!(text, "# One\nalpha\n");

        session.apply_section(&section, "# One\nrewritten alpha");
        assert_eq!(
            session.draft().markdown,
            "intro\n\n# One\nrewritten alpha\n\n# Two\nbeta"
        );
        assert!(session.is_dirty());
    }
}
