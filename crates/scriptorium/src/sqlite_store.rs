//! SQLite-backed [`Store`] implementation.
//!
//! Maps each [`Store`] operation onto the schema created by
//! [`crate::migrate`]. Version numbering runs read-max-plus-insert
//! inside a single transaction, with `UNIQUE(chapter_id,
//! version_number)` as the backstop; chunk replacement is
//! delete-then-insert in its own transaction.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Row, SqlitePool};
use uuid::Uuid;

use scriptorium_core::models::{
    Book, Chapter, ChapterUpdate, ChapterVersion, Chunk, ChunkMetadata, Comment, CommentStatus,
    Proposal, ProposalStatus, VersionSummary,
};
use scriptorium_core::store::Store;

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn chapter_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Chapter> {
    let status: String = row.get("status");
    Ok(Chapter {
        id: row.get("id"),
        book_id: row.get("book_id"),
        title: row.get("title"),
        slug: row.get("slug"),
        position: row.get("position"),
        status: status.parse()?,
        summary: row.get("summary"),
        markdown_current: row.get("markdown_current"),
        word_count: row.get("word_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

const CHAPTER_COLUMNS: &str = "id, book_id, title, slug, position, status, summary, \
                               markdown_current, word_count, created_at, updated_at";

#[async_trait]
impl Store for SqliteStore {
    async fn insert_book(&self, book: &Book) -> Result<()> {
        sqlx::query("INSERT INTO books (id, title, created_at) VALUES (?, ?, ?)")
            .bind(&book.id)
            .bind(&book.title)
            .bind(book.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_book(&self, id: &str) -> Result<Option<Book>> {
        let row = sqlx::query("SELECT id, title, created_at FROM books WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| Book {
            id: r.get("id"),
            title: r.get("title"),
            created_at: r.get("created_at"),
        }))
    }

    async fn insert_chapter(&self, chapter: &Chapter) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chapters (id, book_id, title, slug, position, status, summary,
                                  markdown_current, word_count, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&chapter.id)
        .bind(&chapter.book_id)
        .bind(&chapter.title)
        .bind(&chapter.slug)
        .bind(chapter.position)
        .bind(chapter.status.as_str())
        .bind(&chapter.summary)
        .bind(&chapter.markdown_current)
        .bind(chapter.word_count)
        .bind(chapter.created_at)
        .bind(chapter.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_chapter(&self, id: &str) -> Result<Option<Chapter>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM chapters WHERE id = ?",
            CHAPTER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(Some(chapter_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_chapters(&self, book_id: &str) -> Result<Vec<Chapter>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM chapters WHERE book_id = ? ORDER BY position ASC",
            CHAPTER_COLUMNS
        ))
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;
        let mut chapters = Vec::with_capacity(rows.len());
        for row in &rows {
            chapters.push(chapter_from_row(row)?);
        }
        Ok(chapters)
    }

    async fn update_chapter(&self, id: &str, update: &ChapterUpdate) -> Result<bool> {
        let mut qb: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new("UPDATE chapters SET updated_at = ");
        qb.push_bind(Utc::now().timestamp());
        if let Some(title) = &update.title {
            qb.push(", title = ");
            qb.push_bind(title);
        }
        if let Some(status) = update.status {
            qb.push(", status = ");
            qb.push_bind(status.as_str());
        }
        if let Some(summary) = &update.summary {
            qb.push(", summary = ");
            qb.push_bind(summary.clone());
        }
        if let Some(markdown) = &update.markdown {
            qb.push(", markdown_current = ");
            qb.push_bind(markdown);
        }
        if let Some(word_count) = update.word_count {
            qb.push(", word_count = ");
            qb.push_bind(word_count);
        }
        if let Some(position) = update.position {
            qb.push(", position = ");
            qb.push_bind(position);
        }
        qb.push(" WHERE id = ");
        qb.push_bind(id);

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn max_position(&self, book_id: &str) -> Result<i64> {
        let max: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(position), 0) FROM chapters WHERE book_id = ?")
                .bind(book_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(max)
    }

    async fn append_version(
        &self,
        chapter_id: &str,
        markdown: &str,
        created_by: &str,
    ) -> Result<ChapterVersion> {
        let mut tx = self.pool.begin().await?;

        let max: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(version_number), 0) FROM chapter_versions WHERE chapter_id = ?",
        )
        .bind(chapter_id)
        .fetch_one(&mut *tx)
        .await?;

        let version = ChapterVersion {
            id: Uuid::new_v4().to_string(),
            chapter_id: chapter_id.to_string(),
            version_number: max + 1,
            markdown: markdown.to_string(),
            created_by: created_by.to_string(),
            created_at: Utc::now().timestamp(),
        };

        sqlx::query(
            r#"
            INSERT INTO chapter_versions (id, chapter_id, version_number, markdown, created_by, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&version.id)
        .bind(&version.chapter_id)
        .bind(version.version_number)
        .bind(&version.markdown)
        .bind(&version.created_by)
        .bind(version.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(version)
    }

    async fn get_version(&self, version_id: &str) -> Result<Option<ChapterVersion>> {
        let row = sqlx::query(
            "SELECT id, chapter_id, version_number, markdown, created_by, created_at \
             FROM chapter_versions WHERE id = ?",
        )
        .bind(version_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| ChapterVersion {
            id: r.get("id"),
            chapter_id: r.get("chapter_id"),
            version_number: r.get("version_number"),
            markdown: r.get("markdown"),
            created_by: r.get("created_by"),
            created_at: r.get("created_at"),
        }))
    }

    async fn list_versions(&self, chapter_id: &str) -> Result<Vec<VersionSummary>> {
        let rows = sqlx::query(
            "SELECT id, version_number, created_at FROM chapter_versions \
             WHERE chapter_id = ? ORDER BY version_number DESC",
        )
        .bind(chapter_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| VersionSummary {
                id: r.get("id"),
                version_number: r.get("version_number"),
                created_at: r.get("created_at"),
            })
            .collect())
    }

    async fn replace_chunks(&self, chapter_id: &str, chunks: &[Chunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chapter_chunks WHERE chapter_id = ?")
            .bind(chapter_id)
            .execute(&mut *tx)
            .await?;

        for chunk in chunks {
            let metadata_json = serde_json::to_string(&chunk.metadata)?;
            sqlx::query(
                r#"
                INSERT INTO chapter_chunks (id, chapter_id, chunk_index, heading_path,
                                            content, token_count, embedding, metadata_json)
                VALUES (?, ?, ?, ?, ?, ?, NULL, ?)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(chapter_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.heading_path)
            .bind(&chunk.content)
            .bind(chunk.token_count)
            .bind(&metadata_json)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_chunks(&self, chapter_id: &str) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            "SELECT chunk_index, heading_path, content, token_count, metadata_json \
             FROM chapter_chunks WHERE chapter_id = ? ORDER BY chunk_index ASC",
        )
        .bind(chapter_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| {
                let content: String = r.get("content");
                let metadata_json: String = r.get("metadata_json");
                let metadata =
                    serde_json::from_str(&metadata_json).unwrap_or_else(|_| ChunkMetadata {
                        length: content.len(),
                        split: false,
                    });
                Chunk {
                    chunk_index: r.get("chunk_index"),
                    heading_path: r.get("heading_path"),
                    content,
                    token_count: r.get("token_count"),
                    metadata,
                }
            })
            .collect())
    }

    async fn insert_proposal(&self, proposal: &Proposal) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chapter_proposals (id, chapter_id, instruction, proposed_markdown, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&proposal.id)
        .bind(&proposal.chapter_id)
        .bind(&proposal.instruction)
        .bind(&proposal.proposed_markdown)
        .bind(proposal.status.as_str())
        .bind(proposal.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_proposal(&self, id: &str) -> Result<Option<Proposal>> {
        let row = sqlx::query(
            "SELECT id, chapter_id, instruction, proposed_markdown, status, created_at \
             FROM chapter_proposals WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(r) => {
                let status: String = r.get("status");
                Ok(Some(Proposal {
                    id: r.get("id"),
                    chapter_id: r.get("chapter_id"),
                    instruction: r.get("instruction"),
                    proposed_markdown: r.get("proposed_markdown"),
                    status: status.parse()?,
                    created_at: r.get("created_at"),
                }))
            }
            None => Ok(None),
        }
    }

    async fn list_proposals(
        &self,
        chapter_id: &str,
        status: Option<ProposalStatus>,
    ) -> Result<Vec<Proposal>> {
        let mut qb: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
            "SELECT id, chapter_id, instruction, proposed_markdown, status, created_at \
             FROM chapter_proposals WHERE chapter_id = ",
        );
        qb.push_bind(chapter_id);
        if let Some(status) = status {
            qb.push(" AND status = ");
            qb.push_bind(status.as_str());
        }
        qb.push(" ORDER BY created_at DESC");

        let rows = qb.build().fetch_all(&self.pool).await?;
        let mut proposals = Vec::with_capacity(rows.len());
        for r in &rows {
            let status: String = r.get("status");
            proposals.push(Proposal {
                id: r.get("id"),
                chapter_id: r.get("chapter_id"),
                instruction: r.get("instruction"),
                proposed_markdown: r.get("proposed_markdown"),
                status: status.parse()?,
                created_at: r.get("created_at"),
            });
        }
        Ok(proposals)
    }

    async fn set_proposal_status(&self, id: &str, status: ProposalStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE chapter_proposals SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_comment(&self, comment: &Comment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chapter_comments (id, chapter_id, anchor_text, start_offset, end_offset,
                                          comment, suggested_patch, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&comment.id)
        .bind(&comment.chapter_id)
        .bind(&comment.anchor_text)
        .bind(comment.start_offset)
        .bind(comment.end_offset)
        .bind(&comment.comment)
        .bind(&comment.suggested_patch)
        .bind(comment.status.as_str())
        .bind(comment.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_comment(&self, id: &str) -> Result<Option<Comment>> {
        let row = sqlx::query(
            "SELECT id, chapter_id, anchor_text, start_offset, end_offset, comment, \
             suggested_patch, status, created_at FROM chapter_comments WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(r) => Ok(Some(comment_from_row(&r)?)),
            None => Ok(None),
        }
    }

    async fn list_comments(&self, chapter_id: &str) -> Result<Vec<Comment>> {
        let rows = sqlx::query(
            "SELECT id, chapter_id, anchor_text, start_offset, end_offset, comment, \
             suggested_patch, status, created_at FROM chapter_comments \
             WHERE chapter_id = ? ORDER BY created_at DESC",
        )
        .bind(chapter_id)
        .fetch_all(&self.pool)
        .await?;
        let mut comments = Vec::with_capacity(rows.len());
        for r in &rows {
            comments.push(comment_from_row(r)?);
        }
        Ok(comments)
    }

    async fn set_comment_patch(&self, id: &str, patch: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE chapter_comments SET suggested_patch = ? WHERE id = ?")
            .bind(patch)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_comment_status(&self, id: &str, status: CommentStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE chapter_comments SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn comment_from_row(r: &sqlx::sqlite::SqliteRow) -> Result<Comment> {
    let status: String = r.get("status");
    Ok(Comment {
        id: r.get("id"),
        chapter_id: r.get("chapter_id"),
        anchor_text: r.get("anchor_text"),
        start_offset: r.get("start_offset"),
        end_offset: r.get("end_offset"),
        comment: r.get("comment"),
        suggested_patch: r.get("suggested_patch"),
        status: status.parse()?,
        created_at: r.get("created_at"),
    })
}
