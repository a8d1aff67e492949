//! HTTP API over the chapter pipeline.
//!
//! Thin JSON routes over the same functions the CLI calls. Errors are
//! classified from their messages into `{"error": {"code", "message"}}`
//! responses; CORS is wide open so a local editor frontend can talk to
//! the server directly.

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use scriptorium_core::diff::diff_lines;
use scriptorium_core::models::{ChapterDraft, ChapterStatus, EditIntent};
use scriptorium_core::store::Store;

use crate::comments::{add_comment, apply_comment, suggest_rewrite};
use crate::config::Config;
use crate::model_client::CompletionModel;
use crate::proposals::{
    append_patch, apply_proposal, propose_chapter, reject_proposal,
};
use crate::save::{restore_version, save_chapter, SaveOutcome};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub model: Arc<dyn CompletionModel>,
    pub config: Arc<Config>,
}

/// API error with an HTTP status and a stable error code.
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": { "code": self.code, "message": self.message }
        });
        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        classify(err)
    }
}

/// Map pipeline errors onto HTTP statuses by message shape. The
/// pipeline speaks anyhow, so the seams are its error strings.
fn classify(err: anyhow::Error) -> AppError {
    let message = err.to_string();
    if message.contains("not found") {
        AppError {
            status: StatusCode::NOT_FOUND,
            code: "not_found",
            message,
        }
    } else if message.contains("must not be empty")
        || message.contains("invalid")
        || message.contains("already")
        || message.contains("does not belong")
    {
        AppError {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            message,
        }
    } else if message.contains("model API") || message.contains("OPENAI_API_KEY") {
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "model_error",
            message,
        }
    } else {
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
            message,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chapters/{id}", get(get_chapter))
        .route("/chapters/{id}/save", post(save))
        .route("/chapters/{id}/restore", post(restore))
        .route("/chapters/{id}/versions", get(versions))
        .route("/chapters/{id}/patch", post(patch))
        .route("/chapters/{id}/propose", post(propose))
        .route("/chapters/{id}/comments", get(list_comments).post(create_comment))
        .route("/proposals/{id}/diff", get(proposal_diff))
        .route("/proposals/{id}/apply", post(proposal_apply))
        .route("/proposals/{id}/reject", post(proposal_reject))
        .route("/comments/{id}/suggest", post(comment_suggest))
        .route("/comments/{id}/apply", post(comment_apply))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(state: AppState) -> Result<()> {
    let bind = state.config.server.bind.clone();
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    println!("Scriptorium API listening on http://{}", bind);
    axum::serve(listener, router).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn get_chapter(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let chapter = state
        .store
        .get_chapter(&id)
        .await?
        .ok_or_else(|| classify(anyhow::anyhow!("chapter not found: {}", id)))?;
    let chunks = state.store.list_chunks(&id).await?;
    Ok(Json(json!({ "chapter": chapter, "chunks": chunks })))
}

#[derive(Deserialize)]
struct SaveRequest {
    title: String,
    status: String,
    #[serde(default)]
    summary: Option<String>,
    markdown: String,
}

async fn save(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SaveRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let status: ChapterStatus = req.status.parse()?;
    let draft = ChapterDraft {
        title: req.title,
        status,
        summary: req.summary,
        markdown: req.markdown,
    };
    let outcome = save_chapter(
        state.store.as_ref(),
        &id,
        &draft,
        state.config.chunking.max_chars,
        "api",
    )
    .await?;
    Ok(Json(match outcome {
        SaveOutcome::Unchanged => json!({ "unchanged": true }),
        SaveOutcome::Saved { version } => json!({ "unchanged": false, "version": version }),
    }))
}

#[derive(Deserialize)]
struct RestoreRequest {
    version_id: String,
}

async fn restore(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<RestoreRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let version = restore_version(
        state.store.as_ref(),
        &id,
        &req.version_id,
        state.config.chunking.max_chars,
    )
    .await?;
    Ok(Json(json!({ "restored_version": version })))
}

async fn versions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let versions = state.store.list_versions(&id).await?;
    Ok(Json(json!({ "versions": versions })))
}

#[derive(Deserialize)]
struct PatchRequest {
    patch: String,
}

async fn patch(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<PatchRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let version = append_patch(
        state.store.as_ref(),
        &id,
        &req.patch,
        state.config.chunking.max_chars,
        "api",
    )
    .await?;
    Ok(Json(json!({ "version": version })))
}

#[derive(Deserialize)]
struct ProposeRequest {
    #[serde(default)]
    intent: Option<String>,
    instruction: String,
}

async fn propose(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ProposeRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let intent = req
        .intent
        .as_deref()
        .map(EditIntent::parse)
        .unwrap_or(EditIntent::Custom(req.instruction.clone()));
    let proposal = propose_chapter(
        state.store.as_ref(),
        state.model.as_ref(),
        &id,
        &intent,
        &req.instruction,
    )
    .await?;
    Ok(Json(json!({ "proposal": proposal })))
}

async fn proposal_diff(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let proposal = state
        .store
        .get_proposal(&id)
        .await?
        .ok_or_else(|| classify(anyhow::anyhow!("proposal not found: {}", id)))?;
    let chapter = state
        .store
        .get_chapter(&proposal.chapter_id)
        .await?
        .ok_or_else(|| classify(anyhow::anyhow!("chapter not found: {}", proposal.chapter_id)))?;
    let runs = diff_lines(&chapter.markdown_current, &proposal.proposed_markdown);
    Ok(Json(json!({ "proposal": proposal, "diff": runs })))
}

async fn proposal_apply(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let version = apply_proposal(
        state.store.as_ref(),
        &id,
        state.config.chunking.max_chars,
        "api",
    )
    .await?;
    Ok(Json(json!({ "version": version })))
}

async fn proposal_reject(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    reject_proposal(state.store.as_ref(), &id).await?;
    Ok(Json(json!({ "rejected": true })))
}

#[derive(Deserialize)]
struct CommentRequest {
    text: String,
    #[serde(default)]
    anchor_text: Option<String>,
    #[serde(default)]
    start_offset: Option<usize>,
    #[serde(default)]
    end_offset: Option<usize>,
    #[serde(default)]
    suggested_patch: Option<String>,
}

async fn create_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let span = match (req.start_offset, req.end_offset) {
        (Some(start), Some(end)) => Some(scriptorium_core::anchor::AnchorSpan { start, end }),
        _ => None,
    };
    let comment = add_comment(
        state.store.as_ref(),
        &id,
        &req.text,
        req.anchor_text,
        span,
        req.suggested_patch,
    )
    .await?;
    Ok(Json(json!({ "comment": comment })))
}

async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let comments = state.store.list_comments(&id).await?;
    Ok(Json(json!({ "comments": comments })))
}

async fn comment_suggest(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let suggestion = suggest_rewrite(state.store.as_ref(), state.model.as_ref(), &id).await?;
    Ok(Json(json!({ "suggested_patch": suggestion })))
}

async fn comment_apply(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let version = apply_comment(
        state.store.as_ref(),
        &id,
        state.config.chunking.max_chars,
        "api",
    )
    .await?;
    Ok(Json(json!({ "version": version })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_classify_by_message() {
        let e = classify(anyhow::anyhow!("chapter not found: abc"));
        assert_eq!(e.status, StatusCode::NOT_FOUND);
        assert_eq!(e.code, "not_found");

        let e = classify(anyhow::anyhow!("patch must not be empty"));
        assert_eq!(e.status, StatusCode::BAD_REQUEST);

        let e = classify(anyhow::anyhow!("proposal is already applied"));
        assert_eq!(e.status, StatusCode::BAD_REQUEST);

        let e = classify(anyhow::anyhow!("model API error 500: down"));
        assert_eq!(e.code, "model_error");

        let e = classify(anyhow::anyhow!("disk exploded"));
        assert_eq!(e.code, "internal");
    }
}
