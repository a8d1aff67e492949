//! Scriptorium: a local-first writing pipeline for book chapters.
//!
//! Chapters live in SQLite with full version history; every save
//! rebuilds a heading-aware chunk index, and an AI editor can stage
//! whole-chapter proposals, append patches, and suggest rewrites for
//! anchored comments. Exposed as both a CLI (`scrib`) and a small
//! JSON API.
//!
//! | Module         | Responsibility                                    |
//! |----------------|---------------------------------------------------|
//! | `config`       | TOML configuration loading and validation         |
//! | `db`           | SQLite connection pool setup                      |
//! | `migrate`      | Schema creation                                   |
//! | `sqlite_store` | SQLite implementation of the storage trait        |
//! | `save`         | Save/restore pipeline and chunk index rebuild     |
//! | `session`      | In-memory editor session with debounced autosave  |
//! | `proposals`    | AI proposal engine, patches, TOC, placement       |
//! | `comments`     | Anchored comments and rewrite suggestions         |
//! | `model_client` | OpenAI Responses API client                       |
//! | `server`       | Axum JSON API                                     |

pub mod comments;
pub mod config;
pub mod db;
pub mod migrate;
pub mod model_client;
pub mod proposals;
pub mod save;
pub mod server;
pub mod session;
pub mod sqlite_store;
