//! # Scriptorium Core
//!
//! Shared, runtime-free logic for Scriptorium: chapter data models,
//! the markdown chunker, line-level diff, section extraction, comment
//! anchor resolution, and the store abstraction.
//!
//! This crate carries no sqlx, network, or filesystem dependencies,
//! and no runtime beyond what tests need. Everything here is pure
//! computation plus the async [`store::Store`] trait (with an
//! in-memory implementation used by unit tests).

pub mod anchor;
pub mod chunk;
pub mod diff;
pub mod models;
pub mod section;
pub mod store;
