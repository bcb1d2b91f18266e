//! Storage layer for nexora-queue.
//!
//! SQLite-based persistence for queued operations. The store file is the only
//! state shared between the foreground and the background worker.

mod database;
mod migrations;

pub use database::Database;
