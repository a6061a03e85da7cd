//! Core data models for the file-stream gateway.
//!
//! These entities mirror what the metadata database stores about relayed
//! files and served bandwidth. They map cleanly to database tables via
//! `sqlx::FromRow` and serialize naturally as JSON via `serde`.

pub mod bandwidth;
pub mod file_record;
