//! Database module: models and schema for persistent token storage.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `actor.rs`: the actor that owns the pool

pub mod actor;
pub mod models;
pub mod schema;

pub use models::{DbOauthToken, TokenUpsert};
pub use schema::SQLITE_INIT;

pub use actor::{DbActorHandle, spawn};
