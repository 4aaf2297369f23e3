//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx with PostgreSQL,
//! following the repository pattern: API handlers talk to repositories
//! ([`handlers`]), repositories construct queries over records ([`models`]),
//! and all failures are categorized into [`errors::DbError`].
//!
//! Repositories wrap a `&mut PgConnection`, so callers decide whether an
//! operation runs on a plain acquired connection (read-only paths) or
//! inside a transaction (any read-modify-write sequence). Balance
//! mutations are expressed as single conditional UPDATE statements so that
//! concurrent requests cannot overdraw an account.

pub mod errors;
pub mod handlers;
pub mod models;
