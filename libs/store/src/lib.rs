//! Remote tabular store.
//!
//! This crate provides:
//! - The `TableStore` seam: select, insert, update and remote procedure calls
//!   over JSON rows
//! - `MemoryStore`: in-process tables with unique columns and registered
//!   procedures, for tests and local runs
//! - `RestStore`: a PostgREST / Supabase REST client
//! - `PgStore`: direct Postgres access through SQLx
//!
//! Uniqueness is a storage concern here. Every backend reports a violated
//! unique constraint as `StoreError::UniqueViolation` so callers can treat it
//! as a domain signal instead of checking before writing.

mod error;
mod ident;
pub mod memory;
pub mod postgres;
pub mod rest;
mod table;

pub use error::{StoreError, StoreResult};
pub use ident::validate_identifier;
pub use memory::{MemoryStore, MemoryTables, Procedure};
pub use postgres::{DbConfig, PgStore};
pub use rest::{RestConfig, RestStore};
pub use table::{Filter, Row, TableStore};
