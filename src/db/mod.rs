//! Persistence layer.
//!
//! A [`ConnectionManager`] lazily opens one shared connection to a
//! [`Backend`]; [`PersistenceAdapter`]s issue CRUD operations for one
//! resource each over that connection; [`ModelBinder`] exposes the same
//! operations on typed models.
//!
//! # Architecture
//!
//! - `error`: Storage-agnostic error types
//! - `record`: Untyped records, find options and identifier helpers
//! - `backend`: Trait definitions every storage backend implements
//! - `connection`: Connection configuration and the single-flight manager
//! - `adapter`: Per-resource CRUD with insert/update routing
//! - `hook`: The `before_save` hook in callback or future style
//! - `model`: Binding adapters to model types
//! - `memory`: In-process document store
//! - `sqlite`: SQLite-backed relational store

mod adapter;
mod backend;
mod callback;
mod connection;
mod error;
mod hook;
pub mod memory;
mod model;
mod record;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub(crate) mod utils;

#[cfg(test)]
mod critical_tests;

pub use adapter::{AdapterConfig, Constructor, PersistenceAdapter, SaveOperation, SaveOutcome};
pub use backend::{Backend, Connection};
pub use callback::with_callback;
pub use connection::{
    ConnectionConfig, ConnectionManager, ConnectionState, Credentials, Endpoint, WriteConcern,
};
pub use error::{DbError, DbResult};
pub use hook::{BeforeSave, HookDone};
pub use memory::{MemoryBackend, MemoryConnection, ObjectId};
pub use model::{Model, ModelBinder};
pub use record::{
    FindOptions, OBJECT_ID_KEY, Record, Sort, SortOrder, is_truthy, record_from_value,
    stringify_id,
};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteBackend, SqliteConnection};
