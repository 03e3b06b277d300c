//! SQLite implementation of the backend traits.
//!
//! Records are stored as JSON documents keyed by an integer row id, one
//! table per resource.

mod connection;
mod helpers;


pub use connection::{SqliteBackend, SqliteConnection};
