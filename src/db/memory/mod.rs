//! In-memory document-store implementation of the backend traits.
//!
//! Records are JSON documents keyed by `_id`, with identifiers encoded as
//! extended JSON (`{"$oid": "..."}`).

mod object_id;
mod store;


pub use object_id::ObjectId;
pub use store::{DEFAULT_DATABASE, MemoryBackend, MemoryConnection, ServerStats};
