//! Backend traits for storage engines.
//!
//! These traits define the contract between the generic adapter layer and a
//! concrete storage engine, allowing document and relational stores to be
//! swapped without changing the adapter or the models bound to it.

use std::future::Future;

use serde_json::Value;

use crate::db::{ConnectionConfig, Credentials, DbResult, FindOptions, Record};

/// A storage engine that can open connections.
pub trait Backend: Send + Sync + 'static {
    /// Live connection handle. Cloning shares the same underlying connection.
    type Connection: Connection;

    /// Short name used in log events.
    fn name(&self) -> &'static str;

    /// Primary-key field used when an adapter does not name one.
    fn default_primary_key(&self) -> &'static str;

    /// Open a connection described by `config`.
    fn connect(
        &self,
        config: &ConnectionConfig,
    ) -> impl Future<Output = DbResult<Self::Connection>> + Send;

    /// Authenticate an open connection.
    fn authenticate(
        &self,
        connection: &Self::Connection,
        credentials: &Credentials,
    ) -> impl Future<Output = DbResult<()>> + Send;

    /// Coerce a textual identifier into the backend's native identifier.
    fn to_native_id(&self, raw: &str) -> DbResult<Value>;
}

/// Operations issued against an open connection.
///
/// `primary_key` names the field that identifies a record in `resource`;
/// identifiers passed in are already in native form.
pub trait Connection: Clone + Send + Sync + 'static {
    /// First record matching `query`, if any.
    fn find_one(
        &self,
        resource: &str,
        primary_key: &str,
        query: &Record,
        options: &FindOptions,
    ) -> impl Future<Output = DbResult<Option<Record>>> + Send;

    /// All records matching `query`.
    fn find_all(
        &self,
        resource: &str,
        primary_key: &str,
        query: &Record,
        options: &FindOptions,
    ) -> impl Future<Output = DbResult<Vec<Record>>> + Send;

    /// Insert `record` and return its assigned identifier.
    fn insert(
        &self,
        resource: &str,
        primary_key: &str,
        record: Record,
    ) -> impl Future<Output = DbResult<Value>> + Send;

    /// Replace the record identified by `id`. Returns the number of records matched.
    fn update(
        &self,
        resource: &str,
        primary_key: &str,
        id: &Value,
        record: Record,
    ) -> impl Future<Output = DbResult<u64>> + Send;

    /// Delete the record identified by `id`. Returns the number of records removed.
    fn remove(
        &self,
        resource: &str,
        primary_key: &str,
        id: &Value,
    ) -> impl Future<Output = DbResult<u64>> + Send;

    /// Distinct values of `field` among records matching `query`.
    fn distinct(
        &self,
        resource: &str,
        primary_key: &str,
        field: &str,
        query: &Record,
    ) -> impl Future<Output = DbResult<Vec<Value>>> + Send;
}
