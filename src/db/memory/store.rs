//! In-process document store.
//!
//! A [`MemoryBackend`] plays the part of a document database server: it
//! holds named databases made of collections of JSON documents, assigns
//! [`ObjectId`] identifiers on insert, and optionally requires users to
//! authenticate. Every clone of a backend talks to the same server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde_json::Value;
use tracing::trace;

use super::ObjectId;
use crate::db::utils::{apply_find_options, distinct_values, matches_query};
use crate::db::{
    Backend, Connection, ConnectionConfig, Credentials, DbError, DbResult, FindOptions, Record,
    WriteConcern, is_truthy,
};

/// Database used when the configuration does not name one.
pub const DEFAULT_DATABASE: &str = "test";

type Collections = HashMap<String, Vec<Record>>;

struct Server {
    databases: RwLock<HashMap<String, Arc<RwLock<Collections>>>>,
    users: RwLock<HashMap<String, String>>,
    available: AtomicBool,
    connections: AtomicUsize,
    authentications: AtomicUsize,
}

/// Counters describing what the server has been asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServerStats {
    /// Connections opened.
    pub connections: usize,
    /// Successful authentications.
    pub authentications: usize,
}

/// Document-store backend.
#[derive(Clone)]
pub struct MemoryBackend {
    server: Arc<Server>,
    latency: Option<Duration>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            server: Arc::new(Server {
                databases: RwLock::new(HashMap::new()),
                users: RwLock::new(HashMap::new()),
                available: AtomicBool::new(true),
                connections: AtomicUsize::new(0),
                authentications: AtomicUsize::new(0),
            }),
            latency: None,
        }
    }

    /// Delay every connect and authenticate round-trip by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Register a user that may authenticate.
    pub fn with_user(self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.add_user(user, password);
        self
    }

    pub fn add_user(&self, user: impl Into<String>, password: impl Into<String>) {
        write(&self.server.users).insert(user.into(), password.into());
    }

    /// Make the server accept or refuse new connections.
    pub fn set_available(&self, available: bool) {
        self.server.available.store(available, Ordering::SeqCst);
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            connections: self.server.connections.load(Ordering::SeqCst),
            authentications: self.server.authentications.load(Ordering::SeqCst),
        }
    }

    async fn round_trip(&self) {
        match self.latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }
    }
}

impl Backend for MemoryBackend {
    type Connection = MemoryConnection;

    fn name(&self) -> &'static str {
        "memory"
    }

    fn default_primary_key(&self) -> &'static str {
        "_id"
    }

    async fn connect(&self, config: &ConnectionConfig) -> DbResult<MemoryConnection> {
        self.round_trip().await;

        if !self.server.available.load(Ordering::SeqCst) {
            return Err(DbError::Connection {
                message: "memory server is not accepting connections".to_string(),
            });
        }

        let name = config
            .database_name()
            .unwrap_or(DEFAULT_DATABASE)
            .to_string();
        let database = {
            let mut databases = write(&self.server.databases);
            Arc::clone(databases.entry(name.clone()).or_default())
        };
        self.server.connections.fetch_add(1, Ordering::SeqCst);

        Ok(MemoryConnection {
            database,
            database_name: name,
            write_concern: config.write_concern().unwrap_or_default(),
        })
    }

    async fn authenticate(
        &self,
        _connection: &MemoryConnection,
        credentials: &Credentials,
    ) -> DbResult<()> {
        self.round_trip().await;

        let accepted = read(&self.server.users)
            .get(&credentials.user)
            .is_some_and(|password| *password == credentials.password);
        if !accepted {
            return Err(DbError::Connection {
                message: format!("authentication failed for user '{}'", credentials.user),
            });
        }

        self.server.authentications.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn to_native_id(&self, raw: &str) -> DbResult<Value> {
        raw.parse::<ObjectId>().map(|id| id.to_value())
    }
}

/// Connection to one database on a [`MemoryBackend`].
#[derive(Clone)]
pub struct MemoryConnection {
    database: Arc<RwLock<Collections>>,
    database_name: String,
    write_concern: WriteConcern,
}

impl MemoryConnection {
    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    pub fn write_concern(&self) -> WriteConcern {
        self.write_concern
    }

    fn matching(&self, resource: &str, query: &Record) -> Vec<Record> {
        read(&self.database)
            .get(resource)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|doc| matches_query(doc, query))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

// Primary key first, then the remaining fields in their original order.
fn with_primary_key(primary_key: &str, id: Value, mut record: Record) -> Record {
    record.shift_remove(primary_key);
    let mut stored = Record::new();
    stored.insert(primary_key.to_string(), id);
    stored.extend(record);
    stored
}

impl Connection for MemoryConnection {
    async fn find_one(
        &self,
        resource: &str,
        primary_key: &str,
        query: &Record,
        options: &FindOptions,
    ) -> DbResult<Option<Record>> {
        let options = FindOptions {
            limit: Some(1),
            ..options.clone()
        };
        let found = apply_find_options(self.matching(resource, query), &options, primary_key);
        Ok(found.into_iter().next())
    }

    async fn find_all(
        &self,
        resource: &str,
        primary_key: &str,
        query: &Record,
        options: &FindOptions,
    ) -> DbResult<Vec<Record>> {
        Ok(apply_find_options(
            self.matching(resource, query),
            options,
            primary_key,
        ))
    }

    async fn insert(&self, resource: &str, primary_key: &str, record: Record) -> DbResult<Value> {
        let id = match record.get(primary_key) {
            Some(id) if is_truthy(id) => id.clone(),
            _ => ObjectId::new().to_value(),
        };
        let document = with_primary_key(primary_key, id.clone(), record);

        let mut database = write(&self.database);
        let collection = database.entry(resource.to_string()).or_default();
        if collection
            .iter()
            .any(|doc| doc.get(primary_key) == Some(&id))
        {
            return Err(DbError::backend(
                "insert",
                resource,
                format!("duplicate key {} = {}", primary_key, id),
            ));
        }
        collection.push(document);

        trace!(resource, write_concern = %self.write_concern, "document inserted");
        Ok(id)
    }

    async fn update(
        &self,
        resource: &str,
        primary_key: &str,
        id: &Value,
        record: Record,
    ) -> DbResult<u64> {
        let mut database = write(&self.database);
        let Some(slot) = database
            .get_mut(resource)
            .and_then(|docs| docs.iter_mut().find(|doc| doc.get(primary_key) == Some(id)))
        else {
            return Ok(0);
        };
        *slot = with_primary_key(primary_key, id.clone(), record);

        trace!(resource, write_concern = %self.write_concern, "document replaced");
        Ok(1)
    }

    async fn remove(&self, resource: &str, primary_key: &str, id: &Value) -> DbResult<u64> {
        let mut database = write(&self.database);
        let Some(documents) = database.get_mut(resource) else {
            return Ok(0);
        };
        let before = documents.len();
        documents.retain(|doc| doc.get(primary_key) != Some(id));
        Ok((before - documents.len()) as u64)
    }

    async fn distinct(
        &self,
        resource: &str,
        _primary_key: &str,
        field: &str,
        query: &Record,
    ) -> DbResult<Vec<Value>> {
        Ok(distinct_values(&self.matching(resource, query), field))
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
