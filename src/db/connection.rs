//! Connection configuration and the single-flight connection manager.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::db::{Backend, DbError, DbResult};

// =============================================================================
// Configuration
// =============================================================================

/// Where the backend lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Connection URL, e.g. `sqlite://people.db` or `memory://localhost/app`.
    Url(String),
    /// Explicit server address and database name.
    Address {
        host: String,
        port: u16,
        database: String,
    },
}

/// User credentials for the post-connect authentication step.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Write-durability level requested from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteConcern {
    /// Fire and forget.
    Unacknowledged,
    /// The backend acknowledges each write.
    #[default]
    Acknowledged,
    /// The write is flushed to durable storage before acknowledging.
    Journaled,
}

impl fmt::Display for WriteConcern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriteConcern::Unacknowledged => "unacknowledged",
            WriteConcern::Acknowledged => "acknowledged",
            WriteConcern::Journaled => "journaled",
        };
        f.write_str(name)
    }
}

impl FromStr for WriteConcern {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unacknowledged" | "none" => Ok(WriteConcern::Unacknowledged),
            "acknowledged" | "safe" => Ok(WriteConcern::Acknowledged),
            "journaled" | "journal" => Ok(WriteConcern::Journaled),
            other => Err(DbError::Configuration {
                message: format!(
                    "unknown write concern '{other}' \
                     (expected unacknowledged, acknowledged or journaled)"
                ),
            }),
        }
    }
}

/// Backend connection settings. Immutable once handed to a [`ConnectionManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    endpoint: Endpoint,
    credentials: Option<Credentials>,
    write_concern: Option<WriteConcern>,
}

impl ConnectionConfig {
    /// Configure a connection by URL.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            endpoint: Endpoint::Url(url.into()),
            credentials: None,
            write_concern: None,
        }
    }

    /// Configure a connection by explicit server address.
    pub fn from_address(host: impl Into<String>, port: u16, database: impl Into<String>) -> Self {
        Self {
            endpoint: Endpoint::Address {
                host: host.into(),
                port,
                database: database.into(),
            },
            credentials: None,
            write_concern: None,
        }
    }

    pub fn with_credentials(
        mut self,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(Credentials {
            user: user.into(),
            password: password.into(),
        });
        self
    }

    pub fn with_write_concern(mut self, write_concern: WriteConcern) -> Self {
        self.write_concern = Some(write_concern);
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn write_concern(&self) -> Option<WriteConcern> {
        self.write_concern
    }

    /// Database name: the address's database, or the last path segment of the URL.
    pub fn database_name(&self) -> Option<&str> {
        match &self.endpoint {
            Endpoint::Address { database, .. } => Some(database.as_str()),
            Endpoint::Url(url) => {
                let rest = url.split_once("://").map_or(url.as_str(), |(_, r)| r);
                let path = rest.split(['?', '#']).next().unwrap_or_default();
                path.split_once('/')
                    .map(|(_, db)| db.trim_matches('/'))
                    .filter(|db| !db.is_empty())
            }
        }
    }
}

// =============================================================================
// Connection Manager
// =============================================================================

/// Observable lifecycle state of a [`ConnectionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Opening,
    Open,
}

type Attempt<C> = Shared<BoxFuture<'static, DbResult<C>>>;

enum Slot<C> {
    Closed,
    Opening { attempt: u64, future: Attempt<C> },
    Open(C),
}

/// Lazily opens exactly one backend connection and shares it.
///
/// The first caller of [`acquire`](Self::acquire) that finds the manager
/// closed spawns a connect (and, with credentials, authenticate) attempt
/// onto the runtime and publishes its handle as a shared future. Every
/// caller arriving while that attempt is in flight awaits the same future,
/// so all of them observe the same connection or the same error. The
/// attempt runs to completion even if every caller stops waiting. A failed
/// attempt returns the manager to `Closed`; the next call starts a fresh
/// attempt.
pub struct ConnectionManager<B: Backend> {
    backend: Arc<B>,
    config: Arc<ConnectionConfig>,
    slot: Arc<Mutex<Slot<B::Connection>>>,
    attempts: AtomicU64,
}

impl<B: Backend> ConnectionManager<B> {
    pub fn new(backend: B, config: ConnectionConfig) -> Self {
        Self {
            backend: Arc::new(backend),
            config: Arc::new(config),
            slot: Arc::new(Mutex::new(Slot::Closed)),
            attempts: AtomicU64::new(0),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        match &*self.lock_slot() {
            Slot::Closed => ConnectionState::Closed,
            Slot::Opening { .. } => ConnectionState::Opening,
            Slot::Open(_) => ConnectionState::Open,
        }
    }

    /// Number of connection attempts started so far.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Return the shared connection, opening it on first use.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn acquire(&self) -> DbResult<B::Connection> {
        let future = {
            let mut slot = self.lock_slot();
            match &*slot {
                Slot::Open(connection) => return Ok(connection.clone()),
                Slot::Opening { future, .. } => future.clone(),
                Slot::Closed => {
                    let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    let future = self.open(attempt).shared();
                    *slot = Slot::Opening {
                        attempt,
                        future: future.clone(),
                    };
                    future
                }
            }
        };

        future.await
    }

    fn open(&self, attempt: u64) -> BoxFuture<'static, DbResult<B::Connection>> {
        let backend = Arc::clone(&self.backend);
        let config = Arc::clone(&self.config);
        let slot = Arc::clone(&self.slot);
        let name = backend.name();

        let task = tokio::spawn({
            let slot = Arc::clone(&slot);
            async move {
                debug!(backend = name, attempt, "opening connection");
                let outcome = connect_and_authenticate(&*backend, &config).await;
                settle(&slot, name, attempt, &outcome);
                outcome
            }
        });

        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    let outcome = Err(DbError::Connection {
                        message: format!("connection attempt did not complete: {err}"),
                    });
                    settle(&slot, name, attempt, &outcome);
                    outcome
                }
            }
        }
        .boxed()
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot<B::Connection>> {
        lock(&self.slot)
    }
}

async fn connect_and_authenticate<B: Backend>(
    backend: &B,
    config: &ConnectionConfig,
) -> DbResult<B::Connection> {
    let connection = backend.connect(config).await?;
    if let Some(credentials) = config.credentials() {
        debug!(backend = backend.name(), user = %credentials.user, "authenticating");
        backend.authenticate(&connection, credentials).await?;
    }
    Ok(connection)
}

// Only the attempt that is still current may move the state on.
fn settle<C: Clone>(
    slot: &Mutex<Slot<C>>,
    backend: &'static str,
    attempt: u64,
    outcome: &DbResult<C>,
) {
    let mut slot = lock(slot);
    if let Slot::Opening { attempt: current, .. } = &*slot
        && *current == attempt
    {
        *slot = match outcome {
            Ok(connection) => {
                debug!(backend, attempt, "connection open");
                Slot::Open(connection.clone())
            }
            Err(_) => {
                debug!(backend, attempt, "connection attempt failed, state reset to closed");
                Slot::Closed
            }
        };
    }
}

fn lock<C>(slot: &Mutex<Slot<C>>) -> MutexGuard<'_, Slot<C>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
