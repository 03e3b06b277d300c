//! Per-resource persistence adapter.
//!
//! A [`PersistenceAdapter`] targets one collection or table. It obtains the
//! shared connection from a [`ConnectionManager`], coerces textual
//! identifiers into the backend's native form, decides between insert and
//! update on `save`, and wraps every returned record through the configured
//! constructor.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

use crate::db::{
    Backend, BeforeSave, Connection, ConnectionManager, DbError, DbResult, FindOptions, Record,
    is_truthy, stringify_id,
};

/// Function used to wrap raw records returned by the backend.
pub type Constructor = Arc<dyn Fn(Record) -> Record + Send + Sync>;

/// Settings for one adapter instance.
#[derive(Clone)]
pub struct AdapterConfig {
    resource: String,
    primary_key: Option<String>,
    constructor: Option<Constructor>,
    before_save: Option<BeforeSave>,
}

impl fmt::Debug for AdapterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterConfig")
            .field("resource", &self.resource)
            .field("primary_key", &self.primary_key)
            .field("constructor", &self.constructor.is_some())
            .field("before_save", &self.before_save)
            .finish()
    }
}

impl AdapterConfig {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            primary_key: None,
            constructor: None,
            before_save: None,
        }
    }

    /// Override the backend's default primary-key field.
    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = Some(primary_key.into());
        self
    }

    pub fn with_constructor<F>(mut self, constructor: F) -> Self
    where
        F: Fn(Record) -> Record + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(constructor));
        self
    }

    pub fn with_before_save(mut self, hook: BeforeSave) -> Self {
        self.before_save = Some(hook);
        self
    }
}

/// Which write `save` issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveOperation {
    Insert,
    Update,
}

/// Result of a `save`.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    pub operation: SaveOperation,
    /// Native identifier of the saved record.
    pub id: Value,
    /// The saved record, primary key set, wrapped through the constructor.
    pub record: Record,
}

impl SaveOutcome {
    /// The identifier rendered as text.
    pub fn id_string(&self) -> Option<String> {
        stringify_id(&self.id)
    }
}

/// CRUD operations against one resource.
pub struct PersistenceAdapter<B: Backend> {
    manager: Arc<ConnectionManager<B>>,
    resource: String,
    primary_key: String,
    constructor: Option<Constructor>,
    before_save: Option<BeforeSave>,
}

impl<B: Backend> PersistenceAdapter<B> {
    pub fn new(manager: Arc<ConnectionManager<B>>, config: AdapterConfig) -> DbResult<Self> {
        if config.resource.trim().is_empty() {
            return Err(DbError::InvalidData {
                message: "resource name cannot be empty".to_string(),
                help: "Provide a collection or table name".to_string(),
            });
        }

        let primary_key = config
            .primary_key
            .filter(|pk| !pk.is_empty())
            .unwrap_or_else(|| manager.backend().default_primary_key().to_string());

        Ok(Self {
            manager,
            resource: config.resource,
            primary_key,
            constructor: config.constructor,
            before_save: config.before_save,
        })
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn manager(&self) -> &Arc<ConnectionManager<B>> {
        &self.manager
    }

    /// Coerce a textual identifier into the backend's native identifier.
    pub fn to_native_id(&self, raw: &str) -> DbResult<Value> {
        self.manager.backend().to_native_id(raw)
    }

    /// Stringified primary key of `record`, if it has one.
    pub fn id_of(&self, record: &Record) -> Option<String> {
        record.get(&self.primary_key).and_then(stringify_id)
    }

    // Strings are coerced; anything else is assumed native already.
    fn coerce_id(&self, id: &Value) -> DbResult<Value> {
        match id {
            Value::String(raw) => self.to_native_id(raw),
            native => Ok(native.clone()),
        }
    }

    fn normalize_query(&self, query: Option<&Record>) -> DbResult<Record> {
        let mut query = query.cloned().unwrap_or_default();
        if let Some(id) = query.get_mut(&self.primary_key)
            && id.is_string()
        {
            *id = self.coerce_id(id)?;
        }
        Ok(query)
    }

    fn wrap(&self, record: Record) -> Record {
        match &self.constructor {
            Some(constructor) => constructor(record),
            None => record,
        }
    }

    /// First record matching `query`; `None` when nothing matches.
    #[instrument(skip(self, query, options), fields(resource = %self.resource))]
    pub async fn find_one(
        &self,
        query: Option<&Record>,
        options: Option<&FindOptions>,
    ) -> DbResult<Option<Record>> {
        let query = self.normalize_query(query)?;
        let options = options.cloned().unwrap_or_default();
        let connection = self.manager.acquire().await?;
        let found = connection
            .find_one(&self.resource, &self.primary_key, &query, &options)
            .await?;
        Ok(found.map(|record| self.wrap(record)))
    }

    /// All records matching `query`. `None` matches everything.
    #[instrument(skip(self, query, options), fields(resource = %self.resource))]
    pub async fn find_all(
        &self,
        query: Option<&Record>,
        options: Option<&FindOptions>,
    ) -> DbResult<Vec<Record>> {
        let query = self.normalize_query(query)?;
        let options = options.cloned().unwrap_or_default();
        let connection = self.manager.acquire().await?;
        let records = connection
            .find_all(&self.resource, &self.primary_key, &query, &options)
            .await?;
        Ok(records.into_iter().map(|record| self.wrap(record)).collect())
    }

    /// Look a record up by identifier, textual or native.
    #[instrument(skip(self, id), fields(resource = %self.resource))]
    pub async fn find_by_id(&self, id: impl Into<Value>) -> DbResult<Option<Record>> {
        let id = self.coerce_id(&id.into())?;
        let mut query = Record::new();
        query.insert(self.primary_key.clone(), id);
        self.find_one(Some(&query), None).await
    }

    /// Distinct values of `field` among records matching `query`.
    #[instrument(skip(self, query), fields(resource = %self.resource))]
    pub async fn distinct(&self, field: &str, query: Option<&Record>) -> DbResult<Vec<Value>> {
        let query = self.normalize_query(query)?;
        let connection = self.manager.acquire().await?;
        connection
            .distinct(&self.resource, &self.primary_key, field, &query)
            .await
    }

    /// Insert or update `target`.
    ///
    /// Runs the `before_save` hook first. A truthy primary key routes to an
    /// update keyed by that identifier; otherwise any falsy primary key is
    /// stripped and the record is inserted.
    #[instrument(skip(self, target), fields(resource = %self.resource))]
    pub async fn save(&self, mut target: Record) -> DbResult<SaveOutcome> {
        if let Some(hook) = &self.before_save {
            hook.run(&mut target).await?;
        }

        let existing_id = match target.get(&self.primary_key) {
            Some(id) if is_truthy(id) => Some(self.coerce_id(id)?),
            _ => None,
        };

        match existing_id {
            Some(id) => {
                target.insert(self.primary_key.clone(), id.clone());
                let connection = self.manager.acquire().await?;
                connection
                    .update(&self.resource, &self.primary_key, &id, target.clone())
                    .await?;
                Ok(SaveOutcome {
                    operation: SaveOperation::Update,
                    id,
                    record: self.wrap(target),
                })
            }
            None => {
                target.shift_remove(&self.primary_key);
                let connection = self.manager.acquire().await?;
                let id = connection
                    .insert(&self.resource, &self.primary_key, target.clone())
                    .await?;

                let mut record = Record::new();
                record.insert(self.primary_key.clone(), id.clone());
                record.extend(target);
                Ok(SaveOutcome {
                    operation: SaveOperation::Insert,
                    id,
                    record: self.wrap(record),
                })
            }
        }
    }

    /// Delete the record identified by `id`. Deleting a missing record is not an error.
    #[instrument(skip(self, id), fields(resource = %self.resource))]
    pub async fn remove(&self, id: impl Into<Value>) -> DbResult<()> {
        let id = self.coerce_id(&id.into())?;
        let connection = self.manager.acquire().await?;
        connection
            .remove(&self.resource, &self.primary_key, &id)
            .await?;
        Ok(())
    }
}
