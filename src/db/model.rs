//! Binding adapters onto model types.
//!
//! A model is any type that wraps a [`Record`] attribute bag. A
//! [`ModelBinder`] exposes the adapter's finders as type-level operations
//! returning models, and `save` / `remove` / `id` as operations on a model
//! instance.

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;

use crate::db::{
    Backend, DbError, DbResult, FindOptions, PersistenceAdapter, Record, SaveOperation,
    is_truthy, stringify_id,
};

/// A type backed by a record attribute bag.
pub trait Model: Send + Sync + Sized {
    fn from_record(record: Record) -> Self;

    fn attributes(&self) -> &Record;

    fn attributes_mut(&mut self) -> &mut Record;
}

/// Typed surface over a [`PersistenceAdapter`] for model `M`.
pub struct ModelBinder<M, B: Backend> {
    adapter: Arc<PersistenceAdapter<B>>,
    _model: PhantomData<fn() -> M>,
}

impl<M, B: Backend> Clone for ModelBinder<M, B> {
    fn clone(&self) -> Self {
        Self {
            adapter: Arc::clone(&self.adapter),
            _model: PhantomData,
        }
    }
}

impl<M: Model, B: Backend> ModelBinder<M, B> {
    pub fn new(adapter: Arc<PersistenceAdapter<B>>) -> Self {
        Self {
            adapter,
            _model: PhantomData,
        }
    }

    pub fn adapter(&self) -> &PersistenceAdapter<B> {
        &self.adapter
    }
}

// Type-level operations.
impl<M: Model, B: Backend> ModelBinder<M, B> {
    pub async fn find_all(
        &self,
        query: Option<&Record>,
        options: Option<&FindOptions>,
    ) -> DbResult<Vec<M>> {
        let records = self.adapter.find_all(query, options).await?;
        Ok(records.into_iter().map(M::from_record).collect())
    }

    pub async fn find_one(
        &self,
        query: Option<&Record>,
        options: Option<&FindOptions>,
    ) -> DbResult<Option<M>> {
        Ok(self
            .adapter
            .find_one(query, options)
            .await?
            .map(M::from_record))
    }

    pub async fn find_by_id(&self, id: impl Into<Value>) -> DbResult<Option<M>> {
        Ok(self.adapter.find_by_id(id).await?.map(M::from_record))
    }

    pub async fn distinct(&self, field: &str, query: Option<&Record>) -> DbResult<Vec<Value>> {
        self.adapter.distinct(field, query).await
    }
}

// Instance operations.
impl<M: Model, B: Backend> ModelBinder<M, B> {
    /// Stringified primary key of `model`, or `None` if it has not been saved.
    pub fn id(&self, model: &M) -> Option<String> {
        model
            .attributes()
            .get(self.adapter.primary_key())
            .and_then(stringify_id)
    }

    /// Save `model`, writing the stored attributes (including any assigned
    /// primary key) back into it.
    pub async fn save(&self, model: &mut M) -> DbResult<SaveOperation> {
        let outcome = self.adapter.save(model.attributes().clone()).await?;
        *model.attributes_mut() = outcome.record;
        Ok(outcome.operation)
    }

    pub async fn remove(&self, model: &M) -> DbResult<()> {
        let id = model
            .attributes()
            .get(self.adapter.primary_key())
            .filter(|id| is_truthy(id))
            .cloned()
            .ok_or_else(|| DbError::InvalidData {
                message: format!(
                    "cannot remove a {} record without '{}'",
                    self.adapter.resource(),
                    self.adapter.primary_key()
                ),
                help: "Save the model before removing it".to_string(),
            })?;
        self.adapter.remove(id).await
    }
}
