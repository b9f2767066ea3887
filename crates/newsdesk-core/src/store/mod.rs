//! Document store abstraction
//!
//! Collections are schemaless JSON documents keyed by UUID. The trait is
//! untyped so it stays object safe; [`Collection`] layers serde on top for
//! the model types.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::{DatabaseConfig, StoreBackend};
use crate::document::{CollectionSchema, Document};
use crate::query::{Filter, Sort};
use crate::Result;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;

/// A document as the store sees it
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Full serialized document, including `id` and `createdAt`
    pub body: Value,
}

/// Count, sum and mean of a numeric field
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    /// Documents where the field is present
    pub count: u64,
    pub sum: f64,
    /// 0 when `count` is 0
    pub average: f64,
}

impl NumericStats {
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Self {
        let (count, sum) = values
            .into_iter()
            .fold((0u64, 0.0), |(count, sum), v| (count + 1, sum + v));
        let average = if count == 0 { 0.0 } else { sum / count as f64 };
        Self {
            count,
            sum,
            average,
        }
    }
}

/// Trait for document store operations
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document; fails with `Conflict` on a unique field clash
    async fn insert(&self, schema: &CollectionSchema, doc: StoredDocument) -> Result<()>;

    /// Get a document by ID
    async fn find_by_id(&self, schema: &CollectionSchema, id: Uuid) -> Result<Option<StoredDocument>>;

    /// Matching documents in sort order, after skipping `skip`, at most `limit`
    async fn find(
        &self,
        schema: &CollectionSchema,
        filter: &Filter,
        sort: &Sort,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<StoredDocument>>;

    /// Count matching documents
    async fn count(&self, schema: &CollectionSchema, filter: &Filter) -> Result<u64>;

    /// Merge top-level fields of `patch` into the document
    ///
    /// Returns the updated document, or `None` when it does not exist.
    async fn patch(
        &self,
        schema: &CollectionSchema,
        id: Uuid,
        patch: Value,
    ) -> Result<Option<StoredDocument>>;

    /// Overwrite the body of an existing document; `false` when it does not exist
    async fn replace(&self, schema: &CollectionSchema, doc: StoredDocument) -> Result<bool>;

    /// Delete documents by ID, returning how many existed
    async fn delete_many(&self, schema: &CollectionSchema, ids: &[Uuid]) -> Result<u64>;

    /// Number of matching documents per distinct value of `field`
    ///
    /// Documents without the field are grouped under `Value::Null`.
    async fn group_count(
        &self,
        schema: &CollectionSchema,
        field: &str,
        filter: &Filter,
    ) -> Result<Vec<(Value, u64)>>;

    /// Count/sum/average of a numeric field over matching documents
    async fn numeric_stats(
        &self,
        schema: &CollectionSchema,
        field: &str,
        filter: &Filter,
    ) -> Result<NumericStats>;

    /// Matching documents per UTC creation day, ascending, days without documents omitted
    async fn daily_counts(
        &self,
        schema: &CollectionSchema,
        filter: &Filter,
    ) -> Result<Vec<(NaiveDate, u64)>>;

    /// Check the store is reachable
    async fn ping(&self) -> Result<()>;
}

/// Typed view of one collection
pub struct Collection<T> {
    store: Arc<dyn DocumentStore>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _marker: PhantomData,
        }
    }
}

impl<T: Document> Collection<T> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    pub fn schema(&self) -> &'static CollectionSchema {
        T::collection_schema()
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub async fn insert(&self, doc: &T) -> Result<()> {
        self.store.insert(T::collection_schema(), encode(doc)?).await
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<T>> {
        self.store
            .find_by_id(T::collection_schema(), id)
            .await?
            .map(decode)
            .transpose()
    }

    pub async fn find(
        &self,
        filter: &Filter,
        sort: &Sort,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<T>> {
        self.store
            .find(T::collection_schema(), filter, sort, skip, limit)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    /// First match in default sort order
    pub async fn find_one(&self, filter: &Filter) -> Result<Option<T>> {
        Ok(self
            .find(filter, &Sort::default(), 0, 1)
            .await?
            .into_iter()
            .next())
    }

    pub async fn count(&self, filter: &Filter) -> Result<u64> {
        self.store.count(T::collection_schema(), filter).await
    }

    pub async fn patch(&self, id: Uuid, patch: Value) -> Result<Option<T>> {
        self.store
            .patch(T::collection_schema(), id, patch)
            .await?
            .map(decode)
            .transpose()
    }

    /// Write back a modified document
    pub async fn replace(&self, doc: &T) -> Result<bool> {
        self.store.replace(T::collection_schema(), encode(doc)?).await
    }

    pub async fn delete_many(&self, ids: &[Uuid]) -> Result<u64> {
        self.store.delete_many(T::collection_schema(), ids).await
    }
}

/// Open the configured backend, applying migrations for PostgreSQL
pub async fn open(config: &DatabaseConfig) -> Result<Arc<dyn DocumentStore>> {
    match config.backend {
        StoreBackend::Postgres => {
            let store = PgDocumentStore::connect(config).await?;
            store.migrate().await?;
            tracing::info!(pool_size = config.pool_size, "Connected to PostgreSQL");
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

fn encode<T: Document>(doc: &T) -> Result<StoredDocument> {
    Ok(StoredDocument {
        id: doc.id(),
        created_at: doc.created_at(),
        body: serde_json::to_value(doc)?,
    })
}

fn decode<T: Document>(doc: StoredDocument) -> Result<T> {
    Ok(serde_json::from_value(doc.body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_stats_empty_average_is_zero() {
        let stats = NumericStats::from_values(std::iter::empty());
        assert_eq!(stats.count, 0);
        assert_eq!(stats.average, 0.0);
    }

    #[tokio::test]
    async fn test_open_memory_backend() {
        let config = DatabaseConfig {
            backend: StoreBackend::Memory,
            ..Default::default()
        };
        let store = open(&config).await.unwrap();
        assert!(store.ping().await.is_ok());
    }

    #[test]
    fn test_numeric_stats() {
        let stats = NumericStats::from_values([5.0, 4.0, 3.0]);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.sum, 12.0);
        assert_eq!(stats.average, 4.0);
    }
}
