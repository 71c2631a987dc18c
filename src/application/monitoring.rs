use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::instrument;

use crate::domain::ports::TableStore;
use crate::domain::row::Row;

/// Tracing decorator for a [`TableStore`]: wraps every call in an
/// `#[instrument]` span so peer I/O shows up in logs without the stores
/// themselves needing to know about tracing.
pub struct MonitoringTableStore<T: TableStore> {
    inner: Arc<T>,
    peer: &'static str,
}

impl<T: TableStore> MonitoringTableStore<T> {
    pub fn new(inner: Arc<T>, peer: &'static str) -> Self {
        Self { inner, peer }
    }
}

#[async_trait]
impl<T: TableStore> TableStore for MonitoringTableStore<T> {
    #[instrument(name = "read_all", skip(self), fields(peer = self.peer), level = "info")]
    async fn read_all(&self) -> Result<Vec<Row>> {
        self.inner.read_all().await
    }

    #[instrument(name = "insert", skip(self, row), fields(peer = self.peer), level = "info")]
    async fn insert(&self, row: &Row) -> Result<()> {
        self.inner.insert(row).await
    }

    #[instrument(name = "update", skip(self, delta), fields(peer = self.peer, pk), level = "info")]
    async fn update(&self, pk: &str, delta: &Row) -> Result<()> {
        self.inner.update(pk, delta).await
    }

    #[instrument(name = "delete", skip(self), fields(peer = self.peer, pk), level = "info")]
    async fn delete(&self, pk: &str) -> Result<()> {
        self.inner.delete(pk).await
    }

    #[instrument(name = "schema", skip(self), fields(peer = self.peer), level = "info")]
    async fn schema(&self) -> Result<Vec<(String, String)>> {
        self.inner.schema().await
    }
}
