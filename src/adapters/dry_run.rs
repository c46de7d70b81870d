use crate::domain::model::{FieldKind, FieldMap, Record, RecordPage};
use crate::domain::ports::RecordStore;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Reads go to the wrapped store; writes are only logged.
pub struct DryRunStore<S: RecordStore> {
    inner: S,
    writes: AtomicUsize,
}

impl<S: RecordStore> DryRunStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            writes: AtomicUsize::new(0),
        }
    }

    /// Writes that would have been sent.
    pub fn suppressed_writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn count(&self) -> usize {
        self.writes.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for DryRunStore<S> {
    async fn list_records(
        &self,
        page_size: usize,
        page_token: Option<String>,
    ) -> Result<RecordPage> {
        self.inner.list_records(page_size, page_token).await
    }

    async fn create_record(&self, fields: FieldMap) -> Result<Record> {
        let n = self.count();
        tracing::info!("🧪 [dry-run] create {:?}", fields);
        Ok(Record {
            id: format!("dry-run-{}", n),
            data: fields,
        })
    }

    async fn update_record(&self, id: &str, fields: FieldMap) -> Result<()> {
        self.count();
        tracing::info!("🧪 [dry-run] update {} {:?}", id, fields);
        Ok(())
    }

    async fn list_fields(&self) -> Result<Vec<String>> {
        self.inner.list_fields().await
    }

    async fn create_field(&self, name: &str, _kind: FieldKind) -> Result<()> {
        self.count();
        tracing::info!("🧪 [dry-run] create column {}", name);
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        tracing::info!("🧪 [dry-run] {} writes not applied", self.suppressed_writes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_writes_are_not_applied() {
        let store = DryRunStore::new(MemoryStore::with_records(vec![vec![(
            "基金名称",
            json!("沪深300"),
        )]]));

        let page = store.list_records(10, None).await.unwrap();
        assert_eq!(page.records.len(), 1);

        store
            .update_record("rec0", FieldMap::from([("标签1".to_string(), json!("x"))]))
            .await
            .unwrap();
        let created = store.create_record(FieldMap::new()).await.unwrap();
        store.create_field("标签2", FieldKind::Text).await.unwrap();
        store.commit().await.unwrap();

        assert_eq!(created.id, "dry-run-2");
        assert_eq!(store.suppressed_writes(), 3);
        assert_eq!(store.inner().update_count(), 0);
        assert!(store.inner().fields.lock().unwrap().is_empty());
        assert_eq!(*store.inner().commits.lock().unwrap(), 0);
    }
}
