use crate::domain::model::{FieldKind, FieldMap, LookupOutcome, Record, RecordPage, RunSummary};
use crate::utils::cancel::CancelFlag;
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// A table of records addressable by id: the remote Bitable or a CSV file.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list_records(
        &self,
        page_size: usize,
        page_token: Option<String>,
    ) -> Result<RecordPage>;
    async fn create_record(&self, fields: FieldMap) -> Result<Record>;
    async fn update_record(&self, id: &str, fields: FieldMap) -> Result<()>;
    async fn list_fields(&self) -> Result<Vec<String>>;
    async fn create_field(&self, name: &str, kind: FieldKind) -> Result<()>;

    /// Persists buffered writes. Stores that write through do nothing.
    async fn commit(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
pub trait CategoryLookup: Send + Sync {
    /// Never fails: lookup problems come back as placeholder outcomes.
    async fn lookup_category(&self, code: &str) -> LookupOutcome;
}

#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &str;
    async fn prepare(&self) -> Result<()>;
    async fn execute(&self, cancel: &CancelFlag) -> Result<RunSummary>;
}

#[async_trait]
impl<T: RecordStore + ?Sized> RecordStore for std::sync::Arc<T> {
    async fn list_records(
        &self,
        page_size: usize,
        page_token: Option<String>,
    ) -> Result<RecordPage> {
        (**self).list_records(page_size, page_token).await
    }

    async fn create_record(&self, fields: FieldMap) -> Result<Record> {
        (**self).create_record(fields).await
    }

    async fn update_record(&self, id: &str, fields: FieldMap) -> Result<()> {
        (**self).update_record(id, fields).await
    }

    async fn list_fields(&self) -> Result<Vec<String>> {
        (**self).list_fields().await
    }

    async fn create_field(&self, name: &str, kind: FieldKind) -> Result<()> {
        (**self).create_field(name, kind).await
    }

    async fn commit(&self) -> Result<()> {
        (**self).commit().await
    }
}
