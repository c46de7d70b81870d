use crate::domain::model::{FieldKind, FieldMap, LookupOutcome, Record, RecordPage};
use crate::domain::ports::{CategoryLookup, RecordStore};
use crate::utils::error::{Result, SyncError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory store that records every write it receives.
#[derive(Default)]
pub struct MemoryStore {
    pub records: Mutex<Vec<Record>>,
    pub fields: Mutex<Vec<String>>,
    pub updates: Mutex<Vec<(String, FieldMap)>>,
    pub creates: Mutex<Vec<FieldMap>>,
    pub commits: Mutex<usize>,
    /// Writes to these ids fail.
    pub failing_ids: Vec<String>,
    pub fail_listing: bool,
}

impl MemoryStore {
    pub fn with_records(rows: Vec<Vec<(&str, Value)>>) -> Self {
        let records = rows
            .into_iter()
            .enumerate()
            .map(|(i, pairs)| Record {
                id: format!("rec{}", i),
                data: pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            })
            .collect();
        Self {
            records: Mutex::new(records),
            ..Default::default()
        }
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn record(&self, id: &str) -> Option<Record> {
        self.records.lock().unwrap().iter().find(|r| r.id == id).cloned()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn list_records(
        &self,
        page_size: usize,
        page_token: Option<String>,
    ) -> Result<RecordPage> {
        if self.fail_listing {
            return Err(SyncError::processing("listing failed"));
        }
        let records = self.records.lock().unwrap();
        let start: usize = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let end = (start + page_size).min(records.len());
        let has_more = end < records.len();
        Ok(RecordPage {
            records: records[start..end].to_vec(),
            has_more,
            page_token: has_more.then(|| end.to_string()),
        })
    }

    async fn create_record(&self, fields: FieldMap) -> Result<Record> {
        let mut records = self.records.lock().unwrap();
        let record = Record {
            id: format!("rec{}", records.len()),
            data: fields.clone(),
        };
        records.push(record.clone());
        self.creates.lock().unwrap().push(fields);
        Ok(record)
    }

    async fn update_record(&self, id: &str, fields: FieldMap) -> Result<()> {
        if self.failing_ids.iter().any(|f| f == id) {
            return Err(SyncError::RemoteError {
                code: 1254000,
                message: "write rejected".to_string(),
            });
        }
        let mut records = self.records.lock().unwrap();
        if let Some(record) = records.iter_mut().find(|r| r.id == id) {
            record.data.extend(fields.clone());
        }
        self.updates.lock().unwrap().push((id.to_string(), fields));
        Ok(())
    }

    async fn list_fields(&self) -> Result<Vec<String>> {
        Ok(self.fields.lock().unwrap().clone())
    }

    async fn create_field(&self, name: &str, _kind: FieldKind) -> Result<()> {
        self.fields.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        *self.commits.lock().unwrap() += 1;
        Ok(())
    }
}

/// Lookup answering from a fixed table; unknown codes are `NotFound`.
#[derive(Default)]
pub struct TableLookup {
    pub answers: HashMap<String, LookupOutcome>,
    pub calls: Mutex<Vec<String>>,
}

impl TableLookup {
    pub fn new(answers: &[(&str, LookupOutcome)]) -> Self {
        Self {
            answers: answers
                .iter()
                .map(|(code, outcome)| (code.to_string(), outcome.clone()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CategoryLookup for TableLookup {
    async fn lookup_category(&self, code: &str) -> LookupOutcome {
        self.calls.lock().unwrap().push(code.to_string());
        self.answers
            .get(code)
            .cloned()
            .unwrap_or(LookupOutcome::NotFound)
    }
}
