use crate::core::normalize::{composite_key, value_differs, FieldNames, NormalizeRules};
use crate::core::{fetch_all_records, pause, Throttle};
use crate::domain::model::{FieldMap, RawRow, Record, RunSummary};
use crate::domain::ports::{Job, RecordStore};
use crate::utils::cancel::CancelFlag;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub names: FieldNames,
    pub rules: NormalizeRules,
    pub throttle: Throttle,
    pub page_size: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            names: FieldNames::default(),
            rules: NormalizeRules::default(),
            throttle: Throttle::default(),
            page_size: 500,
        }
    }
}

/// What a single incoming row turns into.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncAction {
    Create(FieldMap),
    Update { id: String, changes: FieldMap },
    Unchanged,
    Ignored,
    MissingKey,
}

/// Imports spreadsheet rows into a store, matching holdings by composite key.
pub struct RecordSynchronizer<S: RecordStore> {
    store: S,
    rows: Vec<RawRow>,
    options: SyncOptions,
}

impl<S: RecordStore> RecordSynchronizer<S> {
    pub fn new(store: S, rows: Vec<RawRow>, options: SyncOptions) -> Self {
        Self {
            store,
            rows,
            options,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Indexes stored records by composite key; records without one are left out.
    pub fn index_records(&self, records: Vec<Record>) -> HashMap<String, Record> {
        records
            .into_iter()
            .filter_map(|record| {
                composite_key(&record.data, &self.options.names).map(|key| (key, record))
            })
            .collect()
    }

    /// Decides the write for one row against the current index.
    pub fn plan(
        &self,
        row: &RawRow,
        index: &HashMap<String, Record>,
    ) -> (Option<String>, SyncAction) {
        if self.options.rules.is_ignorable(row) {
            return (None, SyncAction::Ignored);
        }
        let fields = self.options.rules.normalize_row(row);
        let Some(key) = composite_key(&fields, &self.options.names) else {
            return (None, SyncAction::MissingKey);
        };

        let action = match index.get(&key) {
            Some(existing) => {
                let changes: FieldMap = fields
                    .into_iter()
                    .filter(|(field, value)| value_differs(existing.data.get(field), value))
                    .collect();
                if changes.is_empty() {
                    SyncAction::Unchanged
                } else {
                    SyncAction::Update {
                        id: existing.id.clone(),
                        changes,
                    }
                }
            }
            None => SyncAction::Create(fields),
        };
        (Some(key), action)
    }
}

#[async_trait]
impl<S: RecordStore> Job for RecordSynchronizer<S> {
    fn name(&self) -> &str {
        "import"
    }

    async fn prepare(&self) -> Result<()> {
        tracing::info!("📄 {} rows to import", self.rows.len());
        Ok(())
    }

    async fn execute(&self, cancel: &CancelFlag) -> Result<RunSummary> {
        let existing = fetch_all_records(
            &self.store,
            self.options.page_size,
            self.options.throttle.page_delay,
        )
        .await?;
        let mut index = self.index_records(existing);
        tracing::info!("📋 {} existing records indexed by key", index.len());

        let mut summary = RunSummary {
            total: self.rows.len(),
            ..Default::default()
        };

        for (row_index, row) in self.rows.iter().enumerate() {
            let line = row_index + 1;
            if cancel.is_cancelled() {
                tracing::warn!("⚠️  Interrupted, {} rows handled", row_index);
                summary.interrupted = true;
                break;
            }

            let (key, action) = self.plan(row, &index);
            match action {
                SyncAction::Ignored => {
                    tracing::debug!("⏭️  Row {}: blank or footer", line);
                    summary.skipped += 1;
                    continue;
                }
                SyncAction::MissingKey => {
                    tracing::warn!("⚠️  Row {}: missing key fields, skipped", line);
                    summary.skipped += 1;
                    continue;
                }
                SyncAction::Unchanged => {
                    tracing::debug!("⏭️  Row {}: unchanged", line);
                    summary.skipped += 1;
                    continue;
                }
                SyncAction::Update { id, changes } => {
                    let key = key.unwrap_or_default();
                    match self.store.update_record(&id, changes.clone()).await {
                        Ok(()) => {
                            tracing::info!(
                                "🔄 Row {}: updated {} ({} fields)",
                                line,
                                key,
                                changes.len()
                            );
                            if let Some(record) = index.get_mut(&key) {
                                record.data.extend(changes);
                            }
                            summary.updated += 1;
                            summary.succeeded += 1;
                        }
                        Err(e) => {
                            tracing::error!("❌ Row {}: update failed: {}", line, e);
                            summary.failed += 1;
                        }
                    }
                }
                SyncAction::Create(fields) => match self.store.create_record(fields).await {
                    Ok(record) => {
                        let key = key.unwrap_or_default();
                        tracing::info!("➕ Row {}: created {}", line, key);
                        index.insert(key, record);
                        summary.created += 1;
                        summary.succeeded += 1;
                    }
                    Err(e) => {
                        tracing::error!("❌ Row {}: create failed: {}", line, e);
                        summary.failed += 1;
                    }
                },
            }

            pause(self.options.throttle.write_delay).await;
        }

        if summary.succeeded > 0 {
            self.store.commit().await?;
        }
        Ok(summary)
    }
}
