use crate::core::normalize::{to_fund_record, FieldNames};
use crate::core::resolver::TypeOverrideResolver;
use crate::core::{ensure_fields, fetch_all_records, pause, Throttle};
use crate::domain::model::{FieldMap, FundRecord, MatchResult, RunSummary, Taxonomy};
use crate::domain::ports::{Job, RecordStore};
use crate::utils::cancel::CancelFlag;
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Writes two tags per fund derived from its name and type code.
pub struct TaggingJob<S: RecordStore> {
    store: S,
    taxonomy: Taxonomy,
    resolver: TypeOverrideResolver,
    names: FieldNames,
    throttle: Throttle,
    page_size: usize,
}

impl<S: RecordStore> TaggingJob<S> {
    pub fn new(store: S, taxonomy: Taxonomy, resolver: TypeOverrideResolver) -> Self {
        Self {
            store,
            taxonomy,
            resolver,
            names: FieldNames::default(),
            throttle: Throttle::default(),
            page_size: 500,
        }
    }

    pub fn with_field_names(mut self, names: FieldNames) -> Self {
        self.names = names;
        self
    }

    pub fn with_throttle(mut self, throttle: Throttle) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn resolve(&self, fund: &FundRecord) -> MatchResult {
        let type_code = fund.type_code.as_deref().unwrap_or_default();
        self.resolver.resolve(type_code, &fund.name, &self.taxonomy)
    }

    fn tag_fields(&self, result: &MatchResult) -> FieldMap {
        let [tag1, tag2] = result.tags();
        FieldMap::from([
            (self.names.tag1.clone(), Value::from(tag1)),
            (self.names.tag2.clone(), Value::from(tag2)),
        ])
    }
}

#[async_trait]
impl<S: RecordStore> Job for TaggingJob<S> {
    fn name(&self) -> &str {
        "tag"
    }

    async fn prepare(&self) -> Result<()> {
        ensure_fields(&self.store, &self.names.tag_fields()).await?;
        Ok(())
    }

    async fn execute(&self, cancel: &CancelFlag) -> Result<RunSummary> {
        let records =
            fetch_all_records(&self.store, self.page_size, self.throttle.page_delay).await?;
        let mut summary = RunSummary {
            total: records.len(),
            ..Default::default()
        };

        for (i, record) in records.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::warn!("⚠️  Interrupted after {} records", i);
                summary.interrupted = true;
                break;
            }

            let fund = to_fund_record(record, &self.names);
            if fund.name.is_empty() {
                tracing::debug!("⏭️  {}: no fund name", fund.id);
                summary.skipped += 1;
                continue;
            }
            if fund.is_fully_tagged() {
                tracing::debug!("⏭️  {}: already tagged", fund.name);
                summary.skipped += 1;
                continue;
            }

            let result = self.resolve(&fund);
            if result.is_empty() {
                tracing::info!("❓ [{}/{}] {} → no tag", i + 1, records.len(), fund.name);
                summary.unmatched += 1;
            }
            let [tag1, tag2] = result.tags();
            if fund.tags[0] == tag1 && fund.tags[1] == tag2 {
                tracing::debug!("⏭️  {}: tags unchanged", fund.name);
                summary.skipped += 1;
                continue;
            }

            match self.store.update_record(&fund.id, self.tag_fields(&result)).await {
                Ok(()) => {
                    if !result.is_empty() {
                        tracing::info!(
                            "🏷️  [{}/{}] {} → {}",
                            i + 1,
                            records.len(),
                            fund.name,
                            result
                        );
                    }
                    summary.updated += 1;
                    summary.succeeded += 1;
                }
                Err(e) => {
                    tracing::error!("❌ {}: tag write failed: {}", fund.name, e);
                    summary.failed += 1;
                }
            }

            pause(self.throttle.write_delay).await;
        }

        if summary.succeeded > 0 {
            self.store.commit().await?;
        }
        Ok(summary)
    }
}
