use crate::core::normalize::{to_fund_record, FieldNames};
use crate::core::{ensure_fields, fetch_all_records, pause, Throttle};
use crate::domain::model::{FieldMap, LookupOutcome, RunSummary};
use crate::domain::ports::{CategoryLookup, Job, RecordStore};
use crate::utils::cancel::CancelFlag;
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::Value;

const CODE_WIDTH: usize = 6;

/// Trims a fund code and left-pads it with zeros to six digits.
/// Returns `None` for anything that is not all ASCII digits.
pub fn normalize_fund_code(raw: &str) -> Option<String> {
    let code = raw.trim();
    let code = code.strip_suffix(".0").unwrap_or(code);
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(format!("{:0>width$}", code, width = CODE_WIDTH))
}

/// Fills the fund type column from an external category lookup.
pub struct TypeFillJob<S: RecordStore, L: CategoryLookup> {
    store: S,
    lookup: L,
    names: FieldNames,
    throttle: Throttle,
    page_size: usize,
}

impl<S: RecordStore, L: CategoryLookup> TypeFillJob<S, L> {
    pub fn new(store: S, lookup: L) -> Self {
        Self {
            store,
            lookup,
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

    async fn category_for(&self, raw_code: &str) -> LookupOutcome {
        match normalize_fund_code(raw_code) {
            Some(code) => self.lookup.lookup_category(&code).await,
            None => LookupOutcome::MalformedCode,
        }
    }
}

#[async_trait]
impl<S: RecordStore, L: CategoryLookup> Job for TypeFillJob<S, L> {
    fn name(&self) -> &str {
        "fill-type"
    }

    async fn prepare(&self) -> Result<()> {
        ensure_fields(&self.store, &[self.names.type_code.as_str()]).await?;
        Ok(())
    }

    async fn execute(&self, cancel: &CancelFlag) -> Result<RunSummary> {
        let records =
            fetch_all_records(&self.store, self.page_size, self.throttle.page_delay).await?;
        let total = records.len();
        let mut summary = RunSummary {
            total,
            ..Default::default()
        };

        for (i, record) in records.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::warn!("⚠️  Interrupted after {} records", i);
                summary.interrupted = true;
                break;
            }

            let fund = to_fund_record(record, &self.names);
            if fund.code.is_empty() {
                summary.skipped += 1;
                continue;
            }
            if let Some(existing) = &fund.type_code {
                if !LookupOutcome::needs_retry(existing) {
                    tracing::debug!("⏭️  {}: type already set ({})", fund.code, existing);
                    summary.skipped += 1;
                    continue;
                }
            }

            let outcome = self.category_for(&fund.code).await;
            let value = outcome.as_str().to_string();
            if fund.type_code.as_deref() == Some(value.as_str()) {
                tracing::debug!("⏭️  {}: still {}", fund.code, value);
                summary.skipped += 1;
                summary.unmatched += usize::from(!outcome.is_authoritative());
                pause(self.throttle.lookup_delay).await;
                continue;
            }
            let fields =
                FieldMap::from([(self.names.type_code.clone(), Value::from(value.clone()))]);

            match self.store.update_record(&fund.id, fields).await {
                Ok(()) => {
                    if outcome.is_authoritative() {
                        tracing::info!("✅ [{}/{}] {} → {}", i + 1, total, fund.code, value);
                    } else {
                        tracing::warn!("❓ [{}/{}] {} → {}", i + 1, total, fund.code, value);
                        summary.unmatched += 1;
                    }
                    summary.updated += 1;
                    summary.succeeded += 1;
                }
                Err(e) => {
                    tracing::error!("❌ {}: type write failed: {}", fund.code, e);
                    summary.failed += 1;
                }
            }

            if !matches!(outcome, LookupOutcome::MalformedCode) {
                pause(self.throttle.lookup_delay).await;
            }
        }

        if summary.succeeded > 0 {
            self.store.commit().await?;
        }
        Ok(summary)
    }
}
