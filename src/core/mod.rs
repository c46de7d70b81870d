pub mod engine;
pub mod matcher;
pub mod normalize;
pub mod resolver;
pub mod sync;
pub mod tagging;
pub mod taxonomy;
pub mod type_fill;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::domain::model::{FieldKind, FieldMap, Record, RecordPage, RunSummary};
pub use crate::domain::ports::{CategoryLookup, Job, RecordStore, Storage};
pub use crate::utils::error::Result;

use std::time::Duration;

/// Fixed pauses between calls against rate-limited services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    pub write_delay: Duration,
    pub lookup_delay: Duration,
    pub page_delay: Duration,
}

impl Default for Throttle {
    fn default() -> Self {
        Self {
            write_delay: Duration::from_millis(100),
            lookup_delay: Duration::from_millis(1000),
            page_delay: Duration::from_millis(100),
        }
    }
}

impl Throttle {
    pub fn none() -> Self {
        Self {
            write_delay: Duration::ZERO,
            lookup_delay: Duration::ZERO,
            page_delay: Duration::ZERO,
        }
    }
}

pub(crate) async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Reads every page of the store. A failing page aborts: callers build
/// indexes from the result and a partial set would cause duplicate creates.
pub async fn fetch_all_records<S: RecordStore + ?Sized>(
    store: &S,
    page_size: usize,
    page_delay: Duration,
) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    let mut page_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = store.list_records(page_size, page_token.take()).await?;
        pages += 1;
        tracing::debug!("📋 Page {}: {} records", pages, page.records.len());
        records.extend(page.records);

        match page.page_token {
            Some(token) if page.has_more && !token.is_empty() => page_token = Some(token),
            _ => break,
        }
        pause(page_delay).await;
    }

    tracing::info!("📋 Fetched {} records in {} pages", records.len(), pages);
    Ok(records)
}

/// Creates the missing text columns and returns the names it created.
pub async fn ensure_fields<S: RecordStore + ?Sized>(
    store: &S,
    names: &[&str],
) -> Result<Vec<String>> {
    let existing = store.list_fields().await?;
    let mut created = Vec::new();

    for name in names {
        if existing.iter().any(|f| f == name) {
            tracing::info!("✅ Column '{}' already exists", name);
            continue;
        }
        store.create_field(name, FieldKind::Text).await?;
        tracing::info!("✅ Created column '{}'", name);
        created.push(name.to_string());
    }
    Ok(created)
}
