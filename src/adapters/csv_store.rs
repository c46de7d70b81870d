use crate::adapters::local::backup_path;
use crate::core::normalize::{field_text, FieldNames};
use crate::domain::model::{FieldKind, FieldMap, RawRow, Record, RecordPage};
use crate::domain::ports::{RecordStore, Storage};
use crate::utils::error::{Result, SyncError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

const BOM: &str = "\u{feff}";

/// Header spellings accepted for the identifying columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnAliases {
    pub name: Vec<String>,
    pub type_code: Vec<String>,
    pub code: Vec<String>,
}

impl Default for ColumnAliases {
    fn default() -> Self {
        let owned = |names: &[&str]| names.iter().map(|n| n.to_string()).collect::<Vec<_>>();
        Self {
            name: owned(&["基金名称", "名称", "fund_name", "name"]),
            type_code: owned(&["基金类型", "类型", "fund_type", "type"]),
            code: owned(&["基金代码", "代码", "fund_code", "code"]),
        }
    }
}

impl ColumnAliases {
    /// Maps each header to the name records expose it under. Per alias group
    /// the header earliest in the alias list (the canonical name first) takes
    /// the canonical name; the others keep their own text.
    pub fn canonical_headers(&self, headers: &[String], names: &FieldNames) -> Vec<String> {
        let groups = [
            (&self.name, &names.name),
            (&self.type_code, &names.type_code),
            (&self.code, &names.code),
        ];
        let mut columns: Vec<String> = headers.iter().map(|h| h.trim().to_string()).collect();

        for (aliases, canonical) in groups {
            let rank = |header: &str| {
                if header == canonical.as_str() {
                    Some(0)
                } else {
                    aliases.iter().position(|a| a == header).map(|i| i + 1)
                }
            };
            let chosen = headers
                .iter()
                .enumerate()
                .filter_map(|(i, header)| rank(header.trim()).map(|r| (r, i)))
                .min();
            if let Some((_, index)) = chosen {
                columns[index] = canonical.to_string();
            }
        }
        columns
    }
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(BOM.as_bytes()).unwrap_or(bytes)
}

fn read_table(bytes: &[u8]) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(strip_bom(bytes));

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        row.resize(headers.len(), String::new());
        rows.push(row);
    }
    Ok((headers, rows))
}

/// Parses spreadsheet rows for import, keeping the raw header text.
pub fn parse_rows(bytes: &[u8]) -> Result<Vec<RawRow>> {
    let (headers, rows) = read_table(bytes)?;
    Ok(rows
        .into_iter()
        .map(|row| headers.iter().cloned().zip(row).collect())
        .collect())
}

pub async fn read_rows<S: Storage>(storage: &S, path: &str) -> Result<Vec<RawRow>> {
    let bytes = storage.read_file(path).await?;
    let rows = parse_rows(&bytes)?;
    tracing::info!("📄 Read {} rows from {}", rows.len(), path);
    Ok(rows)
}

#[derive(Debug, Default)]
struct Table {
    /// Header text as written to the file.
    headers: Vec<String>,
    /// Names the columns are exposed under.
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    dirty: bool,
}

impl Table {
    fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    fn add_column(&mut self, name: &str) -> usize {
        if let Some(index) = self.column(name) {
            return index;
        }
        self.headers.push(name.to_string());
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(String::new());
        }
        self.dirty = true;
        self.columns.len() - 1
    }

    /// Duplicate column names resolve to the first one, as `column` does.
    fn record(&self, index: usize) -> Record {
        let mut data = FieldMap::new();
        for (column, cell) in self.columns.iter().zip(&self.rows[index]) {
            data.entry(column.clone())
                .or_insert_with(|| Value::String(cell.clone()));
        }
        Record {
            id: index.to_string(),
            data,
        }
    }

    fn set(&mut self, index: usize, fields: FieldMap) {
        for (name, value) in fields {
            let column = self.add_column(&name);
            self.rows[index][column] = field_text(&value);
        }
        self.dirty = true;
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(BOM.as_bytes().to_vec());
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer
            .into_inner()
            .map_err(|e| SyncError::IoError(e.into_error()))
    }
}

/// A CSV file as a record table. Writes stay in memory until `commit`.
pub struct CsvStore<S: Storage> {
    storage: S,
    path: String,
    table: Mutex<Table>,
}

impl<S: Storage> CsvStore<S> {
    pub async fn open(
        storage: S,
        path: &str,
        aliases: &ColumnAliases,
        names: &FieldNames,
    ) -> Result<Self> {
        let bytes = storage.read_file(path).await?;
        let (headers, rows) = read_table(&bytes)?;
        let columns = aliases.canonical_headers(&headers, names);
        tracing::info!("📄 Loaded {} rows, {} columns from {}", rows.len(), headers.len(), path);

        Ok(Self {
            storage,
            path: path.to_string(),
            table: Mutex::new(Table {
                headers,
                columns,
                rows,
                dirty: false,
            }),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn row_index(id: &str, len: usize) -> Result<usize> {
        id.parse::<usize>()
            .ok()
            .filter(|i| *i < len)
            .ok_or_else(|| SyncError::ValidationError {
                message: format!("no row with id '{}'", id),
            })
    }
}

#[async_trait]
impl<S: Storage> RecordStore for CsvStore<S> {
    async fn list_records(
        &self,
        page_size: usize,
        page_token: Option<String>,
    ) -> Result<RecordPage> {
        let table = self.table.lock().await;
        let start = page_token.and_then(|t| t.parse::<usize>().ok()).unwrap_or(0);
        let end = start.saturating_add(page_size.max(1)).min(table.rows.len());
        let has_more = end < table.rows.len();

        Ok(RecordPage {
            records: (start.min(end)..end).map(|i| table.record(i)).collect(),
            has_more,
            page_token: has_more.then(|| end.to_string()),
        })
    }

    async fn create_record(&self, fields: FieldMap) -> Result<Record> {
        let mut table = self.table.lock().await;
        let width = table.columns.len();
        table.rows.push(vec![String::new(); width]);
        let index = table.rows.len() - 1;
        table.set(index, fields);
        Ok(table.record(index))
    }

    async fn update_record(&self, id: &str, fields: FieldMap) -> Result<()> {
        let mut table = self.table.lock().await;
        let index = Self::row_index(id, table.rows.len())?;
        table.set(index, fields);
        Ok(())
    }

    async fn list_fields(&self) -> Result<Vec<String>> {
        Ok(self.table.lock().await.columns.clone())
    }

    async fn create_field(&self, name: &str, _kind: FieldKind) -> Result<()> {
        self.table.lock().await.add_column(name);
        Ok(())
    }

    /// Backs up the file as it is on disk, then rewrites it.
    async fn commit(&self) -> Result<()> {
        let mut table = self.table.lock().await;
        if !table.dirty {
            return Ok(());
        }

        let original = self.storage.read_file(&self.path).await?;
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
        let backup = backup_path(&self.path, &timestamp);
        self.storage.write_file(&backup, &original).await?;
        tracing::info!("💾 Backup written to {}", backup);

        let bytes = table.to_bytes()?;
        self.storage.write_file(&self.path, &bytes).await?;
        table.dirty = false;
        tracing::info!("💾 Saved {} rows to {}", table.rows.len(), self.path);
        Ok(())
    }
}
