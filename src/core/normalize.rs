use crate::domain::model::{FieldMap, FundRecord, RawRow, Record};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;

static NON_NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\d.\-]").expect("static pattern"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static pattern"));

/// Column names the jobs read and write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldNames {
    pub name: String,
    pub type_code: String,
    pub code: String,
    pub tag1: String,
    pub tag2: String,
    /// Columns whose values together identify a holding.
    pub key: Vec<String>,
    pub key_separator: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            name: "基金名称".to_string(),
            type_code: "基金类型".to_string(),
            code: "基金代码".to_string(),
            tag1: "标签1".to_string(),
            tag2: "标签2".to_string(),
            key: vec!["基金代码".to_string(), "交易账户".to_string()],
            key_separator: "_".to_string(),
        }
    }
}

impl FieldNames {
    pub fn tag_fields(&self) -> [&str; 2] {
        [self.tag1.as_str(), self.tag2.as_str()]
    }
}

/// How incoming spreadsheet rows are cleaned before they reach the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeRules {
    pub numeric_fields: Vec<String>,
    /// Header aliases, looked up after whitespace is removed.
    pub header_aliases: HashMap<String, String>,
    /// Rows with a cell containing any of these are report footers.
    pub footer_markers: Vec<String>,
}

impl Default for NormalizeRules {
    fn default() -> Self {
        Self {
            numeric_fields: ["序号", "持有份额", "基金净值", "资产情况"]
                .iter()
                .map(|f| f.to_string())
                .collect(),
            header_aliases: HashMap::from([(
                "资产情况（结算币种）".to_string(),
                "资产情况".to_string(),
            )]),
            footer_markers: vec!["打印时间".to_string()],
        }
    }
}

impl NormalizeRules {
    pub fn is_numeric(&self, field: &str) -> bool {
        self.numeric_fields.iter().any(|f| f == field)
    }

    pub fn normalize_field_name(&self, raw: &str) -> String {
        let collapsed = WHITESPACE.replace_all(raw.trim(), "").into_owned();
        match self.header_aliases.get(&collapsed) {
            Some(alias) => alias.clone(),
            None => collapsed,
        }
    }

    /// Blank rows and report footers carry no holding.
    pub fn is_ignorable(&self, row: &RawRow) -> bool {
        let all_blank = row.iter().all(|(_, cell)| cell.trim().is_empty());
        let footer = row.iter().any(|(header, cell)| {
            self.footer_markers
                .iter()
                .any(|m| header.contains(m.as_str()) || cell.contains(m.as_str()))
        });
        all_blank || footer
    }

    pub fn normalize_row(&self, row: &RawRow) -> FieldMap {
        row.iter()
            .map(|(header, cell)| {
                let field = self.normalize_field_name(header);
                let value = if self.is_numeric(&field) {
                    Value::from(clean_numeric(cell))
                } else {
                    Value::String(clean_text(cell))
                };
                (field, value)
            })
            .collect()
    }
}

/// Keeps digits, `.` and `-`; anything unparsable becomes 0.
pub fn clean_numeric(raw: &str) -> f64 {
    let cleaned = NON_NUMERIC.replace_all(raw, "");
    cleaned.parse::<f64>().unwrap_or(0.0)
}

pub fn clean_text(raw: &str) -> String {
    raw.trim().to_string()
}

/// Flattens a stored value to text. Bitable text cells arrive as arrays of
/// `{ "text": .., "type": .. }` segments.
pub fn field_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Object(obj) => obj.get("text").map(field_text).unwrap_or_default(),
                other => field_text(other),
            })
            .collect::<String>()
            .trim()
            .to_string(),
        Value::Object(obj) => obj
            .get("text")
            .or_else(|| obj.get("value"))
            .map(field_text)
            .unwrap_or_default(),
    }
}

/// Empty cells, including the `nan` that spreadsheet exports leave behind.
pub fn is_blank(text: &str) -> bool {
    matches!(text.trim(), "" | "nan" | "NaN")
}

pub fn text_of(fields: &FieldMap, name: &str) -> String {
    let text = fields.get(name).map(field_text).unwrap_or_default();
    if is_blank(&text) {
        String::new()
    } else {
        text
    }
}

/// Joins the key columns; `None` when any of them is blank.
pub fn composite_key(fields: &FieldMap, names: &FieldNames) -> Option<String> {
    if names.key.is_empty() {
        return None;
    }
    let parts: Vec<String> = names.key.iter().map(|k| text_of(fields, k)).collect();
    if parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    Some(parts.join(&names.key_separator))
}

/// Whether writing `incoming` over `stored` would change anything.
pub fn value_differs(stored: Option<&Value>, incoming: &Value) -> bool {
    match incoming {
        Value::Number(n) => {
            let new = n.as_f64().unwrap_or(0.0);
            let old = stored.and_then(|v| match v {
                Value::Number(m) => m.as_f64(),
                other => field_text(other).parse::<f64>().ok(),
            });
            old.map_or(true, |old| (old - new).abs() > 1e-9)
        }
        other => {
            let old = stored.map(field_text).unwrap_or_default();
            old != field_text(other)
        }
    }
}

pub fn to_fund_record(record: &Record, names: &FieldNames) -> FundRecord {
    let name = text_of(&record.data, &names.name);
    let type_code = text_of(&record.data, &names.type_code);
    FundRecord {
        id: record.id.clone(),
        key: composite_key(&record.data, names).unwrap_or_else(|| name.clone()),
        code: text_of(&record.data, &names.code),
        type_code: (!type_code.is_empty()).then_some(type_code),
        tags: [
            text_of(&record.data, &names.tag1),
            text_of(&record.data, &names.tag2),
        ],
        name,
        fields: record.data.clone(),
    }
}
