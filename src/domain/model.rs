use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Field values of one record, keyed by column name.
pub type FieldMap = HashMap<String, serde_json::Value>;

/// One CSV row as (header, cell) pairs, in column order.
pub type RawRow = Vec<(String, String)>;

/// A record as the store sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub data: FieldMap,
}

#[derive(Debug, Clone, Default)]
pub struct RecordPage {
    pub records: Vec<Record>,
    pub has_more: bool,
    pub page_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
}

impl FieldKind {
    /// Bitable field type code.
    pub fn code(self) -> u32 {
        match self {
            FieldKind::Text => 1,
        }
    }
}

/// Ordered category → tags mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Taxonomy {
    categories: Vec<Category>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub tags: Vec<String>,
}

impl Taxonomy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a category, or replaces the tags of an existing one in place.
    pub fn insert(&mut self, name: impl Into<String>, tags: Vec<String>) {
        let name = name.into();
        match self.categories.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.tags = tags,
            None => self.categories.push(Category { name, tags }),
        }
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// (tag, category) pairs in taxonomy order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.categories
            .iter()
            .flat_map(|c| c.tags.iter().map(move |t| (t.as_str(), c.name.as_str())))
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Vec<S>)> for Taxonomy {
    fn from_iter<I: IntoIterator<Item = (S, Vec<S>)>>(iter: I) -> Self {
        let mut taxonomy = Taxonomy::new();
        for (name, tags) in iter {
            taxonomy.insert(name, tags.into_iter().map(Into::into).collect());
        }
        taxonomy
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagMatch {
    pub tag: String,
    pub category: String,
}

impl TagMatch {
    pub fn new(tag: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            category: category.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tag.is_empty()
    }
}

/// Exactly two (tag, category) slots; unset slots hold empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    slots: [TagMatch; 2],
}

impl MatchResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(tag: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            slots: [TagMatch::new(tag, category), TagMatch::default()],
        }
    }

    /// Takes at most the first two matches and pads the rest.
    pub fn from_matches(matches: Vec<TagMatch>) -> Self {
        let mut iter = matches.into_iter();
        Self {
            slots: [
                iter.next().unwrap_or_default(),
                iter.next().unwrap_or_default(),
            ],
        }
    }

    pub fn slots(&self) -> &[TagMatch; 2] {
        &self.slots
    }

    pub fn first(&self) -> &TagMatch {
        &self.slots[0]
    }

    pub fn second(&self) -> &TagMatch {
        &self.slots[1]
    }

    pub fn tags(&self) -> [&str; 2] {
        [self.slots[0].tag.as_str(), self.slots[1].tag.as_str()]
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(TagMatch::is_empty)
    }
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b] = self.tags();
        write!(f, "[{}], [{}]", a, b)
    }
}

/// A record seen through the configured fund columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FundRecord {
    pub id: String,
    /// Composite of the key columns, or the name when any of them is blank.
    pub key: String,
    pub name: String,
    pub code: String,
    pub type_code: Option<String>,
    pub tags: [String; 2],
    pub fields: FieldMap,
}

impl FundRecord {
    pub fn is_fully_tagged(&self) -> bool {
        self.tags.iter().all(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    Money,
    Bond,
    EquityLike,
    Unknown,
}

/// Result of a fund category lookup. Everything except `Found` is a
/// placeholder: it is written to the record but never trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(String),
    Unknown,
    NotFound,
    MalformedCode,
    Failed,
}

impl LookupOutcome {
    pub const UNKNOWN: &'static str = "未知";
    pub const NOT_FOUND: &'static str = "基金不存在";
    pub const MALFORMED_CODE: &'static str = "代码格式错误";
    pub const FAILED: &'static str = "获取失败";

    pub fn as_str(&self) -> &str {
        match self {
            LookupOutcome::Found(category) => category,
            LookupOutcome::Unknown => Self::UNKNOWN,
            LookupOutcome::NotFound => Self::NOT_FOUND,
            LookupOutcome::MalformedCode => Self::MALFORMED_CODE,
            LookupOutcome::Failed => Self::FAILED,
        }
    }

    pub fn is_authoritative(&self) -> bool {
        matches!(self, LookupOutcome::Found(_))
    }

    /// Whether a stored category should be looked up again. `基金不存在`
    /// and `代码格式错误` are final; only transient placeholders qualify.
    pub fn needs_retry(value: &str) -> bool {
        matches!(value, Self::UNKNOWN | Self::FAILED)
    }
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub created: usize,
    pub updated: usize,
    /// Written, but without a usable value (no tag matched, placeholder category).
    pub unmatched: usize,
    pub interrupted: bool,
}

impl RunSummary {
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.interrupted {
            writeln!(
                f,
                "⚠️  已中斷，處理了 {}/{} 筆記錄",
                self.processed(),
                self.total
            )?;
        }
        writeln!(f, "✅ 成功: {}", self.succeeded)?;
        if self.created > 0 || self.updated > 0 {
            writeln!(f, "   ➕ 新建: {}", self.created)?;
            writeln!(f, "   🔄 更新: {}", self.updated)?;
        }
        if self.unmatched > 0 {
            writeln!(f, "   ❓ 無有效結果: {}", self.unmatched)?;
        }
        writeln!(f, "❌ 失敗: {}", self.failed)?;
        write!(f, "⏭️  跳過: {}", self.skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_result_pads_and_truncates() {
        let one = MatchResult::from_matches(vec![TagMatch::new("沪深300", "规模")]);
        assert_eq!(one.tags(), ["沪深300", ""]);
        assert!(one.second().category.is_empty());

        let three = MatchResult::from_matches(vec![
            TagMatch::new("a", "x"),
            TagMatch::new("b", "y"),
            TagMatch::new("c", "z"),
        ]);
        assert_eq!(three.tags(), ["a", "b"]);
        assert!(MatchResult::empty().is_empty());
    }

    #[test]
    fn test_taxonomy_insert_keeps_first_position() {
        let mut taxonomy = Taxonomy::new();
        taxonomy.insert("规模", vec!["沪深300".to_string()]);
        taxonomy.insert("行业", vec!["医药".to_string()]);
        taxonomy.insert("规模", vec!["中证500".to_string()]);

        let names: Vec<&str> = taxonomy.categories().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["规模", "行业"]);
        let entries: Vec<(&str, &str)> = taxonomy.entries().collect();
        assert_eq!(entries, vec![("中证500", "规模"), ("医药", "行业")]);
    }

    #[test]
    fn test_lookup_placeholders() {
        assert!(LookupOutcome::needs_retry("获取失败"));
        assert!(LookupOutcome::needs_retry("未知"));
        assert!(!LookupOutcome::needs_retry("代码格式错误"));
        assert!(!LookupOutcome::needs_retry("基金不存在"));
        assert!(!LookupOutcome::needs_retry("货币型"));
        assert_eq!(LookupOutcome::NotFound.as_str(), "基金不存在");
        assert!(LookupOutcome::Found("货币型".to_string()).is_authoritative());
    }
}
