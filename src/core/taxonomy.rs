use crate::domain::model::Taxonomy;
use crate::utils::error::{Result, SyncError};
use std::path::Path;

const QUOTES: &[char] = &['\'', '"'];
const TAG_TRIM: &[char] = &['\'', '"', ',', '，'];

impl Taxonomy {
    /// Loads a taxonomy file; a missing file or one without any category is an error.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SyncError::TaxonomyError {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        let taxonomy = Self::parse(&content)?;

        tracing::info!("✅ Loaded taxonomy with {} categories", taxonomy.len());
        for category in taxonomy.categories() {
            tracing::debug!("   {}: {} tags", category.name, category.tags.len());
        }
        Ok(taxonomy)
    }

    /// Parses lines of the form `category: [tag1, tag2, ...]`.
    pub fn parse(content: &str) -> Result<Self> {
        let mut taxonomy = Taxonomy::new();

        for line in content.lines() {
            let Some((head, rest)) = line.split_once(':') else {
                continue;
            };
            let name = head
                .trim()
                .trim_start_matches(['-', '*'])
                .trim()
                .trim_matches(QUOTES)
                .trim();
            if name.is_empty() {
                continue;
            }

            let tags = parse_tag_list(rest);
            if tags.is_empty() {
                continue;
            }
            taxonomy.insert(name, tags);
        }

        if taxonomy.is_empty() {
            return Err(SyncError::TaxonomyError {
                message: "no `category: [tags]` lines found".to_string(),
            });
        }
        Ok(taxonomy)
    }
}

fn parse_tag_list(rest: &str) -> Vec<String> {
    let (Some(open), Some(close)) = (rest.find('['), rest.rfind(']')) else {
        return Vec::new();
    };
    if close <= open {
        return Vec::new();
    }

    rest[open + 1..close]
        .split(',')
        .map(|raw| raw.trim().trim_matches(TAG_TRIM).trim())
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quoted_lists() {
        let content = r#"
# 标签库
'规模': ['中证500', '沪深300', "创业板"]
行业: [医药，, 消费 , '']
"#;
        let taxonomy = Taxonomy::parse(content).unwrap();
        let categories = taxonomy.categories();

        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0].name, "规模");
        assert_eq!(categories[0].tags, vec!["中证500", "沪深300", "创业板"]);
        assert_eq!(categories[1].name, "行业");
        assert_eq!(categories[1].tags, vec!["医药", "消费"]);
    }

    #[test]
    fn test_parse_skips_lines_without_lists() {
        let content = "说明: 这里没有列表\n- 地区: [美国, 香港]\n空: []\n";
        let taxonomy = Taxonomy::parse(content).unwrap();

        assert_eq!(taxonomy.len(), 1);
        assert_eq!(taxonomy.categories()[0].name, "地区");
        assert_eq!(taxonomy.categories()[0].tags, vec!["美国", "香港"]);
    }

    #[test]
    fn test_parse_empty_source_is_error() {
        assert!(matches!(
            Taxonomy::parse("nothing here\n"),
            Err(SyncError::TaxonomyError { .. })
        ));
    }

    #[test]
    fn test_from_missing_file_is_error() {
        let err = Taxonomy::from_file("/definitely/not/here/config.md").unwrap_err();
        assert!(matches!(err, SyncError::TaxonomyError { .. }));
    }
}
