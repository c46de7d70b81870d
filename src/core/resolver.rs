use crate::core::matcher::TagMatcher;
use crate::domain::model::{MatchResult, Taxonomy, TypeClass};
use crate::utils::error::{Result, SyncError};
use crate::utils::validation::Validate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub const MONEY_TAG: &str = "货币";
pub const BOND_TAG: &str = "债券";

/// Fund type code membership tables and the coarse fallback tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeRules {
    pub money: Vec<String>,
    pub bond: Vec<String>,
    pub equity: Vec<String>,
    pub fallback_tags: HashMap<String, String>,
}

impl Default for TypeRules {
    fn default() -> Self {
        let owned = |codes: &[&str]| codes.iter().map(|c| c.to_string()).collect::<Vec<_>>();
        Self {
            money: owned(&["货币型"]),
            bond: owned(&[
                "债券型-中短债",
                "债券型-长期纯债",
                "债券型-短期纯债",
                "债券型-债券指数",
                "债券型-普通债券",
            ]),
            equity: owned(&[
                "QDII-股票",
                "QDII-债券",
                "商品型-非QDII",
                "混合型-偏股",
                "股票型-标准指数",
                "股票型-增强指数",
                "混合型-灵活配置",
                "混合型-偏债",
                "混合型-股债平衡",
                "股票型-普通",
            ]),
            fallback_tags: [
                ("QDII-股票", "股票"),
                ("QDII-债券", "债券"),
                ("商品型-非QDII", "商品"),
                ("混合型-偏股", "偏股"),
                ("股票型-标准指数", "指数"),
                ("股票型-增强指数", "指数"),
                ("混合型-灵活配置", "灵活"),
                ("混合型-偏债", "偏债"),
                ("混合型-股债平衡", "平衡"),
                ("股票型-普通", "股票"),
            ]
            .into_iter()
            .map(|(code, tag)| (code.to_string(), tag.to_string()))
            .collect(),
        }
    }
}

impl TypeRules {
    /// Money wins over bond, bond over equity-like.
    pub fn classify(&self, type_code: &str) -> TypeClass {
        let listed = |codes: &[String]| codes.iter().any(|c| c == type_code);
        if listed(&self.money) {
            TypeClass::Money
        } else if listed(&self.bond) {
            TypeClass::Bond
        } else if listed(&self.equity) {
            TypeClass::EquityLike
        } else {
            TypeClass::Unknown
        }
    }
}

impl Validate for TypeRules {
    fn validate(&self) -> Result<()> {
        let mut seen: HashSet<&str> = HashSet::new();
        let tables = [
            ("money", &self.money),
            ("bond", &self.bond),
            ("equity", &self.equity),
        ];
        for (table, codes) in tables {
            for code in codes {
                if !seen.insert(code.as_str()) {
                    return Err(SyncError::InvalidConfigValueError {
                        field: format!("type_rules.{}", table),
                        value: code.clone(),
                        reason: "type code is listed in more than one class".to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Decides per type code whether name matching runs at all.
#[derive(Debug, Clone, Default)]
pub struct TypeOverrideResolver {
    rules: TypeRules,
    matcher: TagMatcher,
}

impl TypeOverrideResolver {
    pub fn new(rules: TypeRules, matcher: TagMatcher) -> Self {
        Self { rules, matcher }
    }

    pub fn resolve(&self, type_code: &str, name: &str, taxonomy: &Taxonomy) -> MatchResult {
        let type_code = type_code.trim();
        if type_code.is_empty() {
            return self.matcher.match_name(name, taxonomy);
        }

        match self.rules.classify(type_code) {
            TypeClass::Money => {
                tracing::debug!("   💰 {} → fixed tag {}", type_code, MONEY_TAG);
                MatchResult::single(MONEY_TAG, MONEY_TAG)
            }
            TypeClass::Bond => {
                tracing::debug!("   📊 {} → fixed tag {}", type_code, BOND_TAG);
                MatchResult::single(BOND_TAG, BOND_TAG)
            }
            TypeClass::EquityLike => {
                let by_name = self.matcher.match_name(name, taxonomy);
                if !by_name.first().is_empty() {
                    return by_name;
                }
                match self.rules.fallback_tags.get(type_code) {
                    Some(tag) => {
                        tracing::debug!("   🏷️  no name match, {} → {}", type_code, tag);
                        MatchResult::single(tag.as_str(), type_code)
                    }
                    None => MatchResult::empty(),
                }
            }
            TypeClass::Unknown => {
                tracing::debug!("   ❓ unknown type {}, matching by name", type_code);
                self.matcher.match_name(name, taxonomy)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::matcher::MatchPolicy;
    use crate::domain::model::TagMatch;

    fn taxonomy() -> Taxonomy {
        [
            ("规模", vec!["沪深300", "中证500"]),
            ("行业", vec!["医药", "债券"]),
        ]
        .into_iter()
        .collect()
    }

    fn resolver() -> TypeOverrideResolver {
        TypeOverrideResolver::new(TypeRules::default(), TagMatcher::new(MatchPolicy::Longest))
    }

    #[test]
    fn test_money_ignores_name() {
        let result = resolver().resolve("货币型", "某某沪深300医药", &taxonomy());
        assert_eq!(result.first(), &TagMatch::new("货币", "货币"));
        assert_eq!(result.second(), &TagMatch::default());
    }

    #[test]
    fn test_bond_codes_always_fixed() {
        let rules = TypeRules::default();
        for code in &rules.bond {
            let result = resolver().resolve(code, "中证500医药", &taxonomy());
            assert_eq!(result.tags(), ["债券", ""]);
        }
    }

    #[test]
    fn test_equity_uses_name_match_first() {
        let result = resolver().resolve("股票型-标准指数", "华夏沪深300ETF联接", &taxonomy());
        assert_eq!(result.first(), &TagMatch::new("沪深300", "规模"));
    }

    #[test]
    fn test_equity_falls_back_to_type_tag() {
        let result = resolver().resolve("混合型-灵活配置", "某某灵活配置混合", &taxonomy());
        assert_eq!(result.first(), &TagMatch::new("灵活", "混合型-灵活配置"));
        assert_eq!(result.second(), &TagMatch::default());
    }

    #[test]
    fn test_equity_without_fallback_is_empty() {
        let mut rules = TypeRules::default();
        rules.fallback_tags.clear();
        let resolver = TypeOverrideResolver::new(rules, TagMatcher::default());
        assert!(resolver.resolve("股票型-普通", "无匹配", &taxonomy()).is_empty());
    }

    #[test]
    fn test_empty_and_unknown_codes_match_by_name() {
        let r = resolver();
        assert_eq!(r.resolve("", "中证500医药", &taxonomy()).tags(), ["中证500", "医药"]);
        assert_eq!(r.resolve("  ", "中证500", &taxonomy()).tags(), ["中证500", ""]);
        assert_eq!(r.resolve("获取失败", "医药", &taxonomy()).tags(), ["医药", ""]);
    }

    #[test]
    fn test_classify() {
        let rules = TypeRules::default();
        assert_eq!(rules.classify("货币型"), TypeClass::Money);
        assert_eq!(rules.classify("债券型-中短债"), TypeClass::Bond);
        assert_eq!(rules.classify("QDII-债券"), TypeClass::EquityLike);
        assert_eq!(rules.classify("FOF"), TypeClass::Unknown);
    }

    #[test]
    fn test_overlapping_tables_rejected() {
        let mut rules = TypeRules::default();
        assert!(rules.validate().is_ok());
        rules.equity.push("货币型".to_string());
        assert!(rules.validate().is_err());
    }
}
