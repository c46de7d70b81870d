use crate::adapters::csv_store::ColumnAliases;
use crate::core::matcher::{MatchPolicy, TagMatcher};
use crate::core::normalize::{FieldNames, NormalizeRules};
use crate::core::resolver::{TypeOverrideResolver, TypeRules};
use crate::core::Throttle;
use crate::utils::error::{Result, SyncError};
use crate::utils::retry::RetryPolicy;
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, validate_range,
    validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "fund-sync.toml";

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("static pattern"));

/// Everything the tool reads from `fund-sync.toml`. Every section may be omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub feishu: FeishuConfig,
    pub taxonomy: TaxonomyConfig,
    pub fields: FieldNames,
    pub normalize: NormalizeRules,
    pub csv: ColumnAliases,
    pub type_rules: TypeRules,
    pub throttle: ThrottleConfig,
    pub retry: RetryConfig,
    pub lookup: LookupConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeishuConfig {
    pub base_url: String,
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
    pub app_token: String,
    pub table_id: String,
    /// Used when no token can be fetched with the app credentials.
    pub tenant_access_token: Option<String>,
    pub page_size: usize,
    pub timeout_seconds: u64,
}

impl Default for FeishuConfig {
    fn default() -> Self {
        Self {
            base_url: "https://open.feishu.cn".to_string(),
            app_id: None,
            app_secret: None,
            app_token: String::new(),
            table_id: String::new(),
            tenant_access_token: None,
            page_size: 500,
            timeout_seconds: 30,
        }
    }
}

impl FeishuConfig {
    pub fn has_credentials(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        filled(&self.app_id) && filled(&self.app_secret)
    }

    pub fn fallback_token(&self) -> Option<&str> {
        self.tenant_access_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

impl Validate for FeishuConfig {
    fn validate(&self) -> Result<()> {
        validate_url("feishu.base_url", &self.base_url)?;
        validate_non_empty_string("feishu.app_token", &self.app_token)?;
        validate_non_empty_string("feishu.table_id", &self.table_id)?;
        validate_range("feishu.page_size", self.page_size, 1, 500)?;
        validate_positive_number("feishu.timeout_seconds", self.timeout_seconds as usize, 1)?;

        if !self.has_credentials() && self.fallback_token().is_none() {
            return Err(SyncError::ConfigValidationError {
                field: "feishu".to_string(),
                message: "either app_id/app_secret or tenant_access_token is required".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxonomyConfig {
    pub path: String,
    pub policy: MatchPolicy,
    pub all_occurrences: bool,
}

impl Default for TaxonomyConfig {
    fn default() -> Self {
        Self {
            path: "config.md".to_string(),
            policy: MatchPolicy::default(),
            all_occurrences: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    pub write_delay_ms: u64,
    pub csv_write_delay_ms: u64,
    pub lookup_delay_ms: u64,
    pub page_delay_ms: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            write_delay_ms: 100,
            csv_write_delay_ms: 0,
            lookup_delay_ms: 1000,
            page_delay_ms: 100,
        }
    }
}

impl ThrottleConfig {
    /// Local files skip the remote write delay.
    pub fn to_throttle(&self, local: bool) -> Throttle {
        let write_delay = if local {
            self.csv_write_delay_ms
        } else {
            self.write_delay_ms
        };
        Throttle {
            write_delay: Duration::from_millis(write_delay),
            lookup_delay: Duration::from_millis(self.lookup_delay_ms),
            page_delay: Duration::from_millis(self.page_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8000,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            base_url: "https://danjuanfunds.com".to_string(),
            timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

impl SyncConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(SyncError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| SyncError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Reads `path` when it exists; otherwise defaults, unless the path was
    /// given explicitly.
    pub fn load_or_default(path: Option<&str>) -> Result<Self> {
        match path {
            Some(explicit) => Self::from_file(explicit),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(DEFAULT_CONFIG_PATH),
            None => {
                tracing::debug!("No {} found, using defaults", DEFAULT_CONFIG_PATH);
                Ok(Self::default())
            }
        }
    }

    /// 替換環境變數 (例如 ${FEISHU_APP_SECRET})；未設定的保留原樣
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn matcher(&self) -> TagMatcher {
        TagMatcher::new(self.taxonomy.policy).with_all_occurrences(self.taxonomy.all_occurrences)
    }

    pub fn resolver(&self) -> TypeOverrideResolver {
        TypeOverrideResolver::new(self.type_rules.clone(), self.matcher())
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    /// Checks that only matter for commands talking to the remote table.
    pub fn validate_remote(&self) -> Result<()> {
        self.feishu.validate()
    }
}

impl Validate for SyncConfig {
    fn validate(&self) -> Result<()> {
        validate_path("taxonomy.path", &self.taxonomy.path)?;
        validate_url("lookup.base_url", &self.lookup.base_url)?;
        validate_positive_number("retry.max_attempts", self.retry.max_attempts as usize, 1)?;

        for (field, value) in [
            ("fields.name", &self.fields.name),
            ("fields.type_code", &self.fields.type_code),
            ("fields.code", &self.fields.code),
            ("fields.tag1", &self.fields.tag1),
            ("fields.tag2", &self.fields.tag2),
        ] {
            validate_non_empty_string(field, value)?;
        }
        if self.fields.tag1 == self.fields.tag2 {
            return Err(SyncError::InvalidConfigValueError {
                field: "fields.tag2".to_string(),
                value: self.fields.tag2.clone(),
                reason: "the two tag columns must differ".to_string(),
            });
        }

        self.type_rules.validate()
    }
}
