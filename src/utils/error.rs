use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Taxonomy error: {message}")]
    TaxonomyError { message: String },

    #[error("Authentication failed: {message}")]
    AuthError { message: String },

    #[error("HTTP {status}: {body}")]
    HttpStatusError { status: u16, body: String },

    #[error("Remote store returned code {code}: {message}")]
    RemoteError { code: i64, message: String },

    #[error("Rate limited: {message}")]
    RateLimited { message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Data,
    Storage,
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl SyncError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SyncError::ApiError(_)
            | SyncError::HttpStatusError { .. }
            | SyncError::RateLimited { .. } => ErrorCategory::Network,
            SyncError::ConfigError { .. }
            | SyncError::ConfigValidationError { .. }
            | SyncError::InvalidConfigValueError { .. }
            | SyncError::MissingConfigError { .. } => ErrorCategory::Configuration,
            SyncError::CsvError(_)
            | SyncError::SerializationError(_)
            | SyncError::TaxonomyError { .. }
            | SyncError::ProcessingError { .. }
            | SyncError::ValidationError { .. } => ErrorCategory::Data,
            SyncError::IoError(_) => ErrorCategory::Storage,
            SyncError::AuthError { .. } | SyncError::RemoteError { .. } => ErrorCategory::Remote,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            SyncError::RateLimited { .. } => ErrorSeverity::Medium,
            SyncError::ApiError(_) | SyncError::HttpStatusError { .. } => {
                if self.is_retryable() {
                    ErrorSeverity::Medium
                } else {
                    ErrorSeverity::High
                }
            }
            SyncError::ConfigError { .. }
            | SyncError::ConfigValidationError { .. }
            | SyncError::InvalidConfigValueError { .. }
            | SyncError::MissingConfigError { .. }
            | SyncError::AuthError { .. } => ErrorSeverity::Critical,
            SyncError::IoError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    /// Transient failures worth another attempt at the adapter boundary.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::ApiError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            SyncError::HttpStatusError { status, .. } => *status == 429 || *status >= 500,
            SyncError::RateLimited { .. } => true,
            _ => false,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "檢查網路連線後重試，必要時調大 [retry] 與 [throttle] 設定",
            ErrorCategory::Configuration => "檢查設定檔 fund-sync.toml 與環境變數",
            ErrorCategory::Data => "檢查輸入資料或標籤庫檔案格式",
            ErrorCategory::Storage => "確認檔案路徑存在且具有讀寫權限",
            ErrorCategory::Remote => "確認 app_id/app_secret 與表格權限是否正確",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            SyncError::TaxonomyError { message } => format!("標籤庫載入失敗: {}", message),
            SyncError::AuthError { message } => format!("無法取得存取權杖: {}", message),
            SyncError::RemoteError { code, message } => {
                format!("遠端表格回傳錯誤 (code {}): {}", code, message)
            }
            SyncError::MissingConfigError { field } => format!("缺少必要設定: {}", field),
            other => other.to_string(),
        }
    }

    pub fn processing(message: impl Into<String>) -> Self {
        SyncError::ProcessingError {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        let throttled = SyncError::HttpStatusError {
            status: 429,
            body: String::new(),
        };
        let server = SyncError::HttpStatusError {
            status: 503,
            body: String::new(),
        };
        let not_found = SyncError::HttpStatusError {
            status: 404,
            body: String::new(),
        };

        assert!(throttled.is_retryable());
        assert!(server.is_retryable());
        assert!(!not_found.is_retryable());
        assert_eq!(not_found.severity(), ErrorSeverity::High);
    }

    #[test]
    fn test_config_errors_are_critical() {
        let err = SyncError::MissingConfigError {
            field: "feishu.table_id".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(err.user_friendly_message().contains("feishu.table_id"));
    }
}
