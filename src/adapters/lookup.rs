use crate::config::toml_config::LookupConfig;
use crate::core::type_fill::normalize_fund_code;
use crate::domain::model::LookupOutcome;
use crate::domain::ports::CategoryLookup;
use crate::utils::error::{Result, SyncError};
use crate::utils::retry::RetryPolicy;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

const TYPE_KEYS: [&str; 3] = ["type_desc", "fund_type", "type"];

/// Fund category lookup against the Danjuan fund API.
pub struct DanjuanLookup {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl DanjuanLookup {
    pub fn new(config: &LookupConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("fund-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch(&self, code: &str) -> Result<Value> {
        let url = format!("{}/djapi/fund/{}", self.base_url, code);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::HttpStatusError {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json().await?)
    }
}

/// Reads the category out of a fund detail response.
pub fn outcome_from_body(body: &Value) -> LookupOutcome {
    let Some(data) = body.get("data").filter(|d| d.is_object()) else {
        return LookupOutcome::NotFound;
    };
    TYPE_KEYS
        .iter()
        .filter_map(|key| data.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(|value| LookupOutcome::Found(value.to_string()))
        .unwrap_or(LookupOutcome::Unknown)
}

#[async_trait]
impl CategoryLookup for DanjuanLookup {
    async fn lookup_category(&self, code: &str) -> LookupOutcome {
        let Some(code) = normalize_fund_code(code) else {
            tracing::warn!("⚠️  Malformed fund code: {}", code);
            return LookupOutcome::MalformedCode;
        };

        match self.retry.run("fund lookup", || self.fetch(&code)).await {
            Ok(body) => outcome_from_body(&body),
            Err(SyncError::HttpStatusError { status: 404, .. }) => LookupOutcome::NotFound,
            Err(e) => {
                tracing::warn!("⚠️  Lookup for {} failed: {}", code, e);
                LookupOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn lookup(server: &MockServer) -> DanjuanLookup {
        let config = LookupConfig {
            base_url: server.base_url(),
            timeout_seconds: 5,
        };
        DanjuanLookup::new(&config).unwrap().with_retry(RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        })
    }

    #[test]
    fn test_outcome_from_body() {
        assert_eq!(
            outcome_from_body(&json!({"data": {"type_desc": "混合型-偏股"}})),
            LookupOutcome::Found("混合型-偏股".to_string())
        );
        assert_eq!(
            outcome_from_body(&json!({"data": {"type_desc": "", "fund_type": "债券型-中短债"}})),
            LookupOutcome::Found("债券型-中短债".to_string())
        );
        assert_eq!(
            outcome_from_body(&json!({"data": {"fd_code": "000001"}})),
            LookupOutcome::Unknown
        );
        assert_eq!(outcome_from_body(&json!({"result_code": 600001})), LookupOutcome::NotFound);
        assert_eq!(outcome_from_body(&json!({"data": null})), LookupOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_lookup_pads_code() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/djapi/fund/000001");
            then.status(200)
                .json_body(json!({"data": {"fd_code": "000001", "type_desc": "混合型-灵活配置"}}));
        });

        let outcome = lookup(&server).lookup_category(" 1 ").await;
        assert_eq!(outcome, LookupOutcome::Found("混合型-灵活配置".to_string()));
        mock.assert();
    }

    #[tokio::test]
    async fn test_malformed_code_skips_request() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.path_contains("/djapi/fund/");
            then.status(200);
        });

        assert_eq!(lookup(&server).lookup_category("AB12").await, LookupOutcome::MalformedCode);
        mock.assert_hits(0);
    }

    #[tokio::test]
    async fn test_server_error_is_failed_after_retry() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/djapi/fund/110011");
            then.status(503);
        });

        assert_eq!(lookup(&server).lookup_category("110011").await, LookupOutcome::Failed);
        mock.assert_hits(2);
    }

    #[tokio::test]
    async fn test_not_found() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/djapi/fund/999999");
            then.status(404);
        });

        assert_eq!(lookup(&server).lookup_category("999999").await, LookupOutcome::NotFound);
    }
}
