use crate::adapters::token_cache::TokenCache;
use crate::config::toml_config::FeishuConfig;
use crate::domain::model::{FieldKind, FieldMap, Record, RecordPage};
use crate::domain::ports::RecordStore;
use crate::utils::error::{Result, SyncError};
use crate::utils::retry::RetryPolicy;
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const TOKEN_PATH: &str = "/open-apis/auth/v3/tenant_access_token/internal";
const FIELD_PAGE_SIZE: usize = 100;

/// Codes meaning the access token is expired or invalid.
const INVALID_TOKEN_CODES: [i64; 3] = [99991661, 99991663, 99991668];
const RATE_LIMIT_CODE: i64 = 1254290;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    tenant_access_token: Option<String>,
    #[serde(default)]
    expire: i64,
}

#[derive(Debug, Deserialize)]
struct RemoteRecord {
    record_id: String,
    #[serde(default)]
    fields: FieldMap,
}

impl From<RemoteRecord> for Record {
    fn from(remote: RemoteRecord) -> Self {
        Record {
            id: remote.record_id,
            data: remote.fields,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListData<T> {
    // null on an empty table
    items: Option<Vec<T>>,
    #[serde(default)]
    has_more: bool,
    page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecordData {
    record: RemoteRecord,
}

#[derive(Debug, Deserialize)]
struct RemoteField {
    field_name: String,
}

/// Feishu Bitable table behind the `RecordStore` port.
pub struct FeishuStore {
    client: Client,
    config: FeishuConfig,
    tokens: TokenCache,
    retry: RetryPolicy,
}

impl FeishuStore {
    pub fn new(config: FeishuConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            config,
            tokens: TokenCache::default(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn table_path(&self, suffix: &str) -> String {
        format!(
            "/open-apis/bitable/v1/apps/{}/tables/{}/{}",
            self.config.app_token, self.config.table_id, suffix
        )
    }

    /// Cached token, a freshly fetched one, or the configured fallback.
    pub async fn access_token(&self) -> Result<String> {
        if let Some(token) = self.tokens.get() {
            return Ok(token);
        }

        if !self.config.has_credentials() {
            return self.fallback_or(SyncError::MissingConfigError {
                field: "feishu.app_id / feishu.app_secret".to_string(),
            });
        }

        match self.retry.run("fetch token", || self.fetch_token()).await {
            Ok(token) => Ok(token),
            Err(e) => self.fallback_or(e),
        }
    }

    fn fallback_or(&self, error: SyncError) -> Result<String> {
        match self.config.fallback_token() {
            Some(token) => {
                tracing::warn!("⚠️  Token fetch unavailable ({}), using configured token", error);
                Ok(token.to_string())
            }
            None => Err(error),
        }
    }

    async fn fetch_token(&self) -> Result<String> {
        let body = json!({
            "app_id": self.config.app_id.as_deref().unwrap_or_default(),
            "app_secret": self.config.app_secret.as_deref().unwrap_or_default(),
        });
        let response = self.client.post(self.url(TOKEN_PATH)).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::HttpStatusError {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let parsed: TokenResponse = response.json().await?;
        match (parsed.code, parsed.tenant_access_token) {
            (0, Some(token)) if !token.is_empty() => {
                tracing::debug!("🔑 Fetched access token, expires in {}s", parsed.expire);
                self.tokens.store(token.clone(), parsed.expire);
                Ok(token)
            }
            (code, _) => Err(SyncError::AuthError {
                message: format!("code {}: {}", code, parsed.msg),
            }),
        }
    }

    /// One authenticated call with retry; an invalid token is dropped and
    /// the call repeated once with a new one.
    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Option<T>> {
        let label = format!("{} {}", method, path);
        let attempt = || self.send_once::<T>(method.clone(), path, query, body);

        match self.retry.run(&label, attempt).await {
            Err(SyncError::RemoteError { code, .. }) if INVALID_TOKEN_CODES.contains(&code) => {
                tracing::warn!("🔑 Access token rejected (code {}), refreshing", code);
                self.tokens.clear();
                self.retry.run(&label, attempt).await
            }
            other => other,
        }
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Option<T>> {
        let token = self.access_token().await?;
        let mut request = self
            .client
            .request(method, self.url(path))
            .bearer_auth(token)
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        // Bitable reports most failures in the envelope, also on 4xx
        let envelope: Envelope<T> = match serde_json::from_str(&text) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(SyncError::HttpStatusError {
                    status: status.as_u16(),
                    body: text,
                });
            }
            Err(e) => return Err(SyncError::SerializationError(e)),
        };

        match envelope.code {
            0 if status.is_success() => Ok(envelope.data),
            0 => Err(SyncError::HttpStatusError {
                status: status.as_u16(),
                body: text,
            }),
            RATE_LIMIT_CODE => Err(SyncError::RateLimited {
                message: envelope.msg,
            }),
            code => Err(SyncError::RemoteError {
                code,
                message: envelope.msg,
            }),
        }
    }
}

#[async_trait]
impl RecordStore for FeishuStore {
    async fn list_records(
        &self,
        page_size: usize,
        page_token: Option<String>,
    ) -> Result<RecordPage> {
        let mut query = vec![("page_size", page_size.to_string())];
        if let Some(token) = page_token {
            query.push(("page_token", token));
        }

        let data: Option<ListData<RemoteRecord>> = self
            .call(Method::GET, &self.table_path("records"), &query, None)
            .await?;
        let Some(data) = data else {
            return Ok(RecordPage::default());
        };

        Ok(RecordPage {
            records: data
                .items
                .unwrap_or_default()
                .into_iter()
                .map(Record::from)
                .collect(),
            has_more: data.has_more,
            page_token: data.page_token,
        })
    }

    async fn create_record(&self, fields: FieldMap) -> Result<Record> {
        let body = json!({ "fields": fields });
        let data: Option<RecordData> = self
            .call(Method::POST, &self.table_path("records"), &[], Some(&body))
            .await?;
        data.map(|d| d.record.into())
            .ok_or_else(|| SyncError::processing("create_record response carried no record"))
    }

    async fn update_record(&self, id: &str, fields: FieldMap) -> Result<()> {
        let body = json!({ "fields": fields });
        let path = self.table_path(&format!("records/{}", id));
        self.call::<Value>(Method::PUT, &path, &[], Some(&body)).await?;
        Ok(())
    }

    async fn list_fields(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("page_size", FIELD_PAGE_SIZE.to_string())];
            if let Some(token) = page_token.take() {
                query.push(("page_token", token));
            }
            let data: Option<ListData<RemoteField>> = self
                .call(Method::GET, &self.table_path("fields"), &query, None)
                .await?;
            let Some(data) = data else { break };

            names.extend(data.items.unwrap_or_default().into_iter().map(|f| f.field_name));
            match data.page_token {
                Some(token) if data.has_more && !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(names)
    }

    async fn create_field(&self, name: &str, kind: FieldKind) -> Result<()> {
        let body = json!({ "field_name": name, "type": kind.code() });
        self.call::<Value>(Method::POST, &self.table_path("fields"), &[], Some(&body))
            .await?;
        Ok(())
    }
}
