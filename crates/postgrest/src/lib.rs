//! Supabase PostgREST client for the Quran read tracker
//!
//! A small query client covering what the tracker needs: filtered and
//! ordered selects, single-object reads, typed inserts, and RPC calls.
//! Row visibility is enforced remotely by row-level security; the client
//! only attaches the caller's access token.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use url::Url;

/// PostgREST APIエラーの詳細情報
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PostgrestApiErrorDetails {
    pub code: Option<String>,
    pub message: Option<String>,
    pub details: Option<String>,
    pub hint: Option<String>,
}

impl fmt::Display for PostgrestApiErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(code) = &self.code {
            parts.push(format!("Code: {}", code));
        }
        if let Some(message) = &self.message {
            parts.push(format!("Message: {}", message));
        }
        if let Some(details) = &self.details {
            parts.push(format!("Details: {}", details));
        }
        if let Some(hint) = &self.hint {
            parts.push(format!("Hint: {}", hint));
        }
        write!(f, "{}", parts.join(", "))
    }
}

/// エラー型
#[derive(Error, Debug)]
pub enum PostgrestError {
    #[error("API error: {details} (Status: {status})")]
    ApiError {
        details: PostgrestApiErrorDetails,
        status: reqwest::StatusCode,
    },

    #[error("API error (unparsed): {message} (Status: {status})")]
    UnparsedApiError {
        message: String,
        status: reqwest::StatusCode,
    },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

impl PostgrestError {
    /// リモートが返したエラーメッセージをそのまま取り出す
    ///
    /// アプリはこれをステータス表示に使う。
    pub fn remote_message(&self) -> String {
        match self {
            PostgrestError::ApiError { details, .. } => details
                .message
                .clone()
                .unwrap_or_else(|| details.to_string()),
            PostgrestError::UnparsedApiError { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// ソート方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// PostgREST クライアント
pub struct PostgrestClient {
    base_url: String,
    #[allow(dead_code)]
    api_key: String,
    table: String,
    http_client: Client,
    headers: HeaderMap,
    query_params: HashMap<String, String>,
    is_rpc: bool,
    rpc_params: Option<Value>,
}

impl PostgrestClient {
    /// 新しい PostgREST クライアントを作成
    pub fn new(base_url: &str, api_key: &str, table: &str, http_client: Client) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", HeaderValue::from_str(api_key).unwrap());
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));

        Self {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            table: table.to_string(),
            http_client,
            headers,
            query_params: HashMap::new(),
            is_rpc: false,
            rpc_params: None,
        }
    }

    /// RPCリクエストを作成
    pub fn rpc(
        base_url: &str,
        api_key: &str,
        function_name: &str,
        params: Value,
        http_client: Client,
    ) -> Self {
        let mut client = Self::new(base_url, api_key, function_name, http_client);
        client.is_rpc = true;
        client.rpc_params = Some(params);
        client
    }

    /// ヘッダーを追加
    pub fn with_header(mut self, key: &str, value: &str) -> Result<Self, PostgrestError> {
        let header_value = HeaderValue::from_str(value).map_err(|_| {
            PostgrestError::InvalidParameters(format!("Invalid header value: {}", value))
        })?;

        let header_name = HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
            PostgrestError::InvalidParameters(format!("Invalid header name: {}", key))
        })?;

        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    /// 認証トークンを設定
    pub fn with_auth(self, token: &str) -> Result<Self, PostgrestError> {
        self.with_header("Authorization", &format!("Bearer {}", token))
    }

    /// 取得するカラムを指定
    pub fn select(mut self, columns: &str) -> Self {
        self.query_params
            .insert("select".to_string(), columns.to_string());
        self
    }

    /// 等価フィルター
    pub fn eq(mut self, column: &str, value: &str) -> Self {
        self.query_params
            .insert(column.to_string(), format!("eq.{}", value));
        self
    }

    /// ソート順を指定
    pub fn order(mut self, column: &str, order: SortOrder) -> Self {
        let order_str = match order {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        };
        self.query_params
            .insert("order".to_string(), format!("{}.{}", column, order_str));
        self
    }

    /// 取得件数を制限
    pub fn limit(mut self, count: i32) -> Self {
        self.query_params
            .insert("limit".to_string(), count.to_string());
        self
    }

    /// データを取得
    pub async fn execute<T: for<'de> Deserialize<'de>>(&self) -> Result<Vec<T>, PostgrestError> {
        let url = self.build_url()?;

        let response = self
            .http_client
            .get(&url)
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(PostgrestError::NetworkError)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::error_from_body(status, response).await);
        }

        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| PostgrestError::DeserializationError(e.to_string()))
    }

    /// 単一行を取得
    ///
    /// PostgREST の単一オブジェクト表現を要求するため、0行または
    /// 複数行の場合はリモート側がエラーを返す。
    pub async fn execute_single<T: for<'de> Deserialize<'de>>(&self) -> Result<T, PostgrestError> {
        let url = self.build_url()?;

        let mut headers = self.headers.clone();
        headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("application/vnd.pgrst.object+json"),
        );

        let response = self
            .http_client
            .get(&url)
            .headers(headers)
            .send()
            .await
            .map_err(PostgrestError::NetworkError)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::error_from_body(status, response).await);
        }

        response
            .json::<T>()
            .await
            .map_err(|e| PostgrestError::DeserializationError(e.to_string()))
    }

    /// データを挿入
    pub async fn insert<T: Serialize>(&self, values: T) -> Result<Value, PostgrestError> {
        let url = self.build_url()?;

        let mut headers = self.headers.clone();
        headers.insert(
            HeaderName::from_static("prefer"),
            HeaderValue::from_static("return=representation"),
        );

        let response = self
            .http_client
            .post(&url)
            .headers(headers)
            .json(&values)
            .send()
            .await
            .map_err(PostgrestError::NetworkError)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::error_from_body(status, response).await);
        }

        // 挿入行が返らない構成もあるため、空ボディは Null として扱う
        let body_text = response.text().await.map_err(|e| {
            PostgrestError::DeserializationError(format!("Failed to read response body: {}", e))
        })?;

        if body_text.trim().is_empty() {
            Ok(Value::Null)
        } else {
            serde_json::from_str::<Value>(&body_text)
                .map_err(|e| PostgrestError::DeserializationError(e.to_string()))
        }
    }

    /// データを挿入または更新（主キー衝突時はマージ）
    pub async fn upsert<T: Serialize>(&self, values: T) -> Result<Value, PostgrestError> {
        let url = self.build_url()?;

        let mut headers = self.headers.clone();
        headers.insert(
            HeaderName::from_static("prefer"),
            HeaderValue::from_static("resolution=merge-duplicates,return=representation"),
        );

        let response = self
            .http_client
            .post(&url)
            .headers(headers)
            .json(&values)
            .send()
            .await
            .map_err(PostgrestError::NetworkError)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::error_from_body(status, response).await);
        }

        let body_text = response.text().await.map_err(|e| {
            PostgrestError::DeserializationError(format!("Failed to read response body: {}", e))
        })?;

        if body_text.trim().is_empty() {
            Ok(Value::Null)
        } else {
            serde_json::from_str::<Value>(&body_text)
                .map_err(|e| PostgrestError::DeserializationError(e.to_string()))
        }
    }

    /// RPC関数を呼び出す (POSTリクエスト)
    pub async fn call_rpc<T: for<'de> Deserialize<'de>>(&self) -> Result<T, PostgrestError> {
        if !self.is_rpc {
            return Err(PostgrestError::InvalidParameters(
                "Client was not created for RPC. Use PostgrestClient::rpc().".to_string(),
            ));
        }
        // RPCの場合はテーブル名が関数名として扱われる
        let url = format!("{}/rest/v1/rpc/{}", self.base_url, self.table);
        let params = self.rpc_params.as_ref().ok_or_else(|| {
            PostgrestError::InvalidParameters("RPC parameters are missing.".to_string())
        })?;

        let response = self
            .http_client
            .post(&url)
            .headers(self.headers.clone())
            .json(params)
            .send()
            .await
            .map_err(PostgrestError::NetworkError)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::error_from_body(status, response).await);
        }

        response.json::<T>().await.map_err(|e| {
            PostgrestError::DeserializationError(format!(
                "Failed to deserialize RPC response: {}",
                e
            ))
        })
    }

    // URLを構築
    fn build_url(&self) -> Result<String, PostgrestError> {
        let mut url = Url::parse(&format!("{}/rest/v1/{}", self.base_url, self.table))?;

        for (key, value) in &self.query_params {
            url.query_pairs_mut().append_pair(key, value);
        }

        Ok(url.to_string())
    }

    // エラーレスポンスを PostgREST のエラー詳細として解釈
    async fn error_from_body(
        status: reqwest::StatusCode,
        response: reqwest::Response,
    ) -> PostgrestError {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error response".to_string());

        match serde_json::from_str::<PostgrestApiErrorDetails>(&error_text) {
            Ok(details) => PostgrestError::ApiError { details, status },
            Err(_) => PostgrestError::UnparsedApiError {
                message: error_text,
                status,
            },
        }
    }
}
