//! ITS identifier to sign-in email resolution
//!
//! The user-facing ITS number is not a credential handle the auth
//! service understands, so sign-in first resolves it to an email.
//! Two deployment policies exist behind one interface and are never
//! conflated: a remote-authoritative RPC lookup that stays opaque on
//! failure, and a deterministic local transform with no existence
//! check.

use crate::error::Error;
use async_trait::async_trait;
use quran_read_tracker_postgrest::PostgrestClient;
use reqwest::Client;
use serde_json::json;

/// ITS番号をサインイン用メールアドレスへ解決する
///
/// `Ok(None)` は「該当なし」。呼び出し側はエラーと同様に、存在有無を
/// 漏らさない汎用メッセージで失敗させる。
#[async_trait]
pub trait ItsEmailResolver: Send + Sync {
    async fn resolve(&self, its: &str) -> Result<Option<String>, Error>;
}

/// リモートRPC `get_email_by_its` による解決
pub struct RpcEmailLookup {
    base_url: String,
    api_key: String,
    http_client: Client,
}

impl RpcEmailLookup {
    pub fn new(base_url: &str, api_key: &str, http_client: Client) -> Self {
        Self {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            http_client,
        }
    }
}

#[async_trait]
impl ItsEmailResolver for RpcEmailLookup {
    async fn resolve(&self, its: &str) -> Result<Option<String>, Error> {
        let client = PostgrestClient::rpc(
            &self.base_url,
            &self.api_key,
            "get_email_by_its",
            json!({ "p_its": its }),
            self.http_client.clone(),
        );

        let email: Option<String> = client.call_rpc().await?;
        Ok(email.filter(|e| !e.is_empty()))
    }
}

/// 決定的なローカル変換による解決
///
/// 小文字化し `[a-z0-9._-]` 以外を取り除き、固定ドメインを付ける。
/// リモートでの存在確認は行わない。
pub struct SyntheticEmail {
    domain: String,
}

impl SyntheticEmail {
    pub fn new(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
        }
    }
}

#[async_trait]
impl ItsEmailResolver for SyntheticEmail {
    async fn resolve(&self, its: &str) -> Result<Option<String>, Error> {
        Ok(synthetic_email(its, &self.domain))
    }
}

/// ITS番号から合成メールアドレスを組み立てる純関数
pub fn synthetic_email(its: &str, domain: &str) -> Option<String> {
    let local: String = its
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'))
        .collect();

    if local.is_empty() {
        return None;
    }

    Some(format!("{}@{}", local, domain))
}
