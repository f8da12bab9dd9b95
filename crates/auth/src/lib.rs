//! Supabase Auth client for the Quran read tracker
//!
//! This crate provides the authentication surface the tracker needs:
//! sign up with profile metadata, password sign in, session management,
//! password recovery, and an auth-state-change stream that the
//! application controller subscribes to.

use log::warn;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::RwLock;
use thiserror::Error;
use tokio::sync::broadcast;

/// エラー型
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Missing session")]
    MissingSession,
}

impl AuthError {
    /// リモートが返したエラーメッセージをそのまま取り出す
    ///
    /// GoTrue は `{"msg": ...}` または `{"error_description": ...}` の
    /// 形でエラーを返す。どちらでもなければボディをそのまま返す。
    pub fn remote_message(&self) -> String {
        match self {
            AuthError::ApiError(body) => serde_json::from_str::<serde_json::Value>(body)
                .ok()
                .and_then(|v| {
                    ["msg", "message", "error_description"]
                        .iter()
                        .find_map(|key| v.get(key).and_then(|m| m.as_str()).map(String::from))
                })
                .unwrap_or_else(|| body.clone()),
            other => other.to_string(),
        }
    }
}

/// ユーザー情報
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub email_confirmed_at: Option<String>,
    #[serde(default)]
    pub app_metadata: serde_json::Value,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
    pub created_at: String,
    pub updated_at: String,
}

/// セッション情報
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
    pub user: User,
}

/// サインアップ時にプロフィール行へ引き渡されるメタデータ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpMetadata {
    pub full_name: String,
    pub its: String,
}

/// サインアップのリクエストペイロード
#[derive(Debug, Clone, Serialize)]
pub struct SignUpPayload {
    pub email: String,
    pub password: String,
    pub data: SignUpMetadata,
}

/// サインアップの結果
///
/// メール確認が必要なデプロイではセッションは返らず、確認待ちの
/// ユーザーだけが返る。
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SignUpOutcome {
    Session(Session),
    Pending(User),
}

/// 認証状態の変更イベント
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthChangeEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    PasswordRecovery,
}

/// 認証状態の変更通知（イベントと、その時点のセッション）
#[derive(Debug, Clone)]
pub struct AuthChange {
    pub event: AuthChangeEvent,
    pub session: Option<Session>,
}

/// 認証状態ストリームの購読ハンドル
///
/// ハンドルを破棄（または `unsubscribe`）すると購読が解除される。
pub struct AuthSubscription {
    receiver: broadcast::Receiver<AuthChange>,
}

impl AuthSubscription {
    /// 次のイベントを待つ。送信側が閉じられた場合は `None`
    pub async fn next(&mut self) -> Option<AuthChange> {
        loop {
            match self.receiver.recv().await {
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("auth change stream lagged, skipped {} events", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// 待機せずに溜まっているイベントを取り出す
    pub fn try_next(&mut self) -> Option<AuthChange> {
        loop {
            match self.receiver.try_recv() {
                Ok(change) => return Some(change),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!("auth change stream lagged, skipped {} events", skipped);
                    continue;
                }
                Err(_) => return None,
            }
        }
    }

    /// 購読を解除する
    pub fn unsubscribe(self) {}
}

/// クライアントオプション
#[derive(Debug, Clone)]
pub struct AuthOptions {
    pub auto_refresh_token: bool,
    pub persist_session: bool,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            auto_refresh_token: true,
            persist_session: true,
        }
    }
}

/// Auth クライアント
pub struct Auth {
    url: String,
    key: String,
    http_client: Client,
    options: AuthOptions,
    current_session: Arc<RwLock<Option<Session>>>,
    changes: broadcast::Sender<AuthChange>,
}

impl Auth {
    /// 新しい Auth クライアントを作成
    pub fn new(url: &str, key: &str, http_client: Client, options: AuthOptions) -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            url: url.to_string(),
            key: key.to_string(),
            http_client,
            options,
            current_session: Arc::new(RwLock::new(None)),
            changes,
        }
    }

    /// 認証状態の変更ストリームを購読する
    pub fn on_auth_state_change(&self) -> AuthSubscription {
        AuthSubscription {
            receiver: self.changes.subscribe(),
        }
    }

    /// 変更を通知（受信側がいない場合は無視）
    fn emit(&self, event: AuthChangeEvent, session: Option<Session>) {
        let _ = self.changes.send(AuthChange { event, session });
    }

    fn store_session(&self, session: &Session) {
        if self.options.persist_session {
            let mut write_guard = self.current_session.write().unwrap();
            *write_guard = Some(session.clone());
        }
    }

    /// ユーザー登録
    ///
    /// `redirect_to` には確認メール内リンクの戻り先を指定する。
    pub async fn sign_up(
        &self,
        payload: &SignUpPayload,
        redirect_to: Option<&str>,
    ) -> Result<SignUpOutcome, AuthError> {
        let mut url = format!("{}/auth/v1/signup", self.url);
        if let Some(redirect) = redirect_to {
            url.push_str(&format!("?redirect_to={}", urlencoding::encode(redirect)));
        }

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.key)
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AuthError::ApiError(error_text));
        }

        let outcome: SignUpOutcome = response.json().await?;

        // 自動確認のデプロイではセッションが即時に返る
        if let SignUpOutcome::Session(session) = &outcome {
            self.store_session(session);
            self.emit(AuthChangeEvent::SignedIn, Some(session.clone()));
        }

        Ok(outcome)
    }

    /// メール・パスワードでログイン
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.url);

        let payload = serde_json::json!({
            "email": email,
            "password": password,
        });

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.key)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AuthError::ApiError(error_text));
        }

        let session: Session = response.json().await?;

        self.store_session(&session);
        self.emit(AuthChangeEvent::SignedIn, Some(session.clone()));

        Ok(session)
    }

    /// 現在のセッションを取得
    pub fn get_session(&self) -> Option<Session> {
        let read_guard = self.current_session.read().unwrap();
        read_guard.clone()
    }

    /// 現在のユーザーを取得
    pub async fn get_user(&self) -> Result<User, AuthError> {
        let session = self.get_session().ok_or(AuthError::MissingSession)?;

        let url = format!("{}/auth/v1/user", self.url);

        let response = self
            .http_client
            .get(&url)
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", session.access_token))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AuthError::ApiError(error_text));
        }

        let user: User = response.json().await?;

        Ok(user)
    }

    /// セッションをリフレッシュ
    pub async fn refresh_session(&self) -> Result<Session, AuthError> {
        let session = self.get_session().ok_or(AuthError::MissingSession)?;

        let url = format!("{}/auth/v1/token?grant_type=refresh_token", self.url);

        let payload = serde_json::json!({
            "refresh_token": session.refresh_token,
        });

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.key)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AuthError::ApiError(error_text));
        }

        let new_session: Session = response.json().await?;

        self.store_session(&new_session);
        self.emit(AuthChangeEvent::TokenRefreshed, Some(new_session.clone()));

        Ok(new_session)
    }

    /// サインアウト
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let session = self.get_session().ok_or(AuthError::MissingSession)?;

        let url = format!("{}/auth/v1/logout", self.url);

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", session.access_token))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AuthError::ApiError(error_text));
        }

        // セッションをクリア
        {
            let mut write_guard = self.current_session.write().unwrap();
            *write_guard = None;
        }
        self.emit(AuthChangeEvent::SignedOut, None);

        Ok(())
    }

    /// パスワードリセットメールの送信
    pub async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), AuthError> {
        let mut url = format!("{}/auth/v1/recover", self.url);
        if let Some(redirect) = redirect_to {
            url.push_str(&format!("?redirect_to={}", urlencoding::encode(redirect)));
        }

        let payload = serde_json::json!({
            "email": email,
        });

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.key)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AuthError::ApiError(error_text));
        }

        Ok(())
    }

    /// リカバリートークンを検証してセッションを確立する
    ///
    /// 成功すると `PasswordRecovery` イベントが流れ、アプリ側は
    /// 新パスワード設定モードへ切り替わる。
    pub async fn verify_recovery(&self, token: &str) -> Result<Session, AuthError> {
        let url = format!("{}/auth/v1/verify", self.url);

        let payload = serde_json::json!({
            "type": "recovery",
            "token": token,
        });

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.key)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AuthError::ApiError(error_text));
        }

        let session: Session = response.json().await?;

        self.store_session(&session);
        self.emit(AuthChangeEvent::PasswordRecovery, Some(session.clone()));

        Ok(session)
    }

    /// 認証済みユーザーのパスワードを更新
    pub async fn update_password(&self, new_password: &str) -> Result<User, AuthError> {
        let session = self.get_session().ok_or(AuthError::MissingSession)?;

        let url = format!("{}/auth/v1/user", self.url);

        let payload = serde_json::json!({
            "password": new_password,
        });

        let response = self
            .http_client
            .put(&url)
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", session.access_token))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AuthError::ApiError(error_text));
        }

        let user: User = response.json().await?;

        Ok(user)
    }
}
