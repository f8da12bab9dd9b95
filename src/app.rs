//! Application controller
//!
//! Owns the session, the signed-in user's profile, the record lists,
//! and the submission form, and reacts to auth-state-change events
//! from the auth client. Every remote failure surfaces as a status or
//! error message and returns control to an interactive state; nothing
//! here is fatal and nothing retries on its own.

use chrono::{Local, NaiveDateTime, TimeZone, Timelike, Utc};
use log::debug;

use crate::config::{ItsStrategy, TrackerConfig};
use crate::error::Error;
use crate::identity::{ItsEmailResolver, RpcEmailLookup, SyntheticEmail};
use crate::location::{LocationError, LocationProvider, PositionOptions, UnsupportedLocation};
use crate::models::{AdminReadLog, CapturedLocation, NewReadLog, Profile, ReadLog};
use crate::stats;
use crate::Supabase;
use quran_read_tracker_auth::{
    AuthChange, AuthChangeEvent, AuthError, AuthSubscription, Session, SignUpMetadata,
    SignUpPayload,
};
use quran_read_tracker_postgrest::SortOrder;

const INVALID_CREDENTIALS: &str = "Invalid ITS or password.";
const CONFIRM_EMAIL_FIRST: &str = "Please confirm your email first, then sign in.";

/// 認証画面の表示モード
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthView {
    SignIn,
    SignUp,
    Forgot,
    Reset,
}

/// サインアップ入力
#[derive(Debug, Clone, Default)]
pub struct SignUpForm {
    pub full_name: String,
    pub its: String,
    pub email: String,
    pub password: String,
}

/// 読誦ログの入力フォーム
#[derive(Debug, Clone)]
pub struct LogForm {
    /// ジュズ番号 (1-30)。範囲はリモート側が最終判断する
    pub juz: i32,
    /// スーラ番号 (1-114、任意)
    pub surah: Option<i32>,
    /// 読了時刻（ローカル時刻、分精度）
    pub read_at: NaiveDateTime,
    pub location: Option<CapturedLocation>,
}

impl LogForm {
    fn new() -> Self {
        let now = Local::now().naive_local();
        let read_at = now
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(now);
        Self {
            juz: 1,
            surah: None,
            read_at,
            location: None,
        }
    }
}

/// アプリケーションコントローラ
pub struct App {
    supabase: Supabase,
    config: TrackerConfig,
    resolver: Box<dyn ItsEmailResolver>,
    location_provider: Box<dyn LocationProvider>,
    subscription: Option<AuthSubscription>,

    session: Option<Session>,
    profile: Option<Profile>,
    auth_view: AuthView,
    logs: Vec<ReadLog>,
    admin_logs: Vec<AdminReadLog>,
    form: LogForm,
    loading: bool,
    status: Option<String>,
    auth_error: Option<String>,
    auth_info: Option<String>,
}

impl App {
    /// Create the controller from a deployment configuration
    pub fn new(config: TrackerConfig) -> Self {
        let supabase = Supabase::new(&config.supabase_url, &config.supabase_key);

        let resolver: Box<dyn ItsEmailResolver> = match config.its_strategy {
            ItsStrategy::RpcLookup => Box::new(RpcEmailLookup::new(
                &config.supabase_url,
                &config.supabase_key,
                supabase.http_client.clone(),
            )),
            ItsStrategy::SyntheticEmail => {
                Box::new(SyntheticEmail::new(&config.synthetic_email_domain))
            }
        };

        Self {
            supabase,
            config,
            resolver,
            location_provider: Box::new(UnsupportedLocation),
            subscription: None,
            session: None,
            profile: None,
            auth_view: AuthView::SignIn,
            logs: Vec::new(),
            admin_logs: Vec::new(),
            form: LogForm::new(),
            loading: false,
            status: None,
            auth_error: None,
            auth_info: None,
        }
    }

    /// Wire in the platform's positioning capability
    pub fn with_location_provider(mut self, provider: Box<dyn LocationProvider>) -> Self {
        self.location_provider = provider;
        self
    }

    /// Restore any existing session and register the auth-change
    /// subscription
    pub async fn init(&mut self) {
        self.subscription = Some(self.supabase.auth().on_auth_state_change());
        self.session = self.supabase.auth().get_session();
        if self.session.is_some() {
            self.load_profile().await;
            self.load_logs().await;
        }
    }

    /// Unregister the auth-change subscription
    pub fn dispose(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }

    /// Apply any pending auth-state-change events
    ///
    /// Operations on this controller call it themselves after their
    /// own auth calls; an embedding runtime calls it when auth
    /// activity happens elsewhere (e.g. a token refresh task).
    pub async fn pump_events(&mut self) {
        let mut pending = Vec::new();
        if let Some(subscription) = self.subscription.as_mut() {
            while let Some(change) = subscription.try_next() {
                pending.push(change);
            }
        }
        for change in pending {
            self.apply_auth_change(change).await;
        }
    }

    async fn apply_auth_change(&mut self, change: AuthChange) {
        debug!("auth change: {:?}", change.event);

        let previous_user = self.session.as_ref().map(|s| s.user.id.clone());
        let event = change.event;
        // イベントごとにセッションを丸ごと置き換える
        self.session = change.session;

        if event == AuthChangeEvent::PasswordRecovery {
            self.auth_view = AuthView::Reset;
            self.auth_info = Some("Set your new password below.".to_string());
            self.auth_error = None;
        }

        match self.session.as_ref().map(|s| s.user.id.clone()) {
            Some(user_id) => {
                if previous_user.as_deref() != Some(user_id.as_str()) {
                    self.load_profile().await;
                    self.load_logs().await;
                }
            }
            None => {
                // セッション消失時は、次のフェッチが始まる前に空にする
                self.profile = None;
                self.logs.clear();
                self.admin_logs.clear();
            }
        }
    }

    /// Create an account
    pub async fn sign_up(&mut self, form: &SignUpForm) {
        self.auth_error = None;
        self.auth_info = None;

        let clean_its = form.its.trim().to_string();
        if form.full_name.trim().is_empty()
            || clean_its.is_empty()
            || form.email.trim().is_empty()
            || form.password.is_empty()
        {
            self.auth_error = Some("Please enter Full Name, ITS, email, and password.".to_string());
            return;
        }

        self.loading = true;
        let payload = SignUpPayload {
            email: form.email.trim().to_lowercase(),
            password: form.password.clone(),
            data: SignUpMetadata {
                full_name: form.full_name.trim().to_string(),
                its: clean_its,
            },
        };

        let result = self
            .supabase
            .auth()
            .sign_up(&payload, self.config.redirect_url.as_deref())
            .await;
        self.loading = false;

        match result {
            Ok(_) => {
                self.auth_info = Some(
                    "A confirmation email has been sent to you. Please confirm your email, \
                     then sign in using ITS and password."
                        .to_string(),
                );
                self.auth_view = AuthView::SignIn;
                // 自動確認のデプロイでは即サインイン状態になる
                self.pump_events().await;
            }
            Err(e) => self.auth_error = Some(e.remote_message()),
        }
    }

    /// Sign in with the ITS identifier and password
    pub async fn sign_in(&mut self, its: &str, password: &str) {
        self.auth_error = None;
        self.auth_info = None;

        let clean_its = its.trim().to_string();
        if clean_its.is_empty() || password.is_empty() {
            self.auth_error = Some("Please enter ITS and password.".to_string());
            return;
        }

        self.loading = true;

        // 解決失敗も該当なしも同じ汎用メッセージで落とし、ITSの
        // 存在有無を漏らさない
        let email = match self.resolver.resolve(&clean_its).await {
            Ok(Some(email)) => email,
            Ok(None) | Err(_) => {
                self.loading = false;
                self.auth_error = Some(INVALID_CREDENTIALS.to_string());
                return;
            }
        };

        if let Err(e) = self
            .supabase
            .auth()
            .sign_in_with_password(&email, password)
            .await
        {
            self.loading = false;
            let message = e.remote_message();
            self.auth_error = Some(if message.to_lowercase().contains("email not confirmed") {
                CONFIRM_EMAIL_FIRST.to_string()
            } else {
                INVALID_CREDENTIALS.to_string()
            });
            return;
        }

        // パスワード確認後の追加検査: メール未確認の口座は弾く
        let confirmed = match self.supabase.auth().get_user().await {
            Ok(user) => user.email_confirmed_at.is_some(),
            Err(_) => false,
        };
        if !confirmed {
            let _ = self.supabase.auth().sign_out().await;
            self.loading = false;
            self.pump_events().await;
            self.auth_error = Some(CONFIRM_EMAIL_FIRST.to_string());
            return;
        }

        self.loading = false;
        self.pump_events().await;
    }

    /// Send a password reset link
    pub async fn request_password_reset(&mut self, email: &str) {
        self.auth_error = None;
        self.auth_info = None;

        if email.trim().is_empty() {
            self.auth_error = Some("Please enter your email.".to_string());
            return;
        }

        self.loading = true;
        let result = self
            .supabase
            .auth()
            .reset_password_for_email(
                &email.trim().to_lowercase(),
                self.config.redirect_url.as_deref(),
            )
            .await;
        self.loading = false;

        match result {
            Ok(()) => {
                self.auth_info = Some(
                    "Password reset link has been sent to your email. Open the link, \
                     then set a new password."
                        .to_string(),
                );
            }
            Err(e) => self.auth_error = Some(e.remote_message()),
        }
    }

    /// Set a new password after following a recovery link
    pub async fn reset_password_now(&mut self, password: &str, confirm_password: &str) {
        self.auth_error = None;
        self.auth_info = None;

        if password.is_empty() || confirm_password.is_empty() {
            self.auth_error = Some("Please enter new password and confirm it.".to_string());
            return;
        }
        if password != confirm_password {
            self.auth_error = Some("Passwords do not match.".to_string());
            return;
        }

        self.loading = true;
        let result = self.supabase.auth().update_password(password).await;
        self.loading = false;

        match result {
            Ok(_) => {
                self.auth_info = Some("Password updated successfully. Please sign in now.".to_string());
                self.auth_view = AuthView::SignIn;
            }
            Err(e) => self.auth_error = Some(e.remote_message()),
        }
    }

    /// Sign out
    pub async fn sign_out(&mut self) {
        match self.supabase.auth().sign_out().await {
            Ok(()) | Err(AuthError::MissingSession) => {
                self.status = Some("Signed out.".to_string());
            }
            Err(e) => self.status = Some(e.remote_message()),
        }
        self.pump_events().await;
    }

    /// Load the signed-in user's profile
    ///
    /// Fails soft: on error the profile stays absent and a status
    /// message is surfaced.
    pub async fn load_profile(&mut self) {
        let Some(user_id) = self.session.as_ref().map(|s| s.user.id.clone()) else {
            return;
        };

        let result = match self.supabase.from_with_session("profiles") {
            Ok(client) => client
                .select("*")
                .eq("id", &user_id)
                .execute_single::<Profile>()
                .await
                .map_err(Error::from),
            Err(e) => Err(e),
        };

        match result {
            Ok(profile) => {
                let is_admin = profile.is_admin;
                self.profile = Some(profile);
                if is_admin {
                    self.load_admin_logs().await;
                } else {
                    self.admin_logs.clear();
                }
            }
            Err(e) => self.status = Some(status_message(&e)),
        }
    }

    /// Refresh the signed-in user's record list
    ///
    /// On failure the previously loaded list is preserved.
    pub async fn load_logs(&mut self) {
        let result = match self.supabase.from_with_session("read_logs") {
            Ok(client) => client
                .select("*")
                .order("read_at", SortOrder::Descending)
                .limit(self.config.log_fetch_limit)
                .execute::<ReadLog>()
                .await
                .map_err(Error::from),
            Err(e) => Err(e),
        };

        match result {
            Ok(rows) => self.logs = rows,
            Err(e) => self.status = Some(status_message(&e)),
        }
    }

    /// Refresh the all-users record list (admin only)
    ///
    /// The remote procedure is gated server-side by the profile's
    /// privilege flag; this only runs when that flag is set locally.
    pub async fn load_admin_logs(&mut self) {
        let result = match self
            .supabase
            .rpc_with_session("get_all_read_logs_admin", serde_json::json!({}))
        {
            Ok(client) => client
                .call_rpc::<Vec<AdminReadLog>>()
                .await
                .map_err(Error::from),
            Err(e) => Err(e),
        };

        match result {
            Ok(rows) => self.admin_logs = rows,
            Err(e) => self.status = Some(status_message(&e)),
        }
    }

    /// Capture the current position into the form
    ///
    /// One-shot, 10 second timeout, no cached fix. Failure surfaces a
    /// status message and never blocks submission.
    pub async fn capture_location(&mut self) {
        self.status = Some("Getting location...".to_string());

        let options = PositionOptions::default();
        let request = self.location_provider.current_position(&options);
        let result = match tokio::time::timeout(options.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(LocationError::Timeout),
        };

        match result {
            Ok(position) => {
                self.form.location = Some(CapturedLocation {
                    lat: position.lat,
                    lng: position.lng,
                    accuracy_m: position.accuracy_m,
                });
                self.status = Some("Location captured.".to_string());
            }
            Err(e) => self.status = Some(format!("Location error: {}", e)),
        }
    }

    /// Submit the current form as one new record
    pub async fn submit_log(&mut self) {
        // 実行中の二重送信を抑止
        if self.loading {
            return;
        }

        let Some(user_id) = self.session.as_ref().map(|s| s.user.id.clone()) else {
            self.status = Some("Please sign in first.".to_string());
            return;
        };

        let Some(read_at) = Local.from_local_datetime(&self.form.read_at).earliest() else {
            self.status = Some("Invalid read time.".to_string());
            return;
        };

        self.loading = true;
        self.status = Some("Saving log...".to_string());

        // 省略されたフィールドは明示的な null として送られる
        let payload = NewReadLog {
            user_id,
            juz_number: self.form.juz,
            surah_number: self.form.surah,
            read_at: read_at.with_timezone(&Utc),
            lat: self.form.location.map(|l| l.lat),
            lng: self.form.location.map(|l| l.lng),
            location_accuracy_m: self.form.location.map(|l| l.accuracy_m),
        };

        let result = match self.supabase.from_with_session("read_logs") {
            Ok(client) => client.insert(&payload).await.map_err(Error::from),
            Err(e) => Err(e),
        };

        match result {
            Ok(_) => {
                self.status = Some("Read log saved ✅".to_string());
                // 連続記録のため、スーラ以外のフォーム値は残す
                self.form.surah = None;
                self.load_logs().await;
                if self.profile.as_ref().map(|p| p.is_admin).unwrap_or(false) {
                    self.load_admin_logs().await;
                }
            }
            Err(e) => self.status = Some(status_message(&e)),
        }
        self.loading = false;
    }

    /// Per-juz counts derived from the current record list
    pub fn counts_by_juz(&self) -> Vec<(i32, usize)> {
        stats::counts_by_juz(&self.logs)
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn logs(&self) -> &[ReadLog] {
        &self.logs
    }

    pub fn admin_logs(&self) -> &[AdminReadLog] {
        &self.admin_logs
    }

    pub fn auth_view(&self) -> AuthView {
        self.auth_view
    }

    /// Switch between the sign-in, sign-up and forgot-password views
    pub fn set_auth_view(&mut self, view: AuthView) {
        self.auth_view = view;
        self.auth_error = None;
        self.auth_info = None;
    }

    pub fn form(&self) -> &LogForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut LogForm {
        &mut self.form
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn auth_error(&self) -> Option<&str> {
        self.auth_error.as_deref()
    }

    pub fn auth_info(&self) -> Option<&str> {
        self.auth_info.as_deref()
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.dispose();
    }
}

// ステータス表示向けにリモートのメッセージを取り出す
fn status_message(err: &Error) -> String {
    match err {
        Error::Database(e) => e.remote_message(),
        Error::Auth(e) => e.remote_message(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{FixedPosition, Position};
    use serde_json::json;
    use wiremock::matchers::{any, body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session_body(user_id: &str, confirmed: bool) -> serde_json::Value {
        json!({
            "access_token": "test_access_token",
            "refresh_token": "test_refresh_token",
            "expires_in": 3600,
            "token_type": "bearer",
            "user": user_body(user_id, confirmed)
        })
    }

    fn user_body(user_id: &str, confirmed: bool) -> serde_json::Value {
        json!({
            "id": user_id,
            "email": "reader@example.com",
            "email_confirmed_at": if confirmed { json!("2024-01-01T00:00:00Z") } else { json!(null) },
            "app_metadata": {},
            "user_metadata": {},
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    fn log_row(id: i64, juz: i32) -> serde_json::Value {
        json!({
            "id": id,
            "user_id": "user-1",
            "juz_number": juz,
            "surah_number": null,
            "read_at": "2024-03-01T10:00:00Z",
            "lat": null,
            "lng": null,
            "location_accuracy_m": null
        })
    }

    async fn mount_lookup(server: &MockServer, email: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/get_email_by_its"))
            .respond_with(ResponseTemplate::new(200).set_body_json(email))
            .mount(server)
            .await;
    }

    async fn mount_sign_in(server: &MockServer, is_admin: bool) {
        mount_lookup(server, json!("reader@example.com")).await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .respond_with(ResponseTemplate::new(200).set_body_json(session_body("user-1", true)))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_body("user-1", true)))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/profiles"))
            .and(query_param("id", "eq.user-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "user-1",
                "full_name": "Test Reader",
                "its": "40239713",
                "is_admin": is_admin
            })))
            .mount(server)
            .await;
    }

    async fn test_app(server: &MockServer) -> App {
        let config = TrackerConfig::new(&server.uri(), "test_key");
        let mut app = App::new(config);
        app.init().await;
        app
    }

    #[tokio::test]
    async fn sign_in_loads_profile_and_logs() {
        let server = MockServer::start().await;
        mount_sign_in(&server, false).await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/read_logs"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([log_row(1, 3), log_row(2, 3)])),
            )
            .mount(&server)
            .await;

        let mut app = test_app(&server).await;
        app.sign_in("40239713", "password123").await;

        assert!(app.auth_error().is_none());
        assert_eq!(app.session().unwrap().user.id, "user-1");
        assert_eq!(app.profile().unwrap().its.as_deref(), Some("40239713"));
        assert_eq!(app.logs().len(), 2);
        assert!(app.admin_logs().is_empty());
    }

    #[tokio::test]
    async fn failed_lookup_stays_generic() {
        let server = MockServer::start().await;
        mount_lookup(&server, serde_json::Value::Null).await;
        // 資格情報チェックまで到達してはならない
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(session_body("user-1", true)))
            .expect(0)
            .mount(&server)
            .await;

        let mut app = test_app(&server).await;
        app.sign_in("99999999", "password123").await;

        assert_eq!(app.auth_error(), Some("Invalid ITS or password."));
        assert!(app.session().is_none());
    }

    #[tokio::test]
    async fn unconfirmed_email_forces_sign_out() {
        let server = MockServer::start().await;
        mount_lookup(&server, json!("reader@example.com")).await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .respond_with(ResponseTemplate::new(200).set_body_json(session_body("user-1", false)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_body("user-1", false)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/profiles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "user-1", "full_name": null, "its": null, "is_admin": false
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/read_logs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let mut app = test_app(&server).await;
        app.sign_in("40239713", "password123").await;

        assert_eq!(
            app.auth_error(),
            Some("Please confirm your email first, then sign in.")
        );
        assert!(app.session().is_none());
        assert!(app.profile().is_none());
    }

    #[tokio::test]
    async fn submit_sends_explicit_nulls_and_clears_surah() {
        let server = MockServer::start().await;
        mount_sign_in(&server, false).await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/read_logs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/read_logs"))
            .and(body_partial_json(json!({
                "user_id": "user-1",
                "juz_number": 15,
                "surah_number": null,
                "lat": null,
                "lng": null,
                "location_accuracy_m": null
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([log_row(10, 15)])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/read_logs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([log_row(10, 15)])))
            .mount(&server)
            .await;

        let mut app = test_app(&server).await;
        app.sign_in("40239713", "password123").await;

        app.form_mut().juz = 15;
        app.form_mut().surah = None;
        app.submit_log().await;

        assert_eq!(app.status(), Some("Read log saved ✅"));
        assert!(app.form().surah.is_none());
        assert_eq!(app.form().juz, 15);
        assert_eq!(app.logs().len(), 1);
        assert_eq!(app.counts_by_juz(), vec![(15, 1)]);
    }

    #[tokio::test]
    async fn submit_failure_keeps_form_and_surfaces_message() {
        let server = MockServer::start().await;
        mount_sign_in(&server, false).await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/read_logs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/read_logs"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "code": "23514",
                "message": "new row violates check constraint",
                "details": null,
                "hint": null
            })))
            .mount(&server)
            .await;

        let mut app = test_app(&server).await;
        app.sign_in("40239713", "password123").await;

        app.form_mut().juz = 31;
        app.form_mut().surah = Some(2);
        app.submit_log().await;

        assert_eq!(app.status(), Some("new row violates check constraint"));
        // 再試行に備えてフォームはそのまま
        assert_eq!(app.form().juz, 31);
        assert_eq!(app.form().surah, Some(2));
        assert!(!app.is_loading());
    }

    #[tokio::test]
    async fn submit_without_session_is_local_failure() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let mut app = test_app(&server).await;
        app.submit_log().await;

        assert_eq!(app.status(), Some("Please sign in first."));
    }

    #[tokio::test]
    async fn fetch_failure_preserves_previous_list() {
        let server = MockServer::start().await;
        mount_sign_in(&server, false).await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/read_logs"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([log_row(1, 3), log_row(2, 7)])),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/read_logs"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "code": "XX000",
                "message": "internal error",
                "details": null,
                "hint": null
            })))
            .mount(&server)
            .await;

        let mut app = test_app(&server).await;
        app.sign_in("40239713", "password123").await;
        assert_eq!(app.logs().len(), 2);

        app.load_logs().await;

        // 失敗時は直前のリストを保持する方針
        assert_eq!(app.logs().len(), 2);
        assert_eq!(app.status(), Some("internal error"));
    }

    #[tokio::test]
    async fn sign_out_clears_all_lists_and_profile() {
        let server = MockServer::start().await;
        mount_sign_in(&server, true).await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/read_logs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([log_row(1, 3)])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/get_all_read_logs_admin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": 1,
                "full_name": "Test Reader",
                "its": "40239713",
                "email": "reader@example.com",
                "juz_number": 3,
                "surah_number": null,
                "read_at": "2024-03-01T10:00:00Z",
                "lat": null,
                "lng": null
            }])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let mut app = test_app(&server).await;
        app.sign_in("40239713", "password123").await;
        assert!(app.profile().unwrap().is_admin);
        assert_eq!(app.admin_logs().len(), 1);
        assert_eq!(app.logs().len(), 1);

        app.sign_out().await;

        assert_eq!(app.status(), Some("Signed out."));
        assert!(app.session().is_none());
        assert!(app.profile().is_none());
        assert!(app.logs().is_empty());
        assert!(app.admin_logs().is_empty());
    }

    #[tokio::test]
    async fn reset_mismatch_blocks_before_any_remote_call() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let mut app = test_app(&server).await;
        app.reset_password_now("new-password", "other-password").await;

        assert_eq!(app.auth_error(), Some("Passwords do not match."));
    }

    #[tokio::test]
    async fn recovery_event_switches_to_reset_view() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/verify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(session_body("user-1", true)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/profiles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "user-1", "full_name": null, "its": null, "is_admin": false
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/read_logs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let mut app = test_app(&server).await;
        app.supabase.auth().verify_recovery("token").await.unwrap();
        app.pump_events().await;

        assert_eq!(app.auth_view(), AuthView::Reset);
        assert_eq!(app.auth_info(), Some("Set your new password below."));
        assert!(app.session().is_some());
    }

    #[tokio::test]
    async fn capture_location_fills_form() {
        let server = MockServer::start().await;
        let config = TrackerConfig::new(&server.uri(), "test_key");
        let mut app = App::new(config).with_location_provider(Box::new(FixedPosition(Position {
            lat: 24.4539,
            lng: 54.3773,
            accuracy_m: 12.0,
        })));
        app.init().await;

        app.capture_location().await;

        assert_eq!(app.status(), Some("Location captured."));
        let location = app.form().location.unwrap();
        assert!((location.lat - 24.4539).abs() < f64::EPSILON);
        assert!((location.accuracy_m - 12.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn capture_location_failure_is_nonfatal() {
        let server = MockServer::start().await;
        let config = TrackerConfig::new(&server.uri(), "test_key");
        let mut app = App::new(config);
        app.init().await;

        app.capture_location().await;

        assert_eq!(
            app.status(),
            Some("Location error: Geolocation is not supported on this platform.")
        );
        assert!(app.form().location.is_none());
    }
}
