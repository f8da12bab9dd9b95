//! Typed rows and payloads for the tracker's remote boundary
//!
//! The remote store itself is untyped; every request and response shape
//! used by the app is pinned down here so the boundary is statically
//! checked.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// プロフィール行（ユーザーごとに1行、アプリからは読み取りのみ）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub full_name: Option<String>,
    pub its: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

/// 読誦ログ行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadLog {
    pub id: i64,
    pub user_id: String,
    pub juz_number: i32,
    pub surah_number: Option<i32>,
    pub read_at: DateTime<Utc>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub location_accuracy_m: Option<f64>,
}

/// 読誦ログの挿入ペイロード
///
/// 省略可能なフィールドは省略せず明示的な null として送る。
#[derive(Debug, Clone, Serialize)]
pub struct NewReadLog {
    pub user_id: String,
    pub juz_number: i32,
    pub surah_number: Option<i32>,
    pub read_at: DateTime<Utc>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub location_accuracy_m: Option<f64>,
}

/// 管理者向けRPCが返す、投稿者情報付きの読誦ログ行
#[derive(Debug, Clone, Deserialize)]
pub struct AdminReadLog {
    pub id: i64,
    pub full_name: Option<String>,
    pub its: Option<String>,
    pub email: Option<String>,
    pub juz_number: i32,
    pub surah_number: Option<i32>,
    pub read_at: DateTime<Utc>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

/// 一度だけ取得した現在地（フォーム状態として保持）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapturedLocation {
    pub lat: f64,
    pub lng: f64,
    pub accuracy_m: f64,
}
