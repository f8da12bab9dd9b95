//! Platform geolocation collaborator
//!
//! Position capture is a one-shot request against whatever positioning
//! capability the embedding platform offers. The app only depends on
//! the trait; failures surface as status messages and never block the
//! surrounding form.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// 取得した現在地
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub lat: f64,
    pub lng: f64,
    /// 水平精度（メートル）
    pub accuracy_m: f64,
}

/// 位置取得のオプション
#[derive(Debug, Clone, Copy)]
pub struct PositionOptions {
    pub enable_high_accuracy: bool,
    pub timeout: Duration,
    /// キャッシュされた測位結果を許容する最大経過時間
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            enable_high_accuracy: true,
            timeout: Duration::from_secs(10),
            maximum_age: Duration::ZERO,
        }
    }
}

/// エラー型
#[derive(Error, Debug)]
pub enum LocationError {
    #[error("Geolocation is not supported on this platform.")]
    Unsupported,

    #[error("User denied the request for geolocation.")]
    PermissionDenied,

    #[error("Position unavailable: {0}")]
    PositionUnavailable(String),

    #[error("The request to get user location timed out.")]
    Timeout,
}

/// 測位機能の抽象
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// 一度だけ現在地を取得する
    async fn current_position(&self, options: &PositionOptions) -> Result<Position, LocationError>;
}

/// 測位機能を持たないプラットフォーム向けの既定実装
pub struct UnsupportedLocation;

#[async_trait]
impl LocationProvider for UnsupportedLocation {
    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> Result<Position, LocationError> {
        Err(LocationError::Unsupported)
    }
}

/// 固定座標を返す実装（デモとテスト用）
pub struct FixedPosition(pub Position);

#[async_trait]
impl LocationProvider for FixedPosition {
    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> Result<Position, LocationError> {
        Ok(self.0)
    }
}
