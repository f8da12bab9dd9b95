//! Configuration for the tracker client

use crate::error::Error;
use std::env;

/// ITS番号からメールアドレスへの解決方式
///
/// デプロイごとにどちらか一方を選ぶ。両者の意味論は混ぜない:
/// `RpcLookup` はリモートが正であり失敗時も存在有無を漏らさない、
/// `SyntheticEmail` は存在確認なしの決定的なローカル変換。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItsStrategy {
    RpcLookup,
    SyntheticEmail,
}

/// Configuration for the tracker client
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// The base URL for the Supabase project
    pub supabase_url: String,

    /// The anonymous API key for the Supabase project
    pub supabase_key: String,

    /// Redirect target embedded in confirmation and recovery emails
    pub redirect_url: Option<String>,

    /// How the ITS identifier is resolved to a sign-in email
    pub its_strategy: ItsStrategy,

    /// Domain appended by the synthetic email transform
    pub synthetic_email_domain: String,

    /// Maximum number of own records fetched per list refresh
    pub log_fetch_limit: i32,
}

impl TrackerConfig {
    /// Create a configuration with the default deployment policy
    pub fn new(supabase_url: &str, supabase_key: &str) -> Self {
        Self {
            supabase_url: supabase_url.to_string(),
            supabase_key: supabase_key.to_string(),
            redirect_url: None,
            its_strategy: ItsStrategy::RpcLookup,
            synthetic_email_domain: "reader.qurantracker.app".to_string(),
            log_fetch_limit: 200,
        }
    }

    /// Load the configuration from environment variables
    ///
    /// `SUPABASE_URL` and `SUPABASE_KEY` are required. Optional:
    /// `TRACKER_REDIRECT_URL`, `TRACKER_ITS_STRATEGY` (`rpc` or
    /// `synthetic`), `TRACKER_EMAIL_DOMAIN`.
    pub fn from_env() -> Result<Self, Error> {
        let supabase_url =
            env::var("SUPABASE_URL").map_err(|_| Error::config("SUPABASE_URL must be set"))?;
        let supabase_key =
            env::var("SUPABASE_KEY").map_err(|_| Error::config("SUPABASE_KEY must be set"))?;

        let mut config = Self::new(&supabase_url, &supabase_key);

        if let Ok(redirect) = env::var("TRACKER_REDIRECT_URL") {
            config.redirect_url = Some(redirect);
        }
        if let Ok(strategy) = env::var("TRACKER_ITS_STRATEGY") {
            config.its_strategy = match strategy.to_lowercase().as_str() {
                "rpc" => ItsStrategy::RpcLookup,
                "synthetic" => ItsStrategy::SyntheticEmail,
                other => {
                    return Err(Error::config(format!(
                        "unknown TRACKER_ITS_STRATEGY: {}",
                        other
                    )))
                }
            };
        }
        if let Ok(domain) = env::var("TRACKER_EMAIL_DOMAIN") {
            config.synthetic_email_domain = domain;
        }

        Ok(config)
    }

    /// Set the email redirect target
    pub fn with_redirect_url(mut self, value: &str) -> Self {
        self.redirect_url = Some(value.to_string());
        self
    }

    /// Set the identifier resolution policy
    pub fn with_its_strategy(mut self, value: ItsStrategy) -> Self {
        self.its_strategy = value;
        self
    }

    /// Set the synthetic email domain
    pub fn with_synthetic_email_domain(mut self, value: &str) -> Self {
        self.synthetic_email_domain = value.to_string();
        self
    }
}
