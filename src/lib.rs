//! Quran Read Tracker client
//!
//! A Rust client for the Quran reading log tracker, built on a hosted
//! Supabase project. Users authenticate, submit timestamped reading
//! logs, and view their own (and, for administrators, all users')
//! records. Business rules and row visibility live in the remote
//! service; this crate renders no UI and holds no durable state.

pub mod app;
pub mod config;
pub mod error;
pub mod identity;
pub mod location;
pub mod models;
pub mod stats;

use reqwest::Client;

use crate::error::Error;
use quran_read_tracker_auth::{Auth, AuthError, AuthOptions};
use quran_read_tracker_postgrest::PostgrestClient;

/// The entry point for the tracker's remote collaborator
pub struct Supabase {
    /// The base URL for the Supabase project
    pub url: String,
    /// The anonymous API key for the Supabase project
    pub key: String,
    /// HTTP client used for requests
    pub http_client: Client,
    /// Auth client for user management and authentication
    pub auth: Auth,
}

impl Supabase {
    /// Create a new client
    ///
    /// # Example
    ///
    /// ```
    /// use quran_read_tracker::Supabase;
    ///
    /// let supabase = Supabase::new("https://your-project-url.supabase.co", "your-anon-key");
    /// ```
    pub fn new(supabase_url: &str, supabase_key: &str) -> Self {
        Self::new_with_options(supabase_url, supabase_key, AuthOptions::default())
    }

    /// Create a new client with custom auth options
    pub fn new_with_options(supabase_url: &str, supabase_key: &str, options: AuthOptions) -> Self {
        let http_client = Client::new();

        let auth = Auth::new(supabase_url, supabase_key, http_client.clone(), options);

        Self {
            url: supabase_url.to_string(),
            key: supabase_key.to_string(),
            http_client,
            auth,
        }
    }

    /// Get a reference to the auth client
    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    /// Create a query client for a table or view
    pub fn from(&self, table: &str) -> PostgrestClient {
        PostgrestClient::new(&self.url, &self.key, table, self.http_client.clone())
    }

    /// Create a query client carrying the current session's token
    ///
    /// Row visibility is enforced remotely; the token is what scopes
    /// reads to the signed-in user.
    pub fn from_with_session(&self, table: &str) -> Result<PostgrestClient, Error> {
        let session = self.auth.get_session().ok_or(AuthError::MissingSession)?;
        let client = self.from(table).with_auth(&session.access_token)?;
        Ok(client)
    }

    /// Create an RPC client for a remote procedure
    pub fn rpc(&self, function: &str, params: serde_json::Value) -> PostgrestClient {
        PostgrestClient::rpc(&self.url, &self.key, function, params, self.http_client.clone())
    }

    /// Create an RPC client carrying the current session's token
    pub fn rpc_with_session(
        &self,
        function: &str,
        params: serde_json::Value,
    ) -> Result<PostgrestClient, Error> {
        let session = self.auth.get_session().ok_or(AuthError::MissingSession)?;
        let client = self.rpc(function, params).with_auth(&session.access_token)?;
        Ok(client)
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::app::{App, AuthView, LogForm, SignUpForm};
    pub use crate::config::{ItsStrategy, TrackerConfig};
    pub use crate::error::Error;
    pub use crate::Supabase;
}
