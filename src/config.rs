//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `TOKEN_SECRET` (required): signing key for scanner session tokens
/// - `BLOB_STORE_URL` (required): base URL of the image blob store
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `TOKEN_VALIDITY_HOURS` (optional): scanner session lifetime, defaults to 24
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    /// Signing key for scanner session tokens (JWT, HMAC-SHA256).
    ///
    /// Tokens are stateless: anyone holding this secret can mint valid
    /// sessions. Rotating it invalidates every outstanding scanner session.
    pub token_secret: String,

    /// Base URL of the blob store that holds rendered QR images.
    pub blob_store_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_token_validity_hours")]
    pub token_validity_hours: u64,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

/// Scanner sessions last one day unless configured otherwise.
fn default_token_validity_hours() -> u64 {
    24
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Parse environment variables into Config struct
        // Field names are automatically converted: database_url -> DATABASE_URL
        envy::from_env::<Config>()
    }
}
