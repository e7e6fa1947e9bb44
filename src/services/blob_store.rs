//! Narrow HTTP client for the image blob store.
//!
//! The blob store is an external collaborator that holds rendered QR images.
//! This service only ever PUTs SVG bytes keyed by the code id and builds the
//! public URL for a stored image; everything else about the store is opaque.

use reqwest::header::CONTENT_TYPE;
use url::Url;
use uuid::Uuid;

use crate::error::AppError;

/// Client for the QR image blob store.
///
/// Constructed once at startup and shared through application state, so the
/// underlying connection pool is reused across requests.
#[derive(Debug, Clone)]
pub struct BlobStoreClient {
    base_url: Url,
    http: reqwest::Client,
}

impl BlobStoreClient {
    /// Build a client for the store at `base_url`.
    ///
    /// # URL Rules
    ///
    /// - Must be a valid HTTP(S) URL
    /// - HTTPS required; HTTP allowed for localhost (testing)
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let parsed = Url::parse(base_url)
            .map_err(|_| AppError::Internal(format!("invalid blob store URL: {base_url}")))?;

        match parsed.scheme() {
            "https" => {}
            "http" => {
                let host = parsed.host_str();
                if host != Some("localhost") && host != Some("127.0.0.1") && host != Some("0.0.0.0")
                {
                    return Err(AppError::Internal(
                        "blob store URL must use HTTPS outside localhost".to_string(),
                    ));
                }
            }
            _ => {
                return Err(AppError::Internal(
                    "blob store URL must use HTTP or HTTPS".to_string(),
                ));
            }
        }

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .map_err(|e| AppError::Internal(format!("HTTP client error: {e}")))?;

        Ok(Self {
            base_url: parsed,
            http,
        })
    }

    /// Public URL of the image for a code id.
    pub fn image_url(&self, qr_code_id: Uuid) -> String {
        format!(
            "{}/qr-codes/{}.svg",
            self.base_url.as_str().trim_end_matches('/'),
            qr_code_id
        )
    }

    /// Upload rendered SVG bytes for a code, returning the public URL.
    ///
    /// # Errors
    ///
    /// Any transport error or non-2xx status surfaces as an internal error;
    /// the caller decides whether image absence is fatal. For QR generation
    /// it is not: the URL stays NULL and the next request retries.
    pub async fn upload_qr_image(&self, qr_code_id: Uuid, svg: String) -> Result<String, AppError> {
        let url = self.image_url(qr_code_id);

        let response = self
            .http
            .put(&url)
            .header(CONTENT_TYPE, "image/svg+xml")
            .body(svg)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("blob store upload failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Internal(format!(
                "blob store rejected upload: HTTP {}",
                response.status()
            )));
        }

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_image_url_from_base() {
        let client = BlobStoreClient::new("https://blobs.example.com/store/").expect("client");
        let id = Uuid::new_v4();
        assert_eq!(
            client.image_url(id),
            format!("https://blobs.example.com/store/qr-codes/{id}.svg")
        );
    }

    #[test]
    fn allows_http_for_localhost_only() {
        assert!(BlobStoreClient::new("http://localhost:9000").is_ok());
        assert!(BlobStoreClient::new("http://blobs.example.com").is_err());
        assert!(BlobStoreClient::new("ftp://blobs.example.com").is_err());
        assert!(BlobStoreClient::new("not a url").is_err());
    }
}
