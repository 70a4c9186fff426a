//! HTTP client for the tinypng shrink API.
//!
//! Protocol:
//! 1. `POST <endpoint>` the raw image with basic auth (`api:<key>`)
//! 2. `201 Created` carries the result URL in `Location`
//! 3. `GET` that URL for the compressed image
//!
//! Every request is bounded by the client timeout. Nothing is retried.

use super::{Compressed, Compressor, TransformError};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{Client, StatusCode, Url};
use std::fmt;
use std::time::Duration;

/// Public shrink endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.tinypng.com/shrink";

/// Per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Basic auth user name the API expects; the key is the password.
const AUTH_USER: &str = "api";

const BINARY_CONTENT_TYPE: &str = "application/octet-stream";

pub struct TinifyClient {
    client: Client,
    endpoint: Url,
    key: String,
}

impl TinifyClient {
    /// Build a client for `endpoint` authenticating with `key`.
    pub fn new(
        key: impl Into<String>,
        endpoint: &str,
        timeout: Duration,
    ) -> Result<Self, TransformError> {
        let key = key.into();
        if key.is_empty() {
            return Err(TransformError::EmptyCredential);
        }

        let endpoint = Url::parse(endpoint).map_err(|e| TransformError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

        let client = Client::builder()
            .user_agent(concat!("shrinkzip/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint,
            key,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Upload `input` and return the URL of the compressed result.
    async fn upload(&self, input: Bytes) -> Result<Url, TransformError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .basic_auth(AUTH_USER, Some(&self.key))
            .header(CONTENT_TYPE, BINARY_CONTENT_TYPE)
            .body(input)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::CREATED {
            let body = response.text().await?;
            return Err(TransformError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let location = response
            .headers()
            .get(LOCATION)
            .ok_or(TransformError::MissingLocation)?;
        let location = location
            .to_str()
            .map_err(|e| TransformError::InvalidLocation {
                location: String::from_utf8_lossy(location.as_bytes()).into_owned(),
                reason: e.to_string(),
            })?;

        // Relative locations resolve against the endpoint
        self.endpoint
            .join(location)
            .map_err(|e| TransformError::InvalidLocation {
                location: location.to_string(),
                reason: e.to_string(),
            })
    }

    async fn download(&self, url: Url) -> Result<Bytes, TransformError> {
        let response = self
            .client
            .get(url.clone())
            .basic_auth(AUTH_USER, Some(&self.key))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(TransformError::Download {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.bytes().await?)
    }
}

#[async_trait]
impl Compressor for TinifyClient {
    async fn compress(&self, input: Bytes) -> Result<Compressed, TransformError> {
        if self.key.is_empty() {
            return Err(TransformError::EmptyCredential);
        }
        if input.is_empty() {
            return Err(TransformError::EmptyInput);
        }

        let input_len = input.len();
        let url = self.upload(input).await?;
        tracing::debug!(%url, input_len, "Upload accepted");

        let data = self.download(url).await?;
        tracing::debug!(input_len, output_len = data.len(), "Downloaded result");

        Ok(Compressed::new(data))
    }
}

impl fmt::Debug for TinifyClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TinifyClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Digest;
    use wiremock::matchers::{basic_auth, body_bytes, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const KEY: &str = "secret-key";

    fn client_for(server: &MockServer, timeout: Duration) -> TinifyClient {
        TinifyClient::new(KEY, &format!("{}/shrink", server.uri()), timeout).unwrap()
    }

    #[tokio::test]
    async fn test_compress_follows_location() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/shrink"))
            .and(basic_auth(AUTH_USER, KEY))
            .and(header("content-type", BINARY_CONTENT_TYPE))
            .and(body_bytes(b"raw image".to_vec()))
            .respond_with(ResponseTemplate::new(201).insert_header("Location", "/output/abc123"))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/output/abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"tiny".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, DEFAULT_TIMEOUT);
        let out = client
            .compress(Bytes::from_static(b"raw image"))
            .await
            .unwrap();

        assert_eq!(&out.data[..], b"tiny");
        assert_eq!(out.digest, Digest::of(b"tiny"));
    }

    #[tokio::test]
    async fn test_absolute_location() {
        let server = MockServer::start().await;
        let location = format!("{}/output/xyz", server.uri());

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).insert_header("Location", location.as_str()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/output/xyz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"small".to_vec()))
            .mount(&server)
            .await;

        let out = client_for(&server, DEFAULT_TIMEOUT)
            .compress(Bytes::from_static(b"png"))
            .await
            .unwrap();
        assert_eq!(&out.data[..], b"small");
    }

    #[tokio::test]
    async fn test_error_status_carries_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401).set_body_string(r#"{"error":"Unauthorized"}"#),
            )
            .mount(&server)
            .await;

        let err = client_for(&server, DEFAULT_TIMEOUT)
            .compress(Bytes::from_static(b"png"))
            .await
            .unwrap_err();

        match err {
            TransformError::Status { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("Unauthorized"));
            }
            other => panic!("Expected Status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_created_without_location() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let err = client_for(&server, DEFAULT_TIMEOUT)
            .compress(Bytes::from_static(b"png"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::MissingLocation));
    }

    #[tokio::test]
    async fn test_download_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).insert_header("Location", "/output/gone"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("backend exploded"))
            .mount(&server)
            .await;

        let err = client_for(&server, DEFAULT_TIMEOUT)
            .compress(Bytes::from_static(b"png"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::Download { status: 500, .. }));
        let message = err.to_string();
        assert!(message.contains("/output/gone"), "{}", message);
        assert!(message.ends_with("failed with status 500: backend exploded"), "{}", message);
    }

    #[tokio::test]
    async fn test_timeout_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_secs(2)))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server, Duration::from_millis(100))
            .compress(Bytes::from_static(b"png"))
            .await
            .unwrap_err();

        match err {
            TransformError::Http(e) => assert!(e.is_timeout()),
            other => panic!("Expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_request() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let err = client_for(&server, DEFAULT_TIMEOUT)
            .compress(Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::EmptyInput));
    }

    #[test]
    fn test_empty_key_rejected() {
        let err = TinifyClient::new("", DEFAULT_ENDPOINT, DEFAULT_TIMEOUT).unwrap_err();
        assert!(matches!(err, TransformError::EmptyCredential));
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let err = TinifyClient::new(KEY, "not a url", DEFAULT_TIMEOUT).unwrap_err();
        assert!(matches!(err, TransformError::InvalidEndpoint { .. }));
    }

    #[test]
    fn test_debug_redacts_key() {
        let client = TinifyClient::new(KEY, DEFAULT_ENDPOINT, DEFAULT_TIMEOUT).unwrap();
        let debug = format!("{:?}", client);
        assert!(!debug.contains(KEY));
        assert!(debug.contains("api.tinypng.com"));
    }
}
