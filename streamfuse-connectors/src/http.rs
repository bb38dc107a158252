//! HTTP/HTTPS Batch Uploader
//!
//! ## Overview
//!
//! The reference [`BatchSink`]: one POST per completed batch, JSON body from
//! [`payload::upload_body`], blocking I/O on `ureq`. Blocking is deliberate:
//! the drainer already runs on its own thread (or inside `spawn_blocking`
//! under the tokio runtime), and a synchronous client keeps the dependency
//! surface small enough for the kind of single-purpose field units this
//! crate targets.
//!
//! ## Retry Policy
//!
//! Transient failures retry with exponential backoff (`100 * 2^attempt` ms):
//!
//! - transport errors (DNS, refused, timeout): retry
//! - `5xx` and `429`: retry
//! - any other `4xx`: fail immediately, the payload will not get better
//!
//! A batch that exhausts its retries is reported as failed to the drainer
//! and dropped; the server is expected to deduplicate on `(device_id,
//! timestamp)` if an upload succeeded without the client seeing the
//! response.
//!
//! ## Example Usage
//!
//! ```
//! use streamfuse_connectors::http::{HttpConfig, HttpUploader};
//!
//! # fn main() -> Result<(), streamfuse_connectors::ConnectorError> {
//! let config = HttpConfig::new("https://ingest.example.com/upload")
//!     .bearer_token("api-token")
//!     .timeout_secs(15)
//!     .max_retries(3);
//! let uploader = HttpUploader::new(config)?;
//! # let _ = uploader;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use base64::Engine as _;
use streamfuse_core::drainer::BatchSink;
use streamfuse_core::record::Batch;

use crate::{payload, ConnectionStats, ConnectorError};

/// HTTP upload configuration
#[derive(Clone)]
pub struct HttpConfig {
    /// Full upload URL, e.g. `https://ingest.example.com/upload`
    pub endpoint: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Authentication method
    pub auth: AuthMethod,
    /// Extra headers sent with every request
    pub headers: HashMap<String, String>,
    /// Retries after the first attempt; `0` means one attempt total
    pub max_retries: u32,
    /// User agent string
    pub user_agent: String,
}

/// Authentication methods
#[derive(Clone)]
pub enum AuthMethod {
    /// No authentication
    None,
    /// Bearer token
    Bearer(String),
    /// Basic authentication
    Basic {
        /// Account name
        username: String,
        /// Account password
        password: String,
    },
    /// API key in a custom header
    ApiKey {
        /// Header name
        header: String,
        /// Header value
        value: String,
    },
}

impl HttpConfig {
    /// Create a configuration posting to the given URL
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: Duration::from_secs(30),
            auth: AuthMethod::None,
            headers: HashMap::new(),
            max_retries: 3,
            user_agent: format!("streamfuse/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Set bearer token authentication
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.auth = AuthMethod::Bearer(token.into());
        self
    }

    /// Set basic authentication
    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = AuthMethod::Basic {
            username: username.into(),
            password: password.into(),
        };
        self
    }

    /// Set API key authentication
    pub fn api_key(mut self, header: impl Into<String>, value: impl Into<String>) -> Self {
        self.auth = AuthMethod::ApiKey {
            header: header.into(),
            value: value.into(),
        };
        self
    }

    /// Set the per-request timeout in seconds
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Set the retry budget
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Add a custom header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Backoff before retry `attempt` (1-based); capped at 6.4 s
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(100 * (1 << attempt.min(6)))
}

/// Blocking batch uploader over `ureq`
pub struct HttpUploader {
    config: HttpConfig,
    agent: ureq::Agent,
    stats: ConnectionStats,
}

impl HttpUploader {
    /// Create an uploader, validating the endpoint URL
    pub fn new(config: HttpConfig) -> Result<Self, ConnectorError> {
        if !config.endpoint.starts_with("http://") && !config.endpoint.starts_with("https://") {
            return Err(ConnectorError::Config(format!(
                "endpoint must be an http(s) URL: {}",
                config.endpoint
            )));
        }

        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build();

        Ok(Self {
            config,
            agent,
            stats: ConnectionStats::default(),
        })
    }

    /// Transfer counters for this uploader
    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    /// POST request with auth and headers applied
    fn build_request(&self) -> ureq::Request {
        let mut request = self.agent.post(&self.config.endpoint);

        match &self.config.auth {
            AuthMethod::None => {}
            AuthMethod::Bearer(token) => {
                request = request.set("Authorization", &format!("Bearer {token}"));
            }
            AuthMethod::Basic { username, password } => {
                let credentials = base64::engine::general_purpose::STANDARD
                    .encode(format!("{username}:{password}"));
                request = request.set("Authorization", &format!("Basic {credentials}"));
            }
            AuthMethod::ApiKey { header, value } => {
                request = request.set(header, value);
            }
        }

        for (name, value) in &self.config.headers {
            request = request.set(name, value);
        }

        request
            .set("Content-Type", "application/json")
            .set("Accept", "application/json")
    }

    fn post_with_retry(&mut self, body: &str) -> Result<(), ConnectorError> {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                self.stats.retries += 1;
                thread::sleep(backoff_delay(attempt));
            }

            match self.build_request().send_string(body) {
                Ok(response) => {
                    // drain the response so the agent can reuse the connection
                    let _ = response.into_string();
                    return Ok(());
                }
                Err(ureq::Error::Status(code, response)) if code >= 500 || code == 429 => {
                    log::warn!(
                        "upload got {code}, attempt {attempt} of {}",
                        self.config.max_retries
                    );
                    last_error = Some(ConnectorError::Status {
                        code,
                        body: response.into_string().unwrap_or_default(),
                    });
                }
                Err(ureq::Error::Status(code, response)) => {
                    return Err(ConnectorError::Status {
                        code,
                        body: response.into_string().unwrap_or_default(),
                    });
                }
                Err(ureq::Error::Transport(transport)) => {
                    log::warn!(
                        "upload transport error, attempt {attempt} of {}: {transport}",
                        self.config.max_retries
                    );
                    last_error = Some(ConnectorError::Transport(transport.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ConnectorError::Transport("retries exhausted".into())))
    }
}

impl BatchSink for HttpUploader {
    type Error = ConnectorError;

    fn dispatch(&mut self, batch: Batch) -> Result<(), Self::Error> {
        let body = match payload::upload_body(&batch)? {
            Some(body) => body,
            None => return Ok(()),
        };

        match self.post_with_retry(&body) {
            Ok(()) => {
                self.stats.batches_sent += 1;
                self.stats.bytes_sent += body.len() as u64;
                log::debug!("uploaded {} records ({} bytes)", batch.len(), body.len());
                Ok(())
            }
            Err(err) => {
                self.stats.batches_failed += 1;
                self.stats.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }
}
