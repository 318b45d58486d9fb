use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{DriverError, HttpTransport, Method, RequestConfig, Response};

/// Decides whether a received response counts as a success.
pub type ResponseValidator = Arc<dyn Fn(&Response) -> bool + Send + Sync>;

/// Settings for [`ReqwestTransport`].
///
/// `base_url` has no usable default: it must be an absolute `http` or
/// `https` URL, and [`ReqwestTransport::new`] rejects anything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReqwestTransportConfig {
    /// Absolute URL joined in front of every relative endpoint URL.
    pub base_url: String,
    /// Scheme placed before the token in the authorization header.
    pub token_type: String,
    /// Header carrying the credential.
    pub authorization_header: String,
    /// Default request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ReqwestTransportConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token_type: "Bearer".to_string(),
            authorization_header: "Authorization".to_string(),
            timeout_secs: 30,
        }
    }
}

impl ReqwestTransportConfig {
    /// Default settings against `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

/// [`HttpTransport`] backed by `reqwest`.
///
/// A response is accepted when the validator returns `true`; the default
/// validator requires a JSON body with `"status": "success"`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    config: ReqwestTransportConfig,
    validator: ResponseValidator,
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ReqwestTransport {
    /// Builds the client.
    ///
    /// # Errors
    /// - [`DriverError::InvalidBaseUrl`] if `base_url` is not an absolute
    ///   `http` or `https` URL
    /// - [`DriverError::RequestFailed`] if the client cannot be built
    pub fn new(config: ReqwestTransportConfig) -> Result<Self, DriverError> {
        check_base_url(&config.base_url)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DriverError::request_failed(e.to_string()))?;
        Ok(Self {
            client,
            config,
            validator: Arc::new(status_is_success),
        })
    }

    /// Replaces the response-validity predicate.
    pub fn with_validator(
        mut self,
        validator: impl Fn(&Response) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn check_base_url(base_url: &str) -> Result<(), DriverError> {
    let invalid = |reason: String| DriverError::InvalidBaseUrl {
        base_url: base_url.to_string(),
        reason,
    };
    let parsed = reqwest::Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme {other}"))),
    }
}

/// Default validator: body must contain `"status": "success"`.
pub fn status_is_success(response: &Response) -> bool {
    response.field("status").and_then(Value::as_str) == Some("success")
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

impl HttpTransport for ReqwestTransport {
    async fn send_request(
        &self,
        method: Method,
        url: &str,
        body: Value,
        config: RequestConfig,
    ) -> Result<Response, DriverError> {
        let url = self.url(url);
        debug!(%method, %url, "sending request");

        let mut request = self.client.request(to_reqwest(method), &url);
        for (name, value) in &config.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = config.timeout {
            request = request.timeout(timeout);
        }
        if !body.is_null() {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DriverError::request_failed(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| DriverError::request_failed(e.to_string()))?;
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);

        let response = Response { status, body };
        if !(self.validator)(&response) {
            warn!(%method, %url, status, "API request failed");
            return Err(DriverError::RequestFailed {
                status: Some(status),
                message: "API request failed".to_string(),
            });
        }
        Ok(response)
    }

    async fn send_authenticated_request(
        &self,
        method: Method,
        url: &str,
        token: &str,
        body: Value,
        mut config: RequestConfig,
    ) -> Result<Response, DriverError> {
        config.headers.push((
            self.config.authorization_header.clone(),
            format!("{} {token}", self.config.token_type),
        ));
        self.send_request(method, url, body, config).await
    }
}
