//! reqwest-backed transport.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, error, instrument, warn};

use super::{ApiRequest, ApiResponse, Transport, Verb};
use crate::config::ManagerConfig;
use crate::credentials::{SecretString, REDACTED};
use crate::error::{Error, Result, TransportError};

/// HTTP transport executing requests against the configured endpoints.
///
/// Sends the bearer-style `Authorization: token <secret>` header and the
/// assembled User-Agent on every call. Error diagnostics capture the
/// outbound request headers with the authorization value masked, so the
/// credential cannot leak through emitted errors.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    token: SecretString,
    api_url: String,
    rest_url: String,
}

impl HttpTransport {
    /// Builds a transport from the manager configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the endpoint cannot be parsed
    /// or the underlying client cannot be constructed.
    pub fn new(config: &ManagerConfig) -> Result<Self> {
        let rest_url = config.rest_endpoint()?;
        let client = Client::builder()
            .timeout(config.timeout)
            .gzip(true)
            .user_agent(config.user_agent())
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            token: config.token.clone(),
            api_url: config.endpoint.clone(),
            rest_url,
        })
    }

    fn base_url(&self, request: &ApiRequest) -> &str {
        if request.use_rest_api {
            &self.rest_url
        } else {
            &self.api_url
        }
    }

    fn full_url(&self, request: &ApiRequest) -> String {
        let base = self.base_url(request).trim_end_matches('/');
        let path = request.url.trim_start_matches('/');
        format!("{base}/{path}")
    }

    fn build_headers(&self, request: &ApiRequest) -> std::result::Result<HeaderMap, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let auth = format!("token {}", self.token.expose_secret());
        let mut auth_value = HeaderValue::from_str(&auth)
            .map_err(|_| TransportError::network("token contains invalid header characters"))?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);

        if let Some(extra) = &request.headers {
            for (name, value) in extra {
                let name: reqwest::header::HeaderName = name
                    .parse()
                    .map_err(|_| TransportError::network(format!("invalid header name \"{name}\"")))?;
                let value = HeaderValue::from_str(value).map_err(|_| {
                    TransportError::network(format!("invalid value for header \"{name}\""))
                })?;
                headers.insert(name, value);
            }
        }
        Ok(headers)
    }

    /// Outbound headers as a JSON object with the credential masked,
    /// suitable for attaching to error diagnostics.
    fn masked_headers(headers: &HeaderMap) -> Value {
        let mut map = serde_json::Map::new();
        for (key, value) in headers {
            let rendered = if key == AUTHORIZATION {
                REDACTED.to_string()
            } else {
                value.to_str().unwrap_or("").to_string()
            };
            map.insert(key.as_str().to_string(), Value::String(rendered));
        }
        Value::Object(map)
    }

    fn headers_to_json(headers: &HeaderMap) -> Value {
        let mut map = serde_json::Map::new();
        for (key, value) in headers {
            map.insert(
                key.as_str().to_string(),
                Value::String(value.to_str().unwrap_or("").to_string()),
            );
        }
        Value::Object(map)
    }

    fn decode_body(bytes: &[u8]) -> Value {
        if let Ok(value) = serde_json::from_slice(bytes) {
            value
        } else {
            Value::String(String::from_utf8_lossy(bytes).to_string())
        }
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    #[instrument(name = "transport_execute", skip(self, request), fields(verb = %request.verb, url = %request.url))]
    async fn execute(&self, request: &ApiRequest) -> std::result::Result<ApiResponse, TransportError> {
        // Reject unknown verbs before touching the network.
        let verb: Verb = request.verb.parse()?;
        let method = match verb {
            Verb::Get => Method::GET,
            Verb::Post => Method::POST,
            Verb::Put => Method::PUT,
            Verb::Patch => Method::PATCH,
            Verb::Delete => Method::DELETE,
        };

        let url = self.full_url(request);
        let headers = self.build_headers(request)?;
        let request_diagnostics = json!({ "headers": Self::masked_headers(&headers) });

        let mut builder = self.client.request(method, &url).headers(headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(url = %url, error = %e, "transport call failed before a response arrived");
            let message = if e.is_timeout() {
                format!("request to {url} timed out")
            } else {
                format!("request to {url} failed: {e}")
            };
            TransportError::network(message).with_payload(json!({
                "request": request_diagnostics.clone(),
            }))
        })?;

        let status = response.status();
        let response_headers = Self::headers_to_json(response.headers());
        let bytes = response.bytes().await.map_err(|e| {
            error!(url = %url, error = %e, "failed to read response body");
            TransportError::network(format!("failed to read response body: {e}"))
                .with_payload(json!({ "request": request_diagnostics.clone() }))
        })?;
        let data = Self::decode_body(&bytes);

        debug!(
            status = status.as_u16(),
            body_length = bytes.len(),
            "response received"
        );

        if !status.is_success() {
            return Err(Self::status_error(
                status,
                &url,
                data,
                response_headers,
                request_diagnostics,
            ));
        }

        Ok(ApiResponse {
            status: status.as_u16(),
            data,
            headers: response_headers,
        })
    }
}

impl HttpTransport {
    fn status_error(
        status: StatusCode,
        url: &str,
        body: Value,
        response_headers: Value,
        request_diagnostics: Value,
    ) -> TransportError {
        let payload = json!({
            "body": body,
            "headers": response_headers,
            "request": request_diagnostics,
        });
        TransportError::http(
            status.as_u16(),
            format!("HTTP {} from {url}", status.as_u16()),
            payload,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> HttpTransport {
        let config = ManagerConfig::new("https://api.example.io/v1", "secret-token");
        HttpTransport::new(&config).unwrap()
    }

    #[test]
    fn test_full_url_joins_slashes() {
        let t = transport();
        let req = ApiRequest::get("/orgs");
        assert_eq!(t.full_url(&req), "https://api.example.io/v1/orgs");

        let req = ApiRequest::get("orgs");
        assert_eq!(t.full_url(&req), "https://api.example.io/v1/orgs");
    }

    #[test]
    fn test_rest_flag_switches_base() {
        let t = transport();
        let req = ApiRequest::get("/orgs").with_rest_api();
        assert_eq!(t.full_url(&req), "https://api.example.io/rest/orgs");
    }

    #[test]
    fn test_default_headers_include_auth_and_content_type() {
        let t = transport();
        let headers = t.build_headers(&ApiRequest::get("/")).unwrap();
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "token secret-token");
    }

    #[test]
    fn test_extra_headers_merge_over_defaults() {
        let t = transport();
        let req = ApiRequest::get("/").with_header("Content-Type", "text/plain");
        let headers = t.build_headers(&req).unwrap();
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "text/plain");
    }

    #[test]
    fn test_masked_headers_hide_credential() {
        let t = transport();
        let headers = t.build_headers(&ApiRequest::get("/")).unwrap();
        let masked = HttpTransport::masked_headers(&headers);
        assert_eq!(masked["authorization"], json!(REDACTED));
        assert!(!masked.to_string().contains("secret-token"));
    }

    #[test]
    fn test_decode_body_falls_back_to_text() {
        assert_eq!(HttpTransport::decode_body(b"{\"a\":1}"), json!({"a": 1}));
        assert_eq!(
            HttpTransport::decode_body(b"plain text"),
            json!("plain text")
        );
    }

    #[tokio::test]
    async fn test_unknown_verb_rejected_without_network() {
        let t = transport();
        let err = t.execute(&ApiRequest::new("TRACE", "/")).await.unwrap_err();
        assert!(err.status.is_none());
        assert!(err.message.contains("unsupported http verb"));
    }
}
