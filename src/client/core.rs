// The API client: request building, dispatch, status classification and the
// single refresh-and-retry recovery path.
use crate::client::cert::NoVerifier;
use crate::client::middleware::{DefaultHeadersLayer, DefaultHeadersService};
use crate::config::ApiConfig;
use crate::endpoint::Endpoint;
use crate::error::ApiError;
use crate::models::{ApiErrorResponse, ApiResponse, ErrorResponse, EtagResponse,
    ValidationErrorResponse};

use bytes::Bytes;
use http::{HeaderMap, Request, StatusCode, Uri, header};
use http_body_util::BodyExt;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::de::DeserializeOwned;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower_layer::Layer;
use tower_service::Service;
use url::Url;

type HttpsClient = DefaultHeadersService<
    Client<
        hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>,
        String,
    >,
>;

/// Returns the current bearer token, or `None` when unauthenticated.
/// Consulted once per attempt, so a request reissued after a refresh picks
/// up the new token.
pub type TokenProvider = Arc<dyn Fn() -> Option<String> + Send + Sync>;

/// Async hook awaited once when a request comes back unauthorized, before
/// the single retry. Typically refreshes the token behind `TokenProvider`.
pub type RefreshHook =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

#[derive(Clone)]
pub struct ApiClient {
    base_url: Url,
    http: HttpsClient,
    timeout: Duration,
    token_provider: Option<TokenProvider>,
    on_unauthorized: Option<RefreshHook>,
    /// Set while a refresh-and-retry cycle is in flight. While set, further
    /// unauthorized responses propagate unretried.
    refreshing: Arc<Mutex<bool>>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .map_err(|_| ApiError::InvalidUrl)?;
        if !base_url.has_host() {
            return Err(ApiError::InvalidUrl);
        }

        let insecure = config.is_development_url(&config.base_url);

        let tls_config_builder = rustls::ClientConfig::builder();

        let tls_config = if insecure {
            log::warn!(
                "certificate verification disabled for development base URL {}",
                base_url
            );
            tls_config_builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoVerifier))
                .with_no_client_auth()
        } else {
            let mut root_store = rustls::RootCertStore::empty();
            let result = rustls_native_certs::load_native_certs();
            root_store.add_parsable_certificates(result.certs);
            if root_store.is_empty() {
                return Err(ApiError::Network(Box::from(
                    "No valid system certificates found",
                )));
            }
            tls_config_builder
                .with_root_certificates(root_store)
                .with_no_client_auth()
        };

        let https_connector = HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .build();

        let http_client = Client::builder(TokioExecutor::new()).build(https_connector);
        let user_agent = format!("restkit/{}", env!("CARGO_PKG_VERSION"));
        let http = DefaultHeadersLayer::new(user_agent).layer(http_client);

        Ok(Self {
            base_url,
            http,
            timeout: Duration::from_secs(config.request_timeout_secs),
            token_provider: None,
            on_unauthorized: None,
            refreshing: Arc::new(Mutex::new(false)),
        })
    }

    pub fn with_token_provider(
        mut self,
        provider: impl Fn() -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.token_provider = Some(Arc::new(provider));
        self
    }

    pub fn with_refresh_hook(
        mut self,
        hook: impl Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync + 'static,
    ) -> Self {
        self.on_unauthorized = Some(Arc::new(hook));
        self
    }

    /// Send `endpoint` and decode the JSON response, honoring the envelope
    /// shape (`{data, message, success}`) when present and falling back to
    /// the bare payload otherwise.
    ///
    /// An unauthorized response triggers the refresh hook (when installed)
    /// and a single reissue of the same request. The retried request is
    /// never retried again, whatever it returns.
    pub async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
        if_none_match: Option<&str>,
    ) -> Result<EtagResponse<T>, ApiError> {
        match self.request_once(endpoint, if_none_match).await {
            Err(err) if err.is_unauthorized() => {
                let Some(hook) = self.on_unauthorized.clone() else {
                    return Err(err);
                };
                if !self.enter_refresh_cycle() {
                    return Err(err);
                }
                let _reset = RefreshCycleGuard(Arc::clone(&self.refreshing));
                log::debug!("unauthorized response, refreshing credentials and retrying once");
                hook().await;
                self.request_once(endpoint, if_none_match).await
            }
            other => other,
        }
    }

    async fn request_once<T: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
        if_none_match: Option<&str>,
    ) -> Result<EtagResponse<T>, ApiError> {
        let (data, response_etag, not_modified) =
            self.request_data(endpoint, if_none_match).await?;

        if not_modified {
            return Ok(EtagResponse::not_modified(response_etag.unwrap_or_default()));
        }

        let etag = response_etag.unwrap_or_default();

        // Envelope first, then the bare shape.
        if let Ok(envelope) = serde_json::from_slice::<ApiResponse<T>>(&data)
            && let Some(inner) = envelope.data
        {
            return Ok(EtagResponse::loaded(inner, etag));
        }
        match serde_json::from_slice::<T>(&data) {
            Ok(decoded) => Ok(EtagResponse::loaded(decoded, etag)),
            Err(e) => Err(ApiError::DecodingFailed(e)),
        }
    }

    /// Lower-level variant returning raw bytes, the response `ETag` and the
    /// not-modified flag. Applies the same status classification as
    /// [`request`](Self::request) but never retries.
    pub async fn request_data(
        &self,
        endpoint: &Endpoint,
        if_none_match: Option<&str>,
    ) -> Result<(Bytes, Option<String>, bool), ApiError> {
        let req = self.build_request(endpoint, if_none_match)?;
        let (parts, body) = self.send_raw(req).await?;

        let response_etag = header_string(&parts.headers, header::ETAG);

        if parts.status == StatusCode::NOT_MODIFIED {
            let etag = response_etag.or_else(|| if_none_match.map(str::to_owned));
            return Ok((Bytes::new(), etag, true));
        }

        classify_status(parts.status, &parts.headers, &body)?;
        Ok((body, response_etag, false))
    }

    /// Fire-and-forget variant: the status code is still classified (the
    /// body is consulted only for an error message) but nothing is returned.
    pub async fn request_without_response(&self, endpoint: &Endpoint) -> Result<(), ApiError> {
        let req = self.build_request(endpoint, None)?;
        let (parts, body) = self.send_raw(req).await?;
        classify_status(parts.status, &parts.headers, &body)
    }

    async fn send_raw(
        &self,
        req: Request<String>,
    ) -> Result<(http::response::Parts, Bytes), ApiError> {
        log::debug!("{} {}", req.method(), req.uri());
        let mut svc = self.http.clone();
        let exchange = async move {
            let response = svc
                .call(req)
                .await
                .map_err(|e| ApiError::Network(Box::new(e)))?;
            let (parts, body) = response.into_parts();
            let bytes = body
                .collect()
                .await
                .map_err(|e| ApiError::Network(Box::new(e)))?
                .to_bytes();
            Ok::<_, ApiError>((parts, bytes))
        };
        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(elapsed) => Err(ApiError::Network(Box::new(elapsed))),
        }
    }

    fn build_request(
        &self,
        endpoint: &Endpoint,
        if_none_match: Option<&str>,
    ) -> Result<Request<String>, ApiError> {
        let full = ApiConfig::join(self.base_url.as_str(), &endpoint.path);
        let mut url = Url::parse(&full).map_err(|_| ApiError::InvalidUrl)?;
        if !endpoint.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &endpoint.query {
                pairs.append_pair(key, value);
            }
        }
        let uri: Uri = url.as_str().parse().map_err(|_| ApiError::InvalidUrl)?;

        let mut builder = Request::builder().method(endpoint.method.clone()).uri(uri);
        if let Some(provider) = &self.token_provider
            && let Some(token) = provider()
        {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(etag) = if_none_match {
            builder = builder.header(header::IF_NONE_MATCH, etag);
        }
        for (key, value) in &endpoint.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        let body = match &endpoint.body {
            Some(value) => serde_json::to_string(value).map_err(ApiError::EncodingFailed)?,
            None => String::new(),
        };
        builder.body(body).map_err(|_| ApiError::InvalidUrl)
    }

    /// Claim the refresh flag. Returns false when a cycle is already in
    /// flight, in which case the caller must propagate instead of retrying.
    fn enter_refresh_cycle(&self) -> bool {
        let mut refreshing = self.refreshing.lock().unwrap_or_else(|e| e.into_inner());
        if *refreshing {
            false
        } else {
            *refreshing = true;
            true
        }
    }
}

/// Clears the refresh flag when the retry completes, errors or panics.
struct RefreshCycleGuard(Arc<Mutex<bool>>);

impl Drop for RefreshCycleGuard {
    fn drop(&mut self) {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = false;
    }
}

fn header_string(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

fn envelope_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ApiErrorResponse>(body)
        .ok()
        .map(|e| e.message)
}

fn legacy_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ErrorResponse>(body)
        .ok()
        .map(|e| e.message)
}

/// The fixed status-code table. 2xx passes; everything else maps to one
/// variant of the closed error set.
fn classify_status(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> Result<(), ApiError> {
    if status.is_success() {
        return Ok(());
    }
    match status.as_u16() {
        304 => Err(ApiError::NotModified),
        400 => {
            let message = envelope_message(body)
                .or_else(|| legacy_message(body))
                .unwrap_or_else(|| "Bad request".to_string());
            Err(ApiError::BadRequest(message))
        }
        401 => Err(ApiError::Unauthorized {
            message: envelope_message(body),
        }),
        403 => Err(ApiError::Forbidden {
            message: envelope_message(body),
        }),
        404 => Err(ApiError::NotFound {
            message: envelope_message(body),
        }),
        409 => Err(ApiError::Conflict {
            message: envelope_message(body),
        }),
        412 => Err(ApiError::PreconditionFailed {
            current_etag: header_string(headers, header::ETAG).unwrap_or_default(),
        }),
        422 => Err(ApiError::ValidationError(
            serde_json::from_slice::<ValidationErrorResponse>(body)
                .map(|r| r.errors)
                .unwrap_or_default(),
        )),
        500..=599 => Err(ApiError::ServerError {
            message: envelope_message(body),
        }),
        code => Err(ApiError::UnknownError(code)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn etag_headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ETAG, value.parse().unwrap());
        headers
    }

    #[test]
    fn success_codes_pass() {
        for code in [200u16, 201, 204, 299] {
            let status = StatusCode::from_u16(code).unwrap();
            assert!(classify_status(status, &HeaderMap::new(), &[]).is_ok());
        }
    }

    #[test]
    fn bad_request_message_prefers_envelope_then_legacy() {
        let envelope = br#"{"success":false,"data":null,"message":"bad start date"}"#;
        let err = classify_status(StatusCode::BAD_REQUEST, &HeaderMap::new(), envelope)
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(m) if m == "bad start date"));

        let legacy = br#"{"message":"legacy shape","details":null}"#;
        let err =
            classify_status(StatusCode::BAD_REQUEST, &HeaderMap::new(), legacy).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(m) if m == "legacy shape"));

        let err = classify_status(StatusCode::BAD_REQUEST, &HeaderMap::new(), b"<html>")
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(m) if m == "Bad request"));
    }

    #[test]
    fn unauthorized_message_is_optional() {
        let err =
            classify_status(StatusCode::UNAUTHORIZED, &HeaderMap::new(), &[]).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized { message: None }));

        let body = br#"{"success":false,"data":null,"message":"token expired"}"#;
        let err = classify_status(StatusCode::UNAUTHORIZED, &HeaderMap::new(), body).unwrap_err();
        assert!(
            matches!(err, ApiError::Unauthorized { message: Some(m) } if m == "token expired")
        );
    }

    #[test]
    fn precondition_failed_carries_header_etag_verbatim() {
        let headers = etag_headers("\"v7\"");
        let err = classify_status(StatusCode::PRECONDITION_FAILED, &headers, &[]).unwrap_err();
        assert!(
            matches!(err, ApiError::PreconditionFailed { current_etag } if current_etag == "\"v7\"")
        );

        // No ETag header: empty string, not a missing field.
        let err = classify_status(StatusCode::PRECONDITION_FAILED, &HeaderMap::new(), &[])
            .unwrap_err();
        assert!(
            matches!(err, ApiError::PreconditionFailed { current_etag } if current_etag.is_empty())
        );
    }

    #[test]
    fn validation_errors_fall_back_to_empty_map() {
        let body = br#"{"message":"Validation failed","errors":{"email":["is invalid","is taken"]}}"#;
        let err = classify_status(StatusCode::UNPROCESSABLE_ENTITY, &HeaderMap::new(), body)
            .unwrap_err();
        match err {
            ApiError::ValidationError(errors) => {
                assert_eq!(errors["email"], vec!["is invalid", "is taken"]);
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }

        let err = classify_status(StatusCode::UNPROCESSABLE_ENTITY, &HeaderMap::new(), b"oops")
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(errors) if errors.is_empty()));
    }

    #[test]
    fn unknown_codes_carry_the_exact_code() {
        let err = classify_status(StatusCode::IM_A_TEAPOT, &HeaderMap::new(), &[]).unwrap_err();
        assert!(matches!(err, ApiError::UnknownError(418)));
    }

    #[test]
    fn server_errors_cover_the_whole_5xx_range() {
        for code in [500u16, 502, 503, 599] {
            let status = StatusCode::from_u16(code).unwrap();
            let err = classify_status(status, &HeaderMap::new(), &[]).unwrap_err();
            assert!(matches!(err, ApiError::ServerError { .. }), "code {code}");
        }
    }

    #[test]
    fn build_request_sets_token_etag_and_query() {
        let client = ApiClient::new(&ApiConfig::new("https://10.0.0.5/api"))
            .unwrap()
            .with_token_provider(|| Some("secret".to_string()));

        let endpoint = Endpoint::get("/tasks").query("page", 3).header("X-Trace", "t1");
        let req = client.build_request(&endpoint, Some("\"v1\"")).unwrap();

        assert_eq!(req.uri().path(), "/api/tasks");
        assert_eq!(req.uri().query(), Some("page=3"));
        assert_eq!(
            req.headers().get(header::AUTHORIZATION).unwrap(),
            "Bearer secret"
        );
        assert_eq!(req.headers().get(header::IF_NONE_MATCH).unwrap(), "\"v1\"");
        assert_eq!(req.headers().get("X-Trace").unwrap(), "t1");
    }

    #[test]
    fn build_request_encodes_json_body() {
        let client = ApiClient::new(&ApiConfig::new("https://10.0.0.5")).unwrap();
        let endpoint = Endpoint::post("/tasks")
            .json(&serde_json::json!({ "title": "water plants" }))
            .unwrap();
        let req = client.build_request(&endpoint, None).unwrap();
        assert_eq!(req.body().as_str(), r#"{"title":"water plants"}"#);
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(
            ApiClient::new(&ApiConfig::new("")),
            Err(ApiError::InvalidUrl)
        ));
        assert!(matches!(
            ApiClient::new(&ApiConfig::new("not a url")),
            Err(ApiError::InvalidUrl)
        ));
    }

    #[test]
    fn refresh_cycle_flag_is_exclusive_and_reset_on_drop() {
        let client = ApiClient::new(&ApiConfig::new("https://10.0.0.5")).unwrap();
        assert!(client.enter_refresh_cycle());
        // Second claim while the first cycle is alive must fail.
        assert!(!client.enter_refresh_cycle());
        {
            let _reset = RefreshCycleGuard(Arc::clone(&client.refreshing));
        }
        assert!(client.enter_refresh_cycle());
    }
}
