//! Tower middleware injecting the default JSON headers.
use http::Request;
use http::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

/// Adds `Accept: application/json`, `Content-Type: application/json` and a
/// `User-Agent` to every outgoing request. Per-endpoint header overrides are
/// applied later by the request builder and win over these.
#[derive(Clone, Debug)]
pub struct DefaultHeadersLayer {
    pub user_agent: String,
}

impl DefaultHeadersLayer {
    pub fn new(user_agent: String) -> Self {
        Self { user_agent }
    }
}

impl<S> Layer<S> for DefaultHeadersLayer {
    type Service = DefaultHeadersService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DefaultHeadersService {
            inner,
            user_agent: self.user_agent.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DefaultHeadersService<S> {
    inner: S,
    user_agent: String,
}

impl<S, ReqBody> Service<Request<ReqBody>> for DefaultHeadersService<S>
where
    S: Service<Request<ReqBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let headers = req.headers_mut();
        if !headers.contains_key(ACCEPT) {
            headers.insert(ACCEPT, http::HeaderValue::from_static("application/json"));
        }
        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(
                CONTENT_TYPE,
                http::HeaderValue::from_static("application/json"),
            );
        }
        if let Ok(val) = http::HeaderValue::from_str(&self.user_agent) {
            headers.insert(USER_AGENT, val);
        }
        self.inner.call(req)
    }
}
