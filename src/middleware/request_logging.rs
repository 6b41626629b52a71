use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderMap, CONTENT_LENGTH},
    Error,
};
use futures_util::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::time::Instant;

/// Logs every request at debug level, once on arrival (with the declared
/// payload size when there is one) and once with the response status and
/// elapsed time.
pub struct RequestLogging;

impl<S, B> Transform<S, ServiceRequest> for RequestLogging
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestLoggingMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggingMiddleware { service }))
    }
}

pub struct RequestLoggingMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequestLoggingMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let method = req.method().clone();
        let path = req.path().to_string();
        let started = Instant::now();

        tracing::debug!("Request: {} {}", method, path);
        if let Some(size) = payload_size(req.headers()) {
            tracing::debug!("Payload: {} bytes", size);
        }

        let fut = self.service.call(req);

        Box::pin(async move {
            let res = fut.await?;

            tracing::debug!(
                "Response: {} {} -> {} in {:?}",
                method,
                path,
                res.status().as_u16(),
                started.elapsed()
            );

            Ok(res)
        })
    }
}

/// Body size from `Content-Length`. Bodies are streamed to the handlers, so
/// the contents themselves are never logged here.
fn payload_size(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .filter(|size| *size > 0)
}
