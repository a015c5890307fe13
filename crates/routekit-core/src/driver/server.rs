//! TCP listener loop for [`HyperDriver`].

use super::HyperDriver;
use crate::adapter::Adapter;
use crate::context::Response;
use crate::error::HttpError;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

impl HyperDriver {
    /// Accept connections on `addr` until the listener fails.
    pub async fn serve(self: Arc<Self>, addr: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr: SocketAddr = addr.parse()?;
        let listener = TcpListener::bind(addr).await?;

        info!(routes = self.route_count(), "Server running on http://{}", addr);

        loop {
            let (stream, _remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let driver = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: hyper::Request<Incoming>| {
                    let driver = driver.clone();
                    async move { Ok::<_, Infallible>(handle_request(&driver, req).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Connection error: {}", err);
                }
            });
        }
    }
}

/// Collect the body and run one request through the driver.
async fn handle_request(driver: &HyperDriver, req: hyper::Request<Incoming>) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = std::time::Instant::now();

    let (parts, body) = req.into_parts();
    let limit = driver.read_limit();
    let body = match Limited::new(body, limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            let error = if err.downcast_ref::<LengthLimitError>().is_some() {
                HttpError::payload_too_large(format!("Request body exceeds {} bytes", limit))
            } else {
                HttpError::bad_request(format!("Failed to read request body: {}", err))
            };
            let response = error_response(error, driver.settings().development);
            log_request(&method, &path, response.status(), start);
            return response;
        }
    };

    let response = driver.handle(http::Request::from_parts(parts, body)).await;
    log_request(&method, &path, response.status(), start);
    response
}

pub(super) fn error_response(error: HttpError, development: bool) -> Response {
    let status = error.status;
    let mut response = http::Response::new(Full::new(Bytes::from(error.to_json(development).to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Log request completion
fn log_request(method: &http::Method, path: &str, status: StatusCode, start: std::time::Instant) {
    let elapsed = start.elapsed();

    if status.is_success() || status.is_redirection() {
        info!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %elapsed.as_millis(),
            "Request completed"
        );
    } else {
        error!(
            method = %method,
            path = %path,
            status = %status.as_u16(),
            duration_ms = %elapsed.as_millis(),
            "Request failed"
        );
    }
}
