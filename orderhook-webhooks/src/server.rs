//! HTTP endpoint for inbound order webhooks

use crate::config::{HEALTH_PATH, ServerConfig, WEBHOOK_PATH};
use crate::receiver::{ReceiveError, WebhookReceiver};
use crate::verifier::SignatureHeaders;
use crate::WebhookError;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::{Body, Incoming};
use hyper::header::{ALLOW, CONTENT_TYPE, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Routes requests to the receiver
pub struct WebhookServer {
    receiver: Arc<WebhookReceiver>,
    config: ServerConfig,
}

impl WebhookServer {
    pub fn new(receiver: Arc<WebhookReceiver>, config: ServerConfig) -> Self {
        Self { receiver, config }
    }

    /// Handle one request. Never fails; errors become JSON responses.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        let path = req.uri().path();
        let allowed = match path {
            WEBHOOK_PATH => Method::POST,
            HEALTH_PATH => Method::GET,
            _ => return json_response(StatusCode::NOT_FOUND, serde_json::json!({"error": "not_found"})),
        };
        if *req.method() != allowed {
            let mut response = json_response(
                StatusCode::METHOD_NOT_ALLOWED,
                serde_json::json!({"error": "method_not_allowed"}),
            );
            if let Ok(value) = HeaderValue::from_str(allowed.as_str()) {
                response.headers_mut().insert(ALLOW, value);
            }
            return response;
        }

        if allowed == Method::GET {
            return json_response(StatusCode::OK, serde_json::json!({"status": "ok"}));
        }

        let (parts, body) = req.into_parts();
        let headers = SignatureHeaders::from_header_map(&parts.headers);

        let body = match Limited::new(body, self.config.max_body_bytes).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                debug!(target: "orderhook::server", error = %e, "unreadable request body");
                return error_response(&ReceiveError::InvalidBody);
            }
        };

        match self.receiver.receive(&headers, &body).await {
            Ok(_) => json_response(StatusCode::OK, serde_json::json!({"status": "ok"})),
            Err(e) => error_response(&e),
        }
    }

    /// Accept connections until `shutdown` flips to `true`
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), WebhookError> {
        info!(
            target: "orderhook::server",
            addr = %listener.local_addr()?,
            "listening for webhooks"
        );

        loop {
            let (stream, peer) = tokio::select! {
                accepted = listener.accept() => accepted?,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            };

            let io = TokioIo::new(stream);
            let server = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let server = server.clone();
                    async move { Ok::<_, Infallible>(server.handle(req).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!(target: "orderhook::server", peer = %peer, error = %err, "connection error");
                }
            });
        }

        info!(target: "orderhook::server", "server stopped accepting connections");
        Ok(())
    }
}

fn error_response(err: &ReceiveError) -> Response<Full<Bytes>> {
    json_response(err.status(), err.body())
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
