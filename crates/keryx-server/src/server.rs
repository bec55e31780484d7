//! The HTTP server and its accept loop.
//!
//! Built on Hyper and Tokio. Construction is split in two so the caller can
//! publish a handle between acquiring the socket and serving traffic:
//!
//! 1. [`Server::bind`] parses the configured address and acquires the listen
//!    socket — the only fatal failure point ([`ServerError`]).
//! 2. [`BoundServer::serve`] runs the accept loop until the given
//!    [`StopSignal`] is requested, then drains in-flight connections for at
//!    most the configured shutdown timeout.
//!
//! Per-request failures (validation, unknown routes, timeouts) become JSON
//! error envelopes, never process-level errors.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::{Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::cors::CorsPolicy;
use crate::error::ServerError;
use crate::handler::{HandlerError, HandlerRegistry, InvokeError};
use crate::router::{RouteLookup, RouteTable};
use crate::shutdown::{ConnTracker, StopSignal};

/// Response body type used throughout the server.
pub type ResponseBody = Full<Bytes>;

/// The server's HTTP response type.
pub type HttpResponse = Response<ResponseBody>;

/// An HTTP server: configuration, routes, handlers, and an optional CORS
/// policy.
///
/// # Example
///
/// ```rust,ignore
/// use keryx_server::{CorsPolicy, Server, StopSignal};
///
/// let server = Server::builder()
///     .http_addr("0.0.0.0:5000")
///     .cors(CorsPolicy::permissive())
///     .build();
///
/// let bound = server.bind().await?;
/// bound.serve(StopSignal::new()).await?;
/// ```
pub struct Server {
    config: ServerConfig,
    routes: RouteTable,
    handlers: HandlerRegistry,
    cors: Option<CorsPolicy>,
}

impl Server {
    /// Creates a server builder.
    #[must_use]
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// The server's configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Acquires the listen socket.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidAddr`] if the configured address does
    /// not parse, or [`ServerError::Bind`] if the socket cannot be acquired
    /// (e.g. the port is already in use). In either case no traffic was
    /// served and nothing needs cleanup.
    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        let addr = self
            .config
            .socket_addr()
            .map_err(|source| ServerError::InvalidAddr {
                addr: self.config.http_addr().to_string(),
                source,
            })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        tracing::info!(%local_addr, "server listening");

        Ok(BoundServer {
            inner: Arc::new(self),
            listener,
            local_addr,
        })
    }

    /// Routes and executes one request, already reduced to method + path +
    /// body. Always produces a response.
    async fn dispatch(&self, method: &Method, path: &str, body: Bytes) -> HttpResponse {
        let operation_id = match self.routes.lookup(method, path) {
            RouteLookup::Operation(op) => op,
            RouteLookup::MethodNotAllowed => {
                return error_response(
                    StatusCode::METHOD_NOT_ALLOWED,
                    "METHOD_NOT_ALLOWED",
                    &format!("{method} not allowed for {path}"),
                );
            }
            RouteLookup::NotFound => {
                return error_response(
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    &format!("no route for {path}"),
                );
            }
        };

        match self.handlers.invoke(operation_id, body).await {
            Ok(response_body) => Response::builder()
                .status(StatusCode::OK)
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(Full::new(response_body))
                .unwrap_or_else(|_| Response::new(Full::new(Bytes::new()))),
            Err(InvokeError::NotFound(op)) => {
                tracing::error!(operation = %op, "route registered without a handler");
                error_response(
                    StatusCode::NOT_IMPLEMENTED,
                    "HANDLER_NOT_IMPLEMENTED",
                    &format!("no handler registered for operation '{op}'"),
                )
            }
            Err(InvokeError::Handler(e)) => {
                tracing::debug!(operation = %operation_id, error = %e, "handler failed");
                handler_error_response(&e)
            }
        }
    }

    /// Serves one connection until it closes or a stop is requested.
    async fn handle_connection(
        self: &Arc<Self>,
        stream: tokio::net::TcpStream,
        remote_addr: SocketAddr,
        stop: StopSignal,
    ) -> Result<(), hyper::Error> {
        let io = TokioIo::new(stream);
        let server = Arc::clone(self);

        let service = service_fn(move |req: Request<Incoming>| {
            let server = Arc::clone(&server);
            async move { server.handle_request(req).await }
        });

        let conn = http1::Builder::new().serve_connection(io, service);

        tokio::select! {
            result = conn => result,
            () = stop.requested() => {
                tracing::debug!(%remote_addr, "connection closed by shutdown");
                Ok(())
            }
        }
    }

    /// Handles one request end to end: CORS, body collection, dispatch.
    async fn handle_request(
        self: &Arc<Self>,
        req: Request<Incoming>,
    ) -> Result<HttpResponse, Infallible> {
        if let Some(cors) = &self.cors {
            if cors.is_preflight(&req) {
                return Ok(cors.preflight_response(&req));
            }
        }

        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let origin = req
            .headers()
            .get(http::header::ORIGIN)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        tracing::debug!(%method, %path, "request");

        let timeout = self.config.request_timeout();
        let body = match tokio::time::timeout(timeout, collect_body(req)).await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "failed to read request body");
                return Ok(error_response(
                    StatusCode::BAD_REQUEST,
                    "BODY_READ_ERROR",
                    &format!("failed to read request body: {e}"),
                ));
            }
            Err(_) => {
                return Ok(error_response(
                    StatusCode::REQUEST_TIMEOUT,
                    "REQUEST_TIMEOUT",
                    "request body collection timed out",
                ));
            }
        };

        let mut response =
            match tokio::time::timeout(timeout, self.dispatch(&method, &path, body)).await {
                Ok(response) => response,
                Err(_) => {
                    tracing::warn!(%method, %path, "handler timed out");
                    error_response(
                        StatusCode::GATEWAY_TIMEOUT,
                        "HANDLER_TIMEOUT",
                        "handler execution timed out",
                    )
                }
            };

        if let Some(cors) = &self.cors {
            cors.decorate(&mut response, origin.as_deref());
        }

        Ok(response)
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("routes", &self.routes.len())
            .field("handlers", &self.handlers.len())
            .field("cors", &self.cors.is_some())
            .finish()
    }
}

/// A server that holds its listen socket and is ready to serve.
#[derive(Debug)]
pub struct BoundServer {
    inner: Arc<Server>,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl BoundServer {
    /// The address the listen socket is actually bound to (relevant when
    /// binding port 0).
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Runs the accept loop until `stop` is requested.
    ///
    /// Each accepted connection is served on its own task. When the stop
    /// request is observed the loop exits, in-flight connections are given
    /// up to the configured shutdown timeout to finish, and the method
    /// returns. Accept failures are logged and do not end the loop.
    pub async fn serve(self, stop: StopSignal) -> Result<(), ServerError> {
        let server = self.inner;
        let tracker = ConnTracker::new();

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, remote_addr)) => {
                            let server = Arc::clone(&server);
                            let guard = tracker.track();
                            let stop = stop.clone();

                            tokio::spawn(async move {
                                if let Err(e) = server.handle_connection(stream, remote_addr, stop).await {
                                    tracing::error!(%remote_addr, error = %e, "connection error");
                                }
                                drop(guard);
                            });
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "failed to accept connection");
                        }
                    }
                }

                () = stop.requested() => {
                    tracing::info!("stop requested, leaving accept loop");
                    break;
                }
            }
        }

        let drain = server.config.shutdown_timeout();
        if tracker.active() > 0 {
            tracing::info!(
                active = tracker.active(),
                "waiting up to {drain:?} for connections to close"
            );
        }
        tokio::select! {
            () = tracker.drained() => {}
            () = tokio::time::sleep(drain) => {
                tracing::warn!(active = tracker.active(), "drain timeout reached");
            }
        }

        tracing::info!("server stopped");
        Ok(())
    }
}

/// Builder for [`Server`].
#[derive(Debug, Default)]
pub struct ServerBuilder {
    config: Option<ServerConfig>,
    routes: RouteTable,
    handlers: Option<HandlerRegistry>,
    cors: Option<CorsPolicy>,
}

impl ServerBuilder {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a prebuilt configuration.
    #[must_use]
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the bind address, keeping other configuration at defaults.
    #[must_use]
    pub fn http_addr(mut self, addr: impl Into<String>) -> Self {
        let base = self.config.take().unwrap_or_default();
        self.config = Some(
            ServerConfig::builder()
                .http_addr(addr)
                .shutdown_timeout(base.shutdown_timeout())
                .request_timeout(base.request_timeout())
                .build(),
        );
        self
    }

    /// Registers a route.
    #[must_use]
    pub fn route(
        mut self,
        method: Method,
        path: impl Into<String>,
        operation_id: impl Into<String>,
    ) -> Self {
        self.routes.add(method, path, operation_id);
        self
    }

    /// Sets the handler registry.
    #[must_use]
    pub fn handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = Some(handlers);
        self
    }

    /// Sets the CORS policy.
    #[must_use]
    pub fn cors(mut self, cors: CorsPolicy) -> Self {
        self.cors = Some(cors);
        self
    }

    /// Builds the server.
    #[must_use]
    pub fn build(self) -> Server {
        Server {
            config: self.config.unwrap_or_default(),
            routes: self.routes,
            handlers: self.handlers.unwrap_or_default(),
            cors: self.cors,
        }
    }
}

async fn collect_body(req: Request<Incoming>) -> Result<Bytes, hyper::Error> {
    let collected = req.into_body().collect().await?;
    Ok(collected.to_bytes())
}

/// A JSON error envelope: `{"error": {"code", "message"}}`.
fn error_response(status: StatusCode, code: &str, message: &str) -> HttpResponse {
    let body = serde_json::json!({
        "error": {
            "code": code,
            "message": message,
        }
    });

    Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}

fn handler_error_response(error: &HandlerError) -> HttpResponse {
    match error {
        HandlerError::Validation(msg) => error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "VALIDATION_ERROR",
            &format!("invalid request body: {msg}"),
        ),
        HandlerError::Serialization(msg) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "SERIALIZATION_ERROR",
            &format!("failed to serialize response: {msg}"),
        ),
        HandlerError::Custom(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            &format!("internal error: {e}"),
        ),
    }
}
