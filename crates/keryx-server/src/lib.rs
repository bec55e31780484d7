//! # Keryx Server
//!
//! Embedded HTTP server for the Keryx demo backend.
//!
//! This crate provides the server infrastructure the `keryx` binary runs
//! on:
//!
//! - HTTP/1.1 serving via Hyper, one task per connection
//! - Exact-match routing and typed JSON handlers
//! - CORS preflight handling
//! - Cooperative, signal-based graceful shutdown
//! - One-shot cross-thread publication of the running server
//!   ([`ServerRegistry`]), so a request handler can ask the server it runs
//!   inside of to stop
//!
//! ## Lifecycle
//!
//! The intended startup sequence is: build, [`Server::bind`], publish a
//! [`ServerHandle`] through a [`ServerRegistry`], then
//! [`BoundServer::serve`]. Binding before publishing guarantees that any
//! thread observing [`ServerRegistry::is_ready`] can immediately use the
//! handle; the readiness latch is raised only after the handle is stored.
//!
//! ```rust,ignore
//! use keryx_server::{Server, ServerHandle, ServerRegistry, StopSignal};
//!
//! let registry = ServerRegistry::new();
//! let stop = StopSignal::new();
//!
//! let bound = Server::builder().http_addr("0.0.0.0:5000").build().bind().await?;
//! registry.publish(ServerHandle::new(stop.clone(), bound.local_addr()));
//! bound.serve(stop).await?;
//! ```

pub mod config;
pub mod cors;
pub mod error;
pub mod handler;
pub mod lifecycle;
pub mod router;
pub mod server;
pub mod shutdown;

pub use config::{ServerConfig, ServerConfigBuilder, DEFAULT_HTTP_ADDR};
pub use cors::{AllowedOrigins, CorsPolicy};
pub use error::ServerError;
pub use handler::{HandlerError, HandlerRegistry, InvokeError};
pub use lifecycle::{ServerHandle, ServerRegistry, StopRequest};
pub use router::{RouteLookup, RouteTable};
pub use server::{BoundServer, HttpResponse, ResponseBody, Server, ServerBuilder};
pub use shutdown::{ConnGuard, ConnTracker, StopSignal};
