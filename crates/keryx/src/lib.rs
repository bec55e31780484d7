//! # Keryx
//!
//! A minimal demonstration HTTP backend: a greeting endpoint, an echo-style
//! user validation endpoint, and a graceful shutdown trigger.
//!
//! The interesting part is the shutdown protocol. The server runs on a
//! dedicated thread; `main` blocks joining it. `POST /shutdown` — handled
//! *inside* the server's own dispatch — reaches the server through a
//! [`keryx_server::ServerRegistry`] published at startup and flips its stop
//! flag, which unwinds the accept loop, ends the server thread, and lets
//! the process exit.

pub mod api;
pub mod boot;
pub mod logging;
