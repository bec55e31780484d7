//! Server startup.
//!
//! [`run_blocking`] is the body of the dedicated server thread spawned by
//! `main`. The ordering inside [`run`] is deliberate and load-bearing:
//!
//! 1. bind the listen socket (the only fatal failure point — if it fails,
//!    readiness is never raised),
//! 2. publish a [`ServerHandle`] through the registry (which raises the
//!    readiness latch after the handle is stored),
//! 3. enter the accept loop, which runs until the handle's stop flag is
//!    flipped.
//!
//! Anything that observes the registry as ready is therefore guaranteed a
//! usable handle.

use anyhow::Context;

use keryx_server::{ServerConfig, ServerHandle, ServerRegistry, StopSignal};

use crate::api;

/// Runs the server to completion on the calling thread.
pub fn run_blocking(config: ServerConfig, registry: ServerRegistry) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("keryx-worker")
        .build()
        .context("failed to build async runtime")?;

    runtime.block_on(run(config, registry))
}

/// Binds, publishes, and serves until a stop is requested.
pub async fn run(config: ServerConfig, registry: ServerRegistry) -> anyhow::Result<()> {
    let stop = StopSignal::new();

    let server = api::build_server(config, registry.clone());
    let bound = server.bind().await.context("server startup failed")?;

    registry.publish(ServerHandle::new(stop.clone(), bound.local_addr()));

    bound.serve(stop).await.context("server failed")?;
    Ok(())
}
