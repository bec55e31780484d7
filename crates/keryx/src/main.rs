//! Keryx demo backend entry point.
//!
//! Spawns the server on a dedicated thread, then blocks joining it. The
//! process ends when the server thread does — either because
//! `POST /shutdown` flipped the stop flag, or because startup failed
//! (typically the port was already taken), in which case the error
//! propagates out of `main`.

use anyhow::Context;

use keryx::{boot, logging};
use keryx_server::{ServerConfig, ServerRegistry};

fn main() -> anyhow::Result<()> {
    logging::init(&logging::LogConfig::from_env()).context("failed to initialise logging")?;

    let config = ServerConfig::from_env();
    let registry = ServerRegistry::new();

    let server_thread = {
        let registry = registry.clone();
        std::thread::Builder::new()
            .name("keryx-server".to_string())
            .spawn(move || boot::run_blocking(config, registry))
            .context("failed to spawn server thread")?
    };

    // Block until the server thread ends (e.g. after POST /shutdown).
    match server_thread.join() {
        Ok(result) => result?,
        Err(panic) => std::panic::resume_unwind(panic),
    }

    tracing::info!("server fully stopped");
    Ok(())
}
