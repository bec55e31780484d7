//! Typed handler registration and dispatch.
//!
//! Handlers are plain async functions over serde types. The registry erases
//! their types behind a JSON boundary: request bodies are deserialized
//! before the handler runs, responses serialized after it returns, and both
//! failure directions map to distinct [`HandlerError`] variants so the
//! server can pick the right status code.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Errors produced while running a handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The request body failed schema validation (missing or mistyped
    /// fields, malformed JSON). Maps to a 422 response.
    #[error("invalid request body: {0}")]
    Validation(String),

    /// The handler's response could not be serialized. Maps to a 500.
    #[error("failed to serialize response: {0}")]
    Serialization(String),

    /// Any other handler failure. Maps to a 500.
    #[error("handler error: {0}")]
    Custom(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors from handler dispatch.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// No handler registered under the operation id.
    #[error("no handler registered for operation '{0}'")]
    NotFound(String),

    /// The handler ran and failed.
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

type BoxedHandlerResult = Pin<Box<dyn Future<Output = Result<Bytes, HandlerError>> + Send>>;
type ErasedHandler = Arc<dyn Fn(Bytes) -> BoxedHandlerResult + Send + Sync>;

/// Registry mapping operation ids to type-erased async handlers.
///
/// # Example
///
/// ```rust,ignore
/// use keryx_server::{HandlerError, HandlerRegistry};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Deserialize)]
/// struct Greet { name: String }
///
/// #[derive(Serialize)]
/// struct Greeting { msg: String }
///
/// async fn greet(req: Greet) -> Result<Greeting, HandlerError> {
///     Ok(Greeting { msg: format!("hi {}", req.name) })
/// }
///
/// let mut registry = HandlerRegistry::new();
/// registry.register("greet", greet);
/// ```
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, ErasedHandler>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler that takes a JSON request body.
    pub fn register<Req, Res, F, Fut>(&mut self, operation_id: impl Into<String>, handler: F)
    where
        Req: DeserializeOwned + Send + 'static,
        Res: Serialize + Send + 'static,
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, HandlerError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let erased: ErasedHandler = Arc::new(move |body: Bytes| {
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                let request: Req = serde_json::from_slice(&body)
                    .map_err(|e| HandlerError::Validation(e.to_string()))?;

                let response = handler(request).await?;

                let bytes = serde_json::to_vec(&response)
                    .map_err(|e| HandlerError::Serialization(e.to_string()))?;
                Ok(Bytes::from(bytes))
            })
        });

        self.handlers.insert(operation_id.into(), erased);
    }

    /// Registers a handler that ignores the request body.
    ///
    /// Used for GETs and for triggers like the shutdown endpoint, which
    /// accepts any (or no) body.
    pub fn register_no_body<Res, F, Fut>(&mut self, operation_id: impl Into<String>, handler: F)
    where
        Res: Serialize + Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, HandlerError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let erased: ErasedHandler = Arc::new(move |_body: Bytes| {
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                let response = handler().await?;

                let bytes = serde_json::to_vec(&response)
                    .map_err(|e| HandlerError::Serialization(e.to_string()))?;
                Ok(Bytes::from(bytes))
            })
        });

        self.handlers.insert(operation_id.into(), erased);
    }

    /// Whether a handler is registered for the operation.
    #[must_use]
    pub fn contains(&self, operation_id: &str) -> bool {
        self.handlers.contains_key(operation_id)
    }

    /// Runs the handler registered for `operation_id` against `body`.
    pub async fn invoke(&self, operation_id: &str, body: Bytes) -> Result<Bytes, InvokeError> {
        let handler = self
            .handlers
            .get(operation_id)
            .ok_or_else(|| InvokeError::NotFound(operation_id.to_string()))?;

        Ok(handler(body).await?)
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("operations", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
