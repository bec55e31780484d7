//! The demo API: models, handlers, and server assembly.
//!
//! Three endpoints, wire-compatible with the frontend that consumes them:
//!
//! - `GET /api/hello` — static greeting
//! - `POST /api/user` — validates and echoes a [`User`]
//! - `POST /shutdown` — requests a graceful stop via the [`ServerRegistry`]

use http::Method;
use serde::{Deserialize, Serialize};

use keryx_server::{
    CorsPolicy, HandlerError, HandlerRegistry, Server, ServerConfig, ServerRegistry, StopRequest,
};

/// Greeting returned by `GET /api/hello`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Greeting {
    /// The greeting text.
    pub msg: String,
}

/// The user model validated and echoed by `POST /api/user`.
///
/// `name` and `salary` are required; `job` and `tax` are optional and
/// serialize as `null` when absent. No storage — validation only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    /// Required display name.
    pub name: String,
    /// Optional job title.
    pub job: Option<String>,
    /// Required salary figure.
    pub salary: f64,
    /// Optional tax figure.
    pub tax: Option<f64>,
}

/// Status payload returned by `POST /shutdown`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShutdownStatus {
    /// Either `"stopping"` or `"server not ready"`.
    pub status: String,
}

async fn hello() -> Result<Greeting, HandlerError> {
    Ok(Greeting {
        msg: "Hello from Python backend!".to_string(),
    })
}

async fn create_user(user: User) -> Result<User, HandlerError> {
    Ok(user)
}

/// Assembles the demo server: routes, handlers, and a permissive CORS
/// policy (local demo only).
///
/// The shutdown handler holds a clone of `registry`; whether it answers
/// "stopping" or "server not ready" depends entirely on whether the startup
/// routine has published through that registry yet.
#[must_use]
pub fn build_server(config: ServerConfig, registry: ServerRegistry) -> Server {
    let mut handlers = HandlerRegistry::new();
    handlers.register_no_body("hello", hello);
    handlers.register("createUser", create_user);
    handlers.register_no_body("requestShutdown", move || {
        let registry = registry.clone();
        async move {
            tracing::info!("graceful shutdown initiated");
            let status = match registry.request_stop() {
                StopRequest::NotReady => "server not ready",
                StopRequest::Stopping => "stopping",
            };
            Ok(ShutdownStatus {
                status: status.to_string(),
            })
        }
    });

    Server::builder()
        .config(config)
        .route(Method::GET, "/api/hello", "hello")
        .route(Method::POST, "/api/user", "createUser")
        .route(Method::POST, "/shutdown", "requestShutdown")
        .handlers(handlers)
        .cors(CorsPolicy::permissive())
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_deserializes_with_optional_fields_missing() {
        let user: User = serde_json::from_str(r#"{"name":"Ana","salary":1000.0}"#).unwrap();

        assert_eq!(user.name, "Ana");
        assert_eq!(user.job, None);
        assert!((user.salary - 1000.0).abs() < f64::EPSILON);
        assert_eq!(user.tax, None);
    }

    #[test]
    fn user_serializes_missing_fields_as_null() {
        let user = User {
            name: "Ana".to_string(),
            job: None,
            salary: 1000.0,
            tax: None,
        };

        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"name":"Ana","job":null,"salary":1000.0,"tax":null})
        );
    }

    #[test]
    fn user_requires_name_and_salary() {
        assert!(serde_json::from_str::<User>(r#"{"job":"eng"}"#).is_err());
        assert!(serde_json::from_str::<User>(r#"{"name":"Ana"}"#).is_err());
        assert!(serde_json::from_str::<User>(r#"{"salary":1.0}"#).is_err());
    }

    #[test]
    fn user_rejects_mistyped_fields() {
        assert!(serde_json::from_str::<User>(r#"{"name":7,"salary":1000.0}"#).is_err());
        assert!(serde_json::from_str::<User>(r#"{"name":"Ana","salary":"lots"}"#).is_err());
    }

    #[tokio::test]
    async fn hello_returns_static_greeting() {
        let greeting = hello().await.unwrap();
        assert_eq!(greeting.msg, "Hello from Python backend!");
    }

    #[tokio::test]
    async fn create_user_echoes_input() {
        let user = User {
            name: "Ana".to_string(),
            job: Some("eng".to_string()),
            salary: 1000.0,
            tax: Some(0.2),
        };

        let echoed = create_user(user.clone()).await.unwrap();
        assert_eq!(echoed, user);
    }

    #[test]
    fn build_server_wires_all_routes() {
        let server = build_server(ServerConfig::default(), ServerRegistry::new());
        assert_eq!(server.config().http_addr(), keryx_server::DEFAULT_HTTP_ADDR);
    }
}
