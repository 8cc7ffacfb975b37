//! HTTP query API server.
//!
//! Serves the read surface (scores, volumes, leaderboard, snapshots)
//! and the registration write endpoint over HTTP/1. Requests dispatch
//! on `(method, path)` to the handler functions; every response body is
//! JSON.

use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::handlers;
use crate::DaemonState;

/// An API error carrying the HTTP status to surface.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub detail: String,
}

impl ApiError {
    pub fn bad_request(code: &'static str, detail: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code,
            detail: detail.to_string(),
        }
    }

    pub fn unauthorized(code: &'static str, detail: &str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code,
            detail: detail.to_string(),
        }
    }

    pub fn conflict(code: &'static str, detail: &str) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            code,
            detail: detail.to_string(),
        }
    }

    pub fn not_found(detail: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "NOT_FOUND",
            detail: detail.to_string(),
        }
    }

    pub fn internal(detail: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL_ERROR",
            detail: detail.to_string(),
        }
    }

    fn into_response(self) -> Response<Full<Bytes>> {
        json_response(
            self.status,
            &serde_json::json!({
                "error": self.code,
                "detail": self.detail,
            }),
        )
    }
}

impl From<vig_db::DbError> for ApiError {
    fn from(e: vig_db::DbError) -> Self {
        ApiError::internal(&format!("storage error: {e}"))
    }
}

impl From<vig_registry::RegistryError> for ApiError {
    fn from(e: vig_registry::RegistryError) -> Self {
        use vig_registry::RegistryError::*;
        match &e {
            BadAddress(_) => ApiError::bad_request("BAD_ADDRESS", &e.to_string()),
            BadMessage => ApiError::bad_request("BAD_MESSAGE", &e.to_string()),
            StaleTimestamp { .. } => ApiError::bad_request("STALE_TIMESTAMP", &e.to_string()),
            FutureTimestamp { .. } => ApiError::bad_request("FUTURE_TIMESTAMP", &e.to_string()),
            BadKey(_) => ApiError::unauthorized("BAD_KEY", &e.to_string()),
            BadSignature => ApiError::unauthorized("BAD_SIGNATURE", &e.to_string()),
            SupersededTimestamp { .. } => {
                ApiError::conflict("SUPERSEDED_TIMESTAMP", &e.to_string())
            }
            Db(_) => ApiError::internal(&e.to_string()),
        }
    }
}

/// Handler return type.
pub type HandlerResult = std::result::Result<serde_json::Value, ApiError>;

/// The API server.
pub struct ApiServer {
    state: Arc<DaemonState>,
    listen_address: String,
    listen_port: u16,
}

impl ApiServer {
    /// Create a new API server.
    pub fn new(state: Arc<DaemonState>, listen_address: String, listen_port: u16) -> Self {
        Self {
            state,
            listen_address,
            listen_port,
        }
    }

    /// Run the server, accepting connections.
    pub async fn run(&self) -> anyhow::Result<()> {
        let addr = format!("{}:{}", self.listen_address, self.listen_port);
        let listener = TcpListener::bind(&addr).await?;
        info!("API server listening on http://{addr}");

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        let service = service_fn(move |req| {
                            let state = state.clone();
                            async move {
                                Ok::<_, hyper::Error>(handle_request(state, req).await)
                            }
                        });
                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await
                        {
                            warn!("connection error: {e}");
                        }
                    });
                }
                Err(e) => {
                    error!("accept error: {e}");
                }
            }
        }
    }
}

/// Dispatch a request to the matching handler.
async fn handle_request(
    state: Arc<DaemonState>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    debug!(%method, %path, "api request");

    let result = match (&method, segments.as_slice()) {
        (&Method::GET, ["health"]) => handlers::health(&state).await,
        (&Method::GET, ["scores"]) => handlers::scores(&state).await,
        (&Method::GET, ["scores", uid]) => match uid.parse() {
            Ok(uid) => handlers::score_detail(&state, uid).await,
            Err(_) => Err(ApiError::bad_request("BAD_UID", "uid must be an integer")),
        },
        (&Method::GET, ["volumes"]) => handlers::volumes(&state).await,
        (&Method::GET, ["leaderboard"]) => handlers::leaderboard(&state).await,
        (&Method::GET, ["snapshots"]) => handlers::snapshots_list(&state).await,
        (&Method::GET, ["snapshots", id]) => match id.parse() {
            Ok(id) => handlers::snapshot_get(&state, id).await,
            Err(_) => Err(ApiError::bad_request("BAD_ID", "snapshot id must be an integer")),
        },
        (&Method::GET, ["mappings"]) => handlers::mappings_list(&state).await,
        (&Method::POST, ["api", "wallet-mapping"]) => match req.into_body().collect().await {
            Ok(collected) => {
                handlers::register_mapping(&state, &collected.to_bytes()).await
            }
            Err(e) => Err(ApiError::bad_request("BAD_BODY", &e.to_string())),
        },
        _ => Err(ApiError::not_found("no such route")),
    };

    match result {
        Ok(value) => json_response(StatusCode::OK, &value),
        Err(err) => err.into_response(),
    }
}

/// Build a JSON response.
fn json_response(status: StatusCode, value: &serde_json::Value) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(value.to_string())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_errors_map_to_client_statuses() {
        let err: ApiError = vig_registry::RegistryError::BadSignature.into();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.code, "BAD_SIGNATURE");

        let err: ApiError = vig_registry::RegistryError::BadMessage.into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err: ApiError = vig_registry::RegistryError::SupersededTimestamp {
            submitted: 1,
            current: 2,
        }
        .into();
        assert_eq!(err.status, StatusCode::CONFLICT);

        let err: ApiError =
            vig_registry::RegistryError::Db(vig_db::DbError::NotFound("x".into())).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_json_response_sets_content_type() {
        let response = json_response(StatusCode::OK, &serde_json::json!({"ok": true}));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[hyper::header::CONTENT_TYPE],
            "application/json"
        );
    }
}
