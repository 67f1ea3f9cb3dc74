use std::sync::Arc;

use async_trait::async_trait;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderValue, Method, Response, StatusCode};
use key_pool::{KeyPool, PoolError};
use pingora::apps::http_app::ServeHttp;
use pingora::protocols::http::ServerSession;
use serde_json::{Value, json};

use crate::configuration::PoolSettings;
use crate::metric::Metrics;

/// Operation label used for requests that match no route.
pub const UNKNOWN_OPERATION: &str = "<unknown>";

/// Longest key a generate request may ask for.
pub const MAX_KEY_LENGTH: usize = 256;

/// Outcome of one API call, before it is turned into an HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub operation: &'static str,
    pub status: StatusCode,
    pub body: Value,
}

impl Reply {
    fn new(operation: &'static str, status: StatusCode, body: Value) -> Self {
        Self {
            operation,
            status,
            body,
        }
    }

    fn error(operation: &'static str, status: StatusCode, message: impl Into<String>) -> Self {
        Self::new(operation, status, json!({ "error": message.into() }))
    }

    /// A key operation that either succeeded or hit an unknown key.
    fn for_key(operation: &'static str, key: &str, found: bool) -> Self {
        if found {
            Self::new(operation, StatusCode::OK, json!({ "key": key }))
        } else {
            Self::error(operation, StatusCode::NOT_FOUND, "unknown key")
        }
    }

    pub fn into_http(self) -> Response<Vec<u8>> {
        let body = serde_json::to_vec(&self.body).unwrap_or_default();
        let len = body.len();
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
        response
    }
}

/// HTTP front end for a [`KeyPool`].
///
/// | Method | Path | Operation |
/// |---|---|---|
/// | POST | `/keys?count=N&length=L` | generate |
/// | GET | `/keys` | fetch |
/// | PUT | `/keys/{id}/unblock` | unblock |
/// | PUT | `/keys/{id}/keepalive` | keep-alive |
/// | DELETE | `/keys/{id}` | delete |
/// | GET | `/stats` | pool counts |
/// | GET | `/metrics` | response counts per operation |
pub struct KeyApi {
    pool: Arc<KeyPool>,
    defaults: PoolSettings,
    metrics: Arc<Metrics>,
}

impl KeyApi {
    pub fn new(pool: Arc<KeyPool>, defaults: PoolSettings, metrics: Arc<Metrics>) -> Self {
        Self {
            pool,
            defaults,
            metrics,
        }
    }

    /// Route a request to the pool.
    pub async fn handle(&self, method: &Method, path: &str, query: Option<&str>) -> Reply {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match (segments.as_slice(), method) {
            (["keys"], &Method::POST) => self.generate(query).await,
            (["keys"], &Method::GET) => match self.pool.fetch() {
                Some(key) => Reply::new("fetch", StatusCode::OK, json!({ "key": key })),
                None => Reply::error("fetch", StatusCode::NOT_FOUND, "no key available"),
            },
            (["keys", key], &Method::DELETE) => {
                Reply::for_key("delete", key, self.pool.delete_key(key))
            }
            (["keys", key, "unblock"], &Method::PUT) => {
                Reply::for_key("unblock", key, self.pool.unblock_key(key))
            }
            (["keys", key, "keepalive"], &Method::PUT) => {
                Reply::for_key("keepalive", key, self.pool.keep_alive_key(key))
            }
            (["stats"], &Method::GET) => {
                let stats = self.pool.stats();
                Reply::new(
                    "stats",
                    StatusCode::OK,
                    json!({
                        "free": stats.free,
                        "blocked": stats.blocked,
                        "deleted": stats.deleted,
                    }),
                )
            }
            (["metrics"], &Method::GET) => {
                Reply::new("metrics", StatusCode::OK, json!(self.metrics.summary()))
            }
            (
                ["keys"] | ["keys", _] | ["keys", _, "unblock" | "keepalive"] | ["stats"]
                | ["metrics"],
                _,
            ) => {
                Reply::error(
                    UNKNOWN_OPERATION,
                    StatusCode::METHOD_NOT_ALLOWED,
                    "method not allowed",
                )
            }
            _ => Reply::error(UNKNOWN_OPERATION, StatusCode::NOT_FOUND, "not found"),
        }
    }

    async fn generate(&self, query: Option<&str>) -> Reply {
        let (count, length) = match parse_generate_query(query) {
            Ok(params) => params,
            Err(message) => return Reply::error("generate", StatusCode::BAD_REQUEST, message),
        };
        let count = count.unwrap_or(self.defaults.size);
        let length = length.unwrap_or(self.defaults.key_length);

        if count > self.defaults.max_generate {
            return Reply::error(
                "generate",
                StatusCode::BAD_REQUEST,
                format!("count must be at most {}", self.defaults.max_generate),
            );
        }
        if length > MAX_KEY_LENGTH {
            return Reply::error(
                "generate",
                StatusCode::BAD_REQUEST,
                format!("length must be at most {MAX_KEY_LENGTH}"),
            );
        }

        let pool = Arc::clone(&self.pool);
        let result = match tokio::task::spawn_blocking(move || pool.generate(count, length)).await
        {
            Ok(result) => result,
            Err(e) => {
                log::error!("key generation task failed: {e}");
                return Reply::error(
                    "generate",
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "key generation failed",
                );
            }
        };

        match result {
            Ok(keys) => Reply::new("generate", StatusCode::CREATED, json!({ "keys": keys })),
            Err(e @ PoolError::InvalidKeyLength(_)) => {
                Reply::error("generate", StatusCode::BAD_REQUEST, e.to_string())
            }
            Err(e) => {
                log::warn!("key generation failed: {e}");
                Reply::error("generate", StatusCode::CONFLICT, e.to_string())
            }
        }
    }
}

/// Extract the optional `count` and `length` parameters.
fn parse_generate_query(query: Option<&str>) -> Result<(Option<usize>, Option<usize>), String> {
    let mut count = None;
    let mut length = None;

    for pair in query.unwrap_or("").split('&').filter(|p| !p.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        let slot = match name {
            "count" => &mut count,
            "length" => &mut length,
            _ => continue,
        };
        let parsed = value
            .parse::<usize>()
            .map_err(|_| format!("invalid {name}: '{value}'"))?;
        *slot = Some(parsed);
    }

    Ok((count, length))
}

#[async_trait]
impl ServeHttp for KeyApi {
    async fn response(&self, http_session: &mut ServerSession) -> Response<Vec<u8>> {
        let req = http_session.req_header();
        let reply = self
            .handle(&req.method, req.uri.path(), req.uri.query())
            .await;
        self.metrics.record(reply.operation, reply.status.as_u16());
        reply.into_http()
    }
}
