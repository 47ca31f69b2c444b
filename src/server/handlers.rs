use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::CONTENT_TYPE;
use hyper::http::request::Parts;
use hyper::{Response, StatusCode};
use serde_json::json;

use crate::auth::session::AuthSession;
use crate::server::response::ResponseBody;

/// Downstream content handler. The middleware admits or denies requests; what
/// an admitted request actually serves is the embedding application's
/// business, plugged in through this trait.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, parts: &Parts) -> Response<ResponseBody>;
}

/// Built-in handler answering every admitted request with the request path
/// and the attached identity. Stands in for a real application and makes the
/// admission decision observable from the outside.
pub struct EchoHandler;

#[async_trait]
impl RequestHandler for EchoHandler {
    async fn handle(&self, parts: &Parts) -> Response<ResponseBody> {
        let identity = parts.extensions.get::<Arc<AuthSession>>();
        let body = json!({
            "path": parts.uri.path(),
            "identity": identity.map(Arc::as_ref),
        });

        Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }
}
