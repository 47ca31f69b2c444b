mod flows;
mod properties;

use std::net::SocketAddr;
use std::sync::Arc;

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use http_body_util::BodyExt;
use hyper::http::request::Builder;
use hyper::Response;

use crate::auth::connector::{ClientCtx, ConnectorResult};
use crate::auth::AuthModule;
use crate::configuration::Configuration;
use crate::server::handlers::{EchoHandler, RequestHandler};
use crate::server::response::{PendingResponse, ResponseBody};

pub(crate) struct Fixture {
    module: Arc<AuthModule>,
}

impl Fixture {
    pub(crate) fn new(toml: &str) -> Self {
        let config = Configuration::load_from_str(toml).unwrap();
        Self {
            module: AuthModule::new(&config).unwrap(),
        }
    }

    /// A fresh client connection.
    pub(crate) fn client(&self) -> ClientCtx {
        let remote: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        self.module.attach(remote)
    }
}

/// Drive one request through the connector pipeline and the echo handler,
/// the way a connection task would.
pub(crate) async fn run(client: &mut ClientCtx, request: Builder) -> Response<ResponseBody> {
    let (mut parts, ()) = request.body(()).unwrap().into_parts();
    let mut pending = PendingResponse::new();

    match client.handle(&mut parts, &mut pending).await {
        ConnectorResult::Complete => pending.into_response(),
        ConnectorResult::Forward => {
            let mut response = EchoHandler.handle(&parts).await;
            pending.merge_into(&mut response);
            response
        }
    }
}

pub(crate) fn basic(credentials: &str) -> String {
    format!("Basic {}", BASE64_STANDARD.encode(credentials))
}

pub(crate) async fn body_json(response: Response<ResponseBody>) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}
