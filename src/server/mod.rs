pub mod error;
pub mod handlers;
pub mod listener;
pub mod request_ext;
pub mod response;

use std::convert::Infallible;
use std::fmt::Debug;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::pin;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument};

pub use error::Error;

use crate::auth::connector::{ClientCtx, ConnectorResult};
use crate::auth::AuthModule;
use crate::configuration::Configuration;
use crate::metrics_provider::METRICS_PROVIDER;
use crate::server::handlers::RequestHandler;
use crate::server::response::{PendingResponse, ResponseBody};

/// Server-wide state shared by every connection: the authentication module
/// (absent on servers that run open) and the downstream handler.
pub struct ServerContext {
    pub module: Option<Arc<AuthModule>>,
    pub handler: Arc<dyn RequestHandler>,
    pub timeouts: [Duration; 2],
}

impl ServerContext {
    pub fn new(config: &Configuration, handler: Arc<dyn RequestHandler>) -> Result<Self, Error> {
        let module = match &config.auth.backend {
            Some(_) => Some(AuthModule::new(config)?),
            None => None,
        };

        Ok(Self {
            module,
            handler,
            timeouts: [
                Duration::from_secs(config.server.query_timeout),
                Duration::from_secs(config.server.query_timeout_grace_period),
            ],
        })
    }
}

/// Serve one client connection. The connection owns a `ClientCtx`; HTTP/1
/// requests arrive one at a time, so the connector state never sees
/// concurrent requests from the same client.
pub async fn serve_connection<S>(
    stream: TokioIo<S>,
    context: Arc<ServerContext>,
    remote_address: SocketAddr,
) where
    S: Unpin + AsyncWrite + AsyncRead + Send + Debug + 'static,
{
    let client = Arc::new(Mutex::new(
        context.module.as_ref().map(|module| module.attach(remote_address)),
    ));

    let service_context = Arc::clone(&context);
    let conn = http1::Builder::new().serve_connection(
        stream,
        service_fn(move |request| {
            handle_request(
                Arc::clone(&service_context),
                Arc::clone(&client),
                request,
            )
        }),
    );
    pin!(conn);

    for (iter, sleep_duration) in context.timeouts.iter().enumerate() {
        debug!("iter = {iter} sleep_duration = {sleep_duration:?}");
        tokio::select! {
            res = conn.as_mut() => {
                match res {
                    Ok(()) => debug!("after polling conn, no error"),
                    Err(error) => debug!("error serving connection: {error}"),
                }
                break;
            }
            () = tokio::time::sleep(*sleep_duration) => {
                debug!("iter = {iter} got timeout_interval, calling conn.graceful_shutdown");
                conn.as_mut().graceful_shutdown();
            }
        }
    }
}

#[instrument(skip(context, client, request))]
async fn handle_request(
    context: Arc<ServerContext>,
    client: Arc<Mutex<Option<ClientCtx>>>,
    request: Request<Incoming>,
) -> Result<Response<ResponseBody>, Infallible> {
    let start_time = Instant::now();
    let (mut parts, _body) = request.into_parts();
    let method = parts.method.clone();
    let path = parts.uri.path().to_owned();

    let mut pending = PendingResponse::new();
    let result = {
        let mut client = client.lock().await;
        match client.as_mut() {
            Some(connector) => connector.handle(&mut parts, &mut pending).await,
            None => ConnectorResult::Forward,
        }
    };

    let response = match result {
        ConnectorResult::Complete => pending.into_response(),
        ConnectorResult::Forward => {
            let mut response = context.handler.handle(&parts).await;
            pending.merge_into(&mut response);
            response
        }
    };

    METRICS_PROVIDER.http_requests_total.inc();

    let elapsed = start_time.elapsed();
    let status = response.status();
    if status.is_server_error() {
        error!("{status} {elapsed:?} {method} {path}");
    } else {
        info!("{status} {elapsed:?} {method} {path}");
    }

    Ok(response)
}
