use std::net::SocketAddr;
use std::sync::Arc;

use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::configuration::ServerConfig;
use crate::server::{serve_connection, Error, ServerContext};

pub struct InsecureListener {
    binding_address: SocketAddr,
    context: Arc<ServerContext>,
    exclusive: bool,
}

impl InsecureListener {
    pub fn new(server_config: &ServerConfig, context: ServerContext) -> Self {
        let binding_address = SocketAddr::new(server_config.bind_address, server_config.port);

        Self {
            binding_address,
            context: Arc::new(context),
            exclusive: server_config.exclusive,
        }
    }

    pub async fn serve(&self) -> Result<(), Error> {
        info!("Listening on {} (non-TLS)", self.binding_address);
        let listener = TcpListener::bind(self.binding_address).await?;

        loop {
            debug!("Waiting for incoming connection");
            let (tcp, remote_address) = listener.accept().await?;

            debug!("Accepted connection from {remote_address}");
            let stream = TokioIo::new(tcp);
            let context = Arc::clone(&self.context);

            if self.exclusive {
                // Impersonation mutates process credentials; connections
                // must not overlap.
                serve_connection(stream, context, remote_address).await;
            } else {
                tokio::spawn(Box::pin(serve_connection(stream, context, remote_address)));
            }
        }
    }
}
