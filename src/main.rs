#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]

use std::sync::Arc;

use argh::FromArgs;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::configuration::Configuration;
use crate::server::handlers::EchoHandler;
use crate::server::listener::InsecureListener;
use crate::server::ServerContext;

mod auth;
mod authn;
mod authz;
mod configuration;
mod hash;
mod metrics_provider;
mod server;

#[cfg(test)]
mod e2e;

#[derive(FromArgs, PartialEq, Debug)]
/// An embeddable HTTP server with pluggable authentication middleware
struct GlobalArguments {
    #[argh(
        option,
        short = 'c',
        default = "GlobalArguments::default_config_path()"
    )]
    /// the path to the configuration file, defaults to `config.toml`
    config: String,
}

impl GlobalArguments {
    fn default_config_path() -> String {
        "config.toml".to_string()
    }
}

fn set_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() -> Result<(), server::Error> {
    let arguments: GlobalArguments = argh::from_env();

    let config = Configuration::load(&arguments.config)?;

    let worker_threads = if config.server.exclusive {
        1
    } else {
        config.server.max_concurrent_requests
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        set_tracing();

        let context = ServerContext::new(&config, Arc::new(EchoHandler))?;
        let listener = InsecureListener::new(&config.server, context);
        listener.serve().await
    })
}
