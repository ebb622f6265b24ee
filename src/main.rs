use std::net::Ipv4Addr;
use std::sync::Arc;

use anyhow::Context as _;
use tracing_subscriber::EnvFilter;

use mailtrack::api::{api_router, Context};
use mailtrack::config::Config;
use mailtrack::dispatch::{Dispatcher, HttpSubmitter};
use mailtrack::vault::{Vault, VaultParams};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Arc::new(Config::from_env().context("loading configuration from environment")?);
    let port = config.port;

    let vault = Arc::new(Vault::new(&config.app_secret, VaultParams::default()));
    let dispatcher = Arc::new(Dispatcher::new(
        HttpSubmitter::new(config.submission_url.clone()),
        config.tracking_base_url.clone(),
    ));

    let ctx = Context {
        config,
        dispatcher,
        vault,
    };

    let routes = api_router(ctx);
    mailtrack::serve((Ipv4Addr::UNSPECIFIED, port), routes)
        .await
        .context("error running HTTP server")?;
    Ok(())
}
