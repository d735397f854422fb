mod config;

use std::sync::Arc;

use axum::{Router, extract::Extension, response::Html, routing::get};
use clap::Parser as _;
use lti_tool_core::LauncherBuilder;
use lti_tool_core::crypto::HmacSigner;
use lti_tool_core::domain::Deployment;
use lti_tool_core::mux::{self, AppState};
use lti_tool_core::session::RequestSession;
use lti_tool_core::store::{InMemoryStore, Registry as _};

use crate::config::Config;

fn init_tracing() {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter = EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
        .from_env_lossy();
    let layer = fmt::layer().json();
    tracing_subscriber::registry().with(layer).with(env_filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::parse();

    let store = Arc::new(InMemoryStore::new());
    for seed in &config.deployments {
        store
            .add_deployment(Deployment {
                internal_id: format!("{}:{}", seed.client_id, seed.deployment_id),
                tenant_id: seed.client_id.clone(),
                issuer: seed.issuer.clone(),
                client_id: seed.client_id.clone(),
                deployment_id: seed.deployment_id.clone(),
                jwks_url: seed.jwks_url.clone(),
                auth_endpoint: seed.auth_endpoint.clone(),
                token_endpoint: String::new(),
            })
            .await?;
        tracing::info!(client_id = %seed.client_id, deployment_id = %seed.deployment_id, "seeded deployment");
    }

    let signer = Arc::new(HmacSigner::new("demo", config.hmac_secret.into_bytes(), config.issuer));

    let launcher = Arc::new(
        LauncherBuilder::default()
            .with_base_url(config.base_url)
            .with_audience(config.audience)
            .with_signer(signer)
            .with_store(store)
            .with_deep_linking_enabled(true)
            .build()?,
    );

    let app_routes = Router::new().route("/session", get(show_session));
    let app = mux::build(AppState { launcher, impostering: None }, app_routes);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!(addr = %config.bind, "lti demo listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn show_session(Extension(session): Extension<RequestSession>) -> Html<String> {
    Html(format!(
        "<html><body><h1>LTI session</h1><pre>{}</pre></body></html>",
        serde_json::to_string_pretty(&session.claims).unwrap_or_default()
    ))
}
