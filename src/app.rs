use anyhow::Context;
use axum::Router;
use std::{panic, process, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::Config;
use crate::middleware::{cors, http};
use crate::services::auth::build_auth_service;
use crate::services::mailing::MailgunClient;
use crate::state::AppState;

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,mailinglist_gateway=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // Surface panics via tracing; stderr may be hidden depending on how we are launched.
        tracing::error!(?info, "panic");

        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::from_env().context("loading configuration")?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting gateway in {:?} mode on {}",
        config.app_env,
        config.addr
    );
    tracing::debug!(?config, "configuration loaded");

    let state = build_state(&config)?;
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("binding {}", config.addr))?;
    axum::serve(listener, app).await.context("serving http")?;

    Ok(())
}

fn build_state(config: &Config) -> anyhow::Result<AppState> {
    // A key that does not parse is fatal: refuse to start rather than reject every request.
    let auth = build_auth_service(config).map_err(|e| {
        tracing::error!(error = %e, "auth public key rejected");
        e
    })?;

    let mailing = MailgunClient::from_config(config).context("building mailgun client")?;
    tracing::info!(
        api_base = %config.mailgun_api_base,
        blocked = config.mailgun_blocked_lists.len(),
        hidden = config.mailgun_hidden_lists.len(),
        "mailing backend ready"
    );

    Ok(AppState::new(auth, Arc::new(mailing)))
}

fn build_router(state: AppState, config: &Config) -> Router {
    let router = api::v1::routes(state.clone()).with_state(state);

    let router = if config.cors_allowed_origins.is_empty() {
        router
    } else {
        cors::apply(router, config)
    };

    http::apply(router, config.request_timeout())
}
