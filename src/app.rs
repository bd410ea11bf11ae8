use crate::api::{current_user, list_users};
use crate::auth::{auth_middleware, login, logout, register, AuthState};
use crate::settings::Settings;
use crate::store;
use anyhow::Context;
use axum::{
    handler::Handler,
    http::{header, HeaderValue, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::json;
use std::net::{IpAddr, SocketAddr};
use tower::ServiceBuilder;
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(settings: &Settings) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .ok()
                .or_else(|| settings.server.rust_log.clone())
                .unwrap_or_else(|| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Runs the server. Main entrypoint for the server app.
pub async fn run_server(settings: Settings) -> anyhow::Result<()> {
    init_tracing(&settings);
    if settings.uses_development_defaults() {
        tracing::warn!(
            "development session secret or insecure cookies in use, do not run this in production!"
        );
    }

    let pool = store::connect(&settings.database.url, settings.database.max_connections)
        .await
        .with_context(|| format!("cannot open database {}", settings.database.url))?;

    let state = AuthState::new(&pool, settings.cookie_config(), settings.auth.hash_cost);
    let sweeper = state.sessions.spawn_sweeper(settings.sweep_interval());

    let ip: IpAddr = settings
        .server
        .host
        .parse()
        .with_context(|| format!("invalid server.host {}", settings.server.host))?;
    let addr = SocketAddr::new(ip, settings.server.port);
    tracing::info!("listening on {}", addr);

    axum::Server::try_bind(&addr)
        .with_context(|| format!("cannot bind {}", addr))?
        .serve(app(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    sweeper.abort();
    pool.close().await;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutting down"),
        Err(e) => {
            tracing::error!("cannot listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

/// The full HTTP surface: public auth routes, the session-gated users
/// namespace and the security headers on every response.
pub fn app(state: AuthState) -> Router {
    let gate_state = state.clone();
    let user_routes = Router::new()
        .route("/api/users", get(list_users))
        .route("/api/users/me", get(current_user))
        .route_layer(middleware::from_fn(move |req, next| {
            auth_middleware(req, next, gate_state.clone())
        }));

    Router::new()
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/logout", get(logout))
        .merge(user_routes)
        .fallback(fallback.into_service())
        .layer(Extension(state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_FRAME_OPTIONS,
                    HeaderValue::from_static("SAMEORIGIN"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::REFERRER_POLICY,
                    HeaderValue::from_static("no-referrer"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_DNS_PREFETCH_CONTROL,
                    HeaderValue::from_static("off"),
                )),
        )
}

async fn fallback() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "message": "Not found" })))
}
