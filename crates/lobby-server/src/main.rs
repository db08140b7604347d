mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use lobby_api::middleware::require_auth;
use lobby_api::state::{AppState, AppStateInner};
use lobby_api::{attachments, conversations, members, messages, streams};
use lobby_gateway::dispatcher::Dispatcher;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lobby=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let db = lobby_db::Database::open(&config.db_path)?;

    let dispatcher = if config.change_feed {
        Dispatcher::new()
    } else {
        warn!("Change feed disabled; event streams will be heartbeat-only");
        Dispatcher::disabled()
    };

    let state: AppState = Arc::new(AppStateInner {
        db,
        dispatcher,
        jwt_secret: config.jwt_secret.clone(),
        heartbeat: config.heartbeat,
        duplicate_window: config.duplicate_window,
        max_upload_bytes: config.max_upload_bytes,
        allowed_mime: config.allowed_mime.clone(),
    });

    let protected = Router::new()
        .route("/conversations/dm", post(conversations::create_dm))
        .route("/conversations/group-a", post(conversations::create_group_a))
        .route(
            "/conversations/group-b",
            get(conversations::find_group_b).post(conversations::create_group_b),
        )
        .route("/conversations", get(conversations::list))
        .route("/conversations/mine", get(conversations::list_mine))
        .route("/conversations/{conversation_id}", get(conversations::get))
        .route(
            "/conversations/{conversation_id}/members",
            get(members::list_members).post(members::add_member),
        )
        .route(
            "/conversations/{conversation_id}/members/{user_id}",
            delete(members::remove_member),
        )
        .route(
            "/conversations/{conversation_id}/messages",
            get(messages::history).post(messages::send_message),
        )
        .route(
            "/conversations/{conversation_id}/read",
            post(messages::mark_read),
        )
        .route(
            "/conversations/{conversation_id}/stream",
            get(streams::open_stream),
        )
        .route(
            "/conversations/{conversation_id}/attachments",
            post(attachments::upload),
        )
        .route("/attachments/{attachment_id}", get(attachments::download))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let app = Router::new()
        .route("/health", get(health))
        .merge(protected)
        .layer(DefaultBodyLimit::max(
            (state.max_upload_bytes as usize).max(1024 * 1024),
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Lobby server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn health() -> &'static str {
    "OK"
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
