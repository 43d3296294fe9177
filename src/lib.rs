pub mod ai;
pub mod api;
pub mod auth;
pub mod client;
pub mod database;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

pub static APP_NAME: Lazy<String> =
    Lazy::new(|| std::env::var("APP_NAME").unwrap_or_else(|_| "chatfree".to_string()));

pub static APP_DATA_DIR: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("APP_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
            home_dir.join(".chatfree")
        })
});

pub fn get_app_data_dir() -> PathBuf {
    APP_DATA_DIR.clone()
}

pub fn get_http_port() -> u16 {
    if let Ok(port_str) = std::env::var("PORT") {
        if let Ok(port) = port_str.parse::<u16>() {
            return port;
        }
    }

    if std::net::TcpListener::bind("127.0.0.1:5000").is_ok() {
        return 5000;
    }

    portpicker::pick_unused_port().unwrap_or(3000)
}

pub fn create_rest_router() -> Router {
    let public_routes = Router::new()
        .route("/api/auth/login", post(api::auth::login))
        .route("/api/auth/register", post(api::auth::register))
        .route("/health", get(|| async { "OK" }));

    let protected_routes = Router::new()
        .route("/api/auth/logout", post(api::auth::logout))
        .route("/api/auth/me", get(api::auth::me))
        .route("/api/chat", get(api::chat::list_chats))
        .route("/api/chat/new", post(api::chat::create_chat))
        .route(
            "/api/chat/{chat_id}",
            get(api::chat::get_chat).delete(api::chat::delete_chat),
        )
        .route("/api/chat/{chat_id}/message", post(api::chat::send_message))
        .layer(middleware::from_fn(api::middleware::auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

pub fn run() {
    init_tracing();

    let port = get_http_port();
    tracing::info!(app = %*APP_NAME, port, "starting");

    let rt = tokio::runtime::Runtime::new().expect("failed to start tokio runtime");
    rt.block_on(async {
        if let Err(e) = database::initialize_database().await {
            tracing::error!(error = %e, "failed to initialize database");
            std::process::exit(1);
        }

        let router = create_rest_router();

        let (tx, rx) = tokio::sync::oneshot::channel();

        let server_task = tokio::spawn(async move {
            start_api_server(port, router).await;
        });

        tokio::spawn(async move {
            shutdown_signal().await;
            let _ = tx.send(());
        });

        let _ = rx.await;

        database::cleanup_database().await;
        server_task.abort();
        tracing::info!("shutdown complete");
    });
}

async fn start_api_server(port: u16, router: Router) {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => {
            tracing::info!(%addr, "listening");
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!(error = %e, "api server error");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, port, "failed to bind");
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, shutting down");
        },
        _ = terminate => {
            tracing::info!("received terminate signal, shutting down");
        },
    }
}
