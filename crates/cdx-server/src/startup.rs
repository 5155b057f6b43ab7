use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::routes::router;
use crate::state::AppState;

/// Assembles the full `axum` app: the route table from [`router`], layered
/// with request tracing. Mirrors the teacher's `startup::run` shape, minus
/// the database-extension layer (our state carries its own `Arc`s).
pub fn build_app(state: AppState) -> axum::Router {
    router().layer(ServiceBuilder::new().layer(TraceLayer::new_for_http())).with_state(state)
}

/// Runs `app` on `listener` until a shutdown signal (`Ctrl+C` or `SIGTERM`)
/// is received.
pub async fn serve(listener: tokio::net::TcpListener, app: axum::Router) -> anyhow::Result<()> {
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
