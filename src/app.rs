use std::any::Any;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

use crate::error::ErrorBody;
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::{admins, auth, proxy, users};

fn panic_response(_: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!("handler panicked");
    let status = StatusCode::INTERNAL_SERVER_ERROR;
    (status, Json(ErrorBody::new(status, "internal server error"))).into_response()
}

/// Rewrites the bare 408 from `TimeoutLayer` into the failure envelope.
async fn timeout_envelope(res: Response) -> Response {
    if res.status() != StatusCode::REQUEST_TIMEOUT {
        return res;
    }
    tracing::warn!("request timed out");
    let status = StatusCode::REQUEST_TIMEOUT;
    (status, Json(ErrorBody::new(status, "request timed out"))).into_response()
}

fn with_deadline<S>(router: Router<S>, timeout: Duration) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(TimeoutLayer::new(timeout))
        .layer(middleware::map_response(timeout_envelope))
}

async fn health() -> ApiResponse<&'static str> {
    ApiResponse::ok("ok")
}

pub fn build_app(state: AppState) -> Router {
    let request_timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        .nest(
            "/api/v1",
            with_deadline(
                Router::new()
                    .merge(auth::router())
                    .merge(users::router())
                    .merge(admins::router())
                    .route("/health", get(health)),
                request_timeout,
            ),
        )
        .merge(proxy::proxy_routes())
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
