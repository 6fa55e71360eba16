//! Reverse proxy to the processing service, with paid endpoints gated on points.

use axum::{
    body::Body,
    extract::{FromRef, Request, State},
    http::{header, HeaderMap, HeaderName, Method},
    response::Response,
    routing::any,
    Router,
};
use tracing::{error, info, instrument};

use crate::auth::claims::Role;
use crate::auth::extractors::bearer_token;
use crate::auth::services::AuthService;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::users::services::UserService;

pub const PREFIX: &str = "/api/py";
const PAID_PATHS: &[&str] = &["/process_image", "/process_video"];

#[derive(Clone)]
pub struct ProcessingProxy {
    http: reqwest::Client,
    base_url: String,
    auth: AuthService,
    users: UserService,
}

impl FromRef<AppState> for ProcessingProxy {
    fn from_ref(state: &AppState) -> Self {
        Self {
            http: state.http.clone(),
            base_url: state.config.processing.base_url.clone(),
            auth: AuthService::from_ref(state),
            users: UserService::from_ref(state),
        }
    }
}

pub fn proxy_routes() -> Router<AppState> {
    Router::new()
        .route(PREFIX, any(forward))
        .route(&format!("{PREFIX}/*path"), any(forward))
}

/// Path as the processing service sees it: prefix removed, percent-decoded,
/// dot segments resolved, empty segments dropped, each segment re-encoded.
///
/// The paid check and the forwarded request both use this one form.
fn upstream_path(raw: &str) -> AppResult<String> {
    let rest = raw.strip_prefix(PREFIX).unwrap_or(raw);
    let decoded = urlencoding::decode(rest)
        .map_err(|_| AppError::bad_request("invalid path encoding"))?;

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return Ok("/".to_string());
    }
    let mut path = String::with_capacity(rest.len());
    for segment in segments {
        path.push('/');
        path.push_str(&urlencoding::encode(segment));
    }
    Ok(path)
}

fn is_paid(method: &Method, path: &str) -> bool {
    method == Method::POST && PAID_PATHS.contains(&path)
}

/// Copy of `headers` without the hop-by-hop set and `Host`.
fn forwardable(headers: &HeaderMap) -> HeaderMap {
    let mut out = headers.clone();
    let hop_by_hop = [
        header::CONNECTION,
        header::HOST,
        header::PROXY_AUTHENTICATE,
        header::PROXY_AUTHORIZATION,
        header::TE,
        header::TRAILER,
        header::TRANSFER_ENCODING,
        header::UPGRADE,
        HeaderName::from_static("keep-alive"),
    ];
    for name in hop_by_hop {
        out.remove(name);
    }
    out
}

impl ProcessingProxy {
    /// Authenticates the caller and takes one point before a paid call.
    async fn charge(&self, headers: &HeaderMap) -> AppResult<()> {
        let claims = self.auth.authenticate(bearer_token(headers)?).await?;
        if claims.role != Role::User {
            return Err(AppError::forbidden("user account required"));
        }
        self.users.deduct_point(claims.sub).await?;
        Ok(())
    }
}

#[instrument(skip_all, fields(method = %req.method(), path = %req.uri().path()))]
pub async fn forward(State(proxy): State<ProcessingProxy>, req: Request) -> AppResult<Response> {
    let (parts, body) = req.into_parts();
    let path = upstream_path(parts.uri.path())?;

    if is_paid(&parts.method, &path) {
        proxy.charge(&parts.headers).await?;
    }

    let url = match parts.uri.query() {
        Some(query) => format!("{}{path}?{query}", proxy.base_url),
        None => format!("{}{path}", proxy.base_url),
    };

    let upstream = proxy
        .http
        .request(parts.method.clone(), &url)
        .headers(forwardable(&parts.headers))
        .body(reqwest::Body::wrap_stream(body.into_data_stream()))
        .send()
        .await
        .map_err(|err| {
            error!(error = %err, "processing service request failed");
            AppError::internal("processing service unavailable")
        })?;

    let status = upstream.status();
    info!(upstream_status = %status, "proxied");

    let mut response = Response::builder().status(status);
    if let Some(headers) = response.headers_mut() {
        *headers = forwardable(upstream.headers());
    }
    let response = response
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(anyhow::Error::new)?;
    Ok(response)
}
