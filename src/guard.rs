//! Keeps the local host private to its own pages. The process holds the
//! user's session, so a request is only served when its `Host` names this
//! listener, and a mutating request is only served when the browser reports
//! it as same-origin.

use crate::errors::AppError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, Method, header},
    middleware::Next,
    response::Response,
};
use tracing::warn;

const SEC_FETCH_SITE: &str = "sec-fetch-site";

fn allowed_hosts(port: u16) -> [String; 3] {
    [
        format!("127.0.0.1:{port}"),
        format!("localhost:{port}"),
        format!("[::1]:{port}"),
    ]
}

fn header_str<'a>(headers: &'a HeaderMap, name: impl header::AsHeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Decides whether a request may reach the handlers.
pub fn check(method: &Method, headers: &HeaderMap, port: u16) -> Result<(), &'static str> {
    let hosts = allowed_hosts(port);
    let host = header_str(headers, header::HOST).ok_or("missing Host header")?;
    if !hosts.iter().any(|allowed| allowed.eq_ignore_ascii_case(host)) {
        return Err("unexpected Host header");
    }

    if [Method::GET, Method::HEAD, Method::OPTIONS].contains(method) {
        return Ok(());
    }

    if let Some(site) = header_str(headers, SEC_FETCH_SITE) {
        if site != "same-origin" && site != "none" {
            return Err("cross-site request");
        }
    }
    if let Some(origin) = header_str(headers, header::ORIGIN) {
        let same = origin
            .strip_prefix("http://")
            .is_some_and(|rest| hosts.iter().any(|allowed| allowed.eq_ignore_ascii_case(rest)));
        if !same {
            return Err("foreign Origin header");
        }
    }
    Ok(())
}

pub async fn local_only(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Err(reason) = check(request.method(), request.headers(), state.port) {
        warn!("rejected {} {}: {reason}", request.method(), request.uri());
        return Err(AppError::forbidden(reason));
    }
    Ok(next.run(request).await)
}
