//! Session authentication for the notes API.
//!
//! Sessions are issued by the identity provider and stored in the `sessions`
//! table. This middleware only resolves bearer tokens to an [`OwnerId`] and
//! attaches it to the request; handlers read it with `Extension<OwnerId>`.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::db::Database;
use crate::models::OwnerId;

/// Reject requests without a live session and attach the session's owner.
pub async fn require_session(
    State(db): State<Database>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = match bearer_token(&request) {
        Ok(token) => token,
        Err(reason) => {
            tracing::warn!("{}", reason);
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    let owner = db.find_session_owner(token).map_err(|e| {
        tracing::error!("Session lookup failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    match owner {
        Some(owner) => {
            request.extensions_mut().insert::<OwnerId>(owner);
            Ok(next.run(request).await)
        }
        None => {
            tracing::warn!("Unknown or expired session");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

fn bearer_token(request: &Request<Body>) -> Result<&str, &'static str> {
    let header = request
        .headers()
        .get("Authorization")
        .ok_or("Missing Authorization header")?
        .to_str()
        .map_err(|_| "Invalid Authorization header format")?;

    match header.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err("Invalid Authorization header format"),
    }
}

/// Permissive unless an explicit origin list is configured.
pub fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    match origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match origin.parse() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any)
        }
        None => CorsLayer::permissive(),
    }
}
