use axum::{
    Extension,
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use tracing::{error, warn};

use jtrace_db::models::UserRow;

use crate::auth::decode_token;
use crate::error::ApiError;
use crate::state::{AppState, run_db};

/// The authenticated, active user of the current request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRow);

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
}

/// Require a bearer token that is the user's current cached token, for an
/// existing and active user.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".into()))?;

    let claims = decode_token(&state.config.jwt.secret, &token)
        .ok_or_else(|| ApiError::Unauthorized("Invalid token".into()))?;

    if !state.tokens.is_current(&claims.username, &token) {
        return Err(ApiError::Unauthorized("Token expired or revoked".into()));
    }

    let user_id = claims.sub;
    let user = run_db(&state, move |db| db.get_user_by_id(user_id))
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;

    if !user.is_active() {
        return Err(ApiError::Unauthorized("Account disabled".into()));
    }

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

/// Runs after [`require_auth`].
pub async fn require_admin(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !user.is_admin {
        return Err(ApiError::Forbidden("Admin only".into()));
    }
    Ok(next.run(req).await)
}

/// Append one `REQUEST` row to the op log for every `/api/` request.
/// Logging failures never affect the response.
pub async fn audit_log(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    if !path.starts_with("/api/") {
        return next.run(req).await;
    }

    let method = req.method().to_string();
    let user_id = bearer_token(req.headers())
        .and_then(|token| decode_token(&state.config.jwt.secret, &token))
        .map(|claims| claims.sub);

    let response = next.run(req).await;

    let log_state = state.clone();
    let written = tokio::task::spawn_blocking(move || {
        log_state
            .db
            .insert_oplog(user_id, "REQUEST", &path, &method, None)
    })
    .await;
    match written {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Failed to write op log: {}", e),
        Err(e) => error!("spawn_blocking join error: {}", e),
    }

    response
}
