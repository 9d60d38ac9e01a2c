use axum::extract::{Path, State};
use tracing::info;

use jtrace_types::api::UserStatusRequest;
use jtrace_types::models::{OpLogView, StatsView, UserProfile};

use crate::envelope::ok;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::render;
use crate::state::{AppState, run_db};

const LOG_LIMIT: u32 = 1000;

/// GET /api/admin/users
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Vec<UserProfile>> {
    let users = run_db(&state, |db| db.list_users()).await?;
    Ok(ok(users.iter().map(render::user_profile).collect(), ""))
}

/// PUT /api/admin/users/{id}/status: disabling also revokes the user's token.
pub async fn set_user_status(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    ApiJson(req): ApiJson<UserStatusRequest>,
) -> ApiResult<UserProfile> {
    let status = req.status;

    let updated = run_db(&state, move |db| {
        let Some(target) = db.get_user_by_id(user_id)? else {
            return Ok(Err(ApiError::NotFound("User not found".into())));
        };
        if target.is_admin && status == 0 {
            return Ok(Err(ApiError::Rejected(
                "Cannot disable an administrator".into(),
            )));
        }
        db.set_user_status(user_id, status)?;
        Ok(db
            .get_user_by_id(user_id)?
            .ok_or_else(|| ApiError::NotFound("User not found".into())))
    })
    .await??;

    if !updated.is_active() {
        state.tokens.revoke(&updated.username);
    }
    info!("User {} status set to {}", updated.username, updated.status);
    Ok(ok(render::user_profile(&updated), "Status updated"))
}

/// GET /api/admin/logs: latest entries first.
pub async fn list_logs(State(state): State<AppState>) -> ApiResult<Vec<OpLogView>> {
    let logs = run_db(&state, |db| db.list_oplogs(LOG_LIMIT)).await?;
    Ok(ok(logs.into_iter().map(render::oplog).collect(), ""))
}

/// GET /api/admin/stats
pub async fn stats(State(state): State<AppState>) -> ApiResult<StatsView> {
    let row = run_db(&state, |db| db.stats()).await?;
    Ok(ok(render::stats(row), ""))
}
