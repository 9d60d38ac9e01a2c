use axum::{
    Extension,
    extract::{Path, State},
};
use chrono::NaiveDate;

use jtrace_db::models::{FootprintChanges, NewFootprint, NewMedia};
use jtrace_types::api::{CreateFootprintRequest, MediaInput, PageQuery, UpdateFootprintRequest};
use jtrace_types::models::FootprintView;

use crate::envelope::ok;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiQuery};
use crate::middleware::CurrentUser;
use crate::render;
use crate::state::{AppState, run_db};

const PUBLIC_PAGE_SIZE: u32 = 20;

/// `YYYY-MM-DD`, normalised; anything unparsable becomes no date.
fn parse_date(raw: &str) -> Option<String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .map(|d| d.format("%Y-%m-%d").to_string())
}

fn new_medias(inputs: Vec<MediaInput>) -> Vec<NewMedia> {
    inputs
        .into_iter()
        .enumerate()
        .map(|(i, m)| NewMedia {
            media_url: m.media_url,
            media_type: m.media_type,
            description: m.description,
            sort_order: m.sort_order.unwrap_or(i as i64),
        })
        .collect()
}

fn not_found() -> ApiError {
    ApiError::NotFound("Footprint not found".into())
}

/// GET /api/footprints, GET /api/footprints/mine
pub async fn list_mine(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Vec<FootprintView>> {
    let user_id = user.id;
    let rows = run_db(&state, move |db| db.list_user_footprints(user_id)).await?;

    let urls = state.resolver.best_effort();
    let views = rows
        .into_iter()
        .map(|row| render::footprint(row, &urls, false))
        .collect();
    Ok(ok(views, ""))
}

/// GET /api/footprints/public?skip&limit: no auth, newest first.
pub async fn list_public(
    State(state): State<AppState>,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> ApiResult<Vec<FootprintView>> {
    let (skip, limit) = (page.skip, page.limit_or(PUBLIC_PAGE_SIZE));
    let rows = run_db(&state, move |db| db.list_public_footprints(skip, limit)).await?;

    let urls = state.resolver.best_effort();
    let views = rows
        .into_iter()
        .map(|row| render::footprint(row, &urls, true))
        .collect();
    Ok(ok(views, ""))
}

/// POST /api/footprints
pub async fn create(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiJson(req): ApiJson<CreateFootprintRequest>,
) -> ApiResult<FootprintView> {
    let new = NewFootprint {
        user_id: user.id,
        name: req.name,
        lng: req.lng,
        lat: req.lat,
        kind: req.kind,
        date: req.date.as_deref().and_then(parse_date),
        notes: req.notes,
        is_public: req.is_public,
        tags: req.tags.unwrap_or_default(),
        medias: new_medias(req.medias.unwrap_or_default()),
    };

    let row = run_db(&state, move |db| db.create_footprint(&new)).await?;
    Ok(ok(
        render::footprint(row, &state.resolver.best_effort(), false),
        "Created",
    ))
}

/// GET /api/footprints/{id}: owner only.
pub async fn get_one(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<FootprintView> {
    let user_id = user.id;
    let row = run_db(&state, move |db| db.get_owned_footprint(id, user_id))
        .await?
        .ok_or_else(not_found)?;
    Ok(ok(
        render::footprint(row, &state.resolver.best_effort(), false),
        "",
    ))
}

/// PUT /api/footprints/{id}: owner only; tags and medias replace the
/// existing set when present.
pub async fn update(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<UpdateFootprintRequest>,
) -> ApiResult<FootprintView> {
    let changes = FootprintChanges {
        name: req.name,
        lng: req.lng,
        lat: req.lat,
        kind: req.kind,
        date: req.date.map(|raw| parse_date(&raw)),
        notes: req.notes,
        is_public: req.is_public,
        tags: req.tags,
        medias: req.medias.map(new_medias),
    };

    let user_id = user.id;
    let row = run_db(&state, move |db| db.update_footprint(id, user_id, &changes))
        .await?
        .ok_or_else(not_found)?;
    Ok(ok(
        render::footprint(row, &state.resolver.best_effort(), false),
        "Updated",
    ))
}

/// DELETE /api/footprints/{id}: owner only.
pub async fn delete(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<bool> {
    let user_id = user.id;
    if !run_db(&state, move |db| db.delete_footprint(id, user_id)).await? {
        return Err(not_found());
    }
    Ok(ok(true, "Deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_are_parsed_or_dropped() {
        assert_eq!(parse_date("2024-09-22").as_deref(), Some("2024-09-22"));
        assert_eq!(parse_date("22/09/2024"), None);
        assert_eq!(parse_date(""), None);
    }
}
