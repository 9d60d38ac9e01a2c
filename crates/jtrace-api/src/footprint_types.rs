use axum::extract::{Path, State};

use jtrace_types::api::FootprintTypeRequest;
use jtrace_types::models::FootprintTypeView;

use crate::envelope::ok;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::render;
use crate::state::{AppState, run_db};

fn name_taken() -> ApiError {
    ApiError::Rejected("Type name already exists".into())
}

fn not_found() -> ApiError {
    ApiError::NotFound("Type not found".into())
}

/// GET /api/footprint-types: public.
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<FootprintTypeView>> {
    let rows = run_db(&state, |db| db.list_footprint_types()).await?;
    Ok(ok(rows.into_iter().map(render::footprint_type).collect(), ""))
}

/// POST /api/footprint-types [admin]
pub async fn create(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<FootprintTypeRequest>,
) -> ApiResult<FootprintTypeView> {
    let name = req.name.trim().to_string();

    let created = run_db(&state, move |db| {
        if db.footprint_type_name_taken(&name, None)? {
            return Ok(None);
        }
        db.create_footprint_type(&name, req.icon.as_deref(), req.sort_order)
            .map(Some)
    })
    .await?
    .ok_or_else(name_taken)?;

    Ok(ok(render::footprint_type(created), "Created"))
}

/// PUT /api/footprint-types/{id} [admin]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<FootprintTypeRequest>,
) -> ApiResult<FootprintTypeView> {
    let name = req.name.trim().to_string();

    let outcome = run_db(&state, move |db| {
        if db.get_footprint_type(id)?.is_none() {
            return Ok(Err(not_found()));
        }
        if db.footprint_type_name_taken(&name, Some(id))? {
            return Ok(Err(name_taken()));
        }
        db.update_footprint_type(id, &name, req.icon.as_deref(), req.sort_order)?;
        Ok(db.get_footprint_type(id)?.ok_or_else(not_found))
    })
    .await??;

    Ok(ok(render::footprint_type(outcome), "Updated"))
}

/// DELETE /api/footprint-types/{id} [admin]: refused while footprints use it.
pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    let outcome = run_db(&state, move |db| {
        let Some(row) = db.get_footprint_type(id)? else {
            return Ok(Err(not_found()));
        };
        let in_use = db.count_footprints_of_type(&row.name)?;
        if in_use > 0 {
            return Ok(Err(ApiError::Rejected(format!(
                "{} footprints still use this type",
                in_use
            ))));
        }
        db.delete_footprint_type(id)?;
        Ok(Ok(()))
    })
    .await??;

    Ok(ok(outcome, "Deleted"))
}
