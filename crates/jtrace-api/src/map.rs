use axum::extract::State;

use jtrace_types::api::MapConfigQuery;
use jtrace_types::models::{MapConfigView, PublicMapInfo};

use crate::envelope::ok;
use crate::error::ApiResult;
use crate::extract::ApiQuery;
use crate::state::AppState;

/// GET /api/map/config?expires_minutes: map provider keys, sealed.
pub async fn config(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<MapConfigQuery>,
) -> ApiResult<MapConfigView> {
    let sealed = state
        .map_sealer
        .sealed_provider_config(query.expires_minutes)?;

    Ok(ok(
        MapConfigView {
            config: sealed,
            expires_minutes: query.expires_minutes,
            encryption_enabled: state.map_sealer.is_enabled(),
        },
        "Map config",
    ))
}

/// GET /api/map/config/public
pub async fn public_info() -> ApiResult<PublicMapInfo> {
    Ok(ok(
        PublicMapInfo {
            map_enabled: true,
            provider: "amap".into(),
            requires_auth: true,
        },
        "",
    ))
}
