use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
};
use serde_json::{Value, json};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::envelope::ok;
use crate::error::ApiResult;
use crate::middleware::{audit_log, require_admin, require_auth};
use crate::state::AppState;
use crate::{admin, auth, comments, files, footprint_types, footprints, map, upload};

/// Headroom for multipart framing and text fields on top of the files.
const BODY_LIMIT_MARGIN: usize = 1024 * 1024;
const MAX_FILES_PER_REQUEST: usize = 10;

/// GET /api/health
pub async fn health() -> ApiResult<Value> {
    Ok(ok(json!({ "status": "ok" }), ""))
}

fn cors(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// The whole HTTP surface: `/api/*`, signed `/file/*` downloads and the
/// public avatar directory.
pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/footprints/public", get(footprints::list_public))
        .route("/footprint-types", get(footprint_types::list))
        .route("/map/config", get(map::config))
        .route("/map/config/public", get(map::public_info));

    let protected = Router::new()
        .route("/auth/me", get(auth::me).put(auth::update_me))
        .route("/auth/password", post(auth::change_password))
        .route("/auth/logout", post(auth::logout))
        .route("/footprints", get(footprints::list_mine).post(footprints::create))
        .route("/footprints/mine", get(footprints::list_mine))
        .route(
            "/footprints/{id}",
            get(footprints::get_one)
                .put(footprints::update)
                .delete(footprints::delete),
        )
        .route(
            "/comments/footprint/{id}",
            get(comments::list_for_footprint).post(comments::create),
        )
        .route("/comments/my", get(comments::mine))
        .route("/comments/{id}", delete(comments::delete))
        .route(
            "/upload/media",
            post(upload::upload_media).delete(upload::delete_media),
        )
        .route("/upload/media/batch", post(upload::upload_batch))
        .route("/upload/info/{*path}", get(upload::file_info))
        .route("/upload/refresh-url", post(upload::refresh_url))
        .route("/upload/avatar", post(upload::upload_avatar))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    // require_auth is the outer layer, so CurrentUser is set for require_admin
    let admin = Router::new()
        .route("/footprint-types", post(footprint_types::create))
        .route(
            "/footprint-types/{id}",
            put(footprint_types::update).delete(footprint_types::delete),
        )
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/{id}/status", put(admin::set_user_status))
        .route("/admin/logs", get(admin::list_logs))
        .route("/admin/stats", get(admin::stats))
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let api = public.merge(protected).merge(admin);

    let mut app = Router::new()
        .nest("/api", api)
        .route("/file/{*path}", get(files::serve_signed_file))
        .nest_service("/avatars", ServeDir::new(state.storage.avatars_dir()));

    // Unsigned links point straight at the upload tree.
    if !state.signer.is_enabled() {
        let base_dir = state.storage.base_dir().to_string();
        let dir = state.config.upload.root.join(&base_dir);
        info!("URL signing disabled, serving {} at /{}", dir.display(), base_dir);
        app = app.nest_service(&format!("/{}", base_dir), ServeDir::new(dir));
    }

    let body_limit = state.storage.max_file_size() * MAX_FILES_PER_REQUEST + BODY_LIMIT_MARGIN;

    app.layer(from_fn_with_state(state.clone(), audit_log))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors(&state.config.server.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
