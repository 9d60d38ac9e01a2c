use std::convert::Infallible;

use axum::{
    extract::{Path, Request, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::debug;

use jtrace_media::StorageError;
use jtrace_types::api::SignedFileQuery;

use crate::error::ApiError;
use crate::extract::ApiQuery;
use crate::state::AppState;

/// GET /file/{*path}?signature&expires
///
/// Serves a stored upload after checking its signature. The link itself is
/// the credential, so no bearer token is needed. The body is streamed from
/// disk and byte ranges are honoured.
pub async fn serve_signed_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
    ApiQuery(query): ApiQuery<SignedFileQuery>,
    request: Request,
) -> Result<Response, ApiError> {
    state
        .signer
        .verify(&path, &query.signature, query.expires)?;

    let unavailable = |e: StorageError| match e {
        StorageError::Io(io) => ApiError::Internal(io.into()),
        other => {
            debug!("Signed file {} unavailable: {}", path, other);
            ApiError::FileNotFound("File not found".into())
        }
    };
    state.storage.info(&path).await.map_err(unavailable)?;
    let file = state.storage.locate(&path).map_err(unavailable)?;

    let served: Result<_, Infallible> = ServeFile::new(file).oneshot(request).await;
    let mut response = match served {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    };

    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=3600"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    Ok(response)
}
