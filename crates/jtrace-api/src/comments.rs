use axum::{
    Extension,
    extract::{Path, State},
};

use jtrace_db::models::{NewComment, NewCommentImage};
use jtrace_types::api::{CreateCommentRequest, PageQuery};
use jtrace_types::models::CommentView;

use crate::envelope::ok;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiQuery};
use crate::middleware::CurrentUser;
use crate::render;
use crate::state::{AppState, run_db};

const THREAD_PAGE_SIZE: u32 = 50;
const MINE_PAGE_SIZE: u32 = 20;

fn footprint_not_visible() -> ApiError {
    ApiError::NotFound("Footprint not found or not accessible".into())
}

/// GET /api/comments/footprint/{id}: top-level comments, newest first, with
/// their live replies nested.
pub async fn list_for_footprint(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(footprint_id): Path<i64>,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> ApiResult<Vec<CommentView>> {
    let (skip, limit) = (page.skip, page.limit_or(THREAD_PAGE_SIZE));
    let user_id = user.id;

    let loaded = run_db(&state, move |db| {
        if db.get_visible_footprint(footprint_id, user_id)?.is_none() {
            return Ok(None);
        }
        let top = db.list_top_level_comments(footprint_id, skip, limit)?;
        let replies = db.list_live_replies(footprint_id)?;
        let ids: Vec<i64> = top.iter().chain(replies.iter()).map(|c| c.id).collect();
        let images = db.get_comment_images(&ids)?;
        Ok(Some((top, replies, images)))
    })
    .await?;

    let (top, replies, images) = loaded.ok_or_else(footprint_not_visible)?;
    let tree = render::comment_tree(top, replies, images, &state.resolver.best_effort());
    Ok(ok(tree, ""))
}

/// POST /api/comments/footprint/{id}
pub async fn create(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(footprint_id): Path<i64>,
    ApiJson(req): ApiJson<CreateCommentRequest>,
) -> ApiResult<CommentView> {
    let new = NewComment {
        footprint_id,
        user_id: user.id,
        parent_id: req.parent_id,
        content: req.content,
        images: req
            .images
            .unwrap_or_default()
            .into_iter()
            .map(|img| NewCommentImage {
                image_url: img.image_url,
                description: img.description,
                sort_order: img.sort_order,
            })
            .collect(),
    };

    let created = run_db(&state, move |db| {
        if db
            .get_visible_footprint(new.footprint_id, new.user_id)?
            .is_none()
        {
            return Ok(Err(footprint_not_visible()));
        }
        if let Some(parent_id) = new.parent_id {
            if db.get_live_comment_in(parent_id, new.footprint_id)?.is_none() {
                return Ok(Err(ApiError::Rejected("Parent comment not found".into())));
            }
        }
        let row = db.create_comment(&new)?;
        let images = db.get_comment_images(&[row.id])?;
        Ok(Ok((row, images)))
    })
    .await??;

    let (row, mut images) = created;
    let view = render::comment(row, &mut images, &state.resolver.best_effort());
    Ok(ok(view, "Commented"))
}

/// DELETE /api/comments/{id}: author only; cancels the whole subtree.
pub async fn delete(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(comment_id): Path<i64>,
) -> ApiResult<()> {
    let user_id = user.id;

    let marked = run_db(&state, move |db| {
        match db.get_comment(comment_id)? {
            Some(c) if c.user_id == user_id && !c.is_deleted => {}
            _ => return Ok(None),
        }
        db.cascade_soft_delete(comment_id).map(Some)
    })
    .await?
    .ok_or_else(|| ApiError::NotFound("Comment not found or not yours".into()))?;

    tracing::debug!("User {} cancelled {} comments", user_id, marked);
    Ok(ok((), "Deleted"))
}

/// GET /api/comments/my: the caller's live comments with footprint summary.
pub async fn mine(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiQuery(page): ApiQuery<PageQuery>,
) -> ApiResult<Vec<CommentView>> {
    let (skip, limit) = (page.skip, page.limit_or(MINE_PAGE_SIZE));
    let user_id = user.id;

    let (rows, mut images) = run_db(&state, move |db| {
        let rows = db.list_user_comments(user_id, skip, limit)?;
        let ids: Vec<i64> = rows.iter().map(|r| r.comment.id).collect();
        let images = db.get_comment_images(&ids)?;
        Ok((rows, images))
    })
    .await?;

    let urls = state.resolver.best_effort();
    let views = rows
        .into_iter()
        .map(|row| render::user_comment(row, &mut images, &urls))
        .collect();
    Ok(ok(views, ""))
}
