//! Row → JSON view conversion. Every media URL leaving the API goes through
//! the best-effort resolver here.

use std::collections::HashMap;

use jtrace_db::models::{
    CommentImageRow, CommentRow, FootprintRow, FootprintTypeRow, OpLogRow, StatsRow,
    UserCommentRow, UserRow,
};
use jtrace_db::thread::{CommentLink, CommentThread};
use jtrace_media::BestEffort;
use jtrace_types::models::{
    CommentImageView, CommentView, FootprintSummary, FootprintTypeView, FootprintView,
    MediaView, OpLogView, StatsView, UserProfile, UserSummary,
};

const LEGACY_AVATAR_PREFIX: &str = "/uploads/avatars/";

/// `2024-09-22 10:00:00` → `2024-09-22T10:00:00`
pub fn iso(timestamp: &str) -> String {
    timestamp.replacen(' ', "T", 1)
}

/// Avatars stored under the old `/uploads/avatars/` prefix are served from
/// `/avatars/`.
pub fn convert_avatar_url(avatar: Option<&str>) -> Option<String> {
    avatar.map(|url| match url.strip_prefix(LEGACY_AVATAR_PREFIX) {
        Some(name) => format!("/avatars/{}", name),
        None => url.to_string(),
    })
}

pub fn user_profile(user: &UserRow) -> UserProfile {
    UserProfile {
        id: user.id,
        username: user.username.clone(),
        email: user.email.clone(),
        nickname: user.nickname.clone(),
        avatar: convert_avatar_url(user.avatar.as_deref()),
        bio: user.bio.clone(),
        gender: user.gender,
        status: user.status,
        is_admin: user.is_admin,
        is_active: user.is_active(),
        created_at: iso(&user.created_at),
        last_login: user.last_login.as_deref().map(iso),
    }
}

pub fn footprint(row: FootprintRow, urls: &BestEffort<'_>, with_owner: bool) -> FootprintView {
    FootprintView {
        id: row.id,
        user_id: row.user_id,
        username: if with_owner { row.username } else { None },
        name: row.name,
        lng: row.lng,
        lat: row.lat,
        kind: row.kind,
        date: row.date,
        tags: row.tags,
        notes: row.notes,
        is_public: row.is_public,
        created_at: iso(&row.created_at),
        medias: row
            .medias
            .into_iter()
            .map(|m| MediaView {
                id: m.id,
                media_url: urls.resolve(&m.media_url),
                media_type: m.media_type,
                description: m.description,
                sort_order: m.sort_order,
                created_at: iso(&m.created_at),
            })
            .collect(),
    }
}

pub fn footprint_type(row: FootprintTypeRow) -> FootprintTypeView {
    FootprintTypeView {
        id: row.id,
        name: row.name,
        icon: row.icon,
        sort_order: row.sort_order,
    }
}

fn images(rows: Vec<CommentImageRow>, urls: &BestEffort<'_>) -> Vec<CommentImageView> {
    rows.into_iter()
        .map(|img| CommentImageView {
            id: img.id,
            image_url: urls.resolve(&img.image_url),
            description: img.description,
            sort_order: img.sort_order,
            created_at: iso(&img.created_at),
        })
        .collect()
}

/// One comment without children.
pub fn comment(
    row: CommentRow,
    images_by_comment: &mut HashMap<i64, Vec<CommentImageRow>>,
    urls: &BestEffort<'_>,
) -> CommentView {
    let user = row.author.map(|author| UserSummary {
        id: row.user_id,
        username: author.username,
        nickname: author.nickname,
        avatar: convert_avatar_url(author.avatar.as_deref()),
    });

    CommentView {
        id: row.id,
        footprint_id: row.footprint_id,
        user_id: row.user_id,
        parent_id: row.parent_id,
        content: row.content,
        is_deleted: row.is_deleted,
        created_at: iso(&row.created_at),
        updated_at: iso(&row.updated_at),
        user,
        images: images(images_by_comment.remove(&row.id).unwrap_or_default(), urls),
        children: Vec::new(),
        footprint: None,
    }
}

/// Nest live replies under the given top-level comments.
///
/// `replies` holds every live reply of the footprint; replies whose parent is
/// not reachable from `top` (deleted parent, other page) are left out.
pub fn comment_tree(
    top: Vec<CommentRow>,
    replies: Vec<CommentRow>,
    mut images_by_comment: HashMap<i64, Vec<CommentImageRow>>,
    urls: &BestEffort<'_>,
) -> Vec<CommentView> {
    let thread = CommentThread::build(top.iter().chain(replies.iter()).map(|c| CommentLink {
        id: c.id,
        parent_id: c.parent_id,
        is_deleted: c.is_deleted,
    }));
    let mut pending: HashMap<i64, CommentRow> = replies.into_iter().map(|c| (c.id, c)).collect();

    let mut roots = Vec::with_capacity(top.len());
    let mut views: HashMap<i64, CommentView> = HashMap::new();
    // (parent, child), every child listed before its own descendants
    let mut links = Vec::new();
    let mut stack = Vec::new();

    for row in top {
        let id = row.id;
        roots.push(id);
        views.insert(id, comment(row, &mut images_by_comment, urls));
        stack.push(id);

        while let Some(parent) = stack.pop() {
            for &child in thread.children(parent).iter().rev() {
                // taken once, so a corrupt cycle cannot loop forever
                let Some(row) = pending.remove(&child) else {
                    continue;
                };
                views.insert(child, comment(row, &mut images_by_comment, urls));
                links.push((parent, child));
                stack.push(child);
            }
        }
    }

    // Walking backwards attaches every subtree before its root moves.
    for (parent, child) in links.into_iter().rev() {
        if let Some(view) = views.remove(&child) {
            if let Some(parent) = views.get_mut(&parent) {
                parent.children.push(view);
            }
        }
    }

    roots
        .into_iter()
        .filter_map(|id| views.remove(&id))
        .collect()
}

pub fn user_comment(
    row: UserCommentRow,
    images_by_comment: &mut HashMap<i64, Vec<CommentImageRow>>,
    urls: &BestEffort<'_>,
) -> CommentView {
    let summary = FootprintSummary {
        id: row.comment.footprint_id,
        name: row.footprint_name,
        lng: row.footprint_lng,
        lat: row.footprint_lat,
    };
    let mut view = comment(row.comment, images_by_comment, urls);
    view.footprint = Some(summary);
    view
}

pub fn oplog(row: OpLogRow) -> OpLogView {
    OpLogView {
        id: row.id,
        user_id: row.user_id,
        action: row.action,
        path: row.path,
        method: row.method,
        detail: row.detail,
        created_at: iso(&row.created_at),
    }
}

pub fn stats(row: StatsRow) -> StatsView {
    StatsView {
        users: row.users,
        active_users: row.active_users,
        footprints: row.footprints,
        public_footprints: row.public_footprints,
        comments: row.comments,
        medias: row.medias,
        op_logs: row.op_logs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jtrace_crypto::Signer;
    use jtrace_media::MediaUrlResolver;
    use jtrace_types::config::SignatureConfig;

    fn row(id: i64, parent_id: Option<i64>) -> CommentRow {
        CommentRow {
            id,
            footprint_id: 1,
            user_id: 1,
            parent_id,
            content: format!("c{}", id),
            is_deleted: false,
            created_at: "2024-09-22 10:00:00".into(),
            updated_at: "2024-09-22 10:00:00".into(),
            author: None,
        }
    }

    fn resolver() -> MediaUrlResolver {
        MediaUrlResolver::new(
            Signer::new(&SignatureConfig {
                enabled: false,
                ..SignatureConfig::default()
            })
            .unwrap(),
        )
    }

    #[test]
    fn avatar_urls_are_rewritten() {
        assert_eq!(
            convert_avatar_url(Some("/uploads/avatars/a.jpg")).as_deref(),
            Some("/avatars/a.jpg")
        );
        assert_eq!(
            convert_avatar_url(Some("/other/a.jpg")).as_deref(),
            Some("/other/a.jpg")
        );
        assert_eq!(convert_avatar_url(None), None);
    }

    #[test]
    fn timestamps_become_iso() {
        assert_eq!(iso("2024-09-22 10:00:00"), "2024-09-22T10:00:00");
    }

    #[test]
    fn replies_nest_under_their_parents() {
        let resolver = resolver();
        let urls = resolver.best_effort();

        // 1 -> {2 -> {4}, 3}; 5 replies to a comment outside this page
        let tree = comment_tree(
            vec![row(1, None)],
            vec![row(2, Some(1)), row(3, Some(1)), row(4, Some(2)), row(5, Some(99))],
            HashMap::new(),
            &urls,
        );

        assert_eq!(tree.len(), 1);
        let ids: Vec<i64> = tree[0].children.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(tree[0].children[0].children[0].id, 4);
        assert!(tree[0].children[1].children.is_empty());
        assert_eq!(tree[0].created_at, "2024-09-22T10:00:00");
    }

    #[test]
    fn long_reply_chains_nest_without_recursion() {
        let resolver = resolver();
        let urls = resolver.best_effort();
        let depth = 200_000;

        let replies = (2..=depth).map(|id| row(id, Some(id - 1))).collect();
        let mut tree = comment_tree(vec![row(1, None)], replies, HashMap::new(), &urls);
        assert_eq!(tree.len(), 1);

        // unwind by hand so dropping the tree stays flat too
        let mut expected = 1;
        let mut node = tree.pop();
        while let Some(mut view) = node {
            assert_eq!(view.id, expected);
            assert!(view.children.len() <= 1);
            expected += 1;
            node = view.children.pop();
        }
        assert_eq!(expected, depth + 1);
    }
}
