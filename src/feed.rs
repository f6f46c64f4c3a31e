use spin_sdk::http::{Request, Response};

use crate::models::models::Post;
use crate::core::db::Database;
use crate::core::errors::ApiError;
use crate::core::helpers::json_response;
use crate::core::query_params::{get_i64, parse_query_params};
use crate::auth::validate_token;
use crate::config::FEED_ITEMS_PER_PAGE_DEFAULT;
use crate::posts::{post_json, posts_of_user};
use crate::relations::subscription_ids;
use crate::users::require_user;

/// The most recent post of one user; equal timestamps resolve to the
/// highest post id so repeated reads agree.
fn latest_post_of(db: &impl Database, user_id: &str) -> anyhow::Result<Option<Post>> {
    let latest = posts_of_user(db, user_id)?
        .into_iter()
        .max_by(|a, b| (&a.created_at, &a.id).cmp(&(&b.created_at, &b.id)));

    Ok(latest)
}

/// One post per subscription target -- the target's newest -- merged
/// across all targets and ordered newest first.
pub fn latest_posts_of_subscriptions(
    db: &impl Database,
    user_id: &str,
) -> Result<Vec<Post>, ApiError> {
    require_user(db, user_id)?;

    let mut latest = Vec::new();
    for target_id in subscription_ids(db, user_id)? {
        if let Some(post) = latest_post_of(db, &target_id)? {
            latest.push(post);
        }
    }
    latest.sort_by(|a, b| (&b.created_at, &b.id).cmp(&(&a.created_at, &a.id)));

    Ok(latest)
}

fn checked_items_per_page(items_per_page: i64) -> usize {
    if items_per_page <= 0 {
        FEED_ITEMS_PER_PAGE_DEFAULT as usize
    } else {
        items_per_page as usize
    }
}

fn page_offset(items_per_page: usize, page: i64) -> usize {
    if page <= 0 {
        0
    } else {
        items_per_page * (page as usize - 1)
    }
}

/// Paged variant of the same ordering. Page numbering is 1-based;
/// out-of-range arguments coerce rather than fail.
pub fn latest_posts_page(
    db: &impl Database,
    user_id: &str,
    items_per_page: i64,
    page: i64,
) -> Result<Vec<Post>, ApiError> {
    let items_per_page = checked_items_per_page(items_per_page);
    let offset = page_offset(items_per_page, page);

    let window = latest_posts_of_subscriptions(db, user_id)?
        .into_iter()
        .skip(offset)
        .take(items_per_page)
        .collect();

    Ok(window)
}

// === HTTP Handler ===

pub fn get_feed(db: &impl Database, req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(db, &req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let params = parse_query_params(req.uri());
    let paged = params.contains_key("items_per_page") || params.contains_key("page");

    let result = if paged {
        let items_per_page = get_i64(&params, "items_per_page", 0);
        let page = get_i64(&params, "page", 1);
        latest_posts_page(db, &user_id, items_per_page, page)
    } else {
        latest_posts_of_subscriptions(db, &user_id)
    };

    match result {
        Ok(posts) => {
            let mut body = Vec::new();
            for post in &posts {
                body.push(post_json(db, post)?);
            }
            json_response(200, &body)
        }
        Err(e) => Ok(e.into()),
    }
}
