use spin_sdk::http::{Request, Response};
use uuid::Uuid;
use regex::Regex;
use html_escape::encode_double_quoted_attribute;
use ammonia::Builder;
use std::sync::OnceLock;

use crate::models::models::Post;
use crate::core::db::Database;
use crate::core::errors::ApiError;
use crate::core::helpers::{json_response, now_iso, sanitize_plain_text, validate_uuid};
use crate::core::query_params::{get_page, parse_query_params};
use crate::auth::validate_token;
use crate::config::*;
use crate::images;

fn url_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"https?://[^\s]+").expect("Regex should compile")
    })
}

fn filter_post_content(content: &str) -> String {
    // Sanitize HTML to remove dangerous scripts and event handlers
    let clean = Builder::default()
        .link_rel(Some("noopener noreferrer"))
        .clean(content)
        .to_string();

    // Convert HTTP/HTTPS URLs into clickable links with proper escaping
    url_regex().replace_all(&clean, |caps: &regex::Captures| {
        let url = &caps[0];
        let escaped_url = encode_double_quoted_attribute(url);
        format!(r#"<a href="{}" target="_blank">{}</a>"#, escaped_url, url)
    }).to_string()
}

fn validate_post_data(header: &str, content: &str) -> Result<(), ApiError> {
    if header.is_empty() || header.len() > MAX_HEADER_LENGTH {
        return Err(ApiError::BadRequest("Invalid header".to_string()));
    }
    if content.is_empty() || content.len() > MAX_POST_LENGTH {
        return Err(ApiError::BadRequest("Invalid content".to_string()));
    }
    Ok(())
}

// === Lookups ===

pub fn find_post(db: &impl Database, id: &str) -> anyhow::Result<Option<Post>> {
    db.get_json(&post_key(id))
}

pub fn require_post(db: &impl Database, id: &str) -> Result<Post, ApiError> {
    find_post(db, id)?
        .ok_or_else(|| ApiError::NotFound(format!("Post with id = {} does not exist", id)))
}

pub fn posts_of_user(db: &impl Database, user_id: &str) -> anyhow::Result<Vec<Post>> {
    let ids: Vec<String> = db.get_json(&user_posts_key(user_id))?.unwrap_or_default();

    let mut posts = Vec::new();
    for id in ids {
        if let Some(post) = find_post(db, &id)? {
            posts.push(post);
        }
    }

    Ok(posts)
}

/// A post decorated with the ids of its images, the shape every
/// post-returning endpoint responds with.
pub fn post_json(db: &impl Database, post: &Post) -> anyhow::Result<serde_json::Value> {
    let image_ids = images::image_ids_for_post(db, &post.id)?;

    Ok(serde_json::json!({
        "id": post.id,
        "user_id": post.user_id,
        "header": post.header,
        "content": post.content,
        "created_at": post.created_at,
        "images": image_ids,
    }))
}

// === Mutations ===

pub fn save_post(
    db: &impl Database,
    user_id: &str,
    header: &str,
    content: &str,
) -> Result<Post, ApiError> {
    validate_post_data(header, content)?;

    let post = Post {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        header: sanitize_plain_text(header),
        content: filter_post_content(content),
        created_at: now_iso(),
    };

    db.set_json(&post_key(&post.id), &post)?;

    let index_key = user_posts_key(user_id);
    let mut ids: Vec<String> = db.get_json(&index_key)?.unwrap_or_default();
    ids.push(post.id.clone());
    db.set_json(&index_key, &ids)?;

    Ok(post)
}

/// Only the owner may edit; `created_at` never changes.
pub fn update_post(
    db: &impl Database,
    user_id: &str,
    post_id: &str,
    header: &str,
    content: &str,
) -> Result<Post, ApiError> {
    let mut post = require_post(db, post_id)?;

    if post.user_id != user_id {
        return Err(ApiError::Forbidden(
            "User tries to update a post that does not belong to them".to_string(),
        ));
    }

    validate_post_data(header, content)?;

    post.header = sanitize_plain_text(header);
    post.content = filter_post_content(content);
    db.set_json(&post_key(&post.id), &post)?;

    Ok(post)
}

/// Posts are deleted unconditionally by id once they exist; associated
/// image records and bytes go with them.
pub fn delete_post_by_id(db: &impl Database, post_id: &str) -> Result<(), ApiError> {
    let post = require_post(db, post_id)?;

    for image_id in images::image_ids_for_post(db, post_id)? {
        db.delete(&image_key(&image_id))?;
        db.delete(&image_bytes_key(&image_id))?;
    }
    db.delete(&post_images_key(post_id))?;

    db.delete(&post_key(post_id))?;

    let index_key = user_posts_key(&post.user_id);
    let mut ids: Vec<String> = db.get_json(&index_key)?.unwrap_or_default();
    ids.retain(|id| id != post_id);
    db.set_json(&index_key, &ids)?;

    Ok(())
}

// === HTTP Handlers ===

pub fn create_post(db: &impl Database, req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(db, &req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let value: serde_json::Value = match serde_json::from_slice(req.body()) {
        Ok(v) => v,
        Err(_) => return Ok(ApiError::BadRequest("Invalid JSON body".to_string()).into()),
    };
    let header = value["header"].as_str().unwrap_or_default();
    let content = value["content"].as_str().unwrap_or_default();

    match save_post(db, &user_id, header, content) {
        Ok(post) => json_response(201, &post_json(db, &post)?),
        Err(e) => Ok(e.into()),
    }
}

pub fn get_post(db: &impl Database, req: Request) -> anyhow::Result<Response> {
    let path = req.path();
    let post_id = path.trim_start_matches("/posts/");

    if post_id.is_empty() || !validate_uuid(post_id) {
        return Ok(ApiError::BadRequest("Post ID required".to_string()).into());
    }

    match require_post(db, post_id) {
        Ok(post) => json_response(200, &post_json(db, &post)?),
        Err(e) => Ok(e.into()),
    }
}

/// The caller's own posts, newest first, one page at a time.
pub fn list_posts(db: &impl Database, req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(db, &req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let params = parse_query_params(req.uri());
    let page = get_page(&params, "page");
    let start_idx = (page - 1) * POSTS_PER_PAGE;

    let mut posts = posts_of_user(db, &user_id)?;
    posts.sort_by(|a, b| (&b.created_at, &b.id).cmp(&(&a.created_at, &a.id)));

    let mut body = Vec::new();
    for post in posts.into_iter().skip(start_idx).take(POSTS_PER_PAGE) {
        body.push(post_json(db, &post)?);
    }

    json_response(200, &body)
}

pub fn edit_post(db: &impl Database, req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(db, &req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let path = req.path();
    let post_id = path.trim_start_matches("/posts/");

    if post_id.is_empty() || !validate_uuid(post_id) {
        return Ok(ApiError::BadRequest("Post ID required".to_string()).into());
    }

    let value: serde_json::Value = match serde_json::from_slice(req.body()) {
        Ok(v) => v,
        Err(_) => return Ok(ApiError::BadRequest("Invalid JSON body".to_string()).into()),
    };
    let header = value["header"].as_str().unwrap_or_default();
    let content = value["content"].as_str().unwrap_or_default();

    match update_post(db, &user_id, post_id, header, content) {
        Ok(post) => json_response(200, &post_json(db, &post)?),
        Err(e) => Ok(e.into()),
    }
}

pub fn delete_post(db: &impl Database, req: Request) -> anyhow::Result<Response> {
    if validate_token(db, &req).is_none() {
        return Ok(ApiError::Unauthorized.into());
    }

    let path = req.path();
    let post_id = path.trim_start_matches("/posts/");

    if post_id.is_empty() || !validate_uuid(post_id) {
        return Ok(ApiError::BadRequest("Post ID required".to_string()).into());
    }

    match delete_post_by_id(db, post_id) {
        Ok(()) => Ok(Response::builder().status(204).build()),
        Err(e) => Ok(e.into()),
    }
}
