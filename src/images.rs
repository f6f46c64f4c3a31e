use spin_sdk::http::{Request, Response};
use uuid::Uuid;

use crate::models::models::Image;
use crate::core::db::Database;
use crate::core::errors::ApiError;
use crate::core::helpers::{json_response, sanitize_plain_text, validate_uuid};
use crate::core::query_params::{get_string, parse_query_params};
use crate::auth::validate_token;
use crate::config::{image_bytes_key, image_key, post_images_key};
use crate::posts::require_post;

pub fn image_ids_for_post(db: &impl Database, post_id: &str) -> anyhow::Result<Vec<String>> {
    let mut ids: Vec<String> = db.get_json(&post_images_key(post_id))?.unwrap_or_default();
    ids.sort();
    Ok(ids)
}

/// Attaches an image to a post the caller owns. Metadata and bytes are
/// stored under separate keys so feed decoration never loads pixel data.
pub fn save_image(
    db: &impl Database,
    user_id: &str,
    post_id: &str,
    name: &str,
    content_type: &str,
    bytes: &[u8],
) -> Result<Image, ApiError> {
    let post = require_post(db, post_id)?;

    if post.user_id != user_id {
        return Err(ApiError::Forbidden(
            "User tries to add an image to a post that does not belong to them".to_string(),
        ));
    }
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("Image data is empty".to_string()));
    }

    let image = Image {
        id: Uuid::new_v4().to_string(),
        post_id: post_id.to_string(),
        name: sanitize_plain_text(name),
        content_type: content_type.to_string(),
    };

    db.set_json(&image_key(&image.id), &image)?;
    db.set_raw(&image_bytes_key(&image.id), bytes)?;

    let index_key = post_images_key(post_id);
    let mut ids: Vec<String> = db.get_json(&index_key)?.unwrap_or_default();
    ids.push(image.id.clone());
    db.set_json(&index_key, &ids)?;

    Ok(image)
}

pub fn load_image(db: &impl Database, id: &str) -> Result<(Image, Vec<u8>), ApiError> {
    let image: Image = db
        .get_json(&image_key(id))?
        .ok_or_else(|| ApiError::NotFound(format!("There is no image with id = {}", id)))?;

    let bytes = db
        .get_raw(&image_bytes_key(id))?
        .ok_or_else(|| ApiError::NotFound(format!("There is no image with id = {}", id)))?;

    Ok((image, bytes))
}

// === HTTP Handlers ===

pub fn upload_image(db: &impl Database, req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(db, &req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let path = req.path();
    let post_id = path
        .trim_start_matches("/posts/")
        .trim_end_matches("/images")
        .trim_matches('/');

    if post_id.is_empty() || !validate_uuid(post_id) {
        return Ok(ApiError::BadRequest("Post ID required".to_string()).into());
    }

    let content_type = req
        .header("Content-Type")
        .and_then(|h| h.as_str())
        .unwrap_or("application/octet-stream")
        .to_string();

    let params = parse_query_params(req.uri());
    let name = get_string(&params, "name", Some("image")).unwrap_or_default();

    match save_image(db, &user_id, post_id, &name, &content_type, req.body()) {
        Ok(image) => json_response(
            201,
            &serde_json::json!({
                "id": image.id,
                "post_id": image.post_id,
                "name": image.name,
                "content_type": image.content_type,
            }),
        ),
        Err(e) => Ok(e.into()),
    }
}

pub fn download_image(db: &impl Database, req: Request) -> anyhow::Result<Response> {
    let path = req.path();
    let image_id = path.trim_start_matches("/images/");

    if image_id.is_empty() || !validate_uuid(image_id) {
        return Ok(ApiError::BadRequest("Image ID required".to_string()).into());
    }

    match load_image(db, image_id) {
        Ok((image, bytes)) => Ok(Response::builder()
            .status(200)
            .header("Content-Type", image.content_type.as_str())
            .body(bytes)
            .build()),
        Err(e) => Ok(e.into()),
    }
}
