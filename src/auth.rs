use spin_sdk::http::{Request, Response};
use uuid::Uuid;

use crate::models::models::TokenData;
use crate::core::db::Database;
use crate::core::errors::ApiError;
use crate::core::helpers::{json_response, now_iso, verify_password};
use crate::config::{token_expiration_hours, token_key, user_key};
use crate::users::find_user_by_email;

pub fn login_user(db: &impl Database, req: Request) -> anyhow::Result<Response> {
    let creds: serde_json::Value = match serde_json::from_slice(req.body()) {
        Ok(v) => v,
        Err(_) => return Ok(ApiError::BadRequest("Invalid JSON body".to_string()).into()),
    };
    let email = creds["email"].as_str().unwrap_or_default();
    let password = creds["password"].as_str().unwrap_or_default();

    let user = match find_user_by_email(db, email)? {
        Some(u) if verify_password(password, &u.password) => u,
        _ => return Ok(ApiError::Unauthorized.into()),
    };

    let token = Uuid::new_v4().to_string();
    let data = TokenData {
        user_id: user.id.clone(),
        created_at: now_iso(),
    };
    db.set_json(&token_key(&token), &data)?;

    json_response(
        200,
        &serde_json::json!({
            "token": token,
            "user_id": user.id,
        }),
    )
}

pub fn logout_user(db: &impl Database, req: Request) -> anyhow::Result<Response> {
    let auth_header = req
        .header("Authorization")
        .and_then(|h| h.as_str())
        .unwrap_or_default();

    if !auth_header.starts_with("Bearer ") {
        return Ok(ApiError::Unauthorized.into());
    }

    let token = auth_header.strip_prefix("Bearer ").unwrap();
    db.delete(&token_key(token))?;

    json_response(200, &serde_json::json!({ "message": "Logged out successfully" }))
}

/// Resolves the bearer token to a user id. The caller's identity is
/// resolved once here; handlers pass the id on to the service layer.
pub fn validate_token(db: &impl Database, req: &Request) -> Option<String> {
    let auth_header = req.header("Authorization")?.as_str().unwrap_or_default();
    if !auth_header.starts_with("Bearer ") {
        return None;
    }
    let token = auth_header.strip_prefix("Bearer ").unwrap();

    let data: TokenData = db.get_json(&token_key(token)).ok()??;

    // Check if token is expired
    if let Ok(created) = chrono::DateTime::parse_from_rfc3339(&data.created_at) {
        let now = chrono::Utc::now();
        let age_hours = (now - created.with_timezone(&chrono::Utc)).num_hours();
        if age_hours > token_expiration_hours() {
            return None;
        }
    }

    // Check if user still exists
    let user_exists = db
        .get_json::<crate::models::models::User>(&user_key(&data.user_id))
        .ok()?
        .is_some();
    if !user_exists {
        return None;
    }

    Some(data.user_id)
}
