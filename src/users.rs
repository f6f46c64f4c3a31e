use spin_sdk::http::{Request, Response};
use uuid::Uuid;
use regex::Regex;
use std::sync::OnceLock;

use crate::models::models::User;
use crate::core::db::Database;
use crate::core::errors::ApiError;
use crate::core::helpers::{hash_password, json_response, sanitize_plain_text, validate_uuid};
use crate::auth::validate_token;
use crate::config::*;

fn email_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Regex should compile")
    })
}

/// Public projection of a user record. The password hash never leaves
/// the storage layer.
pub fn build_user_json(user: &User) -> serde_json::Value {
    serde_json::json!({
        "id": user.id,
        "name": user.name,
        "email": user.email,
    })
}

// === Lookups ===

pub fn all_user_ids(db: &impl Database) -> anyhow::Result<Vec<String>> {
    Ok(db.get_json(USERS_LIST_KEY)?.unwrap_or_default())
}

pub fn find_user(db: &impl Database, id: &str) -> anyhow::Result<Option<User>> {
    db.get_json(&user_key(id))
}

pub fn find_user_by_name(db: &impl Database, name: &str) -> anyhow::Result<Option<User>> {
    for id in all_user_ids(db)? {
        if let Some(u) = find_user(db, &id)? {
            if u.name == name {
                return Ok(Some(u));
            }
        }
    }
    Ok(None)
}

pub fn find_user_by_email(db: &impl Database, email: &str) -> anyhow::Result<Option<User>> {
    for id in all_user_ids(db)? {
        if let Some(u) = find_user(db, &id)? {
            if u.email == email {
                return Ok(Some(u));
            }
        }
    }
    Ok(None)
}

/// Resolves a user id or fails with the categorized not-found error.
/// Every relationship operation calls this before touching any state.
pub fn require_user(db: &impl Database, id: &str) -> Result<User, ApiError> {
    find_user(db, id)?
        .ok_or_else(|| ApiError::NotFound(format!("There is no user with id = {}", id)))
}

// === Registration ===

pub fn register_user(
    db: &impl Database,
    name: &str,
    email: &str,
    password: &str,
) -> Result<User, ApiError> {
    let name = sanitize_plain_text(name);

    if name.len() < MIN_NAME_LENGTH || name.len() > MAX_NAME_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Name must be {}-{} characters",
            MIN_NAME_LENGTH, MAX_NAME_LENGTH
        )));
    }
    if !email_regex().is_match(email) {
        return Err(ApiError::BadRequest("Email address is not valid".to_string()));
    }
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    if find_user_by_name(db, &name)?.is_some() {
        return Err(ApiError::Conflict(format!("User with name {} already exists", name)));
    }
    if find_user_by_email(db, email)?.is_some() {
        return Err(ApiError::Conflict(format!("User with email {} already exists", email)));
    }

    let user = User {
        id: Uuid::new_v4().to_string(),
        name,
        email: email.to_string(),
        password: hash_password(password)?,
    };

    db.set_json(&user_key(&user.id), &user)?;

    let mut users = all_user_ids(db)?;
    users.push(user.id.clone());
    db.set_json(USERS_LIST_KEY, &users)?;

    Ok(user)
}

// === HTTP Handlers ===

pub fn create_user(db: &impl Database, req: Request) -> anyhow::Result<Response> {
    let value: serde_json::Value = match serde_json::from_slice(req.body()) {
        Ok(v) => v,
        Err(_) => return Ok(ApiError::BadRequest("Invalid JSON body".to_string()).into()),
    };

    let name = value["name"].as_str().unwrap_or_default();
    let email = value["email"].as_str().unwrap_or_default();
    let password = value["password"].as_str().unwrap_or_default();
    let confirm_password = value["confirm_password"].as_str().unwrap_or_default();

    if name.is_empty() {
        return Ok(ApiError::BadRequest("Name is required".to_string()).into());
    }
    if email.is_empty() {
        return Ok(ApiError::BadRequest("Email is required".to_string()).into());
    }
    if password.is_empty() {
        return Ok(ApiError::BadRequest("Password is required".to_string()).into());
    }
    if password != confirm_password {
        return Ok(ApiError::BadRequest("Entered passwords are different".to_string()).into());
    }

    match register_user(db, name, email, password) {
        Ok(user) => json_response(201, &build_user_json(&user)),
        Err(e) => Ok(e.into()),
    }
}

pub fn list_users(db: &impl Database, _req: Request) -> anyhow::Result<Response> {
    let mut users = Vec::new();
    for id in all_user_ids(db)? {
        if let Some(u) = find_user(db, &id)? {
            users.push(u);
        }
    }
    users.sort_by(|a, b| a.id.cmp(&b.id));

    let body: Vec<serde_json::Value> = users.iter().map(build_user_json).collect();
    json_response(200, &body)
}

pub fn get_user_details(db: &impl Database, path: &str) -> anyhow::Result<Response> {
    let user_id = path.trim_start_matches("/users/");

    if user_id.is_empty() || !validate_uuid(user_id) {
        return Ok(ApiError::BadRequest("User ID required".to_string()).into());
    }

    match require_user(db, user_id) {
        Ok(user) => json_response(200, &build_user_json(&user)),
        Err(e) => Ok(e.into()),
    }
}

pub fn get_profile(db: &impl Database, req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(db, &req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    match require_user(db, &user_id) {
        Ok(user) => json_response(200, &build_user_json(&user)),
        Err(e) => Ok(e.into()),
    }
}
