use spin_sdk::http::{Request, Response};
use uuid::Uuid;

use crate::models::models::Message;
use crate::core::db::Database;
use crate::core::errors::ApiError;
use crate::core::helpers::{json_response, now_iso, sanitize_plain_text, validate_uuid};
use crate::core::query_params::{get_string, parse_query_params};
use crate::auth::validate_token;
use crate::config::{chat_key, message_key, MAX_MESSAGE_LENGTH};
use crate::relations::are_friends;
use crate::users::require_user;

/// Messaging is reserved for friends; the check runs against the
/// current state of the graph, not the state at send time of earlier
/// messages.
pub fn send_message(
    db: &impl Database,
    from_user_id: &str,
    to_user_id: &str,
    text: &str,
) -> Result<Message, ApiError> {
    require_user(db, from_user_id)?;
    require_user(db, to_user_id)?;

    if !are_friends(db, from_user_id, to_user_id)? {
        return Err(ApiError::Conflict(format!(
            "Users with ids {} and {} are not friends. Chatting is prohibited",
            from_user_id, to_user_id
        )));
    }

    let text = sanitize_plain_text(text);
    if text.is_empty() || text.len() > MAX_MESSAGE_LENGTH {
        return Err(ApiError::BadRequest("Invalid message".to_string()));
    }

    let message = Message {
        id: Uuid::new_v4().to_string(),
        from_user_id: from_user_id.to_string(),
        to_user_id: to_user_id.to_string(),
        message: text,
        created_at: now_iso(),
    };

    db.set_json(&message_key(&message.id), &message)?;

    let index_key = chat_key(from_user_id, to_user_id);
    let mut ids: Vec<String> = db.get_json(&index_key)?.unwrap_or_default();
    ids.push(message.id.clone());
    db.set_json(&index_key, &ids)?;

    Ok(message)
}

/// Full history between two users in both directions, oldest first.
pub fn messages_between(
    db: &impl Database,
    user_one_id: &str,
    user_two_id: &str,
) -> anyhow::Result<Vec<Message>> {
    let ids: Vec<String> = db
        .get_json(&chat_key(user_one_id, user_two_id))?
        .unwrap_or_default();

    let mut messages = Vec::new();
    for id in ids {
        if let Some(message) = db.get_json::<Message>(&message_key(&id))? {
            messages.push(message);
        }
    }
    messages.sort_by(|a, b| (&a.created_at, &a.id).cmp(&(&b.created_at, &b.id)));

    Ok(messages)
}

// === HTTP Handlers ===

pub fn handle_send_message(db: &impl Database, req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(db, &req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let value: serde_json::Value = match serde_json::from_slice(req.body()) {
        Ok(v) => v,
        Err(_) => return Ok(ApiError::BadRequest("Invalid JSON body".to_string()).into()),
    };
    let friend_id = value["friend_id"].as_str().unwrap_or_default();
    let text = value["message"].as_str().unwrap_or_default();

    if friend_id.is_empty() || !validate_uuid(friend_id) {
        return Ok(ApiError::BadRequest("friend_id required".to_string()).into());
    }

    match send_message(db, &user_id, friend_id, text) {
        Ok(message) => json_response(201, &message),
        Err(e) => Ok(e.into()),
    }
}

pub fn list_messages(db: &impl Database, req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(db, &req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let params = parse_query_params(req.uri());
    let friend_id = get_string(&params, "friend_id", None).unwrap_or_default();

    if friend_id.is_empty() || !validate_uuid(&friend_id) {
        return Ok(ApiError::BadRequest("friend_id required".to_string()).into());
    }

    match require_user(db, &friend_id) {
        Ok(_) => {}
        Err(e) => return Ok(e.into()),
    }

    let messages = messages_between(db, &user_id, &friend_id)?;
    json_response(200, &messages)
}
