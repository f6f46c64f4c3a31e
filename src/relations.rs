use spin_sdk::http::{Request, Response};

use crate::models::models::{Relation, RelationStatus, User};
use crate::core::db::Database;
use crate::core::errors::ApiError;
use crate::core::helpers::{json_response, validate_uuid};
use crate::auth::validate_token;
use crate::config::{relation_key, relations_key};
use crate::users::{build_user_json, require_user};

// === Relation store ===
//
// One record per ordered pair, plus a per-subject index of outgoing
// targets. A pending friend request is the edge owned by the recipient
// (see `Relation::pending_request`); everything below only speaks in
// terms of (subject, target) and leaves the request direction to the
// engine layer.

pub fn find_relation(
    db: &impl Database,
    subject_id: &str,
    target_id: &str,
) -> anyhow::Result<Option<Relation>> {
    db.get_json(&relation_key(subject_id, target_id))
}

fn save_relation(db: &impl Database, relation: &Relation) -> anyhow::Result<()> {
    db.set_json(&relation_key(&relation.subject_id, &relation.target_id), relation)?;

    let index_key = relations_key(&relation.subject_id);
    let mut targets: Vec<String> = db.get_json(&index_key)?.unwrap_or_default();
    if !targets.contains(&relation.target_id) {
        targets.push(relation.target_id.clone());
        db.set_json(&index_key, &targets)?;
    }

    Ok(())
}

/// Insert-or-reset the edge to Pending. An Accepted edge is never
/// demoted here; that conflict rule is the sole safeguard against a
/// send racing an accept on the same pair.
fn upsert_pending(db: &impl Database, recipient_id: &str, requester_id: &str) -> anyhow::Result<()> {
    match find_relation(db, recipient_id, requester_id)? {
        Some(existing) if existing.status == RelationStatus::Accepted => Ok(()),
        Some(mut existing) => {
            existing.status = RelationStatus::Pending;
            save_relation(db, &existing)
        }
        None => save_relation(db, &Relation::pending_request(requester_id, recipient_id)),
    }
}

/// Insert-or-overwrite the edge as Accepted, unconditionally.
fn upsert_accepted(db: &impl Database, subject_id: &str, target_id: &str) -> anyhow::Result<()> {
    save_relation(
        db,
        &Relation {
            subject_id: subject_id.to_string(),
            target_id: target_id.to_string(),
            status: RelationStatus::Accepted,
        },
    )
}

/// Overwrites the status of an existing edge; an absent pair stays absent.
fn set_status(
    db: &impl Database,
    subject_id: &str,
    target_id: &str,
    status: RelationStatus,
) -> anyhow::Result<()> {
    if let Some(mut relation) = find_relation(db, subject_id, target_id)? {
        relation.status = status;
        save_relation(db, &relation)?;
    }
    Ok(())
}

fn delete_relation(db: &impl Database, subject_id: &str, target_id: &str) -> anyhow::Result<()> {
    db.delete(&relation_key(subject_id, target_id))?;

    let index_key = relations_key(subject_id);
    let mut targets: Vec<String> = db.get_json(&index_key)?.unwrap_or_default();
    targets.retain(|t| t != target_id);
    db.set_json(&index_key, &targets)?;

    Ok(())
}

fn outgoing_relations(db: &impl Database, subject_id: &str) -> anyhow::Result<Vec<Relation>> {
    let targets: Vec<String> = db.get_json(&relations_key(subject_id))?.unwrap_or_default();

    let mut relations = Vec::new();
    for target_id in targets {
        if let Some(relation) = find_relation(db, subject_id, &target_id)? {
            relations.push(relation);
        }
    }
    relations.sort_by(|a, b| a.target_id.cmp(&b.target_id));

    Ok(relations)
}

// === Set queries ===
//
// All id lists come back ordered ascending so callers see a stable
// ordering regardless of insertion history.

/// Users that are friends with `user_id`: the edge exists Accepted in
/// both directions.
pub fn friend_ids(db: &impl Database, user_id: &str) -> anyhow::Result<Vec<String>> {
    let mut ids = Vec::new();
    for relation in outgoing_relations(db, user_id)? {
        if relation.status != RelationStatus::Accepted {
            continue;
        }
        let reciprocal = find_relation(db, &relation.target_id, user_id)?;
        if matches!(reciprocal, Some(r) if r.status == RelationStatus::Accepted) {
            ids.push(relation.target_id);
        }
    }
    Ok(ids)
}

/// Users with an open friend request addressed to `user_id`. Pending
/// requests are edges owned by the recipient, so these are the Pending
/// targets of the recipient's own outgoing set.
pub fn friend_request_ids(db: &impl Database, user_id: &str) -> anyhow::Result<Vec<String>> {
    Ok(outgoing_relations(db, user_id)?
        .into_iter()
        .filter(|r| r.status == RelationStatus::Pending)
        .map(|r| r.target_id)
        .collect())
}

/// Users that `user_id` subscribes to: every outgoing edge regardless
/// of status.
pub fn subscription_ids(db: &impl Database, user_id: &str) -> anyhow::Result<Vec<String>> {
    Ok(outgoing_relations(db, user_id)?
        .into_iter()
        .map(|r| r.target_id)
        .collect())
}

pub fn are_friends(db: &impl Database, user_id: &str, friend_id: &str) -> anyhow::Result<bool> {
    let forward = find_relation(db, user_id, friend_id)?;
    let reverse = find_relation(db, friend_id, user_id)?;

    Ok(matches!(forward, Some(r) if r.status == RelationStatus::Accepted)
        && matches!(reverse, Some(r) if r.status == RelationStatus::Accepted))
}

// === Engine ===
//
// State machine per ordered pair: none -> Pending -> Accepted | Rejected,
// and back to Pending via a new request. Both user ids are resolved
// before any write, so a missing user can never leave a half-applied
// transition behind.

pub fn send_friend_request(
    db: &impl Database,
    user_id: &str,
    friend_id: &str,
) -> Result<(), ApiError> {
    require_user(db, user_id)?;
    require_user(db, friend_id)?;

    if are_friends(db, user_id, friend_id)? {
        return Err(ApiError::Conflict(format!(
            "User with id = {} and user with id = {} are already friends",
            user_id, friend_id
        )));
    }

    upsert_pending(db, friend_id, user_id)?;

    Ok(())
}

pub fn accept_friend_request(
    db: &impl Database,
    user_id: &str,
    friend_id: &str,
) -> Result<(), ApiError> {
    check_friend_request(db, user_id, friend_id)?;

    upsert_accepted(db, user_id, friend_id)?;
    upsert_accepted(db, friend_id, user_id)?;

    Ok(())
}

pub fn reject_friend_request(
    db: &impl Database,
    user_id: &str,
    friend_id: &str,
) -> Result<(), ApiError> {
    check_friend_request(db, user_id, friend_id)?;

    set_status(db, user_id, friend_id, RelationStatus::Rejected)?;

    Ok(())
}

/// Removing a friend is asymmetric: the forward edge is deleted, while
/// the reverse edge is demoted to Rejected so the removed user stays a
/// subscriber of the remover.
pub fn remove_friend(db: &impl Database, user_id: &str, friend_id: &str) -> Result<(), ApiError> {
    require_user(db, user_id)?;
    require_user(db, friend_id)?;

    if !are_friends(db, user_id, friend_id)? {
        return Err(ApiError::Conflict(format!(
            "User with id = {} and user with id = {} are not friends",
            user_id, friend_id
        )));
    }

    delete_relation(db, user_id, friend_id)?;
    set_status(db, friend_id, user_id, RelationStatus::Rejected)?;

    Ok(())
}

/// A request from `friend_id` to `user_id` must be open before it can
/// be accepted or rejected.
fn check_friend_request(
    db: &impl Database,
    user_id: &str,
    friend_id: &str,
) -> Result<(), ApiError> {
    require_user(db, user_id)?;
    require_user(db, friend_id)?;

    let inbound = find_relation(db, user_id, friend_id)?;
    if !matches!(inbound, Some(r) if r.status == RelationStatus::Pending) {
        return Err(ApiError::NotFound(format!(
            "Friend request from user with id = {} to user with id = {} does not exist",
            friend_id, user_id
        )));
    }

    Ok(())
}

// === Query projections ===

pub fn find_friends(db: &impl Database, user_id: &str) -> Result<Vec<User>, ApiError> {
    require_user(db, user_id)?;
    load_users(db, friend_ids(db, user_id)?)
}

pub fn find_friend_requests(db: &impl Database, user_id: &str) -> Result<Vec<User>, ApiError> {
    require_user(db, user_id)?;
    load_users(db, friend_request_ids(db, user_id)?)
}

pub fn find_subscriptions(db: &impl Database, user_id: &str) -> Result<Vec<User>, ApiError> {
    require_user(db, user_id)?;
    load_users(db, subscription_ids(db, user_id)?)
}

fn load_users(db: &impl Database, ids: Vec<String>) -> Result<Vec<User>, ApiError> {
    let mut users = Vec::new();
    for id in ids {
        if let Some(user) = crate::users::find_user(db, &id)? {
            users.push(user);
        }
    }
    Ok(users)
}

// === HTTP Handlers ===

fn friend_id_from_body(req: &Request) -> Result<String, ApiError> {
    let value: serde_json::Value = serde_json::from_slice(req.body())
        .map_err(|_| ApiError::BadRequest("Invalid JSON body".to_string()))?;

    let friend_id = value["friend_id"].as_str().unwrap_or_default();
    if friend_id.is_empty() || !validate_uuid(friend_id) {
        return Err(ApiError::BadRequest("friend_id required".to_string()));
    }

    Ok(friend_id.to_string())
}

pub fn handle_send_request(db: &impl Database, req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(db, &req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let friend_id = match friend_id_from_body(&req) {
        Ok(id) => id,
        Err(e) => return Ok(e.into()),
    };
    if friend_id == user_id {
        return Ok(ApiError::BadRequest("Cannot send a friend request to yourself".to_string()).into());
    }

    match send_friend_request(db, &user_id, &friend_id) {
        Ok(()) => json_response(
            200,
            &serde_json::json!({
                "message": format!(
                    "Friend request from user with id = {} to user with id = {} has been sent",
                    user_id, friend_id
                )
            }),
        ),
        Err(e) => Ok(e.into()),
    }
}

pub fn handle_accept_request(db: &impl Database, req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(db, &req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let friend_id = match friend_id_from_body(&req) {
        Ok(id) => id,
        Err(e) => return Ok(e.into()),
    };

    match accept_friend_request(db, &user_id, &friend_id) {
        Ok(()) => json_response(
            200,
            &serde_json::json!({
                "message": format!(
                    "Friend request from user with id = {} to user with id = {} has been accepted",
                    friend_id, user_id
                )
            }),
        ),
        Err(e) => Ok(e.into()),
    }
}

pub fn handle_reject_request(db: &impl Database, req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(db, &req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let friend_id = match friend_id_from_body(&req) {
        Ok(id) => id,
        Err(e) => return Ok(e.into()),
    };

    match reject_friend_request(db, &user_id, &friend_id) {
        Ok(()) => json_response(
            200,
            &serde_json::json!({
                "message": format!(
                    "Friend request from user with id = {} to user with id = {} has been rejected",
                    friend_id, user_id
                )
            }),
        ),
        Err(e) => Ok(e.into()),
    }
}

pub fn handle_remove_friend(db: &impl Database, req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(db, &req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let friend_id = match friend_id_from_body(&req) {
        Ok(id) => id,
        Err(e) => return Ok(e.into()),
    };

    match remove_friend(db, &user_id, &friend_id) {
        Ok(()) => json_response(
            200,
            &serde_json::json!({
                "message": format!(
                    "User with id = {} and user with id = {} are no longer friends",
                    user_id, friend_id
                )
            }),
        ),
        Err(e) => Ok(e.into()),
    }
}

fn user_list_response(users: Vec<User>) -> anyhow::Result<Response> {
    let body: Vec<serde_json::Value> = users.iter().map(build_user_json).collect();
    json_response(200, &body)
}

pub fn list_friends(db: &impl Database, req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(db, &req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    match find_friends(db, &user_id) {
        Ok(users) => user_list_response(users),
        Err(e) => Ok(e.into()),
    }
}

pub fn list_friend_requests(db: &impl Database, req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(db, &req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    match find_friend_requests(db, &user_id) {
        Ok(users) => user_list_response(users),
        Err(e) => Ok(e.into()),
    }
}

pub fn list_subscriptions(db: &impl Database, req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(db, &req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    match find_subscriptions(db, &user_id) {
        Ok(users) => user_list_response(users),
        Err(e) => Ok(e.into()),
    }
}
