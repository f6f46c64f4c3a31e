use serde::{Serialize, Deserialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum RelationStatus {
    Pending,
    Accepted,
    Rejected,
}

/// One directed edge of the social graph: `subject_id` subscribes to
/// `target_id`. At most one relation exists per ordered pair.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Relation {
    pub subject_id: String,
    pub target_id: String,
    pub status: RelationStatus,
}

impl Relation {
    /// A pending friend request lives on the recipient's side of the
    /// graph: the recipient owns an outgoing edge pointing back at the
    /// requester. Accepting mirrors the edge; until then the requester
    /// has no edge of their own.
    pub fn pending_request(requester_id: &str, recipient_id: &str) -> Relation {
        Relation {
            subject_id: recipient_id.to_string(),
            target_id: requester_id.to_string(),
            status: RelationStatus::Pending,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub header: String,
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Image {
    pub id: String,
    pub post_id: String,
    pub name: String,
    pub content_type: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Message {
    pub id: String,
    pub from_user_id: String,
    pub to_user_id: String,
    pub message: String,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenData {
    pub user_id: String,
    pub created_at: String,
}
