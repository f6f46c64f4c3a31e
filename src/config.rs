pub const MIN_NAME_LENGTH: usize = 3;
pub const MAX_NAME_LENGTH: usize = 50;
pub const MIN_PASSWORD_LENGTH: usize = 3;
pub const MAX_HEADER_LENGTH: usize = 200;
pub const MAX_POST_LENGTH: usize = 5000;
pub const MAX_MESSAGE_LENGTH: usize = 2000;

pub const POSTS_PER_PAGE: usize = 20;
pub const FEED_ITEMS_PER_PAGE_DEFAULT: i64 = 10;

pub const USERS_LIST_KEY: &str = "users_list";

pub fn token_expiration_hours() -> i64 {
    std::env::var("CIRCLES_TOKEN_EXPIRATION_HOURS")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(24)
}

// === Key layout ===

pub fn user_key(id: &str) -> String {
    format!("user:{}", id)
}

pub fn token_key(token: &str) -> String {
    format!("token:{}", token)
}

pub fn relation_key(subject_id: &str, target_id: &str) -> String {
    format!("relation:{}:{}", subject_id, target_id)
}

/// Index of outgoing relation targets for one subject.
pub fn relations_key(subject_id: &str) -> String {
    format!("relations:{}", subject_id)
}

pub fn post_key(id: &str) -> String {
    format!("post:{}", id)
}

/// Index of post ids owned by one user, oldest first.
pub fn user_posts_key(user_id: &str) -> String {
    format!("user_posts:{}", user_id)
}

pub fn image_key(id: &str) -> String {
    format!("image:{}", id)
}

pub fn image_bytes_key(id: &str) -> String {
    format!("image_bytes:{}", id)
}

pub fn post_images_key(post_id: &str) -> String {
    format!("post_images:{}", post_id)
}

pub fn message_key(id: &str) -> String {
    format!("message:{}", id)
}

/// Chat index shared by both directions of a conversation.
pub fn chat_key(user_one_id: &str, user_two_id: &str) -> String {
    if user_one_id <= user_two_id {
        format!("chat:{}:{}", user_one_id, user_two_id)
    } else {
        format!("chat:{}:{}", user_two_id, user_one_id)
    }
}
