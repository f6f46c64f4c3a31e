#![allow(dead_code)]

use circles::core::db::{Database, MemoryDatabase};
use circles::models::models::{Post, User};
use circles::{posts, users};

pub fn database() -> MemoryDatabase {
    MemoryDatabase::new()
}

pub fn register(db: &MemoryDatabase, name: &str) -> User {
    users::register_user(db, name, &format!("{}@example.com", name), "secret")
        .expect("registration should succeed")
}

/// Creates a post and rewrites its creation timestamp, so ordering
/// tests work with known instants instead of wall-clock ones.
pub fn post_at(db: &MemoryDatabase, user_id: &str, header: &str, created_at: &str) -> Post {
    let mut post = posts::save_post(db, user_id, header, "some content")
        .expect("post creation should succeed");
    post.created_at = created_at.to_string();
    db.set_json(&circles::config::post_key(&post.id), &post)
        .expect("post rewrite should succeed");
    post
}
