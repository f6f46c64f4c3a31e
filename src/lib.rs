use spin_sdk::http::{Request, Response};
#[cfg(target_arch = "wasm32")]
use spin_sdk::{http::IntoResponse, http_component};

pub mod auth;
pub mod config;
pub mod core;
pub mod feed;
pub mod images;
pub mod messages;
pub mod models;
pub mod posts;
pub mod relations;
pub mod users;

use crate::core::db::Database;
#[cfg(target_arch = "wasm32")]
use crate::core::db::init_demo_data;

// === Component entrypoint ===
#[cfg(target_arch = "wasm32")]
#[http_component]
fn handle(req: Request) -> anyhow::Result<impl IntoResponse> {
    let db = crate::core::helpers::store();
    let _ = init_demo_data(&db); // Seed demo fixture on first request

    route(&db, req)
}

/// Single route table shared by the Spin component and the native dev
/// server.
pub fn route(db: &impl Database, req: Request) -> anyhow::Result<Response> {
    let path = req.path().to_string();
    let method = req.method().to_string();

    match (method.as_str(), path.as_str()) {
        ("POST", "/users") => users::create_user(db, req),
        ("GET", "/users") => users::list_users(db, req),
        ("POST", "/login") => auth::login_user(db, req),
        ("POST", "/logout") => auth::logout_user(db, req),
        ("GET", "/profile") => users::get_profile(db, req),
        ("GET", "/friends") => relations::list_friends(db, req),
        ("GET", "/friends/requests") => relations::list_friend_requests(db, req),
        ("POST", "/friends/requests") => relations::handle_send_request(db, req),
        ("POST", "/friends/accept") => relations::handle_accept_request(db, req),
        ("POST", "/friends/reject") => relations::handle_reject_request(db, req),
        ("POST", "/friends/remove") => relations::handle_remove_friend(db, req),
        ("GET", "/subscriptions") => relations::list_subscriptions(db, req),
        ("POST", "/posts") => posts::create_post(db, req),
        ("GET", "/posts") => posts::list_posts(db, req),
        ("GET", "/feed") => feed::get_feed(db, req),
        ("POST", "/messages") => messages::handle_send_message(db, req),
        ("GET", "/messages") => messages::list_messages(db, req),
        ("POST", p) if p.starts_with("/posts/") && p.ends_with("/images") => {
            images::upload_image(db, req)
        }
        ("GET", p) if p.starts_with("/images/") => images::download_image(db, req),
        ("PUT", p) if p.starts_with("/posts/") => posts::edit_post(db, req),
        ("DELETE", p) if p.starts_with("/posts/") => posts::delete_post(db, req),
        ("GET", p) if p.starts_with("/posts/") => posts::get_post(db, req),
        ("GET", p) if p.starts_with("/users/") && p.len() > 7 => users::get_user_details(db, p),
        ("GET", p) => crate::core::static_server::serve_static(p),
        _ => Ok(Response::builder().status(404).body("Not found").build()),
    }
}
