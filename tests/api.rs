mod common;

use spin_sdk::http::{Method, Request, Response};

use circles::core::db::MemoryDatabase;
use circles::relations::{accept_friend_request, send_friend_request};
use circles::route;

use common::{database, post_at, register};

fn request(method: Method, uri: &str, token: Option<&str>, body: Vec<u8>) -> Request {
    let mut builder = Request::builder();
    let method_set = builder.method(method);
    let uri_set = method_set.uri(uri);

    let mut with_headers = uri_set;
    let auth;
    if let Some(t) = token {
        auth = format!("Bearer {}", t);
        with_headers = with_headers.header("Authorization", auth.as_str());
    }

    with_headers.body(body).build()
}

fn json_request(method: Method, uri: &str, token: Option<&str>, body: serde_json::Value) -> Request {
    request(method, uri, token, serde_json::to_vec(&body).unwrap())
}

fn json_body(resp: &Response) -> serde_json::Value {
    serde_json::from_slice(resp.body()).expect("response body should be JSON")
}

/// Registers over HTTP and logs in, returning (user_id, token).
fn signup(db: &MemoryDatabase, name: &str) -> (String, String) {
    let resp = route(
        db,
        json_request(
            Method::Post,
            "/users",
            None,
            serde_json::json!({
                "name": name,
                "email": format!("{}@example.com", name),
                "password": "secret",
                "confirm_password": "secret",
            }),
        ),
    )
    .unwrap();
    assert_eq!(*resp.status(), 201);
    let user_id = json_body(&resp)["id"].as_str().unwrap().to_string();

    let resp = route(
        db,
        json_request(
            Method::Post,
            "/login",
            None,
            serde_json::json!({
                "email": format!("{}@example.com", name),
                "password": "secret",
            }),
        ),
    )
    .unwrap();
    assert_eq!(*resp.status(), 200);
    let token = json_body(&resp)["token"].as_str().unwrap().to_string();

    (user_id, token)
}

#[test]
fn registration_login_and_profile() {
    let db = database();
    let (user_id, token) = signup(&db, "mira");

    let resp = route(&db, request(Method::Get, "/profile", Some(&token), Vec::new())).unwrap();
    assert_eq!(*resp.status(), 200);
    let profile = json_body(&resp);
    assert_eq!(profile["id"], user_id.as_str());
    assert_eq!(profile["email"], "mira@example.com");
    assert!(profile.get("password").is_none());

    let resp = route(&db, request(Method::Get, "/profile", None, Vec::new())).unwrap();
    assert_eq!(*resp.status(), 401);
}

#[test]
fn registration_rejects_bad_input() {
    let db = database();

    let resp = route(
        &db,
        json_request(
            Method::Post,
            "/users",
            None,
            serde_json::json!({
                "name": "mira",
                "email": "mira@example.com",
                "password": "secret",
                "confirm_password": "different",
            }),
        ),
    )
    .unwrap();
    assert_eq!(*resp.status(), 400);

    let resp = route(
        &db,
        json_request(
            Method::Post,
            "/users",
            None,
            serde_json::json!({
                "name": "mira",
                "email": "not-an-email",
                "password": "secret",
                "confirm_password": "secret",
            }),
        ),
    )
    .unwrap();
    assert_eq!(*resp.status(), 400);

    signup(&db, "mira");
    let resp = route(
        &db,
        json_request(
            Method::Post,
            "/users",
            None,
            serde_json::json!({
                "name": "mira",
                "email": "other@example.com",
                "password": "secret",
                "confirm_password": "secret",
            }),
        ),
    )
    .unwrap();
    assert_eq!(*resp.status(), 409);
}

#[test]
fn login_with_bad_credentials_is_unauthorized() {
    let db = database();
    signup(&db, "mira");

    let resp = route(
        &db,
        json_request(
            Method::Post,
            "/login",
            None,
            serde_json::json!({ "email": "mira@example.com", "password": "wrong" }),
        ),
    )
    .unwrap();
    assert_eq!(*resp.status(), 401);
}

#[test]
fn friendship_flow_over_http() {
    let db = database();
    let (mira_id, mira_token) = signup(&db, "mira");
    let (jonas_id, jonas_token) = signup(&db, "jonas");

    let resp = route(
        &db,
        json_request(
            Method::Post,
            "/friends/requests",
            Some(&mira_token),
            serde_json::json!({ "friend_id": jonas_id }),
        ),
    )
    .unwrap();
    assert_eq!(*resp.status(), 200);

    let resp = route(
        &db,
        request(Method::Get, "/friends/requests", Some(&jonas_token), Vec::new()),
    )
    .unwrap();
    let requests = json_body(&resp);
    assert_eq!(requests.as_array().unwrap().len(), 1);
    assert_eq!(requests[0]["id"], mira_id.as_str());

    let resp = route(
        &db,
        json_request(
            Method::Post,
            "/friends/accept",
            Some(&jonas_token),
            serde_json::json!({ "friend_id": mira_id }),
        ),
    )
    .unwrap();
    assert_eq!(*resp.status(), 200);

    for token in [&mira_token, &jonas_token] {
        let resp = route(&db, request(Method::Get, "/friends", Some(token), Vec::new())).unwrap();
        assert_eq!(json_body(&resp).as_array().unwrap().len(), 1);
    }

    let resp = route(
        &db,
        json_request(
            Method::Post,
            "/friends/remove",
            Some(&mira_token),
            serde_json::json!({ "friend_id": jonas_id }),
        ),
    )
    .unwrap();
    assert_eq!(*resp.status(), 200);

    let resp = route(&db, request(Method::Get, "/friends", Some(&mira_token), Vec::new())).unwrap();
    assert!(json_body(&resp).as_array().unwrap().is_empty());

    // jonas was removed, but he keeps following mira.
    let resp = route(
        &db,
        request(Method::Get, "/subscriptions", Some(&jonas_token), Vec::new()),
    )
    .unwrap();
    let subs = json_body(&resp);
    assert_eq!(subs.as_array().unwrap().len(), 1);
    assert_eq!(subs[0]["id"], mira_id.as_str());
}

#[test]
fn feed_pagination_over_http() {
    let db = database();
    let (reader_id, reader_token) = signup(&db, "reader");
    let ada = register(&db, "ada");
    let ben = register(&db, "ben");

    send_friend_request(&db, &ada.id, &reader_id).unwrap();
    send_friend_request(&db, &ben.id, &reader_id).unwrap();

    let newest = post_at(&db, &ada.id, "newest", "2024-03-05T10:00:00+00:00");
    let older = post_at(&db, &ben.id, "older", "2024-03-04T10:00:00+00:00");

    let resp = route(
        &db,
        request(
            Method::Get,
            "/feed?items_per_page=1&page=1",
            Some(&reader_token),
            Vec::new(),
        ),
    )
    .unwrap();
    let page_one = json_body(&resp);
    assert_eq!(page_one.as_array().unwrap().len(), 1);
    assert_eq!(page_one[0]["id"], newest.id.as_str());

    let resp = route(
        &db,
        request(
            Method::Get,
            "/feed?items_per_page=1&page=2",
            Some(&reader_token),
            Vec::new(),
        ),
    )
    .unwrap();
    let page_two = json_body(&resp);
    assert_eq!(page_two[0]["id"], older.id.as_str());

    // No parameters: the whole merged feed.
    let resp = route(&db, request(Method::Get, "/feed", Some(&reader_token), Vec::new())).unwrap();
    assert_eq!(json_body(&resp).as_array().unwrap().len(), 2);
}

#[test]
fn post_lifecycle_over_http() {
    let db = database();
    let (_mira_id, mira_token) = signup(&db, "mira");
    let (_jonas_id, jonas_token) = signup(&db, "jonas");

    let resp = route(
        &db,
        json_request(
            Method::Post,
            "/posts",
            Some(&mira_token),
            serde_json::json!({
                "header": "Greetings",
                "content": "hello <script>alert(1)</script>world",
            }),
        ),
    )
    .unwrap();
    assert_eq!(*resp.status(), 201);
    let post = json_body(&resp);
    let post_id = post["id"].as_str().unwrap().to_string();
    assert!(!post["content"].as_str().unwrap().contains("<script>"));

    // Only the owner can edit.
    let resp = route(
        &db,
        json_request(
            Method::Put,
            &format!("/posts/{}", post_id),
            Some(&jonas_token),
            serde_json::json!({ "header": "Taken over", "content": "mine now" }),
        ),
    )
    .unwrap();
    assert_eq!(*resp.status(), 403);

    let resp = route(
        &db,
        json_request(
            Method::Put,
            &format!("/posts/{}", post_id),
            Some(&mira_token),
            serde_json::json!({ "header": "Greetings again", "content": "edited" }),
        ),
    )
    .unwrap();
    assert_eq!(*resp.status(), 200);
    assert_eq!(json_body(&resp)["header"], "Greetings again");

    // Deletion is by id only; any authenticated caller may do it.
    let resp = route(
        &db,
        request(
            Method::Delete,
            &format!("/posts/{}", post_id),
            Some(&jonas_token),
            Vec::new(),
        ),
    )
    .unwrap();
    assert_eq!(*resp.status(), 204);

    let resp = route(
        &db,
        request(Method::Get, &format!("/posts/{}", post_id), Some(&mira_token), Vec::new()),
    )
    .unwrap();
    assert_eq!(*resp.status(), 404);
}

#[test]
fn messaging_requires_friendship() {
    let db = database();
    let (mira_id, mira_token) = signup(&db, "mira");
    let (jonas_id, _jonas_token) = signup(&db, "jonas");

    let resp = route(
        &db,
        json_request(
            Method::Post,
            "/messages",
            Some(&mira_token),
            serde_json::json!({ "friend_id": jonas_id, "message": "hi!" }),
        ),
    )
    .unwrap();
    assert_eq!(*resp.status(), 409);

    send_friend_request(&db, &mira_id, &jonas_id).unwrap();
    accept_friend_request(&db, &jonas_id, &mira_id).unwrap();

    let resp = route(
        &db,
        json_request(
            Method::Post,
            "/messages",
            Some(&mira_token),
            serde_json::json!({ "friend_id": jonas_id, "message": "hi!" }),
        ),
    )
    .unwrap();
    assert_eq!(*resp.status(), 201);

    let resp = route(
        &db,
        request(
            Method::Get,
            &format!("/messages?friend_id={}", jonas_id),
            Some(&mira_token),
            Vec::new(),
        ),
    )
    .unwrap();
    let history = json_body(&resp);
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["message"], "hi!");
}

#[test]
fn image_upload_and_download() {
    let db = database();
    let (_mira_id, mira_token) = signup(&db, "mira");

    let resp = route(
        &db,
        json_request(
            Method::Post,
            "/posts",
            Some(&mira_token),
            serde_json::json!({ "header": "With image", "content": "look at this" }),
        ),
    )
    .unwrap();
    let post_id = json_body(&resp)["id"].as_str().unwrap().to_string();

    let resp = route(
        &db,
        request(
            Method::Post,
            &format!("/posts/{}/images?name=photo.png", post_id),
            Some(&mira_token),
            b"not-a-real-png".to_vec(),
        ),
    )
    .unwrap();
    assert_eq!(*resp.status(), 201);
    let image_id = json_body(&resp)["id"].as_str().unwrap().to_string();

    let resp = route(
        &db,
        request(Method::Get, &format!("/images/{}", image_id), None, Vec::new()),
    )
    .unwrap();
    assert_eq!(*resp.status(), 200);
    assert_eq!(resp.body(), b"not-a-real-png");

    let resp = route(
        &db,
        request(Method::Get, &format!("/posts/{}", post_id), Some(&mira_token), Vec::new()),
    )
    .unwrap();
    let rendered = json_body(&resp);
    assert_eq!(rendered["images"][0], image_id.as_str());
}

#[test]
fn root_serves_the_landing_page() {
    let db = database();

    let resp = route(&db, request(Method::Get, "/", None, Vec::new())).unwrap();
    assert_eq!(*resp.status(), 200);
    assert!(!resp.body().is_empty());
}
