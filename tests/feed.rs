mod common;

use circles::feed::{latest_posts_of_subscriptions, latest_posts_page};
use circles::relations::{accept_friend_request, remove_friend, send_friend_request};
use circles::{images, posts};

use common::{database, post_at, register};

#[test]
fn feed_carries_one_latest_post_per_subscription() {
    let db = database();
    let reader = register(&db, "reader");
    let ada = register(&db, "ada");
    let ben = register(&db, "ben");

    // Sending the reader a request is what creates the reader's
    // outgoing subscription edge.
    send_friend_request(&db, &ada.id, &reader.id).unwrap();
    send_friend_request(&db, &ben.id, &reader.id).unwrap();

    post_at(&db, &ada.id, "ada old", "2024-03-01T10:00:00+00:00");
    let ada_new = post_at(&db, &ada.id, "ada new", "2024-03-03T10:00:00+00:00");
    let ben_only = post_at(&db, &ben.id, "ben", "2024-03-02T10:00:00+00:00");

    let feed = latest_posts_of_subscriptions(&db, &reader.id).unwrap();
    let ids: Vec<String> = feed.iter().map(|p| p.id.clone()).collect();

    // One post per target, newest first across targets.
    assert_eq!(ids, vec![ada_new.id.clone(), ben_only.id.clone()]);
}

#[test]
fn feed_pagination_windows_the_merged_ordering() {
    let db = database();
    let reader = register(&db, "reader");
    let ada = register(&db, "ada");
    let ben = register(&db, "ben");

    send_friend_request(&db, &ada.id, &reader.id).unwrap();
    send_friend_request(&db, &ben.id, &reader.id).unwrap();

    let newest = post_at(&db, &ada.id, "newest", "2024-03-05T10:00:00+00:00");
    let older = post_at(&db, &ben.id, "older", "2024-03-04T10:00:00+00:00");

    let page_one = latest_posts_page(&db, &reader.id, 1, 1).unwrap();
    assert_eq!(page_one.len(), 1);
    assert_eq!(page_one[0].id, newest.id);

    let page_two = latest_posts_page(&db, &reader.id, 1, 2).unwrap();
    assert_eq!(page_two.len(), 1);
    assert_eq!(page_two[0].id, older.id);

    let page_three = latest_posts_page(&db, &reader.id, 1, 3).unwrap();
    assert!(page_three.is_empty());
}

#[test]
fn feed_pagination_coerces_out_of_range_arguments() {
    let db = database();
    let reader = register(&db, "reader");
    let ada = register(&db, "ada");

    send_friend_request(&db, &ada.id, &reader.id).unwrap();
    let post = post_at(&db, &ada.id, "only", "2024-03-01T10:00:00+00:00");

    // items_per_page <= 0 falls back to the default page size.
    let defaulted = latest_posts_page(&db, &reader.id, 0, 1).unwrap();
    assert_eq!(defaulted.len(), 1);
    assert_eq!(defaulted[0].id, post.id);

    // page <= 0 is read as the first page.
    let first = latest_posts_page(&db, &reader.id, 5, 0).unwrap();
    assert_eq!(first.len(), 1);
    let first_again = latest_posts_page(&db, &reader.id, 5, -3).unwrap();
    assert_eq!(first_again.len(), 1);
}

#[test]
fn subscriptions_count_regardless_of_status() {
    let db = database();
    let reader = register(&db, "reader");
    let ada = register(&db, "ada");

    // Still pending: the post already shows up.
    send_friend_request(&db, &ada.id, &reader.id).unwrap();
    let post = post_at(&db, &ada.id, "hello", "2024-03-01T10:00:00+00:00");

    let feed = latest_posts_of_subscriptions(&db, &reader.id).unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].id, post.id);

    // Rejected: the edge survives, so the feed does too.
    circles::relations::reject_friend_request(&db, &reader.id, &ada.id).unwrap();
    let feed = latest_posts_of_subscriptions(&db, &reader.id).unwrap();
    assert_eq!(feed.len(), 1);
}

#[test]
fn unfriending_splits_the_two_feeds() {
    let db = database();
    let ada = register(&db, "ada");
    let ben = register(&db, "ben");

    send_friend_request(&db, &ada.id, &ben.id).unwrap();
    accept_friend_request(&db, &ben.id, &ada.id).unwrap();

    post_at(&db, &ada.id, "from ada", "2024-03-01T10:00:00+00:00");
    post_at(&db, &ben.id, "from ben", "2024-03-01T11:00:00+00:00");

    assert_eq!(latest_posts_of_subscriptions(&db, &ada.id).unwrap().len(), 1);
    assert_eq!(latest_posts_of_subscriptions(&db, &ben.id).unwrap().len(), 1);

    // ben removes ada: his own edge toward her is deleted, while hers
    // toward him is demoted but kept.
    remove_friend(&db, &ben.id, &ada.id).unwrap();

    assert!(latest_posts_of_subscriptions(&db, &ben.id).unwrap().is_empty());
    assert_eq!(latest_posts_of_subscriptions(&db, &ada.id).unwrap().len(), 1);
}

#[test]
fn equal_timestamps_resolve_to_highest_post_id() {
    let db = database();
    let reader = register(&db, "reader");
    let ada = register(&db, "ada");

    send_friend_request(&db, &ada.id, &reader.id).unwrap();

    let first = post_at(&db, &ada.id, "first", "2024-03-01T10:00:00+00:00");
    let second = post_at(&db, &ada.id, "second", "2024-03-01T10:00:00+00:00");
    let winner = if first.id > second.id { &first } else { &second };

    let feed = latest_posts_of_subscriptions(&db, &reader.id).unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].id, winner.id);
}

#[test]
fn feed_posts_decorate_with_their_image_ids() {
    let db = database();
    let reader = register(&db, "reader");
    let ada = register(&db, "ada");

    send_friend_request(&db, &ada.id, &reader.id).unwrap();
    let post = post_at(&db, &ada.id, "with image", "2024-03-01T10:00:00+00:00");

    let image = images::save_image(&db, &ada.id, &post.id, "photo", "image/png", b"not-a-real-png")
        .unwrap();

    let feed = latest_posts_of_subscriptions(&db, &reader.id).unwrap();
    let rendered = posts::post_json(&db, &feed[0]).unwrap();

    let image_ids: Vec<String> = rendered["images"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert_eq!(image_ids, vec![image.id.clone()]);
}
