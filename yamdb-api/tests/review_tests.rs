//! Integration tests for reviews and comments: one review per author,
//! author/moderator edits and parent scoping

mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::{json, Value};
use yamdb_common::db::Role;

async fn post_review(app: &TestApp, title_id: i64, token: &str, score: i64) -> (StatusCode, Value) {
    app.send(
        "POST",
        &format!("/api/v1/titles/{}/reviews/", title_id),
        Some(token),
        Some(json!({ "text": "Worth a look", "score": score })),
    )
    .await
}

// =============================================================================
// Reviews
// =============================================================================

#[tokio::test]
async fn test_review_create_and_read() {
    let app = TestApp::new().await;
    let title = app.title("Solaris", 1972, None, vec![]).await;
    let critic = app.user("critic", Role::User).await;

    let (status, review) = post_review(&app, title, &critic, 8).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(review["author"], "critic");
    assert_eq!(review["score"], 8);
    assert!(review["pub_date"].is_string());

    let (status, list) = app
        .get(&format!("/api/v1/titles/{}/reviews/", title), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["count"], 1);
    assert_eq!(list["results"][0]["id"], review["id"]);
}

#[tokio::test]
async fn test_anonymous_cannot_review() {
    let app = TestApp::new().await;
    let title = app.title("Solaris", 1972, None, vec![]).await;

    let (status, _) = app
        .send(
            "POST",
            &format!("/api/v1/titles/{}/reviews/", title),
            None,
            Some(json!({ "text": "anon", "score": 5 })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_second_review_for_same_title_rejected() {
    let app = TestApp::new().await;
    let first = app.title("First", 2001, None, vec![]).await;
    let second = app.title("Second", 2002, None, vec![]).await;
    let critic = app.user("critic", Role::User).await;

    let (status, _) = post_review(&app, first, &critic, 5).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = post_review(&app, first, &critic, 6).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["non_field_errors"].is_array());

    let (status, _) = post_review(&app, second, &critic, 7).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_review_validation() {
    let app = TestApp::new().await;
    let title = app.title("Solaris", 1972, None, vec![]).await;
    let critic = app.user("critic", Role::User).await;

    let (status, body) = post_review(&app, title, &critic, 11).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["score"].is_array());

    let (status, body) = app
        .send(
            "POST",
            &format!("/api/v1/titles/{}/reviews/", title),
            Some(&critic),
            Some(json!({ "score": 5 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["text"][0], "This field is required.");
}

#[tokio::test]
async fn test_review_fields_may_not_be_null() {
    let app = TestApp::new().await;
    let title = app.title("Solaris", 1972, None, vec![]).await;
    let critic = app.user("critic", Role::User).await;

    let (_, review) = post_review(&app, title, &critic, 5).await;
    let uri = format!("/api/v1/titles/{}/reviews/{}/", title, review["id"]);

    let (status, body) = app
        .send("PATCH", &uri, Some(&critic), Some(json!({ "score": null })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["score"][0], "This field may not be null.");

    let (status, body) = app
        .send("PATCH", &uri, Some(&critic), Some(json!({ "text": null })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["text"][0], "This field may not be null.");

    let (_, read) = app.get(&uri, None).await;
    assert_eq!(read["score"], 5);

    let (_, comment) = app
        .send(
            "POST",
            &format!("{}comments/", uri),
            Some(&critic),
            Some(json!({ "text": "first" })),
        )
        .await;
    let (status, body) = app
        .send(
            "PATCH",
            &format!("{}comments/{}/", uri, comment["id"]),
            Some(&critic),
            Some(json!({ "text": null })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["text"][0], "This field may not be null.");
}

#[tokio::test]
async fn test_review_on_missing_title_is_not_found() {
    let app = TestApp::new().await;
    let critic = app.user("critic", Role::User).await;

    let (status, _) = post_review(&app, 404, &critic, 5).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/api/v1/titles/404/reviews/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_only_author_or_moderator_edits_review() {
    let app = TestApp::new().await;
    let title = app.title("Solaris", 1972, None, vec![]).await;
    let author = app.user("author", Role::User).await;
    let other = app.user("other", Role::User).await;
    let moderator = app.user("mod", Role::Moderator).await;
    let admin = app.user("boss", Role::Admin).await;

    let (_, review) = post_review(&app, title, &author, 5).await;
    let uri = format!("/api/v1/titles/{}/reviews/{}/", title, review["id"]);
    let patch = json!({ "text": "Changed my mind" });

    let (status, body) = app
        .send("PATCH", &uri, Some(&other), Some(patch.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "You do not have permission to perform this action.");

    let (status, _) = app
        .send("PATCH", &uri, Some(&admin), Some(patch.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.send("PATCH", &uri, None, Some(patch.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .send("PATCH", &uri, Some(&author), Some(patch))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], "Changed my mind");
    assert_eq!(body["score"], 5);

    let (status, body) = app
        .send("PATCH", &uri, Some(&moderator), Some(json!({ "score": 3 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["score"], 3);
    assert_eq!(body["author"], "author");

    let (status, _) = app.send("DELETE", &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.send("DELETE", &uri, Some(&moderator), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(&uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_review_not_reachable_through_other_title() {
    let app = TestApp::new().await;
    let first = app.title("First", 2001, None, vec![]).await;
    let second = app.title("Second", 2002, None, vec![]).await;
    let critic = app.user("critic", Role::User).await;

    let (_, review) = post_review(&app, first, &critic, 5).await;

    let (status, _) = app
        .get(&format!("/api/v1/titles/{}/reviews/{}/", second, review["id"]), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(
            "DELETE",
            &format!("/api/v1/titles/{}/reviews/{}/", second, review["id"]),
            Some(&critic),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Comments
// =============================================================================

#[tokio::test]
async fn test_comment_lifecycle() {
    let app = TestApp::new().await;
    let title = app.title("Solaris", 1972, None, vec![]).await;
    let critic = app.user("critic", Role::User).await;
    let reader = app.user("reader", Role::User).await;
    let moderator = app.user("mod", Role::Moderator).await;

    let (_, review) = post_review(&app, title, &critic, 8).await;
    let comments_uri = format!("/api/v1/titles/{}/reviews/{}/comments/", title, review["id"]);

    let (status, comment) = app
        .send("POST", &comments_uri, Some(&reader), Some(json!({ "text": "Agreed" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(comment["author"], "reader");

    let (status, list) = app.get(&comments_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["count"], 1);

    let comment_uri = format!("{}{}/", comments_uri, comment["id"]);

    let (status, _) = app
        .send("PATCH", &comment_uri, Some(&critic), Some(json!({ "text": "Hijacked" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send("PUT", &comment_uri, Some(&reader), Some(json!({ "text": "Strongly agreed" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], "Strongly agreed");

    let (status, _) = app.send("DELETE", &comment_uri, Some(&moderator), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(&comment_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_comments_scoped_to_review_and_title() {
    let app = TestApp::new().await;
    let first = app.title("First", 2001, None, vec![]).await;
    let second = app.title("Second", 2002, None, vec![]).await;
    let critic = app.user("critic", Role::User).await;
    let reader = app.user("reader", Role::User).await;

    let (_, review_a) = post_review(&app, first, &critic, 5).await;
    let (_, review_b) = post_review(&app, first, &reader, 6).await;

    let (_, comment) = app
        .send(
            "POST",
            &format!("/api/v1/titles/{}/reviews/{}/comments/", first, review_a["id"]),
            Some(&reader),
            Some(json!({ "text": "On review A" })),
        )
        .await;

    // Right review id, wrong title
    let (status, _) = app
        .get(
            &format!("/api/v1/titles/{}/reviews/{}/comments/", second, review_a["id"]),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Right title, wrong review
    let (status, _) = app
        .get(
            &format!(
                "/api/v1/titles/{}/reviews/{}/comments/{}/",
                first, review_b["id"], comment["id"]
            ),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = app
        .get(
            &format!("/api/v1/titles/{}/reviews/{}/comments/", first, review_b["id"]),
            None,
        )
        .await;
    assert_eq!(list["count"], 0);
}

#[tokio::test]
async fn test_deleting_review_removes_comments() {
    let app = TestApp::new().await;
    let title = app.title("Solaris", 1972, None, vec![]).await;
    let critic = app.user("critic", Role::User).await;

    let (_, review) = post_review(&app, title, &critic, 8).await;
    let review_uri = format!("/api/v1/titles/{}/reviews/{}/", title, review["id"]);
    app.send(
        "POST",
        &format!("{}comments/", review_uri),
        Some(&critic),
        Some(json!({ "text": "Self reply" })),
    )
    .await;

    let (status, _) = app.send("DELETE", &review_uri, Some(&critic), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}
