mod common;

use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

use common::{PASSWORD, Part, TestApp, id_of};

fn titles(body: &Value) -> Vec<&str> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn create_post_normalizes_tags_and_defaults_to_draft() {
    let app = TestApp::new().await;
    let ann = app.account("Ann").await;

    let (status, body) = app
        .multipart(
            Method::POST,
            "/api/posts",
            &ann.token,
            &[
                Part::Text("title", "  Lifetimes  "),
                Part::Text("content", "They are not scary."),
                Part::Text("tags", " rust, ,lifetimes,rust "),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["title"], "Lifetimes");
    assert_eq!(body["status"], "draft");
    assert_eq!(body["tags"], json!(["rust", "lifetimes"]));
    assert_eq!(body["author"]["name"], "Ann");
    assert_eq!(body["author"]["id"], ann.id.as_str());
}

#[tokio::test]
async fn tags_may_arrive_as_repeated_fields_or_json() {
    let app = TestApp::new().await;
    let ann = app.account("Ann").await;

    let (_, body) = app
        .multipart(
            Method::POST,
            "/api/posts",
            &ann.token,
            &[
                Part::Text("title", "t"),
                Part::Text("content", "c"),
                Part::Text("tags[]", "a"),
                Part::Text("tags[]", "b"),
            ],
        )
        .await;
    assert_eq!(body["tags"], json!(["a", "b"]));

    let (_, body) = app
        .multipart(
            Method::POST,
            "/api/posts",
            &ann.token,
            &[
                Part::Text("title", "t"),
                Part::Text("content", "c"),
                Part::Text("tags", r#"["x","y","x"]"#),
            ],
        )
        .await;
    assert_eq!(body["tags"], json!(["x", "y"]));
}

#[tokio::test]
async fn create_post_validates_required_fields_and_status() {
    let app = TestApp::new().await;
    let ann = app.account("Ann").await;

    let (status, body) = app
        .multipart(
            Method::POST,
            "/api/posts",
            &ann.token,
            &[Part::Text("title", "only a title")],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Title and content are required");

    let (status, _) = app
        .multipart(
            Method::POST,
            "/api/posts",
            &ann.token,
            &[
                Part::Text("title", "t"),
                Part::Text("content", "c"),
                Part::Text("status", "archived"),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.post_count(), 0);
}

#[tokio::test]
async fn cover_images_are_stored_and_served() {
    let app = TestApp::new().await;
    let ann = app.account("Ann").await;

    let (status, body) = app
        .multipart(
            Method::POST,
            "/api/posts",
            &ann.token,
            &[
                Part::Text("title", "With cover"),
                Part::Text("content", "c"),
                Part::File {
                    name: "coverImage",
                    content_type: "image/png",
                    data: b"fake-png-bytes",
                },
            ],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let cover = body["coverImage"].as_str().unwrap().to_string();
    assert!(cover.starts_with("/uploads/") && cover.ends_with(".png"));

    let (status, served) = app.get(&cover, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(served, Value::String("fake-png-bytes".into()));

    // deleting the post removes the file
    let (status, _) = app
        .request(Method::DELETE, &format!("/api/posts/{}", id_of(&body)), Some(&ann.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get(&cover, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_an_account_removes_its_cover_files() {
    let app = TestApp::new().await;
    let ann = app.account("Ann").await;
    let bob = app.account("Bob").await;

    let mut covers = Vec::new();
    for token in [&ann.token, &bob.token] {
        let (status, body) = app
            .multipart(
                Method::POST,
                "/api/posts",
                token,
                &[
                    Part::Text("title", "Covered"),
                    Part::Text("content", "c"),
                    Part::File {
                        name: "coverImage",
                        content_type: "image/png",
                        data: b"png",
                    },
                ],
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        covers.push(body["coverImage"].as_str().unwrap().to_string());
    }

    let (status, _) = app
        .request(
            Method::DELETE,
            "/api/users/me",
            Some(&ann.token),
            Some(json!({ "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get(&covers[0], None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get(&covers[1], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.post_count(), 1);
}

#[tokio::test]
async fn oversized_and_non_image_covers_are_rejected() {
    let app = TestApp::new().await;
    let ann = app.account("Ann").await;
    let big = vec![0u8; 4096];

    let (status, _) = app
        .multipart(
            Method::POST,
            "/api/posts",
            &ann.token,
            &[
                Part::Text("title", "t"),
                Part::Text("content", "c"),
                Part::File {
                    name: "coverImage",
                    content_type: "image/png",
                    data: &big,
                },
            ],
        )
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

    let (status, _) = app
        .multipart(
            Method::POST,
            "/api/posts",
            &ann.token,
            &[
                Part::Text("title", "t"),
                Part::Text("content", "c"),
                Part::File {
                    name: "coverImage",
                    content_type: "text/html",
                    data: b"<script>",
                },
            ],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.post_count(), 0);
}

#[tokio::test]
async fn get_post_is_public_and_reports_missing_posts() {
    let app = TestApp::new().await;
    let ann = app.account("Ann").await;
    let post = app.post(&ann.token, "Public", "c", "").await;

    let (status, body) = app.get(&format!("/api/posts/{}", id_of(&post)), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Public");

    let (status, body) = app
        .get(&format!("/api/posts/{}", uuid::Uuid::new_v4()), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Post not found");

    let (status, _) = app.get("/api/posts/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn only_owner_or_admin_may_edit_or_delete() {
    let app = TestApp::new().await;
    let ann = app.account("Ann").await;
    let bob = app.account("Bob").await;
    let root = app.admin("Root").await;
    let post = app.post(&ann.token, "Mine", "original", "a").await;
    let uri = format!("/api/posts/{}", id_of(&post));

    let (status, _) = app
        .multipart(Method::PUT, &uri, &bob.token, &[Part::Text("title", "hijacked")])
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.request(Method::DELETE, &uri, Some(&bob.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .multipart(Method::PUT, &uri, &root.token, &[Part::Text("title", "Edited by admin")])
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Edited by admin");
    // absent fields keep their values and the author never changes
    assert_eq!(body["content"], "original");
    assert_eq!(body["tags"], json!(["a"]));
    assert_eq!(body["author"]["id"], ann.id.as_str());

    let (status, _) = app.request(Method::DELETE, &uri, Some(&root.token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get(&uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn edit_with_invalid_status_changes_nothing() {
    let app = TestApp::new().await;
    let ann = app.account("Ann").await;
    let post = app.post(&ann.token, "Stable", "c", "").await;
    let uri = format!("/api/posts/{}", id_of(&post));

    let (status, _) = app
        .multipart(
            Method::PUT,
            &uri,
            &ann.token,
            &[Part::Text("content", "new content"), Part::Text("status", "bogus")],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = app.get(&uri, None).await;
    assert_eq!(body["content"], "c");
    assert_eq!(body["status"], "published");
}

#[tokio::test]
async fn status_endpoint_validates_values() {
    let app = TestApp::new().await;
    let ann = app.account("Ann").await;
    let post = app.post(&ann.token, "S", "c", "").await;
    let uri = format!("/api/posts/{}/status", id_of(&post));

    let (status, body) = app
        .request(Method::PUT, &uri, Some(&ann.token), Some(json!({ "status": "draft" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "Status updated", "status": "draft" }));

    let (status, _) = app
        .request(Method::PUT, &uri, Some(&ann.token), Some(json!({ "status": "deleted" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = app.get(&format!("/api/posts/{}", id_of(&post)), None).await;
    assert_eq!(body["status"], "draft");
}

#[tokio::test]
async fn search_matches_text_and_any_tag() {
    let app = TestApp::new().await;
    let ann = app.account("Ann").await;
    app.post(&ann.token, "Ownership in Rust", "moves and borrows", "rust").await;
    app.post(&ann.token, "Gardening", "Tomatoes love RUST-free tools", "garden").await;
    app.post(&ann.token, "Async", "futures", "rust,async").await;

    let (status, body) = app.get("/api/posts/search?query=rust", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(titles(&body), vec!["Gardening", "Ownership in Rust"]);

    let (_, body) = app.get("/api/posts/search?tags=async,garden", None).await;
    assert_eq!(titles(&body), vec!["Async", "Gardening"]);

    let (_, body) = app.get("/api/posts/search?query=rust&tags=rust", None).await;
    assert_eq!(titles(&body), vec!["Ownership in Rust"]);

    let (_, body) = app.get("/api/posts/search", None).await;
    assert_eq!(body.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn listing_requires_auth_and_is_newest_first() {
    let app = TestApp::new().await;
    let ann = app.account("Ann").await;
    app.post(&ann.token, "first", "c", "").await;
    app.post(&ann.token, "second", "c", "").await;

    let (status, _) = app.get("/api/posts", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, body) = app.get("/api/posts", Some(&ann.token)).await;
    assert_eq!(titles(&body), vec!["second", "first"]);
}

#[tokio::test]
async fn like_unlike_and_toggle() {
    let app = TestApp::new().await;
    let ann = app.account("Ann").await;
    let bob = app.account("Bob").await;
    let post = app.post(&ann.token, "Likeable", "c", "").await;
    let uri = format!("/api/posts/{}/like", id_of(&post));

    let (status, body) = app.request(Method::PUT, &uri, Some(&bob.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["likes"], json!([bob.id]));
    // liking twice keeps one like
    let (_, body) = app.request(Method::PUT, &uri, Some(&bob.token), None).await;
    assert_eq!(body["likes"], json!([bob.id]));

    let (_, body) = app.get(&uri, None).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["users"], json!([bob.id]));

    let (_, body) = app.request(Method::DELETE, &uri, Some(&bob.token), None).await;
    assert_eq!(body["likes"], json!([]));

    // toggle twice is a no-op
    let (_, body) = app.request(Method::POST, &uri, Some(&ann.token), None).await;
    assert_eq!(body["likes"], json!([ann.id]));
    let (_, body) = app.request(Method::POST, &uri, Some(&ann.token), None).await;
    assert_eq!(body["likes"], json!([]));

    let missing = format!("/api/posts/{}/like", uuid::Uuid::new_v4());
    let (status, _) = app.request(Method::PUT, &missing, Some(&bob.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn saves_and_saved_listing() {
    let app = TestApp::new().await;
    let ann = app.account("Ann").await;
    let bob = app.account("Bob").await;
    let first = app.post(&ann.token, "first", "c", "").await;
    let second = app.post(&ann.token, "second", "c", "").await;

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/posts/{}/saved", id_of(&second)),
            Some(&bob.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["saved"], true);

    let (_, body) = app
        .request(
            Method::PUT,
            &format!("/api/posts/{}/save", id_of(&first)),
            Some(&bob.token),
            None,
        )
        .await;
    assert_eq!(body["saved"], true);

    let (_, body) = app.get("/api/posts/saved", Some(&bob.token)).await;
    assert_eq!(titles(&body), vec!["first", "second"]);

    let (_, body) = app
        .request(
            Method::DELETE,
            &format!("/api/posts/{}/saved", id_of(&second)),
            Some(&bob.token),
            None,
        )
        .await;
    assert_eq!(body["saved"], false);
    let (_, body) = app.get("/api/posts/saved", Some(&bob.token)).await;
    assert_eq!(titles(&body), vec!["first"]);

    let (status, _) = app
        .request(
            Method::POST,
            &format!("/api/posts/{}/saved", uuid::Uuid::new_v4()),
            Some(&bob.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reported_posts_reach_the_moderation_queue() {
    let app = TestApp::new().await;
    let ann = app.account("Ann").await;
    let bob = app.account("Bob").await;
    let root = app.admin("Root").await;
    let post = app.post(&ann.token, "Spam?", "c", "").await;

    let (status, _) = app
        .request(
            Method::POST,
            &format!("/api/posts/{}/report", id_of(&post)),
            Some(&bob.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get("/api/admin/posts/reported", Some(&root.token)).await;
    assert_eq!(titles(&body), vec!["Spam?"]);

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/api/admin/posts/{}/report", id_of(&post)),
            Some(&root.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.get("/api/admin/posts/reported", Some(&root.token)).await;
    assert!(body.as_array().unwrap().is_empty());
}
