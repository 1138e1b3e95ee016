use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, patch, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::middleware::{require_admin, require_auth};
use crate::state::AppState;
use crate::uploads::PUBLIC_PREFIX;
use crate::{admin, ai, auth, comments, posts, tags, users};

/// Room for the text fields and multipart framing around a cover image.
const FORM_OVERHEAD: usize = 64 * 1024;

/// The full HTTP surface: `/api/*` plus stored cover images.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/posts/search", get(posts::search_posts))
        .route("/posts/{id}", get(posts::get_post))
        .route("/posts/{id}/like", get(posts::get_likes))
        .route("/posts/{id}/comments", get(comments::list_for_post))
        .route("/comments/post/{id}", get(comments::list_for_post))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/posts", get(posts::list_posts).post(posts::create_post))
        .route("/posts/saved", get(posts::saved_posts))
        .route("/posts/{id}", put(posts::update_post).delete(posts::delete_post))
        .route("/posts/{id}/status", put(posts::set_status))
        .route(
            "/posts/{id}/like",
            post(posts::toggle_like)
                .put(posts::like_post)
                .delete(posts::unlike_post),
        )
        .route("/posts/{id}/save", put(posts::toggle_save))
        .route(
            "/posts/{id}/saved",
            post(posts::save_post).delete(posts::unsave_post),
        )
        .route("/posts/{id}/report", post(posts::report_post))
        .route("/posts/{id}/comments", post(comments::add_comment))
        .route(
            "/posts/{id}/comments/{comment_id}",
            put(comments::edit_post_comment).delete(comments::delete_post_comment),
        )
        .route("/comments", get(comments::list_comments))
        .route("/comments/post/{id}", post(comments::add_comment))
        .route(
            "/comments/{id}",
            put(comments::edit_comment).delete(comments::delete_comment),
        )
        .route("/comments/{id}/status", patch(comments::update_status))
        .route("/comments/{id}/report", post(comments::report_comment))
        .route("/users/profile", put(users::update_profile))
        .route("/users/change-password", put(users::change_password))
        .route("/users/tags", get(tags::list_tags))
        .route("/users/me", delete(users::delete_account))
        .route("/ai/generate-post", post(ai::generate_post))
        .route("/ai/suggest-tags", post(ai::suggest_tags))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    // require_auth is the outer layer so the session exists for require_admin
    let admin_routes = Router::new()
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/{id}", delete(admin::delete_user))
        .route("/admin/users/{id}/block", put(admin::toggle_block))
        .route(
            "/admin/users/{id}/blocked",
            post(admin::block_user).delete(admin::unblock_user),
        )
        .route(
            "/admin/users/{id}/role",
            put(admin::toggle_role).post(admin::set_role),
        )
        .route("/admin/posts", get(admin::list_posts))
        .route("/admin/posts/reported", get(admin::reported_posts))
        .route(
            "/admin/posts/{id}",
            put(admin::edit_post).delete(admin::delete_post),
        )
        .route(
            "/admin/posts/{id}/report",
            delete(admin::clear_post_report),
        )
        .route("/admin/posts/{id}/tags", put(admin::update_post_tags))
        .route("/admin/comments/reported", get(admin::reported_comments))
        .route(
            "/admin/comments/{id}",
            delete(admin::delete_comment),
        )
        .route(
            "/admin/comments/{id}/report",
            delete(admin::clear_comment_report),
        )
        .route("/admin/tags", get(tags::list_tags).post(tags::create_tag))
        .route(
            "/admin/tags/{id}",
            put(tags::update_tag).delete(tags::delete_tag),
        )
        .route("/admin/analytics", get(admin::analytics))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let api = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes);

    Router::new()
        .nest("/api", api)
        .nest_service(PUBLIC_PREFIX, ServeDir::new(state.uploads.dir()))
        .layer(DefaultBodyLimit::max(state.uploads.max_bytes() + FORM_OVERHEAD))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
