use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::auth::{self, AppState};
use crate::middleware::{require_author, require_user};
use crate::{blog, dashboard, items, puzzles};

/// The full HTTP surface, minus static assets and transport layers, which
/// the server binary adds.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/users/login", post(auth::login_user))
        .route("/authors/signup", post(auth::signup_author))
        .route("/puzzle/{puzzle_id}", get(puzzles::get_puzzle))
        .route(
            "/puzzle/{puzzle_id}/leaderboard",
            get(puzzles::get_leaderboard).post(puzzles::submit_score),
        )
        .route("/items", get(items::list_items))
        .route("/items/model/{model}", get(items::items_by_model))
        .route("/items/search", get(items::search_items))
        .route("/posts", get(blog::list_posts))
        .route("/posts/{post_id}", get(blog::get_post))
        .route("/authors/{author_id}/posts", get(blog::author_posts));

    let reader_routes = Router::new()
        .route("/posts/{post_id}/comments", post(blog::create_comment))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_user));

    let dashboard_routes = Router::new()
        .route("/posts", get(dashboard::list_posts).post(dashboard::create_post))
        .route(
            "/posts/{post_id}",
            get(dashboard::get_post)
                .put(dashboard::update_post)
                .delete(dashboard::delete_post),
        )
        .route("/posts/{post_id}/publish", post(dashboard::publish_post))
        .route("/posts/{post_id}/unpublish", post(dashboard::unpublish_post))
        .route("/drafts", get(dashboard::list_drafts))
        .route(
            "/drafts/{post_id}",
            get(dashboard::get_draft).put(dashboard::update_draft),
        )
        .route(
            "/posts/{post_id}/comments",
            get(dashboard::list_comments).post(dashboard::create_comment),
        )
        .route(
            "/posts/{post_id}/comments/{comment_id}",
            put(dashboard::edit_comment).delete(dashboard::delete_comment),
        )
        .route("/{post_id}/comments/{comment_id}", put(dashboard::edit_comment))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_author));

    Router::new()
        .merge(public_routes)
        .merge(reader_routes)
        .nest("/dashboard", dashboard_routes)
        .with_state(state)
}
