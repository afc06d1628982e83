use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use puzzlepress_types::api::{Claims, CommentTextRequest};
use puzzlepress_types::models::{AuthorWithPosts, Commenter, PostDetail};

use crate::auth::AppState;
use crate::dashboard::comment_text;
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path};

pub async fn list_posts(State(state): State<AppState>) -> ApiResult<Json<Vec<PostDetail>>> {
    let posts = state.db.run(|db| db.get_all_posts()).await?;
    Ok(Json(posts))
}

/// Drafts are invisible here: an unpublished post is reported as missing.
pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> ApiResult<Json<PostDetail>> {
    state
        .db
        .run(move |db| db.get_post(post_id))
        .await?
        .filter(|detail| detail.post.published)
        .map(Json)
        .ok_or_else(|| ApiError::not_found("post"))
}

pub async fn author_posts(
    State(state): State<AppState>,
    Path(author_id): Path<Uuid>,
) -> ApiResult<Json<AuthorWithPosts>> {
    let mut author = state
        .db
        .run(move |db| db.get_posts_by_author(author_id))
        .await?
        .ok_or_else(|| ApiError::not_found("author"))?;

    author.posts.retain(|detail| detail.post.published);
    Ok(Json(author))
}

/// Reader comment, attributed to the user in the token.
pub async fn create_comment(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CommentTextRequest>,
) -> ApiResult<impl IntoResponse> {
    let text = comment_text(req.text)?;
    let user_id = claims.sub;

    let comment = state
        .db
        .run(move |db| db.post_new_comment_on_published(post_id, Commenter::User(user_id), &text))
        .await?;

    Ok((StatusCode::CREATED, Json(comment)))
}
