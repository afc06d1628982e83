//! Author-only content management. Every route here sits behind
//! [`crate::middleware::require_author`], so `Claims` are always present.

use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use puzzlepress_db::DbError;
use puzzlepress_db::models::{NewPost, PostChanges};
use puzzlepress_types::api::{
    Claims, CommentTextRequest, CreateCommentRequest, CreatePostRequest, UpdatePostRequest,
};
use puzzlepress_types::models::{Comment, Commenter, Post, PostDetail, PostWithAuthor};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path};

// -- Posts --

/// The calling author's posts, drafts included, newest first.
pub async fn list_posts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<PostWithAuthor>>> {
    let posts = state
        .db
        .run(move |db| db.get_all_posts_by_author(claims.sub))
        .await?;
    Ok(Json(posts))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePostRequest>,
) -> ApiResult<impl IntoResponse> {
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::bad_request("Title is required"));
    }

    let new = NewPost {
        id: req.id.unwrap_or_else(Uuid::new_v4),
        title,
        text: req.text,
        author_id: claims.sub,
        published: req.published,
    };

    let post = state.db.run(move |db| db.post_new_post(new)).await?;

    info!(post_id = %post.id, author = %claims.username, published = post.published, "Post created");
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> ApiResult<Json<PostDetail>> {
    find_post(&state, post_id).await.map(Json)
}

pub async fn update_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Json(req): Json<UpdatePostRequest>,
) -> ApiResult<Json<Post>> {
    apply_changes(&state, post_id, req).await.map(Json)
}

/// Removes the post and, by cascade, its comments.
pub async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Post>> {
    let post = state.db.run(move |db| db.delete_post(post_id)).await?;
    info!(post_id = %post.id, author = %claims.username, "Post deleted");
    Ok(Json(post))
}

pub async fn publish_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> ApiResult<Json<PostWithAuthor>> {
    let post = state.db.run(move |db| db.post_post_publish(post_id)).await?;
    Ok(Json(post))
}

pub async fn unpublish_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> ApiResult<Json<PostWithAuthor>> {
    let post = state.db.run(move |db| db.post_post_unpublish(post_id)).await?;
    Ok(Json(post))
}

// -- Drafts --

pub async fn list_drafts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<PostWithAuthor>>> {
    let drafts = state
        .db
        .run(move |db| db.get_all_drafts_by_author(claims.sub))
        .await?;
    Ok(Json(drafts))
}

pub async fn get_draft(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> ApiResult<Json<PostDetail>> {
    find_post(&state, post_id).await.map(Json)
}

/// Same body as a post update, so a draft can be published in the same save.
pub async fn update_draft(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Json(req): Json<UpdatePostRequest>,
) -> ApiResult<Json<Post>> {
    apply_changes(&state, post_id, req).await.map(Json)
}

// -- Comments --

pub async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Comment>>> {
    let comments = state.db.run(move |db| db.get_post_comments(post_id)).await?;
    Ok(Json(comments))
}

/// The body must name exactly one of `userId` and `authorId`.
pub async fn create_comment(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Json(req): Json<CreateCommentRequest>,
) -> ApiResult<Json<Comment>> {
    let text = comment_text(req.text)?;
    let commenter = Commenter::from_ids(req.user_id, req.author_id).map_err(DbError::from)?;

    let comment = state
        .db
        .run(move |db| db.post_new_comment(post_id, commenter, &text))
        .await?;
    Ok(Json(comment))
}

pub async fn edit_comment(
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(Uuid, i64)>,
    Json(req): Json<CommentTextRequest>,
) -> ApiResult<Json<Comment>> {
    let text = comment_text(req.text)?;
    let comment = state
        .db
        .run(move |db| db.edit_comment(post_id, comment_id, &text))
        .await?;
    Ok(Json(comment))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(Uuid, i64)>,
) -> ApiResult<Json<Comment>> {
    let comment = state
        .db
        .run(move |db| db.delete_comment(post_id, comment_id))
        .await?;
    Ok(Json(comment))
}

// -- Helpers --

async fn find_post(state: &AppState, post_id: Uuid) -> ApiResult<PostDetail> {
    state
        .db
        .run(move |db| db.get_post(post_id))
        .await?
        .ok_or_else(|| ApiError::not_found("post"))
}

async fn apply_changes(state: &AppState, post_id: Uuid, req: UpdatePostRequest) -> ApiResult<Post> {
    let changes = PostChanges {
        title: non_blank_title(req.title)?,
        text: req.text,
        published: req.published,
        created_at: req.created_at,
    };

    let post = state.db.run(move |db| db.update_post(post_id, changes)).await?;
    Ok(post)
}

fn non_blank_title(title: Option<String>) -> ApiResult<Option<String>> {
    match title.map(|t| t.trim().to_string()) {
        Some(t) if t.is_empty() => Err(ApiError::bad_request("Title cannot be empty")),
        other => Ok(other),
    }
}

pub(crate) fn comment_text(text: String) -> ApiResult<String> {
    if text.trim().is_empty() {
        return Err(ApiError::bad_request("Comment text is required"));
    }
    Ok(text)
}
