use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use puzzlepress_db::models::NewPlayer;
use puzzlepress_types::api::NewPlayerRequest;
use puzzlepress_types::models::{Leaderboard, Puzzle};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path};

const MAX_PLAYER_NAME: usize = 32;

pub async fn get_puzzle(
    State(state): State<AppState>,
    Path(puzzle_id): Path<String>,
) -> ApiResult<Json<Puzzle>> {
    let puzzle = state
        .db
        .run(move |db| db.get_puzzle_by_id(&puzzle_id))
        .await?
        .ok_or_else(|| ApiError::not_found("puzzle"))?;

    Ok(Json(puzzle))
}

pub async fn get_leaderboard(
    State(state): State<AppState>,
    Path(puzzle_id): Path<String>,
) -> ApiResult<Json<Leaderboard>> {
    let board = state
        .db
        .run(move |db| db.get_leaderboard_by_puzzle_id(&puzzle_id))
        .await?
        .ok_or_else(|| ApiError::not_found("leaderboard"))?;

    Ok(Json(board))
}

/// Record a finished game. Each submission is its own row.
pub async fn submit_score(
    State(state): State<AppState>,
    Path(puzzle_id): Path<String>,
    Json(req): Json<NewPlayerRequest>,
) -> ApiResult<impl IntoResponse> {
    let username = req.username.trim().to_string();
    if username.is_empty() || username.chars().count() > MAX_PLAYER_NAME {
        return Err(ApiError::bad_request("Username must be 1 to 32 characters"));
    }
    if req.score < 0 {
        return Err(ApiError::bad_request("Score cannot be negative"));
    }

    let score = req.score;
    let player = state
        .db
        .run(move |db| {
            let board = db
                .get_leaderboard_ref(&puzzle_id)?
                .ok_or(puzzlepress_db::DbError::NotFound("leaderboard"))?;
            db.post_new_player(NewPlayer {
                id: Uuid::new_v4(),
                username,
                score,
                leaderboard_id: board.id,
            })
        })
        .await?;

    info!(player = %player.username, score = player.score, "Score submitted");
    Ok((StatusCode::CREATED, Json(player)))
}
