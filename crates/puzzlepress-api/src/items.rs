use axum::extract::State;

use puzzlepress_types::api::ItemSearchQuery;
use puzzlepress_types::models::Item;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path, Query};

pub async fn list_items(State(state): State<AppState>) -> ApiResult<Json<Vec<Item>>> {
    let items = state.db.run(|db| db.get_all_items()).await?;
    Ok(Json(items))
}

pub async fn items_by_model(
    State(state): State<AppState>,
    Path(model): Path<String>,
) -> ApiResult<Json<Vec<Item>>> {
    let items = state.db.run(move |db| db.get_items_by_model(&model)).await?;
    if items.is_empty() {
        return Err(ApiError::not_found("item"));
    }
    Ok(Json(items))
}

/// `GET /items/search?model=...`. An empty match is a normal, empty result.
pub async fn search_items(
    State(state): State<AppState>,
    Query(query): Query<ItemSearchQuery>,
) -> ApiResult<Json<Vec<Item>>> {
    let model = query
        .model
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ApiError::bad_request("Query parameter 'model' is required"))?;

    let items = state.db.run(move |db| db.search_items_by_model(&model)).await?;
    Ok(Json(items))
}
