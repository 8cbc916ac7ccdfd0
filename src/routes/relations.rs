use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};

use crate::{
    error::{validation, AppResult},
    middleware::auth::Principal,
    relations::{self, RelationChanges},
    state::AppState,
    types::{RelationDto, RelationPatch},
};

/// `PATCH /book-relation/{book_id}/`: records the caller's like, bookmark
/// and rating for a book, creating the relation on first use.
pub async fn patch_relation(
    State(state): State<AppState>,
    principal: Principal,
    Path(book_id): Path<i64>,
    payload: Result<Json<RelationPatch>, JsonRejection>,
) -> AppResult<Json<RelationDto>> {
    let Json(req) = payload?;
    let rating = req.rating.map(validation::validate_rating).transpose()?;
    let changes = RelationChanges { like: req.like, in_bookmarks: req.in_bookmarks, rating };

    let relation = relations::upsert_relation(&state.db, principal.id, book_id, &changes).await?;
    state.metrics.inc_relations_updated();
    Ok(Json(relation))
}
