use std::str::FromStr;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{Method, StatusCode},
    Json,
};
use rust_decimal::Decimal;

use crate::{
    catalog::{self, ListFilter},
    error::{validation, AppError, AppResult, OptionExt},
    middleware::auth::Principal,
    state::AppState,
    types::{BookChanges, BookDto, BookListQuery, BookPatch, BookWrite},
};

fn build_filter(query: &BookListQuery) -> AppResult<ListFilter> {
    let price_cents = match query.price.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        Some(raw) => {
            let value = Decimal::from_str(raw).map_err(|_| AppError::ValidationError {
                field: "price".into(),
                message: "Enter a number.".into(),
            })?;
            Some(validation::validate_price(value, "price")?)
        }
        None => None,
    };
    Ok(ListFilter {
        price_cents,
        search_terms: query.search.as_deref().map(catalog::search_terms).unwrap_or_default(),
        ordering: query.ordering.as_deref().map(catalog::parse_ordering).unwrap_or_default(),
    })
}

fn validate_write(req: &BookWrite) -> AppResult<BookChanges> {
    validation::validate_text(&req.name, "name")?;
    validation::validate_text(&req.author_name, "author_name")?;
    Ok(BookChanges {
        name: Some(req.name.clone()),
        price_cents: Some(validation::validate_price(req.price, "price")?),
        author_name: Some(req.author_name.clone()),
    })
}

fn validate_patch(req: &BookPatch) -> AppResult<BookChanges> {
    if let Some(name) = &req.name {
        validation::validate_text(name, "name")?;
    }
    if let Some(author) = &req.author_name {
        validation::validate_text(author, "author_name")?;
    }
    let price_cents = req.price.map(|p| validation::validate_price(p, "price")).transpose()?;
    Ok(BookChanges { name: req.name.clone(), price_cents, author_name: req.author_name.clone() })
}

fn count_denied(state: &AppState, err: &AppError) {
    if matches!(err, AppError::PermissionDenied) {
        state.metrics.inc_permission_denied();
    }
}

async fn load_book(state: &AppState, id: i64) -> AppResult<BookDto> {
    catalog::get_book(&state.db, id).await?.ok_or_not_found("Book")
}

pub async fn list_books(
    State(state): State<AppState>,
    query: Result<Query<BookListQuery>, QueryRejection>,
) -> AppResult<Json<Vec<BookDto>>> {
    let Query(query) = query?;
    let filter = build_filter(&query)?;
    let books = catalog::list_books(&state.db, &filter).await?;
    Ok(Json(books))
}

pub async fn get_book(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<BookDto>> {
    Ok(Json(load_book(&state, id).await?))
}

/// The caller always becomes the owner; an `owner` key in the body is ignored.
pub async fn create_book(
    State(state): State<AppState>,
    principal: Principal,
    payload: Result<Json<BookWrite>, JsonRejection>,
) -> AppResult<(StatusCode, Json<BookDto>)> {
    let Json(req) = payload?;
    let changes = validate_write(&req)?;
    let id = catalog::create_book(
        &state.db,
        &principal,
        &req.name,
        changes.price_cents.unwrap_or_default(),
        &req.author_name,
    )
    .await?;
    state.metrics.inc_books_created();
    Ok((StatusCode::CREATED, Json(load_book(&state, id).await?)))
}

/// The book lookup and ownership check run before the body is decoded or
/// validated, so a caller that may not touch the book learns nothing about
/// field rules.
async fn apply_update(
    state: &AppState,
    principal: &Principal,
    method: Method,
    id: i64,
    changes: impl FnOnce() -> AppResult<BookChanges>,
) -> AppResult<Json<BookDto>> {
    catalog::authorize_write(&state.db, principal, &method, id)
        .await
        .inspect_err(|e| count_denied(state, e))?;
    let changes = changes()?;
    catalog::update_book(&state.db, principal, id, &changes)
        .await
        .inspect_err(|e| count_denied(state, e))?;
    state.metrics.inc_books_updated();
    Ok(Json(load_book(state, id).await?))
}

pub async fn update_book(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    payload: Result<Json<BookWrite>, JsonRejection>,
) -> AppResult<Json<BookDto>> {
    apply_update(&state, &principal, Method::PUT, id, move || {
        let Json(req) = payload?;
        validate_write(&req)
    })
    .await
}

pub async fn partial_update_book(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    payload: Result<Json<BookPatch>, JsonRejection>,
) -> AppResult<Json<BookDto>> {
    apply_update(&state, &principal, Method::PATCH, id, move || {
        let Json(req) = payload?;
        validate_patch(&req)
    })
    .await
}

pub async fn delete_book(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    catalog::delete_book(&state.db, &principal, id)
        .await
        .inspect_err(|e| count_denied(&state, e))?;
    state.metrics.inc_books_deleted();
    Ok(StatusCode::NO_CONTENT)
}
