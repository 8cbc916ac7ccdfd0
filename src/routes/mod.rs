//! HTTP route handlers for the Libris API.
//!
//! - `books`: list/filter/search/sort plus create, update and delete of books
//! - `relations`: the per-user like/bookmark/rating upsert
//! - `health`: liveness, readiness, metrics and version endpoints

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, patch};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::middleware::security_headers::security_headers_middleware;
use crate::state::AppState;

pub mod books;
pub mod health;
pub mod relations;

/// Request bodies are tiny JSON documents.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Builds the full application router. Every resource answers with and
/// without the trailing slash.
pub fn router(state: AppState) -> Router {
    let cfg = state.config.clone();

    let book_list = get(books::list_books).post(books::create_book);
    let book_detail = get(books::get_book)
        .put(books::update_book)
        .patch(books::partial_update_book)
        .delete(books::delete_book);
    let relation = patch(relations::patch_relation);

    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(health::metrics))
        .route("/version", get(health::version))
        .route("/book/", book_list.clone())
        .route("/book", book_list)
        .route("/book/{id}/", book_detail.clone())
        .route("/book/{id}", book_detail)
        .route("/book-relation/{book_id}/", relation.clone())
        .route("/book-relation/{book_id}", relation)
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(from_fn_with_state(cfg, security_headers_middleware))
}
