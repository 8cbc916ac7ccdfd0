//! Who may change a book.
//!
//! Reads are open to everyone. Writes need an authenticated principal that is
//! either staff or the book's owner.

use axum::http::Method;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::Principal;

/// GET, HEAD and OPTIONS never mutate.
pub fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Decides whether `principal` may perform `method` on a book owned by `owner_id`.
pub fn check_book_access(method: &Method, principal: Option<&Principal>, owner_id: Option<i64>) -> AppResult<()> {
    if is_safe_method(method) {
        return Ok(());
    }
    let principal =
        principal.ok_or_else(|| AppError::Unauthorized("Authentication credentials were not provided.".into()))?;
    if may_modify(principal, owner_id) {
        Ok(())
    } else {
        tracing::warn!(user_id = principal.id, ?owner_id, %method, "permission denied on book");
        Err(AppError::PermissionDenied)
    }
}

pub fn may_modify(principal: &Principal, owner_id: Option<i64>) -> bool {
    principal.is_staff || owner_id == Some(principal.id)
}
