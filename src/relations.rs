//! Per-user, per-book like/bookmark/rating state.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error::{AppResult, OptionExt};
use crate::types::RelationDto;

/// Validated partial update of a relation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelationChanges {
    pub like: Option<bool>,
    pub in_bookmarks: Option<bool>,
    /// `Some(None)` clears the rating.
    pub rating: Option<Option<i64>>,
}

fn relation_from_row(r: &SqliteRow) -> Result<RelationDto, sqlx::Error> {
    Ok(RelationDto {
        book: r.try_get("book_id")?,
        like: r.try_get("liked")?,
        in_bookmarks: r.try_get("in_bookmarks")?,
        rating: r.try_get("rating")?,
    })
}

pub async fn get_relation(db: &SqlitePool, user_id: i64, book_id: i64) -> AppResult<Option<RelationDto>> {
    let row = sqlx::query(
        "SELECT book_id, liked, in_bookmarks, rating FROM user_book_relations WHERE user_id = ?1 AND book_id = ?2",
    )
    .bind(user_id)
    .bind(book_id)
    .fetch_optional(db)
    .await?;
    Ok(row.as_ref().map(relation_from_row).transpose()?)
}

/// Creates the (user, book) relation if missing, then applies `changes`.
///
/// The insert comes first so the transaction takes the write lock up front; the
/// unique key turns a concurrent first write into a no-op instead of a
/// duplicate row. A missing book leaves no relation behind and yields 404.
pub async fn upsert_relation(
    db: &SqlitePool,
    user_id: i64,
    book_id: i64,
    changes: &RelationChanges,
) -> AppResult<RelationDto> {
    let mut tx = db.begin().await?;

    let inserted = sqlx::query(
        r#"INSERT INTO user_book_relations (user_id, book_id)
           SELECT ?1, id FROM books WHERE id = ?2
           ON CONFLICT(user_id, book_id) DO NOTHING"#,
    )
    .bind(user_id)
    .bind(book_id)
    .execute(&mut *tx)
    .await?;
    if inserted.rows_affected() > 0 {
        tracing::debug!(user_id, book_id, "relation created");
    }

    let (set_rating, rating) = match changes.rating {
        Some(value) => (true, value),
        None => (false, None),
    };
    let row = sqlx::query(
        r#"UPDATE user_book_relations SET
               liked = COALESCE(?1, liked),
               in_bookmarks = COALESCE(?2, in_bookmarks),
               rating = CASE WHEN ?3 THEN ?4 ELSE rating END
           WHERE user_id = ?5 AND book_id = ?6
           RETURNING book_id, liked, in_bookmarks, rating"#,
    )
    .bind(changes.like)
    .bind(changes.in_bookmarks)
    .bind(set_rating)
    .bind(rating)
    .bind(user_id)
    .bind(book_id)
    .fetch_optional(&mut *tx)
    .await?;

    let relation = row.as_ref().map(relation_from_row).transpose()?.ok_or_not_found("Book")?;
    tx.commit().await?;
    tracing::info!(user_id, book_id, like = relation.like, in_bookmarks = relation.in_bookmarks, rating = ?relation.rating, "relation updated");
    Ok(relation)
}
