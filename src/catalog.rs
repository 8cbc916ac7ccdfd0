//! Book storage and the per-book aggregation query.
//!
//! Every read goes through [`BOOK_SELECT`], which joins the owner and folds the
//! relations of each book into `annotated_likes` and the rating sum/count.
//! Nothing is cached: derived fields are recomputed on every query.

use std::collections::HashMap;

use axum::http::Method;
use rust_decimal::{Decimal, RoundingStrategy};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::error::{AppError, AppResult, OptionExt};
use crate::middleware::auth::Principal;
use crate::policy;
use crate::types::{BookChanges, BookDto, Price, ReaderDto};

/// Book ids bound per reader lookup.
pub(crate) const READER_LOOKUP_CHUNK: usize = 500;

const BOOK_SELECT: &str = r#"SELECT b.id, b.name, b.price_cents, b.author_name, b.owner_id,
       COALESCE(u.username, '') AS owner_name,
       COUNT(CASE WHEN r.liked = 1 THEN 1 END) AS annotated_likes,
       SUM(r.rating) AS rating_sum,
       COUNT(r.rating) AS rating_count
FROM books b
LEFT JOIN users u ON u.id = b.owner_id
LEFT JOIN user_book_relations r ON r.book_id = b.id"#;

/// Columns a listing may be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Price,
    Name,
}

impl SortField {
    fn column(self) -> &'static str {
        match self {
            SortField::Price => "b.price_cents",
            SortField::Name => "b.name",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub descending: bool,
}

/// Filters applied by `GET /book/`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub price_cents: Option<i64>,
    /// Every term must occur in the name or the author name.
    pub search_terms: Vec<String>,
    pub ordering: Vec<SortKey>,
}

/// Splits a search string on whitespace and commas.
pub fn search_terms(raw: &str) -> Vec<String> {
    raw.replace('\0', "")
        .replace(',', " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Parses `ordering=price,-name`. Unknown fields are dropped.
pub fn parse_ordering(raw: &str) -> Vec<SortKey> {
    raw.split(',')
        .map(str::trim)
        .filter_map(|term| {
            let (descending, name) = match term.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, term),
            };
            let field = match name {
                "price" => SortField::Price,
                "name" => SortField::Name,
                _ => return None,
            };
            Some(SortKey { field, descending })
        })
        .collect()
}

fn like_pattern(term: &str) -> String {
    let escaped = term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Mean of `count` ratings summing to `sum`, as a two-place decimal string.
///
/// Exact midpoints round to the even neighbour: 1.125 becomes "1.12".
pub fn mean_rating(sum: Option<i64>, count: i64) -> Option<String> {
    if count == 0 {
        return None;
    }
    let mean = Decimal::from(sum?) / Decimal::from(count);
    let mut rounded = mean.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);
    rounded.rescale(2);
    Some(rounded.to_string())
}

fn book_from_row(r: &SqliteRow) -> Result<BookDto, sqlx::Error> {
    let rating_sum: Option<i64> = r.try_get("rating_sum")?;
    let rating_count: i64 = r.try_get("rating_count")?;
    Ok(BookDto {
        id: r.try_get("id")?,
        name: r.try_get("name")?,
        price: Price(r.try_get("price_cents")?),
        author_name: r.try_get("author_name")?,
        owner_name: r.try_get("owner_name")?,
        annotated_likes: r.try_get("annotated_likes")?,
        rating: mean_rating(rating_sum, rating_count),
        readers_book: Vec::new(),
    })
}

async fn attach_readers(db: &SqlitePool, books: &mut [BookDto]) -> AppResult<()> {
    if books.is_empty() {
        return Ok(());
    }
    let book_ids: Vec<i64> = books.iter().map(|b| b.id).collect();
    let mut readers: HashMap<i64, Vec<ReaderDto>> = HashMap::new();
    // Chunks keep each statement under SQLite's bound-parameter limit
    for chunk in book_ids.chunks(READER_LOOKUP_CHUNK) {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT r.book_id, u.first_name, u.last_name FROM user_book_relations r \
             JOIN users u ON u.id = r.user_id WHERE r.book_id IN (",
        );
        let mut ids = qb.separated(", ");
        for id in chunk {
            ids.push_bind(*id);
        }
        qb.push(") ORDER BY r.id");

        for r in qb.build().fetch_all(db).await? {
            let book_id: i64 = r.try_get("book_id")?;
            readers.entry(book_id).or_default().push(ReaderDto {
                first_name: r.try_get("first_name")?,
                last_name: r.try_get("last_name")?,
            });
        }
    }
    for book in books.iter_mut() {
        book.readers_book = readers.remove(&book.id).unwrap_or_default();
    }
    Ok(())
}

pub async fn list_books(db: &SqlitePool, filter: &ListFilter) -> AppResult<Vec<BookDto>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(BOOK_SELECT);
    qb.push(" WHERE 1=1");
    if let Some(cents) = filter.price_cents {
        qb.push(" AND b.price_cents = ").push_bind(cents);
    }
    for term in &filter.search_terms {
        let pattern = like_pattern(term);
        qb.push(" AND (b.name LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR b.author_name LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
    qb.push(" GROUP BY b.id ORDER BY ");
    for key in &filter.ordering {
        qb.push(key.field.column()).push(if key.descending { " DESC, " } else { " ASC, " });
    }
    qb.push("b.id ASC");

    let rows = qb.build().fetch_all(db).await?;
    let mut books = rows.iter().map(book_from_row).collect::<Result<Vec<_>, _>>()?;
    attach_readers(db, &mut books).await?;
    Ok(books)
}

pub async fn get_book(db: &SqlitePool, id: i64) -> AppResult<Option<BookDto>> {
    let sql = format!("{} WHERE b.id = ?1 GROUP BY b.id", BOOK_SELECT);
    let row = sqlx::query(&sql).bind(id).fetch_optional(db).await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let mut books = vec![book_from_row(&row)?];
    attach_readers(db, &mut books).await?;
    Ok(books.pop())
}

/// `None` when the book does not exist, `Some(None)` when it has no owner.
pub async fn book_owner(db: &SqlitePool, id: i64) -> AppResult<Option<Option<i64>>> {
    let owner = sqlx::query_scalar::<_, Option<i64>>("SELECT owner_id FROM books WHERE id = ?1")
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(owner)
}

/// Inserts a book owned by `principal`. Returns the new id.
pub async fn create_book(
    db: &SqlitePool,
    principal: &Principal,
    name: &str,
    price_cents: i64,
    author_name: &str,
) -> AppResult<i64> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO books (name, price_cents, author_name, owner_id) VALUES (?1, ?2, ?3, ?4) RETURNING id",
    )
    .bind(name)
    .bind(price_cents)
    .bind(author_name)
    .bind(principal.id)
    .fetch_one(db)
    .await?;
    tracing::info!(book_id = id, owner_id = principal.id, "book created");
    Ok(id)
}

/// Appends the ownership guard used by updates and deletes.
///
/// Staff may touch any row; everyone else only rows they still own when the
/// statement runs, so an ownership change between the policy check and the
/// write cannot slip through.
fn push_owner_guard(qb: &mut QueryBuilder<'_, Sqlite>, principal: &Principal) {
    if !principal.is_staff {
        qb.push(" AND owner_id = ").push_bind(principal.id);
    }
}

/// Classifies a guarded write that touched no row.
async fn missed_write(db: &SqlitePool, id: i64) -> AppError {
    match book_owner(db, id).await {
        Ok(Some(_)) => AppError::PermissionDenied,
        Ok(None) => AppError::NotFound("Book not found".into()),
        Err(e) => e,
    }
}

/// Runs the access policy for `method` against the current owner of book `id`.
pub async fn authorize_write(db: &SqlitePool, principal: &Principal, method: &Method, id: i64) -> AppResult<()> {
    let owner_id = book_owner(db, id).await?.ok_or_not_found("Book")?;
    policy::check_book_access(method, Some(principal), owner_id)
}

/// Applies `changes` to book `id`. Fields left `None` keep their value.
///
/// The write itself is ownership-guarded, so a principal that may not modify
/// the book gets `PermissionDenied` even without a prior [`authorize_write`].
pub async fn update_book(db: &SqlitePool, principal: &Principal, id: i64, changes: &BookChanges) -> AppResult<()> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE books SET name = COALESCE(");
    qb.push_bind(changes.name.clone())
        .push(", name), price_cents = COALESCE(")
        .push_bind(changes.price_cents)
        .push(", price_cents), author_name = COALESCE(")
        .push_bind(changes.author_name.clone())
        .push(", author_name) WHERE id = ")
        .push_bind(id);
    push_owner_guard(&mut qb, principal);

    let result = qb.build().execute(db).await?;
    if result.rows_affected() == 0 {
        return Err(missed_write(db, id).await);
    }
    tracing::info!(book_id = id, user_id = principal.id, "book updated");
    Ok(())
}

pub async fn delete_book(db: &SqlitePool, principal: &Principal, id: i64) -> AppResult<()> {
    authorize_write(db, principal, &Method::DELETE, id).await?;

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("DELETE FROM books WHERE id = ");
    qb.push_bind(id);
    push_owner_guard(&mut qb, principal);

    let result = qb.build().execute(db).await?;
    if result.rows_affected() == 0 {
        return Err(missed_write(db, id).await);
    }
    tracing::info!(book_id = id, user_id = principal.id, "book deleted");
    Ok(())
}
