#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::catalog::{
        self, mean_rating, parse_ordering, search_terms, ListFilter, SortField, SortKey, READER_LOOKUP_CHUNK,
    };
    use crate::tests::support::*;
    use crate::types::{BookChanges, ReaderDto};

    #[test]
    fn test_mean_rating() {
        assert_eq!(mean_rating(None, 0), None);
        assert_eq!(mean_rating(Some(5), 1).as_deref(), Some("5.00"));
        assert_eq!(mean_rating(Some(9), 2).as_deref(), Some("4.50"));
        assert_eq!(mean_rating(Some(10), 3).as_deref(), Some("3.33"));
        assert_eq!(mean_rating(Some(17), 8).as_deref(), Some("2.12"));
        // Exact midpoints go to the even neighbour
        assert_eq!(mean_rating(Some(9), 8).as_deref(), Some("1.12"));
        assert_eq!(mean_rating(Some(11), 8).as_deref(), Some("1.38"));
    }

    #[tokio::test]
    async fn test_rating_midpoint_rounds_to_even() {
        let (pool, _dir) = setup_test_db().await;
        let book = insert_book(&pool, "Midpoint", 100, "x", None).await;
        for (i, rating) in [2, 1, 1, 1, 1, 1, 1, 1].into_iter().enumerate() {
            let (user, _) = create_user(&pool, &format!("rater{}", i), "", "", false).await;
            insert_relation(&pool, user.id, book, false, Some(rating)).await;
        }

        let dto = catalog::get_book(&pool, book).await.unwrap().unwrap();
        assert_eq!(dto.rating.as_deref(), Some("1.12"));
    }

    #[tokio::test]
    async fn test_readers_attached_across_lookup_chunks() {
        let (pool, _dir) = setup_test_db().await;
        let (reader, _) = create_user(&pool, "reader", "Last", "Page", false).await;
        let total = READER_LOOKUP_CHUNK * 2 + 1;
        let mut tx = pool.begin().await.unwrap();
        for i in 0..total {
            sqlx::query("INSERT INTO books (name, price_cents, author_name) VALUES (?1, 100, 'x')")
                .bind(format!("Book {}", i))
                .execute(&mut *tx)
                .await
                .unwrap();
        }
        tx.commit().await.unwrap();
        let last: i64 = sqlx::query_scalar("SELECT MAX(id) FROM books").fetch_one(&pool).await.unwrap();
        let first: i64 = sqlx::query_scalar("SELECT MIN(id) FROM books").fetch_one(&pool).await.unwrap();
        insert_relation(&pool, reader.id, first, true, None).await;
        insert_relation(&pool, reader.id, last, true, None).await;

        let books = catalog::list_books(&pool, &ListFilter::default()).await.unwrap();
        assert_eq!(books.len(), total);
        let expected = vec![ReaderDto { first_name: "Last".into(), last_name: "Page".into() }];
        assert_eq!(books[0].readers_book, expected);
        assert_eq!(books[total - 1].readers_book, expected);
        assert!(books[1..total - 1].iter().all(|b| b.readers_book.is_empty()));
    }

    #[test]
    fn test_parse_ordering() {
        assert_eq!(parse_ordering("price"), vec![SortKey { field: SortField::Price, descending: false }]);
        assert_eq!(
            parse_ordering("-name, price,bogus"),
            vec![
                SortKey { field: SortField::Name, descending: true },
                SortKey { field: SortField::Price, descending: false },
            ]
        );
        assert!(parse_ordering("owner").is_empty());
        assert!(parse_ordering("").is_empty());
    }

    #[test]
    fn test_search_terms() {
        assert_eq!(search_terms("Author 1"), vec!["Author", "1"]);
        assert_eq!(search_terms(" a,b  c "), vec!["a", "b", "c"]);
        assert!(search_terms("  ").is_empty());
    }

    #[tokio::test]
    async fn test_list_serializes_aggregates() {
        let (pool, _dir) = setup_test_db().await;
        let (user1, _) = create_user(&pool, "user1", "Maksim", "Tishchyk", false).await;
        let (user2, _) = create_user(&pool, "user2", "Maks", "Vitman", false).await;
        let book_1 = insert_book(&pool, "Test Book 1", 2500, "Author 1", Some(user2.id)).await;
        let book_2 = insert_book(&pool, "Test Book 2", 5000, "Author 2", Some(user1.id)).await;
        insert_relation(&pool, user1.id, book_1, true, Some(5)).await;
        insert_relation(&pool, user2.id, book_1, true, Some(4)).await;
        insert_relation(&pool, user1.id, book_2, true, Some(4)).await;
        insert_relation(&pool, user2.id, book_2, true, Some(3)).await;

        let books = catalog::list_books(&pool, &ListFilter::default()).await.unwrap();
        let readers = json!([
            { "first_name": "Maksim", "last_name": "Tishchyk" },
            { "first_name": "Maks", "last_name": "Vitman" },
        ]);
        let expected = json!([
            {
                "id": book_1,
                "name": "Test Book 1",
                "price": "25.00",
                "author_name": "Author 1",
                "owner_name": "user2",
                "annotated_likes": 2,
                "rating": "4.50",
                "readers_book": readers,
            },
            {
                "id": book_2,
                "name": "Test Book 2",
                "price": "50.00",
                "author_name": "Author 2",
                "owner_name": "user1",
                "annotated_likes": 2,
                "rating": "3.50",
                "readers_book": readers,
            },
        ]);
        assert_eq!(serde_json::to_value(&books).unwrap(), expected);
    }

    #[tokio::test]
    async fn test_likes_ignore_unliked_and_unrated_relations() {
        let (pool, _dir) = setup_test_db().await;
        let (a, _) = create_user(&pool, "a", "", "", false).await;
        let (b, _) = create_user(&pool, "b", "", "", false).await;
        let (c, _) = create_user(&pool, "c", "", "", false).await;
        let book = insert_book(&pool, "Book", 100, "Someone", None).await;
        insert_relation(&pool, a.id, book, true, None).await;
        insert_relation(&pool, b.id, book, false, Some(2)).await;
        insert_relation(&pool, c.id, book, false, None).await;

        let dto = catalog::get_book(&pool, book).await.unwrap().unwrap();
        assert_eq!(dto.annotated_likes, 1);
        assert_eq!(dto.rating.as_deref(), Some("2.00"));
        assert_eq!(dto.owner_name, "");
        assert_eq!(dto.readers_book.len(), 3);
    }

    #[tokio::test]
    async fn test_search_treats_wildcards_literally() {
        let (pool, _dir) = setup_test_db().await;
        let percent = insert_book(&pool, "100% Rust", 100, "Ferris", None).await;
        insert_book(&pool, "Plain", 100, "Nobody", None).await;

        let filter = ListFilter { search_terms: search_terms("%"), ..Default::default() };
        let books = catalog::list_books(&pool, &filter).await.unwrap();
        assert_eq!(books.iter().map(|b| b.id).collect::<Vec<_>>(), vec![percent]);

        let filter = ListFilter { search_terms: search_terms("ferris"), ..Default::default() };
        assert_eq!(catalog::list_books(&pool, &filter).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_price_filter_and_ordering_tie_break() {
        let (pool, _dir) = setup_test_db().await;
        let a = insert_book(&pool, "B", 1000, "x", None).await;
        let b = insert_book(&pool, "A", 1000, "x", None).await;
        let c = insert_book(&pool, "C", 500, "x", None).await;

        let filter = ListFilter { price_cents: Some(1000), ..Default::default() };
        let found: Vec<i64> = catalog::list_books(&pool, &filter).await.unwrap().iter().map(|b| b.id).collect();
        assert_eq!(found, vec![a, b]);

        let filter = ListFilter { ordering: parse_ordering("price"), ..Default::default() };
        let found: Vec<i64> = catalog::list_books(&pool, &filter).await.unwrap().iter().map(|b| b.id).collect();
        assert_eq!(found, vec![c, a, b]);

        let filter = ListFilter { ordering: parse_ordering("-price,name"), ..Default::default() };
        let found: Vec<i64> = catalog::list_books(&pool, &filter).await.unwrap().iter().map(|b| b.id).collect();
        assert_eq!(found, vec![b, a, c]);
    }

    #[tokio::test]
    async fn test_update_guard_rejects_non_owner_without_prior_check() {
        let (pool, _dir) = setup_test_db().await;
        let (owner, _) = create_user(&pool, "owner", "", "", false).await;
        let (other, _) = create_user(&pool, "other", "", "", false).await;
        let book = insert_book(&pool, "Mine", 100, "x", Some(owner.id)).await;
        let changes = BookChanges { price_cents: Some(1), ..Default::default() };

        let err = catalog::update_book(&pool, &other, book, &changes).await.unwrap_err();
        assert!(matches!(err, crate::error::AppError::PermissionDenied));
        let err = catalog::update_book(&pool, &other, 9999, &changes).await.unwrap_err();
        assert!(matches!(err, crate::error::AppError::NotFound(_)));

        catalog::update_book(&pool, &owner, book, &changes).await.unwrap();
        assert_eq!(book_price_cents(&pool, book).await, 1);
    }
}
