use axum::{
    body::Body,
    http::{header, Method, Request},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::SqlitePool;
use tempfile::TempDir;

use crate::config::{AppConfig, DatabaseConfig, LoggingConfig, ServerConfig, UserSeed};
use crate::middleware::auth::Principal;
use crate::state::AppState;
use crate::{db, routes};

/// A router over a fresh on-disk database. The directory lives as long as this value.
pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    _dir: TempDir,
}

impl TestApp {
    pub fn db(&self) -> &SqlitePool {
        &self.state.db
    }
}

pub fn test_config(db_url: String) -> AppConfig {
    AppConfig {
        server: ServerConfig { host: "127.0.0.1".to_string(), port: 8080 },
        database: DatabaseConfig { url: db_url, max_connections: 4 },
        logging: LoggingConfig { dir: "logs".to_string(), file_name: "libris.log".to_string() },
        security: None,
        users: vec![],
    }
}

pub async fn setup_test_db() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db_url = format!("sqlite://{}", dir.path().join("libris-test.db").display());
    let pool = db::connect(&test_config(db_url).database).await.unwrap();
    db::init_db(&pool).await.unwrap();
    (pool, dir)
}

pub async fn setup_test_app() -> TestApp {
    let (pool, dir) = setup_test_db().await;
    let url = format!("sqlite://{}", dir.path().join("libris-test.db").display());
    let state = AppState::new(pool, test_config(url));
    let app = routes::router(state.clone());
    TestApp { app, state, _dir: dir }
}

/// Creates a user whose bearer token is `<username>-token`.
pub async fn create_user(
    pool: &SqlitePool,
    username: &str,
    first_name: &str,
    last_name: &str,
    is_staff: bool,
) -> (Principal, String) {
    let token = format!("{}-token", username);
    let seed = UserSeed {
        username: username.to_string(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        token: token.clone(),
        is_staff,
    };
    let id = db::upsert_user(pool, &seed).await.unwrap();
    (Principal { id, username: username.to_string(), is_staff }, token)
}

pub async fn insert_book(pool: &SqlitePool, name: &str, price_cents: i64, author: &str, owner: Option<i64>) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO books (name, price_cents, author_name, owner_id) VALUES (?1, ?2, ?3, ?4) RETURNING id",
    )
    .bind(name)
    .bind(price_cents)
    .bind(author)
    .bind(owner)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn insert_relation(pool: &SqlitePool, user_id: i64, book_id: i64, liked: bool, rating: Option<i64>) {
    sqlx::query("INSERT INTO user_book_relations (user_id, book_id, liked, rating) VALUES (?1, ?2, ?3, ?4)")
        .bind(user_id)
        .bind(book_id)
        .bind(liked)
        .bind(rating)
        .execute(pool)
        .await
        .unwrap();
}

pub async fn book_count(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM books").fetch_one(pool).await.unwrap()
}

pub async fn book_price_cents(pool: &SqlitePool, id: i64) -> i64 {
    sqlx::query_scalar("SELECT price_cents FROM books WHERE id = ?1").bind(id).fetch_one(pool).await.unwrap()
}

pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub fn ids(list: &Value) -> Vec<i64> {
    list.as_array().unwrap().iter().map(|b| b["id"].as_i64().unwrap()).collect()
}
