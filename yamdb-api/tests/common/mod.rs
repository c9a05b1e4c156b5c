//! Shared helpers for the yamdb-api integration tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use sqlx::SqlitePool;
use tower::util::ServiceExt; // for `oneshot`
use yamdb_api::mail::Mailer;
use yamdb_api::token::TokenIssuer;
use yamdb_api::{build_router, AppState};
use yamdb_common::db::{
    init_memory_database, sections, titles, users, NewTitle, NewUser, Role, SectionKind,
};

pub const TEST_SECRET: &str = "test-signing-secret";

/// Router over an in-memory database, plus direct access to the pool
pub struct TestApp {
    pub pool: SqlitePool,
    pub app: Router,
    issuer: TokenIssuer,
}

impl TestApp {
    pub async fn new() -> Self {
        let pool = init_memory_database()
            .await
            .expect("Should create in-memory database");

        let state = AppState::new(
            pool.clone(),
            TokenIssuer::new(TEST_SECRET, 3600),
            Mailer::log_only("noreply@yamdb.local").expect("Should build mailer"),
            10,
        );

        Self {
            pool,
            app: build_router(state),
            issuer: TokenIssuer::new(TEST_SECRET, 3600),
        }
    }

    /// Send a request; returns the status and the JSON body (`Null` when empty)
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Should read body");

        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::String(
                String::from_utf8_lossy(&bytes).to_string(),
            ))
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send("GET", uri, token, None).await
    }

    /// Create a user with `role` and return a valid access token for it
    pub async fn user(&self, username: &str, role: Role) -> String {
        let user = users::insert(
            &self.pool,
            &NewUser {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                role,
                ..Default::default()
            },
        )
        .await
        .expect("Should insert user");
        self.issuer.issue(user.id).unwrap()
    }

    /// Superuser with the plain `user` role
    pub async fn superuser(&self, username: &str) -> String {
        let token = self.user(username, Role::User).await;
        let user = users::get_by_username(&self.pool, username).await.unwrap().unwrap();
        sqlx::query("UPDATE users SET is_superuser = 1 WHERE id = ?")
            .bind(user.id)
            .execute(&self.pool)
            .await
            .unwrap();
        token
    }

    pub async fn category(&self, name: &str, slug: &str) -> i64 {
        sections::insert(&self.pool, SectionKind::Category, name, slug)
            .await
            .unwrap()
            .id
    }

    pub async fn genre(&self, name: &str, slug: &str) -> i64 {
        sections::insert(&self.pool, SectionKind::Genre, name, slug)
            .await
            .unwrap()
            .id
    }

    pub async fn title(&self, name: &str, year: i64, category: Option<i64>, genres: Vec<i64>) -> i64 {
        titles::insert(
            &self.pool,
            &NewTitle {
                name: name.to_string(),
                year,
                description: None,
                category_id: category,
                genre_ids: genres,
            },
        )
        .await
        .unwrap()
        .id
    }
}
