//! User queries

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::models::{NewUser, Role, User, UserChanges};
use crate::{Error, Result};

const USER_COLUMNS: &str = "id, username, email, role, first_name, last_name, bio, \
     confirmation_code, is_superuser, date_joined";

pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn get_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE username = ?",
        USER_COLUMNS
    ))
    .bind(username)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

/// Exact identity match used by registration
pub async fn get_by_identity(
    pool: &SqlitePool,
    username: &str,
    email: &str,
) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE username = ? AND email = ?",
        USER_COLUMNS
    ))
    .bind(username)
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

fn push_search(builder: &mut QueryBuilder<'_, Sqlite>, search: Option<&str>) {
    if let Some(term) = search.filter(|t| !t.is_empty()) {
        builder
            .push(" WHERE instr(lower(username), lower(")
            .push_bind(term.to_string())
            .push(")) > 0");
    }
}

/// Users ordered by username, optionally filtered by a username substring
pub async fn list(
    pool: &SqlitePool,
    search: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<User>> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM users", USER_COLUMNS));
    push_search(&mut builder, search);
    builder
        .push(" ORDER BY username LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let users = builder.build_query_as::<User>().fetch_all(pool).await?;
    Ok(users)
}

pub async fn count(pool: &SqlitePool, search: Option<&str>) -> Result<i64> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM users");
    push_search(&mut builder, search);
    let total = builder.build_query_scalar::<i64>().fetch_one(pool).await?;
    Ok(total)
}

/// Insert a user; UNIQUE violations on username/email surface as `Error::Conflict`
pub async fn insert(pool: &SqlitePool, new_user: &NewUser) -> Result<User> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, role, first_name, last_name, bio, date_joined)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&new_user.username)
    .bind(&new_user.email)
    .bind(new_user.role)
    .bind(&new_user.first_name)
    .bind(&new_user.last_name)
    .bind(&new_user.bio)
    .bind(Utc::now())
    .execute(pool)
    .await
    .map_err(conflict_or_database)?;

    get_by_id(pool, result.last_insert_rowid())
        .await?
        .ok_or_else(|| Error::Internal("Inserted user vanished".to_string()))
}

/// Apply a partial update and return the fresh row
pub async fn update(pool: &SqlitePool, id: i64, changes: &UserChanges) -> Result<User> {
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE users SET ");
    let mut any = false;
    {
        let mut set = builder.separated(", ");
        if let Some(username) = &changes.username {
            set.push("username = ").push_bind_unseparated(username.clone());
            any = true;
        }
        if let Some(email) = &changes.email {
            set.push("email = ").push_bind_unseparated(email.clone());
            any = true;
        }
        if let Some(role) = changes.role {
            set.push("role = ").push_bind_unseparated(role);
            any = true;
        }
        if let Some(first_name) = &changes.first_name {
            set.push("first_name = ").push_bind_unseparated(first_name.clone());
            any = true;
        }
        if let Some(last_name) = &changes.last_name {
            set.push("last_name = ").push_bind_unseparated(last_name.clone());
            any = true;
        }
        if let Some(bio) = &changes.bio {
            set.push("bio = ").push_bind_unseparated(bio.clone());
            any = true;
        }
    }

    if any {
        builder.push(" WHERE id = ").push_bind(id);
        builder
            .build()
            .execute(pool)
            .await
            .map_err(conflict_or_database)?;
    }

    get_by_id(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("user {}", id)))
}

pub async fn set_confirmation_code(pool: &SqlitePool, id: i64, code: &str) -> Result<()> {
    sqlx::query("UPDATE users SET confirmation_code = ? WHERE id = ?")
        .bind(code)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete by username. Reviews and comments by the user cascade.
pub async fn delete_by_username(pool: &SqlitePool, username: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM users WHERE username = ?")
        .bind(username)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Create a superuser, or promote the existing account with the same identity
pub async fn upsert_superuser(pool: &SqlitePool, username: &str, email: &str) -> Result<User> {
    if let Some(existing) = get_by_identity(pool, username, email).await? {
        sqlx::query("UPDATE users SET role = ?, is_superuser = 1 WHERE id = ?")
            .bind(Role::Admin)
            .bind(existing.id)
            .execute(pool)
            .await?;
        return get_by_id(pool, existing.id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("user {}", existing.id)));
    }

    let user = insert(
        pool,
        &NewUser {
            username: username.to_string(),
            email: email.to_string(),
            role: Role::Admin,
            ..Default::default()
        },
    )
    .await?;

    sqlx::query("UPDATE users SET is_superuser = 1 WHERE id = ?")
        .bind(user.id)
        .execute(pool)
        .await?;

    get_by_id(pool, user.id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("user {}", user.id)))
}

fn conflict_or_database(err: sqlx::Error) -> Error {
    if crate::error::is_unique_violation(&err) {
        let message = err
            .as_database_error()
            .map(|db_err| db_err.message().to_string())
            .unwrap_or_default();
        Error::Conflict(message)
    } else {
        Error::Database(err)
    }
}
