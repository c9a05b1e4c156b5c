//! Review and comment queries
//!
//! Every lookup is scoped to its parent: a review is only found through its
//! title, a comment only through its review.

use chrono::Utc;
use sqlx::SqlitePool;

use super::models::{Comment, Review};
use crate::{Error, Result};

const REVIEW_SELECT: &str = "SELECT r.id, r.title_id, r.author_id, u.username AS author, \
     r.text, r.score, r.pub_date FROM reviews r JOIN users u ON u.id = r.author_id";

const COMMENT_SELECT: &str = "SELECT c.id, c.review_id, c.author_id, u.username AS author, \
     c.text, c.pub_date FROM comments c JOIN users u ON u.id = c.author_id";

// ---------------------------------------------------------------------------
// Reviews
// ---------------------------------------------------------------------------

/// Reviews of a title, newest first
pub async fn list_reviews(
    pool: &SqlitePool,
    title_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<Review>> {
    let reviews = sqlx::query_as::<_, Review>(&format!(
        "{} WHERE r.title_id = ? ORDER BY r.pub_date DESC, r.id DESC LIMIT ? OFFSET ?",
        REVIEW_SELECT
    ))
    .bind(title_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(reviews)
}

pub async fn count_reviews(pool: &SqlitePool, title_id: i64) -> Result<i64> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE title_id = ?")
        .bind(title_id)
        .fetch_one(pool)
        .await?;
    Ok(total)
}

pub async fn get_review(pool: &SqlitePool, title_id: i64, review_id: i64) -> Result<Option<Review>> {
    let review = sqlx::query_as::<_, Review>(&format!(
        "{} WHERE r.id = ? AND r.title_id = ?",
        REVIEW_SELECT
    ))
    .bind(review_id)
    .bind(title_id)
    .fetch_optional(pool)
    .await?;
    Ok(review)
}

/// Whether `author_id` already reviewed `title_id`
pub async fn has_reviewed(pool: &SqlitePool, title_id: i64, author_id: i64) -> Result<bool> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT id FROM reviews WHERE title_id = ? AND author_id = ?")
            .bind(title_id)
            .bind(author_id)
            .fetch_optional(pool)
            .await?;
    Ok(found.is_some())
}

/// Insert a review; a second review by the same author surfaces as `Error::Conflict`
pub async fn insert_review(
    pool: &SqlitePool,
    title_id: i64,
    author_id: i64,
    text: &str,
    score: i64,
) -> Result<Review> {
    let result = sqlx::query(
        "INSERT INTO reviews (title_id, author_id, text, score, pub_date) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(title_id)
    .bind(author_id)
    .bind(text)
    .bind(score)
    .bind(Utc::now())
    .execute(pool)
    .await
    .map_err(|e| {
        if crate::error::is_unique_violation(&e) {
            Error::Conflict("author already reviewed this title".to_string())
        } else {
            Error::Database(e)
        }
    })?;

    get_review(pool, title_id, result.last_insert_rowid())
        .await?
        .ok_or_else(|| Error::Internal("Inserted review vanished".to_string()))
}

pub async fn update_review(
    pool: &SqlitePool,
    title_id: i64,
    review_id: i64,
    text: Option<&str>,
    score: Option<i64>,
) -> Result<Review> {
    sqlx::query(
        "UPDATE reviews SET text = COALESCE(?, text), score = COALESCE(?, score) \
         WHERE id = ? AND title_id = ?",
    )
    .bind(text)
    .bind(score)
    .bind(review_id)
    .bind(title_id)
    .execute(pool)
    .await?;

    get_review(pool, title_id, review_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("review {}", review_id)))
}

/// Delete a review and, by cascade, its comments
pub async fn delete_review(pool: &SqlitePool, title_id: i64, review_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM reviews WHERE id = ? AND title_id = ?")
        .bind(review_id)
        .bind(title_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

/// Comments on a review, newest first
pub async fn list_comments(
    pool: &SqlitePool,
    review_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<Comment>> {
    let comments = sqlx::query_as::<_, Comment>(&format!(
        "{} WHERE c.review_id = ? ORDER BY c.pub_date DESC, c.id DESC LIMIT ? OFFSET ?",
        COMMENT_SELECT
    ))
    .bind(review_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(comments)
}

pub async fn count_comments(pool: &SqlitePool, review_id: i64) -> Result<i64> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE review_id = ?")
        .bind(review_id)
        .fetch_one(pool)
        .await?;
    Ok(total)
}

pub async fn get_comment(
    pool: &SqlitePool,
    review_id: i64,
    comment_id: i64,
) -> Result<Option<Comment>> {
    let comment = sqlx::query_as::<_, Comment>(&format!(
        "{} WHERE c.id = ? AND c.review_id = ?",
        COMMENT_SELECT
    ))
    .bind(comment_id)
    .bind(review_id)
    .fetch_optional(pool)
    .await?;
    Ok(comment)
}

pub async fn insert_comment(
    pool: &SqlitePool,
    review_id: i64,
    author_id: i64,
    text: &str,
) -> Result<Comment> {
    let result = sqlx::query(
        "INSERT INTO comments (review_id, author_id, text, pub_date) VALUES (?, ?, ?, ?)",
    )
    .bind(review_id)
    .bind(author_id)
    .bind(text)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    get_comment(pool, review_id, result.last_insert_rowid())
        .await?
        .ok_or_else(|| Error::Internal("Inserted comment vanished".to_string()))
}

pub async fn update_comment(
    pool: &SqlitePool,
    review_id: i64,
    comment_id: i64,
    text: Option<&str>,
) -> Result<Comment> {
    sqlx::query("UPDATE comments SET text = COALESCE(?, text) WHERE id = ? AND review_id = ?")
        .bind(text)
        .bind(comment_id)
        .bind(review_id)
        .execute(pool)
        .await?;

    get_comment(pool, review_id, comment_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("comment {}", comment_id)))
}

pub async fn delete_comment(pool: &SqlitePool, review_id: i64, comment_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM comments WHERE id = ? AND review_id = ?")
        .bind(comment_id)
        .bind(review_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
