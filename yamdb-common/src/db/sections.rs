//! Category and genre queries
//!
//! Both tables have the same `(id, name, slug)` shape, so one set of queries
//! serves both, parameterized by [`SectionKind`].

use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::models::Section;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Category,
    Genre,
}

impl SectionKind {
    pub fn table(&self) -> &'static str {
        match self {
            SectionKind::Category => "categories",
            SectionKind::Genre => "genres",
        }
    }

    /// Human readable singular name used in messages
    pub fn label(&self) -> &'static str {
        match self {
            SectionKind::Category => "category",
            SectionKind::Genre => "genre",
        }
    }
}

fn push_search(builder: &mut QueryBuilder<'_, Sqlite>, search: Option<&str>) {
    if let Some(term) = search.filter(|t| !t.is_empty()) {
        builder
            .push(" WHERE instr(lower(name), lower(")
            .push_bind(term.to_string())
            .push(")) > 0");
    }
}

/// Sections ordered by name, optionally filtered by a name substring
pub async fn list(
    pool: &SqlitePool,
    kind: SectionKind,
    search: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Section>> {
    let mut builder =
        QueryBuilder::<Sqlite>::new(format!("SELECT id, name, slug FROM {}", kind.table()));
    push_search(&mut builder, search);
    builder
        .push(" ORDER BY name, id LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows = builder.build_query_as::<Section>().fetch_all(pool).await?;
    Ok(rows)
}

pub async fn count(pool: &SqlitePool, kind: SectionKind, search: Option<&str>) -> Result<i64> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT COUNT(*) FROM {}", kind.table()));
    push_search(&mut builder, search);
    let total = builder.build_query_scalar::<i64>().fetch_one(pool).await?;
    Ok(total)
}

pub async fn get_by_slug(
    pool: &SqlitePool,
    kind: SectionKind,
    slug: &str,
) -> Result<Option<Section>> {
    let row = sqlx::query_as::<_, Section>(&format!(
        "SELECT id, name, slug FROM {} WHERE slug = ?",
        kind.table()
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Resolve slugs to rows, preserving the order of `slugs`.
///
/// Returns `Error::NotFound` naming the first unknown slug.
pub async fn resolve_slugs(
    pool: &SqlitePool,
    kind: SectionKind,
    slugs: &[String],
) -> Result<Vec<Section>> {
    let mut resolved = Vec::with_capacity(slugs.len());
    for slug in slugs {
        match get_by_slug(pool, kind, slug).await? {
            Some(section) => {
                if !resolved.iter().any(|s: &Section| s.id == section.id) {
                    resolved.push(section);
                }
            }
            None => return Err(Error::NotFound(slug.clone())),
        }
    }
    Ok(resolved)
}

/// Insert a section; a taken slug surfaces as `Error::Conflict`
pub async fn insert(
    pool: &SqlitePool,
    kind: SectionKind,
    name: &str,
    slug: &str,
) -> Result<Section> {
    let result = sqlx::query(&format!(
        "INSERT INTO {} (name, slug) VALUES (?, ?)",
        kind.table()
    ))
    .bind(name)
    .bind(slug)
    .execute(pool)
    .await
    .map_err(|e| {
        if crate::error::is_unique_violation(&e) {
            Error::Conflict(format!("{} with this slug already exists.", kind.label()))
        } else {
            Error::Database(e)
        }
    })?;

    Ok(Section {
        id: result.last_insert_rowid(),
        name: name.to_string(),
        slug: slug.to_string(),
    })
}

/// Delete by slug. Titles keep existing with the reference nulled.
pub async fn delete_by_slug(pool: &SqlitePool, kind: SectionKind, slug: &str) -> Result<bool> {
    let result = sqlx::query(&format!("DELETE FROM {} WHERE slug = ?", kind.table()))
        .bind(slug)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
