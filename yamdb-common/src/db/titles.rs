//! Title queries
//!
//! Every read carries the average review score as `rating`.

use std::collections::HashMap;

use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::models::{NewTitle, Section, Title, TitleChanges, TitleRow};
use crate::{Error, Result};

const TITLE_SELECT: &str = "SELECT t.id, t.name, t.year, t.description, t.category_id, \
     (SELECT AVG(r.score) FROM reviews r WHERE r.title_id = t.id) AS rating \
     FROM titles t";

/// List filters; empty/`None` fields do not restrict
#[derive(Debug, Clone, Default)]
pub struct TitleFilter {
    /// Category slugs, any of
    pub categories: Vec<String>,
    /// Genre slugs, any of
    pub genres: Vec<String>,
    /// Case-sensitive substring of the name
    pub name: Option<String>,
    pub year: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleOrderField {
    Year,
    Rating,
    Name,
}

impl TitleOrderField {
    fn column(&self) -> &'static str {
        match self {
            TitleOrderField::Year => "t.year",
            TitleOrderField::Rating => "rating",
            TitleOrderField::Name => "t.name",
        }
    }
}

/// One ordering term, e.g. `-year`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TitleOrder {
    pub field: TitleOrderField,
    pub descending: bool,
}

impl TitleOrder {
    /// Parse a single `field` / `-field` term; unknown fields yield `None`
    pub fn parse(term: &str) -> Option<Self> {
        let term = term.trim();
        let (descending, name) = match term.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, term),
        };
        let field = match name {
            "year" => TitleOrderField::Year,
            "rating" => TitleOrderField::Rating,
            "name" => TitleOrderField::Name,
            _ => return None,
        };
        Some(Self { field, descending })
    }

    /// Default listing order: newest first, then by name
    pub fn defaults() -> Vec<Self> {
        vec![
            Self {
                field: TitleOrderField::Year,
                descending: true,
            },
            Self {
                field: TitleOrderField::Name,
                descending: false,
            },
        ]
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &TitleFilter) {
    builder.push(" WHERE 1 = 1");

    if !filter.categories.is_empty() {
        builder.push(" AND t.category_id IN (SELECT c.id FROM categories c WHERE c.slug IN (");
        let mut slugs = builder.separated(", ");
        for slug in &filter.categories {
            slugs.push_bind(slug.clone());
        }
        builder.push("))");
    }

    if !filter.genres.is_empty() {
        builder.push(
            " AND EXISTS (SELECT 1 FROM genre_title gt JOIN genres g ON g.id = gt.genre_id \
             WHERE gt.title_id = t.id AND g.slug IN (",
        );
        let mut slugs = builder.separated(", ");
        for slug in &filter.genres {
            slugs.push_bind(slug.clone());
        }
        builder.push("))");
    }

    if let Some(name) = filter.name.as_ref().filter(|n| !n.is_empty()) {
        builder
            .push(" AND instr(t.name, ")
            .push_bind(name.clone())
            .push(") > 0");
    }

    if let Some(year) = filter.year {
        builder.push(" AND t.year = ").push_bind(year);
    }
}

pub async fn list(
    pool: &SqlitePool,
    filter: &TitleFilter,
    ordering: &[TitleOrder],
    limit: i64,
    offset: i64,
) -> Result<Vec<Title>> {
    let mut builder = QueryBuilder::<Sqlite>::new(TITLE_SELECT);
    push_filter(&mut builder, filter);

    let ordering = if ordering.is_empty() {
        TitleOrder::defaults()
    } else {
        ordering.to_vec()
    };
    builder.push(" ORDER BY ");
    for order in &ordering {
        builder
            .push(order.field.column())
            .push(if order.descending { " DESC, " } else { " ASC, " });
    }
    builder
        .push("t.id ASC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows = builder.build_query_as::<TitleRow>().fetch_all(pool).await?;
    hydrate(pool, rows).await
}

pub async fn count(pool: &SqlitePool, filter: &TitleFilter) -> Result<i64> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM titles t");
    push_filter(&mut builder, filter);
    let total = builder.build_query_scalar::<i64>().fetch_one(pool).await?;
    Ok(total)
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<Title>> {
    let row = sqlx::query_as::<_, TitleRow>(&format!("{} WHERE t.id = ?", TITLE_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(hydrate(pool, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

pub async fn exists(pool: &SqlitePool, id: i64) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM titles WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

/// Attach categories and genres to raw rows
async fn hydrate(pool: &SqlitePool, rows: Vec<TitleRow>) -> Result<Vec<Title>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let mut genres_by_title: HashMap<i64, Vec<Section>> = HashMap::new();
    {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT gt.title_id, g.id, g.name, g.slug FROM genre_title gt \
             JOIN genres g ON g.id = gt.genre_id WHERE gt.title_id IN (",
        );
        let mut ids = builder.separated(", ");
        for row in &rows {
            ids.push_bind(row.id);
        }
        builder.push(") ORDER BY g.name, g.id");

        let links: Vec<(i64, i64, String, String)> =
            builder.build_query_as().fetch_all(pool).await?;
        for (title_id, id, name, slug) in links {
            genres_by_title
                .entry(title_id)
                .or_default()
                .push(Section { id, name, slug });
        }
    }

    let mut categories: HashMap<i64, Section> = HashMap::new();
    for category_id in rows.iter().filter_map(|r| r.category_id) {
        if categories.contains_key(&category_id) {
            continue;
        }
        let category = sqlx::query_as::<_, Section>(
            "SELECT id, name, slug FROM categories WHERE id = ?",
        )
        .bind(category_id)
        .fetch_optional(pool)
        .await?;
        if let Some(category) = category {
            categories.insert(category_id, category);
        }
    }

    Ok(rows
        .into_iter()
        .map(|row| Title {
            id: row.id,
            name: row.name,
            year: row.year,
            description: row.description,
            rating: row.rating,
            category: row.category_id.and_then(|id| categories.get(&id).cloned()),
            genres: genres_by_title.remove(&row.id).unwrap_or_default(),
        })
        .collect())
}

/// Insert a title with its genre links in one transaction
pub async fn insert(pool: &SqlitePool, new_title: &NewTitle) -> Result<Title> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "INSERT INTO titles (name, year, description, category_id) VALUES (?, ?, ?, ?)",
    )
    .bind(&new_title.name)
    .bind(new_title.year)
    .bind(&new_title.description)
    .bind(new_title.category_id)
    .execute(&mut *tx)
    .await?;
    let id = result.last_insert_rowid();

    for genre_id in &new_title.genre_ids {
        sqlx::query("INSERT INTO genre_title (genre_id, title_id) VALUES (?, ?)")
            .bind(genre_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    get(pool, id)
        .await?
        .ok_or_else(|| Error::Internal("Inserted title vanished".to_string()))
}

/// Apply a partial update; replaced genre lists rewrite every link
pub async fn update(pool: &SqlitePool, id: i64, changes: &TitleChanges) -> Result<Title> {
    let mut tx = pool.begin().await?;

    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE titles SET ");
    let mut any = false;
    {
        let mut set = builder.separated(", ");
        if let Some(name) = &changes.name {
            set.push("name = ").push_bind_unseparated(name.clone());
            any = true;
        }
        if let Some(year) = changes.year {
            set.push("year = ").push_bind_unseparated(year);
            any = true;
        }
        if let Some(description) = &changes.description {
            set.push("description = ").push_bind_unseparated(description.clone());
            any = true;
        }
        if let Some(category_id) = changes.category_id {
            set.push("category_id = ").push_bind_unseparated(category_id);
            any = true;
        }
    }
    if any {
        builder.push(" WHERE id = ").push_bind(id);
        builder.build().execute(&mut *tx).await?;
    }

    if let Some(genre_ids) = &changes.genre_ids {
        sqlx::query("DELETE FROM genre_title WHERE title_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        for genre_id in genre_ids {
            sqlx::query("INSERT INTO genre_title (genre_id, title_id) VALUES (?, ?)")
                .bind(genre_id)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
    }

    tx.commit().await?;

    get(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("title {}", id)))
}

/// Delete a title; reviews, their comments and genre links cascade
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM titles WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
