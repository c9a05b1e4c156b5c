//! Tests for the query layer: constraints, cascades, aggregates and filters

use sqlx::SqlitePool;
use yamdb_common::db::titles::{self, TitleFilter, TitleOrder};
use yamdb_common::db::{
    init_memory_database, reviews, sections, users, NewTitle, NewUser, Role, SectionKind,
    TitleChanges, UserChanges,
};
use yamdb_common::Error;

async fn user(pool: &SqlitePool, username: &str) -> i64 {
    users::insert(
        pool,
        &NewUser {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .id
}

async fn title(pool: &SqlitePool, name: &str, year: i64, category: Option<i64>, genres: Vec<i64>) -> i64 {
    titles::insert(
        pool,
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

// =============================================================================
// Users
// =============================================================================

#[tokio::test]
async fn test_user_uniqueness_is_conflict() {
    let pool = init_memory_database().await.unwrap();
    user(&pool, "alice").await;

    let same_name = users::insert(
        &pool,
        &NewUser {
            username: "alice".to_string(),
            email: "other@example.com".to_string(),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(same_name, Err(Error::Conflict(_))));

    let same_email = users::insert(
        &pool,
        &NewUser {
            username: "alicia".to_string(),
            email: "alice@example.com".to_string(),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(same_email, Err(Error::Conflict(_))));
}

#[tokio::test]
async fn test_user_defaults_and_partial_update() {
    let pool = init_memory_database().await.unwrap();
    let id = user(&pool, "bob").await;

    let bob = users::get_by_id(&pool, id).await.unwrap().unwrap();
    assert_eq!(bob.role, Role::User);
    assert!(!bob.is_superuser);
    assert!(bob.confirmation_code.is_none());

    let updated = users::update(
        &pool,
        id,
        &UserChanges {
            bio: Some(Some("reads a lot".to_string())),
            role: Some(Role::Moderator),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(updated.username, "bob");
    assert_eq!(updated.bio.as_deref(), Some("reads a lot"));
    assert_eq!(updated.role, Role::Moderator);
}

#[tokio::test]
async fn test_user_search_and_order() {
    let pool = init_memory_database().await.unwrap();
    for name in ["zed", "anna", "hannah", "bob"] {
        user(&pool, name).await;
    }

    let all = users::list(&pool, None, 10, 0).await.unwrap();
    let names: Vec<_> = all.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(names, ["anna", "bob", "hannah", "zed"]);

    let found = users::list(&pool, Some("NN"), 10, 0).await.unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(users::count(&pool, Some("nn")).await.unwrap(), 2);
}

#[tokio::test]
async fn test_upsert_superuser_promotes_existing() {
    let pool = init_memory_database().await.unwrap();
    user(&pool, "boss").await;

    let boss = users::upsert_superuser(&pool, "boss", "boss@example.com").await.unwrap();
    assert_eq!(boss.role, Role::Admin);
    assert!(boss.is_superuser);
    assert!(boss.is_admin());

    let fresh = users::upsert_superuser(&pool, "chief", "chief@example.com").await.unwrap();
    assert!(fresh.is_superuser);
}

// =============================================================================
// Categories and genres
// =============================================================================

#[tokio::test]
async fn test_section_slug_unique_per_table() {
    let pool = init_memory_database().await.unwrap();

    sections::insert(&pool, SectionKind::Category, "Films", "films").await.unwrap();
    let dup = sections::insert(&pool, SectionKind::Category, "Movies", "films").await;
    assert!(matches!(dup, Err(Error::Conflict(_))));

    // Same slug in the other table is fine
    sections::insert(&pool, SectionKind::Genre, "Films", "films").await.unwrap();
}

#[tokio::test]
async fn test_resolve_slugs_reports_unknown() {
    let pool = init_memory_database().await.unwrap();
    sections::insert(&pool, SectionKind::Genre, "Drama", "drama").await.unwrap();

    let found = sections::resolve_slugs(&pool, SectionKind::Genre, &["drama".to_string()])
        .await
        .unwrap();
    assert_eq!(found.len(), 1);

    let missing = sections::resolve_slugs(
        &pool,
        SectionKind::Genre,
        &["drama".to_string(), "nope".to_string()],
    )
    .await;
    match missing {
        Err(Error::NotFound(slug)) => assert_eq!(slug, "nope"),
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_deleting_category_and_genre_nulls_references() {
    let pool = init_memory_database().await.unwrap();
    let films = sections::insert(&pool, SectionKind::Category, "Films", "films").await.unwrap();
    let drama = sections::insert(&pool, SectionKind::Genre, "Drama", "drama").await.unwrap();
    let comedy = sections::insert(&pool, SectionKind::Genre, "Comedy", "comedy").await.unwrap();

    let id = title(&pool, "Heat", 1995, Some(films.id), vec![drama.id, comedy.id]).await;

    assert!(sections::delete_by_slug(&pool, SectionKind::Category, "films").await.unwrap());
    assert!(sections::delete_by_slug(&pool, SectionKind::Genre, "drama").await.unwrap());
    assert!(!sections::delete_by_slug(&pool, SectionKind::Genre, "drama").await.unwrap());

    let heat = titles::get(&pool, id).await.unwrap().expect("title survives");
    assert!(heat.category.is_none());
    assert_eq!(heat.genres.len(), 1);
    assert_eq!(heat.genres[0].slug, "comedy");
}

// =============================================================================
// Titles
// =============================================================================

#[tokio::test]
async fn test_title_rating_is_average_score() {
    let pool = init_memory_database().await.unwrap();
    let a = user(&pool, "a").await;
    let b = user(&pool, "b").await;
    let id = title(&pool, "Solaris", 1972, None, vec![]).await;

    assert!(titles::get(&pool, id).await.unwrap().unwrap().rating.is_none());

    reviews::insert_review(&pool, id, a, "great", 9).await.unwrap();
    reviews::insert_review(&pool, id, b, "fine", 6).await.unwrap();

    let solaris = titles::get(&pool, id).await.unwrap().unwrap();
    assert_eq!(solaris.rating, Some(7.5));
}

#[tokio::test]
async fn test_title_filters() {
    let pool = init_memory_database().await.unwrap();
    let films = sections::insert(&pool, SectionKind::Category, "Films", "films").await.unwrap();
    let books = sections::insert(&pool, SectionKind::Category, "Books", "books").await.unwrap();
    let drama = sections::insert(&pool, SectionKind::Genre, "Drama", "drama").await.unwrap();
    let scifi = sections::insert(&pool, SectionKind::Genre, "Sci-Fi", "sci-fi").await.unwrap();

    title(&pool, "Solaris", 1972, Some(films.id), vec![drama.id, scifi.id]).await;
    title(&pool, "Solaris", 1961, Some(books.id), vec![scifi.id]).await;
    title(&pool, "Stalker", 1979, Some(films.id), vec![drama.id]).await;

    let by_category = TitleFilter {
        categories: vec!["films".to_string()],
        ..Default::default()
    };
    assert_eq!(titles::count(&pool, &by_category).await.unwrap(), 2);

    let by_genre = TitleFilter {
        genres: vec!["sci-fi".to_string()],
        ..Default::default()
    };
    assert_eq!(titles::count(&pool, &by_genre).await.unwrap(), 2);

    let by_name_and_year = TitleFilter {
        name: Some("olar".to_string()),
        year: Some(1961),
        ..Default::default()
    };
    let found = titles::list(&pool, &by_name_and_year, &[], 10, 0).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].category.as_ref().unwrap().slug, "books");

    // name filter is case-sensitive
    let lowercase = TitleFilter {
        name: Some("solaris".to_string()),
        ..Default::default()
    };
    assert_eq!(titles::count(&pool, &lowercase).await.unwrap(), 0);
}

#[tokio::test]
async fn test_title_ordering() {
    let pool = init_memory_database().await.unwrap();
    title(&pool, "B", 2000, None, vec![]).await;
    title(&pool, "A", 2000, None, vec![]).await;
    title(&pool, "C", 2010, None, vec![]).await;

    let default_order = titles::list(&pool, &TitleFilter::default(), &[], 10, 0)
        .await
        .unwrap();
    let names: Vec<_> = default_order.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["C", "A", "B"]);

    let by_name = titles::list(
        &pool,
        &TitleFilter::default(),
        &[TitleOrder::parse("-name").unwrap()],
        10,
        0,
    )
    .await
    .unwrap();
    let names: Vec<_> = by_name.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["C", "B", "A"]);
}

#[tokio::test]
async fn test_title_update_replaces_genres() {
    let pool = init_memory_database().await.unwrap();
    let drama = sections::insert(&pool, SectionKind::Genre, "Drama", "drama").await.unwrap();
    let scifi = sections::insert(&pool, SectionKind::Genre, "Sci-Fi", "sci-fi").await.unwrap();
    let id = title(&pool, "Solaris", 1972, None, vec![drama.id]).await;

    let updated = titles::update(
        &pool,
        id,
        &TitleChanges {
            year: Some(1971),
            genre_ids: Some(vec![scifi.id]),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(updated.year, 1971);
    assert_eq!(updated.name, "Solaris");
    assert_eq!(updated.genres.iter().map(|g| g.slug.as_str()).collect::<Vec<_>>(), ["sci-fi"]);
}

// =============================================================================
// Reviews and comments
// =============================================================================

#[tokio::test]
async fn test_one_review_per_author_and_title() {
    let pool = init_memory_database().await.unwrap();
    let author = user(&pool, "critic").await;
    let first = title(&pool, "First", 2001, None, vec![]).await;
    let second = title(&pool, "Second", 2002, None, vec![]).await;

    reviews::insert_review(&pool, first, author, "ok", 5).await.unwrap();
    assert!(reviews::has_reviewed(&pool, first, author).await.unwrap());

    let again = reviews::insert_review(&pool, first, author, "again", 6).await;
    assert!(matches!(again, Err(Error::Conflict(_))));

    // A different title is fine
    reviews::insert_review(&pool, second, author, "better", 8).await.unwrap();
}

#[tokio::test]
async fn test_score_range_enforced_by_store() {
    let pool = init_memory_database().await.unwrap();
    let author = user(&pool, "critic").await;
    let id = title(&pool, "Title", 2001, None, vec![]).await;

    assert!(reviews::insert_review(&pool, id, author, "too high", 11).await.is_err());
    assert!(reviews::insert_review(&pool, id, author, "too low", 0).await.is_err());
}

#[tokio::test]
async fn test_reviews_scoped_to_title() {
    let pool = init_memory_database().await.unwrap();
    let author = user(&pool, "critic").await;
    let first = title(&pool, "First", 2001, None, vec![]).await;
    let second = title(&pool, "Second", 2002, None, vec![]).await;

    let review = reviews::insert_review(&pool, first, author, "ok", 5).await.unwrap();

    assert!(reviews::get_review(&pool, first, review.id).await.unwrap().is_some());
    assert!(reviews::get_review(&pool, second, review.id).await.unwrap().is_none());
    assert!(!reviews::delete_review(&pool, second, review.id).await.unwrap());
    assert_eq!(reviews::count_reviews(&pool, second).await.unwrap(), 0);
}

#[tokio::test]
async fn test_deleting_title_cascades_to_reviews_and_comments() {
    let pool = init_memory_database().await.unwrap();
    let author = user(&pool, "critic").await;
    let id = title(&pool, "Doomed", 2001, None, vec![]).await;
    let review = reviews::insert_review(&pool, id, author, "meh", 4).await.unwrap();
    reviews::insert_comment(&pool, review.id, author, "agreed").await.unwrap();

    assert!(titles::delete(&pool, id).await.unwrap());

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
    assert_eq!(reviews::count_reviews(&pool, id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_deleting_user_removes_their_reviews_and_comments() {
    let pool = init_memory_database().await.unwrap();
    let leaving = user(&pool, "leaving").await;
    let staying = user(&pool, "staying").await;
    let id = title(&pool, "Title", 2001, None, vec![]).await;

    let own = reviews::insert_review(&pool, id, leaving, "mine", 6).await.unwrap();
    let other = reviews::insert_review(&pool, id, staying, "theirs", 8).await.unwrap();
    reviews::insert_comment(&pool, own.id, staying, "on the leaving review").await.unwrap();
    reviews::insert_comment(&pool, other.id, leaving, "by the leaving user").await.unwrap();
    reviews::insert_comment(&pool, other.id, staying, "self reply").await.unwrap();

    assert!(users::delete_by_username(&pool, "leaving").await.unwrap());

    assert_eq!(reviews::count_reviews(&pool, id).await.unwrap(), 1);
    assert!(reviews::get_review(&pool, id, own.id).await.unwrap().is_none());
    assert_eq!(reviews::count_comments(&pool, own.id).await.unwrap(), 0);

    let left = reviews::list_comments(&pool, other.id, 10, 0).await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].author, "staying");
}

#[tokio::test]
async fn test_comment_update_and_author_name() {
    let pool = init_memory_database().await.unwrap();
    let author = user(&pool, "critic").await;
    let id = title(&pool, "Title", 2001, None, vec![]).await;
    let review = reviews::insert_review(&pool, id, author, "meh", 4).await.unwrap();
    let comment = reviews::insert_comment(&pool, review.id, author, "first").await.unwrap();
    assert_eq!(comment.author, "critic");

    let edited = reviews::update_comment(&pool, review.id, comment.id, Some("edited"))
        .await
        .unwrap();
    assert_eq!(edited.text, "edited");

    let untouched = reviews::update_comment(&pool, review.id, comment.id, None)
        .await
        .unwrap();
    assert_eq!(untouched.text, "edited");
}
