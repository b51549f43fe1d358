//! Project table queries

use super::{format_timestamp, parse_timestamp};
use crate::models::{Project, RawProject};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use trendmine_common::Result;

const PROJECT_COLUMNS: &str = "id, owner, name, full_name, description, repository_url, \
     homepage_url, language, stars_count, forks_count, trending_date, last_updated, created_at";

/// Read-side filter for project listings
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    /// Substring match on full name or description
    pub search: Option<String>,
    /// Programming language, case-insensitive
    pub language: Option<String>,
    pub trending_since: Option<DateTime<Utc>>,
}

impl ProjectFilter {
    fn push_conditions<'a>(&'a self, builder: &mut QueryBuilder<'a, Sqlite>) {
        builder.push(" WHERE 1 = 1");

        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = format!("%{}%", search.trim());
            builder
                .push(" AND (full_name LIKE ")
                .push_bind(pattern.clone())
                .push(" OR description LIKE ")
                .push_bind(pattern)
                .push(")");
        }

        if let Some(language) = self.language.as_deref().filter(|l| !l.trim().is_empty()) {
            builder
                .push(" AND language = ")
                .push_bind(language.trim())
                .push(" COLLATE NOCASE");
        }

        if let Some(since) = self.trending_since {
            builder
                .push(" AND trending_date >= ")
                .push_bind(format_timestamp(since));
        }
    }
}

/// Number of projects per programming language
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageCount {
    pub language: String,
    pub count: i64,
}

fn project_from_row(row: &SqliteRow) -> Result<Project> {
    let trending_date: String = row.try_get("trending_date")?;
    let last_updated: String = row.try_get("last_updated")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(Project {
        id: row.try_get("id")?,
        owner: row.try_get("owner")?,
        name: row.try_get("name")?,
        full_name: row.try_get("full_name")?,
        description: row.try_get("description")?,
        repository_url: row.try_get("repository_url")?,
        homepage_url: row.try_get("homepage_url")?,
        language: row.try_get("language")?,
        stars_count: row.try_get("stars_count")?,
        forks_count: row.try_get("forks_count")?,
        trending_date: parse_timestamp(&trending_date)?,
        last_updated: parse_timestamp(&last_updated)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

/// Insert a first sighting; returns false when the identity already exists
pub async fn insert_project_if_absent(
    pool: &SqlitePool,
    candidate: &RawProject,
    now: DateTime<Utc>,
) -> Result<bool> {
    let now = format_timestamp(now);

    let result = sqlx::query(
        r#"
        INSERT INTO projects (
            owner, name, full_name, description, repository_url, homepage_url,
            language, stars_count, forks_count, trending_date, last_updated, created_at
        )
        VALUES (?, ?, ?, ?, ?, NULL, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(full_name) DO NOTHING
        "#,
    )
    .bind(&candidate.owner)
    .bind(&candidate.name)
    .bind(candidate.full_name())
    .bind(&candidate.description)
    .bind(candidate.repository_url())
    .bind(&candidate.language)
    .bind(candidate.stars_count)
    .bind(candidate.forks_count)
    .bind(&now)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Merge a repeat sighting into the stored row
///
/// Counts and trending date always follow the candidate; description and
/// language only when the candidate has them.
pub async fn merge_project_sighting(
    pool: &SqlitePool,
    candidate: &RawProject,
    now: DateTime<Utc>,
) -> Result<()> {
    let now = format_timestamp(now);

    sqlx::query(
        r#"
        UPDATE projects
        SET stars_count = ?,
            forks_count = ?,
            trending_date = ?,
            last_updated = ?,
            description = COALESCE(?, description),
            language = COALESCE(?, language)
        WHERE full_name = ?
        "#,
    )
    .bind(candidate.stars_count)
    .bind(candidate.forks_count)
    .bind(&now)
    .bind(&now)
    .bind(&candidate.description)
    .bind(&candidate.language)
    .bind(candidate.full_name())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn find_project_by_full_name(
    pool: &SqlitePool,
    full_name: &str,
) -> Result<Option<Project>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM projects WHERE full_name = ?",
        PROJECT_COLUMNS
    ))
    .bind(full_name)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(project_from_row).transpose()
}

pub async fn find_project_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Project>> {
    let row = sqlx::query(&format!("SELECT {} FROM projects WHERE id = ?", PROJECT_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(project_from_row).transpose()
}

/// Page of projects, most recently trending first, then by stars
pub async fn list_projects(
    pool: &SqlitePool,
    filter: &ProjectFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<Project>> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM projects", PROJECT_COLUMNS));
    filter.push_conditions(&mut builder);
    builder
        .push(" ORDER BY trending_date DESC, stars_count DESC, id ASC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows = builder.build().fetch_all(pool).await?;
    rows.iter().map(project_from_row).collect()
}

pub async fn count_projects(pool: &SqlitePool, filter: &ProjectFilter) -> Result<i64> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM projects");
    filter.push_conditions(&mut builder);

    let count = builder.build_query_scalar::<i64>().fetch_one(pool).await?;
    Ok(count)
}

pub async fn count_projects_created_since(pool: &SqlitePool, since: DateTime<Utc>) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE created_at >= ?")
        .bind(format_timestamp(since))
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Programming languages by project count, largest first
pub async fn language_counts(pool: &SqlitePool, limit: Option<i64>) -> Result<Vec<LanguageCount>> {
    let rows = sqlx::query(
        r#"
        SELECT language, COUNT(*) AS count
        FROM projects
        WHERE language IS NOT NULL AND language != ''
        GROUP BY language
        ORDER BY count DESC, language ASC
        LIMIT ?
        "#,
    )
    .bind(limit.unwrap_or(-1))
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<LanguageCount> {
            Ok(LanguageCount {
                language: row.try_get("language")?,
                count: row.try_get("count")?,
            })
        })
        .collect()
}

/// Projects lacking a successful insight in at least one of `languages`
pub async fn projects_missing_insights(
    pool: &SqlitePool,
    languages: &[&str],
    limit: i64,
) -> Result<Vec<Project>> {
    if languages.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM projects p WHERE (SELECT COUNT(*) FROM project_insights i \
         WHERE i.project_id = p.id AND i.analysis_status = 'success' AND i.language IN (",
        PROJECT_COLUMNS
    ));
    {
        let mut separated = builder.separated(", ");
        for language in languages {
            separated.push_bind(*language);
        }
        separated.push_unseparated(")) < ");
    }
    builder
        .push_bind(languages.len() as i64)
        .push(" ORDER BY p.trending_date DESC, p.stars_count DESC, p.id ASC LIMIT ")
        .push_bind(limit);

    let rows = builder.build().fetch_all(pool).await?;
    rows.iter().map(project_from_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use trendmine_common::db::init_memory_database;

    fn candidate(owner: &str, name: &str, language: Option<&str>, stars: i64) -> RawProject {
        RawProject {
            language: language.map(str::to_string),
            stars_count: stars,
            description: Some(format!("{} by {}", name, owner)),
            ..RawProject::new(owner, name)
        }
    }

    #[tokio::test]
    async fn test_insert_is_first_writer_only() {
        let pool = init_memory_database().await.unwrap();
        let raw = candidate("acme", "widget", Some("Rust"), 10);

        assert!(insert_project_if_absent(&pool, &raw, Utc::now()).await.unwrap());
        assert!(!insert_project_if_absent(&pool, &raw, Utc::now()).await.unwrap());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_merge_keeps_description_when_candidate_has_none() {
        let pool = init_memory_database().await.unwrap();
        let raw = candidate("acme", "widget", Some("Rust"), 10);
        insert_project_if_absent(&pool, &raw, Utc::now()).await.unwrap();

        let mut again = RawProject::new("acme", "widget");
        again.stars_count = 25;
        merge_project_sighting(&pool, &again, Utc::now()).await.unwrap();

        let stored = find_project_by_full_name(&pool, "acme/widget").await.unwrap().unwrap();
        assert_eq!(stored.stars_count, 25);
        assert_eq!(stored.description.as_deref(), Some("widget by acme"));
        assert_eq!(stored.language.as_deref(), Some("Rust"));
    }

    #[tokio::test]
    async fn test_list_filters_and_orders() {
        let pool = init_memory_database().await.unwrap();
        let now = Utc::now();
        for raw in [
            candidate("acme", "widget", Some("Rust"), 10),
            candidate("acme", "gadget", Some("Go"), 50),
            candidate("other", "thing", Some("rust"), 30),
        ] {
            insert_project_if_absent(&pool, &raw, now).await.unwrap();
        }

        let rust = ProjectFilter {
            language: Some("RUST".to_string()),
            ..Default::default()
        };
        let page = list_projects(&pool, &rust, 10, 0).await.unwrap();
        let names: Vec<_> = page.iter().map(|p| p.full_name.as_str()).collect();
        assert_eq!(names, vec!["other/thing", "acme/widget"]);
        assert_eq!(count_projects(&pool, &rust).await.unwrap(), 2);

        let search = ProjectFilter {
            search: Some("gadg".to_string()),
            ..Default::default()
        };
        assert_eq!(count_projects(&pool, &search).await.unwrap(), 1);

        let all = list_projects(&pool, &ProjectFilter::default(), 2, 1).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].full_name, "other/thing");
    }

    #[tokio::test]
    async fn test_language_counts() {
        let pool = init_memory_database().await.unwrap();
        let now = Utc::now();
        for raw in [
            candidate("a", "one", Some("Rust"), 1),
            candidate("a", "two", Some("Rust"), 1),
            candidate("a", "three", Some("Go"), 1),
            candidate("a", "four", None, 1),
        ] {
            insert_project_if_absent(&pool, &raw, now).await.unwrap();
        }

        let counts = language_counts(&pool, None).await.unwrap();
        assert_eq!(
            counts,
            vec![
                LanguageCount { language: "Rust".to_string(), count: 2 },
                LanguageCount { language: "Go".to_string(), count: 1 },
            ]
        );
        assert_eq!(language_counts(&pool, Some(1)).await.unwrap().len(), 1);
    }
}
