//! Insight table queries

use super::{format_timestamp, parse_timestamp};
use crate::models::{AnalysisStatus, Insight, InsightFields, InsightPayload, Language};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use trendmine_common::Result;

const INSIGHT_COLUMNS: &str = "id, project_id, language, business_value, market_opportunity, \
     startup_ideas, target_audience, competition_analysis, analysis_version, analysis_status, \
     created_at, last_updated";

fn insight_from_row(row: &SqliteRow) -> Result<Insight> {
    let language: String = row.try_get("language")?;
    let status: String = row.try_get("analysis_status")?;
    let created_at: String = row.try_get("created_at")?;
    let last_updated: String = row.try_get("last_updated")?;

    Ok(Insight {
        id: row.try_get("id")?,
        project_id: row.try_get("project_id")?,
        language: language.parse()?,
        fields: InsightFields {
            business_value: row.try_get("business_value")?,
            market_opportunity: row.try_get("market_opportunity")?,
            startup_ideas: row.try_get("startup_ideas")?,
            target_audience: row.try_get("target_audience")?,
            competition_analysis: row.try_get("competition_analysis")?,
        },
        analysis_version: row.try_get("analysis_version")?,
        analysis_status: status.parse()?,
        created_at: parse_timestamp(&created_at)?,
        last_updated: parse_timestamp(&last_updated)?,
    })
}

pub async fn find_insight(
    pool: &SqlitePool,
    project_id: i64,
    language: Language,
) -> Result<Option<Insight>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM project_insights WHERE project_id = ? AND language = ?",
        INSIGHT_COLUMNS
    ))
    .bind(project_id)
    .bind(language.code())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(insight_from_row).transpose()
}

/// Insert a new row; fails with a unique violation if one already exists
pub async fn insert_insight(
    pool: &SqlitePool,
    project_id: i64,
    payload: &InsightPayload,
    now: DateTime<Utc>,
) -> Result<i64> {
    let now = format_timestamp(now);

    let result = sqlx::query(
        r#"
        INSERT INTO project_insights (
            project_id, language, business_value, market_opportunity, startup_ideas,
            target_audience, competition_analysis, analysis_version, analysis_status,
            created_at, last_updated
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(project_id)
    .bind(payload.language.code())
    .bind(&payload.fields.business_value)
    .bind(&payload.fields.market_opportunity)
    .bind(&payload.fields.startup_ideas)
    .bind(&payload.fields.target_audience)
    .bind(&payload.fields.competition_analysis)
    .bind(&payload.analysis_version)
    .bind(payload.status.as_str())
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Overwrite an existing row in place
///
/// A stored `success` is never replaced by a `failed` payload; returns false
/// when the guard kept the row unchanged.
pub async fn update_insight(
    pool: &SqlitePool,
    id: i64,
    payload: &InsightPayload,
    now: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE project_insights
        SET business_value = ?,
            market_opportunity = ?,
            startup_ideas = ?,
            target_audience = ?,
            competition_analysis = ?,
            analysis_version = ?,
            analysis_status = ?,
            last_updated = ?
        WHERE id = ?
          AND (analysis_status != 'success' OR ? = 'success')
        "#,
    )
    .bind(&payload.fields.business_value)
    .bind(&payload.fields.market_opportunity)
    .bind(&payload.fields.startup_ideas)
    .bind(&payload.fields.target_audience)
    .bind(&payload.fields.competition_analysis)
    .bind(&payload.analysis_version)
    .bind(payload.status.as_str())
    .bind(format_timestamp(now))
    .bind(id)
    .bind(payload.status.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn has_successful_insight(
    pool: &SqlitePool,
    project_id: i64,
    language: Language,
) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM project_insights WHERE project_id = ? AND language = ? AND analysis_status = ?",
    )
    .bind(project_id)
    .bind(language.code())
    .bind(AnalysisStatus::Success.as_str())
    .fetch_optional(pool)
    .await?;

    Ok(found.is_some())
}

/// Row counts per analysis status as (status, count)
pub async fn count_by_status(pool: &SqlitePool) -> Result<Vec<(String, i64)>> {
    let rows = sqlx::query(
        "SELECT analysis_status, COUNT(*) AS count FROM project_insights GROUP BY analysis_status",
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<(String, i64)> {
            Ok((row.try_get("analysis_status")?, row.try_get("count")?))
        })
        .collect()
}
