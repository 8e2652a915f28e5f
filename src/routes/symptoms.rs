use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

use crate::ai::prompt::{symptom_analysis_prompt, SymptomReport};
use crate::db::{self, fetch_user, UserContext};
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::models::{InsightSource, SymptomCount, SymptomEntry, UserQuery};
use crate::routes::cycle::clean_symptoms;
use crate::routes::insights::generate_and_store;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct NewSymptomEntry {
    pub user_id: Uuid,
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[validate(range(min = 0, max = 10))]
    pub pain_level: Option<i32>,
    #[validate(range(min = 0, max = 10))]
    pub mood_level: Option<i32>,
    #[validate(range(min = 0, max = 10))]
    pub energy_level: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SymptomEntryUpdate {
    pub date: Option<NaiveDate>,
    pub symptoms: Option<Vec<String>>,
    #[validate(range(min = 0, max = 10))]
    pub pain_level: Option<i32>,
    #[validate(range(min = 0, max = 10))]
    pub mood_level: Option<i32>,
    #[validate(range(min = 0, max = 10))]
    pub energy_level: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SymptomAnalysisRequest {
    pub user_id: Uuid,
    #[validate(length(min = 1))]
    pub symptoms: Vec<String>,
    #[validate(range(min = 0, max = 10))]
    pub pain_level: Option<i32>,
    #[validate(range(min = 0, max = 10))]
    pub mood_level: Option<i32>,
    #[validate(range(min = 0, max = 10))]
    pub energy_level: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FrequencyQuery {
    pub user_id: Uuid,
    pub limit: Option<usize>,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/symptoms", post(log_symptoms).get(list_symptoms))
        .route("/symptoms/:id", put(update_symptoms).delete(delete_symptoms))
        .route("/symptoms/frequency", get(get_symptom_frequency))
        .route("/symptoms/analyze", post(analyze_symptoms))
        .with_state(state)
}

async fn log_symptoms(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewSymptomEntry>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    body.validate()?;
    fetch_user(&state.pool, body.user_id).await?;

    let entry = sqlx::query_as::<_, SymptomEntry>(
        r#"
        INSERT INTO symptoms (id, user_id, date, symptoms, pain_level, mood_level, energy_level, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(body.user_id)
    .bind(body.date.unwrap_or_else(db::today))
    .bind(clean_symptoms(body.symptoms))
    .bind(body.pain_level)
    .bind(body.mood_level)
    .bind(body.energy_level)
    .bind(body.notes)
    .fetch_one(&state.pool)
    .await?;

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "entry": entry }))))
}

async fn list_symptoms(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> ApiResult<Json<Value>> {
    let entries = sqlx::query_as::<_, SymptomEntry>(
        "SELECT * FROM symptoms WHERE user_id = $1 ORDER BY date DESC, created_at DESC",
    )
    .bind(query.user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(json!({ "success": true, "entries": entries })))
}

async fn update_symptoms(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<SymptomEntryUpdate>,
) -> ApiResult<Json<Value>> {
    body.validate()?;

    let entry = sqlx::query_as::<_, SymptomEntry>(
        r#"
        UPDATE symptoms SET
            date = COALESCE($2, date),
            symptoms = COALESCE($3, symptoms),
            pain_level = COALESCE($4, pain_level),
            mood_level = COALESCE($5, mood_level),
            energy_level = COALESCE($6, energy_level),
            notes = COALESCE($7, notes)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(body.date)
    .bind(body.symptoms.map(clean_symptoms))
    .bind(body.pain_level)
    .bind(body.mood_level)
    .bind(body.energy_level)
    .bind(body.notes)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(ApiError::NotFound("Symptom entry not found"))?;

    Ok(Json(json!({ "success": true, "entry": entry })))
}

async fn delete_symptoms(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Json<Value>> {
    let result = sqlx::query("DELETE FROM symptoms WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Symptom entry not found"));
    }

    Ok(Json(json!({ "success": true, "message": "Symptom entry deleted" })))
}

/// Most frequent symptoms first, ties broken alphabetically.
pub fn symptom_frequency<'a, I>(logs: I) -> Vec<SymptomCount>
where
    I: IntoIterator<Item = &'a Vec<String>>,
{
    let mut counts = BTreeMap::<&str, i64>::new();
    for symptoms in logs {
        for symptom in symptoms {
            *counts.entry(symptom.as_str()).or_default() += 1;
        }
    }

    let mut result: Vec<SymptomCount> = counts
        .into_iter()
        .map(|(symptom, count)| SymptomCount {
            symptom: symptom.to_string(),
            count,
        })
        .collect();
    // stable sort keeps the alphabetical order from the BTreeMap for ties
    result.sort_by(|a, b| b.count.cmp(&a.count));
    result
}

/// Symptom counts over a user's daily logs and cycle records, or over
/// everyone when `user_id` is `None`.
pub async fn load_symptom_frequency(pool: &PgPool, user_id: Option<Uuid>) -> ApiResult<Vec<SymptomCount>> {
    let rows: Vec<(Vec<String>,)> = sqlx::query_as(
        r#"
        SELECT symptoms FROM symptoms WHERE $1::uuid IS NULL OR user_id = $1
        UNION ALL
        SELECT symptoms FROM cycles WHERE $1::uuid IS NULL OR user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(symptom_frequency(rows.iter().map(|(s,)| s)))
}

async fn get_symptom_frequency(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<FrequencyQuery>,
) -> ApiResult<Json<Value>> {
    let mut frequency = load_symptom_frequency(&state.pool, Some(query.user_id)).await?;
    if let Some(limit) = query.limit {
        frequency.truncate(limit);
    }

    Ok(Json(json!({ "success": true, "frequency": frequency })))
}

async fn analyze_symptoms(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SymptomAnalysisRequest>,
) -> ApiResult<Json<Value>> {
    body.validate()?;

    let ctx = UserContext::load(&state.pool, body.user_id, db::today()).await?;
    let report = SymptomReport {
        symptoms: clean_symptoms(body.symptoms),
        pain_level: body.pain_level,
        mood_level: body.mood_level,
        energy_level: body.energy_level,
        notes: body.notes,
    };
    let prompt = symptom_analysis_prompt(&ctx.prompt_context(), &report);

    let record = generate_and_store(&state, body.user_id, InsightSource::SymptomAnalysis, &prompt).await?;

    Ok(Json(json!({
        "success": true,
        "phase": ctx.status.as_ref().map(|s| s.phase),
        "analysis": record,
    })))
}
