use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::cycle::Forecast;
use crate::db::{self, fetch_user, last_period_start, status_for};
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::models::{CycleRecord, FlowLevel, Mood, UserQuery};
use crate::routes::users::{check_lengths, check_period_date};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct NewCycle {
    pub user_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[validate(range(min = 1, max = 120))]
    pub cycle_length: Option<i32>,
    #[validate(range(min = 1, max = 30))]
    pub period_length: Option<i32>,
    #[serde(default)]
    pub flow: FlowLevel,
    #[serde(default)]
    pub mood: Mood,
    #[validate(range(min = 34.0, max = 43.0))]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub symptoms: Vec<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CycleUpdate {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[validate(range(min = 1, max = 120))]
    pub cycle_length: Option<i32>,
    #[validate(range(min = 1, max = 30))]
    pub period_length: Option<i32>,
    pub flow: Option<FlowLevel>,
    pub mood: Option<Mood>,
    #[validate(range(min = 34.0, max = 43.0))]
    pub temperature: Option<f64>,
    pub symptoms: Option<Vec<String>>,
    pub notes: Option<String>,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/cycle", get(get_cycle_summary))
        .route("/cycles", post(create_cycle).get(list_cycles))
        .route("/cycles/:id", put(update_cycle).delete(delete_cycle))
        .with_state(state)
}

fn check_dates(start: NaiveDate, end: Option<NaiveDate>) -> ApiResult<()> {
    match end {
        Some(end) if end < start => Err(ApiError::Validation(
            "end_date must not be before start_date".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Days between start and end of bleeding, both inclusive.
fn period_days(start: NaiveDate, end: NaiveDate) -> i32 {
    ((end - start).num_days() + 1) as i32
}

pub fn clean_symptoms(symptoms: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(symptoms.len());
    for symptom in symptoms {
        let symptom = symptom.trim().to_lowercase();
        if !symptom.is_empty() && !cleaned.contains(&symptom) {
            cleaned.push(symptom);
        }
    }
    cleaned
}

async fn create_cycle(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewCycle>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    body.validate()?;
    check_dates(body.start_date, body.end_date)?;
    let today = db::today();
    check_period_date("start_date", Some(body.start_date), today)?;
    check_period_date("end_date", body.end_date, today)?;

    let user = fetch_user(&state.pool, body.user_id).await?;
    let cycle_length = body.cycle_length.unwrap_or(user.cycle_length);
    let period_length = body
        .period_length
        .or_else(|| body.end_date.map(|end| period_days(body.start_date, end)))
        .unwrap_or(user.period_length);
    check_lengths(cycle_length, period_length)?;

    let cycle = sqlx::query_as::<_, CycleRecord>(
        r#"
        INSERT INTO cycles (id, user_id, start_date, end_date, cycle_length, period_length,
                            flow, mood, temperature, symptoms, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(body.user_id)
    .bind(body.start_date)
    .bind(body.end_date)
    .bind(cycle_length)
    .bind(period_length)
    .bind(body.flow)
    .bind(body.mood)
    .bind(body.temperature)
    .bind(clean_symptoms(body.symptoms))
    .bind(body.notes)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!("🩸 Logged cycle {} for user {}", cycle.id, cycle.user_id);

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "cycle": cycle }))))
}

async fn list_cycles(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<UserQuery>,
) -> ApiResult<Json<Value>> {
    let cycles = sqlx::query_as::<_, CycleRecord>(
        "SELECT * FROM cycles WHERE user_id = $1 ORDER BY start_date DESC",
    )
    .bind(params.user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(json!({ "success": true, "cycles": cycles })))
}

async fn update_cycle(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<CycleUpdate>,
) -> ApiResult<Json<Value>> {
    body.validate()?;
    let today = db::today();
    check_period_date("start_date", body.start_date, today)?;
    check_period_date("end_date", body.end_date, today)?;

    let existing = sqlx::query_as::<_, CycleRecord>("SELECT * FROM cycles WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(ApiError::NotFound("Cycle not found"))?;

    let start = body.start_date.unwrap_or(existing.start_date);
    check_dates(start, body.end_date.or(existing.end_date))?;
    check_lengths(
        body.cycle_length.unwrap_or(existing.cycle_length),
        body.period_length.unwrap_or(existing.period_length),
    )?;

    let cycle = sqlx::query_as::<_, CycleRecord>(
        r#"
        UPDATE cycles SET
            start_date = COALESCE($2, start_date),
            end_date = COALESCE($3, end_date),
            cycle_length = COALESCE($4, cycle_length),
            period_length = COALESCE($5, period_length),
            flow = COALESCE($6, flow),
            mood = COALESCE($7, mood),
            temperature = COALESCE($8, temperature),
            symptoms = COALESCE($9, symptoms),
            notes = COALESCE($10, notes)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(body.start_date)
    .bind(body.end_date)
    .bind(body.cycle_length)
    .bind(body.period_length)
    .bind(body.flow)
    .bind(body.mood)
    .bind(body.temperature)
    .bind(body.symptoms.map(clean_symptoms))
    .bind(body.notes)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(ApiError::NotFound("Cycle not found"))?;

    Ok(Json(json!({ "success": true, "cycle": cycle })))
}

async fn delete_cycle(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Json<Value>> {
    let result = sqlx::query("DELETE FROM cycles WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Cycle not found"));
    }

    Ok(Json(json!({ "success": true, "message": "Cycle deleted" })))
}

async fn get_cycle_summary(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<UserQuery>,
) -> ApiResult<Json<Value>> {
    let user = fetch_user(&state.pool, params.user_id).await?;
    let latest = db::recent_cycles(&state.pool, params.user_id, 1).await?;
    let today = db::today();

    let status = status_for(&user, latest.first(), today);
    let forecast = Forecast::describe(
        last_period_start(&user, latest.first()),
        Some(user.cycle_length_days()),
    );

    Ok(Json(json!({
        "success": true,
        "today": today,
        "status": status,
        "phase_label": status.as_ref().map(|s| s.phase.display_name()),
        "forecast": forecast,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn period_days_are_inclusive() {
        assert_eq!(period_days(date(2024, 1, 1), date(2024, 1, 5)), 5);
        assert_eq!(period_days(date(2024, 1, 1), date(2024, 1, 1)), 1);
    }

    #[test]
    fn end_before_start_is_rejected() {
        assert!(check_dates(date(2024, 1, 5), Some(date(2024, 1, 4))).is_err());
        assert!(check_dates(date(2024, 1, 5), None).is_ok());
    }

    #[test]
    fn symptoms_are_normalized() {
        let cleaned = clean_symptoms(vec![" Cramps".into(), "cramps".into(), "".into(), "Headache ".into()]);
        assert_eq!(cleaned, vec!["cramps", "headache"]);
    }

    #[test]
    fn flow_and_mood_default_when_omitted() {
        let body: NewCycle = serde_json::from_value(json!({
            "user_id": Uuid::nil(),
            "start_date": "2024-01-01"
        }))
        .unwrap();
        assert_eq!(body.flow, FlowLevel::None);
        assert_eq!(body.mood, Mood::Neutral);
        assert!(body.symptoms.is_empty());
    }
}
