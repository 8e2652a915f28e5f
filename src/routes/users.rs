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

use crate::cycle::is_plausible_period_date;
use crate::db::{self, fetch_user, status_for};
use crate::error::{conflict_on_unique, non_blank, ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath};
use crate::models::{CycleRecord, UserProfile, DEFAULT_CYCLE_LENGTH, DEFAULT_PERIOD_LENGTH};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct NewUser {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(range(min = 8, max = 120))]
    pub age: Option<i32>,
    #[validate(range(min = 50.0, max = 250.0))]
    pub height: Option<f64>,
    #[validate(range(min = 20.0, max = 400.0))]
    pub weight: Option<f64>,
    #[validate(range(min = 1, max = 120))]
    pub cycle_length: Option<i32>,
    #[validate(range(min = 1, max = 30))]
    pub period_length: Option<i32>,
    pub last_period_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(range(min = 8, max = 120))]
    pub age: Option<i32>,
    #[validate(range(min = 50.0, max = 250.0))]
    pub height: Option<f64>,
    #[validate(range(min = 20.0, max = 400.0))]
    pub weight: Option<f64>,
    #[validate(range(min = 1, max = 120))]
    pub cycle_length: Option<i32>,
    #[validate(range(min = 1, max = 30))]
    pub period_length: Option<i32>,
    pub last_period_date: Option<NaiveDate>,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/users", post(register_user))
        .route("/users/:id", get(get_user).delete(delete_user))
        .route("/users/:id/profile", put(update_profile))
        .with_state(state)
}

/// A period has to be shorter than the cycle it belongs to.
pub fn check_lengths(cycle_length: i32, period_length: i32) -> ApiResult<()> {
    if period_length >= cycle_length {
        return Err(ApiError::Validation(
            "period_length must be shorter than cycle_length".to_string(),
        ));
    }
    Ok(())
}

/// Reject period dates too far from today to be real (and to predict from).
pub fn check_period_date(field: &str, date: Option<NaiveDate>, today: NaiveDate) -> ApiResult<()> {
    match date {
        Some(date) if !is_plausible_period_date(date, today) => {
            Err(ApiError::Validation(format!("{} is out of range", field)))
        }
        _ => Ok(()),
    }
}

async fn register_user(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewUser>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    body.validate()?;
    let name = non_blank(&body.name, "name")?;
    let cycle_length = body.cycle_length.unwrap_or(DEFAULT_CYCLE_LENGTH);
    let period_length = body.period_length.unwrap_or(DEFAULT_PERIOD_LENGTH);
    check_lengths(cycle_length, period_length)?;
    check_period_date("last_period_date", body.last_period_date, db::today())?;

    let user = sqlx::query_as::<_, UserProfile>(
        r#"
        INSERT INTO users (id, name, email, age, height, weight, cycle_length, period_length, last_period_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(body.email.trim().to_lowercase())
    .bind(body.age)
    .bind(body.height)
    .bind(body.weight)
    .bind(cycle_length)
    .bind(period_length)
    .bind(body.last_period_date)
    .fetch_one(&state.pool)
    .await
    .map_err(|e| conflict_on_unique(e, "A user with this email already exists"))?;

    tracing::info!("👤 Registered user {}", user.id);

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "user": user }))))
}

async fn get_user(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Json<Value>> {
    let user = fetch_user(&state.pool, id).await?;
    let latest = db::recent_cycles(&state.pool, id, 1).await?;
    let status = status_for(&user, latest.first(), db::today());

    Ok(Json(json!({ "success": true, "user": user, "status": status })))
}

/// Apply an update on top of the stored profile.
pub fn merge_profile(mut user: UserProfile, update: ProfileUpdate) -> UserProfile {
    if let Some(name) = update.name {
        user.name = name.trim().to_string();
    }
    user.age = update.age.or(user.age);
    user.height = update.height.or(user.height);
    user.weight = update.weight.or(user.weight);
    user.cycle_length = update.cycle_length.unwrap_or(user.cycle_length);
    user.period_length = update.period_length.unwrap_or(user.period_length);
    user.last_period_date = update.last_period_date.or(user.last_period_date);
    user
}

async fn update_profile(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<ProfileUpdate>,
) -> ApiResult<Json<Value>> {
    body.validate()?;
    if let Some(name) = &body.name {
        non_blank(name, "name")?;
    }
    check_period_date("last_period_date", body.last_period_date, db::today())?;
    let merged = merge_profile(fetch_user(&state.pool, id).await?, body);
    check_lengths(merged.cycle_length, merged.period_length)?;

    let user = sqlx::query_as::<_, UserProfile>(
        r#"
        UPDATE users SET
            name = $2, age = $3, height = $4, weight = $5,
            cycle_length = $6, period_length = $7, last_period_date = $8,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&merged.name)
    .bind(merged.age)
    .bind(merged.height)
    .bind(merged.weight)
    .bind(merged.cycle_length)
    .bind(merged.period_length)
    .bind(merged.last_period_date)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(ApiError::NotFound("User not found"))?;

    let latest: Option<CycleRecord> = db::recent_cycles(&state.pool, id, 1).await?.into_iter().next();
    let status = status_for(&user, latest.as_ref(), db::today());

    Ok(Json(json!({ "success": true, "user": user, "status": status })))
}

async fn delete_user(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Json<Value>> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("User not found"));
    }

    tracing::info!("🗑️ Deleted user {}", id);
    Ok(Json(json!({ "success": true, "message": "User deleted" })))
}
