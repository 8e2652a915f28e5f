use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::cycle::CycleStatus;
use crate::db::{self, fetch_user, status_for};
use crate::error::{non_blank, ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::models::{Reminder, ReminderKind, UpcomingReminder, UserQuery};
use crate::AppState;

const DEFAULT_HORIZON_DAYS: i64 = 14;

#[derive(Debug, Deserialize, Validate)]
pub struct NewReminder {
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 1000))]
    #[serde(default)]
    pub message: String,
    pub remind_on: NaiveDate,
    #[serde(default)]
    pub kind: ReminderKind,
}

#[derive(Debug, Deserialize)]
pub struct UpcomingQuery {
    pub user_id: Uuid,
    pub days: Option<i64>,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/reminders", post(create_reminder).get(list_reminders))
        .route("/reminders/upcoming", get(get_upcoming))
        .route("/reminders/:id/read", put(mark_read))
        .route("/reminders/:id", delete(delete_reminder))
        .with_state(state)
}

/// Reminders implied by the forecast, within `horizon_days` of today.
pub fn upcoming_reminders(status: &CycleStatus, today: NaiveDate, horizon_days: i64) -> Vec<UpcomingReminder> {
    let prediction = &status.prediction;
    let mut upcoming = Vec::new();

    let mut push = |kind, title: String, date: NaiveDate| {
        upcoming.push(UpcomingReminder {
            kind,
            title,
            remind_on: date,
            days_away: (date - today).num_days(),
        });
    };

    if prediction.next_period_date < today {
        let late = (today - prediction.next_period_date).num_days();
        push(
            ReminderKind::Period,
            format!("Your period is {} day{} late", late, if late == 1 { "" } else { "s" }),
            today,
        );
    } else {
        push(ReminderKind::Period, "Your period is expected".to_string(), prediction.next_period_date);
        if prediction.fertile_window_start >= today {
            push(
                ReminderKind::FertileWindow,
                "Your fertile window begins".to_string(),
                prediction.fertile_window_start,
            );
        }
        if prediction.ovulation_date >= today {
            push(
                ReminderKind::FertileWindow,
                "Expected ovulation day".to_string(),
                prediction.ovulation_date,
            );
        }
    }

    upcoming.retain(|r| r.days_away <= horizon_days);
    upcoming.sort_by_key(|r| r.remind_on);
    upcoming
}

async fn create_reminder(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewReminder>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    body.validate()?;
    let title = non_blank(&body.title, "title")?;
    fetch_user(&state.pool, body.user_id).await?;

    let reminder = sqlx::query_as::<_, Reminder>(
        r#"
        INSERT INTO notifications (id, user_id, title, message, remind_on, kind)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(body.user_id)
    .bind(title)
    .bind(body.message.trim())
    .bind(body.remind_on)
    .bind(body.kind)
    .fetch_one(&state.pool)
    .await?;

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "reminder": reminder }))))
}

async fn list_reminders(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> ApiResult<Json<Value>> {
    let reminders = sqlx::query_as::<_, Reminder>(
        "SELECT * FROM notifications WHERE user_id = $1 ORDER BY remind_on ASC, created_at ASC",
    )
    .bind(query.user_id)
    .fetch_all(&state.pool)
    .await?;

    let unread = reminders.iter().filter(|r| !r.read).count();

    Ok(Json(json!({ "success": true, "reminders": reminders, "unread": unread })))
}

async fn get_upcoming(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UpcomingQuery>,
) -> ApiResult<Json<Value>> {
    let user = fetch_user(&state.pool, query.user_id).await?;
    let latest = db::recent_cycles(&state.pool, query.user_id, 1).await?;
    let today = db::today();
    let horizon = query.days.unwrap_or(DEFAULT_HORIZON_DAYS).clamp(0, 90);

    let upcoming = status_for(&user, latest.first(), today)
        .map(|status| upcoming_reminders(&status, today, horizon))
        .unwrap_or_default();

    Ok(Json(json!({ "success": true, "upcoming": upcoming })))
}

async fn mark_read(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Json<Value>> {
    let reminder = sqlx::query_as::<_, Reminder>(
        "UPDATE notifications SET read = TRUE WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(ApiError::NotFound("Reminder not found"))?;

    Ok(Json(json!({ "success": true, "reminder": reminder })))
}

async fn delete_reminder(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<Json<Value>> {
    let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Reminder not found"));
    }

    Ok(Json(json!({ "success": true, "message": "Reminder deleted" })))
}
