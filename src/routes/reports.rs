use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::cycle::{CycleStats, CycleStatus, Forecast};
use crate::db::{self, fetch_user, last_period_start, status_for};
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiQuery};
use crate::models::{CycleReport, SymptomCount, UserProfile, UserQuery};
use crate::routes::cycle_stats::load_cycle_stats;
use crate::routes::symptoms::load_symptom_frequency;
use crate::AppState;

const TOP_SYMPTOMS: usize = 5;

#[derive(Debug, Deserialize)]
pub struct NewReport {
    pub user_id: Uuid,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/reports", post(create_report).get(list_reports))
        .with_state(state)
}

pub fn build_snapshot(
    profile: &UserProfile,
    today: NaiveDate,
    status: Option<&CycleStatus>,
    forecast: &Forecast,
    stats: &CycleStats,
    symptoms: &[SymptomCount],
) -> Value {
    json!({
        "generated_on": today,
        "profile": {
            "name": profile.name,
            "cycle_length": profile.cycle_length,
            "period_length": profile.period_length,
            "last_period_date": profile.last_period_date,
        },
        "status": status,
        "phase_label": status.map(|s| s.phase.display_name()),
        "forecast": forecast,
        "cycles_logged": stats.cycle_stats.len(),
        "average_cycle_length": stats.average_cycle_length,
        "average_period_length": stats.average_period_length,
        "cycle_stats": stats.cycle_stats,
        "top_symptoms": &symptoms[..symptoms.len().min(TOP_SYMPTOMS)],
    })
}

async fn create_report(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewReport>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let user = fetch_user(&state.pool, body.user_id).await?;
    let latest = db::recent_cycles(&state.pool, body.user_id, 1).await?;
    let today = db::today();

    let status = status_for(&user, latest.first(), today);
    let forecast = Forecast::describe(
        last_period_start(&user, latest.first()),
        Some(user.cycle_length_days()),
    );
    let stats = load_cycle_stats(&state.pool, body.user_id).await?;
    let symptoms = load_symptom_frequency(&state.pool, Some(body.user_id)).await?;

    let snapshot = build_snapshot(&user, today, status.as_ref(), &forecast, &stats, &symptoms);

    let report = sqlx::query_as::<_, CycleReport>(
        r#"
        INSERT INTO reports (id, user_id, snapshot)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(body.user_id)
    .bind(&snapshot)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!("📄 Report {} created for user {}", report.id, body.user_id);

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "report": report }))))
}

async fn list_reports(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> ApiResult<Json<Value>> {
    let reports = sqlx::query_as::<_, CycleReport>(
        "SELECT * FROM reports WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(query.user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(json!({ "success": true, "reports": reports })))
}
