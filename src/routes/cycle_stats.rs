use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::cycle::{cycle_stats, CycleStats};
use crate::db::fetch_user;
use crate::extract::ApiQuery;
use crate::error::ApiResult;
use crate::models::UserQuery;
use crate::AppState;

pub async fn load_cycle_stats(pool: &PgPool, user_id: Uuid) -> ApiResult<CycleStats> {
    let rows: Vec<(NaiveDate, i32)> = sqlx::query_as(
        r#"
        SELECT start_date, period_length
        FROM cycles
        WHERE user_id = $1
        ORDER BY start_date ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(cycle_stats(&rows))
}

pub async fn get_cycle_stats(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> ApiResult<Json<Value>> {
    fetch_user(&state.pool, query.user_id).await?;
    let stats = load_cycle_stats(&state.pool, query.user_id).await?;

    Ok(Json(json!({
        "success": true,
        "average_period_length": stats.average_period_length,
        "average_cycle_length": stats.average_cycle_length,
        "cycle_stats": stats.cycle_stats,
    })))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/cycle-stats", get(get_cycle_stats))
        .with_state(state)
}
