use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::types::Json as SqlJson;
use uuid::Uuid;

use crate::ai::parse_ai_response;
use crate::ai::prompt::{daily_tip_prompt, insight_prompt};
use crate::db::{self, UserContext};
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiQuery};
use crate::models::{AiInsightRecord, InsightSource, ParseKind, UserQuery};
use crate::AppState;

const DEFAULT_HISTORY_LIMIT: i64 = 20;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub user_id: Uuid,
    pub limit: Option<i64>,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/insights", get(list_insights))
        .route("/insights/generate", post(generate_insights))
        .route("/insights/daily", get(daily_insight))
        .with_state(state)
}

/// Call the model, parse whatever comes back and keep the result.
pub async fn generate_and_store(
    state: &AppState,
    user_id: Uuid,
    source: InsightSource,
    prompt: &str,
) -> ApiResult<AiInsightRecord> {
    let raw = state.ai.generate(prompt).await?;
    let outcome = parse_ai_response(&raw);
    let kind = outcome.kind();
    if kind != ParseKind::Parsed {
        tracing::warn!("⚠️ AI response for user {} was {:?}, using fallbacks", user_id, kind);
    }
    let insights = outcome.into_insights();

    let record = sqlx::query_as::<_, AiInsightRecord>(
        r#"
        INSERT INTO daily_insights
            (id, user_id, source, insights, cycle_predictions, recommendations, raw_response, parse_outcome)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(source)
    .bind(&insights.insights)
    .bind(&insights.cycle_predictions)
    .bind(SqlJson(&insights.recommendations))
    .bind(&raw)
    .bind(kind)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!("✨ Stored {:?} insight {} for user {}", source, record.id, user_id);

    Ok(record)
}

async fn generate_insights(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<GenerateRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let ctx = UserContext::load(&state.pool, body.user_id, db::today()).await?;
    let prompt = insight_prompt(&ctx.prompt_context());
    let record = generate_and_store(&state, body.user_id, InsightSource::Insights, &prompt).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "insight": record, "status": ctx.status })),
    ))
}

async fn list_insights(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> ApiResult<Json<Value>> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, 100);

    let insights = sqlx::query_as::<_, AiInsightRecord>(
        "SELECT * FROM daily_insights WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(query.user_id)
    .bind(limit)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(json!({ "success": true, "insights": insights })))
}

/// One tip per user per UTC day, generated on first request.
async fn daily_insight(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> ApiResult<Json<Value>> {
    let today = db::today();

    let cached = sqlx::query_as::<_, AiInsightRecord>(
        r#"
        SELECT * FROM daily_insights
        WHERE user_id = $1 AND source = $2 AND (created_at AT TIME ZONE 'UTC')::date = $3
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(query.user_id)
    .bind(InsightSource::Daily)
    .bind(today)
    .fetch_optional(&state.pool)
    .await?;

    if let Some(insight) = cached {
        return Ok(Json(json!({ "success": true, "insight": insight, "cached": true })));
    }

    let ctx = UserContext::load(&state.pool, query.user_id, today).await?;
    let prompt = daily_tip_prompt(&ctx.prompt_context());
    let insight = generate_and_store(&state, query.user_id, InsightSource::Daily, &prompt).await?;

    Ok(Json(json!({
        "success": true,
        "insight": insight,
        "cached": false,
        "phase": ctx.status.as_ref().map(|s| s.phase),
    })))
}
