use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::ai::prompt::{chat_prompt, CHAT_HISTORY_LIMIT};
use crate::db::{self, UserContext};
use crate::error::{non_blank, ApiResult};
use crate::extract::{ApiJson, ApiQuery};
use crate::models::{ChatMessage, ChatRole, UserQuery};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(send_message))
        .route("/chat/history", get(get_history).delete(clear_history))
        .with_state(state)
}

async fn store_message(pool: &PgPool, user_id: Uuid, role: ChatRole, content: &str) -> ApiResult<ChatMessage> {
    let message = sqlx::query_as::<_, ChatMessage>(
        r#"
        INSERT INTO conversations (id, user_id, role, content)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(role)
    .bind(content)
    .fetch_one(pool)
    .await?;

    Ok(message)
}

/// Latest `limit` messages, oldest first.
async fn recent_history(pool: &PgPool, user_id: Uuid, limit: i64) -> ApiResult<Vec<ChatMessage>> {
    let mut history = sqlx::query_as::<_, ChatMessage>(
        "SELECT * FROM conversations WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    history.reverse();
    Ok(history)
}

async fn send_message(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ChatRequest>,
) -> ApiResult<Json<Value>> {
    body.validate()?;
    let message = non_blank(&body.message, "message")?;

    let ctx = UserContext::load(&state.pool, body.user_id, db::today()).await?;
    let history = recent_history(&state.pool, body.user_id, CHAT_HISTORY_LIMIT as i64).await?;
    let prompt = chat_prompt(&ctx.prompt_context(), &history, message);

    let reply = state.ai.generate(&prompt).await?;
    let reply = reply.trim();

    let user_message = store_message(&state.pool, body.user_id, ChatRole::User, message).await?;
    let assistant_message = store_message(&state.pool, body.user_id, ChatRole::Assistant, reply).await?;

    Ok(Json(json!({
        "success": true,
        "reply": assistant_message.content,
        "messages": [user_message, assistant_message],
    })))
}

async fn get_history(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> ApiResult<Json<Value>> {
    let messages = sqlx::query_as::<_, ChatMessage>(
        "SELECT * FROM conversations WHERE user_id = $1 ORDER BY created_at ASC",
    )
    .bind(query.user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(json!({ "success": true, "messages": messages })))
}

async fn clear_history(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> ApiResult<Json<Value>> {
    let result = sqlx::query("DELETE FROM conversations WHERE user_id = $1")
        .bind(query.user_id)
        .execute(&state.pool)
        .await?;

    Ok(Json(json!({ "success": true, "deleted": result.rows_affected() })))
}
