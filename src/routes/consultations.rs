use axum::{
    extract::State,
    http::StatusCode,
    routing::{post, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::ai::prompt::consultation_prompt;
use crate::db::{self, fetch_user, UserContext};
use crate::error::{non_blank, ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::models::{ConsultationKind, ConsultationRecord, ConsultationStatus, UserQuery};
use crate::AppState;

pub const AI_RESPONDER: &str = "AI assistant";

#[derive(Debug, Deserialize, Validate)]
pub struct NewConsultation {
    pub user_id: Uuid,
    pub kind: ConsultationKind,
    #[validate(length(min = 1, max = 4000))]
    pub question: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ConsultationResponse {
    #[validate(length(min = 1, max = 8000))]
    pub response: String,
    #[validate(length(min = 1, max = 200))]
    pub responder: String,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/consultations", post(request_consultation).get(list_consultations))
        .route("/consultations/:id/response", put(respond_to_consultation))
        .with_state(state)
}

async fn request_consultation(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewConsultation>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    body.validate()?;
    let question = non_blank(&body.question, "question")?;

    let (response, responder, status) = match body.kind {
        ConsultationKind::Ai => {
            let ctx = UserContext::load(&state.pool, body.user_id, db::today()).await?;
            let prompt = consultation_prompt(&ctx.prompt_context(), question);
            let answer = state.ai.generate(&prompt).await?;
            (
                Some(answer.trim().to_string()),
                Some(AI_RESPONDER),
                ConsultationStatus::Answered,
            )
        }
        ConsultationKind::Doctor => {
            fetch_user(&state.pool, body.user_id).await?;
            (None, None, ConsultationStatus::Pending)
        }
    };

    let consultation = sqlx::query_as::<_, ConsultationRecord>(
        r#"
        INSERT INTO consultations (id, user_id, kind, question, response, responder, status, answered_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(body.user_id)
    .bind(body.kind)
    .bind(question)
    .bind(response)
    .bind(responder)
    .bind(status)
    .bind((status == ConsultationStatus::Answered).then(Utc::now))
    .fetch_one(&state.pool)
    .await?;

    tracing::info!("🩺 {:?} consultation {} requested by {}", body.kind, consultation.id, body.user_id);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "consultation": consultation })),
    ))
}

async fn list_consultations(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> ApiResult<Json<Value>> {
    let consultations = sqlx::query_as::<_, ConsultationRecord>(
        "SELECT * FROM consultations WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(query.user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(json!({ "success": true, "consultations": consultations })))
}

/// Only doctor consultations still waiting for an answer can be responded to.
pub fn ensure_awaiting_doctor(consultation: &ConsultationRecord) -> ApiResult<()> {
    match (consultation.kind, consultation.status) {
        (ConsultationKind::Doctor, ConsultationStatus::Pending) => Ok(()),
        (ConsultationKind::Ai, _) => Err(ApiError::Conflict("AI consultations cannot be answered manually")),
        (ConsultationKind::Doctor, ConsultationStatus::Answered) => {
            Err(ApiError::Conflict("Consultation has already been answered"))
        }
    }
}

async fn respond_to_consultation(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<ConsultationResponse>,
) -> ApiResult<Json<Value>> {
    body.validate()?;
    let response = non_blank(&body.response, "response")?;
    let responder = non_blank(&body.responder, "responder")?;

    let existing = sqlx::query_as::<_, ConsultationRecord>("SELECT * FROM consultations WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(ApiError::NotFound("Consultation not found"))?;
    ensure_awaiting_doctor(&existing)?;

    // the status guard covers a concurrent response landing first
    let consultation = sqlx::query_as::<_, ConsultationRecord>(
        r#"
        UPDATE consultations
        SET response = $2, responder = $3, status = 'answered', answered_at = NOW()
        WHERE id = $1 AND kind = 'doctor' AND status = 'pending'
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(response)
    .bind(responder)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(ApiError::Conflict("Consultation has already been answered"))?;

    tracing::info!("🩺 Consultation {} answered by {}", consultation.id, responder);

    Ok(Json(json!({ "success": true, "consultation": consultation })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn consultation(kind: ConsultationKind, status: ConsultationStatus) -> ConsultationRecord {
        ConsultationRecord {
            id: Uuid::nil(),
            user_id: Uuid::nil(),
            kind,
            question: "Is a 35 day cycle normal?".into(),
            response: None,
            responder: None,
            status,
            created_at: Utc::now(),
            answered_at: None,
        }
    }

    #[test]
    fn only_pending_doctor_consultations_accept_responses() {
        assert!(ensure_awaiting_doctor(&consultation(ConsultationKind::Doctor, ConsultationStatus::Pending)).is_ok());
        assert!(matches!(
            ensure_awaiting_doctor(&consultation(ConsultationKind::Doctor, ConsultationStatus::Answered)),
            Err(ApiError::Conflict(_))
        ));
        assert!(matches!(
            ensure_awaiting_doctor(&consultation(ConsultationKind::Ai, ConsultationStatus::Answered)),
            Err(ApiError::Conflict(_))
        ));
    }

    #[test]
    fn whitespace_question_fails_after_trimming() {
        let body: NewConsultation = serde_json::from_value(json!({
            "user_id": Uuid::nil(),
            "kind": "doctor",
            "question": "   "
        }))
        .unwrap();
        assert!(body.validate().is_ok());
        assert!(non_blank(&body.question, "question").is_err());
    }
}
