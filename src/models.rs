use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

pub const DEFAULT_CYCLE_LENGTH: i32 = 28;
pub const DEFAULT_PERIOD_LENGTH: i32 = 5;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub age: Option<i32>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub cycle_length: i32,
    pub period_length: i32,
    pub last_period_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn cycle_length_days(&self) -> u32 {
        self.cycle_length.max(1) as u32
    }

    pub fn period_length_days(&self) -> u32 {
        self.period_length.max(0) as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "flow_level", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FlowLevel {
    #[default]
    None,
    Spotting,
    Light,
    Medium,
    Heavy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "mood", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Calm,
    #[default]
    Neutral,
    Sad,
    Anxious,
    Irritable,
    Tired,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CycleRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub cycle_length: i32,
    pub period_length: i32,
    pub flow: FlowLevel,
    pub mood: Mood,
    pub temperature: Option<f64>,
    pub symptoms: Vec<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SymptomEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub symptoms: Vec<String>,
    pub pain_level: Option<i32>,
    pub mood_level: Option<i32>,
    pub energy_level: Option<i32>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymptomCount {
    pub symptom: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub category: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "insight_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InsightSource {
    Insights,
    SymptomAnalysis,
    Daily,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "parse_outcome", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ParseKind {
    Parsed,
    Recovered,
    Defaulted,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AiInsightRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub source: InsightSource,
    pub insights: String,
    pub cycle_predictions: String,
    pub recommendations: Json<Vec<Recommendation>>,
    pub raw_response: String,
    pub parse_outcome: ParseKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "chat_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ChatMessage {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "consultation_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConsultationKind {
    Ai,
    Doctor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "consultation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConsultationStatus {
    Pending,
    Answered,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ConsultationRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: ConsultationKind,
    pub question: String,
    pub response: Option<String>,
    pub responder: Option<String>,
    pub status: ConsultationStatus,
    pub created_at: DateTime<Utc>,
    pub answered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "reminder_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    Period,
    FertileWindow,
    Medication,
    #[default]
    Custom,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Reminder {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub remind_on: NaiveDate,
    pub kind: ReminderKind,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// A reminder derived from the cycle forecast; never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpcomingReminder {
    pub kind: ReminderKind,
    pub title: String,
    pub remind_on: NaiveDate,
    pub days_away: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CycleReport {
    pub id: Uuid,
    pub user_id: Uuid,
    pub snapshot: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: Uuid,
}
