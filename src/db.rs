use chrono::NaiveDate;
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use crate::ai::prompt::{PromptContext, RECENT_CYCLE_LIMIT, RECENT_SYMPTOM_LIMIT};
use crate::config::Config;
use crate::cycle::CycleStatus;
use crate::error::{ApiError, ApiResult};
use crate::models::{CycleRecord, SymptomEntry, UserProfile};

/// Open the pool and bring the schema up to date.
pub async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Calendar date used for all cycle arithmetic.
pub fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

pub async fn fetch_user(pool: &PgPool, user_id: Uuid) -> ApiResult<UserProfile> {
    sqlx::query_as::<_, UserProfile>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::NotFound("User not found"))
}

pub async fn recent_symptoms(pool: &PgPool, user_id: Uuid, limit: usize) -> ApiResult<Vec<SymptomEntry>> {
    let rows = sqlx::query_as::<_, SymptomEntry>(
        "SELECT * FROM symptoms WHERE user_id = $1 ORDER BY date DESC, created_at DESC LIMIT $2",
    )
    .bind(user_id)
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn recent_cycles(pool: &PgPool, user_id: Uuid, limit: usize) -> ApiResult<Vec<CycleRecord>> {
    let rows = sqlx::query_as::<_, CycleRecord>(
        "SELECT * FROM cycles WHERE user_id = $1 ORDER BY start_date DESC LIMIT $2",
    )
    .bind(user_id)
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// The later of a profile's recorded period start and the newest logged cycle.
pub fn latest_period_start(profile_date: Option<NaiveDate>, newest_cycle_start: Option<NaiveDate>) -> Option<NaiveDate> {
    match (profile_date, newest_cycle_start) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

pub fn last_period_start(profile: &UserProfile, latest_cycle: Option<&CycleRecord>) -> Option<NaiveDate> {
    latest_period_start(profile.last_period_date, latest_cycle.map(|c| c.start_date))
}

pub fn status_for(profile: &UserProfile, latest_cycle: Option<&CycleRecord>, today: NaiveDate) -> Option<CycleStatus> {
    last_period_start(profile, latest_cycle).and_then(|last| {
        CycleStatus::compute(last, profile.cycle_length_days(), profile.period_length_days(), today)
    })
}

/// Profile, cycle position and recent history for one user.
pub struct UserContext {
    pub today: NaiveDate,
    pub profile: UserProfile,
    pub status: Option<CycleStatus>,
    pub symptoms: Vec<SymptomEntry>,
    pub cycles: Vec<CycleRecord>,
}

impl UserContext {
    pub async fn load(pool: &PgPool, user_id: Uuid, today: NaiveDate) -> ApiResult<Self> {
        let profile = fetch_user(pool, user_id).await?;
        let symptoms = recent_symptoms(pool, user_id, RECENT_SYMPTOM_LIMIT).await?;
        let cycles = recent_cycles(pool, user_id, RECENT_CYCLE_LIMIT).await?;
        let status = status_for(&profile, cycles.first(), today);

        Ok(Self {
            today,
            profile,
            status,
            symptoms,
            cycles,
        })
    }

    pub fn prompt_context(&self) -> PromptContext<'_> {
        PromptContext {
            today: self.today,
            profile: &self.profile,
            status: self.status.as_ref(),
            symptoms: &self.symptoms,
            cycles: &self.cycles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::Phase;
    use crate::models::{FlowLevel, Mood};
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn profile(last: Option<NaiveDate>) -> UserProfile {
        UserProfile {
            id: Uuid::new_v4(),
            name: "Test".into(),
            email: "t@example.com".into(),
            age: None,
            height: None,
            weight: None,
            cycle_length: 28,
            period_length: 5,
            last_period_date: last,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn cycle(start: NaiveDate) -> CycleRecord {
        CycleRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            start_date: start,
            end_date: None,
            cycle_length: 28,
            period_length: 5,
            flow: FlowLevel::Light,
            mood: Mood::Calm,
            temperature: None,
            symptoms: vec![],
            notes: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn newest_period_start_wins() {
        let c = cycle(date(2024, 2, 1));
        assert_eq!(last_period_start(&profile(Some(date(2024, 1, 1))), Some(&c)), Some(date(2024, 2, 1)));
        assert_eq!(last_period_start(&profile(Some(date(2024, 3, 1))), Some(&c)), Some(date(2024, 3, 1)));
        assert_eq!(last_period_start(&profile(None), Some(&c)), Some(date(2024, 2, 1)));
        assert_eq!(last_period_start(&profile(None), None), None);
    }

    #[test]
    fn removing_a_misdated_cycle_restores_the_previous_start() {
        let profile_date = Some(date(2024, 1, 1));
        let mut starts = vec![date(2024, 5, 1), date(2024, 2, 1)];

        assert_eq!(latest_period_start(profile_date, starts.iter().copied().max()), Some(date(2024, 5, 1)));

        starts.remove(0);
        assert_eq!(latest_period_start(profile_date, starts.iter().copied().max()), Some(date(2024, 2, 1)));

        starts.clear();
        assert_eq!(latest_period_start(profile_date, starts.iter().copied().max()), profile_date);
    }

    #[test]
    fn status_needs_a_period_start() {
        assert!(status_for(&profile(None), None, date(2024, 1, 3)).is_none());

        let status = status_for(&profile(Some(date(2024, 1, 1))), None, date(2024, 1, 3)).unwrap();
        assert_eq!(status.cycle_day, 3);
        assert_eq!(status.phase, Phase::Menstrual);
    }
}
