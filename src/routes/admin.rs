use axum::{extract::State, routing::get, Json, Router};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;

use crate::cycle::{cycle_day, phase_for_day, Phase};
use crate::db;
use crate::error::ApiResult;
use crate::models::UserProfile;
use crate::AppState;

#[derive(Debug, Clone, Default, Serialize, sqlx::FromRow)]
pub struct TableCounts {
    pub users: i64,
    pub cycles: i64,
    pub symptoms: i64,
    pub insights: i64,
    pub conversations: i64,
    pub consultations: i64,
    pub pending_consultations: i64,
    pub reminders: i64,
    pub reports: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseCount {
    pub phase: Phase,
    pub label: &'static str,
    pub users: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseDistribution {
    pub phases: Vec<PhaseCount>,
    /// Users with no period date on record.
    pub unknown: usize,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/admin/overview", get(get_overview))
        .with_state(state)
}

/// Bucket users by today's phase. Each input is the user's most recent
/// period start plus their configured lengths.
pub fn phase_distribution<I>(users: I, today: NaiveDate) -> PhaseDistribution
where
    I: IntoIterator<Item = (Option<NaiveDate>, u32, u32)>,
{
    let mut counts = HashMap::<Phase, usize>::new();
    let mut unknown = 0;

    for (last_period, cycle_length, period_length) in users {
        match last_period {
            Some(last) => {
                let cycle_length = cycle_length.max(1);
                let day = cycle_day(last, today, cycle_length);
                *counts.entry(phase_for_day(day, cycle_length, period_length)).or_default() += 1;
            }
            None => unknown += 1,
        }
    }

    PhaseDistribution {
        phases: Phase::ALL
            .into_iter()
            .map(|phase| PhaseCount {
                phase,
                label: phase.display_name(),
                users: counts.get(&phase).copied().unwrap_or(0),
            })
            .collect(),
        unknown,
    }
}

async fn get_overview(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let counts = sqlx::query_as::<_, TableCounts>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM users) AS users,
            (SELECT COUNT(*) FROM cycles) AS cycles,
            (SELECT COUNT(*) FROM symptoms) AS symptoms,
            (SELECT COUNT(*) FROM daily_insights) AS insights,
            (SELECT COUNT(*) FROM conversations) AS conversations,
            (SELECT COUNT(*) FROM consultations) AS consultations,
            (SELECT COUNT(*) FROM consultations WHERE status = 'pending') AS pending_consultations,
            (SELECT COUNT(*) FROM notifications) AS reminders,
            (SELECT COUNT(*) FROM reports) AS reports
        "#,
    )
    .fetch_one(&state.pool)
    .await?;

    let users = sqlx::query_as::<_, UserProfile>("SELECT * FROM users")
        .fetch_all(&state.pool)
        .await?;

    let latest_starts: HashMap<Uuid, NaiveDate> = sqlx::query_as::<_, (Uuid, NaiveDate)>(
        "SELECT user_id, MAX(start_date) FROM cycles GROUP BY user_id",
    )
    .fetch_all(&state.pool)
    .await?
    .into_iter()
    .collect();

    let average_cycle_length = if users.is_empty() {
        0.0
    } else {
        users.iter().map(|u| f64::from(u.cycle_length)).sum::<f64>() / users.len() as f64
    };

    let distribution = phase_distribution(
        users.iter().map(|u| {
            let last = db::latest_period_start(u.last_period_date, latest_starts.get(&u.id).copied());
            (last, u.cycle_length_days(), u.period_length_days())
        }),
        db::today(),
    );

    Ok(Json(json!({
        "success": true,
        "counts": counts,
        "average_cycle_length": average_cycle_length,
        "phase_distribution": distribution,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn users_are_bucketed_by_todays_phase() {
        let today = date(2024, 1, 14);
        let users: Vec<(Option<NaiveDate>, u32, u32)> = vec![
            (Some(date(2024, 1, 12)), 28, 5),  // day 3
            (Some(date(2024, 1, 1)), 28, 5),   // day 14
            (Some(date(2023, 12, 25)), 28, 5), // day 21
            (Some(date(2023, 12, 27)), 28, 5), // day 19
            (None, 28, 5),
        ];

        let dist = phase_distribution(users, today);
        let flat: Vec<(Phase, usize)> = dist.phases.iter().map(|p| (p.phase, p.users)).collect();

        assert_eq!(
            flat,
            vec![
                (Phase::Menstrual, 1),
                (Phase::Follicular, 0),
                (Phase::Ovulation, 1),
                (Phase::Luteal, 2),
            ]
        );
        assert_eq!(dist.unknown, 1);
        assert_eq!(dist.phases[0].label, "Period");
    }

    #[test]
    fn no_users_gives_all_zero_buckets() {
        let dist = phase_distribution(Vec::<(Option<NaiveDate>, u32, u32)>::new(), date(2024, 1, 1));
        assert_eq!(dist.phases.len(), 4);
        assert!(dist.phases.iter().all(|p| p.users == 0));
        assert_eq!(dist.unknown, 0);
    }
}
