//! Cycle day, phase and prediction arithmetic.
//!
//! Everything here is pure calendar-day math on UTC dates. Inputs are never
//! rejected: out-of-range lengths are clamped so every function stays total.

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::fmt;

pub const LUTEAL_PHASE_DAYS: i64 = 14;
pub const FERTILE_DAYS_BEFORE_OVULATION: i64 = 5;
pub const FERTILE_DAYS_AFTER_OVULATION: i64 = 1;
const MAX_DAYS_AHEAD: i64 = 366;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Menstrual,
    Follicular,
    Ovulation,
    Luteal,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::Menstrual,
        Phase::Follicular,
        Phase::Ovulation,
        Phase::Luteal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Menstrual => "menstrual",
            Phase::Follicular => "follicular",
            Phase::Ovulation => "ovulation",
            Phase::Luteal => "luteal",
        }
    }

    /// Label shown to users ("Period" rather than "menstrual").
    pub fn display_name(self) -> &'static str {
        match self {
            Phase::Menstrual => "Period",
            Phase::Follicular => "Follicular",
            Phase::Ovulation => "Ovulation",
            Phase::Luteal => "Luteal",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a 1-based cycle day.
///
/// Day `round(cycle_length / 2)` is ovulation; days up to the period length
/// are menstrual and win over everything else.
pub fn phase_for_day(cycle_day: u32, cycle_length: u32, period_length: u32) -> Phase {
    let ovulation_day = cycle_length / 2 + cycle_length % 2;

    if cycle_day <= period_length {
        Phase::Menstrual
    } else if cycle_day == ovulation_day {
        Phase::Ovulation
    } else if 2 * u64::from(cycle_day) <= u64::from(cycle_length) {
        Phase::Follicular
    } else {
        Phase::Luteal
    }
}

/// Day of the current cycle, always in `[1, cycle_length]`.
///
/// Counts whole days since `last_period` and wraps every `cycle_length` days,
/// so a stale last-period date still yields a meaningful day.
pub fn cycle_day(last_period: NaiveDate, today: NaiveDate, cycle_length: u32) -> u32 {
    let length = i64::from(cycle_length.max(1));
    let elapsed = (today - last_period).num_days();
    // rem_euclid keeps future start dates inside the range too
    (elapsed.rem_euclid(length) + 1) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CyclePrediction {
    pub next_period_date: NaiveDate,
    pub ovulation_date: NaiveDate,
    pub fertile_window_start: NaiveDate,
    pub fertile_window_end: NaiveDate,
}

impl CyclePrediction {
    pub fn in_fertile_window(&self, date: NaiveDate) -> bool {
        (self.fertile_window_start..=self.fertile_window_end).contains(&date)
    }
}

/// `None` when the dates would fall outside the calendar range chrono supports.
pub fn predict(last_period: NaiveDate, cycle_length: u32) -> Option<CyclePrediction> {
    let next_period_date = last_period.checked_add_signed(Duration::days(i64::from(cycle_length)))?;
    let ovulation_date = next_period_date.checked_sub_signed(Duration::days(LUTEAL_PHASE_DAYS))?;

    Some(CyclePrediction {
        next_period_date,
        ovulation_date,
        fertile_window_start: ovulation_date
            .checked_sub_signed(Duration::days(FERTILE_DAYS_BEFORE_OVULATION))?,
        fertile_window_end: ovulation_date.checked_add_signed(Duration::days(FERTILE_DAYS_AFTER_OVULATION))?,
    })
}

/// Whether a period date is close enough to `today` to be real data:
/// no earlier than 1900 and at most a year ahead.
pub fn is_plausible_period_date(date: NaiveDate, today: NaiveDate) -> bool {
    let earliest = NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN);
    let latest = today.checked_add_signed(Duration::days(MAX_DAYS_AHEAD)).unwrap_or(NaiveDate::MAX);
    (earliest..=latest).contains(&date)
}

/// Predictions rendered as text, with placeholders when the inputs are missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Forecast {
    pub next_period: String,
    pub ovulation: String,
    pub fertile_window: String,
}

impl Forecast {
    pub const NEEDS_LAST_PERIOD: &'static str = "Log your last period start date to see this prediction";
    pub const NEEDS_CYCLE_LENGTH: &'static str = "Set your average cycle length to see this prediction";

    pub fn describe(last_period: Option<NaiveDate>, cycle_length: Option<u32>) -> Self {
        match (last_period, cycle_length.filter(|l| *l > 0)) {
            (Some(last), Some(length)) => match predict(last, length) {
                Some(p) => Self {
                    next_period: p.next_period_date.format("%Y-%m-%d").to_string(),
                    ovulation: p.ovulation_date.format("%Y-%m-%d").to_string(),
                    fertile_window: format!(
                        "{} to {}",
                        p.fertile_window_start.format("%Y-%m-%d"),
                        p.fertile_window_end.format("%Y-%m-%d")
                    ),
                },
                None => Self::placeholder(Self::NEEDS_LAST_PERIOD),
            },
            (None, _) => Self::placeholder(Self::NEEDS_LAST_PERIOD),
            (_, None) => Self::placeholder(Self::NEEDS_CYCLE_LENGTH),
        }
    }

    fn placeholder(message: &str) -> Self {
        Self {
            next_period: message.to_string(),
            ovulation: message.to_string(),
            fertile_window: message.to_string(),
        }
    }
}

/// Where a user is in their cycle today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleStatus {
    pub last_period_date: NaiveDate,
    pub cycle_day: u32,
    pub cycle_length: u32,
    pub period_length: u32,
    pub phase: Phase,
    pub in_fertile_window: bool,
    /// Negative when the predicted period is late.
    pub period_expected_in_days: i64,
    pub prediction: CyclePrediction,
}

impl CycleStatus {
    /// `None` only when `last_period` is too close to the edge of the
    /// calendar to predict from.
    pub fn compute(
        last_period: NaiveDate,
        cycle_length: u32,
        period_length: u32,
        today: NaiveDate,
    ) -> Option<Self> {
        let cycle_length = cycle_length.max(1);
        let day = cycle_day(last_period, today, cycle_length);
        let prediction = predict(last_period, cycle_length)?;

        Some(Self {
            last_period_date: last_period,
            cycle_day: day,
            cycle_length,
            period_length,
            phase: phase_for_day(day, cycle_length, period_length),
            in_fertile_window: prediction.in_fertile_window(today),
            period_expected_in_days: (prediction.next_period_date - today).num_days(),
            prediction,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleStat {
    pub cycle_number: i32,
    pub start_date: NaiveDate,
    pub period_length: i32,
    /// 0 for the ongoing cycle.
    pub cycle_length: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleStats {
    pub average_period_length: f64,
    pub average_cycle_length: f64,
    pub cycle_stats: Vec<CycleStat>,
}

/// Per-cycle lengths from `(start_date, period_length)` pairs ordered by start.
///
/// Only completed cycles count towards the average cycle length.
pub fn cycle_stats(cycles: &[(NaiveDate, i32)]) -> CycleStats {
    let mut stats = Vec::with_capacity(cycles.len());
    let mut total_period = 0i64;
    let mut total_cycle = 0i64;
    let mut completed = 0i64;

    for (i, (start, period)) in cycles.iter().enumerate() {
        let cycle_len = cycles
            .get(i + 1)
            .map(|(next, _)| (*next - *start).num_days())
            .unwrap_or(0);

        total_period += i64::from(*period);
        if cycle_len > 0 {
            total_cycle += cycle_len;
            completed += 1;
        }

        stats.push(CycleStat {
            cycle_number: (i + 1) as i32,
            start_date: *start,
            period_length: *period,
            cycle_length: cycle_len as i32,
        });
    }

    let count = stats.len() as f64;

    CycleStats {
        average_period_length: if count > 0.0 { total_period as f64 / count } else { 0.0 },
        average_cycle_length: if completed > 0 { total_cycle as f64 / completed as f64 } else { 0.0 },
        cycle_stats: stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn phase_examples_for_a_28_day_cycle() {
        assert_eq!(phase_for_day(3, 28, 5), Phase::Menstrual);
        assert_eq!(phase_for_day(10, 28, 5), Phase::Follicular);
        assert_eq!(phase_for_day(14, 28, 5), Phase::Ovulation);
        assert_eq!(phase_for_day(20, 28, 5), Phase::Luteal);
    }

    #[test]
    fn odd_cycle_length_ovulates_on_rounded_half() {
        assert_eq!(phase_for_day(14, 29, 5), Phase::Follicular);
        assert_eq!(phase_for_day(15, 29, 5), Phase::Ovulation);
        assert_eq!(phase_for_day(16, 29, 5), Phase::Luteal);
    }

    #[test]
    fn menstrual_iff_day_within_period() {
        for length in 2..=45u32 {
            for period in 1..length {
                for day in 1..=length {
                    let phase = phase_for_day(day, length, period);
                    assert_eq!(phase == Phase::Menstrual, day <= period, "d={day} L={length} P={period}");
                }
            }
        }
    }

    #[test]
    fn cycle_day_wraps_and_stays_in_range() {
        let last = date(2024, 1, 1);
        assert_eq!(cycle_day(last, last, 28), 1);
        assert_eq!(cycle_day(last, date(2024, 1, 28), 28), 28);
        assert_eq!(cycle_day(last, date(2024, 1, 29), 28), 1);
        assert_eq!(cycle_day(last, date(2024, 3, 1), 28), 5);
        // last period in the future
        assert_eq!(cycle_day(date(2024, 1, 10), date(2024, 1, 9), 28), 28);
        assert_eq!(cycle_day(last, date(2024, 1, 5), 0), 1);
    }

    #[test]
    fn prediction_example() {
        let p = predict(date(2024, 1, 1), 28).unwrap();
        assert_eq!(p.next_period_date, date(2024, 1, 29));
        assert_eq!(p.ovulation_date, date(2024, 1, 15));
        assert_eq!(p.fertile_window_start, date(2024, 1, 10));
        assert_eq!(p.fertile_window_end, date(2024, 1, 16));
        assert_eq!(Some(p), predict(date(2024, 1, 1), 28));
    }

    #[test]
    fn fertile_window_brackets_ovulation() {
        for length in 15..=60 {
            let p = predict(date(2023, 12, 20), length).unwrap();
            assert!(p.fertile_window_start < p.ovulation_date);
            assert!(p.ovulation_date < p.fertile_window_end);
        }
    }

    #[test]
    fn forecast_uses_placeholders_without_data() {
        let missing = Forecast::describe(None, Some(28));
        assert_eq!(missing.next_period, Forecast::NEEDS_LAST_PERIOD);

        let no_length = Forecast::describe(Some(date(2024, 1, 1)), None);
        assert_eq!(no_length.ovulation, Forecast::NEEDS_CYCLE_LENGTH);

        let full = Forecast::describe(Some(date(2024, 1, 1)), Some(28));
        assert_eq!(full.next_period, "2024-01-29");
        assert_eq!(full.fertile_window, "2024-01-10 to 2024-01-16");
    }

    #[test]
    fn status_reports_fertile_window_and_lateness() {
        let status = CycleStatus::compute(date(2024, 1, 1), 28, 5, date(2024, 1, 12)).unwrap();
        assert_eq!(status.cycle_day, 12);
        assert_eq!(status.phase, Phase::Follicular);
        assert!(status.in_fertile_window);
        assert_eq!(status.period_expected_in_days, 17);

        let late = CycleStatus::compute(date(2024, 1, 1), 28, 5, date(2024, 2, 2)).unwrap();
        assert_eq!(late.period_expected_in_days, -4);
        assert_eq!(late.cycle_day, 5);
    }

    #[test]
    fn dates_at_the_calendar_edge_do_not_panic() {
        let today = date(2024, 1, 1);
        let far = NaiveDate::MAX.checked_sub_signed(Duration::days(10)).unwrap();

        assert!(predict(far, 28).is_none());
        assert!(CycleStatus::compute(far, 28, 5, today).is_none());
        assert_eq!(Forecast::describe(Some(far), Some(28)).next_period, Forecast::NEEDS_LAST_PERIOD);
        assert!((1..=28).contains(&cycle_day(far, today, 28)));

        // a well-formed far-future date from a request body
        let parsed: NaiveDate = serde_json::from_str("\"+262142-12-20\"").unwrap();
        let _ = CycleStatus::compute(parsed, 28, 5, today);
        let _ = Forecast::describe(Some(parsed), Some(28));
        assert!(!is_plausible_period_date(parsed, today));
    }

    #[test]
    fn implausible_period_dates_are_flagged() {
        let today = date(2024, 6, 1);
        assert!(is_plausible_period_date(date(2024, 5, 20), today));
        assert!(is_plausible_period_date(date(2025, 5, 1), today));
        assert!(!is_plausible_period_date(date(2026, 1, 1), today));
        assert!(!is_plausible_period_date(date(1850, 1, 1), today));
    }

    #[test]
    fn stats_average_only_completed_cycles() {
        let stats = cycle_stats(&[
            (date(2024, 1, 1), 5),
            (date(2024, 1, 29), 4),
            (date(2024, 2, 28), 6),
        ]);
        assert_eq!(stats.cycle_stats.len(), 3);
        assert_eq!(stats.cycle_stats[0].cycle_length, 28);
        assert_eq!(stats.cycle_stats[1].cycle_length, 30);
        assert_eq!(stats.cycle_stats[2].cycle_length, 0);
        assert_eq!(stats.average_cycle_length, 29.0);
        assert_eq!(stats.average_period_length, 5.0);

        let empty = cycle_stats(&[]);
        assert_eq!(empty.average_cycle_length, 0.0);
    }
}
