use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::models::{
    GameSession, PatientState, TaskEvent, TaskKind, TaskStatus, TaskTally, WeeklyScore,
};

/// Drop from baseline that marks a candidate decline.
pub const DECLINE_THRESHOLD_POINTS: f64 = 15.0;
/// Consecutive weeks below threshold needed to confirm a decline.
pub const DECLINE_CONSECUTIVE_WEEKS: usize = 2;
/// Weeks averaged into the baseline.
pub const BASELINE_WEEKS: i64 = 4;
/// Minimum persisted weeks before a baseline can be computed.
pub const BASELINE_MIN_WEEKS: usize = 2;
/// Brain-training sessions expected per week, one per day.
pub const EXPECTED_SESSIONS_PER_WEEK: u32 = 7;

/// Compute the weekly cognitive performance score from task events and
/// brain-training sessions inside the window.
///
/// Every scheduled event of a scored type contributes its weight to the
/// possible total; only completed events earn it. Brain training is
/// expected daily, earning its weight per session up to the weekly cap.
pub fn weekly_score(
    patient_id: Uuid,
    events: &[TaskEvent],
    sessions: &[GameSession],
    week_start: DateTime<Utc>,
    week_end: DateTime<Utc>,
) -> WeeklyScore {
    let mut earned = 0.0;
    let mut possible = 0.0;
    let mut breakdown: BTreeMap<String, TaskTally> = BTreeMap::new();
    for kind in [
        TaskKind::Medication,
        TaskKind::Appointment,
        TaskKind::Meal,
        TaskKind::BrainTraining,
    ] {
        breakdown.insert(kind.as_str().to_string(), TaskTally::default());
    }

    for event in events {
        if !event.task_type.is_scheduled() {
            continue;
        }
        let weight = event.task_type.weight();
        possible += weight;

        let tally = breakdown
            .entry(event.task_type.as_str().to_string())
            .or_default();
        tally.total += 1;
        tally.points_possible += weight;

        match event.status {
            TaskStatus::Completed => {
                earned += weight;
                tally.completed += 1;
                tally.points_earned += weight;
            }
            TaskStatus::Missed => tally.missed += 1,
            TaskStatus::Pending => {}
        }
    }

    let brain_weight = TaskKind::BrainTraining.weight();
    let brain_possible = EXPECTED_SESSIONS_PER_WEEK as f64 * brain_weight;
    let completed_sessions = (sessions.len() as u32).min(EXPECTED_SESSIONS_PER_WEEK);
    let brain_earned = completed_sessions as f64 * brain_weight;
    possible += brain_possible;
    earned += brain_earned;

    let brain = breakdown
        .entry(TaskKind::BrainTraining.as_str().to_string())
        .or_default();
    brain.completed = sessions.len() as u32;
    brain.total = EXPECTED_SESSIONS_PER_WEEK;
    brain.points_earned = brain_earned;
    brain.points_possible = brain_possible;

    let score = if possible == 0.0 {
        0.0
    } else {
        (earned / possible * 100.0).clamp(0.0, 100.0)
    };
    let score = round2(score);

    WeeklyScore {
        patient_id,
        week_start,
        week_end,
        score,
        earned_points: round2(earned),
        possible_points: round2(possible),
        patient_state: patient_state(score),
        breakdown,
    }
}

/// Functional state label from the weekly score.
pub fn patient_state(score: f64) -> PatientState {
    if score >= 80.0 {
        PatientState::Stable
    } else if score >= 60.0 {
        PatientState::MildDecline
    } else if score >= 40.0 {
        PatientState::ModerateDecline
    } else {
        PatientState::HighRisk
    }
}

/// Baseline from the oldest persisted weekly scores. Needs at least two
/// weeks of history.
pub fn baseline_from_scores(first_scores: &[f64]) -> Option<f64> {
    if first_scores.len() < BASELINE_MIN_WEEKS {
        return None;
    }
    Some(first_scores.iter().sum::<f64>() / first_scores.len() as f64)
}

#[derive(Debug, Clone, Serialize)]
pub struct DeclineCheck {
    pub decline_detected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<f64>,
    pub current_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difference: Option<f64>,
    pub threshold: f64,
    pub consecutive_weeks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Compare the current score against the baseline, confirming a candidate
/// decline only when the most recent persisted weeks all sit below the
/// threshold. `recent_scores` holds the latest persisted weekly scores,
/// newest first.
pub fn detect_decline(
    baseline: Option<f64>,
    current_score: f64,
    recent_scores: &[f64],
) -> DeclineCheck {
    let Some(baseline) = baseline else {
        return DeclineCheck {
            decline_detected: false,
            baseline: None,
            current_score,
            difference: None,
            threshold: DECLINE_THRESHOLD_POINTS,
            consecutive_weeks: 0,
            reason: Some("insufficient baseline data".to_string()),
        };
    };

    let difference = baseline - current_score;
    let mut detected = difference >= DECLINE_THRESHOLD_POINTS;

    if detected && recent_scores.len() >= DECLINE_CONSECUTIVE_WEEKS {
        detected = recent_scores
            .iter()
            .take(DECLINE_CONSECUTIVE_WEEKS)
            .all(|score| baseline - score >= DECLINE_THRESHOLD_POINTS);
    }

    DeclineCheck {
        decline_detected: detected,
        baseline: Some(round2(baseline)),
        current_score,
        difference: Some(round2(difference)),
        threshold: DECLINE_THRESHOLD_POINTS,
        consecutive_weeks: if detected { DECLINE_CONSECUTIVE_WEEKS } else { 0 },
        reason: None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreTrend {
    Improving,
    Declining,
    Stable,
    NoData,
}

/// Week-over-week trend against the previous persisted score.
pub fn week_over_week(current: f64, previous: Option<f64>) -> (ScoreTrend, String) {
    match previous {
        None => (
            ScoreTrend::NoData,
            "Insufficient data for trend analysis".to_string(),
        ),
        Some(prev) if current > prev + 5.0 => (
            ScoreTrend::Improving,
            format!("Score improved by {:.1} points", current - prev),
        ),
        Some(prev) if current < prev - 5.0 => (
            ScoreTrend::Declining,
            format!("Score decreased by {:.1} points", prev - current),
        ),
        Some(_) => (
            ScoreTrend::Stable,
            "Score remains relatively stable".to_string(),
        ),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 8, 0, 0, 0).unwrap(),
        )
    }

    fn event(kind: TaskKind, status: TaskStatus) -> TaskEvent {
        TaskEvent {
            id: Uuid::new_v4(),
            patient_id: Uuid::nil(),
            task_type: kind,
            title: "task".to_string(),
            scheduled_for: Utc.with_ymd_and_hms(2026, 3, 3, 9, 0, 0).unwrap(),
            status,
        }
    }

    fn session(day: u32) -> GameSession {
        GameSession {
            id: Uuid::new_v4(),
            patient_id: Uuid::nil(),
            game: "memory-match".to_string(),
            score: 120,
            played_at: Utc.with_ymd_and_hms(2026, 3, day, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn score_weights_completed_tasks() {
        let (start, end) = window();
        let events = vec![
            event(TaskKind::Medication, TaskStatus::Completed),
            event(TaskKind::Medication, TaskStatus::Missed),
            event(TaskKind::Appointment, TaskStatus::Completed),
            event(TaskKind::Meal, TaskStatus::Pending),
        ];
        let sessions: Vec<GameSession> = (1..=3).map(session).collect();

        let result = weekly_score(Uuid::nil(), &events, &sessions, start, end);

        // earned: 3 + 3 + 3*2 = 12; possible: 3+3+3+2 + 14 = 25
        assert_eq!(result.earned_points, 12.0);
        assert_eq!(result.possible_points, 25.0);
        assert_eq!(result.score, 48.0);
        assert_eq!(result.patient_state, PatientState::ModerateDecline);

        let meds = &result.breakdown["medication"];
        assert_eq!(meds.completed, 1);
        assert_eq!(meds.missed, 1);
        assert_eq!(meds.total, 2);
    }

    #[test]
    fn score_stays_within_bounds_with_extra_sessions() {
        let (start, end) = window();
        let events = vec![event(TaskKind::Medication, TaskStatus::Completed)];
        let sessions: Vec<GameSession> = (1..=7).chain(1..=5).map(session).collect();

        let result = weekly_score(Uuid::nil(), &events, &sessions, start, end);
        assert!(result.score <= 100.0);
        assert_eq!(result.score, 100.0);
    }

    #[test]
    fn empty_week_scores_low_not_negative() {
        let (start, end) = window();
        let result = weekly_score(Uuid::nil(), &[], &[], start, end);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.patient_state, PatientState::HighRisk);
    }

    #[test]
    fn state_thresholds_are_exact() {
        assert_eq!(patient_state(80.0), PatientState::Stable);
        assert_eq!(patient_state(79.99), PatientState::MildDecline);
        assert_eq!(patient_state(60.0), PatientState::MildDecline);
        assert_eq!(patient_state(59.99), PatientState::ModerateDecline);
        assert_eq!(patient_state(40.0), PatientState::ModerateDecline);
        assert_eq!(patient_state(39.99), PatientState::HighRisk);
    }

    #[test]
    fn baseline_needs_two_weeks() {
        assert_eq!(baseline_from_scores(&[75.0]), None);
        assert_eq!(baseline_from_scores(&[80.0, 70.0]), Some(75.0));
        assert_eq!(
            baseline_from_scores(&[80.0, 70.0, 90.0, 60.0]),
            Some(75.0)
        );
    }

    #[test]
    fn decline_fires_exactly_at_threshold() {
        let check = detect_decline(Some(80.0), 65.0, &[65.0, 64.0]);
        assert!(check.decline_detected);
        assert_eq!(check.difference, Some(15.0));

        let check = detect_decline(Some(80.0), 65.01, &[65.01, 64.0]);
        assert!(!check.decline_detected);
    }

    #[test]
    fn decline_needs_consecutive_weeks_below() {
        // Current week is bad but the prior week bounced back.
        let check = detect_decline(Some(80.0), 60.0, &[60.0, 78.0]);
        assert!(!check.decline_detected);

        let check = detect_decline(Some(80.0), 60.0, &[60.0, 58.0]);
        assert!(check.decline_detected);
        assert_eq!(check.consecutive_weeks, DECLINE_CONSECUTIVE_WEEKS);
    }

    #[test]
    fn decline_without_baseline_reports_reason() {
        let check = detect_decline(None, 50.0, &[]);
        assert!(!check.decline_detected);
        assert_eq!(check.reason.as_deref(), Some("insufficient baseline data"));
    }

    #[test]
    fn week_over_week_bands() {
        assert_eq!(week_over_week(80.0, Some(70.0)).0, ScoreTrend::Improving);
        assert_eq!(week_over_week(60.0, Some(70.0)).0, ScoreTrend::Declining);
        assert_eq!(week_over_week(72.0, Some(70.0)).0, ScoreTrend::Stable);
        assert_eq!(week_over_week(72.0, None).0, ScoreTrend::NoData);
    }
}
