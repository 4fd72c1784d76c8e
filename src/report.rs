use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::db;
use crate::models::{Baseline, Patient, PatientState, TaskTally, WeeklyScore};
use crate::notify;
use crate::progress::{self, DeclineCheck, ScoreTrend};
use crate::risk::{self, RiskAssessment};
use crate::trends::{
    self, EmotionTrends, PersistenceCheck, TrendSummary, VolatilityCheck,
    PERSISTENT_DAYS_DEFAULT,
};

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyReport {
    pub patient_id: Uuid,
    pub report_date: DateTime<Utc>,
    pub week_start: DateTime<Utc>,
    pub week_end: DateTime<Utc>,
    pub weekly_score: f64,
    pub patient_state: PatientState,
    pub state_description: &'static str,
    pub trend: ScoreTrend,
    pub trend_description: String,
    pub previous_score: Option<f64>,
    pub breakdown: BTreeMap<String, TaskTally>,
    pub decline_detection: DeclineCheck,
    pub score_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmotionAnalysisSection {
    pub trend_summary: TrendSummary,
    pub weekly_trends: EmotionTrends,
    pub persistent_negative_emotions: PersistenceCheck,
    pub volatility: VolatilityCheck,
}

#[derive(Debug, Clone, Serialize)]
pub struct CombinedReport {
    #[serde(flatten)]
    pub progress: WeeklyReport,
    pub emotion_analysis: EmotionAnalysisSection,
    pub combined_risk_assessment: RiskAssessment,
}

/// Compute the current week's score without persisting anything.
pub async fn weekly_score_snapshot(
    pool: &PgPool,
    patient_id: Uuid,
    now: DateTime<Utc>,
) -> anyhow::Result<WeeklyScore> {
    let week_start = now - Duration::days(7);
    let events = db::fetch_task_events(pool, patient_id, week_start, now).await?;
    let sessions = db::fetch_game_sessions(pool, patient_id, week_start, now).await?;
    Ok(progress::weekly_score(
        patient_id, &events, &sessions, week_start, now,
    ))
}

/// Baseline for the patient, computing and persisting it from the first
/// recorded weeks when none exists yet.
pub async fn get_or_compute_baseline(
    pool: &PgPool,
    patient_id: Uuid,
) -> anyhow::Result<Option<Baseline>> {
    if let Some(baseline) = db::get_baseline(pool, patient_id).await? {
        return Ok(Some(baseline));
    }

    let first = db::fetch_first_weekly_scores(pool, patient_id, progress::BASELINE_WEEKS).await?;
    match progress::baseline_from_scores(&first) {
        Some(score) => {
            let baseline = Baseline {
                patient_id,
                score,
                weeks_used: first.len() as i32,
            };
            db::upsert_baseline(pool, &baseline).await?;
            Ok(Some(baseline))
        }
        None => Ok(None),
    }
}

/// Decline status for the current week, without persisting a score record.
pub async fn decline_status(
    pool: &PgPool,
    patient_id: Uuid,
    now: DateTime<Utc>,
) -> anyhow::Result<DeclineCheck> {
    let current = weekly_score_snapshot(pool, patient_id, now).await?;
    let baseline = get_or_compute_baseline(pool, patient_id).await?;
    let recent = db::fetch_recent_weekly_scores(
        pool,
        patient_id,
        progress::DECLINE_CONSECUTIVE_WEEKS as i64,
    )
    .await?;

    Ok(progress::detect_decline(
        baseline.map(|b| b.score),
        current.score,
        &recent,
    ))
}

/// Full weekly progress report. Persists the score record and raises the
/// caregiver decline alert when the decline is confirmed; alert failures
/// are logged, never propagated.
pub async fn weekly_progress_report(
    pool: &PgPool,
    patient_id: Uuid,
    now: DateTime<Utc>,
) -> anyhow::Result<WeeklyReport> {
    let score = weekly_score_snapshot(pool, patient_id, now).await?;

    let baseline = get_or_compute_baseline(pool, patient_id).await?;
    let recent = db::fetch_recent_weekly_scores(
        pool,
        patient_id,
        progress::DECLINE_CONSECUTIVE_WEEKS as i64,
    )
    .await?;
    let decline = progress::detect_decline(baseline.map(|b| b.score), score.score, &recent);

    let previous = db::fetch_previous_week_score(pool, patient_id, score.week_start).await?;
    let (trend, trend_description) = progress::week_over_week(score.score, previous);

    let score_id = db::insert_weekly_score(pool, &score).await?;

    if decline.decline_detected {
        if let Err(err) = notify::decline_alert(pool, patient_id, &decline).await {
            warn!(%patient_id, "failed to send decline alert: {err:#}");
        }
    }

    Ok(WeeklyReport {
        patient_id,
        report_date: now,
        week_start: score.week_start,
        week_end: score.week_end,
        weekly_score: score.score,
        patient_state: score.patient_state,
        state_description: score.patient_state.description(),
        trend,
        trend_description,
        previous_score: previous,
        breakdown: score.breakdown,
        decline_detection: decline,
        score_id,
    })
}

/// Weekly report joined with emotion analysis and the combined risk
/// assessment. High or critical combined risk notifies caregivers.
pub async fn combined_weekly_report(
    pool: &PgPool,
    patient_id: Uuid,
    now: DateTime<Utc>,
) -> anyhow::Result<CombinedReport> {
    let progress_report = weekly_progress_report(pool, patient_id, now).await?;

    let week_start = now - Duration::days(7);
    let week_entries =
        db::fetch_journal_entries(pool, patient_id, Some(week_start), Some(now), None).await?;
    let weekly_trends = trends::emotion_trends(patient_id, &week_entries, 7, week_start, now);

    let summary_entries = db::fetch_journal_entries(pool, patient_id, None, None, Some(14)).await?;
    let trend_summary = trends::trend_summary(&summary_entries);

    let persistence_start = now - Duration::days(PERSISTENT_DAYS_DEFAULT);
    let persistence_entries =
        db::fetch_journal_entries(pool, patient_id, Some(persistence_start), Some(now), None)
            .await?;
    let persistent = trends::persistent_negative(&persistence_entries, PERSISTENT_DAYS_DEFAULT);

    let volatility = trends::volatility(&week_entries);

    let assessment = risk::assess_combined_risk(
        progress_report.patient_state,
        progress_report.decline_detection.decline_detected,
        persistent.persistent_negative_detected,
        trend_summary.trend,
    );

    if let Err(err) = notify::combined_risk(pool, patient_id, &assessment).await {
        warn!(%patient_id, "failed to send combined risk alert: {err:#}");
    }

    Ok(CombinedReport {
        progress: progress_report,
        emotion_analysis: EmotionAnalysisSection {
            trend_summary,
            weekly_trends,
            persistent_negative_emotions: persistent,
            volatility,
        },
        combined_risk_assessment: assessment,
    })
}

/// Markdown rendering of a weekly report for the CLI.
pub fn build_markdown_report(
    patient: &Patient,
    report: &WeeklyReport,
    emotion_trends: &EmotionTrends,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Companion Weekly Report");
    let _ = writeln!(
        output,
        "Generated for {} (week of {})",
        patient.full_name,
        report.week_start.date_naive()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Weekly Score");
    let _ = writeln!(
        output,
        "- {:.1}/100 ({}) - {}",
        report.weekly_score,
        report.patient_state.as_str(),
        report.state_description
    );
    let _ = writeln!(output, "- Trend: {}", report.trend_description);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Task Breakdown");
    for (task_type, tally) in report.breakdown.iter() {
        let _ = writeln!(
            output,
            "- {}: {}/{} completed, {} missed ({:.0}/{:.0} points)",
            task_type,
            tally.completed,
            tally.total,
            tally.missed,
            tally.points_earned,
            tally.points_possible
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Emotion Mix");
    if emotion_trends.trends.is_empty() {
        let _ = writeln!(output, "No journal entries recorded for this window.");
    } else {
        for line in emotion_trends.trends.iter() {
            let _ = writeln!(output, "- {}", line.description);
        }
        if emotion_trends.mood_risk_count > 0 {
            let _ = writeln!(
                output,
                "- Mood risk flagged in {} of {} entries",
                emotion_trends.mood_risk_count, emotion_trends.total_entries
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Decline Check");
    let decline = &report.decline_detection;
    if decline.decline_detected {
        let _ = writeln!(
            output,
            "Decline detected: {:.1} points below baseline {:.1} for {} consecutive weeks.",
            decline.difference.unwrap_or(0.0),
            decline.baseline.unwrap_or(0.0),
            decline.consecutive_weeks
        );
    } else if let Some(reason) = &decline.reason {
        let _ = writeln!(output, "No decline detected ({reason}).");
    } else {
        let _ = writeln!(output, "No decline detected.");
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Emotion;
    use chrono::TimeZone;

    fn sample_report() -> WeeklyReport {
        let mut breakdown = BTreeMap::new();
        breakdown.insert(
            "medication".to_string(),
            TaskTally {
                completed: 5,
                missed: 2,
                total: 7,
                points_earned: 15.0,
                points_possible: 21.0,
            },
        );

        WeeklyReport {
            patient_id: Uuid::nil(),
            report_date: Utc.with_ymd_and_hms(2026, 3, 8, 12, 0, 0).unwrap(),
            week_start: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            week_end: Utc.with_ymd_and_hms(2026, 3, 8, 12, 0, 0).unwrap(),
            weekly_score: 62.5,
            patient_state: PatientState::MildDecline,
            state_description: PatientState::MildDecline.description(),
            trend: ScoreTrend::Declining,
            trend_description: "Score decreased by 8.0 points".to_string(),
            previous_score: Some(70.5),
            breakdown,
            decline_detection: progress::detect_decline(Some(80.0), 62.5, &[62.5, 60.0]),
            score_id: Uuid::nil(),
        }
    }

    fn sample_trends() -> EmotionTrends {
        let entry = crate::models::JournalEntry {
            id: Uuid::new_v4(),
            patient_id: Uuid::nil(),
            journal_text: "felt anxious".to_string(),
            processed_text: None,
            primary_emotion: Emotion::Anxious,
            primary_intensity: 72,
            primary_confidence: 0.9,
            secondary_emotion: None,
            secondary_intensity: None,
            secondary_confidence: None,
            interpretation_tag: "high anxiety".to_string(),
            mood_risk: true,
            audio_url: None,
            recorded_at: Utc.with_ymd_and_hms(2026, 3, 5, 9, 0, 0).unwrap(),
        };
        trends::emotion_trends(
            Uuid::nil(),
            &[entry],
            7,
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 8, 12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn markdown_report_carries_all_sections() {
        let patient = Patient {
            id: Uuid::nil(),
            full_name: "Margaret Ellis".to_string(),
            email: "margaret.ellis@example.com".to_string(),
        };
        let report = build_markdown_report(&patient, &sample_report(), &sample_trends());

        assert!(report.contains("# Companion Weekly Report"));
        assert!(report.contains("Margaret Ellis"));
        assert!(report.contains("## Weekly Score"));
        assert!(report.contains("62.5/100 (mild_decline)"));
        assert!(report.contains("## Task Breakdown"));
        assert!(report.contains("medication: 5/7 completed, 2 missed"));
        assert!(report.contains("## Emotion Mix"));
        assert!(report.contains("anxious appears 1/1 entries"));
        assert!(report.contains("## Decline Check"));
        assert!(report.contains("Decline detected"));
    }

    #[test]
    fn markdown_report_handles_empty_emotion_window() {
        let patient = Patient {
            id: Uuid::nil(),
            full_name: "Harold Jennings".to_string(),
            email: "harold.jennings@example.com".to_string(),
        };
        let empty = trends::emotion_trends(
            Uuid::nil(),
            &[],
            7,
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 8, 12, 0, 0).unwrap(),
        );
        let report = build_markdown_report(&patient, &sample_report(), &empty);
        assert!(report.contains("No journal entries recorded for this window."));
    }
}
