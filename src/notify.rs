use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::models::{Notification, NotificationKind, Priority, TaskEvent};
use crate::progress::DeclineCheck;
use crate::risk::{RiskAssessment, RiskLevel};
use crate::trends::PersistenceCheck;

pub fn emotion_alert_message(patient_name: &str, days_with_high_negative: usize) -> String {
    format!(
        "{patient_name} has been experiencing persistent high-intensity negative emotions \
         ({days_with_high_negative} days). Please check in with them."
    )
}

pub fn decline_alert_message(patient_name: &str, difference: f64, current_score: f64) -> String {
    format!(
        "{patient_name}'s cognitive performance score has declined by {difference:.1} points \
         from baseline. Current score: {current_score:.1}/100. Please review their progress \
         report."
    )
}

pub fn appointment_missed_message(patient_name: &str, event: &TaskEvent) -> String {
    format!(
        "{patient_name} missed an appointment: {} (scheduled for {}). Please follow up.",
        event.title,
        event.scheduled_for.to_rfc3339()
    )
}

pub fn combined_risk_message(patient_name: &str, assessment: &RiskAssessment) -> String {
    format!(
        "{patient_name} is showing signs of both functional decline and emotional distress. \
         Risk level: {}. {}",
        assessment.combined_risk_level.as_str().to_uppercase(),
        assessment.recommendation
    )
}

async fn fan_out(
    pool: &PgPool,
    patient_id: Uuid,
    title: String,
    message: String,
    kind: NotificationKind,
    priority: Priority,
    payload: serde_json::Value,
) -> anyhow::Result<Vec<Uuid>> {
    let caregiver_ids = db::fetch_caregiver_ids(pool, patient_id).await?;
    let mut notification_ids = Vec::with_capacity(caregiver_ids.len());

    for caregiver_id in caregiver_ids {
        let notification = Notification {
            id: Uuid::new_v4(),
            recipient_id: caregiver_id,
            patient_id,
            title: title.clone(),
            message: message.clone(),
            kind,
            priority,
            read: false,
            payload: payload.clone(),
            created_at: Utc::now(),
        };
        notification_ids.push(db::insert_notification(pool, &notification).await?);
    }

    Ok(notification_ids)
}

async fn patient_name(pool: &PgPool, patient_id: Uuid) -> anyhow::Result<String> {
    Ok(db::fetch_patient(pool, patient_id)
        .await?
        .map(|p| p.full_name)
        .unwrap_or_else(|| "Patient".to_string()))
}

pub async fn emotion_alert(
    pool: &PgPool,
    patient_id: Uuid,
    check: &PersistenceCheck,
) -> anyhow::Result<Vec<Uuid>> {
    let name = patient_name(pool, patient_id).await?;
    fan_out(
        pool,
        patient_id,
        format!("Emotion Alert: {name}"),
        emotion_alert_message(&name, check.days_with_high_negative),
        NotificationKind::EmotionAlert,
        Priority::High,
        serde_json::to_value(check)?,
    )
    .await
}

pub async fn decline_alert(
    pool: &PgPool,
    patient_id: Uuid,
    check: &DeclineCheck,
) -> anyhow::Result<Vec<Uuid>> {
    let name = patient_name(pool, patient_id).await?;
    fan_out(
        pool,
        patient_id,
        format!("Decline Alert: {name}"),
        decline_alert_message(&name, check.difference.unwrap_or(0.0), check.current_score),
        NotificationKind::DeclineAlert,
        Priority::High,
        serde_json::to_value(check)?,
    )
    .await
}

pub async fn appointment_missed(pool: &PgPool, event: &TaskEvent) -> anyhow::Result<Vec<Uuid>> {
    let name = patient_name(pool, event.patient_id).await?;
    fan_out(
        pool,
        event.patient_id,
        format!("Missed Appointment: {name}"),
        appointment_missed_message(&name, event),
        NotificationKind::AppointmentMissed,
        Priority::Urgent,
        serde_json::to_value(event)?,
    )
    .await
}

/// Only high and critical combined risk reaches caregivers.
pub async fn combined_risk(
    pool: &PgPool,
    patient_id: Uuid,
    assessment: &RiskAssessment,
) -> anyhow::Result<Vec<Uuid>> {
    if !matches!(
        assessment.combined_risk_level,
        RiskLevel::High | RiskLevel::Critical
    ) {
        return Ok(Vec::new());
    }

    let priority = if assessment.combined_risk_level == RiskLevel::Critical {
        Priority::Urgent
    } else {
        Priority::High
    };

    let name = patient_name(pool, patient_id).await?;
    fan_out(
        pool,
        patient_id,
        format!("High Risk Alert: {name}"),
        combined_risk_message(&name, assessment),
        NotificationKind::CombinedRiskAlert,
        priority,
        serde_json::to_value(assessment)?,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PatientState, TaskKind, TaskStatus};
    use crate::risk::assess_combined_risk;
    use crate::trends::TrendDirection;
    use chrono::TimeZone;

    #[test]
    fn emotion_message_names_the_day_count() {
        let message = emotion_alert_message("Margaret Ellis", 4);
        assert!(message.contains("Margaret Ellis"));
        assert!(message.contains("(4 days)"));
    }

    #[test]
    fn decline_message_reports_drop_and_score() {
        let message = decline_alert_message("Harold Jennings", 18.5, 61.5);
        assert!(message.contains("declined by 18.5 points"));
        assert!(message.contains("61.5/100"));
    }

    #[test]
    fn appointment_message_includes_title() {
        let event = TaskEvent {
            id: Uuid::new_v4(),
            patient_id: Uuid::nil(),
            task_type: TaskKind::Appointment,
            title: "Memory clinic follow-up".to_string(),
            scheduled_for: Utc.with_ymd_and_hms(2026, 3, 3, 14, 0, 0).unwrap(),
            status: TaskStatus::Missed,
        };
        let message = appointment_missed_message("Margaret Ellis", &event);
        assert!(message.contains("Memory clinic follow-up"));
    }

    #[test]
    fn combined_message_carries_level_and_recommendation() {
        let assessment = assess_combined_risk(
            PatientState::ModerateDecline,
            true,
            true,
            TrendDirection::Worsening,
        );
        let message = combined_risk_message("Margaret Ellis", &assessment);
        assert!(message.contains("CRITICAL"));
        assert!(message.contains(assessment.recommendation));
    }
}
