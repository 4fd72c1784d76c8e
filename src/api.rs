//! HTTP surface for the companion backend.
//!
//! Stateless request-per-call handlers over the shared connection pool;
//! routing and middleware follow the usual axum shape with permissive CORS
//! and per-request tracing.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db;
use crate::error::{Result, ServiceError};
use crate::media::MediaClient;
use crate::models::{
    Classification, Emotion, GameSession, JournalEntry, TaskEvent, TaskKind, TaskStatus,
};
use crate::notify;
use crate::report;
use crate::trends::{self, PERSISTENT_DAYS_DEFAULT, SHIFT_INCREASE_DEFAULT};
use crate::{classify, progress};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub media: Option<MediaClient>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        // Emotion analysis
        .route("/analyze-emotion", post(analyze_emotion_handler))
        .route(
            "/analyze-emotion-with-audio",
            post(analyze_emotion_with_audio_handler),
        )
        .route("/emotion-entries/:patient_id", get(emotion_entries_handler))
        .route("/emotion-trends/:patient_id", get(emotion_trends_handler))
        .route("/daily-summary/:patient_id", get(daily_summary_handler))
        .route("/weekly-summary/:patient_id", get(weekly_summary_handler))
        .route(
            "/emotion/shift-detection/:patient_id",
            get(shift_detection_handler),
        )
        .route(
            "/emotion/persistent-negative/:patient_id",
            get(persistent_negative_handler),
        )
        .route("/emotion/volatility/:patient_id", get(volatility_handler))
        .route(
            "/emotion/trend-summary/:patient_id",
            get(trend_summary_handler),
        )
        // Progress tracking
        .route(
            "/progress/weekly-score/:patient_id",
            get(weekly_score_handler),
        )
        .route(
            "/progress/weekly-report/:patient_id",
            get(weekly_report_handler),
        )
        .route(
            "/progress/decline-detection/:patient_id",
            get(decline_detection_handler),
        )
        // Combined analysis
        .route(
            "/combined/weekly-report/:patient_id",
            get(combined_report_handler),
        )
        // Task and session ingestion
        .route("/task-events", post(create_task_event_handler))
        .route("/task-events/:task_id/status", post(task_status_handler))
        .route("/game-sessions", post(create_game_session_handler))
        // Caregiver notifications
        .route(
            "/notifications/:caregiver_id",
            get(list_notifications_handler),
        )
        .route(
            "/notifications/:notification_id/read",
            post(mark_notification_read_handler),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("companion API listening on http://{addr}");
    axum::serve(listener, router).await?;
    Ok(())
}

async fn require_patient(pool: &PgPool, patient_id: Uuid) -> Result<()> {
    match db::fetch_patient(pool, patient_id).await? {
        Some(_) => Ok(()),
        None => Err(ServiceError::NotFound(format!("patient {patient_id}"))),
    }
}

fn entry_from_classification(
    patient_id: Uuid,
    journal_text: String,
    classification: &Classification,
    recorded_at: DateTime<Utc>,
    audio_url: Option<String>,
) -> JournalEntry {
    JournalEntry {
        id: Uuid::new_v4(),
        patient_id,
        journal_text,
        processed_text: Some(classification.processed_text.clone()),
        primary_emotion: classification.primary.emotion,
        primary_intensity: classification.primary.intensity,
        primary_confidence: classification.primary.confidence,
        secondary_emotion: classification.secondary.as_ref().map(|s| s.emotion),
        secondary_intensity: classification.secondary.as_ref().map(|s| s.intensity),
        secondary_confidence: classification.secondary.as_ref().map(|s| s.confidence),
        interpretation_tag: classification.primary.interpretation_tag.clone(),
        mood_risk: classification.mood_risk,
        audio_url,
        recorded_at,
    }
}

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    patient_id: Uuid,
    journal_text: String,
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct AnalyzeResponse {
    patient_id: Uuid,
    entry_id: Uuid,
    recorded_at: DateTime<Utc>,
    analysis: Classification,
    audio_url: Option<String>,
}

async fn analyze_emotion_handler(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>> {
    require_patient(&state.pool, req.patient_id).await?;

    let recorded_at = req.timestamp.unwrap_or_else(Utc::now);
    let analysis = classify::analyze_emotion(&req.journal_text);
    let entry = entry_from_classification(
        req.patient_id,
        req.journal_text,
        &analysis,
        recorded_at,
        None,
    );
    let entry_id = db::insert_journal_entry(&state.pool, &entry).await?;

    Ok(Json(AnalyzeResponse {
        patient_id: req.patient_id,
        entry_id,
        recorded_at,
        analysis,
        audio_url: None,
    }))
}

async fn analyze_emotion_with_audio_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResponse>> {
    let mut patient_id: Option<Uuid> = None;
    let mut journal_text: Option<String> = None;
    let mut timestamp: Option<DateTime<Utc>> = None;
    let mut audio: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::Validation(e.to_string()))?
    {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("patient_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServiceError::Validation(e.to_string()))?;
                patient_id = Some(
                    text.parse()
                        .map_err(|_| ServiceError::Validation("patient_id must be a UUID".into()))?,
                );
            }
            Some("journal_text") => {
                journal_text = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ServiceError::Validation(e.to_string()))?,
                );
            }
            Some("timestamp") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServiceError::Validation(e.to_string()))?;
                timestamp = DateTime::parse_from_rfc3339(&text)
                    .ok()
                    .map(|t| t.with_timezone(&Utc));
            }
            Some("audio_file") => {
                let filename = field
                    .file_name()
                    .unwrap_or("journal-audio")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServiceError::Validation(e.to_string()))?;
                if !bytes.is_empty() {
                    audio = Some((filename, bytes.to_vec()));
                }
            }
            _ => {}
        }
    }

    let patient_id =
        patient_id.ok_or_else(|| ServiceError::Validation("patient_id is required".into()))?;
    let journal_text =
        journal_text.ok_or_else(|| ServiceError::Validation("journal_text is required".into()))?;
    require_patient(&state.pool, patient_id).await?;

    let recorded_at = timestamp.unwrap_or_else(Utc::now);
    let analysis = classify::analyze_emotion(&journal_text);

    // Upload failure degrades to an entry without audio, same as losing the
    // recording in transit.
    let audio_url = match (audio, &state.media) {
        (Some((filename, bytes)), Some(media)) => {
            match media.upload_audio(bytes, &filename, patient_id, None).await {
                Ok(url) => Some(url),
                Err(err) => {
                    warn!(%patient_id, "audio upload failed: {err:#}");
                    None
                }
            }
        }
        (Some(_), None) => {
            warn!(%patient_id, "audio received but no media host is configured");
            None
        }
        _ => None,
    };

    let entry = entry_from_classification(
        patient_id,
        journal_text,
        &analysis,
        recorded_at,
        audio_url.clone(),
    );
    let entry_id = db::insert_journal_entry(&state.pool, &entry).await?;

    Ok(Json(AnalyzeResponse {
        patient_id,
        entry_id,
        recorded_at,
        analysis,
        audio_url,
    }))
}

#[derive(Debug, Deserialize)]
struct EntriesQuery {
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
struct EntriesResponse {
    patient_id: Uuid,
    count: usize,
    entries: Vec<JournalEntry>,
}

async fn emotion_entries_handler(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
    Query(query): Query<EntriesQuery>,
) -> Result<Json<EntriesResponse>> {
    if let Some(limit) = query.limit {
        if limit < 1 {
            return Err(ServiceError::Validation("limit must be positive".into()));
        }
    }

    let entries = db::fetch_journal_entries(
        &state.pool,
        patient_id,
        query.start_date,
        query.end_date,
        query.limit,
    )
    .await?;

    Ok(Json(EntriesResponse {
        patient_id,
        count: entries.len(),
        entries,
    }))
}

#[derive(Debug, Deserialize)]
struct DaysQuery {
    days: Option<i64>,
}

fn validated_days(days: Option<i64>, default: i64) -> Result<i64> {
    let days = days.unwrap_or(default);
    if !(1..=365).contains(&days) {
        return Err(ServiceError::Validation(
            "days must be between 1 and 365".into(),
        ));
    }
    Ok(days)
}

async fn entries_for_window(
    pool: &PgPool,
    patient_id: Uuid,
    days: i64,
    now: DateTime<Utc>,
) -> Result<(Vec<JournalEntry>, DateTime<Utc>)> {
    let start = now - Duration::days(days);
    let entries = db::fetch_journal_entries(pool, patient_id, Some(start), Some(now), None).await?;
    Ok((entries, start))
}

async fn emotion_trends_handler(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
    Query(query): Query<DaysQuery>,
) -> Result<Json<trends::EmotionTrends>> {
    let days = validated_days(query.days, 7)?;
    let now = Utc::now();
    let (entries, start) = entries_for_window(&state.pool, patient_id, days, now).await?;
    Ok(Json(trends::emotion_trends(
        patient_id, &entries, days, start, now,
    )))
}

#[derive(Debug, Deserialize)]
struct DailyQuery {
    date: Option<NaiveDate>,
}

async fn daily_summary_handler(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
    Query(query): Query<DailyQuery>,
) -> Result<Json<trends::DailySummary>> {
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let start = Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN));
    let end = start + Duration::days(1);

    let entries =
        db::fetch_journal_entries(&state.pool, patient_id, Some(start), Some(end), None).await?;
    Ok(Json(trends::daily_summary(patient_id, date, &entries)))
}

#[derive(Debug, Serialize)]
struct WeeklySummaryResponse {
    #[serde(flatten)]
    trends: trends::EmotionTrends,
    summary_insights: Vec<String>,
}

async fn weekly_summary_handler(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<WeeklySummaryResponse>> {
    let now = Utc::now();
    let (entries, start) = entries_for_window(&state.pool, patient_id, 7, now).await?;
    let trends = trends::emotion_trends(patient_id, &entries, 7, start, now);
    let summary_insights = trends::weekly_insights(&trends);

    Ok(Json(WeeklySummaryResponse {
        trends,
        summary_insights,
    }))
}

#[derive(Debug, Deserialize)]
struct ShiftQuery {
    emotion: String,
    days: Option<i64>,
    intensity_increase: Option<f64>,
}

async fn shift_detection_handler(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
    Query(query): Query<ShiftQuery>,
) -> Result<Json<trends::ShiftDetection>> {
    let emotion: Emotion = query
        .emotion
        .parse()
        .map_err(ServiceError::Validation)?;
    let days = validated_days(query.days, 7)?;
    let threshold = query.intensity_increase.unwrap_or(SHIFT_INCREASE_DEFAULT);

    let now = Utc::now();
    let (entries, _) = entries_for_window(&state.pool, patient_id, days, now).await?;
    Ok(Json(trends::detect_shift(emotion, &entries, threshold, days)))
}

async fn persistent_negative_handler(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
    Query(query): Query<DaysQuery>,
) -> Result<Json<trends::PersistenceCheck>> {
    let days = validated_days(query.days, PERSISTENT_DAYS_DEFAULT)?;
    let now = Utc::now();
    let (entries, _) = entries_for_window(&state.pool, patient_id, days, now).await?;
    let check = trends::persistent_negative(&entries, days);

    if check.persistent_negative_detected {
        if let Err(err) = notify::emotion_alert(&state.pool, patient_id, &check).await {
            warn!(%patient_id, "failed to send emotion alert: {err:#}");
        }
    }

    Ok(Json(check))
}

async fn volatility_handler(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
    Query(query): Query<DaysQuery>,
) -> Result<Json<trends::VolatilityCheck>> {
    let days = validated_days(query.days, 7)?;
    let now = Utc::now();
    let (entries, _) = entries_for_window(&state.pool, patient_id, days, now).await?;
    Ok(Json(trends::volatility(&entries)))
}

#[derive(Debug, Serialize)]
struct TrendSummaryResponse {
    patient_id: Uuid,
    #[serde(flatten)]
    summary: trends::TrendSummary,
}

async fn trend_summary_handler(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
    Query(query): Query<DaysQuery>,
) -> Result<Json<TrendSummaryResponse>> {
    let days = validated_days(query.days, 7)?;
    let entries =
        db::fetch_journal_entries(&state.pool, patient_id, None, None, Some(days * 2)).await?;

    Ok(Json(TrendSummaryResponse {
        patient_id,
        summary: trends::trend_summary(&entries),
    }))
}

async fn weekly_score_handler(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<crate::models::WeeklyScore>> {
    require_patient(&state.pool, patient_id).await?;
    let score = report::weekly_score_snapshot(&state.pool, patient_id, Utc::now()).await?;
    Ok(Json(score))
}

async fn weekly_report_handler(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<report::WeeklyReport>> {
    require_patient(&state.pool, patient_id).await?;
    let report = report::weekly_progress_report(&state.pool, patient_id, Utc::now()).await?;
    Ok(Json(report))
}

async fn decline_detection_handler(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<progress::DeclineCheck>> {
    require_patient(&state.pool, patient_id).await?;
    let check = report::decline_status(&state.pool, patient_id, Utc::now()).await?;
    Ok(Json(check))
}

async fn combined_report_handler(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<report::CombinedReport>> {
    require_patient(&state.pool, patient_id).await?;
    let report = report::combined_weekly_report(&state.pool, patient_id, Utc::now()).await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
struct CreateTaskEventRequest {
    patient_id: Uuid,
    task_type: TaskKind,
    title: String,
    scheduled_for: DateTime<Utc>,
    status: Option<TaskStatus>,
    source_key: Option<String>,
}

async fn create_task_event_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateTaskEventRequest>,
) -> Result<(StatusCode, Json<TaskEvent>)> {
    if req.title.trim().is_empty() {
        return Err(ServiceError::Validation("title must not be empty".into()));
    }
    require_patient(&state.pool, req.patient_id).await?;

    let event = TaskEvent {
        id: Uuid::new_v4(),
        patient_id: req.patient_id,
        task_type: req.task_type,
        title: req.title,
        scheduled_for: req.scheduled_for,
        status: req.status.unwrap_or(TaskStatus::Pending),
    };
    db::insert_task_event(&state.pool, &event, req.source_key.as_deref()).await?;

    Ok((StatusCode::CREATED, Json(event)))
}

#[derive(Debug, Deserialize)]
struct TaskStatusRequest {
    status: TaskStatus,
}

async fn task_status_handler(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<TaskStatusRequest>,
) -> Result<Json<TaskEvent>> {
    let event = db::update_task_status(&state.pool, task_id, req.status)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("task event {task_id}")))?;

    // A missed appointment alerts caregivers immediately.
    if event.task_type == TaskKind::Appointment && event.status == TaskStatus::Missed {
        if let Err(err) = notify::appointment_missed(&state.pool, &event).await {
            warn!(patient_id = %event.patient_id, "failed to send missed-appointment alert: {err:#}");
        }
    }

    Ok(Json(event))
}

#[derive(Debug, Deserialize)]
struct CreateGameSessionRequest {
    patient_id: Uuid,
    game: String,
    score: i32,
    played_at: Option<DateTime<Utc>>,
}

async fn create_game_session_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateGameSessionRequest>,
) -> Result<(StatusCode, Json<GameSession>)> {
    if req.game.trim().is_empty() {
        return Err(ServiceError::Validation("game must not be empty".into()));
    }
    require_patient(&state.pool, req.patient_id).await?;

    let session = GameSession {
        id: Uuid::new_v4(),
        patient_id: req.patient_id,
        game: req.game,
        score: req.score,
        played_at: req.played_at.unwrap_or_else(Utc::now),
    };
    db::insert_game_session(&state.pool, &session).await?;

    Ok((StatusCode::CREATED, Json(session)))
}

#[derive(Debug, Deserialize)]
struct NotificationsQuery {
    #[serde(default)]
    unread_only: bool,
}

#[derive(Debug, Serialize)]
struct NotificationsResponse {
    caregiver_id: Uuid,
    count: usize,
    notifications: Vec<crate::models::Notification>,
}

async fn list_notifications_handler(
    State(state): State<AppState>,
    Path(caregiver_id): Path<Uuid>,
    Query(query): Query<NotificationsQuery>,
) -> Result<Json<NotificationsResponse>> {
    let notifications =
        db::fetch_notifications(&state.pool, caregiver_id, query.unread_only).await?;
    Ok(Json(NotificationsResponse {
        caregiver_id,
        count: notifications.len(),
        notifications,
    }))
}

async fn mark_notification_read_handler(
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
) -> Result<StatusCode> {
    if db::mark_notification_read(&state.pool, notification_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ServiceError::NotFound(format!(
            "notification {notification_id}"
        )))
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn root_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "CareMind companion API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "emotion_analysis": {
                "analyze": "/analyze-emotion",
                "analyze_with_audio": "/analyze-emotion-with-audio",
                "entries": "/emotion-entries/{patient_id}",
                "trends": "/emotion-trends/{patient_id}",
                "daily_summary": "/daily-summary/{patient_id}",
                "weekly_summary": "/weekly-summary/{patient_id}",
                "shift_detection": "/emotion/shift-detection/{patient_id}",
                "persistent_negative": "/emotion/persistent-negative/{patient_id}",
                "volatility": "/emotion/volatility/{patient_id}",
                "trend_summary": "/emotion/trend-summary/{patient_id}"
            },
            "progress_tracking": {
                "weekly_score": "/progress/weekly-score/{patient_id}",
                "weekly_report": "/progress/weekly-report/{patient_id}",
                "decline_detection": "/progress/decline-detection/{patient_id}"
            },
            "combined_analysis": {
                "combined_report": "/combined/weekly-report/{patient_id}"
            },
            "ingestion": {
                "task_events": "/task-events",
                "task_status": "/task-events/{task_id}/status",
                "game_sessions": "/game-sessions"
            },
            "notifications": {
                "list": "/notifications/{caregiver_id}",
                "mark_read": "/notifications/{notification_id}/read"
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn days_validation_bounds() {
        assert!(validated_days(None, 7).is_ok_and(|d| d == 7));
        assert!(validated_days(Some(1), 7).is_ok());
        assert!(validated_days(Some(365), 7).is_ok());
        assert!(validated_days(Some(0), 7).is_err());
        assert!(validated_days(Some(366), 7).is_err());
    }

    #[test]
    fn entry_carries_classification_fields() {
        let analysis = classify::analyze_emotion("I feel so hopeless and very anxious");
        let entry = entry_from_classification(
            Uuid::nil(),
            "I feel so hopeless and very anxious".to_string(),
            &analysis,
            Utc::now(),
            None,
        );

        assert_eq!(entry.primary_emotion, analysis.primary.emotion);
        assert_eq!(entry.primary_intensity, analysis.primary.intensity);
        assert_eq!(entry.mood_risk, analysis.mood_risk);
        assert_eq!(
            entry.secondary_emotion,
            analysis.secondary.as_ref().map(|s| s.emotion)
        );
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = health_handler().await;
        assert_eq!(response.0.status, "ok");
    }
}
