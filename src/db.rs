use anyhow::Context;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    Baseline, GameSession, JournalEntry, Notification, Patient, TaskEvent, TaskStatus, WeeklyScore,
};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let patients = vec![
        (
            Uuid::parse_str("7c9e1d4a-52b3-4f6e-9a1c-8d2f30b5e6a7")?,
            "Margaret Ellis",
            "margaret.ellis@example.com",
        ),
        (
            Uuid::parse_str("1f8b2c3d-4e5f-4a6b-8c7d-9e0f1a2b3c4d")?,
            "Harold Jennings",
            "harold.jennings@example.com",
        ),
    ];

    for (id, name, email) in &patients {
        sqlx::query(
            r#"
            INSERT INTO caremind.patients (id, full_name, email)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .execute(pool)
        .await?;
    }

    let caregivers = vec![
        (
            Uuid::parse_str("a2b4c6d8-1e3f-4a5b-9c8d-7e6f5a4b3c2d")?,
            "Priya Raman",
            "priya.raman@example.com",
        ),
        (
            Uuid::parse_str("b3c5d7e9-2f4a-4b6c-8d9e-0f1a2b3c4d5e")?,
            "Daniel Okafor",
            "daniel.okafor@example.com",
        ),
    ];

    for (id, name, email) in &caregivers {
        sqlx::query(
            r#"
            INSERT INTO caremind.caregivers (id, full_name, email)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .execute(pool)
        .await?;
    }

    for (patient_idx, caregiver_idx) in [(0usize, 0usize), (0, 1), (1, 1)] {
        sqlx::query(
            r#"
            INSERT INTO caremind.patient_caregivers (patient_id, caregiver_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(patients[patient_idx].0)
        .bind(caregivers[caregiver_idx].0)
        .execute(pool)
        .await?;
    }

    let tasks = vec![
        (
            "seed-001",
            patients[0].0,
            "medication",
            "Morning donepezil",
            Utc.with_ymd_and_hms(2026, 2, 2, 8, 0, 0)
                .single()
                .context("invalid timestamp")?,
            "completed",
        ),
        (
            "seed-002",
            patients[0].0,
            "appointment",
            "Memory clinic follow-up",
            Utc.with_ymd_and_hms(2026, 2, 3, 14, 0, 0)
                .single()
                .context("invalid timestamp")?,
            "missed",
        ),
        (
            "seed-003",
            patients[1].0,
            "meal",
            "Lunch",
            Utc.with_ymd_and_hms(2026, 2, 3, 12, 30, 0)
                .single()
                .context("invalid timestamp")?,
            "completed",
        ),
    ];

    for (source_key, patient_id, task_type, title, scheduled_for, status) in tasks {
        sqlx::query(
            r#"
            INSERT INTO caremind.task_events
            (id, patient_id, task_type, title, scheduled_for, status, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(patient_id)
        .bind(task_type)
        .bind(title)
        .bind(scheduled_for)
        .bind(status)
        .bind(source_key)
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn fetch_patient(pool: &PgPool, patient_id: Uuid) -> anyhow::Result<Option<Patient>> {
    let row = sqlx::query("SELECT id, full_name, email FROM caremind.patients WHERE id = $1")
        .bind(patient_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| Patient {
        id: row.get("id"),
        full_name: row.get("full_name"),
        email: row.get("email"),
    }))
}

pub async fn fetch_patient_by_email(
    pool: &PgPool,
    email: &str,
) -> anyhow::Result<Option<Patient>> {
    let row = sqlx::query("SELECT id, full_name, email FROM caremind.patients WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| Patient {
        id: row.get("id"),
        full_name: row.get("full_name"),
        email: row.get("email"),
    }))
}

pub async fn fetch_caregiver_ids(pool: &PgPool, patient_id: Uuid) -> anyhow::Result<Vec<Uuid>> {
    let rows = sqlx::query(
        "SELECT caregiver_id FROM caremind.patient_caregivers WHERE patient_id = $1",
    )
    .bind(patient_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(|row| row.get("caregiver_id")).collect())
}

pub async fn insert_journal_entry(pool: &PgPool, entry: &JournalEntry) -> anyhow::Result<Uuid> {
    sqlx::query(
        r#"
        INSERT INTO caremind.journal_entries
        (id, patient_id, journal_text, processed_text,
         primary_emotion, primary_intensity, primary_confidence,
         secondary_emotion, secondary_intensity, secondary_confidence,
         interpretation_tag, mood_risk, audio_url, recorded_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#,
    )
    .bind(entry.id)
    .bind(entry.patient_id)
    .bind(&entry.journal_text)
    .bind(&entry.processed_text)
    .bind(entry.primary_emotion.as_str())
    .bind(entry.primary_intensity)
    .bind(entry.primary_confidence)
    .bind(entry.secondary_emotion.map(|e| e.as_str()))
    .bind(entry.secondary_intensity)
    .bind(entry.secondary_confidence)
    .bind(&entry.interpretation_tag)
    .bind(entry.mood_risk)
    .bind(&entry.audio_url)
    .bind(entry.recorded_at)
    .execute(pool)
    .await?;

    Ok(entry.id)
}

fn journal_entry_from_row(row: &sqlx::postgres::PgRow) -> anyhow::Result<JournalEntry> {
    let primary: String = row.get("primary_emotion");
    let secondary: Option<String> = row.get("secondary_emotion");

    Ok(JournalEntry {
        id: row.get("id"),
        patient_id: row.get("patient_id"),
        journal_text: row.get("journal_text"),
        processed_text: row.get("processed_text"),
        primary_emotion: primary.parse().map_err(anyhow::Error::msg)?,
        primary_intensity: row.get("primary_intensity"),
        primary_confidence: row.get("primary_confidence"),
        secondary_emotion: secondary
            .map(|s| s.parse().map_err(anyhow::Error::msg))
            .transpose()?,
        secondary_intensity: row.get("secondary_intensity"),
        secondary_confidence: row.get("secondary_confidence"),
        interpretation_tag: row.get("interpretation_tag"),
        mood_risk: row.get("mood_risk"),
        audio_url: row.get("audio_url"),
        recorded_at: row.get("recorded_at"),
    })
}

pub async fn fetch_journal_entries(
    pool: &PgPool,
    patient_id: Uuid,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    limit: Option<i64>,
) -> anyhow::Result<Vec<JournalEntry>> {
    let mut query = String::from(
        "SELECT id, patient_id, journal_text, processed_text, \
         primary_emotion, primary_intensity, primary_confidence, \
         secondary_emotion, secondary_intensity, secondary_confidence, \
         interpretation_tag, mood_risk, audio_url, recorded_at \
         FROM caremind.journal_entries WHERE patient_id = $1",
    );

    let mut placeholder = 1;
    if start.is_some() {
        placeholder += 1;
        query.push_str(&format!(" AND recorded_at >= ${placeholder}"));
    }
    if end.is_some() {
        placeholder += 1;
        query.push_str(&format!(" AND recorded_at <= ${placeholder}"));
    }
    query.push_str(" ORDER BY recorded_at DESC");
    if limit.is_some() {
        placeholder += 1;
        query.push_str(&format!(" LIMIT ${placeholder}"));
    }

    let mut rows = sqlx::query(&query).bind(patient_id);
    if let Some(value) = start {
        rows = rows.bind(value);
    }
    if let Some(value) = end {
        rows = rows.bind(value);
    }
    if let Some(value) = limit {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    let mut entries = Vec::with_capacity(records.len());
    for row in &records {
        entries.push(journal_entry_from_row(row)?);
    }

    Ok(entries)
}

pub async fn insert_task_event(
    pool: &PgPool,
    event: &TaskEvent,
    source_key: Option<&str>,
) -> anyhow::Result<Uuid> {
    sqlx::query(
        r#"
        INSERT INTO caremind.task_events
        (id, patient_id, task_type, title, scheduled_for, status, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(event.id)
    .bind(event.patient_id)
    .bind(event.task_type.as_str())
    .bind(&event.title)
    .bind(event.scheduled_for)
    .bind(event.status.as_str())
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(event.id)
}

fn task_event_from_row(row: &sqlx::postgres::PgRow) -> anyhow::Result<TaskEvent> {
    let task_type: String = row.get("task_type");
    let status: String = row.get("status");

    Ok(TaskEvent {
        id: row.get("id"),
        patient_id: row.get("patient_id"),
        task_type: task_type.parse().map_err(anyhow::Error::msg)?,
        title: row.get("title"),
        scheduled_for: row.get("scheduled_for"),
        status: status.parse().map_err(anyhow::Error::msg)?,
    })
}

pub async fn update_task_status(
    pool: &PgPool,
    task_id: Uuid,
    status: TaskStatus,
) -> anyhow::Result<Option<TaskEvent>> {
    let row = sqlx::query(
        r#"
        UPDATE caremind.task_events SET status = $2
        WHERE id = $1
        RETURNING id, patient_id, task_type, title, scheduled_for, status
        "#,
    )
    .bind(task_id)
    .bind(status.as_str())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(task_event_from_row).transpose()
}

pub async fn fetch_task_events(
    pool: &PgPool,
    patient_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> anyhow::Result<Vec<TaskEvent>> {
    let rows = sqlx::query(
        "SELECT id, patient_id, task_type, title, scheduled_for, status \
         FROM caremind.task_events \
         WHERE patient_id = $1 AND scheduled_for >= $2 AND scheduled_for <= $3",
    )
    .bind(patient_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    let mut events = Vec::with_capacity(rows.len());
    for row in &rows {
        events.push(task_event_from_row(row)?);
    }

    Ok(events)
}

pub async fn insert_game_session(pool: &PgPool, session: &GameSession) -> anyhow::Result<Uuid> {
    sqlx::query(
        r#"
        INSERT INTO caremind.game_sessions (id, patient_id, game, score, played_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(session.id)
    .bind(session.patient_id)
    .bind(&session.game)
    .bind(session.score)
    .bind(session.played_at)
    .execute(pool)
    .await?;

    Ok(session.id)
}

pub async fn fetch_game_sessions(
    pool: &PgPool,
    patient_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> anyhow::Result<Vec<GameSession>> {
    let rows = sqlx::query(
        "SELECT id, patient_id, game, score, played_at \
         FROM caremind.game_sessions \
         WHERE patient_id = $1 AND played_at >= $2 AND played_at <= $3",
    )
    .bind(patient_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| GameSession {
            id: row.get("id"),
            patient_id: row.get("patient_id"),
            game: row.get("game"),
            score: row.get("score"),
            played_at: row.get("played_at"),
        })
        .collect())
}

pub async fn insert_weekly_score(pool: &PgPool, score: &WeeklyScore) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO caremind.weekly_scores
        (id, patient_id, week_start, week_end, score,
         earned_points, possible_points, patient_state, breakdown)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(id)
    .bind(score.patient_id)
    .bind(score.week_start)
    .bind(score.week_end)
    .bind(score.score)
    .bind(score.earned_points)
    .bind(score.possible_points)
    .bind(score.patient_state.as_str())
    .bind(serde_json::to_value(&score.breakdown)?)
    .execute(pool)
    .await?;

    Ok(id)
}

pub async fn fetch_first_weekly_scores(
    pool: &PgPool,
    patient_id: Uuid,
    limit: i64,
) -> anyhow::Result<Vec<f64>> {
    let rows = sqlx::query(
        "SELECT score FROM caremind.weekly_scores \
         WHERE patient_id = $1 ORDER BY week_start ASC LIMIT $2",
    )
    .bind(patient_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(|row| row.get("score")).collect())
}

pub async fn fetch_recent_weekly_scores(
    pool: &PgPool,
    patient_id: Uuid,
    limit: i64,
) -> anyhow::Result<Vec<f64>> {
    let rows = sqlx::query(
        "SELECT score FROM caremind.weekly_scores \
         WHERE patient_id = $1 ORDER BY week_start DESC LIMIT $2",
    )
    .bind(patient_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(|row| row.get("score")).collect())
}

pub async fn fetch_previous_week_score(
    pool: &PgPool,
    patient_id: Uuid,
    before: DateTime<Utc>,
) -> anyhow::Result<Option<f64>> {
    let row = sqlx::query(
        "SELECT score FROM caremind.weekly_scores \
         WHERE patient_id = $1 AND week_start < $2 \
         ORDER BY week_start DESC LIMIT 1",
    )
    .bind(patient_id)
    .bind(before)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| row.get("score")))
}

pub async fn get_baseline(pool: &PgPool, patient_id: Uuid) -> anyhow::Result<Option<Baseline>> {
    let row = sqlx::query(
        "SELECT patient_id, score, weeks_used FROM caremind.baselines WHERE patient_id = $1",
    )
    .bind(patient_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| Baseline {
        patient_id: row.get("patient_id"),
        score: row.get("score"),
        weeks_used: row.get("weeks_used"),
    }))
}

pub async fn upsert_baseline(pool: &PgPool, baseline: &Baseline) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO caremind.baselines (patient_id, score, weeks_used, computed_at)
        VALUES ($1, $2, $3, now())
        ON CONFLICT (patient_id) DO UPDATE
        SET score = EXCLUDED.score, weeks_used = EXCLUDED.weeks_used,
            computed_at = EXCLUDED.computed_at
        "#,
    )
    .bind(baseline.patient_id)
    .bind(baseline.score)
    .bind(baseline.weeks_used)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn insert_notification(
    pool: &PgPool,
    notification: &Notification,
) -> anyhow::Result<Uuid> {
    sqlx::query(
        r#"
        INSERT INTO caremind.notifications
        (id, recipient_id, patient_id, title, message, kind, priority, read, payload)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(notification.id)
    .bind(notification.recipient_id)
    .bind(notification.patient_id)
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(notification.kind.as_str())
    .bind(notification.priority.as_str())
    .bind(notification.read)
    .bind(&notification.payload)
    .execute(pool)
    .await?;

    Ok(notification.id)
}

pub async fn fetch_notifications(
    pool: &PgPool,
    recipient_id: Uuid,
    unread_only: bool,
) -> anyhow::Result<Vec<Notification>> {
    let mut query = String::from(
        "SELECT id, recipient_id, patient_id, title, message, kind, priority, \
         read, payload, created_at \
         FROM caremind.notifications WHERE recipient_id = $1",
    );
    if unread_only {
        query.push_str(" AND read = FALSE");
    }
    query.push_str(" ORDER BY created_at DESC");

    let rows = sqlx::query(&query)
        .bind(recipient_id)
        .fetch_all(pool)
        .await?;

    let mut notifications = Vec::with_capacity(rows.len());
    for row in &rows {
        let kind: String = row.get("kind");
        let priority: String = row.get("priority");
        notifications.push(Notification {
            id: row.get("id"),
            recipient_id: row.get("recipient_id"),
            patient_id: row.get("patient_id"),
            title: row.get("title"),
            message: row.get("message"),
            kind: kind.parse().map_err(anyhow::Error::msg)?,
            priority: priority.parse().map_err(anyhow::Error::msg)?,
            read: row.get("read"),
            payload: row.get("payload"),
            created_at: row.get("created_at"),
        });
    }

    Ok(notifications)
}

pub async fn mark_notification_read(pool: &PgPool, notification_id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("UPDATE caremind.notifications SET read = TRUE WHERE id = $1")
        .bind(notification_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        full_name: String,
        email: String,
        task_type: String,
        title: String,
        scheduled_for: DateTime<Utc>,
        status: String,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        row.task_type
            .parse::<crate::models::TaskKind>()
            .map_err(anyhow::Error::msg)?;
        row.status
            .parse::<TaskStatus>()
            .map_err(anyhow::Error::msg)?;

        let patient_id: Uuid = sqlx::query(
            r#"
            INSERT INTO caremind.patients (id, full_name, email)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.full_name)
        .bind(&row.email)
        .fetch_one(pool)
        .await?
        .get("id");

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO caremind.task_events
            (id, patient_id, task_type, title, scheduled_for, status, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(patient_id)
        .bind(&row.task_type)
        .bind(&row.title)
        .bind(row.scheduled_for)
        .bind(&row.status)
        .bind(source_key)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}
