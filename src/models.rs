use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Happy,
    Sad,
    Angry,
    Anxious,
    Fearful,
    Confused,
    Frustrated,
    Calm,
    Lonely,
    LowMood,
    Neutral,
}

impl Emotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Anxious => "anxious",
            Emotion::Fearful => "fearful",
            Emotion::Confused => "confused",
            Emotion::Frustrated => "frustrated",
            Emotion::Calm => "calm",
            Emotion::Lonely => "lonely",
            Emotion::LowMood => "low_mood",
            Emotion::Neutral => "neutral",
        }
    }

    pub fn is_negative(&self) -> bool {
        matches!(
            self,
            Emotion::Sad
                | Emotion::Angry
                | Emotion::Anxious
                | Emotion::Fearful
                | Emotion::Confused
                | Emotion::Frustrated
                | Emotion::Lonely
                | Emotion::LowMood
        )
    }

    /// Short descriptor used in interpretation tags, e.g. "high anxiety".
    pub fn descriptor(&self) -> &'static str {
        match self {
            Emotion::Happy => "positive mood",
            Emotion::Sad => "sadness",
            Emotion::Angry => "distress",
            Emotion::Anxious => "anxiety",
            Emotion::Fearful => "fear",
            Emotion::Confused => "confusion",
            Emotion::Frustrated => "frustration",
            Emotion::Calm => "calmness",
            Emotion::Lonely => "loneliness",
            Emotion::LowMood => "low mood",
            Emotion::Neutral => "neutral mood",
        }
    }
}

impl std::str::FromStr for Emotion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "happy" => Ok(Emotion::Happy),
            "sad" => Ok(Emotion::Sad),
            "angry" => Ok(Emotion::Angry),
            "anxious" => Ok(Emotion::Anxious),
            "fearful" => Ok(Emotion::Fearful),
            "confused" => Ok(Emotion::Confused),
            "frustrated" => Ok(Emotion::Frustrated),
            "calm" => Ok(Emotion::Calm),
            "lonely" => Ok(Emotion::Lonely),
            "low_mood" => Ok(Emotion::LowMood),
            "neutral" => Ok(Emotion::Neutral),
            other => Err(format!("unknown emotion label: {other}")),
        }
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scored emotion as produced by the classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionScore {
    pub emotion: Emotion,
    pub confidence: f64,
    pub intensity: i32,
    pub interpretation_tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub primary: EmotionScore,
    pub secondary: Option<EmotionScore>,
    pub mood_risk: bool,
    pub processed_text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct JournalEntry {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub journal_text: String,
    pub processed_text: Option<String>,
    pub primary_emotion: Emotion,
    pub primary_intensity: i32,
    pub primary_confidence: f64,
    pub secondary_emotion: Option<Emotion>,
    pub secondary_intensity: Option<i32>,
    pub secondary_confidence: Option<f64>,
    pub interpretation_tag: String,
    pub mood_risk: bool,
    pub audio_url: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Medication,
    Appointment,
    Meal,
    BrainTraining,
    Journal,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Medication => "medication",
            TaskKind::Appointment => "appointment",
            TaskKind::Meal => "meal",
            TaskKind::BrainTraining => "brain_training",
            TaskKind::Journal => "journal",
        }
    }

    /// Weight of this task type in the weekly score.
    pub fn weight(&self) -> f64 {
        match self {
            TaskKind::Medication | TaskKind::Appointment => 3.0,
            TaskKind::Meal | TaskKind::BrainTraining => 2.0,
            TaskKind::Journal => 1.0,
        }
    }

    /// Task types earned through scheduled reminders rather than sessions.
    pub fn is_scheduled(&self) -> bool {
        matches!(
            self,
            TaskKind::Medication | TaskKind::Appointment | TaskKind::Meal
        )
    }
}

impl std::str::FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "medication" => Ok(TaskKind::Medication),
            "appointment" => Ok(TaskKind::Appointment),
            "meal" => Ok(TaskKind::Meal),
            "brain_training" => Ok(TaskKind::BrainTraining),
            "journal" => Ok(TaskKind::Journal),
            other => Err(format!("unknown task type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Completed,
    Missed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
            TaskStatus::Missed => "missed",
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "completed" => Ok(TaskStatus::Completed),
            "missed" => Ok(TaskStatus::Missed),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskEvent {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub task_type: TaskKind,
    pub title: String,
    pub scheduled_for: DateTime<Utc>,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameSession {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub game: String,
    pub score: i32,
    pub played_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatientState {
    Stable,
    MildDecline,
    ModerateDecline,
    HighRisk,
}

impl PatientState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatientState::Stable => "stable",
            PatientState::MildDecline => "mild_decline",
            PatientState::ModerateDecline => "moderate_decline",
            PatientState::HighRisk => "high_risk",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PatientState::Stable => "Routine intact - patient is functioning well",
            PatientState::MildDecline => "Mild decline risk - needs attention",
            PatientState::ModerateDecline => "Moderate decline risk - frequent misses",
            PatientState::HighRisk => "High risk - requires high supervision",
        }
    }
}

impl std::str::FromStr for PatientState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stable" => Ok(PatientState::Stable),
            "mild_decline" => Ok(PatientState::MildDecline),
            "moderate_decline" => Ok(PatientState::ModerateDecline),
            "high_risk" => Ok(PatientState::HighRisk),
            other => Err(format!("unknown patient state: {other}")),
        }
    }
}

/// Per-task-type tally inside a weekly score.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskTally {
    pub completed: u32,
    pub missed: u32,
    pub total: u32,
    pub points_earned: f64,
    pub points_possible: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyScore {
    pub patient_id: Uuid,
    pub week_start: DateTime<Utc>,
    pub week_end: DateTime<Utc>,
    pub score: f64,
    pub earned_points: f64,
    pub possible_points: f64,
    pub patient_state: PatientState,
    pub breakdown: BTreeMap<String, TaskTally>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Baseline {
    pub patient_id: Uuid,
    pub score: f64,
    pub weeks_used: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    EmotionAlert,
    DeclineAlert,
    AppointmentMissed,
    CombinedRiskAlert,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::EmotionAlert => "emotion_alert",
            NotificationKind::DeclineAlert => "decline_alert",
            NotificationKind::AppointmentMissed => "appointment_missed",
            NotificationKind::CombinedRiskAlert => "combined_risk_alert",
        }
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "emotion_alert" => Ok(NotificationKind::EmotionAlert),
            "decline_alert" => Ok(NotificationKind::DeclineAlert),
            "appointment_missed" => Ok(NotificationKind::AppointmentMissed),
            "combined_risk_alert" => Ok(NotificationKind::CombinedRiskAlert),
            other => Err(format!("unknown notification kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub patient_id: Uuid,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub priority: Priority,
    pub read: bool,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Patient {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
}
