use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use uuid::Uuid;

use crate::models::{Emotion, JournalEntry};

/// Intensity at or above which a negative emotion counts toward persistence.
pub const HIGH_INTENSITY_THRESHOLD: i32 = 70;
/// Coefficient-of-variation cutoff for flagging volatility.
pub const VOLATILITY_THRESHOLD: f64 = 0.4;
/// Default number of consecutive days for the persistence check.
pub const PERSISTENT_DAYS_DEFAULT: i64 = 3;
/// Default minimum intensity increase for shift detection.
pub const SHIFT_INCREASE_DEFAULT: f64 = 20.0;

#[derive(Debug, Clone, Serialize)]
pub struct EmotionTrendLine {
    pub emotion: Emotion,
    pub count: u32,
    pub percentage: f64,
    pub average_intensity: f64,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmotionTrends {
    pub patient_id: Uuid,
    pub period_days: i64,
    pub total_entries: usize,
    pub emotion_counts: BTreeMap<String, u32>,
    pub average_intensities: BTreeMap<String, f64>,
    pub mood_risk_count: u32,
    pub mood_risk_percentage: f64,
    pub trends: Vec<EmotionTrendLine>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// Aggregate counts and intensities across a window of entries. Primary and
/// secondary emotions both count.
pub fn emotion_trends(
    patient_id: Uuid,
    entries: &[JournalEntry],
    period_days: i64,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
) -> EmotionTrends {
    let mut counts: HashMap<Emotion, u32> = HashMap::new();
    let mut intensities: HashMap<Emotion, Vec<i32>> = HashMap::new();
    let mut mood_risk_count = 0u32;

    for entry in entries {
        *counts.entry(entry.primary_emotion).or_insert(0) += 1;
        intensities
            .entry(entry.primary_emotion)
            .or_default()
            .push(entry.primary_intensity);

        if let Some(secondary) = entry.secondary_emotion {
            *counts.entry(secondary).or_insert(0) += 1;
            intensities
                .entry(secondary)
                .or_default()
                .push(entry.secondary_intensity.unwrap_or(0));
        }

        if entry.mood_risk {
            mood_risk_count += 1;
        }
    }

    let total_entries = entries.len();
    let averages: HashMap<Emotion, f64> = intensities
        .iter()
        .map(|(emotion, values)| {
            let avg = values.iter().sum::<i32>() as f64 / values.len() as f64;
            (*emotion, avg)
        })
        .collect();

    let mut trends: Vec<EmotionTrendLine> = counts
        .iter()
        .map(|(emotion, count)| {
            let avg = averages.get(emotion).copied().unwrap_or(0.0);
            EmotionTrendLine {
                emotion: *emotion,
                count: *count,
                percentage: round1(*count as f64 / total_entries as f64 * 100.0),
                average_intensity: round1(avg),
                description: format!(
                    "{} appears {}/{} entries (avg intensity {:.1}/100)",
                    emotion.as_str(),
                    count,
                    total_entries,
                    avg
                ),
            }
        })
        .collect();
    trends.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then(a.emotion.as_str().cmp(b.emotion.as_str()))
    });

    EmotionTrends {
        patient_id,
        period_days,
        total_entries,
        emotion_counts: counts
            .iter()
            .map(|(e, c)| (e.as_str().to_string(), *c))
            .collect(),
        average_intensities: averages
            .iter()
            .map(|(e, a)| (e.as_str().to_string(), round1(*a)))
            .collect(),
        mood_risk_count,
        mood_risk_percentage: if total_entries == 0 {
            0.0
        } else {
            round1(mood_risk_count as f64 / total_entries as f64 * 100.0)
        },
        trends,
        start_date,
        end_date,
    }
}

/// Insight strings for the weekly summary endpoint.
pub fn weekly_insights(trends: &EmotionTrends) -> Vec<String> {
    let mut insights = Vec::new();

    if trends.total_entries == 0 {
        return insights;
    }

    let top: Vec<&str> = trends
        .trends
        .iter()
        .take(3)
        .map(|t| t.emotion.as_str())
        .collect();
    if !top.is_empty() {
        let joined = match top.len() {
            1 => top[0].to_string(),
            _ => format!(
                "{} and {}",
                top[..top.len() - 1].join(", "),
                top[top.len() - 1]
            ),
        };
        insights.push(format!("This week shows {joined}"));
    }

    let high: Vec<&str> = trends
        .trends
        .iter()
        .filter(|t| t.average_intensity >= 60.0)
        .map(|t| t.emotion.as_str())
        .collect();
    if !high.is_empty() {
        insights.push(format!(
            "High intensity emotions detected: {}",
            high.join(", ")
        ));
    }

    if trends.mood_risk_count > 0 {
        insights.push(format!(
            "Mood risk detected in {} entries ({}%)",
            trends.mood_risk_count, trends.mood_risk_percentage
        ));
    }

    insights
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyEmotion {
    pub emotion: Emotion,
    pub count: u32,
    pub max_intensity: i32,
    pub avg_intensity: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailySummary {
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub total_entries: usize,
    pub emotions: Vec<DailyEmotion>,
    pub mood_risk: bool,
}

/// Summarize one calendar day of entries by primary emotion.
pub fn daily_summary(patient_id: Uuid, date: NaiveDate, entries: &[JournalEntry]) -> DailySummary {
    let mut by_emotion: HashMap<Emotion, (u32, i32, i64)> = HashMap::new();
    let mut mood_risk = false;

    for entry in entries {
        let slot = by_emotion.entry(entry.primary_emotion).or_insert((0, 0, 0));
        slot.0 += 1;
        slot.1 = slot.1.max(entry.primary_intensity);
        slot.2 += entry.primary_intensity as i64;
        if entry.mood_risk {
            mood_risk = true;
        }
    }

    let mut emotions: Vec<DailyEmotion> = by_emotion
        .into_iter()
        .map(|(emotion, (count, max, sum))| DailyEmotion {
            emotion,
            count,
            max_intensity: max,
            avg_intensity: round1(sum as f64 / count as f64),
        })
        .collect();
    emotions.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then(a.emotion.as_str().cmp(b.emotion.as_str()))
    });

    DailySummary {
        patient_id,
        date,
        total_entries: entries.len(),
        emotions,
        mood_risk,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ShiftDetection {
    pub shift_detected: bool,
    pub emotion: Emotion,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub early_average: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub late_average: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub increase: Option<f64>,
    pub threshold: f64,
    pub period_days: i64,
}

fn intensity_of(entry: &JournalEntry, emotion: Emotion) -> Option<i32> {
    if entry.primary_emotion == emotion {
        Some(entry.primary_intensity)
    } else if entry.secondary_emotion == Some(emotion) {
        Some(entry.secondary_intensity.unwrap_or(0))
    } else {
        None
    }
}

/// Compare an emotion's average intensity between the older and newer half
/// of the window. Entries must be ordered newest first.
pub fn detect_shift(
    emotion: Emotion,
    entries_desc: &[JournalEntry],
    threshold: f64,
    period_days: i64,
) -> ShiftDetection {
    let no_shift = |reason: &str| ShiftDetection {
        shift_detected: false,
        emotion,
        reason: Some(reason.to_string()),
        early_average: None,
        late_average: None,
        increase: None,
        threshold,
        period_days,
    };

    if entries_desc.len() < 2 {
        return no_shift("insufficient data");
    }

    let mid = entries_desc.len() / 2;
    let late: Vec<i32> = entries_desc[..mid]
        .iter()
        .filter_map(|e| intensity_of(e, emotion))
        .collect();
    let early: Vec<i32> = entries_desc[mid..]
        .iter()
        .filter_map(|e| intensity_of(e, emotion))
        .collect();

    if early.is_empty() || late.is_empty() {
        return no_shift("emotion not present in both periods");
    }

    let early_avg = early.iter().sum::<i32>() as f64 / early.len() as f64;
    let late_avg = late.iter().sum::<i32>() as f64 / late.len() as f64;
    let increase = late_avg - early_avg;

    ShiftDetection {
        shift_detected: increase >= threshold,
        emotion,
        reason: None,
        early_average: Some(round2(early_avg)),
        late_average: Some(round2(late_avg)),
        increase: Some(round2(increase)),
        threshold,
        period_days,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PersistenceCheck {
    pub persistent_negative_detected: bool,
    pub days_with_high_negative: usize,
    pub required_days: i64,
    pub threshold: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub dates: Vec<NaiveDate>,
}

/// Count distinct days carrying any negative emotion at high intensity.
pub fn persistent_negative(entries: &[JournalEntry], required_days: i64) -> PersistenceCheck {
    if (entries.len() as i64) < required_days {
        return PersistenceCheck {
            persistent_negative_detected: false,
            days_with_high_negative: 0,
            required_days,
            threshold: HIGH_INTENSITY_THRESHOLD,
            reason: Some(format!(
                "insufficient entries: {} of {} required",
                entries.len(),
                required_days
            )),
            dates: Vec::new(),
        };
    }

    let mut days: BTreeSet<NaiveDate> = BTreeSet::new();
    for entry in entries {
        let day = entry.recorded_at.date_naive();
        if entry.primary_emotion.is_negative() && entry.primary_intensity >= HIGH_INTENSITY_THRESHOLD
        {
            days.insert(day);
        }
        if let Some(secondary) = entry.secondary_emotion {
            if secondary.is_negative()
                && entry.secondary_intensity.unwrap_or(0) >= HIGH_INTENSITY_THRESHOLD
            {
                days.insert(day);
            }
        }
    }

    PersistenceCheck {
        persistent_negative_detected: days.len() as i64 >= required_days,
        days_with_high_negative: days.len(),
        required_days,
        threshold: HIGH_INTENSITY_THRESHOLD,
        reason: None,
        dates: days.into_iter().collect(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VolatilityCheck {
    pub volatility_detected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coefficient_of_variation: Option<f64>,
    pub threshold: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std_deviation: Option<f64>,
    pub days_analyzed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Flag rapid day-to-day mood swings. Each entry contributes a signed
/// composite score (negative primary emotion counts against), daily means
/// are taken, and the coefficient of variation across days decides.
pub fn volatility(entries: &[JournalEntry]) -> VolatilityCheck {
    let not_volatile = |reason: &str, days: usize| VolatilityCheck {
        volatility_detected: false,
        coefficient_of_variation: None,
        threshold: VOLATILITY_THRESHOLD,
        mean_score: None,
        std_deviation: None,
        days_analyzed: days,
        reason: Some(reason.to_string()),
    };

    if entries.len() < 3 {
        return not_volatile("insufficient data", 0);
    }

    let mut daily: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for entry in entries {
        let score = if entry.primary_emotion.is_negative() {
            -(entry.primary_intensity as f64)
        } else {
            entry.primary_intensity as f64
        };
        daily.entry(entry.recorded_at.date_naive()).or_default().push(score);
    }

    if daily.len() < 3 {
        return not_volatile("insufficient daily data", daily.len());
    }

    let averages: Vec<f64> = daily
        .values()
        .map(|scores| scores.iter().sum::<f64>() / scores.len() as f64)
        .collect();
    let mean = averages.iter().sum::<f64>() / averages.len() as f64;

    if mean == 0.0 {
        return not_volatile("zero mean score", daily.len());
    }

    let variance =
        averages.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / averages.len() as f64;
    let std_dev = variance.sqrt();
    let cv = (std_dev / mean).abs();

    VolatilityCheck {
        volatility_detected: cv >= VOLATILITY_THRESHOLD,
        coefficient_of_variation: Some(round3(cv)),
        threshold: VOLATILITY_THRESHOLD,
        mean_score: Some(round2(mean)),
        std_deviation: Some(round2(std_dev)),
        days_analyzed: daily.len(),
        reason: None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Stable,
    Worsening,
    NoData,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendSummary {
    pub trend: TrendDirection,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_negative_intensity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub early_average: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub late_average: Option<f64>,
    pub total_entries: usize,
    pub mood_risk_count: u32,
}

/// Classify the direction of negative-emotion intensity over the window.
/// Entries must be ordered newest first.
pub fn trend_summary(entries_desc: &[JournalEntry]) -> TrendSummary {
    let mood_risk_count = entries_desc.iter().filter(|e| e.mood_risk).count() as u32;

    if entries_desc.is_empty() {
        return TrendSummary {
            trend: TrendDirection::NoData,
            description: "No emotion data available".to_string(),
            average_negative_intensity: None,
            early_average: None,
            late_average: None,
            total_entries: 0,
            mood_risk_count,
        };
    }

    if entries_desc.len() < 2 {
        return TrendSummary {
            trend: TrendDirection::Stable,
            description: "Insufficient data for trend analysis".to_string(),
            average_negative_intensity: None,
            early_average: None,
            late_average: None,
            total_entries: entries_desc.len(),
            mood_risk_count,
        };
    }

    let negative: Vec<f64> = entries_desc
        .iter()
        .filter(|e| e.primary_emotion.is_negative())
        .map(|e| e.primary_intensity as f64)
        .collect();

    if negative.is_empty() {
        return TrendSummary {
            trend: TrendDirection::Improving,
            description: "No negative emotions detected".to_string(),
            average_negative_intensity: Some(0.0),
            early_average: None,
            late_average: None,
            total_entries: entries_desc.len(),
            mood_risk_count,
        };
    }

    let mid = negative.len() / 2;
    let late_avg = if mid > 0 {
        negative[..mid].iter().sum::<f64>() / mid as f64
    } else {
        0.0
    };
    let early_slice = &negative[mid..];
    let early_avg = if early_slice.is_empty() {
        0.0
    } else {
        early_slice.iter().sum::<f64>() / early_slice.len() as f64
    };

    let (trend, description) = if early_avg == 0.0 {
        (
            TrendDirection::Improving,
            "Negative emotions decreasing".to_string(),
        )
    } else if late_avg > early_avg + 10.0 {
        (
            TrendDirection::Worsening,
            format!(
                "Negative emotions increasing (from {early_avg:.1} to {late_avg:.1})"
            ),
        )
    } else if late_avg < early_avg - 10.0 {
        (
            TrendDirection::Improving,
            format!(
                "Negative emotions decreasing (from {early_avg:.1} to {late_avg:.1})"
            ),
        )
    } else {
        (
            TrendDirection::Stable,
            "Emotional state remains relatively stable".to_string(),
        )
    };

    TrendSummary {
        trend,
        description,
        average_negative_intensity: Some(round2(
            negative.iter().sum::<f64>() / negative.len() as f64,
        )),
        early_average: Some(round2(early_avg)),
        late_average: Some(round2(late_avg)),
        total_entries: entries_desc.len(),
        mood_risk_count,
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(
        day: u32,
        hour: u32,
        primary: Emotion,
        intensity: i32,
        mood_risk: bool,
    ) -> JournalEntry {
        JournalEntry {
            id: Uuid::new_v4(),
            patient_id: Uuid::nil(),
            journal_text: "entry".to_string(),
            processed_text: None,
            primary_emotion: primary,
            primary_intensity: intensity,
            primary_confidence: 0.8,
            secondary_emotion: None,
            secondary_intensity: None,
            secondary_confidence: None,
            interpretation_tag: String::new(),
            mood_risk,
            audio_url: None,
            recorded_at: Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap(),
        }
    }

    #[test]
    fn trends_count_primary_and_secondary() {
        let mut first = entry(1, 9, Emotion::Sad, 60, false);
        first.secondary_emotion = Some(Emotion::Lonely);
        first.secondary_intensity = Some(40);
        let second = entry(2, 9, Emotion::Sad, 80, true);

        let start = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 3, 8, 0, 0, 0).unwrap();
        let trends = emotion_trends(Uuid::nil(), &[first, second], 7, start, end);

        assert_eq!(trends.total_entries, 2);
        assert_eq!(trends.emotion_counts.get("sad"), Some(&2));
        assert_eq!(trends.emotion_counts.get("lonely"), Some(&1));
        assert_eq!(trends.mood_risk_count, 1);
        assert_eq!(trends.mood_risk_percentage, 50.0);
        assert_eq!(trends.trends[0].emotion, Emotion::Sad);
        assert_eq!(trends.trends[0].average_intensity, 70.0);
    }

    #[test]
    fn daily_summary_tracks_max_and_average() {
        let entries = vec![
            entry(5, 8, Emotion::Anxious, 40, false),
            entry(5, 12, Emotion::Anxious, 80, true),
            entry(5, 18, Emotion::Calm, 50, false),
        ];
        let summary = daily_summary(
            Uuid::nil(),
            NaiveDate::from_ymd_opt(2026, 3, 5).unwrap(),
            &entries,
        );

        assert_eq!(summary.total_entries, 3);
        assert!(summary.mood_risk);
        let anxious = &summary.emotions[0];
        assert_eq!(anxious.emotion, Emotion::Anxious);
        assert_eq!(anxious.max_intensity, 80);
        assert_eq!(anxious.avg_intensity, 60.0);
    }

    #[test]
    fn shift_detected_when_late_half_rises() {
        // Newest first: two recent high-intensity entries, two older mild ones.
        let entries = vec![
            entry(7, 9, Emotion::Anxious, 80, true),
            entry(6, 9, Emotion::Anxious, 70, true),
            entry(2, 9, Emotion::Anxious, 40, false),
            entry(1, 9, Emotion::Anxious, 30, false),
        ];
        let shift = detect_shift(Emotion::Anxious, &entries, SHIFT_INCREASE_DEFAULT, 7);
        assert!(shift.shift_detected);
        assert_eq!(shift.early_average, Some(35.0));
        assert_eq!(shift.late_average, Some(75.0));
        assert_eq!(shift.increase, Some(40.0));
    }

    #[test]
    fn shift_needs_emotion_in_both_halves() {
        let entries = vec![
            entry(7, 9, Emotion::Anxious, 80, true),
            entry(1, 9, Emotion::Calm, 40, false),
        ];
        let shift = detect_shift(Emotion::Anxious, &entries, SHIFT_INCREASE_DEFAULT, 7);
        assert!(!shift.shift_detected);
        assert!(shift.reason.is_some());
    }

    #[test]
    fn persistence_requires_distinct_days() {
        // Three high-intensity entries but only two distinct days.
        let entries = vec![
            entry(1, 9, Emotion::Sad, 85, true),
            entry(1, 20, Emotion::Sad, 90, true),
            entry(2, 9, Emotion::LowMood, 75, true),
        ];
        let check = persistent_negative(&entries, 3);
        assert!(!check.persistent_negative_detected);
        assert_eq!(check.days_with_high_negative, 2);

        let entries = vec![
            entry(1, 9, Emotion::Sad, 85, true),
            entry(2, 9, Emotion::Sad, 75, true),
            entry(3, 9, Emotion::LowMood, 70, true),
        ];
        let check = persistent_negative(&entries, 3);
        assert!(check.persistent_negative_detected);
    }

    #[test]
    fn persistence_ignores_mild_negatives() {
        let entries = vec![
            entry(1, 9, Emotion::Sad, 50, false),
            entry(2, 9, Emotion::Sad, 60, false),
            entry(3, 9, Emotion::Sad, 69, false),
        ];
        let check = persistent_negative(&entries, 3);
        assert!(!check.persistent_negative_detected);
        assert_eq!(check.days_with_high_negative, 0);
    }

    #[test]
    fn volatility_flags_large_swings() {
        let entries = vec![
            entry(1, 9, Emotion::Happy, 80, false),
            entry(2, 9, Emotion::Sad, 70, true),
            entry(3, 9, Emotion::Happy, 90, false),
            entry(4, 9, Emotion::LowMood, 85, true),
        ];
        let check = volatility(&entries);
        assert!(check.volatility_detected);
    }

    #[test]
    fn volatility_quiet_when_steady() {
        let entries = vec![
            entry(1, 9, Emotion::Calm, 50, false),
            entry(2, 9, Emotion::Calm, 55, false),
            entry(3, 9, Emotion::Calm, 52, false),
        ];
        let check = volatility(&entries);
        assert!(!check.volatility_detected);
    }

    #[test]
    fn volatility_needs_three_days() {
        let entries = vec![
            entry(1, 9, Emotion::Happy, 80, false),
            entry(1, 12, Emotion::Sad, 70, true),
            entry(2, 9, Emotion::Happy, 90, false),
        ];
        let check = volatility(&entries);
        assert!(!check.volatility_detected);
        assert_eq!(check.reason.as_deref(), Some("insufficient daily data"));
    }

    #[test]
    fn trend_summary_worsening_when_recent_negatives_rise() {
        let entries = vec![
            entry(7, 9, Emotion::Sad, 80, true),
            entry(6, 9, Emotion::Sad, 75, true),
            entry(2, 9, Emotion::Sad, 40, false),
            entry(1, 9, Emotion::Sad, 35, false),
        ];
        let summary = trend_summary(&entries);
        assert_eq!(summary.trend, TrendDirection::Worsening);
    }

    #[test]
    fn trend_summary_improving_without_negatives() {
        let entries = vec![
            entry(2, 9, Emotion::Happy, 70, false),
            entry(1, 9, Emotion::Calm, 60, false),
        ];
        let summary = trend_summary(&entries);
        assert_eq!(summary.trend, TrendDirection::Improving);
        assert_eq!(summary.average_negative_intensity, Some(0.0));
    }

    #[test]
    fn trend_summary_no_data() {
        let summary = trend_summary(&[]);
        assert_eq!(summary.trend, TrendDirection::NoData);
    }
}
