use std::collections::HashMap;

use crate::models::{Classification, Emotion, EmotionScore};
use crate::preprocess::preprocess_text;

/// Primary negative emotion at or above this intensity flags mood risk.
pub const MOOD_RISK_PRIMARY_INTENSITY: i32 = 70;
/// Secondary negative emotion at or above this intensity flags mood risk.
pub const MOOD_RISK_SECONDARY_INTENSITY: i32 = 60;

/// Single-token cues. Weights 1..=3 by how strongly the word signals the
/// emotion on its own.
const KEYWORDS: &[(&str, Emotion, u32)] = &[
    ("happy", Emotion::Happy, 2),
    ("glad", Emotion::Happy, 2),
    ("joy", Emotion::Happy, 2),
    ("joyful", Emotion::Happy, 2),
    ("wonderful", Emotion::Happy, 2),
    ("great", Emotion::Happy, 1),
    ("good", Emotion::Happy, 1),
    ("smiled", Emotion::Happy, 1),
    ("laughed", Emotion::Happy, 2),
    ("laughing", Emotion::Happy, 2),
    ("cheerful", Emotion::Happy, 2),
    ("delighted", Emotion::Happy, 3),
    ("enjoyed", Emotion::Happy, 2),
    ("grateful", Emotion::Happy, 2),
    ("proud", Emotion::Happy, 2),
    ("sad", Emotion::Sad, 2),
    ("unhappy", Emotion::Sad, 2),
    ("cry", Emotion::Sad, 2),
    ("cried", Emotion::Sad, 2),
    ("crying", Emotion::Sad, 2),
    ("tears", Emotion::Sad, 2),
    ("down", Emotion::Sad, 1),
    ("upset", Emotion::Sad, 1),
    ("heartbroken", Emotion::Sad, 3),
    ("miserable", Emotion::Sad, 3),
    ("grief", Emotion::Sad, 3),
    ("sorrow", Emotion::Sad, 3),
    ("angry", Emotion::Angry, 2),
    ("mad", Emotion::Angry, 2),
    ("furious", Emotion::Angry, 3),
    ("rage", Emotion::Angry, 3),
    ("annoyed", Emotion::Angry, 1),
    ("irritated", Emotion::Angry, 2),
    ("yelled", Emotion::Angry, 2),
    ("shouting", Emotion::Angry, 2),
    ("hate", Emotion::Angry, 2),
    ("hated", Emotion::Angry, 2),
    ("anxious", Emotion::Anxious, 2),
    ("worried", Emotion::Anxious, 2),
    ("worry", Emotion::Anxious, 2),
    ("nervous", Emotion::Anxious, 2),
    ("uneasy", Emotion::Anxious, 2),
    ("panic", Emotion::Anxious, 3),
    ("panicking", Emotion::Anxious, 3),
    ("restless", Emotion::Anxious, 2),
    ("tense", Emotion::Anxious, 2),
    ("dread", Emotion::Anxious, 3),
    ("afraid", Emotion::Fearful, 2),
    ("scared", Emotion::Fearful, 2),
    ("fear", Emotion::Fearful, 2),
    ("fearful", Emotion::Fearful, 2),
    ("terrified", Emotion::Fearful, 3),
    ("frightened", Emotion::Fearful, 2),
    ("confused", Emotion::Confused, 2),
    ("confusing", Emotion::Confused, 2),
    ("forgot", Emotion::Confused, 2),
    ("forgetting", Emotion::Confused, 2),
    ("disoriented", Emotion::Confused, 3),
    ("muddled", Emotion::Confused, 2),
    ("frustrated", Emotion::Frustrated, 2),
    ("frustrating", Emotion::Frustrated, 2),
    ("stuck", Emotion::Frustrated, 1),
    ("useless", Emotion::Frustrated, 2),
    ("struggle", Emotion::Frustrated, 2),
    ("struggled", Emotion::Frustrated, 2),
    ("struggling", Emotion::Frustrated, 2),
    ("calm", Emotion::Calm, 2),
    ("peaceful", Emotion::Calm, 2),
    ("relaxed", Emotion::Calm, 2),
    ("rested", Emotion::Calm, 1),
    ("quiet", Emotion::Calm, 1),
    ("serene", Emotion::Calm, 3),
    ("comfortable", Emotion::Calm, 1),
    ("lonely", Emotion::Lonely, 3),
    ("alone", Emotion::Lonely, 2),
    ("isolated", Emotion::Lonely, 3),
    ("abandoned", Emotion::Lonely, 3),
    ("depressed", Emotion::LowMood, 3),
    ("hopeless", Emotion::LowMood, 3),
    ("empty", Emotion::LowMood, 2),
    ("worthless", Emotion::LowMood, 3),
    ("numb", Emotion::LowMood, 2),
    ("exhausted", Emotion::LowMood, 1),
    ("gloomy", Emotion::LowMood, 2),
    ("pointless", Emotion::LowMood, 2),
];

/// Multi-token cues, matched before single tokens so their words are not
/// double counted.
const PHRASES: &[(&[&str], Emotion, u32)] = &[
    (&["on", "edge"], Emotion::Anxious, 2),
    (&["cant", "remember"], Emotion::Confused, 3),
    (&["mixed", "up"], Emotion::Confused, 2),
    (&["fed", "up"], Emotion::Frustrated, 2),
    (&["no", "one"], Emotion::Lonely, 2),
    (&["by", "myself"], Emotion::Lonely, 1),
    (&["low", "mood"], Emotion::LowMood, 2),
    (&["no", "energy"], Emotion::LowMood, 2),
    (&["given", "up"], Emotion::LowMood, 3),
];

const INTENSIFIERS: &[&str] = &[
    "very",
    "so",
    "really",
    "extremely",
    "too",
    "incredibly",
    "deeply",
    "totally",
];

const NEGATORS: &[&str] = &["not", "never", "no", "dont", "didnt", "wasnt", "isnt"];

/// Interpretation tag for an emotion at a given intensity.
pub fn interpretation_tag(emotion: Emotion, intensity: i32) -> String {
    let level = if intensity >= 70 {
        "high"
    } else if intensity >= 50 {
        "moderate"
    } else {
        "mild"
    };
    format!("{} {}", level, emotion.descriptor())
}

fn intensity_for(raw: u32) -> i32 {
    (20 + 12 * raw as i32).min(100)
}

fn bare_tokens(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric() || *c == '_')
                .collect()
        })
        .filter(|w: &String| !w.is_empty())
        .collect()
}

fn is_intensified(tokens: &[String], idx: usize) -> bool {
    idx > 0 && INTENSIFIERS.contains(&tokens[idx - 1].as_str())
}

fn is_negated(tokens: &[String], idx: usize) -> bool {
    let from = idx.saturating_sub(2);
    tokens[from..idx]
        .iter()
        .any(|t| NEGATORS.contains(&t.as_str()))
}

/// Classify preprocessed-or-raw journal text into emotion scores.
///
/// Matches the weighted lexicon against the text, doubling a cue's weight
/// when an intensifier immediately precedes it and dropping the cue when a
/// negator appears within the two preceding tokens. Intensity and
/// confidence both derive from the accumulated raw weights, so the output
/// is fully determined by the input text.
pub fn analyze_emotion(text: &str) -> Classification {
    let processed = preprocess_text(text);

    if processed.is_empty() {
        return Classification {
            primary: EmotionScore {
                emotion: Emotion::Neutral,
                confidence: 0.0,
                intensity: 0,
                interpretation_tag: "no emotion detected".to_string(),
            },
            secondary: None,
            mood_risk: false,
            processed_text: processed,
        };
    }

    let tokens = bare_tokens(&processed);
    let mut raw: HashMap<Emotion, u32> = HashMap::new();
    let mut consumed = vec![false; tokens.len()];

    for (phrase, emotion, weight) in PHRASES {
        let len = phrase.len();
        if tokens.len() < len {
            continue;
        }
        for start in 0..=tokens.len() - len {
            if consumed[start..start + len].iter().any(|c| *c) {
                continue;
            }
            if tokens[start..start + len]
                .iter()
                .zip(phrase.iter())
                .all(|(t, p)| t == p)
            {
                let mut w = *weight;
                if is_intensified(&tokens, start) {
                    w *= 2;
                }
                *raw.entry(*emotion).or_insert(0) += w;
                for c in consumed.iter_mut().skip(start).take(len) {
                    *c = true;
                }
            }
        }
    }

    for (idx, token) in tokens.iter().enumerate() {
        if consumed[idx] {
            continue;
        }
        for (keyword, emotion, weight) in KEYWORDS {
            if token == keyword {
                if is_negated(&tokens, idx) {
                    break;
                }
                let mut w = *weight;
                if is_intensified(&tokens, idx) {
                    w *= 2;
                }
                *raw.entry(*emotion).or_insert(0) += w;
                break;
            }
        }
    }

    let total: u32 = raw.values().sum();
    if total == 0 {
        return Classification {
            primary: EmotionScore {
                emotion: Emotion::Neutral,
                confidence: 0.0,
                intensity: 0,
                interpretation_tag: "no emotion detected".to_string(),
            },
            secondary: None,
            mood_risk: false,
            processed_text: processed,
        };
    }

    let mut ranked: Vec<(Emotion, u32)> = raw.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.as_str().cmp(b.0.as_str())));

    let score_for = |(emotion, raw): (Emotion, u32)| {
        let intensity = intensity_for(raw);
        EmotionScore {
            emotion,
            confidence: raw as f64 / total as f64,
            intensity,
            interpretation_tag: interpretation_tag(emotion, intensity),
        }
    };

    let primary = score_for(ranked[0]);
    let secondary = ranked
        .get(1)
        .copied()
        .map(score_for)
        .filter(|s| s.confidence >= 0.1 || s.intensity >= 30);

    let mood_risk = (primary.emotion.is_negative()
        && primary.intensity >= MOOD_RISK_PRIMARY_INTENSITY)
        || secondary.as_ref().is_some_and(|s| {
            s.emotion.is_negative() && s.intensity >= MOOD_RISK_SECONDARY_INTENSITY
        });

    Classification {
        primary,
        secondary,
        mood_risk,
        processed_text: processed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_neutral() {
        let result = analyze_emotion("   ");
        assert_eq!(result.primary.emotion, Emotion::Neutral);
        assert_eq!(result.primary.intensity, 0);
        assert!(!result.mood_risk);
        assert!(result.secondary.is_none());
    }

    #[test]
    fn text_without_cues_is_neutral() {
        let result = analyze_emotion("we went to the market on tuesday");
        assert_eq!(result.primary.emotion, Emotion::Neutral);
        assert_eq!(result.primary.confidence, 0.0);
    }

    #[test]
    fn detects_primary_and_secondary() {
        let result = analyze_emotion("I felt sad and cried, and a bit lonely too");
        assert_eq!(result.primary.emotion, Emotion::Sad);
        let secondary = result.secondary.expect("secondary present");
        assert_eq!(secondary.emotion, Emotion::Lonely);
    }

    #[test]
    fn intensity_stays_within_range() {
        let result = analyze_emotion(
            "hopeless hopeless worthless depressed empty numb gloomy pointless",
        );
        assert!(result.primary.intensity <= 100);
        assert!(result.primary.intensity >= 0);
        assert!(result.primary.confidence <= 1.0);
    }

    #[test]
    fn intensifier_doubles_the_cue() {
        let plain = analyze_emotion("I am worried");
        let boosted = analyze_emotion("I am so worried");
        assert!(boosted.primary.intensity > plain.primary.intensity);
    }

    #[test]
    fn negated_cue_is_dropped() {
        let result = analyze_emotion("I am not sad today");
        assert_ne!(result.primary.emotion, Emotion::Sad);
    }

    #[test]
    fn mood_risk_requires_high_negative_intensity() {
        // Weight 3 cue doubled by intensifier: raw 6 -> intensity 92.
        let risky = analyze_emotion("I feel so hopeless");
        assert!(risky.mood_risk);
        assert!(risky.primary.intensity >= MOOD_RISK_PRIMARY_INTENSITY);

        // Single weight-1 cue: raw 1 -> intensity 32, no risk.
        let mild = analyze_emotion("a bit down today");
        assert!(!mild.mood_risk);
    }

    #[test]
    fn positive_emotions_never_flag_mood_risk() {
        let result = analyze_emotion("so so happy, really delighted and very joyful");
        assert_eq!(result.primary.emotion, Emotion::Happy);
        assert!(!result.mood_risk);
    }

    #[test]
    fn phrase_tokens_are_not_double_counted() {
        let result = analyze_emotion("there is no one around");
        assert_eq!(result.primary.emotion, Emotion::Lonely);
        // "no" is consumed by the phrase, so it cannot negate "one".
        assert_eq!(result.primary.confidence, 1.0);
    }

    #[test]
    fn interpretation_tag_levels() {
        assert_eq!(interpretation_tag(Emotion::Anxious, 75), "high anxiety");
        assert_eq!(interpretation_tag(Emotion::Anxious, 55), "moderate anxiety");
        assert_eq!(interpretation_tag(Emotion::Anxious, 30), "mild anxiety");
    }
}
