use serde::Serialize;

use crate::models::PatientState;
use crate::trends::TrendDirection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }

    fn bump(self) -> RiskLevel {
        match self {
            RiskLevel::Low => RiskLevel::Medium,
            RiskLevel::Medium => RiskLevel::High,
            RiskLevel::High | RiskLevel::Critical => RiskLevel::Critical,
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Continue monitoring. Patient is functioning well.",
            RiskLevel::Medium => {
                "Increased monitoring recommended. Schedule check-in with caregiver."
            }
            RiskLevel::High => "Immediate attention required. Consider medical consultation.",
            RiskLevel::Critical => {
                "Urgent intervention needed. Contact healthcare provider immediately."
            }
        }
    }
}

fn base_risk(state: PatientState) -> RiskLevel {
    match state {
        PatientState::Stable => RiskLevel::Low,
        PatientState::MildDecline => RiskLevel::Medium,
        PatientState::ModerateDecline => RiskLevel::High,
        PatientState::HighRisk => RiskLevel::Critical,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskAssessment {
    pub combined_risk_level: RiskLevel,
    pub base_risk_level: RiskLevel,
    pub risk_raised: bool,
    pub reason: String,
    pub decline_detected: bool,
    pub persistent_negative_detected: bool,
    pub emotion_trend: TrendDirection,
    pub recommendation: &'static str,
}

/// Combine functional state with emotional signals. Decline plus persistent
/// negative emotions raises the level one step; a worsening emotion trend
/// lifts low and medium one step further.
pub fn assess_combined_risk(
    state: PatientState,
    decline_detected: bool,
    persistent_negative_detected: bool,
    emotion_trend: TrendDirection,
) -> RiskAssessment {
    let base = base_risk(state);

    let (mut combined, risk_raised, mut reason) =
        match (decline_detected, persistent_negative_detected) {
            (true, true) => (
                base.bump(),
                true,
                "Both functional decline and persistent negative emotions detected".to_string(),
            ),
            (true, false) => (
                base,
                false,
                "Functional decline detected, but emotional state is stable".to_string(),
            ),
            (false, true) => {
                let raised = base == RiskLevel::Low;
                (
                    if raised { RiskLevel::Medium } else { base },
                    raised,
                    "Persistent negative emotions detected, but functional performance is stable"
                        .to_string(),
                )
            }
            (false, false) => (base, false, "No significant issues detected".to_string()),
        };

    if emotion_trend == TrendDirection::Worsening
        && matches!(combined, RiskLevel::Low | RiskLevel::Medium)
    {
        combined = combined.bump();
        reason.push_str("; Emotion trend is worsening");
    }

    RiskAssessment {
        combined_risk_level: combined,
        base_risk_level: base,
        risk_raised,
        reason,
        decline_detected,
        persistent_negative_detected,
        emotion_trend,
        recommendation: combined.recommendation(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_levels_follow_patient_state() {
        let a = assess_combined_risk(PatientState::Stable, false, false, TrendDirection::Stable);
        assert_eq!(a.combined_risk_level, RiskLevel::Low);
        let a = assess_combined_risk(PatientState::HighRisk, false, false, TrendDirection::Stable);
        assert_eq!(a.combined_risk_level, RiskLevel::Critical);
    }

    #[test]
    fn decline_plus_persistence_bumps_one_level() {
        let a =
            assess_combined_risk(PatientState::MildDecline, true, true, TrendDirection::Stable);
        assert_eq!(a.base_risk_level, RiskLevel::Medium);
        assert_eq!(a.combined_risk_level, RiskLevel::High);
        assert!(a.risk_raised);

        let a = assess_combined_risk(PatientState::HighRisk, true, true, TrendDirection::Stable);
        assert_eq!(a.combined_risk_level, RiskLevel::Critical);
    }

    #[test]
    fn decline_alone_keeps_base_level() {
        let a = assess_combined_risk(
            PatientState::ModerateDecline,
            true,
            false,
            TrendDirection::Stable,
        );
        assert_eq!(a.combined_risk_level, RiskLevel::High);
        assert!(!a.risk_raised);
    }

    #[test]
    fn persistence_alone_raises_only_low() {
        let a = assess_combined_risk(PatientState::Stable, false, true, TrendDirection::Stable);
        assert_eq!(a.combined_risk_level, RiskLevel::Medium);
        assert!(a.risk_raised);

        let a =
            assess_combined_risk(PatientState::MildDecline, false, true, TrendDirection::Stable);
        assert_eq!(a.combined_risk_level, RiskLevel::Medium);
        assert!(!a.risk_raised);
    }

    #[test]
    fn worsening_trend_lifts_low_and_medium() {
        let a = assess_combined_risk(PatientState::Stable, false, false, TrendDirection::Worsening);
        assert_eq!(a.combined_risk_level, RiskLevel::Medium);
        assert!(a.reason.contains("worsening"));

        let a = assess_combined_risk(
            PatientState::MildDecline,
            false,
            false,
            TrendDirection::Worsening,
        );
        assert_eq!(a.combined_risk_level, RiskLevel::High);

        // High and critical are not touched by the trend modifier.
        let a = assess_combined_risk(
            PatientState::ModerateDecline,
            false,
            false,
            TrendDirection::Worsening,
        );
        assert_eq!(a.combined_risk_level, RiskLevel::High);
    }
}
