use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    NeedsImprovement,
}

// ---------------------------------------------------------------------------
// EvaluationResult
// ---------------------------------------------------------------------------

/// The evaluator's judgement of one generated document.
///
/// Decoding enforces that a `needs_improvement` verdict carries at least one
/// improvement area, so a value of this type always satisfies that rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawEvaluation")]
pub struct EvaluationResult {
    pub verdict: Verdict,
    pub feedback: String,
    pub improvement_areas: Vec<String>,
}

/// Wire shape accepted from the evaluator. The verdict may arrive as
/// `verdict` or `score`.
#[derive(Deserialize)]
struct RawEvaluation {
    #[serde(alias = "score")]
    verdict: Verdict,
    #[serde(default)]
    feedback: String,
    #[serde(default)]
    improvement_areas: Vec<String>,
}

impl TryFrom<RawEvaluation> for EvaluationResult {
    type Error = String;

    fn try_from(raw: RawEvaluation) -> Result<Self, Self::Error> {
        let improvement_areas: Vec<String> = raw
            .improvement_areas
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        if raw.verdict == Verdict::NeedsImprovement && improvement_areas.is_empty() {
            return Err("a needs_improvement verdict must list at least one improvement area".into());
        }
        Ok(Self {
            verdict: raw.verdict,
            feedback: raw.feedback,
            improvement_areas,
        })
    }
}

impl EvaluationResult {
    pub fn pass(feedback: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Pass,
            feedback: feedback.into(),
            improvement_areas: Vec::new(),
        }
    }

    pub fn is_pass(&self) -> bool {
        self.verdict == Verdict::Pass
    }
}

// ---------------------------------------------------------------------------
// IterationRecord
// ---------------------------------------------------------------------------

/// One generate/evaluate round, kept for audit and display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-indexed.
    pub index: u32,
    pub generated_text: String,
    pub evaluation: EvaluationResult,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_score_alias() {
        let e: EvaluationResult = serde_json::from_str(
            r#"{"score": "needs_improvement", "feedback": "thin", "improvement_areas": ["NFRs"]}"#,
        )
        .unwrap();
        assert_eq!(e.verdict, Verdict::NeedsImprovement);
        assert_eq!(e.improvement_areas, vec!["NFRs"]);
    }

    #[test]
    fn pass_may_have_no_areas() {
        let e: EvaluationResult = serde_json::from_str(r#"{"verdict": "pass"}"#).unwrap();
        assert!(e.is_pass());
        assert!(e.feedback.is_empty());
    }

    #[test]
    fn needs_improvement_without_areas_is_rejected() {
        let err = serde_json::from_str::<EvaluationResult>(
            r#"{"score": "needs_improvement", "feedback": "x", "improvement_areas": ["  "]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("improvement area"));
    }

    #[test]
    fn unknown_verdict_is_rejected() {
        assert!(serde_json::from_str::<EvaluationResult>(r#"{"score": "great"}"#).is_err());
    }

    #[test]
    fn serializes_as_verdict() {
        let json = serde_json::to_value(EvaluationResult::pass("ok")).unwrap();
        assert_eq!(json["verdict"], "pass");
    }
}
