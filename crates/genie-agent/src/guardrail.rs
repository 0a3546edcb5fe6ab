use crate::{AgentError, Result};

/// A policy check run on text before it is sent to, or after it is
/// received from, an agent.
pub trait Guardrail: Send + Sync {
    fn name(&self) -> &str;

    /// `Err(reason)` trips the guardrail.
    fn check(&self, text: &str) -> std::result::Result<(), String>;
}

/// Run every guardrail in order; the first trip wins.
pub fn enforce<G>(guardrails: &[G], text: &str) -> Result<()>
where
    G: AsRef<dyn Guardrail>,
{
    for g in guardrails {
        let g = g.as_ref();
        if let Err(reason) = g.check(text) {
            tracing::warn!(guardrail = g.name(), %reason, "guardrail tripped");
            return Err(AgentError::GuardrailTripped {
                guardrail: g.name().to_string(),
                reason,
            });
        }
    }
    Ok(())
}

// ─── MinWords ─────────────────────────────────────────────────────────────

/// Rejects input with fewer than `min` whitespace-separated words.
#[derive(Debug, Clone)]
pub struct MinWords {
    pub min: usize,
}

impl Guardrail for MinWords {
    fn name(&self) -> &str {
        "min_words"
    }

    fn check(&self, text: &str) -> std::result::Result<(), String> {
        let count = text.split_whitespace().count();
        if count < self.min {
            return Err(format!(
                "input has {count} words; at least {} are required",
                self.min
            ));
        }
        Ok(())
    }
}

// ─── RequiredSections ─────────────────────────────────────────────────────

/// Output quality check: minimum length plus section headings that must
/// appear somewhere in the text (case-insensitive).
#[derive(Debug, Clone)]
pub struct RequiredSections {
    pub min_length: usize,
    pub sections: Vec<String>,
}

impl Default for RequiredSections {
    fn default() -> Self {
        Self {
            min_length: 100,
            sections: vec![
                "Requirements".to_string(),
                "Assumptions".to_string(),
                "Edge Cases".to_string(),
            ],
        }
    }
}

impl Guardrail for RequiredSections {
    fn name(&self) -> &str {
        "required_sections"
    }

    fn check(&self, text: &str) -> std::result::Result<(), String> {
        let len = text.chars().count();
        if len < self.min_length {
            return Err(format!(
                "output is {len} characters; at least {} are required",
                self.min_length
            ));
        }
        let lower = text.to_lowercase();
        let missing: Vec<&str> = self
            .sections
            .iter()
            .filter(|s| !lower.contains(&s.to_lowercase()))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(format!("missing sections: {}", missing.join(", ")));
        }
        Ok(())
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
