//! Structured records exchanged between the pipeline roles.

use serde::Serialize;

/// Presentation style the planner selects for the final answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerStyle {
    /// Short and to the point.
    Direct,
    /// Thorough, with supporting detail.
    Detailed,
    /// Summary-first, for skimming.
    Executive,
}

impl AnswerStyle {
    /// Parse from the planner's string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "direct" => Some(Self::Direct),
            "detailed" => Some(Self::Detailed),
            "executive" => Some(Self::Executive),
            _ => None,
        }
    }
}

impl std::fmt::Display for AnswerStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Detailed => write!(f, "detailed"),
            Self::Executive => write!(f, "executive"),
        }
    }
}

/// The planner's breakdown of how to answer a question.
///
/// Produced once per question and read-only thereafter.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    /// Primary intent behind the question.
    pub intent: String,
    /// Ordered subtasks the answer should cover.
    pub subtasks: Vec<String>,
    /// How the final answer should be presented.
    pub answer_style: AnswerStyle,
    /// Whether retrieved context is expected to matter.
    pub needs_context: bool,
}

impl Plan {
    /// Built-in plan substituted when the planner's output cannot be parsed.
    ///
    /// Keeps the run going with a generic intent and `needs_context = true`
    /// instead of failing on a chatty model.
    pub fn fallback() -> Self {
        Self {
            intent: "answer the question from retrieved context".to_string(),
            subtasks: vec!["gather context".to_string(), "draft answer".to_string()],
            answer_style: AnswerStyle::Detailed,
            needs_context: true,
        }
    }
}

/// The critic's verdict on a draft answer.
///
/// Produced once per revision round; `approved` drives loop continuation.
#[derive(Debug, Clone, Serialize)]
pub struct Critique {
    /// Whether the draft is good enough to ship.
    pub approved: bool,
    /// Short justification for the verdict.
    pub reason: String,
    /// Concrete improvement actions for a revision pass.
    pub improvements: Vec<String>,
}

impl Critique {
    /// Verdict substituted when the critic's output cannot be parsed.
    ///
    /// Defaults to approval so an unparsable critic terminates the revision
    /// loop instead of spinning it until the round bound.
    pub fn fallback() -> Self {
        Self {
            approved: true,
            reason: "fallback".to_string(),
            improvements: Vec::new(),
        }
    }
}

/// One retrieved chunk as handed to the agents and printed by the driver.
#[derive(Debug, Clone, Serialize)]
pub struct ContextEntry {
    /// Name of the source document.
    pub source: String,
    /// Chunk text.
    pub text: String,
    /// TF-IDF relevance score for the current question.
    pub score: f64,
}

/// Aggregated output of one orchestration run.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    /// The plan the question was answered under.
    pub plan: Plan,
    /// Retrieved context, best match first.
    pub contexts: Vec<ContextEntry>,
    /// The answer after any revision rounds.
    pub final_answer: String,
    /// The critic's last verdict.
    pub critique: Critique,
    /// How many revision rounds actually ran.
    pub revision_rounds: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_style_parse() {
        assert_eq!(AnswerStyle::parse("direct"), Some(AnswerStyle::Direct));
        assert_eq!(AnswerStyle::parse("Detailed"), Some(AnswerStyle::Detailed));
        assert_eq!(AnswerStyle::parse("EXECUTIVE"), Some(AnswerStyle::Executive));
        assert_eq!(AnswerStyle::parse("florid"), None);
    }

    #[test]
    fn answer_style_display_round_trips() {
        for style in [AnswerStyle::Direct, AnswerStyle::Detailed, AnswerStyle::Executive] {
            assert_eq!(AnswerStyle::parse(&style.to_string()), Some(style));
        }
    }

    #[test]
    fn answer_style_serializes_lowercase() {
        let json = serde_json::to_string(&AnswerStyle::Executive).unwrap();
        assert_eq!(json, "\"executive\"");
    }

    #[test]
    fn fallback_plan_requests_context() {
        let plan = Plan::fallback();
        assert!(plan.needs_context);
        assert!(!plan.intent.is_empty());
        assert!(!plan.subtasks.is_empty());
    }

    #[test]
    fn fallback_critique_approves() {
        let critique = Critique::fallback();
        assert!(critique.approved);
        assert_eq!(critique.reason, "fallback");
        assert!(critique.improvements.is_empty());
    }
}
