//! The bounded plan → retrieve → draft → critique → revise pipeline.

use std::sync::Arc;

use tracing::debug;

use crate::ollama::{GenerationClient, OllamaError};
use crate::retrieval::CorpusIndex;

use super::parse;
use super::types::{ContextEntry, Critique, Plan, RunResult};

/// Prompt for the planner role. Expects a JSON-only reply.
const PLANNER_PROMPT: &str = r#"You are the PLANNER in a multi-role question answering pipeline.
Analyze the question and return ONLY a valid JSON object of this shape:
{
  "intent": "<primary intent>",
  "subtasks": ["<subtask 1>", "<subtask 2>"],
  "answer_style": "direct|detailed|executive",
  "needs_context": true
}
Rules:
- Return ONLY JSON.
- Be concise.

User question:
{question}"#;

/// Prompt for the analyst role drafting the answer.
const ANALYST_PROMPT: &str = r#"You are the ANALYST.
Use the plan and the retrieved context excerpts to answer the question.
If the context is missing information you need, say so explicitly.
End with a short section titled "Sources used" listing the file names you drew from.

Question:
{question}

Plan:
{plan}

Retrieved context:
{context}"#;

/// Prompt for the critic role. Expects a JSON-only verdict.
const CRITIC_PROMPT: &str = r#"You are the CRITIC.
Evaluate the ANALYST's answer against these criteria:
1) Fidelity to the question
2) Fidelity to the retrieved context
3) Clarity
Return ONLY a JSON object:
{
  "approved": true/false,
  "reason": "short text",
  "improvements": ["action 1", "action 2"]
}

Question:
{question}

Context summary:
{context}

ANALYST answer:
{answer}"#;

/// Prompt for the analyst role revising a rejected draft.
const REVISE_PROMPT: &str = r#"You are the ANALYST in revision mode.
Improve the answer according to the critique.
Stay faithful to the retrieved context.

Critique:
{critique}

Context:
{context}

Previous answer:
{answer}"#;

const PLANNER_TEMPERATURE: f32 = 0.1;
const ANALYST_TEMPERATURE: f32 = 0.2;
const CRITIC_TEMPERATURE: f32 = 0.0;
const REVISE_TEMPERATURE: f32 = 0.15;

/// The critic sees each context item truncated to this many characters.
const CRITIC_CONTEXT_CHARS: usize = 280;

/// Pipeline stages. `Done` is terminal; `Revise` is entered at most
/// `max_revision_rounds` times per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Plan,
    Retrieve,
    Draft,
    Critique,
    Revise,
    Done,
}

/// Builder for constructing [`Orchestrator`] instances.
#[derive(Default)]
pub struct OrchestratorBuilder {
    client: Option<Arc<dyn GenerationClient>>,
    index: Option<CorpusIndex>,
    top_k: Option<usize>,
    max_revision_rounds: Option<usize>,
}

impl OrchestratorBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the generation client to use.
    pub fn client(mut self, client: Arc<dyn GenerationClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Sets the corpus index to retrieve from.
    pub fn index(mut self, index: CorpusIndex) -> Self {
        self.index = Some(index);
        self
    }

    /// Sets how many chunks are retrieved per question.
    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// Sets the bound on revision rounds per question.
    pub fn max_revision_rounds(mut self, rounds: usize) -> Self {
        self.max_revision_rounds = Some(rounds);
        self
    }

    /// Builds the `Orchestrator`.
    ///
    /// # Panics
    ///
    /// Panics if `client()` or `index()` was not called.
    #[must_use]
    pub fn build(self) -> Orchestrator {
        Orchestrator {
            client: self.client.expect("client must be set via client() method"),
            index: self.index.expect("index must be set via index() method"),
            top_k: self.top_k.unwrap_or(crate::config::DEFAULT_TOP_K),
            max_revision_rounds: self
                .max_revision_rounds
                .unwrap_or(crate::config::DEFAULT_MAX_REVISION_ROUNDS),
        }
    }
}

/// Drives the planner, analyst, and critic roles through an explicit state
/// machine, one question at a time.
///
/// Each run walks `Plan → Retrieve → Draft → Critique`, then alternates
/// `Revise → Critique` until the critic approves or the round bound is hit.
/// Malformed model output never fails a run; only generation backend errors
/// propagate.
pub struct Orchestrator {
    client: Arc<dyn GenerationClient>,
    index: CorpusIndex,
    top_k: usize,
    max_revision_rounds: usize,
}

impl Orchestrator {
    /// Answers `question`, returning the aggregated result of the full
    /// pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error only when a generation backend call fails; retrieval
    /// anomalies and unparsable model output degrade to defaults instead.
    pub fn run(&self, question: &str) -> Result<RunResult, OllamaError> {
        let mut stage = Stage::Plan;
        let mut plan = Plan::fallback();
        let mut contexts: Vec<ContextEntry> = Vec::new();
        let mut answer = String::new();
        let mut critique = Critique::fallback();
        let mut rounds = 0usize;

        loop {
            debug!(?stage, rounds, "entering stage");
            match stage {
                Stage::Plan => {
                    plan = self.plan(question)?;
                    stage = Stage::Retrieve;
                }
                Stage::Retrieve => {
                    contexts = self.retrieve(question);
                    stage = Stage::Draft;
                }
                Stage::Draft => {
                    answer = self.draft(question, &plan, &contexts)?;
                    stage = Stage::Critique;
                }
                Stage::Critique => {
                    critique = self.critique(question, &answer, &contexts)?;
                    stage = if critique.approved || rounds >= self.max_revision_rounds {
                        Stage::Done
                    } else {
                        Stage::Revise
                    };
                }
                Stage::Revise => {
                    answer = self.revise(&answer, &critique, &contexts)?;
                    rounds += 1;
                    stage = Stage::Critique;
                }
                Stage::Done => {
                    return Ok(RunResult {
                        plan,
                        contexts,
                        final_answer: answer,
                        critique,
                        revision_rounds: rounds,
                    });
                }
            }
        }
    }

    fn plan(&self, question: &str) -> Result<Plan, OllamaError> {
        let prompt = PLANNER_PROMPT.replace("{question}", question);
        let raw = self.client.generate(&prompt, PLANNER_TEMPERATURE)?;
        Ok(parse::plan_from_response(&raw))
    }

    fn retrieve(&self, question: &str) -> Vec<ContextEntry> {
        let contexts: Vec<ContextEntry> = self
            .index
            .retrieve(question, self.top_k)
            .into_iter()
            .map(|scored| ContextEntry {
                source: scored.chunk.source().to_string(),
                text: scored.chunk.text().to_string(),
                score: scored.score,
            })
            .collect();
        debug!(retrieved = contexts.len(), top_k = self.top_k, "context retrieved");
        contexts
    }

    fn draft(
        &self,
        question: &str,
        plan: &Plan,
        contexts: &[ContextEntry],
    ) -> Result<String, OllamaError> {
        let prompt = ANALYST_PROMPT
            .replace("{question}", question)
            .replace("{plan}", &to_pretty_json(plan))
            .replace("{context}", &format_contexts(contexts));
        self.client.generate(&prompt, ANALYST_TEMPERATURE)
    }

    fn critique(
        &self,
        question: &str,
        answer: &str,
        contexts: &[ContextEntry],
    ) -> Result<Critique, OllamaError> {
        let prompt = CRITIC_PROMPT
            .replace("{question}", question)
            .replace("{context}", &summarize_contexts(contexts))
            .replace("{answer}", answer);
        let raw = self.client.generate(&prompt, CRITIC_TEMPERATURE)?;
        Ok(parse::critique_from_response(&raw))
    }

    fn revise(
        &self,
        answer: &str,
        critique: &Critique,
        contexts: &[ContextEntry],
    ) -> Result<String, OllamaError> {
        let prompt = REVISE_PROMPT
            .replace("{critique}", &to_pretty_json(critique))
            .replace("{context}", &format_contexts(contexts))
            .replace("{answer}", answer);
        self.client.generate(&prompt, REVISE_TEMPERATURE)
    }
}

fn to_pretty_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Formats full context items for the analyst, each tagged with source and
/// score.
fn format_contexts(contexts: &[ContextEntry]) -> String {
    if contexts.is_empty() {
        return "(no context retrieved)".to_string();
    }
    contexts
        .iter()
        .map(|c| format!("[source: {} | score={:.4}]\n{}", c.source, c.score, c.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Formats truncated context summaries for the critic.
fn summarize_contexts(contexts: &[ContextEntry]) -> String {
    if contexts.is_empty() {
        return "(no context)".to_string();
    }
    contexts
        .iter()
        .map(|c| {
            let snippet: String = c.text.chars().take(CRITIC_CONTEXT_CHARS).collect();
            format!("[source: {}] {}", c.source, snippet)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::types::AnswerStyle;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays a fixed sequence of responses; repeats the last one when the
    /// script runs out.
    struct ScriptedClient {
        responses: Mutex<VecDeque<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedClient {
        fn new(responses: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
                calls: AtomicUsize::new(0),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl GenerationClient for ScriptedClient {
        fn generate(&self, _prompt: &str, _temperature: f32) -> Result<String, OllamaError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.len() > 1 {
                Ok(responses.pop_front().unwrap())
            } else {
                Ok(responses
                    .front()
                    .cloned()
                    .unwrap_or_else(|| "draft answer".to_string()))
            }
        }
    }

    struct FailingClient;

    impl GenerationClient for FailingClient {
        fn generate(&self, _prompt: &str, _temperature: f32) -> Result<String, OllamaError> {
            Err(OllamaError::Http { status: 503 })
        }
    }

    fn paris_index() -> CorpusIndex {
        CorpusIndex::from_documents(
            [("france.md", "Paris is the capital of France.")],
            700,
        )
        .expect("build failed")
    }

    fn empty_index() -> CorpusIndex {
        CorpusIndex::from_documents(std::iter::empty::<(String, String)>(), 700)
            .expect("build failed")
    }

    const APPROVING_CRITIC: &str = r#"{"approved": true, "reason": "solid", "improvements": []}"#;
    const REJECTING_CRITIC: &str =
        r#"{"approved": false, "reason": "thin", "improvements": ["expand"]}"#;

    #[test]
    fn approved_first_draft_runs_zero_revision_rounds() {
        let client = ScriptedClient::new(&[
            r#"{"intent": "lookup", "subtasks": ["find fact"], "answer_style": "direct", "needs_context": true}"#,
            "Paris is the capital.",
            APPROVING_CRITIC,
        ]);
        let orchestrator = OrchestratorBuilder::new()
            .client(client.clone())
            .index(paris_index())
            .build();

        let result = orchestrator.run("capital of France?").unwrap();
        assert_eq!(result.revision_rounds, 0);
        assert_eq!(result.final_answer, "Paris is the capital.");
        assert!(result.critique.approved);
        assert_eq!(result.plan.answer_style, AnswerStyle::Direct);
        // plan + draft + critique
        assert_eq!(client.call_count(), 3);
    }

    #[test]
    fn rejection_triggers_exactly_one_revision_at_default_bound() {
        let client = ScriptedClient::new(&[
            r#"{"intent": "lookup", "subtasks": [], "answer_style": "direct", "needs_context": true}"#,
            "first draft",
            REJECTING_CRITIC,
            "revised draft",
            REJECTING_CRITIC,
        ]);
        let orchestrator = OrchestratorBuilder::new()
            .client(client.clone())
            .index(paris_index())
            .build();

        let result = orchestrator.run("capital of France?").unwrap();
        // The loop stops at the bound even though the critic never approved.
        assert_eq!(result.revision_rounds, 1);
        assert_eq!(result.final_answer, "revised draft");
        assert!(!result.critique.approved);
        // plan + draft + critique + revise + critique
        assert_eq!(client.call_count(), 5);
    }

    #[test]
    fn revision_loop_respects_configured_bound() {
        let client = ScriptedClient::new(&[
            "no plan here",
            "draft",
            REJECTING_CRITIC,
            "rev 1",
            REJECTING_CRITIC,
            "rev 2",
            REJECTING_CRITIC,
            "rev 3",
            REJECTING_CRITIC,
        ]);
        let orchestrator = OrchestratorBuilder::new()
            .client(client.clone())
            .index(paris_index())
            .max_revision_rounds(3)
            .build();

        let result = orchestrator.run("capital of France?").unwrap();
        assert_eq!(result.revision_rounds, 3);
        assert_eq!(result.final_answer, "rev 3");
        // plan + draft + 4 critiques + 3 revisions
        assert_eq!(client.call_count(), 9);
    }

    #[test]
    fn zero_round_bound_skips_revision_entirely() {
        let client = ScriptedClient::new(&["plan?", "draft", REJECTING_CRITIC]);
        let orchestrator = OrchestratorBuilder::new()
            .client(client.clone())
            .index(paris_index())
            .max_revision_rounds(0)
            .build();

        let result = orchestrator.run("capital of France?").unwrap();
        assert_eq!(result.revision_rounds, 0);
        assert_eq!(result.final_answer, "draft");
        assert_eq!(client.call_count(), 3);
    }

    #[test]
    fn garbage_planner_and_critic_fall_back_and_terminate() {
        let client = ScriptedClient::new(&[
            "sorry, I can't help",
            "best-effort answer",
            "not json at all",
        ]);
        let orchestrator = OrchestratorBuilder::new()
            .client(client)
            .index(paris_index())
            .build();

        let result = orchestrator.run("capital of France?").unwrap();
        assert_eq!(result.plan.intent, Plan::fallback().intent);
        assert!(result.critique.approved);
        assert_eq!(result.critique.reason, "fallback");
        assert_eq!(result.revision_rounds, 0);
    }

    #[test]
    fn retrieved_contexts_carry_source_and_positive_score() {
        let client = ScriptedClient::new(&["plan", "answer", APPROVING_CRITIC]);
        let orchestrator = OrchestratorBuilder::new()
            .client(client)
            .index(paris_index())
            .top_k(1)
            .build();

        let result = orchestrator.run("capital of France").unwrap();
        assert_eq!(result.contexts.len(), 1);
        assert_eq!(result.contexts[0].source, "france.md");
        assert!(result.contexts[0].score > 0.0);
    }

    #[test]
    fn empty_corpus_still_produces_an_answer() {
        let client = ScriptedClient::new(&["plan", "no context to draw on", APPROVING_CRITIC]);
        let orchestrator = OrchestratorBuilder::new()
            .client(client)
            .index(empty_index())
            .build();

        let result = orchestrator.run("anything at all?").unwrap();
        assert!(result.contexts.is_empty());
        assert_eq!(result.final_answer, "no context to draw on");
        assert_eq!(result.revision_rounds, 0);
    }

    #[test]
    fn backend_failure_propagates() {
        let orchestrator = OrchestratorBuilder::new()
            .client(Arc::new(FailingClient))
            .index(paris_index())
            .build();

        let result = orchestrator.run("capital of France?");
        assert!(matches!(result, Err(OllamaError::Http { status: 503 })));
    }

    #[test]
    fn format_contexts_tags_source_and_score() {
        let contexts = vec![ContextEntry {
            source: "a.md".to_string(),
            text: "body text".to_string(),
            score: 1.25,
        }];
        let formatted = format_contexts(&contexts);
        assert!(formatted.contains("[source: a.md | score=1.2500]"));
        assert!(formatted.contains("body text"));
    }

    #[test]
    fn format_contexts_marks_missing_context() {
        assert_eq!(format_contexts(&[]), "(no context retrieved)");
        assert_eq!(summarize_contexts(&[]), "(no context)");
    }

    #[test]
    fn summarize_contexts_truncates_to_280_chars() {
        let contexts = vec![ContextEntry {
            source: "long.md".to_string(),
            text: "x".repeat(500),
            score: 0.5,
        }];
        let summary = summarize_contexts(&contexts);
        let snippet = summary.strip_prefix("[source: long.md] ").unwrap();
        assert_eq!(snippet.chars().count(), 280);
    }

    #[test]
    fn prompts_substitute_the_question() {
        let rendered = PLANNER_PROMPT.replace("{question}", "why is the sky blue?");
        assert!(rendered.contains("why is the sky blue?"));
        assert!(!rendered.contains("{question}"));
        // The JSON shape braces must survive substitution.
        assert!(rendered.contains(r#""needs_context": true"#));
    }
}
