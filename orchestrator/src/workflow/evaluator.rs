//! Evaluator: final answer generation, self-critique and confidence scoring.

use std::sync::Arc;
use tracing::warn;

use crate::error::WorkflowError;
use crate::models::{EvidenceItem, Message, Role, Source};
use crate::providers::LanguageModel;

/// Evidence items placed into the answer prompt, at most.
const MAX_CONTEXT_DOCS: usize = 6;

/// Weight assigned to evidence without an explicit relevance score
/// (web results and fetched articles).
const DEFAULT_ITEM_WEIGHT: f64 = 0.35;

/// Self-reported confidence used when the critique output is unparsable.
const FALLBACK_MODEL_CONFIDENCE: f64 = 0.2;

#[derive(Debug)]
pub struct Evaluation {
    pub answer: String,
    pub confidence: f64,
    pub sources: Vec<Source>,
    pub notes: String,
}

pub struct Evaluator {
    llm: Arc<dyn LanguageModel>,
}

impl Evaluator {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Generate the answer and score it. Answer generation failure is the
    /// one hard failure of a turn; critique failure degrades to a heuristic.
    pub async fn evaluate(
        &self,
        query: &str,
        history: &[Message],
        evidence: &[EvidenceItem],
        overall_summary: Option<&str>,
        degraded_reason: Option<&str>,
    ) -> Result<Evaluation, WorkflowError> {
        let used: Vec<&EvidenceItem> = evidence
            .iter()
            .filter(|i| i.is_usable())
            .take(MAX_CONTEXT_DOCS)
            .collect();

        let context = build_context(&used, overall_summary, degraded_reason);
        let answer_prompt = build_answer_prompt(query, history, &context);

        let answer = self
            .llm
            .generate(&answer_prompt)
            .await
            .map_err(WorkflowError::Evaluation)?;

        let (model_conf, notes) = self.critique(query, &answer, &context).await;
        let quality = evidence_quality(&used);
        let confidence = combine_confidence(model_conf, quality);

        Ok(Evaluation {
            answer,
            confidence,
            sources: dedup_sources(&used),
            notes,
        })
    }

    async fn critique(&self, query: &str, answer: &str, context: &str) -> (f64, String) {
        let prompt = format!(
            "You are an evaluator. Given the user's question and the draft answer, assess \
             whether the answer is complete and supported by the provided context.\n\n\
             Question:\n{query}\n\nDraft Answer:\n{answer}\n\nContext (if any):\n{context}\n\n\
             Respond in JSON with keys:\n\
             - ok: true|false\n\
             - confidence: a number between 0 and 1\n\
             - notes: one sentence on what might be missing."
        );

        match self.llm.generate(&prompt).await {
            Ok(text) => match parse_critique(&text) {
                Some((conf, notes)) => (conf, notes),
                None => {
                    warn!("critique output unparsable, using heuristic confidence");
                    (
                        FALLBACK_MODEL_CONFIDENCE,
                        "Could not parse evaluator JSON; used heuristic.".to_string(),
                    )
                }
            },
            Err(e) => {
                warn!("critique call failed: {}", e);
                (
                    FALLBACK_MODEL_CONFIDENCE,
                    format!("Evaluator unavailable: {e}"),
                )
            }
        }
    }
}

fn build_context(
    used: &[&EvidenceItem],
    overall_summary: Option<&str>,
    degraded_reason: Option<&str>,
) -> String {
    let mut parts: Vec<String> = used
        .iter()
        .map(|i| format!("[{}]\n{}", i.locator, i.content))
        .collect();
    if let Some(summary) = overall_summary {
        parts.push(format!("[synthesis]\n{summary}"));
    }
    if parts.is_empty() {
        if let Some(reason) = degraded_reason {
            parts.push(format!("(retrieval degraded: {reason})"));
        }
    }
    parts.join("\n\n")
}

fn build_answer_prompt(query: &str, history: &[Message], context: &str) -> String {
    let transcript = history
        .iter()
        .map(|m| {
            let speaker = match m.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            format!("{speaker}: {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a helpful research assistant. Using ONLY the context below, answer the \
         user's question concisely. Cite the bracketed source locators you rely on. \
         If unsure, say you don't know.\n\n\
         Conversation so far:\n{transcript}\n\nQuestion:\n{query}\n\nContext:\n{context}"
    )
}

/// Pull `{ ... }` out of the model's reply and read `confidence`/`notes`.
fn parse_critique(text: &str) -> Option<(f64, String)> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    let value: serde_json::Value = serde_json::from_str(&text[start..=end]).ok()?;
    let confidence = value.get("confidence")?.as_f64()?.clamp(0.0, 1.0);
    let notes = value
        .get("notes")
        .and_then(|n| n.as_str())
        .unwrap_or("")
        .to_string();
    Some((confidence, notes))
}

/// Saturating quality score over usable evidence: `1 - Π(1 - wᵢ)`.
///
/// Adding an item can never lower the score, which keeps the final
/// confidence monotonic in evidence for a fixed model self-report.
pub fn evidence_quality(used: &[&EvidenceItem]) -> f64 {
    let mut miss = 1.0_f64;
    for item in used {
        let w = item.score.unwrap_or(DEFAULT_ITEM_WEIGHT).clamp(0.0, 1.0);
        miss *= 1.0 - w;
    }
    1.0 - miss
}

/// Fold evidence quality into the model's self-report. With zero evidence
/// the score is capped well below the retry threshold.
pub fn combine_confidence(model_conf: f64, quality: f64) -> f64 {
    (model_conf.clamp(0.0, 1.0) * (0.4 + 0.6 * quality.clamp(0.0, 1.0))).clamp(0.0, 1.0)
}

fn dedup_sources(used: &[&EvidenceItem]) -> Vec<Source> {
    let mut seen = std::collections::HashSet::new();
    used.iter()
        .filter(|i| seen.insert(i.locator.clone()))
        .map(|i| Source {
            locator: i.locator.clone(),
            title: i.title.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::models::{EvidenceOrigin, EvidenceStatus};
    use async_trait::async_trait;

    fn item(locator: &str, score: Option<f64>) -> EvidenceItem {
        EvidenceItem {
            origin: EvidenceOrigin::WebResult,
            content: "content".into(),
            title: "title".into(),
            locator: locator.to_string(),
            score,
            status: EvidenceStatus::Ok,
        }
    }

    #[test]
    fn quality_is_monotonic_in_added_evidence() {
        let a = item("u1", Some(0.5));
        let b = item("u2", Some(0.4));
        let c = item("u3", None);

        let small = evidence_quality(&[&a]);
        let bigger = evidence_quality(&[&a, &b]);
        let biggest = evidence_quality(&[&a, &b, &c]);

        assert!(small <= bigger);
        assert!(bigger <= biggest);
        assert!(biggest <= 1.0);
    }

    #[test]
    fn combined_confidence_is_monotonic_in_quality() {
        for model_conf in [0.1, 0.5, 0.9] {
            let mut prev = 0.0;
            for q in [0.0, 0.3, 0.7, 1.0] {
                let c = combine_confidence(model_conf, q);
                assert!(c >= prev);
                assert!((0.0..=1.0).contains(&c));
                prev = c;
            }
        }
    }

    #[test]
    fn zero_evidence_lowers_confidence() {
        let with = combine_confidence(0.9, evidence_quality(&[&item("u1", Some(0.8))]));
        let without = combine_confidence(0.9, evidence_quality(&[]));
        assert!(without < with);
        assert!(without < 0.4);
    }

    #[test]
    fn critique_json_is_extracted_from_prose() {
        let text = "Sure, here is my assessment:\n{\"ok\": true, \"confidence\": 0.85, \"notes\": \"solid\"}\nDone.";
        let (conf, notes) = parse_critique(text).unwrap();
        assert!((conf - 0.85).abs() < 1e-9);
        assert_eq!(notes, "solid");

        assert!(parse_critique("no json here").is_none());
    }

    struct ScriptedLlm {
        critique: String,
    }

    #[async_trait]
    impl LanguageModel for ScriptedLlm {
        async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
            if prompt.starts_with("You are an evaluator") {
                Ok(self.critique.clone())
            } else {
                Ok("Answer grounded in [u1].".to_string())
            }
        }
    }

    struct DeadLlm;

    #[async_trait]
    impl LanguageModel for DeadLlm {
        async fn generate(&self, _prompt: &str) -> Result<String, ProviderError> {
            Err(ProviderError::Unavailable("down".into()))
        }
    }

    #[tokio::test]
    async fn sources_are_a_deduplicated_subset_of_evidence() {
        let ev = Evaluator::new(Arc::new(ScriptedLlm {
            critique: "{\"ok\": true, \"confidence\": 0.9, \"notes\": \"\"}".into(),
        }));
        let evidence = vec![item("u1", Some(0.9)), item("u1", Some(0.8)), item("u2", None)];

        let out = ev.evaluate("q", &[], &evidence, None, None).await.unwrap();
        let locators: Vec<&str> = out.sources.iter().map(|s| s.locator.as_str()).collect();
        assert_eq!(locators, vec!["u1", "u2"]);
        for s in &out.sources {
            assert!(evidence.iter().any(|e| e.locator == s.locator));
        }
    }

    #[tokio::test]
    async fn answer_generation_failure_is_hard() {
        let ev = Evaluator::new(Arc::new(DeadLlm));
        let err = ev.evaluate("q", &[], &[], None, None).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Evaluation(_)));
    }

    #[tokio::test]
    async fn unparsable_critique_degrades_to_heuristic() {
        let ev = Evaluator::new(Arc::new(ScriptedLlm {
            critique: "I feel good about this.".into(),
        }));
        let out = ev
            .evaluate("q", &[], &[item("u1", Some(0.9))], None, None)
            .await
            .unwrap();
        assert!(out.confidence <= FALLBACK_MODEL_CONFIDENCE);
        assert!(out.notes.contains("heuristic"));
    }

    struct RecordingLlm {
        prompts: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LanguageModel for RecordingLlm {
        async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("{\"ok\": false, \"confidence\": 0.3, \"notes\": \"\"}".to_string())
        }
    }

    #[tokio::test]
    async fn degraded_retrieval_reason_reaches_the_answer_prompt() {
        let llm = Arc::new(RecordingLlm {
            prompts: std::sync::Mutex::new(vec![]),
        });
        let ev = Evaluator::new(llm.clone());

        ev.evaluate("q", &[], &[], None, Some("web search unavailable: offline"))
            .await
            .unwrap();

        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0].contains("retrieval degraded"));
        assert!(prompts[0].contains("web search unavailable: offline"));
    }
}
