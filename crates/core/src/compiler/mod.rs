//! The rule compiler: natural language in, validated rule out.
//!
//! An explicit state machine, one async step per state, each with its own
//! deadline inside one outer compile deadline:
//!
//! ```text
//!   Parse --ok--> Ground --ok--> Synthesize --ok--> Validate --ok--> DedupCheck --ok--> Valid
//!     |             |                |                  |                 |
//!   Invalid      Ambiguous        Invalid            Invalid         DuplicateOf
//! ```
//!
//! Only Parse talks to the LLM, and the LLM only fills a `RuleIntent`.
//! Transient LLM/embedder failures retry with backoff inside the step; an
//! exhausted budget surfaces as `Invalid("temporarily_unavailable")`.

pub mod grammar;
pub mod ground;
pub mod intent;
pub mod prompts;
pub mod synthesize;

use crate::app_state::AppState;
use crate::clients::embedder::{normalize_text, EmbedderBackend};
use crate::clients::llm::LlmBackend;
use crate::clients::retry::{with_backoff, Attempt, RetryPolicy};
use crate::evaluator::params::build_params;
use crate::repositories::rule_sql::run_rule_sql;
use crate::repositories::{RuleRepository, SynonymRepository, TransactionRepository, UserRepository};
use cardwatch_primitives::models::{
    AlertRule, NewAlertRule, RuleKind, Severity, User,
};
use cardwatch_primitives::ApiError;
use ground::{ground, GroundOutcome, GroundedRule};
use intent::RuleIntent;
use pgvector::Vector;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use synthesize::{synthesize, SynthesizedSql};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug)]
pub struct CompiledRule {
    pub user_id: Uuid,
    pub name: Option<String>,
    pub nl_text: String,
    pub kind: RuleKind,
    pub sql_text: String,
    pub sql_params: Value,
    pub severity: Severity,
    pub channels: Value,
    pub nl_embedding: Vector,
}

#[derive(Debug)]
pub enum CompileOutcome {
    Valid(CompiledRule),
    DuplicateOf { rule_id: Uuid, similarity: f32 },
    Invalid { reason: String, hints: Vec<String> },
    Ambiguous { questions: Vec<String> },
}

pub struct RuleCompiler;

impl RuleCompiler {
    /// Compile without persisting (the /rules/validate surface).
    pub async fn compile(
        state: &AppState,
        user_id: Uuid,
        nl_text: &str,
    ) -> Result<CompileOutcome, ApiError> {
        Self::compile_inner(state, user_id, nl_text, None).await
    }

    /// Compile and persist atomically; the rule only exists once it is
    /// Valid.
    pub async fn compile_and_create(
        state: &AppState,
        user_id: Uuid,
        nl_text: &str,
    ) -> Result<CompileResult, ApiError> {
        match Self::compile_inner(state, user_id, nl_text, None).await? {
            CompileOutcome::Valid(compiled) => {
                let mut conn = state.db.get()?;
                let rule = RuleRepository::insert(
                    &mut conn,
                    NewAlertRule {
                        id: Uuid::new_v4(),
                        user_id: compiled.user_id,
                        name: compiled.name.as_deref(),
                        nl_text: &compiled.nl_text,
                        kind: compiled.kind,
                        sql_text: &compiled.sql_text,
                        sql_params: compiled.sql_params.clone(),
                        severity: compiled.severity,
                        channels: compiled.channels.clone(),
                        is_active: true,
                        validated_sql: true,
                        nl_embedding: compiled.nl_embedding.clone(),
                    },
                )?;
                info!(rule_id = %rule.id, user_id = %user_id, "Alert rule created");
                Ok(CompileResult::Persisted(rule))
            }
            other => Ok(CompileResult::NotPersisted(other)),
        }
    }

    /// Re-compile for an edit. The stored rule is replaced only when the new
    /// text reaches Valid; the old version goes to rule_history.
    pub async fn compile_and_replace(
        state: &AppState,
        user_id: Uuid,
        rule_id: Uuid,
        nl_text: &str,
    ) -> Result<CompileResult, ApiError> {
        match Self::compile_inner(state, user_id, nl_text, Some(rule_id)).await? {
            CompileOutcome::Valid(compiled) => {
                let mut conn = state.db.get()?;
                let rule = RuleRepository::replace_compiled(
                    &mut conn,
                    rule_id,
                    &compiled.nl_text,
                    compiled.kind,
                    &compiled.sql_text,
                    compiled.sql_params.clone(),
                    compiled.severity,
                    compiled.channels.clone(),
                    compiled.nl_embedding.clone(),
                )?;
                info!(rule_id = %rule.id, "Alert rule recompiled");
                Ok(CompileResult::Persisted(rule))
            }
            other => Ok(CompileResult::NotPersisted(other)),
        }
    }

    async fn compile_inner(
        state: &AppState,
        user_id: Uuid,
        nl_text: &str,
        editing_rule: Option<Uuid>,
    ) -> Result<CompileOutcome, ApiError> {
        let deadline = Duration::from_secs(state.config.llm.compile_timeout_secs);
        match tokio::time::timeout(
            deadline,
            Self::pipeline(state, user_id, nl_text, editing_rule),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Ok(CompileOutcome::Invalid {
                reason: "temporarily_unavailable".to_string(),
                hints: vec!["The compile deadline was exceeded; try again.".to_string()],
            }),
        }
    }

    async fn pipeline(
        state: &AppState,
        user_id: Uuid,
        nl_text: &str,
        editing_rule: Option<Uuid>,
    ) -> Result<CompileOutcome, ApiError> {
        let user = {
            let mut conn = state.db.get()?;
            UserRepository::find_by_id(&mut conn, user_id)?
                .ok_or_else(|| ApiError::NotFound(format!("User {} not found", user_id)))?
        };

        // ---------- Parse ----------
        let intent = match Self::parse_step(state, nl_text).await? {
            ParseStep::Intent(intent) => intent,
            ParseStep::Outcome(outcome) => return Ok(outcome),
        };

        if intent.confidence < 0.5 {
            let mut questions = vec![
                "Could you restate the alert with a concrete amount, percentage, place or merchant?"
                    .to_string(),
            ];
            questions.extend(
                intent
                    .missing_required_fields()
                    .iter()
                    .map(|f| format!("What value should the rule use for {}?", f)),
            );
            return Ok(CompileOutcome::Ambiguous { questions });
        }

        // ---------- Ground ----------
        let grounded = match ground(state, &user, intent).await? {
            GroundOutcome::Grounded(grounded) => grounded,
            GroundOutcome::Ambiguous(questions) => {
                return Ok(CompileOutcome::Ambiguous { questions })
            }
        };

        // ---------- Synthesize ----------
        let synthesized = match synthesize(&grounded) {
            Ok(synthesized) => synthesized,
            Err(e) => {
                return Ok(CompileOutcome::Invalid {
                    reason: "synthesis_failed".to_string(),
                    hints: vec![e.to_string()],
                })
            }
        };

        // ---------- Validate ----------
        if let Err(problems) = grammar::validate(&synthesized.sql, &synthesized.declared_params) {
            // A template emitting grammar-invalid SQL is a bug, but the rule
            // must still never be stored as valid.
            warn!(?problems, "Synthesized SQL rejected by grammar");
            return Ok(CompileOutcome::Invalid {
                reason: "sql_rejected".to_string(),
                hints: problems,
            });
        }
        if let Some(outcome) = Self::dynamic_check(state, &user, &grounded, &synthesized)? {
            return Ok(outcome);
        }

        // ---------- DedupCheck ----------
        let normalized = normalize_text(nl_text);
        let embedding = match Self::embed_step(state, &normalized).await {
            Ok(embedding) => embedding,
            Err(e) => {
                // Soft failure: fall back to exact text match, keep a
                // zero vector out of storage by failing the compile only if
                // even the fallback cannot answer.
                warn!("Embedder unavailable during dedup: {}", e);
                let mut conn = state.db.get()?;
                let rules = RuleRepository::active_for_user(&mut conn, user_id)?;
                for rule in rules {
                    if Some(rule.id) == editing_rule {
                        continue;
                    }
                    if normalize_text(&rule.nl_text) == normalized {
                        return Ok(CompileOutcome::DuplicateOf {
                            rule_id: rule.id,
                            similarity: 1.0,
                        });
                    }
                }
                return Ok(CompileOutcome::Invalid {
                    reason: "temporarily_unavailable".to_string(),
                    hints: vec![
                        "The embedding service is unavailable; the rule cannot be stored without one."
                            .to_string(),
                    ],
                });
            }
        };

        {
            let mut conn = state.db.get()?;
            let neighbours =
                RuleRepository::nearest_active_for_user(&mut conn, user_id, &embedding, 3)?;
            for (rule_id, distance) in neighbours {
                if Some(rule_id) == editing_rule {
                    continue;
                }
                let similarity = 1.0 - distance as f32;
                if similarity >= state.config.dup_similarity_threshold {
                    return Ok(CompileOutcome::DuplicateOf {
                        rule_id,
                        similarity,
                    });
                }
            }
        }

        Ok(CompileOutcome::Valid(CompiledRule {
            user_id,
            name: grounded.name.clone(),
            nl_text: nl_text.to_string(),
            kind: grounded.intent.kind,
            sql_text: synthesized.sql.clone(),
            sql_params: synthesized.params_json(),
            severity: grounded.severity,
            channels: json!(grounded.channels),
            nl_embedding: embedding,
        }))
    }

    async fn parse_step(state: &AppState, nl_text: &str) -> Result<ParseStep, ApiError> {
        let known_categories = {
            let mut conn = state.db.get()?;
            SynonymRepository::canonicals(&mut conn).unwrap_or_default()
        };
        let prompt = prompts::parse_intent_prompt(nl_text, &known_categories);

        let policy = RetryPolicy::new(3, 400);
        let response = with_backoff(&policy, |_| {
            let prompt = prompt.clone();
            async move {
                match state.llm.complete(&prompt).await {
                    Ok(response) => Ok(response),
                    Err(e @ ApiError::Llm(_)) => Err(Attempt::Transient(e)),
                    Err(e) => Err(Attempt::Permanent(e)),
                }
            }
        })
        .await;

        let response = match response {
            Ok(response) => response,
            Err(ApiError::Llm(e)) => {
                warn!("LLM retry budget exhausted: {}", e);
                return Ok(ParseStep::Outcome(CompileOutcome::Invalid {
                    reason: "temporarily_unavailable".to_string(),
                    hints: vec!["The language model is unavailable; try again shortly.".to_string()],
                }));
            }
            Err(e) => return Err(e),
        };

        let Some(json_str) = extract_json_object(&response) else {
            return Ok(ParseStep::Outcome(CompileOutcome::Invalid {
                reason: "unparseable".to_string(),
                hints: prompts::example_hints(),
            }));
        };

        match serde_json::from_str::<RuleIntent>(json_str) {
            Ok(intent) => Ok(ParseStep::Intent(intent)),
            Err(e) => {
                warn!("LLM intent failed schema check: {}", e);
                Ok(ParseStep::Outcome(CompileOutcome::Invalid {
                    reason: "unparseable".to_string(),
                    hints: prompts::example_hints(),
                }))
            }
        }
    }

    async fn embed_step(state: &AppState, normalized: &str) -> Result<Vector, ApiError> {
        let policy = RetryPolicy::new(3, 300);
        with_backoff(&policy, |_| async move {
            match state.embedder.embed_one(normalized).await {
                Ok(vector) => Ok(vector),
                Err(e @ ApiError::Embedder(_)) => Err(Attempt::Transient(e)),
                Err(e) => Err(Attempt::Permanent(e)),
            }
        })
        .await
    }

    /// Dynamic validation: execute against the user's most recent
    /// transaction. With an empty history there is nothing to execute
    /// against and the grammar check stands alone.
    fn dynamic_check(
        state: &AppState,
        user: &User,
        grounded: &GroundedRule,
        synthesized: &SynthesizedSql,
    ) -> Result<Option<CompileOutcome>, ApiError> {
        let mut conn = state.db.get()?;
        let Some(sample_txn) = TransactionRepository::latest_for_user(&mut conn, user.id)? else {
            return Ok(None);
        };

        let mut extra = HashMap::new();
        if grounded.intent.kind == RuleKind::RecurringDrift {
            // the evaluator supplies this from the analyzer at run time
            extra.insert(
                "expected_cents".to_string(),
                crate::repositories::rule_sql::ParamValue::Int(0),
            );
        }

        let params = match build_params(
            &synthesized.params_json(),
            user.id,
            &sample_txn,
            &extra,
        ) {
            Ok(params) => params,
            Err(e) => {
                return Ok(Some(CompileOutcome::Invalid {
                    reason: "sql_execution_failed".to_string(),
                    hints: vec![e.to_string()],
                }))
            }
        };

        match run_rule_sql(
            &mut conn,
            &synthesized.sql,
            &params,
            state.config.eval.timeout_ms,
        ) {
            Ok(row) => {
                if !row.observed.is_finite() {
                    return Ok(Some(CompileOutcome::Invalid {
                        reason: "sql_execution_failed".to_string(),
                        hints: vec!["Rule SQL produced a non-finite observed value".to_string()],
                    }));
                }
                Ok(None)
            }
            Err(e) => Ok(Some(CompileOutcome::Invalid {
                reason: "sql_execution_failed".to_string(),
                hints: vec![e.to_string()],
            })),
        }
    }
}

enum ParseStep {
    Intent(RuleIntent),
    Outcome(CompileOutcome),
}

/// Result of a compile that was asked to persist.
#[derive(Debug)]
pub enum CompileResult {
    Persisted(AlertRule),
    NotPersisted(CompileOutcome),
}

/// Pulls the first top-level JSON object out of a model response; models
/// love to wrap JSON in prose.
fn extract_json_object(response: &str) -> Option<&str> {
    let response = response.trim();
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if start < end {
        Some(&response[start..=end])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_json_wrapped_in_prose() {
        let response = "Sure! Here is the intent:\n{\"kind\": \"THRESHOLD\"}\nHope that helps.";
        assert_eq!(extract_json_object(response), Some("{\"kind\": \"THRESHOLD\"}"));
    }

    #[test]
    fn rejects_responses_without_json() {
        assert_eq!(extract_json_object("NOT_APPLICABLE"), None);
        assert_eq!(extract_json_object("}{"), None);
    }
}
