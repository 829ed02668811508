//! The Ground step: pins free-form mentions to canonical data before any
//! SQL exists.
//!
//! Categories map through the synonym table first, embeddings second, and
//! plain lowercase text as the last resort when the embedder is down.
//! Merchants resolve against the user's own history by containment, then by
//! embedding. "Home state" comes straight off the user row.

use crate::app_state::AppState;
use crate::clients::embedder::{cosine_similarity, normalize_text, EmbedderBackend};
use crate::compiler::intent::RuleIntent;
use crate::repositories::{SynonymRepository, TransactionRepository};
use cardwatch_primitives::models::{NotificationChannel, RuleKind, Severity, User};
use cardwatch_primitives::ApiError;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct GroundedRule {
    pub intent: RuleIntent,
    pub severity: Severity,
    pub channels: Vec<NotificationChannel>,
    pub home_state: Option<String>,
    /// Resolved (name, lat, lon) when the rule watches a named place rather
    /// than the home state.
    pub place: Option<(String, f64, f64)>,
    pub name: Option<String>,
}

#[derive(Debug)]
pub enum GroundOutcome {
    Grounded(GroundedRule),
    Ambiguous(Vec<String>),
}

pub async fn ground(
    state: &AppState,
    user: &User,
    mut intent: RuleIntent,
) -> Result<GroundOutcome, ApiError> {
    if let Some(category) = intent.category.take() {
        intent.category = Some(canonical_category(state, &category).await?);
    }

    if let Some(merchant) = intent.merchant.take() {
        intent.merchant = Some(resolve_merchant(state, user, &merchant).await?);
    }

    let home_state = user.home_state.clone();
    let mut place = None;
    if intent.kind == RuleKind::Location {
        match intent.geo_scope.as_deref() {
            Some("home_state") | None => {
                if home_state.is_none() {
                    return Ok(GroundOutcome::Ambiguous(vec![
                        "Which state should count as home? Your profile has no home state on file."
                            .to_string(),
                    ]));
                }
            }
            Some(named_place) => match crate::analyzer::geocode::geocode_offline(named_place) {
                Some((lat, lon)) => place = Some((named_place.to_string(), lat, lon)),
                None => {
                    return Ok(GroundOutcome::Ambiguous(vec![format!(
                        "Where is \"{}\"? That place is not in the gazetteer; \
                         try \"City, ST\".",
                        named_place
                    )]))
                }
            },
        }
    }

    let missing = intent.missing_required_fields();
    if !missing.is_empty() {
        let questions = missing
            .iter()
            .map(|field| format!("The rule needs a value for {}. What should it be?", field))
            .collect();
        return Ok(GroundOutcome::Ambiguous(questions));
    }

    let severity = intent.severity.unwrap_or(match intent.kind {
        // Location anomalies read as possible fraud, so they default hot.
        RuleKind::Location => Severity::High,
        _ => Severity::Medium,
    });

    let mut channels = intent.channels.clone();
    if channels.is_empty() {
        channels.push(NotificationChannel::Email);
    }
    channels.dedup();

    let name = intent.name.clone();

    Ok(GroundOutcome::Grounded(GroundedRule {
        intent,
        severity,
        channels,
        home_state,
        place,
        name,
    }))
}

/// Synonym table exact match, embedding nearest-neighbour fallback, raw
/// lowercase as the final answer. Embedder failure is soft here.
async fn canonical_category(state: &AppState, raw: &str) -> Result<String, ApiError> {
    let normalized = normalize_text(raw);

    let mut conn = state.db.get()?;
    if let Some(canonical) = SynonymRepository::exact(&mut conn, &normalized)? {
        return Ok(canonical);
    }

    match state.embedder.embed_one(&normalized).await {
        Ok(embedding) => {
            let neighbours = SynonymRepository::nearest(&mut conn, &embedding, 3)?;
            let max_distance = 1.0 - state.config.category_similarity_threshold as f64;
            if let Some((canonical, distance)) = neighbours.into_iter().next() {
                if distance <= max_distance {
                    debug!(raw, canonical = %canonical, distance, "Category grounded via embedding");
                    return Ok(canonical);
                }
            }
        }
        Err(e) => {
            warn!("Embedder unavailable during category grounding: {}", e);
        }
    }

    Ok(normalized)
}

/// Case-insensitive containment against the user's merchant history, then
/// embedding similarity, then the text as typed (new merchants are legal).
async fn resolve_merchant(state: &AppState, user: &User, raw: &str) -> Result<String, ApiError> {
    let needle = normalize_text(raw);

    let mut conn = state.db.get()?;
    let mut known = TransactionRepository::merchant_names_for_user(&mut conn, user.id)?;
    known.sort();

    let mut containment: Vec<&String> = known
        .iter()
        .filter(|candidate| {
            let c = candidate.to_lowercase();
            c.contains(&needle) || needle.contains(&c)
        })
        .collect();
    if !containment.is_empty() {
        // ties break on the lowest canonical sort; `known` is pre-sorted
        containment.sort();
        return Ok(containment[0].clone());
    }

    if known.is_empty() {
        return Ok(raw.to_string());
    }

    let mut inputs: Vec<String> = Vec::with_capacity(known.len() + 1);
    inputs.push(needle.clone());
    inputs.extend(known.iter().map(|m| normalize_text(m)));

    match state.embedder.embed_batch(&inputs).await {
        Ok(vectors) => {
            let target = vectors[0].as_slice();
            let threshold = state.config.category_similarity_threshold;
            let mut best: Option<(&String, f32)> = None;
            for (candidate, vector) in known.iter().zip(vectors[1..].iter()) {
                let similarity = cosine_similarity(target, vector.as_slice());
                let better = match best {
                    None => similarity >= threshold,
                    Some((current, best_sim)) => {
                        similarity > best_sim
                            || (similarity == best_sim && candidate < current)
                    }
                };
                if better && similarity >= threshold {
                    best = Some((candidate, similarity));
                }
            }
            if let Some((candidate, similarity)) = best {
                debug!(raw, candidate = %candidate, similarity, "Merchant grounded via embedding");
                return Ok(candidate.clone());
            }
        }
        Err(e) => {
            warn!("Embedder unavailable during merchant grounding: {}", e);
        }
    }

    Ok(raw.to_string())
}
