use std::sync::Arc;

use tapreply_memory::{HistoryStore, WeightKey, WeightStore};
use tapreply_schema::{Intent, SuggestRequest, Suggestion};
use tracing::{debug, info, warn};

use crate::config::SuggestionConfig;
use crate::generator::{GenerationRequest, GeneratorFailure, GeneratorOutcome, ReplyGenerator};
use crate::{intent, phrase_bank};

pub const BASE_SCORE: f64 = 1.0;
pub const WEIGHT_FACTOR: f64 = 0.3;

/// `1.0 + 0.3 * weight`: untried candidates score exactly 1.0.
pub fn score_for_weight(weight: u64) -> f64 {
    BASE_SCORE + WEIGHT_FACTOR * weight as f64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    Generator,
    PhraseBank,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub text: String,
    pub weight: u64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    pub intent: Intent,
    pub source: CandidateSource,
    pub candidates: Vec<ScoredCandidate>,
}

/// History-derived hints for the generator. Empty unless history-aware.
#[derive(Debug, Clone, Default)]
struct PromptHints {
    history: Option<String>,
    worked_replies: Vec<String>,
}

/// Pairs candidates with their weights, sorts by descending score and keeps
/// the first `limit`. The sort is stable, so equal scores keep source order.
pub fn rank_candidates(candidates: Vec<String>, weights: &[u64], limit: usize) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = candidates
        .into_iter()
        .zip(weights.iter().copied().chain(std::iter::repeat(0)))
        .map(|(text, weight)| ScoredCandidate {
            text,
            weight,
            score: score_for_weight(weight),
        })
        .collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(limit);
    scored
}

/// Obtains candidates, scores them against learned weights and records the
/// conversation. Owns no state of its own: stores and generator are injected.
pub struct SuggestionEngine {
    weights: Arc<WeightStore>,
    history: Arc<HistoryStore>,
    generator: Arc<dyn ReplyGenerator>,
    settings: SuggestionConfig,
}

impl SuggestionEngine {
    pub fn new(
        weights: Arc<WeightStore>,
        history: Arc<HistoryStore>,
        generator: Arc<dyn ReplyGenerator>,
        settings: SuggestionConfig,
    ) -> Self {
        Self {
            weights,
            history,
            generator,
            settings,
        }
    }

    pub fn settings(&self) -> &SuggestionConfig {
        &self.settings
    }

    pub fn weights(&self) -> &Arc<WeightStore> {
        &self.weights
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    /// Full Suggest flow: normalise input, record the heard exchange, rank, and
    /// build client records. Never fails.
    pub async fn suggest(&self, request: &SuggestRequest) -> Vec<Suggestion> {
        let utterance = truncate_chars(&request.last_text, self.settings.max_utterance_chars);
        let context = request.context_or_default();

        // Hints are read before this turn is appended so the prompt history
        // holds only earlier turns.
        let hints = self.prompt_hints(&request.session_id, context).await;

        if let Err(error) = self
            .history
            .add_exchange(&request.session_id, context, &utterance, None)
            .await
        {
            warn!(session_id = %request.session_id, %error, "failed to persist heard exchange");
        }

        let ranking = self.rank_with_hints(&utterance, context, hints).await;
        info!(
            session_id = %request.session_id,
            context,
            intent = %ranking.intent,
            source = ?ranking.source,
            count = ranking.candidates.len(),
            "served suggestions"
        );

        ranking
            .candidates
            .into_iter()
            .enumerate()
            .map(|(rank, candidate)| Suggestion {
                id: Suggestion::make_id(context, ranking.intent, rank),
                text: candidate.text,
                intent: ranking.intent,
                score: candidate.score,
            })
            .collect()
    }

    /// Classify, generate (or fall back), score and sort. Reads the session's
    /// history for hints but does not record anything.
    pub async fn rank(&self, session_id: &str, utterance: &str, context: &str) -> Ranking {
        let hints = self.prompt_hints(session_id, context).await;
        self.rank_with_hints(utterance, context, hints).await
    }

    async fn rank_with_hints(&self, utterance: &str, context: &str, hints: PromptHints) -> Ranking {
        let intent = intent::classify(utterance);
        let count = self.settings.candidate_count();

        let request = GenerationRequest {
            utterance: utterance.to_owned(),
            context: context.to_owned(),
            candidate_count: count,
            history: hints.history,
            worked_replies: hints.worked_replies,
        };

        let outcome = match self.generator.generate(&request).await {
            GeneratorOutcome::Candidates(candidates) if candidates.len() < count => {
                GeneratorOutcome::Failure(GeneratorFailure::InvalidOutput {
                    got: candidates.len(),
                    needed: count,
                })
            }
            outcome => outcome,
        };

        let (source, candidates) = match outcome {
            GeneratorOutcome::Candidates(mut candidates) => {
                candidates.truncate(count);
                (CandidateSource::Generator, candidates)
            }
            GeneratorOutcome::Failure(reason) => {
                warn!(%reason, %intent, "reply generation failed, using phrase bank");
                (CandidateSource::PhraseBank, phrase_bank::fallback(intent, count))
            }
        };

        let weights = self
            .weights
            .get_weights(context, intent.as_str(), candidates.as_slice())
            .await;

        Ranking {
            intent,
            source,
            candidates: rank_candidates(candidates, &weights, count),
        }
    }

    async fn prompt_hints(&self, session_id: &str, context: &str) -> PromptHints {
        if !self.settings.history_aware {
            return PromptHints::default();
        }

        let history = self
            .history
            .history_for_prompt(session_id, self.settings.history_prompt_exchanges)
            .await;
        let worked_replies = self
            .history
            .common_replies(context, self.settings.common_replies_limit)
            .await;

        PromptHints {
            history: (!history.is_empty()).then_some(history),
            worked_replies,
        }
    }

    /// Learns from a tapped reply: bumps its weight and attaches it to the
    /// session's latest exchange. The two updates are independent; failures are
    /// logged and never reported to the caller.
    pub async fn record_choice(&self, session_id: &str, context: &str, intent: &str, text: &str) {
        let key = WeightKey::new(context, intent, text);
        match self
            .weights
            .bump_and_persist(key, self.settings.choice_delta)
            .await
        {
            Ok(weight) => debug!(%key, weight, "recorded choice weight"),
            Err(error) => warn!(%key, %error, "failed to persist weight store"),
        }

        match self.history.update_last_choice(session_id, text).await {
            Ok(true) => {}
            Ok(false) => debug!(session_id, "no exchange to attach choice to"),
            Err(error) => warn!(session_id, %error, "failed to persist chosen reply"),
        }
    }

    /// Drops a session's history. Unknown sessions are ignored.
    pub async fn clear_history(&self, session_id: &str) {
        match self.history.clear_session(session_id).await {
            Ok(true) => info!(session_id, "cleared session history"),
            Ok(false) => debug!(session_id, "no history to clear"),
            Err(error) => warn!(session_id, %error, "failed to persist cleared history"),
        }
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_owned(),
        None => text.to_owned(),
    }
}
