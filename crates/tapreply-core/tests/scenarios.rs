use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tapreply_core::*;
use tapreply_memory::{HistoryStore, WeightKey, WeightStore};
use tapreply_provider::AnthropicProvider;
use tapreply_schema::{Intent, SuggestRequest};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct FixedGenerator(Vec<String>);

#[async_trait]
impl ReplyGenerator for FixedGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> GeneratorOutcome {
        GeneratorOutcome::Candidates(self.0.clone())
    }
}

struct Fixture {
    _tmp: TempDir,
    weights: Arc<WeightStore>,
    history: Arc<HistoryStore>,
}

impl Fixture {
    fn new() -> Self {
        let tmp = TempDir::new().expect("tempdir");
        let weights = Arc::new(WeightStore::new(tmp.path().join("weights.json")));
        let history = Arc::new(HistoryStore::new(tmp.path().join("history.json"), 20));
        Self {
            _tmp: tmp,
            weights,
            history,
        }
    }

    fn engine(&self, generator: Arc<dyn ReplyGenerator>, settings: SuggestionConfig) -> SuggestionEngine {
        SuggestionEngine::new(self.weights.clone(), self.history.clone(), generator, settings)
    }
}

fn anthropic_body(text: &str) -> serde_json::Value {
    serde_json::json!({
        "content": [{"type": "text", "text": text}],
        "usage": {"input_tokens": 20, "output_tokens": 30},
        "stop_reason": "end_turn"
    })
}

#[tokio::test]
async fn scenario_a_station_question_falls_back_to_directions_bank() {
    for settings in [SuggestionConfig::default(), SuggestionConfig::history_aware()] {
        let fixture = Fixture::new();
        let engine = fixture.engine(
            Arc::new(UnavailableGenerator::new("no credential")),
            settings,
        );

        let suggestions = engine
            .suggest(&SuggestRequest::new("s-a", "Where is the station?").with_context("generic"))
            .await;

        let expected = phrase_bank::phrases(Intent::Directions);
        assert_eq!(suggestions.len(), expected.len());
        for (i, (suggestion, phrase)) in suggestions.iter().zip(expected).enumerate() {
            assert_eq!(suggestion.text, *phrase);
            assert_eq!(suggestion.intent, Intent::Directions);
            assert_eq!(suggestion.score, 1.0);
            assert_eq!(suggestion.id, format!("generic:directions:{i}"));
        }
    }
}

#[tokio::test]
async fn scenario_b_learned_reply_rises_to_the_top() {
    let fixture = Fixture::new();
    for _ in 0..3 {
        fixture
            .weights
            .bump(WeightKey::new("medical", "emergency", "I need a doctor."), 1)
            .await;
    }

    let candidates: Vec<String> = [
        "Please call an ambulance.",
        "I am in pain.",
        "I need a doctor.",
        "Where is the hospital?",
        "I have allergies.",
        "Thank you for helping.",
    ]
    .map(String::from)
    .to_vec();
    let engine = fixture.engine(
        Arc::new(FixedGenerator(candidates.clone())),
        SuggestionConfig::default(),
    );

    let ranking = engine
        .rank("s-b", "Do you need a doctor? This is an emergency.", "medical")
        .await;

    assert_eq!(ranking.intent, Intent::Emergency);
    assert_eq!(ranking.source, CandidateSource::Generator);
    assert_eq!(ranking.candidates[0].text, "I need a doctor.");
    assert!((ranking.candidates[0].score - 1.9).abs() < 1e-9);

    let rest: Vec<&str> = ranking.candidates[1..].iter().map(|c| c.text.as_str()).collect();
    let expected_rest: Vec<&str> = candidates
        .iter()
        .map(String::as_str)
        .filter(|c| *c != "I need a doctor.")
        .collect();
    assert_eq!(rest, expected_rest);
    assert!(ranking.candidates[1..].iter().all(|c| c.score == 1.0));
}

#[tokio::test]
async fn scenario_c_choice_without_prior_suggest() {
    let fixture = Fixture::new();
    let engine = fixture.engine(
        Arc::new(UnavailableGenerator::new("no credential")),
        SuggestionConfig::default(),
    );

    engine
        .record_choice("fresh-session", "generic", "clarify", "Please repeat.")
        .await;

    assert_eq!(fixture.history.session_count().await, 0);
    assert_eq!(
        fixture
            .weights
            .get_weight(WeightKey::new("generic", "clarify", "Please repeat."))
            .await,
        1
    );
}

#[tokio::test]
async fn choice_survives_restart() {
    let tmp = TempDir::new().expect("tempdir");
    let mut config = AppConfig::default();
    config.provider.api_key_env = "TAPREPLY_SCENARIO_KEY_NEVER_SET".into();
    {
        let engine = build_engine(tmp.path(), &config).await.expect("engine");
        engine.suggest(&SuggestRequest::new("s1", "Hello")).await;
        engine
            .record_choice("s1", "generic", "generic", "Please repeat.")
            .await;
    }

    let engine = build_engine(tmp.path(), &config).await.expect("engine");
    let suggestions = engine.suggest(&SuggestRequest::new("s1", "Good morning")).await;
    assert_eq!(suggestions[0].text, "Please repeat.");
    assert!((suggestions[0].score - 1.3).abs() < 1e-9);
    assert_eq!(suggestions[1].text, "Yes.");

    let session = engine.history().session("s1").await.expect("session");
    assert_eq!(session.exchanges.len(), 2);
    assert_eq!(session.exchanges[0].chosen_reply.as_deref(), Some("Please repeat."));
}

#[tokio::test]
async fn anthropic_backed_generator_feeds_ranking() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(anthropic_body(
            "1. Cash or card?\n2. How much is it?\n3. I will pay by card.\n4. Can I get a receipt?\n5. Is there a discount?\n6. Thank you.\n7. Extra line.",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let fixture = Fixture::new();
    fixture
        .weights
        .bump(WeightKey::new("shop", "payment", "Thank you."), 2)
        .await;

    let provider = Arc::new(AnthropicProvider::new("test-key", server.uri()));
    let generator = LlmReplyGenerator::new(provider, "claude-3-haiku-20240307");
    let engine = fixture.engine(Arc::new(generator), SuggestionConfig::default());

    let ranking = engine.rank("s1", "What is the price?", "shop").await;
    assert_eq!(ranking.intent, Intent::Payment);
    assert_eq!(ranking.source, CandidateSource::Generator);
    let texts: Vec<&str> = ranking.candidates.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "Thank you.",
            "Cash or card?",
            "How much is it?",
            "I will pay by card.",
            "Can I get a receipt?",
            "Is there a discount?",
        ]
    );
}

#[tokio::test]
async fn anthropic_short_output_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(anthropic_body("Yes.\nNo.")))
        .mount(&server)
        .await;

    let fixture = Fixture::new();
    let provider = Arc::new(AnthropicProvider::new("test-key", server.uri()));
    let engine = fixture.engine(
        Arc::new(LlmReplyGenerator::new(provider, "m")),
        SuggestionConfig::default(),
    );

    let ranking = engine.rank("s1", "Can you repeat that?", "generic").await;
    assert_eq!(ranking.source, CandidateSource::PhraseBank);
    assert_eq!(ranking.intent, Intent::Clarify);
    assert_eq!(ranking.candidates[0].text, "Sorry, can you rephrase?");
}

#[tokio::test]
async fn anthropic_error_and_timeout_fall_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let fixture = Fixture::new();
    let provider = Arc::new(AnthropicProvider::new("test-key", server.uri()));
    let engine = fixture.engine(
        Arc::new(LlmReplyGenerator::new(provider, "m")),
        SuggestionConfig::default(),
    );
    let ranking = engine.rank("s1", "Hello", "generic").await;
    assert_eq!(ranking.source, CandidateSource::PhraseBank);

    let slow = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(anthropic_body("a\nb\nc\nd\ne\nf"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&slow)
        .await;

    let provider = Arc::new(AnthropicProvider::new("test-key", slow.uri()));
    let engine = fixture.engine(
        Arc::new(LlmReplyGenerator::new(provider, "m").with_timeout(Duration::from_millis(200))),
        SuggestionConfig::default(),
    );
    let ranking = engine.rank("s1", "Hello", "generic").await;
    assert_eq!(ranking.source, CandidateSource::PhraseBank);
    assert_eq!(ranking.candidates.len(), 6);
}
