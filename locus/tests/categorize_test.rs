use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use locus::cache::CacheService;
use locus::categorize::Categorizer;
use locus::config::LlmConfig;
use locus::llm::LlmProvider;
use locus::models::AmenitySummary;

fn llm_config(base_url: String) -> LlmConfig {
    LlmConfig {
        model: "openai/gpt-4o-mini".to_string(),
        api_key: Some("test-key".to_string()),
        base_url: Some(base_url),
        timeout_secs: 5,
        max_retries: 0,
    }
}

fn categorizer(server: &MockServer) -> Categorizer {
    let provider = LlmProvider::new(Some(&llm_config(server.uri()))).unwrap();
    Categorizer::new(provider, CacheService::in_memory())
}

fn completion_body(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "created": 1,
        "model": "gpt-4o-mini",
        "choices": [
            {
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": content
                },
                "finish_reason": "stop"
            }
        ],
        "usage": {
            "prompt_tokens": 1,
            "completion_tokens": 1,
            "total_tokens": 2
        }
    })
}

fn amenity(name: &str, amenity_type: &str) -> AmenitySummary {
    AmenitySummary {
        name: name.to_string(),
        amenity_type: amenity_type.to_string(),
    }
}

#[tokio::test]
async fn llm_mapping_is_attached_to_the_callers_amenities() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
            r#"{"Dining": ["Starbucks"], "Healthcare": ["El Camino Hospital"]}"#,
        )))
        .mount(&server)
        .await;

    let input = vec![
        amenity("Starbucks", "amenity:cafe"),
        amenity("El Camino Hospital", "amenity:hospital"),
    ];
    let categorized = categorizer(&server).categorize(&input).await;

    assert_eq!(categorized.len(), 2);
    assert_eq!(categorized["Dining"], vec![input[0].clone()]);
    assert_eq!(categorized["Healthcare"], vec![input[1].clone()]);
}

#[tokio::test]
async fn fenced_json_is_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
            "```json\n{\"Dining\": [\"Starbucks\"]}\n```",
        )))
        .mount(&server)
        .await;

    let input = vec![amenity("Starbucks", "amenity:cafe")];
    let categorized = categorizer(&server).categorize(&input).await;
    assert_eq!(categorized["Dining"].len(), 1);
}

#[tokio::test]
async fn invented_names_are_dropped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
            r#"{"Dining": ["Cafe X", "Nonexistent Place"]}"#,
        )))
        .mount(&server)
        .await;

    let input = vec![amenity("Cafe X", "amenity:cafe")];
    let categorized = categorizer(&server).categorize(&input).await;
    assert_eq!(categorized["Dining"].len(), 1);
    assert_eq!(categorized["Dining"][0].name, "Cafe X");
}

#[tokio::test]
async fn llm_failure_falls_back_to_rules() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream failure"))
        .mount(&server)
        .await;

    let input = vec![
        amenity("Starbucks", "amenity:cafe"),
        amenity("Chase", "amenity:bank"),
    ];
    let categorized = categorizer(&server).categorize(&input).await;

    assert_eq!(categorized["Dining"], vec![input[0].clone()]);
    assert_eq!(categorized["Banking"], vec![input[1].clone()]);
}

#[tokio::test]
async fn unparseable_response_falls_back_to_rules() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
            "Sure! I'd be happy to categorize these for you.",
        )))
        .mount(&server)
        .await;

    let input = vec![amenity("Starbucks", "amenity:cafe")];
    let categorized = categorizer(&server).categorize(&input).await;
    assert_eq!(categorized["Dining"].len(), 1);
}

#[tokio::test]
async fn successful_categorization_is_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
            r#"{"Dining": ["Starbucks"]}"#,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let categorizer = categorizer(&server);
    let input = vec![amenity("Starbucks", "amenity:cafe")];
    let first = categorizer.categorize(&input).await;
    let second = categorizer.categorize(&input).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn empty_input_short_circuits_without_calling_the_llm() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("{}")))
        .expect(0)
        .mount(&server)
        .await;

    let categorized = categorizer(&server).categorize(&[]).await;
    assert!(categorized.is_empty());
}

#[tokio::test]
async fn oversized_input_uses_batched_rules_without_calling_the_llm() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("{}")))
        .expect(0)
        .mount(&server)
        .await;

    let input: Vec<AmenitySummary> = (0..1001)
        .map(|i| amenity(&format!("Cafe {i}"), "amenity:cafe"))
        .collect();
    let categorizer = categorizer(&server);
    let categorized = categorizer.categorize(&input).await;
    assert_eq!(categorized["Dining"].len(), 1001);

    // The batch path never writes the cache; a repeat run takes the same
    // rule-based route and still makes no completion calls.
    let repeat = categorizer.categorize(&input).await;
    assert_eq!(repeat, categorized);
}
