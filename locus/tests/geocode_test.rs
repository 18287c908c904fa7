use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use locus::cache::CacheService;
use locus::config::GeocodingConfig;
use locus::geocode::Geocoder;

fn geocoding_config(base_url: String) -> GeocodingConfig {
    GeocodingConfig {
        base_url,
        user_agent: "locus-tests/0.1".to_string(),
        country_codes: "us".to_string(),
        request_spacing_ms: 0,
        timeout_secs: 5,
    }
}

fn geocoder(server: &MockServer) -> Geocoder {
    let config = geocoding_config(format!("{}/search", server.uri()));
    Geocoder::new(&config, CacheService::in_memory()).unwrap()
}

fn nominatim_body() -> serde_json::Value {
    json!([
        {
            "lat": "37.4224428",
            "lon": "-122.0842467",
            "display_name": "Google Building 40, 1600 Amphitheatre Parkway, Mountain View, CA"
        }
    ])
}

#[tokio::test]
async fn geocodes_an_address_parsing_string_coordinates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "1600 Amphitheatre Parkway, Mountain View, CA"))
        .and(query_param("format", "json"))
        .and(query_param("countrycodes", "us"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(nominatim_body()))
        .mount(&server)
        .await;

    let coordinates = geocoder(&server)
        .geocode("1600 Amphitheatre Parkway, Mountain View, CA")
        .await
        .expect("address should geocode");

    assert!((coordinates.latitude - 37.4224428).abs() < 1e-9);
    assert!((coordinates.longitude - (-122.0842467)).abs() < 1e-9);
    assert!(coordinates.address.contains("Mountain View"));
}

#[tokio::test]
async fn unknown_address_yields_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = geocoder(&server).geocode("nowhere at all").await;
    assert!(result.is_none());
}

#[tokio::test]
async fn malformed_response_yields_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let result = geocoder(&server).geocode("123 Main St").await;
    assert!(result.is_none());
}

#[tokio::test]
async fn unparseable_coordinate_strings_yield_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"lat": "not-a-number", "lon": "-122.08", "display_name": "Somewhere"}
        ])))
        .mount(&server)
        .await;

    let result = geocoder(&server).geocode("123 Main St").await;
    assert!(result.is_none());
}

#[tokio::test]
async fn provider_error_yields_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let result = geocoder(&server).geocode("123 Main St").await;
    assert!(result.is_none());
}

#[tokio::test]
async fn request_spacing_is_paid_after_every_outbound_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let mut config = geocoding_config(format!("{}/search", server.uri()));
    config.request_spacing_ms = 150;
    let geocoder = Geocoder::new(&config, CacheService::in_memory()).unwrap();

    // The delay applies even when the provider returns no results.
    let started = std::time::Instant::now();
    let result = geocoder.geocode("nowhere at all").await;
    assert!(result.is_none());
    assert!(
        started.elapsed() >= std::time::Duration::from_millis(150),
        "lookup returned after {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn repeated_lookups_hit_the_provider_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(nominatim_body()))
        .expect(1)
        .mount(&server)
        .await;

    let geocoder = geocoder(&server);
    let first = geocoder.geocode("1600 Amphitheatre Parkway").await.unwrap();
    let second = geocoder.geocode("1600 Amphitheatre Parkway").await.unwrap();
    assert_eq!(first, second);
}
