//! Integration tests for OpenWeatherProvider using wiremock.
//!
//! These tests verify the provider and dashboard against a mock HTTP server.

use std::sync::Arc;

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wxdash_core::WeatherConfig;
use wxdash_weather::{
    CityRecord, Dashboard, MemoryWatchlistStore, OpenWeatherProvider, WatchlistStore,
    WeatherBackend, WeatherError, FETCH_FAILED_MESSAGE, SEARCH_FAILED_MESSAGE,
};

const API_KEY: &str = "test-key";

fn config_for(server: &MockServer) -> WeatherConfig {
    WeatherConfig {
        api_key: Some(API_KEY.to_string()),
        api_base_url: server.uri(),
        ..WeatherConfig::default()
    }
}

fn london() -> CityRecord {
    CityRecord::new("London", "GB", 51.5073, -0.1276)
}

fn current_weather_body(temp: f64, wind: f64) -> serde_json::Value {
    serde_json::json!({
        "coord": { "lon": -0.1276, "lat": 51.5073 },
        "weather": [{ "id": 803, "main": "Clouds", "description": "broken clouds", "icon": "04d" }],
        "main": { "temp": temp, "feels_like": temp - 1.0, "humidity": 81, "pressure": 1012 },
        "wind": { "speed": wind, "deg": 240 },
        "name": "London",
        "cod": 200
    })
}

#[tokio::test]
async fn test_search_cities_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/geo/1.0/direct"))
        .and(query_param("q", "London"))
        .and(query_param("limit", "5"))
        .and(query_param("appid", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "name": "London", "lat": 51.5073, "lon": -0.1276, "country": "GB", "state": "England" },
            { "name": "London", "lat": 42.9834, "lon": -81.233, "country": "CA", "state": "Ontario" }
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = OpenWeatherProvider::new(&config_for(&mock_server)).unwrap();
    let cities = provider.search_cities("London").await.unwrap();

    assert_eq!(cities.len(), 2);
    assert_eq!(cities[0].country, "GB");
    assert_eq!(cities[0].state.as_deref(), Some("England"));
    assert_eq!(cities[1].country, "CA");
    assert_eq!(cities[1].latitude, 42.9834);
}

#[tokio::test]
async fn test_search_cities_empty() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/geo/1.0/direct"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&mock_server)
        .await;

    let provider = OpenWeatherProvider::new(&config_for(&mock_server)).unwrap();
    assert!(provider.search_cities("Zzyzx").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_search_cities_bad_body_is_parse_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/geo/1.0/direct"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&mock_server)
        .await;

    let provider = OpenWeatherProvider::new(&config_for(&mock_server)).unwrap();
    let err = provider.search_cities("London").await.unwrap_err();
    assert!(matches!(err, WeatherError::Parse(_)), "unexpected error: {:?}", err);
}

#[tokio::test]
async fn test_current_weather_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("lat", "51.5073"))
        .and(query_param("lon", "-0.1276"))
        .and(query_param("units", "metric"))
        .and(query_param("appid", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_weather_body(12.6, 5.0)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = OpenWeatherProvider::new(&config_for(&mock_server)).unwrap();
    let record = provider.current_weather(&london()).await.unwrap();

    assert_eq!(record.city, "London");
    assert_eq!(record.country, "GB");
    assert_eq!(record.temperature, 13);
    assert_eq!(record.wind_speed, 18);
    assert_eq!(record.humidity, 81);
    assert_eq!(record.condition, "Clouds");
    assert_eq!(record.description, "broken clouds");
    assert_eq!(record.icon, "04d");
}

#[tokio::test]
async fn test_current_weather_upstream_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "cod": 401,
            "message": "Invalid API key. Please see https://openweathermap.org/faq#error401 for more info."
        })))
        .mount(&mock_server)
        .await;

    let provider = OpenWeatherProvider::new(&config_for(&mock_server)).unwrap();
    let err = provider.current_weather(&london()).await.unwrap_err();

    match &err {
        WeatherError::Upstream { status, message } => {
            assert_eq!(*status, 401);
            assert!(message.starts_with("Invalid API key"));
        }
        other => panic!("expected upstream error, got {:?}", other),
    }
    assert!(err.is_auth_failure());
}

#[tokio::test]
async fn test_current_weather_generic_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&mock_server)
        .await;

    let provider = OpenWeatherProvider::new(&config_for(&mock_server)).unwrap();
    let err = provider.current_weather(&london()).await.unwrap_err();

    assert!(matches!(err, WeatherError::FetchFailed(502)), "unexpected error: {:?}", err);
    assert!(err.to_string().contains("Failed to fetch weather data"));
}

#[tokio::test]
async fn test_missing_api_key_sends_nothing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = WeatherConfig {
        api_key: None,
        ..config_for(&mock_server)
    };
    let provider = OpenWeatherProvider::new(&config).unwrap();

    assert!(matches!(
        provider.search_cities("London").await,
        Err(WeatherError::MissingApiKey)
    ));
    assert!(matches!(
        provider.current_weather(&london()).await,
        Err(WeatherError::MissingApiKey)
    ));
}

#[tokio::test]
async fn test_dashboard_end_to_end() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/geo/1.0/direct"))
        .and(query_param("q", "London"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "name": "London", "lat": 51.5073, "lon": -0.1276, "country": "GB" }
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_weather_body(0.2, 1.0)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(MemoryWatchlistStore::new());
    let provider = OpenWeatherProvider::new(&config_for(&mock_server)).unwrap();
    let dashboard = Dashboard::new(provider, store.clone(), &config_for(&mock_server));

    // Too short: no request at all.
    assert!(dashboard.search("Lo").await.is_empty());

    let found = dashboard.search("London").await;
    assert_eq!(found.len(), 1);

    assert!(dashboard.add_city(found[0].clone()).await);
    let cards = dashboard.cards();
    assert_eq!(cards.len(), 1);
    assert!(cards[0].has_data);
    assert_eq!(cards[0].temperature, 0);
    assert_eq!(cards[0].wind_speed, 4);
    assert_eq!(store.load().unwrap(), vec![london()]);
    assert!(dashboard.snapshot().suggestions.is_empty());
}

#[tokio::test]
async fn test_dashboard_reports_failures_coarsely() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/geo/1.0/direct"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "cod": "404",
            "message": "city not found"
        })))
        .mount(&mock_server)
        .await;

    let provider = OpenWeatherProvider::new(&config_for(&mock_server)).unwrap();
    let dashboard = Dashboard::new(
        provider,
        Arc::new(MemoryWatchlistStore::new()),
        &config_for(&mock_server),
    );

    assert!(dashboard.search("London").await.is_empty());
    assert_eq!(dashboard.error().as_deref(), Some(SEARCH_FAILED_MESSAGE));

    dashboard.dismiss_error();
    dashboard.add_city(london()).await;
    assert_eq!(dashboard.error().as_deref(), Some(FETCH_FAILED_MESSAGE));
    assert!(dashboard.weather(&london().key()).is_none());
    assert!(!dashboard.is_loading(&london().key()));
}
