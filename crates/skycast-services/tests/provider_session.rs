//! End-to-end tests: SessionService + WeatherProvider against a wiremock server.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use skycast_forecast::{EngineConfig, ForecastEngine};
use skycast_services::{SessionController, SessionHandle, SessionService, SessionState, SessionView};
use skycast_weather::WeatherProvider;

fn weather_body(name: &str, temp: f64, humidity: f64) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "weather": [{ "description": "clear sky" }],
        "main": { "temp": temp, "humidity": humidity, "pressure": 1018 }
    })
}

fn start(server: &MockServer, api_key: Option<&str>) -> SessionHandle {
    let provider = WeatherProvider::new(
        format!("{}/data/2.5/weather", server.uri()),
        api_key.map(str::to_string),
        None,
    )
    .unwrap();
    let controller = SessionController::new(ForecastEngine::new(EngineConfig::default()), 50)
        .with_credential(provider.has_credential());
    SessionService::new(controller, Arc::new(provider)).spawn()
}

async fn wait_until(
    rx: &mut watch::Receiver<SessionView>,
    pred: impl FnMut(&SessionView) -> bool,
) -> SessionView {
    let view = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
        .await
        .expect("timed out")
        .expect("service stopped");
    view.clone()
}

#[tokio::test]
async fn test_missing_credential_makes_no_request() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(weather_body("London", 1.0, 1.0)))
        .expect(0)
        .mount(&mock_server)
        .await;

    let handle = start(&mock_server, None);
    let mut rx = handle.subscribe();
    handle.set_city("London").unwrap();

    // The first published view is already the failure
    let view = wait_until(&mut rx, |v| v.state != SessionState::Idle).await;
    assert_eq!(view.state, SessionState::Failed);
    let message = view.error_message.unwrap();
    assert!(message.contains("API key"), "{message}");
    assert!(view.buffer.is_empty());

    handle.shutdown().await;
}

#[tokio::test]
async fn test_server_error_maps_to_generic_message() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let handle = start(&mock_server, Some("secret"));
    let mut rx = handle.subscribe();
    handle.set_city("Dublin").unwrap();

    let view = wait_until(&mut rx, |v| v.state == SessionState::Failed).await;
    assert_eq!(
        view.error_message.as_deref(),
        Some("Unable to load live weather. Please try again.")
    );
    assert!(!view.prediction.is_available());

    handle.shutdown().await;
}

#[tokio::test]
async fn test_ten_fetches_produce_forecast() {
    let mock_server = MockServer::start().await;
    // Earlier mocks win until exhausted, so each call gets the next temperature
    for i in 0..10 {
        Mock::given(method("GET"))
            .and(query_param("q", "London"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(weather_body("London", 10.0 + f64::from(i), 65.0)),
            )
            .up_to_n_times(1)
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let handle = start(&mock_server, Some("secret"));
    let mut rx = handle.subscribe();
    handle.set_city("London").unwrap();

    for len in 1..=10 {
        let view = wait_until(&mut rx, |v| {
            v.state == SessionState::Ready && v.buffer.len() == len
        })
        .await;
        if len < 10 {
            assert!(!view.prediction.is_available());
            handle.refresh().unwrap();
        }
    }

    let view = handle.view();
    assert_eq!(view.buffer.len(), 10);
    let next = view.prediction.next_temperature.unwrap();
    assert!((next - 20.0).abs() < 0.2, "got {next}");
    assert!((view.prediction.next_humidity.unwrap() - 65.0).abs() < 0.65);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_slow_paris_does_not_touch_tokyo() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("q", "Paris"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(weather_body("Paris", 18.0, 55.0))
                .set_delay(Duration::from_millis(400)),
        )
        // Skipped entirely if Tokyo supersedes it before the request goes out
        .expect(0..=1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("q", "Tokyo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(weather_body("Tokyo", 27.0, 70.0)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let handle = start(&mock_server, Some("secret"));
    let mut rx = handle.subscribe();

    handle.set_city("Paris").unwrap();
    wait_until(&mut rx, |v| v.city.as_deref() == Some("Paris")).await;
    handle.set_city("Tokyo").unwrap();

    let tokyo = wait_until(&mut rx, |v| {
        v.city.as_deref() == Some("Tokyo") && v.state == SessionState::Ready
    })
    .await;

    // Outlast the delayed Paris response
    tokio::time::sleep(Duration::from_millis(700)).await;

    let view = handle.view();
    assert_eq!(view, tokyo);
    assert_eq!(view.buffer.len(), 1);
    assert_eq!(view.buffer[0].temperature, 27.0);

    handle.shutdown().await;
}
