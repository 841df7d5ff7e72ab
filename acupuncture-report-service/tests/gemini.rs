use std::time::Duration;

use acupuncture_report_service::config::GeminiConfig;
use acupuncture_report_service::generation::GeminiClient;
use acupuncture_report_service::{GenerationError, Patient, ReportGenerator, SessionData};
use chrono::NaiveDate;
use mockito::{Matcher, Server};
use serde_json::json;
use tokio::net::TcpListener;

const FIXTURE: &str = include_str!("fixtures/gemini_response.json");
const ENDPOINT: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

fn client(base_url: String, timeout: Duration) -> GeminiClient {
    GeminiClient::new(GeminiConfig {
        api_key: Some("test-key".to_string()),
        base_url,
        timeout,
        ..GeminiConfig::default()
    })
    .unwrap()
}

fn patient() -> Patient {
    Patient {
        name: "Anna Bianchi".to_string(),
        dob: NaiveDate::from_ymd_opt(1985, 2, 3).unwrap(),
        phone: "333 000 1111".to_string(),
    }
}

fn session() -> SessionData {
    SessionData {
        session_number: "2".to_string(),
        main_complaint: "Lombalgia cronica".to_string(),
        tongue: "Rossa, patina gialla".to_string(),
        pulse: "Scivoloso".to_string(),
        tcm_answers: Default::default(),
    }
}

fn envelope(text: &str) -> String {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    })
    .to_string()
}

#[tokio::test]
async fn posts_authenticated_structured_request() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", ENDPOINT)
        .match_header("x-goog-api-key", "test-key")
        .match_header("content-type", "application/json")
        .match_body(Matcher::PartialJson(json!({
            "contents": [{ "role": "user" }],
            "generationConfig": { "responseMimeType": "application/json" }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(envelope(FIXTURE))
        .create_async()
        .await;

    let response = client(server.url(), Duration::from_secs(5))
        .generate(&patient(), 41, &session())
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(response.report_data.needle_retention_time, "30-40 minuti");
    assert_eq!(response.protocol_data.needling_order, vec!["LI4", "LR3"]);
}

#[tokio::test]
async fn prompt_carries_the_intake() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", ENDPOINT)
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("Anna Bianchi".to_string()),
            Matcher::Regex("Lombalgia cronica".to_string()),
        ]))
        .with_status(200)
        .with_body(envelope(FIXTURE))
        .create_async()
        .await;

    client(server.url(), Duration::from_secs(5))
        .generate(&patient(), 41, &session())
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn non_success_status_keeps_status_and_body() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", ENDPOINT)
        .with_status(500)
        .with_body("quota exceeded")
        .create_async()
        .await;

    let result = client(server.url(), Duration::from_secs(5))
        .generate(&patient(), 41, &session())
        .await;

    mock.assert_async().await;
    match result {
        Err(GenerationError::UpstreamStatus { status, body }) => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(body, "quota exceeded");
        }
        other => panic!("expected upstream status error, got {other:?}"),
    }
}

#[tokio::test]
async fn schema_violations_in_the_reply_are_malformed() {
    let mut server = Server::new_async().await;
    let mut payload: serde_json::Value = serde_json::from_str(FIXTURE).unwrap();
    payload["protocolData"]["treatmentPointsDetailed"][0]["stimulation"] = json!("Rapida");
    server
        .mock("POST", ENDPOINT)
        .with_status(200)
        .with_body(envelope(&payload.to_string()))
        .create_async()
        .await;

    let result = client(server.url(), Duration::from_secs(5))
        .generate(&patient(), 41, &session())
        .await;
    assert!(matches!(result, Err(GenerationError::MalformedResponse(_))));
}

#[tokio::test]
async fn silent_upstream_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let held = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(socket);
    });

    let result = client(format!("http://{addr}"), Duration::from_secs(1))
        .generate(&patient(), 41, &session())
        .await;

    assert!(matches!(result, Err(GenerationError::Timeout(1))));
    held.abort();
}
