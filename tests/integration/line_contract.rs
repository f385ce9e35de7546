//! LINE Messaging API contract tests.
//!
//! Verify request paths, auth headers and bodies against a mock server, and
//! that non-2xx responses surface status and body.

use rollcall::channels::{LineMessenger, Messenger};
use rollcall::config::LineConfig;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn messenger(server: &MockServer) -> LineMessenger {
    LineMessenger::new(&LineConfig {
        api_base_url: server.uri(),
        channel_access_token: "test-token".to_owned(),
        request_timeout_secs: 5,
    })
    .unwrap()
}

#[tokio::test]
async fn reply_posts_reply_token_and_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/bot/message/reply"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({
            "replyToken": "reply-U1",
            "messages": [{ "type": "text", "text": "Registered for 2025-09-02." }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    messenger(&server)
        .reply("reply-U1", &["Registered for 2025-09-02.".to_owned()])
        .await
        .unwrap();
}

#[tokio::test]
async fn push_addresses_recipient() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/bot/message/push"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({
            "to": "Uadmin",
            "messages": [
                { "type": "text", "text": "Roster 2025-09-02 (2 participants)" },
                { "type": "text", "text": "user_id\nU1\nU2\n" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    messenger(&server)
        .push(
            "Uadmin",
            &[
                "Roster 2025-09-02 (2 participants)".to_owned(),
                "user_id\nU1\nU2\n".to_owned(),
            ],
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn push_error_carries_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/bot/message/push"))
        .respond_with(
            ResponseTemplate::new(429).set_body_string(r#"{"message":"rate limit"}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = messenger(&server)
        .push("Uadmin", &["hello".to_owned()])
        .await
        .unwrap_err()
        .to_string();

    assert!(err.contains("429"), "{err}");
    assert!(err.contains("rate limit"), "{err}");
}

#[tokio::test]
async fn display_name_reads_profile() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/bot/profile/U1"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "userId": "U1",
            "displayName": "佐藤 花子",
            "language": "ja"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let name = messenger(&server).display_name("U1").await.unwrap();
    assert_eq!(name, "佐藤 花子");
}

#[tokio::test]
async fn unknown_profile_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/bot/profile/Ugone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not found"})))
        .mount(&server)
        .await;

    let err = messenger(&server).display_name("Ugone").await.unwrap_err();
    assert!(err.to_string().contains("404"));
}
