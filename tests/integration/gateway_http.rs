//! HTTP surface tests against a gateway bound to an ephemeral port.

use crate::helpers::{RecordingMessenger, service_config, text_event};
use chrono::{TimeZone, Utc};
use rollcall::Service;
use rollcall::channels::{Messenger, run_gateway};
use rollcall::config::DeliveryMode;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

struct Running {
    base: String,
    stop: oneshot::Sender<()>,
    task: tokio::task::JoinHandle<anyhow::Result<()>>,
}

async fn start_gateway(service: &Service) -> Running {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(run_gateway(listener, service.gateway_state(), async move {
        let _ = stopped.await;
    }));
    Running { base, stop, task }
}

#[tokio::test]
async fn webhook_registration_is_downloadable_after_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let messenger = Arc::new(RecordingMessenger::default());
    let mut config = service_config(dir.path(), DeliveryMode::Link);
    config.export.enrich_display_names = false;
    let service =
        Service::with_messenger(config, Arc::clone(&messenger) as Arc<dyn Messenger>).unwrap();
    let running = start_gateway(&service).await;
    let client = reqwest::Client::new();

    let ack: Value = client
        .post(format!("{}/webhook", running.base))
        .json(&json!({
            "destination": "Ubot",
            "events": [text_event("U1", "2025-09-02"), text_event("U2", "2025-09-02")]
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ack["received"], 2);
    assert_eq!(ack["registered"], 2);

    let health: Value = client
        .get(format!("{}/health", running.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["dates"], 1);
    assert_eq!(health["participants"], 2);
    assert_eq!(health["scheduler"]["state"], "idle");

    // Monday 2025-09-08 09:00 Asia/Tokyo.
    let now = Utc.with_ymd_and_hms(2025, 9, 8, 0, 0, 0).unwrap();
    service
        .scheduler()
        .run_cycle(now, &CancellationToken::new())
        .await;

    let response = client
        .get(format!("{}/download/roster_2025-09-02.csv", running.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "text/csv; charset=utf-8"
    );
    assert_eq!(response.text().await.unwrap(), "user_id\r\nU1\r\nU2\r\n");

    let health: Value = client
        .get(format!("{}/health", running.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["dates"], 0);
    assert_eq!(health["scheduler"]["last_cycle"]["dates"][0]["rows"], 2);

    running.stop.send(()).unwrap();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn verification_ping_and_bad_downloads() {
    let dir = tempfile::tempdir().unwrap();
    let service = Service::with_messenger(
        service_config(dir.path(), DeliveryMode::Link),
        Arc::new(RecordingMessenger::default()),
    )
    .unwrap();
    let running = start_gateway(&service).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/webhook", running.base))
        .json(&json!({ "destination": "Ubot", "events": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let ack: Value = response.json().await.unwrap();
    assert_eq!(ack["received"], 0);

    for name in ["roster_2099-01-01.csv", "..%2Fsecret", ".hidden"] {
        let response = client
            .get(format!("{}/download/{name}", running.base))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND, "{name}");
    }

    running.stop.send(()).unwrap();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn serve_shuts_down_and_stops_scheduler() {
    let dir = tempfile::tempdir().unwrap();
    let service = Service::with_messenger(
        service_config(dir.path(), DeliveryMode::Inline),
        Arc::new(RecordingMessenger::default()),
    )
    .unwrap();
    let status = service.scheduler().status();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let (stop, stopped) = oneshot::channel::<()>();

    let task = tokio::spawn(service.serve(listener, async move {
        let _ = stopped.await;
    }));

    let health: Value = reqwest::get(format!("{base}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert!(status.snapshot().next_run.is_some());

    stop.send(()).unwrap();
    tokio::time::timeout(std::time::Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(status.snapshot().next_run, None);
}
