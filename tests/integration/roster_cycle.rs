//! End-to-end roster behavior: intake through the weekly cycle.

use crate::helpers::{RecordingMessenger, service_config, text_event};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rollcall::Service;
use rollcall::channels::Messenger;
use rollcall::config::DeliveryMode;
use rollcall::roster::{AttendanceDate, ParticipantId, RosterKey, RosterStore};
use serde_json::json;
use std::sync::{Arc, Mutex, OnceLock};
use tokio_util::sync::CancellationToken;

fn sept(day: u32) -> RosterKey {
    RosterKey::Date(AttendanceDate::from_ymd(2025, 9, day).unwrap())
}

fn june_15() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
}

/// Monday 2025-09-08 09:00 Asia/Tokyo.
fn cycle_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 8, 0, 0, 0).unwrap()
}

#[tokio::test]
async fn two_participants_are_exported_notified_and_evicted() {
    let dir = tempfile::tempdir().unwrap();
    let messenger = Arc::new(RecordingMessenger::with_names(&[
        ("U1", "Aiko"),
        ("U2", "Ken"),
    ]));
    let service = Service::with_messenger(
        service_config(dir.path(), DeliveryMode::Link),
        Arc::clone(&messenger) as Arc<dyn Messenger>,
    )
    .unwrap();

    service
        .intake()
        .handle_batch_on(&[text_event("U1", "2025-09-02")], june_15())
        .await;
    service
        .intake()
        .handle_batch_on(&[text_event("U2", "2025-09-02")], june_15())
        .await;

    let entries = service.store().entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].key, sept(2));
    assert_eq!(
        entries[0].participants,
        vec![ParticipantId::from("U1"), ParticipantId::from("U2")]
    );

    let report = service
        .scheduler()
        .run_cycle(cycle_time(), &CancellationToken::new())
        .await;

    assert_eq!(report.dates.len(), 1);
    assert_eq!(report.dates[0].rows, 2);
    assert!(report.dates[0].delivered);
    assert!(report.dates[0].evicted);
    assert!(service.store().entries().is_empty());

    let pushes = messenger.pushes();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].0, "Uadmin");
    assert_eq!(
        pushes[0].1,
        vec![
            "Roster 2025-09-02 (2 participants): \
             https://bot.example.com/download/roster_2025-09-02.csv"
                .to_owned()
        ]
    );

    let csv = std::fs::read_to_string(dir.path().join("roster_2025-09-02.csv")).unwrap();
    assert_eq!(csv, "user_id,display_name\r\nU1,Aiko\r\nU2,Ken\r\n");
}

#[tokio::test]
async fn future_dates_survive_the_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let messenger = Arc::new(RecordingMessenger::default());
    let service = Service::with_messenger(
        service_config(dir.path(), DeliveryMode::Inline),
        Arc::clone(&messenger) as Arc<dyn Messenger>,
    )
    .unwrap();
    service.store().register(sept(2), "U1".into());
    service.store().register(sept(8), "U2".into());
    service.store().register(sept(30), "U3".into());

    let report = service
        .scheduler()
        .run_cycle(cycle_time(), &CancellationToken::new())
        .await;

    // Every key is exported; only the one strictly before today is evicted.
    assert_eq!(messenger.pushes().len(), 3);
    let evicted: Vec<bool> = report.dates.iter().map(|d| d.evicted).collect();
    assert_eq!(evicted, vec![true, false, false]);
    let keys: Vec<RosterKey> = service
        .store()
        .entries()
        .into_iter()
        .map(|e| e.key)
        .collect();
    assert_eq!(keys, vec![sept(8), sept(30)]);
}

#[tokio::test]
async fn one_failed_delivery_does_not_block_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let messenger = Arc::new(RecordingMessenger {
        fail_pushes_containing: vec!["2025-09-01".to_owned()],
        ..RecordingMessenger::default()
    });
    let service = Service::with_messenger(
        service_config(dir.path(), DeliveryMode::Inline),
        Arc::clone(&messenger) as Arc<dyn Messenger>,
    )
    .unwrap();
    service.store().register(sept(1), "U1".into());
    service.store().register(sept(2), "U2".into());

    let report = service
        .scheduler()
        .run_cycle(cycle_time(), &CancellationToken::new())
        .await;

    assert_eq!(report.failures(), 1);
    assert_eq!(messenger.pushes().len(), 2);
    // The failed key still counts as attempted and is evicted.
    assert!(report.dates.iter().all(|d| d.evicted));
    assert!(service.store().is_empty());
}

/// Records whether the roster still held the pushed key at push time.
struct OrderingProbe {
    store: OnceLock<Arc<RosterStore>>,
    present_at_push: Mutex<Vec<bool>>,
}

#[async_trait]
impl Messenger for OrderingProbe {
    fn id(&self) -> &'static str {
        "probe"
    }

    async fn reply(&self, _reply_token: &str, _texts: &[String]) -> anyhow::Result<()> {
        Ok(())
    }

    async fn push(&self, _to: &str, _texts: &[String]) -> anyhow::Result<()> {
        let present = self
            .store
            .get()
            .is_some_and(|store| store.get(&sept(2)).is_some());
        self.present_at_push.lock().unwrap().push(present);
        anyhow::bail!("delivery fails after observing the roster")
    }

    async fn display_name(&self, _user_id: &str) -> anyhow::Result<String> {
        Ok(String::new())
    }
}

#[tokio::test]
async fn eviction_never_precedes_notification() {
    let dir = tempfile::tempdir().unwrap();
    let probe = Arc::new(OrderingProbe {
        store: OnceLock::new(),
        present_at_push: Mutex::new(Vec::new()),
    });
    let service = Service::with_messenger(
        service_config(dir.path(), DeliveryMode::Inline),
        Arc::clone(&probe) as Arc<dyn Messenger>,
    )
    .unwrap();
    assert!(probe.store.set(Arc::clone(service.store())).is_ok());
    service.store().register(sept(2), "U1".into());

    service
        .scheduler()
        .run_cycle(cycle_time(), &CancellationToken::new())
        .await;

    assert_eq!(*probe.present_at_push.lock().unwrap(), vec![true]);
    assert!(service.store().is_empty());
}

#[tokio::test]
async fn malformed_and_unknown_events_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let messenger = Arc::new(RecordingMessenger::default());
    let service = Service::with_messenger(
        service_config(dir.path(), DeliveryMode::Link),
        Arc::clone(&messenger) as Arc<dyn Messenger>,
    )
    .unwrap();

    let batch = vec![
        json!({ "type": "message", "message": 5 }),
        json!({ "type": "follow", "source": { "type": "user", "userId": "U9" } }),
        text_event("U1", "９月２日"),
        text_event("U2", "来週かな"),
        text_event("U1", "2025/9/2"),
    ];
    let report = service.intake().handle_batch_on(&batch, june_15()).await;

    assert_eq!(report.received, 5);
    assert_eq!(report.malformed, 1);
    assert_eq!(report.registered, 2);
    assert_eq!(
        service.store().get(&sept(2)).unwrap().participants,
        vec![ParticipantId::from("U1")]
    );
    assert_eq!(
        messenger.reply_texts(),
        vec![
            "Registered for 2025-09-02.".to_owned(),
            rollcall::reducer::USAGE_HINT.to_owned(),
            "Registered for 2025-09-02.".to_owned(),
        ]
    );
}

#[tokio::test]
async fn opaque_buckets_get_their_own_downloads() {
    let dir = tempfile::tempdir().unwrap();
    let messenger = Arc::new(RecordingMessenger::default());
    let mut config = service_config(dir.path(), DeliveryMode::Link);
    config.export.enrich_display_names = false;
    let service =
        Service::with_messenger(config, Arc::clone(&messenger) as Arc<dyn Messenger>).unwrap();
    service
        .store()
        .register(RosterKey::Opaque("来週".to_owned()), "U1".into());
    service
        .store()
        .register(RosterKey::Opaque("再来".to_owned()), "U2".into());

    let report = service
        .scheduler()
        .run_cycle(cycle_time(), &CancellationToken::new())
        .await;
    assert_eq!(report.failures(), 0);

    let urls: Vec<String> = messenger
        .pushes()
        .into_iter()
        .map(|(_, texts)| {
            let (_, url) = texts[0].rsplit_once(' ').unwrap();
            url.to_owned()
        })
        .collect();
    assert_eq!(urls.len(), 2);
    assert_ne!(urls[0], urls[1]);

    let mut contents: Vec<String> = urls
        .iter()
        .map(|url| {
            let (_, name) = url.rsplit_once('/').unwrap();
            std::fs::read_to_string(dir.path().join(name)).unwrap()
        })
        .collect();
    contents.sort();
    assert_eq!(contents, vec!["user_id\r\nU1\r\n", "user_id\r\nU2\r\n"]);
}
