use super::*;
use crate::config::DoorsnapConfig;
use crate::error::TransportError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

fn sample_media() -> MediaPayload {
    MediaPayload::jpeg(
        "photo_20240101_120000_000_deadbeef.jpeg".to_string(),
        vec![0xFF, 0xD8, 0xFF, 0xD9],
        Some("periodic#1".to_string()),
    )
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_send_refused_before_ready() {
    let mock = Arc::new(MockTransport::with_auto_ready(false));
    let adapter = TransportAdapter::new(mock.clone());
    adapter.start().await.unwrap();

    let result = adapter.send_media(&Recipient::new("42"), &sample_media()).await;
    assert!(matches!(result, Err(TransportError::NotReady)));
    assert!(mock.media().is_empty());

    adapter.stop().await.unwrap();
}

#[tokio::test]
async fn test_ready_hooks_fire_once() {
    let mock = Arc::new(MockTransport::with_auto_ready(false));
    let adapter = TransportAdapter::new(mock.clone());
    let fired = Arc::new(AtomicUsize::new(0));

    let counter = fired.clone();
    adapter.on_ready(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    adapter.start().await.unwrap();

    mock.emit(TransportEvent::Ready).await;
    mock.emit(TransportEvent::Ready).await;
    adapter.wait_ready(Duration::from_secs(1)).await.unwrap();
    settle().await;

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(adapter.is_ready());

    // Registered after readiness: runs immediately
    let counter = fired.clone();
    adapter.on_ready(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(fired.load(Ordering::SeqCst), 2);

    adapter.stop().await.unwrap();
    assert!(mock.is_stopped());
}

#[tokio::test]
async fn test_wait_ready_times_out() {
    let mock = Arc::new(MockTransport::with_auto_ready(false));
    let adapter = TransportAdapter::new(mock);
    adapter.start().await.unwrap();

    let result = adapter.wait_ready(Duration::from_millis(50)).await;
    assert!(matches!(result, Err(TransportError::Startup(_))));
    adapter.stop().await.unwrap();
}

#[tokio::test]
async fn test_wait_ready_returns_once_ready_arrives() {
    let mock = Arc::new(MockTransport::with_auto_ready(false));
    let adapter = Arc::new(TransportAdapter::new(mock.clone()));
    adapter.start().await.unwrap();

    let waiter = {
        let adapter = adapter.clone();
        tokio::spawn(async move { adapter.wait_ready(Duration::from_secs(5)).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());

    mock.emit(TransportEvent::Ready).await;
    waiter.await.unwrap().unwrap();
    assert!(adapter.is_ready());

    // Already ready: returns without waiting
    adapter.wait_ready(Duration::from_millis(1)).await.unwrap();
    adapter.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_ready_hooks_registered_during_ready_all_fire() {
    const HOOKS: usize = 200;

    let mock = Arc::new(MockTransport::with_auto_ready(false));
    let adapter = Arc::new(TransportAdapter::new(mock.clone()));
    adapter.start().await.unwrap();
    let fired = Arc::new(AtomicUsize::new(0));

    let registrar = {
        let adapter = adapter.clone();
        let fired = fired.clone();
        tokio::spawn(async move {
            for _ in 0..HOOKS {
                let counter = fired.clone();
                adapter.on_ready(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                });
                tokio::task::yield_now().await;
            }
        })
    };
    mock.emit(TransportEvent::Ready).await;
    registrar.await.unwrap();
    adapter.wait_ready(Duration::from_secs(1)).await.unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while fired.load(Ordering::SeqCst) < HOOKS && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(fired.load(Ordering::SeqCst), HOOKS);

    adapter.stop().await.unwrap();
}

#[tokio::test]
async fn test_pairing_challenge_and_inbound_messages_dispatched() {
    let mock = Arc::new(MockTransport::new());
    let adapter = TransportAdapter::new(mock.clone());

    let challenges = Arc::new(Mutex::new(Vec::new()));
    let sink = challenges.clone();
    adapter.on_pairing_challenge(move |data| sink.lock().push(data.to_string()));

    let messages = Arc::new(Mutex::new(Vec::new()));
    let sink = messages.clone();
    adapter.on_inbound_message(move |message| sink.lock().push(message));

    adapter.start().await.unwrap();
    adapter.wait_ready(Duration::from_secs(1)).await.unwrap();

    mock.emit(TransportEvent::PairingChallenge("https://t.me/door_bot".to_string()))
        .await;
    mock.emit_message("CAM", "1234").await;
    settle().await;

    assert_eq!(challenges.lock().as_slice(), ["https://t.me/door_bot"]);
    let received = messages.lock().clone();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].text, "CAM");
    assert_eq!(received[0].sender, Recipient::new("1234"));

    adapter.stop().await.unwrap();
}

#[tokio::test]
async fn test_send_after_ready_reaches_transport() {
    let mock = Arc::new(MockTransport::new());
    let adapter = TransportAdapter::new(mock.clone());
    adapter.start().await.unwrap();
    adapter.wait_ready(Duration::from_secs(1)).await.unwrap();

    let recipient = Recipient::new("42");
    adapter.send_media(&recipient, &sample_media()).await.unwrap();
    adapter.send_text(&recipient, "hello").await.unwrap();

    assert_eq!(mock.media().len(), 1);
    assert_eq!(mock.texts(), vec![(recipient, "hello".to_string())]);
    adapter.stop().await.unwrap();
}

#[tokio::test]
async fn test_outbox_writes_photo_and_sidecar() {
    let dir = TempDir::new().unwrap();
    let outbox_dir = dir.path().join("outbox");
    let adapter = TransportAdapter::new(Arc::new(OutboxTransport::new(&outbox_dir)));

    adapter.start().await.unwrap();
    adapter.wait_ready(Duration::from_secs(1)).await.unwrap();

    let recipient = Recipient::new("5511999999999@c.us");
    adapter.send_media(&recipient, &sample_media()).await.unwrap();
    adapter.send_text(&recipient, "Taking photo...").await.unwrap();

    let photo = outbox_dir.join("5511999999999_c_us_photo_20240101_120000_000_deadbeef.jpeg");
    assert_eq!(std::fs::read(&photo).unwrap(), vec![0xFF, 0xD8, 0xFF, 0xD9]);

    let sidecar: serde_json::Value =
        serde_json::from_slice(&std::fs::read(photo.with_extension("json")).unwrap()).unwrap();
    assert_eq!(sidecar["recipient"], "5511999999999@c.us");
    assert_eq!(sidecar["caption"], "periodic#1");
    assert_eq!(sidecar["size_bytes"], 4);

    let log = std::fs::read_to_string(outbox_dir.join("messages.log")).unwrap();
    assert!(log.contains("Taking photo..."));

    adapter.stop().await.unwrap();
}

#[tokio::test]
async fn test_outbox_text_is_on_disk_when_send_returns() {
    let dir = TempDir::new().unwrap();
    let outbox = OutboxTransport::new(dir.path());
    let (events_tx, _events_rx) = tokio::sync::mpsc::channel(4);
    outbox.start(events_tx).await.unwrap();

    let recipient = Recipient::new("42");
    for i in 0..20 {
        let text = format!("line {}", i);
        outbox.send_text(&recipient, &text).await.unwrap();

        let log = std::fs::read_to_string(dir.path().join("messages.log")).unwrap();
        assert_eq!(log.lines().count(), i + 1);
        assert!(log.lines().last().unwrap().ends_with(&format!("42 {}", text)));
    }
}

#[test]
fn test_build_transport_outbox() {
    let mut config = DoorsnapConfig::default().transport;
    config.backend = crate::config::TransportBackend::Outbox;
    let transport = build_transport(&config).unwrap();
    assert_eq!(transport.name(), "outbox");
}
