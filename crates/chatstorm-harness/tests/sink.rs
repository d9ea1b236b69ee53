#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use chatstorm_core::protocol::envelope::ChannelId;
use chatstorm_harness::sink::{self, Pull, SessionEvent};
use tokio::time::Duration;

fn line(n: usize) -> SessionEvent {
    SessionEvent::ChatLine {
        from: "Bob-1".into(),
        text: format!("line {n}"),
        own: false,
    }
}

#[tokio::test]
async fn delivers_in_order() {
    let (tx, mut rx) = sink::channel(8, 50);
    assert!(tx.push(line(0)).await);
    assert!(
        tx.push(SessionEvent::Lifecycle {
            event: "join".into(),
            user_name: "Bob-1".into(),
            channel: Some(ChannelId(2)),
        })
        .await
    );

    assert_eq!(rx.try_pull(), Some(line(0)));
    assert!(matches!(rx.try_pull(), Some(SessionEvent::Lifecycle { .. })));
    assert_eq!(rx.try_pull(), None);
}

#[tokio::test]
async fn chat_traffic_is_lossy_when_full() {
    let (tx, mut rx) = sink::channel(2, 50);
    assert!(tx.push(line(0)).await);
    assert!(tx.push(line(1)).await);
    assert!(!tx.push(line(2)).await);

    assert_eq!(tx.dropped(), 1);
    assert_eq!(rx.dropped(), 1);
    assert_eq!(rx.drain(), vec![line(0), line(1)]);
}

#[tokio::test]
async fn terminal_event_waits_for_space() {
    let (tx, mut rx) = sink::channel(1, 1000);
    assert!(tx.push(line(0)).await);

    let producer = tokio::spawn(async move {
        tx.push(SessionEvent::ConnectionLost {
            reason: "reset".into(),
        })
        .await
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(rx.try_pull(), Some(line(0)));
    assert!(producer.await.unwrap());
    assert!(matches!(
        rx.pull_timeout(Duration::from_millis(200)).await,
        Pull::Event(SessionEvent::ConnectionLost { .. })
    ));
    assert_eq!(rx.dropped(), 0);
}

#[tokio::test]
async fn terminal_event_gives_up_after_timeout() {
    let (tx, rx) = sink::channel(1, 20);
    assert!(tx.push(line(0)).await);
    assert!(
        !tx.push(SessionEvent::Fault {
            detail: "boom".into()
        })
        .await
    );
    assert_eq!(rx.dropped(), 1);
}

#[tokio::test]
async fn timed_pull_reports_empty_then_closed() {
    let (tx, mut rx) = sink::channel(4, 50);
    assert_eq!(rx.pull_timeout(Duration::from_millis(10)).await, Pull::Empty);

    tx.push(line(7)).await;
    drop(tx);
    assert_eq!(rx.pull_timeout(Duration::from_millis(10)).await, Pull::Event(line(7)));
    assert_eq!(rx.pull_timeout(Duration::from_millis(10)).await, Pull::Closed);
}

#[test]
fn blocking_pull_works_without_a_runtime() {
    let (tx, mut rx) = sink::channel(4, 50);

    // Consumer on a plain thread; producer alive but idle.
    let consumer = std::thread::spawn(move || {
        let started = std::time::Instant::now();
        let idle = rx.pull_blocking_timeout(Duration::from_millis(50));
        let waited = started.elapsed();
        let next = rx.pull_blocking_timeout(Duration::from_secs(2));
        let last = rx.pull_blocking_timeout(Duration::from_secs(2));
        (idle, waited, next, last, rx.poll())
    });

    std::thread::sleep(Duration::from_millis(150));
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    assert!(rt.block_on(tx.push(line(3))));
    drop(tx);

    let (idle, waited, next, last, after) = consumer.join().unwrap();
    assert_eq!(idle, Pull::Empty);
    assert!(waited < Duration::from_secs(1), "idle pull overran: {waited:?}");
    assert_eq!(next, Pull::Event(line(3)));
    assert_eq!(last, Pull::Closed);
    assert_eq!(after, Pull::Closed);
}

#[test]
fn poll_tells_idle_from_closed() {
    let (tx, mut rx) = sink::channel(4, 50);
    assert_eq!(rx.poll(), Pull::Empty);
    drop(tx);
    assert_eq!(rx.poll(), Pull::Closed);
}

#[test]
fn terminal_classification() {
    assert!(SessionEvent::ConnectFailed { reason: String::new() }.is_terminal());
    assert!(SessionEvent::Fault { detail: String::new() }.is_terminal());
    assert!(!line(0).is_terminal());
    assert!(!SessionEvent::ServerError { message: String::new() }.is_terminal());
}
