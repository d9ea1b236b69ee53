#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio::time::{sleep, timeout, Duration};

use chatstorm_harness::sim::{fleet, SessionId, SessionOutcome};
use chatstorm_harness::sink::SessionEvent;

use common::{config, dead_addr, listener};

const QUIET: &str = "  min_delay_ms: 60000\n  max_delay_ms: 60000";
const WAIT: Duration = Duration::from_secs(5);

/// Accept forever; swallow whatever clients send.
fn sink_server(l: TcpListener, accepted: Arc<AtomicUsize>) {
    tokio::spawn(async move {
        loop {
            let Ok((mut s, _)) = l.accept().await else { return };
            accepted.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                while matches!(s.read(&mut buf).await, Ok(n) if n > 0) {}
            });
        }
    });
}

#[tokio::test]
async fn unreachable_target_fails_every_session() {
    let addr = dead_addr().await;
    let mut handle = fleet::spawn(3, config(addr, QUIET));
    let mut feeds = handle.take_feeds();
    assert_eq!(feeds.len(), 3);
    assert!(handle.take_feeds().is_empty());

    let summary = timeout(WAIT, handle.await_all()).await.unwrap();
    assert_eq!(summary.reports.len(), 3);
    assert_eq!(summary.count(SessionOutcome::ConnectFailed), 3);
    assert_eq!(summary.by_outcome().get(&SessionOutcome::ConnectFailed), Some(&3));

    for (_, feed) in feeds.iter_mut() {
        let events = feed.drain();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], SessionEvent::ConnectFailed { .. }));
    }
}

#[tokio::test]
async fn stopping_one_session_leaves_the_rest_running() {
    let (l, addr) = listener().await;
    let accepted = Arc::new(AtomicUsize::new(0));
    sink_server(l, Arc::clone(&accepted));

    let handle = fleet::spawn(3, config(addr, QUIET));
    let directory = handle.directory();
    assert_eq!(handle.user_name(SessionId(2)), Some("Charlie-2"));

    timeout(WAIT, async {
        while (0..3).any(|i| directory.current(SessionId(i)).is_none()) {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(accepted.load(Ordering::SeqCst), 3);

    assert!(handle.stop(SessionId(1)));
    assert!(!handle.stop(SessionId(9)));

    timeout(WAIT, async {
        while directory.current(SessionId(1)).is_some() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    sleep(Duration::from_millis(50)).await;
    assert!(directory.current(SessionId(0)).is_some());
    assert!(directory.current(SessionId(2)).is_some());

    handle.stop_all();
    let summary = timeout(WAIT, handle.await_all()).await.unwrap();
    assert_eq!(summary.count(SessionOutcome::Stopped), 3);
    assert_eq!(summary.frames_sent(), 3);
    assert!(directory.occupancy().is_empty());
}

#[tokio::test]
async fn stop_all_token_outlives_the_handle() {
    let (l, addr) = listener().await;
    sink_server(l, Arc::new(AtomicUsize::new(0)));

    let handle = fleet::spawn(2, config(addr, QUIET));
    let stop = handle.stop_all_token();
    let waiter = tokio::spawn(handle.await_all());

    sleep(Duration::from_millis(100)).await;
    stop.cancel();

    let summary = timeout(WAIT, waiter).await.unwrap().unwrap();
    assert_eq!(summary.count(SessionOutcome::Stopped), 2);
    assert_eq!(summary.reports[0].id, SessionId(0));
    assert_eq!(summary.reports[1].id, SessionId(1));
}
