// tests/integration/connection_test.rs

//! Drives `run_connection` over an in-memory transport with a paused clock.

use super::test_helpers::{
    AUTH_FRAME, SECOND_WHATSAPP_FRAME, WHATSAPP_FRAME, memory_link, recording_notifier,
    test_settings,
};
use otprelay::core::RelayError;
use otprelay::relay::run_connection;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Error as WsError;

#[tokio::test(start_paused = true)]
async fn test_handshake_sends_subscribe_then_auth() {
    let (sink, stream, mut upstream) = memory_link();
    let (notifier, _sink, _delivered) = recording_notifier(0);
    let settings = test_settings(Duration::from_millis(500));

    let conn = tokio::spawn(async move {
        run_connection(1, sink, stream, &settings, &notifier).await
    });

    assert_eq!(upstream.next_text().await.as_deref(), Some("40/livesms"));
    let subscribed_at = tokio::time::Instant::now();
    assert_eq!(upstream.next_text().await.as_deref(), Some(AUTH_FRAME));
    assert!(subscribed_at.elapsed() >= Duration::from_millis(500));

    upstream.close();
    assert!(conn.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_no_keepalive_before_join_ack() {
    let (sink, stream, mut upstream) = memory_link();
    let (notifier, _sink, _delivered) = recording_notifier(0);
    let settings = test_settings(Duration::from_millis(500));

    let conn = tokio::spawn(async move {
        run_connection(1, sink, stream, &settings, &notifier).await
    });
    upstream.next_text().await;
    upstream.next_text().await;

    // Heartbeats and unrelated frames do not count as a join.
    upstream.push("3");
    upstream.push("0{\"sid\":\"abc\",\"pingInterval\":25000}");
    sleep(Duration::from_secs(120)).await;
    assert!(upstream.drain_text().is_empty());

    upstream.close();
    assert!(conn.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_keepalive_starts_after_join_ack() {
    let (sink, stream, mut upstream) = memory_link();
    let (notifier, _sink, _delivered) = recording_notifier(0);
    let settings = test_settings(Duration::ZERO);

    let conn = tokio::spawn(async move {
        run_connection(1, sink, stream, &settings, &notifier).await
    });
    upstream.next_text().await;
    upstream.next_text().await;

    upstream.push("40/livesms");
    // The first keepalive is sent one full interval after the join.
    sleep(Duration::from_secs(24)).await;
    assert!(upstream.drain_text().is_empty());
    sleep(Duration::from_secs(2)).await;
    assert_eq!(upstream.drain_text(), vec!["3"]);
    sleep(Duration::from_secs(25)).await;
    assert_eq!(upstream.drain_text(), vec!["3"]);

    // A repeated join ack does not start a second driver.
    upstream.push("40/livesms");
    sleep(Duration::from_secs(25)).await;
    assert_eq!(upstream.drain_text(), vec!["3"]);

    upstream.close();
    assert!(conn.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_no_keepalive_after_close() {
    let (sink, stream, mut upstream) = memory_link();
    let (notifier, _sink, _delivered) = recording_notifier(0);
    let settings = test_settings(Duration::ZERO);

    let conn = tokio::spawn(async move {
        run_connection(1, sink, stream, &settings, &notifier).await
    });
    upstream.next_text().await;
    upstream.next_text().await;
    upstream.push("40/livesms");
    sleep(Duration::from_secs(1)).await;

    upstream.close();
    assert!(conn.await.unwrap().is_ok());

    sleep(Duration::from_secs(120)).await;
    assert!(upstream.drain_text().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_ends_connection() {
    let (sink, stream, mut upstream) = memory_link();
    let (notifier, _sink, _delivered) = recording_notifier(0);
    let settings = test_settings(Duration::ZERO);

    let conn = tokio::spawn(async move {
        run_connection(1, sink, stream, &settings, &notifier).await
    });
    upstream.next_text().await;
    upstream.next_text().await;
    upstream.push("40/livesms");
    sleep(Duration::from_secs(1)).await;

    upstream.push_error(WsError::Io(std::io::Error::from(
        std::io::ErrorKind::ConnectionReset,
    )));
    let res = conn.await.unwrap();
    assert!(matches!(res, Err(RelayError::Io(_))), "got {res:?}");

    sleep(Duration::from_secs(120)).await;
    assert!(upstream.drain_text().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_keepalive_closes_connection() {
    let (sink, stream, mut upstream) = memory_link();
    let (notifier, _sink, _delivered) = recording_notifier(0);
    let settings = test_settings(Duration::ZERO);

    let conn = tokio::spawn(async move {
        run_connection(1, sink, stream, &settings, &notifier).await
    });
    upstream.next_text().await;
    upstream.next_text().await;
    upstream.push("40/livesms");
    sleep(Duration::from_secs(1)).await;

    upstream.break_outbound();
    let res = timeout(Duration::from_secs(60), conn)
        .await
        .expect("connection should end after the keepalive write fails")
        .unwrap();
    assert!(matches!(res, Err(RelayError::SendAfterClose)), "got {res:?}");
}

#[tokio::test(start_paused = true)]
async fn test_failed_handshake_write_ends_connection() {
    let (sink, stream, mut upstream) = memory_link();
    let (notifier, _sink, _delivered) = recording_notifier(0);
    let settings = test_settings(Duration::ZERO);
    upstream.break_outbound();

    let res = run_connection(1, sink, stream, &settings, &notifier).await;
    assert!(matches!(res, Err(RelayError::SendAfterClose)), "got {res:?}");
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frame_then_valid_event_delivers_once() {
    let (sink, stream, mut upstream) = memory_link();
    let (notifier, _sink, mut delivered) = recording_notifier(0);
    let settings = test_settings(Duration::ZERO);

    let conn = tokio::spawn(async move {
        run_connection(1, sink, stream, &settings, &notifier).await
    });
    upstream.next_text().await;
    upstream.next_text().await;

    upstream.push("40/livesms");
    upstream.push("42/livesms,not-json");
    upstream.push("42/livesms,[\"sms\",null]");
    upstream.push(WHATSAPP_FRAME);

    let alert = timeout(Duration::from_secs(5), delivered.recv())
        .await
        .expect("alert should be delivered")
        .unwrap();
    assert!(alert.contains("<code>123-456</code>"));
    assert!(alert.contains("<code>US</code>"));
    assert!(alert.contains("⁕⁕⁕⁕⁕⁕⁕4567"));
    assert!(alert.contains("<code>WhatsApp</code>"));

    sleep(Duration::from_secs(30)).await;
    assert!(delivered.try_recv().is_err());

    upstream.close();
    assert!(conn.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_failing_delivery_does_not_delay_next_event() {
    let (sink, stream, mut upstream) = memory_link();
    // Every attempt fails, so each alert spends 10s retrying.
    let (notifier, recorder, _delivered) = recording_notifier(u32::MAX);
    let settings = test_settings(Duration::ZERO);

    let conn = tokio::spawn(async move {
        run_connection(1, sink, stream, &settings, &notifier).await
    });
    upstream.next_text().await;
    upstream.next_text().await;
    upstream.push("40/livesms");
    upstream.push(WHATSAPP_FRAME);
    upstream.push(SECOND_WHATSAPP_FRAME);

    sleep(Duration::from_secs(11)).await;
    let log = recorder.attempt_log();
    assert_eq!(log.len(), 6, "both alerts should have used all three attempts");

    let attempts_for = |code: &str| -> Vec<tokio::time::Instant> {
        log.iter()
            .filter(|(_, text)| text.contains(code))
            .map(|(at, _)| *at)
            .collect()
    };
    let first = attempts_for("123-456");
    let second = attempts_for("654-321");
    assert_eq!(first.len(), 3);
    assert_eq!(second.len(), 3);

    // The second alert starts while the first one is still retrying.
    assert_eq!(second[0], first[0]);
    assert!(second[0] < first[2]);

    upstream.close();
    assert!(conn.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_join_after_slow_event_starts_keepalive_on_time() {
    let (sink, stream, mut upstream) = memory_link();
    // The alert fails twice and is retried 5s apart before it goes through.
    let (notifier, _recorder, mut delivered) = recording_notifier(2);
    let settings = test_settings(Duration::ZERO);

    let conn = tokio::spawn(async move {
        run_connection(1, sink, stream, &settings, &notifier).await
    });
    upstream.next_text().await;
    upstream.next_text().await;
    upstream.push(WHATSAPP_FRAME);
    upstream.push("40/livesms");

    // The join frame behind the event is handled at once, so keepalive starts on schedule.
    sleep(Duration::from_secs(26)).await;
    assert_eq!(upstream.drain_text(), vec!["3"]);
    assert!(delivered.recv().await.is_some());

    upstream.close();
    assert!(conn.await.unwrap().is_ok());
}
