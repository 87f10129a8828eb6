mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{actor, labelled, wait_for, RecordingHandler, RecordingSink};
use hearth_app_core::{CommandQueue, EventBus, QueueConfig};
use hearth_core::event::NOTIFICATION_UPDATED;
use hearth_core::Event;

fn record_events(
    bus: &EventBus,
    id: &str,
) -> (Arc<Mutex<Vec<Event>>>, hearth_app_core::Subscription) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    let sub = bus.subscribe_to_actor(&actor(id), move |ev| s.lock().unwrap().push(ev.clone()));
    (seen, sub)
}

#[tokio::test]
async fn failed_command_notifies_the_actor_and_the_next_one_runs() {
    let handler = RecordingHandler::new();
    handler.fail_on("broken");
    let sink = RecordingSink::new();
    let bus = EventBus::new();
    let queue = CommandQueue::new(
        bus.clone(),
        handler.clone(),
        sink.clone(),
        QueueConfig::default(),
    );
    let (events, _sub) = record_events(&bus, "u1");

    queue.start();
    queue.enqueue(actor("u1"), labelled("broken"));
    queue.enqueue(actor("u1"), labelled("fine"));

    wait_for(Duration::from_secs(1), || events.lock().unwrap().len() == 2).await;
    assert_eq!(handler.started(), ["broken", "fine"]);
    assert_eq!(queue.failed(), 1);
    assert_eq!(queue.processed(), 1);
    assert_eq!(sink.calls(), [(actor("u1"), "bill.delete")]);

    let events = events.lock().unwrap();
    assert_eq!(events[0].kind, NOTIFICATION_UPDATED);
    assert_eq!(
        events[0].payload,
        serde_json::json!({ "failed_command": "bill.delete" })
    );
    assert_eq!(events[1].kind, "bill.deleted");
}

#[tokio::test]
async fn a_panicking_handler_is_contained() {
    let handler = RecordingHandler::new();
    handler.panic_on("boom");
    let sink = RecordingSink::new();
    let bus = EventBus::new();
    let queue = CommandQueue::new(
        bus.clone(),
        handler.clone(),
        sink.clone(),
        QueueConfig::default(),
    );
    let (events, _sub) = record_events(&bus, "u1");

    queue.start();
    queue.enqueue(actor("u1"), labelled("boom"));
    queue.enqueue(actor("u1"), labelled("after"));

    wait_for(Duration::from_secs(1), || queue.processed() == 1).await;
    assert!(queue.is_running());
    assert_eq!(queue.failed(), 1);
    assert_eq!(sink.calls().len(), 1);
    let kinds: Vec<_> = events.lock().unwrap().iter().map(|e| e.kind.clone()).collect();
    assert_eq!(kinds, [NOTIFICATION_UPDATED, "bill.deleted"]);
}

#[tokio::test]
async fn a_failing_notification_sink_does_not_stall_the_queue() {
    let handler = RecordingHandler::new();
    handler.fail_on("broken");
    let sink = RecordingSink::failing();
    let bus = EventBus::new();
    let queue = CommandQueue::new(bus.clone(), handler, sink.clone(), QueueConfig::default());
    let (events, _sub) = record_events(&bus, "u1");

    queue.start();
    queue.enqueue(actor("u1"), labelled("broken"));
    queue.enqueue(actor("u1"), labelled("fine"));

    wait_for(Duration::from_secs(1), || queue.processed() == 1).await;
    assert_eq!(sink.calls().len(), 1);
    // The refresh signal is still sent even though no notification was stored.
    assert_eq!(events.lock().unwrap()[0].kind, NOTIFICATION_UPDATED);
}

#[tokio::test]
async fn a_panicking_notification_sink_does_not_stop_the_worker() {
    let handler = RecordingHandler::new();
    handler.fail_on("broken");
    let sink = RecordingSink::panicking();
    let bus = EventBus::new();
    let queue = CommandQueue::new(bus.clone(), handler.clone(), sink, QueueConfig::default());
    let (events, _sub) = record_events(&bus, "u1");

    queue.start();
    queue.enqueue(actor("u1"), labelled("broken"));
    queue.enqueue(actor("u1"), labelled("after"));

    wait_for(Duration::from_secs(1), || queue.processed() == 1).await;
    assert!(queue.is_running());
    assert_eq!(queue.pending(), 0);
    assert_eq!(handler.finished(), ["broken", "after"]);
    let kinds: Vec<_> = events.lock().unwrap().iter().map(|e| e.kind.clone()).collect();
    assert_eq!(kinds, [NOTIFICATION_UPDATED, "bill.deleted"]);
}

#[tokio::test]
async fn a_hung_notification_sink_is_cut_off_by_the_command_timeout() {
    let handler = RecordingHandler::new();
    handler.fail_on("broken");
    let sink = RecordingSink::stalling(Duration::from_secs(30));
    let bus = EventBus::new();
    let config = QueueConfig {
        command_timeout: Some(Duration::from_millis(50)),
    };
    let queue = CommandQueue::new(bus.clone(), handler, sink.clone(), config);

    queue.start();
    queue.enqueue(actor("u1"), labelled("broken"));
    queue.enqueue(actor("u1"), labelled("after"));

    wait_for(Duration::from_secs(2), || queue.processed() == 1).await;
    assert_eq!(sink.calls().len(), 1);
}

#[tokio::test]
async fn failures_stay_on_the_originating_actor() {
    let handler = RecordingHandler::new();
    handler.fail_on("broken");
    let bus = EventBus::new();
    let queue = CommandQueue::new(
        bus.clone(),
        handler,
        RecordingSink::new(),
        QueueConfig::default(),
    );
    let (mine, _a) = record_events(&bus, "u1");
    let (theirs, _b) = record_events(&bus, "u2");

    queue.start();
    queue.enqueue(actor("u1"), labelled("broken"));

    wait_for(Duration::from_secs(1), || queue.failed() == 1).await;
    assert_eq!(mine.lock().unwrap().len(), 1);
    assert!(theirs.lock().unwrap().is_empty());
}
