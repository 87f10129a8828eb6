mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{actor, conn};
use hearth_app_core::EventBus;
use hearth_core::{Channel, Event};

fn ping() -> Event {
    Event::new("system.ping", serde_json::Value::Null)
}

#[test]
fn unsubscribe_is_idempotent_and_only_removes_its_own_registration() {
    let bus = EventBus::new();
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    let f = first.clone();
    let a = bus.subscribe_to_actor(&actor("u1"), move |_| {
        f.fetch_add(1, Ordering::SeqCst);
    });
    let s = second.clone();
    let _b = bus.subscribe_to_actor(&actor("u1"), move |_| {
        s.fetch_add(1, Ordering::SeqCst);
    });

    a.unsubscribe();
    a.unsubscribe();
    drop(a);

    assert_eq!(bus.publish_to_actor(&actor("u1"), ping()), 1);
    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 1);
}

#[test]
fn late_subscribers_miss_earlier_events() {
    let bus = EventBus::new();
    assert_eq!(bus.publish_to_connection(&conn("c1"), ping()), 0);

    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    let _sub = bus.subscribe_to_connection(&conn("c1"), move |_| {
        h.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    bus.publish_to_connection(&conn("c1"), ping());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn no_invocation_after_unsubscribe_returns_under_concurrent_publish() {
    for _ in 0..20 {
        let bus = EventBus::new();
        let released = Arc::new(AtomicBool::new(false));
        let late_calls = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));

        let (r, l, c) = (released.clone(), late_calls.clone(), calls.clone());
        let sub = bus.subscribe_global(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            if r.load(Ordering::SeqCst) {
                l.fetch_add(1, Ordering::SeqCst);
            }
            thread::sleep(Duration::from_micros(50));
        });

        let stop = Arc::new(AtomicBool::new(false));
        let publishers: Vec<_> = (0..3)
            .map(|_| {
                let bus = bus.clone();
                let stop = stop.clone();
                thread::spawn(move || {
                    while !stop.load(Ordering::SeqCst) {
                        bus.publish_global(ping());
                    }
                })
            })
            .collect();

        while calls.load(Ordering::SeqCst) < 10 {
            thread::yield_now();
        }
        sub.unsubscribe();
        released.store(true, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(5));
        stop.store(true, Ordering::SeqCst);
        for p in publishers {
            p.join().unwrap();
        }

        assert_eq!(late_calls.load(Ordering::SeqCst), 0);
        assert_eq!(bus.subscriber_count(&Channel::Global), 0);
    }
}

#[test]
fn subscribing_from_many_threads_is_safe() {
    let bus = EventBus::new();
    let workers: Vec<_> = (0..8)
        .map(|n| {
            let bus = bus.clone();
            thread::spawn(move || {
                (0..25)
                    .map(|_| bus.subscribe_to_actor(&actor(&format!("u{n}")), |_| {}))
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    let subs: Vec<_> = workers
        .into_iter()
        .flat_map(|t| t.join().unwrap())
        .collect();

    assert_eq!(bus.total_subscriptions(), 200);
    assert_eq!(bus.subscriber_count(&Channel::actor(&actor("u3"))), 25);
    drop(subs);
    assert_eq!(bus.total_subscriptions(), 0);
}
