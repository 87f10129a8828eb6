#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hearth_app_core::{CommandHandler, NotificationSink, View, ViewContext};
use hearth_core::{ActorId, Command, CommandDefinition, ConnectionId};

pub fn actor(id: &str) -> ActorId {
    ActorId::parse(id).unwrap()
}

pub fn conn(id: &str) -> ConnectionId {
    ConnectionId::parse(id).unwrap()
}

/// A bill deletion labelled by `id`; cheap to tell apart in assertions.
pub fn labelled(id: &str) -> Command {
    Command::DeleteBill { id: id.into() }
}

fn label(command: &Command) -> String {
    match command {
        Command::DeleteBill { id }
        | Command::MarkBillPaid { id }
        | Command::DeleteAppointment { id }
        | Command::CompleteReminder { id }
        | Command::DismissNotification { id } => id.clone(),
        other => other.kind().to_string(),
    }
}

/// Records start order, tracks overlap, and can be told to sleep, fail or
/// panic on specific labels.
#[derive(Default)]
pub struct RecordingHandler {
    started: Mutex<Vec<String>>,
    finished: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    delays: Mutex<HashMap<String, Duration>>,
    failing: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn delay(&self, label: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(label.into(), delay);
    }

    pub fn fail_on(&self, label: &str) {
        self.failing.lock().unwrap().insert(label.into());
    }

    pub fn panic_on(&self, label: &str) {
        self.panicking.lock().unwrap().insert(label.into());
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub fn finished(&self) -> Vec<String> {
        self.finished.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandHandler for RecordingHandler {
    async fn handle(
        &self,
        _actor: &ActorId,
        command: Command,
    ) -> anyhow::Result<serde_json::Value> {
        let label = label(&command);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.started.lock().unwrap().push(label.clone());

        let delay = self.delays.lock().unwrap().get(&label).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.finished.lock().unwrap().push(label.clone());

        if self.panicking.lock().unwrap().contains(&label) {
            panic!("handler exploded on {label}");
        }
        if self.failing.lock().unwrap().contains(&label) {
            anyhow::bail!("storage unavailable for {label}");
        }
        Ok(serde_json::json!({ "id": label }))
    }
}

#[derive(Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<(ActorId, &'static str)>>,
    fail: bool,
    explode: bool,
    stall: Option<Duration>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn panicking() -> Arc<Self> {
        Arc::new(Self {
            explode: true,
            ..Self::default()
        })
    }

    pub fn stalling(for_: Duration) -> Arc<Self> {
        Arc::new(Self {
            stall: Some(for_),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> Vec<(ActorId, &'static str)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify_failure(
        &self,
        actor: &ActorId,
        definition: &'static CommandDefinition,
    ) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push((actor.clone(), definition.kind));
        if let Some(stall) = self.stall {
            tokio::time::sleep(stall).await;
        }
        if self.explode {
            panic!("notification sink exploded");
        }
        if self.fail {
            anyhow::bail!("notification store offline");
        }
        Ok(())
    }
}

/// Renders the actor, a load counter and any validation errors. Can be
/// switched into a failing mode.
#[derive(Default)]
pub struct CountingView {
    pub loads: AtomicUsize,
    pub broken: std::sync::atomic::AtomicBool,
}

impl CountingView {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn break_rendering(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }
}

#[async_trait]
impl View for CountingView {
    type State = (String, usize, Vec<String>);

    async fn load_state(&self, cx: &ViewContext) -> anyhow::Result<Self::State> {
        let n = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
        let errors = cx
            .validation
            .as_ref()
            .map(|v| {
                v.field_errors
                    .values()
                    .flatten()
                    .chain(v.form_errors.iter())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok((cx.actor.to_string(), n, errors))
    }

    fn render(&self, (actor, n, errors): &Self::State) -> anyhow::Result<String> {
        if self.broken.load(Ordering::SeqCst) {
            anyhow::bail!("template missing");
        }
        Ok(format!("{actor}#{n} errors={}", errors.join("|")))
    }
}

/// Polls `check` until it holds; fails the test once `within` elapses.
pub async fn wait_for(within: Duration, mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + within;
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within {within:?}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
