//! Serialized write path.
//!
//! Every mutating command goes through one FIFO buffer drained by a single
//! worker task, so handlers never overlap and run in enqueue order. The
//! worker sleeps on the channel and wakes as soon as something is enqueued.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::FutureExt;
use hearth_core::event::NOTIFICATION_UPDATED;
use hearth_core::{ActorId, Command, CommandDefinition, Event};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bus::EventBus;
use crate::ports::{CommandHandler, NotificationSink};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedCommand {
    pub actor: ActorId,
    pub command: Command,
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Upper bound for one handler invocation. `None` lets a hung handler
    /// stall the queue indefinitely.
    pub command_timeout: Option<Duration>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            command_timeout: Some(Duration::from_secs(
                hearth_config::DEFAULT_COMMAND_TIMEOUT_SECS,
            )),
        }
    }
}

impl QueueConfig {
    pub fn with_timeout_secs(secs: u64) -> Self {
        let secs = hearth_config::clamp_command_timeout_secs(secs);
        Self {
            command_timeout: (secs > 0).then(|| Duration::from_secs(secs)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommandFailure {
    #[error("{0:#}")]
    Handler(anyhow::Error),
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error("handler panicked")]
    Panicked,
}

struct WorkerShared {
    handler: Arc<dyn CommandHandler>,
    notifier: Arc<dyn NotificationSink>,
    bus: EventBus,
    config: QueueConfig,
    pending: AtomicUsize,
    processed: AtomicUsize,
    failed: AtomicUsize,
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct CommandQueue {
    tx: mpsc::UnboundedSender<QueuedCommand>,
    // Owned by whichever worker is running; kept here so commands left
    // behind by `stop` survive until the next `start`.
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<QueuedCommand>>>,
    shared: Arc<WorkerShared>,
    worker: Mutex<Option<Worker>>,
}

impl CommandQueue {
    pub fn new(
        bus: EventBus,
        handler: Arc<dyn CommandHandler>,
        notifier: Arc<dyn NotificationSink>,
        config: QueueConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
            shared: Arc::new(WorkerShared {
                handler,
                notifier,
                bus,
                config,
                pending: AtomicUsize::new(0),
                processed: AtomicUsize::new(0),
                failed: AtomicUsize::new(0),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Appends to the tail of the buffer. Never blocks, never fails.
    pub fn enqueue(&self, actor: ActorId, command: Command) {
        let kind = command.kind();
        self.shared.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(QueuedCommand { actor, command }).is_err() {
            // Unreachable while `self` holds the receiver.
            self.shared.pending.fetch_sub(1, Ordering::SeqCst);
            warn!(kind, "command queue closed, command dropped");
            return;
        }
        debug!(kind, "command enqueued");
    }

    /// Spawns the worker on the current tokio runtime. No-op while one is
    /// already running.
    pub fn start(&self) {
        let mut worker = self.worker.lock().expect("queue worker lock poisoned");
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            return;
        }
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_worker(
            self.shared.clone(),
            self.rx.clone(),
            cancel.clone(),
        ));
        *worker = Some(Worker { cancel, handle });
        info!("command queue worker started");
    }

    /// Signals the worker to exit once the in-flight command (if any)
    /// completes. Queued commands stay queued. Idempotent.
    pub fn stop(&self) {
        let taken = self
            .worker
            .lock()
            .expect("queue worker lock poisoned")
            .take();
        if let Some(worker) = taken {
            worker.cancel.cancel();
            info!("command queue worker stopping");
        }
    }

    /// [`stop`](Self::stop), then wait for the worker to exit.
    pub async fn shutdown(&self) {
        let taken = self
            .worker
            .lock()
            .expect("queue worker lock poisoned")
            .take();
        if let Some(worker) = taken {
            worker.cancel.cancel();
            if let Err(e) = worker.handle.await {
                warn!(error = %e, "command queue worker ended abnormally");
            }
            info!("command queue worker stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .expect("queue worker lock poisoned")
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// Enqueued but not yet picked up by the worker.
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::SeqCst)
    }

    pub fn processed(&self) -> usize {
        self.shared.processed.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> usize {
        self.shared.failed.load(Ordering::SeqCst)
    }
}

impl Drop for CommandQueue {
    fn drop(&mut self) {
        if let Ok(mut worker) = self.worker.lock() {
            if let Some(worker) = worker.take() {
                worker.cancel.cancel();
            }
        }
    }
}

async fn run_worker(
    shared: Arc<WorkerShared>,
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<QueuedCommand>>>,
    cancel: CancellationToken,
) {
    // A previous worker may still be finishing its last command.
    let mut rx = tokio::select! {
        _ = cancel.cancelled() => return,
        rx = rx.lock_owned() => rx,
    };

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = rx.recv() => next,
        };
        let Some(queued) = next else {
            break;
        };
        shared.pending.fetch_sub(1, Ordering::SeqCst);
        // Not raced against `cancel`: a dequeued command always runs to the end.
        shared.execute(queued).await;
    }
    debug!("command queue worker exited");
}

impl WorkerShared {
    async fn execute(&self, queued: QueuedCommand) {
        let QueuedCommand { actor, command } = queued;
        let definition = command.definition();
        let started = Instant::now();

        match self.invoke(&actor, command).await {
            Ok(result) => {
                self.processed.fetch_add(1, Ordering::SeqCst);
                debug!(
                    kind = definition.kind,
                    %actor,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "command completed"
                );
                self.bus
                    .publish_to_actor(&actor, Event::new(definition.result_event_kind, result));
            }
            Err(failure) => {
                self.failed.fetch_add(1, Ordering::SeqCst);
                error!(
                    kind = definition.kind,
                    %actor,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %failure,
                    "command failed"
                );
                self.report_failure(&actor, definition).await;
                self.bus.publish_to_actor(
                    &actor,
                    Event::new(
                        NOTIFICATION_UPDATED,
                        json!({ "failed_command": definition.kind }),
                    ),
                );
            }
        }
    }

    async fn invoke(
        &self,
        actor: &ActorId,
        command: Command,
    ) -> Result<serde_json::Value, CommandFailure> {
        self.guarded(self.handler.handle(actor, command))
            .await?
            .map_err(CommandFailure::Handler)
    }

    /// Hands the failure to the sink. The sink runs under the same time limit
    /// and panic guard as handlers; whatever goes wrong there is only logged.
    async fn report_failure(&self, actor: &ActorId, definition: &'static CommandDefinition) {
        let reason = match self.guarded(self.notifier.notify_failure(actor, definition)).await {
            Ok(Ok(())) => return,
            Ok(Err(e)) => format!("{e:#}"),
            Err(failure) => failure.to_string(),
        };
        warn!(
            kind = definition.kind,
            %actor,
            error = %reason,
            "failure notification not recorded"
        );
    }

    /// Runs `fut` under the configured time limit with panics caught.
    ///
    /// A timed-out future is dropped. Work it moved off the runtime (a
    /// `spawn_blocking` closure) keeps running; handlers serialize such work
    /// themselves.
    async fn guarded<T>(&self, fut: impl Future<Output = T>) -> Result<T, CommandFailure> {
        let call = AssertUnwindSafe(fut).catch_unwind();
        let outcome = match self.config.command_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| CommandFailure::TimedOut(limit))?,
            None => call.await,
        };
        outcome.map_err(|_| CommandFailure::Panicked)
    }
}
