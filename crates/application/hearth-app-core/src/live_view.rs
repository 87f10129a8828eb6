//! Long-lived push stream that keeps one rendered view in sync with the
//! actor's state.
//!
//! A live view subscribes to its actor's channel (and, when it belongs to a
//! form, to the originating connection's channel), pushes an initial render,
//! then re-renders or redirects on matching events. Dropping the stream is
//! the disconnect signal: every subscription is released and the
//! connection's validation record is cleared.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::{FutureExt, Stream};
use hearth_core::{ActorId, ConnectionId, ValidationErrors};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::bus::{EventBus, Subscription};
use crate::validation_store::ValidationErrorStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Push {
    Render(String),
    Redirect(String),
}

#[derive(Debug, thiserror::Error)]
pub enum LiveViewError {
    #[error("live view requires an authenticated actor")]
    Unauthenticated,
}

/// What a view sees when it loads.
#[derive(Debug, Clone)]
pub struct ViewContext {
    pub actor: ActorId,
    pub connection: Option<ConnectionId>,
    /// The connection's last validation failure, already consumed from the
    /// store.
    pub validation: Option<ValidationErrors>,
}

#[async_trait]
pub trait View: Send + Sync + 'static {
    type State: Send + 'static;

    async fn load_state(&self, cx: &ViewContext) -> anyhow::Result<Self::State>;

    fn render(&self, state: &Self::State) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, Default)]
pub struct LiveViewSpec {
    pub event_kind_prefixes: Vec<String>,
    /// When set, a matching actor event pushes this redirect instead of a
    /// re-render.
    pub redirect_on_match: Option<String>,
    /// Where to send the client when loading or rendering fails.
    pub error_redirect: Option<String>,
}

impl LiveViewSpec {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            event_kind_prefixes: prefixes.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn redirect_on_match(mut self, url: impl Into<String>) -> Self {
        self.redirect_on_match = Some(url.into());
        self
    }

    pub fn error_redirect(mut self, url: impl Into<String>) -> Self {
        self.error_redirect = Some(url.into());
        self
    }
}

#[derive(Debug, Clone, Copy)]
enum Trigger {
    ActorEvent,
    ConnectionEvent,
}

pub struct LiveView;

impl LiveView {
    /// Subscribes and returns the push stream. The first item is the initial
    /// render. Rejects immediately when no actor is bound to the request.
    pub fn open<V: View>(
        view: Arc<V>,
        spec: LiveViewSpec,
        actor: Option<ActorId>,
        connection: Option<ConnectionId>,
        bus: &EventBus,
        validation: Arc<ValidationErrorStore>,
    ) -> Result<LiveViewStream, LiveViewError> {
        let actor = actor.ok_or(LiveViewError::Unauthenticated)?;
        let (tx, triggers) = mpsc::unbounded_channel();

        let mut subscriptions = Vec::with_capacity(2);
        let prefixes = spec.event_kind_prefixes.clone();
        let actor_tx = tx.clone();
        subscriptions.push(bus.subscribe_to_actor(&actor, move |event| {
            if event.kind_matches(prefixes.as_slice()) {
                let _ = actor_tx.send(Trigger::ActorEvent);
            }
        }));
        if let Some(connection) = &connection {
            subscriptions.push(bus.subscribe_to_connection(connection, move |_| {
                let _ = tx.send(Trigger::ConnectionEvent);
            }));
        }
        debug!(%actor, connection = ?connection, "live view opened");

        let driver = Driver {
            view,
            spec,
            actor,
            triggers,
            initial: true,
            guard: CloseGuard {
                subscriptions,
                connection,
                validation,
                closed: false,
            },
        };
        let stream = futures::stream::unfold(driver, |mut driver| async move {
            let push = driver.next_push().await?;
            Some((push, driver))
        });
        Ok(LiveViewStream {
            inner: Box::pin(stream),
        })
    }
}

/// Ordered pushes for one client. Dropping it closes the live view.
pub struct LiveViewStream {
    inner: Pin<Box<dyn Stream<Item = Push> + Send>>,
}

impl LiveViewStream {
    pub fn close(self) {
        drop(self);
    }
}

impl Stream for LiveViewStream {
    type Item = Push;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

struct CloseGuard {
    subscriptions: Vec<Subscription>,
    connection: Option<ConnectionId>,
    validation: Arc<ValidationErrorStore>,
    closed: bool,
}

impl CloseGuard {
    fn close(&mut self) {
        if std::mem::replace(&mut self.closed, true) {
            return;
        }
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
        if let Some(connection) = &self.connection {
            self.validation.clear(connection);
        }
        debug!(connection = ?self.connection, "live view closed");
    }
}

impl Drop for CloseGuard {
    fn drop(&mut self) {
        self.close();
    }
}

struct Driver<V: View> {
    view: Arc<V>,
    spec: LiveViewSpec,
    actor: ActorId,
    triggers: mpsc::UnboundedReceiver<Trigger>,
    initial: bool,
    guard: CloseGuard,
}

impl<V: View> Driver<V> {
    async fn next_push(&mut self) -> Option<Push> {
        if std::mem::take(&mut self.initial) {
            if let Some(push) = self.refresh().await {
                return Some(push);
            }
        }
        loop {
            let push = match self.triggers.recv().await? {
                Trigger::ActorEvent => match self.spec.redirect_on_match.clone() {
                    Some(url) => Some(Push::Redirect(url)),
                    None => self.refresh().await,
                },
                // Validation feedback for this connection: always re-render.
                Trigger::ConnectionEvent => self.refresh().await,
            };
            if push.is_some() {
                return push;
            }
        }
    }

    async fn refresh(&mut self) -> Option<Push> {
        let connection = self.guard.connection.clone();
        let validation = connection
            .as_ref()
            .and_then(|c| self.guard.validation.take(c));
        let cx = ViewContext {
            actor: self.actor.clone(),
            connection,
            validation,
        };

        match load_and_render(self.view.as_ref(), &cx).await {
            Ok(markup) => Some(Push::Render(markup)),
            Err(err) => {
                let reason = format!("{err:#}");
                match &self.spec.error_redirect {
                    Some(url) => {
                        warn!(
                            actor = %self.actor,
                            error = %reason,
                            "live view render failed, redirecting"
                        );
                        Some(Push::Redirect(url.clone()))
                    }
                    None => {
                        warn!(actor = %self.actor, error = %reason, "live view render failed");
                        None
                    }
                }
            }
        }
    }
}

async fn load_and_render<V: View>(view: &V, cx: &ViewContext) -> anyhow::Result<String> {
    let state = AssertUnwindSafe(view.load_state(cx))
        .catch_unwind()
        .await
        .map_err(|_| anyhow::anyhow!("view panicked while loading state"))??;
    catch_unwind(AssertUnwindSafe(|| view.render(&state)))
        .map_err(|_| anyhow::anyhow!("view panicked while rendering"))?
}
