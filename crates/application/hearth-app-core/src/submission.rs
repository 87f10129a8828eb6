//! Validated mutating endpoints paired with a connection-bound live view.
//!
//! `submit` only answers "did the input pass validation". Whether the
//! mutation itself succeeded is reported later through the actor channel.

use std::sync::Arc;

use hearth_core::event::VALIDATION_FAILED;
use hearth_core::{ActorId, ConnectionId, Event};
use tracing::debug;

use crate::bus::EventBus;
use crate::forms::{FormInput, FormSchema};
use crate::live_view::{LiveView, LiveViewError, LiveViewSpec, LiveViewStream, View};
use crate::queue::CommandQueue;
use crate::validation_store::ValidationErrorStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Input failed validation; the errors went to the connection.
    Rejected,
    /// A command was queued.
    Enqueued,
}

#[derive(Clone)]
pub struct SubmissionResource {
    queue: Arc<CommandQueue>,
    bus: EventBus,
    errors: Arc<ValidationErrorStore>,
}

impl SubmissionResource {
    pub fn new(queue: Arc<CommandQueue>, bus: EventBus, errors: Arc<ValidationErrorStore>) -> Self {
        Self { queue, bus, errors }
    }

    pub fn submit(
        &self,
        schema: &dyn FormSchema,
        actor: &ActorId,
        connection: &ConnectionId,
        input: &FormInput,
    ) -> SubmitOutcome {
        match schema.parse(input) {
            Err(errors) => {
                debug!(%actor, %connection, "submission rejected by validation");
                let payload = serde_json::to_value(&errors).unwrap_or_default();
                // Store before publishing so the re-render finds the record.
                self.errors.store(connection, errors);
                self.bus
                    .publish_to_connection(connection, Event::new(VALIDATION_FAILED, payload));
                SubmitOutcome::Rejected
            }
            Ok(command) => {
                self.errors.clear(connection);
                self.queue.enqueue(actor.clone(), command);
                SubmitOutcome::Enqueued
            }
        }
    }

    /// Opens the live view paired with this resource's forms, bound to the
    /// submitting connection.
    pub fn live_view<V: View>(
        &self,
        view: Arc<V>,
        spec: LiveViewSpec,
        actor: Option<ActorId>,
        connection: ConnectionId,
    ) -> Result<LiveViewStream, LiveViewError> {
        LiveView::open(
            view,
            spec,
            actor,
            Some(connection),
            &self.bus,
            self.errors.clone(),
        )
    }
}
