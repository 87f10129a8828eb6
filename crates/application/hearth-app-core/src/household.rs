use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use chrono::Utc;
use hearth_core::{
    ActorId, Appointment, Bill, Command, CommandDefinition, Notification, Reminder,
};
use hearth_persistence::{HouseholdStore, RecordStoreExt};
use serde_json::json;

use crate::ports::{CommandHandler, NotificationSink};

/// Applies household commands to the store. Also records failure
/// notifications, which live in the same store.
///
/// Store work runs on the blocking pool and outlives a timed-out `handle`
/// future, so every write takes `writes` on the blocking thread. A command
/// that starts after a timeout waits there until the abandoned one is done.
#[derive(Clone)]
pub struct HouseholdCommands {
    store: Arc<dyn HouseholdStore>,
    writes: Arc<Mutex<()>>,
}

impl HouseholdCommands {
    pub fn new(store: Arc<dyn HouseholdStore>) -> Self {
        Self {
            store,
            writes: Arc::default(),
        }
    }

    /// Runs `f` on the blocking pool while holding the write gate.
    async fn write<T, F>(&self, f: F) -> Result<T, tokio::task::JoinError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn HouseholdStore) -> T + Send + 'static,
    {
        let store = self.store.clone();
        let writes = self.writes.clone();
        tokio::task::spawn_blocking(move || {
            // The gate guards no data, so poisoning is ignored.
            let _gate = writes.lock().unwrap_or_else(PoisonError::into_inner);
            f(store.as_ref())
        })
        .await
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn apply(
    store: &dyn HouseholdStore,
    actor: &ActorId,
    command: Command,
) -> anyhow::Result<serde_json::Value> {
    let now = Utc::now();
    match command {
        Command::CreateBill(new) => {
            let bill = new.into_bill(new_id(), now);
            store.put(actor, &bill)?;
            Ok(serde_json::to_value(&bill)?)
        }
        Command::MarkBillPaid { id } => {
            let mut bill: Bill = store
                .get(actor, &id)?
                .ok_or_else(|| anyhow!("bill {id} not found"))?;
            bill.paid = true;
            store.put(actor, &bill)?;
            Ok(serde_json::to_value(&bill)?)
        }
        Command::DeleteBill { id } => {
            if !store.delete::<Bill>(actor, &id)? {
                bail!("bill {id} not found");
            }
            Ok(json!({ "id": id }))
        }
        Command::CreateAppointment(new) => {
            let appointment = new.into_appointment(new_id(), now);
            store.put(actor, &appointment)?;
            Ok(serde_json::to_value(&appointment)?)
        }
        Command::DeleteAppointment { id } => {
            if !store.delete::<Appointment>(actor, &id)? {
                bail!("appointment {id} not found");
            }
            Ok(json!({ "id": id }))
        }
        Command::CreateReminder(new) => {
            let reminder = new.into_reminder(new_id(), now);
            store.put(actor, &reminder)?;
            Ok(serde_json::to_value(&reminder)?)
        }
        Command::CompleteReminder { id } => {
            let mut reminder: Reminder = store
                .get(actor, &id)?
                .ok_or_else(|| anyhow!("reminder {id} not found"))?;
            reminder.done = true;
            store.put(actor, &reminder)?;
            Ok(serde_json::to_value(&reminder)?)
        }
        Command::DismissNotification { id } => {
            let mut notification: Notification = store
                .get(actor, &id)?
                .ok_or_else(|| anyhow!("notification {id} not found"))?;
            notification.dismissed = true;
            store.put(actor, &notification)?;
            Ok(serde_json::to_value(&notification)?)
        }
    }
}

fn failure_message(definition: &CommandDefinition) -> String {
    let subject = definition
        .kind
        .split_once('.')
        .map_or(definition.kind, |(subject, _)| subject);
    format!("Something went wrong while saving your {subject}. Please try again.")
}

#[async_trait]
impl CommandHandler for HouseholdCommands {
    async fn handle(&self, actor: &ActorId, command: Command) -> anyhow::Result<serde_json::Value> {
        let actor = actor.clone();
        let kind = command.kind();
        self.write(move |store| apply(store, &actor, command))
            .await
            .with_context(|| format!("{kind} worker task aborted"))?
    }
}

#[async_trait]
impl NotificationSink for HouseholdCommands {
    async fn notify_failure(
        &self,
        actor: &ActorId,
        definition: &'static CommandDefinition,
    ) -> anyhow::Result<()> {
        let notification = Notification {
            id: new_id(),
            message: failure_message(definition),
            dismissed: false,
            created_at: Utc::now(),
        };
        let actor = actor.clone();
        self.write(move |store| store.put(&actor, &notification))
            .await
            .context("notification worker task aborted")??;
        Ok(())
    }
}
