//! Server-rendered fragments pushed over the live-view streams.

use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use hearth_app_core::{View, ViewContext};
use hearth_core::{ActorId, Appointment, Bill, Notification, Reminder, ValidationErrors};
use hearth_persistence::{HouseholdStore, RecordStoreExt};

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn money(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

async fn read<T, F>(store: &Arc<dyn HouseholdStore>, actor: &ActorId, f: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn HouseholdStore, &ActorId) -> anyhow::Result<T> + Send + 'static,
{
    let store = store.clone();
    let actor = actor.clone();
    tokio::task::spawn_blocking(move || f(store.as_ref(), &actor))
        .await
        .context("store read task aborted")?
}

pub struct DashboardState {
    pub bills: Vec<Bill>,
    pub appointments: Vec<Appointment>,
    pub reminders: Vec<Reminder>,
    pub unread: usize,
}

pub struct DashboardView {
    store: Arc<dyn HouseholdStore>,
}

impl DashboardView {
    pub fn new(store: Arc<dyn HouseholdStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl View for DashboardView {
    type State = DashboardState;

    async fn load_state(&self, cx: &ViewContext) -> anyhow::Result<DashboardState> {
        read(&self.store, &cx.actor, |store, actor| {
            let mut bills: Vec<Bill> = store.list(actor)?;
            bills.retain(|b| !b.paid);
            bills.sort_by(|a, b| {
                a.due_on
                    .cmp(&b.due_on)
                    .then_with(|| a.title.cmp(&b.title))
            });

            let mut appointments: Vec<Appointment> = store.list(actor)?;
            appointments.sort_by_key(|a| a.starts_at);

            let mut reminders: Vec<Reminder> = store.list(actor)?;
            reminders.retain(|r| !r.done);
            reminders.sort_by_key(|r| r.remind_on);

            let notifications: Vec<Notification> = store.list(actor)?;
            let unread = notifications.iter().filter(|n| !n.dismissed).count();

            Ok(DashboardState {
                bills,
                appointments,
                reminders,
                unread,
            })
        })
        .await
    }

    fn render(&self, state: &DashboardState) -> anyhow::Result<String> {
        let mut html = String::new();
        writeln!(html, r#"<section id="dashboard">"#)?;
        if state.unread > 0 {
            writeln!(
                html,
                r#"<a class="badge" href="/notifications">{} notification(s)</a>"#,
                state.unread
            )?;
        }

        writeln!(html, "<h2>Bills due</h2><ul>")?;
        for bill in &state.bills {
            writeln!(
                html,
                r#"<li data-id="{}">{} · {} · due {}</li>"#,
                escape(&bill.id),
                escape(&bill.title),
                money(bill.amount_cents),
                bill.due_on
            )?;
        }
        writeln!(html, "</ul><h2>Appointments</h2><ul>")?;
        for appointment in &state.appointments {
            let location = appointment
                .location
                .as_deref()
                .map(|l| format!(" @ {}", escape(l)))
                .unwrap_or_default();
            writeln!(
                html,
                r#"<li data-id="{}">{} · {}{}</li>"#,
                escape(&appointment.id),
                escape(&appointment.title),
                appointment.starts_at.format("%Y-%m-%d %H:%M"),
                location
            )?;
        }
        writeln!(html, "</ul><h2>Reminders</h2><ul>")?;
        for reminder in &state.reminders {
            writeln!(
                html,
                r#"<li data-id="{}">{} · {}</li>"#,
                escape(&reminder.id),
                escape(&reminder.title),
                reminder.remind_on
            )?;
        }
        writeln!(html, "</ul></section>")?;
        Ok(html)
    }
}

pub struct NotificationsView {
    store: Arc<dyn HouseholdStore>,
}

impl NotificationsView {
    pub fn new(store: Arc<dyn HouseholdStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl View for NotificationsView {
    type State = Vec<Notification>;

    async fn load_state(&self, cx: &ViewContext) -> anyhow::Result<Vec<Notification>> {
        read(&self.store, &cx.actor, |store, actor| {
            let mut notifications: Vec<Notification> = store.list(actor)?;
            notifications.retain(|n| !n.dismissed);
            notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(notifications)
        })
        .await
    }

    fn render(&self, notifications: &Vec<Notification>) -> anyhow::Result<String> {
        let mut html = String::from("<ul id=\"notifications\">\n");
        if notifications.is_empty() {
            html.push_str("<li class=\"empty\">Nothing new</li>\n");
        }
        for n in notifications {
            writeln!(
                html,
                concat!(
                    r#"<li data-id="{id}">{msg} "#,
                    r#"<form method="post" action="/notifications/{id}/dismiss">"#,
                    r#"<button>Dismiss</button></form></li>"#,
                ),
                id = escape(&n.id),
                msg = escape(&n.message)
            )?;
        }
        html.push_str("</ul>\n");
        Ok(html)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    Bill,
    Appointment,
    Reminder,
}

struct Field {
    name: &'static str,
    label: &'static str,
    input_type: &'static str,
}

const fn field(name: &'static str, label: &'static str, input_type: &'static str) -> Field {
    Field {
        name,
        label,
        input_type,
    }
}

impl FormKind {
    fn action(self) -> &'static str {
        match self {
            FormKind::Bill => "/bills",
            FormKind::Appointment => "/appointments",
            FormKind::Reminder => "/reminders",
        }
    }

    fn fields(self) -> &'static [Field] {
        const BILL: &[Field] = &[
            field("title", "Title", "text"),
            field("amount", "Amount", "text"),
            field("due_on", "Due on", "date"),
        ];
        const APPOINTMENT: &[Field] = &[
            field("title", "Title", "text"),
            field("starts_at", "Starts at", "datetime-local"),
            field("location", "Location", "text"),
        ];
        const REMINDER: &[Field] = &[
            field("title", "Title", "text"),
            field("remind_on", "Remind on", "date"),
        ];
        match self {
            FormKind::Bill => BILL,
            FormKind::Appointment => APPOINTMENT,
            FormKind::Reminder => REMINDER,
        }
    }
}

/// A "new record" form. Its only state is the connection's last
/// validation failure.
pub struct FormView {
    kind: FormKind,
}

impl FormView {
    pub fn new(kind: FormKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl View for FormView {
    type State = Option<ValidationErrors>;

    async fn load_state(&self, cx: &ViewContext) -> anyhow::Result<Option<ValidationErrors>> {
        Ok(cx.validation.clone())
    }

    fn render(&self, errors: &Option<ValidationErrors>) -> anyhow::Result<String> {
        let mut html = String::new();
        let action = self.kind.action();
        writeln!(html, r#"<form method="post" action="{action}">"#)?;
        if let Some(errors) = errors {
            for message in &errors.form_errors {
                writeln!(html, r#"<p class="form-error">{}</p>"#, escape(message))?;
            }
        }
        for field in self.kind.fields() {
            writeln!(
                html,
                r#"<label>{label} <input type="{ty}" name="{name}"></label>"#,
                label = field.label,
                ty = field.input_type,
                name = field.name
            )?;
            let messages = errors.as_ref().map_or(&[][..], |e| e.field(field.name));
            for message in messages {
                writeln!(
                    html,
                    r#"<p class="field-error" data-field="{}">{}</p>"#,
                    field.name,
                    escape(message)
                )?;
            }
        }
        writeln!(html, "<button>Save</button></form>")?;
        Ok(html)
    }
}
