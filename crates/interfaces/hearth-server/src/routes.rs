use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Form, Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::Router;
use futures::{Stream, StreamExt};
use hearth_app_core::forms::{NewAppointmentForm, NewBillForm, NewReminderForm, RecordActionForm};
use hearth_app_core::{FormInput, FormSchema, LiveView, LiveViewSpec, LiveViewStream, Push};

use crate::app::AppServices;
use crate::error::ServerError;
use crate::extract::{MaybeActor, MaybeConnection, RequireActor, RequireConnection};
use crate::views::{DashboardView, FormKind, FormView, NotificationsView};

pub const ERROR_PAGE: &str = "/error";

const DASHBOARD_PREFIXES: [&str; 4] = ["bill.", "appointment.", "reminder.", "notification."];

pub fn router(services: AppServices) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/live/dashboard", get(live_dashboard))
        .route("/live/bills/new", get(live_new_bill))
        .route("/live/appointments/new", get(live_new_appointment))
        .route("/live/reminders/new", get(live_new_reminder))
        .route("/live/notifications", get(live_notifications))
        .route("/bills", post(create_bill))
        .route("/bills/:id/paid", post(mark_bill_paid))
        .route("/bills/:id/delete", post(delete_bill))
        .route("/appointments", post(create_appointment))
        .route("/appointments/:id/delete", post(delete_appointment))
        .route("/reminders", post(create_reminder))
        .route("/reminders/:id/complete", post(complete_reminder))
        .route("/notifications/:id/dismiss", post(dismiss_notification))
        .with_state(services)
}

async fn healthz(State(services): State<AppServices>) -> (StatusCode, &'static str) {
    if services.queue.is_running() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "command queue stopped")
    }
}

/// Frames pushes as `render` / `redirect` server-sent events.
fn sse(stream: LiveViewStream) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let events = stream.map(|push| {
        Ok(match push {
            Push::Render(markup) => SseEvent::default().event("render").data(markup),
            Push::Redirect(url) => SseEvent::default().event("redirect").data(url),
        })
    });
    let keep_alive = Duration::from_secs(hearth_config::SSE_KEEP_ALIVE_SECS);
    Sse::new(events).keep_alive(KeepAlive::new().interval(keep_alive))
}

async fn live_dashboard(
    State(services): State<AppServices>,
    MaybeActor(actor): MaybeActor,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ServerError> {
    let stream = LiveView::open(
        Arc::new(DashboardView::new(services.store.clone())),
        LiveViewSpec::new(DASHBOARD_PREFIXES).error_redirect(ERROR_PAGE),
        actor,
        None,
        &services.bus,
        services.validation.clone(),
    )?;
    Ok(sse(stream))
}

async fn live_notifications(
    State(services): State<AppServices>,
    MaybeActor(actor): MaybeActor,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ServerError> {
    let stream = LiveView::open(
        Arc::new(NotificationsView::new(services.store.clone())),
        LiveViewSpec::new(["notification."]).error_redirect(ERROR_PAGE),
        actor,
        None,
        &services.bus,
        services.validation.clone(),
    )?;
    Ok(sse(stream))
}

fn live_form(
    services: &AppServices,
    kind: FormKind,
    created_prefix: &str,
    actor: Option<hearth_core::ActorId>,
    connection: Option<hearth_core::ConnectionId>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ServerError> {
    if actor.is_none() {
        return Err(ServerError::Unauthenticated);
    }
    let connection = connection.ok_or(ServerError::MissingConnection)?;
    let stream = services.submissions.live_view(
        Arc::new(FormView::new(kind)),
        LiveViewSpec::new([created_prefix]).redirect_on_match("/"),
        actor,
        connection,
    )?;
    Ok(sse(stream))
}

async fn live_new_bill(
    State(services): State<AppServices>,
    MaybeActor(actor): MaybeActor,
    MaybeConnection(connection): MaybeConnection,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ServerError> {
    live_form(&services, FormKind::Bill, "bill.created", actor, connection)
}

async fn live_new_appointment(
    State(services): State<AppServices>,
    MaybeActor(actor): MaybeActor,
    MaybeConnection(connection): MaybeConnection,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ServerError> {
    live_form(
        &services,
        FormKind::Appointment,
        "appointment.created",
        actor,
        connection,
    )
}

async fn live_new_reminder(
    State(services): State<AppServices>,
    MaybeActor(actor): MaybeActor,
    MaybeConnection(connection): MaybeConnection,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ServerError> {
    live_form(
        &services,
        FormKind::Reminder,
        "reminder.created",
        actor,
        connection,
    )
}

/// Always answers 204 once identity checks pass; the outcome arrives on
/// the paired live view.
fn submit(
    services: &AppServices,
    schema: &dyn FormSchema,
    actor: &hearth_core::ActorId,
    connection: &hearth_core::ConnectionId,
    input: &FormInput,
) -> StatusCode {
    services.submissions.submit(schema, actor, connection, input);
    StatusCode::NO_CONTENT
}

async fn create_bill(
    State(services): State<AppServices>,
    RequireActor(actor): RequireActor,
    RequireConnection(connection): RequireConnection,
    Form(input): Form<FormInput>,
) -> StatusCode {
    submit(&services, &NewBillForm, &actor, &connection, &input)
}

async fn create_appointment(
    State(services): State<AppServices>,
    RequireActor(actor): RequireActor,
    RequireConnection(connection): RequireConnection,
    Form(input): Form<FormInput>,
) -> StatusCode {
    submit(&services, &NewAppointmentForm, &actor, &connection, &input)
}

async fn create_reminder(
    State(services): State<AppServices>,
    RequireActor(actor): RequireActor,
    RequireConnection(connection): RequireConnection,
    Form(input): Form<FormInput>,
) -> StatusCode {
    submit(&services, &NewReminderForm, &actor, &connection, &input)
}

fn record_action(
    services: &AppServices,
    action: RecordActionForm,
    actor: &hearth_core::ActorId,
    connection: &hearth_core::ConnectionId,
    id: String,
) -> StatusCode {
    let input = FormInput::from([("id".to_string(), id)]);
    submit(services, &action, actor, connection, &input)
}

async fn mark_bill_paid(
    State(services): State<AppServices>,
    RequireActor(actor): RequireActor,
    RequireConnection(connection): RequireConnection,
    Path(id): Path<String>,
) -> StatusCode {
    record_action(
        &services,
        RecordActionForm::MarkBillPaid,
        &actor,
        &connection,
        id,
    )
}

async fn delete_bill(
    State(services): State<AppServices>,
    RequireActor(actor): RequireActor,
    RequireConnection(connection): RequireConnection,
    Path(id): Path<String>,
) -> StatusCode {
    record_action(
        &services,
        RecordActionForm::DeleteBill,
        &actor,
        &connection,
        id,
    )
}

async fn delete_appointment(
    State(services): State<AppServices>,
    RequireActor(actor): RequireActor,
    RequireConnection(connection): RequireConnection,
    Path(id): Path<String>,
) -> StatusCode {
    record_action(
        &services,
        RecordActionForm::DeleteAppointment,
        &actor,
        &connection,
        id,
    )
}

async fn complete_reminder(
    State(services): State<AppServices>,
    RequireActor(actor): RequireActor,
    RequireConnection(connection): RequireConnection,
    Path(id): Path<String>,
) -> StatusCode {
    record_action(
        &services,
        RecordActionForm::CompleteReminder,
        &actor,
        &connection,
        id,
    )
}

async fn dismiss_notification(
    State(services): State<AppServices>,
    RequireActor(actor): RequireActor,
    RequireConnection(connection): RequireConnection,
    Path(id): Path<String>,
) -> StatusCode {
    record_action(
        &services,
        RecordActionForm::DismissNotification,
        &actor,
        &connection,
        id,
    )
}
