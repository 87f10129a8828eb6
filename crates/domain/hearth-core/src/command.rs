use crate::records::{NewAppointment, NewBill, NewReminder, RecordId};

/// Static descriptor for one kind of mutation. Defined once, referenced by
/// address from [`Command::definition`]; never looked up by string on the
/// write path.
#[derive(Debug, PartialEq, Eq)]
pub struct CommandDefinition {
    pub kind: &'static str,
    pub result_event_kind: &'static str,
}

pub static CREATE_BILL: CommandDefinition = CommandDefinition {
    kind: "bill.create",
    result_event_kind: "bill.created",
};

pub static MARK_BILL_PAID: CommandDefinition = CommandDefinition {
    kind: "bill.mark_paid",
    result_event_kind: "bill.updated",
};

pub static DELETE_BILL: CommandDefinition = CommandDefinition {
    kind: "bill.delete",
    result_event_kind: "bill.deleted",
};

pub static CREATE_APPOINTMENT: CommandDefinition = CommandDefinition {
    kind: "appointment.create",
    result_event_kind: "appointment.created",
};

pub static DELETE_APPOINTMENT: CommandDefinition = CommandDefinition {
    kind: "appointment.delete",
    result_event_kind: "appointment.deleted",
};

pub static CREATE_REMINDER: CommandDefinition = CommandDefinition {
    kind: "reminder.create",
    result_event_kind: "reminder.created",
};

pub static COMPLETE_REMINDER: CommandDefinition = CommandDefinition {
    kind: "reminder.complete",
    result_event_kind: "reminder.updated",
};

pub static DISMISS_NOTIFICATION: CommandDefinition = CommandDefinition {
    kind: "notification.dismiss",
    result_event_kind: crate::event::NOTIFICATION_UPDATED,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // Bills
    CreateBill(NewBill),
    MarkBillPaid { id: RecordId },
    DeleteBill { id: RecordId },

    // Appointments
    CreateAppointment(NewAppointment),
    DeleteAppointment { id: RecordId },

    // Reminders
    CreateReminder(NewReminder),
    CompleteReminder { id: RecordId },

    // Notifications
    DismissNotification { id: RecordId },
}

impl Command {
    pub fn definition(&self) -> &'static CommandDefinition {
        match self {
            Command::CreateBill(_) => &CREATE_BILL,
            Command::MarkBillPaid { .. } => &MARK_BILL_PAID,
            Command::DeleteBill { .. } => &DELETE_BILL,
            Command::CreateAppointment(_) => &CREATE_APPOINTMENT,
            Command::DeleteAppointment { .. } => &DELETE_APPOINTMENT,
            Command::CreateReminder(_) => &CREATE_REMINDER,
            Command::CompleteReminder { .. } => &COMPLETE_REMINDER,
            Command::DismissNotification { .. } => &DISMISS_NOTIFICATION,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.definition().kind
    }
}

pub mod registry {
    use super::*;

    static ALL: [&CommandDefinition; 8] = [
        &CREATE_BILL,
        &MARK_BILL_PAID,
        &DELETE_BILL,
        &CREATE_APPOINTMENT,
        &DELETE_APPOINTMENT,
        &CREATE_REMINDER,
        &COMPLETE_REMINDER,
        &DISMISS_NOTIFICATION,
    ];

    pub fn all() -> &'static [&'static CommandDefinition] {
        &ALL
    }

    /// For diagnostics and logs only; the write path goes through
    /// [`Command::definition`].
    pub fn find(kind: &str) -> Option<&'static CommandDefinition> {
        ALL.iter().copied().find(|def| def.kind == kind)
    }
}
