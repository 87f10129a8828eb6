use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

pub type RecordId = String;

/// A household record persisted per actor under its own collection.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: &'static str;

    fn id(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bill {
    pub id: RecordId,
    pub title: String,
    pub amount_cents: i64,
    pub due_on: NaiveDate,
    pub paid: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBill {
    pub title: String,
    pub amount_cents: i64,
    pub due_on: NaiveDate,
}

impl NewBill {
    pub fn into_bill(self, id: RecordId, now: DateTime<Utc>) -> Bill {
        Bill {
            id,
            title: self.title,
            amount_cents: self.amount_cents,
            due_on: self.due_on,
            paid: false,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: RecordId,
    pub title: String,
    pub starts_at: NaiveDateTime,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAppointment {
    pub title: String,
    pub starts_at: NaiveDateTime,
    pub location: Option<String>,
}

impl NewAppointment {
    pub fn into_appointment(self, id: RecordId, now: DateTime<Utc>) -> Appointment {
        Appointment {
            id,
            title: self.title,
            starts_at: self.starts_at,
            location: self.location,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: RecordId,
    pub title: String,
    pub remind_on: NaiveDate,
    pub done: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReminder {
    pub title: String,
    pub remind_on: NaiveDate,
}

impl NewReminder {
    pub fn into_reminder(self, id: RecordId, now: DateTime<Utc>) -> Reminder {
        Reminder {
            id,
            title: self.title,
            remind_on: self.remind_on,
            done: false,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: RecordId,
    pub message: String,
    pub dismissed: bool,
    pub created_at: DateTime<Utc>,
}

impl Record for Bill {
    const COLLECTION: &'static str = "bills";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Appointment {
    const COLLECTION: &'static str = "appointments";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Reminder {
    const COLLECTION: &'static str = "reminders";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Notification {
    const COLLECTION: &'static str = "notifications";

    fn id(&self) -> &str {
        &self.id
    }
}
