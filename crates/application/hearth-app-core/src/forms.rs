//! Server-side validation of submitted forms into commands.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use hearth_core::{Command, NewAppointment, NewBill, NewReminder, RecordId, ValidationErrors};

/// Raw urlencoded fields as posted by the browser.
pub type FormInput = HashMap<String, String>;

pub trait FormSchema: Send + Sync {
    fn parse(&self, input: &FormInput) -> Result<Command, ValidationErrors>;
}

const MAX_TITLE_LEN: usize = 120;
const MAX_LOCATION_LEN: usize = 200;
const MAX_AMOUNT_CENTS: i64 = 10_000_000_000;
const MAX_RECORD_ID_LEN: usize = 64;

/// Reads fields one at a time, collecting every problem instead of stopping
/// at the first.
pub struct FieldReader<'a> {
    input: &'a FormInput,
    errors: ValidationErrors,
}

impl<'a> FieldReader<'a> {
    pub fn new(input: &'a FormInput) -> Self {
        Self {
            input,
            errors: ValidationErrors::new(),
        }
    }

    fn raw(&self, field: &str) -> Option<&'a str> {
        self.input
            .get(field)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn text(&mut self, field: &str, max_len: usize) -> Option<String> {
        let Some(value) = self.raw(field) else {
            self.errors.add_field(field, "This field is required");
            return None;
        };
        self.bounded(field, value, max_len)
    }

    /// `Some(None)` when the field is absent; `None` when it is present but invalid.
    pub fn optional_text(&mut self, field: &str, max_len: usize) -> Option<Option<String>> {
        match self.raw(field) {
            None => Some(None),
            Some(value) => self.bounded(field, value, max_len).map(Some),
        }
    }

    fn bounded(&mut self, field: &str, value: &str, max_len: usize) -> Option<String> {
        if value.chars().count() > max_len {
            self.errors
                .add_field(field, format!("Must be at most {max_len} characters"));
            return None;
        }
        Some(value.to_string())
    }

    /// Positive money amount with at most two decimals, in cents.
    pub fn amount_cents(&mut self, field: &str) -> Option<i64> {
        let Some(value) = self.raw(field) else {
            self.errors.add_field(field, "This field is required");
            return None;
        };
        match parse_cents(value) {
            Some(cents) if cents > MAX_AMOUNT_CENTS => {
                self.errors.add_field(field, "Amount is too large");
                None
            }
            Some(cents) if cents > 0 => Some(cents),
            Some(_) => {
                self.errors
                    .add_field(field, "Amount must be greater than zero");
                None
            }
            None => {
                self.errors
                    .add_field(field, "Enter an amount like 12.50");
                None
            }
        }
    }

    pub fn date(&mut self, field: &str) -> Option<NaiveDate> {
        let Some(value) = self.raw(field) else {
            self.errors.add_field(field, "This field is required");
            return None;
        };
        match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                self.errors.add_field(field, "Enter a date as YYYY-MM-DD");
                None
            }
        }
    }

    /// Accepts the `datetime-local` input format, with or without seconds.
    pub fn date_time(&mut self, field: &str) -> Option<NaiveDateTime> {
        let Some(value) = self.raw(field) else {
            self.errors.add_field(field, "This field is required");
            return None;
        };
        let parsed = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M")
            .or_else(|_| {
                NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
            });
        match parsed {
            Ok(at) => Some(at),
            Err(_) => {
                self.errors
                    .add_field(field, "Enter a date and time as YYYY-MM-DDTHH:MM");
                None
            }
        }
    }

    pub fn record_id(&mut self, field: &str) -> Option<RecordId> {
        let Some(value) = self.raw(field) else {
            self.errors.add_form("This item no longer exists");
            return None;
        };
        let valid = value.len() <= MAX_RECORD_ID_LEN
            && value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            self.errors.add_form("This item no longer exists");
            return None;
        }
        Some(value.to_string())
    }

    pub fn form_error(&mut self, message: impl Into<String>) {
        self.errors.add_form(message);
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_errors(self) -> ValidationErrors {
        self.errors
    }
}

fn parse_cents(value: &str) -> Option<i64> {
    let (whole, fraction) = match value.split_once('.') {
        Some((w, f)) => (w, f),
        None => (value, ""),
    };
    if whole.is_empty() || fraction.len() > 2 {
        return None;
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }
    let whole: i64 = whole.parse().ok()?;
    let fraction: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().ok()? * 10,
        _ => fraction.parse().ok()?,
    };
    whole.checked_mul(100)?.checked_add(fraction)
}

pub struct NewBillForm;

impl FormSchema for NewBillForm {
    fn parse(&self, input: &FormInput) -> Result<Command, ValidationErrors> {
        let mut r = FieldReader::new(input);
        let title = r.text("title", MAX_TITLE_LEN);
        let amount_cents = r.amount_cents("amount");
        let due_on = r.date("due_on");

        if let Some(due_on) = due_on {
            if due_on < Utc::now().date_naive() - Duration::days(365) {
                r.form_error("Bills due more than a year ago can't be added");
            }
        }

        match (title, amount_cents, due_on) {
            (Some(title), Some(amount_cents), Some(due_on)) if r.is_clean() => {
                Ok(Command::CreateBill(NewBill {
                    title,
                    amount_cents,
                    due_on,
                }))
            }
            _ => Err(r.into_errors()),
        }
    }
}

pub struct NewAppointmentForm;

impl FormSchema for NewAppointmentForm {
    fn parse(&self, input: &FormInput) -> Result<Command, ValidationErrors> {
        let mut r = FieldReader::new(input);
        let title = r.text("title", MAX_TITLE_LEN);
        let starts_at = r.date_time("starts_at");
        let location = r.optional_text("location", MAX_LOCATION_LEN);

        match (title, starts_at, location) {
            (Some(title), Some(starts_at), Some(location)) if r.is_clean() => {
                Ok(Command::CreateAppointment(NewAppointment {
                    title,
                    starts_at,
                    location,
                }))
            }
            _ => Err(r.into_errors()),
        }
    }
}

pub struct NewReminderForm;

impl FormSchema for NewReminderForm {
    fn parse(&self, input: &FormInput) -> Result<Command, ValidationErrors> {
        let mut r = FieldReader::new(input);
        let title = r.text("title", MAX_TITLE_LEN);
        let remind_on = r.date("remind_on");

        match (title, remind_on) {
            (Some(title), Some(remind_on)) if r.is_clean() => {
                Ok(Command::CreateReminder(NewReminder { title, remind_on }))
            }
            _ => Err(r.into_errors()),
        }
    }
}

/// Single-record actions addressed by an `id` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordActionForm {
    MarkBillPaid,
    DeleteBill,
    DeleteAppointment,
    CompleteReminder,
    DismissNotification,
}

impl FormSchema for RecordActionForm {
    fn parse(&self, input: &FormInput) -> Result<Command, ValidationErrors> {
        let mut r = FieldReader::new(input);
        let Some(id) = r.record_id("id") else {
            return Err(r.into_errors());
        };
        Ok(match self {
            RecordActionForm::MarkBillPaid => Command::MarkBillPaid { id },
            RecordActionForm::DeleteBill => Command::DeleteBill { id },
            RecordActionForm::DeleteAppointment => Command::DeleteAppointment { id },
            RecordActionForm::CompleteReminder => Command::CompleteReminder { id },
            RecordActionForm::DismissNotification => Command::DismissNotification { id },
        })
    }
}
