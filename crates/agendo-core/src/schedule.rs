//! # Appointment Conflict Checker
//!
//! An exclusive service (`resources == 1`) hosts one booking at a time.
//! Two bookings conflict when they are for the same service on the same
//! date, neither is cancelled, and their half-open intervals
//! `[start, end)` overlap. Back-to-back bookings (10:00–11:00 then
//! 11:00–12:00) do not conflict.
//!
//! Services with `resources > 1` are never checked; concurrent bookings
//! are not counted against their capacity.

use chrono::NaiveDate;

use crate::models::appointment::{Appointment, AppointmentStatus, TimeOfDay};
use crate::models::service::Service;

/// A booking about to be written.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub service_id: &'a str,
    pub date: NaiveDate,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    /// The appointment being edited, which must not conflict with itself.
    pub exclude_id: Option<&'a str>,
}

/// Half-open interval overlap on minute offsets.
pub fn overlaps(a_start: TimeOfDay, a_end: TimeOfDay, b_start: TimeOfDay, b_end: TimeOfDay) -> bool {
    a_start.minutes() < b_end.minutes() && a_end.minutes() > b_start.minutes()
}

/// Return the first existing appointment that blocks `candidate`, if any.
pub fn find_conflict<'a, I>(candidate: &Candidate<'_>, service: &Service, existing: I) -> Option<&'a Appointment>
where
    I: IntoIterator<Item = &'a Appointment>,
{
    if !service.is_exclusive() {
        return None;
    }
    existing.into_iter().find(|appt| {
        appt.status != AppointmentStatus::Cancelled
            && Some(appt.id.as_str()) != candidate.exclude_id
            && appt.service_id == candidate.service_id
            && appt.date == candidate.date
            && overlaps(appt.start_time, appt.end_time, candidate.start, candidate.end)
    })
}

/// End time of a booking of `duration_minutes` starting at `start`, or
/// `None` if it would run past midnight.
pub fn derive_end_time(start: TimeOfDay, duration_minutes: u32) -> Option<TimeOfDay> {
    start.checked_add_minutes(duration_minutes)
}
