//! Appointment book: booking, rescheduling and cancellation with the
//! exclusive-service conflict check applied before anything is written.
//!
//! The check and the write are separate store calls. Two bookings racing
//! for the same slot can both pass the check.

use std::sync::Arc;

use agendo_core::access::Capability;
use agendo_core::clock::Clock;
use agendo_core::error::{AgendoError, AgendoResult};
use agendo_core::models::appointment::{
    Appointment, AppointmentStatus, CreateAppointment, TimeOfDay, UpdateAppointment,
};
use agendo_core::models::client::Client;
use agendo_core::models::service::Service;
use agendo_core::models::user::User;
use agendo_core::schedule::{self, Candidate};
use agendo_core::store::{self, Store, paths};
use serde_json::Value;
use tracing::{info, warn};

use crate::guard;

#[derive(Debug, Clone)]
pub struct AppointmentBook<S> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: Store> AppointmentBook<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    async fn all(&self, business_id: &str) -> AgendoResult<Vec<Appointment>> {
        let all: Vec<(String, Appointment)> =
            store::read_children(&self.store, &paths::appointments(business_id)).await?;
        Ok(all.into_iter().map(|(_, a)| a).collect())
    }

    async fn service(&self, business_id: &str, service_id: &str) -> AgendoResult<Service> {
        store::read_as(&self.store, &paths::service(business_id, service_id))
            .await?
            .ok_or_else(|| AgendoError::not_found("service", service_id))
    }

    async fn ensure_client(&self, business_id: &str, client_id: &str) -> AgendoResult<()> {
        match self.store.read(&paths::client(business_id, client_id)).await? {
            Some(_) => Ok(()),
            None => Err(AgendoError::not_found("client", client_id)),
        }
    }

    /// Build the conflict error for `existing`, naming its client. Falls
    /// back to the client id when the client cannot be read.
    async fn conflict(&self, business_id: &str, existing: &Appointment) -> AgendoError {
        let client: AgendoResult<Option<Client>> =
            store::read_as(&self.store, &paths::client(business_id, &existing.client_id)).await;
        let client_name = match client {
            Ok(Some(c)) => c.name,
            Ok(None) => {
                warn!(%business_id, client_id = %existing.client_id, "conflicting appointment has no client record");
                existing.client_id.clone()
            }
            Err(e) => {
                warn!(%business_id, client_id = %existing.client_id, error = %e, "could not read conflicting client");
                existing.client_id.clone()
            }
        };
        AgendoError::Conflict {
            client_name,
            start: existing.start_time.to_string(),
            end: existing.end_time.to_string(),
        }
    }

    /// Reject `candidate` if it overlaps a booking of the same exclusive
    /// service.
    async fn check_conflict(
        &self,
        business_id: &str,
        service: &Service,
        candidate: Candidate<'_>,
    ) -> AgendoResult<()> {
        let existing = self.all(business_id).await?;
        if let Some(hit) = schedule::find_conflict(&candidate, service, &existing) {
            return Err(self.conflict(business_id, hit).await);
        }
        Ok(())
    }

    pub async fn list(&self, user: &User, business_id: &str) -> AgendoResult<Vec<Appointment>> {
        guard::authorize(user, business_id, Capability::AppointmentRead)?;
        let mut all = self.all(business_id).await?;
        all.sort_by(|a, b| (a.date, a.start_time).cmp(&(b.date, b.start_time)));
        Ok(all)
    }

    /// Validate and conflict-check a new booking without writing it.
    pub(crate) async fn prepare(
        &self,
        user: &User,
        business_id: &str,
        input: CreateAppointment,
    ) -> AgendoResult<Appointment> {
        let service = self.service(business_id, &input.service_id).await?;
        self.ensure_client(business_id, &input.client_id).await?;

        let end_time = end_time_for(input.start_time, input.end_time, &service)?;
        let status = input.status.unwrap_or(AppointmentStatus::Pending);
        if status != AppointmentStatus::Cancelled {
            let candidate = Candidate {
                service_id: &input.service_id,
                date: input.date,
                start: input.start_time,
                end: end_time,
                exclude_id: None,
            };
            self.check_conflict(business_id, &service, candidate).await?;
        }

        let now = self.clock.now();
        Ok(Appointment {
            id: self.store.generate_key(&paths::appointments(business_id))?,
            client_id: input.client_id,
            service_id: input.service_id,
            date: input.date,
            start_time: input.start_time,
            end_time,
            status,
            notes: input.notes.unwrap_or_default(),
            business_id: business_id.to_string(),
            created_by: user.uid.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn create(
        &self,
        user: &User,
        business_id: &str,
        input: CreateAppointment,
    ) -> AgendoResult<Appointment> {
        guard::authorize(user, business_id, Capability::AppointmentCreate)?;
        let appointment = self.prepare(user, business_id, input).await?;
        store::write_as(
            &self.store,
            &paths::appointment(business_id, &appointment.id),
            &appointment,
        )
        .await?;
        info!(%business_id, appointment_id = %appointment.id, "appointment booked");
        Ok(appointment)
    }

    /// Apply `input` to an existing booking. Without an explicit end time
    /// the end is re-derived from the new service, or shifted with the
    /// start so the duration is kept.
    pub async fn update(
        &self,
        user: &User,
        business_id: &str,
        appointment_id: &str,
        input: UpdateAppointment,
    ) -> AgendoResult<Appointment> {
        guard::authorize(user, business_id, Capability::AppointmentUpdate)?;
        let path = paths::appointment(business_id, appointment_id);
        let current: Appointment = store::read_as(&self.store, &path)
            .await?
            .ok_or_else(|| AgendoError::not_found("appointment", appointment_id))?;

        let service_changed = input
            .service_id
            .as_ref()
            .is_some_and(|s| *s != current.service_id);
        let mut next = current.clone();
        if let Some(client_id) = input.client_id {
            if client_id != current.client_id {
                self.ensure_client(business_id, &client_id).await?;
            }
            next.client_id = client_id;
        }
        if let Some(service_id) = input.service_id {
            next.service_id = service_id;
        }
        if let Some(date) = input.date {
            next.date = date;
        }
        if let Some(start) = input.start_time {
            next.start_time = start;
        }
        if let Some(status) = input.status {
            next.status = status;
        }
        if let Some(notes) = input.notes {
            next.notes = notes;
        }

        let service = self.service(business_id, &next.service_id).await?;
        next.end_time = match input.end_time {
            Some(end) => end,
            None if service_changed => end_time_for(next.start_time, None, &service)?,
            None if next.start_time != current.start_time => {
                let length = current
                    .end_time
                    .minutes()
                    .saturating_sub(current.start_time.minutes());
                schedule::derive_end_time(next.start_time, length)
                    .ok_or_else(|| AgendoError::validation("appointment would end after midnight"))?
            }
            None => current.end_time,
        };
        if next.end_time <= next.start_time {
            return Err(AgendoError::validation("end time must be after start time"));
        }

        if next.status != AppointmentStatus::Cancelled {
            let candidate = Candidate {
                service_id: &next.service_id,
                date: next.date,
                start: next.start_time,
                end: next.end_time,
                exclude_id: Some(appointment_id),
            };
            self.check_conflict(business_id, &service, candidate).await?;
        }

        next.updated_at = self.clock.now();
        store::write_as(&self.store, &path, &next).await?;
        Ok(next)
    }

    pub async fn delete(&self, user: &User, business_id: &str, appointment_id: &str) -> AgendoResult<()> {
        guard::authorize(user, business_id, Capability::AppointmentDelete)?;
        let path = paths::appointment(business_id, appointment_id);
        if self.store.read(&path).await?.is_none() {
            return Err(AgendoError::not_found("appointment", appointment_id));
        }
        self.store.write(&path, Value::Null).await?;
        info!(%business_id, %appointment_id, "appointment deleted");
        Ok(())
    }
}

/// Explicit end time, or start plus the service duration.
fn end_time_for(
    start: TimeOfDay,
    explicit: Option<TimeOfDay>,
    service: &Service,
) -> AgendoResult<TimeOfDay> {
    let end = match explicit {
        Some(end) => end,
        None => schedule::derive_end_time(start, service.duration)
            .ok_or_else(|| AgendoError::validation("appointment would end after midnight"))?,
    };
    if end <= start {
        return Err(AgendoError::validation("end time must be after start time"));
    }
    Ok(end)
}
