//! Digital records: per-client treatment history kept under
//! `businesses/{id}/digitalRecords`.

use std::sync::Arc;

use agendo_core::access::Capability;
use agendo_core::clock::Clock;
use agendo_core::error::{AgendoError, AgendoResult};
use agendo_core::models::appointment::{AppointmentStatus, CreateAppointment};
use agendo_core::models::record::{CreateDigitalRecord, DigitalRecord, UpdateDigitalRecord};
use agendo_core::models::user::{Role, User};
use agendo_core::store::{self, Patch, Store, paths};
use serde_json::Value;
use tracing::info;

use crate::appointments::AppointmentBook;
use crate::guard;

#[derive(Debug, Clone)]
pub struct RecordBook<S> {
    store: S,
    clock: Arc<dyn Clock>,
    appointments: AppointmentBook<S>,
}

fn required(field: &str, value: &str) -> AgendoResult<()> {
    if value.trim().is_empty() {
        Err(AgendoError::validation(format!("{field} is required")))
    } else {
        Ok(())
    }
}

impl<S: Store + Clone> RecordBook<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        let appointments = AppointmentBook::new(store.clone(), clock.clone());
        Self {
            store,
            clock,
            appointments,
        }
    }

    /// The caller must own `business_id` or hold an access entry for it.
    pub fn validate_record_access(&self, user: &User, business_id: &str) -> AgendoResult<()> {
        guard::validate_business_access(user, business_id)
    }

    async fn get(&self, business_id: &str, record_id: &str) -> AgendoResult<DigitalRecord> {
        store::read_as(&self.store, &paths::record(business_id, record_id))
            .await?
            .ok_or_else(|| AgendoError::not_found("digital record", record_id))
    }

    /// Create a record, and its follow-up appointment if one is given, in
    /// a single patch.
    pub async fn create(&self, user: &User, input: CreateDigitalRecord) -> AgendoResult<DigitalRecord> {
        let business_id = input.business_id.clone();
        self.validate_record_access(user, &business_id)?;
        guard::authorize(user, &business_id, Capability::RecordCreate)?;
        required("clientId", &input.client_id)?;
        required("serviceId", &input.service_id)?;
        required("treatment", &input.treatment)?;

        if self
            .store
            .read(&paths::client(&business_id, &input.client_id))
            .await?
            .is_none()
        {
            return Err(AgendoError::not_found("client", &input.client_id));
        }

        let now = self.clock.now();
        let record = DigitalRecord {
            id: self.store.generate_key(&paths::records(&business_id))?,
            client_id: input.client_id.clone(),
            business_id: business_id.clone(),
            service_id: input.service_id.clone(),
            treatment: input.treatment.trim().to_string(),
            date: input.date,
            notes: input.notes.unwrap_or_default(),
            diagnosis: input.diagnosis.unwrap_or_default(),
            duration: input.duration,
            category: input.category.unwrap_or_default(),
            data: input.data.unwrap_or_default(),
            created_by: user.uid.clone(),
            created_at: now,
            updated_at: now,
        };

        let mut patch = Patch::new();
        patch.insert(
            paths::record(&business_id, &record.id),
            store::to_value(&record)?,
        );

        if let Some(follow_up) = input.follow_up {
            guard::authorize(user, &business_id, Capability::AppointmentCreate)?;
            let appointment = self
                .appointments
                .prepare(
                    user,
                    &business_id,
                    CreateAppointment {
                        client_id: input.client_id,
                        service_id: input.service_id,
                        date: follow_up.date,
                        start_time: follow_up.start_time,
                        end_time: follow_up.end_time,
                        status: Some(AppointmentStatus::Pending),
                        notes: follow_up.notes,
                    },
                )
                .await?;
            patch.insert(
                paths::appointment(&business_id, &appointment.id),
                store::to_value(&appointment)?,
            );
        }

        self.store.patch(patch).await?;
        info!(business_id = %business_id, record_id = %record.id, "digital record created");
        Ok(record)
    }

    /// Records of `business_id`, newest first, optionally for one client.
    pub async fn list(
        &self,
        user: &User,
        business_id: &str,
        client_id: Option<&str>,
    ) -> AgendoResult<Vec<DigitalRecord>> {
        self.validate_record_access(user, business_id)?;
        guard::authorize(user, business_id, Capability::RecordRead)?;

        let all: Vec<(String, DigitalRecord)> =
            store::read_children(&self.store, &paths::records(business_id)).await?;
        let mut records: Vec<DigitalRecord> = all
            .into_iter()
            .map(|(_, r)| r)
            .filter(|r| client_id.is_none_or(|c| r.client_id == c))
            .collect();
        records.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(records)
    }

    pub async fn update(
        &self,
        user: &User,
        business_id: &str,
        record_id: &str,
        input: UpdateDigitalRecord,
    ) -> AgendoResult<DigitalRecord> {
        self.validate_record_access(user, business_id)?;
        guard::authorize(user, business_id, Capability::RecordUpdate)?;
        let mut record = self.get(business_id, record_id).await?;

        if let Some(service_id) = input.service_id {
            required("serviceId", &service_id)?;
            record.service_id = service_id;
        }
        if let Some(treatment) = input.treatment {
            required("treatment", &treatment)?;
            record.treatment = treatment.trim().to_string();
        }
        if let Some(date) = input.date {
            record.date = date;
        }
        if let Some(notes) = input.notes {
            record.notes = notes;
        }
        if let Some(diagnosis) = input.diagnosis {
            record.diagnosis = diagnosis;
        }
        if let Some(duration) = input.duration {
            record.duration = duration;
        }
        if let Some(category) = input.category {
            record.category = category;
        }
        if let Some(data) = input.data {
            record.data = data;
        }
        record.updated_at = self.clock.now();

        store::write_as(&self.store, &paths::record(business_id, record_id), &record).await?;
        Ok(record)
    }

    /// Only the record's creator, or an owner or assistant whose own
    /// business it is, may delete it.
    pub async fn delete(&self, user: &User, business_id: &str, record_id: &str) -> AgendoResult<()> {
        self.validate_record_access(user, business_id)?;
        guard::authorize(user, business_id, Capability::RecordDelete)?;
        let record = self.get(business_id, record_id).await?;

        let is_creator = record.created_by == user.uid;
        let is_business_member = matches!(user.role, Role::Owner | Role::Assistant)
            && user.business_id.as_deref() == Some(business_id);
        if !is_creator && !is_business_member {
            return Err(AgendoError::permission(
                "only the creator or the business owner may delete this record",
            ));
        }

        self.store
            .write(&paths::record(business_id, record_id), Value::Null)
            .await?;
        info!(%business_id, %record_id, "digital record deleted");
        Ok(())
    }
}
