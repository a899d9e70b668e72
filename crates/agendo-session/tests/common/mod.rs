//! Fixtures shared by the session integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use agendo_core::clock::{Clock, ManualClock};
use agendo_core::models::appointment::{Appointment, AppointmentStatus};
use agendo_core::models::business::Business;
use agendo_core::models::client::Client;
use agendo_core::models::license::{BusinessLicense, LicenseType};
use agendo_core::models::service::Service;
use agendo_core::models::user::{AccessLevel, BusinessAccess, Role, User};
use agendo_core::store::{self, paths};
use agendo_core::license::compute_end_date;
use agendo_store::MemoryStore;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};

pub const ADMIN_ID: &str = "admin-1";

pub fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap()
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub struct Fixture {
    pub store: MemoryStore,
    pub clock: ManualClock,
}

impl Fixture {
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::new(self.clock.clone())
    }
}

/// Fresh in-memory store with a platform admin and a clock pinned at `now`.
pub async fn setup(now: DateTime<Utc>) -> Fixture {
    let store = MemoryStore::default();
    let mut admin = user(ADMIN_ID, Role::Admin);
    admin.email = "admin@agendo.app".into();
    put_user(&store, &admin).await;
    Fixture {
        store,
        clock: ManualClock::new(now),
    }
}

pub fn user(uid: &str, role: Role) -> User {
    User {
        uid: uid.into(),
        email: format!("{uid}@example.com"),
        display_name: uid.to_uppercase(),
        role,
        business_id: None,
        business_access: BTreeMap::new(),
        current_business: None,
        is_blocked: false,
        blocked_reason: None,
        phone: None,
        created_at: at(2024, 1, 1),
        updated_at: at(2024, 1, 1),
    }
}

pub fn owner_of(uid: &str, business_id: &str) -> User {
    User {
        business_id: Some(business_id.into()),
        ..user(uid, Role::Owner)
    }
}

pub fn assistant_of(uid: &str, business_ids: &[&str]) -> User {
    let mut u = user(uid, Role::Assistant);
    for id in business_ids {
        u.business_access.insert(
            (*id).into(),
            BusinessAccess {
                business_name: format!("Negocio {id}"),
                business_key: key_for(id),
                role: AccessLevel::Viewer,
                added_at: at(2024, 1, 1),
            },
        );
    }
    u.current_business = business_ids.first().map(|id| (*id).to_string());
    u
}

/// Deterministic 16-char key derived from a short business id.
pub fn key_for(business_id: &str) -> String {
    let hex: String = business_id.bytes().map(|b| format!("{b:02X}")).collect();
    format!("{hex:0>16}")
}

pub fn license(start: DateTime<Utc>, license_type: LicenseType) -> BusinessLicense {
    BusinessLicense {
        license_type,
        start_date: start,
        end_date: compute_end_date(start, license_type),
        is_active: true,
        assigned_by: ADMIN_ID.into(),
        assigned_at: start,
        renewal_count: 1,
        canceled_at: None,
        canceled_by: None,
    }
}

pub fn business(id: &str, owner_id: &str, license: Option<BusinessLicense>) -> Business {
    Business {
        id: id.into(),
        name: format!("Negocio {id}"),
        categories: vec!["belleza".into()],
        operating_hours: BTreeMap::new(),
        owner_id: owner_id.into(),
        business_key: key_for(id),
        is_active: license.as_ref().is_some_and(|l| l.is_active),
        license,
        created_at: at(2024, 1, 1),
        updated_at: at(2024, 1, 1),
    }
}

pub fn service(business_id: &str, id: &str, duration: u32, resources: u32) -> Service {
    Service {
        id: id.into(),
        name: format!("Servicio {id}"),
        description: String::new(),
        duration,
        price: Some(25.0),
        category: "cabello".into(),
        resources,
        is_active: true,
        business_id: business_id.into(),
        created_at: at(2024, 1, 1),
        updated_at: at(2024, 1, 1),
    }
}

pub fn client(business_id: &str, id: &str, name: &str) -> Client {
    Client {
        id: id.into(),
        name: name.into(),
        phone: None,
        email: None,
        notes: String::new(),
        business_id: business_id.into(),
        created_at: at(2024, 1, 1),
    }
}

pub fn appointment(
    business_id: &str,
    id: &str,
    service_id: &str,
    client_id: &str,
    date: NaiveDate,
    start: &str,
    end: &str,
) -> Appointment {
    Appointment {
        id: id.into(),
        client_id: client_id.into(),
        service_id: service_id.into(),
        date,
        start_time: start.parse().unwrap(),
        end_time: end.parse().unwrap(),
        status: AppointmentStatus::Confirmed,
        notes: String::new(),
        business_id: business_id.into(),
        created_by: "seed".into(),
        created_at: at(2024, 1, 1),
        updated_at: at(2024, 1, 1),
    }
}

pub async fn put_user(store: &MemoryStore, user: &User) {
    store::write_as(store, &paths::user(&user.uid), user)
        .await
        .unwrap();
}

pub async fn put_business(store: &MemoryStore, business: &Business) {
    store::write_as(store, &paths::business(&business.id), business)
        .await
        .unwrap();
}

pub async fn put_service(store: &MemoryStore, service: &Service) {
    store::write_as(store, &paths::service(&service.business_id, &service.id), service)
        .await
        .unwrap();
}

pub async fn put_client(store: &MemoryStore, client: &Client) {
    store::write_as(store, &paths::client(&client.business_id, &client.id), client)
        .await
        .unwrap();
}

pub async fn put_appointment(store: &MemoryStore, appointment: &Appointment) {
    store::write_as(
        store,
        &paths::appointment(&appointment.business_id, &appointment.id),
        appointment,
    )
    .await
    .unwrap();
}

pub async fn get_user(store: &MemoryStore, uid: &str) -> User {
    store::read_as(store, &paths::user(uid))
        .await
        .unwrap()
        .unwrap()
}

pub async fn get_business(store: &MemoryStore, id: &str) -> Business {
    store::read_as(store, &paths::business(id))
        .await
        .unwrap()
        .unwrap()
}
